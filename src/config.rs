/// Connection settings, one URL per supported flavour.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sqlite_url: String,
    pub postgres_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let sqlite_url = std::env::var("SQLITE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://proton.db".into());
        let postgres_url =
            std::env::var("POSTGRES_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))?;
        Ok(Self {
            sqlite_url,
            postgres_url,
        })
    }
}
