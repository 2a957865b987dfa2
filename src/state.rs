use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::db::{Flavour, Gateway, PostgresGateway, SignupTarget, SqliteGateway};
use crate::iam::service::SignupService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SignupService>,
}

impl AppState {
    /// Reads configuration, wires one gateway per flavour and bootstraps the
    /// sqlite registries. Postgres connects lazily, so it does not need to
    /// be reachable at startup.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let sqlite = SqliteGateway::connect(&config.sqlite_url).await?;
        if !sqlite.bootstrap(&SignupTarget::default()).await {
            warn!("sqlite bootstrap failed; sqlite signups will error until the registries exist");
        }
        let postgres = PostgresGateway::connect_lazy(&config.postgres_url)?;

        let mut gateways: HashMap<Flavour, Arc<dyn Gateway>> = HashMap::new();
        gateways.insert(Flavour::Sqlite, Arc::new(sqlite));
        gateways.insert(Flavour::Postgresql, Arc::new(postgres));

        Ok(Self {
            service: Arc::new(SignupService::new(gateways)),
        })
    }
}
