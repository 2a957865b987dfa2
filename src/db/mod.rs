use async_trait::async_trait;
use time::OffsetDateTime;

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresGateway;
pub use sqlite::SqliteGateway;

/// Database backend selected by an incoming signup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavour {
    Sqlite,
    Postgresql,
}

impl Flavour {
    /// Parses the wire identifier. Matching is exact: the payload must say
    /// `sqlite` or `postgresql`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sqlite" => Some(Flavour::Sqlite),
            "postgresql" => Some(Flavour::Postgresql),
            _ => None,
        }
    }
}

/// How a backend gets its schema: created up front by `bootstrap`, or
/// created lazily inside the first signup that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    Bootstrapped,
    Lazy,
}

/// Naming parameters for the target database objects.
///
/// `db_name` is carried for interface completeness; the connection URL in
/// the configuration is what actually selects the database.
#[derive(Debug, Clone)]
pub struct SignupTarget {
    pub db_name: String,
    pub schema_name: String,
    pub user_table: String,
    pub login_table: String,
}

impl Default for SignupTarget {
    fn default() -> Self {
        Self {
            db_name: "proton".into(),
            schema_name: "iam".into(),
            user_table: "PROTON_user_registry".into(),
            login_table: "PROTON_login_registry".into(),
        }
    }
}

/// User-identity half of a signup payload, persisted to the user registry.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub creation_date_time: OffsetDateTime,
}

/// Authentication half of a signup payload, persisted to the login registry.
/// Holds the Argon2 hash, never the plaintext.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub user_name: String,
    pub password_hash: String,
}

/// One database backend: a connection pool plus its provisioning mode.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn provisioning(&self) -> Provisioning;

    /// Makes sure the target schema exists. A no-op for backends without
    /// server-side schemas.
    async fn ensure_schema(&self, target: &SignupTarget) -> anyhow::Result<()>;

    /// Acquires a pooled connection and opens a transaction on it. The
    /// connection is released back to the pool when the transaction ends.
    async fn begin(&self, target: &SignupTarget) -> anyhow::Result<Box<dyn SignupTx>>;
}

/// Operations available inside one signup transaction. Dropping the
/// transaction without `commit` rolls it back.
#[async_trait]
pub trait SignupTx: Send {
    async fn user_table_exists(&mut self) -> anyhow::Result<bool>;

    async fn login_table_exists(&mut self) -> anyhow::Result<bool>;

    async fn create_user_table(&mut self) -> anyhow::Result<()>;

    async fn create_login_table(&mut self) -> anyhow::Result<()>;

    async fn find_user_id_by_email(&mut self, email: &str) -> anyhow::Result<Option<i64>>;

    async fn find_login_id_by_user_name(&mut self, user_name: &str) -> anyhow::Result<Option<i64>>;

    /// Inserts the profile row and returns its server-assigned id.
    async fn insert_profile(&mut self, profile: &ProfileRecord) -> anyhow::Result<i64>;

    async fn insert_credentials(
        &mut self,
        credentials: &CredentialRecord,
        user_registry_id: i64,
    ) -> anyhow::Result<()>;

    /// Deletes profile rows matching the email and returns how many went.
    async fn delete_user_by_email(&mut self, email: &str) -> anyhow::Result<u64>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;

    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavour_parsing_is_exact() {
        assert_eq!(Flavour::parse("sqlite"), Some(Flavour::Sqlite));
        assert_eq!(Flavour::parse("postgresql"), Some(Flavour::Postgresql));
        assert_eq!(Flavour::parse("mysql"), None);
        assert_eq!(Flavour::parse("SQLite"), None);
        assert_eq!(Flavour::parse(""), None);
    }

    #[test]
    fn default_target_names() {
        let target = SignupTarget::default();
        assert_eq!(target.db_name, "proton");
        assert_eq!(target.schema_name, "iam");
        assert_eq!(target.user_table, "PROTON_user_registry");
        assert_eq!(target.login_table, "PROTON_login_registry");
    }
}
