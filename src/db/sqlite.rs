use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, info};

use super::{CredentialRecord, Gateway, ProfileRecord, Provisioning, SignupTarget, SignupTx};

/// Embedded-file backend. Tables are created once by [`SqliteGateway::bootstrap`];
/// signup transactions assume they already exist.
#[derive(Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the user and login registries if either is missing. Idempotent;
    /// reports failure instead of erroring so startup can degrade gracefully.
    pub async fn bootstrap(&self, target: &SignupTarget) -> bool {
        let result: Result<(), sqlx::Error> = async {
            sqlx::query(&user_table_ddl(target)).execute(&self.pool).await?;
            sqlx::query(&login_table_ddl(target)).execute(&self.pool).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(db_name = %target.db_name, "sqlite registries bootstrapped");
                true
            }
            Err(err) => {
                error!(error = %err, "sqlite bootstrap failed");
                false
            }
        }
    }
}

fn user_table_ddl(target: &SignupTarget) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{user}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            creation_date_time TEXT NOT NULL
        )
        "#,
        user = target.user_table
    )
}

fn login_table_ddl(target: &SignupTarget) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{login}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_registry_id INTEGER NOT NULL
                REFERENCES "{user}" (id) ON UPDATE CASCADE ON DELETE CASCADE,
            user_name TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            last_login_date_time TEXT
        )
        "#,
        login = target.login_table,
        user = target.user_table
    )
}

#[async_trait]
impl Gateway for SqliteGateway {
    fn provisioning(&self) -> Provisioning {
        Provisioning::Bootstrapped
    }

    async fn ensure_schema(&self, _target: &SignupTarget) -> anyhow::Result<()> {
        // No server-side schemas in sqlite; the file is the database.
        Ok(())
    }

    async fn begin(&self, target: &SignupTarget) -> anyhow::Result<Box<dyn SignupTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteSignupTx {
            tx,
            target: target.clone(),
        }))
    }
}

struct SqliteSignupTx {
    tx: Transaction<'static, Sqlite>,
    target: SignupTarget,
}

#[async_trait]
impl SignupTx for SqliteSignupTx {
    async fn user_table_exists(&mut self) -> anyhow::Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&self.target.user_table)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(found.is_some())
    }

    async fn login_table_exists(&mut self) -> anyhow::Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&self.target.login_table)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(found.is_some())
    }

    async fn create_user_table(&mut self) -> anyhow::Result<()> {
        sqlx::query(&user_table_ddl(&self.target))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn create_login_table(&mut self) -> anyhow::Result<()> {
        sqlx::query(&login_table_ddl(&self.target))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_user_id_by_email(&mut self, email: &str) -> anyhow::Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(&format!(
            r#"SELECT id FROM "{}" WHERE email = ?"#,
            self.target.user_table
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn find_login_id_by_user_name(&mut self, user_name: &str) -> anyhow::Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(&format!(
            r#"SELECT id FROM "{}" WHERE user_name = ?"#,
            self.target.login_table
        ))
        .bind(user_name)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_profile(&mut self, profile: &ProfileRecord) -> anyhow::Result<i64> {
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (first_name, last_name, email, creation_date_time)
            VALUES (?, ?, ?, ?)
            "#,
            self.target.user_table
        ))
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(profile.creation_date_time)
        .execute(&mut *self.tx)
        .await?;

        // Re-query for the generated id rather than trusting last_insert_rowid;
        // email is unique so the lookup is unambiguous.
        let id = sqlx::query_scalar::<_, i64>(&format!(
            r#"SELECT id FROM "{}" WHERE email = ?"#,
            self.target.user_table
        ))
        .bind(&profile.email)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_credentials(
        &mut self,
        credentials: &CredentialRecord,
        user_registry_id: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (user_registry_id, user_name, password_hash)
            VALUES (?, ?, ?)
            "#,
            self.target.login_table
        ))
        .bind(user_registry_id)
        .bind(&credentials.user_name)
        .bind(&credentials.password_hash)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_user_by_email(&mut self, email: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(&format!(
            r#"DELETE FROM "{}" WHERE email = ?"#,
            self.target.user_table
        ))
        .bind(email)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use time::OffsetDateTime;

    async fn memory_gateway() -> SqliteGateway {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        SqliteGateway::new(pool)
    }

    async fn column_names(gateway: &SqliteGateway, table: &str) -> Vec<String> {
        sqlx::query(&format!(r#"PRAGMA table_info("{table}")"#))
            .fetch_all(&gateway.pool)
            .await
            .expect("table_info")
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect()
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let gateway = memory_gateway().await;
        let target = SignupTarget::default();

        assert!(gateway.bootstrap(&target).await);
        let first_user_cols = column_names(&gateway, &target.user_table).await;
        let first_login_cols = column_names(&gateway, &target.login_table).await;

        assert!(gateway.bootstrap(&target).await);
        assert_eq!(column_names(&gateway, &target.user_table).await, first_user_cols);
        assert_eq!(column_names(&gateway, &target.login_table).await, first_login_cols);

        assert_eq!(
            first_user_cols,
            vec!["id", "first_name", "last_name", "email", "creation_date_time"]
        );
        assert_eq!(
            first_login_cols,
            vec![
                "id",
                "user_registry_id",
                "user_name",
                "password_hash",
                "last_login_date_time"
            ]
        );
    }

    #[tokio::test]
    async fn transaction_inserts_linked_rows() {
        let gateway = memory_gateway().await;
        let target = SignupTarget::default();
        assert!(gateway.bootstrap(&target).await);

        let profile = ProfileRecord {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@navy.mil".into(),
            creation_date_time: OffsetDateTime::now_utc(),
        };
        let credentials = CredentialRecord {
            user_name: "ghopper".into(),
            password_hash: "$argon2id$stub".into(),
        };

        let mut tx = gateway.begin(&target).await.expect("begin");
        assert!(tx.user_table_exists().await.expect("exists"));
        assert_eq!(tx.find_user_id_by_email(&profile.email).await.expect("find"), None);

        let id = tx.insert_profile(&profile).await.expect("insert profile");
        tx.insert_credentials(&credentials, id).await.expect("insert credentials");
        tx.commit().await.expect("commit");

        let linked: i64 = sqlx::query_scalar(&format!(
            r#"SELECT user_registry_id FROM "{}" WHERE user_name = ?"#,
            target.login_table
        ))
        .bind(&credentials.user_name)
        .fetch_one(&gateway.pool)
        .await
        .expect("login row");
        assert_eq!(linked, id);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let gateway = memory_gateway().await;
        let target = SignupTarget::default();
        assert!(gateway.bootstrap(&target).await);

        let profile = ProfileRecord {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@analytical.engine".into(),
            creation_date_time: OffsetDateTime::now_utc(),
        };

        {
            let mut tx = gateway.begin(&target).await.expect("begin");
            tx.insert_profile(&profile).await.expect("insert profile");
            // No commit: dropping the box rolls the transaction back.
        }

        let count: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*) FROM "{}" WHERE email = ?"#,
            target.user_table
        ))
        .bind(&profile.email)
        .fetch_one(&gateway.pool)
        .await
        .expect("count");
        assert_eq!(count, 0);
    }
}
