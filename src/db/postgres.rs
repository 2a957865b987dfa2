use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::{CredentialRecord, Gateway, ProfileRecord, Provisioning, SignupTarget, SignupTx};

/// Server-schema backend. The target schema and tables are provisioned
/// lazily by the first signup that needs them.
#[derive(Clone)]
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the pool without dialing the server; the first signup that
    /// reaches this flavour pays for the connection.
    pub fn connect_lazy(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect_lazy(url)?;
        Ok(Self { pool })
    }
}

fn qualified(schema: &str, table: &str) -> String {
    format!(r#""{schema}"."{table}""#)
}

#[async_trait]
impl Gateway for PostgresGateway {
    fn provisioning(&self) -> Provisioning {
        Provisioning::Lazy
    }

    async fn ensure_schema(&self, target: &SignupTarget) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"CREATE SCHEMA IF NOT EXISTS "{}""#,
            target.schema_name
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn begin(&self, target: &SignupTarget) -> anyhow::Result<Box<dyn SignupTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSignupTx {
            tx,
            target: target.clone(),
        }))
    }
}

struct PgSignupTx {
    tx: Transaction<'static, Postgres>,
    target: SignupTarget,
}

impl PgSignupTx {
    async fn table_exists(&mut self, table: &str) -> anyhow::Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = $1 AND table_name = $2
            "#,
        )
        .bind(&self.target.schema_name)
        .bind(table)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl SignupTx for PgSignupTx {
    async fn user_table_exists(&mut self) -> anyhow::Result<bool> {
        let table = self.target.user_table.clone();
        self.table_exists(&table).await
    }

    async fn login_table_exists(&mut self) -> anyhow::Result<bool> {
        let table = self.target.login_table.clone();
        self.table_exists(&table).await
    }

    async fn create_user_table(&mut self) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE {user} (
                id SERIAL PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                creation_date_time TIMESTAMPTZ NOT NULL
            )
            "#,
            user = qualified(&self.target.schema_name, &self.target.user_table)
        ))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn create_login_table(&mut self) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE {login} (
                id SERIAL PRIMARY KEY,
                user_registry_id INTEGER NOT NULL
                    REFERENCES {user} (id) ON UPDATE CASCADE ON DELETE CASCADE,
                user_name TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                last_login_date_time TIMESTAMPTZ
            )
            "#,
            login = qualified(&self.target.schema_name, &self.target.login_table),
            user = qualified(&self.target.schema_name, &self.target.user_table)
        ))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_user_id_by_email(&mut self, email: &str) -> anyhow::Result<Option<i64>> {
        let id: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE email = $1",
            qualified(&self.target.schema_name, &self.target.user_table)
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(id.map(i64::from))
    }

    async fn find_login_id_by_user_name(&mut self, user_name: &str) -> anyhow::Result<Option<i64>> {
        let id: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE user_name = $1",
            qualified(&self.target.schema_name, &self.target.login_table)
        ))
        .bind(user_name)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(id.map(i64::from))
    }

    async fn insert_profile(&mut self, profile: &ProfileRecord) -> anyhow::Result<i64> {
        let id: i32 = sqlx::query_scalar(&format!(
            r#"
            INSERT INTO {} (first_name, last_name, email, creation_date_time)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
            qualified(&self.target.schema_name, &self.target.user_table)
        ))
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(profile.creation_date_time)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(i64::from(id))
    }

    async fn insert_credentials(
        &mut self,
        credentials: &CredentialRecord,
        user_registry_id: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_registry_id, user_name, password_hash)
            VALUES ($1, $2, $3)
            "#,
            qualified(&self.target.schema_name, &self.target.login_table)
        ))
        .bind(user_registry_id as i32)
        .bind(&credentials.user_name)
        .bind(&credentials.password_hash)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_user_by_email(&mut self, email: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE email = $1",
            qualified(&self.target.schema_name, &self.target.user_table)
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

    #[test]
    fn qualified_names_are_schema_scoped() {
        assert_eq!(
            qualified("iam", "PROTON_user_registry"),
            r#""iam"."PROTON_user_registry""#
        );
    }
}
