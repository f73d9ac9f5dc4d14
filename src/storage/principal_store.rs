use chrono::{DateTime, Utc};

use crate::{
    domain::{error::DomainError, models::Principal},
    storage::SqliteStore,
};

type PrincipalRow = (String, String, String, i64, i64, DateTime<Utc>);

impl SqliteStore {
    pub async fn insert_principal(&self, principal: &Principal) -> Result<(), DomainError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO principals(principal_id, username, email, is_active, is_admin, created_at) \
             VALUES(?, ?, ?, ?, ?, ?)",
        )
        .bind(&principal.id)
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(i64::from(principal.is_active))
        .bind(i64::from(principal.is_admin))
        .bind(principal.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert principal: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Conflict(format!(
                "username already taken: {}",
                principal.username
            )));
        }
        Ok(())
    }

    pub async fn get_principal(&self, id: &str) -> Result<Option<Principal>, DomainError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT principal_id, username, email, is_active, is_admin, created_at \
             FROM principals WHERE principal_id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to get principal: {error}")))?;

        Ok(row.map(map_principal_row))
    }

    pub async fn issue_token(
        &self,
        principal_id: &str,
        token: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO api_tokens(token, principal_id, created_at) VALUES(?, ?, ?)")
            .bind(token)
            .bind(principal_id)
            .bind(issued_at)
            .execute(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to issue token: {error}")))?;
        Ok(())
    }

    /// Resolve a bearer token to its active principal, or `None` if the token
    /// is unknown or the account was deactivated.
    pub async fn resolve_token(&self, token: &str) -> Result<Option<Principal>, DomainError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT p.principal_id, p.username, p.email, p.is_active, p.is_admin, p.created_at \
             FROM api_tokens t JOIN principals p ON p.principal_id = t.principal_id \
             WHERE t.token = ? LIMIT 1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to resolve token: {error}")))?;

        Ok(row.map(map_principal_row).filter(|principal| principal.is_active))
    }

    pub async fn count_principals(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM principals")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count principals: {error}")))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_principal_row(row: PrincipalRow) -> Principal {
    let (id, username, email, is_active, is_admin, created_at) = row;
    Principal {
        id,
        username,
        email,
        is_active: is_active == 1,
        is_admin: is_admin == 1,
        created_at,
    }
}
