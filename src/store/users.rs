use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{time_column, timestamp, uuid_column, Store, StoreError, StoreResult};
use crate::model::UserId;

/// A registered account. `password_hash` never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(0, row.get(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: time_column(4, row.get(4)?)?,
    })
}

impl Store {
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let conn = self.conn.lock().await;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::EmailTaken(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                timestamp(&user.created_at)
            ],
        )?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }
}
