use reggie_core::User;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{sql_err, Database, RepositoryError};

const COLUMNS: &str = "id, name, phone, sex, id_number, avatar, status";

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        sex: row.get(3)?,
        id_number: row.get(4)?,
        avatar: row.get(5)?,
        status: row.get(6)?,
    })
}

pub(super) fn find_user(conn: &Connection, id: i64) -> Result<Option<User>, RepositoryError> {
    conn.query_row(
        &format!("SELECT {} FROM user WHERE id = ?1", COLUMNS),
        params![id],
        map_user,
    )
    .optional()
    .map_err(sql_err("find_user"))
}

impl Database {
    pub async fn user_by_phone(&self, phone: String) -> Result<Option<User>, RepositoryError> {
        self.call("user_by_phone", move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM user WHERE phone = ?1", COLUMNS),
                params![phone],
                map_user,
            )
            .optional()
            .map_err(sql_err("user_by_phone"))
        })
        .await
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        self.call("user_by_id", move |conn| find_user(conn, id))
            .await
    }

    pub async fn insert_user(&self, user: User) -> Result<(), RepositoryError> {
        self.call("insert_user", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO user ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    COLUMNS
                ),
                params![
                    user.id,
                    user.name,
                    user.phone,
                    user.sex,
                    user.id_number,
                    user.avatar,
                    user.status,
                ],
            )
            .map_err(sql_err("insert_user"))?;
            Ok(())
        })
        .await
    }
}
