//! Code for creating the user table and keeping it in sync with the identity proxy.

use std::fmt::Display;

use axum::{Extension, Json};
use rusqlite::{
    Connection,
    types::{ToSql, ToSqlOutput},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A newtype wrapper for user IDs.
///
/// User IDs are issued by the identity proxy, so they are opaque strings rather than database
/// generated integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(String);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: &str) -> Self {
        Self(id.to_owned())
    }

    /// The user ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID as issued by the identity proxy.
    pub id: UserID,
    /// The user's email address.
    pub email: String,
    /// The name to display for the user.
    pub name: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Insert `user`, or refresh the stored email and name if the user already exists.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn upsert_user(user: &User, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user (id, email, name) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name",
        (&user.id, &user.email, &user.name),
    )?;

    Ok(())
}

/// Get the user with `id`.
///
/// # Errors
///
/// Returns a [Error::NotFound] if there is no user with `id`, or a [Error::SqlError] if an
/// SQL related error occurred.
#[cfg(test)]
pub fn get_user_by_id(id: &UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, name FROM user WHERE id = :id")?
        .query_row(&[(":id", &id.as_str())], map_user_row)
        .map_err(|error| error.into())
}

#[cfg(test)]
fn map_user_row(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let raw_id: String = row.get(0)?;

    Ok(User {
        id: UserID(raw_id),
        email: row.get(1)?,
        name: row.get(2)?,
    })
}

/// Route handler that returns the user making the request.
pub async fn get_current_user(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
