//! Accounts (identity + profile) and login sessions.

use super::Role;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: String,
    pub address: String,
    pub profile_picture: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// "First Last", trimmed; empty when neither name is set.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: String,
    pub address: String,
    pub profile_picture: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub account_id: i64,
    pub created_at: DateTime<Utc>,
}
