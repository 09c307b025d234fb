//! Credential checks and session tokens.

use crate::config::BootstrapAdmin;
use crate::error::AppError;
use crate::model::{Account, NewAccount, Role, Session};
use crate::store::Store;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// False for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub async fn authenticate(store: &dyn Store, username: &str, password: &str) -> Result<Account, AppError> {
    let account = match store.get_account_by_username(username.trim()).await? {
        Some(a) => a,
        None => {
            tracing::warn!(username = %username, "login failed: unknown user");
            return Err(AppError::AuthenticationFailure);
        }
    };
    if !verify_password(password, &account.password_hash) {
        tracing::warn!(username = %username, "login failed: bad password");
        return Err(AppError::AuthenticationFailure);
    }
    Ok(account)
}

pub async fn start_session(store: &dyn Store, account_id: i64) -> Result<Session, AppError> {
    let session = Session {
        token: uuid::Uuid::new_v4().simple().to_string(),
        account_id,
        created_at: Utc::now(),
    };
    store.create_session(session).await
}

/// Account behind a session token, if the session exists.
pub async fn session_account(store: &dyn Store, token: &str) -> Result<Option<Account>, AppError> {
    match store.get_session(token).await? {
        Some(session) => store.get_account(session.account_id).await,
        None => Ok(None),
    }
}

/// Create the configured admin account unless the username is already taken. Returns true when created.
pub async fn ensure_admin(store: &dyn Store, admin: &BootstrapAdmin) -> Result<bool, AppError> {
    if store.get_account_by_username(&admin.username).await?.is_some() {
        tracing::debug!(username = %admin.username, "bootstrap admin already present");
        return Ok(false);
    }
    let account = store
        .create_account(NewAccount {
            username: admin.username.clone(),
            password_hash: hash_password(&admin.password)?,
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Admin,
            phone: String::new(),
            address: String::new(),
            profile_picture: None,
            date_of_birth: None,
        })
        .await?;
    tracing::info!(username = %account.username, "bootstrap admin created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn authenticate_and_resolve_session() {
        let store = MemoryStore::new();
        let account = store
            .create_account(NewAccount {
                username: "principal".into(),
                password_hash: hash_password("s3cret-pass").unwrap(),
                email: String::new(),
                first_name: "Pat".into(),
                last_name: "Lee".into(),
                role: Role::Admin,
                phone: String::new(),
                address: String::new(),
                profile_picture: None,
                date_of_birth: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            authenticate(&store, "principal", "wrong").await,
            Err(AppError::AuthenticationFailure)
        ));
        assert!(matches!(
            authenticate(&store, "nobody", "s3cret-pass").await,
            Err(AppError::AuthenticationFailure)
        ));
        let found = authenticate(&store, "principal", "s3cret-pass").await.unwrap();
        assert_eq!(found.id, account.id);

        let session = start_session(&store, account.id).await.unwrap();
        let resolved = session_account(&store, &session.token).await.unwrap().unwrap();
        assert_eq!(resolved.username, "principal");
        assert!(session_account(&store, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let store = MemoryStore::new();
        let admin = BootstrapAdmin {
            username: "root".into(),
            password: "bootstrap-pass".into(),
        };
        assert!(ensure_admin(&store, &admin).await.unwrap());
        assert!(!ensure_admin(&store, &admin).await.unwrap());
        let account = authenticate(&store, "root", "bootstrap-pass").await.unwrap();
        assert_eq!(account.role, Role::Admin);
        assert_eq!(store.count_accounts(Some(Role::Admin)).await.unwrap(), 1);
    }
}
