//! Administrative account persistence.

use super::{DatabaseClient, ServiceError};
use crate::credentials::AdminProfile;
use crate::errors::ProvisionError;
use crate::render::{sql_string, templates, Substitutions, Template};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// An account as found by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    /// Row identifier.
    pub id: u64,
    /// Login email.
    pub email: String,
    /// Application role.
    pub role: String,
}

/// Hashed credentials to store for an account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    /// Login email, also the lookup key.
    pub email: String,
    /// Bcrypt hash of the web password.
    pub password_hash: String,
    /// Bcrypt hash of the IVR passcode.
    pub ivr_passcode_hash: String,
    /// Phone number the IVR recognizes.
    pub phone_number: String,
    /// Application role.
    pub role: String,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Persistence for application accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Looks up an account by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredAccount>, ServiceError>;

    /// Inserts a new account.
    async fn insert(&self, account: &AccountCredentials) -> Result<(), ServiceError>;

    /// Replaces the credentials of the account with the same email.
    async fn update_credentials(&self, account: &AccountCredentials) -> Result<(), ServiceError>;
}

/// Stores accounts in the application's `users` table.
#[derive(Clone)]
pub struct MysqlAccountStore {
    db: DatabaseClient,
    database: String,
}

impl MysqlAccountStore {
    /// Creates a store over the given application database.
    pub fn new(db: DatabaseClient, database: impl Into<String>) -> Self {
        Self {
            db,
            database: database.into(),
        }
    }

    fn statement(template: &Template, account: &AccountCredentials) -> Result<String, ServiceError> {
        let subs = Substitutions::new()
            .with("EMAIL", sql_string(&account.email))
            .with("PASSWORD_HASH", sql_string(&account.password_hash))
            .with("PASSCODE_HASH", sql_string(&account.ivr_passcode_hash))
            .with("PHONE_NUMBER", sql_string(&account.phone_number))
            .with("ROLE", sql_string(&account.role));
        template
            .render(&subs)
            .map(crate::render::RenderedArtifact::into_content)
            .map_err(|e| ServiceError::UnexpectedOutput {
                command: template.name().to_string(),
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl AccountStore for MysqlAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredAccount>, ServiceError> {
        let subs = Substitutions::new().with("EMAIL", sql_string(email));
        let sql = templates::ACCOUNT_LOOKUP
            .render(&subs)
            .map_err(|e| ServiceError::UnexpectedOutput {
                command: "account lookup".to_string(),
                detail: e.to_string(),
            })?;
        let rows = self.db.query(Some(self.database.as_str()), sql.content()).await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let id = row
            .first()
            .and_then(|cell| cell.parse().ok())
            .ok_or_else(|| ServiceError::UnexpectedOutput {
                command: "account lookup".to_string(),
                detail: "row without a numeric id".to_string(),
            })?;
        Ok(Some(StoredAccount {
            id,
            email: email.to_string(),
            role: row.get(1).cloned().unwrap_or_default(),
        }))
    }

    async fn insert(&self, account: &AccountCredentials) -> Result<(), ServiceError> {
        let sql = Self::statement(&templates::ACCOUNT_INSERT, account)?;
        self.db.query(Some(self.database.as_str()), &sql).await.map(drop)
    }

    async fn update_credentials(&self, account: &AccountCredentials) -> Result<(), ServiceError> {
        let sql = Self::statement(&templates::ACCOUNT_UPDATE, account)?;
        self.db.query(Some(self.database.as_str()), &sql).await.map(drop)
    }
}

/// Keeps accounts in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<Vec<(u64, AccountCredentials)>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored credentials for `email`.
    #[must_use]
    pub fn get(&self, email: &str) -> Option<AccountCredentials> {
        self.accounts
            .lock()
            .iter()
            .find(|(_, a)| a.email == email)
            .map(|(_, a)| a.clone())
    }

    /// Returns the number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    /// Returns true if there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredAccount>, ServiceError> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .find(|(_, a)| a.email == email)
            .map(|(id, a)| StoredAccount {
                id: *id,
                email: a.email.clone(),
                role: a.role.clone(),
            }))
    }

    async fn insert(&self, account: &AccountCredentials) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.lock();
        let id = accounts.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;
        accounts.push((id, account.clone()));
        Ok(())
    }

    async fn update_credentials(&self, account: &AccountCredentials) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.lock();
        if let Some((_, existing)) = accounts.iter_mut().find(|(_, a)| a.email == account.email) {
            *existing = account.clone();
        }
        Ok(())
    }
}

/// What an admin upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpsert {
    /// A new account was inserted.
    Created,
    /// The account with this id had its credentials replaced.
    Updated(u64),
}

/// Creates or updates the administrative account.
///
/// Password and passcode are bcrypt hashed before they reach the store.
#[derive(Clone)]
pub struct AdminAccountAdapter {
    store: Arc<dyn AccountStore>,
    bcrypt_cost: u32,
}

impl AdminAccountAdapter {
    /// Role stored for the administrative account.
    pub const ROLE: &'static str = "admin";

    /// Creates an adapter with the given bcrypt cost.
    pub fn new(store: Arc<dyn AccountStore>, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    /// Looks the account up by email, then inserts or updates it in place.
    pub async fn upsert(&self, profile: &AdminProfile) -> Result<AccountUpsert, ProvisionError> {
        let account = AccountCredentials {
            email: profile.email.clone(),
            password_hash: bcrypt::hash(profile.password.expose(), self.bcrypt_cost)?,
            ivr_passcode_hash: bcrypt::hash(profile.ivr_passcode.expose(), self.bcrypt_cost)?,
            phone_number: profile.phone_number.clone(),
            role: Self::ROLE.to_string(),
        };

        let outcome = match self.store.find_by_email(&profile.email).await? {
            Some(existing) => {
                self.store.update_credentials(&account).await?;
                AccountUpsert::Updated(existing.id)
            }
            None => {
                self.store.insert(&account).await?;
                AccountUpsert::Created
            }
        };
        info!(email = %profile.email, outcome = ?outcome, "Administrator account stored");
        Ok(outcome)
    }
}
