//! Session and credential store for Discovera.
//!
//! A simplified variant of the book store's persistence pattern: a credential
//! list and a current-session pointer, both kept as JSON text in the storage
//! backend. Authentication is mock-local; passwords are held in plain text and
//! this module must never be mistaken for real security.

use discovera_core::ANONYMOUS_REVIEWER;
use discovera_engine::StorageBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Storage key for the credential list.
pub const USERS_KEY: &str = "discovera_users";
/// Storage key for the current-session pointer.
pub const SESSION_KEY: &str = "discovera_auth";

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "password123";

const MIN_PASSWORD_LEN: usize = 6;

/// Public view of an account, never carrying the password.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
}

/// Stored account record, password included.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    id: String,
    email: String,
    username: String,
    password: String,
}

impl Credential {
    fn user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("all fields are required")]
    MissingFields,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("email or username already exists")]
    DuplicateUser,
    #[error("invalid email or password")]
    InvalidCredentials,
}

/// Credential list plus current-session pointer over a [`StorageBackend`].
///
/// Reads are defensive (unreadable state means no users / no session) and
/// writes are best-effort, matching the book store's persistence policy.
pub struct SessionStore<S> {
    storage: S,
}

impl<S: StorageBackend> SessionStore<S> {
    /// Construct the store and seed the demo credential when no accounts exist.
    pub fn new(storage: S) -> Self {
        let store = Self { storage };
        store.seed_demo_credential();
        store
    }

    /// Register a new account and log it in.
    pub fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        if email.trim().is_empty() || username.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(SessionError::WeakPassword);
        }

        let mut credentials = self.credentials();
        let exists = credentials
            .iter()
            .any(|c| c.email == email || c.username == username);
        if exists {
            return Err(SessionError::DuplicateUser);
        }

        let credential = Credential {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };
        let user = credential.user();
        credentials.push(credential);
        self.save_credentials(&credentials);
        self.save_session(&user);
        Ok(user)
    }

    /// Log in with email and password.
    pub fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }
        let user = self
            .credentials()
            .iter()
            .find(|c| c.email == email && c.password == password)
            .map(Credential::user)
            .ok_or(SessionError::InvalidCredentials)?;
        self.save_session(&user);
        Ok(user)
    }

    /// Clear the current session. Idempotent.
    pub fn logout(&self) {
        if let Err(err) = self.storage.remove(SESSION_KEY) {
            warn!(%err, "session clear failed");
        }
    }

    /// The logged-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        let raw = self.load_text(SESSION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(%err, "persisted session unreadable; treating as logged out");
                None
            }
        }
    }

    /// Display name for authored content: the logged-in username, or the
    /// anonymous default. This is the contract point the book store's review
    /// flow consumes.
    pub fn display_name(&self) -> String {
        self.current_user()
            .map(|user| user.username)
            .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string())
    }

    fn seed_demo_credential(&self) {
        if !self.credentials().is_empty() {
            return;
        }
        let demo = Credential {
            id: Uuid::new_v4().to_string(),
            email: DEMO_EMAIL.to_string(),
            username: DEMO_USERNAME.to_string(),
            password: DEMO_PASSWORD.to_string(),
        };
        self.save_credentials(&[demo]);
    }

    fn credentials(&self) -> Vec<Credential> {
        let raw = match self.load_text(USERS_KEY) {
            Some(raw) => raw,
            None => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!(%err, "persisted credential list unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    fn load_text(&self, key: &str) -> Option<String> {
        match self.storage.load(key) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, key, "storage read failed");
                None
            }
        }
    }

    fn save_credentials(&self, credentials: &[Credential]) {
        self.save_json(USERS_KEY, credentials);
    }

    fn save_session(&self, user: &User) {
        self.save_json(SESSION_KEY, user);
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, key, "serialization failed; skipping save");
                return;
            }
        };
        if let Err(err) = self.storage.save(key, &payload) {
            warn!(%err, key, "save failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovera_engine::MemoryBackend;

    fn store() -> SessionStore<MemoryBackend> {
        SessionStore::new(MemoryBackend::new())
    }

    #[test]
    fn demo_credential_is_seeded_and_can_log_in() {
        let store = store();
        let user = store.login(DEMO_EMAIL, DEMO_PASSWORD).expect("demo login");
        assert_eq!(user.username, DEMO_USERNAME);
        assert_eq!(store.current_user(), Some(user));
    }

    #[test]
    fn register_validates_fields() {
        let store = store();
        assert_eq!(
            store.register("", "alice", "longenough"),
            Err(SessionError::MissingFields)
        );
        assert_eq!(
            store.register("alice@example.com", "alice", "short"),
            Err(SessionError::WeakPassword)
        );
    }

    #[test]
    fn register_rejects_duplicates() {
        let store = store();
        store
            .register("alice@example.com", "alice", "hunter22")
            .expect("first registration");
        assert_eq!(
            store.register("alice@example.com", "other", "hunter22"),
            Err(SessionError::DuplicateUser)
        );
        assert_eq!(
            store.register("other@example.com", "alice", "hunter22"),
            Err(SessionError::DuplicateUser)
        );
    }

    #[test]
    fn register_auto_logs_in() {
        let store = store();
        let user = store
            .register("alice@example.com", "alice", "hunter22")
            .unwrap();
        assert_eq!(store.current_user(), Some(user));
        assert_eq!(store.display_name(), "alice");
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let store = store();
        assert_eq!(
            store.login(DEMO_EMAIL, "wrong"),
            Err(SessionError::InvalidCredentials)
        );
        assert_eq!(
            store.login("nobody@example.com", DEMO_PASSWORD),
            Err(SessionError::InvalidCredentials)
        );
    }

    #[test]
    fn logout_clears_session_and_display_name_falls_back() {
        let store = store();
        store.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        store.logout();
        assert_eq!(store.current_user(), None);
        assert_eq!(store.display_name(), ANONYMOUS_REVIEWER);
        // Idempotent.
        store.logout();
    }

    #[test]
    fn session_survives_store_reopen_over_same_backend() {
        let backend = MemoryBackend::new();
        {
            let store = SessionStore::new(backend.clone());
            store
                .register("alice@example.com", "alice", "hunter22")
                .unwrap();
        }
        let reopened = SessionStore::new(backend);
        assert_eq!(reopened.display_name(), "alice");
    }

    #[test]
    fn demo_seeding_does_not_clobber_existing_accounts() {
        let backend = MemoryBackend::new();
        {
            let store = SessionStore::new(backend.clone());
            store
                .register("alice@example.com", "alice", "hunter22")
                .unwrap();
        }
        let reopened = SessionStore::new(backend);
        // Reopening must not reset the list: demo and alice both remain.
        assert_eq!(
            reopened.register(DEMO_EMAIL, DEMO_USERNAME, DEMO_PASSWORD),
            Err(SessionError::DuplicateUser)
        );
        assert!(reopened.login("alice@example.com", "hunter22").is_ok());
    }
}
