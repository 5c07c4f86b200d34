//! Identity & session provider port.
//!
//! Authentication transport (cookies, tokens) is opaque to this crate: the
//! provider only remembers which user record the client is acting as.
//! [`SessionContext`] wraps a provider and is passed explicitly to every
//! client operation instead of living in a global slot.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::{BankingError, BankingResult, User};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> BankingResult<Option<User>>;
    async fn store_user(&self, user: &User) -> BankingResult<()>;
    async fn clear_stored_user(&self) -> BankingResult<()>;
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    user: RwLock<Option<User>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityStore {
    async fn current_user(&self) -> BankingResult<Option<User>> {
        Ok(self.user.read().await.clone())
    }

    async fn store_user(&self, user: &User) -> BankingResult<()> {
        *self.user.write().await = Some(user.clone());
        Ok(())
    }

    async fn clear_stored_user(&self) -> BankingResult<()> {
        *self.user.write().await = None;
        Ok(())
    }
}

/// Persists the current user as JSON so a restarted client resumes its session.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityStore {
    async fn current_user(&self) -> BankingResult<Option<User>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BankingError::transient(format!("session read failed: {}", e))),
        };
        match serde_json::from_str(&content) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    async fn store_user(&self, user: &User) -> BankingResult<()> {
        let content = serde_json::to_string_pretty(user)
            .map_err(|e| BankingError::validation(e.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| BankingError::transient(format!("session write failed: {}", e)))
    }

    async fn clear_stored_user(&self) -> BankingResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BankingError::transient(format!("session clear failed: {}", e))),
        }
    }
}

/// Explicit load/store/clear lifecycle over an [`IdentityProvider`].
#[derive(Clone)]
pub struct SessionContext {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryIdentityStore::new()))
    }

    pub async fn load(&self) -> BankingResult<Option<User>> {
        self.provider.current_user().await
    }

    /// Like [`load`](Self::load) but a missing identity is `Unauthorized`.
    pub async fn require(&self) -> BankingResult<User> {
        self.load()
            .await?
            .ok_or_else(|| BankingError::unauthorized("no active session"))
    }

    pub async fn store(&self, user: &User) -> BankingResult<()> {
        debug!(user_id = %user.id, approved = user.is_approved, "Storing session user");
        self.provider.store_user(user).await
    }

    pub async fn clear(&self) -> BankingResult<()> {
        debug!("Clearing session");
        self.provider.clear_stored_user().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    fn alice() -> User {
        User::new("u1", UserRole::Client, "Alice", "alice@example.com")
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let session = SessionContext::in_memory();
        assert!(session.load().await.unwrap().is_none());
        assert!(matches!(
            session.require().await.unwrap_err(),
            BankingError::Unauthorized(_)
        ));

        session.store(&alice()).await.unwrap();
        assert_eq!(session.require().await.unwrap().id, "u1");

        session.clear().await.unwrap();
        assert!(session.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let path = std::env::temp_dir().join(format!("session-{}.json", uuid::Uuid::new_v4()));
        let store = FileIdentityStore::new(&path);

        assert!(store.current_user().await.unwrap().is_none());
        store.store_user(&alice()).await.unwrap();
        assert_eq!(store.current_user().await.unwrap(), Some(alice()));

        store.clear_stored_user().await.unwrap();
        assert!(store.current_user().await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear_stored_user().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_session_file_reads_as_logged_out() {
        let path = std::env::temp_dir().join(format!("session-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = FileIdentityStore::new(&path);
        assert!(store.current_user().await.unwrap().is_none());
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
