use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{normalize_email, BankingError, BankingResult, User};
use crate::infrastructure::store::{Mutation, Mutator, VersionedStore};

/// Server-side user row. The access code hash never leaves the server.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub access_code_hash: String,
}

#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn create(&self, record: UserRecord) -> BankingResult<User>;
    async fn find_by_id(&self, id: &str) -> BankingResult<Option<UserRecord>>;
    async fn find_by_email(&self, email: &str) -> BankingResult<Option<UserRecord>>;
    async fn list_pending(&self) -> BankingResult<Vec<User>>;
    async fn mutate(&self, id: &str, f: Mutator<UserRecord>) -> BankingResult<Mutation<UserRecord>>;
}

pub struct InMemoryUserRepository {
    users: VersionedStore<UserRecord>,
    email_index: DashMap<String, String>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: VersionedStore::new("user"),
            email_index: DashMap::new(),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryUserRepository {
    async fn create(&self, record: UserRecord) -> BankingResult<User> {
        let email = normalize_email(&record.user.email);
        let id = record.user.id.clone();

        // Reserve the email first so two registrations cannot race past each other.
        match self.email_index.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(BankingError::conflict(format!(
                    "email {} is already registered",
                    email
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        match self.users.insert(&id, record) {
            Ok(stored) => Ok(stored.value.user),
            Err(e) => {
                self.email_index.remove(&email);
                Err(e)
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> BankingResult<Option<UserRecord>> {
        Ok(self.users.get(id).map(|record| record.value))
    }

    async fn find_by_email(&self, email: &str) -> BankingResult<Option<UserRecord>> {
        let id = match self.email_index.get(&normalize_email(email)) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|record| record.value))
    }

    async fn list_pending(&self) -> BankingResult<Vec<User>> {
        Ok(self
            .users
            .filter(|record| record.user.is_client() && !record.user.is_approved)
            .into_iter()
            .map(|(_, record)| record.user)
            .collect())
    }

    async fn mutate(
        &self,
        id: &str,
        f: Mutator<UserRecord>,
    ) -> BankingResult<Mutation<UserRecord>> {
        self.users.mutate(id, f)
    }
}
