use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{Account, BankingResult, Card, Rib};
use crate::infrastructure::store::{Mutation, Mutator, Versioned, VersionedStore};

#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    async fn create(&self, account: Account) -> BankingResult<Account>;
    async fn get_by_id(&self, id: &str) -> BankingResult<Option<Versioned<Account>>>;
    async fn list_by_owner(&self, owner_id: &str) -> BankingResult<Vec<Account>>;
    async fn mutate(&self, id: &str, f: Mutator<Account>) -> BankingResult<Mutation<Account>>;
}

#[async_trait]
pub trait CardRepositoryTrait: Send + Sync {
    async fn create(&self, card: Card) -> BankingResult<Card>;
    async fn get_by_id(&self, id: &str) -> BankingResult<Option<Versioned<Card>>>;
    async fn list_by_owner(&self, owner_id: &str) -> BankingResult<Vec<Card>>;
    async fn mutate(&self, id: &str, f: Mutator<Card>) -> BankingResult<Mutation<Card>>;
}

#[async_trait]
pub trait RibRepositoryTrait: Send + Sync {
    async fn get(&self, user_id: &str) -> BankingResult<Option<Rib>>;
    async fn put(&self, user_id: &str, rib: Rib) -> BankingResult<()>;
}

pub struct InMemoryAccountRepository {
    accounts: VersionedStore<Account>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            accounts: VersionedStore::new("account"),
        }
    }
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepositoryTrait for InMemoryAccountRepository {
    async fn create(&self, account: Account) -> BankingResult<Account> {
        let id = account.id.clone();
        Ok(self.accounts.insert(&id, account)?.value)
    }

    async fn get_by_id(&self, id: &str) -> BankingResult<Option<Versioned<Account>>> {
        Ok(self.accounts.get(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> BankingResult<Vec<Account>> {
        Ok(self
            .accounts
            .filter(|account| account.owner_id == owner_id)
            .into_iter()
            .map(|(_, account)| account)
            .collect())
    }

    async fn mutate(&self, id: &str, f: Mutator<Account>) -> BankingResult<Mutation<Account>> {
        self.accounts.mutate(id, f)
    }
}

pub struct InMemoryCardRepository {
    cards: VersionedStore<Card>,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self {
            cards: VersionedStore::new("card"),
        }
    }
}

impl Default for InMemoryCardRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardRepositoryTrait for InMemoryCardRepository {
    async fn create(&self, card: Card) -> BankingResult<Card> {
        let id = card.id.clone();
        Ok(self.cards.insert(&id, card)?.value)
    }

    async fn get_by_id(&self, id: &str) -> BankingResult<Option<Versioned<Card>>> {
        Ok(self.cards.get(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> BankingResult<Vec<Card>> {
        Ok(self
            .cards
            .filter(|card| card.owner_id == owner_id)
            .into_iter()
            .map(|(_, card)| card)
            .collect())
    }

    async fn mutate(&self, id: &str, f: Mutator<Card>) -> BankingResult<Mutation<Card>> {
        self.cards.mutate(id, f)
    }
}

#[derive(Default)]
pub struct InMemoryRibRepository {
    ribs: DashMap<String, Rib>,
}

impl InMemoryRibRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RibRepositoryTrait for InMemoryRibRepository {
    async fn get(&self, user_id: &str) -> BankingResult<Option<Rib>> {
        Ok(self.ribs.get(user_id).map(|rib| rib.value().clone()))
    }

    async fn put(&self, user_id: &str, rib: Rib) -> BankingResult<()> {
        self.ribs.insert(user_id.to_string(), rib);
        Ok(())
    }
}
