#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use banking_dashboard::application::seed_demo_data;
use banking_dashboard::domain::{
    Account, AccountType, BankingError, BankingResult, Card, Rib, User, UserRole,
};
use banking_dashboard::infrastructure::config::SyncConfig;
use banking_dashboard::application::dto::RegisterRequest;
use banking_dashboard::{build_state, create_router, AppState, BankingApi};

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_secs(5),
        max_backoff: Duration::from_secs(60),
    }
}

pub fn client(id: &str, approved: bool) -> User {
    let mut user = User::new(id, UserRole::Client, "Alice Martin", "alice@example.com");
    user.is_approved = approved;
    user
}

pub fn account_a1() -> Account {
    Account::new("a1", "u1", AccountType::Checking, "Compte Courant", dec!(1520.35))
}

pub fn card_c1() -> Card {
    Card {
        id: "c1".to_string(),
        owner_id: "u1".to_string(),
        card_number: "4539578763621486".to_string(),
        holder_name: "ALICE MARTIN".to_string(),
        expiry_date: "03/29".to_string(),
        cvv: "123".to_string(),
        pin: "4321".to_string(),
        is_blocked: false,
    }
}

pub async fn seeded_state() -> AppState {
    let state = build_state();
    seed_demo_data(&state.users, &state.accounts, &state.cards)
        .await
        .unwrap();
    state
}

/// Serve a seeded router on an ephemeral port. Returns the base URL.
pub async fn spawn_server() -> (String, CancellationToken) {
    let state = seeded_state().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });
    (format!("http://{}", addr), token)
}

/// In-memory API double. User polls follow a script; once the script is
/// exhausted the last scripted user is repeated.
#[derive(Default)]
pub struct ScriptedApi {
    user_script: Mutex<VecDeque<BankingResult<User>>>,
    last_user: Mutex<Option<User>>,
    user_calls: AtomicUsize,
    block_calls: AtomicUsize,
    list_calls: AtomicUsize,
    /// While set, account and card listings fail as if the server were down.
    pub listings_fail: AtomicBool,
    /// Latency added to every rename before the server applies it.
    pub rename_delay: Mutex<Option<Duration>>,
    pub accounts: Mutex<Vec<Account>>,
    pub cards: Mutex<Vec<Card>>,
}

impl ScriptedApi {
    pub fn with_user_polls(polls: Vec<BankingResult<User>>) -> Self {
        Self {
            user_script: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn dashboard_for(user: User) -> Self {
        let api = Self::with_user_polls(vec![Ok(user)]);
        *api.accounts.lock().unwrap() = vec![account_a1()];
        *api.cards.lock().unwrap() = vec![card_c1()];
        api
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn listing(&self) -> BankingResult<()> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.listings_fail.load(Ordering::SeqCst) {
            return Err(BankingError::transient("connection reset"));
        }
        Ok(())
    }
}

fn not_scripted<T>() -> BankingResult<T> {
    Err(BankingError::validation("not scripted"))
}

#[async_trait]
impl BankingApi for ScriptedApi {
    async fn register(&self, _request: &RegisterRequest) -> BankingResult<User> {
        not_scripted()
    }

    async fn login(&self, _email: &str, _access_code: &str) -> BankingResult<User> {
        not_scripted()
    }

    async fn get_user(&self, _caller: &str, user_id: &str) -> BankingResult<User> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.user_script.lock().unwrap().pop_front();
        match next {
            Some(Ok(user)) => {
                *self.last_user.lock().unwrap() = Some(user.clone());
                Ok(user)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last_user
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| BankingError::not_found(format!("user {}", user_id))),
        }
    }

    async fn get_rib(&self, _caller: &str, _user_id: &str) -> BankingResult<Rib> {
        Ok(Rib::default())
    }

    async fn list_accounts(&self, _caller: &str, owner_id: &str) -> BankingResult<Vec<Account>> {
        self.listing()?;
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn rename_account(
        &self,
        _caller: &str,
        account_id: &str,
        name: &str,
    ) -> BankingResult<Account> {
        let delay = *self.rename_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| BankingError::not_found(format!("account {}", account_id)))?;
        account.rename(name);
        Ok(account.clone())
    }

    async fn list_cards(&self, _caller: &str, owner_id: &str) -> BankingResult<Vec<Card>> {
        self.listing()?;
        Ok(self
            .cards
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn set_card_status(
        &self,
        _caller: &str,
        card_id: &str,
        is_blocked: bool,
    ) -> BankingResult<Card> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let mut cards = self.cards.lock().unwrap();
        let card = cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))?;
        if is_blocked {
            card.block();
        }
        Ok(card.clone())
    }

    async fn reveal_pin(
        &self,
        _caller: &str,
        card_id: &str,
        access_code: &str,
    ) -> BankingResult<String> {
        if access_code != "2468" {
            return Err(BankingError::unauthorized("access code does not match"));
        }
        self.cards
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| c.pin.clone())
            .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))
    }

    async fn list_pending_users(&self, _caller: &str) -> BankingResult<Vec<User>> {
        not_scripted()
    }

    async fn approve_user(&self, _caller: &str, _user_id: &str) -> BankingResult<User> {
        not_scripted()
    }
}
