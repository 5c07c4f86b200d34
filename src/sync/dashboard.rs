use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    accepted_name, Account, BankingError, BankingResult, Card, IbanMode, ResolvedIban, User,
};
use crate::infrastructure::api_client::BankingApi;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::identity::SessionContext;
use crate::sync::cache::LocalCache;
use crate::sync::poller::{PollEvent, Poller};

const NOTIFICATION_CAPACITY: usize = 32;

/// Short-lived message for the user, shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

/// An approved user's dashboard: a polled cache plus optimistic mutations.
///
/// Reads come from [`LocalCache`] and may lag the server by one poll
/// interval. Mutations show their result immediately and roll back if the
/// server rejects them.
pub struct DashboardSession {
    api: Arc<dyn BankingApi>,
    session: SessionContext,
    user: User,
    cache: Arc<RwLock<LocalCache>>,
    notifications: mpsc::Sender<Notification>,
    token: CancellationToken,
}

impl DashboardSession {
    /// Load the dashboard for the session user and start background polling.
    ///
    /// Fails `Unauthorized` without a session or while the client is still
    /// awaiting approval.
    pub async fn start(
        api: Arc<dyn BankingApi>,
        session: SessionContext,
        config: &SyncConfig,
        parent: &CancellationToken,
    ) -> BankingResult<(Self, mpsc::Receiver<Notification>)> {
        let user = session.require().await?;
        if user.is_client() && !user.is_approved {
            return Err(BankingError::unauthorized("account is awaiting advisor approval"));
        }

        let (notifications, receiver) = mpsc::channel(NOTIFICATION_CAPACITY);
        let dashboard = Self {
            api,
            session,
            user,
            cache: Arc::new(RwLock::new(LocalCache::new())),
            notifications,
            token: parent.child_token(),
        };
        dashboard.refresh().await?;

        // The initial load above already covers the first interval.
        let poller = Poller::new(config).with_initial_delay(config.poll_interval);
        dashboard.spawn_pollers(&poller);
        info!(user_id = %dashboard.user.id, "Dashboard started");
        Ok((dashboard, receiver))
    }

    /// Fetch every watched resource once.
    pub async fn refresh(&self) -> BankingResult<()> {
        let id = self.user.id.as_str();
        let (user, accounts, cards, rib) = tokio::try_join!(
            self.api.get_user(id, id),
            self.api.list_accounts(id, id),
            self.api.list_cards(id, id),
            self.api.get_rib(id, id),
        )?;

        let mut cache = self.cache.write().await;
        cache.apply_user(user);
        cache.apply_accounts(accounts);
        cache.apply_cards(cards);
        cache.apply_rib(rib);
        Ok(())
    }

    fn spawn_pollers(&self, poller: &Poller) {
        let id = self.user.id.clone();

        self.watch(
            poller,
            "user",
            self.fetcher(&id, |api, id| async move { api.get_user(&id, &id).await }),
            LocalCache::apply_user,
        );
        self.watch(
            poller,
            "accounts",
            self.fetcher(&id, |api, id| async move { api.list_accounts(&id, &id).await }),
            LocalCache::apply_accounts,
        );
        self.watch(
            poller,
            "cards",
            self.fetcher(&id, |api, id| async move { api.list_cards(&id, &id).await }),
            LocalCache::apply_cards,
        );
        self.watch(
            poller,
            "rib",
            self.fetcher(&id, |api, id| async move { api.get_rib(&id, &id).await }),
            LocalCache::apply_rib,
        );
    }

    fn fetcher<T, C, Fut>(
        &self,
        user_id: &str,
        call: C,
    ) -> impl FnMut() -> Fut + Send + 'static
    where
        C: Fn(Arc<dyn BankingApi>, String) -> Fut + Send + 'static,
        Fut: Future<Output = BankingResult<T>> + Send,
    {
        let api = self.api.clone();
        let user_id = user_id.to_string();
        move || call(api.clone(), user_id.clone())
    }

    fn watch<T, F, Fut>(
        &self,
        poller: &Poller,
        name: &'static str,
        fetch: F,
        apply: fn(&mut LocalCache, T) -> bool,
    ) where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = BankingResult<T>> + Send,
    {
        let (mut events, _) = poller.spawn(name, fetch, self.token.clone());
        let cache = self.cache.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PollEvent::Fetched(value) => {
                        if apply(&mut *cache.write().await, value) {
                            debug!(resource = name, "Cache updated from poll");
                        }
                    }
                    // Keep serving the cached value; the poller retries.
                    PollEvent::Failed { .. } => {}
                }
            }
        });
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.cache.read().await.accounts()
    }

    pub async fn cards(&self) -> Vec<Card> {
        self.cache.read().await.cards()
    }

    pub async fn iban(&self, account_id: &str, mode: IbanMode) -> Option<ResolvedIban> {
        self.cache.read().await.iban(account_id, mode)
    }

    fn notify(&self, notification: Notification) {
        // Toasts are best effort; a full queue drops the newest one.
        if self.notifications.try_send(notification).is_err() {
            debug!("Notification queue full, dropping message");
        }
    }

    /// Rename an account optimistically.
    ///
    /// An empty or unchanged name does nothing and sends no request.
    pub async fn rename_account(&self, account_id: &str, new_name: &str) -> BankingResult<Account> {
        let ticket = {
            let mut cache = self.cache.write().await;
            let entry = cache
                .account_entry_mut(account_id)
                .ok_or_else(|| BankingError::not_found(format!("account {}", account_id)))?;
            let current = entry
                .visible()
                .cloned()
                .ok_or_else(|| BankingError::not_found(format!("account {}", account_id)))?;
            let name = match accepted_name(&current.name, new_name) {
                Some(name) => name,
                None => return Ok(current),
            };
            let mut optimistic = current;
            optimistic.name = name;
            entry.begin(optimistic)
        };

        let result = self
            .api
            .rename_account(&self.user.id, account_id, new_name)
            .await;

        let mut cache = self.cache.write().await;
        let entry = cache
            .account_entry_mut(account_id)
            .ok_or_else(|| BankingError::not_found(format!("account {}", account_id)))?;
        match result {
            Ok(account) => {
                entry.confirm(ticket, account.clone());
                self.notify(Notification::Success(format!(
                    "Account renamed to \"{}\"",
                    account.name
                )));
                Ok(account)
            }
            Err(e) => {
                entry.rollback(ticket);
                warn!(account_id, "Rename failed, reverted: {}", e);
                self.notify(Notification::Error(format!("Could not rename account: {}", e)));
                Err(e)
            }
        }
    }

    /// Block a card optimistically. Blocking a blocked card is a no-op.
    pub async fn block_card(&self, card_id: &str) -> BankingResult<Card> {
        let ticket = {
            let mut cache = self.cache.write().await;
            let entry = cache
                .card_entry_mut(card_id)
                .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))?;
            let current = entry
                .visible()
                .cloned()
                .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))?;
            if current.is_blocked {
                return Ok(current);
            }
            let mut optimistic = current;
            optimistic.is_blocked = true;
            entry.begin(optimistic)
        };

        let result = self.api.set_card_status(&self.user.id, card_id, true).await;

        let mut cache = self.cache.write().await;
        let entry = cache
            .card_entry_mut(card_id)
            .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))?;
        match result {
            Ok(card) => {
                entry.confirm(ticket, card.clone());
                self.notify(Notification::Success("Card blocked".to_string()));
                Ok(card)
            }
            Err(e) => {
                entry.rollback(ticket);
                warn!(card_id, "Block failed, reverted: {}", e);
                self.notify(Notification::Error(format!("Could not block card: {}", e)));
                Err(e)
            }
        }
    }

    /// Reveal a card PIN after re-entering the access code.
    pub async fn reveal_pin(&self, card_id: &str, access_code: &str) -> BankingResult<String> {
        match self.api.reveal_pin(&self.user.id, card_id, access_code).await {
            Ok(pin) => Ok(pin),
            Err(e) => {
                self.notify(Notification::Error(format!("Could not reveal PIN: {}", e)));
                Err(e)
            }
        }
    }

    /// Stop polling, forget the identity and drop cached data.
    pub async fn logout(self) -> BankingResult<()> {
        self.token.cancel();
        self.cache.write().await.clear();
        self.session.clear().await?;
        info!(user_id = %self.user.id, "Logged out");
        Ok(())
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
