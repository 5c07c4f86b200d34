//! Client-side cache reconciled against the server by polling.
//!
//! Consistency is eventual, not linearizable: a value read from the cache
//! may lag the server by up to one poll interval, and an optimistic local
//! write is visible before the server has accepted it. Each [`SyncEntry`]
//! keeps two values apart:
//!
//! * `confirmed`: the last value the server reported (poll or mutation
//!   response);
//! * `pending`: an optimistic value written locally and not yet answered.
//!
//! Polls always refresh `confirmed` but never overwrite `pending`. A failed
//! mutation drops `pending`, so the visible value falls back to whatever the
//! server last confirmed.

use std::collections::BTreeMap;

use crate::domain::iban::resolve_iban;
use crate::domain::{Account, Card, IbanMode, ResolvedIban, Rib, User};

/// Identifies one optimistic write so a late answer cannot resolve a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct SyncEntry<T> {
    confirmed: Option<T>,
    pending: Option<(Ticket, T)>,
    next_ticket: u64,
}

impl<T> Default for SyncEntry<T> {
    fn default() -> Self {
        Self {
            confirmed: None,
            pending: None,
            next_ticket: 0,
        }
    }
}

impl<T: Clone + PartialEq> SyncEntry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirmed(value: T) -> Self {
        Self {
            confirmed: Some(value),
            ..Self::default()
        }
    }

    /// What the user should see: the optimistic value if one is in flight.
    pub fn visible(&self) -> Option<&T> {
        self.pending
            .as_ref()
            .map(|(_, value)| value)
            .or(self.confirmed.as_ref())
    }

    pub fn confirmed(&self) -> Option<&T> {
        self.confirmed.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a polled value. Returns `true` if the visible value changed.
    pub fn apply_poll(&mut self, value: T) -> bool {
        if self.confirmed.as_ref() == Some(&value) {
            return false;
        }
        self.confirmed = Some(value);
        self.pending.is_none()
    }

    /// Start an optimistic write. A newer write supersedes an older one.
    pub fn begin(&mut self, value: T) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending = Some((ticket, value));
        ticket
    }

    /// The server accepted the write identified by `ticket`.
    ///
    /// The server's answer becomes the confirmed value. If a newer write is
    /// still in flight it stays visible.
    pub fn confirm(&mut self, ticket: Ticket, server_value: T) {
        self.confirmed = Some(server_value);
        if matches!(self.pending, Some((current, _)) if current == ticket) {
            self.pending = None;
        }
    }

    /// The write identified by `ticket` failed. Returns `true` if the visible
    /// value reverted to the confirmed one.
    pub fn rollback(&mut self, ticket: Ticket) -> bool {
        if matches!(self.pending, Some((current, _)) if current == ticket) {
            self.pending = None;
            return true;
        }
        false
    }
}

/// Everything the dashboard shows, keyed by resource id.
#[derive(Debug, Default)]
pub struct LocalCache {
    user: SyncEntry<User>,
    rib: SyncEntry<Rib>,
    accounts: BTreeMap<String, SyncEntry<Account>>,
    cards: BTreeMap<String, SyncEntry<Card>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<User> {
        self.user.visible().cloned()
    }

    pub fn apply_user(&mut self, user: User) -> bool {
        self.user.apply_poll(user)
    }

    pub fn apply_rib(&mut self, rib: Rib) -> bool {
        self.rib.apply_poll(rib)
    }

    /// Merge a polled account list. Accounts missing from the server answer
    /// are dropped unless a local write on them is still in flight.
    pub fn apply_accounts(&mut self, accounts: Vec<Account>) -> bool {
        let (entries, changed) = merge_keyed(
            std::mem::take(&mut self.accounts),
            accounts,
            |account| account.id.clone(),
        );
        self.accounts = entries;
        changed
    }

    pub fn apply_cards(&mut self, cards: Vec<Card>) -> bool {
        let (entries, changed) =
            merge_keyed(std::mem::take(&mut self.cards), cards, |card| card.id.clone());
        self.cards = entries;
        changed
    }

    /// Visible accounts ordered by id.
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts
            .values()
            .filter_map(|entry| entry.visible().cloned())
            .collect()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards
            .values()
            .filter_map(|entry| entry.visible().cloned())
            .collect()
    }

    pub fn account(&self, account_id: &str) -> Option<Account> {
        self.accounts
            .get(account_id)
            .and_then(|entry| entry.visible().cloned())
    }

    pub fn card(&self, card_id: &str) -> Option<Card> {
        self.cards
            .get(card_id)
            .and_then(|entry| entry.visible().cloned())
    }

    pub fn account_entry_mut(&mut self, account_id: &str) -> Option<&mut SyncEntry<Account>> {
        self.accounts.get_mut(account_id)
    }

    pub fn card_entry_mut(&mut self, card_id: &str) -> Option<&mut SyncEntry<Card>> {
        self.cards.get_mut(card_id)
    }

    /// IBAN shown for an account, resolved against the cached RIB.
    pub fn iban(&self, account_id: &str, mode: IbanMode) -> Option<ResolvedIban> {
        let account = self.account(account_id)?;
        Some(resolve_iban(&account, self.rib.visible(), mode))
    }

    /// IBANs of every visible account, keyed by account id.
    pub fn ibans(&self, mode: IbanMode) -> BTreeMap<String, ResolvedIban> {
        self.accounts()
            .into_iter()
            .map(|account| {
                let resolved = resolve_iban(&account, self.rib.visible(), mode);
                (account.id, resolved)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn merge_keyed<T, K>(
    mut entries: BTreeMap<String, SyncEntry<T>>,
    polled: Vec<T>,
    key: K,
) -> (BTreeMap<String, SyncEntry<T>>, bool)
where
    T: Clone + PartialEq,
    K: Fn(&T) -> String,
{
    let mut changed = false;
    let mut merged = BTreeMap::new();

    for value in polled {
        let id = key(&value);
        let mut entry = entries.remove(&id).unwrap_or_default();
        changed |= entry.apply_poll(value);
        merged.insert(id, entry);
    }

    // Whatever is left was not in the server answer.
    for (id, entry) in entries {
        if entry.is_pending() {
            merged.insert(id, entry);
        } else {
            changed = true;
        }
    }

    (merged, changed)
}
