use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::services::Authorize;
use crate::domain::{BankingError, BankingResult, Card, ChangeEvent};
use crate::infrastructure::credentials::verify_access_code;
use crate::infrastructure::notifier::ChangeNotifier;
use crate::infrastructure::repository::CardRepositoryTrait;
use crate::infrastructure::user_repository::UserRepositoryTrait;

/// Card registry. Blocking is a one-way latch; there is no unblock path.
#[derive(Clone)]
pub struct CardService {
    cards: Arc<dyn CardRepositoryTrait + 'static>,
    users: Arc<dyn UserRepositoryTrait + 'static>,
    notifier: Arc<ChangeNotifier>,
}

impl CardService {
    pub fn new(
        cards: Arc<dyn CardRepositoryTrait + 'static>,
        users: Arc<dyn UserRepositoryTrait + 'static>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            cards,
            users,
            notifier,
        }
    }

    /// Issue a new virtual card valid for three years.
    pub async fn issue(&self, owner_id: &str, holder_name: &str) -> BankingResult<Card> {
        self.issue_with_id(&Uuid::new_v4().to_string(), owner_id, holder_name).await
    }

    /// Issue a card under a caller-chosen id. A taken id fails `Conflict`.
    pub async fn issue_with_id(
        &self,
        card_id: &str,
        owner_id: &str,
        holder_name: &str,
    ) -> BankingResult<Card> {
        let card = Card::generate(
            &mut rand::thread_rng(),
            card_id,
            owner_id,
            holder_name,
            Utc::now().date_naive(),
        );
        self.insert(card).await
    }

    pub async fn insert(&self, card: Card) -> BankingResult<Card> {
        let card = self.cards.create(card).await?;
        info!(
            card_id = %card.id,
            owner_id = %card.owner_id,
            number = %card.masked_number(),
            "Card issued"
        );
        self.notifier.publish(ChangeEvent::CardIssued {
            card_id: card.id.clone(),
            owner_id: card.owner_id.clone(),
        });
        Ok(card)
    }

    pub async fn get(&self, card_id: &str) -> BankingResult<Card> {
        self.cards
            .get_by_id(card_id)
            .await?
            .map(|record| record.value)
            .ok_or_else(|| BankingError::not_found(format!("card {}", card_id)))
    }

    /// All cards of a user; an empty list is a valid answer.
    pub async fn list(&self, owner_id: &str) -> BankingResult<Vec<Card>> {
        self.cards.list_by_owner(owner_id).await
    }

    async fn authorized(&self, card_id: &str, authorize: Authorize<'_>) -> BankingResult<Card> {
        let card = self.get(card_id).await?;
        if !authorize(&card.owner_id) {
            warn!(card_id, "Card access rejected for non-owner");
            return Err(BankingError::conflict(format!(
                "card {} is not accessible to the caller",
                card_id
            )));
        }
        Ok(card)
    }

    /// Block a card. Blocking an already blocked card succeeds unchanged.
    pub async fn block(&self, card_id: &str, authorize: Authorize<'_>) -> BankingResult<Card> {
        self.authorized(card_id, authorize).await?;

        let outcome = self
            .cards
            .mutate(card_id, Box::new(|card: &mut Card| Ok(card.block())))
            .await?;

        let card = outcome.record.value;
        if outcome.changed {
            info!(card_id, number = %card.masked_number(), "Card blocked");
            self.notifier.publish(ChangeEvent::CardBlocked {
                card_id: card.id.clone(),
                owner_id: card.owner_id.clone(),
            });
        }
        Ok(card)
    }

    /// Status endpoint adapter over [`block`](Self::block).
    ///
    /// `false` on an active card is a no-op; `false` on a blocked card is a
    /// conflict because blocks cannot be lifted.
    pub async fn set_status(
        &self,
        card_id: &str,
        is_blocked: bool,
        authorize: Authorize<'_>,
    ) -> BankingResult<Card> {
        if is_blocked {
            return self.block(card_id, authorize).await;
        }
        let card = self.authorized(card_id, authorize).await?;
        if card.is_blocked {
            return Err(BankingError::conflict(format!(
                "card {} is blocked and cannot be reactivated",
                card_id
            )));
        }
        Ok(card)
    }

    /// Reveal the PIN after re-checking the owner's access code.
    pub async fn reveal_pin(
        &self,
        card_id: &str,
        access_code: &str,
        authorize: Authorize<'_>,
    ) -> BankingResult<String> {
        let card = self.authorized(card_id, authorize).await?;
        let owner = self
            .users
            .find_by_id(&card.owner_id)
            .await?
            .ok_or_else(|| BankingError::not_found(format!("user {}", card.owner_id)))?;

        if !verify_access_code(access_code, &owner.access_code_hash) {
            warn!(card_id, "PIN reveal refused: access code mismatch");
            return Err(BankingError::unauthorized("access code does not match"));
        }
        info!(card_id, "PIN revealed");
        Ok(card.pin)
    }
}
