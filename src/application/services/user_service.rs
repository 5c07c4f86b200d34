use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::RegisterRequest;
use crate::application::services::{AccountService, CardService};
use crate::domain::{Account, AccountType, BankingError, BankingResult, ChangeEvent, User, UserRole};
use crate::infrastructure::credentials::{hash_access_code, verify_access_code};
use crate::infrastructure::notifier::ChangeNotifier;
use crate::infrastructure::user_repository::{UserRecord, UserRepositoryTrait};

/// Registration, login and the server half of the approval state machine.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepositoryTrait + 'static>,
    accounts: AccountService,
    cards: CardService,
    notifier: Arc<ChangeNotifier>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepositoryTrait + 'static>,
        accounts: AccountService,
        cards: CardService,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            users,
            accounts,
            cards,
            notifier,
        }
    }

    /// Register a client in the `Pending` state.
    ///
    /// Self-service registration never creates advisors; those come from
    /// [`UserService::create_user`].
    pub async fn register(&self, request: &RegisterRequest) -> BankingResult<User> {
        request
            .validate()
            .map_err(|e| BankingError::validation(e.to_string()))?;
        if request.role == Some(UserRole::Advisor) {
            warn!(email = %request.email, "Advisor self-registration refused");
            return Err(BankingError::validation("advisor accounts cannot be self-registered"));
        }
        self.create_user(
            &Uuid::new_v4().to_string(),
            UserRole::Client,
            request.name.trim(),
            &request.email,
            &request.access_code,
        )
        .await
    }

    /// Insert a user with a known id.
    pub async fn create_user(
        &self,
        id: &str,
        role: UserRole,
        name: &str,
        email: &str,
        access_code: &str,
    ) -> BankingResult<User> {
        let record = UserRecord {
            user: User::new(id, role, name, email),
            access_code_hash: hash_access_code(access_code)?,
        };
        let user = self.users.create(record).await?;
        info!(user_id = %user.id, role = %user.role, "User registered");
        self.notifier.publish(ChangeEvent::UserRegistered {
            user_id: user.id.clone(),
        });
        Ok(user)
    }

    pub async fn login(&self, email: &str, access_code: &str) -> BankingResult<User> {
        let record = self.users.find_by_email(email).await?;
        match record {
            Some(record) if verify_access_code(access_code, &record.access_code_hash) => {
                info!(user_id = %record.user.id, "User logged in");
                Ok(record.user)
            }
            _ => {
                warn!("Login rejected");
                Err(BankingError::unauthorized("invalid email or access code"))
            }
        }
    }

    pub async fn get_user(&self, user_id: &str) -> BankingResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|record| record.user)
            .ok_or_else(|| BankingError::not_found(format!("user {}", user_id)))
    }

    async fn require_advisor(&self, caller_id: &str) -> BankingResult<User> {
        match self.users.find_by_id(caller_id).await? {
            Some(record) if record.user.is_advisor() => Ok(record.user),
            _ => Err(BankingError::unauthorized("advisor role required")),
        }
    }

    pub async fn list_pending(&self, caller_id: &str) -> BankingResult<Vec<User>> {
        self.require_advisor(caller_id).await?;
        self.users.list_pending().await
    }

    /// Latch a user's approval flag.
    ///
    /// Approving an already approved user returns it unchanged. A pending
    /// client gets a checking account and a virtual card before the flag
    /// flips, so a failed provisioning step leaves the user pending and the
    /// approval can be retried.
    pub async fn approve(&self, advisor_id: &str, user_id: &str) -> BankingResult<User> {
        let advisor = self.require_advisor(advisor_id).await?;

        let user = self.get_user(user_id).await?;
        if user.is_approved {
            return Ok(user);
        }
        if user.is_client() {
            self.provision(&user).await?;
        }

        let (user, changed) = self.latch_approval(user_id).await?;
        if changed {
            info!(user_id = %user.id, advisor_id = %advisor.id, "User approved");
            self.notifier.publish(ChangeEvent::UserApproved {
                user_id: user.id.clone(),
            });
        }
        Ok(user)
    }

    /// Open the starter account and card. Ids derive from the user id, so a
    /// retried or concurrent approval finds them taken instead of opening
    /// a second pair.
    async fn provision(&self, user: &User) -> BankingResult<()> {
        let account = Account::new(
            format!("{}-checking", user.id),
            &user.id,
            AccountType::Checking,
            AccountType::Checking.default_name(),
            Decimal::ZERO,
        );
        match self.accounts.insert(account).await {
            Ok(_) | Err(BankingError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }

        let card_id = format!("{}-card", user.id);
        match self.cards.issue_with_id(&card_id, &user.id, &user.name).await {
            Ok(_) | Err(BankingError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Flip the approval flag without provisioning. Returns whether it flipped.
    pub(crate) async fn latch_approval(&self, user_id: &str) -> BankingResult<(User, bool)> {
        let outcome = self
            .users
            .mutate(
                user_id,
                Box::new(|record: &mut UserRecord| Ok(record.user.approve())),
            )
            .await?;
        Ok((outcome.record.value.user, outcome.changed))
    }
}
