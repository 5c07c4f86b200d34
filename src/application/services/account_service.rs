use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::services::Authorize;
use crate::domain::iban::resolve_iban;
use crate::domain::{
    accepted_name, Account, AccountType, BankingError, BankingResult, ChangeEvent, IbanMode,
    ResolvedIban, Rib,
};
use crate::infrastructure::notifier::ChangeNotifier;
use crate::infrastructure::repository::{AccountRepositoryTrait, RibRepositoryTrait};

/// Account registry: balances, display names and IBAN resolution.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepositoryTrait + 'static>,
    ribs: Arc<dyn RibRepositoryTrait + 'static>,
    notifier: Arc<ChangeNotifier>,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepositoryTrait + 'static>,
        ribs: Arc<dyn RibRepositoryTrait + 'static>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            accounts,
            ribs,
            notifier,
        }
    }

    /// Open an account. A blank name falls back to the type's default label.
    pub async fn open(
        &self,
        owner_id: &str,
        account_type: AccountType,
        name: Option<&str>,
        balance: Decimal,
    ) -> BankingResult<Account> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| account_type.default_name());
        let account = Account::new(
            Uuid::new_v4().to_string(),
            owner_id,
            account_type,
            name,
            balance,
        );
        self.insert(account).await
    }

    /// Store a fully-formed account record (used when the id is known ahead of time).
    pub async fn insert(&self, account: Account) -> BankingResult<Account> {
        let account = self.accounts.create(account).await?;
        info!(account_id = %account.id, owner_id = %account.owner_id, "Account opened");
        self.notifier.publish(ChangeEvent::AccountOpened {
            account_id: account.id.clone(),
            owner_id: account.owner_id.clone(),
        });
        Ok(account)
    }

    pub async fn get(&self, account_id: &str) -> BankingResult<Account> {
        self.accounts
            .get_by_id(account_id)
            .await?
            .map(|record| record.value)
            .ok_or_else(|| BankingError::not_found(format!("account {}", account_id)))
    }

    pub async fn list(&self, owner_id: &str) -> BankingResult<Vec<Account>> {
        self.accounts.list_by_owner(owner_id).await
    }

    /// Authoritative balance, unformatted.
    pub async fn get_balance(&self, account_id: &str) -> BankingResult<Decimal> {
        Ok(self.get(account_id).await?.balance)
    }

    /// Rename an account.
    ///
    /// The input is trimmed; an empty or unchanged value returns the current
    /// record without touching the store.
    pub async fn rename(
        &self,
        account_id: &str,
        new_name: &str,
        authorize: Authorize<'_>,
    ) -> BankingResult<Account> {
        let current = self.get(account_id).await?;
        // owner_id is never mutated, so checking it on a read is sound.
        if !authorize(&current.owner_id) {
            warn!(account_id, "Rename rejected for non-owner");
            return Err(BankingError::conflict(format!(
                "account {} is not accessible to the caller",
                account_id
            )));
        }

        if accepted_name(&current.name, new_name).is_none() {
            debug!(account_id, "Rename ignored: empty or unchanged name");
            return Ok(current);
        }

        let requested = new_name.to_string();
        let outcome = self
            .accounts
            .mutate(
                account_id,
                Box::new(move |account: &mut Account| Ok(account.rename(&requested))),
            )
            .await?;

        let account = outcome.record.value;
        if outcome.changed {
            info!(account_id, revision = outcome.record.revision, "Account renamed");
            self.notifier.publish(ChangeEvent::AccountRenamed {
                account_id: account.id.clone(),
                owner_id: account.owner_id.clone(),
                name: account.name.clone(),
            });
        }
        Ok(account)
    }

    /// Resolve the IBAN to display: the account's own value, then the
    /// owner's RIB, then a deterministic fallback in the requested mode.
    pub async fn derive_iban(
        &self,
        account_id: &str,
        mode: IbanMode,
    ) -> BankingResult<ResolvedIban> {
        let account = self.get(account_id).await?;
        let rib = self.ribs.get(&account.owner_id).await?;
        Ok(resolve_iban(&account, rib.as_ref(), mode))
    }

    /// The user's RIB record; users without one get an empty record.
    pub async fn get_rib(&self, user_id: &str) -> BankingResult<Rib> {
        Ok(self.ribs.get(user_id).await?.unwrap_or_default())
    }

    pub async fn set_rib(&self, user_id: &str, rib: Rib) -> BankingResult<()> {
        self.ribs.put(user_id, rib).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::iban::validate_iban;
    use crate::domain::IbanSource;
    use crate::infrastructure::repository::{InMemoryAccountRepository, InMemoryRibRepository};
    use rust_decimal_macros::dec;

    fn service() -> AccountService {
        AccountService::new(
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(InMemoryRibRepository::new()),
            Arc::new(ChangeNotifier::new()),
        )
    }

    async fn seed_a1(service: &AccountService) {
        service
            .insert(Account::new(
                "a1",
                "u1",
                AccountType::Checking,
                "Compte Courant",
                dec!(1520.35),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rename_trims_and_ignores_empty() {
        let service = service();
        seed_a1(&service).await;
        let anyone = |_: &str| true;

        let unchanged = service.rename("a1", "", &anyone).await.unwrap();
        assert_eq!(unchanged.name, "Compte Courant");
        let unchanged = service.rename("a1", "   ", &anyone).await.unwrap();
        assert_eq!(unchanged.name, "Compte Courant");

        let renamed = service.rename("a1", " Vacances ", &anyone).await.unwrap();
        assert_eq!(renamed.name, "Vacances");
        assert_eq!(service.get("a1").await.unwrap().name, "Vacances");
    }

    #[tokio::test]
    async fn test_rename_publishes_only_on_change() {
        let service = service();
        seed_a1(&service).await;
        let mut events = service.notifier.subscribe();
        let anyone = |_: &str| true;

        service.rename("a1", "Compte Courant", &anyone).await.unwrap();
        service.rename("a1", "Vacances", &anyone).await.unwrap();

        let envelope = events.recv().await.unwrap();
        assert_eq!(
            envelope.event,
            ChangeEvent::AccountRenamed {
                account_id: "a1".to_string(),
                owner_id: "u1".to_string(),
                name: "Vacances".to_string(),
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rename_rejects_foreign_caller() {
        let service = service();
        seed_a1(&service).await;
        let only_u2 = |owner: &str| owner == "u2";

        let err = service.rename("a1", "Mine", &only_u2).await.unwrap_err();
        assert!(matches!(err, BankingError::Conflict(_)));
        assert_eq!(service.get("a1").await.unwrap().name, "Compte Courant");
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let service = service();
        let anyone = |_: &str| true;
        assert!(matches!(
            service.rename("nope", "x", &anyone).await.unwrap_err(),
            BankingError::NotFound(_)
        ));
        assert!(matches!(
            service.get_balance("nope").await.unwrap_err(),
            BankingError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_open_uses_default_name() {
        let service = service();
        let account = service
            .open("u1", AccountType::Savings, Some("  "), Decimal::ZERO)
            .await
            .unwrap();
        assert_eq!(account.name, "Livret d'Epargne");
        assert_eq!(service.list("u1").await.unwrap().len(), 1);
        assert_eq!(service.get_balance(&account.id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_iban_prefers_rib_then_falls_back() {
        let service = service();
        seed_a1(&service).await;

        let cosmetic = service.derive_iban("a1", IbanMode::Cosmetic).await.unwrap();
        assert_eq!(cosmetic.source, IbanSource::CosmeticFallback);
        assert!(!cosmetic.is_conformant());
        assert_eq!(
            cosmetic,
            service.derive_iban("a1", IbanMode::Cosmetic).await.unwrap()
        );

        let conformant = service.derive_iban("a1", IbanMode::Conformant).await.unwrap();
        assert!(validate_iban(&conformant.iban));

        let rib_iban = "FR1420041010050500013M02606".to_string();
        service
            .set_rib("u1", Rib { iban: Some(rib_iban.clone()) })
            .await
            .unwrap();
        let resolved = service.derive_iban("a1", IbanMode::Cosmetic).await.unwrap();
        assert_eq!(resolved.iban, rib_iban);
        assert_eq!(resolved.source, IbanSource::Rib);
    }
}
