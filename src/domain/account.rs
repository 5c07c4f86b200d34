use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AccountType {
    Checking,
    Savings,
    TermDeposit,
}

impl AccountType {
    /// Display name given to accounts opened without an explicit name.
    pub fn default_name(&self) -> &'static str {
        match self {
            AccountType::Checking => "Compte Courant",
            AccountType::Savings => "Livret d'Epargne",
            AccountType::TermDeposit => "Compte a Terme",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub owner_id: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        account_type: AccountType,
        name: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            account_type,
            name: name.into(),
            balance,
            iban: None,
        }
    }

    /// Applies a rename request.
    ///
    /// The input is trimmed first. An empty or unchanged name leaves the
    /// account untouched and returns `false`; clearing the field is how the
    /// dashboard cancels an edit, so it is not a validation failure.
    pub fn rename(&mut self, requested: &str) -> bool {
        match accepted_name(&self.name, requested) {
            Some(name) => {
                self.name = name;
                true
            }
            None => false,
        }
    }
}

/// Returns the trimmed name if it would actually change `current`.
pub fn accepted_name(current: &str, requested: &str) -> Option<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() || trimmed == current {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn compte_courant() -> Account {
        Account::new("a1", "u1", AccountType::Checking, "Compte Courant", dec!(1520.35))
    }

    #[test]
    fn test_rename_empty_is_noop() {
        let mut account = compte_courant();
        assert!(!account.rename(""));
        assert!(!account.rename("   "));
        assert_eq!(account.name, "Compte Courant");
    }

    #[test]
    fn test_rename_trims() {
        let mut account = compte_courant();
        assert!(account.rename(" Vacances "));
        assert_eq!(account.name, "Vacances");
    }

    #[test]
    fn test_rename_same_name_is_noop() {
        let mut account = compte_courant();
        assert!(!account.rename("  Compte Courant "));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(compte_courant()).unwrap();
        assert_eq!(json["type"], "checking");
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["balance"], 1520.35);
        assert!(json.get("iban").is_none());

        let back: Account = serde_json::from_value(json).unwrap();
        assert_eq!(back.balance, dec!(1520.35));
    }

    #[test]
    fn test_term_deposit_type_name() {
        assert_eq!(AccountType::TermDeposit.to_string(), "termDeposit");
        assert_eq!(
            "termDeposit".parse::<AccountType>().unwrap(),
            AccountType::TermDeposit
        );
    }
}
