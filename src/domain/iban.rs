//! IBAN resolution for dashboard accounts.
//!
//! An IBAN supplied by the bank (on the account itself or through the
//! owner's RIB) always wins. When none is available an IBAN is derived from
//! the account id in one of two modes:
//!
//! - [`IbanMode::Cosmetic`] reproduces the legacy display value: a fixed
//!   prefix, the zero-padded id fragment and fixed suffix digits. Its check
//!   digits are hard-coded and it is **not** a conformant IBAN.
//! - [`IbanMode::Conformant`] uses the same BBAN but computes the ISO 13616
//!   MOD-97 check digits, so the result passes [`validate_iban`].

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::domain::Account;

pub const COUNTRY_CODE: &str = "FR";
/// Hard-coded check digits of the cosmetic fallback.
pub const COSMETIC_CHECK_DIGITS: &str = "76";
pub const BANK_CODE: &str = "30006";
pub const BRANCH_CODE: &str = "00001";
pub const ACCOUNT_FRAGMENT_LEN: usize = 11;
/// Fixed national key appended to the BBAN in both fallback modes.
pub const FALLBACK_SUFFIX: &str = "89";

/// Authoritative bank detail record for a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rib {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IbanMode {
    #[default]
    Cosmetic,
    Conformant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IbanSource {
    Account,
    Rib,
    CosmeticFallback,
    ConformantFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIban {
    pub iban: String,
    pub source: IbanSource,
}

impl ResolvedIban {
    /// Only the cosmetic fallback is known to fail MOD-97 validation.
    pub fn is_conformant(&self) -> bool {
        self.source != IbanSource::CosmeticFallback
    }
}

/// Pick the authoritative IBAN if any, otherwise derive one.
pub fn resolve_iban(account: &Account, rib: Option<&Rib>, mode: IbanMode) -> ResolvedIban {
    if let Some(iban) = non_blank(account.iban.as_deref()) {
        return ResolvedIban {
            iban,
            source: IbanSource::Account,
        };
    }
    if let Some(iban) = non_blank(rib.and_then(|r| r.iban.as_deref())) {
        return ResolvedIban {
            iban,
            source: IbanSource::Rib,
        };
    }
    let source = match mode {
        IbanMode::Cosmetic => IbanSource::CosmeticFallback,
        IbanMode::Conformant => IbanSource::ConformantFallback,
    };
    ResolvedIban {
        iban: derive_iban(&account.id, mode),
        source,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Deterministic fallback IBAN for an account id.
pub fn derive_iban(account_id: &str, mode: IbanMode) -> String {
    let bban = fallback_bban(account_id);
    let check = match mode {
        IbanMode::Cosmetic => COSMETIC_CHECK_DIGITS.to_string(),
        IbanMode::Conformant => check_digits(COUNTRY_CODE, &bban),
    };
    format!("{}{}{}", COUNTRY_CODE, check, bban)
}

fn fallback_bban(account_id: &str) -> String {
    format!(
        "{}{}{}{}",
        BANK_CODE,
        BRANCH_CODE,
        account_fragment(account_id),
        FALLBACK_SUFFIX
    )
}

/// Last alphanumeric characters of the id, uppercased and left-padded with zeros.
pub fn account_fragment(account_id: &str) -> String {
    let alnum: Vec<char> = account_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let start = alnum.len().saturating_sub(ACCOUNT_FRAGMENT_LEN);
    let tail: String = alnum[start..].iter().collect();
    format!("{:0>width$}", tail, width = ACCOUNT_FRAGMENT_LEN)
}

/// ISO 13616 check digits for `country` + `bban`.
pub fn check_digits(country: &str, bban: &str) -> String {
    let rearranged = format!("{}{}00", bban, country);
    let remainder = mod97(&rearranged).unwrap_or(0);
    format!("{:02}", 98 - remainder)
}

/// Remainder of the IBAN numeric expansion (A=10 .. Z=35) modulo 97.
fn mod97(value: &str) -> Option<u32> {
    let mut remainder: u32 = 0;
    for c in value.chars() {
        let n = c.to_digit(36)?;
        remainder = if n >= 10 {
            (remainder * 100 + n) % 97
        } else {
            (remainder * 10 + n) % 97
        };
    }
    Some(remainder)
}

/// Structural and MOD-97 validation. Spaces are ignored.
pub fn validate_iban(iban: &str) -> bool {
    let compact: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if compact.len() < 15 || compact.len() > 34 || !compact.is_ascii() {
        return false;
    }
    let (head, bban) = compact.split_at(4);
    let mut chars = head.chars();
    let country_ok = chars.by_ref().take(2).all(|c| c.is_ascii_alphabetic());
    let check_ok = chars.all(|c| c.is_ascii_digit());
    if !country_ok || !check_ok {
        return false;
    }
    matches!(mod97(&format!("{}{}", bban, head)), Some(1))
}
