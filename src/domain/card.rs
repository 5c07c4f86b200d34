use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Issuer identification prefix used for generated virtual cards.
const CARD_BIN: &str = "497010";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub owner_id: String,
    pub card_number: String,
    pub holder_name: String,
    pub expiry_date: String,
    pub cvv: String,
    /// Never serialized; leaves the server only through PIN reveal.
    #[serde(default, skip_serializing)]
    pub pin: String,
    pub is_blocked: bool,
}

impl Card {
    /// Latch the blocked flag. Returns `true` if the flag flipped.
    pub fn block(&mut self) -> bool {
        if self.is_blocked {
            return false;
        }
        self.is_blocked = true;
        true
    }

    /// Last four digits, for log lines and masked display.
    pub fn masked_number(&self) -> String {
        let len = self.card_number.len();
        let tail = if len >= 4 {
            &self.card_number[len - 4..]
        } else {
            self.card_number.as_str()
        };
        format!("**** **** **** {}", tail)
    }

    /// Generate a fresh virtual card valid for three years from `today`.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        id: impl Into<String>,
        owner_id: impl Into<String>,
        holder_name: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        let mut digits: String = CARD_BIN.to_string();
        while digits.len() < 15 {
            digits.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }
        digits.push(luhn_check_digit(&digits));

        let expiry_year = (today.year() + 3) % 100;
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            card_number: digits,
            holder_name: holder_name.into().trim().to_uppercase(),
            expiry_date: format!("{:02}/{:02}", today.month(), expiry_year),
            cvv: format!("{:03}", rng.gen_range(0..1000)),
            pin: format!("{:04}", rng.gen_range(0..10000)),
            is_blocked: false,
        }
    }
}

/// Luhn check digit for a numeric payload without its final digit.
pub fn luhn_check_digit(payload: &str) -> char {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    char::from(b'0' + ((10 - (sum % 10)) % 10) as u8)
}

pub fn is_luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (payload, check) = number.split_at(number.len() - 1);
    check.starts_with(luhn_check_digit(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_card() -> Card {
        Card {
            id: "c1".to_string(),
            owner_id: "u1".to_string(),
            card_number: "4970101234567890".to_string(),
            holder_name: "ALICE MARTIN".to_string(),
            expiry_date: "09/28".to_string(),
            cvv: "123".to_string(),
            pin: "4821".to_string(),
            is_blocked: false,
        }
    }

    #[test]
    fn test_block_is_a_latch() {
        let mut card = sample_card();
        assert!(card.block());
        assert!(!card.block());
        assert!(card.is_blocked);
    }

    #[test]
    fn test_pin_is_not_serialized() {
        let json = serde_json::to_value(sample_card()).unwrap();
        assert!(json.get("pin").is_none());
        assert_eq!(json["isBlocked"], false);
        assert_eq!(json["cardNumber"], "4970101234567890");
    }

    #[test]
    fn test_generated_card_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let card = Card::generate(&mut rng, "c9", "u1", " alice martin ", today);

        assert_eq!(card.card_number.len(), 16);
        assert!(is_luhn_valid(&card.card_number));
        assert_eq!(card.expiry_date, "03/29");
        assert_eq!(card.cvv.len(), 3);
        assert_eq!(card.pin.len(), 4);
        assert_eq!(card.holder_name, "ALICE MARTIN");
        assert!(!card.is_blocked);
    }

    #[test]
    fn test_luhn_known_number() {
        assert!(is_luhn_valid("4539578763621486"));
        assert!(!is_luhn_valid("4539578763621487"));
        assert!(!is_luhn_valid("abcd"));
    }

    #[test]
    fn test_masked_number() {
        assert_eq!(sample_card().masked_number(), "**** **** **** 7890");
    }
}
