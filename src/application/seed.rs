use chrono::Utc;
use rust_decimal_macros::dec;
use tracing::info;

use crate::application::services::{AccountService, CardService, UserService};
use crate::domain::{Account, AccountType, BankingResult, Card, UserRole};

pub const DEMO_ADVISOR_ID: &str = "adv1";
pub const DEMO_CLIENT_ID: &str = "u1";
pub const DEMO_PENDING_CLIENT_ID: &str = "u2";

/// Load a small demo dataset: one advisor, one approved client with two
/// accounts and a card, and one client still awaiting approval.
///
/// Demo access codes: advisor `1357`, approved client `2468`, pending client `1234`.
pub async fn seed_demo_data(
    users: &UserService,
    accounts: &AccountService,
    cards: &CardService,
) -> BankingResult<()> {
    users
        .create_user(
            DEMO_ADVISOR_ID,
            UserRole::Advisor,
            "Claire Dubois",
            "conseiller@banque.example",
            "1357",
        )
        .await?;

    users
        .create_user(
            DEMO_CLIENT_ID,
            UserRole::Client,
            "Alice Martin",
            "alice@example.com",
            "2468",
        )
        .await?;
    users.latch_approval(DEMO_CLIENT_ID).await?;

    accounts
        .insert(Account::new(
            "a1",
            DEMO_CLIENT_ID,
            AccountType::Checking,
            "Compte Courant",
            dec!(1520.35),
        ))
        .await?;
    let mut savings = Account::new(
        "a2",
        DEMO_CLIENT_ID,
        AccountType::Savings,
        "Livret A",
        dec!(8200.00),
    );
    savings.iban = Some("FR1420041010050500013M02606".to_string());
    accounts.insert(savings).await?;

    let card = Card::generate(
        &mut rand::thread_rng(),
        "c1",
        DEMO_CLIENT_ID,
        "Alice Martin",
        Utc::now().date_naive(),
    );
    cards.insert(card).await?;

    users
        .create_user(
            DEMO_PENDING_CLIENT_ID,
            UserRole::Client,
            "Bruno Petit",
            "bruno@example.com",
            "1234",
        )
        .await?;

    info!("Demo data loaded: advisor adv1, approved client u1, pending client u2");
    Ok(())
}
