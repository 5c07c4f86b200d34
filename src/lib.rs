pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod sync;
pub mod web;

// Re-export commonly used types
pub use application::{AccountService, CardService, UserService};
pub use domain::{BankingError, BankingResult};
pub use infrastructure::api_client::{BankingApi, HttpBankingApi};
pub use infrastructure::identity::SessionContext;
pub use sync::{ApprovalWatcher, DashboardSession, GateDecision};
pub use web::{create_router, AppState};

use std::sync::Arc;

use infrastructure::{
    ChangeNotifier, InMemoryAccountRepository, InMemoryCardRepository, InMemoryRibRepository,
    InMemoryUserRepository,
};

/// Wire the in-memory repositories, services and notifier together.
pub fn build_state() -> AppState {
    let notifier = Arc::new(ChangeNotifier::new());
    let users = Arc::new(InMemoryUserRepository::new());

    let accounts = AccountService::new(
        Arc::new(InMemoryAccountRepository::new()),
        Arc::new(InMemoryRibRepository::new()),
        notifier.clone(),
    );
    let cards = CardService::new(
        Arc::new(InMemoryCardRepository::new()),
        users.clone(),
        notifier.clone(),
    );
    let user_service = UserService::new(users, accounts.clone(), cards.clone(), notifier.clone());

    AppState {
        users: user_service,
        accounts,
        cards,
        notifier,
    }
}
