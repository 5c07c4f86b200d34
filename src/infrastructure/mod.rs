pub mod api_client;
pub mod config;
pub mod credentials;
pub mod identity;
pub mod logging;
pub mod notifier;
pub mod repository;
pub mod shutdown;
pub mod store;
pub mod user_repository;

pub use api_client::{BankingApi, HttpBankingApi};
pub use config::{AppConfig, ClientConfig, SyncConfig};
pub use identity::{FileIdentityStore, IdentityProvider, InMemoryIdentityStore, SessionContext};
pub use logging::{init_logging, LoggingConfig};
pub use notifier::ChangeNotifier;
pub use repository::{
    AccountRepositoryTrait, CardRepositoryTrait, InMemoryAccountRepository,
    InMemoryCardRepository, InMemoryRibRepository, RibRepositoryTrait,
};
pub use store::{Mutation, Versioned, VersionedStore};
pub use user_repository::{InMemoryUserRepository, UserRecord, UserRepositoryTrait};
