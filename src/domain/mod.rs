pub mod account;
pub mod card;
pub mod errors;
pub mod events;
pub mod iban;
pub mod user;

pub use account::*;
pub use card::*;
pub use errors::*;
pub use events::*;
pub use iban::{IbanMode, IbanSource, ResolvedIban, Rib};
pub use user::*;
