pub mod account_service;
pub mod card_service;
pub mod user_service;

pub use account_service::AccountService;
pub use card_service::CardService;
pub use user_service::UserService;

use crate::domain::User;

/// Ownership predicate supplied by the caller; receives the resource owner's id.
pub type Authorize<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// The caller owns the resource or is an advisor.
pub fn owner_or_advisor(caller: &User) -> impl Fn(&str) -> bool + Send + Sync + '_ {
    move |owner_id: &str| caller.id == owner_id || caller.is_advisor()
}

/// Only the resource owner.
pub fn owner_only(caller: &User) -> impl Fn(&str) -> bool + Send + Sync + '_ {
    move |owner_id: &str| caller.id == owner_id
}
