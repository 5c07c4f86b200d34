use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification emitted by the registries after a state change.
///
/// The registries only signal; whoever holds a cached view decides how to
/// invalidate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeEvent {
    #[serde(rename_all = "camelCase")]
    UserRegistered { user_id: String },
    #[serde(rename_all = "camelCase")]
    UserApproved { user_id: String },
    #[serde(rename_all = "camelCase")]
    AccountOpened { account_id: String, owner_id: String },
    #[serde(rename_all = "camelCase")]
    AccountRenamed {
        account_id: String,
        owner_id: String,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    CardIssued { card_id: String, owner_id: String },
    #[serde(rename_all = "camelCase")]
    CardBlocked { card_id: String, owner_id: String },
}

impl ChangeEvent {
    pub fn resource_id(&self) -> &str {
        match self {
            ChangeEvent::UserRegistered { user_id } => user_id,
            ChangeEvent::UserApproved { user_id } => user_id,
            ChangeEvent::AccountOpened { account_id, .. } => account_id,
            ChangeEvent::AccountRenamed { account_id, .. } => account_id,
            ChangeEvent::CardIssued { card_id, .. } => card_id,
            ChangeEvent::CardBlocked { card_id, .. } => card_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ChangeEvent::UserRegistered { .. } => "UserRegistered",
            ChangeEvent::UserApproved { .. } => "UserApproved",
            ChangeEvent::AccountOpened { .. } => "AccountOpened",
            ChangeEvent::AccountRenamed { .. } => "AccountRenamed",
            ChangeEvent::CardIssued { .. } => "CardIssued",
            ChangeEvent::CardBlocked { .. } => "CardBlocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
    pub event: ChangeEvent,
}
