use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Client,
    Advisor,
}

/// Dashboard gate state derived from the approval latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    Pending,
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: UserRole,
    pub is_approved: bool,
    pub name: String,
    pub email: String,
}

impl User {
    /// A freshly registered user always starts unapproved.
    pub fn new(
        id: impl Into<String>,
        role: UserRole,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            is_approved: false,
            name: name.into(),
            email: normalize_email(&email.into()),
        }
    }

    pub fn is_client(&self) -> bool {
        self.role == UserRole::Client
    }

    pub fn is_advisor(&self) -> bool {
        self.role == UserRole::Advisor
    }

    pub fn approval_state(&self) -> ApprovalState {
        if self.is_approved {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }

    /// Latch the approval flag. Returns `true` if the flag flipped.
    pub fn approve(&mut self) -> bool {
        if self.is_approved {
            return false;
        }
        self.is_approved = true;
        true
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
