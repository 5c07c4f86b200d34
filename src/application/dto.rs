use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{IbanMode, IbanSource, UserRole};

/// Header carrying the caller's user id. The transport that authenticates
/// it is outside this service.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 4, max = 64))]
    pub access_code: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameAccountRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStatusRequest {
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealPinRequest {
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinResponse {
    pub pin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbanQuery {
    #[serde(default)]
    pub mode: Option<IbanMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbanResponse {
    pub iban: String,
    pub source: IbanSource,
    pub conformant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
