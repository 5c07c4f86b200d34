//! HTTP client for the dashboard API.
//!
//! [`BankingApi`] is the seam the sync layer polls and mutates through;
//! [`HttpBankingApi`] is the reqwest implementation. Every failure is mapped
//! onto [`BankingError`] so callers can tell retryable transport problems
//! (`Transient`) from definitive answers (`NotFound`, `Conflict`, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::dto::{
    CardStatusRequest, ErrorResponse, LoginRequest, PinResponse, RegisterRequest,
    RenameAccountRequest, RevealPinRequest, USER_ID_HEADER,
};
use crate::domain::{Account, BankingError, BankingResult, Card, Rib, User};

#[async_trait]
pub trait BankingApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> BankingResult<User>;
    async fn login(&self, email: &str, access_code: &str) -> BankingResult<User>;
    async fn get_user(&self, caller: &str, user_id: &str) -> BankingResult<User>;
    async fn get_rib(&self, caller: &str, user_id: &str) -> BankingResult<Rib>;
    async fn list_accounts(&self, caller: &str, owner_id: &str) -> BankingResult<Vec<Account>>;
    async fn rename_account(
        &self,
        caller: &str,
        account_id: &str,
        name: &str,
    ) -> BankingResult<Account>;
    async fn list_cards(&self, caller: &str, owner_id: &str) -> BankingResult<Vec<Card>>;
    async fn set_card_status(
        &self,
        caller: &str,
        card_id: &str,
        is_blocked: bool,
    ) -> BankingResult<Card>;
    async fn reveal_pin(
        &self,
        caller: &str,
        card_id: &str,
        access_code: &str,
    ) -> BankingResult<String>;
    async fn list_pending_users(&self, caller: &str) -> BankingResult<Vec<User>>;
    async fn approve_user(&self, caller: &str, user_id: &str) -> BankingResult<User>;
}

#[derive(Clone)]
pub struct HttpBankingApi {
    client: Client,
    base_url: String,
}

impl HttpBankingApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BankingResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BankingError::validation(format!("invalid HTTP client settings: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn as_caller(&self, request: RequestBuilder, caller: &str) -> RequestBuilder {
        request.header(USER_ID_HEADER, caller)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BankingResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| BankingError::transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| BankingError::transient(format!("invalid response body: {}", e)));
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        debug!(status = status.as_u16(), "API call rejected: {}", message);
        Err(error_for_status(status, message))
    }
}

/// Map an HTTP status onto the error taxonomy.
pub fn error_for_status(status: StatusCode, message: String) -> BankingError {
    match status.as_u16() {
        400 | 422 => BankingError::Validation(message),
        401 | 403 => BankingError::Unauthorized(message),
        404 => BankingError::NotFound(message),
        409 => BankingError::Conflict(message),
        _ => BankingError::Transient(message),
    }
}

#[async_trait]
impl BankingApi for HttpBankingApi {
    async fn register(&self, request: &RegisterRequest) -> BankingResult<User> {
        self.send(self.client.post(self.url("/api/register")).json(request))
            .await
    }

    async fn login(&self, email: &str, access_code: &str) -> BankingResult<User> {
        let body = LoginRequest {
            email: email.to_string(),
            access_code: access_code.to_string(),
        };
        self.send(self.client.post(self.url("/api/login")).json(&body))
            .await
    }

    async fn get_user(&self, caller: &str, user_id: &str) -> BankingResult<User> {
        let request = self.client.get(self.url(&format!("/api/user/{}", user_id)));
        self.send(self.as_caller(request, caller)).await
    }

    async fn get_rib(&self, caller: &str, user_id: &str) -> BankingResult<Rib> {
        let request = self
            .client
            .get(self.url(&format!("/api/user-rib/{}", user_id)));
        self.send(self.as_caller(request, caller)).await
    }

    async fn list_accounts(&self, caller: &str, owner_id: &str) -> BankingResult<Vec<Account>> {
        let request = self
            .client
            .get(self.url(&format!("/api/accounts/user/{}", owner_id)));
        self.send(self.as_caller(request, caller)).await
    }

    async fn rename_account(
        &self,
        caller: &str,
        account_id: &str,
        name: &str,
    ) -> BankingResult<Account> {
        let body = RenameAccountRequest {
            name: name.to_string(),
        };
        let request = self
            .client
            .put(self.url(&format!("/api/accounts/{}/name", account_id)))
            .json(&body);
        self.send(self.as_caller(request, caller)).await
    }

    async fn list_cards(&self, caller: &str, owner_id: &str) -> BankingResult<Vec<Card>> {
        let request = self
            .client
            .get(self.url(&format!("/api/cards/user/{}", owner_id)));
        self.send(self.as_caller(request, caller)).await
    }

    async fn set_card_status(
        &self,
        caller: &str,
        card_id: &str,
        is_blocked: bool,
    ) -> BankingResult<Card> {
        let request = self
            .client
            .patch(self.url(&format!("/api/cards/{}/status", card_id)))
            .json(&CardStatusRequest { is_blocked });
        self.send(self.as_caller(request, caller)).await
    }

    async fn reveal_pin(
        &self,
        caller: &str,
        card_id: &str,
        access_code: &str,
    ) -> BankingResult<String> {
        let body = RevealPinRequest {
            access_code: access_code.to_string(),
        };
        let request = self
            .client
            .post(self.url(&format!("/api/cards/{}/pin", card_id)))
            .json(&body);
        let response: PinResponse = self.send(self.as_caller(request, caller)).await?;
        Ok(response.pin)
    }

    async fn list_pending_users(&self, caller: &str) -> BankingResult<Vec<User>> {
        let request = self.client.get(self.url("/api/users/pending"));
        self.send(self.as_caller(request, caller)).await
    }

    async fn approve_user(&self, caller: &str, user_id: &str) -> BankingResult<User> {
        let request = self
            .client
            .post(self.url(&format!("/api/user/{}/approve", user_id)));
        self.send(self.as_caller(request, caller)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let msg = || "boom".to_string();
        let status = |code| error_for_status(code, msg());
        assert!(matches!(status(StatusCode::NOT_FOUND), BankingError::NotFound(_)));
        assert!(matches!(status(StatusCode::CONFLICT), BankingError::Conflict(_)));
        assert!(matches!(status(StatusCode::BAD_REQUEST), BankingError::Validation(_)));
        assert!(matches!(status(StatusCode::UNAUTHORIZED), BankingError::Unauthorized(_)));
        assert!(error_for_status(StatusCode::INTERNAL_SERVER_ERROR, msg()).is_transient());
        assert!(error_for_status(StatusCode::BAD_GATEWAY, msg()).is_transient());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let api = HttpBankingApi::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("/api/user/u1"), "http://localhost:8080/api/user/u1");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Port 9 (discard) is almost never listening locally.
        let api = HttpBankingApi::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = api.get_user("u1", "u1").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {:?}", err);
    }
}
