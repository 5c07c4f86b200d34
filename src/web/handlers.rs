use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;

use crate::application::dto::{
    CardStatusRequest, IbanQuery, IbanResponse, LoginRequest, PinResponse, RegisterRequest,
    RenameAccountRequest, RevealPinRequest, USER_ID_HEADER,
};
use crate::application::{owner_only, owner_or_advisor, AccountService, CardService, UserService};
use crate::domain::{Account, BankingError, BankingResult, Card, Rib, User};
use crate::infrastructure::notifier::ChangeNotifier;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub accounts: AccountService,
    pub cards: CardService,
    pub notifier: Arc<ChangeNotifier>,
}

/// `Json` with rejections mapped onto [`BankingError`], so a malformed body
/// gets a 400 with the usual error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(BankingError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(BankingError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(BankingError))]
pub struct QueryParams<T>(pub T);

/// The authenticated caller, resolved from the user id header.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

impl<S> FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BankingError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BankingError::unauthorized("missing caller identity"))?
            .to_string();

        let state = AppState::from_ref(state);
        match state.users.get_user(&user_id).await {
            Ok(user) => Ok(Caller(user)),
            Err(BankingError::NotFound(_)) => {
                debug!(user_id, "Unknown caller identity");
                Err(BankingError::unauthorized("unknown caller identity"))
            }
            Err(e) => Err(e),
        }
    }
}

impl Caller {
    /// Callers may read their own records; advisors may read anyone's.
    fn ensure_can_view(&self, user_id: &str) -> BankingResult<()> {
        if self.0.id == user_id || self.0.is_advisor() {
            Ok(())
        } else {
            Err(BankingError::unauthorized("not allowed to view this user"))
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> BankingResult<Json<User>> {
    Ok(Json(state.users.register(&payload).await?))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> BankingResult<Json<User>> {
    Ok(Json(
        state
            .users
            .login(&payload.email, &payload.access_code)
            .await?,
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<String>,
) -> BankingResult<Json<User>> {
    caller.ensure_can_view(&id)?;
    Ok(Json(state.users.get_user(&id).await?))
}

pub async fn get_user_rib(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(user_id): PathParam<String>,
) -> BankingResult<Json<Rib>> {
    caller.ensure_can_view(&user_id)?;
    Ok(Json(state.accounts.get_rib(&user_id).await?))
}

pub async fn list_pending_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> BankingResult<Json<Vec<User>>> {
    Ok(Json(state.users.list_pending(&caller.id).await?))
}

pub async fn approve_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<String>,
) -> BankingResult<Json<User>> {
    Ok(Json(state.users.approve(&caller.id, &id).await?))
}

pub async fn list_user_accounts(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(user_id): PathParam<String>,
) -> BankingResult<Json<Vec<Account>>> {
    caller.ensure_can_view(&user_id)?;
    Ok(Json(state.accounts.list(&user_id).await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<String>,
) -> BankingResult<Json<Account>> {
    let account = state.accounts.get(&id).await?;
    caller.ensure_can_view(&account.owner_id)?;
    Ok(Json(account))
}

pub async fn rename_account(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<RenameAccountRequest>,
) -> BankingResult<Json<Account>> {
    let authorize = owner_or_advisor(&caller);
    Ok(Json(
        state.accounts.rename(&id, &payload.name, &authorize).await?,
    ))
}

pub async fn get_account_iban(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(id): PathParam<String>,
    QueryParams(query): QueryParams<IbanQuery>,
) -> BankingResult<Json<IbanResponse>> {
    let account = state.accounts.get(&id).await?;
    caller.ensure_can_view(&account.owner_id)?;
    let resolved = state
        .accounts
        .derive_iban(&id, query.mode.unwrap_or_default())
        .await?;
    Ok(Json(IbanResponse {
        conformant: resolved.is_conformant(),
        iban: resolved.iban,
        source: resolved.source,
    }))
}

pub async fn list_user_cards(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(user_id): PathParam<String>,
) -> BankingResult<Json<Vec<Card>>> {
    caller.ensure_can_view(&user_id)?;
    Ok(Json(state.cards.list(&user_id).await?))
}

pub async fn set_card_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<CardStatusRequest>,
) -> BankingResult<Json<Card>> {
    let authorize = owner_or_advisor(&caller);
    Ok(Json(
        state
            .cards
            .set_status(&id, payload.is_blocked, &authorize)
            .await?,
    ))
}

pub async fn reveal_card_pin(
    State(state): State<AppState>,
    Caller(caller): Caller,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<RevealPinRequest>,
) -> BankingResult<Json<PinResponse>> {
    let authorize = owner_only(&caller);
    let pin = state
        .cards
        .reveal_pin(&id, &payload.access_code, &authorize)
        .await?;
    Ok(Json(PinResponse { pin }))
}
