use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::{Identity, Role},
        dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser},
        extractors::AuthUser,
        password::{hash_password, verify_password, verify_unknown_user},
        repo_types::NewUser,
    },
    error::ApiError,
    state::AppState,
};

/// Body rejections from axum's own extractors still answer `{"error":..}`.
fn bad_json(rejection: JsonRejection) -> ApiError {
    warn!(status = %rejection.status(), "login body rejected");
    ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

/// Accounts created by `POST /setup-users`: (username, password, role).
pub const DEMO_ACCOUNTS: [(&str, &str, Role); 2] = [
    ("staff", "staff123", Role::Staff),
    ("student", "student123", Role::Student),
];

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/setup-users", post(setup_users))
        .route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload.map_err(bad_json)?;
    // Exact match: " student " is not "student".
    let username = payload.username.as_str();
    if !is_valid_username(username) {
        warn!("login with malformed username");
        return Err(ApiError::Validation("Invalid username".into()));
    }

    let user = state
        .users
        .find_by_username(username)
        .await
        .map_err(ApiError::internal("Login failed"))?;
    let Some(user) = user else {
        verify_unknown_user(&payload.password);
        warn!(%username, "login unknown username");
        return Err(ApiError::InvalidCredentials);
    };

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(ApiError::internal("Login failed"))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .jwt
        .sign_session(&Identity {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        })
        .map_err(ApiError::internal("Login failed"))?;

    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn setup_users(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    for (username, _, _) in DEMO_ACCOUNTS {
        let existing = state
            .users
            .find_by_username(username)
            .await
            .map_err(ApiError::internal("Error creating users"))?;
        if existing.is_some() {
            warn!(%username, "setup-users called again");
            return Err(ApiError::UsersExist);
        }
    }

    let mut accounts = Vec::with_capacity(DEMO_ACCOUNTS.len());
    for (username, password, role) in DEMO_ACCOUNTS {
        accounts.push(NewUser {
            username: username.to_string(),
            password_hash: hash_password(password).map_err(ApiError::internal("Error creating users"))?,
            role,
        });
    }

    // A concurrent setup can still win the race; the store reports that as None.
    let created = state
        .users
        .insert_all(accounts)
        .await
        .map_err(ApiError::internal("Error creating users"))?
        .ok_or(ApiError::UsersExist)?;

    info!(count = created.len(), "default users created");
    Ok(Json(MessageResponse {
        message: "Default users created successfully",
    }))
}

pub async fn get_me(AuthUser(claims): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&claims))
}
