use axum::{routing::get, Router};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

pub mod credentials;
mod login;
mod logout;
mod signup;
pub mod validate;

pub use validate::SignupError;

use crate::AppState;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Please fill in room number and password")]
    MissingFields,
    #[error("Invalid room number/password")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(login::index))
        .route("/login", get(login::login_page).post(login::login))
        .route("/signup", get(signup::signup_page).post(signup::signup))
        .route("/logout", get(logout::logout))
}

/// True iff an account with exactly this room number and password exists.
pub async fn login(db_pool: &SqlitePool, room_number: &str, password: &str) -> Result<bool, sqlx::Error> {
    credentials::verify(db_pool, room_number, password).await
}

pub async fn authenticate(db_pool: &SqlitePool, room_number: &str, password: &str) -> Result<(), LoginError> {
    if room_number.is_empty() || password.is_empty() {
        return Err(LoginError::MissingFields);
    }

    if !login(db_pool, room_number, password).await? {
        warn!("failed login for room {room_number}");
        return Err(LoginError::InvalidCredentials);
    }

    info!("welcome room {room_number}");
    Ok(())
}

/// Validates the new account and stores it. The receipt number is only checked, never kept.
pub async fn signup(
    db_pool: &SqlitePool,
    room_number: &str,
    password: &str,
    receipt_number: &str,
) -> Result<(), SignupError> {
    let already_registered = credentials::exists(db_pool, room_number).await?;
    validate::validate(room_number, password, receipt_number, already_registered)?;

    credentials::create(db_pool, room_number, password).await?;
    info!("registered room {room_number}");
    Ok(())
}
