use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{include_res, res, AppResult};

use super::SignupError;

#[derive(Deserialize)]
pub(crate) struct SignupForm {
    pub(crate) room_number: String,
    pub(crate) password: String,
    pub(crate) receipt_number: String,
}

fn render(error: Option<&str>) -> Html<String> {
    Html(
        include_res!(str, "/pages/signup.html")
            .replace("{error}", &res::error_line(error))
    )
}

#[debug_handler]
pub(crate) async fn signup_page() -> impl IntoResponse {
    render(None)
}

#[debug_handler]
pub(crate) async fn signup(
    State(db_pool): State<SqlitePool>,
    Form(SignupForm { room_number, password, receipt_number }): Form<SignupForm>,
) -> AppResult<Response> {
    match super::signup(&db_pool, room_number.trim(), &password, receipt_number.trim()).await {
        Ok(()) => Ok(Redirect::to("/login?registered=true").into_response()),
        Err(SignupError::Storage(e)) => Err(e.into()),
        Err(e) => Ok(render(Some(&e.to_string())).into_response()),
    }
}
