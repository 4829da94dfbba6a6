use axum::{debug_handler, extract::{Query, State}, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{include_res, res, session::{self, ROOM_NUMBER}, AppResult};

use super::{authenticate, LoginError};

#[derive(Deserialize)]
pub(crate) struct LoginPageQuery {
    #[serde(default)]
    pub(crate) registered: bool,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    pub(crate) room_number: String,
    pub(crate) password: String,
}

pub(crate) fn render(error: Option<&str>, notice: Option<&str>) -> Html<String> {
    let notice = match notice {
        Some(notice) => format!(r#"<p class="notice">{}</p>"#, res::escape(notice)),
        None => String::new(),
    };
    Html(
        include_res!(str, "/pages/login.html")
            .replace("{notice}", &notice)
            .replace("{error}", &res::error_line(error))
    )
}

#[debug_handler]
pub(crate) async fn index(session: Session) -> AppResult<Redirect> {
    if session::room_number(&session).await?.is_some() {
        Ok(Redirect::to("/home"))
    } else {
        Ok(Redirect::to("/login"))
    }
}

#[debug_handler]
pub(crate) async fn login_page(
    Query(LoginPageQuery { registered }): Query<LoginPageQuery>,
) -> impl IntoResponse {
    render(None, registered.then_some("Account created, you can log in now."))
}

#[debug_handler]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(LoginForm { room_number, password }): Form<LoginForm>,
) -> AppResult<Response> {
    let room_number = room_number.trim();

    match authenticate(&db_pool, room_number, &password).await {
        Ok(()) => {
            session.cycle_id().await?;
            session.insert(ROOM_NUMBER, room_number).await?;
            Ok(Redirect::to("/home").into_response())
        }
        Err(LoginError::Storage(e)) => Err(e.into()),
        Err(e) => Ok(render(Some(&e.to_string()), None).into_response()),
    }
}
