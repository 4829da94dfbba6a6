use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{include_res, res, session, AppResult};

use super::requests::{self, Request};

fn history_rows(history: &[Request]) -> String {
    if history.is_empty() {
        return r#"<tr><td colspan="3">No requests yet.</td></tr>"#.to_owned();
    }

    history
        .iter()
        .map(|request| format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            res::escape(&request.date),
            request.kind,
            res::escape(&request.description),
        ))
        .collect()
}

#[debug_handler]
pub(crate) async fn home(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let history = requests::list(&db_pool, &room_number).await?;
    let body = include_res!(str, "/pages/home.html")
        .replace("{room_number}", &res::escape(&room_number))
        .replace("{rows}", &history_rows(&history));

    Ok(res::tab_page(&room_number, "Home", &body).into_response())
}
