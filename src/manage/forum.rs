use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use pulldown_cmark::{Event, Parser};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tower_sessions::Session;

use crate::{db, include_res, res, session, AppError, AppResult};

pub const MAX_MESSAGE_LEN: usize = 199;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_number: String,
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Message cannot be empty.")]
    Empty,
    #[error("Message must be at most 199 characters.")]
    TooLong,
    #[error(transparent)]
    Storage(#[from] AppError),
}

pub(crate) async fn post_at(
    db_pool: &SqlitePool,
    room_number: &str,
    content: &str,
    at: OffsetDateTime,
) -> Result<ChatMessage, PostError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(PostError::Empty);
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(PostError::TooLong);
    }

    let message = ChatMessage {
        room_number: room_number.to_owned(),
        timestamp: db::format_timestamp(at)?,
        content: content.to_owned(),
    };
    sqlx::query("INSERT INTO forum (room_number,date,content) VALUES (?,?,?)")
        .bind(&message.room_number)
        .bind(&message.timestamp)
        .bind(&message.content)
        .execute(db_pool)
        .await
        .map_err(AppError::from)?;

    Ok(message)
}

pub async fn post(db_pool: &SqlitePool, room_number: &str, content: &str) -> Result<ChatMessage, PostError> {
    post_at(db_pool, room_number, content, OffsetDateTime::now_utc()).await
}

/// Messages stamped in `year`, oldest first.
pub async fn list_year(db_pool: &SqlitePool, year: i32) -> AppResult<Vec<ChatMessage>> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT room_number,date,content FROM forum WHERE substr(date,1,4)=? ORDER BY rowid")
            .bind(format!("{year:04}"))
            .fetch_all(db_pool)
            .await?;

    Ok(
        rows.into_iter()
            .map(|(room_number, timestamp, content)| ChatMessage { room_number, timestamp, content })
            .collect()
    )
}

pub async fn list_current_year(db_pool: &SqlitePool) -> AppResult<Vec<ChatMessage>> {
    list_year(db_pool, db::today().year()).await
}

/// Renders a message as markdown with raw html shown as text. Own messages sit on the right.
pub fn msg_to_html(message: &ChatMessage, viewer: &str) -> String {
    let parser = Parser::new(&message.content).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        event => event,
    });
    let mut content_html = String::new();
    pulldown_cmark::html::push_html(&mut content_html, parser);

    include_res!(str, "/pages/message.html")
        .replace("{side}", if message.room_number == viewer { "mine" } else { "theirs" })
        .replace("{room_number}", &res::escape(&message.room_number))
        .replace("{timestamp}", &res::escape(&message.timestamp))
        .replace("{content}", &content_html)
}

/// Stores the message and pushes it, as json, to open forum pages.
pub(crate) async fn send_msg(
    db_pool: &SqlitePool,
    tx: &broadcast::Sender<String>,
    room_number: &str,
    content: &str,
) -> Result<ChatMessage, PostError> {
    let message = post(db_pool, room_number, content).await?;
    let payload = serde_json::to_string(&message).map_err(AppError::from)?;
    let _ = tx.send(payload);
    Ok(message)
}

#[derive(Deserialize)]
pub(crate) struct PostForm {
    pub(crate) content: String,
}

async fn render(db_pool: &SqlitePool, room_number: &str, error: Option<&str>) -> AppResult<Response> {
    let messages: String = list_current_year(db_pool)
        .await?
        .iter()
        .map(|message| msg_to_html(message, room_number))
        .collect();

    let body = include_res!(str, "/pages/forum.html")
        .replace("{error}", &res::error_line(error))
        .replace("{max_len}", &MAX_MESSAGE_LEN.to_string())
        .replace("{messages}", &messages);
    Ok(res::tab_page(room_number, "Forum", &body).into_response())
}

#[debug_handler]
pub(crate) async fn forum_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    render(&db_pool, &room_number, None).await
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_post(
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<String>>,
    session: Session,
    Form(PostForm { content }): Form<PostForm>,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match send_msg(&db_pool, &tx, &room_number, &content).await {
        Ok(_) => Ok(Redirect::to("/forum").into_response()),
        Err(PostError::Storage(e)) => Err(e),
        Err(e) => render(&db_pool, &room_number, Some(&e.to_string())).await,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn current_year_only_in_insertion_order() {
        let db_pool = memory_pool().await;

        post(&db_pool, "101A", "first").await.unwrap();
        post_at(&db_pool, "202B", "old news", datetime!(2001-06-01 12:00:00 UTC)).await.unwrap();
        post(&db_pool, "202B", "second").await.unwrap();

        let contents: Vec<_> = list_current_year(&db_pool)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["first", "second"]);

        let old = list_year(&db_pool, 2001).await.unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].timestamp, "2001-06-01 12:00:00");
    }

    #[tokio::test]
    async fn content_limits() {
        let db_pool = memory_pool().await;

        assert!(matches!(post(&db_pool, "101A", "   ").await, Err(PostError::Empty)));
        assert!(matches!(post(&db_pool, "101A", &"x".repeat(200)).await, Err(PostError::TooLong)));

        let message = post(&db_pool, "101A", &format!(" {} ", "x".repeat(199))).await.unwrap();
        assert_eq!(message.content.len(), 199);
        assert_eq!(list_current_year(&db_pool).await.unwrap(), [message]);
    }

    #[tokio::test]
    async fn send_msg_broadcasts() {
        let db_pool = memory_pool().await;
        let (tx, mut rx) = broadcast::channel(4);

        send_msg(&db_pool, &tx, "101A", "hello").await.unwrap();

        let payload: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(payload["room_number"], "101A");
        assert_eq!(payload["content"], "hello");
    }

    #[test]
    fn html_is_not_passed_through() {
        let message = ChatMessage {
            room_number: "101A".to_owned(),
            timestamp: "2024-01-01 00:00:00".to_owned(),
            content: "**hi** <script>alert(1)</script>".to_owned(),
        };

        let html = msg_to_html(&message, "101A");
        assert!(!html.contains("<script>"));
        assert!(html.contains("<strong>hi</strong>"));
        assert!(html.contains("mine"));
        assert!(msg_to_html(&message, "202B").contains("theirs"));
    }
}
