use axum::{debug_handler, extract::{ws::Message, State, WebSocketUpgrade}, response::{IntoResponse, Redirect, Response}};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc};
use tower_sessions::Session;
use tracing::debug;

use crate::{res, session, AppResult};

use super::forum::{self, ChatMessage, PostError, PostForm};

/// What the page receives: new messages for everyone, and the outcome of its own posts.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "html", rename_all = "snake_case")]
pub(crate) enum Frame {
    Message(String),
    Posted,
    Error(String),
}

/// Stores and broadcasts the post, answering the poster with `Posted` or an inline error.
pub(crate) async fn handle_post(
    db_pool: &SqlitePool,
    tx: &broadcast::Sender<String>,
    room_number: &str,
    content: &str,
) -> AppResult<Frame> {
    match forum::send_msg(db_pool, tx, room_number, content).await {
        Ok(_) => Ok(Frame::Posted),
        Err(PostError::Storage(e)) => Err(e),
        Err(e) => Ok(Frame::Error(res::error_line(Some(&e.to_string())))),
    }
}

/// The next broadcast message rendered for `viewer`. A lagging receiver skips what it missed;
/// `None` once the channel is closed.
pub(crate) async fn next_message(rx: &mut broadcast::Receiver<String>, viewer: &str) -> Option<Frame> {
    loop {
        match rx.recv().await {
            Ok(payload) => {
                let Ok(message) = serde_json::from_str::<ChatMessage>(&payload) else {
                    continue;
                };
                return Some(Frame::Message(forum::msg_to_html(&message, viewer)));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("forum feed for room {viewer} skipped {skipped} messages");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Live forum: posts arrive as `{"content": ...}`, frames go out as json.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn forum_ws(
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<String>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(ws.on_upgrade(move |stream| async move {
        let mut rx = tx.subscribe();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Frame>();
        let (mut sender, mut receiver) = stream.split();

        let viewer = room_number.clone();
        let send_task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    message = next_message(&mut rx, &viewer) => match message {
                        Some(message) => message,
                        None => break,
                    },
                    reply = reply_rx.recv() => match reply {
                        Some(reply) => reply,
                        None => break,
                    },
                };

                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            let Ok(PostForm { content }) = serde_json::from_slice(&msg.into_data()) else {
                continue;
            };

            match handle_post(&db_pool, &tx, &room_number, &content).await {
                Ok(reply) => {
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("forum post from room {room_number} failed: {e}");
                    break;
                }
            }
        }

        send_task.abort();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn rejected_posts_answer_with_the_inline_message() {
        let db_pool = memory_pool().await;
        let (tx, mut rx) = broadcast::channel(4);

        let empty = handle_post(&db_pool, &tx, "101A", "   ").await.unwrap();
        let Frame::Error(html) = &empty else {
            panic!("expected an error frame, got {empty:?}");
        };
        assert!(html.contains("Message cannot be empty."));

        let long = handle_post(&db_pool, &tx, "101A", &"x".repeat(200)).await.unwrap();
        assert!(matches!(&long, Frame::Error(html) if html.contains("Message must be at most 199 characters.")));

        assert!(rx.try_recv().is_err());
        assert!(forum::list_current_year(&db_pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accepted_posts_are_acknowledged_and_broadcast() {
        let db_pool = memory_pool().await;
        let (tx, mut rx) = broadcast::channel(4);

        assert_eq!(handle_post(&db_pool, &tx, "101A", "hello").await.unwrap(), Frame::Posted);
        assert!(rx.recv().await.unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn lagging_feed_skips_ahead_and_ends_on_close() {
        let db_pool = memory_pool().await;
        let (tx, mut rx) = broadcast::channel(2);

        for content in ["one", "two", "three", "four"] {
            forum::send_msg(&db_pool, &tx, "101A", content).await.unwrap();
        }
        drop(tx);

        let Some(Frame::Message(html)) = next_message(&mut rx, "202B").await else {
            panic!("expected a message after the lag");
        };
        assert!(html.contains("three"));
        assert!(matches!(next_message(&mut rx, "202B").await, Some(Frame::Message(html)) if html.contains("four")));
        assert_eq!(next_message(&mut rx, "202B").await, None);
    }

    #[test]
    fn frames_are_tagged_json() {
        assert_eq!(serde_json::to_string(&Frame::Posted).unwrap(), r#"{"kind":"posted"}"#);
        assert_eq!(
            serde_json::to_string(&Frame::Error("<p>x</p>".to_owned())).unwrap(),
            r#"{"kind":"error","html":"<p>x</p>"}"#
        );
    }
}
