use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{session, AppResult};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Redirect> {
    if let Some(room_number) = session::room_number(&session).await? {
        tracing::info!("room {room_number} logged out");
    }
    session.flush().await?;
    Ok(Redirect::to("/login"))
}
