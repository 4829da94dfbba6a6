use tower_sessions::Session;

use crate::AppResult;

pub const ROOM_NUMBER: &str = "room_number";

/// The room logged into this session, if any.
pub async fn room_number(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(ROOM_NUMBER).await?)
}
