use std::{fmt, str::FromStr};

use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{db, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Service,
    Complaint,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        use RequestKind::*;
        match self {
            Service => "service",
            Complaint => "complaint",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(RequestKind::Service),
            "complaint" => Ok(RequestKind::Complaint),
            other => Err(format!("unknown request kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub kind: RequestKind,
    pub room_number: String,
    pub date: String,
    pub description: String,
}

/// Takes any executor so bookings can write their history row inside their own transaction.
pub(crate) async fn append_with<'e, E>(
    executor: E,
    kind: RequestKind,
    room_number: &str,
    description: &str,
) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO requests (kind,room_number,date,description) VALUES (?,?,?,?)")
        .bind(kind.as_str())
        .bind(room_number)
        .bind(db::format_date(db::today())?)
        .bind(description)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn append(db_pool: &SqlitePool, kind: RequestKind, room_number: &str, description: &str) -> AppResult<()> {
    append_with(db_pool, kind, room_number, description).await
}

/// The room's requests, newest first.
pub async fn list(db_pool: &SqlitePool, room_number: &str) -> AppResult<Vec<Request>> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT kind,date,description FROM requests WHERE room_number=? ORDER BY rowid DESC")
            .bind(room_number)
            .fetch_all(db_pool)
            .await?;

    rows.into_iter()
        .map(|(kind, date, description)| -> AppResult<Request> {
            Ok(Request {
                kind: kind.parse::<RequestKind>()?,
                room_number: room_number.to_owned(),
                date,
                description,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn lists_newest_first() {
        let db_pool = memory_pool().await;

        append(&db_pool, RequestKind::Service, "101A", "A").await.unwrap();
        append(&db_pool, RequestKind::Complaint, "101A", "B").await.unwrap();
        append(&db_pool, RequestKind::Service, "101A", "C").await.unwrap();

        let descriptions: Vec<_> = list(&db_pool, "101A")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(descriptions, ["C", "B", "A"]);
    }

    #[tokio::test]
    async fn scoped_to_the_room() {
        let db_pool = memory_pool().await;

        append(&db_pool, RequestKind::Service, "101A", "mine").await.unwrap();
        append(&db_pool, RequestKind::Service, "202B", "theirs").await.unwrap();

        let requests = list(&db_pool, "101A").await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].description, "mine");
        assert_eq!(requests[0].kind, RequestKind::Service);
        assert_eq!(requests[0].date, db::format_date(db::today()).unwrap());
    }

    #[test]
    fn kind_round_trips_through_text() {
        assert_eq!("complaint".parse::<RequestKind>().unwrap(), RequestKind::Complaint);
        assert!("repair".parse::<RequestKind>().is_err());
    }
}
