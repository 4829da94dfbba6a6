use std::{collections::BTreeMap, fmt, str::FromStr};

use axum::{debug_handler, extract::State, http::header, response::{IntoResponse, Redirect, Response}, Form};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{Executor, Sqlite, SqlitePool};
use thiserror::Error;
use tower_sessions::Session;
use tracing::info;

use crate::{include_res, res, session, AppError, AppResult};

use super::requests::{self, RequestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintCategory {
    Service,
    Maintenance,
    Noise,
    Pest,
    Other,
}

impl ComplaintCategory {
    pub const ALL: [ComplaintCategory; 5] = [
        ComplaintCategory::Service,
        ComplaintCategory::Maintenance,
        ComplaintCategory::Noise,
        ComplaintCategory::Pest,
        ComplaintCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        use ComplaintCategory::*;
        match self {
            Service => "Service",
            Maintenance => "Maintenance",
            Noise => "Noise",
            Pest => "Pest",
            Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    #[serde(rename = "room")]
    pub room_number: String,
    pub categories: Vec<ComplaintCategory>,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum ComplaintError {
    #[error("Please enter a subject.")]
    MissingSubject,
    #[error("Please describe the complaint.")]
    MissingContent,
    #[error(transparent)]
    Storage(#[from] AppError),
}

/// `c0`, `c1`, ...; ordered by number, so `c2` sorts before `c10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComplaintId(pub u64);

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl FromStr for ComplaintId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('c')
            .and_then(|n| n.parse().ok())
            .map(ComplaintId)
            .ok_or_else(|| format!("malformed complaint id {s:?}"))
    }
}

impl Serialize for ComplaintId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stores the complaint under the next id. Takes any executor so `register` can share its transaction.
pub(crate) async fn append_with<'e, E>(
    executor: E,
    room_number: &str,
    categories: &[ComplaintCategory],
    subject: &str,
    content: &str,
) -> AppResult<ComplaintId>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (String,) = sqlx::query_as(
        "INSERT INTO complaints (id,room_number,categories,subject,content)
         SELECT 'c' || COUNT(*),?,?,?,? FROM complaints
         RETURNING id",
    )
        .bind(room_number)
        .bind(serde_json::to_string(categories)?)
        .bind(subject)
        .bind(content)
        .fetch_one(executor)
        .await?;
    Ok(id.parse()?)
}

pub async fn append(
    db_pool: &SqlitePool,
    room_number: &str,
    categories: &[ComplaintCategory],
    subject: &str,
    content: &str,
) -> AppResult<ComplaintId> {
    append_with(db_pool, room_number, categories, subject, content).await
}

async fn select(db_pool: &SqlitePool, room_number: Option<&str>) -> AppResult<BTreeMap<ComplaintId, Complaint>> {
    let query = match room_number {
        Some(room_number) => sqlx::query_as(
            "SELECT id,room_number,categories,subject,content FROM complaints WHERE room_number=? ORDER BY rowid",
        )
            .bind(room_number),
        None => sqlx::query_as("SELECT id,room_number,categories,subject,content FROM complaints ORDER BY rowid"),
    };
    let rows: Vec<(String, String, String, String, String)> = query.fetch_all(db_pool).await?;

    let mut complaints = BTreeMap::new();
    for (id, room_number, categories, subject, content) in rows {
        complaints.insert(id.parse::<ComplaintId>()?, Complaint {
            room_number,
            categories: serde_json::from_str(&categories)?,
            subject,
            content,
        });
    }
    Ok(complaints)
}

pub async fn list_all(db_pool: &SqlitePool) -> AppResult<BTreeMap<ComplaintId, Complaint>> {
    select(db_pool, None).await
}

pub async fn list_for_room(db_pool: &SqlitePool, room_number: &str) -> AppResult<BTreeMap<ComplaintId, Complaint>> {
    select(db_pool, Some(room_number)).await
}

/// The `{"c<N>": {"room", "categories", "subject", "content"}}` document, for one room or all of them.
/// Serialized straight from the id-ordered map so keys stay in numeric order.
pub async fn document(db_pool: &SqlitePool, room_number: Option<&str>) -> AppResult<String> {
    let complaints = match room_number {
        Some(room_number) => list_for_room(db_pool, room_number).await?,
        None => list_all(db_pool).await?,
    };
    Ok(serde_json::to_string(&complaints)?)
}

/// Stores the complaint and its history row (under the subject) in one transaction.
pub async fn register(
    db_pool: &SqlitePool,
    room_number: &str,
    categories: &[ComplaintCategory],
    subject: &str,
    content: &str,
) -> Result<ComplaintId, ComplaintError> {
    let subject = subject.trim();
    let content = content.trim();
    if subject.is_empty() {
        return Err(ComplaintError::MissingSubject);
    }
    if content.is_empty() {
        return Err(ComplaintError::MissingContent);
    }

    let mut tx = db_pool.begin().await.map_err(AppError::from)?;
    let id = append_with(&mut *tx, room_number, categories, subject, content).await?;
    requests::append_with(&mut *tx, RequestKind::Complaint, room_number, subject).await?;
    tx.commit().await.map_err(AppError::from)?;

    info!("room {room_number} registered complaint {id}");
    Ok(id)
}

#[derive(Deserialize)]
pub(crate) struct ComplaintForm {
    subject: String,
    content: String,
    service: Option<String>,
    maintenance: Option<String>,
    noise: Option<String>,
    pest: Option<String>,
    other: Option<String>,
}

impl ComplaintForm {
    fn categories(&self) -> Vec<ComplaintCategory> {
        use ComplaintCategory::*;
        [
            (Service, &self.service),
            (Maintenance, &self.maintenance),
            (Noise, &self.noise),
            (Pest, &self.pest),
            (Other, &self.other),
        ]
            .into_iter()
            .filter(|(_, checked)| checked.is_some())
            .map(|(category, _)| category)
            .collect()
    }
}

fn render(room_number: &str, error: Option<&str>, notice: Option<&str>) -> Response {
    let categories: String = ComplaintCategory::ALL
        .iter()
        .map(|category| format!(
            r#"<label><input type="checkbox" name="{}"> {}</label>"#,
            category.as_str().to_lowercase(),
            category.as_str()
        ))
        .collect();
    let notice = match notice {
        Some(notice) => format!(r#"<p class="notice">{}</p>"#, res::escape(notice)),
        None => String::new(),
    };

    let body = include_res!(str, "/pages/complaints.html")
        .replace("{categories}", &categories)
        .replace("{notice}", &notice)
        .replace("{error}", &res::error_line(error));
    res::tab_page(room_number, "Complaints", &body).into_response()
}

#[debug_handler]
pub(crate) async fn complaints_page(session: Session) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(render(&room_number, None, None))
}

#[debug_handler]
pub(crate) async fn new_complaint(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(form): Form<ComplaintForm>,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match register(&db_pool, &room_number, &form.categories(), &form.subject, &form.content).await {
        Ok(_) => Ok(render(&room_number, None, Some("Complaint registered."))),
        Err(ComplaintError::Storage(e)) => Err(e),
        Err(e) => Ok(render(&room_number, Some(&e.to_string()), None)),
    }
}

/// The room's complaints as a `{"c<N>": {...}}` document.
#[debug_handler]
pub(crate) async fn complaints_json(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        document(&db_pool, Some(&room_number)).await?,
    ).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn ids_are_sequential() {
        let db_pool = memory_pool().await;

        let first = append(&db_pool, "101A", &[ComplaintCategory::Noise], "loud", "music").await.unwrap();
        let second = append(&db_pool, "202B", &[], "leak", "kitchen").await.unwrap();
        let third = append(&db_pool, "101A", &ComplaintCategory::ALL, "all", "of it").await.unwrap();

        assert_eq!([first, second, third], [ComplaintId(0), ComplaintId(1), ComplaintId(2)]);
        assert_eq!(third.to_string(), "c2");
        assert_eq!(list_all(&db_pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn document_shape() {
        let db_pool = memory_pool().await;
        append(
            &db_pool,
            "101A",
            &[ComplaintCategory::Noise, ComplaintCategory::Pest],
            "upstairs",
            "mice and drums",
        )
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&document(&db_pool, None).await.unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "c0": {
                    "room": "101A",
                    "categories": ["Noise", "Pest"],
                    "subject": "upstairs",
                    "content": "mice and drums",
                }
            })
        );
    }

    #[tokio::test]
    async fn list_for_room_filters() {
        let db_pool = memory_pool().await;
        append(&db_pool, "101A", &[], "a", "a").await.unwrap();
        append(&db_pool, "202B", &[], "b", "b").await.unwrap();

        let mine = list_for_room(&db_pool, "101A").await.unwrap();
        assert_eq!(mine.keys().copied().collect::<Vec<_>>(), [ComplaintId(0)]);

        let theirs: serde_json::Value =
            serde_json::from_str(&document(&db_pool, Some("202B")).await.unwrap()).unwrap();
        assert_eq!(theirs["c1"]["subject"], "b");
        assert!(theirs.get("c0").is_none());
    }

    #[tokio::test]
    async fn register_adds_history_row() {
        let db_pool = memory_pool().await;

        let id = register(&db_pool, "101A", &[ComplaintCategory::Other], " broken door ", "front door")
            .await
            .unwrap();
        assert_eq!(id, ComplaintId(0));

        let history = requests::list(&db_pool, "101A").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, RequestKind::Complaint);
        assert_eq!(history[0].description, "broken door");
    }

    #[tokio::test]
    async fn register_needs_subject_and_content() {
        let db_pool = memory_pool().await;

        assert!(matches!(
            register(&db_pool, "101A", &[], "  ", "x").await,
            Err(ComplaintError::MissingSubject)
        ));
        assert!(matches!(
            register(&db_pool, "101A", &[], "x", "").await,
            Err(ComplaintError::MissingContent)
        ));
        assert!(list_all(&db_pool).await.unwrap().is_empty());
        assert!(requests::list(&db_pool, "101A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_order_by_number() {
        let db_pool = memory_pool().await;
        for n in 0..12 {
            append(&db_pool, "101A", &[], &format!("s{n}"), "x").await.unwrap();
        }

        let ids: Vec<String> = list_all(&db_pool).await.unwrap().keys().map(ToString::to_string).collect();
        assert_eq!(ids[2], "c2");
        assert_eq!(ids[10], "c10");
        assert_eq!(ids.last().map(String::as_str), Some("c11"));

        let json = document(&db_pool, None).await.unwrap();
        assert!(json.find(r#""c2""#).unwrap() < json.find(r#""c10""#).unwrap());
    }

    #[test]
    fn id_text_form() {
        assert_eq!("c42".parse::<ComplaintId>().unwrap(), ComplaintId(42));
        assert!("42".parse::<ComplaintId>().is_err());
        assert!("cx".parse::<ComplaintId>().is_err());
    }

    #[tokio::test]
    async fn failed_history_write_leaves_no_complaint() {
        let db_pool = memory_pool().await;
        sqlx::query("DROP TABLE requests").execute(&db_pool).await.unwrap();

        let result = register(&db_pool, "101A", &[ComplaintCategory::Noise], "loud", "music").await;
        assert!(matches!(result, Err(ComplaintError::Storage(_))));
        assert!(list_all(&db_pool).await.unwrap().is_empty());
    }
}
