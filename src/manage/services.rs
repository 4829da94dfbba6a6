use std::{fmt, str::FromStr};

use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use time::Date;
use tower_sessions::Session;
use tracing::info;

use crate::{db, include_res, res, session, AppError, AppResult};

use super::requests::{self, RequestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    Plumbing,
    Electrician,
    Cleaning,
    Technician,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Plumbing,
        ServiceType::Electrician,
        ServiceType::Cleaning,
        ServiceType::Technician,
    ];

    pub fn as_str(&self) -> &'static str {
        use ServiceType::*;
        match self {
            Plumbing => "Plumbing",
            Electrician => "Electrician",
            Cleaning => "Cleaning",
            Technician => "Technician",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceType::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| format!("unknown service {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBooking {
    pub service_type: ServiceType,
    pub room_number: String,
    pub created_date: String,
    pub scheduled_date: String,
    pub call_first: bool,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Please choose a date.")]
    MissingDate,
    #[error("Scheduled date cannot be in the past.")]
    PastDate,
    #[error(transparent)]
    Storage(#[from] AppError),
}

/// Writes the booking and its history row together. Overlapping bookings are allowed.
pub async fn book(
    db_pool: &SqlitePool,
    room_number: &str,
    service_type: ServiceType,
    scheduled_date: Date,
    call_first: bool,
) -> Result<(), ScheduleError> {
    if scheduled_date < db::today() {
        return Err(ScheduleError::PastDate);
    }

    let mut tx = db_pool.begin().await.map_err(AppError::from)?;
    sqlx::query("INSERT INTO services (service,room_number,date,scheduled_date,call_first) VALUES (?,?,?,?,?)")
        .bind(service_type.as_str())
        .bind(room_number)
        .bind(db::format_date(db::today())?)
        .bind(db::format_date(scheduled_date)?)
        .bind(call_first)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;
    requests::append_with(&mut *tx, RequestKind::Service, room_number, service_type.as_str()).await?;
    tx.commit().await.map_err(AppError::from)?;

    info!("room {room_number} booked {service_type} for {scheduled_date}");
    Ok(())
}

/// The room's bookings, newest first.
pub async fn list(db_pool: &SqlitePool, room_number: &str) -> AppResult<Vec<ServiceBooking>> {
    let rows: Vec<(String, String, String, bool)> = sqlx::query_as(
        "SELECT service,date,scheduled_date,call_first FROM services WHERE room_number=? ORDER BY rowid DESC",
    )
        .bind(room_number)
        .fetch_all(db_pool)
        .await?;

    rows.into_iter()
        .map(|(service, created_date, scheduled_date, call_first)| -> AppResult<ServiceBooking> {
            Ok(ServiceBooking {
                service_type: service.parse()?,
                room_number: room_number.to_owned(),
                created_date,
                scheduled_date,
                call_first,
            })
        })
        .collect()
}

#[derive(Deserialize)]
pub(crate) struct ServiceForm {
    service: ServiceType,
    scheduled_date: String,
    call_first: Option<String>,
}

fn render(room_number: &str, bookings: &[ServiceBooking], error: Option<&str>) -> AppResult<Response> {
    let options: String = ServiceType::ALL
        .iter()
        .map(|service| format!(r#"<option value="{0}">{0}</option>"#, service.as_str()))
        .collect();
    let rows: String = bookings
        .iter()
        .map(|booking| format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            booking.created_date,
            booking.service_type,
            booking.scheduled_date,
            if booking.call_first { "yes" } else { "no" },
        ))
        .collect();

    let body = include_res!(str, "/pages/services.html")
        .replace("{options}", &options)
        .replace("{min_date}", &db::format_date(db::today())?)
        .replace("{bookings}", &rows)
        .replace("{error}", &res::error_line(error));
    Ok(res::tab_page(room_number, "Services", &body).into_response())
}

#[debug_handler]
pub(crate) async fn services_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    render(&room_number, &list(&db_pool, &room_number).await?, None)
}

#[debug_handler]
pub(crate) async fn new_booking(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(ServiceForm { service, scheduled_date, call_first }): Form<ServiceForm>,
) -> AppResult<Response> {
    let Some(room_number) = session::room_number(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let result = match Date::parse(scheduled_date.trim(), db::DATE_FORMAT) {
        Ok(scheduled_date) => book(&db_pool, &room_number, service, scheduled_date, call_first.is_some()).await,
        Err(_) => Err(ScheduleError::MissingDate),
    };

    match result {
        Ok(()) => Ok(Redirect::to("/services").into_response()),
        Err(ScheduleError::Storage(e)) => Err(e),
        Err(e) => render(&room_number, &list(&db_pool, &room_number).await?, Some(&e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn booking_writes_history_too() {
        let db_pool = memory_pool().await;
        let tomorrow = db::today() + Duration::days(1);

        book(&db_pool, "101A", ServiceType::Cleaning, tomorrow, true).await.unwrap();

        let bookings = list(&db_pool, "101A").await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].service_type, ServiceType::Cleaning);
        assert_eq!(bookings[0].scheduled_date, db::format_date(tomorrow).unwrap());
        assert!(bookings[0].call_first);

        let history = requests::list(&db_pool, "101A").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, RequestKind::Service);
        assert_eq!(history[0].description, "Cleaning");
    }

    #[tokio::test]
    async fn double_booking_is_allowed() {
        let db_pool = memory_pool().await;
        let today = db::today();

        book(&db_pool, "101A", ServiceType::Plumbing, today, false).await.unwrap();
        book(&db_pool, "202B", ServiceType::Plumbing, today, false).await.unwrap();
        book(&db_pool, "101A", ServiceType::Plumbing, today, true).await.unwrap();

        assert_eq!(list(&db_pool, "101A").await.unwrap().len(), 2);
        assert_eq!(list(&db_pool, "202B").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn past_dates_are_refused() {
        let db_pool = memory_pool().await;
        let yesterday = db::today() - Duration::days(1);

        let err = book(&db_pool, "101A", ServiceType::Technician, yesterday, false).await.unwrap_err();
        assert!(matches!(err, ScheduleError::PastDate));
        assert!(requests::list(&db_pool, "101A").await.unwrap().is_empty());
    }

    #[test]
    fn service_names_parse() {
        assert_eq!("Electrician".parse::<ServiceType>().unwrap(), ServiceType::Electrician);
        assert!("electrician".parse::<ServiceType>().is_err());
    }
}
