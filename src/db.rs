use std::path::Path;

use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use time::{format_description::BorrowedFormatItem, macros::format_description, Date, OffsetDateTime};

use crate::AppResult;

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        room_number TEXT PRIMARY KEY,
        password TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS requests (
        kind TEXT NOT NULL,
        room_number TEXT NOT NULL,
        date TEXT NOT NULL,
        description TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS services (
        service TEXT NOT NULL,
        room_number TEXT NOT NULL,
        date TEXT NOT NULL,
        scheduled_date TEXT NOT NULL,
        call_first BOOLEAN NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS forum (
        room_number TEXT NOT NULL,
        date TEXT NOT NULL,
        content TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS complaints (
        id TEXT PRIMARY KEY,
        room_number TEXT NOT NULL,
        categories TEXT NOT NULL,
        subject TEXT NOT NULL,
        content TEXT NOT NULL
    )",
];

/// Opens the database file, creating it and its directory when missing.
pub async fn connect(path: &Path) -> AppResult<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    init(&db_pool).await?;
    Ok(db_pool)
}

pub async fn init(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(db_pool).await?;
    }
    Ok(())
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn format_date(date: Date) -> AppResult<String> {
    Ok(date.format(DATE_FORMAT)?)
}

pub fn format_timestamp(at: OffsetDateTime) -> AppResult<String> {
    Ok(at.format(TIMESTAMP_FORMAT)?)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // every connection to :memory: is its own database, so pin the pool to one
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init(&db_pool).await.unwrap();
    db_pool
}
