use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// `<hex salt>$<hex sha256(salt || password)>`
fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

fn password_matches(stored: &str, password: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt) else {
        return false;
    };
    digest(&salt, password) == expected
}

pub async fn exists(db_pool: &SqlitePool, room_number: &str) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT 1 FROM users WHERE room_number=?")
            .bind(room_number)
            .fetch_optional(db_pool)
            .await?
            .is_some()
    )
}

pub async fn verify(db_pool: &SqlitePool, room_number: &str, password: &str) -> Result<bool, sqlx::Error> {
    let stored: Option<(String,)> = sqlx::query_as("SELECT password FROM users WHERE room_number=?")
        .bind(room_number)
        .fetch_optional(db_pool)
        .await?;

    Ok(stored.is_some_and(|(stored,)| password_matches(&stored, password)))
}

/// Fails with a unique-constraint error if the room is taken.
pub async fn create(db_pool: &SqlitePool, room_number: &str, password: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (room_number,password) VALUES (?,?)")
        .bind(room_number)
        .bind(hash_password(password))
        .execute(db_pool)
        .await?;
    Ok(())
}
