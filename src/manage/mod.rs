pub mod complaints;
pub mod forum;
mod forum_ws;
mod home;
pub mod requests;
pub mod services;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home::home))
        .route("/complaints", get(complaints::complaints_page).post(complaints::new_complaint))
        .route("/complaints.json", get(complaints::complaints_json))
        .route("/services", get(services::services_page).post(services::new_booking))
        .route("/forum", get(forum::forum_page).post(forum::new_post))
        .route("/forum/ws", get(forum_ws::forum_ws))
}
