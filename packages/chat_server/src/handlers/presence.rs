use axum::{Json, extract::State};

use crate::AppState;

/// `GET /api/online` - ids of every user with at least one live socket, sorted
pub async fn online_users_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut users = state.hub.registry().list_online_user_ids().await;
    users.sort();
    Json(users)
}
