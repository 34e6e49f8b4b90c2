pub mod chat;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::handle_chat))
        .route("/tts", post(chat::handle_tts))
        .route("/whatsapp", post(chat::handle_whatsapp))
        .route("/replay", get(chat::handle_replay))
        .with_state(state)
}
