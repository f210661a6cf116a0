//! Route-Definitionen fuer die Relay-API (/connections/...)

use axum::{
    routing::{get, post},
    Router,
};
use kamerafunk_observability::health_handler;

use crate::rest::{handlers, HttpState};

/// Erstellt den vollstaendigen Relay-Router
pub fn relay_router() -> Router<HttpState> {
    Router::new()
        // Push-Stream
        .route(
            "/connections/:kennung/events/:rolle",
            get(handlers::stream::events),
        )
        // Offer
        .route(
            "/connections/:kennung/offer",
            post(handlers::offer::offer_einreichen).delete(handlers::offer::offer_loeschen),
        )
        .route(
            "/connections/:kennung/resend",
            post(handlers::offer::offer_erneut_anfordern),
        )
        // Answer
        .route(
            "/connections/:kennung/answer",
            post(handlers::answer::answer_einreichen),
        )
        // Liveness
        .route("/health", get(health_handler))
}
