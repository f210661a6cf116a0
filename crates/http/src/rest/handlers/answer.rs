//! REST-Handler fuer Answer-Endpunkte

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Form,
};
use serde_json::json;

use crate::error::HttpResult;
use crate::rest::handlers::NutzlastForm;
use crate::rest::HttpState;

/// `POST /connections/:kennung/answer`
///
/// Answers werden nie gecacht. Ist gerade kein Sender verbunden, geht das
/// Answer verloren (`"empfaenger": 0`).
pub async fn answer_einreichen(
    State(state): State<HttpState>,
    Path(kennung): Path<String>,
    Form(body): Form<NutzlastForm>,
) -> HttpResult<Response> {
    let empfaenger = state
        .relay
        .answer_einreichen(&kennung, body.daten.as_deref())?;
    Ok((StatusCode::OK, Json(json!({ "empfaenger": empfaenger }))).into_response())
}
