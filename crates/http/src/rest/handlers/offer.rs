//! REST-Handler fuer Offer-Endpunkte (setzen, loeschen, erneut senden)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::HttpResult;
use crate::rest::handlers::NutzlastForm;
use crate::rest::HttpState;

/// `POST /connections/:kennung/offer`
pub async fn offer_einreichen(
    State(state): State<HttpState>,
    Path(kennung): Path<String>,
    Form(body): Form<NutzlastForm>,
) -> HttpResult<Response> {
    let empfaenger = state
        .relay
        .offer_einreichen(&kennung, body.daten.as_deref())?;
    Ok((StatusCode::OK, Json(json!({ "empfaenger": empfaenger }))).into_response())
}

/// `DELETE /connections/:kennung/offer`
pub async fn offer_loeschen(
    State(state): State<HttpState>,
    Path(kennung): Path<String>,
) -> HttpResult<Response> {
    state.relay.offer_loeschen(&kennung)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ResendForm {
    pub receiver_id: Option<String>,
}

/// `POST /connections/:kennung/resend`
///
/// Eine unbekannte Receiver-ID ist kein Fehler: die Anfrage wird mit
/// `202` und `"zugestellt": false` quittiert.
pub async fn offer_erneut_anfordern(
    State(state): State<HttpState>,
    Path(kennung): Path<String>,
    Form(body): Form<ResendForm>,
) -> HttpResult<Response> {
    let zugestellt = state
        .relay
        .offer_erneut_anfordern(&kennung, body.receiver_id.as_deref())?;
    let status = if zugestellt {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(json!({ "zugestellt": zugestellt }))).into_response())
}
