use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    Extension, Form, Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{CatalogMetadata, PredictionResponse, TitleInput},
};

use super::page::Outcome;
use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Known ratings, genres and countries for form suggestions
pub async fn metadata(State(state): State<AppState>) -> Json<CatalogMetadata> {
    Json(state.predictor.metadata())
}

/// Serves the empty form
pub async fn index(State(state): State<AppState>) -> AppResult<Html<String>> {
    let html = state
        .page
        .render(None, &Outcome::Empty, &state.predictor.metadata())?;
    Ok(Html(html))
}

/// Classifies a submitted form and renders the page with the outcome
///
/// Encoding failures are shown on the page next to the echoed input.
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Form(input): Form<TitleInput>,
) -> AppResult<(StatusCode, Html<String>)> {
    let (status, outcome) = match state.predictor.predict(&input) {
        Ok(prediction) => {
            tracing::info!(
                request_id = %request_id,
                label = %prediction.label,
                confidence = prediction.confidence,
                "Form prediction"
            );
            (StatusCode::OK, Outcome::Predicted(prediction))
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Form prediction rejected");
            (e.status_code(), Outcome::Failed(e.to_string()))
        }
    };

    let html = state
        .page
        .render(Some(&input), &outcome, &state.predictor.metadata())?;
    Ok((status, Html(html)))
}

/// JSON variant of the form submission
pub async fn predict(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(input): Json<TitleInput>,
) -> AppResult<Json<PredictionResponse>> {
    let prediction = state.predictor.predict(&input)?;

    tracing::info!(
        request_id = %request_id,
        label = %prediction.label,
        confidence = prediction.confidence,
        "API prediction"
    );

    Ok(Json(PredictionResponse {
        label: prediction.label,
        confidence: prediction.confidence,
        input,
    }))
}
