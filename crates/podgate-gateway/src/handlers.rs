//! HTTP endpoint handlers

use crate::cache::Route;
use crate::forms::{FormFields, LaunchForm, TerminateForm, ValidationErrors};
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Form, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use podgate_common::PodgateError;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

fn ok() -> Json<serde_json::Value> {
    Json(json!({ "result": "ok" }))
}

#[instrument(skip(state, form))]
pub async fn launch(
    State(state): State<Arc<AppState>>,
    form: Result<Form<FormFields>, FormRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Form(fields) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = LaunchForm::decode(&fields, &state.config.form_defaults)?;
    info!(subdomain = %form.subdomain, image = %form.image, "Launch requested");

    state
        .context
        .launch(&form.image, &form.subdomain, form.port, &form.net, &form.env)
        .await?;
    Ok(ok())
}

#[instrument(skip(state, form))]
pub async fn terminate(
    State(state): State<Arc<AppState>>,
    form: Result<Form<FormFields>, FormRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Form(fields) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = TerminateForm::decode(&fields)?;
    info!(subdomain = %form.subdomain, "Terminate requested");

    state.context.terminate(&form.subdomain).await?;
    Ok(ok())
}

pub async fn list_images(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let images = state.context.list_images().await?;
    Ok(Json(json!({ "result": images })))
}

pub async fn list_instances(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let instances = state.context.list_instances().await?;
    Ok(Json(json!({ "result": instances })))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Proxies `request` to the pod serving `subdomain`.
#[instrument(skip(state, request))]
pub async fn route_request(state: Arc<AppState>, subdomain: &str, request: Request) -> Response {
    let backend = match state.context.route(subdomain).await {
        Ok(Route::Bound(backend)) => backend,
        Ok(Route::Unknown) => {
            return (StatusCode::NOT_FOUND, "404 page not found\n").into_response();
        }
        Err(e) => {
            error!(%subdomain, error = %e, "Could not resolve route");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response();
        }
    };

    match state.proxy.forward(&backend, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(%subdomain, error = %e, "Proxy failed");
            (StatusCode::BAD_GATEWAY, format!("{}\n", e)).into_response()
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(ValidationErrors),
    Podgate(PodgateError),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<PodgateError> for AppError {
    fn from(err: PodgateError) -> Self {
        AppError::Podgate(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, result) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!(msg)),
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, json!(errors)),
            AppError::Podgate(err) => {
                let status = match &err {
                    PodgateError::Validation(_) => StatusCode::BAD_REQUEST,
                    PodgateError::NotFound(_) => StatusCode::NOT_FOUND,
                    PodgateError::AmbiguousMatch(_) => StatusCode::CONFLICT,
                    PodgateError::JobTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %err, "Request failed");
                }
                (status, json!(err.to_string()))
            }
        };

        (status, Json(json!({ "result": result }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_and_body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (PodgateError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PodgateError::AmbiguousMatch("x".into()), StatusCode::CONFLICT),
            (
                PodgateError::JobTimeout {
                    unit: "u".into(),
                    secs: 90,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PodgateError::JobIncomplete {
                    unit: "u".into(),
                    result: "failed".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (PodgateError::Decode("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let (status, body) = status_and_body(AppError::from(err)).await;
            assert_eq!(status, expected);
            assert_eq!(body["result"], message.as_str());
        }
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed() {
        let errors = TerminateForm::decode(&[]).unwrap_err();
        let (status, body) = status_and_body(AppError::from(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"][0]["classification"], "RequiredError");
    }
}
