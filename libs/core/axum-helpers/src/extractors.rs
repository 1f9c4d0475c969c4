//! JSON extractor with automatic validation using the validator crate.

use crate::envelope::{ApiResponse, ResponseStatus};
use axum::{
    extract::{FromRequest, Json, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor that validates the body with the `validator` crate.
///
/// Deserialization failures and validation failures are both turned into
/// a `400` error envelope; validation failures carry the per-field errors
/// in `data`.
///
/// # Example
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct SendMessage {
///     #[validate(length(min = 1))]
///     text: String,
/// }
///
/// async fn send(ValidatedJson(body): ValidatedJson<SendMessage>) { ... }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.body_text())),
            )
                .into_response()
        })?;

        data.validate().map_err(|e| {
            let details = e
                .field_errors()
                .iter()
                .map(|(field, errors)| {
                    let messages: Vec<serde_json::Value> = errors
                        .iter()
                        .map(|err| {
                            serde_json::json!({
                                "code": err.code,
                                "message": err.message,
                                "params": err.params,
                            })
                        })
                        .collect();
                    (field.to_string(), serde_json::json!(messages))
                })
                .collect::<serde_json::Map<_, _>>();

            let body = ApiResponse {
                status: ResponseStatus::Error,
                message: Some("Request validation failed".to_string()),
                data: Some(serde_json::Value::Object(details)),
            };

            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        })?;

        Ok(ValidatedJson(data))
    }
}
