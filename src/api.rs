use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{catch, get, post, Request, State};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::image_fetch::ImageFetcher;
use crate::types::{
    ErrorResponse, GeneratedTextResponse, HealthResponse, ImageRequest, TextRequest,
};

/// Instruction sent alongside every image.
pub const CAPTION_INSTRUCTION: &str = "What is in this photo?";

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.client.model().to_string(),
    })
}

#[post("/generate_text", data = "<req>")]
pub async fn generate_text(
    state: &State<AppState>,
    req: Json<TextRequest>,
) -> Result<Json<GeneratedTextResponse>, ApiError> {
    let prompt = required(req.into_inner().prompt, "prompt")?;

    info!(prompt_len = prompt.len(), "generate_text");
    let generated_text = state.client.generate(&prompt).await?;

    Ok(Json(GeneratedTextResponse { generated_text }))
}

#[post("/image_to_text", data = "<req>")]
pub async fn image_to_text(
    state: &State<AppState>,
    req: Json<ImageRequest>,
) -> Result<Json<GeneratedTextResponse>, ApiError> {
    let raw = required(req.into_inner().url, "url")?;
    let url = ImageFetcher::parse_url(&raw)?;

    info!(url = %url, "image_to_text");
    // temp file lives until `close` below, or is dropped on any `?` above it
    let fetched = state.fetcher.fetch(&url).await?;
    let result = state
        .client
        .generate_with_image(CAPTION_INSTRUCTION, fetched.image())
        .await;

    let path = fetched.path().to_path_buf();
    if let Err(e) = fetched.close() {
        warn!(path = %path.display(), error = %e, "failed to remove temporary image");
    }

    Ok(Json(GeneratedTextResponse {
        generated_text: result?,
    }))
}

/// Rocket forwards malformed JSON here.
#[catch(400)]
pub fn malformed_body() -> ApiError {
    ApiError::Validation("request body is not valid JSON".to_string())
}

/// Rocket forwards well-formed JSON of the wrong shape here.
#[catch(422)]
pub fn unexpected_shape() -> ApiError {
    ApiError::Validation("request body does not have the expected fields".to_string())
}

/// Every other uncaught status (oversized body, unknown route, ...) keeps
/// its status but gets the JSON error body.
#[catch(default)]
pub fn uncaught(http_status: Status, req: &Request<'_>) -> status::Custom<Json<ErrorResponse>> {
    let (kind, message) = match http_status.code {
        413 => ("validation_error", "request body is too large".to_string()),
        400..=499 => ("validation_error", http_status.reason_lossy().to_lowercase()),
        _ => ("internal_error", http_status.reason_lossy().to_lowercase()),
    };
    warn!(uri = %req.uri(), status = http_status.code, kind, "uncaught error status");
    status::Custom(http_status, Json(ErrorResponse::new(kind, message)))
}

/// A present, non-blank field; the value itself is passed on untouched.
fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(ApiError::Validation(format!("`{field}` must not be empty"))),
        None => Err(ApiError::Validation(format!("`{field}` is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_keeps_the_value_verbatim() {
        assert_eq!(required(Some("  Say hello ".into()), "prompt").unwrap(), "  Say hello ");
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        for value in [None, Some(String::new()), Some(" \n\t".into())] {
            let err = required(value, "prompt").unwrap_err();
            assert_eq!(err.kind(), "validation_error");
            assert!(err.to_string().contains("`prompt`"));
        }
    }
}
