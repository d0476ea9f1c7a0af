use rocket::http::Status;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use thiserror::Error;
use tracing::{error, warn};

use crate::image_fetch::ImageError;
use crate::model_client::ModelError;
use crate::types::ErrorResponse;

/// Failure kinds reported to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Decode(String),

    #[error("generative model call failed: {0}")]
    ExternalService(#[from] ModelError),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Fetch(_) => "fetch_error",
            ApiError::Decode(_) => "decode_error",
            ApiError::ExternalService(_) => "external_service_error",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) => Status::BadRequest,
            ApiError::Decode(_) => Status::UnprocessableEntity,
            ApiError::Fetch(_) | ApiError::ExternalService(_) => Status::BadGateway,
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidUrl(_) => ApiError::Validation(err.to_string()),
            ImageError::Decode(_) | ImageError::DecodeTask(_) => {
                ApiError::Decode(err.to_string())
            }
            ImageError::Client(_)
            | ImageError::Unreachable(_)
            | ImageError::Status(_)
            | ImageError::TooLarge(_)
            | ImageError::Io(_) => ApiError::Fetch(err.to_string()),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(uri = %req.uri(), kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(uri = %req.uri(), kind = self.kind(), error = %self, "request rejected");
        }

        let body = Json(ErrorResponse::new(self.kind(), self.to_string()));
        status::Custom(status, body).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_errors_map_to_their_kind() {
        let invalid: ApiError = ImageError::InvalidUrl("nope".into()).into();
        assert_eq!(invalid.kind(), "validation_error");
        assert_eq!(invalid.status(), Status::BadRequest);

        let too_large: ApiError = ImageError::TooLarge(10).into();
        assert_eq!(too_large.kind(), "fetch_error");
        assert_eq!(too_large.status(), Status::BadGateway);

        let status: ApiError = ImageError::Status(reqwest::StatusCode::NOT_FOUND).into();
        assert_eq!(status.kind(), "fetch_error");

        let decode: ApiError = ImageError::Decode(image::ImageError::IoError(
            std::io::Error::new(std::io::ErrorKind::InvalidData, "garbage"),
        ))
        .into();
        assert_eq!(decode.kind(), "decode_error");
        assert_eq!(decode.status(), Status::UnprocessableEntity);
    }

    #[tokio::test]
    async fn crashed_decoder_is_a_decode_error() {
        let join_err = tokio::task::spawn_blocking(|| panic!("decoder blew up"))
            .await
            .unwrap_err();

        let err: ApiError = ImageError::DecodeTask(join_err).into();
        assert_eq!(err.kind(), "decode_error");
        assert_eq!(err.status(), Status::UnprocessableEntity);
    }

    #[test]
    fn model_errors_are_external_service_failures() {
        let err: ApiError = ModelError::EmptyResponse.into();
        assert_eq!(err.kind(), "external_service_error");
        assert_eq!(err.status(), Status::BadGateway);
        assert!(err.to_string().contains("no text"));
    }
}
