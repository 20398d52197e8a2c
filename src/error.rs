use actix_multipart::MultipartError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Uploaded file exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Failed to decode image: image has no pixels")]
    EmptyImage,

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Input shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape {0:?}, expected [1, classes]")]
    UnexpectedOutput(Vec<usize>),
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFile
            | PredictError::EmptyFilename
            | PredictError::Multipart(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_static_messages() {
        assert_eq!(PredictError::MissingFile.to_string(), "No file part");
        assert_eq!(PredictError::EmptyFilename.to_string(), "No selected file");
        assert_eq!(
            PredictError::MissingFile.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PredictError::EmptyFilename.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_shape_mismatch_error() {
        let error = PredictError::ShapeMismatch {
            expected: vec![1, 3, 224, 224],
            got: vec![1, 3, 256, 256],
        };
        assert_eq!(
            error.to_string(),
            "Input shape mismatch: expected [1, 3, 224, 224], got [1, 3, 256, 256]"
        );
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_image_error_conversion() {
        let image_error =
            image::ImageError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        let error = PredictError::from(image_error);
        assert!(matches!(error, PredictError::Decode(_)));
        assert!(error.to_string().starts_with("Failed to decode image"));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_preprocess_error_is_server_side() {
        let error = PredictError::Preprocess("crop window overflows".to_string());
        assert_eq!(error.to_string(), "Preprocessing failed: crop window overflows");
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_payload_too_large() {
        let error = PredictError::PayloadTooLarge { limit: 16 };
        assert_eq!(error.to_string(), "Uploaded file exceeds 16 bytes");
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_error_response_is_json() {
        let response = PredictError::Inference("boom".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get(actix_web::http::header::CONTENT_TYPE)
                .unwrap(),
            "application/json"
        );
    }
}
