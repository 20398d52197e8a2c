use actix_multipart::{Multipart, MultipartError};
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    classifier::{self, Classifier},
    config::UploadConfig,
    error::PredictError,
    models::{HealthResponse, PredictionResponse},
    preprocess,
};

struct Upload {
    filename: String,
    data: Vec<u8>,
}

/// Finds the first `file` part that carries a filename and buffers it. Other
/// parts are drained and ignored.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload, PredictError> {
    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            // not a multipart body at all
            Err(
                MultipartError::NoContentType
                | MultipartError::ParseContentType
                | MultipartError::Boundary,
            ) => return Err(PredictError::MissingFile),
            Err(e) => return Err(e.into()),
        };

        let disposition = field.content_disposition();
        let is_file_part = disposition.get_name() == Some("file");
        let filename = disposition.get_filename().map(str::to_owned);

        match filename {
            Some(filename) if is_file_part => {
                if filename.is_empty() {
                    return Err(PredictError::EmptyFilename);
                }

                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if data.len() + chunk.len() > limit {
                        return Err(PredictError::PayloadTooLarge { limit });
                    }
                    data.extend_from_slice(&chunk);
                }
                return Ok(Upload { filename, data });
            }
            _ => {
                while let Some(chunk) = field.next().await {
                    chunk?;
                }
            }
        }
    }

    Err(PredictError::MissingFile)
}

pub async fn predict(
    classifier: web::Data<dyn Classifier>,
    upload_config: web::Data<UploadConfig>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let span = tracing::info_span!("predict", request_id = %Uuid::new_v4());

    async move {
        let result = run_prediction(classifier, upload_config.max_bytes, payload).await;
        match &result {
            Ok(response) => tracing::info!(?response, "Prediction succeeded"),
            Err(e) => tracing::warn!(error = %e, "Prediction failed"),
        }
        result.map(|response| HttpResponse::Ok().json(response))
    }
    .instrument(span)
    .await
}

async fn run_prediction(
    classifier: web::Data<dyn Classifier>,
    limit: usize,
    payload: Multipart,
) -> Result<PredictionResponse, PredictError> {
    let upload = read_upload(payload, limit).await?;
    tracing::info!(filename = %upload.filename, bytes = upload.data.len(), "Received upload");

    let model = classifier.into_inner();
    let span = tracing::Span::current();
    let class_index = web::block(move || {
        let _entered = span.enter();
        let input = preprocess::process_bytes(&upload.data)?;
        tracing::debug!(shape = ?input.shape(), "Preprocessed upload");
        classifier::classify(model.as_ref(), input)
    })
    .await
    .map_err(|e| PredictError::Inference(e.to_string()))??;

    Ok(PredictionResponse { class_index })
}

pub async fn healthcheck() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "Available".into(),
    })
}
