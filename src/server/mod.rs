use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::pipeline::{FaultCategory, PipelineController, PipelineError};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<PipelineController>,
}

#[derive(Debug, Deserialize)]
struct TranscribeRequest {
    /// Optional so a missing field reaches the pipeline's own input
    /// validation instead of a framework-level decode rejection
    video_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranscribeResponse {
    transcription: String,
}

/// Pipeline failure rendered as an HTTP response
struct HttpError(PipelineError);

fn status_for(category: FaultCategory) -> StatusCode {
    match category {
        FaultCategory::Client => StatusCode::BAD_REQUEST,
        FaultCategory::Processing => StatusCode::UNPROCESSABLE_ENTITY,
        FaultCategory::Upstream => StatusCode::BAD_GATEWAY,
        FaultCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());

        (
            status,
            Json(json!({
                "error": self.0.to_string(),
                "code": self.0.code(),
            })),
        )
            .into_response()
    }
}

pub fn router(pipeline: Arc<PipelineController>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .with_state(AppState { pipeline })
}

/// Run the HTTP service until ctrl-c
pub async fn serve(config: &Config, pipeline: PipelineController) -> crate::Result<()> {
    let addr = config.bind_addr()?;
    let app = router(Arc::new(pipeline));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, HttpError> {
    let reference = request.video_url.unwrap_or_default();

    tracing::info!(reference = %reference, "transcription requested");

    match state.pipeline.run(&reference).await {
        Ok(result) => Ok(Json(TranscribeResponse {
            transcription: result.text,
        })),
        Err(error) => Err(HttpError(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(status_for(FaultCategory::Client), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(FaultCategory::Processing),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(FaultCategory::Upstream), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(FaultCategory::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_shape() {
        let response = HttpError(PipelineError::NoAudioTrack).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = HttpError(PipelineError::InvalidInput("missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            HttpError(PipelineError::ServiceUnavailable("quota".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_request_allows_missing_field() {
        let request: TranscribeRequest = serde_json::from_str("{}").unwrap();
        assert!(request.video_url.is_none());

        let request: TranscribeRequest =
            serde_json::from_str(r#"{"video_url": "https://example.com/watch?v=abc"}"#).unwrap();
        assert_eq!(
            request.video_url.as_deref(),
            Some("https://example.com/watch?v=abc")
        );
    }
}
