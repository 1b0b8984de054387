use std::sync::Arc;

use rocket::figment::Figment;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, State};
use tracing::warn;

use crate::app_state::AppState;
use crate::error::StudioError;
use crate::types::{
    AnalyzeRequest, AnalyzeResponse, ComposeRequest, ComposeResponse, DetectedSentiment,
    ErrorResponse, GenerateRequest, GenerateResponse, GenerationRequest, HealthResponse,
    ModelInfoResponse,
};

/// JSON error body with a status code derived from the error kind.
#[derive(Debug)]
pub struct ApiError {
    status: Status,
    body: ErrorResponse,
}

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        let status = match err {
            StudioError::InvalidInput(_) => Status::BadRequest,
            StudioError::UnsupportedOption { .. } => Status::UnprocessableEntity,
            StudioError::InferenceFailure(_) | StudioError::ModelLoad(_) => {
                warn!(error = %err, "inference request failed");
                Status::InternalServerError
            }
        };
        ApiError {
            status,
            body: ErrorResponse {
                error: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(req)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[get("/health")]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[get("/models")]
pub async fn list_models(state: &State<Arc<AppState>>) -> Json<Vec<ModelInfoResponse>> {
    let resp: Vec<ModelInfoResponse> = state
        .registry
        .list_models()
        .into_iter()
        .map(|m| ModelInfoResponse {
            name: m.name,
            repo: m.repo,
            status: format!("{:?}", m.status),
        })
        .collect();

    Json(resp)
}

#[post("/analyze", data = "<req>")]
pub async fn analyze(
    state: &State<Arc<AppState>>,
    req: Json<AnalyzeRequest>,
) -> ApiResult<AnalyzeResponse> {
    let text = req.into_inner().text;
    let result = state
        .inner()
        .run_inference(move |s| s.classifier.analyze(&text))
        .await?;

    Ok(Json(result.into()))
}

#[post("/generate", data = "<req>")]
pub async fn generate(
    state: &State<Arc<AppState>>,
    req: Json<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    let req = req.into_inner();
    // reject bad options before queueing for a model
    let request = GenerationRequest::parse(&req.topic, &req.sentiment, &req.length)?;

    let text = state
        .inner()
        .run_inference(move |s| s.generator.generate_request(&request))
        .await?;
    let word_count = text.split_whitespace().count();

    Ok(Json(GenerateResponse { text, word_count }))
}

#[post("/compose", data = "<req>")]
pub async fn compose(
    state: &State<Arc<AppState>>,
    req: Json<ComposeRequest>,
) -> ApiResult<ComposeResponse> {
    let ComposeRequest {
        topic,
        sentiment,
        length,
    } = req.into_inner();

    let out = state
        .inner()
        .run_inference(move |s| s.compose(&topic, sentiment.as_deref(), length.as_deref()))
        .await?;

    Ok(Json(ComposeResponse {
        detected: DetectedSentiment {
            sentiment: out.detected.sentiment,
            confidence: out.detected.rounded_confidence(),
        },
        tone: out.tone,
        tone_source: out.tone_source,
        length: out.length,
        text: out.text,
        word_count: out.word_count,
    }))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: "http".to_string(),
            message: status.reason_lossy().to_string(),
        }),
    )
}

/// Assemble the server around an already-loaded [`AppState`].
pub fn build(figment: Figment, state: Arc<AppState>) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![health, list_models, analyze, generate, compose])
        .register("/", catchers![default_catcher])
}
