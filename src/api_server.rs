use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::classifier::EventRecord;
use crate::config::Config;
use crate::discovery::{DiscoveryError, DiscoveryRequest, DiscoveryResult, FamilyMember};
use crate::models::{ActionObservation, ParsedIntentBundle, PreferenceLine};
use crate::profile::LearnOutcome;
use crate::services::Services;
use crate::transcription::{AudioInput, TranscriptionError};

// Voice notes are uploaded whole
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// API state that will be shared across handlers
pub struct ApiState {
    pub services: Arc<Services>,
}

// General API response, used for every error
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

type ApiError = (StatusCode, Json<ApiResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse { success: false, message: message.into() }))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    pub query: String,
    pub user_id: Option<i64>,
    pub home_address: Option<String>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LearnRequest {
    pub user_id: i64,
    pub user_input: Option<String>,
    pub actual_action: ActionObservation,
}

#[derive(Debug, Serialize)]
pub struct LearnResponse {
    pub status: &'static str,
    pub outcome: LearnOutcome,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub preferences: Vec<PreferenceLine>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub family: Vec<FamilyMember>,
}

#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub status: &'static str,
    pub parsed_data: ParsedIntentBundle,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub category: String,
}

// Health check endpoint
async fn health_check() -> &'static str {
    "Hearth API is running"
}

async fn interact_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<InteractRequest>,
) -> Result<Json<ParsedIntentBundle>, ApiError> {
    let request_id = Uuid::new_v4();
    if request.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query must not be empty"));
    }
    info!("Request[{}]: interact for user {:?}", request_id, request.user_id);

    let bundle = state
        .services
        .interact(
            &request.query,
            request.user_id,
            request.home_address,
            request.as_of.unwrap_or_else(today),
        )
        .await;
    debug!("Request[{}]: parsed {} items", request_id, bundle.total_items());
    Ok(Json(bundle))
}

async fn learn_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<LearnRequest>,
) -> Result<Json<LearnResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let mut observation = request.actual_action;
    observation.user_id = request.user_id;
    if observation.input_text.is_none() {
        observation.input_text = request.user_input;
    }

    match state.services.learn(observation).await {
        Ok(outcome) => {
            info!("Request[{}]: learn for user {} -> {:?}", request_id, request.user_id, outcome);
            Ok(Json(LearnResponse { status: "learned", outcome }))
        }
        Err(e) => {
            error!("Request[{}]: failed to update profile: {}", request_id, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to update profile: {}", e)))
        }
    }
}

async fn profile_handler(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    match state.services.active_preferences(user_id).await {
        Ok(preferences) => Ok(Json(ProfileResponse { user_id, preferences })),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to read profile: {}", e))),
    }
}

async fn search_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<DiscoveryResult>, ApiError> {
    let request_id = Uuid::new_v4();
    if request.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query must not be empty"));
    }
    info!("Request[{}]: event search", request_id);

    let discovery = DiscoveryRequest { query: request.query, family: request.family, as_of: today() };
    match state.services.assistant.search(&discovery).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            error!("Request[{}]: event search failed: {}", request_id, e);
            let status = match e {
                DiscoveryError::Provider(_) => StatusCode::BAD_GATEWAY,
                DiscoveryError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(api_error(status, e.to_string()))
        }
    }
}

fn bad_multipart(e: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart upload: {}", e))
}

async fn voice_handler(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<VoiceResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let mut audio = None;
    let mut user_id = None;
    let mut home_address = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("audio.wav").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                audio = Some(AudioInput::new(file_name, bytes.to_vec()));
            }
            "user_id" => {
                let text = field.text().await.map_err(bad_multipart)?;
                let id = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| api_error(StatusCode::BAD_REQUEST, "user_id must be an integer"))?;
                user_id = Some(id);
            }
            "home_address" => {
                home_address = Some(field.text().await.map_err(bad_multipart)?);
            }
            other => debug!("Request[{}]: ignoring multipart field {:?}", request_id, other),
        }
    }

    let audio = audio.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'file' field"))?;
    info!("Request[{}]: voice note {} ({} bytes)", request_id, audio.file_name, audio.bytes.len());

    let context = state.services.parse_context(user_id, home_address, today()).await;
    match state.services.voice.process(&audio, context).await {
        Ok(parsed_data) => Ok(Json(VoiceResponse { status: "success", parsed_data })),
        Err(e) => {
            warn!("Request[{}]: voice processing failed: {}", request_id, e);
            let status = match e {
                TranscriptionError::UnsupportedFormat(_) | TranscriptionError::EmptyAudio => StatusCode::BAD_REQUEST,
                TranscriptionError::EmptyTranscript => StatusCode::UNPROCESSABLE_ENTITY,
                TranscriptionError::Provider(_) => StatusCode::BAD_GATEWAY,
                TranscriptionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(api_error(status, e.to_string()))
        }
    }
}

async fn classify_handler(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<EventRecord>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    if event.title.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Title must not be empty"));
    }
    let category = state.services.classifier.classify(&event).await;
    Ok(Json(ClassifyResponse { category }))
}

/// All routes, with open CORS.
pub fn router(services: Arc<Services>) -> Router {
    let state = Arc::new(ApiState { services });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/assistant/interact", post(interact_handler))
        .route("/api/assistant/learn", post(learn_handler))
        .route("/api/assistant/profile/{user_id}", get(profile_handler))
        .route("/api/assistant/search", post(search_handler))
        .route("/api/voice/process", post(voice_handler))
        .route("/api/events/classify", post(classify_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

pub async fn start_api_server(config: Config) -> Result<()> {
    let services = Arc::new(Services::from_config(&config)?);
    let app = router(services);

    let addr = config.server.bind.as_str();
    info!("Starting API server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to address: {}", e))?;

    info!("API server successfully bound to {}. Waiting for connections...", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EventClassifier;
    use crate::discovery::EventAssistant;
    use crate::llm::{Generation, GenerationRequest, ProviderError, TextGenerator};
    use crate::parser::{IntentParser, MultiIntentParser};
    use crate::profile::{MemoryProfileStore, PreferenceLearner};
    use crate::transcription::{Transcriber, VoiceIntake};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Answers every prompt with the same text.
    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Generation, ProviderError> {
            Ok(Generation::text(self.0))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct CannedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for CannedTranscriber {
        async fn transcribe(&self, _audio: &AudioInput) -> Result<String, TranscriptionError> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn app(reply: &'static str) -> Router {
        let generator = Arc::new(Canned(reply));
        let parser: Arc<dyn IntentParser> = Arc::new(MultiIntentParser::new(generator.clone()));
        let services = Services {
            parser: parser.clone(),
            learner: Arc::new(PreferenceLearner::new(Arc::new(MemoryProfileStore::new()))),
            classifier: Arc::new(EventClassifier::new(generator.clone())),
            voice: Arc::new(VoiceIntake::new(Arc::new(CannedTranscriber("buy milk")), parser)),
            assistant: Arc::new(EventAssistant::new(generator)),
        };
        router(Arc::new(services))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_body(boundary: &str, file_name: &str, data: &[u8], user_id: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{user_id}\r\n").as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    fn voice_request(file_name: &str, data: &[u8]) -> Request<Body> {
        let boundary = "hearthboundary";
        Request::post("/api/voice/process")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(multipart_body(boundary, file_name, data, "5")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app("{}"), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("Hearth API is running".to_string()));
    }

    #[tokio::test]
    async fn test_interact_returns_bundle() {
        let app = app(r#"{"shopping_items": [{"name": "Milk"}]}"#);
        let (status, body) = send(&app, post_json("/api/assistant/interact", json!({"query": "buy milk"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"events": [], "chores": [], "shopping_items": [{"name": "Milk"}]}));
    }

    #[tokio::test]
    async fn test_interact_rejects_blank_query() {
        let (status, body) = send(&app("{}"), post_json("/api/assistant/interact", json!({"query": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_learn_then_profile() {
        let app = app("{}");
        let learn = json!({
            "user_id": 9,
            "user_input": "Soccer at Lincoln Fields",
            "actual_action": {"type": "event", "location": "Lincoln Fields", "category": "Soccer"}
        });

        let (status, body) = send(&app, post_json("/api/assistant/learn", learn.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "learned", "outcome": "created"}));
        send(&app, post_json("/api/assistant/learn", learn)).await;

        let (status, body) =
            send(&app, Request::get("/api/assistant/profile/9").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"user_id": 9, "preferences": [
                {"key": "location_Soccer", "value": "Lincoln Fields", "confidence": 0.6}
            ]})
        );
    }

    #[tokio::test]
    async fn test_learn_ignores_shopping() {
        let app = app("{}");
        let learn = json!({"user_id": 9, "actual_action": {"type": "shopping", "name": "milk"}});
        let (_, body) = send(&app, post_json("/api/assistant/learn", learn)).await;
        assert_eq!(body["outcome"], json!("ignored"));
    }

    #[tokio::test]
    async fn test_classify() {
        let (status, body) = send(
            &app("Music"),
            post_json("/api/events/classify", json!({"title": "Jazz Night", "description": "Live trio"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"category": "Music"}));
    }

    #[tokio::test]
    async fn test_search_extraction_failure_is_an_error() {
        let (status, body) = send(
            &app("I could not find anything."),
            post_json("/api/assistant/search", json!({"query": "jazz"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_voice_upload_is_parsed() {
        let app = app(r#"{"shopping_items": [{"name": "Milk"}]}"#);
        let (status, body) = send(&app, voice_request("note.m4a", b"fake audio")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("success"));
        assert_eq!(body["parsed_data"]["shopping_items"][0]["name"], json!("Milk"));
    }

    #[tokio::test]
    async fn test_voice_rejects_unsupported_format() {
        let (status, body) = send(&app("{}"), voice_request("note.txt", b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }
}
