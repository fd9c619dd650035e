use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use triage_storage::{PromptLibrary, StorageError};

#[derive(Deserialize)]
struct ExistsQuery {
    filename: Option<String>,
}

#[derive(Deserialize)]
struct SavePromptRequest {
    filename: Option<String>,
    content: Option<Value>,
}

#[derive(Deserialize)]
struct DeletePromptRequest {
    filename: Option<String>,
}

/// HTTP front for the prompt library
pub struct PromptServer;

impl PromptServer {
    pub fn router(library: PromptLibrary) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/list-prompts", get(list_prompts))
            .route("/check-prompt-exists", get(check_prompt_exists))
            .route("/prompts/:filename", get(get_prompt))
            .route("/save-prompt", post(save_prompt))
            .route("/delete-prompt", post(delete_prompt))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(library)
    }

    pub async fn serve(library: PromptLibrary, host: &str, port: u16) -> anyhow::Result<()> {
        let prompts_dir = library.root().display().to_string();
        let app = Self::router(library);

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;

        info!(prompts_dir = %prompts_dir, "prompt server listening on {}", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn error_response(e: StorageError) -> Response {
    let status = match e {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
        StorageError::Io(_) | StorageError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// GET /list-prompts
async fn list_prompts(State(library): State<PromptLibrary>) -> Response {
    match library.list().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error listing prompts: {}", e),
        )
            .into_response(),
    }
}

/// GET /check-prompt-exists?filename=
async fn check_prompt_exists(
    State(library): State<PromptLibrary>,
    Query(query): Query<ExistsQuery>,
) -> Response {
    let Some(filename) = query.filename.filter(|f| !f.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Filename parameter is missing").into_response();
    };
    let exists = library.exists(&filename).await;
    Json(json!({ "exists": exists })).into_response()
}

/// GET /prompts/:filename
async fn get_prompt(State(library): State<PromptLibrary>, Path(filename): Path<String>) -> Response {
    match library.load(&filename).await {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /save-prompt
async fn save_prompt(
    State(library): State<PromptLibrary>,
    Json(req): Json<SavePromptRequest>,
) -> Response {
    let (Some(filename), Some(content)) = (req.filename, req.content) else {
        return (StatusCode::BAD_REQUEST, "Missing filename or content").into_response();
    };
    if filename.is_empty() || is_blank(&content) {
        return (StatusCode::BAD_REQUEST, "Missing filename or content").into_response();
    }

    match library.save(&filename, &content).await {
        Ok(_) => Json(json!({ "success": true, "message": "Prompt saved successfully." }))
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /delete-prompt
async fn delete_prompt(
    State(library): State<PromptLibrary>,
    Json(req): Json<DeletePromptRequest>,
) -> Response {
    let Some(filename) = req.filename.filter(|f| !f.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing filename").into_response();
    };

    match library.delete(&filename).await {
        Ok(()) => Json(json!({ "success": true, "message": "Prompt deleted." })).into_response(),
        Err(e) => error_response(e),
    }
}
