use super::{
    page,
    types::{
        AnswerResponse, ApiError, HealthResponse, QuestionsResponse, SessionResponse, api_error,
    },
};
use crate::{Error, ingest::UploadedImage, session::SessionStore, shell::Shell};
use axum::{
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub shell: Arc<Shell>,
    pub sessions: Arc<SessionStore>,
    pub max_upload_bytes: usize,
}

pub async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        questions: state.shell.questions().iter().cloned().collect(),
    })
}

pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let (session_id, session) = state.sessions.create().await;
    let session = session.lock().await;
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            created_at: session.created_at,
            view: state.shell.view(&session.fsm),
        }),
    )
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(&session_id).await.map_err(api_error)?;
    let session = session.lock().await;
    Ok(Json(SessionResponse {
        session_id,
        created_at: session.created_at,
        view: state.shell.view(&session.fsm),
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(&session_id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(&session_id).await.map_err(api_error)?;
    let upload = read_upload(multipart, state.max_upload_bytes)
        .await
        .map_err(api_error)?;

    info!(
        "Received upload for session {}: {} bytes ({:?})",
        session_id,
        upload.bytes.len(),
        upload.content_type
    );

    let mut session = session.lock().await;
    match state.shell.upload(&mut session.fsm, upload).await {
        Ok(_) => Ok(Json(SessionResponse {
            session_id,
            created_at: session.created_at,
            view: state.shell.view(&session.fsm),
        })),
        Err(e) => {
            warn!("Upload failed for session {}: {}", session_id, e);
            Err(api_error(e))
        }
    }
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state.sessions.get(&session_id).await.map_err(api_error)?;
    let session = session.lock().await;

    let bitmap = session.fsm.context.bitmap.as_ref().ok_or_else(|| {
        api_error(Error::InvalidTransition {
            current: format!("{:?}", session.fsm.current_state()),
            requested: "image preview".to_string(),
        })
    })?;
    let png = bitmap.to_png().map_err(api_error)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub async fn ask_question(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(String, usize)>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let session = state.sessions.get(&session_id).await.map_err(api_error)?;
    let mut session = session.lock().await;

    match state.shell.ask(&mut session.fsm, index).await {
        Ok(exchange) => {
            info!(
                "Answered question {} for session {} (score {:.4})",
                index, session_id, exchange.answer.score
            );
            Ok(Json(AnswerResponse::new(session_id, exchange)))
        }
        Err(e) => {
            warn!(
                "Failed to answer question {} for session {}: {}",
                index, session_id, e
            );
            Err(api_error(e))
        }
    }
}

fn upload_error(error: MultipartError, limit_bytes: usize) -> Error {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::UploadTooLarge { limit_bytes }
    } else {
        Error::decode(format!("malformed upload: {}", error.body_text()))
    }
}

async fn read_upload(mut multipart: Multipart, limit_bytes: usize) -> crate::Result<UploadedImage> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, limit_bytes))?;

        let mut upload = UploadedImage::new(bytes.to_vec(), content_type.as_deref());
        if let Some(name) = file_name {
            upload = upload.with_file_name(name);
        }
        return Ok(upload);
    }

    Err(Error::decode(format!(
        "multipart body has no '{}' field",
        IMAGE_FIELD
    )))
}
