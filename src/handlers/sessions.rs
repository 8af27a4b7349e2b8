// src/handlers/sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::submission::SubmitReason,
    registry::{SessionRegistry, SharedSession, persist},
    repository::DynRepository,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub option: usize,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRef {
    pub question_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NavigateRequest {
    Next,
    Previous,
    Jump { section: usize, question: usize },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum BreakRequest {
    Start,
    End,
}

/// Looks up a live session owned by the caller.
async fn owned_session(
    sessions: &SessionRegistry,
    id: Uuid,
    claims: &Claims,
) -> Result<SharedSession, AppError> {
    let shared = sessions
        .get(id)
        .await
        .ok_or(AppError::NotFound("Session not found".to_string()))?;

    if shared.lock().await.user_id() != claims.user_id()? {
        return Err(AppError::Forbidden(
            "Session belongs to another user".to_string(),
        ));
    }
    Ok(shared)
}

/// Current clock, position, question and navigation panel.
pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let snapshot = shared.lock().await.snapshot();
    Ok(Json(snapshot))
}

pub async fn answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;
    session.set_answer(payload.question_id, payload.option)?;
    Ok(Json(session.snapshot()))
}

/// Flags a question for review. A chosen answer is kept.
pub async fn mark_for_review(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuestionRef>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;
    session.mark_for_review(payload.question_id)?;
    Ok(Json(session.snapshot()))
}

pub async fn clear_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuestionRef>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;
    session.clear_answer(payload.question_id)?;
    Ok(Json(session.snapshot()))
}

pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;
    let now = Utc::now();

    match payload {
        NavigateRequest::Next => session.next(now)?,
        NavigateRequest::Previous => session.previous(now)?,
        NavigateRequest::Jump { section, question } => session.jump(now, section, question)?,
    };

    Ok(Json(session.snapshot()))
}

/// Pauses or resumes the exam clock.
pub async fn toggle_break(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BreakRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;
    let now = Utc::now();

    match payload {
        BreakRequest::Start => session.start_break(now)?,
        BreakRequest::End => session.end_break(now)?,
    }

    Ok(Json(session.snapshot()))
}

/// Ends the session and stores the submission.
///
/// If storing fails the answers stay in the session and the same record is
/// retried by a later submit or by the clock task.
pub async fn submit(
    State(repo): State<DynRepository>,
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&sessions, id, &claims).await?;
    let mut session = shared.lock().await;

    let submission = session.submit(Utc::now(), SubmitReason::Manual)?;
    let record = persist(&mut session, &submission, repo.as_ref()).await?;

    Ok(Json(record))
}
