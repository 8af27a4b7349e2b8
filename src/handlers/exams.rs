// src/handlers/exams.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    config::DEFAULT_POINTS_PER_CORRECT,
    error::AppError,
    models::exam::{CreateExamRequest, ExamSummary, NewExam, NewSection, StartSessionRequest},
    registry::SessionRegistry,
    repository::DynRepository,
    session::ExamSession,
    utils::{
        hash::{check_exam_password, hash_password},
        jwt::Claims,
    },
};

/// Authors a new exam from existing bank questions.
/// Admin only.
pub async fn create_exam(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.check().map_err(AppError::BadRequest)?;

    let password_hash = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;

    let new_exam = NewExam {
        name: payload.name,
        description: payload.description,
        time_limit: payload.time_limit,
        password_hash,
        points_per_correct: payload
            .points_per_correct
            .unwrap_or(DEFAULT_POINTS_PER_CORRECT),
        sections: payload
            .sections
            .into_iter()
            .map(|s| NewSection {
                name: s.name,
                description: s.description,
                time_limit: s.time_limit,
                marks: s.marks,
                question_ids: s.question_ids,
            })
            .collect(),
        question_ids: payload.question_ids,
        created_by: claims.user_id()?,
    };

    let exam = repo.create_exam(new_exam).await?;
    tracing::info!(
        "Exam {} '{}' created with {} questions",
        exam.id,
        exam.name,
        exam.total_questions()
    );

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists exams a student can open.
pub async fn list_exams(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    let exams = repo.list_exams().await?;
    let summaries: Vec<ExamSummary> = exams.iter().map(ExamSummary::from).collect();
    Ok(Json(summaries))
}

/// Summary of one exam, without questions.
pub async fn get_exam(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = repo.get_exam(id).await?;
    Ok(Json(ExamSummary::from(&exam)))
}

/// Full definition including answer keys.
/// Admin only.
pub async fn get_exam_definition(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(repo.get_exam(id).await?))
}

/// Admin only. Exams with submissions or running sessions are kept.
pub async fn delete_exam(
    State(repo): State<DynRepository>,
    State(sessions): State<SessionRegistry>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if sessions.has_open_session(id).await {
        return Err(AppError::Conflict(
            "Exam has sessions in progress and cannot be deleted".to_string(),
        ));
    }
    repo.delete_exam(id).await?;
    tracing::info!("Exam {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Opens an exam: checks the password gate, loads a fresh session and starts its clock.
pub async fn start_session(
    State(repo): State<DynRepository>,
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    payload: Option<Json<StartSessionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let user_id = claims.user_id()?;
    let exam = repo.get_exam(id).await?;

    check_exam_password(exam.password_hash.as_deref(), payload.password.as_deref())?;

    let mut session = ExamSession::load(exam, user_id)?;
    session.unlock()?;
    session.start(Utc::now())?;

    let snapshot = session.snapshot();
    sessions.insert(session).await;

    tracing::info!(
        session_id = %snapshot.session_id,
        exam_id = id,
        user_id,
        "Exam session started"
    );

    Ok((StatusCode::CREATED, Json(snapshot)))
}
