// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, QuestionSearchParams, UpdateQuestionRequest},
    repository::DynRepository,
    utils::html::sanitize_layers,
};

/// Adds a question to the bank.
/// Admin only.
pub async fn create_question(
    State(repo): State<DynRepository>,
    Json(mut payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.check().map_err(AppError::BadRequest)?;
    payload.content = sanitize_layers(payload.content);

    let question = repo.create_question(payload).await?;
    tracing::info!("Question {} created", question.id);

    Ok((StatusCode::CREATED, Json(question)))
}

/// Searches the bank with filters and pagination.
/// Admin only.
pub async fn search_questions(
    State(repo): State<DynRepository>,
    Query(params): Query<QuestionSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let page = repo.search_questions(&params).await?;
    Ok(Json(page))
}

/// Admin only.
pub async fn get_question(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(repo.get_question(id).await?))
}

/// Partially updates a question. The answer key is re-checked against the merged options.
/// Admin only.
pub async fn update_question(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut question = repo.get_question(id).await?;
    payload.apply(&mut question).map_err(AppError::BadRequest)?;
    question.content = sanitize_layers(question.content);

    repo.update_question(&question).await?;
    Ok(Json(question))
}

/// Admin only. Questions still used by an exam cannot be deleted.
pub async fn delete_question(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    repo.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
