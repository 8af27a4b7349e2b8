// src/handlers/submissions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, repository::DynRepository, utils::jwt::Claims};

/// The caller's own completed attempts.
pub async fn my_submissions(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let records = repo.list_submissions_for_user(claims.user_id()?).await?;
    Ok(Json(records))
}

/// All attempts at one exam, best score first.
/// Admin only.
pub async fn exam_submissions(
    State(repo): State<DynRepository>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Surface 404 for unknown exams rather than an empty list.
    repo.get_exam(exam_id).await?;

    let mut records = repo.list_submissions_for_exam(exam_id).await?;
    records.sort_by(|a, b| {
        b.submission
            .score
            .cmp(&a.submission.score)
            .then(a.submission.completed_at.cmp(&b.submission.completed_at))
    });
    Ok(Json(records))
}
