// src/repository/mod.rs

//! Storage boundary for users, the question bank, exams and submissions.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam},
        pagination::Page,
        question::{CreateQuestionRequest, Question, QuestionSearchParams},
        submission::{Submission, SubmissionRecord},
        user::User,
    },
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

pub type DynRepository = Arc<dyn ExamRepository>;

#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError>;

    /// Fails with `NotFound` when absent.
    async fn get_question(&self, id: i64) -> Result<Question, AppError>;

    async fn update_question(&self, question: &Question) -> Result<(), AppError>;

    /// Fails with `Conflict` while an exam still uses the question.
    async fn delete_question(&self, id: i64) -> Result<(), AppError>;

    async fn search_questions(
        &self,
        params: &QuestionSearchParams,
    ) -> Result<Page<Question>, AppError>;

    /// Fails with `BadRequest` when a referenced question does not exist.
    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError>;

    async fn get_exam(&self, id: i64) -> Result<Exam, AppError>;

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError>;

    /// Fails with `Conflict` once submissions exist for the exam.
    async fn delete_exam(&self, id: i64) -> Result<(), AppError>;

    /// Fails with `Conflict` when the session already has a stored submission.
    async fn save_submission(&self, submission: &Submission) -> Result<SubmissionRecord, AppError>;

    async fn list_submissions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError>;

    async fn list_submissions_for_exam(
        &self,
        exam_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError>;
}
