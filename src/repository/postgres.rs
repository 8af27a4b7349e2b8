// src/repository/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::ExamRepository;
use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam, Section},
        pagination::Page,
        question::{ContentLayer, CreateQuestionRequest, Difficulty, Question, QuestionSearchParams},
        submission::{QuestionStatus, Submission, SubmissionRecord, SubmitReason},
        user::User,
    },
};

const QUESTION_COLUMNS: &str =
    "id, content, options, correct_option, subject, topic, difficulty, tags, created_at";

const SUBMISSION_COLUMNS: &str = "id, session_id, user_id, exam_id, answers, question_statuses, \
     score, correct_count, total_questions, time_spent, is_submitted, reason, started_at, completed_at";

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// Represents the 'questions' table.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    content: Json<Vec<ContentLayer>>,
    options: Json<Vec<String>>,
    correct_option: i32,
    subject: String,
    topic: String,
    difficulty: String,
    tags: Vec<String>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let difficulty = Difficulty::parse(&row.difficulty).ok_or_else(|| {
            AppError::InternalServerError(format!("Unknown difficulty '{}'", row.difficulty))
        })?;
        Ok(Question {
            id: row.id,
            content: row.content.0,
            options: row.options.0,
            correct_option: row.correct_option.max(0) as usize,
            subject: row.subject,
            topic: row.topic,
            difficulty,
            tags: row.tags,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: i64,
    name: String,
    description: Option<String>,
    time_limit: i32,
    password_hash: Option<String>,
    points_per_correct: i32,
    created_by: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(FromRow)]
struct SectionRow {
    id: i64,
    name: String,
    description: Option<String>,
    time_limit: Option<i32>,
    marks: Option<i32>,
}

/// Membership of a question in an exam, in flat exam order.
#[derive(FromRow)]
struct ExamQuestionRow {
    section_id: Option<i64>,
    question_id: i64,
}

#[derive(FromRow)]
struct SubmissionRow {
    id: i64,
    session_id: Uuid,
    user_id: i64,
    exam_id: i64,
    answers: Json<std::collections::BTreeMap<i64, usize>>,
    question_statuses: Json<std::collections::BTreeMap<i64, QuestionStatus>>,
    score: i32,
    correct_count: i32,
    total_questions: i32,
    time_spent: i64,
    is_submitted: bool,
    reason: String,
    started_at: chrono::DateTime<chrono::Utc>,
    completed_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SubmissionRow> for SubmissionRecord {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let reason = SubmitReason::parse(&row.reason).ok_or_else(|| {
            AppError::InternalServerError(format!("Unknown submit reason '{}'", row.reason))
        })?;
        Ok(SubmissionRecord {
            id: row.id,
            submission: Submission {
                session_id: row.session_id,
                user_id: row.user_id,
                exam_id: row.exam_id,
                answers: row.answers.0,
                question_statuses: row.question_statuses.0,
                score: row.score.max(0) as u32,
                correct_count: row.correct_count.max(0) as u32,
                total_questions: row.total_questions.max(0) as u32,
                time_spent: row.time_spent.max(0) as u64,
                is_submitted: row.is_submitted,
                reason,
                started_at: row.started_at,
                completed_at: row.completed_at,
            },
        })
    }
}

/// Substring pattern for ILIKE with the wildcards in `q` taken literally.
fn like_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_foreign_key_violation())
}

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends the search filters as a WHERE clause.
    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &QuestionSearchParams) {
        builder.push(" WHERE TRUE");
        if let Some(subject) = &params.subject {
            builder.push(" AND LOWER(subject) = LOWER(");
            builder.push_bind(subject.clone());
            builder.push(")");
        }
        if let Some(topic) = &params.topic {
            builder.push(" AND LOWER(topic) = LOWER(");
            builder.push_bind(topic.clone());
            builder.push(")");
        }
        if let Some(difficulty) = params.difficulty {
            builder.push(" AND difficulty = ");
            builder.push_bind(difficulty.as_str());
        }
        if let Some(tag) = &params.tag {
            builder.push(" AND ");
            builder.push_bind(tag.clone());
            builder.push(" = ANY(tags)");
        }
        if let Some(q) = &params.q {
            builder.push(
                " AND EXISTS (SELECT 1 FROM jsonb_array_elements(content) AS layer \
                 WHERE layer->>'text' ILIKE ",
            );
            builder.push_bind(like_pattern(q));
            builder.push(" ESCAPE '\\')");
        }
    }

    async fn load_exam(&self, row: ExamRow) -> Result<Exam, AppError> {
        let section_rows = sqlx::query_as::<_, SectionRow>(
            r#"
            SELECT id, name, description, time_limit, marks
            FROM exam_sections
            WHERE exam_id = $1
            ORDER BY position
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let memberships = sqlx::query_as::<_, ExamQuestionRow>(
            r#"
            SELECT section_id, question_id
            FROM exam_questions
            WHERE exam_id = $1
            ORDER BY position
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let question_rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id IN \
             (SELECT question_id FROM exam_questions WHERE exam_id = $1)",
            QUESTION_COLUMNS
        ))
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<i64, Question> = HashMap::new();
        for q in question_rows {
            let q = Question::try_from(q)?;
            by_id.insert(q.id, q);
        }

        let mut questions = Vec::with_capacity(memberships.len());
        let mut per_section: HashMap<i64, Vec<Question>> = HashMap::new();
        for m in &memberships {
            let question = by_id.get(&m.question_id).cloned().ok_or_else(|| {
                AppError::InternalServerError(format!("Question {} missing", m.question_id))
            })?;
            if let Some(section_id) = m.section_id {
                per_section
                    .entry(section_id)
                    .or_default()
                    .push(question.clone());
            }
            questions.push(question);
        }

        let sections = section_rows
            .into_iter()
            .map(|s| Section {
                questions: per_section.remove(&s.id).unwrap_or_default(),
                id: s.id,
                name: s.name,
                description: s.description,
                time_limit: s.time_limit.map(|t| t.max(0) as u32),
                marks: s.marks.map(|m| m.max(0) as u32),
            })
            .collect();

        Ok(Exam {
            id: row.id,
            name: row.name,
            description: row.description,
            time_limit: row.time_limit.max(0) as u32,
            password_hash: row.password_hash,
            points_per_correct: row.points_per_correct.max(0) as u32,
            sections,
            questions,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ExamRepository for PgRepository {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            INSERT INTO questions (content, options, correct_option, subject, topic, difficulty, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(Json(&req.content))
        .bind(Json(&req.options))
        .bind(req.correct_option as i32)
        .bind(&req.subject)
        .bind(&req.topic)
        .bind(req.difficulty.as_str())
        .bind(&req.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        })?;

        Question::try_from(row)
    }

    async fn get_question(&self, id: i64) -> Result<Question, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

        Question::try_from(row)
    }

    async fn update_question(&self, question: &Question) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET content = $1, options = $2, correct_option = $3, subject = $4,
                topic = $5, difficulty = $6, tags = $7
            WHERE id = $8
            "#,
        )
        .bind(Json(&question.content))
        .bind(Json(&question.options))
        .bind(question.correct_option as i32)
        .bind(&question.subject)
        .bind(&question.topic)
        .bind(question.difficulty.as_str())
        .bind(&question.tags)
        .bind(question.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Question is used by an exam".to_string())
                } else {
                    AppError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
        Ok(())
    }

    async fn search_questions(
        &self,
        params: &QuestionSearchParams,
    ) -> Result<Page<Question>, AppError> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM questions");
        Self::push_filters(&mut count_builder, params);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM questions", QUESTION_COLUMNS));
        Self::push_filters(&mut builder, params);
        builder.push(" ORDER BY id LIMIT ");
        builder.push_bind(i64::from(params.per_page()));
        builder.push(" OFFSET ");
        builder.push_bind(params.offset() as i64);

        let rows: Vec<QuestionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to search questions: {:?}", e);
                AppError::from(e)
            })?;

        let items = rows
            .into_iter()
            .map(Question::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(
            items,
            params.page(),
            params.per_page(),
            total.max(0) as u64,
        ))
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let mut tx = self.pool.begin().await?;

        let exam_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO exams (name, description, time_limit, password_hash, points_per_correct, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&exam.name)
        .bind(&exam.description)
        .bind(exam.time_limit as i32)
        .bind(&exam.password_hash)
        .bind(exam.points_per_correct as i32)
        .bind(exam.created_by)
        .fetch_one(&mut *tx)
        .await?;

        // Flat position across the whole exam, so ORDER BY position gives navigation order.
        let mut position: i32 = 0;
        let mut memberships: Vec<(Option<i64>, i64)> = Vec::new();

        for (index, section) in exam.sections.iter().enumerate() {
            let section_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO exam_sections (exam_id, position, name, description, time_limit, marks)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(exam_id)
            .bind(index as i32)
            .bind(&section.name)
            .bind(&section.description)
            .bind(section.time_limit.map(|t| t as i32))
            .bind(section.marks.map(|m| m as i32))
            .fetch_one(&mut *tx)
            .await?;

            memberships.extend(section.question_ids.iter().map(|&q| (Some(section_id), q)));
        }
        if exam.sections.is_empty() {
            memberships.extend(exam.question_ids.iter().map(|&q| (None, q)));
        }

        for (section_id, question_id) in memberships {
            sqlx::query(
                r#"
                INSERT INTO exam_questions (exam_id, section_id, question_id, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(exam_id)
            .bind(section_id)
            .bind(question_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::BadRequest(format!("Question {} does not exist", question_id))
                } else {
                    AppError::from(e)
                }
            })?;
            position += 1;
        }

        tx.commit().await?;
        tracing::info!("Exam {} created", exam_id);

        self.get_exam(exam_id).await
    }

    async fn get_exam(&self, id: i64) -> Result<Exam, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, name, description, time_limit, password_hash, points_per_correct,
                   created_by, created_at
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

        self.load_exam(row).await
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, name, description, time_limit, password_hash, points_per_correct,
                   created_by, created_at
            FROM exams
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut exams = Vec::with_capacity(rows.len());
        for row in rows {
            exams.push(self.load_exam(row).await?);
        }
        Ok(exams)
    }

    async fn delete_exam(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Exam has submissions and cannot be deleted".to_string())
                } else {
                    tracing::error!("Failed to delete exam: {:?}", e);
                    AppError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Exam not found".to_string()));
        }
        Ok(())
    }

    async fn save_submission(&self, submission: &Submission) -> Result<SubmissionRecord, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            INSERT INTO submissions
                (session_id, user_id, exam_id, answers, question_statuses, score, correct_count,
                 total_questions, time_spent, is_submitted, reason, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(submission.session_id)
        .bind(submission.user_id)
        .bind(submission.exam_id)
        .bind(Json(&submission.answers))
        .bind(Json(&submission.question_statuses))
        .bind(submission.score as i32)
        .bind(submission.correct_count as i32)
        .bind(submission.total_questions as i32)
        .bind(submission.time_spent as i64)
        .bind(submission.is_submitted)
        .bind(submission.reason.as_str())
        .bind(submission.started_at)
        .bind(submission.completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Session already has a submission".to_string())
            } else if is_foreign_key_violation(&e) {
                AppError::NotFound("Exam or user no longer exists".to_string())
            } else {
                tracing::error!("Failed to save submission: {:?}", e);
                AppError::from(e)
            }
        })?;

        SubmissionRecord::try_from(row)
    }

    async fn list_submissions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM submissions WHERE user_id = $1 ORDER BY completed_at DESC",
            SUBMISSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRecord::try_from).collect()
    }

    async fn list_submissions_for_exam(
        &self,
        exam_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM submissions WHERE exam_id = $1 ORDER BY score DESC, completed_at",
            SUBMISSION_COLUMNS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRecord::try_from).collect()
    }
}
