// src/repository/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::ExamRepository;
use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam, Section},
        pagination::Page,
        question::{CreateQuestionRequest, Question, QuestionSearchParams},
        submission::{Submission, SubmissionRecord},
        user::User,
    },
};

/// Exam layout as stored: question ids, resolved on every read.
#[derive(Debug, Clone)]
struct StoredExam {
    id: i64,
    section_ids: Vec<i64>,
    exam: NewExam,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    users: Vec<User>,
    questions: BTreeMap<i64, Question>,
    exams: BTreeMap<i64, StoredExam>,
    submissions: Vec<SubmissionRecord>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        ids.iter()
            .map(|id| {
                self.questions
                    .get(id)
                    .cloned()
                    .ok_or_else(|| AppError::BadRequest(format!("Question {} does not exist", id)))
            })
            .collect()
    }

    fn load_exam(&self, stored: &StoredExam) -> Result<Exam, AppError> {
        let new = &stored.exam;
        let sections = new
            .sections
            .iter()
            .zip(&stored.section_ids)
            .map(|(s, &id)| {
                Ok(Section {
                    id,
                    name: s.name.clone(),
                    description: s.description.clone(),
                    time_limit: s.time_limit,
                    marks: s.marks,
                    questions: self.resolve(&s.question_ids)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let questions = if sections.is_empty() {
            self.resolve(&new.question_ids)?
        } else {
            sections.iter().flat_map(|s| s.questions.iter().cloned()).collect()
        };

        Ok(Exam {
            id: stored.id,
            name: new.name.clone(),
            description: new.description.clone(),
            time_limit: new.time_limit,
            password_hash: new.password_hash.clone(),
            points_per_correct: new.points_per_correct,
            sections,
            questions,
            created_by: new.created_by,
            created_at: Some(stored.created_at),
        })
    }
}

/// In-process store. Used when no database is configured, and by the test suite.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamRepository for MemoryRepository {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: store.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            created_at: Some(Utc::now()),
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError> {
        let mut store = self.store.write().await;
        let question = Question {
            id: store.next_id(),
            content: req.content,
            options: req.options,
            correct_option: req.correct_option,
            subject: req.subject,
            topic: req.topic,
            difficulty: req.difficulty,
            tags: req.tags,
            created_at: Some(Utc::now()),
        };
        store.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> Result<Question, AppError> {
        let store = self.store.read().await;
        store
            .questions
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound("Question not found".to_string()))
    }

    async fn update_question(&self, question: &Question) -> Result<(), AppError> {
        let mut store = self.store.write().await;
        match store.questions.get_mut(&question.id) {
            Some(existing) => {
                *existing = question.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Question not found".to_string())),
        }
    }

    async fn delete_question(&self, id: i64) -> Result<(), AppError> {
        let mut store = self.store.write().await;
        let in_use = store.exams.values().any(|e| {
            e.exam.question_ids.contains(&id)
                || e.exam.sections.iter().any(|s| s.question_ids.contains(&id))
        });
        if in_use {
            return Err(AppError::Conflict(
                "Question is used by an exam".to_string(),
            ));
        }

        store
            .questions
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound("Question not found".to_string()))
    }

    async fn search_questions(
        &self,
        params: &QuestionSearchParams,
    ) -> Result<Page<Question>, AppError> {
        let store = self.store.read().await;
        let matching: Vec<&Question> = store
            .questions
            .values()
            .filter(|q| params.matches(q))
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.per_page() as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, params.page(), params.per_page(), total))
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let mut store = self.store.write().await;

        for section in &exam.sections {
            store.resolve(&section.question_ids)?;
        }
        store.resolve(&exam.question_ids)?;

        let id = store.next_id();
        let section_ids = exam.sections.iter().map(|_| store.next_id()).collect();
        let stored = StoredExam {
            id,
            section_ids,
            exam,
            created_at: Utc::now(),
        };

        let loaded = store.load_exam(&stored)?;
        store.exams.insert(id, stored);
        Ok(loaded)
    }

    async fn get_exam(&self, id: i64) -> Result<Exam, AppError> {
        let store = self.store.read().await;
        let stored = store
            .exams
            .get(&id)
            .ok_or(AppError::NotFound("Exam not found".to_string()))?;
        store.load_exam(stored)
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, AppError> {
        let store = self.store.read().await;
        store.exams.values().map(|e| store.load_exam(e)).collect()
    }

    async fn delete_exam(&self, id: i64) -> Result<(), AppError> {
        let mut store = self.store.write().await;
        if store.submissions.iter().any(|s| s.submission.exam_id == id) {
            return Err(AppError::Conflict(
                "Exam has submissions and cannot be deleted".to_string(),
            ));
        }
        store
            .exams
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound("Exam not found".to_string()))
    }

    async fn save_submission(&self, submission: &Submission) -> Result<SubmissionRecord, AppError> {
        let mut store = self.store.write().await;
        if !store.exams.contains_key(&submission.exam_id) {
            return Err(AppError::NotFound("Exam no longer exists".to_string()));
        }
        if store
            .submissions
            .iter()
            .any(|s| s.submission.session_id == submission.session_id)
        {
            return Err(AppError::Conflict(
                "Session already has a submission".to_string(),
            ));
        }

        let record = SubmissionRecord {
            id: store.next_id(),
            submission: submission.clone(),
        };
        store.submissions.push(record.clone());
        Ok(record)
    }

    async fn list_submissions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError> {
        let store = self.store.read().await;
        Ok(store
            .submissions
            .iter()
            .filter(|s| s.submission.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_submissions_for_exam(
        &self,
        exam_id: i64,
    ) -> Result<Vec<SubmissionRecord>, AppError> {
        let store = self.store.read().await;
        Ok(store
            .submissions
            .iter()
            .filter(|s| s.submission.exam_id == exam_id)
            .cloned()
            .collect())
    }
}
