// src/models/submission.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-question lifecycle tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionState {
    NotAnswered,
    Answered,
    MarkedForReview,
}

/// Status, chosen option and accumulated seconds of one question in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStatus {
    pub status: QuestionState,
    pub answer: Option<usize>,
    pub time_spent: u64,
}

impl Default for QuestionStatus {
    fn default() -> Self {
        Self {
            status: QuestionState::NotAnswered,
            answer: None,
            time_spent: 0,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitReason {
    Manual,
    Timeout,
}

impl SubmitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::Timeout => "timeout",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(SubmitReason::Manual),
            "timeout" => Some(SubmitReason::Timeout),
            _ => None,
        }
    }
}

/// The final record of a completed exam attempt. Built once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub session_id: Uuid,
    pub user_id: i64,
    pub exam_id: i64,

    /// Question id -> chosen option index.
    pub answers: BTreeMap<i64, usize>,
    pub question_statuses: BTreeMap<i64, QuestionStatus>,

    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,

    /// Wall-clock seconds from session start to submission.
    pub time_spent: u64,
    pub is_submitted: bool,
    pub reason: SubmitReason,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// A submission as stored by the repository.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub id: i64,
    #[serde(flatten)]
    pub submission: Submission,
}
