// src/session/snapshot.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ExamSession, SessionPhase, ledger::StatusCounts, navigation::Position};
use crate::models::{
    question::PublicQuestion,
    submission::{QuestionState, SubmitReason},
};

#[derive(Debug, Serialize)]
pub struct QuestionProgress {
    pub question_id: i64,
    pub status: QuestionState,
    pub answer: Option<usize>,
    pub time_spent: u64,
}

/// Navigation panel entry for one section.
#[derive(Debug, Serialize)]
pub struct SectionProgress {
    pub name: String,
    pub questions: Vec<QuestionProgress>,
}

#[derive(Debug, Serialize)]
pub struct SessionResult {
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_spent: u64,
    pub reason: SubmitReason,
    pub completed_at: DateTime<Utc>,
    pub persisted: bool,
}

/// Everything a client needs to render the exam screen.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub exam_id: i64,
    pub exam_name: String,
    pub phase: SessionPhase,
    pub time_left: u32,
    pub on_break: bool,
    pub position: Position,
    pub is_last_question: bool,

    /// Only present while the exam is being taken.
    pub current_question: Option<PublicQuestion>,
    pub sections: Vec<SectionProgress>,
    pub counts: StatusCounts,
    pub result: Option<SessionResult>,
}

impl ExamSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        let exam = self.exam();
        let ledger = self.ledger();

        let names: Vec<String> = if exam.sections.is_empty() {
            vec![exam.name.clone()]
        } else {
            exam.sections.iter().map(|s| s.name.clone()).collect()
        };

        let sections = exam
            .groups()
            .into_iter()
            .zip(names)
            .map(|(questions, name)| SectionProgress {
                name,
                questions: questions
                    .iter()
                    .map(|q| {
                        let status = ledger.get(q.id).cloned().unwrap_or_default();
                        QuestionProgress {
                            question_id: q.id,
                            status: status.status,
                            answer: status.answer,
                            time_spent: status.time_spent,
                        }
                    })
                    .collect(),
            })
            .collect();

        let current_question = (self.phase() == SessionPhase::InProgress)
            .then(|| PublicQuestion::from(self.current_question()));

        let result = self.submission().map(|s| SessionResult {
            score: s.score,
            correct_count: s.correct_count,
            total_questions: s.total_questions,
            time_spent: s.time_spent,
            reason: s.reason,
            completed_at: s.completed_at,
            persisted: self.is_persisted(),
        });

        SessionSnapshot {
            session_id: self.id(),
            exam_id: exam.id,
            exam_name: exam.name.clone(),
            phase: self.phase(),
            time_left: self.clock().time_left(),
            on_break: self.clock().is_on_break(),
            position: self.position(),
            is_last_question: self.is_last_question(),
            current_question,
            sections,
            counts: ledger.counts(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        exam::Exam,
        question::{ContentLayer, Difficulty, Question},
        submission::SubmitReason,
    };

    fn exam() -> Exam {
        let questions: Vec<Question> = (1..=3)
            .map(|id| Question {
                id,
                content: vec![ContentLayer::Text {
                    text: format!("Q{}", id),
                }],
                options: vec!["yes".into(), "no".into()],
                correct_option: 0,
                subject: "s".into(),
                topic: "t".into(),
                difficulty: Difficulty::Hard,
                tags: vec![],
                created_at: None,
            })
            .collect();
        Exam {
            id: 3,
            name: "Quiz".into(),
            description: None,
            time_limit: 5,
            password_hash: None,
            points_per_correct: 1,
            sections: vec![],
            questions,
            created_by: 1,
            created_at: None,
        }
    }

    #[test]
    fn test_snapshot_while_in_progress() {
        let now = Utc::now();
        let mut session = ExamSession::load(exam(), 7).unwrap();
        session.start(now).unwrap();
        session.set_answer(2, 1).unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::InProgress);
        assert_eq!(snap.time_left, 300);
        assert_eq!(snap.sections.len(), 1);
        assert_eq!(snap.sections[0].name, "Quiz");
        assert_eq!(snap.sections[0].questions[1].answer, Some(1));
        assert_eq!(snap.current_question.map(|q| q.id), Some(1));
        assert!(snap.result.is_none());

        // The answer key never leaves the server.
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert!(json["current_question"].get("correct_option").is_none());
    }

    #[test]
    fn test_snapshot_after_submit() {
        let now = Utc::now();
        let mut session = ExamSession::load(exam(), 7).unwrap();
        session.start(now).unwrap();
        session.set_answer(1, 0).unwrap();
        session.submit(now, SubmitReason::Manual).unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::Finished);
        assert!(snap.current_question.is_none());
        let result = snap.result.unwrap();
        assert_eq!(result.score, 1);
        assert!(!result.persisted);
    }
}
