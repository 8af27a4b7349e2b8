// src/session/mod.rs

//! Exam-taking session: countdown clock, navigation cursor, answer ledger and
//! the one-shot submission that ends it.
//!
//! The session is a plain state machine. Callers pass the current instant to every
//! time-sensitive operation, which keeps it deterministic under test.

pub mod clock;
pub mod ledger;
pub mod navigation;
pub mod scoring;
pub mod snapshot;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::MAX_BREAK_SECS;
use crate::models::{
    exam::Exam,
    question::Question,
    submission::{Submission, SubmitReason},
};

use clock::{SessionClock, Tick};
use ledger::Ledger;
use navigation::{Navigator, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    EmptyExam,
    PasswordRequired,
    NotStarted,
    AlreadyStarted,
    NotInProgress,
    OnBreak,
    NotOnBreak,
    AlreadySubmitted,
    UnknownQuestion(i64),
    InvalidOption { question_id: i64, option: usize },
    OutOfRange { section: usize, question: usize },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptyExam => write!(f, "Exam has no questions"),
            SessionError::PasswordRequired => write!(f, "Exam password required"),
            SessionError::NotStarted => write!(f, "Session has not started"),
            SessionError::AlreadyStarted => write!(f, "Session already started"),
            SessionError::NotInProgress => write!(f, "Session is not in progress"),
            SessionError::OnBreak => write!(f, "Session is on break"),
            SessionError::NotOnBreak => write!(f, "Session is not on break"),
            SessionError::AlreadySubmitted => write!(f, "Exam already submitted"),
            SessionError::UnknownQuestion(id) => write!(f, "Question {} is not part of this exam", id),
            SessionError::InvalidOption {
                question_id,
                option,
            } => write!(f, "Option {} does not exist on question {}", option, question_id),
            SessionError::OutOfRange { section, question } => {
                write!(f, "No question at section {} index {}", section, question)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Waiting for the exam password.
    Locked,
    Ready,
    InProgress,
    Finished,
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    id: Uuid,
    user_id: i64,
    exam: Exam,
    phase: SessionPhase,
    clock: SessionClock,
    navigator: Navigator,
    ledger: Ledger,
    started_at: Option<DateTime<Utc>>,

    /// Start of the current visit to the current question. None while on break.
    question_started_at: Option<DateTime<Utc>>,
    break_started_at: Option<DateTime<Utc>>,

    /// Built on finish; handed out again until persisted.
    submission: Option<Submission>,
    persisted: bool,
    /// The store rejected the submission for good; nothing is retried.
    save_failed: bool,
}

impl ExamSession {
    /// Initializes a fresh session: every question not-answered, clock at the full limit.
    pub fn load(exam: Exam, user_id: i64) -> Result<Self, SessionError> {
        let navigator = Navigator::new(exam.groups().iter().map(|g| g.len()).collect())?;
        let ledger = Ledger::new(exam.questions.iter().map(|q| q.id));
        let clock = SessionClock::from_minutes(exam.time_limit);
        let phase = if exam.has_password() {
            SessionPhase::Locked
        } else {
            SessionPhase::Ready
        };

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            exam,
            phase,
            clock,
            navigator,
            ledger,
            started_at: None,
            question_started_at: None,
            break_started_at: None,
            submission: None,
            persisted: false,
            save_failed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn position(&self) -> Position {
        self.navigator.position()
    }

    pub fn is_last_question(&self) -> bool {
        self.navigator.is_last_question()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Finished and either stored or given up on.
    pub fn is_settled(&self) -> bool {
        self.phase == SessionPhase::Finished && (self.persisted || self.save_failed)
    }

    pub fn current_question(&self) -> &Question {
        &self.exam.questions[self.navigator.flat_index()]
    }

    /// Called once the caller has verified the exam password.
    pub fn unlock(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Locked => {
                self.phase = SessionPhase::Ready;
                Ok(())
            }
            SessionPhase::Ready => Ok(()),
            _ => Err(SessionError::AlreadyStarted),
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Locked => Err(SessionError::PasswordRequired),
            SessionPhase::Ready => {
                self.phase = SessionPhase::InProgress;
                self.started_at = Some(now);
                self.question_started_at = Some(now);
                self.clock.start();
                Ok(())
            }
            SessionPhase::InProgress => Err(SessionError::AlreadyStarted),
            SessionPhase::Finished => Err(SessionError::AlreadySubmitted),
        }
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::Finished => Err(SessionError::AlreadySubmitted),
            SessionPhase::Locked | SessionPhase::Ready => Err(SessionError::NotStarted),
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if self.clock.is_on_break() {
            return Err(SessionError::OnBreak);
        }
        Ok(())
    }

    fn question(&self, question_id: i64) -> Result<&Question, SessionError> {
        self.exam
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))
    }

    /// Credits time spent on the current question and restarts its marker.
    fn flush_time(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.question_started_at {
            let elapsed = (now - since).num_seconds().max(0) as u64;
            let current = self.current_question().id;
            if let Err(e) = self.ledger.accrue_time(current, elapsed) {
                tracing::warn!(session_id = %self.id, "Time not credited: {}", e);
            }
            self.question_started_at = Some(now);
        }
    }

    pub fn set_answer(&mut self, question_id: i64, option: usize) -> Result<(), SessionError> {
        self.ensure_active()?;
        if option >= self.question(question_id)?.options.len() {
            return Err(SessionError::InvalidOption {
                question_id,
                option,
            });
        }
        self.ledger.set_answer(question_id, option)
    }

    pub fn mark_for_review(&mut self, question_id: i64) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.ledger.mark_for_review(question_id)
    }

    pub fn clear_answer(&mut self, question_id: i64) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.ledger.clear_answer(question_id)
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Position, SessionError> {
        self.ensure_active()?;
        self.flush_time(now);
        self.navigator.next();
        Ok(self.navigator.position())
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> Result<Position, SessionError> {
        self.ensure_active()?;
        self.flush_time(now);
        self.navigator.previous();
        Ok(self.navigator.position())
    }

    pub fn jump(
        &mut self,
        now: DateTime<Utc>,
        section: usize,
        question: usize,
    ) -> Result<Position, SessionError> {
        self.ensure_active()?;
        // Validate before crediting time so a bad target leaves the session untouched.
        let mut target = self.navigator.clone();
        target.jump(section, question)?;

        self.flush_time(now);
        self.navigator = target;
        Ok(self.navigator.position())
    }

    pub fn start_break(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.clock.start_break()?;
        self.flush_time(now);
        self.question_started_at = None;
        self.break_started_at = Some(now);
        Ok(())
    }

    pub fn end_break(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.clock.end_break()?;
        self.question_started_at = Some(now);
        self.break_started_at = None;
        Ok(())
    }

    /// Advances the clock by one second. Returns the submission when this tick expired it.
    ///
    /// A break longer than `MAX_BREAK_SECS` is ended here and the countdown resumes.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Submission> {
        if self.phase != SessionPhase::InProgress {
            return None;
        }
        let overdue = self
            .break_started_at
            .is_some_and(|since| (now - since).num_seconds() >= MAX_BREAK_SECS);
        if overdue && self.end_break(now).is_ok() {
            tracing::info!(session_id = %self.id, "Break limit reached, clock resumed");
        }
        match self.clock.tick() {
            Tick::Expired => Some(self.finish(now, SubmitReason::Timeout)),
            Tick::Idle | Tick::Paused | Tick::Running(_) => None,
        }
    }

    /// Ends the session at most once.
    ///
    /// Until `mark_persisted` is called, repeated calls return the same record so a
    /// failed save can be retried without losing answers.
    pub fn submit(
        &mut self,
        now: DateTime<Utc>,
        reason: SubmitReason,
    ) -> Result<Submission, SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(self.finish(now, reason)),
            SessionPhase::Finished if self.persisted => Err(SessionError::AlreadySubmitted),
            SessionPhase::Finished => self
                .submission
                .clone()
                .ok_or(SessionError::AlreadySubmitted),
            SessionPhase::Locked | SessionPhase::Ready => Err(SessionError::NotStarted),
        }
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Stops retries after the store refused the submission outright.
    pub fn mark_save_failed(&mut self) {
        self.save_failed = true;
    }

    fn finish(&mut self, now: DateTime<Utc>, reason: SubmitReason) -> Submission {
        self.flush_time(now);
        self.question_started_at = None;
        self.break_started_at = None;
        self.clock.stop();
        self.phase = SessionPhase::Finished;

        let answers = self.ledger.answers();
        let (correct_count, score) =
            scoring::calculate_score(&self.exam.questions, &answers, self.exam.points_per_correct);
        let started_at = self.started_at.unwrap_or(now);

        let submission = Submission {
            session_id: self.id,
            user_id: self.user_id,
            exam_id: self.exam.id,
            answers,
            question_statuses: self.ledger.statuses().clone(),
            score,
            correct_count,
            total_questions: self.exam.questions.len() as u32,
            time_spent: (now - started_at).num_seconds().max(0) as u64,
            is_submitted: true,
            reason,
            started_at,
            completed_at: now,
        };

        tracing::info!(
            session_id = %self.id,
            exam_id = self.exam.id,
            user_id = self.user_id,
            score,
            reason = reason.as_str(),
            "Exam session finished"
        );

        self.submission = Some(submission.clone());
        submission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::models::{
        exam::Section,
        question::{ContentLayer, Difficulty},
        submission::QuestionState,
    };

    fn question(id: i64, correct_option: usize) -> Question {
        Question {
            id,
            content: vec![ContentLayer::Text {
                text: format!("Question {}", id),
            }],
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_option,
            subject: "general".into(),
            topic: "misc".into(),
            difficulty: Difficulty::Easy,
            tags: vec![],
            created_at: None,
        }
    }

    fn section(id: i64, questions: Vec<Question>) -> Section {
        Section {
            id,
            name: format!("Section {}", id),
            description: None,
            time_limit: None,
            marks: None,
            questions,
        }
    }

    /// Two sections with 3 and 2 questions; question N has correct option N % 4.
    fn two_section_exam() -> Exam {
        let first: Vec<Question> = (1..=3).map(|id| question(id, (id % 4) as usize)).collect();
        let second: Vec<Question> = (4..=5).map(|id| question(id, (id % 4) as usize)).collect();
        let questions = first.iter().chain(second.iter()).cloned().collect();
        Exam {
            id: 10,
            name: "Final".into(),
            description: None,
            time_limit: 1,
            password_hash: None,
            points_per_correct: 1,
            sections: vec![section(1, first), section(2, second)],
            questions,
            created_by: 1,
            created_at: None,
        }
    }

    fn started(exam: Exam) -> (ExamSession, DateTime<Utc>) {
        let now = Utc::now();
        let mut session = ExamSession::load(exam, 42).unwrap();
        session.start(now).unwrap();
        (session, now)
    }

    #[test]
    fn test_all_correct_two_sections() {
        let (mut session, now) = started(two_section_exam());
        for id in 1..=5 {
            session.set_answer(id, (id % 4) as usize).unwrap();
            if !session.is_last_question() {
                session.next(now).unwrap();
            }
        }
        assert!(session.is_last_question());
        assert_eq!(session.ledger().counts().answered, 5);

        let submission = session.submit(now, SubmitReason::Manual).unwrap();
        assert_eq!(submission.score, 5);
        assert_eq!(submission.correct_count, 5);
        assert_eq!(submission.total_questions, 5);
        assert!(submission.is_submitted);
    }

    #[test]
    fn test_ten_points_per_correct() {
        let mut exam = two_section_exam();
        exam.points_per_correct = 10;
        let (mut session, now) = started(exam);
        session.set_answer(1, 1).unwrap();
        session.set_answer(2, 0).unwrap();

        let submission = session.submit(now, SubmitReason::Manual).unwrap();
        assert_eq!(submission.correct_count, 1);
        assert_eq!(submission.score, 10);
    }

    #[test]
    fn test_answer_survives_navigation() {
        let (mut session, now) = started(two_section_exam());
        session.set_answer(1, 3).unwrap();
        session.next(now).unwrap();
        session.jump(now, 1, 1).unwrap();
        session.previous(now).unwrap();
        session.jump(now, 0, 0).unwrap();

        let status = session.ledger().get(1).unwrap();
        assert_eq!(status.answer, Some(3));
        assert_eq!(status.status, QuestionState::Answered);
    }

    #[test]
    fn test_navigation_accrues_time_to_question_left() {
        let (mut session, start) = started(two_section_exam());
        session.next(start + Duration::seconds(7)).unwrap();
        session.next(start + Duration::seconds(10)).unwrap();
        session.jump(start + Duration::seconds(30), 0, 0).unwrap();

        assert_eq!(session.ledger().get(1).unwrap().time_spent, 7);
        assert_eq!(session.ledger().get(2).unwrap().time_spent, 3);
        assert_eq!(session.ledger().get(3).unwrap().time_spent, 20);
    }

    #[test]
    fn test_break_time_is_not_credited() {
        let (mut session, start) = started(two_section_exam());
        session.start_break(start + Duration::seconds(5)).unwrap();
        assert!(matches!(session.set_answer(1, 0), Err(SessionError::OnBreak)));
        assert!(matches!(
            session.next(start + Duration::seconds(6)),
            Err(SessionError::OnBreak)
        ));
        session.end_break(start + Duration::seconds(65)).unwrap();
        session.next(start + Duration::seconds(70)).unwrap();

        assert_eq!(session.ledger().get(1).unwrap().time_spent, 10);
    }

    #[test]
    fn test_clock_expiry_auto_submits_once() {
        let (mut session, now) = started(two_section_exam());
        session.set_answer(1, 1).unwrap();
        session.set_answer(4, 0).unwrap();

        let mut submissions = Vec::new();
        for i in 0..200 {
            if i % 7 == 0 {
                let _ = session.start_break(now);
            } else if i % 7 == 3 {
                let _ = session.end_break(now);
            }
            if let Some(sub) = session.tick(now) {
                submissions.push(sub);
            }
        }

        assert_eq!(submissions.len(), 1);
        assert_eq!(session.clock().time_left(), 0);
        assert_eq!(session.phase(), SessionPhase::Finished);

        let submission = &submissions[0];
        assert_eq!(submission.reason, SubmitReason::Timeout);
        assert_eq!(submission.answers.len(), 2);
        assert_eq!(submission.score, 2);
    }

    #[test]
    fn test_submit_is_at_most_once() {
        let (mut session, now) = started(two_section_exam());
        let first = session.submit(now, SubmitReason::Manual).unwrap();

        // Not yet persisted: the same record comes back for a retry.
        let retry = session.submit(now + Duration::seconds(5), SubmitReason::Manual).unwrap();
        assert_eq!(first, retry);
        assert!(session.tick(now).is_none());

        session.mark_persisted();
        assert!(matches!(
            session.submit(now, SubmitReason::Manual),
            Err(SessionError::AlreadySubmitted)
        ));
        assert!(matches!(session.set_answer(1, 0), Err(SessionError::AlreadySubmitted)));
    }

    #[test]
    fn test_elapsed_is_wall_clock() {
        let (mut session, start) = started(two_section_exam());
        let submission = session
            .submit(start + Duration::seconds(42), SubmitReason::Manual)
            .unwrap();
        assert_eq!(submission.time_spent, 42);
        assert_eq!(submission.question_statuses[&1].time_spent, 42);
    }

    #[test]
    fn test_password_gate() {
        let mut exam = two_section_exam();
        exam.password_hash = Some("hash".into());
        let mut session = ExamSession::load(exam, 1).unwrap();
        assert_eq!(session.phase(), SessionPhase::Locked);
        assert!(matches!(
            session.start(Utc::now()),
            Err(SessionError::PasswordRequired)
        ));

        session.unlock().unwrap();
        session.start(Utc::now()).unwrap();
        assert_eq!(session.phase(), SessionPhase::InProgress);
    }

    #[test]
    fn test_invalid_option_rejected() {
        let (mut session, _) = started(two_section_exam());
        assert!(matches!(
            session.set_answer(1, 4),
            Err(SessionError::InvalidOption { .. })
        ));
        assert!(matches!(
            session.set_answer(99, 0),
            Err(SessionError::UnknownQuestion(99))
        ));
    }

    #[test]
    fn test_legacy_flat_exam() {
        let mut exam = two_section_exam();
        exam.sections.clear();
        let (mut session, now) = started(exam);

        for _ in 0..4 {
            assert!(!session.is_last_question());
            session.next(now).unwrap();
        }
        assert!(session.is_last_question());
        assert_eq!(session.position(), Position { section: 0, question: 4 });
        assert_eq!(session.current_question().id, 5);
    }

    #[test]
    fn test_counts_always_sum_to_total() {
        let (mut session, _) = started(two_section_exam());
        session.set_answer(1, 0).unwrap();
        session.set_answer(2, 0).unwrap();
        session.mark_for_review(2).unwrap();
        session.mark_for_review(3).unwrap();
        session.clear_answer(1).unwrap();

        let counts = session.ledger().counts();
        assert_eq!(counts.answered, 0);
        assert_eq!(counts.marked_for_review, 2);
        assert_eq!(counts.not_answered, 3);
        assert_eq!(
            counts.answered + counts.marked_for_review + counts.not_answered,
            counts.total
        );
    }

    #[test]
    fn test_overlong_break_resumes_clock() {
        let (mut session, start) = started(two_section_exam());
        session.start_break(start).unwrap();

        assert!(session.tick(start + Duration::seconds(MAX_BREAK_SECS - 1)).is_none());
        assert!(session.clock().is_on_break());
        assert_eq!(session.clock().time_left(), 60);

        let resumed_at = start + Duration::seconds(MAX_BREAK_SECS);
        assert!(session.tick(resumed_at).is_none());
        assert!(!session.clock().is_on_break());
        assert_eq!(session.clock().time_left(), 59);

        let mut submission = None;
        for _ in 0..59 {
            submission = submission.or(session.tick(resumed_at));
        }
        assert_eq!(submission.unwrap().reason, SubmitReason::Timeout);
        assert_eq!(session.phase(), SessionPhase::Finished);
    }

    #[test]
    fn test_settled_after_store_refusal() {
        let (mut session, now) = started(two_section_exam());
        session.submit(now, SubmitReason::Manual).unwrap();
        assert!(!session.is_settled());

        session.mark_save_failed();
        assert!(session.is_settled());
        assert!(!session.is_persisted());
    }
}
