// src/registry.rs

//! Live exam sessions and the task that drives their clocks.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    config::CLOCK_TICK_MILLIS,
    error::AppError,
    models::submission::{Submission, SubmissionRecord},
    repository::ExamRepository,
    session::{ExamSession, SessionPhase},
    state::AppState,
};

/// One session behind its own lock. Manual submit and the clock task both take it,
/// which keeps submission at most once.
pub type SharedSession = Arc<Mutex<ExamSession>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

/// What one clock pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub expired: usize,
    pub persisted: usize,
    pub evicted: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ExamSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True while some session for this exam is running or still waiting to be stored.
    pub async fn has_open_session(&self, exam_id: i64) -> bool {
        for shared in self.snapshot_entries().await.into_iter().map(|(_, s)| s) {
            let session = shared.lock().await;
            if session.exam().id == exam_id && !session.is_settled() {
                return true;
            }
        }
        false
    }

    async fn snapshot_entries(&self) -> Vec<(Uuid, SharedSession)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }

    /// Advances every live clock by one second, persists expiries, retries failed saves,
    /// and drops finished sessions older than `retention_secs`.
    pub async fn tick_all(
        &self,
        repo: &dyn ExamRepository,
        now: DateTime<Utc>,
        retention_secs: i64,
    ) -> TickReport {
        let entries = self.snapshot_entries().await;

        let mut report = TickReport::default();
        let mut stale = Vec::new();

        for (id, shared) in entries {
            let mut session = shared.lock().await;

            let pending = match session.tick(now) {
                Some(submission) => {
                    report.expired += 1;
                    Some(submission)
                }
                None if session.phase() == SessionPhase::Finished && !session.is_settled() => {
                    session.submission().cloned()
                }
                None => None,
            };

            if let Some(submission) = pending {
                match persist(&mut session, &submission, repo).await {
                    Ok(_) => report.persisted += 1,
                    Err(e) => {
                        tracing::error!(session_id = %id, "Failed to persist submission: {}", e)
                    }
                }
            }

            let expired_retention = session.is_settled()
                && session
                    .submission()
                    .is_some_and(|s| (now - s.completed_at).num_seconds() >= retention_secs);
            if expired_retention {
                stale.push(id);
            }
        }

        if !stale.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &stale {
                sessions.remove(id);
            }
            report.evicted = stale.len();
            tracing::debug!("Evicted {} finished sessions", stale.len());
        }

        report
    }
}

/// Stores a session's submission and marks it persisted.
///
/// A conflict means an earlier attempt already stored it; the session is marked
/// persisted and the conflict is still reported to the caller. A missing exam or
/// user cannot be fixed by retrying, so the session is settled as failed. Only
/// internal errors leave it pending for the clock task.
pub async fn persist(
    session: &mut ExamSession,
    submission: &Submission,
    repo: &dyn ExamRepository,
) -> Result<SubmissionRecord, AppError> {
    match repo.save_submission(submission).await {
        Ok(record) => {
            session.mark_persisted();
            Ok(record)
        }
        Err(AppError::Conflict(msg)) => {
            session.mark_persisted();
            Err(AppError::Conflict(msg))
        }
        Err(AppError::InternalServerError(msg)) => Err(AppError::InternalServerError(msg)),
        Err(e) => {
            if !session.is_settled() {
                tracing::error!(
                    session_id = %submission.session_id,
                    exam_id = submission.exam_id,
                    "Submission rejected by the store, giving up: {}",
                    e
                );
            }
            session.mark_save_failed();
            Err(e)
        }
    }
}

/// Runs the session clock once per tick until the runtime shuts down.
pub fn spawn_clock(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(CLOCK_TICK_MILLIS));
        loop {
            interval.tick().await;
            let report = state
                .sessions
                .tick_all(
                    state.repo.as_ref(),
                    Utc::now(),
                    state.config.session_retention_secs,
                )
                .await;
            if report.expired > 0 {
                tracing::info!("{} exam session(s) timed out", report.expired);
            }
        }
    })
}
