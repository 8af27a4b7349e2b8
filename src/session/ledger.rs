// src/session/ledger.rs

use std::collections::BTreeMap;

use serde::Serialize;

use super::SessionError;
use crate::models::submission::{QuestionState, QuestionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub answered: usize,
    pub marked_for_review: usize,
    pub not_answered: usize,
    pub total: usize,
}

/// Answer and status record for every question of a session.
///
/// Entries are created on load and never removed. Status is a single tag, so
/// marking an answered question for review replaces "answered" while keeping the answer.
#[derive(Debug, Clone)]
pub struct Ledger {
    entries: BTreeMap<i64, QuestionStatus>,
}

impl Ledger {
    pub fn new(question_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            entries: question_ids
                .into_iter()
                .map(|id| (id, QuestionStatus::default()))
                .collect(),
        }
    }

    pub fn get(&self, question_id: i64) -> Option<&QuestionStatus> {
        self.entries.get(&question_id)
    }

    fn entry_mut(&mut self, question_id: i64) -> Result<&mut QuestionStatus, SessionError> {
        self.entries
            .get_mut(&question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))
    }

    pub fn set_answer(&mut self, question_id: i64, option: usize) -> Result<(), SessionError> {
        let entry = self.entry_mut(question_id)?;
        entry.status = QuestionState::Answered;
        entry.answer = Some(option);
        Ok(())
    }

    pub fn mark_for_review(&mut self, question_id: i64) -> Result<(), SessionError> {
        self.entry_mut(question_id)?.status = QuestionState::MarkedForReview;
        Ok(())
    }

    pub fn clear_answer(&mut self, question_id: i64) -> Result<(), SessionError> {
        let entry = self.entry_mut(question_id)?;
        entry.status = QuestionState::NotAnswered;
        entry.answer = None;
        Ok(())
    }

    pub fn accrue_time(&mut self, question_id: i64, seconds: u64) -> Result<(), SessionError> {
        let entry = self.entry_mut(question_id)?;
        entry.time_spent = entry.time_spent.saturating_add(seconds);
        Ok(())
    }

    /// Chosen options, whatever the status tag says.
    pub fn answers(&self) -> BTreeMap<i64, usize> {
        self.entries
            .iter()
            .filter_map(|(&id, s)| s.answer.map(|a| (id, a)))
            .collect()
    }

    pub fn statuses(&self) -> &BTreeMap<i64, QuestionStatus> {
        &self.entries
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            answered: 0,
            marked_for_review: 0,
            not_answered: 0,
            total: self.entries.len(),
        };
        for status in self.entries.values() {
            match status.status {
                QuestionState::Answered => counts.answered += 1,
                QuestionState::MarkedForReview => counts.marked_for_review += 1,
                QuestionState::NotAnswered => counts.not_answered += 1,
            }
        }
        counts
    }
}
