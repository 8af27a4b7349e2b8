// src/models/exam.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::Question;

/// A named, optionally time-boxed group of questions inside an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Suggested minutes for this section. The exam clock is the only one enforced.
    pub time_limit: Option<u32>,
    pub marks: Option<u32>,

    /// Ordered questions of the section.
    pub questions: Vec<Question>,
}

/// A fully loaded exam definition.
///
/// When `sections` is non-empty, `questions` is the flattened section order.
/// When it is empty, `questions` is the authoritative flat list of a legacy exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Exam duration in minutes.
    pub time_limit: u32,

    /// Argon2 hash of the exam password, if the exam is password protected.
    #[serde(skip)]
    pub password_hash: Option<String>,

    pub points_per_correct: u32,
    pub sections: Vec<Section>,
    pub questions: Vec<Question>,
    pub created_by: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Exam {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Question groups in navigation order. A legacy exam is a single implicit group.
    pub fn groups(&self) -> Vec<&[Question]> {
        if self.sections.is_empty() {
            vec![self.questions.as_slice()]
        } else {
            self.sections.iter().map(|s| s.questions.as_slice()).collect()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub description: Option<String>,
    pub time_limit: Option<u32>,
    pub marks: Option<u32>,
    pub question_count: usize,
}

/// What a student sees before opening an exam.
#[derive(Debug, Serialize)]
pub struct ExamSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub time_limit: u32,
    pub has_password: bool,
    pub points_per_correct: u32,
    pub total_questions: usize,
    pub sections: Vec<SectionSummary>,
}

impl From<&Exam> for ExamSummary {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id,
            name: exam.name.clone(),
            description: exam.description.clone(),
            time_limit: exam.time_limit,
            has_password: exam.has_password(),
            points_per_correct: exam.points_per_correct,
            total_questions: exam.total_questions(),
            sections: exam
                .sections
                .iter()
                .map(|s| SectionSummary {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    time_limit: s.time_limit,
                    marks: s.marks,
                    question_count: s.questions.len(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit: Option<u32>,
    #[validate(range(max = 10000))]
    pub marks: Option<u32>,
    #[validate(length(min = 1, message = "A section needs at least one question."))]
    pub question_ids: Vec<i64>,
}

/// DTO for authoring an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600, message = "Time limit must be between 1 and 600 minutes."))]
    pub time_limit: u32,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub points_per_correct: Option<u32>,
    #[serde(default)]
    #[validate(nested)]
    pub sections: Vec<CreateSectionRequest>,

    /// Flat question list, used only when `sections` is empty.
    #[serde(default)]
    pub question_ids: Vec<i64>,
}

impl CreateExamRequest {
    /// Every question id of the exam, in navigation order.
    pub fn ordered_question_ids(&self) -> Vec<i64> {
        if self.sections.is_empty() {
            self.question_ids.clone()
        } else {
            self.sections
                .iter()
                .flat_map(|s| s.question_ids.iter().copied())
                .collect()
        }
    }

    /// Field validation plus layout rules: at least one question, no question twice.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;

        let ids = self.ordered_question_ids();
        if ids.is_empty() {
            return Err("An exam needs at least one question.".to_string());
        }
        if !self.sections.is_empty() && !self.question_ids.is_empty() {
            return Err("Provide either sections or question_ids, not both.".to_string());
        }

        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(format!("Question {} appears more than once.", id));
            }
        }
        Ok(())
    }
}

/// Exam definition with ids resolved by the handler and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub name: String,
    pub description: Option<String>,
    pub time_limit: u32,
    pub password_hash: Option<String>,
    pub points_per_correct: u32,
    pub sections: Vec<NewSection>,
    pub question_ids: Vec<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct NewSection {
    pub name: String,
    pub description: Option<String>,
    pub time_limit: Option<u32>,
    pub marks: Option<u32>,
    pub question_ids: Vec<i64>,
}

/// DTO for opening an exam.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(ids: Vec<i64>) -> CreateSectionRequest {
        CreateSectionRequest {
            name: "Part".to_string(),
            description: None,
            time_limit: None,
            marks: None,
            question_ids: ids,
        }
    }

    fn request(sections: Vec<CreateSectionRequest>, question_ids: Vec<i64>) -> CreateExamRequest {
        CreateExamRequest {
            name: "Midterm".to_string(),
            description: None,
            time_limit: 30,
            password: None,
            points_per_correct: None,
            sections,
            question_ids,
        }
    }

    #[test]
    fn test_sections_define_order() {
        let req = request(vec![section(vec![3, 1]), section(vec![2])], vec![]);
        assert!(req.check().is_ok());
        assert_eq!(req.ordered_question_ids(), vec![3, 1, 2]);
    }

    #[test]
    fn test_legacy_flat_list() {
        let req = request(vec![], vec![5, 6]);
        assert!(req.check().is_ok());
        assert_eq!(req.ordered_question_ids(), vec![5, 6]);
    }

    #[test]
    fn test_empty_exam_rejected() {
        assert!(request(vec![], vec![]).check().is_err());
    }

    #[test]
    fn test_duplicate_question_rejected() {
        let req = request(vec![section(vec![1]), section(vec![1])], vec![]);
        assert!(req.check().is_err());
    }

    #[test]
    fn test_empty_section_rejected() {
        let req = request(vec![section(vec![])], vec![]);
        assert!(req.check().is_err());
    }

    #[test]
    fn test_time_limit_bounds() {
        let mut req = request(vec![], vec![1]);
        req.time_limit = 0;
        assert!(req.check().is_err());
    }
}
