// src/models/question.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,31}$").expect("valid tag regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// One renderable piece of a question body. A question is an ordered stack of layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentLayer {
    Text { text: String },
    Image { url: String, alt: Option<String> },
}

/// A multiple-choice question from the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Body of the question, rendered top to bottom.
    pub content: Vec<ContentLayer>,

    /// Ordered answer options.
    pub options: Vec<String>,

    /// Index into `options` of the correct answer.
    pub correct_option: usize,

    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// Plain text of all text layers, used for searching.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|layer| match layer {
                ContentLayer::Text { text } => Some(text.as_str()),
                ContentLayer::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// DTO for sending a question to a student (excludes the answer key and tags).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: Vec<ContentLayer>,
    pub options: Vec<String>,
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            content: q.content.clone(),
            options: q.options.clone(),
            subject: q.subject.clone(),
            topic: q.topic.clone(),
            difficulty: q.difficulty,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(custom(function = validate_layers))]
    pub content: Vec<ContentLayer>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_option: usize,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 100))]
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
}

impl CreateQuestionRequest {
    /// Field-level validation plus the answer key range check.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        check_answer_key(self.correct_option, &self.options)
    }
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(custom(function = validate_layers))]
    pub content: Option<Vec<ContentLayer>>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    pub correct_option: Option<usize>,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
}

impl UpdateQuestionRequest {
    /// Applies the present fields and re-checks the answer key against the merged options.
    pub fn apply(self, question: &mut Question) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;

        if let Some(content) = self.content {
            question.content = content;
        }
        if let Some(options) = self.options {
            question.options = options;
        }
        if let Some(correct_option) = self.correct_option {
            question.correct_option = correct_option;
        }
        if let Some(subject) = self.subject {
            question.subject = subject;
        }
        if let Some(topic) = self.topic {
            question.topic = topic;
        }
        if let Some(difficulty) = self.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(tags) = self.tags {
            question.tags = tags;
        }

        check_answer_key(question.correct_option, &question.options)
    }
}

/// Query parameters for searching the question bank.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct QuestionSearchParams {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,

    /// Case-insensitive substring match on the question text.
    pub q: Option<String>,
}

impl QuestionSearchParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }

    pub fn matches(&self, question: &Question) -> bool {
        if let Some(subject) = &self.subject {
            if !question.subject.eq_ignore_ascii_case(subject) {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            if !question.topic.eq_ignore_ascii_case(topic) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != difficulty {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !question.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(q) = &self.q {
            let needle = q.to_lowercase();
            if !question.text().to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

fn check_answer_key(correct_option: usize, options: &[String]) -> Result<(), String> {
    if correct_option >= options.len() {
        return Err(format!(
            "correct_option {} is out of range for {} options",
            correct_option,
            options.len()
        ));
    }
    Ok(())
}

fn validate_layers(layers: &[ContentLayer]) -> Result<(), validator::ValidationError> {
    if layers.is_empty() {
        return Err(validator::ValidationError::new("content_cannot_be_empty"));
    }
    for layer in layers {
        match layer {
            ContentLayer::Text { text } if text.trim().is_empty() || text.len() > 5000 => {
                return Err(validator::ValidationError::new("invalid_text_layer"));
            }
            ContentLayer::Image { url, .. } if url.len() > 2048 || Url::parse(url).is_err() => {
                return Err(validator::ValidationError::new("invalid_image_layer"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 10 {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 20 {
        return Err(validator::ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| !TAG_RE.is_match(t)) {
        return Err(validator::ValidationError::new("invalid_tag"));
    }
    Ok(())
}
