// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four answer letters a multiple-choice question can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 4] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
    ];

    /// Parses a submitted letter. Only the exact uppercase letters are accepted;
    /// anything else (empty, lowercase, "E", "skip") yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(AnswerOption::A),
            "B" => Some(AnswerOption::B),
            "C" => Some(AnswerOption::C),
            "D" => Some(AnswerOption::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The context a question is drawn for. Eligibility flags are independent,
/// a question may be usable in one context and not in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizContext {
    Quiz,
    Exam,
}

/// Grouping key used to spread the selection over topics.
/// Questions without a category are pooled under `Uncategorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    Uncategorized,
    Category(i64),
}

impl From<Option<i64>> for CategoryKey {
    fn from(category_id: Option<i64>) -> Self {
        match category_id {
            Some(id) => CategoryKey::Category(id),
            None => CategoryKey::Uncategorized,
        }
    }
}

/// Represents the 'questions' table. Owned by the content store; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub category_id: Option<i64>,

    /// The text content of the question.
    pub text: String,

    pub option_a: String,
    pub option_b: String,

    /// Options C and D may be absent (stored as an empty string).
    pub option_c: Option<String>,
    pub option_d: Option<String>,

    pub correct: AnswerOption,

    pub is_active: bool,
    pub eligible_for_quiz: bool,
    pub eligible_for_exam: bool,
}

impl Question {
    pub fn category(&self) -> CategoryKey {
        CategoryKey::from(self.category_id)
    }

    pub fn is_eligible(&self, context: QuizContext) -> bool {
        self.is_active
            && match context {
                QuizContext::Quiz => self.eligible_for_quiz,
                QuizContext::Exam => self.eligible_for_exam,
            }
    }

    /// The options that are actually offered, in letter order.
    pub fn options(&self) -> Vec<PublicOption> {
        let mut options = vec![
            PublicOption {
                letter: AnswerOption::A,
                text: self.option_a.clone(),
            },
            PublicOption {
                letter: AnswerOption::B,
                text: self.option_b.clone(),
            },
        ];
        if let Some(text) = &self.option_c {
            options.push(PublicOption {
                letter: AnswerOption::C,
                text: text.clone(),
            });
        }
        if let Some(text) = &self.option_d {
            options.push(PublicOption {
                letter: AnswerOption::D,
                text: text.clone(),
            });
        }
        options
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicOption {
    pub letter: AnswerOption,
    pub text: String,
}

/// DTO for sending a question to the candidate (never includes the correct option).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<PublicOption>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            text: q.text.clone(),
            options: q.options(),
        }
    }
}
