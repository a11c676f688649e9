// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Question kind tag. Stored as the Postgres enum 'answer_type'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "answer_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    SingleChoice,
    MultiChoice,
    FreeText,
    TrueFalse,
}

impl AnswerType {
    /// Choice-based kinds carry an option list; the other kinds do not.
    pub fn has_options(&self) -> bool {
        matches!(self, AnswerType::SingleChoice | AnswerType::MultiChoice)
    }
}

/// One selectable option of a choice-based question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,

    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    pub image_url: Option<String>,

    pub answer_type: AnswerType,

    /// Options for choice-based kinds. Stored as a JSONB array.
    pub options: Json<Vec<QuestionOption>>,

    /// Correctness set: option ids, the literals "true"/"false", or exact
    /// text strings, depending on `answer_type`. Never empty.
    pub correct_answers: Json<Vec<String>>,

    /// Points awarded when the recorded answer set matches exactly.
    pub points: i64,

    /// Order of the question inside its quiz.
    pub position: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to clients (excludes the correctness set).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub answer_type: AnswerType,
    pub options: Json<Vec<QuestionOption>>,
    pub points: i64,
}

impl From<QuizQuestion> for PublicQuestion {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            content: q.content,
            image_url: q.image_url,
            answer_type: q.answer_type,
            options: q.options,
            points: q.points,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub answer_type: AnswerType,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[validate(length(min = 1, message = "At least one correct answer is required."))]
    pub correct_answers: Vec<String>,
    #[validate(range(min = 0))]
    pub points: i64,
    #[serde(default)]
    pub position: i64,
}

impl CreateQuestionRequest {
    /// Cross-field invariants that field rules cannot express.
    ///
    /// * Choice kinds must carry options, and every correct answer must
    ///   reference an existing option id.
    /// * True/false correctness sets may only hold "true" or "false".
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.answer_type {
            AnswerType::SingleChoice | AnswerType::MultiChoice => {
                if self.options.is_empty() {
                    return Err("Choice questions require at least one option".to_string());
                }
                for answer in &self.correct_answers {
                    if !self.options.iter().any(|opt| &opt.id == answer) {
                        return Err(format!(
                            "Correct answer '{}' does not match any option id",
                            answer
                        ));
                    }
                }
            }
            AnswerType::TrueFalse => {
                for answer in &self.correct_answers {
                    if answer != "true" && answer != "false" {
                        return Err("True/false answers must be 'true' or 'false'".to_string());
                    }
                }
            }
            AnswerType::FreeText => {}
        }
        Ok(())
    }
}
