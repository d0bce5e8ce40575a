use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::Question;

/// Answers submitted for a course quiz, one per question position.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuizAnswers {
    #[serde(default)]
    #[schema(value_type = Vec<u32>)]
    pub answers: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
}

/// Index chosen at an answer position, if the value is a usable index.
///
/// Integral floats such as `1.0` are the same number as `1`.
fn chosen_index(answer: Option<&Value>) -> Option<u64> {
    let answer = answer?;
    answer.as_u64().or_else(|| {
        answer
            .as_f64()
            .filter(|it| it.is_finite() && *it >= 0.0 && it.fract() == 0.0)
            .map(|it| it as u64)
    })
}

impl QuizAnswers {
    /// Scores answers against the stored questions.
    ///
    /// Missing, null or non-integer answers count as wrong. A quiz without
    /// questions scores 0%.
    pub fn validate(&self, questions: &[Question]) -> QuizResult {
        let score = questions
            .iter()
            .enumerate()
            .filter(|(i, q)| {
                chosen_index(self.answers.get(*i)) == Some(q.correct_answer_index as u64)
            })
            .count() as u32;
        let total = questions.len() as u32;

        let percentage = if total == 0 {
            0.0
        } else {
            score as f64 * 100.0 / total as f64
        };

        QuizResult {
            score,
            total,
            percentage,
        }
    }
}
