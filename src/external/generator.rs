//! Quiz-content generation collaborator interface.
//!
//! Question generation runs in an external service and can take long
//! enough that the gateway dispatches it onto a background task, feeding
//! progress events to the room while it runs.

use async_trait::async_trait;

use crate::domain::RoomId;
use crate::domain::room::{AnswerType, Difficulty, MainCategory, SubCategory};
use crate::error::GatewayError;

/// Parameters for one generation run, taken from the room settings.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Room the quiz is generated for.
    pub room_id: RoomId,
    /// Top-level category.
    pub main_category: MainCategory,
    /// Second-level category.
    pub sub_category: SubCategory,
    /// Answer format.
    pub answer_type: AnswerType,
    /// Question difficulty.
    pub difficulty: Difficulty,
    /// Number of questions to generate.
    pub problem_count: u32,
}

/// A generated quiz: question texts plus the parallel answer key.
///
/// `questions[i]` is answered by `answer_key[i]`; the key is stored
/// server-side and never broadcast with a question.
#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    /// Question texts in play order.
    pub questions: Vec<String>,
    /// Correct answer per question, same order.
    pub answer_key: Vec<String>,
}

/// Generates quiz content for a room.
#[async_trait]
pub trait QuizGenerator: Send + Sync + std::fmt::Debug {
    /// Generates `request.problem_count` questions.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] when the generation backend
    /// fails; the caller degrades to a single failed progress event.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuiz, GatewayError>;
}

/// Deterministic generator used by tests and development runs.
///
/// Produces numbered multiple-choice questions whose correct answer
/// cycles through the option letters.
#[derive(Debug, Clone, Default)]
pub struct CannedGenerator;

const OPTION_LETTERS: [&str; 4] = ["a", "b", "c", "d"];

#[async_trait]
impl QuizGenerator for CannedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuiz, GatewayError> {
        if request.problem_count == 0 {
            return Err(GatewayError::Internal(
                "generation requested zero questions".to_string(),
            ));
        }
        let count = request.problem_count as usize;
        let mut questions = Vec::with_capacity(count);
        let mut answer_key = Vec::with_capacity(count);
        for i in 0..count {
            questions.push(format!(
                "{n}. [{main} / {sub}] Sample question {n}\na) option 1\nb) option 2\nc) option 3\nd) option 4",
                n = i + 1,
                main = request.main_category.label(),
                sub = request.sub_category.label(),
            ));
            let letter = OPTION_LETTERS
                .get(i % OPTION_LETTERS.len())
                .copied()
                .unwrap_or("a");
            answer_key.push(letter.to_string());
        }
        Ok(GeneratedQuiz {
            questions,
            answer_key,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            room_id: RoomId::new(),
            main_category: MainCategory::Science,
            sub_category: SubCategory::Physics,
            answer_type: AnswerType::MultipleChoice,
            difficulty: Difficulty::Normal,
            problem_count: count,
        }
    }

    #[tokio::test]
    async fn canned_generator_is_deterministic() {
        let generator = CannedGenerator;
        let a = generator.generate(&request(5)).await.ok();
        let b = generator.generate(&request(5)).await.ok();
        let (Some(a), Some(b)) = (a, b) else {
            panic!("generation failed");
        };
        assert_eq!(a.questions, b.questions);
        assert_eq!(a.answer_key, b.answer_key);
        assert_eq!(a.questions.len(), 5);
        assert_eq!(a.answer_key.len(), 5);
    }

    #[tokio::test]
    async fn canned_generator_rejects_zero_count() {
        let generator = CannedGenerator;
        assert!(generator.generate(&request(0)).await.is_err());
    }
}
