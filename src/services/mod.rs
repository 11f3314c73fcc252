pub mod decode;
pub mod inference;
pub mod prompt;

pub use decode::decode_grade_response;
pub use inference::{Credential, EvaluationRequest, Evaluator, OpenAiEvaluator};
