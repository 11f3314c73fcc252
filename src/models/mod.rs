pub mod evaluation;
pub mod phase;
pub mod rubric;

pub use evaluation::{Decision, EvaluationResult, Score, ScoreLine};
pub use phase::Phase;
pub use rubric::{parse_points, RubricItem, SubmissionImage};
