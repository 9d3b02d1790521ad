pub mod openai;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use openai::OpenAiReasoner;
pub use parse::{fallback_decision, parse_decision, FALLBACK_ACTION, FALLBACK_CONFIDENCE};
pub use prompt::build_event_prompt;
pub use provider::{Reasoner, ReasonerError, ScriptedReasoner};
