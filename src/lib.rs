//! Topic-to-prose service: detect the sentiment of a topic with a pretrained
//! RoBERTa classifier, then write about it in a chosen tone and length with
//! an instruction-tuned T5 model.

pub mod api;
pub mod app_state;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod hub;
pub mod model_registry;
pub mod sentiment;
pub mod types;

pub use error::{Result, StudioError};
pub use generator::{build_instruction_prompt, InstructionTextGenerator};
pub use sentiment::SentimentClassifier;
pub use types::{Length, Sentiment, SentimentResult};
