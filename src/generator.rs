//! Instruction-prompted text generation.
//!
//! [`build_instruction_prompt`] turns a topic, tone and length into a single
//! instruction for an instruction-tuned seq2seq model; the
//! [`InstructionTextGenerator`] validates options, picks the token budget and
//! hands the prompt to an [`InferenceEngine`].

use std::sync::Arc;

use tracing::debug;

use crate::config::GeneratorModelConfig;
use crate::engine::{GenerationSettings, InferenceEngine};
use crate::error::Result;
use crate::types::{GenerationRequest, Length, Sentiment};

/// Build the instruction text for a request. Pure and deterministic.
pub fn build_instruction_prompt(topic: &str, sentiment: Sentiment, length: Length) -> String {
    format!(
        "You are a skilled writer. \
         Write a response that strictly follows the user's topic and instructions.\n\n\
         Topic: {topic}\n\n\
         Requirements:\n\
         - Tone: {tone}\n\
         - Length: {length}\n\
         - Stay strictly on topic\n\
         - Be coherent, well structured, and easy to follow\n\
         - Avoid repetition\n\n\
         Write the full response now.",
        tone = sentiment.tone_instruction(),
        length = length.length_guide(),
    )
}

/// Sampling knobs shared by every call; the token budget comes from the request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f32,
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::from(&GeneratorModelConfig::default())
    }
}

impl From<&GeneratorModelConfig> for SamplingParams {
    fn from(config: &GeneratorModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            repeat_penalty: config.repeat_penalty,
            seed: config.seed,
        }
    }
}

#[derive(Clone)]
pub struct InstructionTextGenerator {
    engine: Arc<dyn InferenceEngine>,
    sampling: SamplingParams,
}

impl InstructionTextGenerator {
    pub fn new(engine: Arc<dyn InferenceEngine>, sampling: SamplingParams) -> Self {
        Self { engine, sampling }
    }

    /// Generate text about `topic` in the given tone and length.
    ///
    /// `sentiment` and `length` are matched case-insensitively; anything
    /// outside the fixed sets fails with `UnsupportedOption` before the
    /// model runs. The topic is used verbatim.
    pub fn generate(&self, topic: &str, sentiment: &str, length: &str) -> Result<String> {
        let request = GenerationRequest::parse(topic, sentiment, length)?;
        self.generate_request(&request)
    }

    pub fn generate_request(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = build_instruction_prompt(&request.topic, request.sentiment, request.length);
        let settings = self.settings_for(request.length);

        debug!(
            sentiment = %request.sentiment,
            length = %request.length,
            max_new_tokens = settings.max_new_tokens,
            "generating"
        );
        let text = self.engine.generate(&prompt, &settings)?;
        Ok(text.trim().to_string())
    }

    fn settings_for(&self, length: Length) -> GenerationSettings {
        GenerationSettings {
            max_new_tokens: length.max_new_tokens(),
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            repeat_penalty: self.sampling.repeat_penalty,
            seed: self.sampling.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::engine::DummyEngine;
    use crate::error::{OptionKind, StudioError};

    /// Records what it was asked and answers with padded text.
    #[derive(Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<(String, GenerationSettings)>>,
    }

    impl InferenceEngine for RecordingEngine {
        fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String> {
            self.seen.lock().push((prompt.to_string(), settings.clone()));
            Ok("\n  Solar and wind keep getting cheaper.  \n".to_string())
        }
    }

    #[test]
    fn prompt_matches_the_template() {
        let prompt =
            build_instruction_prompt("renewable energy", Sentiment::Positive, Length::Short);
        let expected = "You are a skilled writer. Write a response that strictly follows the user's topic and instructions.\n\n\
                        Topic: renewable energy\n\n\
                        Requirements:\n\
                        - Tone: optimistic, enthusiastic, uplifting tone focusing on benefits and hopeful outcomes\n\
                        - Length: 50-75 words (2-3 sentences)\n\
                        - Stay strictly on topic\n\
                        - Be coherent, well structured, and easy to follow\n\
                        - Avoid repetition\n\n\
                        Write the full response now.";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn prompt_is_deterministic() {
        for sentiment in Sentiment::ALL {
            for length in [Length::Short, Length::Medium, Length::Long] {
                let a = build_instruction_prompt("  city parks ", sentiment, length);
                let b = build_instruction_prompt("  city parks ", sentiment, length);
                assert_eq!(a, b);
                assert!(a.contains("Topic:   city parks \n"));
                assert!(a.contains(sentiment.tone_instruction()));
                assert!(a.contains(length.length_guide()));
            }
        }
    }

    #[test]
    fn output_is_trimmed_and_budget_follows_length() {
        let engine = Arc::new(RecordingEngine::default());
        let generator = InstructionTextGenerator::new(engine.clone(), SamplingParams::default());

        let text = generator.generate("renewable energy", "POSITIVE", "Long").unwrap();
        assert_eq!(text, "Solar and wind keep getting cheaper.");

        let seen = engine.seen.lock();
        let (prompt, settings) = &seen[0];
        assert!(prompt.contains("300-400 words (2-3 paragraphs)"));
        assert_eq!(settings.max_new_tokens, 512);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.top_p, 0.9);
        assert_eq!(settings.repeat_penalty, 1.1);
    }

    #[test]
    fn unsupported_options_never_reach_the_model() {
        let engine = DummyEngine::new("stub");
        let generator = InstructionTextGenerator::new(engine.clone(), SamplingParams::default());

        let err = generator.generate("topic", "excited", "medium").unwrap_err();
        assert!(matches!(
            err,
            StudioError::UnsupportedOption { kind: OptionKind::Sentiment, ref value } if value == "excited"
        ));

        let err = generator.generate("topic", "neutral", "epic").unwrap_err();
        assert!(matches!(err, StudioError::UnsupportedOption { kind: OptionKind::Length, .. }));

        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn dummy_generation_returns_non_empty_text() {
        let engine = DummyEngine::new("stub");
        let generator = InstructionTextGenerator::new(engine.clone(), SamplingParams::default());
        let text = generator.generate("renewable energy", "positive", "short").unwrap();
        assert!(text.starts_with("[stub DUMMY] You are a skilled writer."));
        assert_eq!(engine.calls(), 1);
    }
}
