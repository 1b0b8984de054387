//! End-to-end checks against the real pretrained models.
//!
//! These download roughly 1 GB of weights on first run, so they are ignored
//! by default: `cargo test -- --ignored`.

use candle_core::Device;
use tone_studio::config::{GeneratorModelConfig, SentimentModelConfig};
use tone_studio::engine::{CandleClassifier, CandleEngine};
use tone_studio::generator::SamplingParams;
use tone_studio::{InstructionTextGenerator, Sentiment, SentimentClassifier, StudioError};

fn classifier() -> SentimentClassifier {
    let engine = CandleClassifier::load(&SentimentModelConfig::default(), Device::Cpu)
        .expect("sentiment model loads");
    SentimentClassifier::new(engine)
}

fn generator() -> InstructionTextGenerator {
    let config = GeneratorModelConfig {
        seed: Some(299_792_458),
        ..GeneratorModelConfig::default()
    };
    let engine = CandleEngine::load(&config, Device::Cpu).expect("generator model loads");
    InstructionTextGenerator::new(engine, SamplingParams::from(&config))
}

#[test]
#[ignore = "downloads the sentiment model"]
fn positive_review_is_positive() {
    let result = classifier()
        .analyze("I absolutely love this product, it's fantastic!")
        .unwrap();
    assert_eq!(result.sentiment, Sentiment::Positive);
    assert!(result.confidence > 0.5);
    assert!((result.probabilities.sum() - 1.0).abs() < 1e-4);
}

#[test]
#[ignore = "downloads the sentiment model"]
fn complaint_is_negative() {
    let result = classifier()
        .analyze("This is the worst experience I've ever had.")
        .unwrap();
    assert_eq!(result.sentiment, Sentiment::Negative);
    assert!(result.confidence > 0.5);
}

#[test]
#[ignore = "downloads the sentiment model"]
fn empty_text_is_invalid() {
    let err = classifier().analyze("").unwrap_err();
    assert!(matches!(err, StudioError::InvalidInput(_)));
}

#[test]
#[ignore = "downloads the generation model"]
fn short_positive_text_is_roughly_short() {
    let generator = generator();
    let text = generator
        .generate("renewable energy", "positive", "short")
        .unwrap();
    let words = text.split_whitespace().count();
    assert!(!text.is_empty());
    // the model tends to undershoot the requested 50-75 words
    assert!((15..=150).contains(&words), "got {words} words: {text}");

    let err = generator.generate("topic", "excited", "medium").unwrap_err();
    assert!(matches!(err, StudioError::UnsupportedOption { .. }));
}
