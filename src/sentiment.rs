//! Three-way sentiment classification over a pretrained sequence classifier.

use std::sync::Arc;
use std::time::Instant;

use candle_core::D;
use candle_nn::ops::softmax;
use tracing::debug;

use crate::engine::{ClassifierEngine, NUM_LABELS};
use crate::error::{Result, StudioError};
use crate::types::{Probabilities, Sentiment, SentimentResult};

/// Maps text to the dominant sentiment label and its probability.
///
/// Holds the classifier engine for the life of the process; cloning shares it.
#[derive(Clone)]
pub struct SentimentClassifier {
    engine: Arc<dyn ClassifierEngine>,
}

impl SentimentClassifier {
    pub fn new(engine: Arc<dyn ClassifierEngine>) -> Self {
        Self { engine }
    }

    /// Classify `text`.
    ///
    /// Fails with [`StudioError::InvalidInput`] on empty or whitespace-only
    /// text without touching the model. Exact ties go to the lowest label
    /// index (negative, then neutral).
    pub fn analyze(&self, text: &str) -> Result<SentimentResult> {
        if text.trim().is_empty() {
            return Err(StudioError::InvalidInput(
                "Input text must not be empty.".to_string(),
            ));
        }

        let start = Instant::now();
        let logits = self.engine.logits(text)?;
        let probabilities = softmax(&logits, D::Minus1)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let result = from_probabilities(&probabilities)?;

        debug!(
            sentiment = %result.sentiment,
            confidence = result.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analyzed sentiment"
        );
        Ok(result)
    }
}

fn from_probabilities(probabilities: &[f32]) -> Result<SentimentResult> {
    if probabilities.len() != NUM_LABELS {
        return Err(StudioError::InferenceFailure(format!(
            "expected {NUM_LABELS} class scores, got {}",
            probabilities.len()
        )));
    }

    if let Some(index) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(StudioError::InferenceFailure(format!(
            "class score {index} is not finite: {probabilities:?}"
        )));
    }

    let mut top_index = 0;
    for (index, &p) in probabilities.iter().enumerate() {
        if p > probabilities[top_index] {
            top_index = index;
        }
    }

    let sentiment = Sentiment::from_index(top_index)
        .ok_or_else(|| StudioError::inference(format!("no label for class {top_index}")))?;

    Ok(SentimentResult {
        sentiment,
        confidence: probabilities[top_index],
        probabilities: Probabilities {
            negative: probabilities[0],
            neutral: probabilities[1],
            positive: probabilities[2],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DummyClassifier;

    fn stub_classifier(logits: &[f32]) -> (SentimentClassifier, Arc<DummyClassifier>) {
        let engine = DummyClassifier::with_logits("stub", logits);
        (SentimentClassifier::new(engine.clone()), engine)
    }

    #[test]
    fn empty_and_blank_text_is_rejected_before_inference() {
        let (classifier, engine) = stub_classifier(&[0.0, 0.0, 1.0]);
        for text in ["", "   ", "\n\t  \r\n"] {
            let err = classifier.analyze(text).unwrap_err();
            assert!(matches!(err, StudioError::InvalidInput(_)), "{text:?}");
        }
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn picks_the_most_probable_label() {
        let (classifier, engine) = stub_classifier(&[-1.5, 0.2, 3.1]);
        let result = classifier.analyze("I absolutely love this product!").unwrap();

        assert_eq!(result.sentiment, Sentiment::Positive);
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
        assert_eq!(result.confidence, result.probabilities.get(Sentiment::Positive));
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn probabilities_form_a_distribution() {
        let (classifier, _) = stub_classifier(&[4.0, -2.0, 0.5]);
        let result = classifier.analyze("This is the worst experience I've ever had.").unwrap();

        assert_eq!(result.sentiment, Sentiment::Negative);
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-5);
        for s in Sentiment::ALL {
            let p = result.probabilities.get(s);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        let (classifier, _) = stub_classifier(&[0.0, 2.0, 2.0]);
        let result = classifier.analyze("meh").unwrap();
        assert_eq!(result.sentiment, Sentiment::Neutral);

        let (classifier, _) = stub_classifier(&[1.0, 1.0, 1.0]);
        let result = classifier.analyze("meh").unwrap();
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert!((result.confidence - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_number_of_scores_is_an_inference_failure() {
        let (classifier, _) = stub_classifier(&[0.1, 0.9]);
        let err = classifier.analyze("two labels only").unwrap_err();
        assert!(matches!(err, StudioError::InferenceFailure(_)));
    }

    #[test]
    fn non_finite_scores_are_an_inference_failure() {
        for logits in [[f32::NAN, 0.0, 1.0], [0.0, f32::INFINITY, 1.0]] {
            let (classifier, engine) = stub_classifier(&logits);
            let err = classifier.analyze("overflowed half-precision run").unwrap_err();
            assert!(matches!(err, StudioError::InferenceFailure(_)), "{logits:?}: {err:?}");
            assert_eq!(engine.calls(), 1);
        }
    }
}
