use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::{BackendKind, StudioConfig};
use crate::engine::{
    CandleClassifier, CandleEngine, ClassifierEngine, DummyClassifier, DummyEngine,
    InferenceEngine,
};
use crate::error::{Result, StudioError};
use crate::generator::{InstructionTextGenerator, SamplingParams};
use crate::model_registry::{ModelRegistry, ModelStatus, GENERATOR_SLOT, SENTIMENT_SLOT};
use crate::sentiment::SentimentClassifier;
use crate::types::{
    GenerationRequest, Length, Sentiment, SentimentResult, ToneChoice, ToneSource,
};

/// Process-wide state, built once in `main` and handed to Rocket:
/// - registry: model slots and their load status
/// - classifier / generator: the loaded models
/// - semaphore: caps concurrent inference calls
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub classifier: SentimentClassifier,
    pub generator: InstructionTextGenerator,
    pub semaphore: Arc<Semaphore>,
}

/// Result of the full analyze-then-generate flow.
#[derive(Debug, Clone)]
pub struct Composition {
    pub detected: SentimentResult,
    pub tone: Sentiment,
    pub tone_source: ToneSource,
    pub length: Length,
    pub text: String,
    pub word_count: usize,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        classifier: SentimentClassifier,
        generator: InstructionTextGenerator,
        max_concurrent_infer: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            classifier,
            generator,
            semaphore: Arc::new(Semaphore::new(max_concurrent_infer.max(1))),
        })
    }

    /// Load both models for `config`, tracking each slot in the registry.
    pub fn load(config: &StudioConfig) -> Result<Arc<Self>> {
        let registry = Arc::new(ModelRegistry::from_config(config));

        let (classifier, engine): (Arc<dyn ClassifierEngine>, Arc<dyn InferenceEngine>) =
            match config.backend {
                BackendKind::Dummy => {
                    let classifier: Arc<dyn ClassifierEngine> =
                        DummyClassifier::new(SENTIMENT_SLOT);
                    let engine: Arc<dyn InferenceEngine> = DummyEngine::new(GENERATOR_SLOT);
                    registry.set_status(SENTIMENT_SLOT, ModelStatus::Loaded);
                    registry.set_status(GENERATOR_SLOT, ModelStatus::Loaded);
                    (classifier, engine)
                }
                BackendKind::Candle => {
                    let device = config.device.resolve().map_err(StudioError::model_load)?;
                    let classifier = load_slot(&registry, SENTIMENT_SLOT, || {
                        CandleClassifier::load(&config.sentiment, device.clone())
                    })?;
                    let engine = load_slot(&registry, GENERATOR_SLOT, || {
                        CandleEngine::load(&config.generator, device.clone())
                    })?;
                    (classifier as Arc<dyn ClassifierEngine>, engine as Arc<dyn InferenceEngine>)
                }
            };

        Ok(Self::new(
            registry,
            SentimentClassifier::new(classifier),
            InstructionTextGenerator::new(engine, SamplingParams::from(&config.generator)),
            config.max_concurrent_infer,
        ))
    }

    /// Trim the topic, detect its sentiment, resolve the tone and generate.
    ///
    /// Options are validated up front so a bad tone or length never costs a
    /// classifier pass. `length` defaults to medium.
    pub fn compose(
        &self,
        topic: &str,
        tone: Option<&str>,
        length: Option<&str>,
    ) -> Result<Composition> {
        let choice = tone.map(str::parse::<ToneChoice>).transpose()?.unwrap_or_default();
        let length = length.map(str::parse::<Length>).transpose()?.unwrap_or_default();

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StudioError::InvalidInput(
                "Please enter a topic so the model knows what to write about.".to_string(),
            ));
        }

        let detected = self.classifier.analyze(topic)?;
        let (tone, tone_source) = match choice {
            ToneChoice::Auto => (detected.sentiment, ToneSource::AutoDetected),
            ToneChoice::Manual(sentiment) => (sentiment, ToneSource::ManualSelection),
        };

        let text = self.generator.generate_request(&GenerationRequest {
            topic: topic.to_string(),
            sentiment: tone,
            length,
        })?;
        let word_count = text.split_whitespace().count();

        Ok(Composition {
            detected,
            tone,
            tone_source,
            length,
            text,
            word_count,
        })
    }

    /// Run blocking inference on the blocking pool, holding a permit for
    /// the duration of the call.
    pub async fn run_inference<T, F>(self: &Arc<Self>, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&AppState) -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| StudioError::inference("inference queue is closed"))?;

        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(state.as_ref())
        })
        .await
        .map_err(|e| StudioError::inference(format!("inference task failed: {e}")))?
    }
}

fn load_slot<E>(
    registry: &ModelRegistry,
    slot: &str,
    load: impl FnOnce() -> Result<Arc<E>>,
) -> Result<Arc<E>> {
    registry.set_status(slot, ModelStatus::Loading);
    match load() {
        Ok(engine) => {
            registry.set_status(slot, ModelStatus::Loaded);
            info!(slot, "model ready");
            Ok(engine)
        }
        Err(e) => {
            registry.set_status(slot, ModelStatus::Error);
            error!(slot, error = %e, "model failed to load");
            Err(e)
        }
    }
}
