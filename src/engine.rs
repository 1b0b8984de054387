use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::t5;
use candle_transformers::models::xlm_roberta::{self, XLMRobertaForSequenceClassification};
use candle_transformers::utils::apply_repeat_penalty;
use parking_lot::Mutex;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::{GeneratorModelConfig, SentimentModelConfig};
use crate::error::{Result, StudioError};
use crate::hub::ModelRepo;

/// Number of labels the sentiment head produces.
pub const NUM_LABELS: usize = 3;

const ROBERTA_PAD_ID: u32 = 1;

/// Decoding parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f32,
    pub seed: Option<u64>,
}

impl GenerationSettings {
    fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }
        if self.top_p < 1.0 {
            Sampling::TopP {
                p: self.top_p,
                temperature: self.temperature,
            }
        } else {
            Sampling::All {
                temperature: self.temperature,
            }
        }
    }
}

/// Raw classification scores for a piece of text.
pub trait ClassifierEngine: Send + Sync {
    /// Unnormalized scores, one per label, in label-index order.
    fn logits(&self, text: &str) -> Result<Tensor>;
}

/// Text-to-text generation.
pub trait InferenceEngine: Send + Sync {
    fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Dummy engines: deterministic, no downloads
// ---------------------------------------------------------------------------

pub struct DummyClassifier {
    pub model_name: String,
    logits: Vec<f32>,
    calls: AtomicUsize,
}

impl DummyClassifier {
    /// Leans neutral for every input.
    pub fn new(model_name: &str) -> Arc<Self> {
        Self::with_logits(model_name, &[0.0, 1.0, 0.0])
    }

    pub fn with_logits(model_name: &str, logits: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            model_name: model_name.to_string(),
            logits: logits.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassifierEngine for DummyClassifier {
    fn logits(&self, _text: &str) -> Result<Tensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Tensor::new(self.logits.as_slice(), &Device::Cpu)?)
    }
}

pub struct DummyEngine {
    pub model_name: String,
    calls: AtomicUsize,
}

impl DummyEngine {
    pub fn new(model_name: &str) -> Arc<Self> {
        Arc::new(Self {
            model_name: model_name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for DummyEngine {
    /// Echoes the prompt back, one "token" per word, within the budget.
    fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<&str> = prompt
            .split_whitespace()
            .take(settings.max_new_tokens)
            .collect();
        Ok(format!("[{} DUMMY] {}", self.model_name, words.join(" ")))
    }
}

// ---------------------------------------------------------------------------
// Candle: RoBERTa sequence classifier
// ---------------------------------------------------------------------------

pub struct CandleClassifier {
    model_name: String,
    device: Device,
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
}

impl CandleClassifier {
    pub fn load(config: &SentimentModelConfig, device: Device) -> Result<Arc<Self>> {
        let start = Instant::now();
        let repo = ModelRepo::open(&config.repo)?;

        let model_config: xlm_roberta::Config = repo.config()?;
        let vb = repo.var_builder(DType::F32, &device)?;
        let model = XLMRobertaForSequenceClassification::new(NUM_LABELS, &model_config, vb)
            .map_err(StudioError::model_load)?;

        let mut tokenizer = repo.tokenizer(config.tokenizer_fallback.as_deref())?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_tokens,
                ..Default::default()
            }))
            .map_err(|e| StudioError::ModelLoad(format!("set truncation: {e}")))?;
        let pad_token = "<pad>".to_string();
        let pad_id = tokenizer.token_to_id(&pad_token).unwrap_or(ROBERTA_PAD_ID);
        tokenizer.with_padding(Some(PaddingParams {
            pad_id,
            pad_token,
            ..Default::default()
        }));

        info!(
            repo = %config.repo,
            device = ?device,
            elapsed_s = start.elapsed().as_secs_f32(),
            "loaded sentiment classifier"
        );

        Ok(Arc::new(Self {
            model_name: repo.repo_id().to_string(),
            device,
            model,
            tokenizer,
        }))
    }
}

impl ClassifierEngine for CandleClassifier {
    fn logits(&self, text: &str) -> Result<Tensor> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| StudioError::inference(format!("tokenization failed: {e}")))?;
        debug!(model = %self.model_name, tokens = encoding.len(), "classifying");

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let logits = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)?
            .squeeze(0)?
            .to_dtype(DType::F32)?;
        Ok(logits)
    }
}

// ---------------------------------------------------------------------------
// Candle: T5 encoder-decoder generator
// ---------------------------------------------------------------------------

pub struct CandleEngine {
    model_name: String,
    device: Device,
    // The decoder keeps a KV cache, so calls are serialized.
    model: Mutex<t5::T5ForConditionalGeneration>,
    config: t5::Config,
    tokenizer: Tokenizer,
}

impl CandleEngine {
    pub fn load(config: &GeneratorModelConfig, device: Device) -> Result<Arc<Self>> {
        let start = Instant::now();
        let repo = ModelRepo::open(&config.repo)?;

        let model_config: t5::Config = repo.config()?;
        let vb = repo.var_builder(DType::F32, &device)?;
        let model = t5::T5ForConditionalGeneration::load(vb, &model_config)
            .map_err(StudioError::model_load)?;

        let mut tokenizer = repo.tokenizer(config.tokenizer_fallback.as_deref())?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_tokens,
                ..Default::default()
            }))
            .map_err(|e| StudioError::ModelLoad(format!("set truncation: {e}")))?;

        info!(
            repo = %config.repo,
            device = ?device,
            elapsed_s = start.elapsed().as_secs_f32(),
            "loaded text generator"
        );

        Ok(Arc::new(Self {
            model_name: repo.repo_id().to_string(),
            device,
            model: Mutex::new(model),
            config: model_config,
            tokenizer,
        }))
    }
}

impl InferenceEngine for CandleEngine {
    fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String> {
        let start = Instant::now();
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| StudioError::inference(format!("tokenization failed: {e}")))?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        let seed = settings.seed.unwrap_or_else(rand::random);
        let mut logits_processor = LogitsProcessor::from_sampling(seed, settings.sampling());

        let decoder_start = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let mut output_ids = vec![decoder_start];

        {
            let mut model = self.model.lock();
            model.clear_kv_cache();
            let encoder_output = model.encode(&input_ids)?;

            for index in 0..settings.max_new_tokens {
                let decoder_ids = if index == 0 || !self.config.use_cache {
                    Tensor::new(output_ids.as_slice(), &self.device)?.unsqueeze(0)?
                } else {
                    let last = output_ids[output_ids.len() - 1];
                    Tensor::new(&[last], &self.device)?.unsqueeze(0)?
                };

                let logits = model
                    .decode(&decoder_ids, &encoder_output)?
                    .squeeze(0)?
                    .to_dtype(DType::F32)?;
                let logits = if settings.repeat_penalty == 1.0 {
                    logits
                } else {
                    apply_repeat_penalty(&logits, settings.repeat_penalty, &output_ids[1..])?
                };

                let next_token = logits_processor.sample(&logits)?;
                if next_token as usize == self.config.eos_token_id {
                    break;
                }
                output_ids.push(next_token);
            }
            model.clear_kv_cache();
        }

        let generated = &output_ids[1..];
        let text = self
            .tokenizer
            .decode(generated, true)
            .map_err(|e| StudioError::inference(format!("decoding failed: {e}")))?;

        debug!(
            model = %self.model_name,
            prompt_tokens = encoding.len(),
            new_tokens = generated.len(),
            elapsed_s = start.elapsed().as_secs_f32(),
            "generated"
        );
        Ok(text)
    }
}
