//! Application settings, read through Rocket's figment.
//!
//! Everything lives under the `studio` key of `Rocket.toml` (or the
//! matching `ROCKET_STUDIO=...` env var) and is layered over [`StudioConfig::default`].

use candle_core::Device;
use rocket::figment::providers::Serialized;
use rocket::figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_KEY: &str = "studio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real pretrained models, downloaded from the hub.
    Candle,
    /// Deterministic stand-ins, no downloads.
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// CUDA device 0 when compiled in and present, CPU otherwise.
    Auto,
    Cpu,
    Cuda,
}

impl DeviceKind {
    pub fn resolve(&self) -> candle_core::Result<Device> {
        match self {
            DeviceKind::Auto => Device::cuda_if_available(0),
            DeviceKind::Cpu => Ok(Device::Cpu),
            DeviceKind::Cuda => Device::new_cuda(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentModelConfig {
    pub repo: String,
    /// Repo to take `tokenizer.json` from when `repo` has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_fallback: Option<String>,
    pub max_input_tokens: usize,
}

impl Default for SentimentModelConfig {
    fn default() -> Self {
        Self {
            repo: "cardiffnlp/twitter-roberta-base-sentiment-latest".to_string(),
            tokenizer_fallback: Some("FacebookAI/roberta-base".to_string()),
            max_input_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorModelConfig {
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_fallback: Option<String>,
    pub max_input_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f32,
    /// Fixed sampling seed; a fresh random seed per call when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GeneratorModelConfig {
    fn default() -> Self {
        Self {
            repo: "google/flan-t5-large".to_string(),
            tokenizer_fallback: None,
            max_input_tokens: 768,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub backend: BackendKind,
    pub device: DeviceKind,
    pub max_concurrent_infer: usize,
    pub sentiment: SentimentModelConfig,
    pub generator: GeneratorModelConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Candle,
            device: DeviceKind::Auto,
            max_concurrent_infer: 1,
            sentiment: SentimentModelConfig::default(),
            generator: GeneratorModelConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Pull the `studio` section out of a figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        let config: StudioConfig = figment.extract_inner(CONFIG_KEY)?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.max_concurrent_infer = self.max_concurrent_infer.max(1);
        self
    }
}

/// Rocket's default figment with the studio defaults joined underneath.
pub fn figment() -> Figment {
    with_defaults(rocket::Config::figment())
}

pub fn with_defaults(figment: Figment) -> Figment {
    figment.join(Serialized::default(CONFIG_KEY, StudioConfig::default()))
}
