use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OptionKind, StudioError};

// ---------------------------------------------------------------------------
// Enumerated options
// ---------------------------------------------------------------------------

/// Three-way sentiment label. Discriminants match the classifier's output
/// indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative = 0,
    Neutral = 1,
    Positive = 2,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    /// Tone requirement inserted into the instruction prompt.
    pub fn tone_instruction(&self) -> &'static str {
        match self {
            Sentiment::Positive => {
                "optimistic, enthusiastic, uplifting tone focusing on benefits and hopeful outcomes"
            }
            Sentiment::Negative => {
                "critical, concerned, pessimistic tone emphasizing problems and challenges"
            }
            Sentiment::Neutral => "objective, balanced, factual tone without emotional bias",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "positive" => Ok(Sentiment::Positive),
            _ => Err(StudioError::unsupported(OptionKind::Sentiment, s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }

    /// Word/sentence guide inserted into the instruction prompt.
    pub fn length_guide(&self) -> &'static str {
        match self {
            Length::Short => "50-75 words (2-3 sentences)",
            Length::Medium => "150-200 words (1 large paragraph)",
            Length::Long => "300-400 words (2-3 paragraphs)",
        }
    }

    /// Output token budget for the generator.
    pub fn max_new_tokens(&self) -> usize {
        match self {
            Length::Short => 120,
            Length::Medium => 300,
            Length::Long => 512,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Length {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(Length::Short),
            "medium" => Ok(Length::Medium),
            "long" => Ok(Length::Long),
            _ => Err(StudioError::unsupported(OptionKind::Length, s)),
        }
    }
}

/// Tone selection for `/compose`: follow the detected sentiment, or force one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneChoice {
    #[default]
    Auto,
    Manual(Sentiment),
}

impl FromStr for ToneChoice {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "auto-detect" => Ok(ToneChoice::Auto),
            _ => s.parse().map(ToneChoice::Manual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneSource {
    #[serde(rename = "auto-detected")]
    AutoDetected,
    #[serde(rename = "manual selection")]
    ManualSelection,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Softmax output of the classifier, one entry per label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub negative: f32,
    pub neutral: f32,
    pub positive: f32,
}

impl Probabilities {
    pub fn get(&self, sentiment: Sentiment) -> f32 {
        match sentiment {
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
            Sentiment::Positive => self.positive,
        }
    }

    pub fn sum(&self) -> f32 {
        self.negative + self.neutral + self.positive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    /// Probability mass of `sentiment`, in [0, 1].
    pub confidence: f32,
    pub probabilities: Probabilities,
}

impl SentimentResult {
    /// Confidence rounded to four decimal places, for display.
    pub fn rounded_confidence(&self) -> f64 {
        (f64::from(self.confidence) * 10_000.0).round() / 10_000.0
    }
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub sentiment: Sentiment,
    pub length: Length,
}

impl GenerationRequest {
    /// Parse the option strings; the topic is taken as-is.
    pub fn parse(topic: &str, sentiment: &str, length: &str) -> Result<Self, StudioError> {
        Ok(Self {
            topic: topic.to_string(),
            sentiment: sentiment.parse()?,
            length: length.parse()?,
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub name: String,
    pub repo: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub probabilities: Probabilities,
}

impl From<SentimentResult> for AnalyzeResponse {
    fn from(result: SentimentResult) -> Self {
        Self {
            sentiment: result.sentiment,
            confidence: result.rounded_confidence(),
            probabilities: result.probabilities,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
    pub sentiment: String,
    pub length: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub topic: String,
    /// `"auto"` (default) or one of the sentiment labels.
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSentiment {
    pub sentiment: Sentiment,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeResponse {
    pub detected: DetectedSentiment,
    pub tone: Sentiment,
    pub tone_source: ToneSource,
    pub length: Length,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
