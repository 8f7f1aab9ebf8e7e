//! Configuration management for `dialog-inference`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// Decoding mode of a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Beam search, best beam first.
    Beamsearch,
    /// Beam search followed by MMI reranking.
    BeamsearchReranking,
    /// Temperature sampling.
    Sampling,
    /// Temperature sampling followed by MMI reranking.
    SamplingReranking,
}

impl PredictionMode {
    /// Every supported mode.
    pub const ALL: [Self; 4] = [
        Self::Beamsearch,
        Self::BeamsearchReranking,
        Self::Sampling,
        Self::SamplingReranking,
    ];

    /// Mode name as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beamsearch => "beamsearch",
            Self::BeamsearchReranking => "beamsearch_reranking",
            Self::Sampling => "sampling",
            Self::SamplingReranking => "sampling_reranking",
        }
    }

    /// Whether the mode reranks candidates with the reverse model.
    #[must_use]
    pub const fn uses_reranking(self) -> bool {
        match self {
            Self::BeamsearchReranking | Self::SamplingReranking => true,
            Self::Beamsearch | Self::Sampling => false,
        }
    }

    /// Candidate generator family used by the mode.
    #[must_use]
    pub const fn generator_kind(self) -> GeneratorKind {
        match self {
            Self::Beamsearch | Self::BeamsearchReranking => GeneratorKind::BeamSearch,
            Self::Sampling | Self::SamplingReranking => GeneratorKind::Sampling,
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionMode {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| PredictionError::InvalidMode { mode: s.to_string() })
    }
}

/// Candidate generator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Beam search.
    BeamSearch,
    /// Temperature sampling.
    Sampling,
}

/// Parameters for response prediction.
///
/// Every field has a default, and fields that the selected mode does not use
/// are ignored. Use the `*_params` accessors to get the validated subset for
/// a given generator or reranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Number of beams kept by beam search.
    pub beam_size: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of sampled candidates per context.
    pub samples_num: usize,
    /// Divisor applied to the probability of already used tokens (1.0 = off).
    pub repetition_penalization_coefficient: f32,
    /// Weight of the reverse model score in MMI reranking.
    pub mmi_reverse_model_score_weight: f32,
    /// Maximum number of tokens in a generated response.
    pub max_response_length: usize,
    /// Seed for sampling; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            beam_size: 10,
            temperature: 0.5,
            samples_num: 10,
            repetition_penalization_coefficient: 10.0,
            mmi_reverse_model_score_weight: 1.0,
            max_response_length: 40,
            seed: None,
        }
    }
}

/// Validated parameters for beam search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSearchParams {
    /// Number of beams.
    pub beam_size: usize,
    /// Repetition penalization coefficient.
    pub repetition_penalization_coefficient: f32,
    /// Maximum response length in tokens.
    pub max_response_length: usize,
}

/// Validated parameters for temperature sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of samples.
    pub samples_num: usize,
    /// Repetition penalization coefficient.
    pub repetition_penalization_coefficient: f32,
    /// Maximum response length in tokens.
    pub max_response_length: usize,
    /// Optional RNG seed.
    pub seed: Option<u64>,
}

/// Validated parameters for MMI reranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmiParams {
    /// Weight of the reverse model score.
    pub reverse_model_score_weight: f32,
    /// Repetition penalization coefficient.
    pub repetition_penalization_coefficient: f32,
}

impl PredictionConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> crate::error::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::error::Result<String> {
        let content = serde_json::to_string_pretty(self)?;
        Ok(content)
    }

    /// Build a configuration from a string-keyed option map.
    ///
    /// Missing keys take their defaults and unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a known key holds a value of the wrong type.
    pub fn from_map(options: HashMap<String, serde_json::Value>) -> crate::error::Result<Self> {
        let object = options.into_iter().collect::<serde_json::Map<_, _>>();
        let config: Self = serde_json::from_value(serde_json::Value::Object(object))?;
        Ok(config)
    }

    /// Set the beam size.
    #[must_use]
    pub const fn with_beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the number of samples.
    #[must_use]
    pub const fn with_samples_num(mut self, samples_num: usize) -> Self {
        self.samples_num = samples_num;
        self
    }

    /// Set the repetition penalization coefficient.
    #[must_use]
    pub const fn with_repetition_penalization_coefficient(mut self, coefficient: f32) -> Self {
        self.repetition_penalization_coefficient = coefficient;
        self
    }

    /// Set the MMI reverse model score weight.
    #[must_use]
    pub const fn with_mmi_reverse_model_score_weight(mut self, weight: f32) -> Self {
        self.mmi_reverse_model_score_weight = weight;
        self
    }

    /// Set the maximum response length.
    #[must_use]
    pub const fn with_max_response_length(mut self, max_response_length: usize) -> Self {
        self.max_response_length = max_response_length;
        self
    }

    /// Set the sampling seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Beam search parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidConfig`] if a beam search parameter is out of range.
    pub fn beam_search_params(&self) -> Result<BeamSearchParams, PredictionError> {
        if self.beam_size == 0 {
            return Err(PredictionError::InvalidConfig(
                "beam_size should be > 0".to_string(),
            ));
        }
        Ok(BeamSearchParams {
            beam_size: self.beam_size,
            repetition_penalization_coefficient: self.repetition_coefficient()?,
            max_response_length: self.response_length()?,
        })
    }

    /// Sampling parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidConfig`] if a sampling parameter is out of range.
    pub fn sampling_params(&self) -> Result<SamplingParams, PredictionError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(PredictionError::InvalidConfig(format!(
                "temperature should be a positive number, got {}",
                self.temperature
            )));
        }
        if self.samples_num == 0 {
            return Err(PredictionError::InvalidConfig(
                "samples_num should be > 0".to_string(),
            ));
        }
        Ok(SamplingParams {
            temperature: self.temperature,
            samples_num: self.samples_num,
            repetition_penalization_coefficient: self.repetition_coefficient()?,
            max_response_length: self.response_length()?,
            seed: self.seed,
        })
    }

    /// MMI reranking parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidWeight`] unless the reverse model weight is
    /// finite and strictly positive.
    pub fn mmi_params(&self) -> Result<MmiParams, PredictionError> {
        let weight = self.mmi_reverse_model_score_weight;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(PredictionError::InvalidWeight(weight));
        }
        Ok(MmiParams {
            reverse_model_score_weight: weight,
            repetition_penalization_coefficient: self.repetition_coefficient()?,
        })
    }

    fn repetition_coefficient(&self) -> Result<f32, PredictionError> {
        let coefficient = self.repetition_penalization_coefficient;
        if coefficient > 0.0 && coefficient.is_finite() {
            Ok(coefficient)
        } else {
            Err(PredictionError::InvalidConfig(format!(
                "repetition_penalization_coefficient should be a positive number, got {coefficient}"
            )))
        }
    }

    fn response_length(&self) -> Result<usize, PredictionError> {
        if self.max_response_length == 0 {
            return Err(PredictionError::InvalidConfig(
                "max_response_length should be > 0".to_string(),
            ));
        }
        Ok(self.max_response_length)
    }
}
