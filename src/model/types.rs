use serde::{Deserialize, Serialize};

/// Phrases appended to the base prompt when the caller supplies none.
pub const DEFAULT_MODIFIERS: [&str; 3] = [
    "Keep it concise and easy to read.",
    "Make it emotional and persuasive.",
    "Use a short practical example and a data point.",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    pub temperature: f64,
    /// 0 disables top-k filtering.
    pub top_k: usize,
    pub top_p: f64,
    pub do_sample: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 60,
            temperature: 0.5,
            top_k: 50,
            top_p: 0.95,
            do_sample: true,
        }
    }
}

/// A batch of variations to generate from one base prompt.
///
/// Construction normalizes the batch: `count` is at least 1 and the modifier
/// list is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    base_prompt: String,
    modifiers: Vec<String>,
    count: usize,
    sampling: SamplingParams,
}

impl GenerationRequest {
    pub fn new(
        base_prompt: impl Into<String>,
        modifiers: Vec<String>,
        count: usize,
        sampling: SamplingParams,
    ) -> Self {
        let modifiers = if modifiers.is_empty() {
            default_modifiers()
        } else {
            modifiers
        };
        Self {
            base_prompt: base_prompt.into(),
            modifiers,
            count: count.max(1),
            sampling,
        }
    }

    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn sampling(&self) -> &SamplingParams {
        &self.sampling
    }
}

pub fn default_modifiers() -> Vec<String> {
    DEFAULT_MODIFIERS.iter().map(|m| m.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationResult {
    pub index: usize,
    pub modifier: String,
    pub prompt_used: String,
    pub generated_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationBatch {
    pub base_prompt: String,
    pub variations: Vec<VariationResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendMetadata {
    pub name: String,
    pub kind: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    pub mime_type: String,
    /// Base64-encoded image bytes, as returned by the backend.
    pub data: String,
    pub caption: Option<String>,
}
