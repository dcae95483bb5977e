mod backend;
mod gemini;
mod registry;
mod sampler;
mod types;

#[cfg(feature = "tch-backend")]
mod loader;

pub use backend::{ImageGenerator, TextGenerator};
pub use gemini::GeminiClient;
#[cfg(feature = "tch-backend")]
pub use loader::TorchGenerator;
pub use registry::ModelRegistry;
pub use sampler::LogitsSampler;
pub use types::{
    BackendMetadata, DEFAULT_MODIFIERS, GeneratedImage, GenerationRequest, SamplingParams,
    VariationBatch, VariationResult, default_modifiers,
};
