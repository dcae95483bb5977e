use crate::{
    error::ServiceError,
    model::{BackendMetadata, GeneratedImage, SamplingParams},
};

/// Blocking text-generation capability.
///
/// Implementations return only the newly generated text, never the prompt.
/// Callers on an async runtime must run this on a blocking thread.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String, ServiceError>;

    fn metadata(&self) -> BackendMetadata;
}

/// Blocking image-generation capability.
pub trait ImageGenerator: Send + Sync {
    fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ServiceError>;

    fn metadata(&self) -> BackendMetadata;
}
