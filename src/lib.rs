pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod params;
pub mod prompt;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{
    GenerationRequest, ImageGenerator, ModelRegistry, SamplingParams, TextGenerator,
    VariationBatch, VariationResult,
};
pub use prompt::{PromptTemplate, PromptTemplateFields, expand_variations};
pub use server::build_router;
