use std::sync::Arc;

use tokio::task;

use crate::{
    config::{AppConfig, BackendKind},
    error::ServiceError,
    model::{
        BackendMetadata, GeneratedImage, GenerationRequest, ImageGenerator, TextGenerator,
        VariationResult, gemini::GeminiClient,
    },
    prompt::expand_variations,
};

/// Process-wide handles to the configured generation backends.
///
/// Loaded once at start-up and shared read-only between requests.
pub struct ModelRegistry {
    text: Arc<dyn TextGenerator>,
    image: Option<Arc<dyn ImageGenerator>>,
}

impl ModelRegistry {
    pub fn initialize(config: &AppConfig) -> Result<Self, ServiceError> {
        let gemini = config
            .gemini
            .clone()
            .map(|settings| Arc::new(GeminiClient::new(settings)));

        let text: Arc<dyn TextGenerator> = match config.backend {
            BackendKind::Local => load_local(config)?,
            BackendKind::Gemini => {
                let client = gemini.clone().ok_or_else(|| {
                    ServiceError::Config(
                        "GEMINI_API_KEY must be set for the gemini backend".into(),
                    )
                })?;
                client as Arc<dyn TextGenerator>
            }
        };
        let image = gemini.map(|client| client as Arc<dyn ImageGenerator>);

        tracing::info!(
            backend = config.backend.as_str(),
            image = image.is_some(),
            "generation backends ready"
        );

        Ok(Self::from_parts(text, image))
    }

    pub fn from_parts(
        text: Arc<dyn TextGenerator>,
        image: Option<Arc<dyn ImageGenerator>>,
    ) -> Self {
        Self { text, image }
    }

    pub fn text_generator(&self) -> Arc<dyn TextGenerator> {
        self.text.clone()
    }

    pub fn metadata(&self) -> (BackendMetadata, Option<BackendMetadata>) {
        (
            self.text.metadata(),
            self.image.as_ref().map(|image| image.metadata()),
        )
    }

    /// Runs a whole variation batch on a blocking worker.
    pub async fn generate_variations(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<VariationResult>, ServiceError> {
        let generator = self.text.clone();
        task::spawn_blocking(move || expand_variations(generator.as_ref(), &request))
            .await
            .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))?
    }

    pub async fn generate_image(&self, prompt: String) -> Result<GeneratedImage, ServiceError> {
        let generator = self
            .image
            .clone()
            .ok_or_else(|| ServiceError::Unsupported("image generation".into()))?;
        task::spawn_blocking(move || generator.generate_image(&prompt))
            .await
            .map_err(|err| ServiceError::Inference(format!("image task failed: {err}")))?
    }
}

#[cfg(feature = "tch-backend")]
fn load_local(config: &AppConfig) -> Result<Arc<dyn TextGenerator>, ServiceError> {
    let model = crate::model::TorchGenerator::load(config)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "tch-backend"))]
fn load_local(_config: &AppConfig) -> Result<Arc<dyn TextGenerator>, ServiceError> {
    Err(ServiceError::Config(
        "the local backend requires building with the `tch-backend` feature".into(),
    ))
}
