use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{BackendMetadata, ModelRegistry, SamplingParams, VariationBatch, default_modifiers},
    params::build_request,
    prompt::{PromptTemplate, PromptTemplateFields},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
    pub template: Arc<PromptTemplate>,
}

#[derive(Serialize)]
struct MetadataResponse {
    backend: BackendMetadata,
    image_backend: Option<BackendMetadata>,
    sampling: SamplingParams,
    default_variations: usize,
    default_modifiers: Vec<String>,
    template: String,
}

#[derive(Serialize)]
struct ImageResponse {
    prompt: String,
    mime_type: String,
    image: String,
    caption: Option<String>,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let template = match config.prompt_template.as_deref() {
        Some(source) => PromptTemplate::new(source),
        None => PromptTemplate::default(),
    };
    let state = AppState {
        template: Arc::new(template),
        registry,
        config,
    };

    Router::new()
        .route("/health", get(health))
        .route("/generate", get(generate_variations))
        .route("/generate/image", get(generate_image))
        .route("/presets", get(presets))
        .route("/metadata", get(metadata))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_variations(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<VariationBatch>, ServiceError> {
    let request = build_request(
        &params,
        &state.template,
        &state.config.sampling,
        state.config.default_variations,
    );
    info!(
        count = request.count(),
        modifiers = request.modifiers().len(),
        "generating variations"
    );

    let base_prompt = request.base_prompt().to_string();
    let variations = state.registry.generate_variations(request).await?;

    Ok(Json(VariationBatch {
        base_prompt,
        variations,
    }))
}

async fn generate_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ImageResponse>, ServiceError> {
    let prompt = params
        .get("prompt")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("query parameter 'prompt' is required".into()))?;

    info!("generating image");
    let image = state.registry.generate_image(prompt.clone()).await?;

    Ok(Json(ImageResponse {
        prompt,
        mime_type: image.mime_type,
        image: image.data,
        caption: image.caption,
    }))
}

async fn presets() -> Json<Vec<PromptTemplateFields>> {
    Json(PromptTemplateFields::presets())
}

async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    let (backend, image_backend) = state.registry.metadata();

    Json(MetadataResponse {
        backend,
        image_backend,
        sampling: state.config.sampling,
        default_variations: state.config.default_variations,
        default_modifiers: default_modifiers(),
        template: state.template.source().to_string(),
    })
}
