use std::time::Instant;

use crate::{
    error::ServiceError,
    model::{GenerationRequest, TextGenerator, VariationResult},
};

/// Generates one output per variation, cycling through the modifiers.
///
/// Variations run in order on the calling thread. The first backend failure
/// aborts the batch and is reported with its 1-based variation index.
pub fn expand_variations<G>(
    generator: &G,
    request: &GenerationRequest,
) -> Result<Vec<VariationResult>, ServiceError>
where
    G: TextGenerator + ?Sized,
{
    let base = request.base_prompt().trim();
    let modifiers = request.modifiers();
    let start = Instant::now();

    // `count` comes straight from the caller; grow as results arrive.
    let mut results = Vec::new();
    for i in 0..request.count() {
        let index = i + 1;
        let modifier = &modifiers[i % modifiers.len()];
        let prompt_used = format!("{base} {modifier}");

        let generated = generator
            .generate(&prompt_used, request.sampling())
            .map_err(|source| ServiceError::Variation {
                index,
                source: Box::new(source),
            })?;
        tracing::debug!(index, %modifier, bytes = generated.len(), "variation generated");

        results.push(VariationResult {
            index,
            modifier: modifier.clone(),
            prompt_used,
            generated_text: generated.trim().to_string(),
        });
    }

    tracing::info!(
        count = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "variation batch complete"
    );

    Ok(results)
}
