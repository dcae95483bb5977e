use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::GeminiConfig,
    error::ServiceError,
    model::{BackendMetadata, GeneratedImage, ImageGenerator, SamplingParams, TextGenerator},
};

/// Client for the hosted `generateContent` REST API.
///
/// The blocking HTTP client is built on first use so that it is created on
/// the blocking worker that calls it, never on the async reactor.
pub struct GeminiClient {
    config: GeminiConfig,
    http: OnceCell<Client>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: OnceCell::new(),
        }
    }

    fn http(&self) -> Result<&Client, ServiceError> {
        self.http.get_or_try_init(|| {
            Client::builder()
                .timeout(self.config.timeout)
                .build()
                .map_err(ServiceError::from)
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let resp = self
            .http()?
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(ServiceError::Backend(format!(
                "{model} returned {status}: {}",
                detail.trim()
            )));
        }
        Ok(resp.json()?)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::BadRequest("prompt must not be empty".into()));
        }
        let body = GenerateContentRequest::text(prompt, params);
        let response = self.generate_content(&self.config.text_model, &body)?;
        response
            .text()
            .ok_or_else(|| ServiceError::Backend("response contained no text".into()))
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: "gemini".to_string(),
            kind: "remote".to_string(),
            model: self.config.text_model.clone(),
        }
    }
}

impl ImageGenerator for GeminiClient {
    fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::BadRequest("prompt must not be empty".into()));
        }
        let body = GenerateContentRequest::image(prompt);
        let response = self.generate_content(&self.config.image_model, &body)?;
        response
            .image()
            .ok_or_else(|| ServiceError::Backend("response contained no image".into()))
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: "gemini".to_string(),
            kind: "remote".to_string(),
            model: self.config.image_model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn text(prompt: &'a str, params: &SamplingParams) -> Self {
        // Greedy decoding maps to temperature 0 on the hosted API.
        let temperature = if params.do_sample {
            params.temperature
        } else {
            0.0
        };
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: Some(temperature),
                top_k: (params.top_k > 0).then_some(params.top_k),
                top_p: Some(params.top_p),
                max_output_tokens: Some(params.max_new_tokens),
                candidate_count: Some(1),
                ..GenerationConfig::default()
            },
        }
    }

    fn image(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
                ..GenerationConfig::default()
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    fn image(&self) -> Option<GeneratedImage> {
        let inline = self.parts().find_map(|p| p.inline_data.as_ref())?;
        Some(GeneratedImage {
            mime_type: inline.mime_type.clone(),
            data: inline.data.clone(),
            caption: self.text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "key".into(),
            base_url: "https://example.test/v1beta/".into(),
            text_model: "gemini-2.5-flash".into(),
            image_model: "gemini-2.5-flash-image".into(),
            timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn endpoint_joins_base_url_and_model() {
        assert_eq!(
            client().endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn text_request_carries_sampling_params() {
        let params = SamplingParams {
            top_k: 0,
            ..SamplingParams::default()
        };
        let body = serde_json::to_value(GenerateContentRequest::text("Hello", &params)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
        let config = &body["generationConfig"];
        assert_eq!(config["temperature"], 0.5);
        assert_eq!(config["topP"], 0.95);
        assert_eq!(config["maxOutputTokens"], 60);
        assert!(config.get("topK").is_none());
        assert!(config.get("responseModalities").is_none());
    }

    #[test]
    fn greedy_requests_use_zero_temperature() {
        let params = SamplingParams {
            do_sample: false,
            ..SamplingParams::default()
        };
        let body = serde_json::to_value(GenerateContentRequest::text("Hi", &params)).unwrap();
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(body["generationConfig"]["topK"], 50);
    }

    #[test]
    fn text_parts_are_concatenated() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"AI is "},{"text":"here."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("AI is here."));
        assert!(response.image().is_none());
    }

    #[test]
    fn inline_image_is_extracted_with_caption() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"A boy on a turf"},
                {"inlineData":{"mimeType":"image/png","data":"iVBORw0KGgo="}}
            ]}}]}"#,
        )
        .unwrap();
        let image = response.image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgo=");
        assert_eq!(image.caption.as_deref(), Some("A boy on a turf"));
    }

    #[test]
    fn empty_response_has_no_output() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
        assert!(response.image().is_none());
    }
}
