use std::collections::HashMap;

use minijinja::{Environment, UndefinedBehavior, context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPLATE: &str = "Write a short paragraph about AI for {{ audience }} in a \
{{ tone }} tone. Start with: '{{ lead_sentence }}'. Make it ~{{ length }} words and include one \
practical example.";

/// Returned whenever the template cannot be rendered.
pub const FALLBACK_PROMPT: &str = "AI is the future because";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplateFields {
    pub audience: String,
    pub tone: String,
    pub lead_sentence: String,
    pub length: String,
}

impl Default for PromptTemplateFields {
    fn default() -> Self {
        Self::new(
            "general public",
            "friendly",
            "AI makes everyday life easier",
            "50",
        )
    }
}

impl PromptTemplateFields {
    pub fn new(audience: &str, tone: &str, lead_sentence: &str, length: &str) -> Self {
        Self {
            audience: audience.to_string(),
            tone: tone.to_string(),
            lead_sentence: lead_sentence.to_string(),
            length: length.to_string(),
        }
    }

    /// Picks the template fields out of loosely-typed parameters. Missing or
    /// blank entries keep their defaults; unrelated keys are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let field = |key: &str, default: String| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };
        Self {
            audience: field("audience", defaults.audience),
            tone: field("tone", defaults.tone),
            lead_sentence: field("lead_sentence", defaults.lead_sentence),
            length: field("length", defaults.length),
        }
    }

    /// Ready-made audience presets.
    pub fn presets() -> Vec<Self> {
        vec![
            Self::new(
                "high school students",
                "energetic",
                "AI helps us learn faster",
                "40",
            ),
            Self::new(
                "business executives",
                "professional",
                "AI drives measurable ROI",
                "50",
            ),
            Self::new(
                "general public",
                "friendly",
                "AI makes everyday life easier",
                "45",
            ),
            Self::new(
                "software developers",
                "technical",
                "AI optimizes workflows",
                "60",
            ),
        ]
    }
}

/// Builds base prompts from an explicit prompt or a template.
pub struct PromptTemplate {
    source: String,
    env: Environment<'static>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        let mut env = Environment::new();
        // Unknown field names must fail rendering instead of printing blanks.
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            source: source.into(),
            env,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Never fails: a template that does not render yields `FALLBACK_PROMPT`.
    pub fn render(&self, fields: &PromptTemplateFields) -> String {
        let ctx = context! {
            audience => &fields.audience,
            tone => &fields.tone,
            lead_sentence => &fields.lead_sentence,
            length => &fields.length,
        };
        match self.env.render_str(&self.source, ctx) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::warn!(error = %err, "prompt template failed to render, using fallback");
                FALLBACK_PROMPT.to_string()
            }
        }
    }

    /// An explicit, non-empty prompt wins unchanged; otherwise the template is
    /// rendered from `fields`.
    pub fn resolve(&self, explicit: Option<&str>, fields: &PromptTemplateFields) -> String {
        match explicit {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => self.render(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTED: &str = "Write a short paragraph about AI for general public in a friendly \
tone. Start with: 'AI makes everyday life easier'. Make it ~50 words and include one practical \
example.";

    #[test]
    fn explicit_prompt_is_returned_unchanged() {
        let template = PromptTemplate::default();
        let fields = PromptTemplateFields::new("kids", "silly", "Robots!", "10");
        assert_eq!(
            template.resolve(Some("  AI is the future because "), &fields),
            "  AI is the future because "
        );
    }

    #[test]
    fn missing_prompt_renders_defaulted_template() {
        let template = PromptTemplate::default();
        let fields = PromptTemplateFields::from_params(&HashMap::new());
        assert_eq!(template.resolve(None, &fields), DEFAULTED);
    }

    #[test]
    fn only_an_empty_prompt_falls_through_to_template() {
        let template = PromptTemplate::default();
        let fields = PromptTemplateFields::default();
        assert_eq!(template.resolve(Some(""), &fields), DEFAULTED);
        assert_eq!(template.resolve(Some("   "), &fields), "   ");
    }

    #[test]
    fn supplied_fields_are_substituted() {
        let params: HashMap<String, String> = [
            ("audience", "software developers"),
            ("tone", "technical"),
            ("length", ""),
            ("unrelated", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let fields = PromptTemplateFields::from_params(&params);
        assert_eq!(fields.length, "50");

        let rendered = PromptTemplate::default().resolve(None, &fields);
        assert!(rendered.starts_with("Write a short paragraph about AI for software developers"));
        assert!(rendered.contains("in a technical tone"));
    }

    #[test]
    fn unknown_field_falls_back_to_constant_prompt() {
        let template = PromptTemplate::new("Write for {{ audience }} about {{ topic }}.");
        assert_eq!(
            template.render(&PromptTemplateFields::default()),
            FALLBACK_PROMPT
        );
    }

    #[test]
    fn broken_syntax_falls_back_to_constant_prompt() {
        let template = PromptTemplate::new("Write for {{ audience ");
        assert_eq!(
            template.render(&PromptTemplateFields::default()),
            FALLBACK_PROMPT
        );
    }

    #[test]
    fn presets_cover_four_audiences() {
        let presets = PromptTemplateFields::presets();
        assert_eq!(presets.len(), 4);
        assert_eq!(presets[1].lead_sentence, "AI drives measurable ROI");
    }
}
