//! Lenient parsing of user-supplied query parameters.
//!
//! Nothing here fails: malformed or out-of-range values fall back to the
//! configured defaults.

use std::{collections::HashMap, str::FromStr};

use crate::{
    model::{GenerationRequest, SamplingParams},
    prompt::{PromptTemplate, PromptTemplateFields},
};

pub const MODIFIER_DELIMITER: char = '|';

/// Number of variations. Non-numeric input yields `default`, anything below
/// one is clamped to one.
pub fn coerce_count(raw: Option<&str>, default: usize) -> usize {
    match raw {
        None => default.max(1),
        Some(value) => match value.trim().parse::<i64>() {
            Ok(n) => n.max(1) as usize,
            Err(_) => default.max(1),
        },
    }
}

pub fn coerce_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Only a case-insensitive `true` enables the flag once it is supplied.
pub fn coerce_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(value) => value.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}

/// Splits a `|`-separated list, dropping blank entries.
pub fn split_modifiers(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(MODIFIER_DELIMITER)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Replaces out-of-range values in `candidate` with the matching default.
pub fn sanitize_sampling(
    candidate: SamplingParams,
    defaults: &SamplingParams,
) -> SamplingParams {
    SamplingParams {
        max_new_tokens: if candidate.max_new_tokens > 0 {
            candidate.max_new_tokens
        } else {
            defaults.max_new_tokens
        },
        temperature: if candidate.temperature.is_finite() && candidate.temperature >= 0.0 {
            candidate.temperature
        } else {
            defaults.temperature
        },
        top_k: candidate.top_k,
        top_p: if candidate.top_p > 0.0 && candidate.top_p <= 1.0 {
            candidate.top_p
        } else {
            defaults.top_p
        },
        do_sample: candidate.do_sample,
    }
}

pub fn coerce_sampling(
    params: &HashMap<String, String>,
    defaults: &SamplingParams,
) -> SamplingParams {
    let get = |key: &str| params.get(key).map(String::as_str);

    let candidate = SamplingParams {
        max_new_tokens: coerce_or(get("max_new_tokens"), defaults.max_new_tokens),
        temperature: coerce_or(get("temperature"), defaults.temperature),
        top_k: coerce_or(get("top_k"), defaults.top_k),
        top_p: coerce_or(get("top_p"), defaults.top_p),
        do_sample: coerce_flag(get("do_sample"), defaults.do_sample),
    };
    sanitize_sampling(candidate, defaults)
}

/// Turns raw query parameters into a normalized variation batch.
pub fn build_request(
    params: &HashMap<String, String>,
    template: &PromptTemplate,
    defaults: &SamplingParams,
    default_count: usize,
) -> GenerationRequest {
    let get = |key: &str| params.get(key).map(String::as_str);

    let fields = PromptTemplateFields::from_params(params);
    let base_prompt = template.resolve(get("prompt"), &fields);

    GenerationRequest::new(
        base_prompt,
        split_modifiers(get("modifiers")),
        coerce_count(get("n"), default_count),
        coerce_sampling(params, defaults),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_modifiers;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn count_defaults_when_malformed() {
        assert_eq!(coerce_count(Some("many"), 3), 3);
        assert_eq!(coerce_count(Some("2.5"), 3), 3);
        assert_eq!(coerce_count(None, 3), 3);
    }

    #[test]
    fn count_is_clamped_to_one() {
        assert_eq!(coerce_count(Some("0"), 3), 1);
        assert_eq!(coerce_count(Some("-4"), 3), 1);
        assert_eq!(coerce_count(Some(" 5 "), 3), 5);
    }

    #[test]
    fn flag_only_accepts_true() {
        assert!(coerce_flag(Some("TRUE"), false));
        assert!(!coerce_flag(Some("yes"), true));
        assert!(!coerce_flag(Some("false"), true));
        assert!(coerce_flag(None, true));
    }

    #[test]
    fn modifiers_are_split_and_trimmed() {
        assert_eq!(
            split_modifiers(Some(" Be brief. || Be bold.|  ")),
            vec!["Be brief.".to_string(), "Be bold.".to_string()]
        );
        assert!(split_modifiers(Some(" | ")).is_empty());
        assert!(split_modifiers(None).is_empty());
    }

    #[test]
    fn malformed_sampling_values_use_defaults() {
        let defaults = SamplingParams::default();
        let sampling = coerce_sampling(
            &query(&[
                ("max_new_tokens", "lots"),
                ("temperature", "NaN"),
                ("top_k", "-1"),
                ("top_p", "2"),
            ]),
            &defaults,
        );
        assert_eq!(sampling, defaults);
    }

    #[test]
    fn valid_sampling_values_are_parsed() {
        let sampling = coerce_sampling(
            &query(&[
                ("max_new_tokens", "20"),
                ("temperature", "0.9"),
                ("top_k", "0"),
                ("top_p", "0.8"),
                ("do_sample", "false"),
            ]),
            &SamplingParams::default(),
        );
        assert_eq!(
            sampling,
            SamplingParams {
                max_new_tokens: 20,
                temperature: 0.9,
                top_k: 0,
                top_p: 0.8,
                do_sample: false,
            }
        );
    }

    #[test]
    fn sanitize_replaces_only_out_of_range_values() {
        let defaults = SamplingParams::default();
        let sanitized = sanitize_sampling(
            SamplingParams {
                max_new_tokens: 0,
                temperature: -1.0,
                top_k: 7,
                top_p: 5.0,
                do_sample: false,
            },
            &defaults,
        );
        assert_eq!(
            sanitized,
            SamplingParams {
                max_new_tokens: defaults.max_new_tokens,
                temperature: defaults.temperature,
                top_k: 7,
                top_p: defaults.top_p,
                do_sample: false,
            }
        );

        let valid = SamplingParams {
            max_new_tokens: 8,
            temperature: 0.0,
            top_k: 0,
            top_p: 1.0,
            do_sample: true,
        };
        assert_eq!(sanitize_sampling(valid, &defaults), valid);
    }

    #[test]
    fn request_from_explicit_prompt() {
        let request = build_request(
            &query(&[
                ("prompt", "AI is the future because"),
                ("n", "abc"),
                ("modifiers", "Keep it concise.|Be persuasive."),
            ]),
            &PromptTemplate::default(),
            &SamplingParams::default(),
            3,
        );
        assert_eq!(request.base_prompt(), "AI is the future because");
        assert_eq!(request.count(), 3);
        assert_eq!(request.modifiers().len(), 2);
    }

    #[test]
    fn request_without_prompt_uses_template_and_default_modifiers() {
        let request = build_request(
            &query(&[("tone", "energetic"), ("modifiers", "|")]),
            &PromptTemplate::default(),
            &SamplingParams::default(),
            3,
        );
        assert!(request.base_prompt().contains("in a energetic tone"));
        assert_eq!(request.modifiers(), default_modifiers().as_slice());
    }
}
