use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::bail;

#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::model::SamplingParams;

const DEFAULT_PORT: u16 = 7000;

/// Which text-generation backend serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Gemini,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Gemini => "gemini",
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "tch-backend") {
            BackendKind::Local
        } else {
            BackendKind::Gemini
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "local" | "torch" | "tch" => Ok(BackendKind::Local),
            "gemini" | "remote" => Ok(BackendKind::Gemini),
            other => bail!("unknown backend '{other}', expected 'local' or 'gemini'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub backend: BackendKind,
    pub model_id: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub eos_token_id: i64,
    pub seed: u64,
    pub sampling: SamplingParams,
    pub default_variations: usize,
    pub prompt_template: Option<String>,
    pub gemini: Option<GeminiConfig>,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("SERVER_ADDR")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT));

        let backend = match lookup("BACKEND") {
            Some(raw) => raw.parse()?,
            None => BackendKind::default(),
        };

        let model_id = lookup("MODEL_ID").unwrap_or_else(|| "gpt2".to_string());
        let model_path =
            PathBuf::from(lookup("MODEL_PATH").unwrap_or_else(|| "models/gpt2.ts".to_string()));
        let tokenizer_path = PathBuf::from(
            lookup("TOKENIZER_PATH").unwrap_or_else(|| "models/tokenizer.json".to_string()),
        );
        let eos_token_id = parse_var(&lookup, "EOS_TOKEN_ID").unwrap_or(50256);
        let seed = parse_var(&lookup, "SEED").unwrap_or(60);

        let fallback = SamplingParams::default();
        let sampling = SamplingParams {
            max_new_tokens: parse_var(&lookup, "MAX_NEW_TOKENS")
                .filter(|v: &usize| *v > 0)
                .unwrap_or(fallback.max_new_tokens),
            temperature: parse_var(&lookup, "TEMPERATURE")
                .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                .unwrap_or(fallback.temperature),
            top_k: parse_var(&lookup, "TOP_K").unwrap_or(fallback.top_k),
            top_p: parse_var(&lookup, "TOP_P")
                .filter(|v: &f64| *v > 0.0 && *v <= 1.0)
                .unwrap_or(fallback.top_p),
            do_sample: parse_var(&lookup, "DO_SAMPLE").unwrap_or(fallback.do_sample),
        };
        let default_variations = parse_var(&lookup, "DEFAULT_VARIATIONS")
            .filter(|v: &usize| *v > 0)
            .unwrap_or(3);
        let prompt_template = lookup("PROMPT_TEMPLATE").filter(|t| !t.trim().is_empty());

        let gemini = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| GeminiConfig {
                api_key,
                base_url: lookup("GEMINI_BASE_URL").unwrap_or_else(|| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                text_model: lookup("GEMINI_TEXT_MODEL")
                    .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
                image_model: lookup("GEMINI_IMAGE_MODEL")
                    .unwrap_or_else(|| "gemini-2.5-flash-image".to_string()),
                timeout: parse_var(&lookup, "GEMINI_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| Duration::from_secs(60)),
            });

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = lookup("DEVICE").unwrap_or_else(|| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            listen_addr,
            backend,
            model_id,
            model_path,
            tokenizer_path,
            eos_token_id,
            seed,
            sampling,
            default_variations,
            prompt_template,
            gemini,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower == "cpu" {
        Device::Cpu
    } else if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            Device::Cpu
        }
    } else {
        Device::Cpu
    }
}
