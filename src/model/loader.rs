use std::{fs, path::Path, time::Instant};

use parking_lot::Mutex;
use tch::{Device, Kind, Tensor, no_grad};
use tokenizers::Tokenizer;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{BackendMetadata, LogitsSampler, SamplingParams, TextGenerator},
};

/// A traced causal language model served from a TorchScript file.
pub struct TorchGenerator {
    name: String,
    size_bytes: u64,
    device: Device,
    eos_token_id: i64,
    tokenizer: Tokenizer,
    module: Mutex<tch::CModule>,
    sampler: Mutex<LogitsSampler>,
}

impl TorchGenerator {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let tokenizer = Tokenizer::from_file(config.tokenizer_path.as_path())
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        Self::new(
            &config.model_id,
            &config.model_path,
            tokenizer,
            config.device,
            config.eos_token_id,
            config.seed,
        )
    }

    pub fn new(
        name: &str,
        module_path: &Path,
        tokenizer: Tokenizer,
        device: Device,
        eos_token_id: i64,
        seed: u64,
    ) -> Result<Self, ServiceError> {
        if !module_path.exists() {
            return Err(ServiceError::Config(format!(
                "model artifact missing: {}",
                module_path.display()
            )));
        }
        let size_bytes = fs::metadata(module_path)?.len();
        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        module.set_eval();

        tracing::info!(model = name, size_bytes, ?device, "torchscript model loaded");

        Ok(Self {
            name: name.to_string(),
            size_bytes,
            device,
            eos_token_id,
            tokenizer,
            module: Mutex::new(module),
            sampler: Mutex::new(LogitsSampler::new(seed)),
        })
    }

    fn next_token_logits(
        &self,
        module: &tch::CModule,
        input_ids: &[i64],
    ) -> Result<Vec<f32>, ServiceError> {
        let input_tensor = Tensor::from_slice(input_ids)
            .reshape([1, input_ids.len() as i64])
            .to(self.device);

        // Traced GPT-2 exports return either the logits or (logits, past).
        let output = module
            .forward_is(&[tch::IValue::Tensor(input_tensor)])
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        let logits = match output {
            tch::IValue::Tensor(t) => t,
            tch::IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                tch::IValue::Tensor(t) => t.shallow_clone(),
                _ => {
                    return Err(ServiceError::Inference(
                        "expected tensor as first tuple element".into(),
                    ));
                }
            },
            _ => {
                return Err(ServiceError::Inference(
                    "unexpected model output format".into(),
                ));
            }
        };

        // [1, seq_len, vocab] -> [vocab]
        let last = logits
            .select(1, -1)
            .squeeze()
            .to_kind(Kind::Float)
            .to_device(Device::Cpu);
        Vec::<f32>::try_from(&last).map_err(|e| ServiceError::Inference(e.to_string()))
    }
}

impl TextGenerator for TorchGenerator {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::BadRequest("prompt must not be empty".into()));
        }

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        if input_ids.is_empty() {
            input_ids.push(self.eos_token_id);
        }
        let prompt_token_len = input_ids.len();

        let start = Instant::now();

        no_grad(|| {
            let module = self.module.lock();
            let mut sampler = self.sampler.lock();

            for _ in 0..params.max_new_tokens {
                let logits = self.next_token_logits(&module, &input_ids)?;
                let next_token_id = sampler
                    .sample(&logits, params)
                    .ok_or_else(|| ServiceError::Inference("model produced no logits".into()))?
                    as i64;

                if next_token_id == self.eos_token_id {
                    break;
                }
                input_ids.push(next_token_id);
            }

            Ok::<(), ServiceError>(())
        })?;

        let generated_ids: Vec<u32> = input_ids[prompt_token_len..]
            .iter()
            .map(|&id| id as u32)
            .collect();
        let completion = self
            .tokenizer
            .decode(&generated_ids, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

        tracing::debug!(
            tokens = generated_ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "local generation finished"
        );

        Ok(completion)
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: self.name.clone(),
            kind: "local".to_string(),
            model: format!("torchscript ({} bytes)", self.size_bytes),
        }
    }
}
