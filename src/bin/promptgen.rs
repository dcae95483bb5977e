use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, bail};
use base64::{Engine, prelude::BASE64_STANDARD};
use clap::{Args, Parser, Subcommand};

use prompt_variation_service::{
    AppConfig, GenerationRequest, ImageGenerator, ModelRegistry, PromptTemplate,
    PromptTemplateFields, SamplingParams, VariationBatch, chat::run_chat, expand_variations,
    logging::init_tracing, model::GeminiClient, params::sanitize_sampling,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prompt variation and image generation from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with the text backend interactively
    Chat {
        #[command(flatten)]
        sampling: SamplingArgs,
    },
    /// Generate a batch of prompt variations and print them as JSON
    Generate(GenerateArgs),
    /// Generate an image and save it to disk
    Image {
        /// Image description
        #[arg(long)]
        prompt: String,

        /// Where to write the decoded image
        #[arg(long, short, default_value = "generated_image.png")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SamplingArgs {
    #[arg(long)]
    max_new_tokens: Option<usize>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    top_p: Option<f64>,
    /// Decode greedily instead of sampling
    #[arg(long)]
    greedy: bool,
}

impl SamplingArgs {
    /// Out-of-range flags fall back to `defaults`, as on the HTTP path.
    fn apply(&self, defaults: &SamplingParams) -> SamplingParams {
        let candidate = SamplingParams {
            max_new_tokens: self.max_new_tokens.unwrap_or(defaults.max_new_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            do_sample: defaults.do_sample && !self.greedy,
        };
        sanitize_sampling(candidate, defaults)
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Explicit base prompt; the template is used when omitted
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    audience: Option<String>,
    #[arg(long)]
    tone: Option<String>,
    #[arg(long)]
    lead_sentence: Option<String>,
    #[arg(long)]
    length: Option<String>,
    /// Number of variations
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Phrase appended to the base prompt; repeat for several
    #[arg(long = "modifier")]
    modifiers: Vec<String>,
    #[command(flatten)]
    sampling: SamplingArgs,
}

impl GenerateArgs {
    /// Blank flags keep their defaults, as on the HTTP path.
    fn template_fields(&self) -> PromptTemplateFields {
        let supplied: HashMap<String, String> = [
            ("audience", &self.audience),
            ("tone", &self.tone),
            ("lead_sentence", &self.lead_sentence),
            ("length", &self.length),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
        .collect();
        PromptTemplateFields::from_params(&supplied)
    }
}

fn main() -> Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Chat { sampling } => {
            let registry = ModelRegistry::initialize(&config)?;
            // Short replies by default; the reply is cut at the first sentence anyway.
            let defaults = SamplingParams {
                max_new_tokens: 40,
                ..config.sampling
            };
            let params = sampling.apply(&defaults);
            let stdin = io::stdin();
            run_chat(
                registry.text_generator().as_ref(),
                &params,
                stdin.lock(),
                io::stdout(),
            )?;
        }
        Command::Generate(args) => {
            let registry = ModelRegistry::initialize(&config)?;
            let template = match config.prompt_template.as_deref() {
                Some(source) => PromptTemplate::new(source),
                None => PromptTemplate::default(),
            };
            let base_prompt = template.resolve(args.prompt.as_deref(), &args.template_fields());
            let request = GenerationRequest::new(
                base_prompt,
                args.modifiers.clone(),
                args.count.unwrap_or(config.default_variations),
                args.sampling.apply(&config.sampling),
            );

            let variations = expand_variations(registry.text_generator().as_ref(), &request)?;
            let batch = VariationBatch {
                base_prompt: request.base_prompt().to_string(),
                variations,
            };
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &batch)?;
            writeln!(stdout)?;
        }
        Command::Image { prompt, output } => {
            if prompt.trim().is_empty() {
                bail!("--prompt must not be empty");
            }
            let gemini = config
                .gemini
                .clone()
                .context("GEMINI_API_KEY must be set for image generation")?;
            let client = GeminiClient::new(gemini);
            let image = client.generate_image(&prompt)?;

            let bytes = BASE64_STANDARD
                .decode(image.data.as_bytes())
                .context("backend returned invalid base64 image data")?;
            fs::write(&output, bytes)
                .with_context(|| format!("writing {}", output.display()))?;

            if let Some(caption) = image.caption {
                println!("{caption}");
            }
            println!("saved {} image to {}", image.mime_type, output.display());
        }
    }

    Ok(())
}
