use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use image_api::GeminiImageClient;
use shared::domain::{
    AspectRatio, BattleRequest, GenerationOptions, ImageCount, ModelType, UpscaleState,
};
use storage::{PromptHistory, Storage};
use studio_core::{Settlement, Studio, StudioEvent, UpscaleOutcome};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{load_settings, prepare_database_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "studio", about = "Generate, compare and upscale images")]
struct Cli {
    /// TOML settings file; defaults to ./studio.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a batch of images from one prompt.
    Forge(ForgeArgs),
    /// Generate two contenders side by side.
    Battle(BattleArgs),
    /// Show or clear recent prompts.
    History {
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args, Debug)]
struct ForgeArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "imagen")]
    model: ModelType,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    count: u8,
    #[arg(long, default_value = "1:1")]
    aspect_ratio: AspectRatio,
    /// 1-based positions of images to regenerate at high fidelity.
    #[arg(long, num_args = 1..)]
    upscale: Vec<usize>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BattleArgs {
    #[arg(long)]
    prompt_a: String,
    #[arg(long)]
    prompt_b: String,
    #[arg(long, default_value = "imagen")]
    model_a: ModelType,
    #[arg(long, default_value = "imagen")]
    model_b: ModelType,
    #[arg(long, default_value = "1:1")]
    aspect_ratio_a: AspectRatio,
    #[arg(long, default_value = "1:1")]
    aspect_ratio_b: AspectRatio,
    #[arg(long)]
    out: Option<PathBuf>,
}

fn options_for(
    model: ModelType,
    count: ImageCount,
    aspect_ratio: AspectRatio,
) -> GenerationOptions {
    match model {
        ModelType::Imagen => GenerationOptions::imagen(count, aspect_ratio),
        ModelType::NanoBanana => GenerationOptions::nano_banana(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(database_url) = &cli.database_url {
        settings.database_url = database_url.clone();
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let database_url = prepare_database_url(&settings.database_url);
    let storage = Arc::new(
        Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open prompt history at '{database_url}'"))?,
    );
    let mut history = PromptHistory::load(storage).await?;

    match cli.command {
        Command::History { clear } => run_history(&mut history, clear).await,
        Command::Forge(args) => {
            record_prompts(&mut history, &[args.prompt.as_str()]).await;
            let studio = build_studio(&settings);
            run_forge(&studio, &settings, args).await
        }
        Command::Battle(args) => {
            let prompts = [args.prompt_a.as_str(), args.prompt_b.as_str()];
            record_prompts(&mut history, &prompts).await;
            let studio = build_studio(&settings);
            run_battle(&studio, &settings, args).await
        }
    }
}

fn build_studio(settings: &Settings) -> Arc<Studio> {
    let client = GeminiImageClient::new(settings.api_settings());
    let studio = Studio::new(Arc::new(client));
    tokio::spawn(log_events(studio.subscribe_events()));
    studio
}

async fn log_events(mut events: broadcast::Receiver<StudioEvent>) {
    loop {
        match events.recv().await {
            Ok(StudioEvent::GenerationStarted {
                mode,
                expected_images,
            }) => info!(?mode, expected_images, "generating"),
            Ok(StudioEvent::UpscaleStarted(image_id)) => info!(%image_id, "upscaling"),
            Ok(StudioEvent::UpscaleFailed { image_id, message }) => {
                warn!(%image_id, %message, "upscale failed")
            }
            Ok(event) => debug!(?event, "studio event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// History is a convenience; a storage failure must not block generation.
async fn record_prompts(history: &mut PromptHistory, prompts: &[&str]) {
    for prompt in prompts {
        if let Err(error) = history.record(prompt).await {
            warn!(%error, "failed to record prompt history");
        }
    }
}

async fn run_history(history: &mut PromptHistory, clear: bool) -> Result<()> {
    if clear {
        history.clear().await?;
        println!("Prompt history cleared.");
        return Ok(());
    }

    if history.is_empty() {
        println!("No recent prompts.");
    }
    for (position, prompt) in history.entries().iter().enumerate() {
        println!("{:>2}. {prompt}", position + 1);
    }
    Ok(())
}

async fn run_forge(studio: &Arc<Studio>, settings: &Settings, args: ForgeArgs) -> Result<()> {
    let count = ImageCount::try_from(args.count)?;
    let options = options_for(args.model, count, args.aspect_ratio);

    let images = match studio.submit_forge(&args.prompt, options).await? {
        Settlement::Completed(images) => images,
        Settlement::Failed(message) => bail!(message),
        Settlement::Discarded => bail!("generation was superseded"),
    };

    let mut targets = Vec::new();
    for position in &args.upscale {
        match position.checked_sub(1).and_then(|index| images.get(index)) {
            Some(image) => targets.push(image.id.clone()),
            None => warn!(
                position,
                available = images.len(),
                "no image at upscale position"
            ),
        }
    }

    let outcomes = join_all(targets.iter().map(|image_id| studio.upscale(image_id))).await;
    for (image_id, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            UpscaleOutcome::Upscaled { .. } => println!("Upscaled {image_id}"),
            UpscaleOutcome::Failed { message } => eprintln!("{image_id}: {message}"),
            UpscaleOutcome::Skipped | UpscaleOutcome::Discarded => {
                debug!(%image_id, ?outcome, "upscale not applied")
            }
        }
    }

    let out_dir = output_dir(settings, args.out.as_deref());
    for image in studio.snapshot().await.images {
        let path = output::write_image(&out_dir, image.id.as_str(), &image.source).await?;
        let marker = match image.upscale_state() {
            UpscaleState::Upscaled => " (upscaled)",
            UpscaleState::Upscaling => " (upscaling)",
            UpscaleState::Idle => "",
        };
        println!("{}{marker}", path.display());
    }
    Ok(())
}

async fn run_battle(studio: &Arc<Studio>, settings: &Settings, args: BattleArgs) -> Result<()> {
    let request = BattleRequest {
        prompt_a: args.prompt_a,
        options_a: options_for(args.model_a, ImageCount::ONE, args.aspect_ratio_a),
        prompt_b: args.prompt_b,
        options_b: options_for(args.model_b, ImageCount::ONE, args.aspect_ratio_b),
    };

    let result = match studio.submit_battle(request).await? {
        Settlement::Completed(result) => result,
        Settlement::Failed(message) => bail!(message),
        Settlement::Discarded => bail!("battle was superseded"),
    };

    let out_dir = output_dir(settings, args.out.as_deref());
    for (stem, contender) in [
        ("contender-a", &result.contender_a),
        ("contender-b", &result.contender_b),
    ] {
        let path = output::write_image(&out_dir, stem, &contender.image).await?;
        println!(
            "{} [{}] {}",
            path.display(),
            contender.options.model.label(),
            contender.prompt
        );
    }
    Ok(())
}

fn output_dir(settings: &Settings, requested: Option<&Path>) -> PathBuf {
    requested
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.output_dir.clone())
}
