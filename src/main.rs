use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reelcast::{
    audio::SpeakerOutput,
    composition::CompositionEngine,
    config::{AspectRatio, CaptionStyle, Config},
    timeline::JsonScriptGenerator,
};

#[derive(Parser)]
#[command(
    name = "reelcast",
    version,
    about = "Render timed image and caption timelines against a voiceover",
    long_about = "Reelcast lays images, captions and motion onto a voiceover track according to a generated timeline, plays the result back, and captures it into a single WebM file."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output aspect ratio (16:9, 9:16, 1:1)
    #[arg(long, global = true)]
    aspect: Option<String>,

    /// Caption style (classic, karaoke, bold)
    #[arg(long, global = true)]
    caption_style: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Capture the whole timeline to a video file
    Render {
        #[command(flatten)]
        project: ProjectArgs,

        /// Directory for the captured file
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Render a single frame to a PNG
    Frame {
        #[command(flatten)]
        project: ProjectArgs,

        /// Time in seconds
        #[arg(long)]
        at: f64,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Play the timeline in real time through the speakers
    Play {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Save the project metadata as JSON
    Snapshot {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(short, long, default_value = reelcast::timeline::SNAPSHOT_FILE_NAME)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Voiceover file (WAV, MP3, FLAC, OGG)
    #[arg(short, long)]
    audio: PathBuf,

    /// Images in the order the timeline indexes them
    #[arg(short, long, num_args = 1.., required = true)]
    images: Vec<PathBuf>,

    /// Generator output: a JSON array of timeline records
    #[arg(short, long)]
    timeline: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Starting reelcast v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    match cli.command {
        Command::Render { project, output } => {
            let monitor = config.capture.monitor_audio;
            let mut engine = open_project(config, &project).await?;
            if monitor {
                attach_speakers(&mut engine);
            }

            std::fs::create_dir_all(&output)?;
            let artifact = engine.run_capture().await?;
            let path = artifact.save_to(&output)?;
            info!("🎉 Capture saved to: {:?}", path);
        }
        Command::Frame { project, at, output } => {
            let mut engine = open_project(config, &project).await?;
            let frame = engine.seek(at)?;
            frame.save_png(&output)?;
            info!("Frame at {:.2}s saved to {:?}", engine.current_time(), output);
        }
        Command::Play { project } => {
            let mut engine = open_project(config, &project).await?;
            attach_speakers(&mut engine);
            play(&mut engine).await?;
        }
        Command::Snapshot { project, output } => {
            let engine = open_project(config, &project).await?;
            engine.snapshot().save(&output)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if let Some(aspect) = &cli.aspect {
        config.video.aspect_ratio = AspectRatio::parse(aspect)
            .ok_or_else(|| anyhow!("Unknown aspect ratio: {}", aspect))?;
    }
    if let Some(style) = &cli.caption_style {
        config.video.caption_style = CaptionStyle::parse(style)
            .ok_or_else(|| anyhow!("Unknown caption style: {}", style))?;
    }
    Ok(config)
}

async fn open_project(config: Config, project: &ProjectArgs) -> Result<CompositionEngine> {
    let mut engine = CompositionEngine::new(config)?;
    engine.load_audio(&project.audio).await?;

    for path in &project.images {
        engine.add_image_file(path)?;
    }
    engine.await_assets(Duration::from_secs(30));

    let generator = JsonScriptGenerator::new(&project.timeline);
    let timeline = engine.generate_timeline(&generator)?;
    info!("Timeline ready: {} segments, ends at {:.2}s", timeline.len(), timeline.end_time());
    Ok(engine)
}

fn attach_speakers(engine: &mut CompositionEngine) {
    match SpeakerOutput::open() {
        Ok(speakers) => engine.set_monitor(Box::new(speakers)),
        Err(e) => warn!("Playing without sound: {}", e),
    }
}

async fn play(engine: &mut CompositionEngine) -> Result<()> {
    let budget = Duration::from_secs_f64(engine.config().render.frame_budget());
    let mut interval = tokio::time::interval(budget);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    engine.play()?;

    let mut frames = 0u32;
    let mut overruns = 0u32;
    let mut slowest = Duration::ZERO;
    let mut total = Duration::ZERO;

    loop {
        interval.tick().await;
        let Some(outcome) = engine.on_refresh()? else {
            break;
        };

        frames += 1;
        total += outcome.render_time;
        slowest = slowest.max(outcome.render_time);
        if outcome.render_time > budget {
            overruns += 1;
        }
        if !outcome.continuing {
            break;
        }
    }

    if frames > 0 {
        info!("⏹️  Played {} frames: avg {:.1}ms, slowest {:.1}ms, {} over the {:.1}ms budget",
              frames,
              total.as_secs_f64() * 1000.0 / frames as f64,
              slowest.as_secs_f64() * 1000.0,
              overruns,
              budget.as_secs_f64() * 1000.0);
    }
    Ok(())
}
