use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use framewindow::{
    DeliverySlot, FfmpegLogLevel, FfmpegOpener, FileCatalog, LoaderConfig, OpenFileRegistry,
    SoftwareDecoderFactory, VideoLoader, probe_dimensions,
};

const CLI_AFTER_HELP: &str = "Examples:\n  framewindow catalog dataset/ --json\n  framewindow probe clip.mp4\n  framewindow read dataset/ --count 8 --stride 2 --samples 32 --out frames --progress\n  framewindow read --list train.txt --count 16 --shard 1 --shards 4\n  framewindow completions zsh > _framewindow";

#[derive(Debug, Parser)]
#[command(
    name = "framewindow",
    version,
    about = "Read exact frame windows from video catalogs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show loader diagnostics (repeat for more detail).
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Parser, Clone)]
struct CatalogSource {
    /// Dataset root: one sub-directory per class.
    root: Option<PathBuf>,

    /// Text file of `path label` pairs, instead of a dataset root.
    #[arg(long, conflicts_with = "root")]
    list: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the (path, label) entries of a catalog.
    #[command(
        about = "Print catalog entries",
        after_help = "Examples:\n  framewindow catalog dataset/\n  framewindow catalog --list train.txt --json"
    )]
    Catalog {
        #[command(flatten)]
        source: CatalogSource,

        /// Output entries as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Open one file the way the loader does and print its stream facts.
    #[command(
        about = "Probe a video file",
        visible_alias = "info",
        after_help = "Examples:\n  framewindow probe clip.mp4\n  framewindow probe clip.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output facts as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode sequences from a catalog.
    #[command(
        about = "Read frame sequences",
        after_help = "Examples:\n  framewindow read dataset/ --count 8 --samples 4 --out frames"
    )]
    Read {
        #[command(flatten)]
        source: CatalogSource,

        /// Frames per sequence.
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Distance between frames of a sequence.
        #[arg(long, default_value_t = 1)]
        stride: usize,

        /// Distance between sequence starts (defaults to --count).
        #[arg(long)]
        step: Option<usize>,

        /// Shard to read.
        #[arg(long, default_value_t = 0)]
        shard: usize,

        /// Number of shards.
        #[arg(long, default_value_t = 1)]
        shards: usize,

        /// Sequences to read (defaults to the whole shard).
        #[arg(long)]
        samples: Option<usize>,

        /// Directory to save decoded frames into as PNG.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print final statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn load_catalog(source: &CatalogSource) -> Result<FileCatalog, Box<dyn std::error::Error>> {
    match (&source.root, &source.list) {
        (_, Some(list)) => Ok(FileCatalog::from_list_file(list)?),
        (Some(root), None) => Ok(FileCatalog::from_directory(root)?),
        (None, None) => Err("either a dataset root or --list is required".into()),
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match global.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();

    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        framewindow::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn probe(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let opener = Arc::new(FfmpegOpener::new());
    let (width, height) = probe_dimensions(input, opener.as_ref())?;
    let mut registry = OpenFileRegistry::new(
        opener,
        Box::new(SoftwareDecoderFactory::new()),
        Arc::new(DeliverySlot::new()),
    );
    let file = registry.get_or_open(input)?;
    let entry = file.entry;

    if json {
        let payload = json!({
            "path": entry.path.display().to_string(),
            "stream_index": entry.stream_index,
            "codec": format!("{:?}", entry.codec),
            "width": width,
            "height": height,
            "stream_base": entry.stream_base.to_string(),
            "frame_base": entry.frame_base.to_string(),
            "frame_count": entry.frame_count,
            "annexb": entry.normalizer.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("File: {}", entry.path.display());
        println!(
            "Video: stream {} {:?} {}x{}",
            entry.stream_index, entry.codec, width, height
        );
        println!("Stream base: {}", entry.stream_base);
        println!("Frame base: {}", entry.frame_base);
        println!("Frames: {}", entry.frame_count);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Catalog { source, json } => {
            let catalog = load_catalog(&source)?;
            if json {
                let payload: Vec<_> = catalog
                    .entries()
                    .iter()
                    .map(|entry| {
                        json!({
                            "path": entry.path.display().to_string(),
                            "label": entry.label,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for entry in catalog.entries() {
                    println!("{} {}", entry.path.display(), entry.label);
                }
                eprintln!("{} {} file(s)", "catalog:".cyan().bold(), catalog.len());
            }
        }
        Commands::Probe { input, json } => probe(&input, json)?,
        Commands::Read {
            source,
            count,
            stride,
            step,
            shard,
            shards,
            samples,
            out,
            json,
        } => {
            let catalog = load_catalog(&source)?;
            let mut config = LoaderConfig::new()
                .with_sequence_length(count)
                .with_stride(stride)
                .with_shard(shard, shards);
            if let Some(step) = step {
                config = config.with_step(step);
            }

            let mut loader = VideoLoader::start(
                config,
                catalog,
                Arc::new(FfmpegOpener::new()),
                Box::new(SoftwareDecoderFactory::new()),
            )?;
            if loader.is_empty() {
                return Err("no sequence fits in this shard".into());
            }
            let samples = samples.unwrap_or(loader.len());

            if let Some(out) = &out {
                fs::create_dir_all(out)?;
            }

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(samples as u64);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let mut sequence = loader.prepare_empty();
            let mut saved = 0_u64;
            for index in 0..samples {
                loader.read_sample(&mut sequence)?;
                if let Some(out) = &out {
                    for frame in 0..sequence.count() {
                        let path = out.join(format!(
                            "seq{index:05}_label{}_frame{:06}.png",
                            sequence.label,
                            sequence.first_frame + (frame * stride) as i64
                        ));
                        sequence.save_frame(frame, &path)?;
                        saved += 1;
                    }
                }
                if let Some(pb) = &progress_bar {
                    pb.inc(1);
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            let stats = loader.stats();
            loader.shutdown()?;

            if json {
                let payload = json!({
                    "sequences": samples,
                    "frames_saved": saved,
                    "bytes_read": stats.bytes_read,
                    "packets_read": stats.packets_read,
                    "bytes_decoded": stats.bytes_decoded,
                    "packets_decoded": stats.packets_decoded,
                    "frames_used": stats.frames_used,
                    "decode_ratio": stats.decode_ratio(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!("Read {samples} sequence(s), saved {saved} frame(s)").green()
                );
                println!(
                    "Packets read {} ({} bytes), decoded {} ({} bytes), frames used {}",
                    stats.packets_read,
                    stats.bytes_read,
                    stats.packets_decoded,
                    stats.bytes_decoded,
                    stats.frames_used
                );
                if let Some(ratio) = stats.decode_ratio() {
                    println!("Decoded packets per used frame: {ratio:.2}");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framewindow", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
