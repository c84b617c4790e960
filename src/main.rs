//! ktxgen - batch GPU texture generation
//!
//! Converts every PNG/JPEG under a directory into PVRTC, ETC1, ETC2, ASTC
//! and DXT `.ktx` files next to the source, using PVRTexToolCLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ktxgen::compressor::{resolve_compressor, DEFAULT_COMPRESSOR};
use ktxgen::{
    generate_textures, plan_commands, probe_file, ConversionRequest, ExecutionMode,
    LoneFacePolicy, OutputFormat, Platform, Quality,
};

#[derive(Parser)]
#[command(name = "ktxgen")]
#[command(version)]
#[command(about = "Batch-convert PNG/JPEG images and cubemaps to GPU-compressed KTX textures")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by every command that walks an input tree
#[derive(Args)]
struct RequestArgs {
    /// Root directory of the source images
    input_dir: PathBuf,

    /// PVRTexToolCLI executable (name on PATH, or a path)
    #[arg(short, long, env = "PVRTEXTOOL_CLI", default_value = DEFAULT_COMPRESSOR)]
    compressor: String,

    /// Compression quality
    #[arg(short, long, value_enum, default_value_t = Quality::High)]
    quality: Quality,

    /// Output formats, comma-separated (default: every format this platform supports)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    formats: Vec<OutputFormat>,

    /// Convert cube faces without a complete set as ordinary images
    #[arg(long)]
    lone_faces_as_images: bool,
}

impl RequestArgs {
    fn into_request(self, compressor: PathBuf) -> ConversionRequest {
        let formats = if self.formats.is_empty() {
            Platform::current().default_formats()
        } else {
            self.formats
        };

        let mut request = ConversionRequest::new(compressor, self.input_dir)
            .with_formats(&formats)
            .with_quality(self.quality);
        if self.lone_faces_as_images {
            request.lone_faces = LoneFacePolicy::ConvertAsImage;
        }
        request
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate KTX textures for every image under a directory
    Generate {
        #[command(flatten)]
        request: RequestArgs,

        /// Launch compressor processes without waiting for them
        #[arg(long)]
        detached: bool,

        /// Delete existing .ktx files under the input directory first
        #[arg(long)]
        clean: bool,
    },

    /// Print the compressor commands a run would execute, without running them
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Report whether image files carry an alpha channel
    Probe {
        /// PNG or JPEG files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "ktxgen=debug" } else { "ktxgen=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            request,
            detached,
            clean,
        } => {
            let compressor = resolve_compressor(&request.compressor)?;
            let mut request = request.into_request(compressor);
            request.clean_outputs = clean;
            if detached {
                request = request.with_mode(ExecutionMode::Detached);
            }

            println!("Compressor: {}", request.compressor.display());
            println!("Input:      {}", request.input_dir.display());
            println!();

            // Blocking mode waits on every compressor run; keep that off the async workers
            let run = tokio::task::spawn_blocking(move || generate_textures(request)).await??;
            let summary = &run.summary;

            if summary.removed_outputs > 0 {
                println!("Removed {} existing .ktx files", summary.removed_outputs);
            }

            if detached {
                let launched = run.pending.settle().await?;
                println!(
                    "Launched {} conversions for {} images and {} cubemaps",
                    launched, summary.images, summary.cube_sets
                );
                return Ok(());
            }

            println!(
                "Converted {} images and {} cubemaps ({} compressor runs)",
                summary.images, summary.cube_sets, summary.invocations
            );

            if summary.has_failures() {
                println!("\nFailed conversions:");
                for failure in &summary.failures {
                    println!(
                        "  {:<6} {} ({})",
                        failure.format,
                        failure.output.display(),
                        failure.status
                    );
                }
                anyhow::bail!(
                    "{} of {} conversions failed",
                    summary.failures.len(),
                    summary.invocations
                );
            }
        }

        Commands::Plan { request } => {
            let compressor = PathBuf::from(&request.compressor);
            for cmd in plan_commands(request.into_request(compressor))? {
                println!("{}", cmd.command_line());
            }
        }

        Commands::Probe { files } => {
            for file in &files {
                let has_alpha = probe_file(file)?;
                println!("{}: {}", file.display(), if has_alpha { "alpha" } else { "opaque" });
            }
        }
    }

    Ok(())
}
