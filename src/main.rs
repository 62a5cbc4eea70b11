use clap::{Parser, Subcommand, ValueEnum};
use shutterprep::capture::{self, ActivationOutcome, CaptureError, CaptureRequest, PendingCapture};
use shutterprep::config::{self, CaptureConfig};
use shutterprep::imaging::{ImageBackend, normalize_to_path};
use shutterprep::{batch, output};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// File the continuation token is saved to inside the cache directory.
const TOKEN_FILE: &str = "pending.json";

fn version_string() -> &'static str {
    match (env!("ON_RELEASE_TAG"), env!("GIT_HASH")) {
        ("true", _) => env!("CARGO_PKG_VERSION"),
        (_, "") => concat!(env!("CARGO_PKG_VERSION"), "-dev"),
        // Built once at startup
        (_, hash) => {
            Box::leak(format!("{}-dev+{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
        }
    }
}

/// Request overrides shared by commands that normalize.
///
/// Values use the wire form: a non-positive width or height means
/// "unconstrained".
#[derive(clap::Args, Clone, Default)]
struct RequestArgs {
    /// JPEG quality, 0-100
    #[arg(long, allow_hyphen_values = true)]
    quality: Option<i64>,
    /// Target width in pixels (-1 = unconstrained)
    #[arg(long, allow_hyphen_values = true)]
    width: Option<i64>,
    /// Target height in pixels (-1 = unconstrained)
    #[arg(long, allow_hyphen_values = true)]
    height: Option<i64>,
}

impl RequestArgs {
    fn apply(&self, defaults: &CaptureConfig) -> CaptureRequest {
        CaptureRequest::from_raw(
            self.quality.unwrap_or(defaults.quality),
            self.width.unwrap_or(defaults.width),
            self.height.unwrap_or(defaults.height),
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

impl From<Outcome> for ActivationOutcome {
    fn from(o: Outcome) -> Self {
        match o {
            Outcome::Completed => ActivationOutcome::Completed,
            Outcome::Cancelled => ActivationOutcome::Cancelled,
            Outcome::Failed => ActivationOutcome::Failed,
        }
    }
}

#[derive(Parser)]
#[command(name = "shutterprep")]
#[command(about = "Normalize camera captures into small, upright JPEGs")]
#[command(long_about = "\
Normalize camera captures into small, upright JPEGs

Each photo is decoded at the smallest resolution that still covers the
requested size, scaled to fit while keeping its aspect ratio, rotated
according to its EXIF orientation, and re-encoded as JPEG.

Capture flow:

  shutterprep begin                 # prints the path the camera writes to
  <camera writes the photo>
  shutterprep finish --outcome completed --output photos/
                                    # prints file:///.../photos/<millis>.jpg
  shutterprep delete file:///.../photos/<millis>.jpg

Run 'shutterprep gen-config' to generate a documented shutterprep.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing shutterprep.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a single photo
    Normalize {
        source: PathBuf,
        /// Output file (default: <stem>-normalized.jpg next to the source)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Remove the source once the output is written
        #[arg(long)]
        delete_source: bool,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Normalize every JPEG under a directory, mirroring the tree
    Batch {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Start a capture session and print the path the camera should write to
    Begin {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Finish the pending capture session
    Finish {
        #[arg(long, value_enum, default_value = "completed")]
        outcome: Outcome,
        /// Directory for the normalized photo
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Delete a photo returned by `finish`
    Delete { uri: String },
    /// Print a stock shutterprep.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    let backend = config.processing.backend();

    match cli.command {
        Command::Normalize {
            source,
            output,
            delete_source,
            request,
        } => {
            let request = request.apply(&config.capture).normalize_request();
            let dest = output.unwrap_or_else(|| default_output(&source));
            let native = backend.identify(&source)?;
            let normalized = normalize_to_path(&backend, &source, &dest, &request)?;
            if delete_source {
                capture::discard_source(&source, &dest)?;
            }
            output::print_normalized(native, &normalized, &source, &capture::file_uri(&dest));
        }
        Command::Batch {
            dir,
            output,
            request,
        } => {
            let request = request.apply(&config.capture).normalize_request();
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let root = dir.clone();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_batch_event(&event, &root));
                }
            });
            let outcomes = batch::run(&backend, &dir, &output, &request, Some(tx))?;
            printer.join().unwrap();
            let summary = batch::BatchSummary::from_outcomes(&outcomes);
            output::print_batch_summary(&summary);
            if summary.failed > 0 {
                return Err(format!("{} photo(s) failed", summary.failed).into());
            }
        }
        Command::Begin { request } => {
            let cache_dir = &config.capture.cache_dir;
            let pending = PendingCapture::begin(cache_dir, request.apply(&config.capture))?;
            pending.save(&cache_dir.join(TOKEN_FILE))?;
            println!("{}", pending.photo_path.display());
        }
        Command::Finish { outcome, output } => {
            let token_path = config.capture.cache_dir.join(TOKEN_FILE);
            let pending = if token_path.exists() {
                Some(PendingCapture::restore(&token_path)?)
            } else {
                None
            };
            let result = capture::complete(&backend, pending.as_ref(), outcome.into(), &output);
            // The session is over unless processing failed and can be retried.
            if !matches!(result, Err(CaptureError::Processing(_) | CaptureError::Io(_)))
                && pending.is_some()
            {
                std::fs::remove_file(&token_path)?;
            }
            output::print_capture(&result?);
        }
        Command::Delete { uri } => {
            capture::delete_photo(&uri)?;
            println!("Deleted {uri}");
        }
        Command::GenConfig => unreachable!("handled before config is loaded"),
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, _) => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config::effective_threads(processing))
        .build_global()
        .ok();
}

fn default_output(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    source.with_file_name(format!("{stem}-normalized.jpg"))
}
