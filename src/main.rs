use clap::{Parser, Subcommand};
use cogtour::headless::{HeadlessImageryHost, HeadlessSession};
use cogtour::imagery::RenderMode;
use cogtour::models::Catalog;
use cogtour::reader::entry::parse_date;
use cogtour::reader::{CatalogReader, http_client, load_catalog, reader_for};
use cogtour::recording::RecordingController;
use cogtour::settings::{SettingKey, SettingsStore};
use cogtour::timeline::{nearest, within_selection_proximity};
use cogtour::tour::{TourController, TourOutcome};
use cogtour::utils::status::{catalog_table, print_catalog_summary};
use cogtour::{CogtourServer, Config, Source};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cogtour", version, about = "Explore and tour a time-ordered GeoTIFF catalog")]
struct Cli {
    /// Settings file holding the token, API URL and pasted payload
    #[arg(long, global = true, default_value = "cogtour-settings.json")]
    settings: PathBuf,

    /// Catalog API URL; overrides the stored one
    #[arg(long, global = true, env = "COGTOUR_API")]
    api: Option<String>,

    /// Load the catalog from the stored payload
    #[arg(long, global = true)]
    payload: bool,

    /// Globe access token; overrides the stored one
    #[arg(long, global = true, env = "COGTOUR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// NDVI ramp as a `value,red,green,blue,alpha` style file
    #[arg(long, global = true)]
    ndvi_style: Option<PathBuf>,

    /// Used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the viewer pages and the JSON API
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
        #[arg(long, default_value = "public")]
        static_dir: PathBuf,
        #[arg(long, default_value = "public/data/observations.geojson")]
        observations: PathBuf,
    },
    /// Load the catalog and print it
    Catalog,
    /// Product closest to a date (YYYY-MM-DD) or RFC 3339 time
    Nearest { time: String },
    /// Fly to and orbit every product in order
    Tour {
        /// Seconds spent orbiting each product (3 to 30)
        #[arg(long, default_value_t = 8)]
        orbit_seconds: u64,
        /// Record the camera path
        #[arg(long)]
        record: bool,
        #[arg(long, default_value = "recordings")]
        recordings: PathBuf,
        /// rgb or ndvi
        #[arg(long, default_value = "rgb")]
        mode: RenderMode,
        /// Check that every COG answers before showing it
        #[arg(long)]
        check_urls: bool,
    },
    /// Inspect or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    SetToken { token: String },
    SetApi { url: String },
    /// Store a catalog payload (a JSON array); an empty value clears it
    SetPayload {
        raw: Option<String>,
        #[arg(long, conflicts_with = "raw")]
        file: Option<PathBuf>,
    },
    Clear,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_from(cli: &Cli, settings: &SettingsStore) -> Config {
    let stored = Source::from_settings(settings, cli.payload);
    let source = match (&stored, cli.api.as_deref()) {
        (Source::Payload(_), _) => stored,
        (_, Some(api)) => Source::resolve(Some(api), None, false),
        _ => stored,
    };
    Config {
        source,
        token: cli.token.clone().or_else(|| settings.get(SettingKey::Token)),
        settings_path: cli.settings.clone(),
        ndvi_style: cli.ndvi_style.clone(),
        ..Config::default()
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn load_with_spinner(reader: &dyn CatalogReader) -> anyhow::Result<Catalog> {
    let pb = spinner(reader.describe());
    let result = load_catalog(reader).await;
    pb.finish_and_clear();
    Ok(result?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = SettingsStore::persistent(&cli.settings);
    let config = config_from(&cli, &settings);

    match cli.command {
        Command::Serve {
            port,
            static_dir,
            observations,
        } => {
            if config.token.is_none() {
                warn!("No access token configured, the globe falls back to default imagery");
            }
            let config = Config {
                port,
                static_dir,
                observations_path: observations,
                ..config
            };
            CogtourServer::new(config).await?.start().await
        }
        Command::Catalog => {
            let reader = reader_for(&config.source)?;
            let catalog = load_with_spinner(reader.as_ref()).await?;
            print_catalog_summary(&catalog, &config.ndvi_ramp()?);
            Ok(())
        }
        Command::Nearest { time } => {
            let at = parse_date(&time)
                .ok_or_else(|| anyhow::anyhow!("Unable to parse '{}' as a date", time))?;
            let reader = reader_for(&config.source)?;
            let catalog = load_with_spinner(reader.as_ref()).await?;
            match nearest(&catalog, at) {
                Some(product) => {
                    println!("{}", catalog_table(&Catalog::new(vec![product.clone()])));
                    if within_selection_proximity(product, at) {
                        println!("The viewer would select this product at {}.", at);
                    }
                }
                None => println!("{}", catalog.summary()),
            }
            Ok(())
        }
        Command::Tour {
            orbit_seconds,
            record,
            recordings,
            mode,
            check_urls,
        } => {
            let config = Config {
                orbit_duration: Duration::from_secs(orbit_seconds),
                recordings_dir: recordings,
                ..config
            };
            let host = if check_urls {
                HeadlessImageryHost::checking(http_client()?)
            } else {
                HeadlessImageryHost::offline()
            };
            let headless = HeadlessSession::new(config.ndvi_ramp()?, host);
            let session = headless.session.clone();

            let reader = reader_for(&config.source)?;
            session.set_mode(mode).await;
            session.load(reader.as_ref()).await?;
            print_catalog_summary(&session.catalog(), session.imagery().ramp());

            let tour = Arc::new(TourController::new(session.clone(), config.orbit_duration));
            let recorder = record.then(|| {
                let recorder =
                    RecordingController::new(&config.recordings_dir, session.throttle().clone());
                recorder.start_recording(Box::new(headless.viewer.capture()));
                recorder
            });

            let running = tour.clone();
            let mut task = tokio::spawn(async move { running.start_tour().await });
            let outcome = tokio::select! {
                outcome = &mut task => outcome?,
                _ = tokio::signal::ctrl_c() => {
                    tour.stop_tour();
                    task.await?
                }
            };
            match outcome {
                TourOutcome::Completed { stops } => info!("Tour finished after {} stops", stops),
                TourOutcome::Cancelled => info!("Tour stopped"),
                TourOutcome::EmptyCatalog => warn!("Nothing to tour, the catalog is empty"),
                TourOutcome::AlreadyRunning => {}
            }

            if let Some(recorder) = recorder {
                if let Some(path) = recorder.stop_recording().await? {
                    println!("Recording saved to {}", path.display());
                }
            }
            Ok(())
        }
        Command::Settings { action } => run_settings(&settings, action),
    }
}

fn run_settings(settings: &SettingsStore, action: SettingsCommand) -> anyhow::Result<()> {
    match action {
        SettingsCommand::Show => {
            println!("{}", settings.saved_summary());
            if let Some(api) = settings.get(SettingKey::Api) {
                println!("  API URL: {}", api);
            }
        }
        SettingsCommand::SetToken { token } => settings.set(SettingKey::Token, &token)?,
        SettingsCommand::SetApi { url } => settings.set(SettingKey::Api, &url)?,
        SettingsCommand::SetPayload { raw, file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => raw.unwrap_or_default(),
            };
            if settings.set_payload(&raw)? {
                println!("Payload saved. Use --payload to load the catalog from it.");
            } else {
                println!("Payload cleared.");
            }
        }
        SettingsCommand::Clear => {
            settings.clear()?;
            println!("{}", settings.saved_summary());
        }
    }
    Ok(())
}
