use anyhow::bail;
use capture_upload::infrastructure::{database, storage};
use capture_upload::models::{MediaOutcome, MediaSourceKind};
use capture_upload::services::location::{FixedLocationSource, PlatformInfo};
use capture_upload::services::media::FileMediaSource;
use capture_upload::services::metadata::DbMetadataStore;
use capture_upload::services::notification::TracingNotifier;
use capture_upload::{CaptureUploadWorkflow, Collaborators, WorkflowConfig};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    Gallery,
    Camera,
}

impl From<Source> for MediaSourceKind {
    fn from(source: Source) -> Self {
        match source {
            Source::Gallery => MediaSourceKind::Gallery,
            Source::Camera => MediaSourceKind::Camera,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pick a photo, tag it with a location and upload it", long_about = None)]
struct Args {
    /// Image to pick. Omit to simulate the user cancelling the picker.
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Picker to launch
    #[arg(short, long, value_enum, default_value_t = Source::Gallery)]
    source: Source,

    /// Latitude reported by the location provider
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude reported by the location provider
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Platform API level, for the legacy location permission gate
    #[arg(long)]
    api_level: Option<u32>,

    /// Also copy the image into the gallery album
    #[arg(long)]
    save_to_album: bool,

    /// Directory standing in for the device gallery
    #[arg(long, default_value = "./gallery")]
    gallery_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_upload=info,alert=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting capture-upload...");

    let config = WorkflowConfig::from_env();
    info!(
        "⚙️  Config: Storage={}, Recording={:?}, Timeout={:?}, Require Location={}",
        config.storage_backend,
        config.location_recording,
        config.location_timeout,
        config.require_location
    );

    let db = database::setup_database().await?;
    let objects = storage::setup_object_store(&config).await?;

    let coordinates = args.lat.zip(args.lon);
    let (lat, lon) = coordinates.unwrap_or_default();

    let deps = Collaborators {
        media: Arc::new(FileMediaSource::new(args.image.clone(), args.gallery_dir.clone())),
        location: Arc::new(FixedLocationSource::new(lat, lon)),
        objects,
        metadata: Arc::new(DbMetadataStore::new(db)),
        notifier: Arc::new(TracingNotifier),
    };

    let platform = args
        .api_level
        .map(PlatformInfo::with_api_level)
        .unwrap_or_default();
    let workflow = CaptureUploadWorkflow::new(deps, config).with_platform(platform);

    let outcome = run(&workflow, &args, coordinates.is_some()).await;
    workflow.flush_alerts().await;
    info!("🛑 Done (state: {}).", workflow.state());
    outcome
}

async fn run(
    workflow: &CaptureUploadWorkflow,
    args: &Args,
    has_coordinates: bool,
) -> anyhow::Result<()> {
    match workflow.request_media(args.source.into()).await? {
        MediaOutcome::Cancelled => {
            info!("Nothing selected, exiting.");
            return Ok(());
        }
        MediaOutcome::Selected(asset) => info!("Selected {}", asset.handle),
    }

    if has_coordinates {
        workflow.request_location().await?;
    } else if workflow.config().require_location {
        bail!("REQUIRE_LOCATION is set; pass --lat and --lon");
    }

    if args.save_to_album {
        workflow.save_to_album().await?;
    }

    let record = workflow.upload_current().await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
