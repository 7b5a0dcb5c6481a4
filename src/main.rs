use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use huebot::api;
use huebot::models::AppConfig;
use huebot::server;
use huebot::services::feedback_aggregator::{filter_rows, summarize_subset};
use huebot::services::session_store::SessionSnapshot;
use huebot::services::{ColorExtractor, CsvFeedbackStore, FeedbackFilter, FeedbackStore};

#[derive(Parser)]
#[command(name = "huebot")]
#[command(about = "HueBot - color psychology assistant for mobile UI design")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Print the dominant colors of an image
    Extract {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,

        /// Number of colors to extract
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print the feedback summary for a filter
    Summary {
        /// Engagement table (defaults to the configured data file)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Restrict to an app type (repeatable)
        #[arg(long = "app-type")]
        app_types: Vec<String>,

        /// Restrict to a theme (repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "HueBot API",
        description = "Color psychology assistant for mobile UI design",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(
        api::handle_analyze,
        api::handle_create_session,
        api::handle_get_session,
        api::handle_delete_session,
        api::handle_ask,
        api::handle_stop,
        api::handle_session_analyze,
        api::handle_feedback_options,
        api::handle_submit_feedback,
        api::handle_dashboard,
        api::handle_export,
    ),
    components(schemas(
        api::AnalysisResponse,
        api::ColorInfo,
        api::CreateSessionResponse,
        api::AskRequest,
        api::StopResponse,
        api::SessionAnalysisResponse,
        api::FeedbackOptions,
        api::FeedbackResponse,
        api::DashboardResponse,
        SessionSnapshot,
    )),
    tags(
        (name = "Analysis", description = "Dominant color extraction"),
        (name = "Chat", description = "HueBot chat sessions"),
        (name = "Feedback", description = "Feedback collection"),
        (name = "Dashboard", description = "Aggregated feedback")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => run_server().await,
        Some(Commands::Extract { image, k }) => run_extract_command(&image, k).await,
        Some(Commands::Summary {
            data,
            app_types,
            themes,
            from,
            to,
        }) => run_summary_command(data, app_types, themes, from, to).await,
        None => {
            run_status_command();
            Ok(())
        }
    }
}

/// Minimal logging for CLI commands
fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huebot=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

async fn run_extract_command(image: &Path, k: Option<usize>) -> anyhow::Result<()> {
    init_cli_tracing();

    let config = AppConfig::from_env();
    let extractor = ColorExtractor::new(config.extraction);
    let k = k.unwrap_or_else(|| extractor.default_k());

    let bytes = std::fs::read(image)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", image.display()))?;
    let colors = extractor.extract_async(bytes, k).await?;

    println!("Dominant colors of {}:", image.display());
    for (i, color) in colors.iter().enumerate() {
        let [r, g, b] = color.to_rgb();
        println!("  {}. {}  rgb({r}, {g}, {b})", i + 1, color.to_hex());
    }
    Ok(())
}

async fn run_summary_command(
    data: Option<PathBuf>,
    app_types: Vec<String>,
    themes: Vec<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<()> {
    init_cli_tracing();

    let path = data.unwrap_or_else(|| AppConfig::from_env().data_path);
    let store = CsvFeedbackStore::new(&path);

    let Some(rows) = store.load().await? else {
        println!("No engagement table at {}", path.display());
        return Ok(());
    };

    fn to_set(values: Vec<String>) -> Option<BTreeSet<String>> {
        (!values.is_empty()).then(|| values.into_iter().collect())
    }
    let filter = FeedbackFilter {
        app_types: to_set(app_types),
        themes: to_set(themes),
        from,
        to,
    };

    let subset = filter_rows(&rows, &filter);
    let summary = summarize_subset(&subset);

    println!("Engagement table: {} ({} rows)", path.display(), rows.len());
    if summary.is_empty() {
        println!("No data matches the selected filters");
        return Ok(());
    }

    fn show(value: Option<f64>) -> String {
        value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
    }

    println!("\nSummary:");
    println!("  Records:          {}", summary.record_count);
    println!("  Avg rating:       {}", show(summary.avg_rating));
    println!("  Avg engagement:   {}", show(summary.avg_engagement));
    println!("  Total users:      {}", summary.total_users);
    println!(
        "  Top color:        {}",
        summary.top_color.as_deref().unwrap_or("N/A")
    );

    if !summary.section_colors.is_empty() {
        println!("\nAverage section colors:");
        for entry in &summary.section_colors {
            println!("  {:<12} {}", format!("{:?}", entry.section), entry.color);
        }
    }
    Ok(())
}

/// Show version, environment and configuration, then the available commands
fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let bind_addr = std::env::var("BIND_ADDR").ok();
    let config_file = std::env::var("CONFIG_FILE").ok();
    let data_file = std::env::var("DATA_FILE").ok();
    let api_key_set = std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.trim().is_empty());

    println!("HueBot v{VERSION}");
    println!("Color psychology assistant for mobile UI design\n");

    println!("Environment Variables:");
    println!(
        "  BIND_ADDR      = {}",
        bind_addr.as_deref().unwrap_or("0.0.0.0:3000 (default)")
    );
    println!(
        "  CONFIG_FILE    = {}",
        config_file.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  DATA_FILE      = {}",
        data_file.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  GEMINI_API_KEY = {}",
        if api_key_set { "(set)" } else { "(not set)" }
    );

    let config = AppConfig::from_env();
    let config_source = match config_file {
        Some(ref path) if PathBuf::from(path).exists() => path.to_string(),
        Some(_) => "defaults (file not found)".to_string(),
        None => "defaults".to_string(),
    };
    let data_path = config.data_path.display().to_string();
    let data_state = if config.data_path.exists() {
        "present"
    } else {
        "not created yet"
    };

    println!("\nConfiguration:");
    println!("  Config: {config_source}");
    println!("  Data:   {data_path} ({data_state})");

    println!("\nCommands:");
    println!("  huebot serve              Start the HTTP server");
    println!("  huebot extract <IMAGE>    Print the dominant colors of an image");
    println!("  huebot summary            Print the feedback summary");
    println!("  huebot --help             Show all options");
}

async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huebot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let config = AppConfig::from_env();

    let state = server::create_app_state(config)?;

    let app = server::build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HueBot server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
