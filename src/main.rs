use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use space_match::config::Settings;
use space_match::routes::{self, AppState};
use space_match::services::{CatalogStore, MatchPipeline};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_tracing(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn setup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

/// Reload the catalog on a fixed interval; failures keep the current snapshot
fn spawn_catalog_refresh(catalog: Arc<CatalogStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let store = catalog.clone();
            match tokio::task::spawn_blocking(move || store.reload()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Catalog refresh failed, keeping version {}: {}", catalog.version(), e),
                Err(e) => warn!("Catalog refresh task failed: {}", e),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let loaded = Settings::load();
    match &loaded {
        Ok(settings) => init_tracing(&settings.logging.level, &settings.logging.format),
        Err(_) => init_tracing("info", "json"),
    }

    info!("Starting space-match service...");

    let settings = loaded.map_err(|e| setup_error("Failed to load configuration", e))?;
    info!("Configuration loaded successfully");

    // An unusable catalog or mapping is fatal before any session work begins
    let (catalog, report) = CatalogStore::open(&settings.catalog.path, settings.catalog.mapping.clone())
        .map_err(|e| setup_error("Failed to load property catalog", e))?;
    for warning in &report.warnings {
        warn!("Catalog row {} skipped: {}", warning.row, warning.reason);
    }
    info!(
        "Catalog loaded from {} ({} rows, {} skipped)",
        settings.catalog.path, report.rows_loaded, report.rows_skipped
    );
    let catalog = Arc::new(catalog);

    let pipeline = MatchPipeline::from_settings(&settings, catalog.clone())
        .map_err(|e| setup_error("Failed to build matching pipeline", e))?;
    info!("Pipeline initialized with weights: {:?}", settings.scoring.weights);

    if settings.catalog.refresh_interval_secs > 0 {
        spawn_catalog_refresh(catalog, Duration::from_secs(settings.catalog.refresh_interval_secs));
        info!("Catalog refresh every {}s", settings.catalog.refresh_interval_secs);
    }

    let app_state = AppState { pipeline };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
