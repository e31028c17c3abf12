use std::{
    error::Error,
    fs::OpenOptions,
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::{Parser, ValueEnum};
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use horizon_banking::{
    AppConfig, AppState, DocumentRecordStore, HttpAggregator, HttpIdentityGateway,
    HttpPaymentRail, RecordStore, Services, ShareableIdCipher, SqliteRecordStore, build_router,
    graceful_shutdown, logging_middleware,
};

/// Where user and bank account records are kept.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum RecordStoreKind {
    /// A local SQLite database at `--db-path`.
    Sqlite,
    /// The document store of the identity service.
    Document,
}

/// The web server for Horizon.
///
/// Secrets and service credentials are read from environment variables.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The port to serve the app from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Where to keep user and bank account records.
    #[arg(long, value_enum, default_value_t = RecordStoreKind::Sqlite)]
    record_store: RecordStoreKind,

    /// File path to the SQLite database used by the `sqlite` record store.
    #[arg(long, default_value = "horizon.db")]
    db_path: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let record_store: Arc<dyn RecordStore> = match args.record_store {
        RecordStoreKind::Sqlite => {
            tracing::info!("Using SQLite record store at {}", args.db_path);
            let connection = Connection::open(&args.db_path)?;
            Arc::new(SqliteRecordStore::new(connection)?)
        }
        RecordStoreKind::Document => {
            let database = config
                .database
                .clone()
                .ok_or_else(|| horizon_banking::Error::MissingConfig("DATABASE_ID".to_owned()))?;
            tracing::info!("Using document record store {}", database.database_id);
            Arc::new(DocumentRecordStore::new(config.identity.clone(), database))
        }
    };

    let aggregator = HttpAggregator::new(config.aggregator.clone());
    let services = Services {
        identity: Arc::new(HttpIdentityGateway::new(config.identity.clone())),
        record_store,
        aggregator: Arc::new(aggregator.clone()),
        payment_rail: Arc::new(HttpPaymentRail::new(
            config.payment_rail.clone(),
            aggregator,
        )),
    };

    let state = AppState::new(
        &config.cookie_secret,
        ShareableIdCipher::new(&config.shareable_id_secret),
        services,
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are handled.
        .on_failure(());

    router.layer(tracing_layer)
}
