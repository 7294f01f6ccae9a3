use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use remittance_engine::{
    config::Config,
    database::Database,
    exports::ExportService,
    handlers,
    reconciliation::ReconciliationService,
    scheduler::{Clock, CycleScheduler, SystemClock},
    settlement::SettlementPoster,
    AppState,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .json()
        .init();

    info!("Starting Remittance Engine...");

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Configuration loaded successfully");

    // Initialize database
    let db = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .await
            .expect("Failed to connect to database"),
    );

    sqlx::migrate!("./migrations")
        .run(db.pool())
        .await
        .expect("Failed to run migrations");

    info!("Database connected and migrated");

    // Wire up services
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let poster = Arc::new(SettlementPoster::new(db.clone(), config.ledger.clone()));
    let scheduler = Arc::new(CycleScheduler::new(
        db.clone(),
        poster.clone(),
        clock.clone(),
    ));
    let exports = Arc::new(ExportService::new(db.clone()));
    let recon = Arc::new(ReconciliationService::new(db.clone()));

    // Start the periodic cycle-progression pass
    if config.scheduler.enabled {
        let scheduler = scheduler.clone();
        let interval_secs = config.scheduler.interval_secs;
        tokio::spawn(async move {
            scheduler.run(interval_secs).await;
        });
        info!("Cycle scheduler enabled");
    }

    let state = web::Data::new(AppState {
        db,
        scheduler,
        poster,
        exports,
        recon,
        clock,
    });

    let server_config = config.server.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await
}
