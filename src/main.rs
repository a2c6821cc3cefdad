use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;

mod api;
mod auth;
mod clock;
mod config;
mod db;
mod directory;
mod docs;
mod error;
mod export;
mod ledger;
mod model;
mod models;
mod routes;
mod store;

use crate::clock::{Clock, SystemClock, WorkCalendar};
use crate::directory::{EmployeeDirectory, MySqlEmployeeDirectory, profile_cache};
use crate::docs::ApiDoc;
use crate::export::{ExportWorker, LocalFolderSink, MonthlyExporter, export_queue};
use crate::ledger::AttendanceLedger;
use crate::ledger::admin::AttendanceAdmin;
use crate::store::LedgerStore;
use crate::store::mysql::MySqlLedgerStore;
use config::Config;
use db::{ensure_schema, init_db};
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    ensure_schema(&pool).await?;

    let calendar = WorkCalendar::from_minutes(config.utc_offset_minutes, config.day_end)
        .context("ATTENDANCE_UTC_OFFSET_MINUTES is outside +/- 24h")?;

    let store: Arc<dyn LedgerStore> = Arc::new(MySqlLedgerStore::new(pool.clone()));
    let directory: Arc<dyn EmployeeDirectory> = Arc::new(MySqlEmployeeDirectory::new(
        pool.clone(),
        profile_cache(
            config.employee_cache_capacity,
            Duration::from_secs(config.employee_cache_ttl_secs),
        ),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Monthly spreadsheet mirror, fed by every ledger mutation
    let (exports, export_rx) = export_queue(config.export_queue_capacity);
    let exporter = MonthlyExporter::new(
        store.clone(),
        Arc::new(LocalFolderSink::new(&config.export_dir)),
        config.export_folder.clone(),
        calendar,
    );
    actix_web::rt::spawn(ExportWorker::new(export_rx, exporter).run());

    let ledger = Data::new(AttendanceLedger::new(store.clone(), exports.clone(), calendar));
    let admin = Data::new(AttendanceAdmin::new(store, directory.clone(), exports, calendar));
    let directory = Data::from(directory);
    let clock = Data::from(clock);

    let limiter = Arc::new(
        routes::build_limiter(config.rate_protected_per_min)
            .context("RATE_PROTECTED_PER_MIN gives an invalid quota")?,
    );

    info!(
        offset_minutes = config.utc_offset_minutes,
        day_end = %config.day_end,
        export_dir = %config.export_dir,
        "Attendance ledger ready"
    );

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(config.clone()))
            .app_data(ledger.clone())
            .app_data(admin.clone())
            .app_data(directory.clone())
            .app_data(clock.clone())
            // protected attendance routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, limiter.clone()))
    })
    .bind(&server_addr)?
    .run()
    .await?;

    Ok(())
}
