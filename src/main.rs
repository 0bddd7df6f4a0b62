mod api;
mod dao;
mod model;
mod service;

use std::thread;
use std::time::Duration;

use crate::api::endpoints::{add_submission, check_submission, delete_submission, export_csv, export_json, get_submission, health, list_submissions, update_submission};
use crate::api::middleware::timing_middleware;
use crate::api::rest::{json_error_handler, path_error_handler};
use crate::api::state::AppState;
use crate::dao::submissions::SubmissionsDao;
use crate::model::apperror::{ApplicationError, ErrorType};
use crate::model::config::{ApplicationArguments, Config, DatabaseType, LoggingConfig};
use crate::service::submissions::SubmissionsService;

use actix_cors::Cors;
use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use clap::Parser;
use prometheus::IntGauge;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Pool, Postgres, pool};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/**
 * Main entry point. Opens the connection pool, serves the API, and closes the pool when the server stops.
 */
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    let args = ApplicationArguments::parse();

    let config = get_config(args.config_file.as_deref())?;

    init_tracing(&config.logging).map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))?;

    let connection_pool = create_connection_pool(&config.database.db_type).await?;

    if args.migrate {
        sqlx::migrate!("./migrations").run(&connection_pool).await.map_err(|err| std::io::Error::other(format!("Failed to run database migrations: {err}")))?;
        tracing::info!("Database migrations applied");
    }

    let submissions_dao = SubmissionsDao::new();
    let submissions_service = SubmissionsService::new(submissions_dao, Some(connection_pool.clone()));

    let state = web::Data::new(AppState::new(submissions_service));

    let prometheus = PrometheusMetricsBuilder::new("warehouse_hours")
        .endpoint("/metrics")
        .mask_unmatched_patterns("UNKNOWN")
        .build()
        .map_err(|err| std::io::Error::other(format!("Failed to create Prometheus metrics: {err}")))?;

    // Initialize custom metrics
    let max_connections_gauge = IntGauge::new("max_connections", "Connection pool maximum").map_err(|err| std::io::Error::other(format!("Failed to create max_connections gauge: {err}")))?;
    let min_connections_gauge = IntGauge::new("min_connections", "Connection pool minimum").map_err(|err| std::io::Error::other(format!("Failed to create min_connections gauge: {err}")))?;
    let active_connections_gauge = IntGauge::new("active_connections", "Connection pool active").map_err(|err| std::io::Error::other(format!("Failed to create active_connections gauge: {err}")))?;
    let idle_connections_gauge = IntGauge::new("idle_connections", "Connection pool idle").map_err(|err| std::io::Error::other(format!("Failed to create idle_connections gauge: {err}")))?;
    //Register custom prometheus metrics
    register_prometheus_metrics(&prometheus, &max_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &min_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &active_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &idle_connections_gauge)?;

    gather_db_metrics(max_connections_gauge, min_connections_gauge, active_connections_gauge, idle_connections_gauge, connection_pool);

    let server_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(prometheus.clone())
            .wrap(from_fn(timing_middleware))
            .app_data(server_state.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .service(health)
            .service(list_submissions)
            .service(export_csv)
            .service(export_json)
            .service(get_submission)
            .service(check_submission)
            .service(add_submission)
            .service(update_submission)
            .service(delete_submission)
    })
    .bind(("0.0.0.0", config.server.http_port))?
    .workers(config.server.workers);

    tracing::info!("Server is running on port {}", config.server.http_port);
    let result = server.run().await;

    state.submissions_service.close().await;
    result
}

/**
 * Reads the configuration from the given file, or from the environment when no file is given.
 *
 * #Arguments
 * `config_file`: Optional path to a TOML configuration file.
 */
fn get_config(config_file: Option<&str>) -> Result<Config, std::io::Error> {
    let config = match config_file {
        Some(config_file) => Config::from_file(config_file),
        None => Config::from_env(),
    };
    config.map_err(|err| std::io::Error::other(format!("Failed to load configuration: {err}")))
}

/**
 * Initializes logging.
 *
 * #Arguments
 * `logging`: Formatting toggles and extra filter directives. `RUST_LOG` is used as the base filter, defaulting to `info`.
 */
fn init_tracing(logging: &LoggingConfig) -> Result<(), ApplicationError> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in &logging.directives {
        filter = filter.add_directive(directive.parse::<Directive>().map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid log directive {directive}: {err}")))?);
    }
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(logging.target)
        .with_thread_ids(logging.thread_ids)
        .with_thread_names(logging.thread_names)
        .with_line_number(logging.line_number)
        .with_level(logging.level)
        .with_ansi(logging.ansi)
        .with_file(logging.file);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to initialize tracing: {err}")))
}

/**
 * Creates the bounded connection pool. Acquisitions beyond `max_connections` wait in a queue.
 *
 * #Arguments
 * `db_type`: The database configuration.
 */
async fn create_connection_pool(db_type: &DatabaseType) -> Result<Pool<Postgres>, std::io::Error> {
    let DatabaseType::Postgresql { host, port, username, password, database_name, ssl, max_connections, min_connections, acquire_timeout, acquire_slow_threshold, idle_timeout, max_lifetime } = db_type;
    let mut connect_options = PgConnectOptions::new()
        .host(host)
        .port(*port)
        .username(username)
        .database(database_name)
        .ssl_mode(ssl_mode(*ssl));
    if let Some(password) = password {
        connect_options = connect_options.password(password);
    }
    tracing::info!("Connecting to database {} at {}:{}", database_name, host, port);
    let connection_pool = pool::PoolOptions::<Postgres>::new()
        .max_connections(*max_connections)
        .min_connections(*min_connections)
        .acquire_timeout(Duration::from_millis(*acquire_timeout))
        .acquire_slow_threshold(Duration::from_millis(*acquire_slow_threshold))
        .idle_timeout(Duration::from_millis(*idle_timeout))
        .max_lifetime(Duration::from_millis(*max_lifetime))
        .connect_with(connect_options)
        .await
        .map_err(|err| {
            tracing::error!("Database connection failed: {err}");
            std::io::Error::other(format!("Failed to create database pool: {err}"))
        })?;
    tracing::info!("Database connected successfully");
    Ok(connection_pool)
}

/**
 * TLS is either required or not attempted at all.
 */
fn ssl_mode(ssl: bool) -> PgSslMode {
    if ssl { PgSslMode::Require } else { PgSslMode::Disable }
}

/**
 * Registers custom Prometheus metrics.
 *
 * #Arguments
 * `prometheus_metrics`: The Prometheus metrics instance to register the gauge with.
 * `gauge`: The gauge to register.
 */
fn register_prometheus_metrics(prometheus_metrics: &PrometheusMetrics, gauge: &IntGauge) -> Result<(), std::io::Error> {
    prometheus_metrics.registry.register(Box::new(gauge.clone())).map_err(|err| std::io::Error::other(format!("Failed to register Prometheus gauge: {err}")))?;
    Ok(())
}

/**
 * Gathers database metrics in a separate thread.
 *
 * #Arguments
 * `max_connections_gauge`: Gauge for maximum connections.
 * `min_connections_gauge`: Gauge for minimum connections.
 * `active_connections_gauge`: Gauge for active connections.
 * `idle_connections_gauge`: Gauge for idle connections.
 * `connection_pool`: The connection pool to gather metrics from.
 */
fn gather_db_metrics(max_connections_gauge: IntGauge, min_connections_gauge: IntGauge, active_connections_gauge: IntGauge, idle_connections_gauge: IntGauge, connection_pool: Pool<Postgres>) {
    thread::spawn(move || {
        while !connection_pool.is_closed() {
            max_connections_gauge.set(i64::from(connection_pool.options().get_max_connections()));
            min_connections_gauge.set(i64::from(connection_pool.options().get_min_connections()));
            active_connections_gauge.set(i64::from(connection_pool.size()));
            idle_connections_gauge.set(i64::try_from(connection_pool.num_idle()).unwrap_or(i64::MAX));
            thread::sleep(Duration::from_secs(1));
        }
    });
}
