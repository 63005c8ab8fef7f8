use std::{net::SocketAddr, process, sync::Arc};

use latido::{
    application::{
        analytics::AnalyticsService,
        counters::CounterStore,
        error::AppError,
        feed::FeedService,
        reconciler::Reconciler,
        view_queue::{ViewConsumer, ViewQueue},
    },
    cache::{CacheConfig, ResponseStore},
    config,
    infra::{
        counters::{MemoryCounterStore, RedisCounterStore},
        db::PgRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Reconcile(_) => run_reconcile(settings).await,
    }
}

struct ApplicationContext {
    http_state: HttpState,
    reconciler: Arc<Reconciler>,
    view_consumer: Arc<ViewConsumer>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Arc<PgRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PgRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PgRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PgRepositories::new(pool)))
}

async fn init_counter_store(
    settings: &config::Settings,
) -> Result<Arc<dyn CounterStore>, AppError> {
    match settings.counters.redis_url.as_ref() {
        Some(url) => {
            let store = RedisCounterStore::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::counter_store(err.to_string())))?;
            info!("fast counter store: redis");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no counters.redis_url configured, using in-process counter store");
            Ok(Arc::new(MemoryCounterStore::new()))
        }
    }
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let repositories = init_repositories(settings).await?;
    let counters = init_counter_store(settings).await?;

    let analytics = Arc::new(AnalyticsService::new(repositories.clone()));
    let view_queue = Arc::new(ViewQueue::new(settings.view_queue.capacity));
    let view_consumer = Arc::new(ViewConsumer::new(
        view_queue.clone(),
        analytics.clone(),
        settings.view_queue.batch_limit,
    ));

    let cache = Arc::new(ResponseStore::new(CacheConfig::from(&settings.cache)));
    let feed = Arc::new(FeedService::new(
        repositories.clone(),
        counters.clone(),
        cache,
        view_queue,
    ));

    let reconciler = Arc::new(Reconciler::new(counters, analytics.clone()));

    Ok(ApplicationContext {
        http_state: HttpState {
            feed,
            analytics,
            posts: repositories.clone(),
            db: Some(repositories),
        },
        reconciler,
        view_consumer,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let reconciler = app.reconciler.clone();
    let reconcile_interval = settings.reconciler.interval;
    let reconcile_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(reconcile_interval);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            reconciler.run_once().await;
        }
    });

    let view_consumer = app.view_consumer.clone();
    let drain_interval = settings.view_queue.drain_interval;
    let view_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(drain_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            view_consumer.consume().await;
        }
    });

    let result = serve_http(&settings, app.http_state).await;

    reconcile_handle.abort();
    let _ = reconcile_handle.await;
    view_handle.abort();
    let _ = view_handle.await;

    result
}

async fn run_reconcile(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    // Drain the view queue too so a one-shot run leaves nothing pending.
    app.view_consumer.consume().await;
    let summary = app.reconciler.run_once().await;

    info!(
        flushed_keys = summary.flushed_keys,
        flushed_impressions = summary.flushed_impressions,
        skipped_keys = summary.skipped_keys,
        "one-shot reconcile finished"
    );
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
}
