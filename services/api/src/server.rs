use crate::cli::{Role, ServeArgs};
use crate::infra::{cors_layer, load_offerings, AppState};
use crate::routes::with_operational_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use onest_adapter::applications::{application_router, ApplicationService};
use onest_adapter::clock::{Clock, SystemClock};
use onest_adapter::config::AppConfig;
use onest_adapter::dispatch::HttpCallbackDispatcher;
use onest_adapter::error::AppError;
use onest_adapter::gateway::{protocol_router, ActionProcessor, Backends, ProtocolGateway};
use onest_adapter::ledger::ResourceLedger;
use onest_adapter::offerings::{offering_router, OfferingCatalog};
use onest_adapter::outbox::{
    spawn_retention_sweeper, RetryPolicy, TaskOutbox, TaskRunner, WorkerPool,
};
use onest_adapter::seeker::{seeker_client_router, seeker_router, SeekerClient, SeekerInbox};
use onest_adapter::staging::spawn_sweeper;
use onest_adapter::storage::{
    InMemoryApplicationRepository, InMemoryCallbackInbox, InMemoryOfferingStore,
    InMemoryStageStore, InMemoryTaskOutbox,
};
use onest_adapter::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const STAGE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const OUTBOX_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Tasks that outlive request handling and must be stopped after the listener closes.
struct Background {
    shutdown: watch::Sender<bool>,
    workers: Option<WorkerPool>,
    sweepers: Vec<JoinHandle<()>>,
}

impl Background {
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Some(workers) = self.workers {
            workers.shutdown().await;
        }
        for sweeper in self.sweepers {
            if let Err(err) = sweeper.await {
                warn!(error = %err, "sweeper ended abnormally");
            }
        }
    }
}

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (router, outbox, background) = match args.role {
        Role::Provider => provider(&config, &args, clock, shutdown_tx, shutdown_rx)?,
        Role::Seeker => seeker(&config, clock, shutdown_tx)?,
    };

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        outbox,
    };

    let mut app = with_operational_routes(router)
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(prometheus_layer);
    if let Some(cors) = cors_layer(&config.network.allowed_origins) {
        app = app.layer(cors);
    }

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, role = ?args.role, %addr, "onest adapter ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    readiness_flag.store(false, Ordering::Release);
    background.stop().await;
    served?;
    Ok(())
}

fn provider(
    config: &AppConfig,
    args: &ServeArgs,
    clock: Arc<dyn Clock>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(Router, Option<Arc<dyn TaskOutbox>>, Background), AppError> {
    let offerings = match &args.offerings {
        Some(path) => {
            let loaded = load_offerings(path)?;
            info!(count = loaded.len(), path = %path.display(), "offerings loaded");
            InMemoryOfferingStore::with_offerings(loaded)
        }
        None => InMemoryOfferingStore::default(),
    };
    let stages = Arc::new(InMemoryStageStore::new(config.staging.ttl, clock.clone()));
    let outbox: Arc<dyn TaskOutbox> = Arc::new(InMemoryTaskOutbox::default());
    let offerings = Arc::new(offerings);

    let recovered = outbox.recover_in_flight(clock.now())?;
    if recovered > 0 {
        info!(recovered, "in-flight tasks requeued");
    }

    let backends = Backends {
        offerings: offerings.clone(),
        ledger: ResourceLedger::new(offerings.clone()),
        stages: stages.clone(),
        applications: Arc::new(InMemoryApplicationRepository::default()),
        outbox: outbox.clone(),
        clock: clock.clone(),
    };

    let notify = Arc::new(Notify::new());
    let dispatcher = Arc::new(HttpCallbackDispatcher::new(config.callbacks.timeout)?);
    let processor = Arc::new(ActionProcessor::new(
        backends.clone(),
        config.network.clone(),
    ));
    let runner = Arc::new(TaskRunner::new(
        outbox.clone(),
        processor,
        dispatcher,
        RetryPolicy::from(&config.workers),
        clock.clone(),
    ));
    let workers = WorkerPool::spawn(
        runner,
        notify.clone(),
        config.workers.count,
        config.workers.poll_interval,
    );
    let sweepers = vec![
        spawn_sweeper(stages, STAGE_SWEEP_INTERVAL, shutdown_rx.clone()),
        spawn_retention_sweeper(
            outbox.clone(),
            clock.clone(),
            config.workers.retention,
            OUTBOX_SWEEP_INTERVAL,
            shutdown_rx,
        ),
    ];
    info!(workers = workers.size(), "outbox workers started");

    let catalog = Arc::new(OfferingCatalog::new(backends.offerings.clone()));
    let applications = Arc::new(ApplicationService::new(
        backends.applications.clone(),
        backends.ledger.clone(),
        clock,
    ));
    let gateway = Arc::new(ProtocolGateway::new(backends, notify));

    let router = protocol_router(gateway)
        .merge(offering_router(catalog))
        .merge(application_router(applications));

    Ok((
        router,
        Some(outbox),
        Background {
            shutdown: shutdown_tx,
            workers: Some(workers),
            sweepers,
        },
    ))
}

fn seeker(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(Router, Option<Arc<dyn TaskOutbox>>, Background), AppError> {
    let client = Arc::new(SeekerClient::new(
        config.network.clone(),
        config.callbacks.timeout,
        clock.clone(),
    )?);
    let inbox = Arc::new(SeekerInbox::new(
        Arc::new(InMemoryCallbackInbox::default()),
        clock,
    ));
    info!(
        bap_id = %config.network.bap_id,
        bpp_uri = %config.network.bpp_uri,
        "seeker client ready"
    );

    Ok((
        seeker_router(inbox).merge(seeker_client_router(client)),
        None,
        Background {
            shutdown: shutdown_tx,
            workers: None,
            sweepers: Vec::new(),
        },
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
