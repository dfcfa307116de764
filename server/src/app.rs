//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{Collaborators, IngestServer};
use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::reporter::TracingReporter;
use crate::core::shutdown::ShutdownService;
use crate::data::queues::DispatchQueues;
use crate::domain::consumers::{LoggingLogsConsumer, LoggingMetricsConsumer, LoggingTracesConsumer};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub server: Arc<IngestServer>,
    pub reporter: Arc<TracingReporter>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.debug);

        tracing::debug!(command = ?command, "Application starting");

        let app = Self::init(&cli_config)?;
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let server = IngestServer::new(config.server.clone(), config.ingest);

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            server,
            reporter: Arc::new(TracingReporter::new()),
        })
    }

    fn init_logging(debug: bool) {
        let default_filter = if debug {
            format!("debug,{}=debug", APP_NAME_LOWER)
        } else {
            format!("info,{}=info", APP_NAME_LOWER)
        };

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::new()
            .with_metrics(Arc::new(LoggingMetricsConsumer))
            .with_traces(Arc::new(LoggingTracesConsumer))
            .with_logs(Arc::new(LoggingLogsConsumer))
            .with_reporter(self.reporter.clone())
            .with_queues(DispatchQueues::bounded(self.config.queues))
    }

    async fn start_server(app: Self) -> Result<()> {
        app.shutdown.install_signal_handlers();

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            host = %app.config.server.host,
            port = app.config.server.port,
            write_path = %app.config.server.write_path,
            debug = app.config.debug,
            "Starting {}",
            APP_NAME_LOWER
        );

        // Closes the server once a signal (or a serve failure) triggers shutdown
        let closer = {
            let server = Arc::clone(&app.server);
            let wait = app.shutdown.wait();
            tokio::spawn(async move {
                wait.await;
                server.close().await;
            })
        };
        app.shutdown.register(closer).await;

        let serve = {
            let server = Arc::clone(&app.server);
            let collaborators = app.collaborators();
            let shutdown = app.shutdown.clone();
            tokio::spawn(async move {
                let result = server.listen_and_serve(collaborators).await;
                shutdown.trigger();
                result
            })
        };

        let result = serve.await.context("Ingest server task panicked")?;
        app.shutdown.shutdown().await;

        let stats = app.reporter.stats();
        tracing::info!(
            requests = stats.requests,
            accepted = stats.accepted_entities,
            translation_errors = stats.translation_errors,
            failed_requests = stats.failed_requests,
            downstream_errors = stats.downstream_errors,
            "Server stopped"
        );

        result.context("Ingest server failed")
    }
}
