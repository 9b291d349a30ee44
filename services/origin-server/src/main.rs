//! ORIGIN Server
//!
//! Upload-governance service: synchronous decision pipeline with signed
//! certificates and a hash-chained audit ledger, plus asynchronous evidence
//! generation and webhook dispatch.
//!
//! # Features
//!
//! - API-key authentication with per-route scopes
//! - Redis-backed rate limiting and evidence task broker
//! - PS256 certificate signing (local key in development, KMS elsewhere)
//! - Graceful shutdown draining workers and the webhook dispatcher
//!
//! # Usage
//!
//! ```bash
//! # Development defaults (local Postgres/Redis, filesystem blobs)
//! origin-server
//!
//! # Environment overrides
//! ENVIRONMENT=production SIGNING_KEY_PROVIDER=aws_kms origin-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use origin_api::{create_router, AppState, Metrics};
use origin_auth::{ApiKeyService, AuthContext, IpCheckConfig, RateLimiter};
use origin_blob::{BlobStore, FsBlobStore, S3BlobStore};
use origin_crypto::{
    EncryptionProvider, KmsEncryption, KmsSigner, LocalEncryption, LocalRsaSigner, Signer,
};
use origin_db::Database;
use origin_engine::{CertificateService, IngestPipeline};
use origin_evidence::{EvidencePipeline, EvidenceWorker, TaskBroker};
use origin_ledger::LedgerService;
use origin_signals::{FeatureService, InferenceService};
use origin_webhooks::{Dispatcher, DispatcherConfig, WebhookQueue};

use crate::config::{BlobConfig, Provider, ServerConfig};

/// ORIGIN upload-governance server
#[derive(Parser, Debug)]
#[command(name = "origin-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    if args.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    let mut config = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::info!(environment = %config.environment, "starting origin-server");

    let (state, worker_shutdown) = bootstrap(&config).await?;
    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop the evidence workers and the stuck sweep.
    worker_shutdown.send(true).ok();

    tracing::info!("shut down cleanly");
    Ok(())
}

/// Composition root: every long-lived client and service is assembled here
/// and handed to the router as one explicit state bundle. Returns the state
/// and the shutdown sender for the background workers.
async fn bootstrap(
    config: &ServerConfig,
) -> anyhow::Result<(Arc<AppState>, tokio::sync::watch::Sender<bool>)> {
    let db = Database::connect(&config.database, &config.redis).await?;
    db.migrate().await?;

    let signer = build_signer(config).await?;
    let encryption = build_encryption(config).await?;
    let blob = build_blob_store(config).await?;

    let inference = match &config.model_file {
        Some(path) => InferenceService::from_file(path)?,
        None => {
            tracing::warn!("MODEL_FILE not set, using built-in coefficients");
            InferenceService::builtin()
        }
    };

    let ledger = LedgerService::new(db.pg.clone());
    let certificates = CertificateService::new(signer.clone());
    let features = FeatureService::new(db.clone());

    // Webhook dispatcher.
    let (webhook_queue, webhook_rx) = WebhookQueue::channel();
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        encryption.clone(),
        DispatcherConfig::default(),
    ));
    tokio::spawn(Arc::clone(&dispatcher).run(webhook_rx));

    // Evidence pipeline and workers.
    let broker = TaskBroker::new(db.cache.clone());
    let evidence = EvidencePipeline::new(
        db.clone(),
        broker.clone(),
        blob.clone(),
        config.evidence_signed_url_ttl,
        config.evidence_stuck_after,
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    for _ in 0..config.evidence_workers {
        let worker = EvidenceWorker::new(db.clone(), broker.clone(), blob.clone());
        tokio::spawn(worker.run(shutdown_rx.clone()));
    }
    tokio::spawn(stuck_sweep(evidence.clone(), shutdown_rx));

    let pipeline = IngestPipeline::new(
        db.clone(),
        features,
        inference.clone(),
        ledger.clone(),
        certificates,
        webhook_queue,
    );

    let api_keys = ApiKeyService::new(
        db.clone(),
        config.api_key_server_secret.clone(),
        config.legacy_apikey_fallback,
    );
    bootstrap_admin_key(&db, &api_keys).await?;
    let auth = Arc::new(AuthContext {
        db: db.clone(),
        api_keys: api_keys.clone(),
        rate_limiter: RateLimiter::new(db.cache.clone(), config.rate_limit_ttl),
        ip_config: IpCheckConfig::for_environment(
            config.environment,
            config.ip_allowlist_fail_open,
        ),
    });

    let state = Arc::new(AppState {
        environment: config.environment,
        db,
        auth,
        api_keys,
        pipeline,
        evidence,
        dispatcher,
        ledger,
        inference,
        signer,
        encryption,
        blob,
        metrics: Arc::new(Metrics::default()),
    });
    Ok((state, shutdown_tx))
}

/// First boot only: with no keys in the database the admin surface is
/// unreachable, so provision an operator tenant with an admin-scoped key
/// and print it once.
async fn bootstrap_admin_key(db: &Database, api_keys: &ApiKeyService) -> anyhow::Result<()> {
    if db.api_keys().count().await? > 0 {
        return Ok(());
    }
    let tenant = db
        .tenants()
        .create("operator", None, 600, 100, "default", 1)
        .await?;
    let issued = api_keys
        .issue(tenant.id, &[origin_types::Scope::Admin])
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::warn!(
        tenant_id = %tenant.id,
        api_key = %issued.raw_key,
        "first boot: provisioned operator admin key (store it now, it is not shown again)"
    );
    Ok(())
}

async fn build_signer(config: &ServerConfig) -> anyhow::Result<Arc<dyn Signer>> {
    match config.signing_provider {
        Provider::Local => {
            let signer = match &config.signing_key_pem_path {
                Some(path) => {
                    let pem = std::fs::read_to_string(path)?;
                    LocalRsaSigner::from_pem(&pem, config.environment)?
                }
                None => {
                    tracing::warn!("SIGNING_KEY_PEM_PATH not set, generating an ephemeral key");
                    let mut rng = rand::thread_rng();
                    LocalRsaSigner::from_key(rsa::RsaPrivateKey::new(&mut rng, 2048)?)
                }
            };
            Ok(Arc::new(signer))
        }
        Provider::AwsKms => {
            let key_id = config
                .signing_key_id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("SIGNING_KEY_ID is required for aws_kms"))?;
            let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            let client = aws_sdk_kms::Client::new(&aws);
            // Fails fast when the key is unreachable or lacks sign permission.
            Ok(Arc::new(KmsSigner::connect(client, key_id).await?))
        }
    }
}

async fn build_encryption(config: &ServerConfig) -> anyhow::Result<Arc<dyn EncryptionProvider>> {
    match config.webhook_encryption_provider {
        Provider::Local => {
            let secret = config
                .local_encryption_secret
                .clone()
                .unwrap_or_else(|| "development-only-encryption-secret".to_string());
            let salt = config
                .local_encryption_salt
                .clone()
                .ok_or_else(|| anyhow::anyhow!("LOCAL_ENCRYPTION_SALT is required"))?;
            Ok(Arc::new(LocalEncryption::new(
                &secret,
                salt.as_bytes(),
                config.environment,
            )?))
        }
        Provider::AwsKms => {
            let key_id = std::env::var("WEBHOOK_ENCRYPTION_KEY_ID")
                .map_err(|_| anyhow::anyhow!("WEBHOOK_ENCRYPTION_KEY_ID is required for aws_kms"))?;
            let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            Ok(Arc::new(KmsEncryption::new(
                aws_sdk_kms::Client::new(&aws),
                key_id,
            )))
        }
    }
}

async fn build_blob_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match &config.blob {
        BlobConfig::S3 {
            endpoint,
            access_key,
            secret_key,
            bucket,
        } => Ok(Arc::new(
            S3BlobStore::connect(endpoint, access_key, secret_key, bucket.clone()).await,
        )),
        BlobConfig::Filesystem { base_dir } => {
            std::fs::create_dir_all(base_dir)?;
            tracing::warn!(base_dir = %base_dir.display(), "using filesystem blob store (development only)");
            Ok(Arc::new(FsBlobStore::new(base_dir.clone())))
        }
    }
}

/// Periodic requeue of evidence packs stuck in pending.
async fn stuck_sweep(
    evidence: EvidencePipeline,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                match evidence.requeue_stuck().await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count, "requeued stuck evidence packs"),
                    Err(e) => tracing::warn!(error = %e, "stuck sweep failed"),
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
