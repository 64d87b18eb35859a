//! Parameterless entry point, meant to be invoked by a timer unit or cron.
//!
//! Everything variable comes from the environment; the exit code is the
//! report's classification (zero unless the run failed outright).

use std::process::ExitCode;
use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use magpie_core::app::Coordinator;
use magpie_core::config::{Config, RemoteTarget};
use magpie_core::impls::{FileLockManager, LogReportSink, ObjectStoreRemote, PgDumpProducer};
use magpie_core::ports::SystemClock;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    match &config.remote_target {
        RemoteTarget::S3Bucket(bucket) => {
            let store = AmazonS3Builder::from_env()
                .with_bucket_name(bucket.clone())
                .build()?;
            Ok(Arc::new(store))
        }
        RemoteTarget::Directory(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(Arc::new(LocalFileSystem::new_with_prefix(dir)?))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::from(1);
        }
    };

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "could not construct remote store");
            return ExitCode::from(1);
        }
    };

    info!(
        backup_dir = %config.backup_dir.display(),
        prefix = %config.remote_prefix,
        keep = config.policy.local_keep_count(),
        max_age_days = config.policy.remote_max_age_days(),
        "starting backup cycle"
    );

    let lock = Arc::new(FileLockManager::new(&config.backup_dir, config.lock_stale_after));
    let dump = Arc::new(PgDumpProducer::new(&config.database_url));
    let coordinator = Coordinator::new(
        config,
        Arc::new(SystemClock),
        dump,
        Arc::new(ObjectStoreRemote::new(store)),
        lock,
        Arc::new(LogReportSink),
    );

    let report = coordinator.run().await;
    ExitCode::from(report.exit_code())
}
