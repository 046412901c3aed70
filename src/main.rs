use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use case_notifier::business_hours::BusinessHours;
use case_notifier::config::AppConfig;
use case_notifier::gateways::{HttpWorkQueue, SftpAttachmentSource, SmtpMailer};
use case_notifier::logging;
use case_notifier::pipeline::{BatchDriver, BatchReport, CaseProcessor, ProcessorDeps};
use case_notifier::store::{CaseStore, LibSqlCaseStore};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(Some(report)) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Batch aborted");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Wire the gateways and run one batch. `None` when outside business hours.
async fn run(config: AppConfig) -> anyhow::Result<Option<BatchReport>> {
    let hours = BusinessHours::from_config(&config.business_hours)?;
    if !hours.allows_run_now() {
        info!("Outside business hours; nothing to do");
        return Ok(None);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Case notifier starting");

    let store: Arc<dyn CaseStore> = Arc::new(
        LibSqlCaseStore::open(&config.database)
            .await
            .context("failed to open case database")?,
    );
    let queue = Arc::new(HttpWorkQueue::new(config.api.clone()).context("failed to build API client")?);

    let deps = ProcessorDeps {
        store,
        attachments: Arc::new(SftpAttachmentSource::new(config.sftp.clone())),
        mailer: Arc::new(SmtpMailer::new(config.mail.clone())),
        status: queue.clone(),
    };
    let processor = CaseProcessor::new(deps, config.shared_secret.clone());
    let driver = BatchDriver::new(queue.clone(), queue, processor);

    let report = driver.run().await?;
    Ok(Some(report))
}

fn print_report(report: &BatchReport) {
    println!("\nResults:");
    for outcome in &report.outcomes {
        let status = if outcome.success { "ok" } else { "error" };
        println!("- {}: {} ({})", outcome.case_label, status, outcome.message);
    }
    println!(
        "\nSummary: {} succeeded, {} failed, {} marked done upstream",
        report.succeeded, report.failed, report.status_updated
    );
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        status_updated = report.status_updated,
        "Run complete"
    );
}
