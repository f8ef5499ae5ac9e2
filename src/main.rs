use anyhow::Context;
use clap::Parser;
use rg_migrate::utils::monitor::SystemMonitor;
use rg_migrate::utils::{logger, validation::Validate};
use rg_migrate::{
    CliConfig, MigrationEngine, MigrationReport, MssqlSession, PoolStatus, ServerSession,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting rg-migrate");

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Loading configuration failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no changes will be applied");
    }

    let monitor = SystemMonitor::new(cli.monitor);

    let source = connect("source", &config.source).await;
    let destination = connect("destination", &config.destination).await;

    let report_path = config.report.clone();
    let mut engine = MigrationEngine::new(source, destination, config);

    match engine.run().await {
        Ok(report) => {
            print_summary(&report);
            if let Some(path) = &report_path {
                let json = serde_json::to_string_pretty(&report)
                    .context("serializing migration report")?;
                std::fs::write(path, json)
                    .with_context(|| format!("writing migration report to {}", path))?;
                println!("📁 Report written to: {}", path);
            }

            monitor.log_summary();

            if report.failed_count() > 0 {
                std::process::exit(2);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Migration failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            monitor.log_summary();

            let exit_code = match e.severity() {
                rg_migrate::utils::error::ErrorSeverity::Low => 0,
                rg_migrate::utils::error::ErrorSeverity::Medium => 2,
                rg_migrate::utils::error::ErrorSeverity::High => 1,
                rg_migrate::utils::error::ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn connect(role: &str, options: &rg_migrate::ConnectionOptions) -> MssqlSession {
    match MssqlSession::connect(options).await {
        Ok(session) => {
            tracing::info!(
                "Connected to {} {} ({})",
                role,
                session.server_name(),
                session.properties().edition
            );
            session
        }
        Err(e) => {
            tracing::error!("❌ Connecting to {} failed: {}", role, e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(3);
        }
    }
}

fn print_summary(report: &MigrationReport) {
    if report.dry_run {
        println!("🔍 Dry run finished - nothing was changed");
    } else {
        println!("✅ Migration finished");
    }
    println!(
        "📊 Pools: {} migrated, {} skipped, {} failed",
        report.migrated_count(),
        report.skipped_count(),
        report.failed_count()
    );
    for outcome in &report.pools {
        match outcome.status {
            PoolStatus::Skipped => {
                println!(
                    "⚠️  [{}] skipped: {}",
                    outcome.pool,
                    outcome.message.as_deref().unwrap_or("")
                );
            }
            PoolStatus::Failed => {
                println!(
                    "❌ [{}] failed: {}",
                    outcome.pool,
                    outcome.message.as_deref().unwrap_or("")
                );
            }
            PoolStatus::Migrated => {}
        }
    }
}
