//! Link orphan quote requests to existing accounts.
//!
//! ```text
//! link-orphans [--dry-run] [--email EMAIL] [--notify]
//! ```

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devis_core::audit::AuditTrail;
use devis_core::db::PgStore;
use devis_core::models::Actor;
use devis_core::orphans::{sweep_orphans, LinkNotifier, SweepOptions, SweepReport};
use devis_core::CoreConfig;

#[derive(Debug, Parser)]
#[command(name = "link-orphans", about = "Attach anonymous quote requests to the accounts sharing their email")]
struct Args {
    /// Show what would be linked without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Only process requests submitted with this email
    #[arg(long)]
    email: Option<String>,

    /// Notify each account that received requests
    #[arg(long)]
    notify: bool,
}

/// Reports notifications in the log; mail delivery belongs to the web application.
struct LogNotifier;

#[async_trait]
impl LinkNotifier for LogNotifier {
    async fn notify_linked(&self, account: &Actor, linked_count: usize) -> devis_core::Result<()> {
        info!(
            account_id = account.id,
            email = %account.email,
            count = linked_count,
            "Notification: past quote requests attached to account"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devis_core=info,link_orphans=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = CoreConfig::from_env();
    if config.database_url.is_none() {
        anyhow::bail!("DATABASE_URL must be set");
    }

    let store = PgStore::connect(&config).await.context("connecting to the database")?;
    store.warm().await?;

    let options = SweepOptions {
        dry_run: args.dry_run,
        email: args.email,
        notify: args.notify,
    };

    let mut trail = AuditTrail::new(store.begin().await?, config.audit.clone());
    let notifier = LogNotifier;
    let report = sweep_orphans(&mut trail, &options, Some(&notifier as &dyn LinkNotifier))
        .await
        .context("sweeping orphan requests")?;

    let unit_of_work = trail.into_store();
    if options.dry_run {
        unit_of_work.rollback().await?;
    } else {
        unit_of_work.commit().await?;
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &SweepReport) {
    if report.dry_run {
        println!("DRY RUN: no changes were written");
    }
    println!("Orphan requests found: {}", report.total_orphans);

    for link in &report.links {
        let verb = if report.dry_run { "would link" } else { "linked" };
        println!("  {} {} -> {}", verb, link.request_number, link.account_email);
    }
    for email in &report.unmatched_emails {
        println!("  no account for {}", email);
    }

    println!("Requests linked: {}", report.total_linked());
    println!("Accounts updated: {}", report.beneficiaries.len());
    if report.notifications_sent > 0 {
        println!("Notifications sent: {}", report.notifications_sent);
    }
}
