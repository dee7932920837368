use anyhow::Context;
use clap::Parser;
use finboard_core::dashboard::{self, is_not_found, SubjectKind};
use finboard_core::repo::{AccountingRepository, InMemoryRepository, MicrofinanceRepository};
use finboard_core::time::{clock::resolve_as_of_date, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Computes one dashboard and prints it as JSON.
#[derive(Debug, Parser)]
#[command(name = "finboard_worker")]
struct Args {
    /// customer, vendor, loan-product, staff, project or chart-of-account.
    #[arg(long)]
    subject_type: String,

    #[arg(long)]
    subject_id: Uuid,

    /// As-of date (YYYY-MM-DD). Defaults to today in DASHBOARD_UTC_OFFSET_HOURS.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Read records from a JSON fixture instead of DATABASE_URL.
    #[arg(long)]
    fixture: Option<PathBuf>,

    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finboard_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let kind: SubjectKind = args.subject_type.parse()?;

    let clock = SystemClock::with_offset_hours(settings.utc_offset_hours)?;
    let as_of_date = resolve_as_of_date(args.as_of_date.as_deref(), &clock)?;

    let (accounting, microfinance): (Arc<dyn AccountingRepository>, Arc<dyn MicrofinanceRepository>) =
        match &args.fixture {
            Some(path) => {
                let repo = Arc::new(InMemoryRepository::from_json_file(path)?);
                (repo.clone(), repo)
            }
            None => {
                let db_url = settings.require_database_url()?;
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(5)
                    .connect(db_url)
                    .await
                    .context("connect DATABASE_URL failed")?;
                finboard_core::storage::migrate(&pool).await?;
                let repo = Arc::new(finboard_core::storage::PgRepository::new(pool));
                (repo.clone(), repo)
            }
        };

    let built = dashboard::build(
        accounting.as_ref(),
        microfinance.as_ref(),
        kind,
        args.subject_id,
        as_of_date,
    )
    .await;

    let result = match built {
        Ok(d) => d,
        Err(err) => {
            if is_not_found(&err) {
                tracing::warn!(kind = kind.as_str(), subject_id = %args.subject_id, "subject not found");
            } else {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(kind = kind.as_str(), subject_id = %args.subject_id, error = %err, "dashboard run failed");
            }
            return Err(err);
        }
    };

    let out = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("encode dashboard failed")?;
    println!("{out}");

    tracing::info!(kind = kind.as_str(), subject_id = %args.subject_id, %as_of_date, "dashboard written");
    Ok(())
}

fn init_sentry(settings: &finboard_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
