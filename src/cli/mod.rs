use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{
    analytics::domain::filters::MonthPolicy,
    server::{self, CatalogSource},
};

#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// DSN to tell Sentry where to send events.
    ///
    /// If provided, errors will be sent to Sentry.
    #[clap(long = "sentry-dsn", env = "SENTRY_DSN")]
    sentry_dsn: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    Serve(ServeOpts),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum MonthPolicyArg {
    /// A month matches sales in that month of every year.
    AnyYear,
    /// A month matches sales in that month of the policy year only.
    YearWindow,
}

#[derive(Args)]
struct ServeOpts {
    /// Path to a JSON export of the catalog.
    ///
    /// The catalog is loaded into memory and served instead of the database.
    #[clap(long = "catalog-file", env = "CATALOG_FILE")]
    catalog_file: Option<PathBuf>,

    /// The number of connections to use for the database pool.
    #[clap(long = "database-pool-size", default_value = "16")]
    database_pool_size: u32,

    /// The number of seconds before a database connection times out.
    #[clap(long = "database-timeout", default_value = "5")]
    database_timeout: u8,

    /// Connection string for the catalog database.
    #[clap(long = "database-url", env = "DATABASE_URL")]
    database_url: Option<String>,

    /// How requested months are matched against sale dates.
    #[clap(
        long = "month-policy",
        env = "MONTH_POLICY",
        value_enum,
        default_value = "any-year"
    )]
    month_policy: MonthPolicyArg,

    /// The year used by the year-window month policy.
    ///
    /// Defaults to the current year.
    #[clap(long = "policy-year", env = "POLICY_YEAR")]
    policy_year: Option<i32>,

    /// Port to listen on.
    #[clap(long = "port", env = "PORT", default_value = "3001")]
    port: u16,

    /// The number of seconds a query may run before it is abandoned.
    ///
    /// A value of 0 disables the limit.
    #[clap(long = "query-timeout", default_value = "10")]
    query_timeout: u64,
}

impl TryFrom<ServeOpts> for server::Options {
    type Error = anyhow::Error;

    fn try_from(opts: ServeOpts) -> Result<Self, Self::Error> {
        let catalog = match (opts.database_url, opts.catalog_file) {
            (Some(database_url), None) => CatalogSource::Postgres {
                database_url,
                pool_size: opts.database_pool_size,
                timeout_seconds: opts.database_timeout,
            },
            (None, Some(path)) => CatalogSource::JsonFile(path),
            (Some(_), Some(_)) => {
                bail!("Only one of --database-url and --catalog-file may be used.")
            }
            (None, None) => bail!("One of --database-url or --catalog-file is required."),
        };

        let month_policy = match opts.month_policy {
            MonthPolicyArg::AnyYear => MonthPolicy::AnyYear,
            MonthPolicyArg::YearWindow => {
                let year = opts.policy_year.unwrap_or_else(|| Utc::now().year());

                MonthPolicy::year_window(year).context("Invalid --policy-year")?
            }
        };

        let query_timeout = match opts.query_timeout {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };

        Ok(Self {
            catalog,
            month_policy,
            port: opts.port,
            query_timeout,
        })
    }
}

pub async fn run_with_sys_args() -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;

    let cli = Cli::parse();

    let sentry_config = cli.sentry_dsn.map(|dsn| {
        debug!("Enabled sentry.");

        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let sentry_tracing_layer = if sentry_config.is_some() {
        Some(sentry_tracing::layer())
    } else {
        None
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(sentry_tracing_layer)
        .init();

    match cli.command {
        Commands::Serve(opts) => {
            let options = server::Options::try_from(opts)?;
            debug!(?options.catalog, ?options.month_policy, "Parsed server options.");

            server::serve(options).await
        }
    }
}
