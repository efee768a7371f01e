use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use price_watch::config::Config;
use price_watch::data::PriceHistoryClient;
use price_watch::{report, scheduler};

/// Price history watcher: drop alerts and chart data for one product
#[derive(Parser, Debug)]
#[command(name = "price-watch")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Product to watch when no subcommand is given
    product_id: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct CommonArgs {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Flag prices below this fraction of the average
    #[arg(long, global = true)]
    threshold_ratio: Option<f64>,

    /// Sort samples by timestamp before analysis
    #[arg(long, global = true)]
    sort: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the price history every interval and print drop alerts
    Watch {
        /// Product to watch
        product_id: Option<u64>,

        /// Seconds between checks
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Fetch once, write the raw history and chart data, list drop dates
    Chart {
        /// Product to chart
        product_id: Option<u64>,

        /// Directory receiving `<id>.json`, `<id>.chart.json` and `<id>.png`
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// The subcommand to run; a bare `price-watch [PRODUCT_ID]` means watch.
    fn command(self) -> Commands {
        self.command.unwrap_or(Commands::Watch { product_id: self.product_id, interval_secs: None })
    }
}

fn load_config(common: &CommonArgs) -> Result<Config> {
    let mut config = match &common.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(ratio) = common.threshold_ratio {
        config.threshold_ratio = ratio;
    }
    if common.sort {
        config.sort_by_timestamp = true;
    }
    Ok(config)
}

async fn watch(mut config: Config, product_id: Option<u64>, interval_secs: Option<u64>) -> Result<()> {
    if let Some(id) = product_id {
        config.product_id = id;
    }
    if let Some(secs) = interval_secs {
        config.poll_interval_secs = secs;
    }
    config.validate()?;

    let client = PriceHistoryClient::new(&config)?;
    let (handle, cancel) = scheduler::cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
            handle.cancel();
        }
    });

    price_watch::run_watch(&config, &client, cancel).await?;
    Ok(())
}

async fn chart(mut config: Config, product_id: Option<u64>, output_dir: Option<PathBuf>) -> Result<()> {
    if let Some(id) = product_id {
        config.product_id = id;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    config.validate()?;

    let client = PriceHistoryClient::new(&config)?;
    let out = price_watch::run_chart(&config, &client).await?;
    info!(
        raw = %out.raw_path.display(),
        chart = %out.chart_path.display(),
        png = %out.png_path.display(),
        "chart data written"
    );
    report::print_lines(&report::drop_dates_in(&out.analysis, &Local, config.drop_percent()));
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("price_watch=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli.common) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %format!("{e:#}"), "invalid configuration");
            std::process::exit(2);
        }
    };

    let command = cli.command();
    let result = match command {
        Commands::Watch { product_id, interval_secs } => {
            info!("Starting price watch...");
            watch(config, product_id, interval_secs).await
        }
        Commands::Chart { product_id, output_dir } => {
            info!("Building price chart data...");
            chart(config, product_id, output_dir).await
        }
    };

    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "command failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_product_id_watches_that_product() {
        let cli = Cli::try_parse_from(["price-watch", "12345"]).unwrap();
        match cli.command() {
            Commands::Watch { product_id, interval_secs } => {
                assert_eq!(product_id, Some(12345));
                assert_eq!(interval_secs, None);
            }
            other => panic!("expected watch, got {other:?}"),
        }
    }

    #[test]
    fn no_arguments_watches_the_configured_product() {
        let cli = Cli::try_parse_from(["price-watch"]).unwrap();
        assert!(matches!(cli.command(), Commands::Watch { product_id: None, .. }));
    }

    #[test]
    fn subcommands_still_parse() {
        let cli = Cli::try_parse_from(["price-watch", "chart", "5", "--sort"]).unwrap();
        assert!(cli.common.sort);
        assert!(matches!(cli.command(), Commands::Chart { product_id: Some(5), output_dir: None }));

        let cli = Cli::try_parse_from(["price-watch", "watch", "7", "--interval-secs", "60"]).unwrap();
        assert!(matches!(
            cli.command(),
            Commands::Watch { product_id: Some(7), interval_secs: Some(60) }
        ));
    }

    #[test]
    fn global_flags_before_the_subcommand() {
        let cli = Cli::try_parse_from(["price-watch", "--config", "pw.toml", "chart"]).unwrap();
        assert_eq!(cli.common.config, Some(PathBuf::from("pw.toml")));
        assert!(matches!(cli.command(), Commands::Chart { product_id: None, .. }));
    }

    #[test]
    fn non_numeric_product_id_is_rejected() {
        assert!(Cli::try_parse_from(["price-watch", "abc"]).is_err());
    }
}
