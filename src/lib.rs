pub mod analyzer;
pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod scheduler;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, TimeZone};
use tokio::sync::watch;

use crate::analyzer::{Analysis, AnalysisPolicy, analyze};
use crate::chart::{ChartDocument, write_raw_response};
use crate::config::Config;
use crate::data::PriceHistorySource;
use crate::scheduler::Poller;

fn policy(config: &Config) -> Result<AnalysisPolicy> {
    AnalysisPolicy::from_ratio(config.threshold_ratio, config.sort_by_timestamp)
        .ok_or_else(|| anyhow!("threshold ratio {} is not representable", config.threshold_ratio))
}

/// Fetch the configured product once and analyze it.
pub async fn check_once(config: &Config, source: &dyn PriceHistorySource) -> Result<Analysis> {
    let history = source
        .fetch(config.product_id)
        .await
        .with_context(|| format!("failed to fetch price history for product {}", config.product_id))?;
    let samples = history.samples().context("price history rejected")?;
    let analysis = analyze(&samples, &policy(config)?);
    tracing::info!(
        product_id = config.product_id,
        samples = samples.len(),
        events = analysis.events.len(),
        average = ?analysis.average,
        "price history analyzed"
    );
    Ok(analysis)
}

/// One watch iteration: check and return the alert lines, rendered in `tz`.
pub async fn watch_tick_in<Tz>(
    config: &Config,
    source: &dyn PriceHistorySource,
    tz: &Tz,
) -> Result<Vec<String>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let analysis = check_once(config, source).await?;
    Ok(report::alert_lines_in(&analysis, tz, config.threshold_percent()))
}

/// Poll until cancelled, printing alerts after every check. A failed check is
/// logged and the loop waits for the next tick.
pub async fn run_watch(
    config: &Config,
    source: &dyn PriceHistorySource,
    cancel: watch::Receiver<bool>,
) -> Result<u64> {
    config.validate()?;
    let poller = Poller::new(config.poll_interval());
    tracing::info!(
        product_id = config.product_id,
        interval_secs = config.poll_interval_secs,
        "watching price history"
    );

    let runs = poller
        .run(cancel, move || async move {
            match watch_tick_in(config, source, &Local).await {
                Ok(lines) => report::print_lines(&lines),
                Err(e) => tracing::error!(error = %format!("{e:#}"), "price check failed"),
            }
        })
        .await;
    Ok(runs)
}

/// What the chart command produced.
#[derive(Debug)]
pub struct ChartOutput {
    pub analysis: Analysis,
    pub document: ChartDocument,
    pub raw_path: PathBuf,
    pub chart_path: PathBuf,
    pub png_path: PathBuf,
}

/// Fetch once, dump the raw response, the chart document and its PNG into the
/// output directory and return the analysis for reporting.
pub async fn run_chart(config: &Config, source: &dyn PriceHistorySource) -> Result<ChartOutput> {
    config.validate()?;
    let history = source
        .fetch(config.product_id)
        .await
        .with_context(|| format!("failed to fetch price history for product {}", config.product_id))?;

    let raw_path = write_raw_response(&config.output_dir, config.product_id, &history.raw)?;
    let samples = history.samples().context("price history rejected")?;
    let analysis = analyze(&samples, &policy(config)?);

    let document = ChartDocument::from_analysis(config.product_id, &analysis, config.y_axis_headroom);
    let chart_path = document.write_to_dir(&config.output_dir)?;
    let png_path = document.render_png(&config.output_dir, config.chart_font.as_deref())?;

    Ok(ChartOutput { analysis, document, raw_path, chart_path, png_path })
}
