//! Price series analysis: average, below-threshold events and chart segments.
//!
//! Everything here is a pure function of the sample slice. Fetching, printing
//! and drawing live in [`crate::data`], [`crate::report`] and [`crate::chart`].

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;

use crate::error::AnalysisError;

/// The ratio of the average below which a price is flagged (0.7).
pub fn default_threshold_ratio() -> Decimal {
    Decimal::new(7, 1)
}

/// One observation from the history feed. `price` is `None` when the product
/// was unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: Option<Decimal>,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, price: Option<Decimal>) -> Self {
        Self { timestamp, price }
    }
}

/// A sample whose price fell strictly below `ratio * average`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdEvent {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPoint {
    pub timestamp: DateTime<Utc>,
    pub price: Option<Decimal>,
}

/// A maximal run of chart points sharing one validity tag. Every segment but
/// the last also ends on the first point of the next run, so neighbours always
/// share a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub validity: Validity,
    pub points: Vec<SegmentPoint>,
}

/// Arithmetic mean over the samples that carry a price.
pub fn compute_average(samples: &[PriceSample]) -> Result<Decimal, AnalysisError> {
    let (sum, count) = samples
        .iter()
        .filter_map(|s| s.price)
        .fold((Decimal::ZERO, 0u64), |(sum, count), p| (sum + p, count + 1));

    if count == 0 {
        return Err(AnalysisError::NoValidPriceData);
    }
    Ok(sum / Decimal::from(count))
}

/// Samples priced strictly below `ratio * average`, in input order.
pub fn detect_threshold_events(
    samples: &[PriceSample],
    average: Decimal,
    ratio: Decimal,
) -> Vec<ThresholdEvent> {
    let threshold = ratio.saturating_mul(average);
    samples
        .iter()
        .filter_map(|s| match s.price {
            Some(price) if price < threshold => Some(ThresholdEvent { timestamp: s.timestamp, price }),
            _ => None,
        })
        .collect()
}

/// Appends points, opening a new segment whenever the validity tag changes.
/// The point that opens a run is also appended to the run it closes.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn push(&mut self, validity: Validity, timestamp: DateTime<Utc>, price: Option<Decimal>) {
        let point = SegmentPoint { timestamp, price };
        match self.segments.last_mut() {
            Some(seg) if seg.validity == validity => seg.points.push(point),
            Some(seg) => {
                seg.points.push(point.clone());
                self.segments.push(Segment { validity, points: vec![point] });
            }
            None => self.segments.push(Segment { validity, points: vec![point] }),
        }
    }

    fn finish(self) -> Vec<Segment> {
        self.segments
    }
}

/// Turn the series into colored line segments.
///
/// A priced sample that follows another priced sample is preceded by a step
/// point `(t, previous price)`, so the line holds its value until the new
/// timestamp. A missing price that follows a priced sample closes the valid
/// run at `(t, last price)` and opens the invalid run at `(t, None)`, so the
/// chart shows a vertical break instead of a line into the gap.
pub fn build_render_segments(samples: &[PriceSample]) -> Vec<Segment> {
    let mut builder = SegmentBuilder::default();
    let mut last_price: Option<Decimal> = None;

    for sample in samples {
        let t = sample.timestamp;
        match sample.price {
            Some(price) => {
                if let Some(prev) = last_price {
                    builder.push(Validity::Valid, t, Some(prev));
                }
                builder.push(Validity::Valid, t, Some(price));
                last_price = Some(price);
            }
            None => {
                if let Some(prev) = last_price {
                    builder.push(Validity::Valid, t, Some(prev));
                    builder.push(Validity::Invalid, t, None);
                }
                builder.push(Validity::Invalid, t, None);
                last_price = None;
            }
        }
    }

    builder.finish()
}

/// Knobs for a full analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPolicy {
    pub threshold_ratio: Decimal,
    pub sort_by_timestamp: bool,
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        Self { threshold_ratio: default_threshold_ratio(), sort_by_timestamp: false }
    }
}

impl AnalysisPolicy {
    /// Build from a float ratio as found in config files. Only ratios in
    /// `(0, 1]` describe a drop below the average.
    pub fn from_ratio(ratio: f64, sort_by_timestamp: bool) -> Option<Self> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return None;
        }
        let threshold_ratio = Decimal::from_f64(ratio)?.round_dp(10).normalize();
        Some(Self { threshold_ratio, sort_by_timestamp })
    }
}

/// Everything one invocation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// `None` when no sample carries a price; `events` is then empty.
    pub average: Option<Decimal>,
    pub events: Vec<ThresholdEvent>,
    pub segments: Vec<Segment>,
    pub max_price: Option<Decimal>,
}

impl Analysis {
    pub fn has_valid_prices(&self) -> bool {
        self.average.is_some()
    }
}

pub fn analyze(samples: &[PriceSample], policy: &AnalysisPolicy) -> Analysis {
    let samples: Cow<'_, [PriceSample]> = if policy.sort_by_timestamp {
        let mut owned = samples.to_vec();
        owned.sort_by_key(|s| s.timestamp);
        Cow::Owned(owned)
    } else {
        Cow::Borrowed(samples)
    };
    let samples = samples.as_ref();

    let (average, events) = match compute_average(samples) {
        Ok(avg) => (Some(avg), detect_threshold_events(samples, avg, policy.threshold_ratio)),
        Err(_) => (None, Vec::new()),
    };

    Analysis {
        average,
        events,
        segments: build_render_segments(samples),
        max_price: samples.iter().filter_map(|s| s.price).max(),
    }
}
