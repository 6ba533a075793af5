//! Chart data shaping
//!
//! Turns raw [`AggregateCounts`] into the arrays consumed by the pie and bar
//! charts on the dashboard. Everything here is pure and deterministic.

use serde::{Deserialize, Serialize};

use crate::counts::{AggregateCounts, Channel, Outcome};

pub const EMAIL_TOTAL_LABEL: &str = "Email outreach";
pub const LINKEDIN_TOTAL_LABEL: &str = "LinkedIn outreach";
pub const EMAIL_TOTAL_COLOR: &str = "#040A33";
pub const LINKEDIN_TOTAL_COLOR: &str = "#0A66C2";

/// One slice of a pie chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub label: String,
    pub color: String,
    pub value: u64,
}

impl ChartRecord {
    fn new(label: &str, color: &str, value: u64) -> Self {
        Self {
            label: label.to_string(),
            color: color.to_string(),
            value,
        }
    }
}

/// A percentage slice; `value` is `None` when the channel has no events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentRecord {
    pub label: String,
    pub color: String,
    pub value: Option<u8>,
}

/// Per-channel bar chart entry carrying both periods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub channel: Channel,
    pub label: String,
    pub color_success: String,
    pub color_failed: String,
    pub success: u64,
    pub failed: u64,
    pub compare_success: u64,
    pub compare_failed: u64,
}

/// Everything the dashboard charts need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartData {
    /// Email vs LinkedIn volume (inner pie ring)
    pub type_totals: Vec<ChartRecord>,
    /// Six (channel, outcome) slices (outer pie ring)
    pub details: Vec<ChartRecord>,
    /// Same slices as success/failure percentages per channel
    pub percentages: Vec<PercentRecord>,
    /// Present only when comparison counts were fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Vec<ComparisonRecord>>,
}

/// Shape primary (and optional comparison) counts into chart records.
pub fn shape(primary: &AggregateCounts, compare: Option<&AggregateCounts>) -> ChartData {
    ChartData {
        type_totals: type_totals(primary),
        details: details(primary),
        percentages: percentages(primary),
        comparison: compare.map(|c| comparison(primary, c)),
    }
}

pub fn type_totals(counts: &AggregateCounts) -> Vec<ChartRecord> {
    vec![
        ChartRecord::new(EMAIL_TOTAL_LABEL, EMAIL_TOTAL_COLOR, counts.email_total()),
        ChartRecord::new(LINKEDIN_TOTAL_LABEL, LINKEDIN_TOTAL_COLOR, counts.linkedin_total()),
    ]
}

pub fn details(counts: &AggregateCounts) -> Vec<ChartRecord> {
    Channel::ALL
        .iter()
        .flat_map(|channel| {
            Outcome::ALL.iter().map(move |outcome| {
                ChartRecord::new(
                    channel.detail_label(*outcome),
                    channel.color(*outcome),
                    counts.get(*channel, *outcome),
                )
            })
        })
        .collect()
}

pub fn percentages(counts: &AggregateCounts) -> Vec<PercentRecord> {
    let mut records = Vec::with_capacity(Channel::ALL.len() * 2);
    for channel in Channel::ALL {
        let pair = success_percentage(
            counts.get(channel, Outcome::Success),
            counts.get(channel, Outcome::Failure),
        )
        .map(|success| (success, 100 - success));

        records.push(PercentRecord {
            label: channel.detail_label(Outcome::Success).to_string(),
            color: channel.color(Outcome::Success).to_string(),
            value: pair.map(|(success, _)| success),
        });
        records.push(PercentRecord {
            label: channel.detail_label(Outcome::Failure).to_string(),
            color: channel.color(Outcome::Failure).to_string(),
            value: pair.map(|(_, failure)| failure),
        });
    }
    records
}

/// `round(success / (success + failure) * 100)`, halves rounded up.
///
/// `None` when there are no events at all.
pub fn success_percentage(success: u64, failure: u64) -> Option<u8> {
    let total = u128::from(success) + u128::from(failure);
    if total == 0 {
        return None;
    }
    let rounded = (u128::from(success) * 200 + total) / (total * 2);
    // success <= total, so rounded <= 100
    Some(rounded as u8)
}

pub fn comparison(primary: &AggregateCounts, compare: &AggregateCounts) -> Vec<ComparisonRecord> {
    Channel::ALL
        .iter()
        .map(|channel| ComparisonRecord {
            channel: *channel,
            label: channel.label().to_string(),
            color_success: channel.color(Outcome::Success).to_string(),
            color_failed: channel.color(Outcome::Failure).to_string(),
            success: primary.get(*channel, Outcome::Success),
            failed: primary.get(*channel, Outcome::Failure),
            compare_success: compare.get(*channel, Outcome::Success),
            compare_failed: compare.get(*channel, Outcome::Failure),
        })
        .collect()
}
