//! Card configurations for an instance dashboard.
//!
//! [`build_card_configs`] is pure: the same instance and domain always give
//! structurally equal configurations, so callers may rebuild freely and
//! compare with `==` to detect changes.

use serde::Serialize;

use crate::catalog::{keys, QuerySpec};
use crate::data::{InstantSelector, Normalize, SeriesOptions, ValueFormat};

/// Default chart height, in pixels.
pub const DEFAULT_HEIGHT: u32 = 300;

/// Default grid span (out of 24).
pub const DEFAULT_SPAN: u32 = 8;

/// Chart layout for a trend card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    /// A single line.
    OneLine,
    /// One line per named series.
    MultiLine,
    /// One line per series, grouped by device.
    MultiLineDevices,
}

/// Rendering hints for a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub chart_type: Option<ChartType>,
    pub height: u32,
    pub span: u32,
    pub y_alias: Option<String>,
    pub value_format: ValueFormat,
    pub y_from_zero: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            chart_type: None,
            height: DEFAULT_HEIGHT,
            span: DEFAULT_SPAN,
            y_alias: None,
            value_format: ValueFormat::Plain,
            y_from_zero: true,
        }
    }
}

impl Presentation {
    fn top(value_format: ValueFormat) -> Self {
        Self {
            value_format,
            ..Self::default()
        }
    }

    fn trend(chart_type: ChartType, value_format: ValueFormat) -> Self {
        Self {
            chart_type: Some(chart_type),
            span: 12,
            value_format,
            ..Self::default()
        }
    }

    fn y_alias(mut self, alias: &str) -> Self {
        self.y_alias = Some(alias.to_string());
        self
    }
}

/// Whether a card shows a single current value or a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Top,
    Trend,
}

/// One dashboard card: what to query, how to normalize it, how to show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSpec {
    pub id: String,
    pub title: String,
    pub kind: CardKind,
    pub query: QuerySpec,
    pub normalize: Normalize,
    pub presentation: Presentation,
}

/// All cards for one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardConfigs {
    pub top_cards: Vec<CardSpec>,
    pub trend_cards: Vec<CardSpec>,
}

impl CardConfigs {
    /// Every card, top cards first.
    pub fn iter(&self) -> impl Iterator<Item = &CardSpec> {
        self.top_cards.iter().chain(self.trend_cards.iter())
    }

    /// Total number of cards.
    pub fn len(&self) -> usize {
        self.top_cards.len() + self.trend_cards.len()
    }

    /// Check if there are no cards.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the card configurations for an instance.
pub fn build_card_configs(instance_id: &str, domain: &str) -> CardConfigs {
    let query = |key: &str| {
        QuerySpec::new(key)
            .param("domain", domain)
            .param("instance", instance_id)
    };

    let top_cards = vec![
        CardSpec {
            id: "top.cpu".to_string(),
            title: "CPU Usage(%)".to_string(),
            kind: CardKind::Top,
            query: query(keys::CPU),
            normalize: Normalize::Instant(InstantSelector::scaled(100.0)),
            presentation: Presentation::top(ValueFormat::Percent),
        },
        CardSpec {
            id: "top.memory".to_string(),
            title: "Memory Usage".to_string(),
            kind: CardKind::Top,
            query: query(keys::MEM_USAGE),
            normalize: Normalize::Instant(InstantSelector::default()),
            presentation: Presentation::top(ValueFormat::Percent),
        },
        CardSpec {
            id: "top.disk_iops".to_string(),
            title: "DISK IOPS".to_string(),
            kind: CardKind::Top,
            query: query(keys::DISK_IOPS),
            normalize: Normalize::Instant(InstantSelector::default()),
            presentation: Presentation::top(ValueFormat::Plain),
        },
    ];

    let trend_cards = vec![
        CardSpec {
            id: "trend.cpu".to_string(),
            title: "CPU Usage(%)".to_string(),
            kind: CardKind::Trend,
            query: query(keys::CPU),
            normalize: Normalize::Series(
                SeriesOptions::default()
                    .rename(["CPU Usage(%)"])
                    .scale(100.0)
                    .precision(2)
                    .synthetic_fallback(),
            ),
            presentation: Presentation::trend(ChartType::OneLine, ValueFormat::Percent)
                .y_alias("%"),
        },
        CardSpec {
            id: "trend.memory".to_string(),
            title: "Memory Usage".to_string(),
            kind: CardKind::Trend,
            query: query(keys::MEMORY),
            normalize: Normalize::Series(SeriesOptions::default().rename(["Used", "Free"])),
            presentation: Presentation::trend(ChartType::MultiLine, ValueFormat::Memory),
        },
        CardSpec {
            id: "trend.network".to_string(),
            title: "Network Traffic".to_string(),
            kind: CardKind::Trend,
            query: query(keys::NETWORK),
            normalize: Normalize::Series(
                SeriesOptions::default()
                    .rename(["receive", "transmit"])
                    .split_by("target_device"),
            ),
            presentation: Presentation::trend(ChartType::MultiLine, ValueFormat::Traffic),
        },
        CardSpec {
            id: "trend.disk".to_string(),
            title: "DISK Read/Write".to_string(),
            kind: CardKind::Trend,
            query: query(keys::DISK),
            normalize: Normalize::Series(
                SeriesOptions::default()
                    .rename(["read", "write"])
                    .split_by("target_device"),
            ),
            presentation: Presentation::trend(ChartType::MultiLineDevices, ValueFormat::Disk),
        },
    ];

    CardConfigs {
        top_cards,
        trend_cards,
    }
}
