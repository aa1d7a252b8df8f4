//! Fetching and normalizing card data.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use vmwatch_adapters::MetricsBackend;
use vmwatch_types::{unix_now, QueryMode, RawResponse, TimeRange};

use crate::cards::{CardKind, CardSpec};
use crate::catalog::{MetricCatalog, QueryParams};
use crate::data::{CardData, NormalizeContext};

/// Outcome of polling one card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardResult {
    pub id: String,
    pub title: String,
    pub data: CardData,
    /// Display string for top cards, formatted with the card's value format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// First error hit while fetching, if any. The card still carries
    /// whatever data the other queries returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Issues card queries against a backend.
#[derive(Debug, Clone)]
pub struct Poller {
    backend: Arc<dyn MetricsBackend>,
    catalog: Arc<MetricCatalog>,
    allow_synthetic: bool,
}

impl Poller {
    pub fn new(backend: Arc<dyn MetricsBackend>, catalog: Arc<MetricCatalog>) -> Self {
        Self {
            backend,
            catalog,
            allow_synthetic: false,
        }
    }

    /// Allow eligible cards to show synthetic data when nothing comes back.
    pub fn allow_synthetic(mut self, allow: bool) -> Self {
        self.allow_synthetic = allow;
        self
    }

    /// Fetch and normalize one card.
    ///
    /// Top cards are evaluated at the current instant, trend cards over
    /// `range`. A failed query contributes an empty response so series names
    /// stay aligned with the card's rename list.
    pub async fn fetch_card(
        &self,
        card: &CardSpec,
        extra: &QueryParams,
        range: TimeRange,
    ) -> CardResult {
        let mode = match card.kind {
            CardKind::Top => QueryMode::Current,
            CardKind::Trend => QueryMode::Range(range),
        };
        let ctx = NormalizeContext {
            allow_synthetic: self.allow_synthetic,
            now: unix_now(),
        };

        let queries = match self.catalog.render(&card.query.with_params(extra)) {
            Ok(queries) => queries,
            Err(e) => {
                warn!(card = %card.id, error = %e, "Cannot render card queries");
                return CardResult {
                    id: card.id.clone(),
                    title: card.title.clone(),
                    data: card.normalize.apply(&[], &ctx),
                    display: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let fetches = queries
            .iter()
            .map(|query| self.backend.fetch(query, mode));
        let mut error = None;
        let responses: Vec<RawResponse> = join_all(fetches)
            .await
            .into_iter()
            .map(|result| match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(card = %card.id, error = %e, "Query failed");
                    error.get_or_insert_with(|| e.to_string());
                    RawResponse::empty()
                }
            })
            .collect();

        let data = card.normalize.apply(&responses, &ctx);
        debug!(card = %card.id, empty = data.is_empty(), "Card polled");

        let display = match (&card.kind, &data) {
            (CardKind::Top, CardData::Value(points)) => {
                let y = points.first().map(|p| p.y).unwrap_or(0.0);
                Some(card.presentation.value_format.format(y))
            }
            _ => None,
        };

        CardResult {
            id: card.id.clone(),
            title: card.title.clone(),
            data,
            display,
            error,
        }
    }

    /// Fetch several cards concurrently, keeping their order.
    pub async fn fetch_all(
        &self,
        cards: &[CardSpec],
        extra: &QueryParams,
        range: TimeRange,
    ) -> Vec<CardResult> {
        join_all(cards.iter().map(|card| self.fetch_card(card, extra, range))).await
    }
}
