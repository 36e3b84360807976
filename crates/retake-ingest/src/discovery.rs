//! Series discovery: walk an event and its child events for series ids.

use std::collections::{HashSet, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetch::{extract_next_data, fetch_cancellable, PageFetcher};
use crate::source::EventSource;
use retake_core::{Error, Result};

static SERIES_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"/series/.*?(\d+)$").unwrap());
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const SERIES_KEYS: [&str; 3] = ["series", "allSeries", "results"];

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredEvent {
    pub name: String,
    /// Series ids in discovery order, without duplicates.
    pub series_ids: Vec<String>,
}

/// Crawl the event page, then its child events breadth-first.
///
/// The root page must be reachable; unreachable child pages are logged and
/// skipped.
pub async fn discover(
    fetcher: &dyn PageFetcher,
    source: &EventSource,
    cancel: &CancellationToken,
) -> Result<DiscoveredEvent> {
    info!("Discovering series for event {}", source.canonical_url());

    let mut series_ids: Vec<String> = Vec::new();
    let mut seen_series: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::from([source.external_id.clone()]);
    let mut queue: VecDeque<String> = VecDeque::from([source.path.clone()]);
    let mut name: Option<String> = None;
    let mut is_root = true;

    while let Some(path) = queue.pop_front() {
        let html = match fetch_cancellable(fetcher, &path, cancel).await {
            Ok(html) => html,
            Err(e) if is_root || matches!(e, Error::Cancelled) => return Err(e),
            Err(e) => {
                warn!("Skipping child event {}: {}", path, e);
                continue;
            }
        };

        let event = match extract_next_data(&html) {
            Ok(data) => data
                .pointer("/props/pageProps/event")
                .cloned()
                .unwrap_or(Value::Null),
            Err(e) => {
                warn!("No event payload on {}: {}", path, e);
                Value::Null
            }
        };

        if is_root {
            name = event
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);
        }

        let mut push = |id: String| {
            if seen_series.insert(id.clone()) {
                series_ids.push(id);
            }
        };

        for key in SERIES_KEYS {
            for item in event.get(key).and_then(Value::as_array).into_iter().flatten() {
                if let Some(id) = item.get("id").and_then(id_string) {
                    push(id);
                }
            }
        }
        for id in series_links(&html) {
            push(id);
        }

        for child in event
            .get("childEvents")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(child_id) = child.get("id").and_then(id_string) {
                if visited.insert(child_id.clone()) {
                    debug!("Queueing child event {}", child_id);
                    queue.push_back(format!("/events/_/{}", child_id));
                }
            }
        }
        is_root = false;
    }

    let name = name
        .or_else(|| source.title_from_slug())
        .unwrap_or_else(|| format!("Event {}", source.external_id));

    info!(
        "Discovered {} series for '{}' across {} event pages",
        series_ids.len(),
        name,
        visited.len()
    );
    Ok(DiscoveredEvent { name, series_ids })
}

/// Series ids from anchors like `/series/prx-vs-th-12345`.
fn series_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHORS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| SERIES_HREF.captures(href.trim()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Ids arrive as numbers or strings.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
