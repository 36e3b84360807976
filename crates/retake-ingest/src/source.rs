//! Recognised tournament-source URLs.

use url::Url;

use retake_core::{Error, Result};

const CANONICAL_ORIGIN: &str = "https://rib.gg";

/// A validated event URL on the tournament source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSource {
    /// Numeric event id on the source.
    pub external_id: String,
    /// Human-readable slug segment, when the URL carried one.
    pub slug: Option<String>,
    /// `/events/...` path used for fetching.
    pub path: String,
}

impl EventSource {
    /// Accepts `http(s)://[www.]rib.gg/events/<id>` and
    /// `/events/<slug>/<id>`; query, fragment and trailing slash are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let (slug, id) = parse_source_path(raw, "events")?;
        let path = match &slug {
            Some(slug) => format!("/events/{}/{}", slug, id),
            None => format!("/events/{}", id),
        };
        Ok(Self {
            external_id: id,
            slug: slug.filter(|s| s != "_"),
            path,
        })
    }

    /// Source for an event known only by its numeric id.
    pub fn from_id(external_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            slug: None,
            path: format!("/events/{}", external_id),
        }
    }

    /// Slug-free URL stored for the event. Every spelling of the same event
    /// (`/events/123`, `/events/<slug>/123`, `/events/_/123`) maps to it.
    pub fn canonical_url(&self) -> String {
        format!("{}/events/{}", CANONICAL_ORIGIN, self.external_id)
    }

    /// "vct-2024-masters-madrid" → "Vct 2024 Masters Madrid".
    pub fn title_from_slug(&self) -> Option<String> {
        let slug = self.slug.as_deref()?;
        let words: Vec<String> = slug
            .split(['-', '_'])
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

/// A validated series URL: `/series/<id>` or `/series/<slug>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSource {
    pub external_id: String,
    pub path: String,
}

impl SeriesSource {
    pub fn parse(raw: &str) -> Result<Self> {
        let (_, id) = parse_source_path(raw, "series")?;
        Ok(Self {
            path: format!("/series/{}", id),
            external_id: id,
        })
    }
}

/// Split a source URL into its optional slug and numeric id under `kind`.
fn parse_source_path(raw: &str, kind: &str) -> Result<(Option<String>, String)> {
    let invalid = || Error::InvalidSource(format!("unsupported {} URL: {}", kind, raw.trim()));

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid());
    }
    match url.host_str() {
        Some("rib.gg") | Some("www.rib.gg") => {}
        _ => return Err(invalid()),
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (slug, id) = match segments.as_slice() {
        [k, id] if *k == kind => (None, *id),
        [k, slug, id] if *k == kind => (Some(slug.to_string()), *id),
        _ => return Err(invalid()),
    };
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok((slug, id.to_string()))
}
