/// Locator classification for pasted video links.
///
/// Accepts watch pages, youtu.be short links, shorts and playlist listings.
/// Pure and deterministic: no I/O happens here.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::FetchError;

/// A validated reference to a media item, optionally inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub raw_url: String,
    pub item_id: Option<String>,
    pub collection_id: Option<String>,
}

impl Locator {
    /// Item id, or `CollectionOnlyLocator` for bare playlist links.
    pub fn require_item(&self) -> Result<&str, FetchError> {
        self.item_id
            .as_deref()
            .ok_or(FetchError::CollectionOnlyLocator)
    }

    /// Watch-page URL rebuilt from the item id alone.
    pub fn canonical_url(&self) -> Option<String> {
        self.item_id.as_deref().map(canonical_url)
    }

    /// The raw URL with its `list=` component removed.
    ///
    /// Only used for the resolution call; downloads always go through
    /// [`Locator::canonical_url`].
    pub fn resolution_url(&self) -> String {
        if self.collection_id.is_some() {
            strip_collection(&self.raw_url)
        } else {
            self.raw_url.clone()
        }
    }
}

// ====== REGEX PATTERNS ======

static ACCEPTED_FORMS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        // Watch page
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=[A-Za-z0-9_-]+").unwrap(),
        // Short link
        Regex::new(r"^(?:https?://)?(?:www\.)?youtu\.be/[A-Za-z0-9_-]+").unwrap(),
        // Shorts
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/shorts/[A-Za-z0-9_-]+").unwrap(),
        // Playlist listing
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/playlist\?list=[A-Za-z0-9_-]+").unwrap(),
    ]
});

static ITEM_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/shorts/)([A-Za-z0-9_-]+)"
    ).unwrap()
});

static COLLECTION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[&?]list=([^&]+)").unwrap()
});

/// Classify a pasted URL.
///
/// Returns `InvalidLocator` for anything that is not one of the accepted
/// forms. A playlist listing classifies fine but is not resolvable.
pub fn classify(raw_url: &str) -> Result<Locator, FetchError> {
    let raw_url = raw_url.trim();
    if !ACCEPTED_FORMS.iter().any(|re| re.is_match(raw_url)) {
        return Err(FetchError::InvalidLocator);
    }

    Ok(Locator {
        raw_url: raw_url.to_string(),
        item_id: extract_item_id(raw_url),
        collection_id: extract_collection_id(raw_url),
    })
}

/// Classify and insist on an item id.
pub fn classify_resolvable(raw_url: &str) -> Result<Locator, FetchError> {
    let locator = classify(raw_url)?;
    locator.require_item()?;
    Ok(locator)
}

/// Extract the item id from any accepted form.
pub fn extract_item_id(url: &str) -> Option<String> {
    ITEM_ID_RE.captures(url).map(|cap| cap[1].to_string())
}

/// Extract the `list=` value, wherever it appears in the query.
pub fn extract_collection_id(url: &str) -> Option<String> {
    COLLECTION_ID_RE.captures(url).map(|cap| cap[1].to_string())
}

/// Canonical watch-page URL for an item id.
pub fn canonical_url(item_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", item_id)
}

/// Drop every `list=` query parameter, keeping the rest in order.
fn strip_collection(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("list="))
        .collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}
