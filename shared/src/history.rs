/// Download history ledger.
///
/// Most-recent-first log of completed transfers, at most one entry per
/// (item, format) and at most [`HISTORY_CAP`] entries. Persisted as a single
/// JSON array in the client-local store; anything unreadable there loads as
/// an empty ledger.
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use crate::db;
use crate::models::{DownloadFormat, HistoryEntry, MediaItemInfo};

/// Local store key holding the serialized ledger.
pub const HISTORY_KEY: &str = "clipdrop_history";

/// Maximum number of retained entries.
pub const HISTORY_CAP: usize = 20;

/// In-memory ledger, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Parse a persisted ledger. The cap is re-applied on load.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let mut entries: Vec<HistoryEntry> = serde_json::from_str(raw)?;
        entries.truncate(HISTORY_CAP);
        Ok(Self { entries })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries)
    }

    /// Insert at the front, replacing any entry with the same (item, format).
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries
            .retain(|e| e.item_id != entry.item_id || e.format != entry.format);
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAP);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries, most recent first.
    pub fn all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Millisecond timestamp id, bumped past every id already held.
    pub fn next_id(&self, now: DateTime<Utc>) -> i64 {
        let floor = self.entries.iter().map(|e| e.id).max().map_or(i64::MIN, |id| id.saturating_add(1));
        now.timestamp_millis().max(floor)
    }
}

/// History bound to its persistent store.
pub struct HistoryLedger {
    history: History,
    pool: SqlitePool,
}

impl HistoryLedger {
    /// Load the ledger. Read or parse failures start from empty.
    pub async fn open(pool: SqlitePool) -> Self {
        let history = match db::get_item(&pool, HISTORY_KEY).await {
            Ok(Some(raw)) => History::from_json(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable history: {}", e);
                History::default()
            }),
            Ok(None) => History::default(),
            Err(e) => {
                warn!("Failed to load history: {}", e);
                History::default()
            }
        };
        debug!("History loaded with {} entries", history.len());
        Self { history, pool }
    }

    /// Record an entry and persist.
    pub async fn record(&mut self, entry: HistoryEntry) {
        self.history.record(entry);
        self.save().await;
    }

    /// Record a completed transfer of `info` in `format`, stamped now.
    pub async fn record_completed(&mut self, info: &MediaItemInfo, format: DownloadFormat) -> HistoryEntry {
        let now = Utc::now();
        let entry = HistoryEntry {
            id: self.history.next_id(now),
            item_id: info.item_id.clone(),
            title: info.title.clone(),
            thumbnail_url: info.thumbnail_url.clone(),
            channel_name: info.channel_name.clone(),
            duration_label: info.duration_label.clone(),
            format,
            completed_at: now,
        };
        self.record(entry.clone()).await;
        entry
    }

    /// Empty the ledger and persist the empty state.
    pub async fn clear(&mut self) {
        self.history.clear();
        self.save().await;
    }

    pub fn all(&self) -> &[HistoryEntry] {
        self.history.all()
    }

    /// Entry by 1-based position, as listed.
    pub fn nth(&self, position: usize) -> Option<&HistoryEntry> {
        position.checked_sub(1).and_then(|i| self.history.all().get(i))
    }

    async fn save(&self) {
        let raw = match self.history.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = db::set_item(&self.pool, HISTORY_KEY, &raw).await {
            warn!("Failed to save history: {}", e);
        }
    }
}
