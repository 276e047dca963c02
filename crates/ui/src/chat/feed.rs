use std::collections::HashSet;

use emberchat_backend::{DEFAULT_FEED_LIMIT, MessageRecord};

/// Client-side view of the live message query.
///
/// The subscription source may deliver records out of order, late, or twice;
/// this aggregate re-establishes the invariant the consumers rely on:
/// ordered by `(created_at, id)` ascending, bounded to the most recent
/// `limit` entries.
pub struct Feed {
    limit: usize,
    messages: Vec<MessageRecord>,
}

impl Feed {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            messages: Vec::new(),
        }
    }

    pub fn with_default_limit() -> Self {
        Self::new(DEFAULT_FEED_LIMIT)
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Replaces the window with a full snapshot.
    pub fn replace(&mut self, records: Vec<MessageRecord>) {
        self.messages = records;
        self.messages
            .sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let mut seen = HashSet::new();
        self.messages.retain(|record| seen.insert(record.id.clone()));

        self.trim_to_limit();
    }

    /// Inserts one record at its timestamp position; a record with a known id
    /// replaces the earlier copy.
    pub fn upsert(&mut self, record: MessageRecord) {
        self.messages.retain(|existing| existing.id != record.id);

        let position = self
            .messages
            .partition_point(|existing| (existing.created_at, &existing.id) <= (record.created_at, &record.id));
        self.messages.insert(position, record);

        self.trim_to_limit();
    }

    /// Drops the oldest entries once the window exceeds the subscription
    /// limit, mirroring what the server-side query would return.
    fn trim_to_limit(&mut self) {
        if self.messages.len() > self.limit {
            let overflow = self.messages.len() - self.limit;
            self.messages.drain(..overflow);
        }
    }
}

/// Lifecycle of the live subscription driving a `Feed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedPhase {
    #[default]
    Connecting,
    Live,
    Lost {
        reason: String,
    },
}

impl FeedPhase {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn lost_reason(&self) -> Option<&str> {
        match self {
            Self::Lost { reason } => Some(reason),
            Self::Connecting | Self::Live => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use emberchat_backend::{MessageId, UserId};

    use super::*;

    fn at(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(seconds as i64)
    }

    fn record(id: &str, seconds: u32) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            text: format!("message {id}"),
            author_uid: UserId::new("uid-1"),
            author_photo_url: None,
            created_at: at(seconds),
        }
    }

    fn ids(feed: &Feed) -> Vec<&str> {
        feed.messages()
            .iter()
            .map(|record| record.id.as_str())
            .collect()
    }

    #[test]
    fn snapshot_is_sorted_by_creation_time() {
        let mut feed = Feed::new(100);
        feed.replace(vec![record("m3", 30), record("m1", 10), record("m2", 20)]);
        assert_eq!(ids(&feed), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn out_of_order_upserts_land_at_their_timestamp_position() {
        let mut feed = Feed::new(100);
        feed.replace(vec![record("m1", 10), record("m4", 40)]);

        // Delayed delivery: an older record arrives after a newer one.
        feed.upsert(record("m2", 20));
        feed.upsert(record("m3", 30));

        assert_eq!(ids(&feed), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn duplicate_ids_collapse_to_one_entry() {
        let mut feed = Feed::new(100);
        feed.replace(vec![record("m1", 10), record("m2", 20)]);

        feed.upsert(record("m1", 10));
        assert_eq!(ids(&feed), vec!["m1", "m2"]);

        feed.replace(vec![record("m1", 10), record("m1", 10), record("m2", 20)]);
        assert_eq!(ids(&feed), vec!["m1", "m2"]);
    }

    #[test]
    fn equal_timestamps_are_tie_broken_by_id() {
        let mut feed = Feed::new(100);
        feed.replace(vec![record("mb", 10), record("ma", 10)]);
        assert_eq!(ids(&feed), vec!["ma", "mb"]);

        feed.upsert(record("m0", 10));
        assert_eq!(ids(&feed), vec!["m0", "ma", "mb"]);
    }

    #[test]
    fn window_stays_bounded_and_evicts_the_oldest() {
        let mut feed = Feed::new(100);
        feed.replace((0..100).map(|index| record(&format!("m{index:03}"), index)).collect());
        assert_eq!(feed.len(), 100);

        feed.upsert(record("m100", 100));

        assert_eq!(feed.len(), 100);
        assert_eq!(feed.messages().first().map(|r| r.id.as_str()), Some("m001"));
        assert_eq!(feed.messages().last().map(|r| r.id.as_str()), Some("m100"));
    }

    #[test]
    fn empty_then_populated_then_appended() {
        let mut feed = Feed::with_default_limit();
        assert!(feed.is_empty());

        feed.replace(vec![record("m1", 10)]);
        assert_eq!(feed.len(), 1);

        feed.upsert(record("m2", 20));
        assert_eq!(ids(&feed), vec!["m1", "m2"]);

        feed.clear();
        assert!(feed.is_empty());
    }

    #[test]
    fn phase_reports_lost_reason() {
        let phase = FeedPhase::Lost {
            reason: "connection reset".to_string(),
        };
        assert!(!phase.is_live());
        assert_eq!(phase.lost_reason(), Some("connection reset"));
        assert_eq!(FeedPhase::Live.lost_reason(), None);
        assert!(FeedPhase::Live.is_live());
    }
}
