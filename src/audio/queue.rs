use rand::Rng;
use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

use crate::sources::TrackSource;

/// Errores de las operaciones de la cola que pueden fallar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("position {index} is out of range (queue has {len} songs)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid repeat mode `{0}` (expected off, song or queue)")]
    InvalidMode(String),
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub source: TrackSource,
    pub title: String,
    pub source_label: Option<String>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
    pub requested_by: UserId,
}

impl QueueItem {
    /// Two items are duplicates only when both carry the same non-empty URL.
    pub fn is_duplicate_of(&self, other: &QueueItem) -> bool {
        match (self.url.as_deref(), other.url.as_deref()) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        }
    }
}

impl From<TrackSource> for QueueItem {
    fn from(source: TrackSource) -> Self {
        let url = source.url();
        Self {
            title: source.title(),
            source_label: source.uploader(),
            duration: source.duration(),
            thumbnail: source.thumbnail(),
            url: (!url.is_empty()).then_some(url),
            requested_by: source.requested_by(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    Song,
    Queue,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Song => "song",
            RepeatMode::Queue => "queue",
        }
    }
}

impl FromStr for RepeatMode {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "song" => Ok(RepeatMode::Song),
            "queue" => Ok(RepeatMode::Queue),
            other => Err(QueueError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cola de reproducción de una guild.
///
/// `current` nunca forma parte de `items`: se saca de la cola en el momento
/// en que pasa a reproducirse. El límite de tamaño lo aplica quien llama a
/// [`MusicQueue::enqueue`], nunca la cola.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
    current: Option<QueueItem>,
    repeat_mode: RepeatMode,
    shuffle: bool,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, item: QueueItem) {
        info!("➕ Added to queue: {}", item.title);
        self.items.push_back(item);
    }

    /// Agrega un track para que suene justo después del actual
    pub fn insert_next(&mut self, item: QueueItem) {
        info!("⏫ Queued next: {}", item.title);
        self.items.push_front(item);
    }

    /// Obtiene el siguiente track. Llamado por el driver cuando termina el anterior.
    pub fn get_next(&mut self) -> Option<QueueItem> {
        if self.repeat_mode == RepeatMode::Song {
            if let Some(current) = &self.current {
                info!("🔂 Repeating: {}", current.title);
                return Some(current.clone());
            }
        }

        if self.items.is_empty() {
            info!("📭 Queue empty, nothing left to play");
            self.current = None;
            return None;
        }

        let index = if self.shuffle {
            rand::thread_rng().gen_range(0..self.items.len())
        } else {
            0
        };
        let next = self.items.remove(index)?;
        if self.shuffle {
            info!("🔀 Picked at random (position {}): {}", index, next.title);
        } else {
            info!("➡️ Next in queue: {}", next.title);
        }

        if self.repeat_mode == RepeatMode::Queue {
            self.items.push_back(next.clone());
            debug!("🔁 Re-queued at the back: {}", next.title);
        }

        self.current = Some(next.clone());
        Some(next)
    }

    /// Avanza aunque esté activo el modo de repetir canción
    pub fn skip(&mut self) -> Option<QueueItem> {
        let mode = self.repeat_mode;
        if mode == RepeatMode::Song {
            self.repeat_mode = RepeatMode::Off;
        }
        let next = self.get_next();
        self.repeat_mode = mode;
        next
    }

    /// Limpia la cola y el track actual
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        info!("🗑️ Queue cleared");
    }

    /// Elimina el track en `index` (base 0)
    pub fn remove(&mut self, index: usize) -> Result<QueueItem, QueueError> {
        let len = self.items.len();
        let removed = self
            .items
            .remove(index)
            .ok_or(QueueError::IndexOutOfRange { index, len })?;
        debug!("❌ Removed position {}: {}", index, removed.title);
        Ok(removed)
    }

    /// Mueve un track a una nueva posición
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        let len = self.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(QueueError::IndexOutOfRange { index, len });
            }
        }

        if from != to {
            if let Some(item) = self.items.remove(from) {
                self.items.insert(to, item);
            }
            debug!("📍 Moved track from {} to {}", from, to);
        }

        Ok(())
    }

    pub fn set_repeat(&mut self, mode: &str) -> Result<RepeatMode, QueueError> {
        let mode = mode.parse::<RepeatMode>()?;
        self.set_repeat_mode(mode);
        Ok(mode)
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        match mode {
            RepeatMode::Off => info!("➡️ Repeat disabled"),
            RepeatMode::Song => info!("🔂 Repeat song enabled"),
            RepeatMode::Queue => info!("🔁 Repeat queue enabled"),
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        if self.shuffle {
            info!("🔀 Shuffle enabled");
        } else {
            info!("➡️ Shuffle disabled");
        }
        self.shuffle
    }

    /// Sólo mira los pendientes: un track sonando no cuenta
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Track pendiente en `index` (base 0)
    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    /// Los próximos `count` tracks en orden de cola (sin reflejar shuffle)
    pub fn peek_next(&self, count: usize) -> Vec<&QueueItem> {
        self.items.iter().take(count).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.duration).sum()
    }

    pub fn find_by_title(&self, query: &str) -> Vec<(usize, &QueueItem)> {
        let needle = query.to_lowercase();
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.title.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        !url.is_empty() && self.items.iter().any(|item| item.url.as_deref() == Some(url))
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceType;
    use pretty_assertions::assert_eq;

    fn item(title: &str, secs: Option<u64>, url: Option<&str>) -> QueueItem {
        let mut source = TrackSource::new(
            title.to_string(),
            url.unwrap_or_default().to_string(),
            SourceType::YouTube,
            UserId::new(42),
        );
        if let Some(secs) = secs {
            source = source.with_duration(Duration::from_secs(secs));
        }
        QueueItem::from(source)
    }

    fn queue_of(titles: &[&str]) -> MusicQueue {
        let mut queue = MusicQueue::new();
        for title in titles {
            queue.enqueue(item(title, None, None));
        }
        queue
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue
            .peek_next(usize::MAX)
            .into_iter()
            .map(|i| i.title.clone())
            .collect()
    }

    fn next_title(queue: &mut MusicQueue) -> Option<String> {
        queue.get_next().map(|i| i.title)
    }

    #[test]
    fn peek_returns_enqueue_order() {
        let queue = queue_of(&["A", "B", "C", "D"]);
        let peeked: Vec<_> = queue.peek_next(3).into_iter().map(|i| i.title.as_str()).collect();
        assert_eq!(peeked, vec!["A", "B", "C"]);
        assert_eq!(queue.peek_next(10).len(), 4);
    }

    #[test]
    fn get_next_is_fifo_with_insert_next_priority() {
        let mut queue = queue_of(&["A", "B"]);
        queue.insert_next(item("X", None, None));
        queue.insert_next(item("Y", None, None));

        let order: Vec<_> = std::iter::from_fn(|| next_title(&mut queue)).collect();
        assert_eq!(order, vec!["Y", "X", "A", "B"]);
    }

    #[test]
    fn get_next_on_empty_queue_returns_none() {
        let mut queue = MusicQueue::new();
        assert!(queue.get_next().is_none());
        assert!(queue.current().is_none());
    }

    #[test]
    fn current_is_removed_from_pending() {
        let mut queue = queue_of(&["A", "B"]);
        queue.get_next();
        assert_eq!(queue.current().map(|i| i.title.as_str()), Some("A"));
        assert_eq!(titles(&queue), vec!["B"]);
        assert!(!queue.is_empty());
        queue.get_next();
        assert!(queue.is_empty());
        assert!(queue.current().is_some());
    }

    #[test]
    fn draining_resets_current() {
        let mut queue = queue_of(&["A"]);
        queue.get_next();
        assert!(queue.get_next().is_none());
        assert!(queue.current().is_none());
    }

    #[test]
    fn repeat_song_replays_current_without_touching_pending() {
        let mut queue = queue_of(&["A", "B"]);
        queue.get_next();
        queue.set_repeat("song").unwrap();

        for _ in 0..5 {
            assert_eq!(next_title(&mut queue).as_deref(), Some("A"));
        }
        assert_eq!(titles(&queue), vec!["B"]);
    }

    #[test]
    fn repeat_song_without_current_behaves_like_fifo() {
        let mut queue = queue_of(&["A", "B"]);
        queue.set_repeat_mode(RepeatMode::Song);
        assert_eq!(next_title(&mut queue).as_deref(), Some("A"));
        assert_eq!(next_title(&mut queue).as_deref(), Some("A"));
    }

    #[test]
    fn repeat_queue_cycles_forever() {
        let mut queue = queue_of(&["A", "B"]);
        queue.set_repeat_mode(RepeatMode::Queue);

        let order: Vec<_> = (0..6).filter_map(|_| next_title(&mut queue)).collect();
        assert_eq!(order, vec!["A", "B", "A", "B", "A", "B"]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn repeat_queue_requeues_an_independent_copy() {
        let mut queue = queue_of(&["A"]);
        queue.set_repeat_mode(RepeatMode::Queue);

        let mut played = queue.get_next().unwrap();
        played.title.push_str(" (live)");

        assert_eq!(titles(&queue), vec!["A"]);
    }

    #[test]
    fn skip_under_repeat_song_advances() {
        let mut queue = queue_of(&["A", "B"]);
        queue.get_next();
        queue.set_repeat_mode(RepeatMode::Song);

        assert_eq!(queue.skip().map(|i| i.title).as_deref(), Some("B"));
        assert_eq!(queue.repeat_mode(), RepeatMode::Song);
        assert_eq!(next_title(&mut queue).as_deref(), Some("B"));
    }

    #[test]
    fn skip_under_repeat_song_with_empty_pending_returns_none() {
        let mut queue = queue_of(&["A"]);
        queue.get_next();
        queue.set_repeat_mode(RepeatMode::Song);

        assert!(queue.skip().is_none());
        assert!(queue.current().is_none());
        assert_eq!(queue.repeat_mode(), RepeatMode::Song);
    }

    #[test]
    fn skip_matches_get_next_when_not_repeating_song() {
        let mut queue = queue_of(&["A", "B"]);
        queue.set_repeat_mode(RepeatMode::Queue);
        assert_eq!(queue.skip().map(|i| i.title).as_deref(), Some("A"));
        assert_eq!(titles(&queue), vec!["B", "A"]);
    }

    #[test]
    fn all_repeat_transitions_are_allowed() {
        let mut queue = MusicQueue::new();
        for (from, to) in [
            ("off", "song"),
            ("off", "queue"),
            ("song", "off"),
            ("queue", "off"),
            ("song", "queue"),
            ("queue", "song"),
        ] {
            queue.set_repeat(from).unwrap();
            assert_eq!(queue.set_repeat(to).unwrap().as_str(), to);
            assert_eq!(queue.repeat_mode().as_str(), to);
        }
    }

    #[test]
    fn invalid_repeat_mode_leaves_state_unchanged() {
        let mut queue = MusicQueue::new();
        queue.set_repeat_mode(RepeatMode::Queue);
        assert_eq!(
            queue.set_repeat("track"),
            Err(QueueError::InvalidMode("track".to_string()))
        );
        assert_eq!(queue.repeat_mode(), RepeatMode::Queue);
    }

    #[test]
    fn remove_shifts_later_items() {
        let mut queue = queue_of(&["A", "B", "C"]);
        assert_eq!(queue.remove(1).unwrap().title, "B");
        assert_eq!(titles(&queue), vec!["A", "C"]);
    }

    #[test]
    fn remove_out_of_range_is_rejected() {
        let mut queue = queue_of(&["A", "B"]);
        assert_eq!(
            queue.remove(2).unwrap_err(),
            QueueError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(titles(&queue), vec!["A", "B"]);
    }

    #[test]
    fn move_front_to_back() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.move_item(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["B", "C", "A"]);
        assert_eq!(queue.get(2).map(|i| i.title.as_str()), Some("A"));
        assert!(queue.get(3).is_none());

        queue.move_item(2, 0).unwrap();
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn move_out_of_range_is_rejected() {
        let mut queue = queue_of(&["A", "B", "C"]);
        assert!(queue.move_item(0, 3).is_err());
        assert!(queue.move_item(5, 0).is_err());
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn toggle_shuffle_twice_restores_without_reordering() {
        let mut queue = queue_of(&["A", "B", "C"]);
        assert!(queue.toggle_shuffle());
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
        assert!(!queue.toggle_shuffle());
        assert!(!queue.is_shuffle());
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn shuffle_plays_every_item_exactly_once() {
        let mut queue = queue_of(&["A", "B", "C", "D", "E"]);
        queue.toggle_shuffle();

        let mut played: Vec<_> = std::iter::from_fn(|| next_title(&mut queue)).collect();
        played.sort();
        assert_eq!(played, vec!["A", "B", "C", "D", "E"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn contains_url_is_exact_and_case_sensitive() {
        let mut queue = MusicQueue::new();
        queue.enqueue(item("A", None, Some("http://x/1")));
        queue.enqueue(item("B", None, None));

        assert!(queue.contains_url("http://x/1"));
        assert!(!queue.contains_url("HTTP://x/1"));
        assert!(!queue.contains_url(""));
    }

    #[test]
    fn duplicates_require_matching_non_empty_urls() {
        let a = item("A", None, Some("http://x/1"));
        let b = item("B", None, Some("http://x/1"));
        let c = item("C", None, None);
        let d = item("D", None, None);

        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&c));
        assert!(!c.is_duplicate_of(&d));
    }

    #[test]
    fn total_duration_skips_unknown() {
        let mut queue = MusicQueue::new();
        queue.enqueue(item("A", Some(180), None));
        queue.enqueue(item("B", None, None));
        queue.enqueue(item("C", Some(240), None));
        assert_eq!(queue.total_duration(), Duration::from_secs(420));

        queue.get_next();
        assert_eq!(queue.total_duration(), Duration::from_secs(240));
    }

    #[test]
    fn find_by_title_is_case_insensitive_with_positions() {
        let queue = queue_of(&["Daft Punk - One More Time", "Queen", "daft punk - Aerodynamic"]);
        let found: Vec<_> = queue
            .find_by_title("DAFT")
            .into_iter()
            .map(|(i, item)| (i, item.title.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![(0, "Daft Punk - One More Time"), (2, "daft punk - Aerodynamic")]
        );
    }

    #[test]
    fn clear_resets_pending_and_current_but_keeps_modes() {
        let mut queue = queue_of(&["A", "B"]);
        queue.get_next();
        queue.set_repeat_mode(RepeatMode::Queue);
        queue.toggle_shuffle();

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert_eq!(queue.repeat_mode(), RepeatMode::Queue);
        assert!(queue.is_shuffle());
    }
}
