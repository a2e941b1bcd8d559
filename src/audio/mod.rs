//! # Audio Module
//!
//! Per-guild music queues and the songbird playback driver.
//!
//! ### [`queue`] - Queue Management
//! - Ordered pending items plus the current item
//! - Shuffle and repeat (off/song/queue) semantics
//!
//! ### [`player`] - Audio Player
//! - Lazily creates one queue per guild
//! - Advances the queue when a track ends and announces what plays next

pub mod player;
pub mod queue;
