pub mod embeds;
pub mod format;
