// Bridge module - unread counters fed by REST, realtime events and polling
mod unread;

pub use unread::{CountUpdate, UnreadCounter, UnreadSource, extract_count};
