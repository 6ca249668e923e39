//! SQLite persistence for Corvid.
//!
//! One database, four tables: `messages`, `rate_limits`, `processed_events`,
//! `memories`. All repositories share a split reader/writer pool; the
//! single-connection writer serializes the two read-modify-write hot spots
//! (rate windows, processed-event claims).

pub mod conversation;
pub mod dedup;
pub mod memory;
pub mod pool;

pub use conversation::SqliteConversationRepository;
pub use dedup::SqliteProcessedEventRepository;
pub use memory::SqliteMemoryRepository;
pub use pool::DatabasePool;
