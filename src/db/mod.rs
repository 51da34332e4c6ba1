// SPDX-License-Identifier: MIT

//! Persistence layer.
//!
//! All coordination between concurrent importers happens through the store's
//! uniqueness constraints — the store, not in-process state, is the source of
//! truth for "has sequence N been taken".

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use store::{StoreError, SyncStore};

/// Collection names as constants.
pub mod collections {
    pub const INTEGRATIONS: &str = "integrations";
    pub const SCHEDULE_ENTRIES: &str = "schedule_entries";
    pub const REFLECTION_ENTRIES: &str = "reflection_entries";
    /// Sequence reservation markers for reflection entries (keyed by
    /// user_id/date/sequence; enforces workout_sequence uniqueness, since the
    /// reflection document itself is keyed by the dedup key)
    pub const REFLECTION_SEQUENCES: &str = "reflection_sequences";
}
