// SPDX-License-Identifier: MIT

//! Business logic services.

pub mod import;
pub mod sync;
pub mod tokens;

pub use import::{ImportOutcome, ImportPipeline};
pub use sync::{SyncService, SyncSummary};
pub use tokens::TokenManager;
