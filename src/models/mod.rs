// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod entry;
pub mod integration;
pub mod workout;

pub use entry::{ReflectionEntry, ScheduleEntry};
pub use integration::{IntegrationRecord, Provider};
pub use workout::{
    ActivityType, ProviderWorkout, RecoveryMetrics, WebhookEvent, WebhookEventKind,
};
