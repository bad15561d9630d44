//! Scheduled-intent engine (C12): persists user-created triggers — cron,
//! fixed interval, one-shot, and price/event polls — and drives the
//! `pending -> claim -> fire` worker contract over them. Storage lives in
//! `memoria_stores::relational`; this crate is the validated, typed API
//! surface on top of it plus the next-run arithmetic per trigger kind.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::IntentsEngine;
pub use error::{IntentsError, Result};
pub use types::{CreateIntentRequest, FireResult, PendingIntent, TriggerKind};
