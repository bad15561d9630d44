//! Hook ingress (C13): consent-scoped connectors for email and calendar,
//! each reachable by webhook or poll, deduplicated by source-message-id and
//! normalized into a transcript before it ever reaches C8. Consent lives in
//! `memoria_stores::relational`; nothing here stores memories directly.

pub mod error;
pub mod health;
pub mod ingress;
pub mod normalize;
pub mod poller;
pub mod types;
pub mod webhook;

pub use error::{HookError, Result};
pub use health::{HookHealthEntry, HookHealthTracker, HookStatus};
pub use ingress::{accept_event, IngressDeps};
pub use poller::{run_poll_loop, HookSource};
pub use types::{HookKind, NormalizedEvent, RawEvent};
