//! Engine services
//!
//! The price-sync side of the engine: rate limiting, the marketplace client
//! abstraction, the update policy state machine, the cross-process run lock,
//! the orchestrator and the notification boundary.

pub mod marketplace;
pub mod notifier;
pub mod rate_limiter;
pub mod run_lock;
pub mod sync_orchestrator;
pub mod update_policy;

pub use marketplace::{FetchOutcome, Marketplace, MercadoLivreClient, ProviderRegistry};
pub use notifier::{LogNotifier, Notifier};
pub use rate_limiter::TokenBucketLimiter;
pub use run_lock::RunLock;
pub use sync_orchestrator::{spawn_scheduler, RunOverrides, RunReport, SyncOrchestrator};
