//! Generation lifecycle services

pub mod backfill;
pub mod callback_reconciler;
pub mod orchestrator;
pub mod retry_tracker;
pub mod suno_client;
pub mod task_correlator;
pub mod track_normalizer;

pub use crate::error::GenError;
pub use backfill::{run_backfill, BackfillReport};
pub use callback_reconciler::{CallbackReconciler, ReconcileOutcome};
pub use orchestrator::{CallbackUrls, GenerationOrchestrator};
pub use retry_tracker::{RetryTracker, MAX_RETRIES};
pub use suno_client::{LyricsJob, MusicJob, MusicProvider, ProviderError, SunoClient, TaskSnapshot, TaskState};
pub use task_correlator::TaskCorrelator;
