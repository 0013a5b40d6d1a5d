mod merge;
mod scheduled;
mod service;

pub use merge::{
  is_non_racing, merge_driver, merge_field, normalize_colour, resolve_session_type,
  session_from_remote, SkipReason,
};
pub use scheduled::{
  run_initial_sync, run_scheduled_sync, InitialSync, ScheduledSummary, StepOutcome, YearSync,
};
pub use service::{SessionSyncService, SyncCounts, SyncError};
