mod id;
mod manifest;
mod model;
mod status;

pub use id::new_run_id;
pub use manifest::RunManifest;
#[cfg(test)]
pub use manifest::SECURE_MODE_WARNING;
pub use model::{DiscardKnowledge, Run, RunError, RunSummary, synthesize_artifacts};
#[cfg(test)]
pub use status::QUEUED_DELAY_MS;
pub use status::{RunStatus, StatusTimeline, Transition};
