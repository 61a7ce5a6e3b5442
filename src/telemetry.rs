//! Typed telemetry events.
//!
//! Events are emitted through `tracing` under the `telemetry` target, so the
//! subscriber configured in `main` decides where they end up.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    #[serde(rename = "ui.wizard.step_viewed")]
    WizardStepViewed { step_id: String, profile_id: String },

    #[serde(rename = "run.result.downloaded")]
    ResultDownloaded { artifact_type: String },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::WizardStepViewed { .. } => "ui.wizard.step_viewed",
            TelemetryEvent::ResultDownloaded { .. } => "run.result.downloaded",
        }
    }
}

pub fn log_event(event: &TelemetryEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    tracing::info!(target: "telemetry", event = event.name(), %payload);
}
