use crate::error::DpackError;
use crate::telemetry::{TelemetryEvent, log_event};

use super::state::{WizardAction, WizardState};
use super::validate::check_step;

const STEP_IDS: [&str; 5] = [
    "step-sku",
    "step-context",
    "step-sources",
    "step-output",
    "step-review",
];

/// Telemetry id of a wizard step.
pub fn step_id(step: u8) -> String {
    STEP_IDS
        .get(usize::from(step))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("step-{step}"))
}

/// Owns a [`WizardState`] and applies actions through the reducer.
///
/// Emits a step-viewed event whenever the step or profile changes, and
/// refuses to advance past a step whose guard fails.
#[derive(Debug)]
pub struct Wizard {
    state: WizardState,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        let wizard = Self {
            state: WizardState::default(),
        };
        wizard.emit_step_viewed();
        wizard
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn into_state(self) -> WizardState {
        self.state
    }

    pub fn dispatch(&mut self, action: WizardAction) {
        let before = (self.state.current_step, self.state.profile_id);
        let state = std::mem::take(&mut self.state);
        self.state = state.reduce(action);
        if (self.state.current_step, self.state.profile_id) != before {
            self.emit_step_viewed();
        }
    }

    /// Advance one step if the current step's guard passes.
    pub fn next(&mut self) -> Result<(), DpackError> {
        check_step(&self.state)?;
        self.dispatch(WizardAction::NextStep);
        Ok(())
    }

    fn emit_step_viewed(&self) {
        log_event(&TelemetryEvent::WizardStepViewed {
            step_id: step_id(self.state.current_step),
            profile_id: self
                .state
                .profile_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProfileId, Sku};
    use crate::telemetry::capture::telemetry_events;

    fn viewed(events: &[serde_json::Value]) -> Vec<(String, String)> {
        events
            .iter()
            .filter(|e| e["type"] == "ui.wizard.step_viewed")
            .map(|e| {
                (
                    e["step_id"].as_str().unwrap_or_default().to_string(),
                    e["profile_id"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn step_ids() {
        assert_eq!(step_id(0), "step-sku");
        assert_eq!(step_id(4), "step-review");
        assert_eq!(step_id(9), "step-9");
    }

    #[test]
    fn next_refuses_incomplete_step() {
        let mut wizard = Wizard::new();
        assert!(wizard.next().is_err());
        assert_eq!(wizard.state().current_step, 0);

        wizard.dispatch(WizardAction::SetSku(Sku::Rfp));
        wizard.dispatch(WizardAction::SetProfile(ProfileId::P2));
        wizard.next().unwrap();
        assert_eq!(wizard.state().current_step, 1);
    }

    #[test]
    fn dispatch_applies_reducer() {
        let mut wizard = Wizard::new();
        wizard.dispatch(WizardAction::AddUrl("https://a.example".into()));
        wizard.dispatch(WizardAction::SetSecureMode(true));
        let state = wizard.into_state();
        assert!(state.secure_mode);
        assert!(state.sources.urls.is_empty());
    }

    #[test]
    fn step_viewed_follows_step_and_profile_changes() {
        let events = telemetry_events(|| {
            let mut wizard = Wizard::new();
            wizard.dispatch(WizardAction::SetSku(Sku::Rfp));
            wizard.dispatch(WizardAction::SetProfile(ProfileId::P2));
            wizard.next().unwrap();
            wizard.dispatch(WizardAction::SetRunName("Harbor RFP".into()));
            wizard.dispatch(WizardAction::PrevStep);
        });

        let expected = [
            ("step-sku", "unknown"),
            ("step-sku", "P2"),
            ("step-context", "P2"),
            ("step-sku", "P2"),
        ];
        let expected: Vec<(String, String)> = expected
            .iter()
            .map(|(s, p)| (s.to_string(), p.to_string()))
            .collect();
        assert_eq!(viewed(&events), expected);
    }

    #[test]
    fn refused_next_emits_nothing() {
        let mut wizard = Wizard::new();
        let events = telemetry_events(|| {
            assert!(wizard.next().is_err());
        });
        assert!(viewed(&events).is_empty());
    }
}
