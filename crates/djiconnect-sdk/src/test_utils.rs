//! Test utilities for SDK simulation
//!
//! Provides helpers for building simulators and scripted scenarios.

use djiconnect_core::{ComponentKey, RegistrationCode};

use crate::simulated::{RegistrationOutcome, Scenario, ScenarioEvent, ScenarioStep, SimulatedSdk};

/// Simulator that registers successfully with no delay and replays `steps`.
pub fn instant_sdk(steps: Vec<ScenarioStep>) -> SimulatedSdk {
    SimulatedSdk::new(
        Scenario::manual()
            .with_registration(instant_outcome(RegistrationCode::Success))
            .with_steps(steps),
    )
}

/// Simulator whose registration fails immediately with `code`.
pub fn failing_sdk(code: RegistrationCode, description: &str) -> SimulatedSdk {
    SimulatedSdk::new(Scenario::manual().with_registration(RegistrationOutcome {
        code,
        description: Some(description.to_string()),
        delay_ms: 0,
    }))
}

/// Registration outcome delivered without delay.
pub fn instant_outcome(code: RegistrationCode) -> RegistrationOutcome {
    RegistrationOutcome {
        code,
        description: None,
        delay_ms: 0,
    }
}

/// Connectivity flip step for `key`.
pub fn flip(after_ms: u64, key: ComponentKey, connected: bool) -> ScenarioStep {
    ScenarioStep::new(after_ms, ScenarioEvent::ComponentConnectivity { key, connected })
}
