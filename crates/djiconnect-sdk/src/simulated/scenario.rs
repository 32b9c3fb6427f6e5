//! Scripted SDK behaviour loaded from TOML
//!
//! ```toml
//! [registration]
//! code = "success"
//! delay_ms = 200
//!
//! [[steps]]
//! after_ms = 100
//! event = { kind = "product_connect", model = "Mavic 3" }
//!
//! [[steps]]
//! after_ms = 50
//! event = { kind = "component_attached", key = "camera", connected = true }
//! ```

use std::path::Path;
use std::time::Duration;

use djiconnect_core::prelude::*;
use djiconnect_core::{ComponentKey, ProductInfo, RegistrationCode, RegistrationResult};
use serde::Deserialize;

/// Default delay before the registration result is delivered
pub const DEFAULT_REGISTRATION_DELAY_MS: u64 = 200;

/// A raw SDK event the simulator can replay
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioEvent {
    ProductConnect {
        model: String,
        #[serde(default)]
        serial: Option<String>,
    },
    ProductDisconnect,
    /// A new component object takes the slot, replacing any previous one
    ComponentAttached {
        key: ComponentKey,
        #[serde(default)]
        connected: bool,
    },
    /// The slot is emptied
    ComponentDetached { key: ComponentKey },
    /// The component currently in the slot flips connectivity
    ComponentConnectivity { key: ComponentKey, connected: bool },
}

impl ScenarioEvent {
    pub fn product_connect(model: impl Into<String>) -> Self {
        Self::ProductConnect {
            model: model.into(),
            serial: None,
        }
    }

    pub(crate) fn product_info(model: &str, serial: &Option<String>) -> ProductInfo {
        let product = ProductInfo::new(model);
        match serial {
            Some(serial) => product.with_serial(serial.clone()),
            None => product,
        }
    }
}

/// One timed step of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioStep {
    /// Delay since the previous step (or since connection start)
    #[serde(default)]
    pub after_ms: u64,
    pub event: ScenarioEvent,
}

impl ScenarioStep {
    pub fn new(after_ms: u64, event: ScenarioEvent) -> Self {
        Self { after_ms, event }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.after_ms)
    }
}

/// How the simulated SDK answers `register_app`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationOutcome {
    #[serde(default = "default_code")]
    pub code: RegistrationCode,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_code() -> RegistrationCode {
    RegistrationCode::Success
}

fn default_delay_ms() -> u64 {
    DEFAULT_REGISTRATION_DELAY_MS
}

impl Default for RegistrationOutcome {
    fn default() -> Self {
        Self {
            code: default_code(),
            description: None,
            delay_ms: default_delay_ms(),
        }
    }
}

impl RegistrationOutcome {
    pub fn result(&self) -> RegistrationResult {
        match (self.code, &self.description) {
            (RegistrationCode::Success, _) => RegistrationResult::success(),
            (code, Some(description)) => RegistrationResult::failure(code, description.clone()),
            (code, None) => RegistrationResult::failure(code, format!("{:?}", code)),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Complete simulator script
///
/// `registration = None` puts the simulator in manual mode: nothing is
/// delivered until the host calls the simulator's delivery methods.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub registration: Option<RegistrationOutcome>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl Default for Scenario {
    /// Registers successfully, attaches a product and brings up its core
    /// components.
    fn default() -> Self {
        Self {
            registration: Some(RegistrationOutcome::default()),
            steps: vec![
                ScenarioStep::new(300, ScenarioEvent::product_connect("Mavic 3")),
                ScenarioStep::new(
                    20,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::FlightController,
                        connected: true,
                    },
                ),
                ScenarioStep::new(
                    20,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::Camera,
                        connected: true,
                    },
                ),
                ScenarioStep::new(
                    20,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::Gimbal,
                        connected: true,
                    },
                ),
            ],
        }
    }
}

impl Scenario {
    /// Scenario that waits for the host to drive everything
    pub fn manual() -> Self {
        Self {
            registration: None,
            steps: Vec::new(),
        }
    }

    pub fn with_registration(mut self, outcome: RegistrationOutcome) -> Self {
        self.registration = Some(outcome);
        self
    }

    pub fn with_steps(mut self, steps: Vec<ScenarioStep>) -> Self {
        self.steps = steps;
        self
    }

    /// Parse a scenario from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        let scenario = Self::parse(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        debug!(
            "Loaded scenario from {:?} ({} steps)",
            path,
            scenario.steps.len()
        );
        Ok(scenario)
    }
}
