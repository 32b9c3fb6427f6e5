//! Runtime permission gate in front of registration

use std::sync::Arc;

use djiconnect_core::prelude::*;
use djiconnect_core::{Advisory, PermissionSet};
use djiconnect_sdk::PermissionPlatform;
use serde::Serialize;

use crate::context::MainContext;

/// Result of a check pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Nothing missing; registration may start right away
    AllGranted,
    /// A batched request is outstanding
    Requesting,
    /// Permissions are missing and the platform cannot ask for them
    Unsupported,
}

/// Result of delivering a permission response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    ReadyToRegister,
    StillMissing(Vec<String>),
}

/// Tracks which required capabilities are still ungranted
pub struct PermissionGate {
    required: PermissionSet,
    missing: Vec<String>,
    platform: Arc<dyn PermissionPlatform>,
    main: MainContext,
}

impl PermissionGate {
    pub fn new(
        required: PermissionSet,
        platform: Arc<dyn PermissionPlatform>,
        main: MainContext,
    ) -> Self {
        Self {
            required,
            missing: Vec::new(),
            platform,
            main,
        }
    }

    /// Recompute the missing set and request whatever is absent
    ///
    /// At most one request is issued per call, covering every missing
    /// capability at once.
    pub fn check_and_request(&mut self) -> GateStatus {
        self.missing = self
            .required
            .iter()
            .filter(|permission| !self.platform.is_granted(permission))
            .map(str::to_string)
            .collect();

        if self.missing.is_empty() {
            debug!("All {} required permissions granted", self.required.len());
            return GateStatus::AllGranted;
        }

        if !self.platform.supports_runtime_requests() {
            warn!(
                "{} (runtime requests unsupported)",
                Error::permission_denied(self.missing.iter().cloned())
            );
            self.main.present(Advisory::MissingPermissions);
            return GateStatus::Unsupported;
        }

        info!("Requesting {} permissions", self.missing.len());
        self.main.present(Advisory::RequestingPermissions);
        self.platform.request_permissions(&self.missing);
        GateStatus::Requesting
    }

    /// Apply a platform response
    ///
    /// `requested` and `grants` are index-aligned. Every granted identifier is
    /// removed from the missing set, including duplicates. Arrays of unequal
    /// length are rejected and leave the missing set as it was.
    pub fn on_permission_result(
        &mut self,
        requested: &[String],
        grants: &[bool],
    ) -> Result<GrantOutcome> {
        if requested.len() != grants.len() {
            return Err(Error::PermissionResultMismatch {
                requested: requested.len(),
                outcomes: grants.len(),
            });
        }

        for (permission, granted) in requested.iter().zip(grants).rev() {
            if *granted {
                self.missing.retain(|m| m != permission);
            } else {
                trace!("Permission {} denied", permission);
            }
        }

        if self.missing.is_empty() {
            info!("All permissions granted");
            Ok(GrantOutcome::ReadyToRegister)
        } else {
            warn!("{}", Error::permission_denied(self.missing.iter().cloned()));
            self.main.present(Advisory::MissingPermissions);
            Ok(GrantOutcome::StillMissing(self.missing.clone()))
        }
    }

    /// Identifiers not yet granted as of the last check or response
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn required(&self) -> &PermissionSet {
        &self.required
    }
}
