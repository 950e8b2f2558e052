//! What the tracking SDK reports back to the core.

use serde::{Deserialize, Serialize};

use crate::types::DeviceId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    NotDetermined,
    Denied,
    Disabled,
    Granted,
}

impl PermissionState {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    #[must_use]
    pub const fn needs_request(self) -> bool {
        matches!(self, Self::NotDetermined)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Permissions {
    pub location: PermissionState,
    pub motion: PermissionState,
}

impl Permissions {
    #[must_use]
    pub const fn all_granted(&self) -> bool {
        self.location.is_granted() && self.motion.is_granted()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TrackingStatus {
    Running,
    #[default]
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SdkStatus {
    pub tracking: TrackingStatus,
    pub permissions: Permissions,
}

/// Outcome of bringing the SDK up for a publishable key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SdkState {
    /// Required motion hardware is missing; terminal for the session.
    Locked,
    Unlocked { device_id: DeviceId, status: SdkStatus },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UntrackableReason {
    MotionActivityServicesUnavailable,
    LocationServicesUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_checks() {
        assert!(PermissionState::NotDetermined.needs_request());
        assert!(!PermissionState::Denied.needs_request());
        let all = Permissions {
            location: PermissionState::Granted,
            motion: PermissionState::Granted,
        };
        assert!(all.all_granted());
        assert!(!Permissions::default().all_granted());
    }
}
