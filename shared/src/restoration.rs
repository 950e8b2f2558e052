//! The minimal snapshot needed to resume the session after a relaunch.

use serde::{Deserialize, Serialize};

use crate::deep_link::DeepLinkWait;
use crate::error::SnapshotError;
use crate::flow::{SessionFlow, SignInState};
use crate::types::{DriverId, Email, PublishableKey};
use crate::visits::Visits;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PersistedSnapshot {
    DeepLinkPending,
    SignIn {
        email: Option<Email>,
    },
    Driver {
        driver_id: Option<DriverId>,
        publishable_key: PublishableKey,
        manual_visits: Option<bool>,
    },
    Visits {
        visits: Visits,
        publishable_key: PublishableKey,
        driver_id: DriverId,
    },
}

impl PersistedSnapshot {
    /// Snapshot of `flow`, or `None` while there is nothing worth resuming.
    #[must_use]
    pub fn of(flow: &SessionFlow) -> Option<Self> {
        match flow {
            SessionFlow::Created | SessionFlow::Launching(_) | SessionFlow::NoMotionServices => {
                None
            }
            SessionFlow::SigningIn(sign_in) => Some(match sign_in {
                SignInState::Editing { status, .. } if status.as_ref().is_some_and(|s| s.is_deep_link()) => {
                    Self::DeepLinkPending
                }
                SignInState::Editing { email, .. } => Self::SignIn {
                    email: email.clone(),
                },
                SignInState::SigningIn { email, .. } => Self::SignIn {
                    email: Some(email.clone()),
                },
            }),
            SessionFlow::RegisteringDriver(registration) => Some(Self::Driver {
                driver_id: registration.driver_id.clone(),
                publishable_key: registration.publishable_key.clone(),
                manual_visits: registration.manual_visits,
            }),
            SessionFlow::Tracking(tracking) => {
                let mut visits = tracking.visits.clone();
                visits.deselect();
                // Visits are already converted for an account the sdk is
                // being rebuilt for, so its identity is the one to resume.
                let (publishable_key, driver_id) =
                    match tracking.deep_link.as_ref().and_then(DeepLinkWait::resolved) {
                        Some(link) => (link.publishable_key.clone(), link.driver_id.clone()),
                        None => (tracking.publishable_key.clone(), tracking.driver_id.clone()),
                    };
                Some(Self::Visits {
                    visits,
                    publishable_key,
                    driver_id,
                })
            }
        }
    }

    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }
}
