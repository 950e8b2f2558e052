//! The session flow and the reducer at its root.
//!
//! ```text
//! Created --launched--> Launching --restored--> SigningIn --signed in--> RegisteringDriver
//!                           |                                                   |
//!                           +------------------> Tracking <----sdk unlocked------+
//!                           +--> NoMotionServices <--sdk locked (any state that makes the sdk)
//! ```
//!
//! `reduce` routes each action to the one active sub-state. An action the
//! active sub-state has no use for is ignored: effect results and timer ticks
//! routinely arrive after the user has moved on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, Network};
use crate::deep_link::DeepLinkWait;
use crate::effect::Effect;
use crate::environment::Environment;
use crate::restoration::PersistedSnapshot;
use crate::types::{DriverId, Email, Password, PublishableKey};
use crate::{launching, registration, sign_in, tracking};

pub use crate::launching::Launching;
pub use crate::registration::Registration;
pub use crate::tracking::Tracking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Email,
    Password,
}

/// Exactly one of focus, error or deep link wait is shown on the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditingStatus {
    Focused(Field),
    Error(String),
    DeepLink(DeepLinkWait),
}

impl EditingStatus {
    #[must_use]
    pub const fn is_deep_link(&self) -> bool {
        matches!(self, Self::DeepLink(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignInState {
    Editing {
        email: Option<Email>,
        password: Option<Password>,
        status: Option<EditingStatus>,
    },
    /// Credentials sent; cancellable under the sign-in effect id.
    SigningIn { email: Email, password: Password },
}

impl Default for SignInState {
    fn default() -> Self {
        Self::Editing {
            email: None,
            password: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum SessionFlow {
    #[default]
    Created,
    Launching(Launching),
    NoMotionServices,
    SigningIn(SignInState),
    RegisteringDriver(Registration),
    Tracking(Box<Tracking>),
}

impl SessionFlow {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Launching(_) => "launching",
            Self::NoMotionServices => "no_motion_services",
            Self::SigningIn(_) => "signing_in",
            Self::RegisteringDriver(_) => "registering_driver",
            Self::Tracking(_) => "tracking",
        }
    }

    /// The publishable key and driver id the session currently runs under.
    #[must_use]
    pub fn identity(&self) -> Option<(&PublishableKey, Option<&DriverId>)> {
        match self {
            Self::RegisteringDriver(r) => Some((&r.publishable_key, r.driver_id.as_ref())),
            Self::Tracking(t) => Some((&t.publishable_key, Some(&t.driver_id))),
            Self::Created | Self::Launching(_) | Self::NoMotionServices | Self::SigningIn(_) => {
                None
            }
        }
    }

    #[must_use]
    pub fn deep_link(&self) -> Option<&DeepLinkWait> {
        match self {
            Self::SigningIn(SignInState::Editing {
                status: Some(EditingStatus::DeepLink(wait)),
                ..
            }) => Some(wait),
            Self::RegisteringDriver(r) => r.deep_link.as_ref(),
            Self::Tracking(t) => t.deep_link.as_ref(),
            Self::Created
            | Self::Launching(_)
            | Self::NoMotionServices
            | Self::SigningIn(_) => None,
        }
    }

    #[must_use]
    pub fn tracking(&self) -> Option<&Tracking> {
        match self {
            Self::Tracking(t) => Some(t),
            Self::Created
            | Self::Launching(_)
            | Self::NoMotionServices
            | Self::SigningIn(_)
            | Self::RegisteringDriver(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppState {
    pub network: Network,
    pub flow: SessionFlow,
}

/// Result of one sub-state handler.
#[derive(Debug)]
pub(crate) struct Step {
    pub flow: SessionFlow,
    pub effects: Vec<Effect>,
}

impl Step {
    pub fn stay(flow: SessionFlow, effects: Vec<Effect>) -> Self {
        Self { flow, effects }
    }

    pub fn ignore(flow: SessionFlow, action: &'static str) -> Self {
        debug!(action, flow = flow.name(), "action ignored");
        Self {
            flow,
            effects: Vec::new(),
        }
    }
}

/// Applies `action` to `state` and returns the work to do next.
pub fn reduce(state: &mut AppState, action: Action, env: &dyn Environment) -> Vec<Effect> {
    let mut effects = Vec::new();

    match &action {
        Action::NetworkChanged(network) => {
            let came_online = state.network == Network::Offline && *network == Network::Online;
            state.network = *network;
            if let (true, SessionFlow::Tracking(tracking)) = (came_online, &mut state.flow) {
                info!("back online, refreshing");
                effects.extend(tracking.refresh_all());
            }
            return effects;
        }
        Action::AppWentToBackground => {
            if let Some(snapshot) = PersistedSnapshot::of(&state.flow) {
                effects.push(Effect::Fire(crate::effect::Command::SaveState {
                    key: env.config().snapshot_key.clone(),
                    snapshot,
                }));
            }
            return effects;
        }
        _ => {}
    }

    let before = state.flow.name();
    let name = action.name();
    let step = match std::mem::take(&mut state.flow) {
        SessionFlow::Created => match action {
            Action::OsLaunched => launching::launch(env),
            _ => Step::ignore(SessionFlow::Created, name),
        },
        SessionFlow::Launching(l) => launching::reduce(l, action, env),
        SessionFlow::NoMotionServices => Step::ignore(SessionFlow::NoMotionServices, name),
        SessionFlow::SigningIn(s) => sign_in::reduce(s, action, env),
        SessionFlow::RegisteringDriver(r) => registration::reduce(r, action, env),
        SessionFlow::Tracking(t) => tracking::reduce(t, action, env),
    };
    state.flow = step.flow;
    effects.extend(step.effects);

    if state.flow.name() != before {
        info!(from = before, to = state.flow.name(), action = name, "flow changed");
    }
    effects
}
