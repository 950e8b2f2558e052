//! Launch: wait for the snapshot and the trackability check, then resume.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::Action;
use crate::deep_link::{self, DeepLink, DeepLinkWait};
use crate::effect::{Command, Effect, EffectId};
use crate::environment::Environment;
use crate::flow::{EditingStatus, SessionFlow, SignInState, Step};
use crate::registration::Registration;
use crate::restoration::PersistedSnapshot;
use crate::sdk::{SdkState, UntrackableReason};
use crate::tracking::Tracking;
use crate::types::{DriverId, PublishableKey};
use crate::visits::Visits;

/// A tracking session from the snapshot, held while its SDK comes up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredSession {
    pub visits: Visits,
    pub publishable_key: PublishableKey,
    pub driver_id: DriverId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Launching {
    /// Outer `None` until the load finished.
    pub snapshot: Option<Option<PersistedSnapshot>>,
    pub trackability: Option<Option<UntrackableReason>>,
    /// Latest deep link delivered before the flow was restored.
    pub deep_link: Option<DeepLink>,
    pub restoring: Option<RestoredSession>,
}

pub(crate) fn launch(env: &dyn Environment) -> Step {
    info!("launching");
    Step::stay(
        SessionFlow::Launching(Launching::default()),
        vec![
            Effect::track(EffectId::NetworkUpdates, Command::SubscribeToNetworkUpdates),
            Effect::track(EffectId::DeepLinkUpdates, Command::SubscribeToDeepLinks),
            Effect::Fire(Command::CheckTrackability),
            Effect::Fire(Command::LoadState {
                key: env.config().snapshot_key.clone(),
            }),
        ],
    )
}

pub(crate) fn reduce(mut launching: Launching, action: Action, env: &dyn Environment) -> Step {
    match action {
        Action::TrackabilityChecked(reason) if launching.trackability.is_none() => {
            launching.trackability = Some(reason);
            resolve(launching, env)
        }
        Action::SnapshotLoaded(result) if launching.snapshot.is_none() => {
            let snapshot = result.unwrap_or_else(|error| {
                warn!(%error, "snapshot could not be restored, starting fresh");
                None
            });
            launching.snapshot = Some(snapshot);
            resolve(launching, env)
        }
        Action::DeepLinkReceived(link) => {
            launching.deep_link = Some(link);
            Step::stay(SessionFlow::Launching(launching), Vec::new())
        }
        Action::SdkInitialized(sdk) if launching.restoring.is_some() => {
            sdk_initialized(launching, sdk, env)
        }
        other => Step::ignore(SessionFlow::Launching(launching), other.name()),
    }
}

fn resolve(launching: Launching, env: &dyn Environment) -> Step {
    let (Some(snapshot), Some(trackability)) = (&launching.snapshot, &launching.trackability)
    else {
        return Step::stay(SessionFlow::Launching(launching), Vec::new());
    };
    if let Some(reason) = trackability {
        warn!(?reason, "device cannot track");
        return restored(SessionFlow::NoMotionServices, Vec::new());
    }
    let config = env.config();
    let pending = launching.deep_link.clone();
    let wait_for = |link: Option<DeepLink>| match link {
        Some(link) => deep_link::link_received(link, config),
        None => (DeepLinkWait::WaitingForDeepLink, vec![deep_link::start_timer(config)]),
    };

    match snapshot.clone() {
        None | Some(PersistedSnapshot::DeepLinkPending) => {
            let (wait, effects) = wait_for(pending);
            restored(
                SessionFlow::SigningIn(SignInState::Editing {
                    email: None,
                    password: None,
                    status: Some(EditingStatus::DeepLink(wait)),
                }),
                effects,
            )
        }
        Some(PersistedSnapshot::SignIn { email }) => {
            let (status, effects) = match pending {
                Some(link) => {
                    let (wait, effects) = deep_link::link_received(link, config);
                    (Some(EditingStatus::DeepLink(wait)), effects)
                }
                None => (None, Vec::new()),
            };
            restored(
                SessionFlow::SigningIn(SignInState::Editing {
                    email,
                    password: None,
                    status,
                }),
                effects,
            )
        }
        Some(PersistedSnapshot::Driver {
            driver_id,
            publishable_key,
            manual_visits,
        }) => {
            let (wait, effects) = match pending {
                Some(link) => {
                    let (wait, effects) = deep_link::link_received(link, config);
                    (Some(wait), effects)
                }
                None => (None, Vec::new()),
            };
            restored(
                SessionFlow::RegisteringDriver(Registration {
                    driver_id,
                    publishable_key,
                    manual_visits,
                    deep_link: wait,
                }),
                effects,
            )
        }
        Some(PersistedSnapshot::Visits {
            visits,
            publishable_key,
            driver_id,
        }) => {
            let make_sdk =
                Effect::track(EffectId::MakeSdk, Command::MakeSdk(publishable_key.clone()));
            let launching = Launching {
                restoring: Some(RestoredSession {
                    visits,
                    publishable_key,
                    driver_id,
                }),
                ..launching
            };
            Step::stay(SessionFlow::Launching(launching), vec![make_sdk])
        }
    }
}

fn sdk_initialized(mut launching: Launching, sdk: SdkState, env: &dyn Environment) -> Step {
    let Some(session) = launching.restoring.take() else {
        return Step::stay(SessionFlow::Launching(launching), Vec::new());
    };
    match sdk {
        SdkState::Locked => {
            warn!("sdk locked while restoring");
            restored(SessionFlow::NoMotionServices, Vec::new())
        }
        SdkState::Unlocked { device_id, status } => {
            let mut visits = session.visits;
            visits.filter_out_old(env.now(), env.config().visit_staleness_ms);
            let mut tracking = Tracking::new(
                visits,
                session.publishable_key,
                session.driver_id,
                device_id,
                status,
            );
            let mut effects = vec![Effect::Fire(Command::SetDriverId(tracking.driver_id.clone()))];
            if let Some(link) = launching.deep_link {
                let (wait, timer) = deep_link::link_received(link, env.config());
                tracking.deep_link = Some(wait);
                effects.extend(timer);
            }
            restored(SessionFlow::Tracking(Box::new(tracking)), effects)
        }
    }
}

/// Every resolved launch ends with the restored signal.
fn restored(flow: SessionFlow, mut effects: Vec<Effect>) -> Step {
    info!(flow = flow.name(), "state restored");
    effects.push(Effect::Send(Action::StateRestored));
    Step::stay(flow, effects)
}
