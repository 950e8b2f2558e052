use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::deep_link::{self, DeepLink, DeepLinkWait, ResolvedLink, TimerOutcome};
use crate::effect::{Command, Effect, EffectId};
use crate::environment::Environment;
use crate::flow::{SessionFlow, Step};
use crate::sdk::SdkState;
use crate::tracking::Tracking;
use crate::types::{DriverId, PublishableKey};
use crate::visits::Visits;

/// Signed in to a business account, waiting for the driver to identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub driver_id: Option<DriverId>,
    pub publishable_key: PublishableKey,
    pub manual_visits: Option<bool>,
    pub deep_link: Option<DeepLinkWait>,
}

impl Registration {
    #[must_use]
    pub fn new(publishable_key: PublishableKey) -> Self {
        Self {
            driver_id: None,
            publishable_key,
            manual_visits: None,
            deep_link: None,
        }
    }

    /// Registration for a resolved deep link. A link that names the driver
    /// brings the SDK up straight away.
    #[must_use]
    pub fn from_deep_link(link: DeepLink) -> (Self, Option<Effect>) {
        let mut registration = Self::new(link.publishable_key.clone());
        let effect = registration.apply_link(link);
        (registration, effect)
    }

    /// Takes over the key and flag of `link`; a missing field keeps the
    /// current value.
    fn apply_link(&mut self, link: DeepLink) -> Option<Effect> {
        self.publishable_key = link.publishable_key;
        if link.manual_visits.is_some() {
            self.manual_visits = link.manual_visits;
        }
        let driver_id = link.driver_id?;
        info!(%driver_id, "deep link names the driver, making sdk");
        self.driver_id = Some(driver_id.clone());
        self.deep_link = Some(DeepLinkWait::WaitingForSdk(ResolvedLink {
            publishable_key: self.publishable_key.clone(),
            driver_id,
            manual_visits: self.manual_visits.unwrap_or(false),
        }));
        Some(make_sdk(&self.publishable_key))
    }
}

fn make_sdk(publishable_key: &PublishableKey) -> Effect {
    Effect::track(EffectId::MakeSdk, Command::MakeSdk(publishable_key.clone()))
}

pub(crate) fn reduce(mut registration: Registration, action: Action, env: &dyn Environment) -> Step {
    let config = env.config();
    let waiting_for_sdk = registration
        .deep_link
        .as_ref()
        .is_some_and(DeepLinkWait::is_waiting_for_sdk);

    match action {
        Action::DriverIdChanged(text) if !waiting_for_sdk => {
            let trimmed = text.trim();
            registration.driver_id = (!trimmed.is_empty()).then(|| DriverId::new(trimmed));
            Step::stay(SessionFlow::RegisteringDriver(registration), Vec::new())
        }
        Action::RegisterDriverTapped if !waiting_for_sdk => {
            let effects = match &registration.driver_id {
                Some(driver_id) => {
                    info!(%driver_id, "registering driver");
                    vec![make_sdk(&registration.publishable_key)]
                }
                None => {
                    debug!("register tapped without a driver id");
                    Vec::new()
                }
            };
            Step::stay(SessionFlow::RegisteringDriver(registration), effects)
        }
        Action::SdkInitialized(SdkState::Locked) => {
            warn!("sdk locked, motion services unavailable");
            let effects = registration
                .deep_link
                .is_some()
                .then(deep_link::cancel_timer)
                .into_iter()
                .collect();
            Step::stay(SessionFlow::NoMotionServices, effects)
        }
        Action::SdkInitialized(SdkState::Unlocked { device_id, status }) => {
            let (publishable_key, driver_id, manual_visits, carried) = match registration.deep_link
            {
                Some(DeepLinkWait::WaitingForSdk(link)) => {
                    (link.publishable_key, link.driver_id, link.manual_visits, None)
                }
                wait => match registration.driver_id.take() {
                    Some(driver_id) => (
                        registration.publishable_key.clone(),
                        driver_id,
                        registration.manual_visits.unwrap_or(false),
                        wait,
                    ),
                    None => {
                        registration.deep_link = wait;
                        return Step::ignore(
                            SessionFlow::RegisteringDriver(registration),
                            "sdk_initialized",
                        );
                    }
                },
            };
            let mut tracking = Tracking::new(
                Visits::empty(manual_visits),
                publishable_key,
                driver_id,
                device_id,
                status,
            );
            // A wait still racing its timer carries over and resolves in tracking.
            tracking.deep_link = carried;
            let effects = tracking.start();
            Step::stay(SessionFlow::Tracking(Box::new(tracking)), effects)
        }

        Action::DeepLinkOpened(url) if !waiting_for_sdk => {
            let (wait, effects) = deep_link::link_opened(url, config);
            registration.deep_link = Some(wait);
            Step::stay(SessionFlow::RegisteringDriver(registration), effects)
        }
        Action::PushNotificationReceived if !waiting_for_sdk => {
            let (wait, effects) = deep_link::push_received(config);
            registration.deep_link = Some(wait);
            Step::stay(SessionFlow::RegisteringDriver(registration), effects)
        }
        Action::DeepLinkReceived(link) if !waiting_for_sdk => {
            let (wait, effects) = deep_link::link_received(link, config);
            registration.deep_link = Some(wait);
            Step::stay(SessionFlow::RegisteringDriver(registration), effects)
        }
        Action::DeepLinkTimerFired => {
            let (wait, outcome) = deep_link::timer_fired(registration.deep_link.take());
            registration.deep_link = wait;
            let effects = match outcome {
                TimerOutcome::Idle => {
                    return Step::ignore(
                        SessionFlow::RegisteringDriver(registration),
                        "deep_link_timer_fired",
                    );
                }
                TimerOutcome::Abandoned => vec![deep_link::cancel_timer()],
                TimerOutcome::Ready(link) => {
                    let mut effects = vec![deep_link::cancel_timer()];
                    effects.extend(registration.apply_link(link));
                    effects
                }
            };
            Step::stay(SessionFlow::RegisteringDriver(registration), effects)
        }
        other => Step::ignore(SessionFlow::RegisteringDriver(registration), other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_without_driver_keeps_typed_driver_id() {
        let mut registration = Registration::new(PublishableKey::new("old"));
        registration.driver_id = Some(DriverId::new("typed"));
        let effect = registration.apply_link(DeepLink::new(PublishableKey::new("new")));
        assert!(effect.is_none());
        assert_eq!(registration.publishable_key, PublishableKey::new("new"));
        assert_eq!(registration.driver_id, Some(DriverId::new("typed")));
        assert_eq!(registration.deep_link, None);
    }

    #[test]
    fn link_with_driver_waits_for_sdk() {
        let link = DeepLink::new(PublishableKey::new("pk"))
            .with_driver_id(DriverId::new("d"))
            .with_manual_visits(true);
        let (registration, effect) = Registration::from_deep_link(link);
        assert_eq!(
            effect,
            Some(Effect::track(
                EffectId::MakeSdk,
                Command::MakeSdk(PublishableKey::new("pk"))
            ))
        );
        assert_eq!(
            registration.deep_link,
            Some(DeepLinkWait::WaitingForSdk(ResolvedLink {
                publishable_key: PublishableKey::new("pk"),
                driver_id: DriverId::new("d"),
                manual_visits: true,
            }))
        );
    }
}
