//! Deep links race SDK bring-up, so they are never acted on as they arrive.
//!
//! ```text
//! (none) --opened/push--> WaitingForDeepLink --timer--> (none)
//!    |                          |
//!    +-------link---------------+--link--> WaitingForTimer(link) --timer--> compare with session
//!                                               ^      |
//!                                               +-link-+  (replaces payload, restarts timer)
//! ```
//!
//! Resolving against a session that needs a new SDK parks the wait in
//! `WaitingForSdk` until the SDK reports back. One repeating timer exists per
//! process under [`EffectId::DeepLinkTimer`], so starting it again replaces it.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::effect::{Command, Effect, EffectId};
use crate::types::{DriverId, PublishableKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLink {
    pub publishable_key: PublishableKey,
    pub driver_id: Option<DriverId>,
    pub manual_visits: Option<bool>,
}

impl DeepLink {
    #[must_use]
    pub fn new(publishable_key: PublishableKey) -> Self {
        Self {
            publishable_key,
            driver_id: None,
            manual_visits: None,
        }
    }

    #[must_use]
    pub fn with_driver_id(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    #[must_use]
    pub fn with_manual_visits(mut self, manual_visits: bool) -> Self {
        self.manual_visits = Some(manual_visits);
        self
    }
}

/// A deep link whose identity is fully known and which is waiting for the
/// SDK to come up under its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub publishable_key: PublishableKey,
    pub driver_id: DriverId,
    pub manual_visits: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLinkWait {
    WaitingForDeepLink,
    WaitingForTimer(DeepLink),
    WaitingForSdk(ResolvedLink),
}

impl DeepLinkWait {
    #[must_use]
    pub const fn is_waiting_for_sdk(&self) -> bool {
        matches!(self, Self::WaitingForSdk(_))
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedLink> {
        match self {
            Self::WaitingForSdk(link) => Some(link),
            Self::WaitingForDeepLink | Self::WaitingForTimer(_) => None,
        }
    }
}

/// A new deep link may only start or restart a wait while nothing is
/// waiting for the SDK.
#[must_use]
pub fn accepts_link(wait: Option<&DeepLinkWait>) -> bool {
    !wait.is_some_and(DeepLinkWait::is_waiting_for_sdk)
}

#[must_use]
pub fn start_timer(config: &Config) -> Effect {
    Effect::track(
        EffectId::DeepLinkTimer,
        Command::StartTimer(config.deep_link_timeout),
    )
}

#[must_use]
pub fn cancel_timer() -> Effect {
    Effect::Cancel(EffectId::DeepLinkTimer)
}

/// Begins waiting after a universal link was opened. The shell is asked to
/// hand the activity to the link resolver.
#[must_use]
pub fn link_opened(url: String, config: &Config) -> (DeepLinkWait, Vec<Effect>) {
    (
        DeepLinkWait::WaitingForDeepLink,
        vec![
            start_timer(config),
            Effect::Fire(Command::ContinueUserActivity(url)),
        ],
    )
}

/// Begins waiting after a push notification hinted at a pending deep link.
#[must_use]
pub fn push_received(config: &Config) -> (DeepLinkWait, Vec<Effect>) {
    (
        DeepLinkWait::WaitingForDeepLink,
        vec![start_timer(config), Effect::Fire(Command::CheckForDeepLink)],
    )
}

/// Holds `link` back until the timer fires again, replacing any earlier one.
#[must_use]
pub fn link_received(link: DeepLink, config: &Config) -> (DeepLinkWait, Vec<Effect>) {
    (DeepLinkWait::WaitingForTimer(link), vec![start_timer(config)])
}

/// What a timer tick means for the current wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// No link came; carry on as if none was expected.
    Abandoned,
    /// The held link is ready to be compared with the session.
    Ready(DeepLink),
    /// Nothing is waiting on the timer.
    Idle,
}

/// Consumes the wait on a timer tick. The timer is cancelled for every
/// outcome except [`TimerOutcome::Idle`].
#[must_use]
pub fn timer_fired(wait: Option<DeepLinkWait>) -> (Option<DeepLinkWait>, TimerOutcome) {
    match wait {
        Some(DeepLinkWait::WaitingForDeepLink) => (None, TimerOutcome::Abandoned),
        Some(DeepLinkWait::WaitingForTimer(link)) => (None, TimerOutcome::Ready(link)),
        other @ (Some(DeepLinkWait::WaitingForSdk(_)) | None) => (other, TimerOutcome::Idle),
    }
}
