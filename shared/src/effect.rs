//! Effects are plain data. The reducer returns them; a [`Store`](crate::store::Store)
//! turns them into shell work and keeps the cancellation registry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::action::Action;
use crate::orders::OrderAction;
use crate::requests::RequestKind;
use crate::restoration::PersistedSnapshot;
use crate::types::{
    AccessToken, Address, Coordinate, DeviceId, DriverId, Email, Password, PublishableKey,
    VisitId,
};
use crate::visits::Geotag;

/// Stable identity of a cancellable effect. Issuing a tracked effect under an
/// id that is already registered cancels the previous one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectId {
    Request(RequestKind),
    Order(VisitId),
    RefreshToken,
    SignIn,
    MakeSdk,
    DeepLinkTimer,
    SdkStatusUpdates,
    DeepLinkUpdates,
    NetworkUpdates,
}

impl EffectId {
    /// Streams deliver many results and stay registered until cancelled.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(
            self,
            Self::DeepLinkTimer | Self::SdkStatusUpdates | Self::DeepLinkUpdates | Self::NetworkUpdates
        )
    }

    /// Every id owned by the request engine, in cancellation order.
    pub fn request_group() -> impl Iterator<Item = Self> {
        RequestKind::ALL
            .into_iter()
            .map(Self::Request)
            .chain(std::iter::once(Self::RefreshToken))
    }
}

/// Work for the outside world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SignIn {
        email: Email,
        password: Password,
    },

    MakeSdk(PublishableKey),
    SubscribeToStatusUpdates,
    SetDriverId(DriverId),
    StartTracking,
    StopTracking,
    OpenSettings,
    RequestLocationPermissions,
    RequestMotionPermissions,
    CheckTrackability,
    AddGeotag(Geotag),

    RefreshToken {
        publishable_key: PublishableKey,
        device_id: DeviceId,
    },
    Fetch {
        kind: RequestKind,
        token: AccessToken,
        device_id: DeviceId,
        publishable_key: PublishableKey,
    },
    OrderAction {
        action: OrderAction,
        visit_id: VisitId,
        token: AccessToken,
        device_id: DeviceId,
    },

    ContinueUserActivity(String),
    CheckForDeepLink,
    SubscribeToDeepLinks,

    StartTimer(Duration),

    LoadState {
        key: String,
    },
    SaveState {
        key: String,
        snapshot: PersistedSnapshot,
    },

    SubscribeToNetworkUpdates,

    Haptic,
    CopyToPasteboard(String),
    OpenMap {
        coordinate: Coordinate,
        address: Address,
    },
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::MakeSdk(_) => "make_sdk",
            Self::SubscribeToStatusUpdates => "subscribe_to_status_updates",
            Self::SetDriverId(_) => "set_driver_id",
            Self::StartTracking => "start_tracking",
            Self::StopTracking => "stop_tracking",
            Self::OpenSettings => "open_settings",
            Self::RequestLocationPermissions => "request_location_permissions",
            Self::RequestMotionPermissions => "request_motion_permissions",
            Self::CheckTrackability => "check_trackability",
            Self::AddGeotag(_) => "add_geotag",
            Self::RefreshToken { .. } => "refresh_token",
            Self::Fetch { .. } => "fetch",
            Self::OrderAction { .. } => "order_action",
            Self::ContinueUserActivity(_) => "continue_user_activity",
            Self::CheckForDeepLink => "check_for_deep_link",
            Self::SubscribeToDeepLinks => "subscribe_to_deep_links",
            Self::StartTimer(_) => "start_timer",
            Self::LoadState { .. } => "load_state",
            Self::SaveState { .. } => "save_state",
            Self::SubscribeToNetworkUpdates => "subscribe_to_network_updates",
            Self::Haptic => "haptic",
            Self::CopyToPasteboard(_) => "copy_to_pasteboard",
            Self::OpenMap { .. } => "open_map",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Untracked: cannot be cancelled, its result (if any) is always applied.
    Fire(Command),
    Track { id: EffectId, command: Command },
    Cancel(EffectId),
    /// Feed an action straight back into the reducer.
    Send(Action),
}

impl Effect {
    #[must_use]
    pub fn track(id: EffectId, command: Command) -> Self {
        Self::Track { id, command }
    }

    #[must_use]
    pub fn command(&self) -> Option<&Command> {
        match self {
            Self::Fire(command) | Self::Track { command, .. } => Some(command),
            Self::Cancel(_) | Self::Send(_) => None,
        }
    }
}
