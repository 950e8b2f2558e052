use serde::{Deserialize, Serialize};

use crate::deep_link::DeepLink;
use crate::error::{ApiError, SignInError, SnapshotError};
use crate::fetched::Fetched;
use crate::flow::Field;
use crate::orders::OrderAction;
use crate::requests::RequestKind;
use crate::restoration::PersistedSnapshot;
use crate::sdk::{SdkState, SdkStatus, UntrackableReason};
use crate::types::{AccessToken, PublishableKey, VisitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Network {
    #[default]
    Online,
    Offline,
}

/// Every stimulus the core reacts to: user taps, lifecycle callbacks, timer
/// ticks and the results of earlier effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    // Lifecycle
    OsLaunched,
    TrackabilityChecked(Option<UntrackableReason>),
    SnapshotLoaded(Result<Option<PersistedSnapshot>, SnapshotError>),
    StateRestored,
    AppWentForeground,
    AppWentToBackground,
    NetworkChanged(Network),

    // Sign in
    EmailChanged(String),
    PasswordChanged(String),
    FocusChanged(Option<Field>),
    SignInTapped,
    CancelSignInTapped,
    SignedIn(Result<PublishableKey, SignInError>),

    // Driver registration
    DriverIdChanged(String),
    RegisterDriverTapped,
    SdkInitialized(SdkState),

    // Deep links
    DeepLinkOpened(String),
    PushNotificationReceived,
    DeepLinkReceived(DeepLink),
    DeepLinkTimerFired,

    // Tracking
    StatusUpdated(SdkStatus),
    StartTrackingTapped,
    StopTrackingTapped,
    RequestLocationPermissionsTapped,
    RequestMotionPermissionsTapped,
    OpenSettingsTapped,
    SignOutTapped,
    DismissAlert,

    // Visits
    VisitSelected(VisitId),
    VisitDeselected,
    AddVisitTapped,
    PickUpTapped,
    CheckInTapped,
    CheckOutTapped,
    CancelVisitTapped,
    DeliveryNoteChanged(String),
    NoteFieldFocused,
    TappedOutsideFocus,
    CopyTapped(String),
    OpenInMapsTapped,

    // Orders
    CompleteOrderTapped,
    CancelOrderTapped,
    SnoozeOrderTapped,
    UnsnoozeOrderTapped,
    OrderActionCompleted {
        visit_id: VisitId,
        action: OrderAction,
        result: Result<(), ApiError>,
    },

    // Requests
    UpdateVisits,
    RefreshAllRequests,
    RequestCompleted {
        kind: RequestKind,
        result: Result<Fetched, ApiError>,
    },
    TokenRefreshed(Result<AccessToken, ApiError>),
}

impl Action {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OsLaunched => "os_launched",
            Self::TrackabilityChecked(_) => "trackability_checked",
            Self::SnapshotLoaded(_) => "snapshot_loaded",
            Self::StateRestored => "state_restored",
            Self::AppWentForeground => "app_went_foreground",
            Self::AppWentToBackground => "app_went_to_background",
            Self::NetworkChanged(_) => "network_changed",
            Self::EmailChanged(_) => "email_changed",
            Self::PasswordChanged(_) => "password_changed",
            Self::FocusChanged(_) => "focus_changed",
            Self::SignInTapped => "sign_in_tapped",
            Self::CancelSignInTapped => "cancel_sign_in_tapped",
            Self::SignedIn(_) => "signed_in",
            Self::DriverIdChanged(_) => "driver_id_changed",
            Self::RegisterDriverTapped => "register_driver_tapped",
            Self::SdkInitialized(_) => "sdk_initialized",
            Self::DeepLinkOpened(_) => "deep_link_opened",
            Self::PushNotificationReceived => "push_notification_received",
            Self::DeepLinkReceived(_) => "deep_link_received",
            Self::DeepLinkTimerFired => "deep_link_timer_fired",
            Self::StatusUpdated(_) => "status_updated",
            Self::StartTrackingTapped => "start_tracking_tapped",
            Self::StopTrackingTapped => "stop_tracking_tapped",
            Self::RequestLocationPermissionsTapped => "request_location_permissions_tapped",
            Self::RequestMotionPermissionsTapped => "request_motion_permissions_tapped",
            Self::OpenSettingsTapped => "open_settings_tapped",
            Self::SignOutTapped => "sign_out_tapped",
            Self::DismissAlert => "dismiss_alert",
            Self::VisitSelected(_) => "visit_selected",
            Self::VisitDeselected => "visit_deselected",
            Self::AddVisitTapped => "add_visit_tapped",
            Self::PickUpTapped => "pick_up_tapped",
            Self::CheckInTapped => "check_in_tapped",
            Self::CheckOutTapped => "check_out_tapped",
            Self::CancelVisitTapped => "cancel_visit_tapped",
            Self::DeliveryNoteChanged(_) => "delivery_note_changed",
            Self::NoteFieldFocused => "note_field_focused",
            Self::TappedOutsideFocus => "tapped_outside_focus",
            Self::CopyTapped(_) => "copy_tapped",
            Self::OpenInMapsTapped => "open_in_maps_tapped",
            Self::CompleteOrderTapped => "complete_order_tapped",
            Self::CancelOrderTapped => "cancel_order_tapped",
            Self::SnoozeOrderTapped => "snooze_order_tapped",
            Self::UnsnoozeOrderTapped => "unsnooze_order_tapped",
            Self::OrderActionCompleted { .. } => "order_action_completed",
            Self::UpdateVisits => "update_visits",
            Self::RefreshAllRequests => "refresh_all_requests",
            Self::RequestCompleted { .. } => "request_completed",
            Self::TokenRefreshed(_) => "token_refreshed",
        }
    }

    /// Actions that come straight from a person touching the screen.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::EmailChanged(_)
                | Self::PasswordChanged(_)
                | Self::FocusChanged(_)
                | Self::SignInTapped
                | Self::CancelSignInTapped
                | Self::DriverIdChanged(_)
                | Self::RegisterDriverTapped
                | Self::StartTrackingTapped
                | Self::StopTrackingTapped
                | Self::RequestLocationPermissionsTapped
                | Self::RequestMotionPermissionsTapped
                | Self::OpenSettingsTapped
                | Self::SignOutTapped
                | Self::DismissAlert
                | Self::VisitSelected(_)
                | Self::VisitDeselected
                | Self::AddVisitTapped
                | Self::PickUpTapped
                | Self::CheckInTapped
                | Self::CheckOutTapped
                | Self::CancelVisitTapped
                | Self::DeliveryNoteChanged(_)
                | Self::NoteFieldFocused
                | Self::TappedOutsideFocus
                | Self::CopyTapped(_)
                | Self::OpenInMapsTapped
                | Self::CompleteOrderTapped
                | Self::CancelOrderTapped
                | Self::SnoozeOrderTapped
                | Self::UnsnoozeOrderTapped
        )
    }

    /// Order tap to the action it starts.
    #[must_use]
    pub const fn order_action(&self) -> Option<OrderAction> {
        match self {
            Self::CompleteOrderTapped => Some(OrderAction::Complete),
            Self::CancelOrderTapped => Some(OrderAction::Cancel),
            Self::SnoozeOrderTapped => Some(OrderAction::Snooze),
            Self::UnsnoozeOrderTapped => Some(OrderAction::Unsnooze),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_initiated() {
        assert!(Action::CheckInTapped.is_user_initiated());
        assert!(!Action::DeepLinkTimerFired.is_user_initiated());
        assert!(!Action::TokenRefreshed(Err(ApiError::TokenExpired)).is_user_initiated());
    }

    #[test]
    fn serde_round_trip_keeps_results() {
        let action = Action::RequestCompleted {
            kind: RequestKind::Team,
            result: Err(ApiError::Server {
                status: 500,
                message: "boom".into(),
            }),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(serde_json::from_str::<Action>(&json).unwrap(), action);
    }
}
