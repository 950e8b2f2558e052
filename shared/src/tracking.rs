//! The working session: visits, the SDK and the background requests.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::deep_link::{self, DeepLink, DeepLinkWait, ResolvedLink, TimerOutcome};
use crate::effect::{Command, Effect, EffectId};
use crate::environment::Environment;
use crate::error::{ApiError, AppError, ErrorKind};
use crate::fetched::{Fetched, History, Integration, Place, Profile, TeamMember, Trip};
use crate::flow::{SessionFlow, SignInState, Step};
use crate::orders::{OrderAction, PendingOrderAction};
use crate::requests::{Credentials, RequestKind, Requests, Reverted};
use crate::sdk::{SdkState, SdkStatus};
use crate::types::{AccessToken, DeviceId, DriverId, PublishableKey, UnixTimeMs, VisitId};
use crate::visits::{apply_transition, GeotagKind, ManualVisit, Visits};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub visits: Visits,
    pub publishable_key: PublishableKey,
    pub driver_id: DriverId,
    pub device_id: DeviceId,
    pub sdk: SdkStatus,
    pub requests: Requests,
    pub deep_link: Option<DeepLinkWait>,

    pub history: Option<History>,
    pub trip: Option<Trip>,
    pub places: Vec<Place>,
    pub profile: Option<Profile>,
    pub team: Vec<TeamMember>,
    pub integrations: Vec<Integration>,
    /// Failure the user has to acknowledge.
    pub alert: Option<AppError>,
}

impl Tracking {
    #[must_use]
    pub fn new(
        visits: Visits,
        publishable_key: PublishableKey,
        driver_id: DriverId,
        device_id: DeviceId,
        sdk: SdkStatus,
    ) -> Self {
        Self {
            visits,
            publishable_key,
            driver_id,
            device_id,
            sdk,
            requests: Requests::new(),
            deep_link: None,
            history: None,
            trip: None,
            places: Vec::new(),
            profile: None,
            team: Vec::new(),
            integrations: Vec::new(),
            alert: None,
        }
    }

    fn requests_mut(&mut self) -> (&mut Requests, Credentials<'_>) {
        (
            &mut self.requests,
            Credentials {
                publishable_key: &self.publishable_key,
                device_id: &self.device_id,
            },
        )
    }

    /// First entry after the SDK came up for this identity.
    pub(crate) fn start(&mut self) -> Vec<Effect> {
        info!(driver_id = %self.driver_id, device_id = %self.device_id, "tracking");
        let mut effects = vec![
            Effect::Fire(Command::SetDriverId(self.driver_id.clone())),
            Effect::track(EffectId::SdkStatusUpdates, Command::SubscribeToStatusUpdates),
            Effect::Fire(Command::StartTracking),
        ];
        effects.extend(self.refresh_all());
        effects
    }

    /// Re-issues every wanted kind. Nothing is issued while the SDK is being
    /// rebuilt for another account; the rebuild starts its own refresh.
    pub fn refresh_all(&mut self) -> Vec<Effect> {
        if self.rebuilding_sdk() {
            debug!("sdk rebuilding, refresh deferred");
            return Vec::new();
        }
        let (requests, creds) = self.requests_mut();
        requests.refresh_all(creds)
    }

    /// Credentials are stale until the SDK for the new key comes up.
    #[must_use]
    pub fn rebuilding_sdk(&self) -> bool {
        self.deep_link
            .as_ref()
            .is_some_and(DeepLinkWait::is_waiting_for_sdk)
    }

    /// Stops every request and puts visits with an outstanding order action
    /// back to their previous status.
    fn cancel_requests(&mut self) -> Vec<Effect> {
        let (effects, reverted) = self.requests.cancel_all();
        self.revert_orders(reverted);
        effects
    }

    fn revert_orders(&mut self, reverted: Reverted) {
        for (visit_id, previous) in reverted {
            if let Some(visit) = self.visits.assigned_mut(&visit_id) {
                visit.order = previous;
            }
        }
    }

    fn transition(&mut self, kind: GeotagKind, now: UnixTimeMs) -> Vec<Effect> {
        let Some(stop) = self.visits.selected_mut() else {
            debug!(kind = kind.as_str(), "no visit selected");
            return Vec::new();
        };
        match apply_transition(stop, kind, now) {
            Some(geotag) => {
                info!(visit_id = %geotag.visit_id, kind = kind.as_str(), "geotag");
                vec![
                    Effect::Fire(Command::AddGeotag(geotag)),
                    Effect::Fire(Command::Haptic),
                ]
            }
            None => Vec::new(),
        }
    }

    fn start_order(&mut self, action: OrderAction) -> Vec<Effect> {
        let Some(visit) = self.visits.selected_assigned() else {
            debug!(action = action.as_str(), "no assigned visit selected");
            return Vec::new();
        };
        let visit_id = visit.id.clone();
        let previous = visit.order;
        if !previous.accepts(action) || self.requests.pending_order(&visit_id).is_some() {
            debug!(%visit_id, ?previous, action = action.as_str(), "order action rejected");
            return Vec::new();
        }
        if let Some(visit) = self.visits.assigned_mut(&visit_id) {
            visit.order = action.in_progress();
        }
        let (requests, creds) = self.requests_mut();
        requests.issue_order(&visit_id, PendingOrderAction { action, previous }, creds)
    }

    fn order_completed(
        &mut self,
        visit_id: &VisitId,
        action: OrderAction,
        result: Result<(), ApiError>,
    ) -> Vec<Effect> {
        if self
            .requests
            .pending_order(visit_id)
            .map_or(true, |pending| pending.action != action)
        {
            debug!(%visit_id, action = action.as_str(), "stale order result");
            return Vec::new();
        }
        match result {
            Ok(()) => {
                self.requests.order_completed(visit_id);
                if let Some(visit) = self.visits.assigned_mut(visit_id) {
                    visit.order = action.completed();
                }
                Vec::new()
            }
            Err(error) => {
                let (requests, creds) = self.requests_mut();
                let (effects, reverted) = requests.order_failed(visit_id, &error, creds);
                if let Some(pending) = reverted {
                    warn!(%visit_id, %error, action = action.as_str(), "order action failed");
                    self.revert_orders(vec![(visit_id.clone(), pending.previous)]);
                    self.alert = Some(error.into());
                }
                effects
            }
        }
    }

    fn request_completed(
        &mut self,
        kind: RequestKind,
        result: Result<Fetched, ApiError>,
        env: &dyn Environment,
    ) -> Vec<Effect> {
        if !self.requests.is_pending(kind) {
            debug!(kind = kind.as_str(), "result for a request no longer wanted");
            return Vec::new();
        }
        match result {
            Ok(fetched) if fetched.kind() == kind => {
                self.requests.request_completed(kind);
                self.absorb(fetched, env);
                Vec::new()
            }
            Ok(fetched) => {
                warn!(
                    expected = kind.as_str(),
                    got = fetched.kind().as_str(),
                    "mismatched fetch result"
                );
                self.requests.request_completed(kind);
                Vec::new()
            }
            Err(error) => {
                let (requests, creds) = self.requests_mut();
                requests.request_failed(kind, &error, creds)
            }
        }
    }

    fn absorb(&mut self, fetched: Fetched, env: &dyn Environment) {
        let staleness = env.config().visit_staleness_ms;
        match fetched {
            Fetched::Visits(visits) => {
                self.visits.merge_assigned(visits);
                self.visits.filter_out_old(env.now(), staleness);
            }
            Fetched::Trip(trip) => {
                if let Some(trip) = &trip {
                    self.visits.merge_assigned(trip.orders.iter().cloned());
                    self.visits.filter_out_old(env.now(), staleness);
                }
                self.trip = trip;
            }
            Fetched::History(history) => self.history = Some(history),
            Fetched::Places(places) => self.places = places,
            Fetched::Profile(profile) => self.profile = Some(profile),
            Fetched::Team(team) => self.team = team,
            Fetched::Integrations(integrations) => self.integrations = integrations,
        }
    }

    fn token_refreshed(
        &mut self,
        result: Result<AccessToken, ApiError>,
    ) -> Vec<Effect> {
        let (requests, creds) = self.requests_mut();
        match requests.token_refreshed(result, creds) {
            Ok(effects) => effects,
            Err((effects, reverted)) => {
                self.revert_orders(reverted);
                self.alert = Some(AppError::new(
                    ErrorKind::RefreshFailed,
                    "access token could not be refreshed",
                ));
                effects
            }
        }
    }

    /// Compares a settled deep link with the live session.
    fn resolve_link(&mut self, link: DeepLink) -> Vec<Effect> {
        let DeepLink {
            publishable_key,
            driver_id,
            manual_visits,
        } = link;
        let manual_visits = manual_visits.unwrap_or_else(|| self.visits.shows_manual_visits());
        let driver_id = driver_id.unwrap_or_else(|| self.driver_id.clone());

        if publishable_key != self.publishable_key {
            info!(%publishable_key, "deep link for another account, rebuilding sdk");
            let mut effects = self.cancel_requests();
            self.visits = std::mem::take(&mut self.visits).with_manual_visits(manual_visits);
            self.deep_link = Some(DeepLinkWait::WaitingForSdk(ResolvedLink {
                publishable_key: publishable_key.clone(),
                driver_id,
                manual_visits,
            }));
            effects.push(Effect::track(
                EffectId::MakeSdk,
                Command::MakeSdk(publishable_key),
            ));
            return effects;
        }

        let mut effects = Vec::new();
        if driver_id != self.driver_id {
            info!(%driver_id, "deep link changes driver");
            self.driver_id = driver_id.clone();
            effects.push(Effect::Fire(Command::SetDriverId(driver_id)));
        }
        if manual_visits != self.visits.shows_manual_visits() {
            info!(manual_visits, "deep link changes visit view");
            self.visits = std::mem::take(&mut self.visits).with_manual_visits(manual_visits);
        }
        if effects.is_empty() {
            debug!("deep link matches the session");
        }
        effects
    }

    fn sdk_rebuilt(
        &mut self,
        link: ResolvedLink,
        device_id: DeviceId,
        status: SdkStatus,
    ) -> Vec<Effect> {
        // Nothing issued under the old identity may survive into the new one.
        let mut effects = self.cancel_requests();
        self.publishable_key = link.publishable_key;
        self.driver_id = link.driver_id;
        self.device_id = device_id;
        self.sdk = status;
        self.deep_link = None;
        self.history = None;
        self.trip = None;
        self.places.clear();
        self.profile = None;
        self.team.clear();
        self.integrations.clear();
        effects.extend(self.start());
        effects
    }

    /// Everything that must stop when the session ends here.
    fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = self.cancel_requests();
        effects.push(Effect::Cancel(EffectId::SdkStatusUpdates));
        effects.push(Effect::Cancel(EffectId::MakeSdk));
        if self.deep_link.is_some() {
            effects.push(deep_link::cancel_timer());
        }
        effects.push(Effect::Fire(Command::StopTracking));
        effects
    }
}

pub(crate) fn reduce(mut tracking: Box<Tracking>, action: Action, env: &dyn Environment) -> Step {
    let config = env.config();
    let waiting_for_sdk = tracking.rebuilding_sdk();

    let effects = match action {
        Action::StateRestored => {
            let mut effects = vec![Effect::track(
                EffectId::SdkStatusUpdates,
                Command::SubscribeToStatusUpdates,
            )];
            effects.extend(tracking.refresh_all());
            effects
        }
        Action::UpdateVisits
        | Action::CompleteOrderTapped
        | Action::CancelOrderTapped
        | Action::SnoozeOrderTapped
        | Action::UnsnoozeOrderTapped
            if waiting_for_sdk =>
        {
            return Step::ignore(SessionFlow::Tracking(tracking), action.name());
        }
        Action::AppWentForeground | Action::RefreshAllRequests => tracking.refresh_all(),
        Action::UpdateVisits => {
            let (requests, creds) = tracking.requests_mut();
            requests.issue_if_absent(RequestKind::Visits, creds)
        }
        Action::RequestCompleted { kind, result } => {
            tracking.request_completed(kind, result, env)
        }
        Action::TokenRefreshed(result) => tracking.token_refreshed(result),
        Action::OrderActionCompleted {
            visit_id,
            action,
            result,
        } => tracking.order_completed(&visit_id, action, result),

        Action::StatusUpdated(status) => {
            tracking.sdk = status;
            Vec::new()
        }
        Action::StartTrackingTapped => {
            let mut effects = vec![Effect::Fire(Command::StartTracking)];
            effects.extend(tracking.refresh_all());
            effects
        }
        Action::StopTrackingTapped => {
            info!("tracking stopped by driver");
            let mut effects = vec![Effect::Fire(Command::StopTracking)];
            effects.extend(tracking.cancel_requests());
            effects
        }
        Action::RequestLocationPermissionsTapped => {
            vec![Effect::Fire(Command::RequestLocationPermissions)]
        }
        Action::RequestMotionPermissionsTapped => {
            vec![Effect::Fire(Command::RequestMotionPermissions)]
        }
        Action::OpenSettingsTapped => vec![Effect::Fire(Command::OpenSettings)],
        Action::SignOutTapped => {
            info!("signed out");
            let effects = tracking.shutdown();
            return Step::stay(SessionFlow::SigningIn(SignInState::default()), effects);
        }
        Action::DismissAlert => {
            tracking.alert = None;
            Vec::new()
        }

        Action::VisitSelected(id) => {
            if !tracking.visits.select(&id) {
                debug!(visit_id = %id, "unknown visit selected");
            }
            Vec::new()
        }
        Action::VisitDeselected => {
            tracking.visits.deselect();
            Vec::new()
        }
        Action::AddVisitTapped => {
            let visit = ManualVisit::new(env.new_visit_id(), env.now());
            let visit_id = visit.id.clone();
            if tracking.visits.add_manual(visit) {
                info!(%visit_id, "manual visit added");
            } else {
                debug!("manual visits are hidden");
            }
            Vec::new()
        }
        Action::PickUpTapped => tracking.transition(GeotagKind::PickUp, env.now()),
        Action::CheckInTapped => tracking.transition(GeotagKind::CheckIn, env.now()),
        Action::CheckOutTapped => tracking.transition(GeotagKind::CheckOut, env.now()),
        Action::CancelVisitTapped => tracking.transition(GeotagKind::Cancel, env.now()),
        Action::DeliveryNoteChanged(note) => {
            if let Some(stop) = tracking.visits.selected_mut() {
                stop.set_delivery_note(note);
            }
            Vec::new()
        }
        Action::NoteFieldFocused => {
            if let Some(stop) = tracking.visits.selected_mut() {
                stop.set_note_field_focused(true);
            }
            Vec::new()
        }
        Action::TappedOutsideFocus => {
            if let Some(stop) = tracking.visits.selected_mut() {
                stop.set_note_field_focused(false);
            }
            Vec::new()
        }
        Action::CopyTapped(text) => vec![
            Effect::Fire(Command::CopyToPasteboard(text)),
            Effect::Fire(Command::Haptic),
        ],
        Action::OpenInMapsTapped => match tracking.visits.selected_location() {
            Some((coordinate, address)) => vec![Effect::Fire(Command::OpenMap {
                coordinate,
                address: address.clone(),
            })],
            None => Vec::new(),
        },
        tap @ (Action::CompleteOrderTapped
        | Action::CancelOrderTapped
        | Action::SnoozeOrderTapped
        | Action::UnsnoozeOrderTapped) => match tap.order_action() {
            Some(order) => tracking.start_order(order),
            None => Vec::new(),
        },

        Action::DeepLinkOpened(url) if !waiting_for_sdk => {
            let (wait, effects) = deep_link::link_opened(url, config);
            tracking.deep_link = Some(wait);
            effects
        }
        Action::PushNotificationReceived if !waiting_for_sdk => {
            let (wait, effects) = deep_link::push_received(config);
            tracking.deep_link = Some(wait);
            effects
        }
        Action::DeepLinkReceived(link) if !waiting_for_sdk => {
            let (wait, effects) = deep_link::link_received(link, config);
            tracking.deep_link = Some(wait);
            effects
        }
        Action::DeepLinkTimerFired => {
            let (wait, outcome) = deep_link::timer_fired(tracking.deep_link.take());
            tracking.deep_link = wait;
            match outcome {
                TimerOutcome::Idle => Vec::new(),
                TimerOutcome::Abandoned => vec![deep_link::cancel_timer()],
                TimerOutcome::Ready(link) => {
                    let mut effects = vec![deep_link::cancel_timer()];
                    effects.extend(tracking.resolve_link(link));
                    effects
                }
            }
        }
        Action::SdkInitialized(sdk) if waiting_for_sdk => {
            let Some(DeepLinkWait::WaitingForSdk(link)) = tracking.deep_link.take() else {
                return Step::ignore(SessionFlow::Tracking(tracking), "sdk_initialized");
            };
            match sdk {
                SdkState::Locked => {
                    warn!("sdk locked for the new account");
                    let effects = tracking.shutdown();
                    return Step::stay(SessionFlow::NoMotionServices, effects);
                }
                SdkState::Unlocked { device_id, status } => {
                    tracking.sdk_rebuilt(link, device_id, status)
                }
            }
        }

        other => return Step::ignore(SessionFlow::Tracking(tracking), other.name()),
    };
    Step::stay(SessionFlow::Tracking(tracking), effects)
}
