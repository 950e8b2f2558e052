//! Crux entry point. The store decides; this module only turns its
//! dispatches into capability calls and renders.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::action::{Action, Network};
use crate::capabilities::Capabilities;
use crate::effect::{Command, EffectId};
use crate::flow::{AppState, EditingStatus, Field, SessionFlow, SignInState};
use crate::orders::OrderStatus;
use crate::sdk::{Permissions, TrackingStatus};
use crate::store::{Dispatch, Store, Ticket};
use crate::tracking::Tracking;
use crate::visits::{GeotagStatus, Stop, Visit};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Action(Action),

    /// Result of shell work, tagged with the ticket it was issued under.
    #[serde(skip)]
    Settled {
        ticket: Option<Ticket>,
        action: Box<Action>,
    },
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

#[derive(Default)]
pub struct Model {
    store: Store,
}

impl Model {
    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitView {
    pub id: String,
    pub manual: bool,
    pub status: GeotagStatus,
    pub address: Option<String>,
    pub delivery_note: String,
    pub note_field_focused: bool,
    pub order: Option<OrderStatus>,
}

impl VisitView {
    fn of(visit: &Visit) -> Self {
        let assigned = visit.as_assigned();
        Self {
            id: visit.id().to_string(),
            manual: visit.is_manual(),
            status: visit.geotag(),
            address: visit.address().display_line().map(str::to_owned),
            delivery_note: visit.delivery_note().to_owned(),
            note_field_focused: visit.note_field_focused(),
            order: assigned.map(|a| a.order),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingView {
    pub driver_id: String,
    pub tracking: TrackingStatus,
    pub permissions: Permissions,
    pub visits: Vec<VisitView>,
    pub selected: Option<String>,
    pub manual_visits: bool,
    pub refreshing: bool,
    pub waiting_for_deep_link: bool,
    pub alert: Option<String>,
}

impl TrackingView {
    fn of(tracking: &Tracking) -> Self {
        Self {
            driver_id: tracking.driver_id.to_string(),
            tracking: tracking.sdk.tracking,
            permissions: tracking.sdk.permissions,
            visits: tracking.visits.to_vec().iter().map(VisitView::of).collect(),
            selected: tracking.visits.selected_id().map(ToString::to_string),
            manual_visits: tracking.visits.shows_manual_visits(),
            refreshing: !tracking.requests.is_idle(),
            waiting_for_deep_link: tracking.deep_link.is_some(),
            alert: tracking.alert.as_ref().map(|a| a.user_facing_message()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Screen {
    Loading,
    NoMotionServices,
    SignIn {
        email: String,
        password_entered: bool,
        focused: Option<Field>,
        error: Option<String>,
        waiting_for_deep_link: bool,
        signing_in: bool,
    },
    DriverId {
        driver_id: String,
        waiting_for_deep_link: bool,
        registering: bool,
    },
    Tracking(TrackingView),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub screen: Screen,
    pub online: bool,
}

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let dispatches = match event {
            Event::Action(action) => model.store.dispatch(action),
            Event::Settled { ticket, action } => model.store.settle(ticket, *action),
        };
        for dispatch in dispatches {
            match dispatch {
                Dispatch::Run { ticket, command } => run(caps, ticket, command),
                Dispatch::Abort(ticket) => abort(caps, &ticket),
            }
        }
        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let state = model.state();
        let screen = match &state.flow {
            SessionFlow::Created | SessionFlow::Launching(_) => Screen::Loading,
            SessionFlow::NoMotionServices => Screen::NoMotionServices,
            SessionFlow::SigningIn(SignInState::Editing {
                email,
                password,
                status,
            }) => Screen::SignIn {
                email: email.as_ref().map(ToString::to_string).unwrap_or_default(),
                password_entered: password.is_some(),
                focused: match status {
                    Some(EditingStatus::Focused(field)) => Some(*field),
                    _ => None,
                },
                error: match status {
                    Some(EditingStatus::Error(message)) => Some(message.clone()),
                    _ => None,
                },
                waiting_for_deep_link: status.as_ref().is_some_and(EditingStatus::is_deep_link),
                signing_in: false,
            },
            SessionFlow::SigningIn(SignInState::SigningIn { email, .. }) => Screen::SignIn {
                email: email.to_string(),
                password_entered: true,
                focused: None,
                error: None,
                waiting_for_deep_link: false,
                signing_in: true,
            },
            SessionFlow::RegisteringDriver(registration) => Screen::DriverId {
                driver_id: registration
                    .driver_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                waiting_for_deep_link: registration.deep_link.is_some(),
                registering: model.store.is_pending(&EffectId::MakeSdk),
            },
            SessionFlow::Tracking(tracking) => Screen::Tracking(TrackingView::of(tracking)),
        };
        ViewModel {
            screen,
            online: state.network == Network::Online,
        }
    }
}

fn abort(caps: &Capabilities, ticket: &Ticket) {
    if ticket.id == EffectId::DeepLinkTimer {
        caps.timer.cancel(ticket.generation);
    } else {
        // Shell work can't be recalled; the store drops whatever it returns.
        trace!(id = ?ticket.id, "abandoning shell work");
    }
}

fn run(caps: &Capabilities, ticket: Option<Ticket>, command: Command) {
    debug!(command = command.name(), tracked = ticket.is_some(), "shell work");
    let timer_id = ticket.as_ref().map_or(0, |t| t.generation);
    let settled = move |action: Action| Event::Settled {
        ticket: ticket.clone(),
        action: Box::new(action),
    };

    match command {
        Command::SignIn { email, password } => {
            caps.api
                .sign_in(email, password, move |result| settled(Action::SignedIn(result)));
        }

        Command::MakeSdk(publishable_key) => {
            caps.sdk
                .make(publishable_key, move |state| settled(Action::SdkInitialized(state)));
        }
        Command::SubscribeToStatusUpdates => {
            caps.sdk
                .subscribe_to_status(move |status| settled(Action::StatusUpdated(status)));
        }
        Command::SetDriverId(driver_id) => caps.sdk.set_driver_id(driver_id),
        Command::StartTracking => caps.sdk.start_tracking(),
        Command::StopTracking => caps.sdk.stop_tracking(),
        Command::OpenSettings => caps.sdk.open_settings(),
        Command::RequestLocationPermissions => caps.sdk.request_location_permissions(),
        Command::RequestMotionPermissions => caps.sdk.request_motion_permissions(),
        Command::CheckTrackability => {
            caps.sdk
                .check_trackability(move |reason| settled(Action::TrackabilityChecked(reason)));
        }
        Command::AddGeotag(geotag) => caps.sdk.add_geotag(geotag),

        Command::RefreshToken {
            publishable_key,
            device_id,
        } => {
            caps.api.token(publishable_key, device_id, move |result| {
                settled(Action::TokenRefreshed(result))
            });
        }
        Command::Fetch {
            kind,
            token,
            device_id,
            publishable_key,
        } => {
            caps.api
                .fetch(kind, token, device_id, publishable_key, move |result| {
                    settled(Action::RequestCompleted { kind, result })
                });
        }
        Command::OrderAction {
            action,
            visit_id,
            token,
            device_id,
        } => {
            let id = visit_id.clone();
            caps.api.order(action, id, token, device_id, move |result| {
                settled(Action::OrderActionCompleted {
                    visit_id,
                    action,
                    result,
                })
            });
        }

        Command::ContinueUserActivity(url) => caps.links.continue_user_activity(url),
        Command::CheckForDeepLink => caps.links.check_for_deep_link(),
        Command::SubscribeToDeepLinks => {
            caps.links
                .subscribe(move |link| settled(Action::DeepLinkReceived(link)));
        }

        Command::StartTimer(period) => {
            caps.timer
                .start(timer_id, period, move || settled(Action::DeepLinkTimerFired));
        }

        Command::LoadState { key } => {
            caps.storage
                .load(key, move |result| settled(Action::SnapshotLoaded(result)));
        }
        Command::SaveState { key, snapshot } => caps.storage.save(key, &snapshot),

        Command::SubscribeToNetworkUpdates => {
            caps.platform
                .subscribe_to_network(move |network| settled(Action::NetworkChanged(network)));
        }
        Command::Haptic => caps.platform.haptic(),
        Command::CopyToPasteboard(text) => caps.platform.copy_to_pasteboard(text),
        Command::OpenMap {
            coordinate,
            address,
        } => caps.platform.open_map(coordinate, address),
    }
}
