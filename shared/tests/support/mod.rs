#![allow(dead_code)]

use shared::action::Action;
use shared::effect::{Command, EffectId};
use shared::fetched::{Fetched, History, Profile};
use shared::requests::RequestKind;
use shared::restoration::PersistedSnapshot;
use shared::sdk::{SdkState, SdkStatus};
use shared::tracking::Tracking;
use shared::types::{
    AccessToken, Address, Coordinate, DeviceId, DriverId, PublishableKey, UnixTimeMs, VisitId,
};
use shared::visits::{AssignedVisit, VisitSource};
use shared::{Dispatch, FixedEnvironment, SessionFlow, Store, Ticket};

pub const NOW: UnixTimeMs = UnixTimeMs(1_700_000_000_000);
pub const HOUR: u64 = 60 * 60 * 1000;

pub type TestStore = Store<FixedEnvironment>;

pub fn store() -> TestStore {
    Store::new(FixedEnvironment::new(NOW))
}

pub fn pk(s: &str) -> PublishableKey {
    PublishableKey::new(s)
}

pub fn unlocked(device: &str) -> SdkState {
    SdkState::Unlocked {
        device_id: DeviceId::new(device),
        status: SdkStatus::default(),
    }
}

pub fn commands(dispatches: &[Dispatch]) -> Vec<&Command> {
    dispatches
        .iter()
        .filter_map(|d| match d {
            Dispatch::Run { command, .. } => Some(command),
            Dispatch::Abort(_) => None,
        })
        .collect()
}

pub fn count(dispatches: &[Dispatch], name: &str) -> usize {
    commands(dispatches)
        .into_iter()
        .filter(|c| c.name() == name)
        .count()
}

pub fn fetched_kinds(dispatches: &[Dispatch]) -> Vec<RequestKind> {
    commands(dispatches)
        .into_iter()
        .filter_map(|c| match c {
            Command::Fetch { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

pub fn aborted(dispatches: &[Dispatch]) -> Vec<EffectId> {
    dispatches
        .iter()
        .filter_map(|d| match d {
            Dispatch::Abort(ticket) => Some(ticket.id.clone()),
            Dispatch::Run { .. } => None,
        })
        .collect()
}

/// Ticket of the first tracked run of `name`.
pub fn ticket(dispatches: &[Dispatch], name: &str) -> Ticket {
    dispatches
        .iter()
        .find_map(|d| match d {
            Dispatch::Run {
                ticket: Some(ticket),
                command,
            } if command.name() == name => Some(ticket.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no tracked {name} in {dispatches:#?}"))
}

pub fn fetch_ticket(dispatches: &[Dispatch], kind: RequestKind) -> Ticket {
    dispatches
        .iter()
        .find_map(|d| match d {
            Dispatch::Run {
                ticket: Some(ticket),
                command: Command::Fetch { kind: k, .. },
            } if *k == kind => Some(ticket.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no fetch of {kind:?}"))
}

pub fn empty(kind: RequestKind) -> Fetched {
    match kind {
        RequestKind::History => Fetched::History(History::default()),
        RequestKind::Trip => Fetched::Trip(None),
        RequestKind::Places => Fetched::Places(Vec::new()),
        RequestKind::Profile => Fetched::Profile(Profile::default()),
        RequestKind::Visits => Fetched::Visits(Vec::new()),
        RequestKind::Team => Fetched::Team(Vec::new()),
        RequestKind::Integrations => Fetched::Integrations(Vec::new()),
    }
}

pub fn assigned(id: &str, created_at: UnixTimeMs) -> AssignedVisit {
    AssignedVisit::new(
        VisitId::new(id),
        created_at,
        VisitSource::Geofence,
        Coordinate::new(37.77, -122.41).unwrap(),
        Address::new(Some("1 Main St".into()), None),
    )
}

pub fn tracking(store: &TestStore) -> &Tracking {
    store
        .state()
        .flow
        .tracking()
        .unwrap_or_else(|| panic!("not tracking: {}", store.state().flow.name()))
}

/// Launches into a restored driver registration and brings the SDK up.
/// Returns the dispatches of entering tracking: the token refresh is in
/// flight and every kind is wanted.
pub fn launch_into_tracking(store: &mut TestStore, manual_visits: bool) -> Vec<Dispatch> {
    store.dispatch(Action::OsLaunched);
    store.dispatch(Action::TrackabilityChecked(None));
    store.dispatch(Action::SnapshotLoaded(Ok(Some(PersistedSnapshot::Driver {
        driver_id: Some(DriverId::new("driver")),
        publishable_key: pk("pk"),
        manual_visits: Some(manual_visits),
    }))));
    let out = store.dispatch(Action::RegisterDriverTapped);
    let make_sdk = ticket(&out, "make_sdk");
    let out = store.settle(Some(make_sdk), Action::SdkInitialized(unlocked("device")));
    assert!(matches!(store.state().flow, SessionFlow::Tracking(_)));
    out
}

/// Tracking with a valid token and every request of the first refresh
/// answered.
pub fn idle_tracking(store: &mut TestStore, manual_visits: bool) {
    let out = launch_into_tracking(store, manual_visits);
    let refresh = ticket(&out, "refresh_token");
    let out = store.settle(
        Some(refresh),
        Action::TokenRefreshed(Ok(AccessToken::new("token"))),
    );
    for kind in RequestKind::ALL {
        let t = fetch_ticket(&out, kind);
        store.settle(
            Some(t),
            Action::RequestCompleted {
                kind,
                result: Ok(empty(kind)),
            },
        );
    }
    assert!(tracking(store).requests.is_idle());
}

/// Tracking with `visits` fetched.
pub fn tracking_with_visits(store: &mut TestStore, visits: Vec<AssignedVisit>) {
    idle_tracking(store, false);
    let out = store.dispatch(Action::UpdateVisits);
    let t = fetch_ticket(&out, RequestKind::Visits);
    store.settle(
        Some(t),
        Action::RequestCompleted {
            kind: RequestKind::Visits,
            result: Ok(Fetched::Visits(visits)),
        },
    );
}
