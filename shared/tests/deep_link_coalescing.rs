mod support;

use shared::action::Action;
use shared::deep_link::{DeepLink, DeepLinkWait, ResolvedLink};
use shared::effect::{Command, EffectId};
use shared::flow::{EditingStatus, SignInState};
use shared::sdk::SdkState;
use shared::types::{DriverId, PublishableKey};
use shared::{Dispatch, SessionFlow, Ticket};
use support::*;

struct Waiting {
    store: TestStore,
    links: Ticket,
    timer: Ticket,
}

/// Fresh install: signed out and waiting for a deep link.
fn waiting() -> Waiting {
    let mut store = store();
    let launched = store.dispatch(Action::OsLaunched);
    store.dispatch(Action::TrackabilityChecked(None));
    let restored = store.dispatch(Action::SnapshotLoaded(Ok(None)));
    Waiting {
        links: ticket(&launched, "subscribe_to_deep_links"),
        timer: ticket(&restored, "start_timer"),
        store,
    }
}

fn link(key: &str) -> DeepLink {
    DeepLink::new(PublishableKey::new(key))
}

fn timer_aborts(dispatches: &[Dispatch]) -> usize {
    aborted(dispatches)
        .into_iter()
        .filter(|id| *id == EffectId::DeepLinkTimer)
        .count()
}

#[test]
fn links_racing_the_timer_coalesce_to_the_latest() {
    let Waiting {
        mut store,
        links,
        timer,
    } = waiting();

    let first = store.settle(Some(links.clone()), Action::DeepLinkReceived(link("a")));
    let second = store.settle(
        Some(links),
        Action::DeepLinkReceived(link("b").with_manual_visits(true)),
    );
    assert_eq!(
        store.state().flow.deep_link(),
        Some(&DeepLinkWait::WaitingForTimer(
            link("b").with_manual_visits(true)
        ))
    );
    // Every restart replaces the timer in flight.
    assert_eq!(first[0], Dispatch::Abort(timer.clone()));
    let current = ticket(&second, "start_timer");
    assert!(store.settle(Some(timer), Action::DeepLinkTimerFired).is_empty());

    let fired = store.settle(Some(current), Action::DeepLinkTimerFired);

    assert_eq!(timer_aborts(&fired), 1);
    assert_eq!(count(&fired, "make_sdk"), 0);
    assert!(!store.is_pending(&EffectId::DeepLinkTimer));
    let SessionFlow::RegisteringDriver(registration) = &store.state().flow else {
        panic!("expected registration, got {}", store.state().flow.name());
    };
    assert_eq!(registration.publishable_key, pk("b"));
    assert_eq!(registration.manual_visits, Some(true));
    assert_eq!(registration.deep_link, None);
}

#[test]
fn no_link_before_the_timer_gives_up_waiting() {
    let Waiting {
        mut store, timer, ..
    } = waiting();

    let fired = store.settle(Some(timer), Action::DeepLinkTimerFired);

    assert_eq!(timer_aborts(&fired), 1);
    assert_eq!(
        store.state().flow,
        SessionFlow::SigningIn(SignInState::default())
    );
}

#[test]
fn opened_url_and_push_ask_the_resolver() {
    let Waiting { mut store, .. } = waiting();
    store.dispatch(Action::FocusChanged(Some(shared::flow::Field::Email)));
    assert!(!store.is_pending(&EffectId::DeepLinkTimer));

    let opened = store.dispatch(Action::DeepLinkOpened("https://app.example.com/x".into()));
    assert_eq!(
        commands(&opened),
        [
            &Command::StartTimer(shared::config::DEEP_LINK_TIMEOUT),
            &Command::ContinueUserActivity("https://app.example.com/x".into()),
        ]
    );
    let pushed = store.dispatch(Action::PushNotificationReceived);
    assert_eq!(count(&pushed, "check_for_deep_link"), 1);
    assert!(matches!(
        store.state().flow,
        SessionFlow::SigningIn(SignInState::Editing {
            status: Some(EditingStatus::DeepLink(DeepLinkWait::WaitingForDeepLink)),
            ..
        })
    ));
}

#[test]
fn link_naming_the_driver_goes_straight_to_tracking() {
    let Waiting {
        mut store, links, ..
    } = waiting();
    let received = store.settle(
        Some(links.clone()),
        Action::DeepLinkReceived(link("pk").with_driver_id(DriverId::new("d1"))),
    );
    let fired = store.settle(
        Some(ticket(&received, "start_timer")),
        Action::DeepLinkTimerFired,
    );
    assert_eq!(count(&fired, "make_sdk"), 1);

    // Nothing replaces a link that is already bringing the sdk up.
    let ignored = store.settle(Some(links), Action::DeepLinkReceived(link("other")));
    assert!(ignored.is_empty());
    assert_eq!(
        store.state().flow.deep_link(),
        Some(&DeepLinkWait::WaitingForSdk(ResolvedLink {
            publishable_key: pk("pk"),
            driver_id: DriverId::new("d1"),
            manual_visits: false,
        }))
    );

    store.settle(
        Some(ticket(&fired, "make_sdk")),
        Action::SdkInitialized(unlocked("device")),
    );
    let tracking = tracking(&store);
    assert_eq!(tracking.driver_id, DriverId::new("d1"));
    assert_eq!(tracking.publishable_key, pk("pk"));
    assert_eq!(tracking.deep_link, None);
}

#[test]
fn link_during_launch_is_held_for_the_timer() {
    let mut store = store();
    let launched = store.dispatch(Action::OsLaunched);
    store.settle(
        Some(ticket(&launched, "subscribe_to_deep_links")),
        Action::DeepLinkReceived(link("early")),
    );
    store.dispatch(Action::TrackabilityChecked(None));
    let restored = store.dispatch(Action::SnapshotLoaded(Ok(None)));

    assert_eq!(count(&restored, "start_timer"), 1);
    assert_eq!(
        store.state().flow.deep_link(),
        Some(&DeepLinkWait::WaitingForTimer(link("early")))
    );
}

/// Delivers `link` to a tracking session and lets the timer settle it.
fn deliver(store: &mut TestStore, link: DeepLink) -> Vec<Dispatch> {
    let received = store.dispatch(Action::DeepLinkReceived(link));
    store.settle(
        Some(ticket(&received, "start_timer")),
        Action::DeepLinkTimerFired,
    )
}

#[test]
fn same_account_link_switches_driver_and_view() {
    let mut store = store();
    idle_tracking(&mut store, false);

    let out = deliver(
        &mut store,
        link("pk")
            .with_driver_id(DriverId::new("d2"))
            .with_manual_visits(true),
    );

    assert_eq!(
        commands(&out),
        [&Command::SetDriverId(DriverId::new("d2"))]
    );
    let tracking = tracking(&store);
    assert_eq!(tracking.driver_id, DriverId::new("d2"));
    assert!(tracking.visits.shows_manual_visits());
    assert!(tracking.requests.is_idle());
}

#[test]
fn matching_link_changes_nothing() {
    let mut store = store();
    idle_tracking(&mut store, false);
    let before = tracking(&store).clone();

    let out = deliver(&mut store, link("pk"));

    assert!(commands(&out).is_empty());
    assert_eq!(tracking(&store), &before);
}

#[test]
fn other_account_link_rebuilds_the_sdk() {
    let mut store = store();
    idle_tracking(&mut store, false);
    store.dispatch(Action::UpdateVisits);

    let out = deliver(&mut store, link("pk2"));

    assert!(aborted(&out).contains(&EffectId::Request(shared::requests::RequestKind::Visits)));
    assert_eq!(count(&out, "make_sdk"), 1);
    assert!(tracking(&store).requests.is_idle());
    assert!(store.dispatch(Action::DeepLinkReceived(link("pk3"))).is_empty());

    let rebuilt = store.settle(
        Some(ticket(&out, "make_sdk")),
        Action::SdkInitialized(unlocked("device2")),
    );
    let tracking = tracking(&store);
    assert_eq!(tracking.publishable_key, pk("pk2"));
    assert_eq!(tracking.driver_id, DriverId::new("driver"));
    assert_eq!(tracking.device_id.as_str(), "device2");
    assert_eq!(tracking.deep_link, None);
    assert_eq!(count(&rebuilt, "refresh_token"), 1);
}

#[test]
fn other_account_with_locked_sdk_is_terminal() {
    let mut store = store();
    idle_tracking(&mut store, false);
    let out = deliver(&mut store, link("pk2"));

    let locked = store.settle(
        Some(ticket(&out, "make_sdk")),
        Action::SdkInitialized(SdkState::Locked),
    );

    assert_eq!(store.state().flow, SessionFlow::NoMotionServices);
    assert_eq!(count(&locked, "stop_tracking"), 1);
    assert!(!store.is_pending(&EffectId::SdkStatusUpdates));
}

#[test]
fn repeated_link_for_the_live_account_settles_once() {
    let mut store = store();
    idle_tracking(&mut store, false);
    store.dispatch(Action::PushNotificationReceived);

    store.dispatch(Action::DeepLinkReceived(link("pk")));
    let second = store.dispatch(Action::DeepLinkReceived(link("pk")));
    assert_eq!(
        store.state().flow.deep_link(),
        Some(&DeepLinkWait::WaitingForTimer(link("pk")))
    );

    let fired = store.settle(
        Some(ticket(&second, "start_timer")),
        Action::DeepLinkTimerFired,
    );

    assert_eq!(timer_aborts(&fired), 1);
    assert_eq!(count(&fired, "make_sdk"), 0);
    assert!(commands(&fired).is_empty());
    assert_eq!(tracking(&store).deep_link, None);
}

#[test]
fn rebuild_issues_nothing_under_the_old_account() {
    let mut store = store();
    idle_tracking(&mut store, false);
    let out = deliver(&mut store, link("pk2"));

    assert!(store.dispatch(Action::RefreshAllRequests).is_empty());
    assert!(store.dispatch(Action::UpdateVisits).is_empty());
    assert!(store.dispatch(Action::AppWentForeground).is_empty());
    store.dispatch(Action::NetworkChanged(shared::Network::Offline));
    assert!(store
        .dispatch(Action::NetworkChanged(shared::Network::Online))
        .is_empty());
    assert!(!store.is_pending(&EffectId::RefreshToken));

    let rebuilt = store.settle(
        Some(ticket(&out, "make_sdk")),
        Action::SdkInitialized(unlocked("device2")),
    );

    let refreshes: Vec<_> = commands(&rebuilt)
        .into_iter()
        .filter(|c| c.name() == "refresh_token")
        .collect();
    assert_eq!(
        refreshes,
        [&Command::RefreshToken {
            publishable_key: pk("pk2"),
            device_id: shared::types::DeviceId::new("device2"),
        }]
    );
}

#[test]
fn background_during_rebuild_saves_the_new_identity() {
    let mut store = store();
    idle_tracking(&mut store, false);
    deliver(&mut store, link("pk2").with_driver_id(DriverId::new("d2")));

    let out = store.dispatch(Action::AppWentToBackground);

    let saved = commands(&out).into_iter().find_map(|c| match c {
        Command::SaveState { snapshot, .. } => Some(snapshot.clone()),
        _ => None,
    });
    assert!(matches!(
        saved,
        Some(shared::restoration::PersistedSnapshot::Visits {
            publishable_key,
            driver_id,
            ..
        }) if publishable_key == pk("pk2") && driver_id == DriverId::new("d2")
    ));
}
