mod support;

use shared::action::Action;
use shared::effect::{Command, EffectId};
use shared::error::{ApiError, ErrorKind};
use shared::orders::OrderStatus;
use shared::requests::RequestKind;
use shared::token::Token;
use shared::types::{AccessToken, VisitId};
use support::*;

#[test]
fn duplicate_update_is_not_reissued() {
    let mut store = store();
    idle_tracking(&mut store, false);

    let first = store.dispatch(Action::UpdateVisits);
    let second = store.dispatch(Action::UpdateVisits);

    assert_eq!(fetched_kinds(&first), [RequestKind::Visits]);
    assert!(second.is_empty());
    assert!(store.is_pending(&EffectId::Request(RequestKind::Visits)));
}

#[test]
fn first_refresh_waits_for_the_token() {
    let mut store = store();
    let out = launch_into_tracking(&mut store, false);

    assert_eq!(count(&out, "refresh_token"), 1);
    assert!(fetched_kinds(&out).is_empty());
    assert_eq!(tracking(&store).requests.token, Token::Refreshing);

    let refresh = ticket(&out, "refresh_token");
    let out = store.settle(
        Some(refresh),
        Action::TokenRefreshed(Ok(AccessToken::new("token"))),
    );
    assert_eq!(fetched_kinds(&out), RequestKind::ALL);
}

/// Leaves `kinds` in flight on a valid token, every other kind answered.
fn in_flight(store: &mut TestStore, kinds: &[RequestKind]) -> Vec<shared::Dispatch> {
    let out = launch_into_tracking(store, false);
    let refresh = ticket(&out, "refresh_token");
    let out = store.settle(
        Some(refresh),
        Action::TokenRefreshed(Ok(AccessToken::new("token"))),
    );
    for kind in RequestKind::ALL.into_iter().filter(|k| !kinds.contains(k)) {
        store.settle(
            Some(fetch_ticket(&out, kind)),
            Action::RequestCompleted {
                kind,
                result: Ok(empty(kind)),
            },
        );
    }
    out
}

#[test]
fn expired_token_refreshes_once_and_replays_every_kind() {
    let kinds = [RequestKind::History, RequestKind::Trip, RequestKind::Team];
    let mut store = store();
    let out = in_flight(&mut store, &kinds);

    let refreshes: usize = kinds
        .iter()
        .map(|&kind| {
            let failed = store.settle(
                Some(fetch_ticket(&out, kind)),
                Action::RequestCompleted {
                    kind,
                    result: Err(ApiError::TokenExpired),
                },
            );
            count(&failed, "refresh_token")
        })
        .sum();
    assert_eq!(refreshes, 1);
    assert_eq!(tracking(&store).requests.token, Token::Refreshing);

    let refresh = store
        .pending()
        .into_iter()
        .find(|id| *id == EffectId::RefreshToken);
    assert!(refresh.is_some());

    let replay = store.dispatch(Action::TokenRefreshed(Ok(AccessToken::new("fresh"))));
    assert_eq!(fetched_kinds(&replay), kinds);
    for command in commands(&replay) {
        if let Command::Fetch { token, .. } = command {
            assert_eq!(token.expose(), "fresh");
        }
    }
}

#[test]
fn failed_refresh_cancels_the_group() {
    let kinds = [RequestKind::History, RequestKind::Trip, RequestKind::Team];
    let mut store = store();
    let out = in_flight(&mut store, &kinds);

    for kind in kinds {
        store.settle(
            Some(fetch_ticket(&out, kind)),
            Action::RequestCompleted {
                kind,
                result: Err(ApiError::TokenExpired),
            },
        );
    }
    let out = store.dispatch(Action::TokenRefreshed(Err(ApiError::Network("down".into()))));

    assert!(aborted(&out).contains(&EffectId::RefreshToken));
    assert!(store
        .pending()
        .iter()
        .all(|id| !matches!(id, EffectId::Request(_) | EffectId::RefreshToken)));
    let tracking = tracking(&store);
    assert!(tracking.requests.is_idle());
    assert_eq!(tracking.requests.token, Token::Absent);
    assert_eq!(
        tracking.alert.as_ref().map(|a| a.kind),
        Some(ErrorKind::RefreshFailed)
    );
}

#[test]
fn other_failures_drop_only_their_kind() {
    let mut store = store();
    let out = in_flight(&mut store, &[RequestKind::Places, RequestKind::Profile]);

    let failed = store.settle(
        Some(fetch_ticket(&out, RequestKind::Places)),
        Action::RequestCompleted {
            kind: RequestKind::Places,
            result: Err(ApiError::Server {
                status: 500,
                message: "boom".into(),
            }),
        },
    );
    assert!(failed.is_empty());
    let requests = &tracking(&store).requests;
    assert!(!requests.is_pending(RequestKind::Places));
    assert!(requests.is_pending(RequestKind::Profile));
}

#[test]
fn stop_tracking_cancels_every_request() {
    let mut store = store();
    let out = in_flight(&mut store, &RequestKind::ALL);
    let late = fetch_ticket(&out, RequestKind::Visits);

    let stopped = store.dispatch(Action::StopTrackingTapped);

    assert_eq!(count(&stopped, "stop_tracking"), 1);
    assert_eq!(aborted(&stopped).len(), RequestKind::ALL.len());
    assert!(store
        .pending()
        .iter()
        .all(|id| !matches!(id, EffectId::Request(_) | EffectId::RefreshToken | EffectId::Order(_))));
    assert!(tracking(&store).requests.is_idle());

    // A result already on its way is dropped.
    let before = store.state().clone();
    let out = store.settle(
        Some(late),
        Action::RequestCompleted {
            kind: RequestKind::Visits,
            result: Ok(shared::fetched::Fetched::Visits(vec![assigned("late", NOW)])),
        },
    );
    assert!(out.is_empty());
    assert_eq!(store.state(), &before);
}

#[test]
fn stop_tracking_during_a_refresh_cancels_it_too() {
    let mut store = store();
    let out = in_flight(&mut store, &[RequestKind::Visits, RequestKind::Trip]);
    let expired = store.settle(
        Some(fetch_ticket(&out, RequestKind::Visits)),
        Action::RequestCompleted {
            kind: RequestKind::Visits,
            result: Err(ApiError::TokenExpired),
        },
    );
    let refresh = ticket(&expired, "refresh_token");
    assert!(store.is_pending(&EffectId::Request(RequestKind::Trip)));

    let stopped = store.dispatch(Action::StopTrackingTapped);

    let aborted = aborted(&stopped);
    assert!(aborted.contains(&EffectId::RefreshToken));
    assert!(aborted.contains(&EffectId::Request(RequestKind::Trip)));
    assert!(store
        .pending()
        .iter()
        .all(|id| !matches!(id, EffectId::Request(_) | EffectId::RefreshToken)));
    let requests = &tracking(&store).requests;
    assert_eq!(requests.token, Token::Absent);
    assert_eq!(requests.pending().count(), 0);

    // The refresh answering late changes nothing.
    assert!(store
        .settle(
            Some(refresh),
            Action::TokenRefreshed(Ok(AccessToken::new("late")))
        )
        .is_empty());
}

#[test]
fn refresh_all_replaces_requests_in_flight() {
    let mut store = store();
    let out = in_flight(&mut store, &[RequestKind::Visits]);
    let old = fetch_ticket(&out, RequestKind::Visits);

    let again = store.dispatch(Action::RefreshAllRequests);

    assert_eq!(fetched_kinds(&again), [RequestKind::Visits]);
    assert_eq!(aborted(&again), [EffectId::Request(RequestKind::Visits)]);
    assert!(!store.is_current(&old));
}

#[test]
fn coming_back_online_refreshes() {
    let mut store = store();
    idle_tracking(&mut store, false);

    store.dispatch(Action::NetworkChanged(shared::Network::Offline));
    let out = store.dispatch(Action::NetworkChanged(shared::Network::Online));

    assert_eq!(fetched_kinds(&out), RequestKind::ALL);
}

#[test]
fn completed_order_settles_status() {
    let mut store = store();
    tracking_with_visits(&mut store, vec![assigned("v1", NOW)]);
    let id = VisitId::new("v1");
    store.dispatch(Action::VisitSelected(id.clone()));

    let out = store.dispatch(Action::CompleteOrderTapped);
    assert_eq!(count(&out, "order_action"), 1);
    assert_eq!(
        tracking(&store).visits.selected_assigned().map(|v| v.order),
        Some(OrderStatus::Completing)
    );
    assert!(store.dispatch(Action::CompleteOrderTapped).is_empty());

    store.settle(
        Some(ticket(&out, "order_action")),
        Action::OrderActionCompleted {
            visit_id: id,
            action: shared::orders::OrderAction::Complete,
            result: Ok(()),
        },
    );
    let tracking = tracking(&store);
    assert_eq!(
        tracking.visits.selected_assigned().map(|v| v.order),
        Some(OrderStatus::Completed)
    );
    assert!(tracking.requests.is_idle());
}

#[test]
fn failed_order_rolls_back_and_alerts() {
    let mut store = store();
    tracking_with_visits(&mut store, vec![assigned("v1", NOW)]);
    let id = VisitId::new("v1");
    store.dispatch(Action::VisitSelected(id.clone()));

    let out = store.dispatch(Action::SnoozeOrderTapped);
    store.settle(
        Some(ticket(&out, "order_action")),
        Action::OrderActionCompleted {
            visit_id: id,
            action: shared::orders::OrderAction::Snooze,
            result: Err(ApiError::Network("offline".into())),
        },
    );

    let tracking = tracking(&store);
    assert_eq!(
        tracking.visits.selected_assigned().map(|v| v.order),
        Some(OrderStatus::Ongoing)
    );
    assert_eq!(tracking.alert.as_ref().map(|a| a.kind), Some(ErrorKind::Network));

    store.dispatch(Action::DismissAlert);
    assert!(support::tracking(&store).alert.is_none());
}

#[test]
fn expired_order_is_replayed_after_refresh() {
    let mut store = store();
    tracking_with_visits(&mut store, vec![assigned("v1", NOW)]);
    let id = VisitId::new("v1");
    store.dispatch(Action::VisitSelected(id.clone()));

    let out = store.dispatch(Action::CancelOrderTapped);
    let refresh = store.settle(
        Some(ticket(&out, "order_action")),
        Action::OrderActionCompleted {
            visit_id: id.clone(),
            action: shared::orders::OrderAction::Cancel,
            result: Err(ApiError::TokenExpired),
        },
    );
    assert_eq!(count(&refresh, "refresh_token"), 1);
    assert_eq!(
        tracking(&store).visits.selected_assigned().map(|v| v.order),
        Some(OrderStatus::Cancelling)
    );

    let replay = store.settle(
        Some(ticket(&refresh, "refresh_token")),
        Action::TokenRefreshed(Ok(AccessToken::new("fresh"))),
    );
    assert_eq!(count(&replay, "order_action"), 1);
    assert!(store.is_pending(&EffectId::Order(id)));
}
