//! Background REST requests and the token gate in front of them.
//!
//! Every authenticated call goes through [`Requests::request_or_refresh`]:
//!
//! - `Absent`: the token is fetched instead and the call is not made. The kind
//!   stays in the set, so the refresh replays it.
//! - `Refreshing`: nothing, the pending refresh will replay it.
//! - `Valid`: the call is made with the token.
//!
//! A kind already in the set is never issued twice. It leaves the set on
//! completion or when the whole group is cancelled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::effect::{Command, Effect, EffectId};
use crate::error::ApiError;
use crate::orders::{OrderAction, OrderStatus, PendingOrderAction};
use crate::token::Token;
use crate::types::{AccessToken, DeviceId, PublishableKey, VisitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    History,
    Trip,
    Places,
    Profile,
    Visits,
    Team,
    Integrations,
}

impl RequestKind {
    pub const ALL: [Self; 7] = [
        Self::History,
        Self::Trip,
        Self::Places,
        Self::Profile,
        Self::Visits,
        Self::Team,
        Self::Integrations,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Trip => "trip",
            Self::Places => "places",
            Self::Profile => "profile",
            Self::Visits => "visits",
            Self::Team => "team",
            Self::Integrations => "integrations",
        }
    }
}

/// Identity the REST calls are made for.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub publishable_key: &'a PublishableKey,
    pub device_id: &'a DeviceId,
}

impl Credentials<'_> {
    fn refresh(&self) -> Effect {
        Effect::track(
            EffectId::RefreshToken,
            Command::RefreshToken {
                publishable_key: self.publishable_key.clone(),
                device_id: self.device_id.clone(),
            },
        )
    }

    fn fetch(&self, kind: RequestKind, token: &AccessToken) -> Effect {
        Effect::track(
            EffectId::Request(kind),
            Command::Fetch {
                kind,
                token: token.clone(),
                device_id: self.device_id.clone(),
                publishable_key: self.publishable_key.clone(),
            },
        )
    }

    fn order(&self, visit_id: &VisitId, action: OrderAction, token: &AccessToken) -> Effect {
        Effect::track(
            EffectId::Order(visit_id.clone()),
            Command::OrderAction {
                action,
                visit_id: visit_id.clone(),
                token: token.clone(),
                device_id: self.device_id.clone(),
            },
        )
    }
}

/// Order actions handed back by a failed refresh or a group cancellation, so
/// their visits can be put back to where they were.
pub type Reverted = Vec<(VisitId, OrderStatus)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Requests {
    pub token: Token,
    pending: BTreeSet<RequestKind>,
    orders: BTreeMap<VisitId, PendingOrderAction>,
}

impl Requests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains(&kind)
    }

    pub fn pending(&self) -> impl Iterator<Item = RequestKind> + '_ {
        self.pending.iter().copied()
    }

    #[must_use]
    pub fn pending_order(&self, visit_id: &VisitId) -> Option<&PendingOrderAction> {
        self.orders.get(visit_id)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.orders.is_empty() && !self.token.is_refreshing()
    }

    fn request_or_refresh(
        &mut self,
        creds: Credentials<'_>,
        request: impl FnOnce(&AccessToken) -> Effect,
    ) -> Option<Effect> {
        match &self.token {
            Token::Absent => {
                self.token = Token::Refreshing;
                Some(creds.refresh())
            }
            Token::Refreshing => None,
            Token::Valid(token) => Some(request(token)),
        }
    }

    /// Issues `kind` unless it is already in flight.
    pub fn issue_if_absent(&mut self, kind: RequestKind, creds: Credentials<'_>) -> Vec<Effect> {
        if !self.pending.insert(kind) {
            debug!(kind = kind.as_str(), "request already in flight");
            return Vec::new();
        }
        self.request_or_refresh(creds, |token| creds.fetch(kind, token))
            .into_iter()
            .collect()
    }

    /// Re-issues every kind in the set, or every kind when the set is empty.
    /// Calls already in flight are replaced.
    pub fn refresh_all(&mut self, creds: Credentials<'_>) -> Vec<Effect> {
        if self.pending.is_empty() {
            self.pending.extend(RequestKind::ALL);
        }
        let kinds: Vec<RequestKind> = self.pending.iter().copied().collect();
        kinds
            .into_iter()
            .filter_map(|kind| self.request_or_refresh(creds, |token| creds.fetch(kind, token)))
            .collect()
    }

    /// Takes `kind` out of the set. Returns `false` when it was not in flight,
    /// in which case the result is stale and must be ignored.
    pub fn request_completed(&mut self, kind: RequestKind) -> bool {
        self.pending.remove(&kind)
    }

    pub fn request_failed(
        &mut self,
        kind: RequestKind,
        error: &ApiError,
        creds: Credentials<'_>,
    ) -> Vec<Effect> {
        if error.is_token_expired() {
            return self.force_refresh(creds).into_iter().collect();
        }
        self.pending.remove(&kind);
        debug!(kind = kind.as_str(), %error, "request dropped");
        Vec::new()
    }

    /// Marks the token expired. Only the first caller issues the refresh.
    fn force_refresh(&mut self, creds: Credentials<'_>) -> Option<Effect> {
        if self.token.is_refreshing() {
            return None;
        }
        info!("access token expired, refreshing");
        self.token = Token::Refreshing;
        Some(creds.refresh())
    }

    /// Starts an order action for `visit_id`, remembering the status to fall
    /// back to.
    pub fn issue_order(
        &mut self,
        visit_id: &VisitId,
        pending: PendingOrderAction,
        creds: Credentials<'_>,
    ) -> Vec<Effect> {
        self.orders.insert(visit_id.clone(), pending);
        self.request_or_refresh(creds, |token| creds.order(visit_id, pending.action, token))
            .into_iter()
            .collect()
    }

    pub fn order_completed(&mut self, visit_id: &VisitId) -> Option<PendingOrderAction> {
        self.orders.remove(visit_id)
    }

    /// A token failure keeps the action for replay; anything else hands it
    /// back for rollback.
    pub fn order_failed(
        &mut self,
        visit_id: &VisitId,
        error: &ApiError,
        creds: Credentials<'_>,
    ) -> (Vec<Effect>, Option<PendingOrderAction>) {
        if error.is_token_expired() && self.orders.contains_key(visit_id) {
            return (self.force_refresh(creds).into_iter().collect(), None);
        }
        (Vec::new(), self.orders.remove(visit_id))
    }

    /// Result of the token refresh. Success replays every wanted kind and
    /// every waiting order action; failure cancels everything.
    pub fn token_refreshed(
        &mut self,
        result: Result<AccessToken, ApiError>,
        creds: Credentials<'_>,
    ) -> Result<Vec<Effect>, (Vec<Effect>, Reverted)> {
        if !self.token.is_refreshing() {
            debug!("token refresh result without a refresh in flight");
            return Ok(Vec::new());
        }
        match result {
            Ok(token) => {
                let mut effects: Vec<Effect> = self
                    .pending
                    .iter()
                    .map(|kind| creds.fetch(*kind, &token))
                    .collect();
                effects.extend(
                    self.orders
                        .iter()
                        .map(|(id, pending)| creds.order(id, pending.action, &token)),
                );
                info!(replayed = effects.len(), "access token refreshed");
                self.token = Token::Valid(token);
                Ok(effects)
            }
            Err(error) => {
                warn!(%error, "access token refresh failed");
                Err(self.cancel_all())
            }
        }
    }

    /// Cancels every request, every order action and the refresh, and resets
    /// the token.
    pub fn cancel_all(&mut self) -> (Vec<Effect>, Reverted) {
        let effects = EffectId::request_group()
            .chain(self.orders.keys().cloned().map(EffectId::Order))
            .map(Effect::Cancel)
            .collect();
        let reverted = std::mem::take(&mut self.orders)
            .into_iter()
            .map(|(id, pending)| (id, pending.previous))
            .collect();
        self.pending.clear();
        self.token = Token::Absent;
        (effects, reverted)
    }
}
