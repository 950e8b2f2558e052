//! Visits (stops) and the geotag lifecycle.
//!
//! ```text
//! NotSent --pick up--> PickedUp --check in--> CheckedIn --check out--> CheckedOut(at)
//! NotSent --check in--> CheckedIn (manual only)          CheckedIn --cancel--> Cancelled(at)
//! ```
//!
//! Every accepted transition produces exactly one [`Geotag`]; a rejected one
//! leaves the visit untouched and produces nothing.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use tracing::debug;

use crate::orders::OrderStatus;
use crate::types::{Address, Coordinate, UnixTimeMs, VisitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GeotagStatus {
    #[default]
    NotSent,
    PickedUp,
    CheckedIn,
    CheckedOut(UnixTimeMs),
    Cancelled(UnixTimeMs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeotagKind {
    PickUp,
    CheckIn,
    CheckOut,
    Cancel,
}

impl GeotagKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PickUp => "pick_up",
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
            Self::Cancel => "cancel",
        }
    }

    const fn carries_note(self) -> bool {
        matches!(self, Self::CheckOut | Self::Cancel)
    }
}

impl GeotagStatus {
    /// Next status for `kind`, or `None` when the current status is not the
    /// required source state.
    #[must_use]
    pub fn next(self, kind: GeotagKind, manual: bool, now: UnixTimeMs) -> Option<Self> {
        match (self, kind) {
            (Self::NotSent, GeotagKind::PickUp) => Some(Self::PickedUp),
            (Self::NotSent, GeotagKind::CheckIn) if manual => Some(Self::CheckedIn),
            (Self::PickedUp, GeotagKind::CheckIn) => Some(Self::CheckedIn),
            (Self::CheckedIn, GeotagKind::CheckOut) => Some(Self::CheckedOut(now)),
            (Self::CheckedIn, GeotagKind::Cancel) => Some(Self::Cancelled(now)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CheckedOut(_) | Self::Cancelled(_))
    }
}

/// Where an assigned visit came from on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitSource {
    Geofence,
    Trip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeotagSource {
    Geofence,
    Trip,
    Manual,
}

impl From<VisitSource> for GeotagSource {
    fn from(source: VisitSource) -> Self {
        match source {
            VisitSource::Geofence => Self::Geofence,
            VisitSource::Trip => Self::Trip,
        }
    }
}

/// Event record sent to the tracking backend for a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geotag {
    pub visit_id: VisitId,
    pub source: GeotagSource,
    pub kind: GeotagKind,
    pub at: UnixTimeMs,
    pub delivery_note: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualVisit {
    pub id: VisitId,
    pub created_at: UnixTimeMs,
    /// Unknown until the shell attaches the device position.
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub address: Address,
    pub geotag: GeotagStatus,
    pub delivery_note: String,
    pub note_field_focused: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ManualVisit {
    #[must_use]
    pub fn new(id: VisitId, created_at: UnixTimeMs) -> Self {
        Self {
            id,
            created_at,
            coordinate: None,
            address: Address::None,
            geotag: GeotagStatus::NotSent,
            delivery_note: String::new(),
            note_field_focused: false,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn located(mut self, coordinate: Coordinate, address: Address) -> Self {
        self.coordinate = Some(coordinate);
        self.address = address;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedVisit {
    pub id: VisitId,
    pub created_at: UnixTimeMs,
    pub source: VisitSource,
    pub coordinate: Coordinate,
    pub address: Address,
    pub geotag: GeotagStatus,
    pub delivery_note: String,
    pub note_field_focused: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub order: OrderStatus,
}

impl AssignedVisit {
    #[must_use]
    pub fn new(
        id: VisitId,
        created_at: UnixTimeMs,
        source: VisitSource,
        coordinate: Coordinate,
        address: Address,
    ) -> Self {
        Self {
            id,
            created_at,
            source,
            coordinate,
            address,
            geotag: GeotagStatus::NotSent,
            delivery_note: String::new(),
            note_field_focused: false,
            metadata: BTreeMap::new(),
            order: OrderStatus::Ongoing,
        }
    }

    /// Remote wins for everything except the fields only this device edits.
    fn absorb(&mut self, remote: Self) {
        let order = if self.order.is_transitional() {
            self.order
        } else {
            remote.order
        };
        let geotag = self.geotag;
        let note_field_focused = self.note_field_focused;
        let delivery_note = std::mem::take(&mut self.delivery_note);
        *self = Self {
            geotag,
            note_field_focused,
            delivery_note,
            order,
            ..remote
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visit {
    Manual(ManualVisit),
    Assigned(AssignedVisit),
}

/// Behaviour shared by manual and assigned visits.
pub trait Stop {
    fn id(&self) -> &VisitId;
    fn created_at(&self) -> UnixTimeMs;
    fn geotag(&self) -> GeotagStatus;
    fn set_geotag(&mut self, status: GeotagStatus);
    fn delivery_note(&self) -> &str;
    fn set_delivery_note(&mut self, note: String);
    fn note_field_focused(&self) -> bool;
    fn set_note_field_focused(&mut self, focused: bool);
    fn geotag_source(&self) -> GeotagSource;
    fn metadata(&self) -> BTreeMap<String, String>;

    fn is_manual(&self) -> bool {
        self.geotag_source() == GeotagSource::Manual
    }
}

impl Stop for ManualVisit {
    fn id(&self) -> &VisitId {
        &self.id
    }
    fn created_at(&self) -> UnixTimeMs {
        self.created_at
    }
    fn geotag(&self) -> GeotagStatus {
        self.geotag
    }
    fn set_geotag(&mut self, status: GeotagStatus) {
        self.geotag = status;
    }
    fn delivery_note(&self) -> &str {
        &self.delivery_note
    }
    fn set_delivery_note(&mut self, note: String) {
        self.delivery_note = note;
    }
    fn note_field_focused(&self) -> bool {
        self.note_field_focused
    }
    fn set_note_field_focused(&mut self, focused: bool) {
        self.note_field_focused = focused;
    }
    fn geotag_source(&self) -> GeotagSource {
        GeotagSource::Manual
    }
    fn metadata(&self) -> BTreeMap<String, String> {
        self.metadata.clone()
    }
}

impl Stop for AssignedVisit {
    fn id(&self) -> &VisitId {
        &self.id
    }
    fn created_at(&self) -> UnixTimeMs {
        self.created_at
    }
    fn geotag(&self) -> GeotagStatus {
        self.geotag
    }
    fn set_geotag(&mut self, status: GeotagStatus) {
        self.geotag = status;
    }
    fn delivery_note(&self) -> &str {
        &self.delivery_note
    }
    fn set_delivery_note(&mut self, note: String) {
        self.delivery_note = note;
    }
    fn note_field_focused(&self) -> bool {
        self.note_field_focused
    }
    fn set_note_field_focused(&mut self, focused: bool) {
        self.note_field_focused = focused;
    }
    fn geotag_source(&self) -> GeotagSource {
        self.source.into()
    }
    fn metadata(&self) -> BTreeMap<String, String> {
        self.metadata.clone()
    }
}

impl Visit {
    fn stop(&self) -> &dyn Stop {
        match self {
            Self::Manual(v) => v,
            Self::Assigned(v) => v,
        }
    }

    fn stop_mut(&mut self) -> &mut dyn Stop {
        match self {
            Self::Manual(v) => v,
            Self::Assigned(v) => v,
        }
    }

    #[must_use]
    pub fn address(&self) -> &Address {
        match self {
            Self::Manual(v) => &v.address,
            Self::Assigned(v) => &v.address,
        }
    }

    /// Where the visit is, if known. Manual visits may have no position yet.
    #[must_use]
    pub fn location(&self) -> Option<(Coordinate, &Address)> {
        match self {
            Self::Manual(v) => v.coordinate.map(|c| (c, &v.address)),
            Self::Assigned(v) => Some((v.coordinate, &v.address)),
        }
    }

    #[must_use]
    pub fn as_assigned(&self) -> Option<&AssignedVisit> {
        match self {
            Self::Assigned(v) => Some(v),
            Self::Manual(_) => None,
        }
    }
}

impl Stop for Visit {
    fn id(&self) -> &VisitId {
        self.stop().id()
    }
    fn created_at(&self) -> UnixTimeMs {
        self.stop().created_at()
    }
    fn geotag(&self) -> GeotagStatus {
        self.stop().geotag()
    }
    fn set_geotag(&mut self, status: GeotagStatus) {
        self.stop_mut().set_geotag(status);
    }
    fn delivery_note(&self) -> &str {
        self.stop().delivery_note()
    }
    fn set_delivery_note(&mut self, note: String) {
        self.stop_mut().set_delivery_note(note);
    }
    fn note_field_focused(&self) -> bool {
        self.stop().note_field_focused()
    }
    fn set_note_field_focused(&mut self, focused: bool) {
        self.stop_mut().set_note_field_focused(focused);
    }
    fn geotag_source(&self) -> GeotagSource {
        self.stop().geotag_source()
    }
    fn metadata(&self) -> BTreeMap<String, String> {
        self.stop().metadata()
    }
}

/// Flip the geotag status and build the matching geotag in one step.
pub fn apply_transition(stop: &mut dyn Stop, kind: GeotagKind, now: UnixTimeMs) -> Option<Geotag> {
    let Some(next) = stop.geotag().next(kind, stop.is_manual(), now) else {
        debug!(
            visit_id = %stop.id(),
            from = ?stop.geotag(),
            kind = kind.as_str(),
            "geotag transition rejected"
        );
        return None;
    };
    stop.set_geotag(next);
    Some(Geotag {
        visit_id: stop.id().clone(),
        source: stop.geotag_source(),
        kind,
        at: now,
        delivery_note: kind
            .carries_note()
            .then(|| stop.delivery_note().to_string()),
        metadata: stop.metadata(),
    })
}

/// Visits keyed by id. An id is present at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "V: Serialize",
    deserialize = "V: Deserialize<'de>"
))]
pub struct VisitSet<V>(BTreeMap<VisitId, V>);

impl<V> Default for VisitSet<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V: Stop> VisitSet<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `visit`, returning the previous entry with the same id.
    pub fn insert(&mut self, visit: V) -> Option<V> {
        self.0.insert(visit.id().clone(), visit)
    }

    pub fn remove(&mut self, id: &VisitId) -> Option<V> {
        self.0.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &VisitId) -> Option<&V> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &VisitId) -> Option<&mut V> {
        self.0.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &VisitId) -> bool {
        self.0.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, VisitId, V> {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, VisitId, V> {
        self.0.values_mut()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&V) -> bool) {
        self.0.retain(|_, v| keep(v));
    }
}

impl<V: Stop> FromIterator<V> for VisitSet<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut set = Self::new();
        for visit in iter {
            set.insert(visit);
        }
        set
    }
}

impl<V> IntoIterator for VisitSet<V> {
    type Item = V;
    type IntoIter = btree_map::IntoValues<VisitId, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

/// The working set of visits, shaped by whether manual visits are shown and
/// whether one visit is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visits {
    Mixed(VisitSet<Visit>),
    Assigned(VisitSet<AssignedVisit>),
    SelectedMixed {
        selected: Visit,
        rest: VisitSet<Visit>,
    },
    SelectedAssigned {
        selected: AssignedVisit,
        rest: VisitSet<AssignedVisit>,
    },
}

impl Default for Visits {
    fn default() -> Self {
        Self::Assigned(VisitSet::new())
    }
}

impl Visits {
    #[must_use]
    pub fn empty(show_manual_visits: bool) -> Self {
        if show_manual_visits {
            Self::Mixed(VisitSet::new())
        } else {
            Self::Assigned(VisitSet::new())
        }
    }

    #[must_use]
    pub fn shows_manual_visits(&self) -> bool {
        matches!(self, Self::Mixed(_) | Self::SelectedMixed { .. })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Mixed(set) => set.len(),
            Self::Assigned(set) => set.len(),
            Self::SelectedMixed { rest, .. } => rest.len() + 1,
            Self::SelectedAssigned { rest, .. } => rest.len() + 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<&VisitId> {
        match self {
            Self::SelectedMixed { selected, .. } => Some(selected.id()),
            Self::SelectedAssigned { selected, .. } => Some(&selected.id),
            Self::Mixed(_) | Self::Assigned(_) => None,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &VisitId) -> bool {
        self.selected_id() == Some(id)
            || match self {
                Self::Mixed(set) | Self::SelectedMixed { rest: set, .. } => set.contains(id),
                Self::Assigned(set) | Self::SelectedAssigned { rest: set, .. } => {
                    set.contains(id)
                }
            }
    }

    /// Every visit, selected one included, as owned values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Visit> {
        match self {
            Self::Mixed(set) => set.iter().cloned().collect(),
            Self::Assigned(set) => set.iter().cloned().map(Visit::Assigned).collect(),
            Self::SelectedMixed { selected, rest } => std::iter::once(selected.clone())
                .chain(rest.iter().cloned())
                .collect(),
            Self::SelectedAssigned { selected, rest } => {
                std::iter::once(Visit::Assigned(selected.clone()))
                    .chain(rest.iter().cloned().map(Visit::Assigned))
                    .collect()
            }
        }
    }

    pub fn selected_mut(&mut self) -> Option<&mut dyn Stop> {
        match self {
            Self::SelectedMixed { selected, .. } => Some(selected as &mut dyn Stop),
            Self::SelectedAssigned { selected, .. } => Some(selected as &mut dyn Stop),
            Self::Mixed(_) | Self::Assigned(_) => None,
        }
    }

    #[must_use]
    pub fn selected_assigned(&self) -> Option<&AssignedVisit> {
        match self {
            Self::SelectedMixed { selected, .. } => selected.as_assigned(),
            Self::SelectedAssigned { selected, .. } => Some(selected),
            Self::Mixed(_) | Self::Assigned(_) => None,
        }
    }

    #[must_use]
    pub fn selected_location(&self) -> Option<(Coordinate, &Address)> {
        match self {
            Self::SelectedMixed { selected, .. } => selected.location(),
            Self::SelectedAssigned { selected, .. } => {
                Some((selected.coordinate, &selected.address))
            }
            Self::Mixed(_) | Self::Assigned(_) => None,
        }
    }

    /// Assigned visit by id, wherever it lives.
    pub fn assigned_mut(&mut self, id: &VisitId) -> Option<&mut AssignedVisit> {
        match self {
            Self::SelectedMixed { selected: Visit::Assigned(v), .. }
            | Self::SelectedAssigned { selected: v, .. }
                if &v.id == id =>
            {
                Some(v)
            }
            Self::Mixed(set) | Self::SelectedMixed { rest: set, .. } => match set.get_mut(id) {
                Some(Visit::Assigned(v)) => Some(v),
                _ => None,
            },
            Self::Assigned(set) | Self::SelectedAssigned { rest: set, .. } => set.get_mut(id),
        }
    }

    /// Moves the visit with `id` into the selected slot. Any visit already
    /// selected goes back into the set first.
    pub fn select(&mut self, id: &VisitId) -> bool {
        if self.selected_id() == Some(id) {
            return true;
        }
        if !self.contains(id) {
            return false;
        }
        self.deselect();
        *self = match std::mem::take(self) {
            Self::Mixed(mut rest) => match rest.remove(id) {
                Some(selected) => Self::SelectedMixed { selected, rest },
                None => Self::Mixed(rest),
            },
            Self::Assigned(mut rest) => match rest.remove(id) {
                Some(selected) => Self::SelectedAssigned { selected, rest },
                None => Self::Assigned(rest),
            },
            other => other,
        };
        true
    }

    /// Returns the selected visit to the set, unchanged.
    pub fn deselect(&mut self) {
        *self = match std::mem::take(self) {
            Self::SelectedMixed { selected, mut rest } => {
                rest.insert(selected);
                Self::Mixed(rest)
            }
            Self::SelectedAssigned { selected, mut rest } => {
                rest.insert(selected);
                Self::Assigned(rest)
            }
            other => other,
        };
    }

    /// Adds a manual visit and selects it. Only the mixed view accepts manual
    /// visits; returns `false` otherwise.
    pub fn add_manual(&mut self, visit: ManualVisit) -> bool {
        if !self.shows_manual_visits() {
            return false;
        }
        self.deselect();
        *self = match std::mem::take(self) {
            Self::Mixed(rest) => Self::SelectedMixed {
                selected: Visit::Manual(visit),
                rest,
            },
            other => other,
        };
        true
    }

    /// Merges freshly fetched assigned visits by id. Local-only fields survive,
    /// unseen ids are added, nothing is removed.
    pub fn merge_assigned(&mut self, fresh: impl IntoIterator<Item = AssignedVisit>) {
        for remote in fresh {
            if let Some(local) = self.assigned_mut(&remote.id) {
                local.absorb(remote);
                continue;
            }
            if self.contains(&remote.id) {
                // Same id already used by a manual visit; the local one stays.
                continue;
            }
            match self {
                Self::Mixed(set) | Self::SelectedMixed { rest: set, .. } => {
                    set.insert(Visit::Assigned(remote));
                }
                Self::Assigned(set) | Self::SelectedAssigned { rest: set, .. } => {
                    set.insert(remote);
                }
            }
        }
    }

    /// Drops visits created more than `staleness_ms` before `now`. A stale
    /// selected visit is dropped as well, leaving nothing selected.
    pub fn filter_out_old(&mut self, now: UnixTimeMs, staleness_ms: u64) {
        let cutoff = now.sub_millis(staleness_ms);
        let fresh = |created_at: UnixTimeMs| created_at >= cutoff;
        let before = self.len();
        *self = match std::mem::take(self) {
            Self::Mixed(mut set) => {
                set.retain(|v| fresh(v.created_at()));
                Self::Mixed(set)
            }
            Self::Assigned(mut set) => {
                set.retain(|v| fresh(v.created_at));
                Self::Assigned(set)
            }
            Self::SelectedMixed { selected, mut rest } => {
                rest.retain(|v| fresh(v.created_at()));
                if fresh(selected.created_at()) {
                    Self::SelectedMixed { selected, rest }
                } else {
                    Self::Mixed(rest)
                }
            }
            Self::SelectedAssigned { selected, mut rest } => {
                rest.retain(|v| fresh(v.created_at));
                if fresh(selected.created_at) {
                    Self::SelectedAssigned { selected, rest }
                } else {
                    Self::Assigned(rest)
                }
            }
        };
        let dropped = before - self.len();
        if dropped > 0 {
            debug!(dropped, "stale visits dropped");
        }
    }

    /// Converts between the mixed and assigned-only views. Assigned visits
    /// carry over unchanged; manual visits are dropped when switching to
    /// assigned-only.
    #[must_use]
    pub fn with_manual_visits(self, show: bool) -> Self {
        match (self, show) {
            (same @ (Self::Mixed(_) | Self::SelectedMixed { .. }), true)
            | (same @ (Self::Assigned(_) | Self::SelectedAssigned { .. }), false) => same,
            (Self::Assigned(set), true) => {
                Self::Mixed(set.into_iter().map(Visit::Assigned).collect())
            }
            (Self::SelectedAssigned { selected, rest }, true) => Self::SelectedMixed {
                selected: Visit::Assigned(selected),
                rest: rest.into_iter().map(Visit::Assigned).collect(),
            },
            (Self::Mixed(set), false) => Self::Assigned(only_assigned(set)),
            (Self::SelectedMixed { selected, rest }, false) => {
                let rest = only_assigned(rest);
                match selected {
                    Visit::Assigned(selected) => Self::SelectedAssigned { selected, rest },
                    Visit::Manual(_) => Self::Assigned(rest),
                }
            }
        }
    }
}

fn only_assigned(set: VisitSet<Visit>) -> VisitSet<AssignedVisit> {
    set.into_iter()
        .filter_map(|v| match v {
            Visit::Assigned(a) => Some(a),
            Visit::Manual(_) => None,
        })
        .collect()
}

/// Staleness filter with the default 24 hour window.
#[must_use]
pub fn filter_out_old_visits(mut visits: Visits, now: UnixTimeMs) -> Visits {
    visits.filter_out_old(now, crate::config::VISIT_STALENESS_MS);
    visits
}
