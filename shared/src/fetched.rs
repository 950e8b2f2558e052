//! Payloads of the background REST fetches, already decoded by the shell.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::requests::RequestKind;
use crate::types::{Address, Coordinate, DriverId};
use crate::visits::AssignedVisit;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct History {
    pub distance_m: u64,
    pub duration_s: u64,
    pub visits_completed: u32,
    pub polyline: Vec<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trip {
    pub id: String,
    pub orders: Vec<AssignedVisit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMember {
    pub driver_id: DriverId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Integration {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Fetched {
    History(History),
    Trip(Option<Trip>),
    Places(Vec<Place>),
    Profile(Profile),
    Visits(Vec<AssignedVisit>),
    Team(Vec<TeamMember>),
    Integrations(Vec<Integration>),
}

impl Fetched {
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::History(_) => RequestKind::History,
            Self::Trip(_) => RequestKind::Trip,
            Self::Places(_) => RequestKind::Places,
            Self::Profile(_) => RequestKind::Profile,
            Self::Visits(_) => RequestKind::Visits,
            Self::Team(_) => RequestKind::Team,
            Self::Integrations(_) => RequestKind::Integrations,
        }
    }
}
