use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::error::ValidationError;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(PublishableKey);
typed_id!(DriverId);
typed_id!(DeviceId);
typed_id!(VisitId);
typed_id!(Email);

impl VisitId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Email {
    /// Loose shape check: one `@`, non-empty local part, dotted domain.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let trimmed = self.0.trim();
        let valid = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !trimmed.contains(char::is_whitespace)
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidEmail)
        }
    }
}

// --- Secrets: redacted Debug, zeroized on Drop ---

macro_rules! secret {
    ($name:ident) => {
        #[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn expose(&self) -> &str {
                &self.0
            }
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("[REDACTED]")
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.0.zeroize();
            }
        }
    };
}

secret!(Password);
secret!(AccessToken);

// --- Time ---

pub const MILLIS_PER_HOUR: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or_default(),
        )
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub fn sub_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_sub(ms))
    }
}

// --- Coordinate: validated, NaN-safe ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

/// Street line and/or the full postal address; servers send either, both or neither.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum Address {
    #[default]
    None,
    Street(String),
    Full(String),
    Both { street: String, full: String },
}

impl Address {
    #[must_use]
    pub fn new(street: Option<String>, full: Option<String>) -> Self {
        let street = street.filter(|s| !s.trim().is_empty());
        let full = full.filter(|s| !s.trim().is_empty());
        match (street, full) {
            (None, None) => Self::None,
            (Some(street), None) => Self::Street(street),
            (None, Some(full)) => Self::Full(full),
            (Some(street), Some(full)) => Self::Both { street, full },
        }
    }

    #[must_use]
    pub fn street(&self) -> Option<&str> {
        match self {
            Self::Street(s) | Self::Both { street: s, .. } => Some(s),
            Self::None | Self::Full(_) => None,
        }
    }

    #[must_use]
    pub fn full(&self) -> Option<&str> {
        match self {
            Self::Full(f) | Self::Both { full: f, .. } => Some(f),
            Self::None | Self::Street(_) => None,
        }
    }

    /// Best single line for display or for handing to a maps app.
    #[must_use]
    pub fn display_line(&self) -> Option<&str> {
        self.full().or_else(|| self.street())
    }
}
