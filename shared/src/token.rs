use serde::{Deserialize, Serialize};

use crate::types::AccessToken;

/// Bearer credential for the REST API. At most one refresh is ever in flight,
/// which is exactly the `Refreshing` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Token {
    #[default]
    Absent,
    Refreshing,
    Valid(AccessToken),
}

impl Token {
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing)
    }

    #[must_use]
    pub const fn value(&self) -> Option<&AccessToken> {
        match self {
            Self::Valid(token) => Some(token),
            Self::Absent | Self::Refreshing => None,
        }
    }
}
