//! Sign-in and the authenticated REST calls.
//!
//! The shell owns the HTTP client and the credential provider; it answers
//! each operation with the matching [`ApiOutput`] variant.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, SignInError};
use crate::fetched::Fetched;
use crate::orders::OrderAction;
use crate::requests::RequestKind;
use crate::types::{AccessToken, DeviceId, Email, Password, PublishableKey, VisitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum ApiOperation {
    SignIn {
        email: Email,
        password: Password,
    },
    Token {
        publishable_key: PublishableKey,
        device_id: DeviceId,
    },
    Fetch {
        kind: RequestKind,
        token: AccessToken,
        device_id: DeviceId,
        publishable_key: PublishableKey,
    },
    Order {
        action: OrderAction,
        visit_id: VisitId,
        token: AccessToken,
        device_id: DeviceId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ApiOutput {
    SignedIn(Result<PublishableKey, SignInError>),
    Token(Result<AccessToken, ApiError>),
    Fetched(Result<Fetched, ApiError>),
    Order(Result<(), ApiError>),
}

impl ApiOutput {
    fn mismatch(self, expected: &'static str) -> ApiError {
        warn!(expected, "api answered with an unexpected output");
        ApiError::Decoding(format!("expected {expected} output"))
    }

    /// Token result; any other variant is reported as a decoding failure.
    pub fn into_token(self) -> Result<AccessToken, ApiError> {
        match self {
            Self::Token(result) => result,
            other => Err(other.mismatch("token")),
        }
    }

    pub fn into_fetched(self) -> Result<Fetched, ApiError> {
        match self {
            Self::Fetched(result) => result,
            other => Err(other.mismatch("fetched")),
        }
    }

    pub fn into_order(self) -> Result<(), ApiError> {
        match self {
            Self::Order(result) => result,
            other => Err(other.mismatch("order")),
        }
    }

    pub fn into_signed_in(self) -> Result<PublishableKey, SignInError> {
        match self {
            Self::SignedIn(result) => result,
            other => {
                let error = other.mismatch("signed_in");
                Err(SignInError::Other(error.to_string()))
            }
        }
    }
}

impl Operation for ApiOperation {
    type Output = ApiOutput;
}

pub struct Api<E> {
    context: CapabilityContext<ApiOperation, E>,
}

impl<Ev> Capability<Ev> for Api<Ev> {
    type Operation = ApiOperation;
    type MappedSelf<MappedEv> = Api<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Api::new(self.context.map_event(f))
    }
}

impl<E> Api<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<ApiOperation, E>) -> Self {
        Self { context }
    }

    pub fn sign_in<F>(&self, email: Email, password: Password, callback: F)
    where
        F: FnOnce(Result<PublishableKey, SignInError>) -> E + Send + 'static,
    {
        self.request(ApiOperation::SignIn { email, password }, move |output| {
            callback(output.into_signed_in())
        });
    }

    pub fn token<F>(&self, publishable_key: PublishableKey, device_id: DeviceId, callback: F)
    where
        F: FnOnce(Result<AccessToken, ApiError>) -> E + Send + 'static,
    {
        let operation = ApiOperation::Token {
            publishable_key,
            device_id,
        };
        self.request(operation, move |output| callback(output.into_token()));
    }

    pub fn fetch<F>(
        &self,
        kind: RequestKind,
        token: AccessToken,
        device_id: DeviceId,
        publishable_key: PublishableKey,
        callback: F,
    ) where
        F: FnOnce(Result<Fetched, ApiError>) -> E + Send + 'static,
    {
        let operation = ApiOperation::Fetch {
            kind,
            token,
            device_id,
            publishable_key,
        };
        self.request(operation, move |output| callback(output.into_fetched()));
    }

    pub fn order<F>(
        &self,
        action: OrderAction,
        visit_id: VisitId,
        token: AccessToken,
        device_id: DeviceId,
        callback: F,
    ) where
        F: FnOnce(Result<(), ApiError>) -> E + Send + 'static,
    {
        let operation = ApiOperation::Order {
            action,
            visit_id,
            token,
            device_id,
        };
        self.request(operation, move |output| callback(output.into_order()));
    }

    fn request<F>(&self, operation: ApiOperation, callback: F)
    where
        F: FnOnce(ApiOutput) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(output));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_output_becomes_decoding_error() {
        let output = ApiOutput::Order(Ok(()));
        assert!(matches!(output.into_token(), Err(ApiError::Decoding(_))));
        assert!(matches!(
            ApiOutput::Token(Ok(AccessToken::new("t"))).into_signed_in(),
            Err(SignInError::Other(_))
        ));
    }

    #[test]
    fn token_in_operation_is_not_logged() {
        let operation = ApiOperation::Fetch {
            kind: RequestKind::Visits,
            token: AccessToken::new("secret-token"),
            device_id: DeviceId::new("dev"),
            publishable_key: PublishableKey::new("pk"),
        };
        assert!(!format!("{operation:?}").contains("secret-token"));
    }
}
