use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sdk::{SdkState, SdkStatus, UntrackableReason};
use crate::types::{DriverId, PublishableKey};
use crate::visits::Geotag;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum SdkOperation {
    Make(PublishableKey),
    SubscribeToStatus,
    SetDriverId(DriverId),
    StartTracking,
    StopTracking,
    OpenSettings,
    RequestLocationPermissions,
    RequestMotionPermissions,
    CheckTrackability,
    AddGeotag(Geotag),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SdkOutput {
    Made(SdkState),
    Status(SdkStatus),
    Trackability(Option<UntrackableReason>),
    Done,
}

impl SdkOutput {
    #[must_use]
    pub fn into_state(self) -> Option<SdkState> {
        match self {
            Self::Made(state) => Some(state),
            _ => None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<SdkStatus> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn trackability(&self) -> Option<Option<UntrackableReason>> {
        match self {
            Self::Trackability(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl Operation for SdkOperation {
    type Output = SdkOutput;
}

/// The platform tracking SDK.
pub struct Sdk<E> {
    context: CapabilityContext<SdkOperation, E>,
}

impl<Ev> Capability<Ev> for Sdk<Ev> {
    type Operation = SdkOperation;
    type MappedSelf<MappedEv> = Sdk<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Sdk::new(self.context.map_event(f))
    }
}

impl<E> Sdk<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<SdkOperation, E>) -> Self {
        Self { context }
    }

    pub fn make<F>(&self, publishable_key: PublishableKey, callback: F)
    where
        F: FnOnce(SdkState) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            match ctx
                .request_from_shell(SdkOperation::Make(publishable_key))
                .await
                .into_state()
            {
                Some(state) => ctx.update_app(callback(state)),
                None => warn!("sdk answered make with an unexpected output"),
            }
        });
    }

    pub fn check_trackability<F>(&self, callback: F)
    where
        F: FnOnce(Option<UntrackableReason>) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(SdkOperation::CheckTrackability).await;
            match output.trackability() {
                Some(reason) => ctx.update_app(callback(reason)),
                None => warn!("sdk answered check_trackability with an unexpected output"),
            }
        });
    }

    /// Every status change until the stream is dropped by the shell.
    pub fn subscribe_to_status<F>(&self, callback: F)
    where
        F: Fn(SdkStatus) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let mut updates = ctx.stream_from_shell(SdkOperation::SubscribeToStatus);
            while let Some(output) = updates.next().await {
                if let Some(status) = output.status() {
                    ctx.update_app(callback(status));
                }
            }
        });
    }

    pub fn set_driver_id(&self, driver_id: DriverId) {
        self.notify(SdkOperation::SetDriverId(driver_id));
    }

    pub fn start_tracking(&self) {
        self.notify(SdkOperation::StartTracking);
    }

    pub fn stop_tracking(&self) {
        self.notify(SdkOperation::StopTracking);
    }

    pub fn open_settings(&self) {
        self.notify(SdkOperation::OpenSettings);
    }

    pub fn request_location_permissions(&self) {
        self.notify(SdkOperation::RequestLocationPermissions);
    }

    pub fn request_motion_permissions(&self) {
        self.notify(SdkOperation::RequestMotionPermissions);
    }

    pub fn add_geotag(&self, geotag: Geotag) {
        self.notify(SdkOperation::AddGeotag(geotag));
    }

    fn notify(&self, operation: SdkOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
