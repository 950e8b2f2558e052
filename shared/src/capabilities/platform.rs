use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::action::Network;
use crate::types::{Address, Coordinate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum PlatformOperation {
    Haptic,
    CopyToPasteboard(String),
    OpenMap {
        coordinate: Coordinate,
        address: Address,
    },
    SubscribeToNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PlatformOutput {
    Network(Network),
    Done,
}

impl Operation for PlatformOperation {
    type Output = PlatformOutput;
}

/// Device services with no state of their own.
pub struct Platform<E> {
    context: CapabilityContext<PlatformOperation, E>,
}

impl<Ev> Capability<Ev> for Platform<Ev> {
    type Operation = PlatformOperation;
    type MappedSelf<MappedEv> = Platform<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Platform::new(self.context.map_event(f))
    }
}

impl<E> Platform<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<PlatformOperation, E>) -> Self {
        Self { context }
    }

    pub fn haptic(&self) {
        self.notify(PlatformOperation::Haptic);
    }

    pub fn copy_to_pasteboard(&self, text: String) {
        self.notify(PlatformOperation::CopyToPasteboard(text));
    }

    pub fn open_map(&self, coordinate: Coordinate, address: Address) {
        self.notify(PlatformOperation::OpenMap {
            coordinate,
            address,
        });
    }

    pub fn subscribe_to_network<F>(&self, callback: F)
    where
        F: Fn(Network) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let mut updates = ctx.stream_from_shell(PlatformOperation::SubscribeToNetwork);
            while let Some(output) = updates.next().await {
                if let PlatformOutput::Network(network) = output {
                    ctx.update_app(callback(network));
                }
            }
        });
    }

    fn notify(&self, operation: PlatformOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
