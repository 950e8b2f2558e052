use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::deep_link::DeepLink;

/// The attribution service that turns URLs and pushes into deep links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum LinkOperation {
    ContinueUserActivity(String),
    CheckForDeepLink,
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LinkOutput {
    Link(DeepLink),
    Done,
}

impl Operation for LinkOperation {
    type Output = LinkOutput;
}

pub struct Links<E> {
    context: CapabilityContext<LinkOperation, E>,
}

impl<Ev> Capability<Ev> for Links<Ev> {
    type Operation = LinkOperation;
    type MappedSelf<MappedEv> = Links<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Links::new(self.context.map_event(f))
    }
}

impl<E> Links<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<LinkOperation, E>) -> Self {
        Self { context }
    }

    pub fn continue_user_activity(&self, url: String) {
        self.notify(LinkOperation::ContinueUserActivity(url));
    }

    pub fn check_for_deep_link(&self) {
        self.notify(LinkOperation::CheckForDeepLink);
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(DeepLink) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let mut links = ctx.stream_from_shell(LinkOperation::Subscribe);
            while let Some(output) = links.next().await {
                if let LinkOutput::Link(link) = output {
                    ctx.update_app(callback(link));
                }
            }
        });
    }

    fn notify(&self, operation: LinkOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
