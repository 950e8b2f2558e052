use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SnapshotError;
use crate::restoration::PersistedSnapshot;

/// Plain string key-value storage; the snapshot codec lives in the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum StorageOperation {
    Load { key: String },
    Save { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StorageOutput {
    Loaded(Result<Option<String>, String>),
    Saved(Result<(), String>),
}

impl Operation for StorageOperation {
    type Output = StorageOutput;
}

impl StorageOutput {
    /// Decoded snapshot of a `Loaded` answer. A missing value is not an error.
    pub fn into_snapshot(self) -> Result<Option<PersistedSnapshot>, SnapshotError> {
        match self {
            Self::Loaded(Ok(Some(raw))) => PersistedSnapshot::decode(&raw).map(Some),
            Self::Loaded(Ok(None)) => Ok(None),
            Self::Loaded(Err(message)) => Err(SnapshotError::Storage(message)),
            Self::Saved(_) => Err(SnapshotError::Storage("expected loaded output".into())),
        }
    }
}

pub struct Storage<E> {
    context: CapabilityContext<StorageOperation, E>,
}

impl<Ev> Capability<Ev> for Storage<Ev> {
    type Operation = StorageOperation;
    type MappedSelf<MappedEv> = Storage<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Storage::new(self.context.map_event(f))
    }
}

impl<E> Storage<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<StorageOperation, E>) -> Self {
        Self { context }
    }

    pub fn load<F>(&self, key: String, callback: F)
    where
        F: FnOnce(Result<Option<PersistedSnapshot>, SnapshotError>) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(StorageOperation::Load { key }).await;
            ctx.update_app(callback(output.into_snapshot()));
        });
    }

    /// Fire and forget; a failed save is only logged.
    pub fn save(&self, key: String, snapshot: &PersistedSnapshot) {
        let value = match snapshot.encode() {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "snapshot not encoded");
                return;
            }
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            if let StorageOutput::Saved(Err(message)) =
                ctx.request_from_shell(StorageOperation::Save { key, value }).await
            {
                warn!(%message, "snapshot not saved");
            }
        });
    }
}
