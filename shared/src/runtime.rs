//! Headless driver: runs the store on tokio against real collaborators.
//!
//! Every dispatched command becomes a task. Tracked tasks are aborted when
//! their effect is cancelled or replaced, and whatever they still manage to
//! send is dropped by the store's ticket check.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{instrument, warn};

use crate::action::{Action, Network};
use crate::deep_link::DeepLink;
use crate::effect::Command;
use crate::environment::{Environment, SystemEnvironment};
use crate::error::{ApiError, SignInError, SnapshotError};
use crate::fetched::Fetched;
use crate::flow::AppState;
use crate::orders::OrderAction;
use crate::requests::RequestKind;
use crate::restoration::PersistedSnapshot;
use crate::sdk::{SdkState, SdkStatus, UntrackableReason};
use crate::store::{Dispatch, Store, Ticket};
use crate::types::{
    AccessToken, Address, Coordinate, DeviceId, DriverId, Email, Password, PublishableKey,
    VisitId,
};
use crate::visits::Geotag;

/// The outside world as the core sees it.
#[async_trait]
pub trait Collaborators: Send + Sync + 'static {
    async fn sign_in(&self, email: &Email, password: &Password)
        -> Result<PublishableKey, SignInError>;

    async fn make_sdk(&self, publishable_key: &PublishableKey) -> SdkState;
    fn status_updates(&self) -> BoxStream<'static, SdkStatus>;
    async fn set_driver_id(&self, driver_id: &DriverId);
    async fn start_tracking(&self);
    async fn stop_tracking(&self);
    async fn open_settings(&self);
    async fn request_location_permissions(&self);
    async fn request_motion_permissions(&self);
    async fn check_trackability(&self) -> Option<UntrackableReason>;
    async fn add_geotag(&self, geotag: Geotag);

    async fn get_token(
        &self,
        publishable_key: &PublishableKey,
        device_id: &DeviceId,
    ) -> Result<AccessToken, ApiError>;
    async fn fetch(
        &self,
        kind: RequestKind,
        token: &AccessToken,
        device_id: &DeviceId,
        publishable_key: &PublishableKey,
    ) -> Result<Fetched, ApiError>;
    async fn order_action(
        &self,
        action: OrderAction,
        visit_id: &VisitId,
        token: &AccessToken,
        device_id: &DeviceId,
    ) -> Result<(), ApiError>;

    async fn continue_user_activity(&self, url: &str);
    async fn check_for_deep_link(&self);
    fn deep_links(&self) -> BoxStream<'static, DeepLink>;

    async fn load_state(&self, key: &str) -> Result<Option<PersistedSnapshot>, SnapshotError>;
    async fn save_state(&self, key: &str, snapshot: &PersistedSnapshot)
        -> Result<(), SnapshotError>;

    fn network_updates(&self) -> BoxStream<'static, Network>;

    async fn haptic(&self);
    async fn copy_to_pasteboard(&self, text: &str);
    async fn open_map(&self, coordinate: Coordinate, address: &Address);
}

#[derive(Debug)]
struct Settled {
    ticket: Option<Ticket>,
    action: Action,
}

pub struct Runtime<C, E = SystemEnvironment> {
    store: Store<E>,
    collaborators: Arc<C>,
    tasks: HashMap<Ticket, AbortHandle>,
    tx: mpsc::UnboundedSender<Settled>,
    rx: mpsc::UnboundedReceiver<Settled>,
}

impl<C: Collaborators, E: Environment> Runtime<C, E> {
    pub fn new(env: E, collaborators: Arc<C>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store: Store::new(env),
            collaborators,
            tasks: HashMap::new(),
            tx,
            rx,
        }
    }

    pub fn store(&self) -> &Store<E> {
        &self.store
    }

    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    /// Number of tracked tasks that have not been aborted or settled.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    #[instrument(skip_all, fields(action = action.name()))]
    pub fn send(&mut self, action: Action) {
        let dispatches = self.store.dispatch(action);
        self.execute(dispatches);
    }

    /// Waits for the next result and applies it.
    pub async fn step(&mut self) {
        let Some(Settled { ticket, action }) = self.rx.recv().await else {
            return;
        };
        if let Some(ticket) = &ticket {
            if !ticket.id.is_stream() {
                self.tasks.remove(ticket);
            }
        }
        let dispatches = self.store.settle(ticket, action);
        self.execute(dispatches);
    }

    /// Applies results until `done` holds for the state.
    pub async fn run_until(&mut self, done: impl Fn(&AppState) -> bool) {
        while !done(self.store.state()) {
            self.step().await;
        }
    }

    fn execute(&mut self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            match dispatch {
                Dispatch::Run { ticket, command } => {
                    let task = tokio::spawn(perform(
                        Arc::clone(&self.collaborators),
                        command,
                        ticket.clone(),
                        self.tx.clone(),
                    ));
                    if let Some(ticket) = ticket {
                        self.tasks.insert(ticket, task.abort_handle());
                    }
                }
                Dispatch::Abort(ticket) => {
                    if let Some(task) = self.tasks.remove(&ticket) {
                        task.abort();
                    }
                }
            }
        }
    }
}

impl<C, E> Drop for Runtime<C, E> {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

async fn perform<C: Collaborators>(
    c: Arc<C>,
    command: Command,
    ticket: Option<Ticket>,
    tx: mpsc::UnboundedSender<Settled>,
) {
    let settle = |action: Action| {
        // The runtime is gone; nobody is waiting for the result.
        let _ = tx.send(Settled {
            ticket: ticket.clone(),
            action,
        });
    };

    match command {
        Command::SignIn { email, password } => {
            settle(Action::SignedIn(c.sign_in(&email, &password).await));
        }
        Command::MakeSdk(publishable_key) => {
            settle(Action::SdkInitialized(c.make_sdk(&publishable_key).await));
        }
        Command::SubscribeToStatusUpdates => {
            let mut updates = c.status_updates();
            while let Some(status) = updates.next().await {
                settle(Action::StatusUpdated(status));
            }
        }
        Command::SetDriverId(driver_id) => c.set_driver_id(&driver_id).await,
        Command::StartTracking => c.start_tracking().await,
        Command::StopTracking => c.stop_tracking().await,
        Command::OpenSettings => c.open_settings().await,
        Command::RequestLocationPermissions => c.request_location_permissions().await,
        Command::RequestMotionPermissions => c.request_motion_permissions().await,
        Command::CheckTrackability => {
            settle(Action::TrackabilityChecked(c.check_trackability().await));
        }
        Command::AddGeotag(geotag) => c.add_geotag(geotag).await,

        Command::RefreshToken {
            publishable_key,
            device_id,
        } => {
            settle(Action::TokenRefreshed(
                c.get_token(&publishable_key, &device_id).await,
            ));
        }
        Command::Fetch {
            kind,
            token,
            device_id,
            publishable_key,
        } => {
            let result = c.fetch(kind, &token, &device_id, &publishable_key).await;
            settle(Action::RequestCompleted { kind, result });
        }
        Command::OrderAction {
            action,
            visit_id,
            token,
            device_id,
        } => {
            let result = c.order_action(action, &visit_id, &token, &device_id).await;
            settle(Action::OrderActionCompleted {
                visit_id,
                action,
                result,
            });
        }

        Command::ContinueUserActivity(url) => c.continue_user_activity(&url).await,
        Command::CheckForDeepLink => c.check_for_deep_link().await,
        Command::SubscribeToDeepLinks => {
            let mut links = c.deep_links();
            while let Some(link) = links.next().await {
                settle(Action::DeepLinkReceived(link));
            }
        }

        Command::StartTimer(period) => {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                settle(Action::DeepLinkTimerFired);
            }
        }

        Command::LoadState { key } => {
            settle(Action::SnapshotLoaded(c.load_state(&key).await));
        }
        Command::SaveState { key, snapshot } => {
            if let Err(error) = c.save_state(&key, &snapshot).await {
                warn!(%error, "snapshot not saved");
            }
        }

        Command::SubscribeToNetworkUpdates => {
            let mut updates = c.network_updates();
            while let Some(network) = updates.next().await {
                settle(Action::NetworkChanged(network));
            }
        }

        Command::Haptic => c.haptic().await,
        Command::CopyToPasteboard(text) => c.copy_to_pasteboard(&text).await,
        Command::OpenMap {
            coordinate,
            address,
        } => c.open_map(coordinate, &address).await,
    }
}
