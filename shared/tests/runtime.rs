mod support;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, Mutex};

use shared::action::{Action, Network};
use shared::deep_link::DeepLink;
use shared::error::{ApiError, SignInError, SnapshotError};
use shared::fetched::Fetched;
use shared::flow::{SessionFlow, SignInState};
use shared::orders::OrderAction;
use shared::requests::RequestKind;
use shared::restoration::PersistedSnapshot;
use shared::sdk::{SdkState, SdkStatus, UntrackableReason};
use shared::types::{
    AccessToken, Address, Coordinate, DeviceId, DriverId, Email, Password, PublishableKey,
    VisitId,
};
use shared::visits::Geotag;
use shared::{AppState, Collaborators, FixedEnvironment, Runtime};
use support::{empty, unlocked, NOW};

#[derive(Default)]
struct Fake {
    links: Vec<DeepLink>,
    calls: Mutex<Vec<&'static str>>,
}

impl Fake {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn called(&self, call: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| *c == call)
    }
}

#[async_trait]
impl Collaborators for Fake {
    async fn sign_in(
        &self,
        _email: &Email,
        _password: &Password,
    ) -> Result<PublishableKey, SignInError> {
        self.record("sign_in");
        futures::future::pending().await
    }

    async fn make_sdk(&self, _publishable_key: &PublishableKey) -> SdkState {
        self.record("make_sdk");
        unlocked("device")
    }

    fn status_updates(&self) -> BoxStream<'static, SdkStatus> {
        stream::pending().boxed()
    }

    async fn set_driver_id(&self, _driver_id: &DriverId) {
        self.record("set_driver_id");
    }

    async fn start_tracking(&self) {
        self.record("start_tracking");
    }

    async fn stop_tracking(&self) {
        self.record("stop_tracking");
    }

    async fn open_settings(&self) {}

    async fn request_location_permissions(&self) {}

    async fn request_motion_permissions(&self) {}

    async fn check_trackability(&self) -> Option<UntrackableReason> {
        None
    }

    async fn add_geotag(&self, _geotag: Geotag) {
        self.record("add_geotag");
    }

    async fn get_token(
        &self,
        _publishable_key: &PublishableKey,
        _device_id: &DeviceId,
    ) -> Result<AccessToken, ApiError> {
        self.record("get_token");
        Ok(AccessToken::new("token"))
    }

    async fn fetch(
        &self,
        kind: RequestKind,
        _token: &AccessToken,
        _device_id: &DeviceId,
        _publishable_key: &PublishableKey,
    ) -> Result<Fetched, ApiError> {
        Ok(empty(kind))
    }

    async fn order_action(
        &self,
        _action: OrderAction,
        _visit_id: &VisitId,
        _token: &AccessToken,
        _device_id: &DeviceId,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn continue_user_activity(&self, _url: &str) {}

    async fn check_for_deep_link(&self) {}

    fn deep_links(&self) -> BoxStream<'static, DeepLink> {
        stream::iter(self.links.clone())
            .chain(stream::pending())
            .boxed()
    }

    async fn load_state(&self, _key: &str) -> Result<Option<PersistedSnapshot>, SnapshotError> {
        Ok(None)
    }

    async fn save_state(
        &self,
        _key: &str,
        _snapshot: &PersistedSnapshot,
    ) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn network_updates(&self) -> BoxStream<'static, Network> {
        stream::pending().boxed()
    }

    async fn haptic(&self) {}

    async fn copy_to_pasteboard(&self, _text: &str) {}

    async fn open_map(&self, _coordinate: Coordinate, _address: &Address) {}
}

fn runtime(fake: &Arc<Fake>) -> Runtime<Fake, FixedEnvironment> {
    Runtime::new(FixedEnvironment::new(NOW), Arc::clone(fake))
}

fn idle_tracking(state: &AppState) -> bool {
    state
        .flow
        .tracking()
        .is_some_and(|t| t.requests.is_idle() && t.profile.is_some())
}

fn editing(state: &AppState) -> bool {
    matches!(
        state.flow,
        SessionFlow::SigningIn(SignInState::Editing { status: None, .. })
    )
}

#[tokio::test(start_paused = true)]
async fn deep_link_launch_reaches_tracking() {
    let fake = Arc::new(Fake {
        links: vec![DeepLink::new(PublishableKey::new("pk")).with_driver_id(DriverId::new("d1"))],
        ..Fake::default()
    });
    let mut runtime = runtime(&fake);

    runtime.send(Action::OsLaunched);
    runtime.run_until(idle_tracking).await;

    let tracking = runtime.state().flow.tracking().unwrap();
    assert_eq!(tracking.driver_id, DriverId::new("d1"));
    assert_eq!(tracking.deep_link, None);
    assert!(fake.called("make_sdk"));
    assert!(fake.called("get_token"));
    assert!(fake.called("set_driver_id"));
    assert!(fake.called("start_tracking"));
    // Network, deep links and sdk status stay subscribed.
    assert_eq!(runtime.running(), 3);

    runtime.send(Action::SignOutTapped);
    assert_eq!(runtime.running(), 2);
    assert_eq!(
        runtime.state().flow,
        SessionFlow::SigningIn(SignInState::default())
    );
}

#[tokio::test(start_paused = true)]
async fn waiting_gives_up_when_no_link_arrives() {
    let fake = Arc::new(Fake::default());
    let mut runtime = runtime(&fake);

    runtime.send(Action::OsLaunched);
    runtime.run_until(editing).await;

    assert!(!runtime
        .store()
        .is_pending(&shared::effect::EffectId::DeepLinkTimer));
    assert_eq!(runtime.running(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_sign_in_aborts_the_call() {
    let fake = Arc::new(Fake::default());
    let mut runtime = runtime(&fake);
    runtime.send(Action::OsLaunched);
    runtime.run_until(editing).await;

    runtime.send(Action::EmailChanged("driver@example.com".into()));
    runtime.send(Action::PasswordChanged("secret".into()));
    runtime.send(Action::SignInTapped);
    assert_eq!(runtime.running(), 3);

    runtime.send(Action::CancelSignInTapped);

    assert_eq!(runtime.running(), 2);
    assert!(matches!(
        runtime.state().flow,
        SessionFlow::SigningIn(SignInState::Editing { .. })
    ));
}
