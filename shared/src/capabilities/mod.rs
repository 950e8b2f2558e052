mod api;
mod links;
mod platform;
mod sdk;
mod storage;
mod timer;

pub use self::api::{Api, ApiOperation, ApiOutput};
pub use self::links::{LinkOperation, LinkOutput, Links};
pub use self::platform::{Platform, PlatformOperation, PlatformOutput};
pub use self::sdk::{Sdk, SdkOperation, SdkOutput};
pub use self::storage::{Storage, StorageOperation, StorageOutput};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

pub use crux_core::render::Render;

use crate::app::{App, Event};

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub sdk: Sdk<Event>,
    pub api: Api<Event>,
    pub links: Links<Event>,
    pub timer: Timer<Event>,
    pub storage: Storage<Event>,
    pub platform: Platform<Event>,
}
