//! Shared core of the field-worker app: sign-in, driver registration, deep
//! link attribution, visit tracking and the background request engine, as a
//! pure reducer with effects described as data.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]

pub mod action;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod deep_link;
pub mod effect;
pub mod environment;
pub mod error;
pub mod fetched;
pub mod flow;
pub mod launching;
pub mod orders;
pub mod registration;
pub mod requests;
pub mod restoration;
pub mod runtime;
pub mod sdk;
pub mod sign_in;
pub mod store;
pub mod token;
pub mod tracking;
pub mod types;
pub mod visits;

pub use action::{Action, Network};
pub use app::{App, Event, Model, Screen, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use config::Config;
pub use crux_core::{render::Render, App as CruxApp};
pub use environment::{Environment, FixedEnvironment, SystemEnvironment};
pub use error::{AppError, AppResult, ErrorKind};
pub use flow::{reduce, AppState, SessionFlow};
pub use runtime::{Collaborators, Runtime};
pub use store::{Dispatch, Store, Ticket};
