//! The only inputs the reducer takes besides state and action.

use std::cell::Cell;

use crate::config::Config;
use crate::types::{UnixTimeMs, VisitId};

pub trait Environment {
    fn now(&self) -> UnixTimeMs;
    fn new_visit_id(&self) -> VisitId;
    fn config(&self) -> &Config;
}

#[derive(Debug, Clone, Default)]
pub struct SystemEnvironment {
    config: Config,
}

impl SystemEnvironment {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Environment for SystemEnvironment {
    fn now(&self) -> UnixTimeMs {
        UnixTimeMs::now()
    }

    fn new_visit_id(&self) -> VisitId {
        VisitId::generate()
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

/// Deterministic clock and id sequence, for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    now: Cell<UnixTimeMs>,
    next_id: Cell<u64>,
    config: Config,
}

impl FixedEnvironment {
    #[must_use]
    pub fn new(now: UnixTimeMs) -> Self {
        Self {
            now: Cell::new(now),
            next_id: Cell::new(1),
            config: Config::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().add_millis(ms));
    }
}

impl Environment for FixedEnvironment {
    fn now(&self) -> UnixTimeMs {
        self.now.get()
    }

    fn new_visit_id(&self) -> VisitId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        VisitId::new(format!("manual-{id}"))
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
