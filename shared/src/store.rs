//! The one place the session state lives.
//!
//! A `Store` runs the reducer and owns the cancellation registry: every
//! tracked effect is registered under its [`EffectId`] with a fresh
//! generation. Results come back carrying the [`Ticket`] they were issued
//! with, and a ticket that is no longer registered (cancelled or replaced)
//! is dropped without reaching the reducer. Shells that can abort work get
//! an explicit [`Dispatch::Abort`] as well.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

use crate::action::Action;
use crate::effect::{Command, Effect, EffectId};
use crate::environment::{Environment, SystemEnvironment};
use crate::flow::{reduce, AppState};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub id: EffectId,
    pub generation: u64,
}

/// Work the shell has to carry out after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Run `command`; its results are settled with `ticket` (`None` for
    /// untracked work, whose results are always applied).
    Run {
        ticket: Option<Ticket>,
        command: Command,
    },
    Abort(Ticket),
}

pub struct Store<E = SystemEnvironment> {
    state: AppState,
    env: E,
    registry: BTreeMap<EffectId, u64>,
    generation: u64,
}

impl Default for Store<SystemEnvironment> {
    fn default() -> Self {
        Self::new(SystemEnvironment::default())
    }
}

impl<E: Environment> Store<E> {
    pub fn new(env: E) -> Self {
        Self::with_state(AppState::default(), env)
    }

    pub fn with_state(state: AppState, env: E) -> Self {
        Self {
            state,
            env,
            registry: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Ids with work registered right now.
    pub fn pending(&self) -> Vec<EffectId> {
        self.registry.keys().cloned().collect()
    }

    pub fn is_pending(&self, id: &EffectId) -> bool {
        self.registry.contains_key(id)
    }

    /// Whether a result carrying `ticket` would still be applied.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.registry.get(&ticket.id) == Some(&ticket.generation)
    }

    /// Feeds `action` and every follow-up it sends through the reducer.
    pub fn dispatch(&mut self, action: Action) -> Vec<Dispatch> {
        let mut queue = VecDeque::from([action]);
        let mut out = Vec::new();
        while let Some(action) = queue.pop_front() {
            trace!(action = action.name(), "dispatch");
            for effect in reduce(&mut self.state, action, &self.env) {
                match effect {
                    Effect::Send(next) => queue.push_back(next),
                    other => out.extend(self.register(other)),
                }
            }
        }
        out
    }

    /// Applies a result of earlier work. Results of cancelled or replaced
    /// work are dropped.
    pub fn settle(&mut self, ticket: Option<Ticket>, action: Action) -> Vec<Dispatch> {
        if let Some(ticket) = ticket {
            if !self.is_current(&ticket) {
                debug!(id = ?ticket.id, action = action.name(), "stale result dropped");
                return Vec::new();
            }
            if !ticket.id.is_stream() {
                self.registry.remove(&ticket.id);
            }
        }
        self.dispatch(action)
    }

    fn register(&mut self, effect: Effect) -> Vec<Dispatch> {
        match effect {
            Effect::Fire(command) => vec![Dispatch::Run {
                ticket: None,
                command,
            }],
            Effect::Track { id, command } => {
                self.generation += 1;
                let ticket = Ticket {
                    id: id.clone(),
                    generation: self.generation,
                };
                let mut out = Vec::with_capacity(2);
                if let Some(previous) = self.registry.insert(id.clone(), self.generation) {
                    trace!(?id, "replacing in-flight effect");
                    out.push(Dispatch::Abort(Ticket {
                        id,
                        generation: previous,
                    }));
                }
                out.push(Dispatch::Run {
                    ticket: Some(ticket),
                    command,
                });
                out
            }
            Effect::Cancel(id) => match self.registry.remove(&id) {
                Some(generation) => vec![Dispatch::Abort(Ticket { id, generation })],
                None => Vec::new(),
            },
            Effect::Send(action) => self.dispatch(action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::FixedEnvironment;
    use crate::types::UnixTimeMs;

    fn store() -> Store<FixedEnvironment> {
        Store::new(FixedEnvironment::new(UnixTimeMs(1_000)))
    }

    fn run_ticket(dispatches: &[Dispatch], name: &str) -> Option<Ticket> {
        dispatches.iter().find_map(|d| match d {
            Dispatch::Run { ticket, command } if command.name() == name => ticket.clone(),
            _ => None,
        })
    }

    #[test]
    fn launch_registers_subscriptions() {
        let mut store = store();
        let out = store.dispatch(Action::OsLaunched);
        assert!(store.is_pending(&EffectId::NetworkUpdates));
        assert!(store.is_pending(&EffectId::DeepLinkUpdates));
        assert!(run_ticket(&out, "check_trackability").is_none());
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn replaced_effect_is_aborted_and_its_result_dropped() {
        let mut store = store();
        let first = store.register(Effect::track(
            EffectId::DeepLinkTimer,
            Command::StartTimer(std::time::Duration::from_secs(5)),
        ));
        let old = run_ticket(&first, "start_timer").unwrap();
        let second = store.register(Effect::track(
            EffectId::DeepLinkTimer,
            Command::StartTimer(std::time::Duration::from_secs(5)),
        ));
        assert_eq!(second[0], Dispatch::Abort(old.clone()));
        assert!(!store.is_current(&old));
        assert!(store.settle(Some(old), Action::DeepLinkTimerFired).is_empty());
    }

    #[test]
    fn cancelling_an_idle_id_is_a_no_op() {
        let mut store = store();
        assert!(store.register(Effect::Cancel(EffectId::SignIn)).is_empty());
    }

    #[test]
    fn one_shot_ticket_leaves_registry_on_settle() {
        let mut store = store();
        let out = store.register(Effect::track(EffectId::SignIn, Command::CheckForDeepLink));
        let ticket = run_ticket(&out, "check_for_deep_link").unwrap();
        store.settle(Some(ticket), Action::VisitDeselected);
        assert!(!store.is_pending(&EffectId::SignIn));
    }
}
