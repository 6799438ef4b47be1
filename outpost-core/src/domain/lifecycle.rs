// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Domain lifecycle states and unload notification.
//!
//! Implements the domain lifecycle: Active → Unloading → Unloaded.
//! Teardown fires at most once; observers see Unloading strictly
//! before Unloaded regardless of how many triggers race.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::LifecycleError;

/// Domain lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    /// Domain is attached and serving calls.
    Active,

    /// Teardown has begun; unloading observers are running.
    Unloading,

    /// Terminal state - the domain will never serve another call.
    Unloaded,
}

impl DomainState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Unloading => "Unloading",
            Self::Unloaded => "Unloaded",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: DomainState) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Unloading) | (Self::Unloading, Self::Unloaded)
        )
    }
}

impl std::fmt::Display for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

type Observer = Box<dyn FnOnce() + Send>;

struct EventsInner {
    state: DomainState,
    unloading: Vec<Observer>,
    unloaded: Vec<Observer>,
}

/// Observer registration and ordered teardown notification.
///
/// Holds the domain state alongside the observer lists so a
/// subscription racing a teardown either lands before the snapshot
/// is taken or is rejected, never silently dropped.
pub struct LifecycleEvents {
    inner: Mutex<EventsInner>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EventsInner {
                state: DomainState::Active,
                unloading: Vec::new(),
                unloaded: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DomainState {
        self.lock().state
    }

    /// Register an observer for the start of teardown.
    /// Fails once teardown has begun.
    pub fn on_unloading(
        &self,
        observer: impl FnOnce() + Send + 'static,
    ) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != DomainState::Active {
            return Err(LifecycleError::SubscribeAfterTeardown {
                state: inner.state.name(),
            });
        }
        inner.unloading.push(Box::new(observer));
        Ok(())
    }

    /// Register an observer for the end of teardown.
    /// Fails once teardown has begun.
    pub fn on_unloaded(
        &self,
        observer: impl FnOnce() + Send + 'static,
    ) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != DomainState::Active {
            return Err(LifecycleError::SubscribeAfterTeardown {
                state: inner.state.name(),
            });
        }
        inner.unloaded.push(Box::new(observer));
        Ok(())
    }

    /// Run the teardown sequence: transition to Unloading, run those
    /// observers, transition to Unloaded, run the rest.
    ///
    /// Only the first caller performs the sequence; later callers get
    /// false and no observer runs twice. Observers execute outside
    /// the lock so they may inspect state without deadlocking.
    pub fn fire_unload(&self) -> bool {
        let unloading = {
            let mut inner = self.lock();
            if !inner.state.can_transition_to(DomainState::Unloading) {
                return false;
            }
            inner.state = DomainState::Unloading;
            std::mem::take(&mut inner.unloading)
        };

        tracing::debug!(
            observers = unloading.len(),
            to = DomainState::Unloading.name(),
            "Domain state transition"
        );
        for observer in unloading {
            observer();
        }

        let unloaded = {
            let mut inner = self.lock();
            inner.state = DomainState::Unloaded;
            std::mem::take(&mut inner.unloaded)
        };

        tracing::debug!(
            observers = unloaded.len(),
            to = DomainState::Unloaded.name(),
            "Domain state transition"
        );
        for observer in unloaded {
            observer();
        }

        true
    }
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}
