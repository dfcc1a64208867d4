//! Session gate
//!
//! Holds the one process-scoped fact the engine depends on: which user is
//! signed in and whether their bootstrap pull has finished. Every sign-in gets
//! a fresh generation number; work scheduled under an older generation must
//! not touch the store.

use crate::error::SyncError;
use huddle_store::UserId;
use tokio::sync::watch;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No authenticated user
    SignedOut,
    /// Remote pull in progress, writes blocked
    Bootstrapping,
    /// Pull finished, writes allowed
    Ready,
}

impl SessionPhase {
    /// Phases reachable from this one
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [SessionPhase] {
        use SessionPhase::{Bootstrapping, Ready, SignedOut};
        match self {
            SignedOut => &[Bootstrapping],
            // re-entry covers a bootstrap abandoned before completion
            Bootstrapping => &[Ready, Bootstrapping, SignedOut],
            Ready => &[Bootstrapping, SignedOut],
        }
    }

    /// Whether `to` is reachable in one step
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, to: SessionPhase) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

/// Validate a phase change
///
/// # Errors
/// `SyncError::InvalidTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), SyncError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(SyncError::InvalidTransition { from, to })
    }
}

/// Snapshot of the gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    pub user: Option<UserId>,
    pub generation: u64,
    pub ready: bool,
    pub wiped: bool,
}

impl GateState {
    /// Phase implied by this snapshot
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.ready) {
            (None, _) => SessionPhase::SignedOut,
            (Some(_), false) => SessionPhase::Bootstrapping,
            (Some(_), true) => SessionPhase::Ready,
        }
    }
}

/// Ready gate shared by the sequencer, controllers and engine
#[derive(Debug)]
pub struct SessionGate {
    state: watch::Sender<GateState>,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    /// Create a signed-out gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(GateState::default()),
        }
    }

    /// Start a session for `user`, returning its generation
    ///
    /// The gate closes until [`mark_ready`](Self::mark_ready) is called with the
    /// returned generation.
    ///
    /// # Errors
    /// `SyncError::InvalidTransition` if the current phase cannot bootstrap
    pub fn begin(&self, user: UserId) -> Result<u64, SyncError> {
        let from = self.phase();
        validate_transition(from, SessionPhase::Bootstrapping)?;
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.user = Some(user);
            s.ready = false;
            s.wiped = false;
            generation = s.generation;
        });
        tracing::info!(generation, ?from, "session bootstrapping");
        Ok(generation)
    }

    /// Open the gate for `generation`
    ///
    /// Returns `false` when the generation is stale or already ready.
    pub fn mark_ready(&self, generation: u64, wiped: bool) -> bool {
        let mut flipped = false;
        self.state.send_if_modified(|s| {
            let current = s.phase();
            if s.generation != generation || !current.can_transition_to(SessionPhase::Ready) {
                return false;
            }
            s.ready = true;
            s.wiped = wiped;
            flipped = true;
            true
        });
        if flipped {
            tracing::info!(generation, wiped, "session ready");
        }
        flipped
    }

    /// Close the gate and forget the user
    ///
    /// Returns `false` if already signed out.
    pub fn sign_out(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if validate_transition(s.phase(), SessionPhase::SignedOut).is_err() {
                return false;
            }
            s.generation += 1;
            s.user = None;
            s.ready = false;
            s.wiped = false;
            true
        });
        if changed {
            tracing::info!("session signed out");
        }
        changed
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> GateState {
        self.state.borrow().clone()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    /// Whether writes are allowed
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    /// Whether writes are allowed for this exact generation
    #[inline]
    #[must_use]
    pub fn is_ready_for(&self, generation: u64) -> bool {
        let s = self.state.borrow();
        s.ready && s.generation == generation
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Signed-in user
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.state.borrow().user.clone()
    }

    /// Whether the last bootstrap found a new or deleted account
    #[inline]
    #[must_use]
    pub fn wiped(&self) -> bool {
        self.state.borrow().wiped
    }

    /// Watch gate changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Wait until the gate opens
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(|s| s.ready).await;
    }
}
