//! Component Lifecycle
//!
//! Every runtime component exposes the same four phases. Components with no
//! work to do in a phase keep the no-op defaults, so orchestrators can forward
//! phases without asking what a component is.

use std::fmt;

use parking_lot::Mutex;

use crate::error::{LifecycleError, Result};

/// Uniform lifecycle API
pub trait Lifecycle: Send + Sync {
    /// Prepare the component; failures abort setup
    fn initialise(&self) -> Result<()> {
        Ok(())
    }

    /// Begin serving
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Stop serving
    fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources; callers log failures and carry on
    fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle phase of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Initialised,
    Started,
    Stopped,
    Disposed,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Initialised => "initialise",
            Phase::Started => "start",
            Phase::Stopped => "stop",
            Phase::Disposed => "dispose",
        }
    }

    fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        match next {
            Created => false,
            Initialised => self == Created,
            Started => matches!(self, Initialised | Stopped),
            Stopped => self == Started,
            Disposed => self != Disposed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks which phase a component is in and rejects illegal transitions
#[derive(Debug)]
pub struct PhaseTracker {
    component: String,
    phase: Mutex<Phase>,
}

impl PhaseTracker {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            phase: Mutex::new(Phase::Created),
        }
    }

    pub fn current(&self) -> Phase {
        *self.phase.lock()
    }

    /// Run `action` if `next` is reachable from the current phase,
    /// recording the new phase only when the action succeeds
    pub fn transition(&self, next: Phase, action: impl FnOnce() -> Result<()>) -> Result<()> {
        let mut phase = self.phase.lock();
        if !phase.can_enter(next) {
            return Err(LifecycleError::new(
                self.component.clone(),
                next.name(),
                format!("not allowed while {}", phase.name()),
            )
            .into());
        }

        action()?;
        *phase = next;
        Ok(())
    }
}

/// Dispose every component, logging failures instead of returning them
///
/// Returns the number of components whose disposal failed.
pub fn dispose_all<'a, L, I>(owner: &str, components: I) -> usize
where
    L: Lifecycle + ?Sized + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let mut failures = 0;
    for component in components {
        if let Err(e) = component.dispose() {
            failures += 1;
            tracing::warn!(owner, error = %e, "Failed to dispose component");
        }
    }
    failures
}

/// Run a phase on every component, stopping at the first failure
pub fn run_all<'a, L, I>(components: I, phase: impl Fn(&L) -> Result<()>) -> Result<()>
where
    L: Lifecycle + ?Sized + 'a,
    I: IntoIterator<Item = &'a L>,
{
    for component in components {
        phase(component)?;
    }
    Ok(())
}
