//! Concurrency domains ("global actors") that generated code may be confined to.
//!
//! A struct annotated with `#[isolated(MainActor)]` (or with an `isolation = MainActor`
//! parameter) expects every generated registrar operation and memoization callback to run inside
//! that domain. Change-tracking callbacks are invoked from whatever thread performed the
//! mutation, so generated code re-enters the domain through [`GlobalActor::assume_isolated`],
//! which checks the assumption instead of hopping threads.

use std::cell::Cell;

/// Returned when code expected to run inside a domain is executing outside of it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IsolationError {
    #[error("expected to be isolated to {actor}, but the current thread is outside of it")]
    NotIsolated { actor: &'static str },
}

/// A named concurrency domain.
///
/// Implementors decide what "being inside the domain" means; see [`MainActor`] for a domain
/// entered by running a closure.
pub trait GlobalActor: 'static {
    const NAME: &'static str;

    fn is_isolated() -> bool;

    fn check_isolated() -> Result<(), IsolationError> {
        if Self::is_isolated() {
            Ok(())
        } else {
            Err(IsolationError::NotIsolated { actor: Self::NAME })
        }
    }

    /// Run `operation`, asserting that the current thread is already inside this domain.
    ///
    /// # Panics
    ///
    /// If the current thread is not isolated to this domain.
    fn assume_isolated<R>(operation: impl FnOnce() -> R) -> R {
        if let Err(e) = Self::check_isolated() {
            tracing::debug!(actor = Self::NAME, "isolation assumption failed");
            panic!("{}", e);
        }
        operation()
    }
}

/// The absence of a domain. Every thread is "isolated" to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Nonisolated;

impl GlobalActor for Nonisolated {
    const NAME: &'static str = "nonisolated";

    fn is_isolated() -> bool {
        true
    }

    fn assume_isolated<R>(operation: impl FnOnce() -> R) -> R {
        operation()
    }
}

thread_local! {
    static MAIN_ACTOR_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// The domain of the application's main thread.
///
/// The domain is entered with [`MainActor::run`]; everything that runs inside the closure, on
/// the calling thread, is isolated to the main actor. Entering is re-entrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MainActor;

impl MainActor {
    pub fn run<R>(operation: impl FnOnce() -> R) -> R {
        struct Exit;

        impl Drop for Exit {
            fn drop(&mut self) {
                MAIN_ACTOR_DEPTH.with(|depth| depth.set(depth.get() - 1));
            }
        }

        MAIN_ACTOR_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let _exit = Exit;
        operation()
    }
}

impl GlobalActor for MainActor {
    const NAME: &'static str = "MainActor";

    fn is_isolated() -> bool {
        MAIN_ACTOR_DEPTH.with(|depth| depth.get() > 0)
    }
}
