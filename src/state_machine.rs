//! A small finite-state controller. A session runs two of them side by
//! side, one for the experiment phases and one for data logging. Each is
//! ticked once per frame, and transitions always finish exiting the old
//! state before the new one is entered.

use log::{trace, warn};
use std::fmt;

///
/// A unit of work a [StateMachine] can be in. `execute()` is called once per
/// tick while the state is current. The `Context` is the shared data the
/// state works on, owned by whoever owns the machine.
///
pub trait State: fmt::Display {
    /// The data the state works on.
    type Context;
    /// What a failed transition or tick returns.
    type Error;

    /// Called once when the machine switches to this state.
    fn enter(&mut self, _ctx: &mut Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on every tick while this state is current.
    fn execute(&mut self, _ctx: &mut Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once when the machine leaves this state.
    fn exit(&mut self, _ctx: &mut Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }
}

type BoxedState<C, E> = Box<dyn State<Context = C, Error = E>>;

///
/// Holds the current and the previous state. A machine without a current
/// state is idle, which is a normal condition.
///
/// If `enter()` or `exit()` fails, the machine is left idle and the error is
/// returned: a state whose `enter()` failed was never entered, and a state
/// whose `exit()` failed is not current any more.
///
pub struct StateMachine<C, E> {
    current: Option<BoxedState<C, E>>,
    previous: Option<BoxedState<C, E>>,
}

impl<C, E> Default for StateMachine<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E> StateMachine<C, E> {
    /// An idle machine.
    pub fn new() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }

    /// Exit the current state, if any, then enter `new_state`.
    pub fn change_state(&mut self, mut new_state: BoxedState<C, E>, ctx: &mut C) -> Result<(), E> {
        self.exit_current(ctx)?;

        trace!("entering {}", new_state);
        if let Err(e) = new_state.enter(ctx) {
            warn!("{} : failed to enter.", new_state);
            return Err(e);
        }
        self.current = Some(new_state);
        Ok(())
    }

    /// Run one tick of the current state. Does nothing when idle.
    pub fn tick(&mut self, ctx: &mut C) -> Result<(), E> {
        match self.current.as_mut() {
            Some(state) => state.execute(ctx),
            None => Ok(()),
        }
    }

    /// Exit the current state without entering another one.
    pub fn to_idle(&mut self, ctx: &mut C) -> Result<(), E> {
        self.exit_current(ctx)
    }

    /// No state is current.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Name of the current state.
    pub fn current_name(&self) -> Option<String> {
        self.current.as_ref().map(|s| s.to_string())
    }

    /// Name of the state that was current before the last transition.
    pub fn previous_name(&self) -> Option<String> {
        self.previous.as_ref().map(|s| s.to_string())
    }

    fn exit_current(&mut self, ctx: &mut C) -> Result<(), E> {
        self.previous = self.current.take();
        match self.previous.as_mut() {
            Some(old) => {
                trace!("exiting {}", old);
                old.exit(ctx).map_err(|e| {
                    warn!("{} : failed to exit.", old);
                    e
                })
            }
            None => Ok(()),
        }
    }
}
