//! The experiment phases a participant is walked through, and the hook
//! collaborators implement to follow along.
//!
//! ```text
//! Initialization → SettingsMenu → Test(track) → Estimation(track) → Pause | End
//!                        ↑                                              │
//!                        └──────────────────────────────────────────────┘
//! ```

use crate::error::SessionError;
use crate::index::{ApplicationIndex, UserList};
use crate::records::SessionRecord;
use crate::scene::Scene;
use crate::session::Resident;
use crate::state_machine::State;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// One of the two parallel experiment designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    /// Estimate the prices of the objects on the table.
    Prices,
    /// Estimate and then reproduce where the objects stood.
    Locations,
}

impl Track {
    /// Both tracks, in the order a participant runs them.
    pub const ALL: [Track; 2] = [Track::Prices, Track::Locations];

    /// The index list a user's token moves to once this track is done.
    pub fn completes_to(&self) -> UserList {
        match self {
            Track::Prices => UserList::Incomplete,
            Track::Locations => UserList::Complete,
        }
    }

    /// The earliest list a user has to be in to run this track.
    pub fn opens_at(&self) -> UserList {
        match self {
            Track::Prices => UserList::New,
            Track::Locations => UserList::Incomplete,
        }
    }

    /// Whether object streams are logged next to the head stream.
    pub fn logs_objects(&self) -> bool {
        matches!(self, Track::Locations)
    }

    /// The phase the estimation of this track normally ends in.
    pub fn finish(&self) -> Phase {
        match self {
            Track::Prices => Phase::Pause,
            Track::Locations => Phase::End,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Prices => write!(f, "Prices"),
            Track::Locations => write!(f, "Locations"),
        }
    }
}

impl FromStr for Track {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Prices" | "prices" => Ok(Track::Prices),
            "Locations" | "locations" => Ok(Track::Locations),
            other => Err(SessionError::InvalidPhaseArgument(format!(
                "unknown track {:?}",
                other
            ))),
        }
    }
}

/// Every phase of the experiment. Collaborators match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Startup, left right away for the settings menu.
    Initialization,
    /// Users are registered and picked here.
    SettingsMenu,
    /// A practice round. Nothing is logged.
    Test(Track),
    /// The logged part of a track.
    Estimation(Track),
    /// Between two tracks.
    Pause,
    /// The participant is done.
    End,
}

impl Phase {
    /// Whether the workflow allows going from `from` to `self`. A session
    /// that has not entered any phase yet may only start at
    /// [Phase::Initialization].
    pub fn can_follow(&self, from: Option<Phase>) -> bool {
        use Phase::*;
        match (from, *self) {
            (None, Initialization) => true,
            (Some(Initialization), SettingsMenu) => true,
            (Some(SettingsMenu | Pause), Test(_)) => true,
            (Some(SettingsMenu | Pause), Estimation(_)) => true,
            (Some(Test(a)), Estimation(b)) => a == b,
            (Some(Estimation(_)), Pause | End) => true,
            (Some(Pause | End), SettingsMenu) => true,
            _ => false,
        }
    }

    /// The data-logging phase, if this is one.
    pub fn logged_track(&self) -> Option<Track> {
        match self {
            Phase::Estimation(track) => Some(*track),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialization => write!(f, "Initialization"),
            Phase::SettingsMenu => write!(f, "SettingsMenu"),
            Phase::Test(track) => write!(f, "{}Test", track),
            Phase::Estimation(track) => write!(f, "{}Estimation", track),
            Phase::Pause => write!(f, "Pause"),
            Phase::End => write!(f, "End"),
        }
    }
}

/// What a collaborator may touch while it is being notified.
pub struct Stage<'a> {
    /// The live scene.
    pub scene: &'a mut Scene,
    /// The user being run, if one is selected.
    pub current_set: Option<&'a SessionRecord>,
}

///
/// An external collaborator that follows the session: shows or hides UI,
/// spawns or removes scene content. The session only tells it what happened;
/// it never asks what the collaborator did.
///
pub trait Submanager {
    /// `phase` has just been entered.
    fn on_phase_entered(&mut self, _phase: Phase, _stage: &mut Stage<'_>) {}

    /// `phase` is being left. Runs before the next phase is entered.
    fn on_phase_left(&mut self, _phase: Phase, _stage: &mut Stage<'_>) {}

    /// The index changed and was persisted.
    fn on_index_updated(&mut self, _index: &ApplicationIndex) {}

    /// Forget everything about the current user.
    fn reset(&mut self) {}
}

/// A state of the phase controller. Entering and leaving only notify;
/// ticking does nothing.
pub struct PhaseState {
    phase: Phase,
}

impl PhaseState {
    /// The state for `phase`, ready to hand to a controller.
    pub fn boxed(phase: Phase) -> Box<Self> {
        Box::new(Self { phase })
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase)
    }
}

impl State for PhaseState {
    type Context = Resident;
    type Error = SessionError;

    fn enter(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        ctx.status.show(format!("{}::enter", self.phase));
        ctx.notify_entered(self.phase);
        Ok(())
    }

    fn exit(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        debug!("{}::exit", self.phase);
        ctx.notify_left(self.phase);
        Ok(())
    }
}
