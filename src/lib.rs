//! StudyScribe runs a supervised, multi-phase data-collection experiment on
//! a wearable headset. A participant is walked through the phases of an
//! experiment (settings entry, a short test run, a timed estimation, pause
//! or end) while their head pose, gaze and the objects they handle are
//! sampled at a fixed rate.
//!
//! The data is written so that a crash or a power loss costs at most one
//! backup period: every running log is periodically rewritten as a complete
//! JSON document marked `BACKUP`, and finalized with an `END` marker when
//! the phase is left.
//!
//! The host application owns a [session::Session], forwards its button
//! clicks and menu choices to it and calls [session::Session::tick] once per
//! frame. Rendering, sensing and object physics stay on the host's side;
//! they talk to the session through [phase::Submanager] and the
//! [scene::Scene].

#![warn(missing_docs)]
pub mod args;
pub mod clock;
pub mod config;
pub mod dummy_tracker;
pub mod envelope;
pub mod error;
pub mod gui;
pub mod index;
pub mod logger;
pub mod phase;
pub mod records;
pub mod roster;
pub mod scene;
pub mod session;
pub mod state_machine;
pub mod status;
pub mod store;
