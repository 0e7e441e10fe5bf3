//! The host controls of the monitor, as keys.

use crate::error::SessionError;
use crate::phase::Track;
use crate::session::Session;
use crossterm::event::KeyCode;

/// A host control of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// The participant's button.
    UserButton,
    /// Pick the track to run next.
    SelectTrack(Track),
    /// End the running estimation the normal way.
    EndEstimation,
    /// Leave the estimation for a pause.
    Pause,
    /// Back from a pause or the end to the settings menu.
    BackToMenu,
    /// Start over for the next participant.
    NewUser,
    /// Leave the monitor.
    Quit,
}

/// The command bound to a key, if any.
pub fn command_for(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char(' ') | KeyCode::Enter => Some(Command::UserButton),
        KeyCode::Char('p') => Some(Command::SelectTrack(Track::Prices)),
        KeyCode::Char('l') => Some(Command::SelectTrack(Track::Locations)),
        KeyCode::Char('e') => Some(Command::EndEstimation),
        KeyCode::Char('z') => Some(Command::Pause),
        KeyCode::Char('m') => Some(Command::BackToMenu),
        KeyCode::Char('n') => Some(Command::NewUser),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Run a command on the session. Returns `false` once the monitor should
/// stop.
pub fn apply(command: Command, session: &mut Session) -> Result<bool, SessionError> {
    match command {
        Command::UserButton => {
            session.user_button_clicked()?;
        }
        Command::SelectTrack(track) => session.set_track(track)?,
        Command::EndEstimation => session.end_estimation()?,
        Command::Pause => session.pause()?,
        Command::BackToMenu => session.back_to_menu()?,
        Command::NewUser => session.new_user()?,
        Command::Quit => {
            // leave no log half-written behind
            if session.is_logging() {
                session.pause()?;
            }
            return Ok(false);
        }
    }
    Ok(true)
}
