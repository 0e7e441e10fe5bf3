//! The participants known to the index, loaded back from their files.

use crate::error::SessionError;
use crate::index::{ApplicationIndex, UserList};
use crate::records::{ObjectSnapshot, SessionRecord, UserProfile};
use crate::session::Resident;
use crate::state_machine::State;
use crate::status::StatusBoard;
use crate::store::DataStore;
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

/// Every indexed user's [SessionRecord], grouped like the index lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    new: Vec<SessionRecord>,
    incomplete: Vec<SessionRecord>,
    complete: Vec<SessionRecord>,
}

impl Roster {
    /// Load the profile and start layout of every token in `index`. Users
    /// whose files are missing or invalid are left out and reported.
    pub fn load(
        store: &DataStore,
        index: &ApplicationIndex,
        main_folder: &str,
        start_data_name: &str,
        status: &mut StatusBoard,
    ) -> Self {
        let data_dir = Path::new(main_folder).join(index.user_data_folder());
        let mut roster = Roster::default();

        for (which, token) in index.tokens() {
            match load_record(store, &data_dir, token, start_data_name) {
                Ok(record) if record.is_valid() => roster.list_mut(which).push(record),
                Ok(_) => status.alert(format!("no valid settings for {}", token)),
                Err(e) => status.alert(format!("could not load {}: {}", token, e)),
            }
        }
        debug!(
            "roster: {} new, {} incomplete, {} complete",
            roster.new.len(),
            roster.incomplete.len(),
            roster.complete.len()
        );
        roster
    }

    /// The records of one list, in index order.
    pub fn list(&self, which: UserList) -> &[SessionRecord] {
        match which {
            UserList::New => &self.new,
            UserList::Incomplete => &self.incomplete,
            UserList::Complete => &self.complete,
        }
    }

    /// Find a user by id, in any list.
    pub fn find(&self, user_id: &str) -> Option<(UserList, &SessionRecord)> {
        [UserList::New, UserList::Incomplete, UserList::Complete]
            .into_iter()
            .find_map(|which| {
                self.list(which)
                    .iter()
                    .find(|r| r.user_id() == user_id)
                    .map(|r| (which, r))
            })
    }

    /// Number of users in all lists.
    pub fn len(&self) -> usize {
        self.new.len() + self.incomplete.len() + self.complete.len()
    }

    /// No user could be loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&mut self, which: UserList, record: SessionRecord) {
        self.list_mut(which).push(record);
    }

    fn list_mut(&mut self, which: UserList) -> &mut Vec<SessionRecord> {
        match which {
            UserList::New => &mut self.new,
            UserList::Incomplete => &mut self.incomplete,
            UserList::Complete => &mut self.complete,
        }
    }
}

/// Logical path of a user's start layout.
pub fn start_data_path(data_dir: &Path, user_id: &str, start_data_name: &str) -> PathBuf {
    data_dir
        .join(ApplicationIndex::user_folder(user_id))
        .join(format!("{}{}", start_data_name, user_id))
}

fn load_record(
    store: &DataStore,
    data_dir: &Path,
    token: &str,
    start_data_name: &str,
) -> Result<SessionRecord, SessionError> {
    let profile: UserProfile = store.secure_load(data_dir.join(token))?.value;
    if !profile.is_valid() {
        return Ok(SessionRecord::default());
    }
    let snapshot: ObjectSnapshot = store
        .secure_load(start_data_path(data_dir, &profile.user_id, start_data_name))?
        .value;
    Ok(SessionRecord::new(profile, snapshot))
}

/// The logging controller's state while no estimation runs. Entering it
/// (re)loads the [Roster].
#[derive(Debug, Default)]
pub struct LoadSettings;

impl LoadSettings {
    /// The state, ready to hand to a controller.
    pub fn boxed() -> Box<Self> {
        Box::new(Self)
    }
}

impl fmt::Display for LoadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadSettings")
    }
}

impl State for LoadSettings {
    type Context = Resident;
    type Error = SessionError;

    fn enter(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        ctx.roster = Roster::load(
            &ctx.store,
            &ctx.index,
            &ctx.settings.main_folder,
            &ctx.settings.start_data_name,
            &mut ctx.status,
        );
        ctx.status
            .show(format!("Loaded settings of {} users", ctx.roster.len()));
        Ok(())
    }
}
