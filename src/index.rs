//! The application index: the root document that tracks every registered
//! participant and how far they got. Each participant is represented by an
//! opaque path token (`User<ID>/user<ID>`) that sits in exactly one of three
//! lists and only ever moves forward, New → Incomplete → Complete.

use crate::error::SessionError;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One of the three lists of the index, in the order a token moves through
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserList {
    /// Registered, no phase finished yet.
    New,
    /// Finished the price track only.
    Incomplete,
    /// Finished both tracks.
    Complete,
}

impl UserList {
    /// The list a token has to be in before it can move to this one.
    pub fn preceding(self) -> Option<UserList> {
        match self {
            UserList::New => None,
            UserList::Incomplete => Some(UserList::New),
            UserList::Complete => Some(UserList::Incomplete),
        }
    }
}

impl fmt::Display for UserList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserList::New => "new",
            UserList::Incomplete => "incomplete",
            UserList::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// What [ApplicationIndex::advance] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The token left `from` for `to`.
    Moved {
        /// The list it was in.
        from: UserList,
        /// The list it is in now.
        to: UserList,
    },
    /// The token already was at or past the target list.
    Unchanged(UserList),
}

/// The bookkeeping file of the installation: every registered user's
/// token, filed by how far they got.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationIndex {
    user_data_folder: String,
    new_users: Vec<String>,
    incomplete_users: Vec<String>,
    complete_users: Vec<String>,
}

impl ApplicationIndex {
    /// An empty index whose user files live in `user_data_folder`.
    pub fn fresh(user_data_folder: impl Into<String>) -> Self {
        Self {
            user_data_folder: user_data_folder.into(),
            ..Default::default()
        }
    }

    /// The folder name of one user's files.
    pub fn user_folder(user_id: &str) -> String {
        format!("User{}", user_id)
    }

    /// The token under which a user is listed.
    pub fn user_token(user_id: &str) -> String {
        format!("{}/user{}", Self::user_folder(user_id), user_id)
    }

    /// Folder, inside the main folder, that holds the user folders.
    pub fn user_data_folder(&self) -> &str {
        &self.user_data_folder
    }

    /// A folder is set and no token is listed twice.
    pub fn is_valid(&self) -> bool {
        if self.user_data_folder.is_empty() {
            return false;
        }
        let mut seen = HashSet::new();
        self.tokens().all(|(_, token)| seen.insert(token))
    }

    /// The tokens of one list, in registration order.
    pub fn list(&self, which: UserList) -> &[String] {
        match which {
            UserList::New => &self.new_users,
            UserList::Incomplete => &self.incomplete_users,
            UserList::Complete => &self.complete_users,
        }
    }

    /// Every token with the list it is in.
    pub fn tokens(&self) -> impl Iterator<Item = (UserList, &str)> {
        [UserList::New, UserList::Incomplete, UserList::Complete]
            .into_iter()
            .flat_map(move |which| self.list(which).iter().map(move |t| (which, t.as_str())))
    }

    /// Which list `token` is in, if any.
    pub fn position(&self, token: &str) -> Option<UserList> {
        self.tokens()
            .find(|(_, t)| *t == token)
            .map(|(which, _)| which)
    }

    /// Add a token to the New list. Returns `false` if it is already listed
    /// anywhere.
    pub fn register(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if self.position(&token).is_some() {
            return false;
        }
        info!("registered {} in the index", token);
        self.new_users.push(token);
        true
    }

    /// Move `token` forward to `target`. A token already at or past
    /// `target` stays where it is. A token that is not listed, or that would
    /// have to skip a list, is an error.
    pub fn advance(&mut self, token: &str, target: UserList) -> Result<Advance, SessionError> {
        let from = self.position(token).ok_or_else(|| {
            SessionError::InvalidDataState(format!("{} is not listed in the index", token))
        })?;

        if from >= target {
            return Ok(Advance::Unchanged(from));
        }
        if target.preceding() != Some(from) {
            return Err(SessionError::InvalidDataState(format!(
                "{} cannot go from {} to {} users",
                token, from, target
            )));
        }

        self.list_mut(from).retain(|t| t != token);
        self.list_mut(target).push(token.to_owned());
        info!("moved {} from {} to {} users", token, from, target);
        Ok(Advance::Moved { from, to: target })
    }

    fn list_mut(&mut self, which: UserList) -> &mut Vec<String> {
        match which {
            UserList::New => &mut self.new_users,
            UserList::Incomplete => &mut self.incomplete_users,
            UserList::Complete => &mut self.complete_users,
        }
    }
}
