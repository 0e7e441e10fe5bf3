//! The durable store: every file StudyScribe reads or writes lives under a
//! single root directory and is addressed by a *logical path*, which is the
//! path below that root without the `.json` extension.
//!
//! Reads can fall back to a read-only directory of bundled defaults that
//! mirrors the layout of the store. Writes always go to a temporary file in
//! the target directory that is then renamed over the destination, so a
//! file in the store is either the old document or the new one.
//!
//! Unique file names are best effort. Two writers racing on the same name
//! within the same second can still collide; the store assumes it is the
//! only process writing to its root.

use crate::envelope::{Envelope, FileStatus, Provenance};
use chrono::Local;
use log::{debug, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// The extension of every file in the store.
pub const FILE_ENDING: &str = "json";

/// Errors from reading and writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist.
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    /// A caller passed an empty name or directory.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The file system refused a read or write.
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// The file or folder involved.
        path: PathBuf,
        /// What the filesystem said.
        source: io::Error,
    },

    /// The file exists but is not a well-formed envelope.
    #[error("malformed file {}: {source}", .path.display())]
    Json {
        /// The file.
        path: PathBuf,
        /// Where parsing failed.
        source: serde_json::Error,
    },

    /// The envelope parsed but holds no entries.
    #[error("{} has no entries", .0.display())]
    EmptyEnvelope(PathBuf),
}

/// Where [DataStore::secure_load] found its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// The durable store.
    Store,
    /// The bundled defaults; the file has been copied into the store.
    Bundled,
    /// Nowhere; the value is `T::default()` and must be validity-checked.
    Default,
}

/// A value returned by [DataStore::secure_load] together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    /// What was loaded, or the default.
    pub value: T,
    /// Where it came from.
    pub origin: LoadOrigin,
}

/// Handle to the durable store and its bundled fallback.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
    bundled: Option<PathBuf>,
}

impl DataStore {
    /// A store rooted at `root`, without bundled defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bundled: None,
        }
    }

    /// Use `dir` as the read-only source of bundled defaults.
    pub fn with_bundled(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            bundled: Some(dir.into()),
            ..self
        }
    }

    /// The store's root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a logical path onto the root. An absolute path is returned as is.
    pub fn resolve_path(&self, logical: impl AsRef<Path>) -> PathBuf {
        self.root.join(logical)
    }

    /// Create every missing directory on the way to `path` (logical or
    /// absolute) and return the absolute directory.
    pub fn ensure_directory(&self, path: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let dir = self.resolve_path(path);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Return `base_name` if no file of that name exists in `directory`,
    /// otherwise `base_name` followed by the current `HHMMSS`, and if that
    /// is taken as well, followed by a counter.
    pub fn unique_name(&self, directory: impl AsRef<Path>, base_name: &str) -> String {
        let dir = self.resolve_path(directory);
        if !with_ending(&dir.join(base_name)).exists() {
            return base_name.to_owned();
        }

        let stamped = format!("{}{}", base_name, Local::now().format("%H%M%S"));
        let mut candidate = stamped.clone();
        let mut n = 1;
        while with_ending(&dir.join(&candidate)).exists() {
            candidate = format!("{}_{}", stamped, n);
            n += 1;
        }
        debug!("{} already taken, using {}", base_name, candidate);
        candidate
    }

    /// Read the first entry of the envelope at `logical`.
    pub fn load<T: DeserializeOwned>(&self, logical: impl AsRef<Path>) -> Result<T, StoreError> {
        let path = with_ending(&self.resolve_path(logical));
        let text = read_existing(&path)?;
        let value = first_entry(&path, &text)?;
        debug!("loaded {}", path.display());
        Ok(value)
    }

    /// Like [DataStore::load], but a file missing from the store is looked
    /// up in the bundled defaults and copied into the store. If it is
    /// missing there too, `T::default()` is returned with
    /// [LoadOrigin::Default].
    pub fn secure_load<T: DeserializeOwned + Default>(
        &self,
        logical: impl AsRef<Path>,
    ) -> Result<Loaded<T>, StoreError> {
        let logical = logical.as_ref();
        match self.load(logical) {
            Ok(value) => {
                return Ok(Loaded {
                    value,
                    origin: LoadOrigin::Store,
                })
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if let Some(bundled) = &self.bundled {
            let source = with_ending(&bundled.join(logical));
            match read_existing(&source) {
                Ok(text) => {
                    let value = first_entry(&source, &text)?;
                    let target = with_ending(&self.resolve_path(logical));
                    if let Some(parent) = target.parent() {
                        self.ensure_directory(parent)?;
                    }
                    write_atomic(&target, text.as_bytes())?;
                    info!(
                        "copied bundled {} into the store",
                        logical.display()
                    );
                    return Ok(Loaded {
                        value,
                        origin: LoadOrigin::Bundled,
                    });
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        warn!("data not found at path {}", logical.display());
        Ok(Loaded {
            value: T::default(),
            origin: LoadOrigin::Default,
        })
    }

    /// Wrap `data` in a finalized envelope and write it under a unique name
    /// derived from `base_name`. Returns the name actually used.
    pub fn save<T: Serialize>(
        &self,
        data: &T,
        provenance: &Provenance,
        directory: impl AsRef<Path>,
        base_name: &str,
    ) -> Result<String, StoreError> {
        let text = Self::encode(data, provenance, directory.as_ref(), base_name)?;
        self.save_text(&text, directory, base_name)
    }

    /// Wrap `data` in a finalized envelope and write it to exactly `name`,
    /// replacing whatever was there.
    pub fn overwrite<T: Serialize>(
        &self,
        data: &T,
        provenance: &Provenance,
        directory: impl AsRef<Path>,
        name: &str,
    ) -> Result<(), StoreError> {
        let text = Self::encode(data, provenance, directory.as_ref(), name)?;
        self.overwrite_text(&text, directory, name)
    }

    /// Write an already rendered document under a unique name derived from
    /// `base_name`. Returns the name actually used.
    pub fn save_text(
        &self,
        text: &str,
        directory: impl AsRef<Path>,
        base_name: &str,
    ) -> Result<String, StoreError> {
        check_name(directory.as_ref(), base_name)?;
        let dir = self.ensure_directory(directory)?;
        let name = self.unique_name(&dir, base_name);
        let path = with_ending(&dir.join(&name));
        write_atomic(&path, text.as_bytes())?;
        debug!("saved {}", path.display());
        Ok(name)
    }

    /// Write an already rendered document to exactly `name`.
    pub fn overwrite_text(
        &self,
        text: &str,
        directory: impl AsRef<Path>,
        name: &str,
    ) -> Result<(), StoreError> {
        check_name(directory.as_ref(), name)?;
        let dir = self.ensure_directory(directory)?;
        let path = with_ending(&dir.join(name));
        write_atomic(&path, text.as_bytes())?;
        debug!("overwrote {}", path.display());
        Ok(())
    }

    fn encode<T: Serialize>(
        data: &T,
        provenance: &Provenance,
        directory: &Path,
        name: &str,
    ) -> Result<String, StoreError> {
        Envelope::single(data, provenance)
            .to_json()
            .map_err(|source| StoreError::Json {
                path: directory.join(name),
                source,
            })
    }
}

/// Parse the envelope of any file and report how it was closed.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<FileStatus, StoreError> {
    let path = path.as_ref();
    let text = read_existing(path)?;
    FileStatus::from_json(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// `path` with `.json` appended. Not `with_extension`, which would eat
/// anything after a dot in a user id.
fn with_ending(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(FILE_ENDING);
    PathBuf::from(name)
}

fn check_name(directory: &Path, name: &str) -> Result<(), StoreError> {
    if directory.as_os_str().is_empty() {
        return Err(StoreError::InvalidArgument("directory must not be empty"));
    }
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("file name must not be empty"));
    }
    Ok(())
}

fn read_existing(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn first_entry<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, StoreError> {
    let envelope = Envelope::<T>::from_json(text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    envelope
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::EmptyEnvelope(path.to_path_buf()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| io_err(io::Error::other("path has no parent directory")))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(bytes).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EndMarker;
    use crate::records::{
        HeadPose, HeadSample, ObjectPose, ObjectSnapshot, Quat, SessionRecord, UserGroup,
        UserProfile, Vec3,
    };

    fn profile() -> UserProfile {
        UserProfile::new("12", UserGroup::GroupB, 0.5)
    }

    #[test]
    fn resolve_is_a_pure_join() {
        let store = DataStore::new("/data/root");
        assert_eq!(
            store.resolve_path("DataFiles/generalSettings"),
            PathBuf::from("/data/root/DataFiles/generalSettings")
        );
        assert!(!Path::new("/data/root").exists());
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let a = store.ensure_directory("DataFiles/data/User1").unwrap();
        let b = store.ensure_directory("DataFiles/data/User1").unwrap();
        assert_eq!(a, b);
        assert!(a.is_dir());
    }

    #[test]
    fn unique_name_keeps_free_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        assert_eq!(store.unique_name("", "HeadData"), "HeadData");
    }

    #[test]
    fn unique_name_never_returns_a_taken_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());

        let first = store.unique_name("dir", "HeadData");
        assert_eq!(first, "HeadData");
        store.save_text("{}", "dir", &first).unwrap();

        let second = store.unique_name("dir", "HeadData");
        assert_ne!(first, second);
        assert!(second.starts_with("HeadData"));
        store.overwrite_text("{}", "dir", &second).unwrap();

        let third = store.unique_name("dir", "HeadData");
        assert_ne!(third, first);
        assert_ne!(third, second);
    }

    #[test]
    fn save_then_load_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let name = store
            .save(&profile(), &Provenance::user("12"), "DataFiles/data/User12", "user12")
            .unwrap();
        assert_eq!(name, "user12");

        let loaded: UserProfile = store.load("DataFiles/data/User12/user12").unwrap();
        assert_eq!(loaded, profile());
    }

    #[test]
    fn save_then_load_session_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let record = SessionRecord::new(
            profile(),
            ObjectSnapshot::new(
                0.0,
                Vec3::new(0.125, 0.0, -0.5),
                vec![
                    ObjectPose::new("Apple", Vec3::new(0.5, 0.0, 0.0), Quat::IDENTITY),
                    ObjectPose::new("Lemon", Vec3::new(-0.5, 0.0, 0.25), Quat::new(0.0, 1.0, 0.0, 0.0)),
                ],
            ),
        );
        let name = store
            .save(&record, &Provenance::user("12"), "d", "record12")
            .unwrap();

        let loaded: SessionRecord = store.load(format!("d/{}", name)).unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.is_replayable());
    }

    #[test]
    fn save_then_load_head_sample() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let pose = HeadPose {
            camera_position: Vec3::new(0.0, 1.625, 0.0),
            camera_rotation: Quat::new(0.0, 0.5, 0.0, 0.75),
            gaze_origin: Vec3::new(0.0, 1.5, 0.0625),
            gaze_direction: Vec3::new(0.0, -0.25, 1.0),
        };
        let sample = HeadSample::at(2.5, &pose).unwrap();
        store
            .save(&sample, &Provenance::user("12"), "d", "HeadDataPrices12")
            .unwrap();

        let loaded: HeadSample = store.load("d/HeadDataPrices12").unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn save_twice_disambiguates() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let a = store.save(&profile(), &Provenance::user("12"), "d", "user12").unwrap();
        let b = store.save(&profile(), &Provenance::user("12"), "d", "user12").unwrap();
        assert_ne!(a, b);

        let loaded: UserProfile = store.load(format!("d/{}", b)).unwrap();
        assert_eq!(loaded, profile());
    }

    #[test]
    fn saved_file_is_finalized() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let snapshot = ObjectSnapshot::new(
            3.0,
            Vec3::new(0.0, 0.0, 0.25),
            vec![ObjectPose::new("Apple", Vec3::new(0.5, 0.75, 0.0), Quat::IDENTITY)],
        );
        store
            .save(&snapshot, &Provenance::user("1"), "d", "StartLocationPrices1")
            .unwrap();

        let status = inspect_file(tmp.path().join("d/StartLocationPrices1.json")).unwrap();
        assert_eq!(status.entries, 1);
        assert_eq!(status.end, EndMarker::End);

        let loaded: ObjectSnapshot = store.load("d/StartLocationPrices1").unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn overwrite_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        store.overwrite(&profile(), &Provenance::user("12"), "d", "p").unwrap();

        let other = UserProfile::new("13", UserGroup::GroupA, 2.0);
        store.overwrite(&other, &Provenance::user("13"), "d", "p").unwrap();

        let loaded: UserProfile = store.load("d/p").unwrap();
        assert_eq!(loaded, other);
        assert_eq!(fs::read_dir(tmp.path().join("d")).unwrap().count(), 1);
    }

    #[test]
    fn load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let err = store.load::<UserProfile>("nothing/here").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn load_empty_envelope_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        store
            .save_text(
                "{\"start\": \"x\", \"entries\": [], \"end\": \"END\"}",
                "d",
                "empty",
            )
            .unwrap();
        let err = store.load::<UserProfile>("d/empty").unwrap_err();
        assert!(matches!(err, StoreError::EmptyEnvelope(_)));
    }

    #[test]
    fn empty_names_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        assert!(matches!(
            store.save_text("{}", "d", ""),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.overwrite_text("{}", "", "x"),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn secure_load_heals_from_bundled_copy() {
        let store_dir = tempfile::tempdir().unwrap();
        let bundled_dir = tempfile::tempdir().unwrap();

        let bundled = DataStore::new(bundled_dir.path());
        bundled
            .save(&profile(), &Provenance::user("12"), "DataFiles/data/User12", "user12")
            .unwrap();

        let store = DataStore::new(store_dir.path()).with_bundled(bundled_dir.path());
        assert!(store
            .load::<UserProfile>("DataFiles/data/User12/user12")
            .is_err());

        let loaded = store
            .secure_load::<UserProfile>("DataFiles/data/User12/user12")
            .unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Bundled);
        assert_eq!(loaded.value, profile());

        let healed: UserProfile = store.load("DataFiles/data/User12/user12").unwrap();
        assert_eq!(healed, profile());
    }

    #[test]
    fn secure_load_prefers_the_store() {
        let store_dir = tempfile::tempdir().unwrap();
        let bundled_dir = tempfile::tempdir().unwrap();
        DataStore::new(bundled_dir.path())
            .overwrite(&profile(), &Provenance::user("12"), "d", "p")
            .unwrap();

        let store = DataStore::new(store_dir.path()).with_bundled(bundled_dir.path());
        let mine = UserProfile::new("77", UserGroup::GroupC, 1.0);
        store.overwrite(&mine, &Provenance::user("77"), "d", "p").unwrap();

        let loaded = store.secure_load::<UserProfile>("d/p").unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Store);
        assert_eq!(loaded.value, mine);
    }

    #[test]
    fn secure_load_falls_back_to_an_invalid_default() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        let loaded = store.secure_load::<UserProfile>("d/missing").unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Default);
        assert!(!loaded.value.is_valid());
        assert!(!tmp.path().join("d").exists());
    }

    #[test]
    fn secure_load_surfaces_malformed_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        store.overwrite_text("{ not json", "d", "broken").unwrap();
        let err = store.secure_load::<UserProfile>("d/broken").unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn user_ids_with_dots_keep_their_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DataStore::new(tmp.path());
        store.overwrite_text("{}", "d", "user1.5").unwrap();
        assert!(tmp.path().join("d/user1.5.json").exists());
    }
}
