//! The value types that end up inside session files. Each one carries an
//! `is_valid()` predicate which is checked before the record is persisted or
//! handed to a collaborator; nothing invalid is ever written to a finalized
//! file.
//!
//! Records are plain data and are never edited in place once built. A new
//! snapshot replaces the old one wholesale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A position or direction in world space, in meters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// A vector from its components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// All components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A rotation as a unit quaternion.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    /// No rotation at all.
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// A quaternion from its components. Not normalized.
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about the vertical axis.
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle / 2.0;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }

    /// All components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The live head and eye pose as reported by the tracking collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Where the headset is.
    pub camera_position: Vec3,
    /// Which way the headset faces.
    pub camera_rotation: Quat,
    /// Where the combined gaze ray starts.
    pub gaze_origin: Vec3,
    /// Where the combined gaze ray points.
    pub gaze_direction: Vec3,
}

impl HeadPose {
    /// Every component is a finite number.
    pub fn is_valid(&self) -> bool {
        self.camera_position.is_finite()
            && self.camera_rotation.is_finite()
            && self.gaze_origin.is_finite()
            && self.gaze_direction.is_finite()
    }
}

/// One line of the head stream: a [HeadPose] tagged with the seconds elapsed
/// since logging started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadSample {
    /// Seconds since logging started.
    pub time: f64,
    /// See [HeadPose::camera_position].
    pub camera_position: Vec3,
    /// See [HeadPose::camera_rotation].
    pub camera_rotation: Quat,
    /// See [HeadPose::gaze_origin].
    pub gaze_origin: Vec3,
    /// See [HeadPose::gaze_direction].
    pub gaze_direction: Vec3,
}

impl HeadSample {
    /// Stamp a pose with its elapsed time. Returns `None` for a pose that
    /// is not fully set, so a half-built sample can never exist.
    pub fn at(time: f64, pose: &HeadPose) -> Option<Self> {
        if !time.is_finite() || !pose.is_valid() {
            return None;
        }

        Some(Self {
            time,
            camera_position: pose.camera_position,
            camera_rotation: pose.camera_rotation,
            gaze_origin: pose.gaze_origin,
            gaze_direction: pose.gaze_direction,
        })
    }

    /// Time and pose are finite numbers.
    pub fn is_valid(&self) -> bool {
        self.time.is_finite()
            && self.camera_position.is_finite()
            && self.camera_rotation.is_finite()
            && self.gaze_origin.is_finite()
            && self.gaze_direction.is_finite()
    }
}

/// The world pose of a single scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPose {
    /// Name of the object, unique within a scene.
    pub id: String,
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
}

impl ObjectPose {
    /// The pose of object `id`.
    pub fn new(id: impl Into<String>, position: Vec3, rotation: Quat) -> Self {
        Self {
            id: id.into(),
            position,
            rotation,
        }
    }
}

/// The poses of a group of objects at one instant.
///
/// `objects` is `None` when the snapshot was never populated (for instance a
/// default value produced by a failed load). An empty list is valid and means
/// no objects were present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// Seconds since logging started, or zero for a layout.
    pub time: f64,
    /// Correction for the drift of the table the objects stand on.
    pub position_offset: Vec3,
    /// The poses, see above for `None`.
    #[serde(default)]
    pub objects: Option<Vec<ObjectPose>>,
}

impl ObjectSnapshot {
    /// A populated snapshot.
    pub fn new(time: f64, position_offset: Vec3, objects: Vec<ObjectPose>) -> Self {
        Self {
            time,
            position_offset,
            objects: Some(objects),
        }
    }

    /// The snapshot was populated, possibly with no objects.
    pub fn is_valid(&self) -> bool {
        self.objects.is_some()
    }

    /// The poses in insertion order, empty if the snapshot was never populated.
    pub fn objects(&self) -> &[ObjectPose] {
        self.objects.as_deref().unwrap_or_default()
    }

    /// No object poses.
    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

/// The participant group a user was assigned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UserGroup {
    GroupA,
    GroupB,
    GroupC,
    #[default]
    Unset,
}

impl fmt::Display for UserGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserGroup::GroupA => "GroupA",
            UserGroup::GroupB => "GroupB",
            UserGroup::GroupC => "GroupC",
            UserGroup::Unset => "Unset",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for UserGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "groupa" | "a" => Ok(UserGroup::GroupA),
            "groupb" | "b" => Ok(UserGroup::GroupB),
            "groupc" | "c" => Ok(UserGroup::GroupC),
            "unset" | "none" => Ok(UserGroup::Unset),
            other => Err(format!("unknown user group {:?}", other)),
        }
    }
}

/// The settings one participant was registered with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The participant's id, also used in every file name of theirs.
    pub user_id: String,
    /// The group they were assigned to.
    pub group: UserGroup,
    /// Seconds between two logged samples.
    pub sampling_interval: f64,
}

impl UserProfile {
    /// A profile for `user_id`.
    pub fn new(user_id: impl Into<String>, group: UserGroup, sampling_interval: f64) -> Self {
        Self {
            user_id: user_id.into(),
            group,
            sampling_interval,
        }
    }

    /// The profile has a user id.
    pub fn is_valid(&self) -> bool {
        !self.user_id.is_empty()
    }
}

/// A user profile paired with the object layout that was entered for it.
/// This is what gets replayed into the scene for every phase of that user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Who.
    pub profile: UserProfile,
    /// The layout to set up for them.
    pub snapshot: ObjectSnapshot,
}

impl SessionRecord {
    /// Pair a profile with its layout.
    pub fn new(profile: UserProfile, snapshot: ObjectSnapshot) -> Self {
        Self { profile, snapshot }
    }

    /// Both halves are valid.
    pub fn is_valid(&self) -> bool {
        self.profile.is_valid() && self.snapshot.is_valid()
    }

    /// Valid, and has at least one object to place into the scene.
    pub fn is_replayable(&self) -> bool {
        self.is_valid() && !self.snapshot.is_empty()
    }

    /// Shorthand for the profile's user id.
    pub fn user_id(&self) -> &str {
        &self.profile.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> HeadPose {
        HeadPose {
            camera_position: Vec3::new(0.0, 1.6, 0.0),
            camera_rotation: Quat::from_yaw(0.3),
            gaze_origin: Vec3::new(0.0, 1.6, 0.05),
            gaze_direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    #[test]
    fn profile_validity_follows_user_id() {
        assert!(UserProfile::new("7", UserGroup::GroupA, 1.0).is_valid());
        assert!(UserProfile::new("7", UserGroup::Unset, 0.0).is_valid());
        assert!(!UserProfile::new("", UserGroup::GroupB, 1.0).is_valid());
        assert!(!UserProfile::default().is_valid());
    }

    #[test]
    fn head_sample_rejects_partial_pose() {
        assert!(HeadSample::at(1.5, &pose()).is_some());

        let mut broken = pose();
        broken.gaze_direction.y = f32::NAN;
        assert!(HeadSample::at(1.5, &broken).is_none());
        assert!(HeadSample::at(f64::INFINITY, &pose()).is_none());
    }

    #[test]
    fn empty_snapshot_is_valid_but_not_replayable() {
        let empty = ObjectSnapshot::new(0.0, Vec3::ZERO, vec![]);
        assert!(empty.is_valid());
        assert!(!ObjectSnapshot::default().is_valid());

        let profile = UserProfile::new("3", UserGroup::GroupC, 0.5);
        let record = SessionRecord::new(profile.clone(), empty);
        assert!(record.is_valid());
        assert!(!record.is_replayable());

        let full = ObjectSnapshot::new(
            0.0,
            Vec3::ZERO,
            vec![ObjectPose::new("Apple", Vec3::new(0.1, 0.8, 0.2), Quat::IDENTITY)],
        );
        assert!(SessionRecord::new(profile, full).is_replayable());
    }

    #[test]
    fn snapshot_without_objects_field_is_invalid() {
        let snapshot: ObjectSnapshot =
            serde_json::from_str(r#"{"time":1.0,"position_offset":{"x":0,"y":0,"z":0}}"#).unwrap();
        assert!(!snapshot.is_valid());
        assert!(snapshot.objects().is_empty());
    }

    #[test]
    fn group_parses_short_and_long_names() {
        assert_eq!("b".parse::<UserGroup>(), Ok(UserGroup::GroupB));
        assert_eq!("GroupC".parse::<UserGroup>(), Ok(UserGroup::GroupC));
        assert!("elderly".parse::<UserGroup>().is_err());
    }
}
