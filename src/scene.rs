//! The live list of objects in the scene. Collaborators that spawn and move
//! objects write into it between ticks; the logger only ever reads
//! snapshots out of it.

use crate::records::{ObjectPose, ObjectSnapshot, Quat, Vec3};
use log::debug;

#[derive(Debug, Clone, PartialEq)]
struct SceneObject {
    pose: ObjectPose,
    grabbed: bool,
}

/// The objects on the table, in spawn order, and the table's drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    objects: Vec<SceneObject>,
    offset: Vec3,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object at the end of the list.
    pub fn spawn(&mut self, pose: ObjectPose) {
        debug!("spawned {}", pose.id);
        self.objects.push(SceneObject {
            pose,
            grabbed: false,
        });
    }

    /// Replace the scene content with the objects of a snapshot, in order.
    pub fn populate(&mut self, snapshot: &ObjectSnapshot) {
        self.clear();
        for pose in snapshot.objects() {
            self.spawn(pose.clone());
        }
    }

    /// Remove every object.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// No objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object ids in spawn order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.pose.id.as_str())
    }

    /// Mark an object as held by the participant. Returns `false` if there
    /// is no such object.
    pub fn grab(&mut self, id: &str) -> bool {
        self.set_grabbed(id, true)
    }

    /// Put an object down. Returns `false` if there is no such object.
    pub fn release(&mut self, id: &str) -> bool {
        self.set_grabbed(id, false)
    }

    /// Put everything down.
    pub fn release_all(&mut self) {
        self.objects.iter_mut().for_each(|o| o.grabbed = false);
    }

    /// Update the pose of an object. Returns `false` if there is no such
    /// object.
    pub fn move_object(&mut self, id: &str, position: Vec3, rotation: Quat) -> bool {
        match self.objects.iter_mut().find(|o| o.pose.id == id) {
            Some(object) => {
                object.pose.position = position;
                object.pose.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Drift of the table the objects stand on.
    pub fn position_offset(&self) -> Vec3 {
        self.offset
    }

    /// Set the drift of the table.
    pub fn set_position_offset(&mut self, offset: Vec3) {
        self.offset = offset;
    }

    /// Every object in the scene.
    pub fn snapshot(&self, time: f64) -> ObjectSnapshot {
        self.collect(time, |_| true)
    }

    /// Only the objects currently held by the participant.
    pub fn manipulated_snapshot(&self, time: f64) -> ObjectSnapshot {
        self.collect(time, |o| o.grabbed)
    }

    fn collect(&self, time: f64, keep: impl Fn(&SceneObject) -> bool) -> ObjectSnapshot {
        let poses = self
            .objects
            .iter()
            .filter(|o| keep(o))
            .map(|o| o.pose.clone())
            .collect();
        ObjectSnapshot::new(time, self.offset, poses)
    }

    fn set_grabbed(&mut self, id: &str, grabbed: bool) -> bool {
        match self.objects.iter_mut().find(|o| o.pose.id == id) {
            Some(object) => {
                object.grabbed = grabbed;
                true
            }
            None => false,
        }
    }
}
