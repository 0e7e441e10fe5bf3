//! Stand-ins for the headset. They produce plausible head poses, lay out
//! objects and move them around, so a session can run without any
//! hardware attached.

use crate::phase::{Phase, Stage, Submanager};
use crate::records::{
    HeadPose, ObjectPose, ObjectSnapshot, Quat, SessionRecord, UserGroup, UserProfile, Vec3,
};
use crate::scene::Scene;
use log::{debug, trace};
use rand::prelude::*;
use std::f32::consts::PI;

const FRUITS: [&str; 6] = ["Apple", "Pear", "Lemon", "Plum", "Melon", "Cherry"];

/// A participant slowly looking around while standing at the table.
#[derive(Debug)]
pub struct DummyTracker {
    rng: ThreadRng,
    noise: f32,
    height: f32,
}

impl Default for DummyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyTracker {
    /// A tracker at standing height with a centimetre of jitter.
    pub fn new() -> Self {
        DummyTracker {
            rng: thread_rng(),
            noise: 0.01,
            height: 1.6,
        }
    }

    /// Set the amplitude of the jitter, in metres.
    pub fn set_noise(self, noise: f32) -> Self {
        DummyTracker { noise, ..self }
    }

    /// The pose `secs` seconds into the session.
    pub fn pose_at(&mut self, secs: f64) -> HeadPose {
        let yaw = (secs as f32 * 0.2).sin() * PI / 4.0;
        let position = Vec3::new(self.jitter(), self.height + self.jitter(), self.jitter());
        HeadPose {
            camera_position: position,
            camera_rotation: Quat::from_yaw(yaw),
            gaze_origin: position,
            gaze_direction: Vec3::new(yaw.sin(), -0.3, yaw.cos()),
        }
    }

    fn jitter(&mut self) -> f32 {
        if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..self.noise)
        } else {
            0.0
        }
    }
}

/// `count` objects evenly spread on a circle of `range` meters around the
/// table's center.
pub fn circular_layout(count: usize, range: f32) -> Vec<ObjectPose> {
    (0..count)
        .map(|i| (i as f32 / count as f32) * 2.0 * PI)
        .zip(FRUITS.iter().cycle())
        .map(|(angle, name)| {
            ObjectPose::new(
                *name,
                Vec3::new(angle.cos() * range, 0.0, angle.sin() * range),
                Quat::from_yaw(angle),
            )
        })
        .collect()
}

/// A complete record for a made-up participant.
pub fn demo_record(user_id: &str, group: UserGroup, sampling_interval: f64) -> SessionRecord {
    SessionRecord::new(
        UserProfile::new(user_id, group, sampling_interval),
        ObjectSnapshot::new(0.0, Vec3::ZERO, circular_layout(4, 0.4)),
    )
}

/// Puts the current user's objects on the table when a track phase starts
/// and takes them away once it is over.
#[derive(Debug, Default)]
pub struct TableSetter;

impl Submanager for TableSetter {
    fn on_phase_entered(&mut self, phase: Phase, stage: &mut Stage<'_>) {
        match phase {
            Phase::Test(_) | Phase::Estimation(_) => {
                if let Some(set) = stage.current_set {
                    stage.scene.populate(&set.snapshot);
                    stage.scene.set_position_offset(set.snapshot.position_offset);
                    debug!("laid out {} objects for {}", stage.scene.len(), phase);
                }
            }
            Phase::Pause | Phase::End | Phase::SettingsMenu => {
                stage.scene.clear();
            }
            Phase::Initialization => {}
        }
    }
}

/// Picks up an object now and then, carries it a bit and puts it down.
#[derive(Debug)]
pub struct DummyHands {
    rng: ThreadRng,
    held: Option<String>,
}

impl Default for DummyHands {
    fn default() -> Self {
        DummyHands {
            rng: thread_rng(),
            held: None,
        }
    }
}

impl DummyHands {
    /// Advance the hands by one frame.
    pub fn step(&mut self, scene: &mut Scene) {
        match self.held.take() {
            Some(id) if self.rng.gen_bool(0.1) => {
                scene.release(&id);
                trace!("released {}", id);
            }
            Some(id) => {
                let to = Vec3::new(
                    self.rng.gen_range(-0.5..0.5),
                    0.0,
                    self.rng.gen_range(-0.5..0.5),
                );
                scene.move_object(&id, to, Quat::IDENTITY);
                self.held = Some(id);
            }
            None => {
                let ids: Vec<String> = scene.ids().map(str::to_owned).collect();
                if let Some(id) = ids.choose(&mut self.rng) {
                    if self.rng.gen_bool(0.05) && scene.grab(id) {
                        trace!("grabbed {}", id);
                        self.held = Some(id.clone());
                    }
                }
            }
        }
    }

    /// Id of the object in hand, if any.
    pub fn holding(&self) -> Option<&str> {
        self.held.as_deref()
    }
}
