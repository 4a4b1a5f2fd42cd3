/// Keyframe animation clips and the mixer that plays them on a model.
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::scene::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// Keyframe values for one animated property
#[derive(Debug, Clone, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<UnitQuaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    fn len(&self) -> usize {
        match self {
            Keyframes::Translation(values) | Keyframes::Scale(values) => values.len(),
            Keyframes::Rotation(values) => values.len(),
        }
    }
}

/// One animated property of one node
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub node: usize,
    pub times: Vec<f32>,
    pub keyframes: Keyframes,
    pub interpolation: Interpolation,
}

impl Channel {
    /// Keyframe pair around `time` and the blend factor between them
    fn locate(&self, time: f32) -> Option<(usize, usize, f32)> {
        let count = self.times.len().min(self.keyframes.len());
        if count == 0 {
            return None;
        }
        if count == 1 || time <= self.times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= self.times[count - 1] {
            return Some((count - 1, count - 1, 0.0));
        }
        let next = self.times[..count].partition_point(|&t| t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let t = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        match self.interpolation {
            Interpolation::Step => Some((prev, prev, 0.0)),
            Interpolation::Linear => Some((prev, next, t)),
        }
    }

    /// Write the sampled value into the target node
    pub fn apply(&self, time: f32, model: &mut Model) {
        let Some((a, b, t)) = self.locate(time) else {
            return;
        };
        let Some(node) = model.nodes.get_mut(self.node) else {
            return;
        };
        match &self.keyframes {
            Keyframes::Translation(values) => {
                node.local.translation = values[a].lerp(&values[b], t);
            }
            Keyframes::Scale(values) => {
                node.local.scale = values[a].lerp(&values[b], t);
            }
            Keyframes::Rotation(values) => {
                node.local.rotation = values[a]
                    .try_slerp(&values[b], t, 1e-6)
                    .unwrap_or(values[a]);
            }
        }
    }
}

/// A named set of channels sharing one timeline
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Time of the last keyframe across all channels
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .fold(0.0, f32::max)
    }
}

/// Build a rotation from a glTF `[x, y, z, w]` quaternion
pub fn rotation_from_xyzw([x, y, z, w]: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
}

#[derive(Debug, Clone)]
struct ClipAction {
    clip: AnimationClip,
    time: f32,
    duration: f32,
}

/// Plays clips on one model, looping each clip over its own duration
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
}

impl AnimationMixer {
    /// A mixer with every clip already playing
    pub fn play_all(clips: Vec<AnimationClip>) -> Self {
        let actions = clips
            .into_iter()
            .map(|clip| ClipAction {
                duration: clip.duration(),
                clip,
                time: 0.0,
            })
            .collect();
        Self { actions }
    }

    pub fn clip_count(&self) -> usize {
        self.actions.len()
    }

    /// Current local time of each clip
    pub fn times(&self) -> Vec<f32> {
        self.actions.iter().map(|action| action.time).collect()
    }

    /// Advance every clip by `elapsed` seconds and pose the model
    pub fn update(&mut self, elapsed: f32, model: &mut Model) {
        for action in &mut self.actions {
            action.time += elapsed.max(0.0);
            if action.duration > 0.0 {
                action.time %= action.duration;
            } else {
                action.time = 0.0;
            }
            for channel in &action.clip.channels {
                channel.apply(action.time, model);
            }
        }
    }
}
