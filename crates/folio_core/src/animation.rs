//! Character animation clips: pose keyframes, deterministic playback, and
//! weighted pose blending.
//!
//! A character asset is a list of named clips. Each clip is a sequence of
//! pose keyframes with per-frame durations. Timing uses integer microseconds
//! (`u64`) so playback advances identically regardless of frame-time jitter
//! in the float domain.
//!
//! The JSON format stores `duration_ms` for human readability; on load this
//! is converted to `duration_us` for internal use. Clips are stored as an
//! array so their authored order is preserved; the clip table relies on it
//! for its deterministic fallback.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::resolver::{BlendWeights, ClipHandle};

pub const CHARACTER_FORMAT_VERSION: &str = "0.1";

/// Longest single keyframe accepted from a character file.
pub const MAX_FRAME_DURATION_MS: u64 = 60_000;

/// Joint angles and offsets the character rig understands. All angles are
/// radians; `body_lift` is in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub body_lift: f32,
    pub body_yaw: f32,
    pub lean: f32,
    pub head_pitch: f32,
    pub arm_left: f32,
    pub arm_right: f32,
}

impl Pose {
    pub fn lerp(&self, other: &Pose, t: f32) -> Pose {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Pose {
            body_lift: mix(self.body_lift, other.body_lift),
            body_yaw: mix(self.body_yaw, other.body_yaw),
            lean: mix(self.lean, other.lean),
            head_pitch: mix(self.head_pitch, other.head_pitch),
            arm_left: mix(self.arm_left, other.arm_left),
            arm_right: mix(self.arm_right, other.arm_right),
        }
    }

    fn scaled(&self, w: f32) -> Pose {
        Pose {
            body_lift: self.body_lift * w,
            body_yaw: self.body_yaw * w,
            lean: self.lean * w,
            head_pitch: self.head_pitch * w,
            arm_left: self.arm_left * w,
            arm_right: self.arm_right * w,
        }
    }

    fn add(&self, other: &Pose) -> Pose {
        Pose {
            body_lift: self.body_lift + other.body_lift,
            body_yaw: self.body_yaw + other.body_yaw,
            lean: self.lean + other.lean,
            head_pitch: self.head_pitch + other.head_pitch,
            arm_left: self.arm_left + other.arm_left,
            arm_right: self.arm_right + other.arm_right,
        }
    }
}

/// A single keyframe in an animation clip.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub pose: Pose,
    pub duration_us: u64,
}

/// A sequence of keyframes that can loop or play once.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub frames: Vec<AnimationFrame>,
    pub looping: bool,
}

impl AnimationClip {
    /// Total duration of one full cycle in microseconds.
    pub fn total_duration_us(&self) -> u64 {
        self.frames.iter().map(|f| f.duration_us).sum()
    }
}

/// A loaded character: its id and clips in authored order.
#[derive(Debug, Clone)]
pub struct CharacterAsset {
    pub version: String,
    pub character_id: String,
    pub clips: Vec<(String, AnimationClip)>,
}

impl CharacterAsset {
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.iter().map(|(name, _)| name.as_str())
    }

    pub fn clip(&self, handle: ClipHandle) -> Option<&AnimationClip> {
        self.clips.get(handle.index()).map(|(_, clip)| clip)
    }
}

/// Playback position within one clip.
#[derive(Debug, Clone, Default)]
pub struct ClipPlayback {
    pub frame_index: usize,
    pub elapsed_us: u64,
    pub finished: bool,
}

impl ClipPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `dt_us` microseconds using integer arithmetic only.
    pub fn tick(&mut self, dt_us: u64, clip: &AnimationClip) {
        if clip.frames.is_empty() || self.finished {
            return;
        }
        if self.frame_index >= clip.frames.len() {
            self.frame_index = 0;
        }

        self.elapsed_us += dt_us;

        loop {
            let current_frame = &clip.frames[self.frame_index];
            if self.elapsed_us < current_frame.duration_us {
                break;
            }

            self.elapsed_us -= current_frame.duration_us;
            self.frame_index += 1;

            if self.frame_index >= clip.frames.len() {
                if clip.looping {
                    self.frame_index = 0;
                } else {
                    self.frame_index = clip.frames.len() - 1;
                    self.elapsed_us = 0;
                    self.finished = true;
                    break;
                }
            }
        }
    }

    /// Pose at the current position, interpolated toward the next keyframe.
    pub fn sample_pose(&self, clip: &AnimationClip) -> Pose {
        let Some(frame) = clip.frames.get(self.frame_index) else {
            return clip.frames.last().map(|f| f.pose).unwrap_or_default();
        };
        if self.finished {
            return frame.pose;
        }
        let next_index = self.frame_index + 1;
        let next = if next_index < clip.frames.len() {
            &clip.frames[next_index]
        } else if clip.looping {
            &clip.frames[0]
        } else {
            return frame.pose;
        };
        let t = self.elapsed_us as f32 / frame.duration_us.max(1) as f32;
        frame.pose.lerp(&next.pose, t.clamp(0.0, 1.0))
    }
}

/// Per-character clip playback driven by the resolver's blend weights.
/// A clip that becomes the fade target starts from its first frame.
#[derive(Debug, Default)]
pub struct PoseMixer {
    playbacks: HashMap<ClipHandle, ClipPlayback>,
}

impl PoseMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep playback state only for clips that currently carry weight.
    pub fn sync(&mut self, weights: &BlendWeights) {
        self.playbacks
            .retain(|handle, _| weights.weight_of(*handle) > 0.0 || weights.target() == Some(*handle));
        for (handle, _) in weights.iter() {
            self.playbacks.entry(handle).or_default();
        }
    }

    /// Restart the target clip from its first frame.
    pub fn restart(&mut self, handle: ClipHandle) {
        self.playbacks.insert(handle, ClipPlayback::new());
    }

    pub fn tick(&mut self, dt_us: u64, asset: &CharacterAsset) {
        for (handle, playback) in self.playbacks.iter_mut() {
            if let Some(clip) = asset.clip(*handle) {
                playback.tick(dt_us, clip);
            }
        }
    }

    /// Weighted pose. Any weight not assigned to a clip falls back to the rest pose.
    pub fn pose(&self, weights: &BlendWeights, asset: &CharacterAsset) -> Pose {
        let mut pose = Pose::default();
        for (handle, weight) in weights.iter() {
            let (Some(clip), Some(playback)) = (asset.clip(handle), self.playbacks.get(&handle))
            else {
                continue;
            };
            pose = pose.add(&playback.sample_pose(clip).scaled(weight));
        }
        pose
    }

    pub fn active_clips(&self) -> usize {
        self.playbacks.len()
    }
}

// --- JSON deserialization types (private) ---

#[derive(Debug, Deserialize)]
struct CharacterFileJson {
    version: String,
    character_id: String,
    #[serde(default)]
    clips: Vec<ClipJson>,
}

#[derive(Debug, Deserialize)]
struct ClipJson {
    name: String,
    frames: Vec<FrameJson>,
    #[serde(default)]
    looping: bool,
}

#[derive(Debug, Deserialize)]
struct FrameJson {
    #[serde(default)]
    pose: Pose,
    duration_ms: u64,
}

/// Load a character definition file from disk.
pub fn load_character_file(path: &Path) -> Result<CharacterAsset, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read character file {}: {e}", path.display()))?;
    parse_character_json(&raw)
        .map_err(|e| format!("Failed to load character file {}: {e}", path.display()))
}

pub fn parse_character_json(raw: &str) -> Result<CharacterAsset, String> {
    let json: CharacterFileJson =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    validate_character_json(&json)?;

    let mut clips = Vec::with_capacity(json.clips.len());
    for clip_json in json.clips {
        let mut frames = Vec::with_capacity(clip_json.frames.len());
        for f in clip_json.frames {
            let duration_us = f.duration_ms.checked_mul(1000).ok_or_else(|| {
                format!(
                    "clip '{}' frame duration {}ms overflows",
                    clip_json.name, f.duration_ms
                )
            })?;
            frames.push(AnimationFrame {
                pose: f.pose,
                duration_us,
            });
        }
        clips.push((
            clip_json.name,
            AnimationClip {
                frames,
                looping: clip_json.looping,
            },
        ));
    }

    Ok(CharacterAsset {
        version: json.version,
        character_id: json.character_id,
        clips,
    })
}

fn validate_character_json(json: &CharacterFileJson) -> Result<(), String> {
    if json.version != CHARACTER_FORMAT_VERSION {
        return Err(format!(
            "Character validation failed: unsupported version '{}'",
            json.version
        ));
    }
    if json.character_id.is_empty() {
        return Err("Character validation failed: character_id is empty".to_string());
    }
    let mut seen = std::collections::HashSet::new();
    for clip in &json.clips {
        if clip.name.is_empty() {
            return Err("Character validation failed: clip with empty name".to_string());
        }
        if !seen.insert(clip.name.as_str()) {
            return Err(format!(
                "Character validation failed: duplicate clip '{}'",
                clip.name
            ));
        }
        if clip.frames.is_empty() {
            return Err(format!(
                "Character validation failed: clip '{}' has no frames",
                clip.name
            ));
        }
        for (i, frame) in clip.frames.iter().enumerate() {
            if frame.duration_ms == 0 {
                return Err(format!(
                    "Character validation failed: clip '{}' frame {} has zero duration",
                    clip.name, i
                ));
            }
            if frame.duration_ms > MAX_FRAME_DURATION_MS {
                return Err(format!(
                    "Character validation failed: clip '{}' frame {} lasts {}ms, max {}ms",
                    clip.name, i, frame.duration_ms, MAX_FRAME_DURATION_MS
                ));
            }
        }
    }
    Ok(())
}
