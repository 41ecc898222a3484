//! Abstract animation names to concrete clips, with crossfading.
//!
//! Character assets name their clips inconsistently ("Idle", "idle",
//! "breathe", ...). Requests use abstract names; the alias table lists the
//! concrete candidates for each, in priority order, and the first candidate
//! present in the character's clip table wins even if a later one would fit
//! better. A miss falls back to the first clip the asset declares.
//!
//! The resolver itself is a small state machine:
//!
//! ```text
//! Empty --request--> Transitioning { from: None, to }
//! Resolved(a) --request(b)--> Transitioning { from: a, to: b }
//! Transitioning { from, to: b } --request(c)--> Transitioning { from: b, to: c }
//! Transitioning { .., to } --elapsed >= duration--> Resolved(to)
//! ```

use std::collections::HashMap;

use crate::animation::CharacterAsset;
use crate::settings::RenderConfig;

/// Crossfade length at `animation_speed == 1.0`.
pub const DEFAULT_CROSSFADE_US: u64 = 500_000;

/// Index of a clip within one character's clip table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipHandle(usize);

impl ClipHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Exact clip names of one character, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AnimationClipTable {
    names: Vec<String>,
    lookup: HashMap<String, ClipHandle>,
}

impl AnimationClipTable {
    /// Build from names in order. A repeated name keeps its first handle.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for name in names {
            let name = name.into();
            if table.lookup.contains_key(&name) {
                continue;
            }
            let handle = ClipHandle(table.names.len());
            table.lookup.insert(name.clone(), handle);
            table.names.push(name);
        }
        table
    }

    /// Handles match indices into `asset.clips`; asset validation rejects duplicates.
    pub fn from_asset(asset: &CharacterAsset) -> Self {
        Self::new(asset.clip_names())
    }

    pub fn get(&self, name: &str) -> Option<ClipHandle> {
        self.lookup.get(name).copied()
    }

    pub fn name(&self, handle: ClipHandle) -> Option<&str> {
        self.names.get(handle.0).map(String::as_str)
    }

    pub fn first(&self) -> Option<ClipHandle> {
        if self.names.is_empty() {
            None
        } else {
            Some(ClipHandle(0))
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub type AliasEntry = (&'static str, &'static [&'static str]);

const BUILTIN_ALIASES: &[AliasEntry] = &[
    (
        "idle",
        &[
            "idle", "Idle", "IDLE", "T-Pose", "TPose", "rest", "Rest", "REST", "breathe",
            "Breathe", "breathing", "stand", "Stand", "standing", "default", "Default",
        ],
    ),
    (
        "walking",
        &[
            "walk", "Walk", "WALK", "walking", "Walking", "WALKING", "run", "Run", "RUN",
            "running", "Running", "RUNNING",
        ],
    ),
    (
        "sitting",
        &["sit", "Sit", "SIT", "sitting", "Sitting", "SITTING", "seated", "Seated", "SEATED"],
    ),
    (
        "waving",
        &[
            "wave", "Wave", "WAVE", "waving", "Waving", "WAVING", "hello", "Hello", "HELLO",
            "greeting", "Greeting",
        ],
    ),
    (
        "talking",
        &[
            "talk", "Talk", "TALK", "talking", "Talking", "TALKING", "speak", "Speaking",
            "speaking",
        ],
    ),
    ("dancing", &["dance", "Dance", "DANCE", "dancing", "Dancing", "DANCING"]),
    ("handsBack", &["hands_back", "handsBack", "casual", "standing"]),
];

/// Abstract name to ordered concrete candidates. Immutable.
#[derive(Debug, Clone, Copy)]
pub struct AnimationAliasTable {
    entries: &'static [AliasEntry],
}

impl AnimationAliasTable {
    pub const fn new(entries: &'static [AliasEntry]) -> Self {
        Self { entries }
    }

    pub const fn builtin() -> Self {
        Self::new(BUILTIN_ALIASES)
    }

    /// Candidates for `request`. Names not in the table are their own sole candidate.
    pub fn candidates<'a>(&self, request: &'a str) -> Vec<&'a str> {
        match self.entries.iter().find(|(name, _)| *name == request) {
            Some((_, candidates)) => candidates.to_vec(),
            None => vec![request],
        }
    }

    pub fn abstract_names(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(name, _)| *name)
    }
}

impl Default for AnimationAliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Candidate number `candidate` (zero-based) was present in the clip table.
    Matched { handle: ClipHandle, candidate: usize },
    /// No candidate matched; the first clip stands in.
    Fallback { handle: ClipHandle },
    /// The clip table is empty.
    Empty,
}

impl Resolution {
    pub fn handle(self) -> Option<ClipHandle> {
        match self {
            Self::Matched { handle, .. } | Self::Fallback { handle } => Some(handle),
            Self::Empty => None,
        }
    }
}

/// Scan candidates top to bottom; the first present name wins.
pub fn resolve_clip(
    aliases: &AnimationAliasTable,
    clips: &AnimationClipTable,
    request: &str,
) -> Resolution {
    let Some(first) = clips.first() else {
        return Resolution::Empty;
    };
    aliases
        .candidates(request)
        .iter()
        .enumerate()
        .find_map(|(candidate, name)| {
            clips
                .get(name)
                .map(|handle| Resolution::Matched { handle, candidate })
        })
        .unwrap_or(Resolution::Fallback { handle: first })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// No clips; nothing happens.
    Empty,
    /// Resolved to the clip already targeted.
    Unchanged,
    /// A crossfade began from a settled state.
    Started,
    /// A crossfade in flight was redirected.
    Retargeted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    /// No clip has ever played.
    Empty,
    Resolved(ClipHandle),
    Transitioning {
        from: Option<ClipHandle>,
        to: ClipHandle,
        elapsed_us: u64,
        duration_us: u64,
    },
}

/// Clip weights for one frame. While a previous clip exists the weights sum
/// to one; fading in from nothing leaves the remainder to the rest pose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendWeights {
    pub from: Option<(ClipHandle, f32)>,
    pub to: Option<(ClipHandle, f32)>,
}

impl BlendWeights {
    pub fn single(handle: ClipHandle) -> Self {
        Self {
            from: None,
            to: Some((handle, 1.0)),
        }
    }

    pub fn crossfade(from: Option<ClipHandle>, to: ClipHandle, progress: f32) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        Self {
            from: from.map(|handle| (handle, 1.0 - progress)),
            to: Some((to, progress)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClipHandle, f32)> {
        self.from.into_iter().chain(self.to)
    }

    pub fn target(&self) -> Option<ClipHandle> {
        self.to.map(|(handle, _)| handle)
    }

    pub fn weight_of(&self, handle: ClipHandle) -> f32 {
        self.iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, w)| w)
            .sum()
    }

    pub fn total(&self) -> f32 {
        self.iter().map(|(_, w)| w).sum()
    }
}

/// Per-character animation state. Owns the character's clip table.
pub struct AnimationResolver {
    aliases: AnimationAliasTable,
    clips: AnimationClipTable,
    phase: AnimationPhase,
    crossfade_us: u64,
    warnings: u32,
}

impl AnimationResolver {
    pub fn new(aliases: AnimationAliasTable, clips: AnimationClipTable) -> Self {
        Self {
            aliases,
            clips,
            phase: AnimationPhase::Empty,
            crossfade_us: DEFAULT_CROSSFADE_US,
            warnings: 0,
        }
    }

    pub fn with_crossfade_us(mut self, crossfade_us: u64) -> Self {
        self.crossfade_us = crossfade_us;
        self
    }

    pub fn clips(&self) -> &AnimationClipTable {
        &self.clips
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    /// Fallbacks taken so far.
    pub fn warning_count(&self) -> u32 {
        self.warnings
    }

    /// The clip playing or being faded in.
    pub fn current_clip(&self) -> Option<ClipHandle> {
        match self.phase {
            AnimationPhase::Empty => None,
            AnimationPhase::Resolved(handle) => Some(handle),
            AnimationPhase::Transitioning { to, .. } => Some(to),
        }
    }

    pub fn current_clip_name(&self) -> Option<&str> {
        self.current_clip().and_then(|h| self.clips.name(h))
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, AnimationPhase::Transitioning { .. })
    }

    /// Crossfade length for the given config. Never zero.
    pub fn fade_duration_us(&self, config: &RenderConfig) -> u64 {
        let speed = if config.animation_speed.is_finite() && config.animation_speed > 0.0 {
            config.animation_speed as f64
        } else {
            1.0
        };
        ((self.crossfade_us as f64 / speed).round() as u64).max(1)
    }

    pub fn request(&mut self, name: &str, config: &RenderConfig) -> RequestOutcome {
        let target = match resolve_clip(&self.aliases, &self.clips, name) {
            Resolution::Empty => {
                log::debug!("Animation '{name}' requested but the character has no clips");
                return RequestOutcome::Empty;
            }
            Resolution::Matched { handle, .. } => handle,
            Resolution::Fallback { handle } => {
                self.warnings += 1;
                log::warn!(
                    "Animation '{}' not found, falling back to '{}'",
                    name,
                    self.clips.name(handle).unwrap_or("?")
                );
                handle
            }
        };

        if self.current_clip() == Some(target) {
            return RequestOutcome::Unchanged;
        }

        let duration_us = self.fade_duration_us(config);
        let (from, outcome) = match self.phase {
            AnimationPhase::Empty => (None, RequestOutcome::Started),
            AnimationPhase::Resolved(current) => (Some(current), RequestOutcome::Started),
            // The in-flight target becomes the clip being faded out.
            AnimationPhase::Transitioning { to, .. } => (Some(to), RequestOutcome::Retargeted),
        };
        self.phase = AnimationPhase::Transitioning {
            from,
            to: target,
            elapsed_us: 0,
            duration_us,
        };
        log::debug!(
            "Animation '{}' -> '{}' over {} us",
            name,
            self.clips.name(target).unwrap_or("?"),
            duration_us
        );
        outcome
    }

    pub fn tick(&mut self, dt_us: u64) {
        if let AnimationPhase::Transitioning {
            to,
            ref mut elapsed_us,
            duration_us,
            ..
        } = self.phase
        {
            *elapsed_us = elapsed_us.saturating_add(dt_us);
            if *elapsed_us >= duration_us {
                self.phase = AnimationPhase::Resolved(to);
            }
        }
    }

    pub fn weights(&self) -> BlendWeights {
        match self.phase {
            AnimationPhase::Empty => BlendWeights::default(),
            AnimationPhase::Resolved(handle) => BlendWeights::single(handle),
            AnimationPhase::Transitioning {
                from,
                to,
                elapsed_us,
                duration_us,
            } => BlendWeights::crossfade(from, to, elapsed_us as f32 / duration_us.max(1) as f32),
        }
    }
}
