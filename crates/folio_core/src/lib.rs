pub mod animation;
pub mod composer;
pub mod config;
pub mod draw;
pub mod input;
pub mod memory;
pub mod probe;
pub mod quality;
pub mod resolver;
pub mod section;
pub mod settings;
pub mod tier;
pub mod time;
pub mod visibility;
pub mod watcher;

pub use animation::{load_character_file, CharacterAsset, Pose, PoseMixer};
pub use composer::{
    FrameInput, FrameOutcome, Placeholder, PlaceholderKind, RenderSurface, SceneComposer,
    SubScene, SubSceneFactory, SurfaceError, SurfaceHandle,
};
pub use config::AppConfig;
pub use draw::{DrawInstance, DrawList, LightingRig, MeshKind};
pub use memory::{MemoryMonitor, MemoryReport, MemorySource};
pub use probe::{Capabilities, CapabilitySource, HostSignals};
pub use quality::QualityController;
pub use resolver::{AnimationAliasTable, AnimationClipTable, AnimationResolver};
pub use section::SectionKey;
pub use settings::RenderConfig;
pub use tier::PerformanceTier;
pub use time::FrameClock;
pub use visibility::{Rect, VisibilityGate, VisibilityHub};
