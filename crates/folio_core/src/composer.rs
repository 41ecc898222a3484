//! Section-driven scene composition over one persistent rendering surface.
//!
//! The composer owns the surface for the whole session and mounts exactly one
//! sub-scene at a time: the one for the active page section. Section changes
//! and animation requests are queued edge events, applied at the start of the
//! next `frame` so a swap never happens halfway through a frame.
//!
//! Frame flow:
//!
//! 1. apply pending section / animation events
//! 2. context lost: suspended, nothing drawn
//! 3. surface container off-screen: hidden, nothing ticked or drawn
//! 4. tick the mounted sub-scene, gated by its own section visibility
//! 5. rebuild the draw list and hand it to the surface
//!
//! A lost context unmounts the active sub-scene and holds every draw until
//! `retry` restores the surface and mounts the section again.

use std::collections::HashMap;
use std::fmt;

use glam::{Mat4, Vec2, Vec3};

use crate::draw::{rgb, DrawInstance, DrawList, LightingRig, MeshKind};
use crate::section::SectionKey;
use crate::settings::RenderConfig;
use crate::visibility::{Rect, VisibilityGate, VisibilityHub};

/// Identity of a rendering surface. Stable for the surface's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The GPU context is gone; nothing can draw until it is restored.
    ContextLost(String),
    /// A transient failure; the next frame may succeed.
    Other(String),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextLost(reason) => write!(f, "context lost: {reason}"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Everything the surface needs for one frame.
pub struct FrameDraw<'a> {
    pub section: SectionKey,
    pub lighting: &'a LightingRig,
    pub draws: &'a DrawList,
    pub config: &'a RenderConfig,
}

pub trait RenderSurface {
    fn handle(&self) -> SurfaceHandle;
    fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), SurfaceError>;
    /// Recreate the context after a loss. Must keep the same handle.
    fn restore(&mut self) -> Result<(), String>;
}

/// Content mounted for one section. Owns its drawables exclusively.
pub trait SubScene {
    fn name(&self) -> &str;

    /// Acquire resources. An error swaps in the static placeholder.
    fn mount(&mut self) -> Result<(), String>;

    /// Advance one frame. Must not mutate anything when `visible` is false.
    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig);

    fn draw(&self, out: &mut DrawList);

    /// Release everything acquired since `mount`.
    fn unmount(&mut self);

    fn on_animation_request(&mut self, _name: &str, _config: &RenderConfig) {}

    /// Normalised pointer position, each axis in `[0, 1]`.
    fn set_pointer(&mut self, _pointer: Vec2) {}
}

pub trait SubSceneFactory {
    /// `None` for sections without 3D content.
    fn create(&mut self, section: SectionKey) -> Option<Box<dyn SubScene>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Content failed to load.
    Error,
    /// Content is still on its way.
    Loading,
}

/// Deliberately simple static stand-in. Never fails, never animates.
pub struct Placeholder {
    kind: PlaceholderKind,
    offset: Vec3,
}

impl Placeholder {
    pub fn new(kind: PlaceholderKind) -> Self {
        Self {
            kind,
            offset: Vec3::ZERO,
        }
    }

    pub fn at(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }
}

impl SubScene for Placeholder {
    fn name(&self) -> &str {
        match self.kind {
            PlaceholderKind::Error => "placeholder:error",
            PlaceholderKind::Loading => "placeholder:loading",
        }
    }

    fn mount(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn tick(&mut self, _dt: f64, _visible: bool, _config: &RenderConfig) {}

    fn draw(&self, out: &mut DrawList) {
        let body = Mat4::from_translation(self.offset) * Mat4::from_scale(Vec3::new(1.0, 2.0, 0.5));
        match self.kind {
            PlaceholderKind::Error => {
                out.push(DrawInstance::new(MeshKind::Cube, body, rgb(0xff6b6b, 1.0)));
                let head = Mat4::from_translation(self.offset + Vec3::new(0.0, 1.3, 0.0))
                    * Mat4::from_scale(Vec3::splat(0.3));
                out.push(DrawInstance::new(MeshKind::Sphere, head, rgb(0xfeca57, 1.0)));
            }
            PlaceholderKind::Loading => {
                out.push(
                    DrawInstance::new(MeshKind::Cube, body, rgb(0x48cae4, 0.6)).without_shadow(),
                );
            }
        }
    }

    fn unmount(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn { instances: usize },
    /// The surface container is off-screen.
    Hidden,
    /// The context is lost and waiting for `retry`.
    Suspended,
    /// The surface reported a transient error.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposerStats {
    pub frames_drawn: u64,
    pub frames_hidden: u64,
    pub frames_suspended: u64,
    pub frames_skipped: u64,
    pub mounts: u64,
    pub unmounts: u64,
    pub mount_failures: u64,
}

pub struct FrameInput {
    pub dt: f64,
    pub config: RenderConfig,
    pub pointer: Option<Vec2>,
}

struct MountedScene {
    section: SectionKey,
    scene: Box<dyn SubScene>,
    gate: VisibilityGate,
}

pub struct SceneComposer<S: RenderSurface, F: SubSceneFactory> {
    surface: S,
    factory: F,
    hub: VisibilityHub,
    lighting: LightingRig,
    surface_rect: Rect,
    surface_gate: VisibilityGate,
    section_rects: HashMap<SectionKey, Rect>,
    active_section: SectionKey,
    mounted: Option<MountedScene>,
    pending_section: Option<SectionKey>,
    pending_animations: Vec<String>,
    draw_list: DrawList,
    lost: Option<String>,
    stats: ComposerStats,
}

impl<S: RenderSurface, F: SubSceneFactory> SceneComposer<S, F> {
    /// Nothing is mounted until the first `frame` applies `initial_section`.
    pub fn new(
        surface: S,
        factory: F,
        hub: VisibilityHub,
        surface_rect: Rect,
        initial_section: SectionKey,
    ) -> Self {
        let surface_gate = hub.observe(surface_rect);
        log::info!(
            "Scene composer on surface {:?}, initial section '{}'",
            surface.handle(),
            initial_section
        );
        Self {
            surface,
            factory,
            hub,
            lighting: LightingRig::default(),
            surface_rect,
            surface_gate,
            section_rects: HashMap::new(),
            active_section: initial_section,
            mounted: None,
            pending_section: Some(initial_section),
            pending_animations: Vec::new(),
            draw_list: DrawList::new(),
            lost: None,
            stats: ComposerStats::default(),
        }
    }

    pub fn surface_handle(&self) -> SurfaceHandle {
        self.surface.handle()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn hub(&self) -> &VisibilityHub {
        &self.hub
    }

    pub fn lighting(&self) -> &LightingRig {
        &self.lighting
    }

    pub fn stats(&self) -> ComposerStats {
        self.stats
    }

    pub fn active_section(&self) -> SectionKey {
        self.active_section
    }

    pub fn mounted_scene_name(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.scene.name())
    }

    pub fn is_surface_visible(&self) -> bool {
        self.surface_gate.is_visible()
    }

    pub fn is_scene_visible(&self) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.gate.is_visible())
    }

    pub fn has_recoverable_error(&self) -> bool {
        self.lost.is_some()
    }

    pub fn lost_reason(&self) -> Option<&str> {
        self.lost.as_deref()
    }

    /// The surface container moved or resized (page coordinates).
    pub fn set_surface_rect(&mut self, rect: Rect) {
        self.surface_rect = rect;
        self.surface_gate.set_target_rect(rect);
    }

    /// Layout of a section's container (page coordinates).
    pub fn set_section_rect(&mut self, section: SectionKey, rect: Rect) {
        self.section_rects.insert(section, rect);
        if let Some(mounted) = &self.mounted {
            if mounted.section == section {
                mounted.gate.set_target_rect(rect);
            }
        }
    }

    /// Queue a section change for the next frame. The latest one wins.
    pub fn set_active_section(&mut self, section: SectionKey) {
        self.pending_section = Some(section);
    }

    /// Queue an animation request for the next frame.
    pub fn request_animation(&mut self, name: &str) {
        self.pending_animations.push(name.to_string());
    }

    pub fn frame(&mut self, input: FrameInput) -> FrameOutcome {
        self.apply_pending(&input.config);

        if self.lost.is_some() {
            self.stats.frames_suspended += 1;
            return FrameOutcome::Suspended;
        }
        if !self.surface_gate.is_visible() {
            self.stats.frames_hidden += 1;
            return FrameOutcome::Hidden;
        }

        self.draw_list.clear();
        if let Some(mounted) = self.mounted.as_mut() {
            if let Some(pointer) = input.pointer {
                mounted.scene.set_pointer(pointer);
            }
            let visible = mounted.gate.is_visible();
            mounted.scene.tick(input.dt, visible, &input.config);
            if visible {
                mounted.scene.draw(&mut self.draw_list);
            }
        }

        let frame = FrameDraw {
            section: self.active_section,
            lighting: &self.lighting,
            draws: &self.draw_list,
            config: &input.config,
        };
        match self.surface.draw(&frame) {
            Ok(()) => {
                self.stats.frames_drawn += 1;
                FrameOutcome::Drawn {
                    instances: self.draw_list.len(),
                }
            }
            Err(SurfaceError::ContextLost(reason)) => {
                self.notify_context_lost(&reason);
                self.stats.frames_suspended += 1;
                FrameOutcome::Suspended
            }
            Err(SurfaceError::Other(reason)) => {
                log::warn!("Frame skipped: {reason}");
                self.stats.frames_skipped += 1;
                FrameOutcome::Skipped
            }
        }
    }

    /// Halt drawing and release the active sub-scene. Idempotent.
    pub fn notify_context_lost(&mut self, reason: &str) {
        if self.lost.is_some() {
            return;
        }
        log::error!("Rendering context lost: {reason}");
        self.unmount_active();
        self.lost = Some(reason.to_string());
    }

    /// Restore the surface and remount the active section.
    pub fn retry(&mut self) -> Result<(), String> {
        if self.lost.is_none() {
            return Ok(());
        }
        self.surface.restore().map_err(|e| {
            log::error!("Surface restore failed: {e}");
            format!("Surface restore failed: {e}")
        })?;
        self.lost = None;
        self.mount_active();
        log::info!("Rendering resumed on section '{}'", self.active_section);
        Ok(())
    }

    fn apply_pending(&mut self, config: &RenderConfig) {
        if let Some(section) = self.pending_section.take() {
            let already_mounted = self.mounted.as_ref().is_some_and(|m| m.section == section);
            if !already_mounted {
                self.unmount_active();
                self.active_section = section;
                if self.lost.is_none() {
                    self.mount_active();
                }
            }
        }

        for name in self.pending_animations.drain(..) {
            match self.mounted.as_mut() {
                Some(mounted) => mounted.scene.on_animation_request(&name, config),
                None => log::debug!("Animation '{name}' dropped: nothing mounted"),
            }
        }
    }

    fn unmount_active(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            mounted.scene.unmount();
            self.stats.unmounts += 1;
            log::debug!(
                "Unmounted '{}' from section '{}'",
                mounted.scene.name(),
                mounted.section
            );
            // Dropping `mounted` releases its visibility gate.
        }
    }

    fn mount_active(&mut self) {
        let section = self.active_section;
        let Some(mut scene) = self.factory.create(section) else {
            log::debug!("Section '{section}' has no 3D content");
            return;
        };
        let rect = self
            .section_rects
            .get(&section)
            .copied()
            .unwrap_or(self.surface_rect);
        let gate = self.hub.observe(rect);

        if let Err(e) = scene.mount() {
            log::error!("Failed to mount '{}' for section '{section}': {e}", scene.name());
            self.stats.mount_failures += 1;
            scene.unmount();
            scene = Box::new(Placeholder::new(PlaceholderKind::Error));
        }
        log::debug!("Mounted '{}' for section '{section}'", scene.name());
        self.stats.mounts += 1;
        self.mounted = Some(MountedScene {
            section,
            scene,
            gate,
        });
    }
}

impl<S: RenderSurface, F: SubSceneFactory> Drop for SceneComposer<S, F> {
    fn drop(&mut self) {
        self.unmount_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::ObserverOptions;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    type Log = Rc<RefCell<Vec<String>>>;

    struct MockSurface {
        handle: SurfaceHandle,
        log: Log,
        fail_next: Option<SurfaceError>,
        restore_ok: bool,
    }

    impl RenderSurface for MockSurface {
        fn handle(&self) -> SurfaceHandle {
            self.handle
        }

        fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), SurfaceError> {
            if let Some(err) = self.fail_next.take() {
                return Err(err);
            }
            self.log
                .borrow_mut()
                .push(format!("draw {} {}", frame.section, frame.draws.len()));
            Ok(())
        }

        fn restore(&mut self) -> Result<(), String> {
            self.log.borrow_mut().push("restore".to_string());
            if self.restore_ok {
                Ok(())
            } else {
                Err("adapter unavailable".to_string())
            }
        }
    }

    struct MockScene {
        section: SectionKey,
        log: Log,
        mutations: Rc<Cell<u32>>,
        fail_mount: bool,
    }

    impl SubScene for MockScene {
        fn name(&self) -> &str {
            self.section.label()
        }

        fn mount(&mut self) -> Result<(), String> {
            self.log.borrow_mut().push(format!("mount {}", self.section));
            if self.fail_mount {
                Err("asset missing".to_string())
            } else {
                Ok(())
            }
        }

        fn tick(&mut self, _dt: f64, visible: bool, _config: &RenderConfig) {
            if !visible {
                return;
            }
            self.mutations.set(self.mutations.get() + 1);
        }

        fn draw(&self, out: &mut DrawList) {
            out.push(DrawInstance::new(MeshKind::Cube, Mat4::IDENTITY, [1.0; 4]));
        }

        fn unmount(&mut self) {
            self.log.borrow_mut().push(format!("unmount {}", self.section));
        }

        fn on_animation_request(&mut self, name: &str, _config: &RenderConfig) {
            self.log.borrow_mut().push(format!("animate {name}"));
        }
    }

    struct MockFactory {
        log: Log,
        mutations: Rc<Cell<u32>>,
        failing: Option<SectionKey>,
    }

    impl SubSceneFactory for MockFactory {
        fn create(&mut self, section: SectionKey) -> Option<Box<dyn SubScene>> {
            if section == SectionKey::Projects {
                return None;
            }
            Some(Box::new(MockScene {
                section,
                log: self.log.clone(),
                mutations: self.mutations.clone(),
                fail_mount: self.failing == Some(section),
            }))
        }
    }

    struct Fixture {
        composer: SceneComposer<MockSurface, MockFactory>,
        log: Log,
        mutations: Rc<Cell<u32>>,
        hub: VisibilityHub,
    }

    fn fixture(failing: Option<SectionKey>) -> Fixture {
        let log: Log = Rc::default();
        let mutations = Rc::new(Cell::new(0));
        let hub = VisibilityHub::new(ObserverOptions::default(), VIEWPORT);
        let surface = MockSurface {
            handle: SurfaceHandle(7),
            log: log.clone(),
            fail_next: None,
            restore_ok: true,
        };
        let factory = MockFactory {
            log: log.clone(),
            mutations: mutations.clone(),
            failing,
        };
        let composer = SceneComposer::new(surface, factory, hub.clone(), VIEWPORT, SectionKey::Hero);
        Fixture {
            composer,
            log,
            mutations,
            hub,
        }
    }

    fn input() -> FrameInput {
        FrameInput {
            dt: 1.0 / 60.0,
            config: RenderConfig::default(),
            pointer: None,
        }
    }

    fn position(log: &Log, entry: &str) -> usize {
        log.borrow()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("missing log entry '{entry}'"))
    }

    #[test]
    fn initial_section_mounts_on_first_frame() {
        let mut f = fixture(None);
        assert_eq!(f.composer.mounted_scene_name(), None);
        assert_eq!(f.composer.frame(input()), FrameOutcome::Drawn { instances: 1 });
        assert_eq!(f.composer.mounted_scene_name(), Some("hero"));
        assert_eq!(f.composer.stats().mounts, 1);
    }

    #[test]
    fn section_swap_unmounts_before_mounting_and_keeps_surface() {
        let mut f = fixture(None);
        f.composer.frame(input());
        let handle = f.composer.surface_handle();

        f.composer.set_active_section(SectionKey::About);
        // Queued, not applied until the next frame.
        assert_eq!(f.composer.mounted_scene_name(), Some("hero"));
        f.composer.frame(input());

        assert!(position(&f.log, "unmount hero") < position(&f.log, "mount about"));
        assert_eq!(f.composer.mounted_scene_name(), Some("about"));
        assert_eq!(f.composer.surface_handle(), handle);
        // Surface gate plus the about scene's gate.
        assert_eq!(f.hub.observation_count(), 2);
    }

    #[test]
    fn latest_pending_section_wins() {
        let mut f = fixture(None);
        f.composer.set_active_section(SectionKey::About);
        f.composer.set_active_section(SectionKey::Contact);
        f.composer.frame(input());
        assert_eq!(f.composer.active_section(), SectionKey::Contact);
        assert!(!f.log.borrow().iter().any(|e| e == "mount about"));
    }

    #[test]
    fn section_without_content_mounts_nothing() {
        let mut f = fixture(None);
        f.composer.frame(input());
        f.composer.set_active_section(SectionKey::Projects);
        assert_eq!(f.composer.frame(input()), FrameOutcome::Drawn { instances: 0 });
        assert_eq!(f.composer.mounted_scene_name(), None);
        assert_eq!(f.hub.observation_count(), 1);
    }

    #[test]
    fn mount_failure_swaps_in_placeholder() {
        let mut f = fixture(Some(SectionKey::Hero));
        assert_eq!(f.composer.frame(input()), FrameOutcome::Drawn { instances: 2 });
        assert_eq!(f.composer.mounted_scene_name(), Some("placeholder:error"));
        assert_eq!(f.composer.stats().mount_failures, 1);
        assert!(f.log.borrow().iter().any(|e| e == "unmount hero"));
    }

    #[test]
    fn hidden_surface_skips_tick_and_draw() {
        let mut f = fixture(None);
        f.composer.frame(input());
        let before = f.mutations.get();

        f.hub.set_viewport(Rect::EMPTY);
        for _ in 0..10 {
            assert_eq!(f.composer.frame(input()), FrameOutcome::Hidden);
        }
        assert_eq!(f.mutations.get(), before);
        assert_eq!(f.composer.stats().frames_hidden, 10);
    }

    #[test]
    fn off_screen_section_is_not_mutated() {
        let mut f = fixture(None);
        f.composer
            .set_section_rect(SectionKey::Hero, Rect::new(0.0, 2000.0, 800.0, 600.0));
        f.composer.frame(input());
        assert!(!f.composer.is_scene_visible());
        for _ in 0..10 {
            f.composer.frame(input());
        }
        assert_eq!(f.mutations.get(), 0);

        f.hub.set_viewport(Rect::new(0.0, 1900.0, 800.0, 600.0));
        f.composer.set_surface_rect(f.hub.viewport());
        f.composer.frame(input());
        assert_eq!(f.mutations.get(), 1);
    }

    #[test]
    fn animation_requests_reach_mounted_scene_next_frame() {
        let mut f = fixture(None);
        f.composer.request_animation("wave");
        assert!(!f.log.borrow().iter().any(|e| e == "animate wave"));
        f.composer.frame(input());
        // Section mount is applied before the animation request.
        assert!(position(&f.log, "mount hero") < position(&f.log, "animate wave"));
    }

    #[test]
    fn context_loss_suspends_until_retry() {
        let mut f = fixture(None);
        f.composer.frame(input());
        f.composer.notify_context_lost("device lost");
        assert!(f.composer.has_recoverable_error());
        assert!(f.log.borrow().iter().any(|e| e == "unmount hero"));

        let draws_before = f.log.borrow().iter().filter(|e| e.starts_with("draw")).count();
        for _ in 0..5 {
            assert_eq!(f.composer.frame(input()), FrameOutcome::Suspended);
        }
        let draws_after = f.log.borrow().iter().filter(|e| e.starts_with("draw")).count();
        assert_eq!(draws_before, draws_after);

        f.composer.retry().expect("retry should succeed");
        assert!(!f.composer.has_recoverable_error());
        assert_eq!(f.composer.mounted_scene_name(), Some("hero"));
        assert_eq!(f.log.borrow().iter().filter(|e| *e == "mount hero").count(), 2);
        assert!(matches!(f.composer.frame(input()), FrameOutcome::Drawn { .. }));
    }

    #[test]
    fn lost_draw_enters_suspended_state() {
        let mut f = fixture(None);
        f.composer.surface_mut().fail_next = Some(SurfaceError::ContextLost("reset".into()));
        assert_eq!(f.composer.frame(input()), FrameOutcome::Suspended);
        assert_eq!(f.composer.lost_reason(), Some("reset"));
    }

    #[test]
    fn transient_surface_error_only_skips_frame() {
        let mut f = fixture(None);
        f.composer.surface_mut().fail_next = Some(SurfaceError::Other("timeout".into()));
        assert_eq!(f.composer.frame(input()), FrameOutcome::Skipped);
        assert!(!f.composer.has_recoverable_error());
        assert!(matches!(f.composer.frame(input()), FrameOutcome::Drawn { .. }));
    }

    #[test]
    fn failed_restore_keeps_error_flag() {
        let mut f = fixture(None);
        f.composer.frame(input());
        f.composer.notify_context_lost("device lost");
        f.composer.surface_mut().restore_ok = false;
        assert!(f.composer.retry().is_err());
        assert!(f.composer.has_recoverable_error());
        assert_eq!(f.composer.mounted_scene_name(), None);
    }

    #[test]
    fn section_change_while_lost_mounts_on_retry() {
        let mut f = fixture(None);
        f.composer.frame(input());
        f.composer.notify_context_lost("device lost");
        f.composer.set_active_section(SectionKey::Contact);
        f.composer.frame(input());
        assert!(!f.log.borrow().iter().any(|e| e == "mount contact"));

        f.composer.retry().expect("retry");
        assert_eq!(f.composer.mounted_scene_name(), Some("contact"));
    }

    #[test]
    fn dropping_composer_releases_everything() {
        let f = fixture(None);
        let Fixture {
            mut composer,
            log,
            hub,
            ..
        } = f;
        composer.frame(input());
        drop(composer);
        assert!(log.borrow().iter().any(|e| e == "unmount hero"));
        assert_eq!(hub.observation_count(), 0);
    }
}
