//! The animated portfolio character.
//!
//! Built from simple primitives posed by the character's clips. Animation
//! requests go through the resolver, so the site can ask for "idle" or
//! "walking" without knowing what the asset author named those clips.
//! Until the asset arrives the loading placeholder stands in.

use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};

use folio_core::animation::{CharacterAsset, Pose, PoseMixer};
use folio_core::composer::{Placeholder, PlaceholderKind, SubScene};
use folio_core::draw::{rgb, DrawInstance, DrawList, MeshKind};
use folio_core::resolver::{
    AnimationAliasTable, AnimationClipTable, AnimationResolver, RequestOutcome,
};
use folio_core::settings::RenderConfig;

use crate::assets::{AssetSlot, SharedAsset};

pub const DEFAULT_ANIMATION: &str = "idle";
const HEAD_TRACKING_STRENGTH: f32 = 0.3;
const HEAD_TRACKING_LERP: f32 = 0.1;

struct CharacterRig {
    asset: Rc<CharacterAsset>,
    resolver: AnimationResolver,
    mixer: PoseMixer,
}

impl CharacterRig {
    fn new(asset: Rc<CharacterAsset>, crossfade_us: u64) -> Self {
        let clips = AnimationClipTable::from_asset(&asset);
        let resolver =
            AnimationResolver::new(AnimationAliasTable::builtin(), clips).with_crossfade_us(crossfade_us);
        Self {
            asset,
            resolver,
            mixer: PoseMixer::new(),
        }
    }

    fn request(&mut self, name: &str, config: &RenderConfig) -> RequestOutcome {
        let outcome = self.resolver.request(name, config);
        if matches!(outcome, RequestOutcome::Started | RequestOutcome::Retargeted) {
            if let Some(target) = self.resolver.current_clip() {
                self.mixer.restart(target);
            }
        }
        outcome
    }

    fn tick(&mut self, dt_us: u64, playback_speed: f32) {
        self.resolver.tick(dt_us);
        let weights = self.resolver.weights();
        self.mixer.sync(&weights);
        let scaled = (dt_us as f64 * playback_speed.max(0.0) as f64).round() as u64;
        self.mixer.tick(scaled, &self.asset);
    }

    fn pose(&self) -> Pose {
        self.mixer.pose(&self.resolver.weights(), &self.asset)
    }
}

pub struct CharacterScene {
    asset: SharedAsset,
    crossfade_us: u64,
    position: Vec3,
    scale: f32,
    rig: Option<CharacterRig>,
    requested: String,
    pointer: Vec2,
    head_yaw: f32,
    head_pitch: f32,
    time: f64,
    mounted: bool,
}

impl CharacterScene {
    pub fn new(asset: SharedAsset, crossfade_us: u64) -> Self {
        Self {
            asset,
            crossfade_us,
            position: Vec3::ZERO,
            scale: 1.0,
            rig: None,
            requested: DEFAULT_ANIMATION.to_string(),
            pointer: Vec2::splat(0.5),
            head_yaw: 0.0,
            head_pitch: 0.0,
            time: 0.0,
            mounted: false,
        }
    }

    pub fn placed(mut self, position: Vec3, scale: f32) -> Self {
        self.position = position;
        self.scale = scale;
        self
    }

    #[cfg(test)]
    pub fn current_clip_name(&self) -> Option<&str> {
        self.rig.as_ref().and_then(|r| r.resolver.current_clip_name())
    }

    #[cfg(test)]
    pub fn is_transitioning(&self) -> bool {
        self.rig.as_ref().is_some_and(|r| r.resolver.is_transitioning())
    }

    #[cfg(test)]
    pub fn head_rotation(&self) -> (f32, f32) {
        (self.head_yaw, self.head_pitch)
    }

    /// Body bob and sway, only while the site asks for the idle animation.
    fn idle_motion(&self) -> (f32, f32) {
        if self.requested != DEFAULT_ANIMATION {
            return (0.0, 0.0);
        }
        let t = self.time as f32;
        ((t * 2.0).sin() * 0.02, (t * 0.5).sin() * 0.05)
    }

    /// Build the rig the first frame the asset is available.
    fn ensure_rig(&mut self, config: &RenderConfig) {
        if self.rig.is_some() {
            return;
        }
        let asset = match &*self.asset.borrow() {
            AssetSlot::Ready(asset) => asset.clone(),
            _ => return,
        };
        let mut rig = CharacterRig::new(asset, self.crossfade_us);
        rig.request(&self.requested, config);
        self.rig = Some(rig);
    }

    fn placeholder(&self) -> Option<Placeholder> {
        match &*self.asset.borrow() {
            AssetSlot::Ready(_) if self.rig.is_some() => None,
            AssetSlot::Failed(_) => Some(Placeholder::new(PlaceholderKind::Error).at(self.position)),
            _ => Some(Placeholder::new(PlaceholderKind::Loading).at(self.position)),
        }
    }
}

impl SubScene for CharacterScene {
    fn name(&self) -> &str {
        "character"
    }

    fn mount(&mut self) -> Result<(), String> {
        if let AssetSlot::Failed(e) = &*self.asset.borrow() {
            return Err(format!("Character unavailable: {e}"));
        }
        self.mounted = true;
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible || !self.mounted {
            return;
        }
        self.ensure_rig(config);
        self.time += dt;

        let target_yaw = (self.pointer.x - 0.5) * HEAD_TRACKING_STRENGTH;
        // Pointer y grows downwards; looking down is a negative pitch.
        let target_pitch = -(self.pointer.y - 0.5) * HEAD_TRACKING_STRENGTH * 0.5;
        self.head_yaw += (target_yaw - self.head_yaw) * HEAD_TRACKING_LERP;
        self.head_pitch += (target_pitch - self.head_pitch) * HEAD_TRACKING_LERP;

        if let Some(rig) = self.rig.as_mut() {
            let dt_us = (dt.max(0.0) * 1_000_000.0).round() as u64;
            rig.tick(dt_us, config.animation_speed);
        }
    }

    fn draw(&self, out: &mut DrawList) {
        if let Some(placeholder) = self.placeholder() {
            placeholder.draw(out);
            return;
        }
        let pose = self.rig.as_ref().map(|r| r.pose()).unwrap_or_default();
        let (bob, sway) = self.idle_motion();

        let root = Mat4::from_translation(self.position + Vec3::new(0.0, pose.body_lift + bob, 0.0))
            * Mat4::from_rotation_y(pose.body_yaw + sway)
            * Mat4::from_rotation_x(pose.lean)
            * Mat4::from_scale(Vec3::splat(self.scale));

        let skin = rgb(0xf1c27d, 1.0);
        let shirt = rgb(0x2d6a4f, 1.0);
        let trousers = rgb(0x1b263b, 1.0);

        out.push(DrawInstance::new(
            MeshKind::Cube,
            root * Mat4::from_translation(Vec3::new(0.0, 0.95, 0.0))
                * Mat4::from_scale(Vec3::new(0.6, 0.8, 0.3)),
            shirt,
        ));
        out.push(DrawInstance::new(
            MeshKind::Sphere,
            root * Mat4::from_translation(Vec3::new(0.0, 1.6, 0.0))
                * Mat4::from_rotation_y(self.head_yaw)
                * Mat4::from_rotation_x(pose.head_pitch + self.head_pitch)
                * Mat4::from_scale(Vec3::splat(0.22)),
            skin,
        ));
        for (side, angle) in [(-1.0_f32, pose.arm_left), (1.0, pose.arm_right)] {
            out.push(DrawInstance::new(
                MeshKind::Cylinder,
                root * Mat4::from_translation(Vec3::new(side * 0.38, 1.3, 0.0))
                    * Mat4::from_rotation_z(side * angle)
                    * Mat4::from_translation(Vec3::new(0.0, -0.32, 0.0))
                    * Mat4::from_scale(Vec3::new(0.07, 0.65, 0.07)),
                shirt,
            ));
            out.push(DrawInstance::new(
                MeshKind::Cylinder,
                root * Mat4::from_translation(Vec3::new(side * 0.15, 0.28, 0.0))
                    * Mat4::from_scale(Vec3::new(0.09, 0.56, 0.09)),
                trousers,
            ));
        }
    }

    fn unmount(&mut self) {
        self.rig = None;
        self.mounted = false;
        self.time = 0.0;
    }

    fn on_animation_request(&mut self, name: &str, config: &RenderConfig) {
        self.requested = name.to_string();
        if let Some(rig) = self.rig.as_mut() {
            rig.request(name, config);
        }
    }

    fn set_pointer(&mut self, pointer: Vec2) {
        self.pointer = pointer.clamp(Vec2::ZERO, Vec2::ONE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use folio_core::animation::parse_character_json;

    const AVATAR: &str = r#"{
        "version": "0.1",
        "character_id": "avatar",
        "clips": [
            {"name": "Idle", "looping": true, "frames": [
                {"pose": {"body_lift": 0.0}, "duration_ms": 500},
                {"pose": {"body_lift": 0.1}, "duration_ms": 500}
            ]},
            {"name": "Walking", "looping": true, "frames": [
                {"pose": {"arm_left": 0.4, "arm_right": -0.4}, "duration_ms": 300},
                {"pose": {"arm_left": -0.4, "arm_right": 0.4}, "duration_ms": 300}
            ]}
        ]
    }"#;

    fn ready_slot() -> SharedAsset {
        let asset = parse_character_json(AVATAR).unwrap();
        Rc::new(RefCell::new(AssetSlot::Ready(Rc::new(asset))))
    }

    fn config() -> RenderConfig {
        RenderConfig::default()
    }

    #[test]
    fn pending_asset_draws_loading_placeholder() {
        let slot = Rc::new(RefCell::new(AssetSlot::Pending));
        let mut scene = CharacterScene::new(slot, 500_000);
        scene.mount().unwrap();
        scene.tick(0.016, true, &config());

        let mut out = DrawList::new();
        scene.draw(&mut out);
        assert_eq!(out.len(), 1);
        assert!(scene.current_clip_name().is_none());
    }

    #[test]
    fn failed_asset_refuses_to_mount() {
        let slot = Rc::new(RefCell::new(AssetSlot::Failed("missing file".into())));
        let mut scene = CharacterScene::new(slot, 500_000);
        let err = scene.mount().unwrap_err();
        assert!(err.contains("missing file"));
    }

    #[test]
    fn asset_arriving_after_mount_starts_default_clip() {
        let slot = Rc::new(RefCell::new(AssetSlot::Pending));
        let mut scene = CharacterScene::new(slot.clone(), 500_000);
        scene.mount().unwrap();
        scene.tick(0.016, true, &config());

        let asset = parse_character_json(AVATAR).unwrap();
        *slot.borrow_mut() = AssetSlot::Ready(Rc::new(asset));
        scene.tick(0.016, true, &config());
        assert_eq!(scene.current_clip_name(), Some("Idle"));

        let mut out = DrawList::new();
        scene.draw(&mut out);
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn request_before_asset_is_applied_on_arrival() {
        let slot = Rc::new(RefCell::new(AssetSlot::Pending));
        let mut scene = CharacterScene::new(slot.clone(), 500_000);
        scene.mount().unwrap();
        scene.on_animation_request("walking", &config());

        let asset = parse_character_json(AVATAR).unwrap();
        *slot.borrow_mut() = AssetSlot::Ready(Rc::new(asset));
        scene.tick(0.016, true, &config());
        assert_eq!(scene.current_clip_name(), Some("Walking"));
    }

    #[test]
    fn walking_request_crossfades_then_settles() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.tick(0.016, true, &config());
        for _ in 0..100 {
            scene.tick(0.016, true, &config());
        }
        assert!(!scene.is_transitioning());

        scene.on_animation_request("walking", &config());
        assert!(scene.is_transitioning());
        assert_eq!(scene.current_clip_name(), Some("Walking"));
        for _ in 0..200 {
            scene.tick(0.016, true, &config());
        }
        assert!(!scene.is_transitioning());
    }

    #[test]
    fn hidden_tick_changes_nothing() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.set_pointer(Vec2::new(1.0, 1.0));
        scene.tick(0.5, false, &config());
        assert_eq!(scene.head_rotation(), (0.0, 0.0));
        assert!(scene.current_clip_name().is_none());
    }

    #[test]
    fn head_follows_pointer_gradually() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.set_pointer(Vec2::new(1.0, 0.5));
        scene.tick(0.016, true, &config());
        let (yaw, pitch) = scene.head_rotation();
        assert!((yaw - 0.5 * HEAD_TRACKING_STRENGTH * HEAD_TRACKING_LERP).abs() < 1e-6);
        assert_eq!(pitch, 0.0);
        for _ in 0..200 {
            scene.tick(0.016, true, &config());
        }
        assert!((scene.head_rotation().0 - 0.15).abs() < 1e-3);
    }

    #[test]
    fn unmount_releases_rig() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.tick(0.016, true, &config());
        assert!(scene.current_clip_name().is_some());
        scene.unmount();
        assert!(scene.current_clip_name().is_none());
    }

    #[test]
    fn pointer_below_centre_pitches_head_down() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.set_pointer(Vec2::new(0.5, 1.0));
        for _ in 0..200 {
            scene.tick(0.016, true, &config());
        }
        let (_, pitch) = scene.head_rotation();
        assert!((pitch + 0.5 * HEAD_TRACKING_STRENGTH * 0.5).abs() < 1e-3, "{pitch}");
    }

    #[test]
    fn body_bobs_only_while_idle() {
        let mut scene = CharacterScene::new(ready_slot(), 500_000);
        scene.mount().unwrap();
        scene.tick(0.4, true, &config());
        let (bob, sway) = scene.idle_motion();
        assert!(bob.abs() > 0.0 && sway.abs() > 0.0);

        scene.on_animation_request("walking", &config());
        scene.tick(0.4, true, &config());
        assert_eq!(scene.idle_motion(), (0.0, 0.0));

        scene.on_animation_request("idle", &config());
        assert_ne!(scene.idle_motion(), (0.0, 0.0));
    }
}
