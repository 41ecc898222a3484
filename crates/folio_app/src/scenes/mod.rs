//! Concrete sub-scenes and the section-to-scene mapping.

pub mod character;
pub mod network;
pub mod particles;
pub mod skills;
pub mod timeline;

use std::cell::Cell;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec2, Vec3};

use folio_core::composer::{SubScene, SubSceneFactory};
use folio_core::draw::DrawList;
use folio_core::section::SectionKey;
use folio_core::settings::RenderConfig;

use crate::assets::SharedAsset;
use character::CharacterScene;
use network::NetworkScene;
use particles::ParticleFieldScene;
use skills::SkillsWheelScene;
use timeline::TimelineScene;

const HERO_CHARACTER_POSITION: Vec3 = Vec3::new(3.0, -1.0, 0.0);
const HERO_CHARACTER_SCALE: f32 = 1.8;

/// Unit cylinder stretched between two points.
pub fn segment(from: Vec3, to: Vec3, radius: f32) -> Mat4 {
    let delta = to - from;
    let length = delta.length();
    let rotation = match delta.try_normalize() {
        Some(dir) => Quat::from_rotation_arc(Vec3::Y, dir),
        None => Quat::IDENTITY,
    };
    Mat4::from_scale_rotation_translation(
        Vec3::new(radius, length, radius),
        rotation,
        (from + to) * 0.5,
    )
}

/// Several sub-scenes mounted and drawn as one.
pub struct SceneGroup {
    name: &'static str,
    children: Vec<Box<dyn SubScene>>,
    mounted: usize,
}

impl SceneGroup {
    pub fn new(name: &'static str, children: Vec<Box<dyn SubScene>>) -> Self {
        Self {
            name,
            children,
            mounted: 0,
        }
    }
}

impl SubScene for SceneGroup {
    fn name(&self) -> &str {
        self.name
    }

    /// All or nothing: a failing child unmounts the ones before it.
    fn mount(&mut self) -> Result<(), String> {
        for (i, child) in self.children.iter_mut().enumerate() {
            if let Err(e) = child.mount() {
                for earlier in self.children[..i].iter_mut().rev() {
                    earlier.unmount();
                }
                self.mounted = 0;
                return Err(format!("{}: {e}", self.name));
            }
        }
        self.mounted = self.children.len();
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible {
            return;
        }
        for child in &mut self.children {
            child.tick(dt, visible, config);
        }
    }

    fn draw(&self, out: &mut DrawList) {
        for child in &self.children {
            child.draw(out);
        }
    }

    fn unmount(&mut self) {
        for child in self.children[..self.mounted].iter_mut().rev() {
            child.unmount();
        }
        self.mounted = 0;
    }

    fn on_animation_request(&mut self, name: &str, config: &RenderConfig) {
        for child in &mut self.children {
            child.on_animation_request(name, config);
        }
    }

    fn set_pointer(&mut self, pointer: Vec2) {
        for child in &mut self.children {
            child.set_pointer(pointer);
        }
    }
}

/// Section content for the portfolio page.
pub struct PortfolioScenes {
    character: SharedAsset,
    crossfade_us: u64,
    scroll_progress: Rc<Cell<f32>>,
}

impl PortfolioScenes {
    pub fn new(character: SharedAsset, crossfade_us: u64) -> Self {
        Self {
            character,
            crossfade_us,
            scroll_progress: Rc::new(Cell::new(0.0)),
        }
    }

    /// Applies to characters created from now on.
    pub fn set_crossfade_us(&mut self, crossfade_us: u64) {
        self.crossfade_us = crossfade_us;
    }

    /// Page scroll fraction, read by scroll-driven scenes every frame.
    pub fn set_scroll_progress(&self, progress: f32) {
        self.scroll_progress.set(progress.clamp(0.0, 1.0));
    }
}

impl SubSceneFactory for PortfolioScenes {
    fn create(&mut self, section: SectionKey) -> Option<Box<dyn SubScene>> {
        match section {
            SectionKey::Hero => {
                let character = CharacterScene::new(self.character.clone(), self.crossfade_us)
                    .placed(HERO_CHARACTER_POSITION, HERO_CHARACTER_SCALE);
                Some(Box::new(SceneGroup::new(
                    "hero",
                    vec![Box::new(NetworkScene::new()), Box::new(character)],
                )))
            }
            SectionKey::About => Some(Box::new(SkillsWheelScene::new())),
            SectionKey::Projects => None,
            SectionKey::Experience => Some(Box::new(TimelineScene::new(self.scroll_progress.clone()))),
            SectionKey::Contact => Some(Box::new(ParticleFieldScene::new())),
        }
    }
}
