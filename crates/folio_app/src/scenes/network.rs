//! Hero background: a ring of glowing nodes with connecting spokes.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

use folio_core::composer::SubScene;
use folio_core::draw::{rgb, DrawInstance, DrawList, MeshKind};
use folio_core::settings::RenderConfig;

pub const NODE_COUNT: usize = 8;
pub const SPOKE_COUNT: usize = 6;

pub fn node_position(i: usize) -> Vec3 {
    let i = i as f32;
    Vec3::new(
        (i * PI / 4.0).cos() * 6.0,
        (i * 0.7).sin() * 2.0,
        (i * PI / 4.0).sin() * 4.0,
    )
}

#[derive(Default)]
pub struct NetworkScene {
    time: f32,
}

impl NetworkScene {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubScene for NetworkScene {
    fn name(&self) -> &str {
        "network"
    }

    fn mount(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible {
            return;
        }
        self.time += dt as f32 * config.animation_speed;
    }

    fn draw(&self, out: &mut DrawList) {
        let node_color = rgb(0x32cd32, 0.6);
        for i in 0..NODE_COUNT {
            let pulse = 1.0 + (self.time * 2.0 + i as f32).sin() * 0.1;
            out.push(
                DrawInstance::new(
                    MeshKind::Sphere,
                    Mat4::from_translation(node_position(i)) * Mat4::from_scale(Vec3::splat(0.1 * pulse)),
                    node_color,
                )
                .with_emissive(0.5)
                .without_shadow(),
            );
        }

        let spoke_color = rgb(0x00ff88, 0.3);
        for i in 0..SPOKE_COUNT {
            // Lying flat, fanned around the vertical axis.
            let transform = Mat4::from_rotation_y(i as f32 * PI / 3.0)
                * Mat4::from_rotation_z(PI / 2.0)
                * Mat4::from_scale(Vec3::new(0.01, 8.0, 0.01));
            out.push(
                DrawInstance::new(MeshKind::Cylinder, transform, spoke_color)
                    .with_emissive(0.2)
                    .without_shadow(),
            );
        }
    }

    fn unmount(&mut self) {
        self.time = 0.0;
    }
}
