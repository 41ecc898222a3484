//! Backend-neutral draw submissions and the shared lighting rig.
//!
//! Sub-scenes describe what to draw as a flat list of mesh instances; the
//! render backend turns it into instanced draw calls. Lighting is owned by
//! the composer and is the same for every section.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Cube,
    Sphere,
    Cylinder,
}

impl MeshKind {
    pub const ALL: &'static [MeshKind] = &[MeshKind::Cube, MeshKind::Sphere, MeshKind::Cylinder];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstance {
    pub mesh: MeshKind,
    pub transform: Mat4,
    /// Linear RGBA. Alpha below one draws translucent.
    pub color: [f32; 4],
    /// Added to the lit colour; 0 for plain lit surfaces.
    pub emissive: f32,
    pub casts_shadow: bool,
}

impl DrawInstance {
    pub fn new(mesh: MeshKind, transform: Mat4, color: [f32; 4]) -> Self {
        Self {
            mesh,
            transform,
            color,
            emissive: 0.0,
            casts_shadow: true,
        }
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn without_shadow(mut self) -> Self {
        self.casts_shadow = false;
        self
    }
}

/// Per-frame list of instances. Cleared and refilled every frame.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    instances: Vec<DrawInstance>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instance: DrawInstance) {
        self.instances.push(instance);
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawInstance> {
        self.instances.iter()
    }

    pub fn of_mesh(&self, mesh: MeshKind) -> impl Iterator<Item = &DrawInstance> {
        self.instances.iter().filter(move |i| i.mesh == mesh)
    }
}

/// Hex colour `0xRRGGBB` to linear-ish RGBA with the given alpha.
pub fn rgb(hex: u32, alpha: f32) -> [f32; 4] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
        alpha,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Position the light shines from, toward the origin.
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    pub casts_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Half-angle of the cone in radians.
    pub angle: f32,
    /// Fraction of the cone edge that fades out.
    pub penumbra: f32,
}

/// The one lighting setup every section draws under.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingRig {
    pub ambient: f32,
    pub directional: Vec<DirectionalLight>,
    pub points: Vec<PointLight>,
    pub spots: Vec<SpotLight>,
}

fn rgb3(hex: u32) -> [f32; 3] {
    let [r, g, b, _] = rgb(hex, 1.0);
    [r, g, b]
}

impl Default for LightingRig {
    fn default() -> Self {
        Self {
            ambient: 0.4,
            directional: vec![
                DirectionalLight {
                    position: Vec3::new(5.0, 10.0, 5.0),
                    color: [1.0, 1.0, 1.0],
                    intensity: 1.2,
                    casts_shadow: true,
                },
                DirectionalLight {
                    position: Vec3::new(-5.0, 5.0, -5.0),
                    color: rgb3(0x87ceeb),
                    intensity: 0.8,
                    casts_shadow: false,
                },
            ],
            points: vec![
                PointLight {
                    position: Vec3::new(0.0, 2.0, 2.0),
                    color: rgb3(0xffd700),
                    intensity: 0.5,
                },
                PointLight {
                    position: Vec3::new(5.0, 5.0, 5.0),
                    color: rgb3(0x32cd32),
                    intensity: 1.0,
                },
                PointLight {
                    position: Vec3::new(-5.0, -5.0, -5.0),
                    color: rgb3(0x228b22),
                    intensity: 0.6,
                },
            ],
            spots: vec![SpotLight {
                position: Vec3::new(0.0, 15.0, 0.0),
                target: Vec3::ZERO,
                color: rgb3(0x00ff41),
                intensity: 2.0,
                angle: 0.3,
                penumbra: 1.0,
            }],
        }
    }
}

impl LightingRig {
    /// The light whose shadow map the backend renders, if any.
    pub fn shadow_caster(&self) -> Option<&DirectionalLight> {
        self.directional.iter().find(|l| l.casts_shadow)
    }
}
