//! About section: the rotating skills wheel.

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use folio_core::composer::SubScene;
use folio_core::draw::{rgb, DrawInstance, DrawList, MeshKind};
use folio_core::settings::RenderConfig;

use super::segment;

pub struct Skill {
    pub name: &'static str,
    pub proficiency: u8,
    pub position: [f32; 3],
    pub color: u32,
}

pub const SKILLS: &[Skill] = &[
    Skill { name: "React.js", proficiency: 95, position: [0.0, 2.2, 0.0], color: 0x61dafb },
    Skill { name: "Node.js", proficiency: 90, position: [2.2, 0.0, 0.0], color: 0x68a063 },
    Skill { name: "MongoDB", proficiency: 88, position: [0.0, 0.0, 2.2], color: 0x47a248 },
    Skill { name: "Three.js", proficiency: 85, position: [-2.2, 0.0, 0.0], color: 0x202020 },
    Skill { name: "AWS Cloud", proficiency: 92, position: [0.0, -2.2, 0.0], color: 0xff9900 },
    Skill { name: "TypeScript", proficiency: 93, position: [0.0, 0.0, -2.2], color: 0x3178c6 },
    Skill { name: "Next.js", proficiency: 89, position: [1.8, 1.8, 0.0], color: 0x202020 },
    Skill { name: "PostgreSQL", proficiency: 75, position: [-1.8, -1.8, 0.0], color: 0x336791 },
    Skill { name: "GraphQL", proficiency: 87, position: [1.8, -1.8, 0.0], color: 0xe10098 },
    Skill { name: "Python", proficiency: 82, position: [-1.8, 1.8, 0.0], color: 0x3776ab },
    Skill { name: "Docker", proficiency: 80, position: [1.5, 0.0, 1.5], color: 0x2496ed },
    Skill { name: "Git", proficiency: 78, position: [-1.5, 0.0, -1.5], color: 0xf05032 },
];

const RELATED: &[(&str, &[&str])] = &[
    ("React.js", &["Next.js", "TypeScript", "GraphQL"]),
    ("Node.js", &["GraphQL", "Docker", "AWS Cloud"]),
    ("MongoDB", &["Node.js", "AWS Cloud", "Docker"]),
    ("Three.js", &["React.js", "TypeScript", "Next.js"]),
    ("TypeScript", &["React.js", "Node.js", "Next.js"]),
];

const MOTE_SEED: u64 = 0x5eed_0a60;
const MAX_MOTES: usize = 200;

fn skill_position(name: &str) -> Option<Vec3> {
    SKILLS
        .iter()
        .find(|s| s.name == name)
        .map(|s| Vec3::from(s.position))
}

/// Endpoints of every related-skill link.
pub fn connections() -> Vec<(Vec3, Vec3)> {
    RELATED
        .iter()
        .flat_map(|(from, tos)| tos.iter().map(move |to| (*from, *to)))
        .filter_map(|(from, to)| Some((skill_position(from)?, skill_position(to)?)))
        .collect()
}

pub struct SkillsWheelScene {
    time: f32,
    motes: Vec<Vec3>,
    links: Vec<(Vec3, Vec3)>,
    mote_count: usize,
}

impl SkillsWheelScene {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(MOTE_SEED);
        let motes = (0..MAX_MOTES)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                )
            })
            .collect();
        Self {
            time: 0.0,
            motes,
            links: Vec::new(),
            mote_count: 0,
        }
    }

    fn group_transform(&self) -> Mat4 {
        Mat4::from_rotation_y(self.time * 0.1) * Mat4::from_rotation_x((self.time * 0.5).sin() * 0.05)
    }
}

impl Default for SkillsWheelScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SubScene for SkillsWheelScene {
    fn name(&self) -> &str {
        "skills-wheel"
    }

    fn mount(&mut self) -> Result<(), String> {
        self.links = connections();
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible {
            return;
        }
        self.time += dt as f32;
        self.mote_count = (config.particle_count as usize).min(self.motes.len());
    }

    fn draw(&self, out: &mut DrawList) {
        let group = self.group_transform();

        for (i, skill) in SKILLS.iter().enumerate() {
            let bob = (self.time * 2.0 + i as f32).sin() * 0.1;
            let center = Vec3::from(skill.position) + Vec3::new(0.0, bob, 0.0);
            out.push(DrawInstance::new(
                MeshKind::Sphere,
                group * Mat4::from_translation(center) * Mat4::from_scale(Vec3::splat(0.3)),
                rgb(skill.color, 1.0),
            ));
            // Proficiency as a flat disc under the node.
            let radius = 0.25 * skill.proficiency as f32 / 100.0;
            out.push(
                DrawInstance::new(
                    MeshKind::Cylinder,
                    group
                        * Mat4::from_translation(center - Vec3::new(0.0, 0.4, 0.0))
                        * Mat4::from_scale(Vec3::new(radius, 0.01, radius)),
                    rgb(skill.color, 0.8),
                )
                .with_emissive(0.3)
                .without_shadow(),
            );
        }

        for (from, to) in &self.links {
            out.push(
                DrawInstance::new(MeshKind::Cylinder, group * segment(*from, *to, 0.01), rgb(0x32cd32, 0.3))
                    .with_emissive(0.2)
                    .without_shadow(),
            );
        }

        for mote in &self.motes[..self.mote_count] {
            out.push(
                DrawInstance::new(
                    MeshKind::Cube,
                    group * Mat4::from_translation(*mote) * Mat4::from_scale(Vec3::splat(0.02)),
                    rgb(0x39ff14, 1.0),
                )
                .with_emissive(0.8)
                .without_shadow(),
            );
        }
    }

    fn unmount(&mut self) {
        self.links.clear();
        self.time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_related_skill_exists() {
        let expected: usize = RELATED.iter().map(|(_, tos)| tos.len()).sum();
        assert_eq!(connections().len(), expected);
    }

    #[test]
    fn mote_count_follows_particle_budget() {
        let mut scene = SkillsWheelScene::new();
        scene.mount().unwrap();
        let config = RenderConfig {
            particle_count: 30,
            ..RenderConfig::default()
        };
        scene.tick(0.016, true, &config);

        let mut out = DrawList::new();
        scene.draw(&mut out);
        assert_eq!(out.of_mesh(MeshKind::Cube).count(), 30);
        assert_eq!(out.of_mesh(MeshKind::Sphere).count(), SKILLS.len());
    }

    #[test]
    fn particle_budget_is_capped() {
        let mut scene = SkillsWheelScene::new();
        let config = RenderConfig {
            particle_count: 10_000,
            ..RenderConfig::default()
        };
        scene.tick(0.016, true, &config);
        assert_eq!(scene.mote_count, MAX_MOTES);
    }

    #[test]
    fn rotation_only_advances_while_visible() {
        let mut scene = SkillsWheelScene::new();
        scene.tick(2.0, false, &RenderConfig::default());
        assert_eq!(scene.group_transform(), Mat4::IDENTITY);
        scene.tick(2.0, true, &RenderConfig::default());
        assert_ne!(scene.group_transform(), Mat4::IDENTITY);
    }

    #[test]
    fn motes_are_deterministic() {
        let a = SkillsWheelScene::new();
        let b = SkillsWheelScene::new();
        assert_eq!(a.motes, b.motes);
    }
}
