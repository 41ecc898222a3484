//! Experience section: career entries placed along a rising spiral.

use std::cell::Cell;
use std::f32::consts::PI;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use folio_core::composer::SubScene;
use folio_core::draw::{rgb, DrawInstance, DrawList, MeshKind};
use folio_core::settings::RenderConfig;

use super::segment;

pub struct Experience {
    pub role: &'static str,
    pub period: &'static str,
}

pub const EXPERIENCES: &[Experience] = &[
    Experience { role: "Senior Blockchain Engineer", period: "2022 - now" },
    Experience { role: "Full-Stack Developer", period: "2020 - 2022" },
    Experience { role: "Frontend Developer", period: "2018 - 2020" },
    Experience { role: "Junior Developer", period: "2016 - 2018" },
];

const RADIUS: f32 = 3.0;
const RISE: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePlacement {
    pub position: Vec3,
    pub yaw: f32,
}

/// Spiral placement for `count` entries, centred vertically.
pub fn placements(count: usize) -> Vec<NodePlacement> {
    let span = count.saturating_sub(1).max(1) as f32;
    (0..count)
        .map(|i| {
            let t = i as f32 / span;
            let angle = t * PI * 1.5;
            NodePlacement {
                position: Vec3::new(
                    angle.cos() * RADIUS,
                    i as f32 * RISE - count.saturating_sub(1) as f32 * RISE * 0.5,
                    angle.sin() * RADIUS,
                ),
                yaw: -angle,
            }
        })
        .collect()
}

pub struct TimelineScene {
    scroll_progress: Rc<Cell<f32>>,
    nodes: Vec<NodePlacement>,
    time: f32,
    speed: f32,
    show_connections: bool,
}

impl TimelineScene {
    pub fn new(scroll_progress: Rc<Cell<f32>>) -> Self {
        Self {
            scroll_progress,
            nodes: Vec::new(),
            time: 0.0,
            speed: 1.0,
            show_connections: false,
        }
    }

    fn group_transform(&self) -> Mat4 {
        let yaw = self.scroll_progress.get() * PI * 0.5 + self.time * 0.02 * self.speed;
        let lift = (self.time * 0.3 * self.speed).sin() * 0.1;
        Mat4::from_translation(Vec3::new(0.0, lift, 0.0)) * Mat4::from_rotation_y(yaw)
    }
}

impl SubScene for TimelineScene {
    fn name(&self) -> &str {
        "timeline"
    }

    fn mount(&mut self) -> Result<(), String> {
        self.nodes = placements(EXPERIENCES.len());
        for entry in EXPERIENCES {
            log::debug!("Timeline entry '{}' ({})", entry.role, entry.period);
        }
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible {
            return;
        }
        self.time += dt as f32;
        self.speed = config.animation_speed;
        // The spine and links are extras for configs that can afford shadows.
        self.show_connections = config.enable_shadows;
    }

    fn draw(&self, out: &mut DrawList) {
        let group = self.group_transform();

        if self.show_connections {
            let height = EXPERIENCES.len() as f32 * RISE;
            out.push(
                DrawInstance::new(
                    MeshKind::Cylinder,
                    group * Mat4::from_scale(Vec3::new(0.02, height, 0.02)),
                    rgb(0x00ff41, 0.6),
                )
                .with_emissive(0.3)
                .without_shadow(),
            );
            for pair in self.nodes.windows(2) {
                out.push(
                    DrawInstance::new(
                        MeshKind::Cylinder,
                        group * segment(pair[0].position, pair[1].position, 0.015),
                        rgb(0x00ff41, 0.4),
                    )
                    .with_emissive(0.3)
                    .without_shadow(),
                );
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            let phase = self.time * self.speed + i as f32;
            let breathe = 1.0 + (phase * 3.0).sin() * 0.05;
            let hover = (phase * 2.0).sin() * 0.1;
            let base = group
                * Mat4::from_translation(node.position + Vec3::new(0.0, hover, 0.0))
                * Mat4::from_rotation_y(node.yaw)
                * Mat4::from_scale(Vec3::splat(breathe));
            out.push(DrawInstance::new(
                MeshKind::Cube,
                base * Mat4::from_scale(Vec3::new(1.5, 0.3, 1.5)),
                rgb(0x00ff41, 1.0),
            ));
            out.push(
                DrawInstance::new(
                    MeshKind::Cube,
                    base * Mat4::from_translation(Vec3::new(0.0, 0.4, 0.0))
                        * Mat4::from_scale(Vec3::new(1.2, 0.2, 1.2)),
                    rgb(0x39ff14, 1.0),
                )
                .with_emissive(0.2),
            );
        }
    }

    fn unmount(&mut self) {
        self.nodes.clear();
        self.time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadows(enabled: bool) -> RenderConfig {
        RenderConfig {
            enable_shadows: enabled,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn spiral_is_vertically_centred() {
        let nodes = placements(4);
        let sum: f32 = nodes.iter().map(|n| n.position.y).sum();
        assert!(sum.abs() < 1e-4);
        assert!((nodes[0].position.x - RADIUS).abs() < 1e-5);
        assert!((nodes[3].yaw + PI * 1.5).abs() < 1e-5);
    }

    #[test]
    fn single_entry_does_not_divide_by_zero() {
        let nodes = placements(1);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].position.is_finite());
    }

    #[test]
    fn connections_follow_config() {
        let progress = Rc::new(Cell::new(0.0));
        let mut scene = TimelineScene::new(progress);
        scene.mount().unwrap();

        scene.tick(0.016, true, &shadows(false));
        let mut plain = DrawList::new();
        scene.draw(&mut plain);
        assert_eq!(plain.len(), EXPERIENCES.len() * 2);

        scene.tick(0.016, true, &shadows(true));
        let mut rich = DrawList::new();
        scene.draw(&mut rich);
        assert_eq!(rich.len(), EXPERIENCES.len() * 2 + 1 + EXPERIENCES.len() - 1);
    }

    #[test]
    fn scroll_progress_turns_the_spiral() {
        let progress = Rc::new(Cell::new(0.0));
        let scene = TimelineScene::new(progress.clone());
        let before = scene.group_transform();
        progress.set(1.0);
        assert_ne!(scene.group_transform(), before);
    }

    #[test]
    fn hidden_tick_is_inert() {
        let mut scene = TimelineScene::new(Rc::new(Cell::new(0.0)));
        scene.tick(1.0, false, &shadows(true));
        assert_eq!(scene.time, 0.0);
        assert!(!scene.show_connections);
    }
}
