//! Contact section: drifting particles in front of a star field.

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use folio_core::composer::SubScene;
use folio_core::draw::{rgb, DrawInstance, DrawList, MeshKind};
use folio_core::settings::RenderConfig;

pub const MAX_FLOATING: usize = 100;
pub const MAX_STARS: usize = 200;
const FIELD_SEED: u64 = 0xc0ffee;

pub struct ParticleFieldScene {
    seed: u64,
    floating: Vec<Vec3>,
    stars: Vec<Vec3>,
    floating_count: usize,
    star_count: usize,
    time: f32,
}

impl ParticleFieldScene {
    pub fn new() -> Self {
        Self::with_seed(FIELD_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            floating: Vec::new(),
            stars: Vec::new(),
            floating_count: 0,
            star_count: 0,
            time: 0.0,
        }
    }

    #[cfg(test)]
    pub fn visible_counts(&self) -> (usize, usize) {
        (self.floating_count, self.star_count)
    }
}

impl Default for ParticleFieldScene {
    fn default() -> Self {
        Self::new()
    }
}

fn scatter(rng: &mut StdRng, count: usize, extent: Vec3) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-0.5..0.5) * extent.x,
                rng.gen_range(-0.5..0.5) * extent.y,
                rng.gen_range(-0.5..0.5) * extent.z,
            )
        })
        .collect()
}

impl SubScene for ParticleFieldScene {
    fn name(&self) -> &str {
        "particle-field"
    }

    fn mount(&mut self) -> Result<(), String> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.floating = scatter(&mut rng, MAX_FLOATING, Vec3::new(20.0, 10.0, 15.0));
        self.stars = scatter(&mut rng, MAX_STARS, Vec3::new(100.0, 60.0, 100.0));
        Ok(())
    }

    fn tick(&mut self, dt: f64, visible: bool, config: &RenderConfig) {
        if !visible {
            return;
        }
        self.time += dt as f32 * config.animation_speed;
        let budget = config.particle_count as usize;
        self.star_count = budget.min(self.stars.len());
        self.floating_count = (budget / 2).min(self.floating.len());
    }

    fn draw(&self, out: &mut DrawList) {
        let particle = rgb(0x32cd32, 0.7);
        for (i, base) in self.floating[..self.floating_count].iter().enumerate() {
            let drift = Vec3::new(0.0, (self.time * 0.5 + i as f32).sin() * 0.2, 0.0);
            out.push(
                DrawInstance::new(
                    MeshKind::Sphere,
                    Mat4::from_translation(*base + drift) * Mat4::from_scale(Vec3::splat(0.02)),
                    particle,
                )
                .with_emissive(0.8)
                .without_shadow(),
            );
        }

        let star = rgb(0xffffff, 1.0);
        for position in &self.stars[..self.star_count] {
            out.push(
                DrawInstance::new(
                    MeshKind::Sphere,
                    Mat4::from_translation(*position) * Mat4::from_scale(Vec3::splat(0.05)),
                    star,
                )
                .with_emissive(1.0)
                .without_shadow(),
            );
        }
    }

    fn unmount(&mut self) {
        self.floating = Vec::new();
        self.stars = Vec::new();
        self.floating_count = 0;
        self.star_count = 0;
        self.time = 0.0;
    }
}
