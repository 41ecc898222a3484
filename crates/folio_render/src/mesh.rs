//! Unit-sized primitive meshes. Sub-scenes scale them through the instance
//! transform: the cube has side 1, the sphere radius 1, the cylinder radius 1
//! and height 1, all centred on the origin.

use std::f32::consts::{PI, TAU};

use folio_core::draw::MeshKind;

use crate::vertex::MeshVertex;

pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

pub fn build(kind: MeshKind) -> MeshData {
    match kind {
        MeshKind::Cube => cube(),
        MeshKind::Sphere => sphere(24, 16),
        MeshKind::Cylinder => cylinder(24),
    }
}

fn vertex(position: [f32; 3], normal: [f32; 3]) -> MeshVertex {
    MeshVertex { position, normal }
}

pub fn cube() -> MeshData {
    // (normal, u axis, v axis) per face; u x v == normal keeps CCW winding.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (n, u, v) in FACES {
        let base = vertices.len() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let p = [
                n[0] * 0.5 + u[0] * su + v[0] * sv,
                n[1] * 0.5 + u[1] * su + v[1] * sv,
                n[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            vertices.push(vertex(p, n));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData { vertices, indices }
}

pub fn sphere(segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    for ring in 0..=rings {
        let theta = ring as f32 / rings as f32 * PI;
        for seg in 0..=segments {
            let phi = seg as f32 / segments as f32 * TAU;
            let n = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            vertices.push(vertex(n, n));
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    MeshData { vertices, indices }
}

pub fn cylinder(segments: u32) -> MeshData {
    let segments = segments.max(3);
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Side wall.
    for seg in 0..=segments {
        let phi = seg as f32 / segments as f32 * TAU;
        let (x, z) = (phi.cos(), phi.sin());
        vertices.push(vertex([x, -0.5, z], [x, 0.0, z]));
        vertices.push(vertex([x, 0.5, z], [x, 0.0, z]));
    }
    for seg in 0..segments {
        let a = seg * 2;
        indices.extend_from_slice(&[a, a + 1, a + 2, a + 1, a + 3, a + 2]);
    }

    // Caps.
    for (y, ny) in [(0.5f32, 1.0f32), (-0.5, -1.0)] {
        let centre = vertices.len() as u32;
        vertices.push(vertex([0.0, y, 0.0], [0.0, ny, 0.0]));
        for seg in 0..=segments {
            let phi = seg as f32 / segments as f32 * TAU;
            vertices.push(vertex([phi.cos(), y, phi.sin()], [0.0, ny, 0.0]));
        }
        for seg in 0..segments {
            let a = centre + 1 + seg;
            if ny > 0.0 {
                indices.extend_from_slice(&[centre, a + 1, a]);
            } else {
                indices.extend_from_slice(&[centre, a, a + 1]);
            }
        }
    }
    MeshData { vertices, indices }
}
