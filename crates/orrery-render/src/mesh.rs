//! CPU tessellation of scene geometry into indexed triangle lists.
//!
//! Triangles wind counter-clockwise when seen from outside the surface.

use crate::buffer::VertexPositionNormalUv;
use glam::Vec3;
use orrery_scene::Geometry;
use std::f32::consts::{PI, TAU};

/// Indexed triangle mesh in CPU memory.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<VertexPositionNormalUv>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

pub fn tessellate(geometry: &Geometry) -> MeshData {
    match *geometry {
        Geometry::Sphere {
            radius,
            width_segments,
            height_segments,
        } => uv_sphere(radius, width_segments, height_segments),
        Geometry::Icosahedron { radius, detail } => icosphere(radius, detail),
    }
}

/// Latitude/longitude sphere. `u` runs around the equator and `v` from the
/// north pole (0) to the south pole (1), matching image row order.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let ws = width_segments.max(3);
    let hs = height_segments.max(2);
    let stride = ws + 1;

    let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let normal = Vec3::new(
                -(u * TAU).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * TAU).sin() * (v * PI).sin(),
            );
            vertices.push(VertexPositionNormalUv {
                position: (normal * radius).to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((ws * (hs - 1) * 6) as usize);
    for iy in 0..hs {
        for ix in 0..ws {
            let a = iy * stride + ix + 1;
            let b = iy * stride + ix;
            let c = (iy + 1) * stride + ix;
            let d = (iy + 1) * stride + ix + 1;
            // Pole rows collapse to single triangles.
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData { vertices, indices }
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron_corners() -> [Vec3; 12] {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
}

/// Icosahedron with each face split into `(detail + 1)^2` triangles and
/// every vertex pushed out to `radius`.
pub fn icosphere(radius: f32, detail: u32) -> MeshData {
    let corners = icosahedron_corners();
    let cols = detail as usize + 1;
    let per_face_vertices = (cols + 1) * (cols + 2) / 2;

    let mut data = MeshData {
        vertices: Vec::with_capacity(20 * per_face_vertices),
        indices: Vec::with_capacity(20 * cols * cols * 3),
    };

    for [ia, ib, ic] in ICOSAHEDRON_FACES {
        let (a, b, c) = (corners[ia], corners[ib], corners[ic]);
        let base = data.vertices.len() as u32;

        // Row i holds cols - i + 1 points between the a-c and b-c edges.
        let mut row_start = Vec::with_capacity(cols + 1);
        for i in 0..=cols {
            row_start.push(data.vertices.len() as u32 - base);
            let t = i as f32 / cols as f32;
            let aj = a.lerp(c, t);
            let bj = b.lerp(c, t);
            let rows = cols - i;
            for j in 0..=rows {
                let p = if rows == 0 {
                    aj
                } else {
                    aj.lerp(bj, j as f32 / rows as f32)
                };
                data.vertices.push(sphere_vertex(p, radius));
            }
        }

        let at = |i: usize, j: usize| base + row_start[i] + j as u32;
        for i in 0..cols {
            for j in 0..(2 * (cols - i) - 1) {
                let k = j / 2;
                if j % 2 == 0 {
                    data.indices
                        .extend_from_slice(&[at(i, k + 1), at(i + 1, k), at(i, k)]);
                } else {
                    data.indices
                        .extend_from_slice(&[at(i, k + 1), at(i + 1, k + 1), at(i + 1, k)]);
                }
            }
        }
    }

    data
}

fn sphere_vertex(p: Vec3, radius: f32) -> VertexPositionNormalUv {
    let n = p.normalize();
    let u = n.z.atan2(-n.x) / TAU + 0.5;
    let v = n.y.clamp(-1.0, 1.0).acos() / PI;
    VertexPositionNormalUv {
        position: (n * radius).to_array(),
        normal: n.to_array(),
        uv: [u, v],
    }
}
