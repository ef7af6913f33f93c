//! Icosphere meshes for the backdrop shell and the reactive sphere.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex data for scene meshes (position + normal)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Triangle mesh, counter-clockwise when seen from outside
#[derive(Debug, Clone)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
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

impl Geometry {
    /// Subdivided icosahedron projected onto a sphere.
    ///
    /// Each of the 20 faces is split into `(detail + 1)²` triangles.
    pub fn icosphere(radius: f32, detail: u32) -> Self {
        let corners = icosahedron_corners();
        let cols = detail as usize + 1;
        let mut vertices = Vec::with_capacity(20 * cols * cols * 3);

        for face in ICOSAHEDRON_FACES {
            let (a, b, c) = (corners[face[0]], corners[face[1]], corners[face[2]]);

            // Row i runs from edge a→c to edge b→c with (cols - i) segments
            let rows: Vec<Vec<Vec3>> = (0..=cols)
                .map(|i| {
                    let t = i as f32 / cols as f32;
                    let start = a.lerp(c, t);
                    let end = b.lerp(c, t);
                    let segments = cols - i;
                    (0..=segments)
                        .map(|j| {
                            if segments == 0 {
                                start
                            } else {
                                start.lerp(end, j as f32 / segments as f32)
                            }
                        })
                        .collect()
                })
                .collect();

            for i in 0..cols {
                for j in 0..2 * (cols - i) - 1 {
                    let k = j / 2;
                    let tri = if j % 2 == 0 {
                        [rows[i][k + 1], rows[i + 1][k], rows[i][k]]
                    } else {
                        [rows[i][k + 1], rows[i + 1][k + 1], rows[i + 1][k]]
                    };
                    push_outward_triangle(&mut vertices, tri, radius);
                }
            }
        }

        let indices = (0..vertices.len() as u32).collect();
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn push_outward_triangle(vertices: &mut Vec<Vertex>, tri: [Vec3; 3], radius: f32) {
    let [a, b, c] = tri.map(|p| p.normalize() * radius);

    let face_normal = (b - a).cross(c - a);
    let centroid = (a + b + c) / 3.0;
    let ordered = if face_normal.dot(centroid) < 0.0 {
        [a, c, b]
    } else {
        [a, b, c]
    };

    for p in ordered {
        vertices.push(Vertex {
            position: p.to_array(),
            normal: p.normalize().to_array(),
        });
    }
}
