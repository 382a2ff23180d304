//! Solid geometry embedded in the mesh.
//!
//! A [`Solid`] answers point containment; that is the whole interface the
//! voxelizer and the cut-cell computation need. Primitives cover the common
//! analytic shapes, and [`SurfaceMesh`] imports a closed triangle surface in
//! the same length units as the grid bounds.

use std::collections::HashMap;

use crate::Error;

/// A closed region of space with an inside and an outside.
pub trait Solid {
    /// Whether the point lies inside the solid.
    fn contains(&self, p: [f64; 3]) -> bool;

    /// Axis-aligned bounding box as (min, max) corners.
    fn bounds(&self) -> ([f64; 3], [f64; 3]);
}

/// Scale, rotation (radians, applied x then y then z) and translation applied
/// to imported solids before voxelization.
#[derive(Copy, Clone, Debug)]
pub struct Transform {
    pub scale: f64,
    pub rotate: [f64; 3],
    pub translate: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotate: [0.0; 3],
            translate: [0.0; 3],
        }
    }
}

impl Transform {
    /// Maps a point from solid-local coordinates into domain coordinates.
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let s = [p[0] * self.scale, p[1] * self.scale, p[2] * self.scale];
        let r = rotate_xyz(s, self.rotate);
        [
            r[0] + self.translate[0],
            r[1] + self.translate[1],
            r[2] + self.translate[2],
        ]
    }

    /// Maps a point from domain coordinates back into solid-local coordinates.
    pub fn invert(&self, p: [f64; 3]) -> [f64; 3] {
        let t = [
            p[0] - self.translate[0],
            p[1] - self.translate[1],
            p[2] - self.translate[2],
        ];
        let r = rotate_xyz_inverse(t, self.rotate);
        [r[0] / self.scale, r[1] / self.scale, r[2] / self.scale]
    }
}

fn rotate_axis(p: [f64; 3], angle: f64, a: usize, b: usize) -> [f64; 3] {
    let (sin, cos) = angle.sin_cos();
    let mut q = p;
    q[a] = cos * p[a] - sin * p[b];
    q[b] = sin * p[a] + cos * p[b];
    q
}

fn rotate_xyz(p: [f64; 3], angles: [f64; 3]) -> [f64; 3] {
    let p = rotate_axis(p, angles[0], 1, 2);
    let p = rotate_axis(p, angles[1], 2, 0);
    rotate_axis(p, angles[2], 0, 1)
}

fn rotate_xyz_inverse(p: [f64; 3], angles: [f64; 3]) -> [f64; 3] {
    let p = rotate_axis(p, -angles[2], 0, 1);
    let p = rotate_axis(p, -angles[1], 2, 0);
    rotate_axis(p, -angles[0], 1, 2)
}

/// A solid with a transform applied to it.
pub struct Transformed<S: Solid> {
    pub solid: S,
    pub transform: Transform,
}

impl<S: Solid> Solid for Transformed<S> {
    fn contains(&self, p: [f64; 3]) -> bool {
        self.solid.contains(self.transform.invert(p))
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let (lo, hi) = self.solid.bounds();
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for corner in 0..8 {
            let local = [
                if corner & 1 == 0 { lo[0] } else { hi[0] },
                if corner & 2 == 0 { lo[1] } else { hi[1] },
                if corner & 4 == 0 { lo[2] } else { hi[2] },
            ];
            let p = self.transform.apply(local);
            for a in 0..3 {
                min[a] = min[a].min(p[a]);
                max[a] = max[a].max(p[a]);
            }
        }
        (min, max)
    }
}

/// Axis-aligned box.
#[derive(Copy, Clone, Debug)]
pub struct BoxSolid {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Solid for BoxSolid {
    fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        (self.min, self.max)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    pub center: [f64; 3],
    pub radius: f64,
}

impl Solid for Sphere {
    fn contains(&self, p: [f64; 3]) -> bool {
        let d2 = (0..3).map(|a| (p[a] - self.center[a]).powi(2)).sum::<f64>();
        d2 <= self.radius * self.radius
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let r = self.radius;
        (
            [self.center[0] - r, self.center[1] - r, self.center[2] - r],
            [self.center[0] + r, self.center[1] + r, self.center[2] + r],
        )
    }
}

/// Circular cylinder with its axis along z.
#[derive(Copy, Clone, Debug)]
pub struct Cylinder {
    pub center: [f64; 3],
    pub radius: f64,
    pub half_length: f64,
}

impl Solid for Cylinder {
    fn contains(&self, p: [f64; 3]) -> bool {
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        let dz = (p[2] - self.center[2]).abs();
        dx * dx + dy * dy <= self.radius * self.radius && dz <= self.half_length
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let r = self.radius;
        let h = self.half_length;
        (
            [self.center[0] - r, self.center[1] - r, self.center[2] - h],
            [self.center[0] + r, self.center[1] + r, self.center[2] + h],
        )
    }
}

/// A closed triangle surface imported from solid geometry.
///
/// Containment is a parity ray cast: a point is inside when a ray from it
/// crosses the surface an odd number of times. The constructor rejects
/// surfaces that are not closed two-manifolds, since parity is meaningless
/// for them.
pub struct SurfaceMesh {
    vertices: Vec<[f64; 3]>,
    triangles: Vec<[usize; 3]>,
    min: [f64; 3],
    max: [f64; 3],
}

// Fixed, slightly oblique ray direction so the cast rarely grazes an edge.
const RAY_DIR: [f64; 3] = [0.939_693, 0.258_819, 0.224_951];

impl SurfaceMesh {
    pub fn new(
        name: &str,
        vertices: Vec<[f64; 3]>,
        triangles: Vec<[usize; 3]>,
    ) -> Result<Self, Error> {
        let mut edge_use: HashMap<(usize, usize), usize> = HashMap::new();
        for tri in &triangles {
            for e in 0..3 {
                let a = tri[e];
                let b = tri[(e + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                *edge_use.entry(key).or_insert(0) += 1;
            }
        }
        let open_edges = edge_use.values().filter(|&&n| n != 2).count();
        if open_edges > 0 || triangles.is_empty() {
            return Err(Error::OpenSurface {
                name: name.to_string(),
                open_edges,
            });
        }

        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for v in &vertices {
            for a in 0..3 {
                min[a] = min[a].min(v[a]);
                max[a] = max[a].max(v[a]);
            }
        }

        Ok(Self {
            vertices,
            triangles,
            min,
            max,
        })
    }

    /// Moller-Trumbore ray/triangle intersection; returns the ray parameter.
    fn intersect(&self, origin: [f64; 3], tri: &[usize; 3]) -> Option<f64> {
        let v0 = self.vertices[tri[0]];
        let v1 = self.vertices[tri[1]];
        let v2 = self.vertices[tri[2]];

        let e1 = sub(v1, v0);
        let e2 = sub(v2, v0);
        let p = cross(RAY_DIR, e2);
        let det = dot(e1, p);
        if det.abs() < 1e-14 {
            return None;
        }
        let inv_det = det.recip();
        let t_vec = sub(origin, v0);
        let u = dot(t_vec, p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = cross(t_vec, e1);
        let v = dot(RAY_DIR, q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = dot(e2, q) * inv_det;
        (t > 1e-12).then(|| t)
    }
}

impl Solid for SurfaceMesh {
    fn contains(&self, p: [f64; 3]) -> bool {
        if (0..3).any(|a| p[a] < self.min[a] || p[a] > self.max[a]) {
            return false;
        }
        let crossings = self
            .triangles
            .iter()
            .filter(|tri| self.intersect(p, tri).is_some())
            .count();
        crossings % 2 == 1
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        (self.min, self.max)
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
