//! Structured mesh with embedded-boundary geometry.
//!
//! The grid owns everything the field solver needs to know about space: node
//! coordinates, cell spacings, and, when conductors are embedded, the cut
//! face areas, cut edge lengths and interior flags of the Finite Integration
//! Technique. Conductor surfaces are resolved by point containment against
//! the imported solids, so the mesh itself stays structured.

use ndarray::{Array1, Array3};

use crate::geometry::{Solid, Transform};
use crate::materials::Material;
use crate::Error;

/// A named solid with its material assignment.
pub struct SolidSpec {
    pub name: String,
    pub solid: Box<dyn Solid>,
    pub material: Material,
}

/// Describes the composition of a [`Grid3D`].
pub struct Grid3DDescriptor {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Imported solids, applied in order; on overlap the last one wins.
    pub solids: Vec<SolidSpec>,
    /// Transform applied to every imported solid before voxelization.
    pub transform: Transform,
    /// Material filling space not claimed by any solid.
    pub background: Material,
}

impl Default for Grid3DDescriptor {
    fn default() -> Self {
        Self {
            xmin: 0.0,
            xmax: 1.0,
            ymin: 0.0,
            ymax: 1.0,
            zmin: 0.0,
            zmax: 1.0,
            nx: 1,
            ny: 1,
            nz: 1,
            solids: Vec::new(),
            transform: Transform::default(),
            background: Material::Vacuum,
        }
    }
}

/// The structured mesh, its cut-cell geometry and its solids.
pub struct Grid3D {
    nx: usize,
    ny: usize,
    nz: usize,
    x: Array1<f64>,
    y: Array1<f64>,
    z: Array1<f64>,
    dx: Array1<f64>,
    dy: Array1<f64>,
    dz: Array1<f64>,
    // Free (non-conductor) lengths of the x/y/z edges of each cell.
    lx: Array3<f64>,
    ly: Array3<f64>,
    lz: Array3<f64>,
    // Free areas of the yz/zx/xy faces of each cell.
    syz: Array3<f64>,
    szx: Array3<f64>,
    sxy: Array3<f64>,
    flag_int_yz: Array3<bool>,
    flag_int_zx: Array3<bool>,
    flag_int_xy: Array3<bool>,
    solids: Vec<SolidSpec>,
    transform: Transform,
    background: Material,
}

const BISECT_ITERS: usize = 40;

impl Grid3D {
    /// Creates a new `Grid3D` instance and resolves its cut-cell geometry.
    pub fn new(desc: Grid3DDescriptor) -> Result<Self, Error> {
        for (axis, min, max) in [
            ('x', desc.xmin, desc.xmax),
            ('y', desc.ymin, desc.ymax),
            ('z', desc.zmin, desc.zmax),
        ] {
            if !(min < max) {
                return Err(Error::BadBounds { axis, min, max });
            }
        }
        for (axis, n) in [('x', desc.nx), ('y', desc.ny), ('z', desc.nz)] {
            if n == 0 {
                return Err(Error::BadCellCount { axis });
            }
        }

        // Solids that would alias outside the mesh are rejected, not clipped.
        let tol = 1e-12
            * (desc.xmax - desc.xmin)
                .max(desc.ymax - desc.ymin)
                .max(desc.zmax - desc.zmin);
        for spec in &desc.solids {
            let (lo, hi) = crate::geometry::Transformed {
                solid: BoundsProxy(spec.solid.bounds()),
                transform: desc.transform,
            }
            .bounds();
            let inside = lo[0] >= desc.xmin - tol
                && hi[0] <= desc.xmax + tol
                && lo[1] >= desc.ymin - tol
                && hi[1] <= desc.ymax + tol
                && lo[2] >= desc.zmin - tol
                && hi[2] <= desc.zmax + tol;
            if !inside {
                return Err(Error::SolidOutsideDomain {
                    name: spec.name.clone(),
                });
            }
        }

        let linspace = |min: f64, max: f64, n: usize| {
            Array1::from_iter(
                (0..=n).map(|i| min + (max - min) * (i as f64) / (n as f64)),
            )
        };
        let x = linspace(desc.xmin, desc.xmax, desc.nx);
        let y = linspace(desc.ymin, desc.ymax, desc.ny);
        let z = linspace(desc.zmin, desc.zmax, desc.nz);
        let spacing = |c: &Array1<f64>| {
            Array1::from_iter(c.windows(2).into_iter().map(|w| w[1] - w[0]))
        };
        let (dx, dy, dz) = (spacing(&x), spacing(&y), spacing(&z));

        let mut grid = Self {
            nx: desc.nx,
            ny: desc.ny,
            nz: desc.nz,
            lx: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            ly: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            lz: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            syz: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            szx: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            sxy: Array3::zeros((desc.nx, desc.ny, desc.nz)),
            flag_int_yz: Array3::from_elem((desc.nx, desc.ny, desc.nz), false),
            flag_int_zx: Array3::from_elem((desc.nx, desc.ny, desc.nz), false),
            flag_int_xy: Array3::from_elem((desc.nx, desc.ny, desc.nz), false),
            x,
            y,
            z,
            dx,
            dy,
            dz,
            solids: desc.solids,
            transform: desc.transform,
            background: desc.background,
        };
        grid.resolve_cut_cells();
        Ok(grid)
    }

    /// The material governing a point, with the last containing solid winning.
    pub fn material_at(&self, p: [f64; 3]) -> Material {
        let local = self.transform.invert(p);
        self.solids
            .iter()
            .rev()
            .find(|spec| spec.solid.contains(local))
            .map(|spec| spec.material)
            .unwrap_or(self.background)
    }

    fn in_conductor(&self, p: [f64; 3]) -> bool {
        self.material_at(p).is_pec()
    }

    /// Free length of the edge from `a` towards `axis` with nominal length
    /// `len`, assuming at most one conductor crossing along it.
    fn edge_free_length(&self, a: [f64; 3], axis: usize, len: f64) -> f64 {
        let mut b = a;
        b[axis] += len;
        let in_a = self.in_conductor(a);
        let in_b = self.in_conductor(b);
        match (in_a, in_b) {
            (false, false) => len,
            (true, true) => 0.0,
            _ => {
                // Bisect for the crossing point; keep the free side.
                let (mut lo, mut hi) = (0.0f64, 1.0f64);
                for _ in 0..BISECT_ITERS {
                    let mid = 0.5 * (lo + hi);
                    let mut p = a;
                    p[axis] += mid * len;
                    if self.in_conductor(p) == in_a {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                let t = 0.5 * (lo + hi);
                if in_a {
                    (1.0 - t) * len
                } else {
                    t * len
                }
            }
        }
    }

    fn resolve_cut_cells(&mut self) {
        // Fast path: nothing can be conducting.
        let any_pec = self.background.is_pec()
            || self.solids.iter().any(|s| s.material.is_pec());

        for i in 0..self.nx {
            for j in 0..self.ny {
                for k in 0..self.nz {
                    let (x0, y0, z0) = (self.x[i], self.y[j], self.z[k]);
                    let (hx, hy, hz) = (self.dx[i], self.dy[j], self.dz[k]);
                    if !any_pec {
                        self.lx[[i, j, k]] = hx;
                        self.ly[[i, j, k]] = hy;
                        self.lz[[i, j, k]] = hz;
                        self.syz[[i, j, k]] = hy * hz;
                        self.szx[[i, j, k]] = hz * hx;
                        self.sxy[[i, j, k]] = hx * hy;
                        self.flag_int_yz[[i, j, k]] = true;
                        self.flag_int_zx[[i, j, k]] = true;
                        self.flag_int_xy[[i, j, k]] = true;
                        continue;
                    }

                    let flen = |a: [f64; 3], axis: usize, len: f64| {
                        self.edge_free_length(a, axis, len)
                    };
                    let ex0 = flen([x0, y0, z0], 0, hx);
                    let ey0 = flen([x0, y0, z0], 1, hy);
                    let ez0 = flen([x0, y0, z0], 2, hz);
                    // Opposite edges of each face, one cell over.
                    let ex_y = flen([x0, y0 + hy, z0], 0, hx);
                    let ex_z = flen([x0, y0, z0 + hz], 0, hx);
                    let ey_x = flen([x0 + hx, y0, z0], 1, hy);
                    let ey_z = flen([x0, y0, z0 + hz], 1, hy);
                    let ez_x = flen([x0 + hx, y0, z0], 2, hz);
                    let ez_y = flen([x0, y0 + hy, z0], 2, hz);

                    self.lx[[i, j, k]] = ex0;
                    self.ly[[i, j, k]] = ey0;
                    self.lz[[i, j, k]] = ez0;

                    // Face area from the mean free fraction of its edge pairs;
                    // exact for axis-aligned cuts, first order for oblique.
                    let fyz = (ey0 + ey_z) / (2.0 * hy) * ((ez0 + ez_y) / (2.0 * hz));
                    let fzx = (ez0 + ez_x) / (2.0 * hz) * ((ex0 + ex_z) / (2.0 * hx));
                    let fxy = (ex0 + ex_y) / (2.0 * hx) * ((ey0 + ey_x) / (2.0 * hy));

                    let int_yz = !self.in_conductor([x0, y0 + 0.5 * hy, z0 + 0.5 * hz]);
                    let int_zx = !self.in_conductor([x0 + 0.5 * hx, y0, z0 + 0.5 * hz]);
                    let int_xy = !self.in_conductor([x0 + 0.5 * hx, y0 + 0.5 * hy, z0]);

                    self.syz[[i, j, k]] = if int_yz { fyz * hy * hz } else { 0.0 };
                    self.szx[[i, j, k]] = if int_zx { fzx * hz * hx } else { 0.0 };
                    self.sxy[[i, j, k]] = if int_xy { fxy * hx * hy } else { 0.0 };
                    self.flag_int_yz[[i, j, k]] = int_yz;
                    self.flag_int_zx[[i, j, k]] = int_zx;
                    self.flag_int_xy[[i, j, k]] = int_xy;
                }
            }
        }
    }

    /// Largest stable leapfrog step for vacuum waves on this mesh, including
    /// the smallest positive cut edge.
    pub fn cfl_bound(&self) -> f64 {
        let min_pos = |nominal: &Array1<f64>, cut: &Array3<f64>| {
            let m = nominal.iter().cloned().fold(f64::INFINITY, f64::min);
            cut.iter()
                .cloned()
                .filter(|&l| l > 0.0)
                .fold(m, f64::min)
        };
        let mx = min_pos(&self.dx, &self.lx);
        let my = min_pos(&self.dy, &self.ly);
        let mz = min_pos(&self.dz, &self.lz);
        let c0 = physical_constants::SPEED_OF_LIGHT_IN_VACUUM;
        ((1.0 / (mx * mx) + 1.0 / (my * my) + 1.0 / (mz * mz)).sqrt() * c0).recip()
    }

    pub fn nx(&self) -> usize {
        self.nx
    }
    pub fn ny(&self) -> usize {
        self.ny
    }
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Node coordinates, length `n + 1`.
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }
    pub fn z(&self) -> &Array1<f64> {
        &self.z
    }

    /// Cell spacings, length `n`.
    pub fn dx(&self) -> &Array1<f64> {
        &self.dx
    }
    pub fn dy(&self) -> &Array1<f64> {
        &self.dy
    }
    pub fn dz(&self) -> &Array1<f64> {
        &self.dz
    }

    pub fn zmin(&self) -> f64 {
        self.z[0]
    }
    pub fn zmax(&self) -> f64 {
        self.z[self.nz]
    }

    /// Cell center coordinate along z.
    pub fn zc(&self, k: usize) -> f64 {
        self.z[k] + 0.5 * self.dz[k]
    }

    pub fn lx(&self) -> &Array3<f64> {
        &self.lx
    }
    pub fn ly(&self) -> &Array3<f64> {
        &self.ly
    }
    pub fn lz(&self) -> &Array3<f64> {
        &self.lz
    }
    pub fn syz(&self) -> &Array3<f64> {
        &self.syz
    }
    pub fn szx(&self) -> &Array3<f64> {
        &self.szx
    }
    pub fn sxy(&self) -> &Array3<f64> {
        &self.sxy
    }
    pub fn flag_int_yz(&self) -> &Array3<bool> {
        &self.flag_int_yz
    }
    pub fn flag_int_zx(&self) -> &Array3<bool> {
        &self.flag_int_zx
    }
    pub fn flag_int_xy(&self) -> &Array3<bool> {
        &self.flag_int_xy
    }

    pub fn solids(&self) -> &[SolidSpec] {
        &self.solids
    }
    pub fn background(&self) -> Material {
        self.background
    }
}

/// Adapter so the domain-bounds check can transform a raw bounding box.
struct BoundsProxy(([f64; 3], [f64; 3]));

impl Solid for BoundsProxy {
    fn contains(&self, _p: [f64; 3]) -> bool {
        false
    }
    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Sphere;
    use approx::assert_relative_eq;

    fn vacuum_cube(n: usize) -> Grid3D {
        Grid3D::new(Grid3DDescriptor {
            xmax: 1.0,
            ymax: 1.0,
            zmax: 1.0,
            nx: n,
            ny: n,
            nz: n,
            ..Grid3DDescriptor::default()
        })
        .unwrap()
    }

    #[test]
    fn malformed_bounds_are_fatal() {
        let err = Grid3D::new(Grid3DDescriptor {
            ymin: 2.0,
            ymax: 1.0,
            ..Grid3DDescriptor::default()
        });
        assert!(matches!(err, Err(Error::BadBounds { axis: 'y', .. })));
    }

    #[test]
    fn uncut_grid_has_nominal_geometry() {
        let g = vacuum_cube(10);
        let d = 0.1;
        assert_relative_eq!(g.dx()[3], d, max_relative = 1e-12);
        assert_relative_eq!(g.syz()[[2, 5, 7]], d * d, max_relative = 1e-12);
        assert_relative_eq!(g.lz()[[0, 0, 0]], d, max_relative = 1e-12);
        assert!(g.flag_int_xy()[[4, 4, 4]]);
        assert_relative_eq!(
            g.cfl_bound(),
            d / (physical_constants::SPEED_OF_LIGHT_IN_VACUUM * 3.0f64.sqrt()),
            max_relative = 1e-12
        );
    }

    #[test]
    fn solid_outside_domain_is_rejected() {
        let err = Grid3D::new(Grid3DDescriptor {
            solids: vec![SolidSpec {
                name: "ball".to_string(),
                solid: Box::new(Sphere {
                    center: [0.9, 0.5, 0.5],
                    radius: 0.3,
                }),
                material: Material::Pec,
            }],
            ..Grid3DDescriptor::default()
        });
        assert!(matches!(err, Err(Error::SolidOutsideDomain { .. })));
    }

    #[test]
    fn embedded_sphere_cuts_faces_consistently() {
        let n = 16;
        let g = Grid3D::new(Grid3DDescriptor {
            nx: n,
            ny: n,
            nz: n,
            solids: vec![SolidSpec {
                name: "ball".to_string(),
                solid: Box::new(Sphere {
                    center: [0.5, 0.5, 0.5],
                    radius: 0.25,
                }),
                material: Material::Pec,
            }],
            ..Grid3DDescriptor::default()
        })
        .unwrap();

        let d = 1.0 / (n as f64);
        let nominal = d * d;
        let mut cut_faces = 0;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let s = g.sxy()[[i, j, k]];
                    assert!(s >= 0.0 && s <= nominal + 1e-12);
                    if !g.flag_int_xy()[[i, j, k]] {
                        assert_eq!(s, 0.0);
                    }
                    if s > 0.0 && s < nominal * 0.999 {
                        cut_faces += 1;
                    }
                }
            }
        }
        // The sphere surface must actually produce fractional faces.
        assert!(cut_faces > 0);
        // Center cell is fully inside the conductor.
        let c = n / 2;
        assert_eq!(g.syz()[[c, c, c]], 0.0);
        assert!(!g.flag_int_yz()[[c, c, c]]);
        // Corner cell is untouched vacuum.
        assert_relative_eq!(g.syz()[[0, 0, 0]], nominal, max_relative = 1e-9);
    }

    #[test]
    fn overlap_resolves_to_last_solid() {
        let ball = |material| SolidSpec {
            name: "ball".to_string(),
            solid: Box::new(Sphere {
                center: [0.5, 0.5, 0.5],
                radius: 0.2,
            }) as Box<dyn crate::geometry::Solid>,
            material,
        };
        let g = Grid3D::new(Grid3DDescriptor {
            nx: 8,
            ny: 8,
            nz: 8,
            solids: vec![ball(Material::Pec), ball(Material::Vacuum)],
            ..Grid3DDescriptor::default()
        })
        .unwrap();
        // The vacuum solid was applied last, so nothing conducts.
        assert!(!g.material_at([0.5, 0.5, 0.5]).is_pec());
        assert!(g.flag_int_xy()[[4, 4, 4]]);
    }
}
