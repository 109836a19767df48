//! Structured hexahedral blocks as `MeshPartition`s

use crate::errors::MeshError;
use crate::float_types::Real;
use crate::mesh::{Face, MeshPartition};
use nalgebra::{Point3, Vector3};

/// One of the six sides of a structured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockSide {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl BlockSide {
    pub const ALL: [BlockSide; 6] = [
        BlockSide::XMin,
        BlockSide::XMax,
        BlockSide::YMin,
        BlockSide::YMax,
        BlockSide::ZMin,
        BlockSide::ZMax,
    ];

    pub const fn default_patch_name(&self) -> &'static str {
        match self {
            BlockSide::XMin => "xmin",
            BlockSide::XMax => "xmax",
            BlockSide::YMin => "ymin",
            BlockSide::YMax => "ymax",
            BlockSide::ZMin => "zmin",
            BlockSide::ZMax => "zmax",
        }
    }
}

impl MeshPartition {
    /// A single hexahedral cell spanning `[0, size]^3`, all boundary faces in `walls`.
    pub fn cube(size: Real) -> Result<MeshPartition, MeshError> {
        Self::hex_block_with_patches(
            Point3::origin(),
            [1, 1, 1],
            Vector3::new(size, size, size),
            |_, _| "walls".to_string(),
        )
    }

    /// Block of `nx * ny * nz` hexahedra with one patch per side (`xmin` .. `zmax`).
    pub fn hex_block(
        origin: Point3<Real>,
        divisions: [usize; 3],
        spacing: Vector3<Real>,
    ) -> Result<MeshPartition, MeshError> {
        Self::hex_block_with_patches(origin, divisions, spacing, |side, _| {
            side.default_patch_name().to_string()
        })
    }

    /// **Structured block with caller-chosen patches**
    ///
    /// ## **Numbering**
    /// ```text
    /// point (i, j, k) = i + (nx + 1) * (j + (ny + 1) * k)
    /// cell  (i, j, k) = i + nx * (j + ny * k)
    /// ```
    /// Internal faces come in x, y, z order; each is owned by the lower cell so its
    /// normal points along the positive axis.
    ///
    /// ## **Patches**
    /// `patch_of(side, cell)` names the patch of each boundary face from its side and
    /// the `(i, j, k)` of the cell it bounds. Patches appear in order of first use,
    /// walking the sides `XMin, XMax, YMin, YMax, ZMin, ZMax`.
    pub fn hex_block_with_patches<F>(
        origin: Point3<Real>,
        divisions: [usize; 3],
        spacing: Vector3<Real>,
        patch_of: F,
    ) -> Result<MeshPartition, MeshError>
    where
        F: Fn(BlockSide, [usize; 3]) -> String,
    {
        let [nx, ny, nz] = divisions;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MeshError::topology(format!(
                "block divisions {divisions:?} must all be positive"
            )));
        }
        let pt = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cell = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    points.push(Point3::new(
                        origin.x + i as Real * spacing.x,
                        origin.y + j as Real * spacing.y,
                        origin.z + k as Real * spacing.z,
                    ));
                }
            }
        }

        let mut internal = Vec::new();
        // (side, cell ijk, face) in side order
        let mut boundary: Vec<(BlockSide, [usize; 3], Face)> = Vec::new();

        // x-normal faces
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..=nx {
                    let v = vec![pt(i, j, k), pt(i, j + 1, k), pt(i, j + 1, k + 1), pt(i, j, k + 1)];
                    if i == 0 {
                        let f = Face::boundary(v.into_iter().rev().collect(), cell(0, j, k));
                        boundary.push((BlockSide::XMin, [0, j, k], f));
                    } else if i == nx {
                        boundary.push((BlockSide::XMax, [nx - 1, j, k], Face::boundary(v, cell(nx - 1, j, k))));
                    } else {
                        internal.push(Face::internal(v, cell(i - 1, j, k), cell(i, j, k)));
                    }
                }
            }
        }
        // y-normal faces
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..nx {
                    let v = vec![pt(i, j, k), pt(i, j, k + 1), pt(i + 1, j, k + 1), pt(i + 1, j, k)];
                    if j == 0 {
                        let f = Face::boundary(v.into_iter().rev().collect(), cell(i, 0, k));
                        boundary.push((BlockSide::YMin, [i, 0, k], f));
                    } else if j == ny {
                        boundary.push((BlockSide::YMax, [i, ny - 1, k], Face::boundary(v, cell(i, ny - 1, k))));
                    } else {
                        internal.push(Face::internal(v, cell(i, j - 1, k), cell(i, j, k)));
                    }
                }
            }
        }
        // z-normal faces
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    let v = vec![pt(i, j, k), pt(i + 1, j, k), pt(i + 1, j + 1, k), pt(i, j + 1, k)];
                    if k == 0 {
                        let f = Face::boundary(v.into_iter().rev().collect(), cell(i, j, 0));
                        boundary.push((BlockSide::ZMin, [i, j, 0], f));
                    } else if k == nz {
                        boundary.push((BlockSide::ZMax, [i, j, nz - 1], Face::boundary(v, cell(i, j, nz - 1))));
                    } else {
                        internal.push(Face::internal(v, cell(i, j, k - 1), cell(i, j, k)));
                    }
                }
            }
        }

        let mut patches: Vec<(String, Vec<Face>)> = Vec::new();
        for side in BlockSide::ALL {
            for (_, ijk, face) in boundary.iter().filter(|(s, _, _)| *s == side) {
                let name = patch_of(side, *ijk);
                match patches.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, faces)) => faces.push(face.clone()),
                    None => patches.push((name, vec![face.clone()])),
                }
            }
        }

        MeshPartition::from_parts(points, internal, patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_counts() {
        let m = MeshPartition::hex_block(Point3::origin(), [3, 2, 4], Vector3::new(1.0, 0.5, 0.25))
            .unwrap();
        assert_eq!(m.n_points(), 4 * 3 * 5);
        assert_eq!(m.n_cells(), 24);
        // internal: (nx-1)*ny*nz + nx*(ny-1)*nz + nx*ny*(nz-1)
        assert_eq!(m.n_internal_faces(), 2 * 2 * 4 + 3 * 4 + 3 * 2 * 3);
        assert_eq!(m.n_boundary_faces(), 2 * (2 * 4 + 3 * 4 + 3 * 2));
        let names: Vec<&str> = m.patches().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"]);
        let volume: Real = m.cell_centres_and_volumes().1.iter().sum();
        assert!((volume - 3.0 * 1.0 * 1.0).abs() < 1e-12);
    }

    #[test]
    fn internal_faces_point_to_neighbour() {
        let m = MeshPartition::hex_block(Point3::origin(), [2, 2, 2], Vector3::new(1.0, 1.0, 1.0))
            .unwrap();
        let centres = m.cell_centres();
        for f in 0..m.n_internal_faces() {
            let face = &m.faces()[f];
            let (_, area) = m.face_centre_and_area(f);
            let n = face.neighbour.unwrap();
            assert!(area.dot(&(centres[n] - centres[face.owner])) > 0.0);
        }
    }

    #[test]
    fn custom_patches_group_by_name() {
        let m = MeshPartition::hex_block_with_patches(
            Point3::origin(),
            [1, 3, 1],
            Vector3::new(1.0, 1.0, 1.0),
            |side, [_, j, _]| match side {
                BlockSide::XMin if j < 2 => "interface".to_string(),
                _ => "walls".to_string(),
            },
        )
        .unwrap();
        assert_eq!(m.patches().len(), 2);
        assert_eq!(m.patches()[0].name, "interface");
        assert_eq!(m.patches()[0].size, 2);
        assert_eq!(m.patches()[1].size, 14 - 2);
    }

    #[test]
    fn zero_divisions_rejected() {
        let err = MeshPartition::hex_block(Point3::origin(), [0, 1, 1], Vector3::new(1.0, 1.0, 1.0));
        assert!(matches!(err, Err(MeshError::TopologyInconsistent(_))));
    }
}
