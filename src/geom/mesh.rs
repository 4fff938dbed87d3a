use super::smoothing::SmoothingError;
use super::{BBox, Point3, Vec3};

/// A triangle with its smoothing-group membership.
///
/// Each set bit of `smoothing_group` is one group; `0` means the face is not
/// in any group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmoothingFace {
    pub indices: [u32; 3],
    pub smoothing_group: u32,
}

impl SmoothingFace {
    #[must_use]
    pub const fn new(indices: [u32; 3], smoothing_group: u32) -> Self {
        Self {
            indices,
            smoothing_group,
        }
    }
}

/// Positions, triangulated faces and the per-position normal buffer filled in
/// by [`compute_smoothing_normals`](super::compute_smoothing_normals).
///
/// `normals` is empty until normals have been synthesized; afterwards it has
/// exactly one entry per position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmoothingMesh {
    pub positions: Vec<Point3>,
    pub faces: Vec<SmoothingFace>,
    pub normals: Vec<Vec3>,
}

impl SmoothingMesh {
    #[must_use]
    pub fn new(positions: Vec<Point3>, faces: Vec<SmoothingFace>) -> Self {
        Self {
            positions,
            faces,
            normals: Vec::new(),
        }
    }

    /// Build a mesh from packed buffers as handed over by JS or a file importer.
    ///
    /// `positions` is `[x0, y0, z0, x1, ...]`, `indices` a triangle list and
    /// `smoothing_groups` one mask per triangle. Index ranges are not checked
    /// here; see [`validate`](Self::validate).
    pub fn from_flat(
        positions: &[f64],
        indices: &[u32],
        smoothing_groups: &[u32],
    ) -> Result<Self, SmoothingError> {
        if positions.len() % 3 != 0 {
            return Err(SmoothingError::PositionBufferLength {
                len: positions.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(SmoothingError::NotTriangulated {
                index_count: indices.len(),
            });
        }
        let face_count = indices.len() / 3;
        if smoothing_groups.len() != face_count {
            return Err(SmoothingError::GroupCountMismatch {
                faces: face_count,
                groups: smoothing_groups.len(),
            });
        }

        let positions = positions
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        let faces = indices
            .chunks_exact(3)
            .zip(smoothing_groups)
            .map(|(tri, &group)| SmoothingFace::new([tri[0], tri[1], tri[2]], group))
            .collect();

        Ok(Self::new(positions, faces))
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true when there is one normal per position. Always true for a
    /// mesh without positions.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.normals.len() == self.positions.len()
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.positions)
    }

    /// Check that every face corner addresses an existing position.
    ///
    /// Reports the first offending corner in face order.
    pub fn validate(&self) -> Result<(), SmoothingError> {
        let vertex_count = self.positions.len();
        for (face, f) in self.faces.iter().enumerate() {
            for (corner, &index) in f.indices.iter().enumerate() {
                if index as usize >= vertex_count {
                    return Err(SmoothingError::IndexOutOfRange {
                        face,
                        corner,
                        index,
                        vertex_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of positions that no face refers to.
    #[must_use]
    pub fn unreferenced_vertex_count(&self) -> usize {
        let mut used = vec![false; self.positions.len()];
        for face in &self.faces {
            for &i in &face.indices {
                if let Some(slot) = used.get_mut(i as usize) {
                    *slot = true;
                }
            }
        }
        used.iter().filter(|u| !**u).count()
    }

    /// Copy of the mesh where every face corner has its own position.
    ///
    /// Face `f` uses positions `3f`, `3f + 1` and `3f + 2`. Coincident corners are
    /// then only related through the spatial tolerance, so each face's normal
    /// survives the flat pass. Out-of-range corners are not copied; call
    /// [`validate`](Self::validate) first. Normals are not carried over.
    #[must_use]
    pub fn unjoined(&self) -> SmoothingMesh {
        let mut positions = Vec::with_capacity(self.faces.len() * 3);
        let mut faces = Vec::with_capacity(self.faces.len());

        for face in &self.faces {
            let base = positions.len() as u32;
            for &i in &face.indices {
                positions.push(self.positions.get(i as usize).copied().unwrap_or_default());
            }
            faces.push(SmoothingFace::new(
                [base, base + 1, base + 2],
                face.smoothing_group,
            ));
        }

        SmoothingMesh::new(positions, faces)
    }

    #[must_use]
    pub fn positions_flat(&self) -> Vec<f64> {
        self.positions.iter().flat_map(|p| p.to_array()).collect()
    }

    #[must_use]
    pub fn indices_flat(&self) -> Vec<u32> {
        self.faces.iter().flat_map(|f| f.indices).collect()
    }

    #[must_use]
    pub fn smoothing_groups(&self) -> Vec<u32> {
        self.faces.iter().map(|f| f.smoothing_group).collect()
    }

    /// Normal buffer as `[nx0, ny0, nz0, nx1, ...]`; empty before synthesis.
    #[must_use]
    pub fn normals_flat(&self) -> Vec<f64> {
        self.normals.iter().flat_map(|n| n.to_array()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flat_builds_faces_in_order() {
        let mesh = SmoothingMesh::from_flat(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2, 0, 2, 3],
            &[1, 4],
        )
        .expect("valid buffers");

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.faces[0], SmoothingFace::new([0, 1, 2], 1));
        assert_eq!(mesh.faces[1], SmoothingFace::new([0, 2, 3], 4));
        assert!(mesh.normals.is_empty());
        assert!(!mesh.has_normals());
        assert_eq!(mesh.indices_flat(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.smoothing_groups(), vec![1, 4]);
        assert_eq!(mesh.positions_flat().len(), 12);
    }

    #[test]
    fn from_flat_rejects_bad_buffers() {
        assert!(matches!(
            SmoothingMesh::from_flat(&[0.0, 0.0], &[], &[]),
            Err(SmoothingError::PositionBufferLength { len: 2 })
        ));
        assert!(matches!(
            SmoothingMesh::from_flat(&[0.0; 9], &[0, 1, 2, 0], &[1]),
            Err(SmoothingError::NotTriangulated { index_count: 4 })
        ));
        assert!(matches!(
            SmoothingMesh::from_flat(&[0.0; 9], &[0, 1, 2], &[]),
            Err(SmoothingError::GroupCountMismatch { faces: 1, groups: 0 })
        ));
    }

    #[test]
    fn validate_reports_first_bad_corner() {
        let mesh = SmoothingMesh::new(
            vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![
                SmoothingFace::new([0, 1, 2], 1),
                SmoothingFace::new([0, 7, 2], 1),
                SmoothingFace::new([9, 1, 2], 1),
            ],
        );

        match mesh.validate() {
            Err(SmoothingError::IndexOutOfRange {
                face,
                corner,
                index,
                vertex_count,
            }) => {
                assert_eq!((face, corner, index, vertex_count), (1, 1, 7, 3));
            }
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn unjoined_gives_each_corner_a_position() {
        let mesh = SmoothingMesh::from_flat(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2, 0, 2, 3],
            &[1, 2],
        )
        .expect("valid buffers");

        let soup = mesh.unjoined();
        assert_eq!(soup.vertex_count(), 6);
        assert_eq!(soup.faces[1], SmoothingFace::new([3, 4, 5], 2));
        assert_eq!(soup.positions[3], mesh.positions[0]);
        assert_eq!(soup.positions[4], mesh.positions[2]);
        assert_eq!(soup.unreferenced_vertex_count(), 0);
    }

    #[test]
    fn empty_mesh_has_normals_after_synthesis() {
        let mut mesh = SmoothingMesh::default();
        crate::geom::compute_smoothing_normals(&mut mesh).expect("empty mesh is valid");
        assert!(mesh.normals.is_empty());
        assert!(mesh.has_normals());
    }

    #[test]
    fn unreferenced_vertices_are_counted() {
        let mesh = SmoothingMesh::new(
            vec![Point3::ORIGIN; 5],
            vec![SmoothingFace::new([0, 1, 2], 0)],
        );
        assert_eq!(mesh.unreferenced_vertex_count(), 2);
        assert!(mesh.validate().is_ok());
    }
}
