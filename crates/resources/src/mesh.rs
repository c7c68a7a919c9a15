//! CPU-side mesh data: OBJ loading and the built-in cube.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use meshview_rhi::vertex::Vertex;
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

/// Triangle-list geometry with one texture coordinate per position.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Load every object of an OBJ file into a single mesh.
    ///
    /// Faces are triangulated and re-indexed so each vertex has one index.
    /// The V coordinate is flipped to put the texture origin at the top left;
    /// objects without texture coordinates get `(0, 0)`.
    pub fn load_obj(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (models, _materials) =
            tobj::load_obj(path, &load_options()).map_err(|source| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                source,
            })?;

        let mesh = Self::from_models(&models, path)?;
        info!(
            "Loaded {:?}: {} vertices, {} triangles",
            path,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Parse OBJ text from a reader. Material libraries are not followed.
    ///
    /// `name` is only used in error messages.
    pub fn from_obj_reader<R: BufRead>(reader: &mut R, name: &Path) -> ResourceResult<Self> {
        let (models, _materials) =
            tobj::load_obj_buf(reader, &load_options(), |_| {
                Err(tobj::LoadError::OpenFileFailed)
            })
            .map_err(|source| ResourceError::ObjLoad {
                path: name.to_path_buf(),
                source,
            })?;

        Self::from_models(&models, name)
    }

    fn from_models(models: &[tobj::Model], path: &Path) -> ResourceResult<Self> {
        let mut mesh = Self::default();

        for model in models {
            let m = &model.mesh;
            let base = mesh.positions.len() as u32;
            let vertex_count = m.positions.len() / 3;

            mesh.positions.extend(
                m.positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2])),
            );

            if m.texcoords.len() == vertex_count * 2 {
                mesh.tex_coords.extend(
                    m.texcoords
                        .chunks_exact(2)
                        .map(|t| Vec2::new(t[0], 1.0 - t[1])),
                );
            } else {
                mesh.tex_coords
                    .extend(std::iter::repeat_n(Vec2::ZERO, vertex_count));
            }

            mesh.indices.extend(m.indices.iter().map(|i| base + i));

            debug!(
                "OBJ object '{}': {} vertices, {} indices",
                model.name,
                vertex_count,
                m.indices.len()
            );
        }

        if mesh.indices.is_empty() {
            return Err(ResourceError::NoMeshes(PathBuf::from(path)));
        }

        Ok(mesh)
    }

    /// The unit cube centred at the origin: 24 vertices, 36 indices.
    ///
    /// Each face has its own four vertices so texture coordinates do not bleed
    /// across edges. Triangles wind clockwise seen from outside.
    pub fn cube() -> Self {
        const P: [[f32; 3]; 8] = [
            [-0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [0.5, 0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
            [-0.5, -0.5, 0.5],
        ];
        const T: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        // (position, texcoord) per corner, four corners per face
        const FACES: [[(usize, usize); 4]; 6] = [
            [(0, 1), (1, 0), (2, 2), (3, 3)], // front
            [(4, 1), (5, 0), (6, 2), (7, 3)], // back
            [(1, 1), (6, 0), (5, 2), (2, 3)], // top
            [(7, 1), (0, 0), (3, 2), (4, 3)], // bottom
            [(3, 1), (2, 0), (5, 2), (4, 3)], // right
            [(7, 1), (6, 0), (1, 2), (0, 3)], // left
        ];

        let mut mesh = Self::default();
        for (face, corners) in FACES.iter().enumerate() {
            for &(p, t) in corners {
                mesh.positions.push(Vec3::from_array(P[p]));
                mesh.tex_coords.push(Vec2::from_array(T[t]));
            }
            let b = face as u32 * 4;
            mesh.indices
                .extend_from_slice(&[b, b + 1, b + 2, b + 2, b + 3, b]);
        }
        mesh
    }

    /// Interleaved vertices for upload.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.tex_coords)
            .map(|(&p, &t)| Vertex::new(p, t))
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
o quad
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    fn parse(text: &str) -> ResourceResult<MeshData> {
        MeshData::from_obj_reader(&mut Cursor::new(text), Path::new("test.obj"))
    }

    #[test]
    fn test_quad_is_triangulated() {
        let mesh = parse(QUAD_OBJ).expect("quad parses");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_v_coordinate_flipped() {
        let mesh = parse(QUAD_OBJ).expect("quad parses");
        let first = mesh
            .positions
            .iter()
            .position(|&p| p == Vec3::new(-1.0, -1.0, 0.0))
            .expect("corner present");
        assert_eq!(mesh.tex_coords[first], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_missing_texcoords_default_to_zero() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").expect("triangle parses");
        assert_eq!(mesh.tex_coords, vec![Vec2::ZERO; 3]);
    }

    #[test]
    fn test_objects_merged_with_offset_indices() {
        let text = "\
o a
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o b
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";
        let mesh = parse(text).expect("two objects parse");
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.indices[3..].iter().all(|&i| i >= 3));
    }

    #[test]
    fn test_empty_obj_has_no_meshes() {
        assert!(matches!(
            parse("# nothing here\n"),
            Err(ResourceError::NoMeshes(_))
        ));
    }

    #[test]
    fn test_load_obj_missing_file() {
        let result = MeshData::load_obj(Path::new("does/not/exist.obj"));
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }

    #[test]
    fn test_cube_layout() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.tex_coords.len(), 24);
        assert!(cube.positions.iter().all(|p| p.abs() == Vec3::splat(0.5)));
        assert_eq!(&cube.indices[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&cube.indices[30..], &[20, 21, 22, 22, 23, 20]);
    }

    #[test]
    fn test_cube_triangles_face_outward() {
        let cube = MeshData::cube();
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| cube.positions[i as usize]);
            let normal = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(normal.dot(centre) > 0.0, "triangle {:?} winds the wrong way", tri);
        }
    }

    #[test]
    fn test_vertices_interleave() {
        let cube = MeshData::cube();
        let vertices = cube.vertices();
        assert_eq!(vertices.len(), 24);
        assert_eq!(vertices[0].position, cube.positions[0]);
        assert_eq!(vertices[0].tex_coord, Vec2::new(0.0, 1.0));
    }
}
