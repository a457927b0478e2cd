use crate::renderer::RenderError;
use glam::{UVec2, Vec2, Vec3};

/// Polygon mesh geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPrimitive {
    vertices_per_face: Vec<i32>,
    vertex_ids: Vec<i32>,
    points: Vec<Vec3>,
}

impl MeshPrimitive {
    /// Build a mesh, checking that face topology matches the point list.
    pub fn new(
        vertices_per_face: Vec<i32>,
        vertex_ids: Vec<i32>,
        points: Vec<Vec3>,
    ) -> Result<Self, RenderError> {
        if vertices_per_face.iter().any(|&n| n < 3) {
            return Err(RenderError::InvalidPrimitive(
                "faces need at least three vertices".into(),
            ));
        }
        let expected: i64 = vertices_per_face.iter().map(|&n| n as i64).sum();
        if expected != vertex_ids.len() as i64 {
            return Err(RenderError::InvalidPrimitive(format!(
                "faces reference {expected} vertices but {} ids were given",
                vertex_ids.len()
            )));
        }
        if let Some(bad) = vertex_ids
            .iter()
            .find(|&&id| id < 0 || id as usize >= points.len())
        {
            return Err(RenderError::InvalidPrimitive(format!(
                "vertex id {bad} out of range for {} points",
                points.len()
            )));
        }
        Ok(Self {
            vertices_per_face,
            vertex_ids,
            points,
        })
    }

    /// A single quad in the XY plane spanning `min`..`max`.
    pub fn plane(min: Vec2, max: Vec2) -> Self {
        Self {
            vertices_per_face: vec![4],
            vertex_ids: vec![0, 1, 3, 2],
            points: vec![
                Vec3::new(min.x, min.y, 0.0),
                Vec3::new(max.x, min.y, 0.0),
                Vec3::new(min.x, max.y, 0.0),
                Vec3::new(max.x, max.y, 0.0),
            ],
        }
    }

    pub fn vertices_per_face(&self) -> &[i32] {
        &self.vertices_per_face
    }

    pub fn vertex_ids(&self) -> &[i32] {
        &self.vertex_ids
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn face_count(&self) -> usize {
        self.vertices_per_face.len()
    }
}

/// Geometry an object can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Mesh(MeshPrimitive),
}

impl From<MeshPrimitive> for Primitive {
    fn from(mesh: MeshPrimitive) -> Self {
        Self::Mesh(mesh)
    }
}

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub resolution: UVec2,
    /// Horizontal field of view in degrees.
    pub fov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            resolution: UVec2::new(640, 480),
            fov: 54.43,
        }
    }
}
