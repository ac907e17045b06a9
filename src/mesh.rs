use ash::vk;
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn get_binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// position (location 0), normal (location 1), texcoord (location 2)
    pub fn get_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::size_of::<Vec3>() as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset((std::mem::size_of::<Vec3>() * 2) as u32),
        ]
    }
}

pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// UV sphere centered on the origin.
    ///
    /// `subdivisions_axis` slices around the Y axis, `subdivisions_height`
    /// stacks from pole to pole. The seam column is duplicated so texcoords
    /// wrap cleanly. Triangles wind counter-clockwise seen from outside.
    pub fn create_sphere(radius: f32, subdivisions_axis: u32, subdivisions_height: u32) -> Self {
        let segments = subdivisions_axis.max(3);
        let rings = subdivisions_height.max(2);

        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let phi = std::f32::consts::PI * v;
            let sin_phi = phi.sin();
            let cos_phi = phi.cos();

            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let theta = 2.0 * std::f32::consts::PI * u;

                let normal = Vec3::new(theta.cos() * sin_phi, cos_phi, theta.sin() * sin_phi);

                vertices.push(Vertex {
                    position: normal * radius,
                    normal,
                    uv: Vec2::new(1.0 - u, v),
                });
            }
        }

        let verts_around = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * verts_around + segment;
                let next = current + verts_around;

                indices.push(current);
                indices.push(current + 1);
                indices.push(next);

                indices.push(next);
                indices.push(current + 1);
                indices.push(next + 1);
            }
        }

        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_counts() {
        let mesh = Mesh::create_sphere(10.0, 50, 20);
        assert_eq!(mesh.vertices.len(), 51 * 21);
        assert_eq!(mesh.indices.len(), 50 * 20 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_sphere_vertices_on_surface() {
        let mesh = Mesh::create_sphere(10.0, 16, 8);
        for vertex in &mesh.vertices {
            assert!((vertex.position.length() - 10.0).abs() < 1e-4);
            assert!((vertex.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sphere_winds_outward() {
        let mesh = Mesh::create_sphere(1.0, 16, 8);
        // Skip degenerate pole triangles
        for tri in mesh.indices.chunks(3) {
            let a = mesh.vertices[tri[0] as usize].position;
            let b = mesh.vertices[tri[1] as usize].position;
            let c = mesh.vertices[tri[2] as usize].position;
            let face_normal = (b - a).cross(c - a);
            if face_normal.length() < 1e-6 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0);
        }
    }
}
