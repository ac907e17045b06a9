/// Construction of the sun / planet / moon hierarchy
///
/// Every body hangs under an orbit pivot that is translated out along X.
/// Spinning the pivot revolves the body around the pivot's parent; spinning
/// the body rotates it in place.
use glam::{Mat4, Vec3, Vec4};

use crate::config::AppConfig;
use crate::error::SceneError;
use crate::material::DrawRecord;
use crate::scene::{NodeId, NodeKind, SceneGraph};
use crate::texture::TextureLoader;

/// Static description of one body
#[derive(Debug, Clone, Copy)]
pub struct BodySpec {
    pub name: &'static str,
    /// Orbit of another body this one circles; `None` means the sun
    pub orbits: Option<&'static str>,
    /// Distance from the orbit center; `None` for the sun itself
    pub distance: Option<f32>,
    pub scale: f32,
    pub color: Vec4,
    pub orbit_rate: f32,
    pub spin_rate: f32,
}

const fn body(
    name: &'static str,
    orbits: Option<&'static str>,
    distance: Option<f32>,
    scale: f32,
    color: [f32; 4],
    orbit_rate: f32,
    spin_rate: f32,
) -> BodySpec {
    BodySpec {
        name,
        orbits,
        distance,
        scale,
        color: Vec4::from_array(color),
        orbit_rate,
        spin_rate,
    }
}

/// Bodies in draw order. A body's `orbits` entry must appear before it.
pub const BODIES: [BodySpec; 10] = [
    body("Sun", None, None, 7.0, [6.0, 5.0, 0.0, 1.0], 0.0, 0.001),
    body("Mercury", None, Some(150.0), 0.8, [0.8, 0.4, 0.4, 1.0], 0.03, 0.005),
    body("Venus", None, Some(250.0), 1.25, [0.8, 0.5, 0.2, 1.0], 0.0115, 0.0015),
    body("Earth", None, Some(350.0), 1.3, [0.2, 0.5, 0.8, 1.0], 0.01, 0.04),
    body("Moon", Some("Earth"), Some(30.0), 0.3, [0.6, 0.6, 0.6, 1.0], 0.01, -0.01),
    body("Mars", None, Some(450.0), 1.0, [0.8, 0.3, 0.3, 1.0], 0.005, 0.04),
    body("Jupiter", None, Some(550.0), 2.5, [0.8, 0.3, 0.8, 1.0], 0.0009, 0.06),
    body("Saturn", None, Some(650.0), 2.1, [0.8, 0.8, 0.5, 1.0], 0.0005, 0.07),
    body("Uranus", None, Some(750.0), 1.5, [0.1, 0.8, 0.5, 1.0], 0.0003, 0.08),
    body("Neptune", None, Some(850.0), 1.2, [0.1, 0.1, 0.8, 1.0], 0.0002, 0.09),
];

/// Name given to the orbit pivot of a body
pub fn orbit_name(body: &str) -> String {
    format!("{} Orbit", body)
}

/// Assembled hierarchy plus the node lists the frame loop walks
pub struct SolarSystem {
    pub graph: SceneGraph,
    pub root: NodeId,
    pub sun: NodeId,
    /// Orbit pivots in table order
    pub orbits: Vec<NodeId>,
    /// Drawable bodies in table order
    pub bodies: Vec<NodeId>,
}

impl SolarSystem {
    /// Build the hierarchy. Bodies with a configured texture path get a
    /// textured material and their load is queued on `textures`.
    pub fn build(config: &AppConfig, textures: &mut TextureLoader) -> Result<Self, SceneError> {
        let mut graph = SceneGraph::new();
        let root = graph.spawn("Solar System", NodeKind::Root, Mat4::IDENTITY);

        let mut orbits = Vec::new();
        let mut bodies = Vec::new();
        let mut sun = None;

        for spec in &BODIES {
            let parent = match spec.distance {
                Some(distance) => {
                    let orbit_parent = match spec.orbits {
                        Some(center) => graph.find(&orbit_name(center)).unwrap_or(root),
                        None => root,
                    };
                    let orbit = graph.spawn(
                        &orbit_name(spec.name),
                        NodeKind::Orbit,
                        Mat4::from_translation(Vec3::new(distance, 0.0, 0.0)),
                    );
                    graph.set_parent(orbit, Some(orbit_parent))?;
                    graph.set_angular_rate(orbit, spec.orbit_rate);
                    orbits.push(orbit);
                    orbit
                }
                None => root,
            };

            let node = graph.spawn(spec.name, NodeKind::Body, Mat4::from_scale(Vec3::splat(spec.scale)));
            graph.set_parent(node, Some(parent))?;
            graph.set_angular_rate(node, spec.spin_rate);

            let record = match config.textures.get(spec.name) {
                Some(path) => DrawRecord::textured(textures.request(path), spec.color),
                None => DrawRecord::color(spec.color),
            };
            tracing::debug!("Body {} -> {:?}", spec.name, record.material);
            graph.attach_draw_record(node, record);

            if spec.distance.is_none() {
                sun = Some(node);
            }
            bodies.push(node);
        }

        let sun = sun.ok_or(SceneError::UnknownNode(root))?;
        graph.update_world_matrices(root);

        tracing::info!("Built solar system: {} nodes, {} bodies", graph.len(), bodies.len());

        Ok(Self {
            graph,
            root,
            sun,
            orbits,
            bodies,
        })
    }

    pub fn body(&self, name: &str) -> Option<NodeId> {
        self.bodies
            .iter()
            .copied()
            .find(|&node| self.graph.name(node).as_deref() == Some(name))
    }

    /// World-space center of a body
    pub fn body_position(&self, name: &str) -> Option<Vec3> {
        self.body(name)
            .map(|node| self.graph.world_matrix(node).transform_point3(Vec3::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;

    fn build() -> SolarSystem {
        SolarSystem::build(&AppConfig::default(), &mut TextureLoader::new()).unwrap()
    }

    #[test]
    fn test_hierarchy_shape() {
        let system = build();
        assert_eq!(system.bodies.len(), 10);
        assert_eq!(system.orbits.len(), 9);
        assert_eq!(system.graph.drawables().len(), 10);

        // Sun plus the eight orbits hung directly off the root
        let root_children = system.graph.children(system.root);
        assert_eq!(root_children.len(), 9);
        assert_eq!(root_children[0], system.sun);

        let moon_orbit = system.graph.find("Moon Orbit").unwrap();
        let earth_orbit = system.graph.find("Earth Orbit").unwrap();
        assert_eq!(system.graph.parent(moon_orbit), Some(earth_orbit));
    }

    #[test]
    fn test_initial_positions() {
        let system = build();
        let earth = system.body_position("Earth").unwrap();
        assert!(earth.abs_diff_eq(Vec3::new(350.0, 0.0, 0.0), 1e-3));
        let moon = system.body_position("Moon").unwrap();
        assert!(moon.abs_diff_eq(Vec3::new(380.0, 0.0, 0.0), 1e-3));
        assert!(system.body_position("Pluto").is_none());
    }

    #[test]
    fn test_configured_texture_makes_textured_material() {
        let mut config = AppConfig::default();
        config.textures.insert("Earth".to_string(), "missing/earth.jpg".to_string());
        let mut loader = TextureLoader::new();
        let system = SolarSystem::build(&config, &mut loader).unwrap();

        let earth = system.body("Earth").unwrap();
        let record = system.graph.draw_record(earth).unwrap();
        assert!(matches!(record.material, Material::Texture { placeholder: [51, 128, 204, 255], .. }));

        let mars = system.body("Mars").unwrap();
        assert!(matches!(system.graph.draw_record(mars).unwrap().material, Material::Color(_)));
    }
}
