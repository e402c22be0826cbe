//! glTF / GLB decoding into scene meshes.

use crate::AssetId;
use crate::error::AssetError;
use base64::Engine;
use enigma_common::{Color, Geometry, ObjectId, Transform};
use enigma_scene::{Material, Mesh, MeshHandle, SceneGraph, SceneNode};
use glam::{Mat4, Vec3};
use gltf::buffer::Source;

/// Extensions whose presence means the geometry cannot be read without a
/// decoder we do not ship.
const UNSUPPORTED_EXTENSIONS: &[&str] = &["KHR_draco_mesh_compression", "EXT_meshopt_compression"];

/// One drawable primitive of a model, already placed in model space.
#[derive(Debug, Clone)]
pub struct ModelMesh {
    pub name: String,
    pub transform: Transform,
    pub mesh: Mesh,
    pub material: Material,
}

/// A decoded glTF scene.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: AssetId,
    pub name: String,
    pub meshes: Vec<ModelMesh>,
}

impl Model {
    pub fn mesh_handles(&self) -> Vec<MeshHandle> {
        self.meshes.iter().map(|m| m.mesh.handle).collect()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.geometry.triangle_count()).sum()
    }

    /// Add one scene node per mesh, sharing geometry with the model.
    pub fn instantiate(&self, graph: &mut SceneGraph) -> Vec<ObjectId> {
        self.meshes
            .iter()
            .map(|m| {
                let node = SceneNode::new(m.name.clone())
                    .with_mesh(m.mesh.clone(), m.material)
                    .with_transform(m.transform);
                graph.add(node)
            })
            .collect()
    }
}

/// Raw glTF document plus the buffer payloads it references.
pub(crate) struct GltfSource {
    pub document: gltf::Document,
    pub blob: Option<Vec<u8>>,
}

impl GltfSource {
    pub fn parse(bytes: &[u8]) -> Result<Self, AssetError> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        for ext in document.extensions_required() {
            if UNSUPPORTED_EXTENSIONS.contains(&ext) {
                return Err(AssetError::UnsupportedExtension(ext.to_string()));
            }
        }
        Ok(Self { document, blob })
    }

    /// URIs of buffers stored next to the model file.
    pub fn external_buffers(&self) -> Vec<(usize, String)> {
        self.document
            .buffers()
            .filter_map(|buffer| match buffer.source() {
                Source::Uri(uri) if !uri.starts_with("data:") => {
                    Some((buffer.index(), uri.to_string()))
                }
                _ => None,
            })
            .collect()
    }

    /// Resolve every buffer. `external` holds the bytes fetched for
    /// [`Self::external_buffers`], keyed by buffer index.
    pub fn resolve_buffers(
        &mut self,
        mut external: Vec<(usize, Vec<u8>)>,
    ) -> Result<Vec<Vec<u8>>, AssetError> {
        let mut buffers = Vec::new();
        for buffer in self.document.buffers() {
            let index = buffer.index();
            let data = match buffer.source() {
                Source::Bin => self.blob.take().ok_or(AssetError::MissingBuffer(index))?,
                Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?,
                Source::Uri(_) => {
                    let pos = external
                        .iter()
                        .position(|(i, _)| *i == index)
                        .ok_or(AssetError::MissingBuffer(index))?;
                    external.swap_remove(pos).1
                }
            };
            if data.len() < buffer.length() {
                return Err(AssetError::MissingBuffer(index));
            }
            buffers.push(data);
        }
        Ok(buffers)
    }

    /// Walk the default scene (or every mesh, when the file has no scenes)
    /// and decode triangle primitives.
    pub fn decode(&self, id: AssetId, name: &str, buffers: &[Vec<u8>]) -> Result<Model, AssetError> {
        let mut meshes = Vec::new();
        let scene = self
            .document
            .default_scene()
            .or_else(|| self.document.scenes().next());
        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    self.visit(node, Mat4::IDENTITY, buffers, &mut meshes);
                }
            }
            None => {
                for mesh in self.document.meshes() {
                    push_mesh(mesh, Mat4::IDENTITY, buffers, &mut meshes);
                }
            }
        }
        if meshes.is_empty() {
            return Err(AssetError::NoGeometry(name.to_string()));
        }
        Ok(Model {
            id,
            name: name.to_string(),
            meshes,
        })
    }

    fn visit(
        &self,
        node: gltf::Node<'_>,
        parent: Mat4,
        buffers: &[Vec<u8>],
        out: &mut Vec<ModelMesh>,
    ) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            push_mesh(mesh, world, buffers, out);
        }
        for child in node.children() {
            self.visit(child, world, buffers, out);
        }
    }
}

fn push_mesh(mesh: gltf::Mesh<'_>, world: Mat4, buffers: &[Vec<u8>], out: &mut Vec<ModelMesh>) {
    let (scale, rotation, position) = world.to_scale_rotation_translation();
    let transform = Transform {
        position,
        rotation,
        scale,
    };
    let base_name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));

    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(mesh = %base_name, mode = ?prim.mode(), "skipping non-triangle primitive");
            continue;
        }
        let reader = prim.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let indices = reader.read_indices().map(|i| i.into_u32().collect::<Vec<u32>>());
        let mut geometry = Geometry {
            normals: Vec::new(),
            positions,
            indices,
        };
        geometry.normals = match reader.read_normals() {
            Some(normals) => normals.collect(),
            None => smooth_normals(&geometry),
        };

        let name = if mesh.primitives().len() > 1 {
            format!("{base_name}.{}", prim.index())
        } else {
            base_name.clone()
        };
        out.push(ModelMesh {
            name,
            transform,
            mesh: Mesh::new(geometry),
            material: convert_material(&prim.material()),
        });
    }
}

fn convert_material(material: &gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let [er, eg, eb] = material.emissive_factor();
    Material {
        color: Color::rgb(r, g, b),
        emissive: Color::rgb(er, eg, eb),
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
    }
}

/// Area-weighted vertex normals for geometry that ships without them.
fn smooth_normals(geometry: &Geometry) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; geometry.positions.len()];
    for tri in geometry.indices_or_sequential().chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= acc.len() || b >= acc.len() || c >= acc.len() {
            continue;
        }
        let pa = Vec3::from_array(geometry.positions[a]);
        let pb = Vec3::from_array(geometry.positions[b]);
        let pc = Vec3::from_array(geometry.positions[c]);
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let payload = uri.split_once(";base64,").map(|(_, data)| data).unwrap_or("");
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

/// Locator of `uri` relative to the directory of `base`.
pub(crate) fn sibling_locator(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(i) => format!("{}{}", &base[..=i], uri),
        None => uri.to_string(),
    }
}
