//! Mesh resource manager.
//!
//! The `"Mesh"` implementation of [`ResourceManager`]: creates
//! [`MeshResource`] records whose `load` resolves a stream through the group
//! manager's archive layer and feeds it to the mesh serializer.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::errors::{RelicError, Result, fail};
use crate::group::ResourceGroupManager;
use crate::resources::buffer::BufferManager;
use crate::resources::mesh::Mesh;
use crate::resources::{Resource, ResourceManager, ResourceRef};
use crate::serializer::MeshSerializer;

new_key_type! {
    pub struct MeshHandle;
}

/// Meshes are created after skeletons (200) and materials (100) so their
/// dependencies resolve during ordered group loads.
pub const MESH_LOADING_ORDER: f32 = 300.0;

/// Registry of [`MeshResource`]s, keyed by handle with a name lookup.
pub struct MeshManager {
    buffers: Rc<dyn BufferManager>,
    meshes: SlotMap<MeshHandle, ResourceRef>,
    lookup: FxHashMap<String, MeshHandle>,
}

impl MeshManager {
    #[must_use]
    pub fn new(buffers: Rc<dyn BufferManager>) -> Self {
        Self {
            buffers,
            meshes: SlotMap::default(),
            lookup: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn get(&self, handle: MeshHandle) -> Option<ResourceRef> {
        self.meshes.get(handle).cloned()
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<ResourceRef> {
        let handle = self.lookup.get(name)?;
        self.meshes.get(*handle).cloned()
    }

    #[must_use]
    pub fn handle_by_name(&self, name: &str) -> Option<MeshHandle> {
        self.lookup.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

impl ResourceManager for MeshManager {
    fn resource_type(&self) -> &str {
        "Mesh"
    }

    fn loading_order(&self) -> f32 {
        MESH_LOADING_ORDER
    }

    fn create(&mut self, name: &str, group: &str) -> Result<ResourceRef> {
        if self.lookup.contains_key(name) {
            return fail(RelicError::DuplicateItem(format!(
                "mesh '{name}' already exists"
            )));
        }
        let resource: ResourceRef = Rc::new(RefCell::new(MeshResource {
            name: name.to_string(),
            group: group.to_string(),
            buffers: Rc::clone(&self.buffers),
            mesh: None,
        }));
        let handle = self.meshes.insert(Rc::clone(&resource));
        self.lookup.insert(name.to_string(), handle);
        log::debug!("MeshManager: created mesh resource '{name}' in group '{group}'");
        Ok(resource)
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        let Some(handle) = self.lookup.remove(name) else {
            return fail(RelicError::ItemNotFound(format!(
                "mesh '{name}' not found in MeshManager"
            )));
        };
        if let Some(resource) = self.meshes.remove(handle) {
            resource.borrow_mut().unload();
        }
        log::debug!("MeshManager: removed mesh resource '{name}'");
        Ok(())
    }

    fn remove_all(&mut self) {
        for (_, resource) in &self.meshes {
            resource.borrow_mut().unload();
        }
        self.meshes.clear();
        self.lookup.clear();
    }
}

/// One mesh asset; the filename inside its group's locations is the resource
/// name itself.
pub struct MeshResource {
    name: String,
    group: String,
    buffers: Rc<dyn BufferManager>,
    mesh: Option<Mesh>,
}

impl MeshResource {
    #[must_use]
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }
}

impl Resource for MeshResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn resource_type(&self) -> &str {
        "Mesh"
    }

    fn is_loaded(&self) -> bool {
        self.mesh.is_some()
    }

    fn load(&mut self, groups: &ResourceGroupManager) -> Result<()> {
        if self.mesh.is_some() {
            return Ok(());
        }
        let mut stream = groups.open_resource(&self.name, &self.group)?;
        let serializer = MeshSerializer::new();
        let mesh = serializer.import(&self.name, &mut *stream, self.buffers.as_ref())?;
        self.mesh = Some(mesh);
        log::debug!("loaded mesh '{}'", self.name);
        Ok(())
    }

    fn unload(&mut self) {
        self.mesh = None;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
