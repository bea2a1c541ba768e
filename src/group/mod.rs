//! Resource Group Management
//!
//! A resource group is a named set of storage locations and resources that
//! load and unload as a unit. The [`ResourceGroupManager`] owns the group
//! records and drives the lifecycle:
//!
//! declaration → script parsing → resource creation → loading → unloading →
//! destruction, with listener notification at each phase.
//!
//! The manager is an explicitly constructed service object; create one, pass
//! it by reference to the subsystems that need it, and drop it when the
//! application context ends.

pub mod listener;

pub use listener::ResourceGroupListener;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::archive::{Archive, DataStream};
use crate::errors::{RelicError, Result, fail};
use crate::resources::{ResourceDeclaration, ResourceManager, ResourceRef, ScriptLoader};

/// The group resources land in when no group is named.
pub const DEFAULT_RESOURCE_GROUP: &str = "General";

/// Reserved group mirroring default-group locations for world geometry.
pub const WORLD_RESOURCE_GROUP: &str = "World";

/// Real-valued loading-order key with a total order.
///
/// Lower orders load earlier and unload later, so cross-type dependencies
/// (skeleton before mesh) resolve in both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOrder(pub f32);

impl Eq for LoadOrder {}

impl PartialOrd for LoadOrder {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadOrder {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// How [`ResourceGroupManager::drop_group_contents`] disposes of a group's
/// resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    /// Unload and drop the group's references; the owning managers keep
    /// their records.
    UnloadOnly,
    /// Ask each resource's owning manager to remove its record as well.
    RemoveFromManagers,
}

struct ResourceLocation {
    archive: Rc<dyn Archive>,
    recursive: bool,
}

#[derive(Clone)]
struct IndexEntry {
    archive: Rc<dyn Archive>,
    path: String,
}

/// A named set of storage locations, pending declarations, and created
/// resources bucketed by loading order.
pub struct ResourceGroup {
    name: String,
    initialised: bool,
    locations: Vec<ResourceLocation>,
    /// Eager name → (archive, path) index over every location, built when
    /// locations are added. Recursive locations index both the full relative
    /// path and the bare basename; collisions are last-location-wins.
    resource_index: FxHashMap<String, IndexEntry>,
    declarations: Vec<ResourceDeclaration>,
    load_order: BTreeMap<LoadOrder, Vec<ResourceRef>>,
}

impl ResourceGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initialised: false,
            locations: Vec::new(),
            resource_index: FxHashMap::default(),
            declarations: Vec::new(),
            load_order: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// Created resources across all loading-order buckets.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.load_order.values().map(Vec::len).sum()
    }

    /// Resources in ascending loading order.
    fn resources_ascending(&self) -> Vec<ResourceRef> {
        self.load_order.values().flatten().cloned().collect()
    }

    /// Resources in descending loading order, for dependency unwind.
    fn resources_descending(&self) -> Vec<ResourceRef> {
        self.load_order.values().rev().flatten().cloned().collect()
    }

    fn index_location(&mut self, archive: &Rc<dyn Archive>, recursive: bool) -> usize {
        let names = archive.find("*", recursive);
        let count = names.len();
        for name in names {
            if recursive
                && let Some(base) = name.rsplit('/').next()
                && base != name
            {
                self.resource_index.insert(
                    base.to_string(),
                    IndexEntry {
                        archive: Rc::clone(archive),
                        path: name.clone(),
                    },
                );
            }
            self.resource_index.insert(
                name.clone(),
                IndexEntry {
                    archive: Rc::clone(archive),
                    path: name,
                },
            );
        }
        count
    }

    fn rebuild_index(&mut self) {
        self.resource_index.clear();
        let locations: Vec<(Rc<dyn Archive>, bool)> = self
            .locations
            .iter()
            .map(|loc| (Rc::clone(&loc.archive), loc.recursive))
            .collect();
        for (archive, recursive) in locations {
            self.index_location(&archive, recursive);
        }
    }
}

/// Owner of all resource groups and driver of the declaration → creation →
/// load lifecycle.
///
/// Single-threaded by design: the `current_group` cursor routes
/// resource-created/removed notifications to the group being batch-operated
/// on, and would race under concurrent group operations.
pub struct ResourceGroupManager {
    groups: FxHashMap<String, ResourceGroup>,
    managers: FxHashMap<String, Rc<RefCell<dyn ResourceManager>>>,
    script_loaders: Vec<Rc<RefCell<dyn ScriptLoader>>>,
    listeners: Vec<Rc<RefCell<dyn ResourceGroupListener>>>,
    /// Single-group-at-a-time cursor; set for the duration of one batch
    /// operation so notifications skip the name-based group lookup.
    current_group: Option<String>,
    world_group_linked: bool,
}

impl Default for ResourceGroupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGroupManager {
    /// Creates a manager with the default and world groups already present.
    #[must_use]
    pub fn new() -> Self {
        let mut groups = FxHashMap::default();
        groups.insert(
            DEFAULT_RESOURCE_GROUP.to_string(),
            ResourceGroup::new(DEFAULT_RESOURCE_GROUP),
        );
        groups.insert(
            WORLD_RESOURCE_GROUP.to_string(),
            ResourceGroup::new(WORLD_RESOURCE_GROUP),
        );
        Self {
            groups,
            managers: FxHashMap::default(),
            script_loaders: Vec::new(),
            listeners: Vec::new(),
            current_group: None,
            world_group_linked: false,
        }
    }

    /// When set, locations added to the default group are mirrored into the
    /// world group.
    pub fn set_world_group_linked(&mut self, linked: bool) {
        self.world_group_linked = linked;
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub fn register_resource_manager(&mut self, manager: Rc<RefCell<dyn ResourceManager>>) {
        let resource_type = manager.borrow().resource_type().to_string();
        log::info!("registering resource manager for type '{resource_type}'");
        self.managers.insert(resource_type, manager);
    }

    pub fn unregister_resource_manager(&mut self, resource_type: &str) {
        if self.managers.remove(resource_type).is_some() {
            log::info!("unregistered resource manager for type '{resource_type}'");
        }
    }

    #[must_use]
    pub fn resource_manager(&self, resource_type: &str) -> Option<Rc<RefCell<dyn ResourceManager>>> {
        self.managers.get(resource_type).cloned()
    }

    pub fn register_script_loader(&mut self, loader: Rc<RefCell<dyn ScriptLoader>>) {
        self.script_loaders.push(loader);
    }

    pub fn unregister_script_loader(&mut self, loader: &Rc<RefCell<dyn ScriptLoader>>) {
        self.script_loaders
            .retain(|candidate| !Rc::ptr_eq(candidate, loader));
    }

    pub fn add_listener(&mut self, listener: Rc<RefCell<dyn ResourceGroupListener>>) {
        self.listeners.push(listener);
    }

    pub fn remove_listener(&mut self, listener: &Rc<RefCell<dyn ResourceGroupListener>>) {
        self.listeners
            .retain(|candidate| !Rc::ptr_eq(candidate, listener));
    }

    // ========================================================================
    // Group Lifecycle
    // ========================================================================

    /// Creates an empty group. Fails with `DuplicateItem` if the name
    /// already exists.
    pub fn create_resource_group(&mut self, name: &str) -> Result<()> {
        if self.groups.contains_key(name) {
            return fail(RelicError::DuplicateItem(format!(
                "resource group '{name}' already exists"
            )));
        }
        log::info!("creating resource group '{name}'");
        self.groups
            .insert(name.to_string(), ResourceGroup::new(name));
        Ok(())
    }

    /// Attaches an archive to a group, auto-creating the group, and eagerly
    /// indexes every file in it. A location added to the default group is
    /// mirrored into the world group when world linking is enabled.
    pub fn add_resource_location(
        &mut self,
        archive: Rc<dyn Archive>,
        group: &str,
        recursive: bool,
    ) {
        self.add_location_to(group, &archive, recursive);
        if self.world_group_linked && group == DEFAULT_RESOURCE_GROUP {
            self.add_location_to(WORLD_RESOURCE_GROUP, &archive, recursive);
        }
    }

    fn add_location_to(&mut self, group: &str, archive: &Rc<dyn Archive>, recursive: bool) {
        let group_entry = self.groups.entry(group.to_string()).or_insert_with(|| {
            log::info!("creating resource group '{group}'");
            ResourceGroup::new(group)
        });
        let indexed = group_entry.index_location(archive, recursive);
        group_entry.locations.push(ResourceLocation {
            archive: Rc::clone(archive),
            recursive,
        });
        log::debug!(
            "added location '{}' to group '{group}' ({indexed} entries indexed, recursive: {recursive})",
            archive.name()
        );
    }

    /// Detaches a location by archive name and rebuilds the group's index
    /// from the locations that remain.
    pub fn remove_resource_location(&mut self, archive_name: &str, group: &str) -> Result<()> {
        let group_entry = self.group_mut(group)?;
        let before = group_entry.locations.len();
        group_entry
            .locations
            .retain(|loc| loc.archive.name() != archive_name);
        if group_entry.locations.len() == before {
            return fail(RelicError::ItemNotFound(format!(
                "location '{archive_name}' in group '{group}'"
            )));
        }
        group_entry.rebuild_index();
        log::debug!("removed location '{archive_name}' from group '{group}'");
        Ok(())
    }

    /// Records a promise to create a resource of `resource_type` when the
    /// group is initialised. No resource instance side effects.
    pub fn declare_resource(
        &mut self,
        name: &str,
        resource_type: &str,
        group: &str,
        params: Vec<(String, String)>,
    ) -> Result<()> {
        let group_entry = self.group_mut(group)?;
        group_entry.declarations.push(ResourceDeclaration {
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            params,
        });
        Ok(())
    }

    /// Removes a pending declaration by name.
    pub fn undeclare_resource(&mut self, name: &str, group: &str) -> Result<()> {
        let group_entry = self.group_mut(group)?;
        group_entry.declarations.retain(|decl| decl.name != name);
        Ok(())
    }

    /// Parses the group's scripts, then materializes its declarations into
    /// unloaded resources, filing each under its manager's loading order.
    ///
    /// A failure leaves previously parsed scripts and already-created
    /// resources in place; callers retry by destroying and rebuilding the
    /// group.
    pub fn initialise_resource_group(&mut self, name: &str) -> Result<()> {
        if self.group(name)?.initialised {
            log::debug!("resource group '{name}' already initialised");
            return Ok(());
        }
        log::info!("initialising resource group '{name}'");
        self.current_group = Some(name.to_string());
        let result = self
            .parse_resource_group_scripts(name)
            .and_then(|()| self.create_declared_resources(name));
        self.current_group = None;
        if result.is_ok() {
            self.group_mut(name)?.initialised = true;
        }
        result
    }

    /// Initialises every group that has not been initialised yet.
    pub fn initialise_all_resource_groups(&mut self) -> Result<()> {
        let pending: Vec<String> = self
            .groups
            .values()
            .filter(|group| !group.initialised)
            .map(|group| group.name.clone())
            .collect();
        for name in pending {
            self.initialise_resource_group(&name)?;
        }
        Ok(())
    }

    /// Loads every created resource in the group in ascending loading
    /// order, firing progress events. A no-op on a group with no created
    /// resources.
    pub fn load_resource_group(&mut self, name: &str) -> Result<()> {
        self.group(name)?;
        self.current_group = Some(name.to_string());
        let result = self.load_group_inner(name);
        self.current_group = None;
        result
    }

    /// Unloads every resource in the group in descending loading order
    /// (reverse dependency unwind), keeping the resource records.
    pub fn unload_resource_group(&mut self, name: &str) -> Result<()> {
        let resources = self.group(name)?.resources_descending();
        log::info!("unloading resource group '{name}'");
        self.current_group = Some(name.to_string());
        for resource in resources {
            resource.borrow_mut().unload();
        }
        self.current_group = None;
        Ok(())
    }

    /// Destroys the group's resources, keeping its locations and group
    /// record; the group ends initialised-but-empty.
    pub fn clear_resource_group(&mut self, name: &str) -> Result<()> {
        log::info!("clearing resource group '{name}'");
        self.drop_group_contents(name, DropMode::RemoveFromManagers)
    }

    /// Destroys the group's resources and erases the group record,
    /// including its locations.
    pub fn destroy_resource_group(&mut self, name: &str) -> Result<()> {
        log::info!("destroying resource group '{name}'");
        self.drop_group_contents(name, DropMode::RemoveFromManagers)?;
        self.groups.remove(name);
        Ok(())
    }

    /// Single teardown path for a group's contents. Resources are disposed
    /// in descending loading order; the group's load-order buckets are
    /// cleared either way, `mode` decides whether the owning managers drop
    /// their records too.
    pub fn drop_group_contents(&mut self, name: &str, mode: DropMode) -> Result<()> {
        self.group(name)?;
        self.current_group = Some(name.to_string());
        let result = self.drop_contents_inner(name, mode);
        self.current_group = None;
        result
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[must_use]
    pub fn resource_group_exists(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Group names in unspecified order.
    #[must_use]
    pub fn resource_groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Borrow a group record for inspection.
    pub fn resource_group(&self, name: &str) -> Result<&ResourceGroup> {
        self.group(name)
    }

    /// Whether a resource name resolves in the group's index or any of its
    /// locations.
    pub fn resource_exists(&self, name: &str, group: &str) -> Result<bool> {
        let group_entry = self.group(group)?;
        if group_entry.resource_index.contains_key(name) {
            return Ok(true);
        }
        Ok(group_entry
            .locations
            .iter()
            .any(|loc| loc.archive.exists(name)))
    }

    /// Opens a named resource stream: the precomputed index first, then a
    /// linear probe of every attached location. Exhaustion is a
    /// `FileNotFound` condition, not a soft `None`.
    pub fn open_resource(&self, name: &str, group: &str) -> Result<DataStream> {
        let group_entry = self.group(group)?;
        if let Some(entry) = group_entry.resource_index.get(name) {
            return entry.archive.open(&entry.path);
        }
        for location in &group_entry.locations {
            if location.archive.exists(name) {
                return location.archive.open(name);
            }
        }
        fail(RelicError::FileNotFound(format!(
            "resource '{name}' in group '{group}'"
        )))
    }

    /// Names matching a pattern across every location attached to the
    /// group, respecting each location's recursive flag. An empty result is
    /// not an error.
    pub fn find_resource_names(&self, pattern: &str, group: &str) -> Result<Vec<String>> {
        Ok(self
            .find_resources_in(self.group(group)?, pattern)
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    // ========================================================================
    // Notification Routing
    // ========================================================================

    /// Files an ad hoc resource (created outside the batch path) into its
    /// group. Mid batch-operation the cursor group is used directly;
    /// otherwise the resource's own recorded group is looked up.
    pub fn notify_resource_created(&mut self, resource: &ResourceRef) -> Result<()> {
        let group_name = self
            .current_group
            .clone()
            .unwrap_or_else(|| resource.borrow().group().to_string());
        let order = self.loading_order_for(&resource.borrow().resource_type().to_string());
        let group = self.group_mut(&group_name)?;
        group
            .load_order
            .entry(LoadOrder(order))
            .or_default()
            .push(Rc::clone(resource));
        Ok(())
    }

    /// Drops the group's reference to a resource the external manager has
    /// removed. Same cursor routing as creation.
    pub fn notify_resource_removed(&mut self, resource: &ResourceRef) -> Result<()> {
        let group_name = self
            .current_group
            .clone()
            .unwrap_or_else(|| resource.borrow().group().to_string());
        let group = self.group_mut(&group_name)?;
        for bucket in group.load_order.values_mut() {
            bucket.retain(|candidate| !Rc::ptr_eq(candidate, resource));
        }
        Ok(())
    }

    /// Drops every reference to resources of one type, across all groups.
    pub fn notify_all_resources_removed(&mut self, resource_type: &str) {
        for group in self.groups.values_mut() {
            for bucket in group.load_order.values_mut() {
                bucket.retain(|resource| resource.borrow().resource_type() != resource_type);
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn group(&self, name: &str) -> Result<&ResourceGroup> {
        match self.groups.get(name) {
            Some(group) => Ok(group),
            None => fail(RelicError::ItemNotFound(format!(
                "resource group '{name}'"
            ))),
        }
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut ResourceGroup> {
        match self.groups.get_mut(name) {
            Some(group) => Ok(group),
            None => fail(RelicError::ItemNotFound(format!(
                "resource group '{name}'"
            ))),
        }
    }

    fn loading_order_for(&self, resource_type: &str) -> f32 {
        self.managers
            .get(resource_type)
            .map_or(0.0, |manager| manager.borrow().loading_order())
    }

    fn find_resources_in(
        &self,
        group: &ResourceGroup,
        pattern: &str,
    ) -> Vec<(Rc<dyn Archive>, String)> {
        let mut out = Vec::new();
        for location in &group.locations {
            for name in location.archive.find(pattern, location.recursive) {
                out.push((Rc::clone(&location.archive), name));
            }
        }
        out
    }

    /// Sub-phase (a) of initialisation: feed every matching stream to every
    /// registered script loader, in ascending loader order, bracketed by
    /// scripting events.
    fn parse_resource_group_scripts(&mut self, name: &str) -> Result<()> {
        let mut loaders: Vec<(f32, Rc<RefCell<dyn ScriptLoader>>)> = self
            .script_loaders
            .iter()
            .map(|loader| (loader.borrow().loading_order(), Rc::clone(loader)))
            .collect();
        loaders.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Collect per-loader matches up front so the start event carries the
        // total script count.
        let mut batches: Vec<(Rc<RefCell<dyn ScriptLoader>>, Vec<(Rc<dyn Archive>, String)>)> =
            Vec::new();
        let mut script_count = 0;
        {
            let group = self.group(name)?;
            for (_, loader) in loaders {
                let patterns = loader.borrow().script_patterns().to_vec();
                let mut matches = Vec::new();
                for pattern in &patterns {
                    matches.extend(self.find_resources_in(group, pattern));
                }
                script_count += matches.len();
                batches.push((loader, matches));
            }
        }

        log::info!("parsing scripts for resource group '{name}' ({script_count} scripts)");
        self.fire(|listener| listener.scripting_started(name, script_count));
        for (loader, matches) in batches {
            for (archive, script_name) in matches {
                log::debug!("parsing script '{script_name}'");
                let mut stream = archive.open(&script_name)?;
                loader.borrow_mut().parse_script(&mut stream, name)?;
                self.fire(|listener| listener.script_parsed(&script_name));
            }
        }
        self.fire(|listener| listener.scripting_ended(name));
        Ok(())
    }

    /// Sub-phase (b) of initialisation: materialize pending declarations
    /// through their type's manager. Declarations are consumed; the created
    /// resources persist.
    fn create_declared_resources(&mut self, name: &str) -> Result<()> {
        let declarations = std::mem::take(&mut self.group_mut(name)?.declarations);
        for declaration in declarations {
            let Some(manager) = self.managers.get(&declaration.resource_type).cloned() else {
                return fail(RelicError::ItemNotFound(format!(
                    "no resource manager registered for type '{}' (declaring '{}')",
                    declaration.resource_type, declaration.name
                )));
            };
            let resource = manager.borrow_mut().create(&declaration.name, name)?;
            resource.borrow_mut().set_parameters(&declaration.params);
            let order = LoadOrder(manager.borrow().loading_order());
            self.group_mut(name)?
                .load_order
                .entry(order)
                .or_default()
                .push(resource);
        }
        Ok(())
    }

    fn load_group_inner(&mut self, name: &str) -> Result<()> {
        let group = self.group(name)?;
        let total = group.resource_count();
        let resources = group.resources_ascending();
        if resources.is_empty() {
            return Ok(());
        }
        log::info!("loading resource group '{name}' ({total} resources)");
        self.fire(|listener| listener.load_started(name, total));
        for resource in &resources {
            let needs_load = !resource.borrow().is_loaded();
            if needs_load {
                resource.borrow_mut().load(self)?;
                self.fire(|listener| listener.resource_loaded(resource));
            }
        }
        self.fire(|listener| listener.load_ended(name));
        Ok(())
    }

    fn drop_contents_inner(&mut self, name: &str, mode: DropMode) -> Result<()> {
        let resources = self.group(name)?.resources_descending();
        for resource in resources {
            match mode {
                DropMode::UnloadOnly => resource.borrow_mut().unload(),
                DropMode::RemoveFromManagers => {
                    let (resource_name, resource_type) = {
                        let resource = resource.borrow();
                        (
                            resource.name().to_string(),
                            resource.resource_type().to_string(),
                        )
                    };
                    match self.managers.get(&resource_type).cloned() {
                        Some(manager) => manager.borrow_mut().remove(&resource_name)?,
                        None => resource.borrow_mut().unload(),
                    }
                }
            }
        }
        self.group_mut(name)?.load_order.clear();
        Ok(())
    }

    /// Notifies every listener in registration order; fire-and-forget.
    fn fire(&self, mut event: impl FnMut(&mut dyn ResourceGroupListener)) {
        for listener in &self.listeners {
            event(&mut *listener.borrow_mut());
        }
    }
}
