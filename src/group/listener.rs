//! Resource group event observers.

use crate::resources::ResourceRef;

/// A passive observer of group script-parsing and batch-loading progress.
///
/// Listeners are notified in registration order and cannot block or cancel
/// the sequence; every callback defaults to a no-op so implementors override
/// only what they watch. For one group operation the relative order is:
/// `scripting_started`, `script_parsed`*, `scripting_ended`,
/// `load_started`, `resource_loaded`*, `load_ended`.
pub trait ResourceGroupListener {
    /// Script parsing is about to begin for `group`; `script_count` streams
    /// will be fed to loaders.
    fn scripting_started(&mut self, _group: &str, _script_count: usize) {}

    /// One script has been parsed.
    fn script_parsed(&mut self, _name: &str) {}

    /// Script parsing finished for `group`.
    fn scripting_ended(&mut self, _group: &str) {}

    /// Batch loading is about to begin for `group` over `resource_count`
    /// resources.
    fn load_started(&mut self, _group: &str, _resource_count: usize) {}

    /// One resource finished loading.
    fn resource_loaded(&mut self, _resource: &ResourceRef) {}

    /// Batch loading finished for `group`.
    fn load_ended(&mut self, _group: &str) {}
}
