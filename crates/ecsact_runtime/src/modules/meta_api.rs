//! Meta module: schema introspection.

use super::{native_str, read_ids};
use crate::error::RuntimeError;
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::types::{ActionId, ComponentId, SystemId};

native_fns! {
    /// Package, component, action and system metadata compiled into the runtime.
    pub struct Meta: AbiModule::Meta {
        count_packages: "ecsact_meta_count_packages" => CountFn,
        get_package_ids: "ecsact_meta_get_package_ids" => GetIdsFn,
        package_name: "ecsact_meta_package_name" => NameFn,
        count_components: "ecsact_meta_count_components" => CountInFn,
        get_component_ids: "ecsact_meta_get_component_ids" => GetIdsInFn,
        component_name: "ecsact_meta_component_name" => NameFn,
        count_actions: "ecsact_meta_count_actions" => CountInFn,
        get_action_ids: "ecsact_meta_get_action_ids" => GetIdsInFn,
        action_name: "ecsact_meta_action_name" => NameFn,
        count_systems: "ecsact_meta_count_systems" => CountInFn,
        get_system_ids: "ecsact_meta_get_system_ids" => GetIdsInFn,
        system_name: "ecsact_meta_system_name" => NameFn,
    }
}

impl Meta {
    pub fn count_packages(&self) -> Result<usize, RuntimeError> {
        let f = self.count_packages.get()?;
        Ok(unsafe { f() }.max(0) as usize)
    }

    pub fn get_package_ids(&self) -> Result<Vec<i32>, RuntimeError> {
        let count = self.count_packages.get()?;
        let get = self.get_package_ids.get()?;
        Ok(read_ids(unsafe { count() }, |max, out, written| unsafe {
            get(max, out, written)
        }))
    }

    pub fn package_name(&self, package_id: i32) -> Result<Option<String>, RuntimeError> {
        let f = self.package_name.get()?;
        Ok(native_str(unsafe { f(package_id) }))
    }

    pub fn count_components(&self, package_id: i32) -> Result<usize, RuntimeError> {
        let f = self.count_components.get()?;
        Ok(unsafe { f(package_id) }.max(0) as usize)
    }

    pub fn get_component_ids(&self, package_id: i32) -> Result<Vec<ComponentId>, RuntimeError> {
        let count = self.count_components.get()?;
        let get = self.get_component_ids.get()?;
        Ok(read_ids(unsafe { count(package_id) }, |max, out, written| unsafe {
            get(package_id, max, out, written)
        }))
    }

    pub fn component_name(&self, component_id: ComponentId) -> Result<Option<String>, RuntimeError> {
        let f = self.component_name.get()?;
        Ok(native_str(unsafe { f(component_id) }))
    }

    pub fn count_actions(&self, package_id: i32) -> Result<usize, RuntimeError> {
        let f = self.count_actions.get()?;
        Ok(unsafe { f(package_id) }.max(0) as usize)
    }

    pub fn get_action_ids(&self, package_id: i32) -> Result<Vec<ActionId>, RuntimeError> {
        let count = self.count_actions.get()?;
        let get = self.get_action_ids.get()?;
        Ok(read_ids(unsafe { count(package_id) }, |max, out, written| unsafe {
            get(package_id, max, out, written)
        }))
    }

    pub fn action_name(&self, action_id: ActionId) -> Result<Option<String>, RuntimeError> {
        let f = self.action_name.get()?;
        Ok(native_str(unsafe { f(action_id) }))
    }

    pub fn count_systems(&self, package_id: i32) -> Result<usize, RuntimeError> {
        let f = self.count_systems.get()?;
        Ok(unsafe { f(package_id) }.max(0) as usize)
    }

    pub fn get_system_ids(&self, package_id: i32) -> Result<Vec<SystemId>, RuntimeError> {
        let count = self.count_systems.get()?;
        let get = self.get_system_ids.get()?;
        Ok(read_ids(unsafe { count(package_id) }, |max, out, written| unsafe {
            get(package_id, max, out, written)
        }))
    }

    pub fn system_name(&self, system_id: SystemId) -> Result<Option<String>, RuntimeError> {
        let f = self.system_name.get()?;
        Ok(native_str(unsafe { f(system_id) }))
    }
}
