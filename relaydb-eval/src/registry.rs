// Plugin function registry, grounded on `plugin/register.go`'s
// package-level `register(funcName, plugin, version...)` / `Func` map.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relaydb_base::{Error, Result};

use crate::plugin::Plugin;

fn key(name: &str, version: u32) -> String {
    format!("{name}_{version}")
}

#[derive(Default)]
pub struct PluginRegistry {
    funcs: RwLock<HashMap<String, Arc<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    /// Panics on a duplicate registration: this only ever runs once at
    /// startup, driven by a fixed table of built-ins, so a collision is a
    /// programming error.
    pub fn register(&self, name: &str, version: u32, plugin: Arc<dyn Plugin>) {
        let mut funcs = self.funcs.write();
        let k = key(name, version);
        if funcs.contains_key(&k) {
            panic!("plugin {k} has already registered");
        }
        funcs.insert(k, plugin);
    }

    pub fn get(&self, name: &str, version: u32) -> Result<Arc<dyn Plugin>> {
        self.funcs
            .read()
            .get(&key(name, version))
            .cloned()
            .ok_or_else(|| Error::PluginFuncNotRegister {
                name: name.to_string(),
                func: "handle".to_string(),
                version,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use relaydb_base::{Map, Result as R, Value};

    use crate::plugin::PluginContext;

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        async fn handle(
            &self,
            _ctx: &PluginContext,
            _req: &mut Value,
            _rsp: &mut Value,
            _extend: &mut Map,
            _config: &Map,
        ) -> R<bool> {
            Ok(false)
        }
    }

    #[test]
    fn registers_and_looks_up_by_name_and_version() {
        let registry = PluginRegistry::new();
        registry.register("cache", 0, Arc::new(Noop));
        assert!(registry.get("cache", 0).is_ok());
        assert!(registry.get("cache", 1).is_err());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let registry = PluginRegistry::new();
        registry.register("cache", 0, Arc::new(Noop));
        registry.register("cache", 0, Arc::new(Noop));
    }
}
