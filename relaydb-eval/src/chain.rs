// Per-table ordered plugin chains: each entry's `front` names the id of
// the entry it must run after, so the chain is reconstructed by matching
// each successor's `front` against its predecessor's own id (not a shared
// table id, which would only disambiguate correctly when a table has
// exactly one chain).

use std::sync::Arc;

use relaydb_base::{Error, Result};

use crate::plugin::Plugin;
use crate::schedule::ScheduleConfig;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PluginStage {
    Pre,
    Post,
    Defer,
}

pub struct PluginEntry {
    pub id: u64,
    /// Predecessor's id; `0` marks the head of the chain.
    pub front: u64,
    pub stage: PluginStage,
    pub func_name: String,
    pub version: u32,
    pub config: relaydb_base::Map,
    pub schedule: ScheduleConfig,
}

pub struct ResolvedPluginEntry {
    pub id: u64,
    pub plugin: Arc<dyn Plugin>,
    pub config: relaydb_base::Map,
    pub schedule: ScheduleConfig,
}

#[derive(Default)]
pub struct PluginChain {
    pub pre: Vec<ResolvedPluginEntry>,
    pub post: Vec<ResolvedPluginEntry>,
    pub defer: Vec<ResolvedPluginEntry>,
}

impl PluginChain {
    /// Reconstructs the ordered pre/post/defer lists from an unordered set
    /// of entries belonging to one table, resolving each entry's function
    /// against `registry`. A dangling `front` pointer is a build error.
    pub fn from_entries(
        entries: Vec<PluginEntry>,
        registry: &crate::registry::PluginRegistry,
    ) -> Result<PluginChain> {
        let mut chain = PluginChain::default();

        for stage in [PluginStage::Pre, PluginStage::Post, PluginStage::Defer] {
            let group: Vec<&PluginEntry> =
                entries.iter().filter(|e| e.stage == stage).collect();
            let ordered = sort_chain(&group)?;

            let mut resolved = Vec::with_capacity(ordered.len());
            for entry in ordered {
                let plugin = registry.get(&entry.func_name, entry.version)?;
                resolved.push(ResolvedPluginEntry {
                    id: entry.id,
                    plugin,
                    config: entry.config.clone(),
                    schedule: entry.schedule.clone(),
                });
            }

            match stage {
                PluginStage::Pre => chain.pre = resolved,
                PluginStage::Post => chain.post = resolved,
                PluginStage::Defer => chain.defer = resolved,
            }
        }

        Ok(chain)
    }
}

fn sort_chain<'a>(entries: &[&'a PluginEntry]) -> Result<Vec<&'a PluginEntry>> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let head = entries
        .iter()
        .find(|e| e.front == 0)
        .ok_or_else(|| Error::PluginChainBrokenLink("no head (front == 0)".to_string()))?;

    let mut ordered = vec![*head];
    let mut current = *head;

    for _ in 0..entries.len() - 1 {
        let next = entries
            .iter()
            .find(|e| e.front == current.id)
            .ok_or_else(|| Error::PluginChainBrokenLink(current.id.to_string()))?;
        ordered.push(*next);
        current = *next;
    }

    Ok(ordered)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::PluginRegistry;
    use async_trait::async_trait;
    use relaydb_base::{Map, Result as R, Value};

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        async fn handle(
            &self,
            _ctx: &crate::plugin::PluginContext,
            _req: &mut Value,
            _rsp: &mut Value,
            _extend: &mut Map,
            _config: &Map,
        ) -> R<bool> {
            Ok(false)
        }
    }

    fn entry(id: u64, front: u64) -> PluginEntry {
        PluginEntry {
            id,
            front,
            stage: PluginStage::Pre,
            func_name: "noop".to_string(),
            version: 0,
            config: Map::new(),
            schedule: ScheduleConfig::default(),
        }
    }

    #[test]
    fn reconstructs_order_from_shuffled_entries() {
        let registry = PluginRegistry::new();
        registry.register("noop", 0, Arc::new(Noop));

        let entries = vec![entry(3, 2), entry(1, 0), entry(2, 1)];
        let chain = PluginChain::from_entries(entries, &registry).unwrap();
        let ids: Vec<u64> = chain.pre.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn missing_head_is_an_error() {
        let registry = PluginRegistry::new();
        registry.register("noop", 0, Arc::new(Noop));
        let entries = vec![entry(2, 1), entry(3, 2)];
        assert!(PluginChain::from_entries(entries, &registry).is_err());
    }
}
