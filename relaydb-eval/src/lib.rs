// Plugin evaluation: the ordered pre/post/defer chain every node runs
// through around its backend call.

mod chain;
mod dispatch;
mod gate;
mod plugin;
mod registry;
mod schedule;

pub use chain::{PluginChain, PluginEntry, PluginStage, ResolvedPluginEntry};
pub use dispatch::{run_defer, run_list};
pub use gate::{DefaultGateEvaluator, GateContext, GateEvaluator};
pub use plugin::{request_header, Plugin, PluginContext};
pub use registry::PluginRegistry;
pub use schedule::{AppRule, CondType, Condition, CustomRule, Op, Rule, RuleAction, ScheduleConfig};
