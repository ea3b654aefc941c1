// Per-plugin schedule config: whether, when, and under what gate an entry
// in a plugin chain fires.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub r#async: bool,
    #[serde(default)]
    pub skip_error: bool,
    /// Milliseconds; 0 means the default of 1000ms applies (`timeout_or_default`).
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub request_source: Vec<String>,
    #[serde(default)]
    pub op_type: Vec<String>,
    /// 0-100; a request is let through by its (appid, requestid) hash modulo 100.
    #[serde(default = "default_gray_scale")]
    pub gray_scale: u8,
    pub app_rule: Option<AppRule>,
    pub custom_rule: Option<CustomRule>,
}

fn default_gray_scale() -> u8 {
    100
}

impl ScheduleConfig {
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms == 0 {
            Duration::from_millis(1000)
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(i8)]
pub enum RuleAction {
    Execute = 1,
    Skip = 2,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppRule {
    pub act_type: RuleAction,
    pub appids: Vec<u64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(i8)]
pub enum CondType {
    Any = 1,
    All = 2,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomRule {
    pub act_type: RuleAction,
    pub rule_type: CondType,
    pub rules: Vec<Rule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub cond_type: CondType,
    pub cond: Vec<Condition>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(i8)]
pub enum Op {
    Eq = 1,
    Ne = 2,
    Gt = 3,
    Ge = 4,
    Lt = 5,
    Le = 6,
    Like = 7,
    NotLike = 8,
    StartsWith = 9,
    EndsWith = 10,
    In = 11,
    NotIn = 12,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub op: Op,
    pub value: String,
}
