// Gating: whether a plugin entry fires at all, decided before the core
// pre/post/defer contract ever runs. `AppRule`/`CustomRule`/`Condition`
// fields are collected into a single evaluator so the engine and tests
// share one implementation instead of each re-deriving the rule ad hoc.

use relaydb_base::Map;

use crate::schedule::{CondType, Condition, Op, RuleAction, ScheduleConfig};

/// The ambient facts a gate decision is made against. `extend` is a
/// snapshot taken once before the entries in the list run, independent of
/// the live `extend` map the entries themselves mutate, so a gate decision
/// is not re-evaluated mid-list against a plugin's own edits.
pub struct GateContext<'a> {
    pub request_source: &'a str,
    pub op_type: &'a str,
    pub appid: u64,
    /// Stable per-request value used to compute gray-scale admission, e.g.
    /// a hash of the request id; callers own how it's derived.
    pub gray_scale_key: u64,
    pub extend: Map,
}

pub trait GateEvaluator {
    fn should_run(&self, schedule: &ScheduleConfig, ctx: &GateContext) -> bool;
}

#[derive(Default)]
pub struct DefaultGateEvaluator;

impl GateEvaluator for DefaultGateEvaluator {
    fn should_run(&self, schedule: &ScheduleConfig, ctx: &GateContext) -> bool {
        if !schedule.request_source.is_empty()
            && !schedule
                .request_source
                .iter()
                .any(|s| s == ctx.request_source)
        {
            return false;
        }

        if !schedule.op_type.is_empty() && !schedule.op_type.iter().any(|s| s == ctx.op_type) {
            return false;
        }

        if schedule.gray_scale < 100 && (ctx.gray_scale_key % 100) as u8 >= schedule.gray_scale {
            return false;
        }

        if let Some(rule) = &schedule.app_rule {
            let matched = rule.appids.contains(&ctx.appid);
            let allowed = match rule.act_type {
                RuleAction::Execute => matched,
                RuleAction::Skip => !matched,
            };
            if !allowed {
                return false;
            }
        }

        if let Some(rule) = &schedule.custom_rule {
            let matched = match rule.rule_type {
                CondType::Any => rule.rules.iter().any(|r| rule_matches(r, &ctx.extend)),
                CondType::All => rule.rules.iter().all(|r| rule_matches(r, &ctx.extend)),
            };
            let allowed = match rule.act_type {
                RuleAction::Execute => matched,
                RuleAction::Skip => !matched,
            };
            if !allowed {
                return false;
            }
        }

        true
    }
}

fn rule_matches(rule: &crate::schedule::Rule, extend: &Map) -> bool {
    match rule.cond_type {
        CondType::Any => rule.cond.iter().any(|c| condition_matches(c, extend)),
        CondType::All => rule.cond.iter().all(|c| condition_matches(c, extend)),
    }
}

fn condition_matches(cond: &Condition, extend: &Map) -> bool {
    let actual = match extend.get(&cond.key) {
        Some(v) => v.to_display_string(),
        None => return false,
    };

    match cond.op {
        Op::Eq => actual == cond.value,
        Op::Ne => actual != cond.value,
        Op::Gt => numeric(&actual) > numeric(&cond.value),
        Op::Ge => numeric(&actual) >= numeric(&cond.value),
        Op::Lt => numeric(&actual) < numeric(&cond.value),
        Op::Le => numeric(&actual) <= numeric(&cond.value),
        Op::Like => actual.contains(&cond.value),
        Op::NotLike => !actual.contains(&cond.value),
        Op::StartsWith => actual.starts_with(&cond.value),
        Op::EndsWith => actual.ends_with(&cond.value),
        Op::In => cond.value.split(',').any(|v| v == actual),
        Op::NotIn => !cond.value.split(',').any(|v| v == actual),
    }
}

fn numeric(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}
