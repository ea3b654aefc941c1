// Per-appid table allow-list. `verify_rule` is a comma-separated list of
// exact names, `start...end` numeric-suffix ranges, and `regex/.../`
// patterns.

use regex::Regex;

use relaydb_base::{Error, Result};

pub fn table_verify(path: &str, appid: u64, tables: &[String], verify_rule: &str) -> Result<()> {
    if verify_rule.is_empty() {
        return Ok(());
    }

    for table in tables {
        if !match_table(table, verify_rule) {
            return Err(Error::TableVerifyFailed {
                path: path.to_string(),
                appid,
                tables: tables.to_vec(),
            });
        }
    }

    Ok(())
}

fn match_table(table: &str, verify_rule: &str) -> bool {
    verify_rule.split(',').any(|rule| rule_matches(table, rule))
}

fn rule_matches(table: &str, rule: &str) -> bool {
    if rule == table {
        return true;
    }

    if let Some(m) = numeric_range_match(table, rule) {
        return m;
    }

    if let Some(pattern) = rule.strip_prefix("regex/").and_then(|r| r.strip_suffix('/')) {
        if let Ok(re) = Regex::new(pattern) {
            return re.is_match(table);
        }
    }

    false
}

/// Matches a `<prefix>START...END<suffix>` rule, e.g. `shard_0...15`.
fn numeric_range_match(table: &str, rule: &str) -> Option<bool> {
    let sep = "...";
    let sep_pos = rule.find(sep)?;
    let before = &rule[..sep_pos];
    let after_start = sep_pos + sep.len();

    let digits_start = before
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let prefix = &before[..digits_start];
    let start_str = &before[digits_start..];

    let rest = &rule[after_start..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let end_str = &rest[..digits_end];
    let suffix = &rest[digits_end..];

    let start: i64 = start_str.parse().ok()?;
    let end: i64 = end_str.parse().ok()?;
    if end < start {
        return Some(false);
    }

    for i in start..=end {
        if table == format!("{prefix}{i}{suffix}") {
            return Some(true);
        }
    }

    Some(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(match_table("users", "users,orders"));
    }

    #[test]
    fn numeric_range_match_includes_bounds() {
        assert!(match_table("shard_0", "shard_0...15"));
        assert!(match_table("shard_15", "shard_0...15"));
        assert!(!match_table("shard_16", "shard_0...15"));
    }

    #[test]
    fn regex_rule_matches() {
        assert!(match_table("log_2024_01", r"regex/log_\d{4}_\d{2}/"));
        assert!(!match_table("log_x", r"regex/log_\d{4}_\d{2}/"));
    }

    #[test]
    fn no_rule_matches_is_denied() {
        assert!(!match_table("users", "orders"));
    }
}
