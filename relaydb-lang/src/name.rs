// `name` parsing: a Unit's `name` is `table`, `db.table`, or `name as alias`.

/// Split `name [as alias]` into its name and optional alias.
pub fn parse_name_alias(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim();
    if let Some(idx) = find_as(raw) {
        let name = raw[..idx].trim().to_string();
        let alias = raw[idx + 4..].trim().to_string();
        (name, if alias.is_empty() { None } else { Some(alias) })
    } else {
        (raw.to_string(), None)
    }
}

fn find_as(s: &str) -> Option<usize> {
    let lower = s.to_ascii_lowercase();
    // " as " must be surrounded by whitespace to avoid matching inside an
    // identifier such as a table literally named "atlas".
    lower.find(" as ")
}

/// Split `db.table` into its namespace and table parts, if qualified.
pub fn split_namespace(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((db, table)) => (Some(db), table),
        None => (None, name),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_name_has_no_alias() {
        assert_eq!(parse_name_alias("users"), ("users".to_string(), None));
    }

    #[test]
    fn name_with_alias() {
        assert_eq!(
            parse_name_alias("users as u"),
            ("users".to_string(), Some("u".to_string()))
        );
    }

    #[test]
    fn qualified_name_is_untouched_by_alias_split() {
        assert_eq!(
            parse_name_alias("mydb.users as u"),
            ("mydb.users".to_string(), Some("u".to_string()))
        );
    }

    #[test]
    fn namespace_split() {
        assert_eq!(split_namespace("mydb.users"), (Some("mydb"), "users"));
        assert_eq!(split_namespace("users"), (None, "users"));
    }
}
