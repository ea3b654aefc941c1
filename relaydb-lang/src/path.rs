// `@{PATH[.FIELD]}` path-expression grammar. PATH is a POSIX-like path over
// node keys: leading `/` is absolute (from the request root); `./` and
// `../` are relative to the current node's parent — the "current
// directory" for a bare or `./`-prefixed path is the parent, not the node
// itself; FIELD is a dotted access into the referenced node's result.

/// A parsed `@{...}` reference literal, split into its path and field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    pub path: String,
    pub field: String,
}

/// Split `PATH[.FIELD]` at the first `.`; table/alias names are not
/// expected to contain literal dots (resolved via original_source's
/// `util.PathAndField`, whose own split point is not in the kept source,
/// so first-dot is the documented choice — see DESIGN.md).
pub fn path_and_field(referer: &str) -> Reference {
    match referer.find('.') {
        Some(idx) => Reference {
            path: referer[..idx].to_string(),
            field: referer[idx + 1..].to_string(),
        },
        None => Reference {
            path: referer.to_string(),
            field: String::new(),
        },
    }
}

/// Resolve a (possibly relative) reference path against the absolute path
/// of the node doing the referencing, producing an absolute path with `..`
/// and `.` segments normalized away.
pub fn resolve_reference_path(current_absolute_path: &str, expr: &str) -> String {
    let mut segments: Vec<&str> = if let Some(abs) = expr.strip_prefix('/') {
        // Already absolute.
        return normalize(abs);
    } else {
        // Relative: base directory is the current node's *parent*.
        let base = parent_path(current_absolute_path);
        base.split('/').filter(|s| !s.is_empty()).collect()
    };

    for seg in expr.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    format!("/{}", segments.join("/")).replace("//", "/")
}

fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    format!("/{}", out.join("/"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_path_and_field() {
        let r = path_and_field("../users.id");
        assert_eq!(r.path, "../users");
        assert_eq!(r.field, "id");
    }

    #[test]
    fn splits_path_without_field() {
        let r = path_and_field("../users");
        assert_eq!(r.path, "../users");
        assert_eq!(r.field, "");
    }

    #[test]
    fn bare_path_is_relative_to_parent() {
        // current node "/root/users/orders", bare "accounts" resolves
        // against the parent of the current node, i.e. "/root/users".
        let abs = resolve_reference_path("/root/users/orders", "accounts");
        assert_eq!(abs, "/root/users/accounts");
    }

    #[test]
    fn dotslash_is_same_as_bare() {
        let abs = resolve_reference_path("/root/users/orders", "./accounts");
        assert_eq!(abs, "/root/users/accounts");
    }

    #[test]
    fn dotdot_ascends_further() {
        let abs = resolve_reference_path("/root/users/orders", "../accounts");
        assert_eq!(abs, "/root/accounts");
    }

    #[test]
    fn leading_slash_is_absolute() {
        let abs = resolve_reference_path("/root/users/orders", "/root/users");
        assert_eq!(abs, "/root/users");
    }
}
