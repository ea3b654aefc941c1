// Appid permission check: walks an app's granted db/table access rules
// and rejects anything not explicitly allowed.

use relaydb_admin::{AppInfo, DbRoot, QueryAll};
use relaydb_base::{Error, Result};
use relaydb_lang::Op;

pub struct PermissionRequest<'a> {
    pub path: &'a str,
    pub appid: u64,
    pub db_id: i64,
    pub table_id: i64,
    pub op: Op,
    pub name: &'a str,
    /// Set when this is a recheck invoked after a plugin mutated the op,
    /// changing the error message only.
    pub is_recheck: bool,
    /// Non-empty when the unit is a raw `query` string rather than a
    /// structured op.
    pub raw_query: Option<&'a str>,
}

pub fn permission_check(app_info: &AppInfo, req: &PermissionRequest) -> Result<()> {
    let recheck = |r: bool| if r { " recheck after plugin execute -" } else { "" };

    let acdb = app_info.db_ops(req.db_id);
    let actb = app_info.table_ops(req.table_id);

    if let Some(acdb) = acdb {
        if acdb.status.is_usable() && acdb.root == DbRoot::All {
            return Ok(());
        }
    }

    if req.op.is_ddl() {
        if let Some(acdb) = acdb {
            if acdb.status.is_usable() && acdb.ops.contains(req.op.as_str()) {
                return Ok(());
            }
        }
        return Err(Error::NoDbRight {
            path: req.path.to_string(),
            appid: req.appid,
            op: req.op.as_str().to_string(),
            name: req.name.to_string(),
            recheck: recheck(req.is_recheck),
        });
    }

    if req.raw_query.is_some() {
        let db_ok = acdb.is_some_and(|d| d.status.is_usable() && d.root == DbRoot::TableData);
        let table_ok =
            actb.is_some_and(|t| t.status.is_usable() && t.query_all == QueryAll::Allowed);
        if db_ok || table_ok {
            return Ok(());
        }
        return Err(Error::NoDbRight {
            path: req.path.to_string(),
            appid: req.appid,
            op: "query".to_string(),
            name: req.name.to_string(),
            recheck: recheck(req.is_recheck),
        });
    }

    if let Some(acdb) = acdb {
        if acdb.status.is_usable()
            && (acdb.root == DbRoot::TableData || acdb.ops.contains(req.op.as_str()))
        {
            return Ok(());
        }
    }

    if let Some(actb) = actb {
        if actb.status.is_usable() {
            if actb.query_all == QueryAll::Allowed {
                return Ok(());
            }
            if actb.ops.contains(req.op.as_str()) {
                return Ok(());
            }
        }
    }

    Err(Error::NoTableRight {
        path: req.path.to_string(),
        appid: req.appid,
        op: req.op.as_str().to_string(),
        name: req.name.to_string(),
        recheck: recheck(req.is_recheck),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use relaydb_admin::{AccessDb, AccessTable, AuthStatus};
    use std::collections::HashSet;

    fn request<'a>(op: Op, name: &'a str) -> PermissionRequest<'a> {
        PermissionRequest {
            path: "/users",
            appid: 7,
            db_id: 1,
            table_id: 1,
            op,
            name,
            is_recheck: false,
            raw_query: None,
        }
    }

    #[test]
    fn db_super_permission_allows_anything() {
        let mut app = AppInfo::default();
        app.access_db.insert(
            1,
            AccessDb {
                db_id: 1,
                root: DbRoot::All,
                ops: HashSet::new(),
                status: AuthStatus::Normal,
            },
        );
        assert!(permission_check(&app, &request(Op::Drop, "users")).is_ok());
    }

    #[test]
    fn ddl_without_db_ops_is_denied() {
        let app = AppInfo::default();
        let err = permission_check(&app, &request(Op::Create, "users")).unwrap_err();
        assert!(matches!(err, Error::NoDbRight { .. }));
    }

    #[test]
    fn table_query_all_permits_find() {
        let mut app = AppInfo::default();
        app.access_table.insert(
            1,
            AccessTable {
                table_id: 1,
                query_all: QueryAll::Allowed,
                ops: HashSet::new(),
                status: AuthStatus::Normal,
                verify_rule: String::new(),
            },
        );
        assert!(permission_check(&app, &request(Op::Find, "users")).is_ok());
    }

    #[test]
    fn table_without_op_grant_is_denied() {
        let mut app = AppInfo::default();
        app.access_table.insert(
            1,
            AccessTable {
                table_id: 1,
                query_all: QueryAll::Denied,
                ops: HashSet::new(),
                status: AuthStatus::Normal,
                verify_rule: String::new(),
            },
        );
        let err = permission_check(&app, &request(Op::Update, "users")).unwrap_err();
        assert!(matches!(err, Error::NoTableRight { .. }));
    }
}
