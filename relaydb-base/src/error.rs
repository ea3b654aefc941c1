// Error kinds and their numeric codes, grouped by the seven families the
// engine needs to distinguish: decode/param, auth, reference, plugin,
// transaction, backend, system. Every variant logs itself on construction
// via `tracing::error!`, so an error is captured near its origin whether or
// not a caller ever prints it.

use std::borrow::Cow;

#[cfg(test)]
use test_log::test;

pub type Result<T> = std::result::Result<T, Error>;

/// The seven error families the engine distinguishes when propagating a
/// failure back to a caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorType {
    Decode,
    Auth,
    Reference,
    Plugin,
    Transaction,
    Backend,
    System,
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    // --- decode / param (1000s) ---
    #[error("bad frame: {0}")]
    BadFrame(String),
    #[error("bad json: {0}")]
    BadJson(String),
    #[error("query mode mismatch: declared {declared}, derived {derived}")]
    ModeMismatch { declared: String, derived: String },
    #[error("[{path}] there are multiple tables named {name}, please qualify with a namespace")]
    NameAmbiguity { path: String, name: String },
    #[error("[{path}] not find table or db, name is {name}")]
    NotFindName { path: String, name: String },
    #[error("unit name is empty")]
    UnitNameEmpty,
    #[error("[{path}] has repeat name or alias in same layer")]
    RepeatNameAlias { path: String },
    #[error("a unit with trans may not also declare sub")]
    TransAndSub,
    #[error("parent and child nodes may not both declare an overlapping transaction")]
    SameTransaction,
    #[error("[{path}] format data error: {reason}")]
    FormatData { path: String, reason: String },
    #[error("[{path}] db address [{address}] parse error: {reason}")]
    DbAddressParse {
        path: String,
        address: String,
        reason: String,
    },

    // --- auth (2000s) ---
    #[error("signature failed")]
    SignatureFailed,
    #[error("duplicate request")]
    DuplicateRequest,
    #[error("not find app info of appid {appid}")]
    NotFindAppid { appid: u64 },
    #[error("[{path}]{recheck} appid({appid}) has no permission to {op} {name}")]
    NoDbRight {
        path: String,
        appid: u64,
        op: String,
        name: String,
        recheck: &'static str,
    },
    #[error("[{path}]{recheck} appid [{appid}] has no permission to {op} table {name}")]
    NoTableRight {
        path: String,
        appid: u64,
        op: String,
        name: String,
        recheck: &'static str,
    },
    #[error("[{path}] verify failed, appid [{appid}] is not allowed to access table {tables:?}")]
    TableVerifyFailed {
        path: String,
        appid: u64,
        tables: Vec<String>,
    },

    // --- reference (3000s) ---
    #[error("not find referer unit [{0}]")]
    RefererNotFound(String),
    #[error("referer unit [{0}] not yet executed")]
    RefererNotExecuted(String),
    #[error("referer unit [{0}] failed")]
    RefererUnitFailed(String),
    #[error("referer result field not exist")]
    RefererFieldNotExist,
    #[error("referer result type error")]
    RefererResultType,

    // --- plugin (4000s) ---
    #[error("plugin not found: {0}")]
    PluginNotFound(String),
    #[error("plugin {name}'s function {func} version {version} not registered")]
    PluginFuncNotRegister {
        name: String,
        func: String,
        version: u32,
    },
    #[error("plugin exec error: {0}")]
    PluginExec(String),
    #[error("plugin config decode error: {0}")]
    PluginConfigDecode(String),
    #[error("plugin async handle deep copy error: {0}")]
    PluginParamCopy(String),
    #[error("broken plugin chain: entry references missing predecessor {0}")]
    PluginChainBrokenLink(String),

    // --- transaction (5000s) ---
    #[error("transaction finalize error: {inner}, source error is [{source_err}]")]
    TransactionFinalize { inner: String, source_err: String },

    // --- backend (6000s) ---
    #[error("backend error: {0}")]
    Backend(String),

    // --- system (7000s) ---
    #[error("panic: {0}")]
    Panic(String),
    #[error("encode failure: {0}")]
    EncodeFailure(String),
    #[error("{0}")]
    Other(Cow<'static, str>),
}

impl Error {
    /// Stable numeric code, grouped by family, matching the
    /// `errs.Code(err)`-style introspection the plugin/auth layers rely on.
    pub fn code(&self) -> u32 {
        use Error::*;
        match self {
            BadFrame(_) => 1001,
            BadJson(_) => 1002,
            ModeMismatch { .. } => 1003,
            NameAmbiguity { .. } => 1004,
            NotFindName { .. } => 1005,
            UnitNameEmpty => 1006,
            RepeatNameAlias { .. } => 1007,
            TransAndSub => 1008,
            SameTransaction => 1009,
            FormatData { .. } => 1010,
            DbAddressParse { .. } => 1011,

            SignatureFailed => 2001,
            DuplicateRequest => 2002,
            NotFindAppid { .. } => 2003,
            NoDbRight { .. } => 2004,
            NoTableRight { .. } => 2005,
            TableVerifyFailed { .. } => 2006,

            RefererNotFound(_) => 3001,
            RefererNotExecuted(_) => 3002,
            RefererUnitFailed(_) => 3003,
            RefererFieldNotExist => 3004,
            RefererResultType => 3005,

            PluginNotFound(_) => 4001,
            PluginFuncNotRegister { .. } => 4002,
            PluginExec(_) => 4003,
            PluginConfigDecode(_) => 4004,
            PluginParamCopy(_) => 4005,
            PluginChainBrokenLink(_) => 4006,

            TransactionFinalize { .. } => 5001,

            Backend(_) => 6001,

            Panic(_) => 7001,
            EncodeFailure(_) => 7002,
            Other(_) => 7999,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self.code() {
            1000..=1999 => ErrorType::Decode,
            2000..=2999 => ErrorType::Auth,
            3000..=3999 => ErrorType::Reference,
            4000..=4999 => ErrorType::Plugin,
            5000..=5999 => ErrorType::Transaction,
            6000..=6999 => ErrorType::Backend,
            _ => ErrorType::System,
        }
    }

    /// Construct a freeform error, logging it at the point of creation so
    /// that it is observed near its origin whether or not a caller ever
    /// prints it.
    pub fn other(msg: impl Into<Cow<'static, str>>) -> Error {
        let err = Error::Other(msg.into());
        tracing::error!(target: "relaydb", code = err.code(), "{err}");
        err
    }

    /// Truncate an overlong message to a 5000-character cap before it is
    /// returned in single mode.
    pub fn truncated_message(&self) -> String {
        let msg = self.to_string();
        if msg.len() > 5000 {
            msg[..5000].to_string()
        } else {
            msg
        }
    }

    /// Fold a finalize-time error into an existing node error, preserving
    /// the earlier error's message alongside it.
    pub fn with_finalize_error(self, inner: impl std::fmt::Display) -> Error {
        Error::TransactionFinalize {
            inner: inner.to_string(),
            source_err: self.to_string(),
        }
    }
}

/// Shorthand for `Error::other`.
pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::other(msg)
}

#[test]
fn test_error() {
    let _err = err("test error");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_are_grouped_by_family() {
        assert_eq!(Error::UnitNameEmpty.error_type(), ErrorType::Decode);
        assert_eq!(
            Error::RefererFieldNotExist.error_type(),
            ErrorType::Reference
        );
        assert_eq!(Error::Panic("x".into()).error_type(), ErrorType::System);
    }

    #[test]
    fn long_message_is_truncated() {
        let long = "x".repeat(6000);
        let err = Error::Backend(long);
        assert_eq!(err.truncated_message().len(), 5000);
    }
}
