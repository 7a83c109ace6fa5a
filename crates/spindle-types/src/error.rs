//! Error-code conventions shared by every Spindle crate.
//!
//! Each layer of the workspace exposes its own error enum; what they have
//! in common is the [`ErrorCode`] contract. The code is a short stable
//! string a host can log, count, or match on without naming the concrete
//! error type, and the recoverability flag tells the caller whether a
//! retry can ever help.
//!
//! A code is a chain of underscore-separated groups of capitals and
//! digits, opening with the owning crate's namespace, and never changes
//! once published:
//!
//! | Crate | Prefix | Example |
//! |-------|--------|---------|
//! | `spindle-machine` | `TABLE_` | `TABLE_DUPLICATE_ENTRY` |
//! | `spindle-def` | `DEF_` | `DEF_UNKNOWN_STATE` |
//! | `spindle-runtime` | `PROC_` | `PROC_TERMINATED` |
//!
//! Every error enum keeps an `all_error_codes_valid` test that feeds one
//! instance of each variant through [`assert_error_codes`], so a typo'd
//! or misfiled code fails the crate's own suite rather than a consumer's.

/// Stable code and retry hint for an error value.
///
/// # Example
///
/// ```
/// use spindle_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum QueueError {
///     Saturated,
///     Closed,
/// }
///
/// impl ErrorCode for QueueError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::Saturated => "QUEUE_SATURATED",
///             Self::Closed => "QUEUE_CLOSED",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         // A saturated queue drains; a closed one stays closed.
///         matches!(self, Self::Saturated)
///     }
/// }
///
/// let err = QueueError::Closed;
/// assert_eq!(err.code(), "QUEUE_CLOSED");
/// assert!(!err.is_recoverable());
/// ```
pub trait ErrorCode {
    /// Stable machine-readable code, `PREFIX_UPPER_SNAKE`.
    fn code(&self) -> &'static str;

    /// Whether retrying the failed operation can ever succeed.
    ///
    /// Construction errors — duplicate handlers, unknown names — are
    /// permanent: the same input fails the same way. Only transient host
    /// conditions report `true`.
    fn is_recoverable(&self) -> bool;
}

/// Explains how `code` breaks the conventions, or `None` if it follows
/// them.
fn code_violation(code: &str, prefix: &str) -> Option<String> {
    if !code.starts_with(prefix) {
        return Some(format!("missing the {prefix:?} namespace prefix"));
    }
    for group in code.split('_') {
        if group.is_empty() {
            return Some("underscores must separate nonempty groups".to_string());
        }
        if let Some(bad) = group
            .chars()
            .find(|c| !c.is_ascii_uppercase() && !c.is_ascii_digit())
        {
            return Some(format!(
                "{bad:?} is not an uppercase letter or digit"
            ));
        }
    }
    None
}

/// Panics, naming the violation, if one error's code breaks the
/// conventions.
pub fn assert_error_code<E: ErrorCode>(err: &E, prefix: &str) {
    let code = err.code();
    if let Some(problem) = code_violation(code, prefix) {
        panic!("error code {code:?}: {problem}");
    }
}

/// Validates one instance of every variant of an error enum in one call.
///
/// The slice should hold each variant exactly once; adding a variant to
/// the enum without extending the slice is itself the kind of drift this
/// test exists to catch, so keep the two next to each other.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], prefix: &str) {
    for err in errors {
        assert_error_code(err, prefix);
    }
}
