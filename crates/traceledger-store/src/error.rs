/// Map a `sqlx::Error` onto the shared error kind. A missing-row error is a
/// permanent `NotFound`; everything else (pool exhaustion, locked database,
/// I/O) is treated as retryable, matching sqlx's own "try again" semantics
/// for transient failures.
pub fn map_sqlx(context: &str, e: sqlx::Error) -> traceledger_core::Error {
    match e {
        sqlx::Error::RowNotFound => traceledger_core::Error::NotFound(context.to_string()),
        other => traceledger_core::Error::Transient(format!("{context}: {other}")),
    }
}
