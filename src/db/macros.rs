//! Connection dispatch macro.
//!
//! Expands one body into a match arm per relational backend, so code that
//! only uses driver-generic APIs is written once and type-checked against
//! each concrete connection type.

/// Run `$body` with `$c` bound to the concrete connection inside `$conn`.
///
/// # Example
///
/// ```ignore
/// let rows = with_connection!(conn, c => c.fetch_all(sql).await?.len());
/// ```
#[macro_export]
macro_rules! with_connection {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            $crate::db::connection::DbConnection::MySql($c) => $body,
            $crate::db::connection::DbConnection::Postgres($c) => $body,
            $crate::db::connection::DbConnection::SQLite($c) => $body,
        }
    };
}

pub use with_connection;
