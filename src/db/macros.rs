//! Database dispatch macros for reducing code duplication.
//!
//! Pools and transactions are wrapped in per-backend enums. These macros generate the
//! repetitive match arms over those enums while keeping each arm readable.

/// Generate match arms over the variants of a `DbPool` or `DbTransaction` value.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => p.close().await,
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($kind:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::$kind::$variant($p) => $body,
            )+
        }
    };
}

/// Same statement body for every backend: `$p` is bound to the per-backend value.
///
/// Useful when the code is textually identical and only the types differ.
#[macro_export]
macro_rules! for_each_backend {
    ($kind:ident, $value:expr, |$p:ident| $body:expr) => {
        $crate::impl_db_dispatch!($kind, $value, {
            MySql($p) => $body,
            Postgres($p) => $body,
            SQLite($p) => $body,
        })
    };
}
