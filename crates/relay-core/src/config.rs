//! Configuration inheritance resolution.
//!
//! Receivers may carry their own risk/safety settings or inherit the global
//! defaults. Precedence is an explicit function rather than an object merge,
//! so it stays unambiguous and testable in isolation.

/// Resolve an effective config from a global default and an optional
/// per-receiver override.
///
/// `use_global` wins over the presence of an override: a receiver flagged to
/// inherit always gets the global settings, even if a stale override is
/// still stored for it.
#[must_use]
pub fn resolve_config<T: Clone>(global: &T, per_receiver: Option<&T>, use_global: bool) -> T {
    if use_global {
        return global.clone();
    }
    match per_receiver {
        Some(o) => o.clone(),
        None => global.clone(),
    }
}
