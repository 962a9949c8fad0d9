use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_UNIQUE_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a process-wide unique id.
///
/// Ids are never reused; `0` is reserved as "no id".
pub(crate) fn next_unique_id() -> u32 {
    NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed)
}
