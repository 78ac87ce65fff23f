use std::collections::BTreeMap;

use crate::KvPair;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub(crate) fn kv(
    key: &str,
    value: &str,
) -> KvPair {
    KvPair::new(key, value)
}

/// Flattens pairs into a sorted key -> value map for order-insensitive asserts.
pub(crate) fn as_map(pairs: &[KvPair]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|p| (p.key.clone(), p.value.clone()))
        .collect()
}
