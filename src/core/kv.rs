use crate::constants::PATH_SEPARATOR;

/// A (storage path, serialized value) pair; the unit exchanged between the
/// engines, the diff logic and the backend adapter.
///
/// An empty value denotes "absent / delete this key".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Trailing separator marks a directory location.
#[inline]
pub(crate) fn is_dir(path: &str) -> bool {
    path.ends_with(PATH_SEPARATOR)
}

/// Containing directory including its trailing separator, or "" when the
/// path has no separator at all.
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(i) => &path[..=i],
        None => "",
    }
}

/// Last path segment (the entry name inside its directory).
pub(crate) fn base_name(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Directory that relative annotations are resolved against.
pub(crate) fn root_dir(root: &str) -> &str {
    if is_dir(root) {
        root
    } else {
        parent_dir(root)
    }
}

/// Sorts directory entry names: numerically when every name is a pure
/// numeral and `numeric` is requested, lexically otherwise.
pub(crate) fn sort_entry_names(
    names: &mut [String],
    numeric: bool,
) {
    let numerals = names
        .iter()
        .all(|n| n.bytes().all(|b| b.is_ascii_digit()) && n.parse::<u64>().is_ok());
    if numeric && numerals {
        names.sort_by_key(|n| n.parse::<u64>().unwrap_or_default());
    } else {
        names.sort();
    }
}
