use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use url::ParseError;
use url::Url;

use super::Backend;
use super::FileBackend;
use super::MemoryBackend;
use crate::constants::SCHEME_FILE;
use crate::constants::SCHEME_MEM;
use crate::BindError;
use crate::Result;

/// A bind URI split into backend scheme and storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindUri {
    pub scheme: String,
    /// Authority and path joined, as the backend sees it
    pub path: String,
}

impl BindUri {
    /// URIs without a scheme are plain file paths.
    pub fn parse(uri: &str) -> Result<Self> {
        match Url::parse(uri) {
            Ok(url) => {
                let host = url.host_str().unwrap_or_default();
                Ok(Self {
                    scheme: url.scheme().to_string(),
                    path: format!("{host}{}", url.path()),
                })
            }
            Err(ParseError::RelativeUrlWithoutBase) => Ok(Self {
                scheme: SCHEME_FILE.to_string(),
                path: uri.to_string(),
            }),
            Err(e) => Err(BindError::InvalidUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

pub type BackendFactory = Arc<dyn Fn(&BindUri) -> Result<Arc<dyn Backend>> + Send + Sync>;

/// Explicit scheme -> backend constructor table.
///
/// The default registry knows `file` and `mem`; every `mem` URI resolved
/// through one registry shares the same in-memory store.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut schemes: Vec<_> = self.factories.keys().collect();
        schemes.sort();
        f.debug_struct("BackendRegistry").field("schemes", &schemes).finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let memory = Arc::new(MemoryBackend::new());
        Self::empty()
            .register(SCHEME_FILE, |_| Ok(Arc::new(FileBackend::new()) as Arc<dyn Backend>))
            .register(SCHEME_MEM, move |_| Ok(memory.clone() as Arc<dyn Backend>))
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds or replaces the constructor for `scheme`.
    pub fn register<F>(
        mut self,
        scheme: &str,
        factory: F,
    ) -> Self
    where
        F: Fn(&BindUri) -> Result<Arc<dyn Backend>> + Send + Sync + 'static,
    {
        self.factories.insert(scheme.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(
        &self,
        scheme: &str,
    ) -> bool {
        self.factories.contains_key(scheme)
    }

    pub fn resolve(
        &self,
        uri: &BindUri,
    ) -> Result<Arc<dyn Backend>> {
        let factory = self
            .factories
            .get(&uri.scheme)
            .ok_or_else(|| BindError::UnsupportedScheme(uri.scheme.clone()))?;
        debug!(scheme = %uri.scheme, path = %uri.path, "resolving backend");
        factory(uri)
    }
}
