use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{MemsizeError, Reflect, Scanner, Sizes};

/// Shared handle to a scannable root value.
pub type Root = Arc<dyn Reflect + Send + Sync>;

/// Registry mapping human-chosen names to root values.
#[derive(Default)]
pub struct RootSet {
    roots: RwLock<BTreeMap<String, Root>>,
}

impl fmt::Debug for RootSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSet")
            .field("names", &self.names())
            .finish()
    }
}

impl RootSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            roots: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `root` under `name`, returning the root it replaced.
    pub fn add<T>(&self, name: impl Into<String>, root: Arc<T>) -> Option<Root>
    where
        T: Reflect + Send + Sync,
    {
        let name = name.into();
        debug!(root = %name, "root registered");
        self.roots.write().insert(name, root)
    }

    /// Register an already type-erased root.
    pub fn add_dyn(&self, name: impl Into<String>, root: Root) -> Option<Root> {
        self.roots.write().insert(name.into(), root)
    }

    /// Remove a root; returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.roots.write().remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.roots.read().keys().cloned().collect()
    }

    /// Look up a root by name.
    pub fn resolve(&self, name: &str) -> Result<Root, MemsizeError> {
        self.roots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MemsizeError::UnknownRoot(name.to_string()))
    }

    /// Scan the root registered under `name`.
    pub fn scan_root(&self, scanner: &Scanner, name: &str) -> Result<Sizes, MemsizeError> {
        let root = self.resolve(name)?;
        Ok(scanner.scan(&*root, &[name]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_sorted() {
        let roots = RootSet::new();
        roots.add("zeta", Arc::new(1u8));
        roots.add("alpha", Arc::new(String::new()));
        assert_eq!(roots.names(), ["alpha", "zeta"]);
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let roots = RootSet::new();
        assert!(roots.add("config", Arc::new(1u32)).is_none());
        assert!(roots.add("config", Arc::new(2u32)).is_some());
        assert!(roots.remove("config"));
        assert!(!roots.remove("config"));
        assert!(roots.names().is_empty());
    }

    #[test]
    fn test_unknown_root() {
        let roots = RootSet::new();
        let err = roots.resolve("missing").err().expect("lookup should fail");
        assert!(matches!(err, MemsizeError::UnknownRoot(name) if name == "missing"));
    }

    #[test]
    fn test_scan_root_charges_value_not_handle() {
        let roots = RootSet::new();
        roots.add("numbers", Arc::new(vec![0u32; 10]));
        let sizes = roots
            .scan_root(&Scanner::default(), "numbers")
            .expect("root exists");
        assert_eq!(sizes.total, std::mem::size_of::<Vec<u32>>() + 40);
    }
}
