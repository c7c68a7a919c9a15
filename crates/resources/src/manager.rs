//! Path-keyed resource cache.
//!
//! Resources are keyed by the canonical absolute path of the file they came
//! from, so `assets/a.png` and `./assets/../assets/a.png` share one entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::ResourceError;

#[derive(Debug)]
pub struct ResourceManager<R> {
    resources: HashMap<PathBuf, Arc<R>>,
}

impl<R> Default for ResourceManager<R> {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
        }
    }
}

impl<R> ResourceManager<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached resource for `path`, or build it with `load`.
    ///
    /// `load` receives the canonical path and runs at most once per file.
    /// A failed load caches nothing.
    ///
    /// # Errors
    ///
    /// [`ResourceError::FileNotFound`] if `path` does not exist, or whatever
    /// `load` returns.
    pub fn create_resource_from_file<F, E>(&mut self, path: &Path, load: F) -> Result<Arc<R>, E>
    where
        F: FnOnce(&Path) -> Result<R, E>,
        E: From<ResourceError>,
    {
        let full_path = canonical_path(path)?;

        if let Some(resource) = self.resources.get(&full_path) {
            debug!("Resource cache hit: {:?}", full_path);
            return Ok(Arc::clone(resource));
        }

        let resource = Arc::new(load(&full_path)?);
        debug!("Resource cached: {:?}", full_path);
        self.resources.insert(full_path, Arc::clone(&resource));
        Ok(resource)
    }

    /// Cached resource for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<R>> {
        let full_path = canonical_path(path).ok()?;
        self.resources.get(&full_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop every cached entry. Resources still referenced elsewhere survive.
    pub fn clear(&mut self) {
        self.resources.clear();
    }
}

fn canonical_path(path: &Path) -> Result<PathBuf, ResourceError> {
    path.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ResourceError::FileNotFound(path.to_path_buf()),
        _ => ResourceError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meshview-manager-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn test_same_file_loaded_once() {
        let path = temp_file("once.txt", "hello");
        let mut manager: ResourceManager<String> = ResourceManager::new();
        let calls = Cell::new(0);

        let load = |p: &Path| {
            calls.set(calls.get() + 1);
            fs::read_to_string(p).map_err(ResourceError::from)
        };

        let a = manager
            .create_resource_from_file(&path, load)
            .expect("first load");
        let b = manager
            .create_resource_from_file(&path, load)
            .expect("cached load");

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, "hello");
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_different_spellings_share_entry() {
        let path = temp_file("spelling.txt", "x");
        let parent = path.parent().expect("has parent");
        let dir_name = parent.file_name().expect("dir name");
        let alternate = parent.join("..").join(dir_name).join("spelling.txt");

        let mut manager: ResourceManager<usize> = ResourceManager::new();
        let a = manager
            .create_resource_from_file(&path, |_| Ok::<_, ResourceError>(1))
            .expect("load");
        let b = manager
            .create_resource_from_file(&alternate, |_| Ok::<_, ResourceError>(2))
            .expect("load");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 1);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut manager: ResourceManager<()> = ResourceManager::new();
        let result = manager.create_resource_from_file(Path::new("missing/file.bin"), |_| {
            Ok::<_, ResourceError>(())
        });
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_failed_load_not_cached() {
        let path = temp_file("fails.txt", "");
        let mut manager: ResourceManager<()> = ResourceManager::new();

        let result = manager.create_resource_from_file(&path, |p| {
            Err::<(), _>(ResourceError::NoMeshes(p.to_path_buf()))
        });
        assert!(result.is_err());
        assert!(manager.get(&path).is_none());

        manager
            .create_resource_from_file(&path, |_| Ok::<_, ResourceError>(()))
            .expect("second attempt succeeds");
        assert_eq!(manager.len(), 1);
    }
}
