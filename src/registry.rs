use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

use crate::error::Error;

/// Maps library base names to on-disk binary paths.
///
/// The search roots are walked exactly once per run, lazily on the first
/// lookup; concurrent first lookups share that one scan. When the same
/// base name appears under several roots, the last root in configuration
/// order wins.
pub struct LibraryRegistry {
    roots: Vec<PathBuf>,
    cache: OnceCell<FxHashMap<String, PathBuf>>,
}

impl LibraryRegistry {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            cache: OnceCell::new(),
        }
    }

    /// Looks up the binary path for a library name. `Ok(None)` means the
    /// library isn't present under any search root; only scan I/O errors
    /// are hard failures.
    pub async fn resolve_library_path(&self, name: &str) -> Result<Option<PathBuf>, Error> {
        let cache = self
            .cache
            .get_or_try_init(|| async { self.scan_roots() })
            .await?;
        Ok(cache.get(name).cloned())
    }

    fn scan_roots(&self) -> Result<FxHashMap<String, PathBuf>, Error> {
        let mut map = FxHashMap::default();
        for root in &self.roots {
            if !root.is_dir() {
                log::warn!("Library directory {root:?} does not exist, skipping");
                continue;
            }
            add_files_under(root, &mut map).map_err(|e| Error::LibDirScan(root.clone(), e))?;
            log::debug!("Scanned library directory {root:?}");
        }
        Ok(map)
    }
}

fn add_files_under(dir: &Path, map: &mut FxHashMap<String, PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            add_files_under(&path, map)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            map.insert(name.to_string(), path.clone());
        }
    }
    Ok(())
}
