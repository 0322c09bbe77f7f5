//! Virtual filesystem seam
//!
//! The pipeline reads its input tree and materializes its output tree
//! through this trait, so the driver can run against the OS filesystem or a
//! fully in-memory store. The in-memory form doubles as the staging area
//! for atomic output: the destination directory is only touched after every
//! pass has succeeded.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

/// Minimal filesystem surface: walk, read, write, remove, mkdir
pub trait Vfs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn mkdir_all(&mut self, path: &Path) -> io::Result<()>;
    fn remove(&mut self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Visit every file under `root` in a deterministic (sorted) order
    fn walk(&self, root: &Path, visit: &mut dyn FnMut(&Path) -> io::Result<()>)
    -> io::Result<()>;
}

/// OS-backed filesystem
#[derive(Debug, Default)]
pub struct OsFs;

impl Vfs for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)
    }

    fn mkdir_all(&mut self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path) -> io::Result<()>,
    ) -> io::Result<()> {
        if !root.is_dir() {
            return Ok(());
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(root)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        entries.sort();
        for entry in entries {
            if entry.is_dir() {
                self.walk(&entry, visit)?;
            } else {
                visit(&entry)?;
            }
        }
        Ok(())
    }
}

/// In-memory filesystem
///
/// Backed by a sorted map so walks are deterministic without extra work.
#[derive(Debug, Default)]
pub struct MemFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Vfs for MemFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn mkdir_all(&mut self, _path: &Path) -> io::Result<()> {
        // directories materialize with their first file
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.files.keys().any(|file| file.starts_with(path))
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path) -> io::Result<()>,
    ) -> io::Result<()> {
        for path in self.files.keys() {
            if path.starts_with(root) {
                visit(path)?;
            }
        }
        Ok(())
    }
}

/// Delete every file below `dir`
pub fn remove_contents(fs: &mut dyn Vfs, dir: &Path) -> io::Result<()> {
    let mut doomed = Vec::new();
    fs.walk(dir, &mut |path| {
        doomed.push(path.to_path_buf());
        Ok(())
    })?;
    for path in doomed {
        fs.remove(&path)?;
    }
    Ok(())
}

/// Copy every file below `src_root` of `src` into `dst` below `dst_root`,
/// preserving relative layout
pub fn copy_tree(
    src: &dyn Vfs,
    src_root: &Path,
    dst: &mut dyn Vfs,
    dst_root: &Path,
) -> io::Result<()> {
    let mut pending = Vec::new();
    src.walk(src_root, &mut |path| {
        pending.push(path.to_path_buf());
        Ok(())
    })?;
    for path in pending {
        let rel = path
            .strip_prefix(src_root)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "walk escaped root"))?;
        let data = src.read(&path)?;
        dst.write(&dst_root.join(rel), &data)?;
    }
    Ok(())
}
