//! Session: tree discovery, the mutator loop, and atomic save
//!
//! The session walks the input tree through the [`Vfs`] seam, hands source
//! files to the external parser, and keeps everything else around as
//! "extras" to be copied verbatim. Several named packages can share one
//! directory (the package, its external test package, an entry point); the
//! primary name (preferring a non-test, non-entry-point name) is the one
//! that gets transformed, the rest travel as extras.
//!
//! Output is materialized atomically: files render into an in-memory
//! staging tree first, and the destination directory is replaced only once
//! every pass has succeeded.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    ast_store::AstStore,
    codegen,
    mutators::Mutator,
    syntax::File,
    types::FxIndexMap,
    vfs::{self, MemFs, Vfs},
};

/// External parser seam: source text plus path in, decorated file out
pub type Parser<'p> = dyn FnMut(&str, &Path) -> crate::error::Result<File> + 'p;

/// Everything the session knows about one directory of the tree
#[derive(Debug, Default)]
pub struct PathInfo {
    pub relpath: String,
    /// package name -> source file names
    pub packages: FxIndexMap<String, Vec<String>>,
    /// files not part of the primary package: non-source files, filtered
    /// files, secondary packages
    pub extras: Vec<String>,
}

impl PathInfo {
    /// The package the transformation applies to
    pub fn primary_package(&self) -> Option<&str> {
        self.packages
            .keys()
            .find(|name| !name.ends_with("_test") && *name != "main")
            .or_else(|| self.packages.keys().find(|name| !name.ends_with("_test")))
            .or_else(|| self.packages.keys().next())
            .map(String::as_str)
    }
}

pub struct Session {
    fs: Box<dyn Vfs>,
    /// Directory of the input tree
    root_dir: PathBuf,
    /// Import path declared by the root
    root_import: String,
    store: AstStore,
    paths: FxIndexMap<String, PathInfo>,
    /// Optional predicate over (relpath, fname) applied before parsing
    pub parse_filter: Option<Box<dyn Fn(&str, &str) -> bool>>,
}

impl Session {
    pub fn new(
        fs: Box<dyn Vfs>,
        root_dir: impl Into<PathBuf>,
        root_import: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            root_dir: root_dir.into(),
            root_import: root_import.into(),
            store: AstStore::new(),
            paths: FxIndexMap::default(),
            parse_filter: None,
        }
    }

    pub fn store(&self) -> &AstStore {
        &self.store
    }

    pub fn fs(&self) -> &dyn Vfs {
        self.fs.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut AstStore {
        &mut self.store
    }

    pub fn paths(&self) -> &FxIndexMap<String, PathInfo> {
        &self.paths
    }

    /// Import path of a root-relative directory
    pub fn import_path(&self, relpath: &str) -> String {
        if relpath.is_empty() {
            self.root_import.clone()
        } else {
            format!("{}/{relpath}", self.root_import)
        }
    }

    /// Walk the input tree, parse the sources, classify the rest as extras
    pub fn load(&mut self, parser: &mut Parser<'_>) -> Result<()> {
        let mut discovered: Vec<PathBuf> = Vec::new();
        self.fs.walk(&self.root_dir, &mut |path| {
            discovered.push(path.to_path_buf());
            Ok(())
        })?;

        // directory -> package name -> (fname, parsed file)
        let mut parsed: FxIndexMap<String, FxIndexMap<String, Vec<(String, File)>>> =
            FxIndexMap::default();

        for path in discovered {
            let rel = path
                .strip_prefix(&self.root_dir)
                .with_context(|| format!("walk escaped root: {}", path.display()))?;
            let fname = rel
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relpath = rel
                .parent()
                .map(|dir| dir.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();

            let info = self.paths.entry(relpath.clone()).or_insert_with(|| PathInfo {
                relpath: relpath.clone(),
                ..PathInfo::default()
            });

            let parse = fname.ends_with(".go")
                && self
                    .parse_filter
                    .as_ref()
                    .is_none_or(|filter| filter(&relpath, &fname));
            if !parse {
                info.extras.push(fname);
                continue;
            }

            let source = String::from_utf8(self.fs.read(&path)?)
                .with_context(|| format!("{} is not utf-8", path.display()))?;
            let file = parser(&source, &path)
                .with_context(|| format!("parsing {}", path.display()))?;
            info.packages
                .entry(file.package_name.clone())
                .or_default()
                .push(fname.clone());
            parsed
                .entry(relpath)
                .or_default()
                .entry(file.package_name.clone())
                .or_default()
                .push((fname, file));
        }

        // primary packages enter the store; secondary ones travel verbatim
        for (relpath, mut by_package) in parsed {
            let primary = self.paths[&relpath]
                .primary_package()
                .map(str::to_string);
            let import_path = self.import_path(&relpath);
            for (package_name, files) in by_package.drain(..) {
                if Some(&package_name) == primary.as_ref() {
                    for (fname, file) in files {
                        self.store.add_file(&import_path, &fname, file);
                    }
                } else if let Some(info) = self.paths.get_mut(&relpath) {
                    info.extras
                        .extend(files.into_iter().map(|(fname, _)| fname));
                }
            }
        }

        debug!("loaded {} directories", self.paths.len());
        Ok(())
    }

    /// Apply the mutators in sequence
    pub fn run(&mut self, mutators: &mut [Mutator]) -> Result<()> {
        for mutator in mutators {
            match mutator {
                Mutator::FileFilter(keep) => self.apply_filter(keep.as_ref()),
                Mutator::Transform(f) => {
                    let relpaths: Vec<String> = self.paths.keys().cloned().collect();
                    for relpath in relpaths {
                        let import_path = self.import_path(&relpath);
                        self.store.rewrite_package_files(
                            &import_path,
                            |fname, file, ids, _| {
                                f(&relpath, fname, file, ids);
                                Ok(())
                            },
                        )?;
                    }
                }
                Mutator::Callback(f) => f(&mut self.store)?,
            }
        }
        Ok(())
    }

    fn apply_filter(&mut self, keep: &dyn Fn(&str, &str) -> bool) {
        let root_import = self.root_import.clone();
        let Self { paths, store, .. } = self;
        for (relpath, info) in paths.iter_mut() {
            info.extras.retain(|fname| keep(relpath, fname));
            let import_path = if relpath.is_empty() {
                root_import.clone()
            } else {
                format!("{root_import}/{relpath}")
            };
            for files in info.packages.values_mut() {
                files.retain(|fname| {
                    if keep(relpath, fname) {
                        return true;
                    }
                    let _ = store.remove_file(&import_path, fname);
                    false
                });
            }
        }
    }

    /// Render the store and copy the extras into `dest`, atomically.
    ///
    /// Everything is staged in memory first; the destination is cleared and
    /// rewritten only when the full staging tree exists.
    pub fn save(&mut self, dest: &Path) -> Result<()> {
        let mut staging = MemFs::new();

        for import_path in self.store.package_paths() {
            let relpath = import_path
                .strip_prefix(&self.root_import)
                .map(|rel| rel.trim_start_matches('/'))
                .unwrap_or(&import_path)
                .to_string();
            for (fname, file) in self.store.package_files(&import_path) {
                let rendered = codegen::render_file(file);
                staging.write(&Path::new(&relpath).join(fname), rendered.as_bytes())?;
            }
        }

        for info in self.paths.values() {
            for extra in &info.extras {
                let source = self.root_dir.join(&info.relpath).join(extra);
                let data = self
                    .fs
                    .read(&source)
                    .with_context(|| format!("reading extra {}", source.display()))?;
                staging.write(&Path::new(&info.relpath).join(extra), &data)?;
            }
        }

        vfs::remove_contents(self.fs.as_mut(), dest)?;
        vfs::copy_tree(&staging, Path::new(""), self.fs.as_mut(), dest)?;
        debug!("saved to {}", dest.display());
        Ok(())
    }
}
