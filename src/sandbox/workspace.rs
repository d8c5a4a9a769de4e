// Run workspace - isolated work and control directories for one run

use super::error::{Result, SandboxError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Size and modification time of one file
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Files present in the work directory at one point in time
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    files: BTreeMap<String, FileStamp>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Files created or modified since `before`
    pub fn produced_since(&self, before: &Snapshot) -> BTreeSet<String> {
        self.files
            .iter()
            .filter(|(name, stamp)| before.files.get(*name) != Some(stamp))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// `<root>/work` is the child's cwd; `<root>/control` holds code, prelude and events
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    work: PathBuf,
    control: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a fresh workspace, clearing anything left at `root`
    pub fn create(root: impl Into<PathBuf>, keep: bool) -> Result<Self> {
        let root = root.into();
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }

        let work = root.join("work");
        let control = root.join("control");
        std::fs::create_dir_all(&work)?;
        std::fs::create_dir_all(&control)?;

        debug!(root = %root.display(), "workspace created");
        Ok(Self {
            root,
            work,
            control,
            keep,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn work(&self) -> &Path {
        &self.work
    }

    pub fn control(&self) -> &Path {
        &self.control
    }

    /// Copy input files into the work directory under their file names
    pub fn seed(&self, inputs: &[PathBuf]) -> Result<()> {
        for input in inputs {
            let name = input.file_name().ok_or_else(|| {
                SandboxError::InputFile(input.display().to_string(), "no file name".to_string())
            })?;
            std::fs::copy(input, self.work.join(name)).map_err(|e| {
                SandboxError::InputFile(input.display().to_string(), e.to_string())
            })?;
        }
        if !inputs.is_empty() {
            debug!(count = inputs.len(), "workspace seeded with input files");
        }
        Ok(())
    }

    /// Record every file under the work directory
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&self.work).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = entry.metadata()?;
            let rel = entry
                .path()
                .strip_prefix(&self.work)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(
                rel,
                FileStamp {
                    len: meta.len(),
                    modified: meta.modified().ok(),
                },
            );
        }
        Ok(Snapshot { files })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            debug!(root = %self.root.display(), "keeping workspace");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %self.root.display(), error = %e, "failed to remove workspace");
            }
        }
    }
}
