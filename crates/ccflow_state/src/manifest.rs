//! Stage output manifests.
//!
//! Each successful stage writes `<stage dir>/manifest.json` listing what it
//! produced and the content hash of each file. The manifest's own
//! fingerprint is what downstream stages fold into their inputs.

use crate::stage::Stage;
use ccflow_common::{ContentHash, Fingerprinter};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// File name of a manifest inside a stage directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One produced file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Content hash at the time the stage finished.
    pub hash: ContentHash,
}

impl Artifact {
    /// Hashes `<root>/<path>`.
    pub fn from_file(root: &Path, path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let hash = ContentHash::from_file(&root.join(&path))?;
        Ok(Artifact { path, hash })
    }
}

/// What a stage run produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest {
    /// The producing stage.
    pub stage: Stage,
    /// Produced files in the order they were written.
    pub artifacts: Vec<Artifact>,
}

impl StageManifest {
    /// Digest of the artifact list, order-sensitive.
    pub fn fingerprint(&self) -> ContentHash {
        let mut fp = Fingerprinter::new(self.stage.as_str());
        for artifact in &self.artifacts {
            fp.text("path", &artifact.path.to_string_lossy());
            fp.hash("hash", &artifact.hash);
        }
        fp.finish()
    }

    /// Path of the manifest for `stage` under `root`.
    pub fn path(root: &Path, stage: Stage) -> PathBuf {
        root.join(stage.output_dir()).join(MANIFEST_FILE)
    }

    /// Writes the manifest into the stage directory.
    pub fn write(&self, root: &Path) -> io::Result<PathBuf> {
        let path = Self::path(root, self.stage);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Reads the manifest for `stage`, if one exists.
    pub fn read(root: &Path, stage: Stage) -> io::Result<Option<Self>> {
        let path = Self::path(root, stage);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
