use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::Result, task::SCRIPT_DIR};

const MANIFEST_FILENAME: &str = "manifest.json";

/// Record of the files a build generated, keyed by path, with the BLAKE3 digest of each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub workflow: String,
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(workflow: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            files: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, path: &Path, contents: &str) {
        self.files
            .insert(path.to_string_lossy().into_owned(), digest(contents));
    }

    /// True when `path` was last written with exactly `contents` and still exists.
    pub fn is_current(&self, path: &Path, contents: &str) -> bool {
        let key = path.to_string_lossy();
        path.exists()
            && self
                .files
                .get(&*key)
                .is_some_and(|recorded| *recorded == digest(contents))
    }
}

pub fn digest(contents: &str) -> String {
    blake3::hash(contents.as_bytes()).to_hex().to_string()
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(SCRIPT_DIR).join(MANIFEST_FILENAME)
}

/// Loads the previous manifest. A missing or unreadable one counts as empty.
pub fn load_manifest(output_dir: &Path) -> Manifest {
    let path = manifest_path(output_dir);

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(_) => return Manifest::default(),
    };

    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
            Manifest::default()
        }
    }
}

pub fn save_manifest(manifest: &Manifest, output_dir: &Path) -> Result<()> {
    let path = manifest_path(output_dir);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, manifest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest("echo hi\n"), digest("echo hi\n"));
        assert_ne!(digest("echo hi\n"), digest("echo hi\r\n"));
    }

    #[test]
    fn saved_manifest_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("a.sh");
        fs::write(&script, "true\n").unwrap();

        let mut manifest = Manifest::new("Bam2Fastq");
        manifest.record(&script, "true\n");
        save_manifest(&manifest, dir.path()).unwrap();

        let loaded = load_manifest(dir.path());
        assert_eq!(loaded, manifest);
        assert!(loaded.is_current(&script, "true\n"));
        assert!(!loaded.is_current(&script, "false\n"));
    }

    #[test]
    fn corrupt_manifest_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        assert_eq!(load_manifest(dir.path()), Manifest::default());
    }
}
