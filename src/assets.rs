//! Asset Store (spec §4.D): content-addressed external-file sink for large
//! argument payloads.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// The three asset kinds named in spec §6 ("Assets directory (output)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Int,
    Float,
    Char,
}

impl AssetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Int => "int",
            AssetKind::Float => "float",
            AssetKind::Char => "char",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetHandle {
    pub variable_name: String,
    pub buffer_name: String,
    pub buffer_c_type: String,
    pub file_name: String,
    pub content_digest: String,
}

#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    digest_to_file: HashMap<String, String>,
    counters: HashMap<AssetKind, u32>,
    live: HashMap<String, AssetHandle>,
    declared: HashSet<String>,
}

impl AssetStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AssetStore {
            dir: dir.into(),
            digest_to_file: HashMap::new(),
            counters: HashMap::new(),
            live: HashMap::new(),
            declared: HashSet::new(),
        }
    }

    fn next_file_name(&mut self, kind: AssetKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        let name = format!("{}_asset_{}", kind.as_str(), *counter);
        *counter += 1;
        name
    }

    fn close_sequence(handle: &AssetHandle) -> Vec<String> {
        vec![
            format!("closeAsset({});", handle.variable_name),
            format!("{} = NULL;", handle.variable_name),
            format!("{} = NULL;", handle.buffer_name),
        ]
    }

    /// Allocates (or reopens) an asset, returning the emitted code lines for
    /// this allocation site. Writes `bytes` to a deduplicated file the first
    /// time its digest is observed.
    pub fn allocate(
        &mut self,
        kind: AssetKind,
        variable_name: &str,
        buffer_name: &str,
        buffer_c_type: &str,
        bytes: &[u8],
    ) -> Result<Vec<String>, Error> {
        let digest = format!("{:x}", md5::compute(bytes));
        let file_name = if let Some(existing) = self.digest_to_file.get(&digest) {
            existing.clone()
        } else {
            let file_name = self.next_file_name(kind);
            fs::create_dir_all(&self.dir)?;
            fs::write(self.dir.join(&file_name), bytes)?;
            self.digest_to_file.insert(digest.clone(), file_name.clone());
            file_name
        };

        let mut lines = Vec::new();
        if let Some(previous) = self.live.remove(variable_name) {
            lines.extend(AssetStore::close_sequence(&previous));
        }
        if self.declared.insert(variable_name.to_string()) {
            lines.push(format!("static void *{variable_name};"));
            lines.push(format!("static {buffer_c_type} *{buffer_name};"));
        }
        lines.push(format!(
            "{buffer_name} = openAndGetAssetBuffer(\"{file_name}\", &{variable_name});"
        ));

        self.live.insert(
            variable_name.to_string(),
            AssetHandle {
                variable_name: variable_name.to_string(),
                buffer_name: buffer_name.to_string(),
                buffer_c_type: buffer_c_type.to_string(),
                file_name,
                content_digest: digest,
            },
        );
        Ok(lines)
    }

    /// Emits the free sequence for a live asset; no-op (empty lines) if the
    /// variable is not currently live.
    #[must_use]
    pub fn free(&mut self, variable_name: &str) -> Vec<String> {
        match self.live.remove(variable_name) {
            Some(handle) => AssetStore::close_sequence(&handle),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_live(&self, variable_name: &str) -> bool {
        self.live.contains_key(variable_name)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_share_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = AssetStore::new(tmp.path());
        let bytes = vec![1u8; 4096];
        let lines_a = store
            .allocate(AssetKind::Int, "g_buf0", "g_buf0_ptr", "GLushort", &bytes)
            .unwrap();
        let lines_b = store
            .allocate(AssetKind::Int, "g_buf1", "g_buf1_ptr", "GLushort", &bytes)
            .unwrap();
        assert!(lines_a.iter().any(|l| l.contains("int_asset_0")));
        assert!(lines_b.iter().any(|l| l.contains("int_asset_0")));
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn reallocating_a_live_name_emits_a_close_first() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = AssetStore::new(tmp.path());
        store
            .allocate(AssetKind::Char, "g_shader0", "g_shader0_buf", "char", b"abc")
            .unwrap();
        let second = store
            .allocate(AssetKind::Char, "g_shader0", "g_shader0_buf", "char", b"xyz")
            .unwrap();
        assert!(second.iter().any(|l| l.starts_with("closeAsset")));
        assert!(!second.iter().any(|l| l.starts_with("static void")));
    }
}
