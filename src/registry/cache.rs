//! Disk memoization of a parsed registry, keyed by the source document's
//! content digest (spec §4.A "Caching").

use std::fs;
use std::path::{Path, PathBuf};

use super::{Error, Registry};

fn digest_hex(document: &str) -> String {
    format!("{:x}", md5::compute(document.as_bytes()))
}

fn cache_path(cache_dir: &Path, document: &str) -> PathBuf {
    cache_dir.join(format!("registry-{}.json", digest_hex(document)))
}

/// Loads a registry, preferring a cached parse keyed by the document's
/// content digest. Caching is advisory (spec §6 "Persisted state"); any
/// cache I/O failure falls back to a fresh parse rather than aborting.
pub fn load_or_parse(
    document: &str,
    feature_api: Option<&str>,
    cache_dir: &Path,
) -> Result<Registry, Error> {
    let path = cache_path(cache_dir, document);
    if let Ok(cached) = fs::read_to_string(&path) {
        if let Ok(registry) = serde_json::from_str::<Registry>(&cached) {
            tracing::debug!("registry cache hit: {}", path.display());
            return Ok(registry);
        }
        tracing::warn!("registry cache at {} unreadable, reparsing", path.display());
    }

    let registry = Registry::parse(document, feature_api)?;
    if fs::create_dir_all(cache_dir).is_ok() {
        if let Ok(serialized) = serde_json::to_string(&registry) {
            if let Err(e) = fs::write(&path, serialized) {
                tracing::warn!("could not write registry cache {}: {e}", path.display());
            }
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<registry>
        <enums><enum value="0" name="GL_ZERO"/></enums>
        <commands></commands>
    </registry>"#;

    #[test]
    fn parses_and_then_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_parse(SAMPLE, None, dir.path()).unwrap();
        assert_eq!(first.global_table.get(&0).unwrap(), "GL_ZERO");
        let cache_file = cache_path(dir.path(), SAMPLE);
        assert!(cache_file.exists());
        let second = load_or_parse(SAMPLE, None, dir.path()).unwrap();
        assert_eq!(second.global_table.get(&0).unwrap(), "GL_ZERO");
    }
}
