//! Enumerant Registry (spec §4.A): loads an API description and produces
//! group/global/parameter-group tables, with vendor-suffix deprioritization
//! and a small manual override patch set applied last.

pub mod cache;
mod xml;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Vendor/extension suffixes that are deprioritized when two names map to
/// the same integer value. Transcribed from `original_source/glparse.py`.
const VENDOR_SUFFIXES: &[&str] = &["_NV", "_ATI", "_3DFX", "_SGIS", "_INTEL", "_IMG", "_QCOM"];

#[derive(Debug)]
pub enum Error {
    Xml(roxmltree::Error),
    Io(std::io::Error),
    Cache(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Xml(e) => write!(f, "malformed registry document: {e}"),
            Error::Io(e) => write!(f, "{e}"),
            Error::Cache(e) => write!(f, "registry cache error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Xml(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Cache(e) => Some(e),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Cache(e)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    pub group_tables: HashMap<String, HashMap<u32, String>>,
    pub global_table: HashMap<u32, String>,
    pub parameter_groups: HashMap<String, HashMap<usize, String>>,
}

impl Registry {
    /// Parses an API description document (spec §6, XML-like registry) into
    /// the three output tables, restricted to a feature profile when given.
    pub fn parse(document: &str, feature_api: Option<&str>) -> Result<Self, Error> {
        let mut registry = xml::parse(document, feature_api)?;
        registry.apply_manual_overrides();
        Ok(registry)
    }

    /// True if `name` carries one of the deprioritized vendor/extension
    /// suffixes (spec §4.A resolution policy).
    #[must_use]
    pub fn is_vendor_suffixed(name: &str) -> bool {
        VENDOR_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    }

    /// Whether `candidate` should replace `existing` as the preferred name
    /// for a value: a non-vendor-suffixed name always wins over a
    /// vendor-suffixed one; otherwise the existing mapping is kept (first
    /// write wins, matching the original's dict-insertion order).
    #[must_use]
    fn should_prefer(existing: &str, candidate: &str) -> bool {
        Registry::is_vendor_suffixed(existing) && !Registry::is_vendor_suffixed(candidate)
    }

    pub(crate) fn insert_preferred(table: &mut HashMap<u32, String>, value: u32, name: String) {
        match table.get(&value) {
            Some(existing) if !Registry::should_prefer(existing, &name) => {}
            _ => {
                table.insert(value, name);
            }
        }
    }

    /// Manual overrides applied last, correcting known conflicts in the
    /// description (spec §4.A). Transcribed from
    /// `original_source/glparse.py::update_translation_overrides`.
    fn apply_manual_overrides(&mut self) {
        if let Some(get_p_name) = self.group_tables.get_mut("GetPName") {
            get_p_name.remove(&0x8009);
        }
        self.global_table
            .insert(0x8ca6, "GL_FRAMEBUFFER_BINDING".to_string());
        self.global_table.insert(0, "GL_ZERO".to_string());
        self.global_table.insert(1, "GL_ONE".to_string());
        self.group_tables.remove("BlendEquationModeEXT");
    }

    /// Looks up an ENUM value's preferred name in a declared group, falling
    /// back to the global table (spec §4.C: "on a miss in the declared
    /// group, a second lookup is attempted in the `global` table").
    #[must_use]
    pub fn resolve_enum(&self, group: Option<&str>, value: u32) -> Option<&str> {
        if let Some(group) = group {
            if let Some(name) = self.group_tables.get(group).and_then(|t| t.get(&value)) {
                return Some(name);
            }
        }
        self.global_table.get(&value).map(String::as_str)
    }

    #[must_use]
    pub fn parameter_group(&self, function: &str, param_index: usize) -> Option<&str> {
        self.parameter_groups
            .get(function)
            .and_then(|m| m.get(&param_index))
            .map(String::as_str)
    }
}
