//! Symbol Tables (spec §4.C): per-namespace, per-scope mappings from
//! runtime trace ids to the textual expression used in emitted code.

use std::collections::HashMap;

use crate::registry::Registry;

/// Namespaces whose tables are private to one GL context and therefore get
/// renamed aside (not cleared) on `eglMakeCurrent` context switches, per
/// `original_source/glparse.py`'s `tables_to_evict` behavior.
const CONTEXT_SCOPED_NAMESPACES: &[&str] = &[
    "programs",
    "shaders",
    "buffers",
    "framebuffers",
    "renderbuffers",
    "textures",
];

fn table_key(namespace: &str, scope: Option<u32>) -> String {
    match scope {
        Some(scope) => format!("{namespace}@{scope}"),
        None => namespace.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    tables: HashMap<String, HashMap<u32, String>>,
    current_uniforms_scope: Option<u32>,
}

impl SymbolTables {
    #[must_use]
    pub fn new() -> Self {
        SymbolTables::default()
    }

    /// Pre-populates the `global` fallback table from the Enumerant
    /// Registry (spec §3: "A `global` table is pre-populated from the
    /// Enumerant Registry").
    pub fn populate_global(&mut self, registry: &Registry) {
        let table = self.tables.entry("global".to_string()).or_default();
        for (&value, name) in &registry.global_table {
            table.insert(value, name.clone());
        }
    }

    pub fn insert(&mut self, namespace: &str, scope: Option<u32>, trace_id: u32, expression: impl Into<String>) {
        self.tables
            .entry(table_key(namespace, scope))
            .or_default()
            .insert(trace_id, expression.into());
    }

    #[must_use]
    pub fn lookup(&self, namespace: &str, scope: Option<u32>, trace_id: u32) -> Option<&str> {
        if namespace == "current_uniforms" {
            return self.lookup("uniforms", self.current_uniforms_scope, trace_id);
        }
        self.tables
            .get(&table_key(namespace, scope))
            .and_then(|t| t.get(&trace_id))
            .map(String::as_str)
    }

    /// Looks up an ENUM-typed trace id in a declared group namespace, with
    /// the fallback to `global` called out in spec §4.C.
    #[must_use]
    pub fn lookup_enum(&self, group: Option<&str>, trace_id: u32) -> Option<&str> {
        if let Some(group) = group {
            if let Some(found) = self.lookup(group, None, trace_id) {
                return Some(found);
            }
        }
        self.lookup("global", None, trace_id)
    }

    /// Aliases `current_uniforms` to `uniforms@program_id`, creating the
    /// target table if absent (spec §4.C).
    pub fn swap_active_uniforms(&mut self, program_id: u32) {
        self.tables
            .entry(table_key("uniforms", Some(program_id)))
            .or_default();
        self.current_uniforms_scope = Some(program_id);
    }

    /// Renames aside every context-scoped namespace so a newly made-current
    /// context starts with empty object tables without losing the evicted
    /// context's own state (spec §9 supplement, grounded on
    /// `original_source/glparse.py`).
    pub fn evict_context(&mut self, evict_id: u32) {
        for namespace in CONTEXT_SCOPED_NAMESPACES {
            if let Some(table) = self.tables.remove(*namespace) {
                self.tables
                    .insert(format!("{namespace}_{evict_id}"), table);
            }
        }
    }

    /// Reverses `evict_context` when that same context is made current
    /// again.
    pub fn restore_context(&mut self, context_id: u32) {
        for namespace in CONTEXT_SCOPED_NAMESPACES {
            let evicted_key = format!("{namespace}_{context_id}");
            if let Some(table) = self.tables.remove(&evicted_key) {
                self.tables.insert((*namespace).to_string(), table);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut tables = SymbolTables::new();
        tables.insert("textures", None, 7, "textures_global_7[0]");
        assert_eq!(
            tables.lookup("textures", None, 7),
            Some("textures_global_7[0]")
        );
        assert_eq!(tables.lookup("textures", None, 8), None);
    }

    #[test]
    fn current_uniforms_follows_the_active_program() {
        let mut tables = SymbolTables::new();
        tables.insert("uniforms", Some(3), 1, "uniform_program_3_1");
        tables.swap_active_uniforms(3);
        assert_eq!(
            tables.lookup("current_uniforms", None, 1),
            Some("uniform_program_3_1")
        );
    }

    #[test]
    fn enum_miss_falls_back_to_global() {
        let mut tables = SymbolTables::new();
        tables.insert("global", None, 0, "GL_ZERO");
        assert_eq!(tables.lookup_enum(Some("GetPName"), 0), Some("GL_ZERO"));
    }

    #[test]
    fn context_eviction_preserves_and_restores_tables() {
        let mut tables = SymbolTables::new();
        tables.insert("textures", None, 1, "ctx_a_tex_1");
        tables.evict_context(10);
        assert_eq!(tables.lookup("textures", None, 1), None);
        tables.insert("textures", None, 1, "ctx_b_tex_1");
        tables.restore_context(10);
        assert_eq!(tables.lookup("textures", None, 1), Some("ctx_a_tex_1"));
    }
}
