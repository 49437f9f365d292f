//! XPath-like navigation over the registry document (spec §6).
//!
//! Expected shape (a Khronos `gl.xml`-style document):
//!
//! ```xml
//! <registry>
//!   <groups><group name="TextureTarget"><enum name="GL_TEXTURE_2D"/></group></groups>
//!   <enums><enum value="0x0DE1" name="GL_TEXTURE_2D"/></enums>
//!   <commands>
//!     <command>
//!       <proto><name>glBindTexture</name></proto>
//!       <param group="TextureTarget"><name>target</name></param>
//!       <param><name>texture</name></param>
//!     </command>
//!   </commands>
//!   <feature api="gles2"><require><command name="glBindTexture"/></require></feature>
//! </registry>
//! ```

use std::collections::{HashMap, HashSet};

use roxmltree::{Document, Node};

use super::{Error, Registry};

fn parse_value(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok().map(|v| v as u32)
    }
}

fn children<'a, 'input>(node: Node<'a, 'input>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(tag))
}

fn find_first<'a>(root: Node<'a, '_>, tag: &str) -> Option<Node<'a, '_>> {
    root.descendants().find(|n| n.has_tag_name(tag))
}

pub(crate) fn parse(document: &str, feature_api: Option<&str>) -> Result<Registry, Error> {
    let doc = Document::parse(document)?;
    let root = doc.root_element();

    let mut registry = Registry::default();

    if let Some(groups) = find_first(root, "groups") {
        for group in children(groups, "group") {
            let Some(name) = group.attribute("name") else {
                continue;
            };
            let table = registry
                .group_tables
                .entry(name.to_string())
                .or_default();
            for enum_ref in children(group, "enum") {
                let Some(enum_name) = enum_ref.attribute("name") else {
                    continue;
                };
                // Group members reference enums by name only; the value
                // comes from the top-level <enums> block, resolved below
                // once that block has been scanned. Stash a placeholder
                // keyed by a synthetic id so order of the two blocks in the
                // document does not matter; the real value is substituted
                // in the reconciliation pass after both blocks are parsed.
                table.insert(u32::MAX - table.len() as u32, enum_name.to_string());
            }
        }
    }

    let mut enum_values: HashMap<String, u32> = HashMap::new();
    for enums_block in root.children().filter(|n| n.has_tag_name("enums")) {
        for enum_node in children(enums_block, "enum") {
            let (Some(value_attr), Some(name)) =
                (enum_node.attribute("value"), enum_node.attribute("name"))
            else {
                continue;
            };
            let Some(value) = parse_value(value_attr) else {
                continue;
            };
            enum_values.insert(name.to_string(), value);
            Registry::insert_preferred(&mut registry.global_table, value, name.to_string());
        }
    }

    // Reconciliation pass: replace the name-only placeholders inserted above
    // with the real `{value: preferred_name}` entries, now that every enum's
    // value is known.
    for table in registry.group_tables.values_mut() {
        let placeholders: Vec<(u32, String)> = table
            .iter()
            .filter(|(k, _)| **k >= u32::MAX - 1_000_000)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (placeholder_key, enum_name) in placeholders {
            table.remove(&placeholder_key);
            if let Some(&value) = enum_values.get(&enum_name) {
                Registry::insert_preferred(table, value, enum_name);
            }
        }
    }

    let allowed_commands: Option<HashSet<String>> = feature_api.and_then(|api| {
        root.children()
            .filter(|n| n.has_tag_name("feature"))
            .find(|n| n.attribute("api") == Some(api))
            .map(|feature| {
                feature
                    .descendants()
                    .filter(|n| n.has_tag_name("command"))
                    .filter_map(|n| n.attribute("name"))
                    .map(str::to_string)
                    .collect()
            })
    });

    if let Some(commands_block) = find_first(root, "commands") {
        for command in children(commands_block, "command") {
            let Some(proto) = children(command, "proto").next() else {
                continue;
            };
            let Some(name_node) = children(proto, "name").next() else {
                continue;
            };
            let Some(name) = name_node.text() else {
                continue;
            };
            if let Some(allowed) = &allowed_commands {
                if !allowed.contains(name) {
                    continue;
                }
            }
            let mut param_groups = HashMap::new();
            for (index, param) in children(command, "param").enumerate() {
                if let Some(group) = param.attribute("group") {
                    param_groups.insert(index, group.to_string());
                }
            }
            if !param_groups.is_empty() {
                registry
                    .parameter_groups
                    .insert(name.to_string(), param_groups);
            }
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <registry>
          <groups>
            <group name="TextureTarget">
              <enum name="GL_TEXTURE_2D"/>
              <enum name="GL_TEXTURE_2D_NV"/>
            </group>
          </groups>
          <enums>
            <enum value="0x0DE1" name="GL_TEXTURE_2D"/>
            <enum value="0x0DE1" name="GL_TEXTURE_2D_NV"/>
          </enums>
          <commands>
            <command>
              <proto><name>glBindTexture</name></proto>
              <param group="TextureTarget"><name>target</name></param>
              <param><name>texture</name></param>
            </command>
          </commands>
          <feature api="gles2">
            <require><command name="glBindTexture"/></require>
          </feature>
        </registry>
    "#;

    #[test]
    fn parses_groups_enums_and_parameter_groups() {
        let registry = parse(SAMPLE, None).unwrap();
        assert_eq!(
            registry.global_table.get(&0x0DE1).unwrap(),
            "GL_TEXTURE_2D"
        );
        assert_eq!(
            registry
                .group_tables
                .get("TextureTarget")
                .unwrap()
                .get(&0x0DE1)
                .unwrap(),
            "GL_TEXTURE_2D"
        );
        assert_eq!(
            registry
                .parameter_groups
                .get("glBindTexture")
                .unwrap()
                .get(&0)
                .unwrap(),
            "TextureTarget"
        );
    }

    #[test]
    fn feature_filter_restricts_commands() {
        let registry = parse(SAMPLE, Some("gles2")).unwrap();
        assert!(registry.parameter_groups.contains_key("glBindTexture"));
        let registry_other = parse(SAMPLE, Some("nonexistent")).unwrap();
        assert!(registry_other.parameter_groups.is_empty());
    }
}
