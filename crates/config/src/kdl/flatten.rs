//! Flattening of KDL documents into configuration keys.

use ::kdl::{KdlDocument, KdlNode, KdlValue};
use tracing::trace;

use crate::data::{combine_key, ConfigData};

/// Node name used for anonymous array items (`- "value"`).
const ARRAY_ITEM: &str = "-";

/// Convert a kebab-case node name into a PascalCase key segment.
///
/// `domain-names` becomes `DomainNames`; names without dashes only get their
/// first letter upper-cased, so `DomainNames` is left alone.
pub fn key_segment(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render a scalar as a configuration value. Null has no value.
pub fn value_to_string(value: &KdlValue) -> Option<String> {
    if value.is_null() {
        return None;
    }
    if let Some(s) = value.as_string() {
        return Some(s.to_string());
    }
    if let Some(b) = value.as_bool() {
        return Some(b.to_string());
    }
    if let Some(i) = value.as_integer() {
        return Some(i.to_string());
    }
    value.as_float().map(|f| f.to_string())
}

/// Flatten every node of `doc` under `prefix` into `data`.
pub fn flatten_document(doc: &KdlDocument, prefix: &str, data: &mut ConfigData) {
    let mut array_index = 0usize;
    for node in doc.nodes() {
        let name = node.name().value();
        let segment = if name == ARRAY_ITEM {
            let index = array_index.to_string();
            array_index += 1;
            index
        } else {
            key_segment(name)
        };

        let path = if prefix.is_empty() {
            segment
        } else {
            combine_key([prefix, segment.as_str()])
        };
        flatten_node(node, &path, data);
    }
}

fn flatten_node(node: &KdlNode, path: &str, data: &mut ConfigData) {
    let mut arguments = Vec::new();
    let mut has_properties = false;

    for entry in node.entries() {
        match entry.name() {
            Some(property) => {
                has_properties = true;
                let key = combine_key([path, key_segment(property.value()).as_str()]);
                data.insert(key, value_to_string(entry.value()));
            }
            None => arguments.push(value_to_string(entry.value())),
        }
    }

    match arguments.len() {
        0 => {
            if !has_properties && node.children().is_none() {
                // Bare node: a key without a value.
                data.insert(path, None);
            }
        }
        1 => data.insert(path, arguments.pop().flatten()),
        _ => {
            for (index, value) in arguments.into_iter().enumerate() {
                let index = index.to_string();
                data.insert(combine_key([path, index.as_str()]), value);
            }
        }
    }

    if let Some(children) = node.children() {
        flatten_document(children, path, data);
    }

    trace!(key = %path, "Flattened configuration node");
}
