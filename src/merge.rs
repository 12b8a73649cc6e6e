//! Deep-merge of configuration mappings
//!
//! Later sources win at every nesting level: nested mappings merge
//! key-by-key, while sequences and scalars are replaced outright. Key
//! order is preserved — existing keys keep their position, new keys append
//! in source order.

use serde_yaml::{Mapping, Value};

/// Recursively merge `source` into `target`.
pub fn deep_merge(target: &mut Mapping, source: &Mapping) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(existing) => {
                let both_mappings = existing.is_mapping() && value.is_mapping();
                if both_mappings {
                    if let (Some(existing_map), Some(source_map)) =
                        (existing.as_mapping_mut(), value.as_mapping())
                    {
                        deep_merge(existing_map, source_map);
                    }
                } else {
                    if existing.is_mapping() != value.is_mapping() {
                        log::warn!(
                            "overwriting `{}` with a value of a different shape",
                            key.as_str().unwrap_or("<non-string key>")
                        );
                    }
                    *existing = value.clone();
                }
            }
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
