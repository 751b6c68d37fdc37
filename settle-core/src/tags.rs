//! Tag reconciliation helpers

use std::collections::{BTreeMap, HashMap};

use crate::resource::Value;

pub type Tags = BTreeMap<String, String>;

/// Prefix of tags managed by AWS itself; never added or removed by us
const SYSTEM_TAG_PREFIX: &str = "aws:";

/// Provider default tags overlaid with the resource's own tags
pub fn merge_default_tags(defaults: &Tags, tags: &Tags) -> Tags {
    let mut merged = defaults.clone();
    merged.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Drop tags with the reserved `aws:` prefix
pub fn without_system_tags(tags: Tags) -> Tags {
    tags.into_iter()
        .filter(|(k, _)| !k.starts_with(SYSTEM_TAG_PREFIX))
        .collect()
}

/// Changes needed to turn one tag set into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub to_add: Tags,
    pub to_remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff_tags(old: &Tags, new: &Tags) -> TagDiff {
    let to_add = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .filter(|(k, _)| !k.starts_with(SYSTEM_TAG_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let to_remove = old
        .keys()
        .filter(|k| !new.contains_key(*k) && !k.starts_with(SYSTEM_TAG_PREFIX))
        .cloned()
        .collect();

    TagDiff { to_add, to_remove }
}

/// Read a `tags` attribute; non-string values are ignored
pub fn tags_from_value(value: Option<&Value>) -> Tags {
    value
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn tags_to_value(tags: &Tags) -> Value {
    Value::Map(
        tags.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<HashMap<_, _>>(),
    )
}
