//! Attribute name decomposition.
//!
//! Attribute names carry an optional bracketed tag suffix:
//!
//! ```text
//! router.responses[component=app,dea_index=7,status=3xx]
//! system.cpu.user
//! ```
//!
//! Parsing is total: every input yields an [`AttributeDescriptor`]. Tag tokens
//! that are not a single `key=value` pair are dropped and the rest still parse.

use std::collections::BTreeMap;

/// Base metric name plus the tags found in its bracket suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeDescriptor {
    pub base: String,
    pub tags: BTreeMap<String, String>,
}

impl AttributeDescriptor {
    /// Parse an attribute name. Never fails.
    pub fn parse(attribute_name: &str) -> Self {
        let Some((base, tag_list)) = split_bracket_suffix(attribute_name) else {
            return Self {
                base: attribute_name.to_string(),
                tags: BTreeMap::new(),
            };
        };

        Self {
            base: base.to_string(),
            tags: parse_tag_list(tag_list),
        }
    }

    /// Tag keys that also name one of `reserved`.
    pub fn shadowed_keys<'a>(&'a self, reserved: &'a [&str]) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .keys()
            .map(String::as_str)
            .filter(move |k| reserved.contains(k))
    }
}

/// Split `base[list]` into `(base, list)`.
///
/// The bracket group must close the string. The base is the shortest prefix
/// before the first `[` that starts such a group, so `a[x][y]` yields base `a`
/// and list `x][y`.
fn split_bracket_suffix(name: &str) -> Option<(&str, &str)> {
    let inner = name.strip_suffix(']')?;
    let open = inner.find('[')?;
    Some((&inner[..open], &inner[open + 1..]))
}

fn parse_tag_list(list: &str) -> BTreeMap<String, String> {
    list.split(',').filter_map(parse_tag).collect()
}

/// `key=value` with exactly one `=` and a non-empty value. The key may be
/// empty (`=v`).
fn parse_tag(token: &str) -> Option<(String, String)> {
    let (key, value) = token.split_once('=')?;
    if value.is_empty() || value.contains('=') {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}
