use std::collections::BTreeMap;

use super::Path;
use super::PathPattern;

/// Key bindings extracted by a successful match, e.g. `{name: "Ethernet1"}`
pub type KeyBindings = BTreeMap<String, String>;

/// Resolve a subscription pattern against a concrete update path.
///
/// Both sequences are walked segment by segment. A segment matches when the
/// names are identical and every key predicate of the pattern names a key
/// present on the concrete segment, with an equal value unless the predicate
/// is a wildcard. Keys the pattern does not mention are ignored.
///
/// Every key named by the pattern is bound to its concrete value. If a
/// deeper segment binds a key name that is already taken, it is stored as
/// `"<segment>/<key>"` so neither value is lost.
///
/// Returns `None` on length mismatch or on the first mismatching segment.
pub fn match_path(
    pattern: &PathPattern,
    concrete: &Path,
) -> Option<KeyBindings> {
    if pattern.len() != concrete.len() {
        return None;
    }

    let mut bindings = KeyBindings::new();
    for (p, c) in pattern.elems().iter().zip(concrete.elems()) {
        if p.name != c.name {
            return None;
        }
        for (key, expected) in &p.keys {
            let value = c.keys.get(key)?;
            if !expected.accepts(value) {
                return None;
            }
            if bindings.contains_key(key) {
                bindings.insert(format!("{}/{}", c.name, key), value.clone());
            } else {
                bindings.insert(key.clone(), value.clone());
            }
        }
    }
    Some(bindings)
}
