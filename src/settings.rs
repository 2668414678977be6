/*!
Configuration tree.

All parameters of a model run live in one JSON object. Every component of
the model reads the section named after itself: a module called `farmers`
finds its parameters under `settings["farmers"]`, the main model under
`settings["model"]` and the time driver under `settings["time"]`.

```rust
# use abses::settings::Settings;
let settings = Settings::from(serde_json::json!({
    "model": {"density": 0.6},
    "time": {"start": "2000", "years": 1},
}));
assert_eq!(settings.params("model").get_f64("density").unwrap(), Some(0.6));
assert_eq!(settings.get("time.start").and_then(|v| v.as_str()), Some("2000"));
```
 */

use crate::error::{AbsesError, Result};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    tree: Json,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tree: Json::Object(Map::new()),
        }
    }
}

impl From<Json> for Settings {
    fn from(tree: Json) -> Self {
        match tree {
            Json::Object(_) => Settings { tree },
            _ => Settings::default(),
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let file = File::open(path)?;
        let tree: Json = serde_json::from_reader(BufReader::new(file))?;
        match tree {
            Json::Object(_) => Ok(Settings { tree }),
            other => Err(AbsesError::Type(format!(
                "Settings must be a JSON object, got {}.",
                other
            ))),
        }
    }

    pub fn tree(&self) -> &Json {
        &self.tree
    }

    /// Look up a dotted path such as `model.shape`.
    pub fn get(&self, dotted: &str) -> Option<&Json> {
        dotted
            .split('.')
            .try_fold(&self.tree, |node, key| node.as_object()?.get(key))
    }

    /// Set a dotted path, creating intermediate sections as needed.
    pub fn set(&mut self, dotted: &str, value: Json) {
        let keys: Vec<&str> = dotted.split('.').collect();
        set_path(&mut self.tree, &keys, value);
    }

    /// The section belonging to the component `name`, empty if absent.
    pub fn params(&self, name: &str) -> Params {
        match self.tree.get(name) {
            Some(Json::Object(map)) => Params { map: map.clone() },
            _ => Params::default(),
        }
    }
}

/// The parameters of a single component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    map: Map<String, Json>,
}

impl From<Map<String, Json>> for Params {
    fn from(map: Map<String, Json>) -> Self {
        Params { map }
    }
}

impl Params {
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.map
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| wrong_type(key, "a number", v)),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| wrong_type(key, "an integer", v)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => v.as_bool().map(Some).ok_or_else(|| wrong_type(key, "a boolean", v)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| wrong_type(key, "a string", v)),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<Option<&Vec<Json>>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => v.as_array().map(Some).ok_or_else(|| wrong_type(key, "an array", v)),
        }
    }

    /// A `[height, width]` pair of positive integers.
    pub fn get_shape(&self, key: &str) -> Result<Option<(usize, usize)>> {
        let arr = match self.get_array(key)? {
            None => return Ok(None),
            Some(a) => a,
        };
        match arr.as_slice() {
            [h, w] => match (h.as_u64(), w.as_u64()) {
                (Some(h), Some(w)) if h > 0 && w > 0 => Ok(Some((h as usize, w as usize))),
                _ => Err(wrong_type(key, "two positive integers", &Json::Array(arr.clone()))),
            },
            _ => Err(wrong_type(key, "two positive integers", &Json::Array(arr.clone()))),
        }
    }

    /// Fail on the first of `args` that is not set.
    pub fn require(&self, args: &[&str]) -> Result<()> {
        match args.iter().find(|arg| !self.map.contains_key(**arg)) {
            Some(arg) => Err(AbsesError::Params(format!("Argument {} not found.", arg))),
            None => Ok(()),
        }
    }
}

fn set_path(node: &mut Json, keys: &[&str], value: Json) {
    if !node.is_object() {
        *node = Json::Object(Map::new());
    }
    if let Json::Object(map) = node {
        match keys {
            [] => {}
            [last] => {
                map.insert(last.to_string(), value);
            }
            [first, rest @ ..] => {
                let child = map.entry(first.to_string()).or_insert(Json::Null);
                set_path(child, rest, value);
            }
        }
    }
}

fn wrong_type(key: &str, expected: &str, got: &Json) -> AbsesError {
    AbsesError::Type(format!("'{}' must be {}, got {}.", key, expected, got))
}

/**
Check that `name` can be used to name a component.

Names are lower-case identifiers, because they double as keys into the
settings tree.

```rust
# use abses::settings::validate_name;
assert!(validate_name("farmers").is_ok());
assert!(validate_name("_hidden").is_err());
assert!(validate_name("Farmers").is_err());
assert!(validate_name("two words").is_err());
```
 */
pub fn validate_name(name: &str) -> Result<()> {
    let first = match name.chars().next() {
        None => return Err(AbsesError::Params("Name cannot be empty.".to_string())),
        Some(c) => c,
    };
    if first == '_' {
        return Err(AbsesError::Params(format!(
            "Name '{}' cannot start with an underscore.",
            name
        )));
    }
    if first.is_uppercase() || first.is_ascii_digit() {
        return Err(AbsesError::Params(format!(
            "Name '{}' must start with a lower-case letter.",
            name
        )));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(AbsesError::Params(format!(
            "Name '{}' is not a valid identifier.",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_reports_first_missing() {
        let s = Settings::from(json!({"farmers": {"a": 1}}));
        let p = s.params("farmers");
        assert!(p.require(&["a"]).is_ok());
        let err = p.require(&["a", "b", "c"]).unwrap_err();
        assert_eq!(err.to_string(), "Argument b not found.");
    }

    #[test]
    fn test_set_dotted_creates_sections() {
        let mut s = Settings::default();
        s.set("model.density", json!(0.4));
        s.set("time.start", json!("2000"));
        assert_eq!(s.get("model.density"), Some(&json!(0.4)));
        assert_eq!(s.params("time").get_str("start").unwrap(), Some("2000"));
        assert!(s.params("nothing").is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let s = Settings::from(json!({"model": {"shape": [3, 4], "n": "x"}}));
        let p = s.params("model");
        assert_eq!(p.get_shape("shape").unwrap(), Some((3, 4)));
        assert!(matches!(p.get_i64("n"), Err(AbsesError::Type(_))));
        assert_eq!(p.get_i64("missing").unwrap(), None);
    }
}
