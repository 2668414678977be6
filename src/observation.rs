/*!
# Observation

How a run reports on itself: a log line every `log_every` ticks and a JSON
snapshot of the model state every `store_every` ticks. Both periods and the
snapshot file name come from the `observation` section of the settings and
can be overridden from the command line. A period of 0 switches the
corresponding output off.
 */

use crate::actor::ActorId;
use crate::error::Result;
use crate::model::MainModel;
use crate::settings;
use crate::value::Value;
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_every: u64,
    pub store_every: u64,
    pub statefile: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_every: 1,
            store_every: 0,
            statefile: "state.json".to_string(),
        }
    }
}

impl Settings {
    pub fn from_settings(settings: &settings::Settings) -> Result<Settings> {
        let params = settings.params("observation");
        let default = Settings::default();
        Ok(Settings {
            log_every: params
                .get_i64("log_every")?
                .map_or(default.log_every, |n| n.max(0) as u64),
            store_every: params
                .get_i64("store_every")?
                .map_or(default.store_every, |n| n.max(0) as u64),
            statefile: params
                .get_str("statefile")?
                .map_or(default.statefile, String::from),
        })
    }
}

/// Install a global `tracing` subscriber. `RUST_LOG` wins over `level`.
/// Calling it more than once is harmless.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Serialize)]
struct ActorSnapshot<'a> {
    id: ActorId,
    breed: &'a str,
    at: Option<(usize, usize, usize)>,
    attributes: BTreeMap<&'a str, &'a Value>,
}

#[derive(Serialize)]
struct LayerSnapshot<'a> {
    id: usize,
    name: &'a str,
    shape: (usize, usize),
    resolution: f64,
    mask: Vec<bool>,
    /// One row-major value per cell and attribute, `null` where unset.
    attributes: BTreeMap<String, Vec<Option<&'a Value>>>,
}

/// What gets written to the state file.
#[derive(Serialize)]
struct Snapshot<'a> {
    name: &'a str,
    version: &'a str,
    seed: u64,
    tick: u64,
    time: String,
    vars: BTreeMap<&'a str, &'a Value>,
    actors: Vec<ActorSnapshot<'a>>,
    layers: Vec<LayerSnapshot<'a>>,
    links: BTreeMap<String, Vec<(String, String)>>,
}

fn snapshot(model: &MainModel) -> Snapshot<'_> {
    let actors = model
        .agents
        .iter()
        .map(|a| ActorSnapshot {
            id: a.unique_id(),
            breed: a.breed(),
            at: a.at().map(|c| (c.layer, c.row, c.col)),
            attributes: a.attrs.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        })
        .collect();
    let layers = model
        .nature
        .layers()
        .iter()
        .map(|layer| LayerSnapshot {
            id: layer.id(),
            name: layer.name(),
            shape: layer.shape2d(),
            resolution: layer.resolution(),
            mask: layer.mask().iter().by_vals().collect(),
            attributes: layer
                .attributes()
                .into_iter()
                .map(|attr| {
                    let values = layer.cells().map(|c| c.attrs.get(&attr)).collect();
                    (attr, values)
                })
                .collect(),
        })
        .collect();
    let links = model
        .human
        .links
        .snapshot()
        .into_iter()
        .map(|(name, edges)| {
            let edges = edges
                .into_iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect();
            (name, edges)
        })
        .collect();
    Snapshot {
        name: model.name(),
        version: model.version(),
        seed: model.seed(),
        tick: model.time.tick(),
        time: model.time.to_string(),
        vars: model.vars.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        actors,
        layers,
        links,
    }
}

/// Write the current state of the model as pretty-printed JSON.
pub fn store_state<P: AsRef<Path>>(model: &MainModel, statefile: P) -> Result<()> {
    let file = File::create(statefile)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &snapshot(model))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{BaseActor, Target};

    #[test]
    fn test_settings_from_section() {
        let s = settings::Settings::from(serde_json::json!({
            "observation": {"store_every": 5, "statefile": "out.json"}
        }));
        let o = Settings::from_settings(&s).unwrap();
        assert_eq!(o.log_every, 1);
        assert_eq!(o.store_every, 5);
        assert_eq!(o.statefile, "out.json");
    }

    #[test]
    fn test_store_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut model = MainModel::new(settings::Settings::default()).unwrap();
        let ids = model.new_actors::<BaseActor>(2).unwrap();
        model.set(ids.as_slice()[0], "wealth", 3, Target::Me, true).unwrap();
        store_state(&model, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(json["actors"].as_array().unwrap().len(), 2);
        assert_eq!(json["actors"][0]["attributes"]["wealth"], serde_json::json!({"Int": 3}));
        assert_eq!(json["tick"], 0);
        assert_eq!(json["layers"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_store_state_with_layers() {
        use crate::nature::LayerSpec;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut model = MainModel::new(settings::Settings::default()).unwrap();
        let id = model.create_layer(LayerSpec::from_resolution("field", (2, 2))).unwrap();
        let layer = model.nature.layer_mut(id).unwrap();
        layer.set_mask(&[true, true, false, true]).unwrap();
        layer
            .apply_values("soil", vec![Value::from("clay"), Value::from(2), Value::from(3), Value::from(4)])
            .unwrap();
        store_state(&model, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        let field = &json["layers"][0];
        assert_eq!(field["name"], "field");
        assert_eq!(field["shape"], serde_json::json!([2, 2]));
        assert_eq!(field["mask"], serde_json::json!([true, true, false, true]));
        assert_eq!(field["attributes"]["soil"][0], serde_json::json!({"Text": "clay"}));
        assert_eq!(field["attributes"]["soil"][3], serde_json::json!({"Int": 4}));
    }
}
