/*!
# Data collection

Reporters are declared in the `reports` section of the settings or added in
code:

```json
{
  "reports": {
    "model": {"n_sheep": "n_sheep"},
    "agents": {"Sheep": {"energy": "energy"}},
    "final": {"survivors": "n_sheep"}
  }
}
```

A reporter given as a string reads the attribute of that name: a model
variable for model and final reporters, the actor's (or its cell's)
attribute for agent reporters. Missing attributes are recorded as null.

Model reporters produce one value per collected tick. Agent reporters
produce one row per living actor of the breed per tick, carrying the
`AgentID`, `Step` and `Time` of the row. Final reporters are evaluated
once, when the run ends.
 */

use crate::actor::{ActorId, Target};
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::settings::Settings;
use crate::value::Value;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use rayon::prelude::*;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, Connection};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, warn};

pub type ModelFn = Box<dyn Fn(&MainModel) -> Result<Value> + Send + Sync>;
pub type AgentFn = Box<dyn Fn(&MainModel, ActorId) -> Result<Value> + Send + Sync>;

pub enum Reporter {
    Attr(String),
    Func(ModelFn),
}

impl Reporter {
    pub fn attr(name: &str) -> Reporter {
        Reporter::Attr(name.to_string())
    }

    pub fn func<F>(f: F) -> Reporter
    where
        F: Fn(&MainModel) -> Result<Value> + Send + Sync + 'static,
    {
        Reporter::Func(Box::new(f))
    }

    fn report(&self, model: &MainModel) -> Result<Value> {
        match self {
            Reporter::Attr(name) => Ok(model.attribute(name)),
            Reporter::Func(f) => f(model),
        }
    }
}

pub enum AgentReporter {
    Attr(String),
    Func(AgentFn),
}

impl AgentReporter {
    pub fn attr(name: &str) -> AgentReporter {
        AgentReporter::Attr(name.to_string())
    }

    pub fn func<F>(f: F) -> AgentReporter
    where
        F: Fn(&MainModel, ActorId) -> Result<Value> + Send + Sync + 'static,
    {
        AgentReporter::Func(Box::new(f))
    }

    fn report(&self, model: &MainModel, id: ActorId) -> Result<Value> {
        match self {
            AgentReporter::Attr(name) => Ok(model
                .get(id, name, Target::Auto)
                .ok()
                .flatten()
                .unwrap_or(Value::Null)),
            AgentReporter::Func(f) => f(model, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(rename = "AgentID")]
    pub agent_id: ActorId,
    #[serde(rename = "Step")]
    pub step: u64,
    #[serde(rename = "Time")]
    pub time: NaiveDateTime,
    pub values: BTreeMap<String, Value>,
}

/// Everything collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    pub model_vars: BTreeMap<String, Vec<Value>>,
    /// The tick of every entry of `model_vars`.
    pub model_ticks: BTreeMap<String, Vec<u64>>,
    pub agent_vars: BTreeMap<String, Vec<AgentRecord>>,
}

#[derive(Default)]
pub struct DataCollector {
    model_reporters: BTreeMap<String, Reporter>,
    agent_reporters: BTreeMap<String, BTreeMap<String, AgentReporter>>,
    final_reporters: BTreeMap<String, Reporter>,
    records: Records,
}

fn attr_names(section: Option<&serde_json::Value>, what: &str) -> Result<Vec<(String, String)>> {
    let section = match section {
        None => return Ok(Vec::new()),
        Some(s) => s.as_object().ok_or_else(|| {
            AbsesError::Params(format!("Reporters of '{}' must be a mapping.", what))
        })?,
    };
    section
        .iter()
        .map(|(name, attr)| match attr.as_str() {
            Some(attr) => Ok((name.clone(), attr.to_string())),
            None => Err(AbsesError::Params(format!(
                "Reporter '{}' of '{}' must name an attribute, got {}.",
                name, what, attr
            ))),
        })
        .collect()
}

impl DataCollector {
    /// Reporters declared in `settings["reports"]`.
    pub fn from_settings(settings: &Settings) -> Result<DataCollector> {
        let mut dc = DataCollector::default();
        for (name, attr) in attr_names(settings.get("reports.model"), "model")? {
            dc.add_model_reporter(&name, Reporter::Attr(attr));
        }
        for (name, attr) in attr_names(settings.get("reports.final"), "final")? {
            dc.add_final_reporter(&name, Reporter::Attr(attr));
        }
        if let Some(agents) = settings.get("reports.agents") {
            let breeds = agents.as_object().ok_or_else(|| {
                AbsesError::Params("Reporters of 'agents' must be a mapping of breeds.".to_string())
            })?;
            for (breed, reporters) in breeds {
                for (name, attr) in attr_names(Some(reporters), breed)? {
                    dc.add_agent_reporter(breed, &name, AgentReporter::Attr(attr));
                }
            }
        }
        Ok(dc)
    }

    pub fn add_model_reporter(&mut self, name: &str, reporter: Reporter) {
        self.model_reporters.insert(name.to_string(), reporter);
        self.records.model_vars.entry(name.to_string()).or_default();
        self.records.model_ticks.entry(name.to_string()).or_default();
    }

    pub fn add_agent_reporter(&mut self, breed: &str, name: &str, reporter: AgentReporter) {
        self.agent_reporters
            .entry(breed.to_string())
            .or_default()
            .insert(name.to_string(), reporter);
    }

    pub fn add_final_reporter(&mut self, name: &str, reporter: Reporter) {
        self.final_reporters.insert(name.to_string(), reporter);
    }

    pub fn model_reporters(&self) -> Vec<&str> {
        self.model_reporters.keys().map(String::as_str).collect()
    }

    pub fn agent_reporters(&self) -> Vec<&str> {
        self.agent_reporters.keys().map(String::as_str).collect()
    }

    /// Record the current state of `model`.
    pub fn collect(&mut self, model: &MainModel) -> Result<()> {
        let step = model.time.tick();
        for (name, reporter) in self.model_reporters.iter() {
            let value = reporter.report(model)?;
            self.records.model_vars.entry(name.clone()).or_default().push(value);
            self.records.model_ticks.entry(name.clone()).or_default().push(step);
        }
        if self.agent_reporters.is_empty() {
            return Ok(());
        }
        let time = model.time.dt();
        let collected: DashMap<String, Vec<AgentRecord>> = DashMap::new();
        self.agent_reporters
            .par_iter()
            .try_for_each(|(breed, reporters)| -> Result<()> {
                let ids = match model.agents.get(&[breed.as_str()]) {
                    Ok(ids) if !ids.is_empty() => ids,
                    _ => {
                        warn!(breed = %breed, tick = step, "no actors to report");
                        return Ok(());
                    }
                };
                let rows = ids
                    .as_slice()
                    .par_iter()
                    .map(|id| {
                        let values = reporters
                            .iter()
                            .map(|(name, r)| Ok((name.clone(), r.report(model, *id)?)))
                            .collect::<Result<BTreeMap<String, Value>>>()?;
                        Ok(AgentRecord {
                            agent_id: *id,
                            step,
                            time,
                            values,
                        })
                    })
                    .collect::<Result<Vec<AgentRecord>>>()?;
                collected.insert(breed.clone(), rows);
                Ok(())
            })?;
        for (breed, rows) in collected {
            debug!(breed = %breed, rows = rows.len(), "agents collected");
            self.records.agent_vars.entry(breed).or_default().extend(rows);
        }
        Ok(())
    }

    /// One column per model reporter, one entry per collected tick.
    pub fn get_model_vars(&self) -> &BTreeMap<String, Vec<Value>> {
        if self.model_reporters.is_empty() {
            warn!("No model reporters have been defined.");
        }
        &self.records.model_vars
    }

    pub fn get_agent_vars(&self, breed: &str) -> &[AgentRecord] {
        if self.agent_reporters.is_empty() {
            warn!("No agent reporters have been defined.");
        }
        self.records
            .agent_vars
            .get(breed)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_final_vars_report(&self, model: &MainModel) -> Result<BTreeMap<String, Value>> {
        if self.final_reporters.is_empty() {
            warn!("No final reporters have been defined.");
        }
        self.final_reporters
            .iter()
            .map(|(name, r)| Ok((name.clone(), r.report(model)?)))
            .collect()
    }

    /// The tick each value of [`get_model_vars`](Self::get_model_vars) was collected at.
    pub fn get_model_ticks(&self, name: &str) -> &[u64] {
        self.records
            .model_ticks
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, &self.records)?;
        Ok(())
    }

    /**
    Write the records to an SQLite database, in two long-format tables:
    `model_vars(step, name, value)` and
    `agent_vars(breed, agent_id, step, time, name, value)`.
     */
    pub fn to_sqlite<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut conn = Connection::open(path)?;
        let tx = conn.transaction()?;
        tx.execute_batch(concat!(
            "CREATE TABLE IF NOT EXISTS model_vars (step INTEGER, name TEXT, value);",
            "CREATE TABLE IF NOT EXISTS agent_vars ",
            "(breed TEXT, agent_id INTEGER, step INTEGER, time TEXT, name TEXT, value);",
        ))?;
        {
            let mut stmt = tx.prepare("INSERT INTO model_vars (step, name, value) VALUES (?, ?, ?)")?;
            for (name, values) in self.records.model_vars.iter() {
                let ticks = self.records.model_ticks.get(name).map_or(&[][..], Vec::as_slice);
                for (step, value) in ticks.iter().zip(values) {
                    stmt.execute(params![*step as i64, name, value])?;
                }
            }
            let mut stmt = tx.prepare(concat!(
                "INSERT INTO agent_vars (breed, agent_id, step, time, name, value) ",
                "VALUES (?, ?, ?, ?, ?, ?)"
            ))?;
            for (breed, rows) in self.records.agent_vars.iter() {
                for row in rows {
                    let time = row.time.to_string();
                    for (name, value) in row.values.iter() {
                        stmt.execute(params![
                            breed,
                            row.agent_id.0 as i64,
                            row.step as i64,
                            time,
                            name,
                            value
                        ])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        bincode::serialize_into(file, &self.records)?;
        Ok(())
    }

    pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Records> {
        let file = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(file)?)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(*b as i64)),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(x) => ToSqlOutput::Owned(SqlValue::Real(*x)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Breed};

    struct Sheep;

    impl Breed for Sheep {
        const NAME: &'static str = "Sheep";

        fn setup(actor: &mut Actor) {
            actor.set_own("energy", 4.);
        }
    }

    fn settings() -> Settings {
        Settings::from(serde_json::json!({
            "reports": {
                "model": {"n": "n_sheep"},
                "agents": {"Sheep": {"energy": "energy", "wool": "wool"}},
                "final": {"last": "n_sheep"}
            }
        }))
    }

    fn collected_model() -> MainModel {
        let mut model = MainModel::new(settings()).unwrap();
        model.new_actors::<Sheep>(3).unwrap();
        model.vars.insert("n_sheep".into(), Value::Int(3));
        let mut dc = std::mem::take(&mut model.datacollector);
        dc.collect(&model).unwrap();
        model.datacollector = dc;
        model
    }

    #[test]
    fn test_collect_from_settings() {
        let model = collected_model();
        let dc = &model.datacollector;
        assert_eq!(dc.get_model_vars()["n"], vec![Value::Int(3)]);
        let rows = dc.get_agent_vars("Sheep");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values["energy"], Value::Float(4.));
        assert_eq!(rows[0].values["wool"], Value::Null);
        assert!(dc.get_agent_vars("Wolf").is_empty());
        let last = dc.get_final_vars_report(&model).unwrap();
        assert_eq!(last["last"], Value::Int(3));
    }

    #[test]
    fn test_bad_reporter_settings() {
        let settings = Settings::from(serde_json::json!({"reports": {"model": {"n": 1}}}));
        assert!(DataCollector::from_settings(&settings).is_err());
    }

    #[test]
    fn test_exports() {
        let model = collected_model();
        let dir = tempfile::tempdir().unwrap();
        let dc = &model.datacollector;

        dc.save_binary(dir.path().join("records.bin")).unwrap();
        let loaded = DataCollector::load_binary(dir.path().join("records.bin")).unwrap();
        assert_eq!(&loaded, dc.records());

        dc.to_json(dir.path().join("records.json")).unwrap();
        let text = std::fs::read_to_string(dir.path().join("records.json")).unwrap();
        assert!(text.contains("AgentID"));

        let db = dir.path().join("records.sqlite");
        dc.to_sqlite(&db).unwrap();
        let conn = Connection::open(&db).unwrap();
        let n: i64 = conn
            .query_row("SELECT count(*) FROM agent_vars WHERE name = 'energy'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_model_rows_keep_their_ticks() {
        let mut model = collected_model();
        model.time.go(3).unwrap();
        model.collect().unwrap();
        assert_eq!(model.datacollector.get_model_ticks("n"), &[0, 3]);

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("records.sqlite");
        model.datacollector.to_sqlite(&db).unwrap();
        let conn = Connection::open(&db).unwrap();
        let mut stmt = conn
            .prepare("SELECT step FROM model_vars WHERE name = 'n' ORDER BY step")
            .unwrap();
        let steps: Vec<i64> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(steps, vec![0, 3]);
    }
}
