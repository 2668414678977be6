/*!
# Experiments

An experiment runs one model many times: once per combination of
overridden settings (a job) and, within each job, a number of repeats with
different seeds. Every run ends with the model's final report, which is
collected into one row per run.

Seeds are derived from the `exp.seed` setting so that an experiment is
reproducible as a whole: repeat `r` of job `j` uses `seed + j * r + r`.
Without a base seed every run draws its own.

```rust
# use abses::prelude::*;
# use abses::experiment::Experiment;
# use abses::datacollector::Reporter;
# use std::collections::BTreeMap;
let settings = Settings::from(serde_json::json!({"exp": {"seed": 10}}));
let mut exp = Experiment::new(settings, |settings| {
    let mut model = MainModel::new(settings.clone())?;
    model.datacollector.add_final_reporter("seed", Reporter::attr("seed"));
    Ok((model, Box::new(Idle) as Box<dyn Submodel>))
})
.steps(2);
let mut overrides = BTreeMap::new();
overrides.insert("model.density".to_string(), vec![0.1.into(), 0.2.into()]);
exp.batch_run(3, 1, &overrides).unwrap();
assert_eq!(exp.results().len(), 6);
assert_eq!(exp.results()[4].seed, Some(10 + 1 * 2 + 2));
```
 */

use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::modules::Submodel;
use crate::settings::Settings;
use crate::value::Value;
use itertools::Itertools;
use rayon::prelude::*;
use serde_derive::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

pub type Factory =
    Box<dyn Fn(&Settings) -> Result<(MainModel, Box<dyn Submodel>)> + Send + Sync>;

/// Called with the finished model, the job id and the repeat id.
pub type Hook = Box<dyn Fn(&MainModel, usize, u64) + Send + Sync>;

/// One finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub job_id: usize,
    pub repeat_id: u64,
    pub seed: Option<u64>,
    pub overrides: BTreeMap<String, Json>,
    pub report: BTreeMap<String, Value>,
}

pub struct Experiment {
    settings: Settings,
    factory: Factory,
    base_seed: Option<u64>,
    steps: Option<u64>,
    hooks: Vec<Hook>,
    next_job: usize,
    results: Vec<ExperimentResult>,
}

impl Experiment {
    pub fn new<F>(settings: Settings, factory: F) -> Experiment
    where
        F: Fn(&Settings) -> Result<(MainModel, Box<dyn Submodel>)> + Send + Sync + 'static,
    {
        let params = settings.params("exp");
        let base_seed = params.get("seed").and_then(Json::as_u64);
        let steps = params.get("steps").and_then(Json::as_u64);
        Experiment {
            settings,
            factory: Box::new(factory),
            base_seed,
            steps,
            hooks: Vec::new(),
            next_job: 0,
            results: Vec::new(),
        }
    }

    /// Number of ticks of every run. Without it, runs end with their time
    /// driver.
    pub fn steps(mut self, steps: u64) -> Experiment {
        self.steps = Some(steps);
        self
    }

    pub fn add_hook<F>(&mut self, hook: F)
    where
        F: Fn(&MainModel, usize, u64) + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    fn seed(&self, job_id: usize, repeat_id: u64) -> Option<u64> {
        self.base_seed
            .map(|s| s + job_id as u64 * repeat_id + repeat_id)
    }

    fn run_single(
        &self,
        settings: &Settings,
        overrides: &BTreeMap<String, Json>,
        job_id: usize,
        repeat_id: u64,
    ) -> Result<ExperimentResult> {
        let seed = self.seed(job_id, repeat_id);
        let mut settings = settings.clone();
        if let Some(s) = seed {
            settings.set("model.seed", Json::from(s));
        }
        let (model, mut submodel) = (self.factory)(&settings)?;
        let mut model = model.with_run_id(repeat_id);
        let report = model.run_model(submodel.as_mut(), self.steps)?;
        for hook in self.hooks.iter() {
            hook(&model, job_id, repeat_id);
        }
        Ok(ExperimentResult {
            job_id,
            repeat_id,
            seed,
            overrides: overrides.clone(),
            report,
        })
    }

    fn run_job(
        &self,
        overrides: &BTreeMap<String, Json>,
        job_id: usize,
        repeats: u64,
        parallels: usize,
    ) -> Result<Vec<ExperimentResult>> {
        let mut settings = self.settings.clone();
        for (key, value) in overrides.iter() {
            settings.set(key, value.clone());
        }
        info!(job_id, repeats, parallels, overrides = ?overrides, "job started");
        if parallels <= 1 || repeats <= 1 {
            return (1..=repeats)
                .map(|r| self.run_single(&settings, overrides, job_id, r))
                .collect();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallels.min(repeats as usize))
            .build()
            .map_err(|e| AbsesError::Params(e.to_string()))?;
        pool.install(|| {
            (1..=repeats)
                .into_par_iter()
                .map(|r| self.run_single(&settings, overrides, job_id, r))
                .collect()
        })
    }

    /**
    Run every combination of `overrides` (dotted settings keys mapped to
    the values to try) `repeats` times, using up to `parallels` threads
    per job. Job ids keep counting across calls.
     */
    pub fn batch_run(
        &mut self,
        repeats: u64,
        parallels: usize,
        overrides: &BTreeMap<String, Vec<Json>>,
    ) -> Result<()> {
        let configs: Vec<BTreeMap<String, Json>> = if overrides.is_empty() {
            vec![BTreeMap::new()]
        } else {
            overrides
                .values()
                .map(|values| values.iter().cloned())
                .multi_cartesian_product()
                .map(|combination| overrides.keys().cloned().zip(combination).collect())
                .collect()
        };
        for config in configs.iter() {
            let job_id = self.next_job;
            let mut rows = self.run_job(config, job_id, repeats, parallels)?;
            rows.sort_by_key(|r| r.repeat_id);
            self.results.extend(rows);
            self.next_job += 1;
        }
        Ok(())
    }

    pub fn results(&self) -> &[ExperimentResult] {
        &self.results
    }

    /// One flat row per run: ids, seed, overrides and final report.
    pub fn summary(&self) -> Vec<BTreeMap<String, Value>> {
        self.results
            .iter()
            .map(|r| {
                let mut row = BTreeMap::new();
                row.insert("job_id".to_string(), Value::from(r.job_id));
                row.insert("repeat_id".to_string(), Value::from(r.repeat_id));
                row.insert("seed".to_string(), r.seed.map_or(Value::Null, Value::from));
                for (k, v) in r.overrides.iter() {
                    row.insert(k.clone(), Value::from_json(v));
                }
                for (k, v) in r.report.iter() {
                    row.insert(k.clone(), v.clone());
                }
                row
            })
            .collect()
    }

    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.results)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datacollector::Reporter;
    use crate::modules::Idle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn factory(settings: &Settings) -> Result<(MainModel, Box<dyn Submodel>)> {
        let mut model = MainModel::new(settings.clone())?;
        model
            .datacollector
            .add_final_reporter("seed", Reporter::attr("seed"));
        model
            .datacollector
            .add_final_reporter("tick", Reporter::attr("tick"));
        Ok((model, Box::new(Idle)))
    }

    #[test]
    fn test_seeds_and_jobs() {
        let settings = Settings::from(serde_json::json!({"exp": {"seed": 1, "steps": 3}}));
        let mut exp = Experiment::new(settings, factory);
        let mut overrides = BTreeMap::new();
        overrides.insert("a.x".to_string(), vec![Json::from(1), Json::from(2)]);
        overrides.insert("b.y".to_string(), vec![Json::from("u"), Json::from("v")]);
        exp.batch_run(2, 2, &overrides).unwrap();
        assert_eq!(exp.results().len(), 8);
        for r in exp.results() {
            let expected = 1 + r.job_id as u64 * r.repeat_id + r.repeat_id;
            assert_eq!(r.seed, Some(expected));
            assert_eq!(r.report["seed"], Value::from(expected));
            assert_eq!(r.report["tick"], Value::from(3u64));
        }
        assert_eq!(exp.results()[0].overrides["a.x"], Json::from(1));
        assert_eq!(exp.results()[0].overrides["b.y"], Json::from("u"));
        assert_eq!(exp.summary()[7]["job_id"], Value::from(3usize));
    }

    #[test]
    fn test_hooks_run_after_each_model() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut exp = Experiment::new(Settings::default(), factory).steps(1);
        exp.add_hook(move |model, _, _| {
            assert_eq!(model.time.tick(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        exp.batch_run(3, 1, &BTreeMap::new()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(exp.results()[2].seed, None);
    }
}
