/*!
# The main model

A [`MainModel`] owns everything a simulation consists of: the settings, the
actors, the nature and human branches, the time driver, the data collector,
the model variables and a seeded random number generator.

Behavior is supplied as [`Submodel`]s: one for the model itself, passed to
[`MainModel::run_model`], and optionally one for nature, one for human, one
per layer and one per human module. A run goes through three phases.

1. Setup: the model's hook, then nature's, then human's. All components
   become `ready`.
2. Steps, repeated while the model is running: the clock advances one tick,
   dynamic variables are refreshed, the model, nature and human step (each
   branch before its own sub-modules, closed modules skipped), global
   variables are sent to observers and the data collector records.
3. End: nature, human, then the model. All components become `complete`
   and the final report is logged.

The loop stops at the requested number of ticks, when the time driver
reaches its end, or when a hook sets `running` to false.

```rust
# use abses::prelude::*;
struct Counter;

impl Submodel for Counter {
    fn step(&mut self, model: &mut MainModel) -> Result<()> {
        let n = model.attribute("n").as_i64().unwrap_or(0);
        model.vars.insert("n".into(), Value::Int(n + 1));
        Ok(())
    }
}

let mut model = MainModel::new(Settings::default()).unwrap();
model.run_model(&mut Counter, Some(5)).unwrap();
assert_eq!(model.attribute("n"), Value::Int(5));
assert_eq!(model.to_string(), format!("<main_model-{}(complete)>", model.version()));
```
 */

use crate::container::AgentsContainer;
use crate::datacollector::DataCollector;
use crate::error::{AbsesError, Result};
use crate::human::BaseHuman;
use crate::modules::{Phase, Submodel};
use crate::nature::BaseNature;
use crate::notice::Notice;
use crate::observation;
use crate::settings::{Params, Settings};
use crate::states::{State, States};
use crate::time::TimeDriver;
use crate::value::{Attributes, Value};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct MainModel {
    name: String,
    version: String,
    pub settings: Settings,
    run_id: Option<u64>,
    outpath: PathBuf,
    states: States,
    seed: u64,
    pub agents: AgentsContainer,
    pub nature: BaseNature,
    pub human: BaseHuman,
    pub time: TimeDriver,
    pub datacollector: DataCollector,
    /// Model variables, readable by reporters and shareable as global
    /// variables.
    pub vars: Attributes,
    pub(crate) notice: Notice,
    pub rng: StdRng,
    pub running: bool,
    pub observation: observation::Settings,
}

impl MainModel {
    /**
    Build a model from its settings. The `model` section may set `name`,
    `version`, `seed`, `max_agents` and `outpath`; the `time` section
    configures the clock and `reports` the data collector.
     */
    pub fn new(settings: Settings) -> Result<MainModel> {
        let params = settings.params("model");
        let name = params.get_str("name")?.unwrap_or("main_model").to_string();
        let version = params
            .get_str("version")?
            .map(String::from)
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let seed = match params.get_i64("seed")? {
            Some(s) if s >= 0 => s as u64,
            Some(s) => {
                return Err(AbsesError::Params(format!(
                    "Seed must be non-negative, got {}.",
                    s
                )))
            }
            None => rand::random(),
        };
        let max_agents = match params.get_i64("max_agents")? {
            Some(n) if n >= 0 => Some(n as usize),
            Some(n) => {
                return Err(AbsesError::Params(format!(
                    "max_agents must be non-negative, got {}.",
                    n
                )))
            }
            None => None,
        };
        let outpath = PathBuf::from(params.get_str("outpath")?.unwrap_or("."));
        let mut model = MainModel {
            name,
            version,
            run_id: None,
            outpath,
            states: States::default(),
            seed,
            agents: AgentsContainer::new(max_agents),
            nature: BaseNature::new(&settings)?,
            human: BaseHuman::new(&settings)?,
            time: TimeDriver::from_params(&settings.params("time"))?,
            datacollector: DataCollector::from_settings(&settings)?,
            vars: Attributes::default(),
            notice: Notice::default(),
            rng: StdRng::seed_from_u64(seed),
            running: true,
            observation: observation::Settings::from_settings(&settings)?,
            settings,
        };
        model.set_states(State::Init)?;
        debug!(model = %model.name, seed, "model initialized");
        Ok(model)
    }

    /// Reseed the generator, as done for the repeats of an experiment.
    pub fn with_seed(mut self, seed: u64) -> MainModel {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_run_id(mut self, run_id: u64) -> MainModel {
        self.run_id = Some(run_id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run_id(&self) -> Option<u64> {
        self.run_id
    }

    pub fn outpath(&self) -> &Path {
        &self.outpath
    }

    pub fn set_outpath<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(AbsesError::Params(format!(
                "Invalid output path {}.",
                path.display()
            )));
        }
        self.outpath = path.to_path_buf();
        Ok(())
    }

    pub fn state(&self) -> State {
        self.states.state()
    }

    /// The `model` section of the settings.
    pub fn params(&self) -> Params {
        self.settings.params("model")
    }

    /// The `datasets` section of the settings: names of input files.
    pub fn datasets(&self) -> Params {
        self.settings.params("datasets")
    }

    /**
    A model attribute as seen by reporters: a model variable, or one of
    `tick`, `name`, `seed` and `num_agents`. Unknown names are null.
     */
    pub fn attribute(&self, name: &str) -> Value {
        if let Some(v) = self.vars.get(name) {
            return v.clone();
        }
        match name {
            "tick" => Value::from(self.time.tick()),
            "name" => Value::from(self.name.as_str()),
            "seed" => Value::from(self.seed),
            "num_agents" => Value::from(self.agents.len()),
            _ => Value::Null,
        }
    }

    /// Install the behavior of the nature branch.
    pub fn set_nature<S: Submodel + 'static>(&mut self, submodel: S) -> Result<()> {
        let mut submodel: Box<dyn Submodel> = Box::new(submodel);
        let result = submodel.initialize(self);
        self.nature.submodel = Some(submodel);
        result
    }

    /// Install the behavior of the human branch.
    pub fn set_human<S: Submodel + 'static>(&mut self, submodel: S) -> Result<()> {
        let mut submodel: Box<dyn Submodel> = Box::new(submodel);
        let result = submodel.initialize(self);
        self.human.submodel = Some(submodel);
        result
    }

    fn set_states(&mut self, state: State) -> Result<()> {
        let code = state.code();
        self.states.set_state(code)?;
        self.nature.info.set_state(code)?;
        for layer in self.nature.layers_mut() {
            if layer.info.state() < state {
                layer.info.set_state(code)?;
            }
        }
        self.human.info.set_state(code)?;
        for m in self.human.modules_mut() {
            if m.info.state() < state {
                m.info.set_state(code)?;
            }
        }
        Ok(())
    }

    fn run_nature(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Step && !self.nature.info.opening() {
            return Ok(());
        }
        if let Some(mut submodel) = self.nature.submodel.take() {
            let result = phase.call(submodel.as_mut(), self);
            self.nature.submodel = Some(submodel);
            result?;
        }
        for i in 0..self.nature.layers().len() {
            let layer = &mut self.nature.layers_mut()[i];
            if phase == Phase::Step && !layer.info.opening() {
                continue;
            }
            if let Some(mut submodel) = layer.submodel.take() {
                let result = phase.call(submodel.as_mut(), self);
                self.nature.layers_mut()[i].submodel = Some(submodel);
                result?;
            }
        }
        Ok(())
    }

    fn run_human(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Step && !self.human.info.opening() {
            return Ok(());
        }
        if let Some(mut submodel) = self.human.submodel.take() {
            let result = phase.call(submodel.as_mut(), self);
            self.human.submodel = Some(submodel);
            result?;
        }
        for i in 0..self.human.modules().len() {
            let module = &mut self.human.modules_mut()[i];
            if phase == Phase::Step && !module.info.opening() {
                continue;
            }
            if let Some(mut submodel) = module.submodel.take() {
                let result = phase.call(submodel.as_mut(), self);
                self.human.modules_mut()[i].submodel = Some(submodel);
                result?;
            }
        }
        Ok(())
    }

    pub fn setup(&mut self, submodel: &mut dyn Submodel) -> Result<()> {
        submodel.setup(self)?;
        self.run_nature(Phase::Setup)?;
        self.run_human(Phase::Setup)?;
        self.set_states(State::Ready)?;
        self.log_creations();
        info!(
            model = %self,
            seed = self.seed,
            outpath = %self.outpath.display(),
            "setup done\nNature:\n{}Human:\n{}",
            self.nature.modules_summary(),
            self.human.modules_summary()
        );
        Ok(())
    }

    /// Advance one tick and let everything step.
    pub fn step_once(&mut self, submodel: &mut dyn Submodel) -> Result<()> {
        self.time.go(1)?;
        self.nature.update_dynamic(&self.time)?;
        submodel.step(self)?;
        self.run_nature(Phase::Step)?;
        self.run_human(Phase::Step)?;
        self.notify();
        self.collect()?;
        self.log_creations();
        self.observe()
    }

    /// Record the current state with the data collector.
    pub fn collect(&mut self) -> Result<()> {
        let mut dc = std::mem::take(&mut self.datacollector);
        let result = dc.collect(self);
        self.datacollector = dc;
        result
    }

    fn log_creations(&mut self) {
        for (breed, n) in self.agents.take_created() {
            info!(tick = self.time.tick(), breed = %breed, n, "actors created");
        }
    }

    fn observe(&self) -> Result<()> {
        let tick = self.time.tick();
        let o = &self.observation;
        if o.log_every > 0 && tick % o.log_every == 0 {
            info!(tick, time = %self.time, agents = %self.agents, "step");
        }
        if o.store_every > 0 && tick % o.store_every == 0 {
            observation::store_state(self, self.outpath.join(&o.statefile))?;
        }
        Ok(())
    }

    /// Let everything end; returns the final report.
    pub fn end(&mut self, submodel: &mut dyn Submodel) -> Result<BTreeMap<String, Value>> {
        self.run_nature(Phase::End)?;
        self.run_human(Phase::End)?;
        submodel.end(self)?;
        self.set_states(State::Complete)?;
        let report = self.datacollector.get_final_vars_report(self)?;
        info!(model = %self, tick = self.time.tick(), report = ?report, "the model is ended");
        Ok(report)
    }

    /**
    Run setup, steps and end. Without `steps`, the time driver must have
    an end, otherwise the run would never stop. Returns the final report.
     */
    pub fn run_model(
        &mut self,
        submodel: &mut dyn Submodel,
        steps: Option<u64>,
    ) -> Result<BTreeMap<String, Value>> {
        if steps.is_none() && self.time.end().is_none() {
            return Err(AbsesError::Params(
                "Neither a number of steps nor an end time is given.".to_string(),
            ));
        }
        let done = |tick: u64| steps.map_or(false, |s| tick >= s);
        self.setup(submodel)?;
        if done(self.time.tick()) {
            self.running = false;
        }
        while self.running {
            self.step_once(submodel)?;
            if done(self.time.tick()) || self.time.reached_end() {
                self.running = false;
            }
        }
        self.end(submodel)
    }

    /// Name, state, tick and number of actors per breed.
    pub fn summary(&self) -> BTreeMap<String, Value> {
        let mut report = BTreeMap::new();
        report.insert("name".to_string(), Value::from(self.name.as_str()));
        report.insert("state".to_string(), Value::from(self.state().name()));
        report.insert("tick".to_string(), Value::from(self.time.tick()));
        for breed in self.agents.breeds() {
            let n = self.agents.has(&[breed]).unwrap_or(0);
            report.insert(breed.to_string(), Value::from(n));
        }
        report
    }
}

impl fmt::Display for MainModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}-{}({})>", self.name, self.version, self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Idle;
    use crate::nature::LayerSpec;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{}.{}", self.name, what));
        }
    }

    impl Submodel for Recorder {
        fn setup(&mut self, _model: &mut MainModel) -> Result<()> {
            self.push("setup");
            Ok(())
        }

        fn step(&mut self, _model: &mut MainModel) -> Result<()> {
            self.push("step");
            Ok(())
        }

        fn end(&mut self, _model: &mut MainModel) -> Result<()> {
            self.push("end");
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_run_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut model = MainModel::new(Settings::default()).unwrap();
        model.set_nature(recorder("nature", &log)).unwrap();
        model.set_human(recorder("human", &log)).unwrap();
        model
            .create_layer(LayerSpec::empty("land", (1, 1)).with_submodel(recorder("land", &log)))
            .unwrap();
        model.run_model(&mut recorder("model", &log), Some(1)).unwrap();
        let expected: Vec<String> = [
            "model.setup",
            "nature.setup",
            "land.setup",
            "human.setup",
            "model.step",
            "nature.step",
            "land.step",
            "human.step",
            "nature.end",
            "land.end",
            "human.end",
            "model.end",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(*log.lock().unwrap(), expected);
        assert_eq!(model.state(), State::Complete);
        assert_eq!(model.nature.layers()[0].info().state(), State::Complete);
    }

    #[test]
    fn test_closed_modules_do_not_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut model = MainModel::new(Settings::default()).unwrap();
        model.set_nature(recorder("nature", &log)).unwrap();
        model.nature.set_opening(false);
        model.run_model(&mut Idle, Some(2)).unwrap();
        let log = log.lock().unwrap();
        assert!(!log.iter().any(|l| l == "nature.step"));
        assert!(log.iter().any(|l| l == "nature.end"));
    }

    #[test]
    fn test_stops_at_time_end() {
        let settings = Settings::from(serde_json::json!({
            "model": {"name": "clock", "seed": 1},
            "time": {"start": "2000", "end": "2005", "years": 1}
        }));
        let mut model = MainModel::new(settings).unwrap();
        assert_eq!(model.to_string(), format!("<clock-{}(init)>", model.version()));
        model.run_model(&mut Idle, None).unwrap();
        assert_eq!(model.time.tick(), 5);
        assert_eq!(model.time.year(), 2005);
    }

    /// Jumps two ticks ahead on every step of its own.
    struct Hurry;

    impl Submodel for Hurry {
        fn step(&mut self, model: &mut MainModel) -> Result<()> {
            model.time.go(2)
        }
    }

    #[test]
    fn test_zero_steps_only_sets_up_and_ends() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut model = MainModel::new(Settings::default()).unwrap();
        model.run_model(&mut recorder("model", &log), Some(0)).unwrap();
        assert_eq!(model.time.tick(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["model.setup", "model.end"]);
        assert_eq!(model.state(), State::Complete);
    }

    #[test]
    fn test_stops_when_time_jumps_past_the_steps() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        // 3 ticks per step: 3, 6, then 9 is past 7.
        model.run_model(&mut Hurry, Some(7)).unwrap();
        assert_eq!(model.time.tick(), 9);
    }

    #[test]
    fn test_needs_an_end() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        assert!(model.run_model(&mut Idle, None).is_err());
    }

    #[test]
    fn test_same_seed_same_draws() {
        use rand::Rng;
        let settings = Settings::from(serde_json::json!({"model": {"seed": 42}}));
        let mut a = MainModel::new(settings.clone()).unwrap();
        let mut b = MainModel::new(settings).unwrap();
        let xa: Vec<f64> = (0..5).map(|_| a.rng.gen()).collect();
        let xb: Vec<f64> = (0..5).map(|_| b.rng.gen()).collect();
        assert_eq!(xa, xb);
    }

    #[test]
    fn test_summary() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        model.new_actors::<crate::actor::BaseActor>(2).unwrap();
        let summary = model.summary();
        assert_eq!(summary["Actor"], Value::from(2usize));
        assert_eq!(summary["state"], Value::from("init"));
    }
}
