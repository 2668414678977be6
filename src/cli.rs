/*!
Command line handling shared by the binaries.

Everything given on the command line ends up in the settings tree, so a
run configured from the command line is indistinguishable from one
configured by a file: `--seed 3` is `model.seed = 3`, `--store-every 10` is
`observation.store_every = 10`, and `--set model.density=0.4` sets any
dotted key.
 */

use crate::error::Result;
use crate::settings::Settings;
use argparse::action::Action::Single;
use argparse::action::ParseResult;
use argparse::action::ParseResult::{Error, Parsed};
use argparse::action::TypedAction;
use argparse::action::{Action, IArgAction};
use serde_json::Value as Json;
use std::cell::RefCell;
use std::rc::Rc;

/// Parse `key=value`. The value is read as JSON if possible, as a plain
/// string otherwise.
pub fn parse_assignment(arg: &str) -> Option<(String, Json)> {
    let (key, value) = arg.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Json::String(value.to_string()));
    Some((key.to_string(), value))
}

pub struct PushAssignmentAction<'a> {
    pub cell: Rc<RefCell<&'a mut Vec<(String, Json)>>>,
}

impl<'a> IArgAction for PushAssignmentAction<'a> {
    fn parse_arg(&self, arg: &str) -> ParseResult {
        match parse_assignment(arg) {
            Some(pair) => {
                self.cell.borrow_mut().push(pair);
                Parsed
            }
            None => Error(format!("Bad assignment {}, expected key=value", arg)),
        }
    }
}

/// Collects repeated `key=value` options.
pub struct PushAssignment;

impl TypedAction<Vec<(String, Json)>> for PushAssignment {
    fn bind<'x>(&self, cell: Rc<RefCell<&'x mut Vec<(String, Json)>>>) -> Action<'x> {
        Single(Box::new(PushAssignmentAction { cell }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub model: String,
    /// 0 runs until the end of the configured time.
    pub steps: u64,
    pub config: Option<String>,
    pub seed: Option<u64>,
    pub outpath: Option<String>,
    pub log_every: Option<u64>,
    pub store_every: Option<u64>,
    pub statefile: Option<String>,
    pub log_level: String,
    pub overrides: Vec<(String, Json)>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            model: "fire".to_string(),
            steps: 100,
            config: None,
            seed: None,
            outpath: None,
            log_every: None,
            store_every: None,
            statefile: None,
            log_level: "info".to_string(),
            overrides: Vec::new(),
        }
    }
}

impl Options {
    pub fn steps(&self) -> Option<u64> {
        if self.steps == 0 {
            None
        } else {
            Some(self.steps)
        }
    }

    /// The settings file, if any, with the command line applied on top.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        for (key, value) in self.overrides.iter() {
            settings.set(key, value.clone());
        }
        if let Some(seed) = self.seed {
            settings.set("model.seed", Json::from(seed));
        }
        if let Some(outpath) = &self.outpath {
            settings.set("model.outpath", Json::from(outpath.as_str()));
        }
        if let Some(n) = self.log_every {
            settings.set("observation.log_every", Json::from(n));
        }
        if let Some(n) = self.store_every {
            settings.set("observation.store_every", Json::from(n));
        }
        if let Some(file) = &self.statefile {
            settings.set("observation.statefile", Json::from(file.as_str()));
        }
        Ok(settings)
    }
}

pub fn parse_args(o: &mut Options) -> argparse::ArgumentParser<'_> {
    let mut parser = argparse::ArgumentParser::new();
    parser.set_description("Run an agent-based model");
    parser.refer(&mut o.model).add_option(
        &["--model"],
        argparse::Store,
        "model to run: fire or wolf_sheep",
    );
    parser.refer(&mut o.steps).add_option(
        &["--steps"],
        argparse::Store,
        "number of ticks to simulate, 0 to run until the configured end time",
    );
    parser.refer(&mut o.config).add_option(
        &["--config"],
        argparse::StoreOption,
        "JSON settings file",
    );
    parser.refer(&mut o.seed).add_option(
        &["--seed"],
        argparse::StoreOption,
        "seed of the random number generator",
    );
    parser.refer(&mut o.outpath).add_option(
        &["--outpath"],
        argparse::StoreOption,
        "existing directory to write state and data to",
    );
    parser.refer(&mut o.log_every).add_option(
        &["--log-every"],
        argparse::StoreOption,
        "period of logging, in ticks",
    );
    parser.refer(&mut o.store_every).add_option(
        &["--store-every"],
        argparse::StoreOption,
        "period of state saving, in ticks",
    );
    parser.refer(&mut o.statefile).add_option(
        &["--statefile"],
        argparse::StoreOption,
        "file name to store state to, inside the output directory",
    );
    parser.refer(&mut o.log_level).add_option(
        &["--log-level"],
        argparse::Store,
        "log level unless RUST_LOG is set: error, warn, info, debug or trace",
    );
    parser.refer(&mut o.overrides).add_option(
        &["--set"],
        PushAssignment,
        "override a setting, e.g. model.density=0.4; can be repeated",
    );
    parser
}
