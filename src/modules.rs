/*!
# Modules

The model is composed of two branch modules, nature and human, each holding
leaf modules: raster layers on the nature side, human modules on the other.
Every module has a name (which is also the key of its parameters in the
settings), an opening switch and, optionally, a [`Submodel`] implementing
its behavior.
 */

use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::settings::{validate_name, Params, Settings};
use crate::states::{State, States};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/**
Behavior attached to the model or one of its modules.

Each hook receives the whole model. While a hook runs, the submodel is
taken out of its module, so the hook can freely reach any other part of
the model.
 */
pub trait Submodel: Send + Sync {
    /// Called when the submodel is installed, before any parameters are
    /// handled.
    fn initialize(&mut self, _model: &mut MainModel) -> Result<()> {
        Ok(())
    }

    /// Called once before the first step.
    fn setup(&mut self, _model: &mut MainModel) -> Result<()> {
        Ok(())
    }

    fn step(&mut self, _model: &mut MainModel) -> Result<()> {
        Ok(())
    }

    /// Called once after the last step.
    fn end(&mut self, _model: &mut MainModel) -> Result<()> {
        Ok(())
    }
}

/// A submodel that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl Submodel for Idle {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    Setup,
    Step,
    End,
}

impl Phase {
    pub fn call(self, submodel: &mut dyn Submodel, model: &mut MainModel) -> Result<()> {
        match self {
            Phase::Initialize => submodel.initialize(model),
            Phase::Setup => submodel.setup(model),
            Phase::Step => submodel.step(model),
            Phase::End => submodel.end(model),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    name: String,
    opening: bool,
    states: States,
    params: Params,
}

impl ModuleInfo {
    pub fn new(name: &str, settings: &Settings) -> Result<ModuleInfo> {
        validate_name(name)?;
        Ok(ModuleInfo {
            name: name.to_string(),
            opening: true,
            states: States::default(),
            params: settings.params(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn opening(&self) -> bool {
        self.opening
    }

    pub fn set_opening(&mut self, value: bool) {
        if self.opening != value {
            info!(module = %self.name, "switch 'open' to {}", value);
        }
        self.opening = value;
    }

    pub fn state(&self) -> State {
        self.states.state()
    }

    pub fn set_state(&mut self, code: u8) -> Result<()> {
        self.states.set_state(code)
    }
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = if self.opening { "open" } else { "closed" };
        write!(f, "<{}: {}>", self.name, flag)
    }
}

/// Fail if `name` is already taken by one of `existing`.
pub(crate) fn check_unique<'a, I>(mut existing: I, name: &str) -> Result<()>
where
    I: Iterator<Item = &'a str>,
{
    if existing.any(|n| n == name) {
        Err(AbsesError::Duplicate(format!(
            "Name '{}' already exists in the model.",
            name
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_info_reads_own_params() {
        let settings = Settings::from(serde_json::json!({"farmers": {"n": 3}}));
        let mut info = ModuleInfo::new("farmers", &settings).unwrap();
        assert_eq!(info.params().get_i64("n").unwrap(), Some(3));
        assert_eq!(info.to_string(), "<farmers: open>");
        info.set_opening(false);
        assert_eq!(info.to_string(), "<farmers: closed>");
        assert!(ModuleInfo::new("Farmers", &settings).is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let names = ["a", "b"];
        assert!(check_unique(names.iter().copied(), "c").is_ok());
        let err = check_unique(names.iter().copied(), "a").unwrap_err();
        assert_eq!(err.to_string(), "Name 'a' already exists in the model.");
    }
}
