/*!
# Human

The human branch holds the social side of a model: human modules, named
collections of actors, and the links between actors and cells.
 */

use crate::actor::ActorId;
use crate::error::{AbsesError, Result};
use crate::links::LinkContainer;
use crate::model::MainModel;
use crate::modules::{check_unique, ModuleInfo, Submodel};
use crate::sequences::{ActorsList, Selection};
use crate::settings::Settings;
use std::collections::BTreeMap;

/// Named selections, re-evaluated every time they are asked for.
#[derive(Debug, Default, Clone)]
pub struct Collections {
    selections: BTreeMap<String, Selection>,
}

impl Collections {
    pub fn define<S: Into<Selection>>(&mut self, name: &str, selection: S) -> Result<()> {
        if self.selections.contains_key(name) {
            return Err(AbsesError::Duplicate(format!(
                "Collection '{}' is already defined.",
                name
            )));
        }
        self.selections.insert(name.to_string(), selection.into());
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.selections.keys().map(String::as_str).collect()
    }

    pub fn selection(&self, name: &str) -> Result<&Selection> {
        self.selections
            .get(name)
            .ok_or_else(|| AbsesError::NotFound(format!("Collection '{}' not defined.", name)))
    }

    pub fn actors(&self, model: &MainModel, name: &str) -> Result<ActorsList<ActorId>> {
        Ok(model.agents.select(model, self.selection(name)?))
    }
}

pub struct HumanModule {
    pub(crate) info: ModuleInfo,
    pub collections: Collections,
    pub(crate) submodel: Option<Box<dyn Submodel>>,
}

impl HumanModule {
    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }
}

pub struct BaseHuman {
    pub(crate) info: ModuleInfo,
    settings: Settings,
    modules: Vec<HumanModule>,
    pub collections: Collections,
    pub links: LinkContainer,
    pub(crate) submodel: Option<Box<dyn Submodel>>,
}

impl BaseHuman {
    pub fn new(settings: &Settings) -> Result<BaseHuman> {
        Ok(BaseHuman {
            info: ModuleInfo::new("human", settings)?,
            settings: settings.clone(),
            modules: Vec::new(),
            collections: Collections::default(),
            links: LinkContainer::default(),
            submodel: None,
        })
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Define a named collection of actors.
    pub fn define<S: Into<Selection>>(&mut self, name: &str, selection: S) -> Result<()> {
        self.collections.define(name, selection)
    }

    pub fn actors(&self, model: &MainModel, name: &str) -> Result<ActorsList<ActorId>> {
        self.collections.actors(model, name)
    }

    pub fn create_module(&mut self, name: &str, submodel: Option<Box<dyn Submodel>>) -> Result<usize> {
        check_unique(self.modules.iter().map(HumanModule::name), name)?;
        self.modules.push(HumanModule {
            info: ModuleInfo::new(name, &self.settings)?,
            collections: Collections::default(),
            submodel,
        });
        Ok(self.modules.len() - 1)
    }

    pub fn modules(&self) -> &[HumanModule] {
        &self.modules
    }

    pub(crate) fn modules_mut(&mut self) -> &mut [HumanModule] {
        &mut self.modules
    }

    pub fn module(&self, name: &str) -> Result<&HumanModule> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| AbsesError::NotFound(format!("Module '{}' not found.", name)))
    }

    pub fn module_mut(&mut self, name: &str) -> Result<&mut HumanModule> {
        self.modules
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| AbsesError::NotFound(format!("Module '{}' not found.", name)))
    }

    /// Open or close human together with all its modules.
    pub fn set_opening(&mut self, value: bool) {
        self.info.set_opening(value);
        for m in self.modules.iter_mut() {
            m.info.set_opening(value);
        }
    }

    pub fn modules_summary(&self) -> String {
        self.modules
            .iter()
            .map(|m| format!("{:<12} {:<8} {}\n", m.name(), if m.info.opening() { "open" } else { "closed" }, m.info.state().name()))
            .collect()
    }
}

impl MainModel {
    /// Add a human module and run the initialize hook of its submodel.
    pub fn create_human_module<S: Submodel + 'static>(&mut self, name: &str, submodel: S) -> Result<usize> {
        let index = self.human.create_module(name, None)?;
        let mut submodel: Box<dyn Submodel> = Box::new(submodel);
        let result = submodel.initialize(self);
        self.human.modules_mut()[index].submodel = Some(submodel);
        result.map(|_| index)
    }
}
