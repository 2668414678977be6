/*!
# Global variables

Model variables can be declared global. On every notification their
current values are copied into the attributes of all observing actors,
which lets actors read model-wide state as if it were their own.
 */

use crate::actor::ActorId;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use std::collections::BTreeSet;

#[derive(Debug, Default, Clone)]
pub struct Notice {
    glob_vars: Vec<String>,
    observers: BTreeSet<ActorId>,
}

impl Notice {
    pub fn attach(&mut self, id: ActorId) {
        self.observers.insert(id);
    }

    pub fn detach(&mut self, id: ActorId) {
        self.observers.remove(&id);
    }

    pub fn observers(&self) -> &BTreeSet<ActorId> {
        &self.observers
    }

    pub fn glob_vars(&self) -> &[String] {
        &self.glob_vars
    }
}

impl MainModel {
    /// Declare the model variable `name` global.
    pub fn add_glob_var(&mut self, name: &str) -> Result<()> {
        if !self.vars.contains_key(name) {
            return Err(AbsesError::Attribute(format!(
                "Model has no variable '{}'.",
                name
            )));
        }
        if !self.notice.glob_vars.iter().any(|v| v == name) {
            self.notice.glob_vars.push(name.to_string());
        }
        Ok(())
    }

    /// Copy every global variable into every observer.
    pub fn notify(&mut self) {
        let values: Vec<_> = self
            .notice
            .glob_vars
            .iter()
            .filter_map(|n| self.vars.get(n).map(|v| (n.clone(), v.clone())))
            .collect();
        if values.is_empty() {
            return;
        }
        for id in self.notice.observers.iter() {
            if let Ok(actor) = self.agents.actor_mut(*id) {
                for (name, value) in values.iter() {
                    actor.set_own(name, value.clone());
                }
            }
        }
    }
}
