/*!
# Decisions

Actors perceive their surroundings through attribute queries, decide by
picking one of a fixed set of strategies, and respond by running the action
registered for that strategy.

```rust
# use abses::prelude::*;
# use abses::decision::Decision;
struct Farmer;

impl Breed for Farmer {
    const NAME: &'static str = "Farmer";

    fn setup(actor: &mut Actor) {
        actor.set_own("wealth", 3);
    }

    fn decisions() -> Vec<Decision> {
        vec![Decision::new("migrate", |model: &MainModel, id| {
            let wealth = model.get(id, "wealth", Target::Me)?.and_then(|v| v.as_f64());
            Ok(if wealth.unwrap_or(0.) < 5. { "leave" } else { "stay" }.to_string())
        })
        .strategy("stay", "keep farming")
        .strategy("leave", "move to the city")
        .respond("leave", |model: &mut MainModel, id| model.die(id))]
    }
}

let mut model = MainModel::new(Settings::default()).unwrap();
let id = model.new_actor::<Farmer>().unwrap();
assert_eq!(model.making(id, "migrate").unwrap(), "leave");
model.response(id, "migrate").unwrap();
assert!(model.agents.is_empty());
```
 */

use crate::actor::ActorId;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type Strategize = Arc<dyn Fn(&MainModel, ActorId) -> Result<String> + Send + Sync>;
pub type Response = Arc<dyn Fn(&mut MainModel, ActorId) -> Result<()> + Send + Sync>;

pub struct Decision {
    name: String,
    strategies: BTreeMap<String, String>,
    strategize: Strategize,
    responses: BTreeMap<String, Response>,
    choice: Option<String>,
}

impl Decision {
    pub fn new<F>(name: &str, strategize: F) -> Decision
    where
        F: Fn(&MainModel, ActorId) -> Result<String> + Send + Sync + 'static,
    {
        Decision {
            name: name.to_string(),
            strategies: BTreeMap::new(),
            strategize: Arc::new(strategize),
            responses: BTreeMap::new(),
            choice: None,
        }
    }

    /// Add a discrete strategy.
    pub fn strategy(mut self, name: &str, description: &str) -> Decision {
        self.strategies.insert(name.to_string(), description.to_string());
        self
    }

    /// Register the action taken when `strategy` is chosen.
    pub fn respond<F>(mut self, strategy: &str, action: F) -> Decision
    where
        F: Fn(&mut MainModel, ActorId) -> Result<()> + Send + Sync + 'static,
    {
        self.responses.insert(strategy.to_string(), Arc::new(action));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategies(&self) -> &BTreeMap<String, String> {
        &self.strategies
    }

    pub fn has_strategy(&self, strategy: &str) -> bool {
        self.strategies.contains_key(strategy)
    }

    pub fn validate_strategy(&self, strategy: &str) -> Result<()> {
        if self.has_strategy(strategy) {
            Ok(())
        } else {
            Err(AbsesError::NotFound(format!(
                "Decision '{}' doesn't have a valid strategy {}.",
                self.name, strategy
            )))
        }
    }

    /// The strategy chosen last time.
    pub fn choice(&self) -> Option<&str> {
        self.choice.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(AbsesError::Type(format!(
                "Decision '{}' has no strategies; only discrete strategies are supported.",
                self.name
            )));
        }
        for strategy in self.responses.keys() {
            if !self.has_strategy(strategy) {
                return Err(AbsesError::NotFound(format!(
                    "Decision '{}' doesn't have strategy {}.",
                    self.name, strategy
                )));
            }
        }
        Ok(())
    }

}

impl fmt::Debug for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decision")
            .field("name", &self.name)
            .field("strategies", &self.strategies)
            .field("choice", &self.choice)
            .finish()
    }
}

/// The decisions of one actor, in the order they are made.
#[derive(Debug, Default)]
pub struct Decisions {
    decisions: Vec<Decision>,
}

impl Decisions {
    pub fn new(decisions: Vec<Decision>) -> Result<Decisions> {
        let mut result = Decisions::default();
        for d in decisions {
            result.add(d)?;
        }
        Ok(result)
    }

    pub fn add(&mut self, decision: Decision) -> Result<()> {
        decision.validate()?;
        if self.decisions.iter().any(|d| d.name == decision.name) {
            return Err(AbsesError::Duplicate(format!(
                "Decision '{}' already exists.",
                decision.name
            )));
        }
        self.decisions.push(decision);
        Ok(())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.decisions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&Decision> {
        self.decisions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| self.missing(name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Decision> {
        let err = self.missing(name);
        self.decisions.iter_mut().find(|d| d.name == name).ok_or(err)
    }

    fn missing(&self, name: &str) -> AbsesError {
        AbsesError::NotFound(format!(
            "Decision '{}' doesn't exist in {:?}.",
            name,
            self.keys()
        ))
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

impl MainModel {
    /// Let actor `id` make the decision `name`; returns the chosen strategy.
    pub fn making(&mut self, id: ActorId, name: &str) -> Result<String> {
        let strategize = Arc::clone(&self.actor(id)?.decisions.get(name)?.strategize);
        let strategy = strategize(self, id)?;
        let decision = self.agents.actor_mut(id)?.decisions.get_mut(name)?;
        decision.validate_strategy(&strategy)?;
        decision.choice = Some(strategy.clone());
        Ok(strategy)
    }

    /// Make every decision of actor `id`, in order.
    pub fn make_all(&mut self, id: ActorId) -> Result<Vec<String>> {
        let names = self.decision_names(id)?;
        names.iter().map(|name| self.making(id, name)).collect()
    }

    /**
    Run the action registered for the current choice of decision `name`.
    Returns whether an action ran.
     */
    pub fn response(&mut self, id: ActorId, name: &str) -> Result<bool> {
        let decision = self.actor(id)?.decisions.get(name)?;
        let action = decision
            .choice()
            .and_then(|c| decision.responses.get(c))
            .map(Arc::clone);
        match action {
            Some(action) => action(self, id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Decide and respond, for every decision of actor `id`.
    pub fn decide(&mut self, id: ActorId) -> Result<()> {
        for name in self.decision_names(id)? {
            if !self.agents.contains(id) {
                break;
            }
            self.making(id, &name)?;
            self.response(id, &name)?;
        }
        Ok(())
    }

    fn decision_names(&self, id: ActorId) -> Result<Vec<String>> {
        Ok(self
            .actor(id)?
            .decisions()
            .keys()
            .into_iter()
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(strategy: &'static str) -> Decision {
        Decision::new("d", move |_, _| Ok(strategy.to_string()))
            .strategy("a", "first")
            .strategy("b", "second")
    }

    #[test]
    fn test_validation() {
        assert!(Decisions::new(vec![Decision::new("d", |_, _| Ok("a".into()))]).is_err());
        let bad_response = always("a").respond("c", |_, _| Ok(()));
        assert!(Decisions::new(vec![bad_response]).is_err());
        assert!(Decisions::new(vec![always("a"), always("b")]).is_err());
        let decisions = Decisions::new(vec![always("a")]).unwrap();
        assert_eq!(decisions.keys(), vec!["d"]);
        assert!(decisions.get("d").unwrap().has_strategy("b"));
        assert!(decisions.get("d").unwrap().validate_strategy("c").is_err());
        assert!(decisions.get("x").is_err());
    }

    use crate::actor::Breed;

    struct Herder;

    impl Breed for Herder {
        const NAME: &'static str = "Herder";

        fn decisions() -> Vec<Decision> {
            vec![
                Decision::new("graze", |_, _| Ok("far".to_string()))
                    .strategy("near", "stay close")
                    .strategy("far", "go far")
                    .respond("far", |model: &mut MainModel, id| {
                        // going far means deciding on the route right away
                        model.making(id, "graze")?;
                        model.making(id, "route").map(|_| ())
                    }),
                Decision::new("route", |_, _| Ok("river".to_string()))
                    .strategy("river", "follow the river"),
            ]
        }
    }

    #[test]
    fn test_response_can_decide_again() {
        let mut model = MainModel::new(crate::settings::Settings::default()).unwrap();
        let id = model.new_actor::<Herder>().unwrap();
        assert_eq!(model.making(id, "graze").unwrap(), "far");
        assert!(model.response(id, "graze").unwrap());
        let decisions = model.actor(id).unwrap().decisions();
        assert_eq!(decisions.get("graze").unwrap().choice(), Some("far"));
        assert_eq!(decisions.get("route").unwrap().choice(), Some("river"));
    }
}
