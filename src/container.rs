/*!
# The actors container

All living actors of a model, keyed by id, together with the registry of the
breeds that have been created so far.
 */

use crate::actor::{Actor, ActorId, Breed, BreedInfo};
use crate::cells::CellRef;
use crate::decision::Decisions;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::movement::Destination;
use crate::sequences::{ActorsList, Selection};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AgentsContainer {
    actors: BTreeMap<ActorId, Actor>,
    breeds: BTreeMap<String, BreedInfo>,
    max_len: Option<usize>,
    next_id: u64,
    created: BTreeMap<String, usize>,
}

impl AgentsContainer {
    pub fn new(max_len: Option<usize>) -> AgentsContainer {
        AgentsContainer {
            max_len,
            ..AgentsContainer::default()
        }
    }

    pub fn actor(&self, id: ActorId) -> Result<&Actor> {
        self.actors
            .get(&id)
            .ok_or_else(|| AbsesError::NotFound(format!("Actor {} not found.", id)))
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Result<&mut Actor> {
        self.actors
            .get_mut(&id)
            .ok_or_else(|| AbsesError::NotFound(format!("Actor {} not found.", id)))
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    pub fn is_full(&self) -> bool {
        self.max_len.map_or(false, |m| self.actors.len() >= m)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Names of the breeds created so far.
    pub fn breeds(&self) -> Vec<&str> {
        self.breeds.keys().map(String::as_str).collect()
    }

    pub fn breed_info(&self, breed: &str) -> Option<BreedInfo> {
        self.breeds.get(breed).copied()
    }

    pub(crate) fn register<B: Breed>(&mut self) {
        self.breeds
            .entry(B::NAME.to_string())
            .or_insert_with(BreedInfo::of::<B>);
    }

    fn check_breeds(&self, breeds: &[&str]) -> Result<()> {
        for breed in breeds {
            if !self.breeds.contains_key(*breed) {
                return Err(AbsesError::NotFound(format!("Breed '{}' not found.", breed)));
            }
        }
        Ok(())
    }

    /// Actors of the given breeds, all actors if none are given.
    pub fn get(&self, breeds: &[&str]) -> Result<ActorsList<ActorId>> {
        self.check_breeds(breeds)?;
        Ok(self
            .actors
            .values()
            .filter(|a| breeds.is_empty() || breeds.contains(&a.breed()))
            .map(Actor::unique_id)
            .collect())
    }

    pub fn has(&self, breeds: &[&str]) -> Result<usize> {
        Ok(self.get(breeds)?.len())
    }

    pub fn all(&self) -> ActorsList<ActorId> {
        self.actors.keys().copied().collect()
    }

    pub fn select(&self, model: &MainModel, selection: &Selection) -> ActorsList<ActorId> {
        self.all().select(model, selection)
    }

    /// Apply `f` to every actor.
    pub fn trigger<F: FnMut(&mut Actor)>(&mut self, mut f: F) {
        for actor in self.actors.values_mut() {
            f(actor);
        }
    }

    fn full_error(&self) -> AbsesError {
        AbsesError::Capacity(format!("{} is full.", self))
    }

    /// Add an actor created elsewhere, e.g. one taken out of another model.
    pub fn add(&mut self, actor: Actor) -> Result<()> {
        if self.is_full() {
            return Err(self.full_error());
        }
        if self.contains(actor.unique_id()) {
            return Err(AbsesError::Duplicate(format!(
                "{} already exists in the model.",
                actor
            )));
        }
        self.next_id = self.next_id.max(actor.unique_id().0 + 1);
        *self.created.entry(actor.breed().to_string()).or_insert(0) += 1;
        self.actors.insert(actor.unique_id(), actor);
        Ok(())
    }

    /// Take an actor out of the model. It must have left the earth first.
    pub fn remove(&mut self, id: ActorId) -> Result<Actor> {
        let actor = self.actor(id)?;
        if let Some(at) = actor.at() {
            return Err(AbsesError::Location(format!(
                "{} is still located on {}.",
                actor, at
            )));
        }
        self.actors
            .remove(&id)
            .ok_or_else(|| AbsesError::NotFound(format!("Actor {} not found.", id)))
    }

    fn next_id(&mut self) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Forget one creation of `breed`, for an actor that died unborn.
    fn uncount(&mut self, breed: &str) {
        if let Some(n) = self.created.get_mut(breed) {
            *n -= 1;
            if *n == 0 {
                self.created.remove(breed);
            }
        }
    }

    /// Creations per breed since the last call.
    pub(crate) fn take_created(&mut self) -> BTreeMap<String, usize> {
        std::mem::take(&mut self.created)
    }
}

/// `<ModelAgents: (3)Admin; (2)Farmer>`
impl fmt::Display for AgentsContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for actor in self.actors.values() {
            *counts.entry(actor.breed()).or_insert(0) += 1;
        }
        let parts: Vec<String> = counts.iter().map(|(b, n)| format!("({}){}", n, b)).collect();
        write!(f, "<ModelAgents: {}>", parts.join("; "))
    }
}

impl MainModel {
    /// Create one actor of breed `B`, not located anywhere.
    pub fn new_actor<B: Breed>(&mut self) -> Result<ActorId> {
        if self.agents.is_full() {
            return Err(self.agents.full_error());
        }
        self.agents.register::<B>();
        let id = self.agents.next_id();
        let mut actor = Actor::new(id, B::NAME, self.time.tick());
        B::setup(&mut actor);
        actor.decisions = Decisions::new(B::decisions())?;
        self.agents.add(actor)?;
        self.notice.attach(id);
        Ok(id)
    }

    /// Create `num` actors of breed `B`.
    pub fn new_actors<B: Breed>(&mut self, num: usize) -> Result<ActorsList<ActorId>> {
        let mut ids = Vec::with_capacity(num);
        for _ in 0..num {
            ids.push(self.new_actor::<B>()?);
        }
        if num > 0 {
            debug!(breed = B::NAME, num, "created actors");
        }
        Ok(ActorsList::from(ids))
    }

    /**
    Create `num` actors of breed `B` located on `cell`. If one of them
    cannot be placed, it is removed again and the error returned.
     */
    pub fn new_on_cell<B: Breed>(&mut self, cell: CellRef, num: usize) -> Result<ActorsList<ActorId>> {
        let mut ids = Vec::with_capacity(num);
        for _ in 0..num {
            let id = self.new_actor::<B>()?;
            match self.move_to(id, Destination::Cell(cell)) {
                Ok(true) => ids.push(id),
                Ok(false) => {
                    self.die(id)?;
                    self.agents.uncount(B::NAME);
                    return Err(AbsesError::Location(format!(
                        "{} refused to be placed on {}.",
                        B::NAME,
                        cell
                    )));
                }
                Err(e) => {
                    self.die(id)?;
                    self.agents.uncount(B::NAME);
                    return Err(e);
                }
            }
        }
        Ok(ActorsList::from(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::BaseActor;
    use crate::settings::Settings;

    struct Admin;

    impl Breed for Admin {
        const NAME: &'static str = "Admin";
    }

    #[test]
    fn test_create_and_display() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        assert!(model.new_actors::<Admin>(0).unwrap().is_empty());
        model.new_actors::<Admin>(3).unwrap();
        model.new_actors::<BaseActor>(2).unwrap();
        assert_eq!(model.agents.to_string(), "<ModelAgents: (2)Actor; (3)Admin>");
        assert_eq!(model.agents.has(&[]).unwrap(), 5);
        assert_eq!(model.agents.has(&["Admin"]).unwrap(), 3);
        assert_eq!(model.agents.breeds(), vec!["Actor", "Admin"]);
        let err = model.agents.get(&["Farmer"]).unwrap_err();
        assert_eq!(err.to_string(), "Breed 'Farmer' not found.");
    }

    #[test]
    fn test_capacity() {
        let settings = Settings::from(serde_json::json!({"model": {"max_agents": 2}}));
        let mut model = MainModel::new(settings).unwrap();
        model.new_actors::<Admin>(2).unwrap();
        assert!(model.agents.is_full());
        let err = model.new_actor::<Admin>().unwrap_err();
        assert!(err.to_string().ends_with("is full."));
    }

    #[test]
    fn test_failed_placement_is_not_a_creation() {
        use crate::nature::LayerSpec;
        let mut model = MainModel::new(Settings::default()).unwrap();
        let land = model
            .create_layer(LayerSpec::from_resolution("land", (1, 1)).capacity(Some(1)))
            .unwrap();
        let cell = CellRef::new(land, 0, 0);
        model.new_on_cell::<Admin>(cell, 1).unwrap();
        assert!(model.new_on_cell::<Admin>(cell, 1).is_err());
        assert_eq!(model.agents.has(&["Admin"]).unwrap(), 1);
        assert_eq!(model.agents.take_created().get("Admin"), Some(&1));
    }

    #[test]
    fn test_ids_are_unique_after_death() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        let first = model.new_actor::<Admin>().unwrap();
        model.die(first).unwrap();
        let second = model.new_actor::<Admin>().unwrap();
        assert_ne!(first, second);
        assert!(model.agents.actor(first).is_err());
    }
}
