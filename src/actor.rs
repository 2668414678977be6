/*!
# Actors

Actors are the decision-making agents of a model. They are owned by the
model's [`AgentsContainer`](crate::container::AgentsContainer) and referred
to everywhere else by their [`ActorId`]. An actor has a breed, free-form
attributes, optional dynamic variables and decisions, and may be located on
one cell of one raster layer.

Behavior common to all actors of a breed is declared through the [`Breed`]
trait.
 */

use crate::cells::{CellRef, LayerId, PatchCell};
use crate::decision::{Decision, Decisions};
use crate::dynamic::{DynamicVariable, DynamicVariables};
use crate::error::{AbsesError, Result};
use crate::links::{LinkDirection, Node};
use crate::model::MainModel;
use crate::time::TimeDriver;
use crate::value::{Attributes, Value};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/**
A kind of actor.

```rust
# use abses::prelude::*;
struct Farmer;

impl Breed for Farmer {
    const NAME: &'static str = "Farmer";

    fn setup(actor: &mut Actor) {
        actor.set_own("wealth", 10.);
    }
}

let mut model = MainModel::new(Settings::default()).unwrap();
let farmers = model.new_actors::<Farmer>(2).unwrap();
assert_eq!(model.agents.has(&["Farmer"]).unwrap(), 2);
assert_eq!(farmers.array(&model, "wealth").unwrap(), vec![10., 10.]);
```
 */
pub trait Breed: 'static {
    const NAME: &'static str;

    /// Give a newly created actor its initial attributes.
    fn setup(_actor: &mut Actor) {}

    /// The decisions every actor of this breed makes.
    fn decisions() -> Vec<Decision> {
        Vec::new()
    }

    /// Whether the actor accepts moving onto `cell`.
    fn moving(_actor: &Actor, _cell: &PatchCell) -> bool {
        true
    }
}

/// The default breed.
pub struct BaseActor;

impl Breed for BaseActor {
    const NAME: &'static str = "Actor";
}

/// The hooks of a breed, kept in the model's breed registry.
#[derive(Clone, Copy)]
pub struct BreedInfo {
    pub name: &'static str,
    pub setup: fn(&mut Actor),
    pub decisions: fn() -> Vec<Decision>,
    pub moving: fn(&Actor, &PatchCell) -> bool,
}

impl BreedInfo {
    pub fn of<B: Breed>() -> BreedInfo {
        BreedInfo {
            name: B::NAME,
            setup: B::setup,
            decisions: B::decisions,
            moving: B::moving,
        }
    }
}

impl fmt::Debug for BreedInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreedInfo").field("name", &self.name).finish()
    }
}

#[derive(Serialize)]
pub struct Actor {
    unique_id: ActorId,
    breed: String,
    alive: bool,
    birth_tick: u64,
    pub(crate) cell: Option<CellRef>,
    pub attrs: Attributes,
    #[serde(skip)]
    dynamic_variables: DynamicVariables<Actor, Value>,
    #[serde(skip)]
    pub(crate) decisions: Decisions,
}

impl Actor {
    pub(crate) fn new(unique_id: ActorId, breed: &str, birth_tick: u64) -> Actor {
        Actor {
            unique_id,
            breed: breed.to_string(),
            alive: true,
            birth_tick,
            cell: None,
            attrs: Attributes::default(),
            dynamic_variables: DynamicVariables::default(),
            decisions: Decisions::default(),
        }
    }

    pub fn unique_id(&self) -> ActorId {
        self.unique_id
    }

    pub fn breed(&self) -> &str {
        &self.breed
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub fn birth_tick(&self) -> u64 {
        self.birth_tick
    }

    /// Ticks since birth, `None` once dead.
    pub fn age(&self, now: u64) -> Option<u64> {
        if self.alive {
            Some(now.saturating_sub(self.birth_tick))
        } else {
            None
        }
    }

    /// The cell the actor is located on.
    pub fn at(&self) -> Option<CellRef> {
        self.cell
    }

    pub fn on_earth(&self) -> bool {
        self.cell.is_some()
    }

    pub fn layer(&self) -> Option<LayerId> {
        self.cell.map(|c| c.layer)
    }

    pub fn indices(&self) -> Option<(usize, usize)> {
        self.cell.map(|c| c.indices())
    }

    pub fn get_own(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    pub fn set_own<V: Into<Value>>(&mut self, attr: &str, value: V) {
        self.attrs.insert(attr.to_string(), value.into());
    }

    pub fn add_dynamic_variable<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&Actor, &TimeDriver) -> Result<Value> + Send + Sync + 'static,
    {
        self.dynamic_variables.add(DynamicVariable::new(name, function));
    }

    pub fn has_dynamic_variable(&self, name: &str) -> bool {
        self.dynamic_variables.contains(name)
    }

    /// Own attribute or dynamic variable.
    fn lookup(&self, attr: &str, time: &TimeDriver) -> Result<Option<Value>> {
        if let Some(v) = self.attrs.get(attr) {
            return Ok(Some(v.clone()));
        }
        match self.dynamic_variables.get(attr) {
            Some(var) => var.peek(self, time).map(Some),
            None => Ok(None),
        }
    }

    pub fn decisions(&self) -> &Decisions {
        &self.decisions
    }

    pub fn decisions_mut(&mut self) -> &mut Decisions {
        &mut self.decisions
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} [{}]>", self.breed, self.unique_id)
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("unique_id", &self.unique_id)
            .field("breed", &self.breed)
            .field("alive", &self.alive)
            .field("cell", &self.cell)
            .field("attrs", &self.attrs)
            .finish()
    }
}

/// Where `get` and `set` look for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The actor first, then the cell it is located on.
    Auto,
    Me,
    Cell,
    Actor(ActorId),
}

impl MainModel {
    pub fn actor(&self, id: ActorId) -> Result<&Actor> {
        self.agents.actor(id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Result<&mut Actor> {
        self.agents.actor_mut(id)
    }

    /// Age of a living actor in ticks.
    pub fn age(&self, id: ActorId) -> Option<u64> {
        self.agents.actor(id).ok()?.age(self.time.tick())
    }

    /**
    Read an attribute as seen by actor `id`.

    Returns `Ok(None)` if the actor is no longer alive.
     */
    pub fn get(&self, id: ActorId, attr: &str, target: Target) -> Result<Option<Value>> {
        let actor = match self.agents.actor(id) {
            Ok(a) => a,
            Err(_) => return Ok(None),
        };
        match target {
            Target::Me => match actor.lookup(attr, &self.time)? {
                Some(v) => Ok(Some(v)),
                None => Err(AbsesError::Attribute(format!(
                    "{} has no attribute '{}'.",
                    actor, attr
                ))),
            },
            Target::Cell => {
                let cell = self.cell_of(actor)?;
                cell.get(attr).map(|v| Some(v.clone()))
            }
            Target::Actor(other) => self.get(other, attr, Target::Me),
            Target::Auto => {
                if let Some(v) = actor.lookup(attr, &self.time)? {
                    return Ok(Some(v));
                }
                match actor.at() {
                    Some(at) => {
                        let cell = self.nature.cell(at)?;
                        match cell.attrs.get(attr) {
                            Some(v) => Ok(Some(v.clone())),
                            None => Err(AbsesError::Attribute(format!(
                                "Neither {} nor {} has attribute '{}'.",
                                actor, at, attr
                            ))),
                        }
                    }
                    None => Err(AbsesError::Attribute(format!(
                        "{} has no attribute '{}' and is not located on any cell.",
                        actor, attr
                    ))),
                }
            }
        }
    }

    /**
    Write an attribute as seen by actor `id`.

    Attributes starting with an underscore are protected. Unless `new` is
    set, only existing attributes can be written. Writing to a dead actor
    does nothing.
     */
    pub fn set<V: Into<Value>>(
        &mut self,
        id: ActorId,
        attr: &str,
        value: V,
        target: Target,
        new: bool,
    ) -> Result<()> {
        if attr.starts_with('_') {
            return Err(AbsesError::Attribute(format!(
                "Attribute '{}' is protected.",
                attr
            )));
        }
        let value = value.into();
        let actor = match self.agents.actor(id) {
            Ok(a) => a,
            Err(_) => return Ok(()),
        };
        let on_actor = actor.attrs.contains_key(attr);
        let at = actor.at();
        match target {
            Target::Actor(other) => self.set(other, attr, value, Target::Me, new),
            Target::Me => {
                if !on_actor && !new {
                    return Err(AbsesError::Attribute(format!("Attribute '{}' not found.", attr)));
                }
                self.agents.actor_mut(id)?.set_own(attr, value);
                Ok(())
            }
            Target::Cell => {
                let at = at.ok_or_else(|| {
                    AbsesError::Location(format!("Actor {} is not located on any cell.", id))
                })?;
                let cell = self.nature.cell_mut(at)?;
                if !cell.has(attr) && !new {
                    return Err(AbsesError::Attribute(format!("Attribute '{}' not found.", attr)));
                }
                cell.set(attr, value);
                Ok(())
            }
            Target::Auto => {
                if on_actor || (new && at.is_none()) {
                    self.agents.actor_mut(id)?.set_own(attr, value);
                    return Ok(());
                }
                if let Some(at) = at {
                    let cell = self.nature.cell_mut(at)?;
                    if cell.has(attr) {
                        cell.set(attr, value);
                        return Ok(());
                    }
                }
                if new {
                    self.agents.actor_mut(id)?.set_own(attr, value);
                    Ok(())
                } else {
                    Err(AbsesError::Attribute(format!("Attribute '{}' not found.", attr)))
                }
            }
        }
    }

    fn cell_of(&self, actor: &Actor) -> Result<&PatchCell> {
        let at = actor.at().ok_or_else(|| {
            AbsesError::Location(format!("{} is not located on any cell.", actor))
        })?;
        self.nature.cell(at)
    }

    /// Recompute and cache an actor's dynamic variable.
    pub fn dynamic_var(&mut self, id: ActorId, name: &str) -> Result<Value> {
        let actor = self.agents.actor_mut(id)?;
        let mut vars = std::mem::take(&mut actor.dynamic_variables);
        let result = match vars.get_mut(name) {
            Some(var) => var.value(actor, &self.time),
            None => Err(AbsesError::NotFound(format!(
                "{} has no dynamic variable '{}'.",
                actor, name
            ))),
        };
        actor.dynamic_variables = vars;
        result
    }

    /**
    Let an actor die: all its links are cut, it leaves its cell, stops
    observing the model and is removed from the model. Dying twice is a
    no-op.
     */
    pub fn die(&mut self, id: ActorId) -> Result<()> {
        if !self.agents.contains(id) {
            return Ok(());
        }
        self.human
            .links
            .clean_links_of(Node::Actor(id), None, LinkDirection::Both);
        self.move_off(id)?;
        self.notice.detach(id);
        let mut actor = self.agents.remove(id)?;
        actor.alive = false;
        debug!(actor = %actor, tick = self.time.tick(), "died");
        Ok(())
    }
}
