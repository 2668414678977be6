/*!
Agent-based modeling of social-ecological systems
=================================================

This crate is a framework for building agent-based models in which people
act on a spatially explicit environment. Models built with it can be
described along the ODD (Overview, Design concept, Details) protocol (Grimm
et al., 2006; Grimm et al., 2010), and the crate itself is organized the
same way: the entities a model consists of, the process overview and
scheduling, and the details of initialization, input and observation.

# 1. Purpose

Social-ecological models couple a natural subsystem, typically gridded
landscapes whose state changes over time, with a human subsystem of
individuals and institutions that perceive, decide and act. The crate
provides the scaffolding shared by such models, so that a model only needs
to describe its own breeds, layers and rules.

# 2. Entities, state variables, and scales

A model ([`model::MainModel`]) has two branches. Nature
([`nature::BaseNature`]) is a stack of raster layers
([`patch::PatchModule`]) made of cells ([`cells::PatchCell`]). Human
([`human::BaseHuman`]) holds human modules, named collections of actors,
and a network of links ([`links::LinkContainer`]).

Actors ([`actor::Actor`]) belong to a breed, carry free-form attributes
([`value::Value`]) and are located on at most one cell. They live in the
model's [`container::AgentsContainer`] and are handled by their
[`actor::ActorId`]. Cells are handled by their [`cells::CellRef`].

Time is discrete. Every step is one tick, which may stand for a calendar
duration ([`time::TimeDriver`]).

# 3. Process overview and scheduling

Each tick, the clock advances, dynamic variables are refreshed, the model,
nature and human step in that order, global variables are pushed to their
observers and the data collector records. Details are in [`model`].

# 4. Design concepts

Actors make [`decision::Decision`]s, select each other and cells through
[`sequences::ActorsList`], draw at random through [`random::ListRandom`]
from the model's seeded generator, and move on the grid ([`movement`]).

# 5. Initialization, input and observation

Everything configurable is read from one JSON settings tree
([`settings::Settings`]). Observation is done by the
[`datacollector::DataCollector`] and by periodic state snapshots
([`observation`]). Many runs over varied settings form an
[`experiment::Experiment`].

```rust
use abses::prelude::*;

struct Farmer;

impl Breed for Farmer {
    const NAME: &'static str = "Farmer";
}

struct Village;

impl Submodel for Village {
    fn setup(&mut self, model: &mut MainModel) -> Result<()> {
        let land = model.create_layer(LayerSpec::from_resolution("land", (5, 5)))?;
        model.nature.layer(land)?.random().new_actors::<Farmer>(model, 3)?;
        Ok(())
    }

    fn step(&mut self, model: &mut MainModel) -> Result<()> {
        for farmer in model.agents.get(&["Farmer"])? {
            model.move_random(farmer, None, true, 1)?;
        }
        Ok(())
    }
}

let mut model = MainModel::new(Settings::default()).unwrap();
model.run_model(&mut Village, Some(3)).unwrap();
assert_eq!(model.agents.has(&["Farmer"]).unwrap(), 3);
```
 */

pub mod error;
pub mod settings;
pub mod states;
pub mod value;

pub mod time;
pub mod dynamic;

pub mod geometry;
pub mod raster;

pub mod modules;
pub mod cells;
pub mod patch;
pub mod nature;

pub mod actor;
pub mod container;
pub mod movement;
pub mod decision;
pub mod notice;

pub mod sequences;
pub mod random;
pub mod links;
pub mod human;

pub mod model;
pub mod datacollector;
pub mod observation;
pub mod experiment;

pub mod cli;
pub mod demos;

pub mod prelude {
    pub use crate::actor::{Actor, ActorId, BaseActor, Breed, Target};
    pub use crate::cells::{CellRef, LayerId, PatchCell};
    pub use crate::container::AgentsContainer;
    pub use crate::datacollector::{AgentReporter, DataCollector, Reporter};
    pub use crate::decision::Decision;
    pub use crate::error::{AbsesError, Result};
    pub use crate::links::{LinkDirection, Node};
    pub use crate::model::MainModel;
    pub use crate::modules::{Idle, Submodel};
    pub use crate::movement::{Destination, Direction};
    pub use crate::nature::LayerSpec;
    pub use crate::patch::Where;
    pub use crate::random::{Choice, WhenEmpty};
    pub use crate::sequences::{ActorsList, How, Selection};
    pub use crate::settings::Settings;
    pub use crate::states::State;
    pub use crate::time::TimeDriver;
    pub use crate::value::Value;
}

#[cfg(test)]
mod tests;
