/*!
# Wolves, sheep and grass

Wolves and sheep wander randomly over a `grassland` layer. Each tick every
animal, in random order,

1. moves to a random Moore neighbor,
2. eats: a sheep grazes the grass of its cell, a wolf eats one sheep found
   on its cell, both gaining 2 energy,
3. reproduces with probability `model.rep_rate`, halving its energy and
   leaving the offspring on its cell,
4. loses 1 energy and dies when none is left.

Grazed cells grow back after `model.regrowth` ticks. The run stops when
either species is extinct or there are 400 sheep or more.

Initial energies are drawn from a normal distribution with mean 5 and
standard deviation `model.energy_sd` (0 by default), and never fall below 1.
 */

use crate::actor::{Actor, ActorId, Breed, Target};
use crate::cells::LayerId;
use crate::datacollector::{AgentReporter, Reporter};
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::modules::Submodel;
use crate::movement::Destination;
use crate::nature::LayerSpec;
use crate::random::WhenEmpty;
use crate::sequences::Selection;
use crate::value::Value;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const MAX_SHEEP: usize = 400;
const ENERGY: f64 = 5.;

pub struct Wolf;

impl Breed for Wolf {
    const NAME: &'static str = "Wolf";

    fn setup(actor: &mut Actor) {
        actor.set_own("energy", ENERGY);
    }
}

pub struct Sheep;

impl Breed for Sheep {
    const NAME: &'static str = "Sheep";

    fn setup(actor: &mut Actor) {
        actor.set_own("energy", ENERGY);
    }
}

#[derive(Debug, Clone)]
pub struct WolfSheep {
    layer: Option<LayerId>,
    rep_rate: f64,
    regrowth: i64,
}

impl Default for WolfSheep {
    fn default() -> Self {
        WolfSheep {
            layer: None,
            rep_rate: 0.05,
            regrowth: 5,
        }
    }
}

fn energy(model: &MainModel, id: ActorId) -> f64 {
    model
        .get(id, "energy", Target::Me)
        .ok()
        .flatten()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.)
}

fn add_energy(model: &mut MainModel, id: ActorId, delta: f64) -> Result<()> {
    let e = energy(model, id) + delta;
    model.set(id, "energy", e, Target::Me, false)
}

impl WolfSheep {
    fn eat(&self, model: &mut MainModel, id: ActorId) -> Result<()> {
        let at = match model.actor(id)?.at() {
            Some(at) => at,
            None => return Ok(()),
        };
        if model.actor(id)?.breed() == Sheep::NAME {
            if model.get(id, "empty", Target::Cell)? == Some(Value::Bool(false)) {
                model.set(id, "empty", true, Target::Cell, false)?;
                add_energy(model, id, 2.)?;
            }
            return Ok(());
        }
        let sheep = model
            .nature
            .cell(at)?
            .agents_list()
            .select(model, &Selection::Breed(Sheep::NAME.to_string()));
        if let Some(prey) = sheep.random().choice_one(model, WhenEmpty::ReturnEmpty)? {
            model.die(prey)?;
            add_energy(model, id, 2.)?;
        }
        Ok(())
    }

    fn reproduce(&self, model: &mut MainModel, id: ActorId) -> Result<()> {
        if model.rng.gen::<f64>() >= self.rep_rate {
            return Ok(());
        }
        let (breed, at) = {
            let actor = model.actor(id)?;
            (actor.breed().to_string(), actor.at())
        };
        let at = match at {
            Some(at) => at,
            None => return Ok(()),
        };
        let e = energy(model, id) / 2.;
        model.set(id, "energy", e, Target::Me, false)?;
        let offspring = if breed == Wolf::NAME {
            model.new_on_cell::<Wolf>(at, 1)?
        } else {
            model.new_on_cell::<Sheep>(at, 1)?
        };
        offspring.set(model, "energy", e)
    }

    fn animal_step(&self, model: &mut MainModel, id: ActorId) -> Result<()> {
        model.move_random(id, None, true, 1)?;
        self.eat(model, id)?;
        self.reproduce(model, id)?;
        add_energy(model, id, -1.)?;
        if energy(model, id) <= 0. {
            model.die(id)?;
        }
        Ok(())
    }

    fn grow_grass(&self, model: &mut MainModel) -> Result<()> {
        let layer = self
            .layer
            .ok_or_else(|| AbsesError::NotFound("The grassland is not set up yet.".to_string()))?;
        let regrowth = self.regrowth;
        for cell in model.nature.layer_mut(layer)?.cells_mut() {
            if cell.get("empty")?.truthy() {
                let countdown = cell.get("countdown")?.as_i64().unwrap_or(0);
                if countdown <= 0 {
                    cell.set("empty", false);
                    cell.set("countdown", regrowth);
                } else {
                    cell.set("countdown", countdown - 1);
                }
            }
        }
        Ok(())
    }

    fn count(&self, model: &mut MainModel) -> Result<(usize, usize)> {
        let n_sheep = model.agents.has(&[Sheep::NAME])?;
        let n_wolves = model.agents.has(&[Wolf::NAME])?;
        model.vars.insert("n_sheep".into(), Value::from(n_sheep));
        model.vars.insert("n_wolves".into(), Value::from(n_wolves));
        Ok((n_sheep, n_wolves))
    }
}

impl Submodel for WolfSheep {
    fn setup(&mut self, model: &mut MainModel) -> Result<()> {
        let params = model.params();
        let shape = params.get_shape("shape")?.unwrap_or((20, 20));
        let n_wolves = params.get_i64("n_wolves")?.unwrap_or(10).max(0) as usize;
        let n_sheep = params.get_i64("n_sheep")?.unwrap_or(50).max(0) as usize;
        let sd = params.get_f64("energy_sd")?.unwrap_or(0.);
        self.rep_rate = params.get_f64("rep_rate")?.unwrap_or(self.rep_rate);
        self.regrowth = params.get_i64("regrowth")?.unwrap_or(self.regrowth);

        let id = model.create_layer(LayerSpec::from_resolution("grassland", shape))?;
        let n_cells = shape.0 * shape.1;
        let layer = model.nature.layer_mut(id)?;
        layer.apply_values("empty", vec![Value::Bool(false); n_cells])?;
        layer.apply_values("countdown", vec![Value::Int(self.regrowth); n_cells])?;
        self.layer = Some(id);

        model.agents.register::<Wolf>();
        model.agents.register::<Sheep>();
        let mut animals: Vec<ActorId> = model.new_actors::<Wolf>(n_wolves)?.into_vec();
        animals.extend(model.new_actors::<Sheep>(n_sheep)?);
        let normal = Normal::new(ENERGY, sd)
            .map_err(|e| AbsesError::Params(format!("Invalid energy_sd {}: {}.", sd, e)))?;
        for animal in animals {
            model.move_to(animal, Destination::Random(id))?;
            let e = normal.sample(&mut model.rng).max(1.);
            model.set(animal, "energy", e, Target::Me, false)?;
        }

        model.datacollector.add_model_reporter("n_sheep", Reporter::attr("n_sheep"));
        model.datacollector.add_model_reporter("n_wolves", Reporter::attr("n_wolves"));
        model.datacollector.add_model_reporter(
            "grass",
            Reporter::func(move |m| {
                let grass = m
                    .nature
                    .layer(id)?
                    .cells()
                    .filter(|c| c.get("empty").map_or(false, |v| !v.truthy()))
                    .count();
                Ok(Value::from(grass))
            }),
        );
        model
            .datacollector
            .add_agent_reporter(Sheep::NAME, "energy", AgentReporter::attr("energy"));
        model.datacollector.add_final_reporter("n_sheep", Reporter::attr("n_sheep"));
        model.datacollector.add_final_reporter("n_wolves", Reporter::attr("n_wolves"));
        self.count(model)?;
        Ok(())
    }

    fn step(&mut self, model: &mut MainModel) -> Result<()> {
        let mut animals: Vec<ActorId> = model
            .agents
            .get(&[Wolf::NAME, Sheep::NAME])?
            .into_vec();
        animals.shuffle(&mut model.rng);
        for id in animals {
            if model.agents.contains(id) {
                self.animal_step(model, id)?;
            }
        }
        self.grow_grass(model)?;
        let (n_sheep, n_wolves) = self.count(model)?;
        if n_sheep == 0 || n_wolves == 0 || n_sheep >= MAX_SHEEP {
            model.running = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn model(n_wolves: usize, n_sheep: usize) -> MainModel {
        let settings = Settings::from(serde_json::json!({
            "model": {
                "shape": [5, 5],
                "n_wolves": n_wolves,
                "n_sheep": n_sheep,
                "rep_rate": 0.,
                "seed": 3
            }
        }));
        MainModel::new(settings).unwrap()
    }

    #[test]
    fn test_setup_places_everyone() {
        let mut model = model(2, 3);
        let mut ws = WolfSheep::default();
        ws.setup(&mut model).unwrap();
        assert_eq!(model.agents.len(), 5);
        assert!(model.agents.iter().all(|a| a.on_earth()));
        assert_eq!(model.attribute("n_sheep"), Value::from(3usize));
    }

    #[test]
    fn test_sheep_graze() {
        let mut model = model(0, 1);
        let mut ws = WolfSheep::default();
        ws.setup(&mut model).unwrap();
        let sheep = model.agents.get(&["Sheep"]).unwrap().as_slice()[0];
        ws.eat(&mut model, sheep).unwrap();
        assert_eq!(energy(&model, sheep), 7.);
        assert_eq!(model.get(sheep, "empty", Target::Cell).unwrap(), Some(Value::Bool(true)));
        ws.eat(&mut model, sheep).unwrap();
        assert_eq!(energy(&model, sheep), 7.);
    }

    #[test]
    fn test_wolf_eats_sheep_on_its_cell() {
        let mut model = model(1, 1);
        let mut ws = WolfSheep::default();
        ws.setup(&mut model).unwrap();
        let wolf = model.agents.get(&["Wolf"]).unwrap().as_slice()[0];
        let sheep = model.agents.get(&["Sheep"]).unwrap().as_slice()[0];
        let at = model.actor(wolf).unwrap().at().unwrap();
        model.move_to(sheep, Destination::Cell(at)).unwrap();
        ws.eat(&mut model, wolf).unwrap();
        assert!(!model.agents.contains(sheep));
        assert_eq!(energy(&model, wolf), 7.);
    }

    #[test]
    fn test_no_wolves_no_run() {
        let mut model = model(0, 4);
        model.run_model(&mut WolfSheep::default(), Some(10)).unwrap();
        assert_eq!(model.time.tick(), 1);
        assert_eq!(model.datacollector.get_model_vars()["n_sheep"].len(), 1);
    }

    #[test]
    fn test_grass_grows_back() {
        let mut model = model(0, 0);
        let mut ws = WolfSheep::default();
        ws.setup(&mut model).unwrap();
        let id = ws.layer.unwrap();
        let cell = crate::cells::CellRef::new(id, 0, 0);
        model.nature.cell_mut(cell).unwrap().set("empty", true);
        model.nature.cell_mut(cell).unwrap().set("countdown", 1i64);
        ws.grow_grass(&mut model).unwrap();
        assert_eq!(model.nature.cell(cell).unwrap().get("empty").unwrap(), &Value::Bool(true));
        ws.grow_grass(&mut model).unwrap();
        assert_eq!(model.nature.cell(cell).unwrap().get("empty").unwrap(), &Value::Bool(false));
    }
}
