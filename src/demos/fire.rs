/*!
# Forest fire

Trees are planted on a random share (`model.density`) of a
`model.shape` grid. The trees of the westernmost column are set on fire.
Every tick, each burning tree ignites its intact von Neumann neighbors and
then burns down. Scorched trees cannot burn again, so the fire dies out
after at most as many ticks as the grid has cells.

All trees burning in a tick are determined before any of them spreads the
fire, so a tree ignited in a tick only starts to spread in the next one.
 */

use crate::cells::{CellRef, LayerId};
use crate::datacollector::Reporter;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::modules::Submodel;
use crate::nature::LayerSpec;
use crate::patch::Where;
use crate::random::Choice;
use crate::sequences::{ActorsList, Selection};
use crate::value::Value;
use tracing::info;

pub const EMPTY: i64 = 0;
pub const TREE: i64 = 1;
pub const BURNING: i64 = 2;
pub const SCORCHED: i64 = 3;

#[derive(Debug, Default)]
pub struct Forest {
    layer: Option<LayerId>,
}

impl Forest {
    pub fn layer(&self) -> Result<LayerId> {
        self.layer
            .ok_or_else(|| AbsesError::NotFound("The forest is not set up yet.".to_string()))
    }
}

fn cells_in_state(model: &MainModel, layer: LayerId, state: i64) -> Result<ActorsList<CellRef>> {
    let all = model.nature.layer(layer)?.select(&Where::All)?;
    Ok(all.select(model, &Selection::Attrs(vec![("state".into(), Value::Int(state))])))
}

/// Number of cells of the first layer in `state`.
pub fn count(model: &MainModel, state: i64) -> Result<usize> {
    match model.nature.major_layer() {
        Some(layer) => Ok(cells_in_state(model, layer.id(), state)?.len()),
        None => Ok(0),
    }
}

impl Submodel for Forest {
    fn setup(&mut self, model: &mut MainModel) -> Result<()> {
        let params = model.params();
        let shape = params.get_shape("shape")?.unwrap_or((100, 100));
        let density = params.get_f64("density")?.unwrap_or(0.7);
        if !(0. ..=1.).contains(&density) {
            return Err(AbsesError::Params(format!(
                "Density must be in [0, 1], got {}.",
                density
            )));
        }
        let id = model.create_layer(LayerSpec::from_resolution("forest", shape).major())?;
        let n_cells = shape.0 * shape.1;
        model
            .nature
            .layer_mut(id)?
            .apply_values("state", vec![Value::Int(EMPTY); n_cells])?;

        let num_trees = (n_cells as f64 * density) as usize;
        let chosen = model.nature.layer(id)?.random().choice(model, &Choice::size(num_trees))?;
        chosen.set(model, "state", TREE)?;

        let leftmost = model.nature.layer(id)?.column(0);
        let trees = leftmost.select(model, &Selection::Attrs(vec![("state".into(), Value::Int(TREE))]));
        trees.set(model, "state", BURNING)?;
        info!(trees = num_trees, ignited = trees.len(), "forest planted");

        for (name, state) in [("burned", SCORCHED), ("burning", BURNING), ("trees", TREE)] {
            model
                .datacollector
                .add_model_reporter(name, Reporter::func(move |m| Ok(Value::from(count(m, state)?))));
        }
        model.datacollector.add_final_reporter(
            "burned_rate",
            Reporter::func(move |m| {
                let burned = count(m, SCORCHED)? as f64;
                let total = burned + count(m, TREE)? as f64 + count(m, BURNING)? as f64;
                Ok(Value::from(if total > 0. { burned / total } else { 0. }))
            }),
        );
        self.layer = Some(id);
        Ok(())
    }

    fn step(&mut self, model: &mut MainModel) -> Result<()> {
        let id = self.layer()?;
        let burning = cells_in_state(model, id, BURNING)?;
        if burning.is_empty() {
            model.running = false;
            return Ok(());
        }
        let intact = Selection::Attrs(vec![("state".into(), Value::Int(TREE))]);
        for cell in burning.iter().copied() {
            let neighbors = model.nature.layer(id)?.neighboring(cell, false, 1, false, false)?;
            neighbors.select(model, &intact).set(model, "state", BURNING)?;
            model.nature.cell_mut(cell)?.set("state", SCORCHED);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn forest(density: f64) -> MainModel {
        let settings = Settings::from(serde_json::json!({
            "model": {"shape": [10, 10], "density": density, "seed": 7}
        }));
        MainModel::new(settings).unwrap()
    }

    #[test]
    fn test_planting() {
        let mut model = forest(0.5);
        let mut fire = Forest::default();
        fire.setup(&mut model).unwrap();
        let planted = count(&model, TREE).unwrap() + count(&model, BURNING).unwrap();
        assert_eq!(planted, 50);
        assert_eq!(count(&model, EMPTY).unwrap(), 50);
    }

    #[test]
    fn test_full_forest_burns_column_by_column() {
        let mut model = forest(1.);
        let mut fire = Forest::default();
        fire.setup(&mut model).unwrap();
        assert_eq!(count(&model, BURNING).unwrap(), 10);
        fire.step(&mut model).unwrap();
        assert_eq!(count(&model, SCORCHED).unwrap(), 10);
        assert_eq!(count(&model, BURNING).unwrap(), 10);
        let id = fire.layer().unwrap();
        let second = model.nature.layer(id).unwrap().column(1);
        assert_eq!(second.array(&model, "state").unwrap(), vec![BURNING as f64; 10]);
    }

    #[test]
    fn test_fire_stops_when_nothing_burns() {
        let mut model = forest(0.);
        let report = model.run_model(&mut Forest::default(), Some(20)).unwrap();
        assert_eq!(model.time.tick(), 1);
        assert_eq!(report["burned_rate"], Value::Float(0.));
    }
}
