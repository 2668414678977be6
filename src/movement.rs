/*!
# Movement

Actors live on at most one cell at a time. Moving keeps the actor's own
location and the cell's list of actors in sync, and never leaves the layer
the actor is on: the grid has hard edges.
 */

use crate::actor::ActorId;
use crate::cells::{CellRef, LayerId};
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::random::{Choice, WhenEmpty};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Cell(CellRef),
    /// Indices on the layer the actor is on.
    Pos(usize, usize),
    PosIn(LayerId, usize, usize),
    /// A random unmasked cell of the layer.
    Random(LayerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    /// Row and column step.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::UpLeft => (-1, -1),
            Direction::UpRight => (-1, 1),
            Direction::DownLeft => (1, -1),
            Direction::DownRight => (1, 1),
        }
    }
}

impl MainModel {
    fn resolve(&mut self, id: ActorId, destination: Destination) -> Result<CellRef> {
        let current = self.actor(id)?.at();
        match destination {
            Destination::Cell(cell) => Ok(cell),
            Destination::PosIn(layer, row, col) => Ok(CellRef::new(layer, row, col)),
            Destination::Pos(row, col) => {
                let layer = current.map(|c| c.layer).ok_or_else(|| {
                    AbsesError::Location(format!(
                        "Actor {} is not on any layer; give the layer to move to.",
                        id
                    ))
                })?;
                Ok(CellRef::new(layer, row, col))
            }
            Destination::Random(layer) => {
                let random = self.nature.layer(layer)?.random();
                random.choice_one(self, WhenEmpty::Raise)?.ok_or_else(|| {
                    AbsesError::Location(format!("No cell to move to on layer {}.", layer))
                })
            }
        }
    }

    /**
    Move actor `id` to a cell. Returns `Ok(false)` if the actor's breed
    refuses the cell.
     */
    pub fn move_to(&mut self, id: ActorId, destination: Destination) -> Result<bool> {
        let target = self.resolve(id, destination)?;
        let actor = self.actor(id)?;
        let current = actor.at();
        if let Some(cur) = current {
            if cur.layer != target.layer {
                return Err(AbsesError::Location(format!(
                    "{} is on layer {} and cannot move to layer {}.",
                    actor, cur.layer, target.layer
                )));
            }
        }
        let cell = self.nature.cell(target)?;
        if let Some(breed) = self.agents.breed_info(actor.breed()) {
            if !(breed.moving)(actor, cell) {
                return Ok(false);
            }
        }
        if current == Some(target) {
            return Ok(true);
        }
        if cell.is_full() {
            return Err(AbsesError::Capacity(format!("{} is full.", target)));
        }
        if let Some(cur) = current {
            self.nature.cell_mut(cur)?.remove_agent(id)?;
        }
        self.nature.cell_mut(target)?.add_agent(id)?;
        self.actor_mut(id)?.cell = Some(target);
        Ok(true)
    }

    /// Take actor `id` off its cell, if it is on one.
    pub fn move_off(&mut self, id: ActorId) -> Result<()> {
        if let Some(cur) = self.actor(id)?.at() {
            self.nature.cell_mut(cur)?.remove_agent(id)?;
            self.actor_mut(id)?.cell = None;
        }
        Ok(())
    }

    /// Move `distance` cells in one direction. Leaving the grid is an error.
    pub fn move_by(&mut self, id: ActorId, direction: Direction, distance: usize) -> Result<bool> {
        let cur = self.actor(id)?.at().ok_or_else(|| {
            AbsesError::Location(format!("Actor {} is not located on any cell.", id))
        })?;
        let (dr, dc) = direction.offset();
        let too_far = || {
            AbsesError::Location(format!(
                "Moving {:?} by {} leaves the grid.",
                direction, distance
            ))
        };
        let steps = i64::try_from(distance).map_err(|_| too_far())?;
        let shift = |from: usize, d: i64| {
            d.checked_mul(steps)
                .and_then(|off| (from as i64).checked_add(off))
                .ok_or_else(too_far)
        };
        let row = shift(cur.row, dr)?;
        let col = shift(cur.col, dc)?;
        let layer = self.nature.layer(cur.layer)?;
        if layer.out_of_bounds(row, col) {
            return Err(AbsesError::Location(format!(
                "Moving {:?} by {} leaves layer '{}' at ({}, {}).",
                direction,
                distance,
                layer.name(),
                row,
                col
            )));
        }
        self.move_to(id, Destination::PosIn(cur.layer, row as usize, col as usize))
    }

    /**
    Move to a random neighboring cell, weighted by the cell attribute
    `prob` if given. Returns `Ok(false)` if there is nowhere to go.
     */
    pub fn move_random(&mut self, id: ActorId, prob: Option<&str>, moore: bool, radius: usize) -> Result<bool> {
        let cur = self.actor(id)?.at().ok_or_else(|| {
            AbsesError::Location(format!("Actor {} is not located on any cell.", id))
        })?;
        let neighbors = self
            .nature
            .layer(cur.layer)?
            .neighboring(cur, moore, radius, false, false)?;
        let weights = match prob {
            Some(attr) => Some(neighbors.array(self, attr)?),
            None => None,
        };
        let choice = Choice {
            prob: weights,
            when_empty: WhenEmpty::ReturnEmpty,
            ..Choice::default()
        };
        match neighbors.random().choice(self, &choice)?.iter().next() {
            Some(cell) => self.move_to(id, Destination::Cell(*cell)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, BaseActor, Breed};
    use crate::cells::PatchCell;
    use crate::nature::LayerSpec;
    use crate::settings::Settings;
    use crate::value::Value;

    struct Picky;

    impl Breed for Picky {
        const NAME: &'static str = "Picky";

        fn moving(_actor: &Actor, cell: &PatchCell) -> bool {
            cell.indices() != (0, 0)
        }
    }

    fn model() -> (MainModel, LayerId) {
        let mut model = MainModel::new(Settings::default()).unwrap();
        let id = model
            .nature
            .create_module(LayerSpec::from_resolution("land", (3, 3)))
            .unwrap();
        (model, id)
    }

    #[test]
    fn test_move_and_leave() {
        let (mut model, layer) = model();
        let a = model.new_actor::<BaseActor>().unwrap();
        assert!(model.move_to(a, Destination::PosIn(layer, 1, 1)).unwrap());
        assert!(model.move_to(a, Destination::Pos(0, 1)).unwrap());
        let old = model.nature.cell(CellRef::new(layer, 1, 1)).unwrap();
        assert!(old.is_empty());
        let new = model.nature.cell(CellRef::new(layer, 0, 1)).unwrap();
        assert_eq!(new.agents(), &[a]);
        model.move_off(a).unwrap();
        assert!(!model.actor(a).unwrap().on_earth());
        assert!(model.nature.cell(CellRef::new(layer, 0, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_move_by_directions() {
        let (mut model, layer) = model();
        let a = model.new_actor::<BaseActor>().unwrap();
        model.move_to(a, Destination::PosIn(layer, 1, 1)).unwrap();
        model.move_by(a, Direction::Up, 1).unwrap();
        assert_eq!(model.actor(a).unwrap().indices(), Some((0, 1)));
        model.move_by(a, Direction::DownRight, 1).unwrap();
        assert_eq!(model.actor(a).unwrap().indices(), Some((1, 2)));
        assert!(model.move_by(a, Direction::Right, 1).is_err());
        assert_eq!(model.actor(a).unwrap().indices(), Some((1, 2)));
    }

    #[test]
    fn test_move_by_huge_distance() {
        let (mut model, layer) = model();
        let a = model.new_actor::<BaseActor>().unwrap();
        model.move_to(a, Destination::PosIn(layer, 1, 1)).unwrap();
        assert!(matches!(
            model.move_by(a, Direction::Right, usize::MAX),
            Err(AbsesError::Location(_))
        ));
        assert!(matches!(
            model.move_by(a, Direction::UpLeft, i64::MAX as usize),
            Err(AbsesError::Location(_))
        ));
        assert_eq!(model.actor(a).unwrap().indices(), Some((1, 1)));
    }

    #[test]
    fn test_veto_and_capacity() {
        let (mut model, layer) = model();
        let p = model.new_actor::<Picky>().unwrap();
        assert!(!model.move_to(p, Destination::PosIn(layer, 0, 0)).unwrap());
        assert!(!model.actor(p).unwrap().on_earth());

        model.nature.layer_mut(layer).unwrap().set_cell_capacity(Some(1));
        let cell = CellRef::new(layer, 2, 2);
        model.new_on_cell::<BaseActor>(cell, 1).unwrap();
        let err = model.new_on_cell::<BaseActor>(cell, 1).unwrap_err();
        assert!(err.to_string().ends_with("is full."));
        assert_eq!(model.agents.len(), 2);
    }

    #[test]
    fn test_no_layer_crossing() {
        let (mut model, layer) = model();
        let other = model
            .nature
            .create_module(LayerSpec::copy_layer("water", layer))
            .unwrap();
        let a = model.new_actor::<BaseActor>().unwrap();
        model.move_to(a, Destination::PosIn(layer, 0, 0)).unwrap();
        assert!(model.move_to(a, Destination::PosIn(other, 0, 0)).is_err());
        assert!(model.move_to(a, Destination::PosIn(layer, 5, 5)).is_err());
    }

    #[test]
    fn test_move_random_follows_weights() {
        let (mut model, layer) = model();
        let values: Vec<Value> = (0..9).map(|i| Value::from(if i == 5 { 1. } else { 0. })).collect();
        model
            .nature
            .layer_mut(layer)
            .unwrap()
            .apply_values("food", values)
            .unwrap();
        let a = model.new_actor::<BaseActor>().unwrap();
        model.move_to(a, Destination::PosIn(layer, 1, 1)).unwrap();
        assert!(model.move_random(a, Some("food"), true, 1).unwrap());
        assert_eq!(model.actor(a).unwrap().indices(), Some((1, 2)));
    }
}
