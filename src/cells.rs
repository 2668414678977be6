use crate::actor::ActorId;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::patch::PatchModule;
use crate::sequences::ActorsList;
use crate::value::{Attributes, Value};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

pub type LayerId = usize;

/// Handle of one cell: the layer it belongs to and its row/column indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub layer: LayerId,
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(layer: LayerId, row: usize, col: usize) -> CellRef {
        CellRef { layer, row, col }
    }

    pub fn indices(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// The cells around this one, on its own layer.
    pub fn neighboring(
        &self,
        model: &MainModel,
        moore: bool,
        radius: usize,
        include_center: bool,
        annular: bool,
    ) -> Result<ActorsList<CellRef>> {
        model
            .nature
            .neighboring(*self, moore, radius, include_center, annular)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Cell at {}[{}, {}]>", self.layer, self.row, self.col)
    }
}

/**
A patch of a raster layer.

Cells carry named attributes, which the layer can read and write as whole
rasters, and know which actors are currently located on them.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchCell {
    at: CellRef,
    pub attrs: Attributes,
    agents: Vec<ActorId>,
    max_agents: Option<usize>,
}

impl PatchCell {
    pub(crate) fn new(at: CellRef) -> PatchCell {
        PatchCell {
            at,
            attrs: Attributes::default(),
            agents: Vec::new(),
            max_agents: None,
        }
    }

    pub fn cell_ref(&self) -> CellRef {
        self.at
    }

    pub fn indices(&self) -> (usize, usize) {
        self.at.indices()
    }

    pub fn layer(&self) -> LayerId {
        self.at.layer
    }

    pub fn has(&self, attr: &str) -> bool {
        self.attrs.contains_key(attr)
    }

    pub fn get(&self, attr: &str) -> Result<&Value> {
        self.attrs
            .get(attr)
            .ok_or_else(|| AbsesError::Attribute(format!("{} has no attribute '{}'.", self.at, attr)))
    }

    pub fn set<V: Into<Value>>(&mut self, attr: &str, value: V) {
        self.attrs.insert(attr.to_string(), value.into());
    }

    /// Actors located here, in order of arrival.
    pub fn agents(&self) -> &[ActorId] {
        &self.agents
    }

    pub fn agents_list(&self) -> ActorsList<ActorId> {
        ActorsList::from(self.agents.clone())
    }

    pub fn has_agent(&self, id: ActorId) -> bool {
        self.agents.contains(&id)
    }

    pub fn max_agents(&self) -> Option<usize> {
        self.max_agents
    }

    pub fn set_max_agents(&mut self, max: Option<usize>) {
        self.max_agents = max;
    }

    pub fn is_full(&self) -> bool {
        self.max_agents.map_or(false, |m| self.agents.len() >= m)
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The cells around this one. `layer` must be the layer the cell is on.
    pub fn neighboring(
        &self,
        layer: &PatchModule,
        moore: bool,
        radius: usize,
        include_center: bool,
        annular: bool,
    ) -> Result<ActorsList<CellRef>> {
        if layer.id() != self.at.layer {
            return Err(AbsesError::Location(format!(
                "{} is not on layer '{}'.",
                self.at,
                layer.name()
            )));
        }
        layer.neighboring(self.at, moore, radius, include_center, annular)
    }

    pub(crate) fn add_agent(&mut self, id: ActorId) -> Result<()> {
        if self.has_agent(id) {
            return Ok(());
        }
        if self.is_full() {
            return Err(AbsesError::Capacity(format!("{} is full.", self.at)));
        }
        self.agents.push(id);
        Ok(())
    }

    pub(crate) fn remove_agent(&mut self, id: ActorId) -> Result<()> {
        match self.agents.iter().position(|a| *a == id) {
            Some(i) => {
                self.agents.remove(i);
                Ok(())
            }
            None => Err(AbsesError::Location(format!(
                "Actor {} is not on {}.",
                id, self.at
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nature::LayerSpec;
    use crate::settings::Settings;

    #[test]
    fn test_cell_neighbors() {
        let mut model = MainModel::new(Settings::default()).unwrap();
        let land = model.create_layer(LayerSpec::from_resolution("land", (3, 3))).unwrap();
        let water = model.create_layer(LayerSpec::from_resolution("water", (3, 3))).unwrap();
        let layer = model.nature.layer(land).unwrap();
        let corner = layer.cell(0, 0).unwrap();
        let around: Vec<CellRef> = corner.neighboring(layer, false, 1, false, false).unwrap().into_vec();
        assert_eq!(around, vec![CellRef::new(land, 0, 1), CellRef::new(land, 1, 0)]);
        assert!(corner
            .neighboring(model.nature.layer(water).unwrap(), false, 1, false, false)
            .is_err());

        let center = CellRef::new(land, 1, 1);
        assert_eq!(center.neighboring(&model, true, 1, true, false).unwrap().len(), 9);
        assert_eq!(center.neighboring(&model, true, 2, false, true).unwrap().len(), 0);
    }
}
