/*!
# Nature

The nature branch of a model is a stack of raster layers. They usually
share one geometry, but need not; every actor lives on cells of one layer
only. The first layer created is the major layer unless another one is
marked as such, and gives the model its extent.
 */

use crate::cells::{CellRef, LayerId, PatchCell};
use crate::error::{AbsesError, Result};
use crate::geometry::{Point, Rect};
use crate::model::MainModel;
use crate::modules::{check_unique, ModuleInfo, Submodel};
use crate::patch::PatchModule;
use crate::sequences::ActorsList;
use crate::settings::Settings;
use crate::time::TimeDriver;
use std::fmt::Write;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerHow {
    FromResolution {
        shape: (usize, usize),
        resolution: f64,
        /// North-western corner. Defaults to placing the south-western
        /// corner at (0, 0).
        origin: Option<Point>,
    },
    /// Same geometry and mask as an existing layer.
    CopyLayer(LayerId),
    /// Unit cells, south-western corner at (0, 0).
    Empty { shape: (usize, usize) },
}

/**
How to create a raster layer.

```rust
# use abses::prelude::*;
let mut model = MainModel::new(Settings::default()).unwrap();
let land = model.nature.create_module(
    LayerSpec::from_resolution("land", (10, 20)).resolution(30.).capacity(Some(1)),
).unwrap();
let water = model.nature.create_module(LayerSpec::copy_layer("water", land)).unwrap();
assert_eq!(model.nature.major_layer().unwrap().id(), land);
assert_eq!(model.nature.layer(water).unwrap().shape2d(), (10, 20));
assert_eq!(model.nature.total_bounds().unwrap().width(), 600.);
```
 */
pub struct LayerSpec {
    name: String,
    how: LayerHow,
    major: bool,
    capacity: Option<usize>,
    submodel: Option<Box<dyn Submodel>>,
}

impl LayerSpec {
    fn with_how(name: &str, how: LayerHow) -> LayerSpec {
        LayerSpec {
            name: name.to_string(),
            how,
            major: false,
            capacity: None,
            submodel: None,
        }
    }

    pub fn from_resolution(name: &str, shape: (usize, usize)) -> LayerSpec {
        LayerSpec::with_how(
            name,
            LayerHow::FromResolution {
                shape,
                resolution: 1.,
                origin: None,
            },
        )
    }

    pub fn copy_layer(name: &str, layer: LayerId) -> LayerSpec {
        LayerSpec::with_how(name, LayerHow::CopyLayer(layer))
    }

    pub fn empty(name: &str, shape: (usize, usize)) -> LayerSpec {
        LayerSpec::with_how(name, LayerHow::Empty { shape })
    }

    pub fn resolution(mut self, value: f64) -> LayerSpec {
        if let LayerHow::FromResolution { resolution, .. } = &mut self.how {
            *resolution = value;
        }
        self
    }

    pub fn origin(mut self, point: Point) -> LayerSpec {
        if let LayerHow::FromResolution { origin, .. } = &mut self.how {
            *origin = Some(point);
        }
        self
    }

    pub fn major(mut self) -> LayerSpec {
        self.major = true;
        self
    }

    /// Maximum number of actors per cell.
    pub fn capacity(mut self, max: Option<usize>) -> LayerSpec {
        self.capacity = max;
        self
    }

    pub fn with_submodel<S: Submodel + 'static>(mut self, submodel: S) -> LayerSpec {
        self.submodel = Some(Box::new(submodel));
        self
    }
}

pub struct BaseNature {
    pub(crate) info: ModuleInfo,
    settings: Settings,
    layers: Vec<PatchModule>,
    major: Option<LayerId>,
    pub(crate) submodel: Option<Box<dyn Submodel>>,
}

impl BaseNature {
    pub fn new(settings: &Settings) -> Result<BaseNature> {
        Ok(BaseNature {
            info: ModuleInfo::new("nature", settings)?,
            settings: settings.clone(),
            layers: Vec::new(),
            major: None,
            submodel: None,
        })
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Add a layer. Its parameters are read from the settings section of
    /// the same name.
    pub fn create_module(&mut self, spec: LayerSpec) -> Result<LayerId> {
        check_unique(self.layers.iter().map(PatchModule::name), &spec.name)?;
        let id = self.layers.len();
        let info = ModuleInfo::new(&spec.name, &self.settings)?;
        let mut layer = match spec.how {
            LayerHow::FromResolution {
                shape,
                resolution,
                origin,
            } => {
                let origin = origin.unwrap_or(Point {
                    x: 0.,
                    y: shape.0 as f64 * resolution,
                });
                PatchModule::from_resolution(id, info, shape, resolution, origin)?
            }
            LayerHow::Empty { shape } => PatchModule::from_resolution(
                id,
                info,
                shape,
                1.,
                Point {
                    x: 0.,
                    y: shape.0 as f64,
                },
            )?,
            LayerHow::CopyLayer(other) => PatchModule::copy_layer(id, info, self.layer(other)?)?,
        };
        if spec.capacity.is_some() {
            layer.set_cell_capacity(spec.capacity);
        }
        layer.submodel = spec.submodel;
        if spec.major || self.major.is_none() {
            self.major = Some(id);
        }
        info!(layer = %layer.name(), shape = ?layer.shape2d(), "layer created");
        self.layers.push(layer);
        Ok(id)
    }

    pub fn layer(&self, id: LayerId) -> Result<&PatchModule> {
        self.layers
            .get(id)
            .ok_or_else(|| AbsesError::NotFound(format!("Layer {} not found.", id)))
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Result<&mut PatchModule> {
        self.layers
            .get_mut(id)
            .ok_or_else(|| AbsesError::NotFound(format!("Layer {} not found.", id)))
    }

    pub fn layer_id(&self, name: &str) -> Result<LayerId> {
        self.layers
            .iter()
            .position(|l| l.name() == name)
            .ok_or_else(|| AbsesError::NotFound(format!("Layer '{}' not found.", name)))
    }

    pub fn layer_by_name(&self, name: &str) -> Result<&PatchModule> {
        self.layer(self.layer_id(name)?)
    }

    pub fn layers(&self) -> &[PatchModule] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [PatchModule] {
        &mut self.layers
    }

    pub fn major_layer(&self) -> Option<&PatchModule> {
        self.major.and_then(|id| self.layers.get(id))
    }

    pub fn total_bounds(&self) -> Option<Rect> {
        self.major_layer().map(PatchModule::bounds)
    }

    pub fn cell(&self, at: CellRef) -> Result<&PatchCell> {
        let layer = self.layer(at.layer)?;
        layer.cell(at.row, at.col).ok_or_else(|| {
            AbsesError::Location(format!("{} is outside of layer '{}'.", at, layer.name()))
        })
    }

    pub fn cell_mut(&mut self, at: CellRef) -> Result<&mut PatchCell> {
        let layer = self.layer_mut(at.layer)?;
        let name = layer.name().to_string();
        layer
            .cell_mut(at.row, at.col)
            .ok_or_else(|| AbsesError::Location(format!("{} is outside of layer '{}'.", at, name)))
    }

    /// The neighborhood of a cell, on the cell's own layer.
    pub fn neighboring(
        &self,
        at: CellRef,
        moore: bool,
        radius: usize,
        include_center: bool,
        annular: bool,
    ) -> Result<ActorsList<CellRef>> {
        self.layer(at.layer)?
            .neighboring(at, moore, radius, include_center, annular)
    }

    /// Recompute the dynamic variables of every layer.
    pub fn update_dynamic(&mut self, time: &TimeDriver) -> Result<()> {
        for layer in self.layers.iter_mut() {
            layer.update_dynamic(time)?;
        }
        Ok(())
    }

    /// Open or close nature together with all its layers.
    pub fn set_opening(&mut self, value: bool) {
        self.info.set_opening(value);
        for layer in self.layers.iter_mut() {
            layer.info.set_opening(value);
        }
    }

    pub fn modules_summary(&self) -> String {
        let mut out = String::new();
        for layer in self.layers.iter() {
            let _ = writeln!(
                out,
                "{:<12} {:<8} {:<8} {:?}",
                layer.name(),
                if layer.info.opening() { "open" } else { "closed" },
                layer.info.state().name(),
                layer.shape2d()
            );
        }
        out
    }
}

impl MainModel {
    /// Add a layer and run the initialize hook of its submodel.
    pub fn create_layer(&mut self, spec: LayerSpec) -> Result<LayerId> {
        let id = self.nature.create_module(spec)?;
        let submodel = self.nature.layer_mut(id)?.submodel.take();
        if let Some(mut submodel) = submodel {
            let result = submodel.initialize(self);
            self.nature.layer_mut(id)?.submodel = Some(submodel);
            result?;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names_and_lookup() {
        let mut nature = BaseNature::new(&Settings::default()).unwrap();
        let a = nature.create_module(LayerSpec::from_resolution("a", (2, 2))).unwrap();
        let b = nature.create_module(LayerSpec::empty("b", (3, 3)).major()).unwrap();
        assert!(nature.create_module(LayerSpec::empty("a", (1, 1))).is_err());
        assert_eq!(nature.layer_id("b").unwrap(), b);
        assert_eq!(nature.layer_by_name("a").unwrap().id(), a);
        assert_eq!(nature.major_layer().unwrap().name(), "b");
        assert!(nature.layer(7).is_err());
        assert!(nature.cell(CellRef::new(a, 2, 0)).is_err());
        assert!(nature.cell(CellRef::new(b, 2, 0)).is_ok());
        let around = nature.neighboring(CellRef::new(b, 1, 1), true, 1, false, false).unwrap();
        assert_eq!(around.len(), 8);
    }

    #[test]
    fn test_opening_propagates() {
        let mut nature = BaseNature::new(&Settings::default()).unwrap();
        nature.create_module(LayerSpec::empty("a", (1, 1))).unwrap();
        nature.set_opening(false);
        assert!(!nature.layers()[0].info().opening());
        assert!(nature.modules_summary().contains("closed"));
    }
}
