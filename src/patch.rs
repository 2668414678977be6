/*!
# Raster layers

A `PatchModule` is a regular grid of [`PatchCell`]s. Row 0 is the northern
edge, so that the cell at indices `(row, col)` has the real-world center

```text
x = origin.x + (col + 0.5) · resolution
y = origin.y − (row + 0.5) · resolution
```

where `origin` is the north-western corner of the layer. The grid position
`pos` counts from the south-western corner instead: `pos = (col, height − 1 − row)`.
 */

use crate::cells::{CellRef, LayerId, PatchCell};
use crate::dynamic::{DynamicVariable, DynamicVariables};
use crate::error::{AbsesError, Result};
use crate::geometry::{Point, Rect};
use crate::modules::{ModuleInfo, Submodel};
use crate::random::ListRandom;
use crate::raster::Raster;
use crate::sequences::ActorsList;
use crate::time::TimeDriver;
use crate::value::Value;
use bitvec::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Which cells of a layer to select.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// Every unmasked cell.
    All,
    /// Cells whose attribute is truthy.
    Attr(String),
    /// A row-major boolean array of the layer's size.
    Mask(Vec<bool>),
    /// Cells whose center lies in the rectangle.
    Within(Rect),
}

const VON_NEUMANN: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const MOORE: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub struct PatchModule {
    pub(crate) info: ModuleInfo,
    id: LayerId,
    height: usize,
    width: usize,
    resolution: f64,
    origin: Point,
    cells: Vec<PatchCell>,
    mask: BitVec,
    attributes: BTreeSet<String>,
    dynamic_variables: DynamicVariables<PatchModule, Raster>,
    pub(crate) submodel: Option<Box<dyn Submodel>>,
}

impl PatchModule {
    pub(crate) fn from_resolution(
        id: LayerId,
        info: ModuleInfo,
        shape: (usize, usize),
        resolution: f64,
        origin: Point,
    ) -> Result<PatchModule> {
        let (height, width) = shape;
        if height == 0 || width == 0 {
            return Err(AbsesError::Shape(format!(
                "Layer shape must be positive, got ({}, {}).",
                height, width
            )));
        }
        if !(resolution > 0.) {
            return Err(AbsesError::Params(format!(
                "Resolution must be positive, got {}.",
                resolution
            )));
        }
        let cells = (0..height * width)
            .map(|i| PatchCell::new(CellRef::new(id, i / width, i % width)))
            .collect();
        Ok(PatchModule {
            info,
            id,
            height,
            width,
            resolution,
            origin,
            cells,
            mask: BitVec::repeat(true, height * width),
            attributes: BTreeSet::new(),
            dynamic_variables: DynamicVariables::default(),
            submodel: None,
        })
    }

    /// A new empty layer with the geometry and mask of `other`.
    pub(crate) fn copy_layer(id: LayerId, info: ModuleInfo, other: &PatchModule) -> Result<PatchModule> {
        let mut layer = PatchModule::from_resolution(
            id,
            info,
            other.shape2d(),
            other.resolution,
            other.origin,
        )?;
        layer.mask = other.mask.clone();
        Ok(layer)
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    pub fn shape2d(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn shape3d(&self) -> (usize, usize, usize) {
        (1, self.height, self.width)
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y - self.height as f64 * self.resolution,
            self.origin.x + self.width as f64 * self.resolution,
            self.origin.y,
        )
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub fn out_of_bounds(&self, row: i64, col: i64) -> bool {
        row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64
    }

    pub fn cells(&self) -> impl Iterator<Item = &PatchCell> {
        self.cells.iter()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut PatchCell> {
        self.cells.iter_mut()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&PatchCell> {
        if row < self.height && col < self.width {
            self.cells.get(self.index(row, col))
        } else {
            None
        }
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut PatchCell> {
        if row < self.height && col < self.width {
            let i = self.index(row, col);
            self.cells.get_mut(i)
        } else {
            None
        }
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, col: usize) -> ActorsList<CellRef> {
        (0..self.height)
            .filter(|_| col < self.width)
            .map(|row| CellRef::new(self.id, row, col))
            .collect()
    }

    /// All cells of one row, west to east.
    pub fn row(&self, row: usize) -> ActorsList<CellRef> {
        (0..self.width)
            .filter(|_| row < self.height)
            .map(|col| CellRef::new(self.id, row, col))
            .collect()
    }

    /// Grid position counted from the south-western corner.
    pub fn pos(&self, row: usize, col: usize) -> (usize, usize) {
        (col, self.height - 1 - row)
    }

    /// Indices of a grid position, the inverse of `pos`.
    pub fn indices_of(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        if x < self.width && y < self.height {
            Some((self.height - 1 - y, x))
        } else {
            None
        }
    }

    /// Real-world coordinate of the cell center.
    pub fn coordinate(&self, row: usize, col: usize) -> Point {
        Point {
            x: self.origin.x + (col as f64 + 0.5) * self.resolution,
            y: self.origin.y - (row as f64 + 0.5) * self.resolution,
        }
    }

    /// Indices of the cell containing a real-world coordinate.
    pub fn transform_coord(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin.x) / self.resolution).floor();
        let row = ((self.origin.y - y) / self.resolution).floor();
        if !col.is_finite() || !row.is_finite() || self.out_of_bounds(row as i64, col as i64) {
            None
        } else {
            Some((row as usize, col as usize))
        }
    }

    pub fn mask(&self) -> &BitSlice {
        &self.mask
    }

    pub fn set_mask(&mut self, mask: &[bool]) -> Result<()> {
        if mask.len() != self.cells.len() {
            return Err(AbsesError::Shape(format!(
                "Mask of length {} does not fit layer {:?}.",
                mask.len(),
                self.shape2d()
            )));
        }
        self.mask = mask.iter().copied().collect();
        Ok(())
    }

    /// Limit how many actors each cell can hold.
    pub fn set_cell_capacity(&mut self, max: Option<usize>) {
        for cell in self.cells.iter_mut() {
            cell.set_max_agents(max);
        }
    }

    /// Names of the attributes written as rasters or carried by any cell.
    pub fn attributes(&self) -> BTreeSet<String> {
        let mut names = self.attributes.clone();
        for cell in self.cells.iter() {
            names.extend(cell.attrs.keys().cloned());
        }
        names
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.contains(attr) || self.cells.iter().any(|c| c.has(attr))
    }

    pub fn apply_raster(&mut self, raster: &Raster, attr: &str) -> Result<()> {
        if raster.shape3d() != self.shape3d() {
            return Err(AbsesError::Shape(format!(
                "Raster of shape {:?} does not fit layer '{}' of shape {:?}.",
                raster.shape3d(),
                self.name(),
                self.shape3d()
            )));
        }
        for (cell, x) in self.cells.iter_mut().zip(raster.data()) {
            cell.set(attr, *x);
        }
        self.attributes.insert(attr.to_string());
        Ok(())
    }

    /// Write one value per cell, in row-major order.
    pub fn apply_values(&mut self, attr: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.cells.len() {
            return Err(AbsesError::Shape(format!(
                "{} values do not fit layer '{}' of shape {:?}.",
                values.len(),
                self.name(),
                self.shape2d()
            )));
        }
        for (cell, v) in self.cells.iter_mut().zip(values) {
            cell.set(attr, v);
        }
        self.attributes.insert(attr.to_string());
        Ok(())
    }

    /// The attribute as a single-band raster. Non-numeric values are NaN.
    pub fn get_raster(&self, attr: &str) -> Result<Raster> {
        if !self.has_attribute(attr) {
            return Err(AbsesError::Attribute(format!(
                "Attribute '{}' not found in layer '{}'.",
                attr,
                self.name()
            )));
        }
        let data = self
            .cells
            .iter()
            .map(|c| c.attrs.get(attr).and_then(Value::as_f64).unwrap_or(f64::NAN))
            .collect();
        Raster::from_vec(self.height, self.width, data)
    }

    pub fn get_rasters(&self, attrs: &[&str]) -> Result<Raster> {
        let bands = attrs
            .iter()
            .map(|a| self.get_raster(a))
            .collect::<Result<Vec<Raster>>>()?;
        Raster::stack(bands)
    }

    /**
    Compute `f` for every cell, in parallel.

    ```rust
    # use abses::prelude::*;
    let mut model = MainModel::new(Settings::default()).unwrap();
    let id = model.nature.create_module(LayerSpec::from_resolution("land", (2, 3))).unwrap();
    let layer = model.nature.layer(id).unwrap();
    let rows = layer.apply(|cell| cell.indices().0 as f64).unwrap();
    assert_eq!(rows.data(), &[0., 0., 0., 1., 1., 1.]);
    ```
     */
    pub fn apply<F>(&self, f: F) -> Result<Raster>
    where
        F: Fn(&PatchCell) -> f64 + Send + Sync,
    {
        let data: Vec<f64> = self.cells.par_iter().map(|c| f(c)).collect();
        Raster::from_vec(self.height, self.width, data)
    }

    /// Number of actors on each cell.
    pub fn agents_count(&self) -> Result<Raster> {
        self.apply(|c| c.agents().len() as f64)
    }

    pub fn select(&self, selection: &Where) -> Result<ActorsList<CellRef>> {
        let n = self.cells.len();
        let chosen: Vec<bool> = match selection {
            Where::All => vec![true; n],
            Where::Attr(attr) => {
                if !self.has_attribute(attr) {
                    return Err(AbsesError::Attribute(format!(
                        "Attribute '{}' not found in layer '{}'.",
                        attr,
                        self.name()
                    )));
                }
                self.cells
                    .iter()
                    .map(|c| c.attrs.get(attr.as_str()).map_or(false, Value::truthy))
                    .collect()
            }
            Where::Mask(mask) => {
                if mask.len() != n {
                    return Err(AbsesError::Shape(format!(
                        "Mask of length {} does not fit layer {:?}.",
                        mask.len(),
                        self.shape2d()
                    )));
                }
                mask.clone()
            }
            Where::Within(rect) => self
                .cells
                .iter()
                .map(|c| {
                    let (row, col) = c.indices();
                    rect.contains(self.coordinate(row, col))
                })
                .collect(),
        };
        Ok(chosen
            .iter()
            .enumerate()
            .filter(|(i, keep)| **keep && self.mask[*i])
            .map(|(i, _)| self.cells[i].cell_ref())
            .collect())
    }

    /// Random selections among all unmasked cells.
    pub fn random(&self) -> ListRandom<CellRef> {
        let cells: ActorsList<CellRef> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(i, _)| self.mask[*i])
            .map(|(_, c)| c.cell_ref())
            .collect();
        cells.random()
    }

    fn dilate(&self, seed: &BitVec, moore: bool, iterations: usize) -> BitVec {
        let offsets: &[(i64, i64)] = if moore { &MOORE } else { &VON_NEUMANN };
        let mut current = seed.clone();
        for _ in 0..iterations {
            let mut next = current.clone();
            for idx in current.iter_ones() {
                let (row, col) = ((idx / self.width) as i64, (idx % self.width) as i64);
                for (dr, dc) in offsets {
                    let (r, c) = (row + dr, col + dc);
                    if !self.out_of_bounds(r, c) {
                        next.set(self.index(r as usize, c as usize), true);
                    }
                }
            }
            current = next;
        }
        current
    }

    /**
    The cells around `(row, col)`.

    Moore neighborhoods are 8-connected, von Neumann neighborhoods
    4-connected; a radius of `r` repeats the expansion `r` times. An annular
    neighborhood keeps only the outermost ring.
     */
    pub fn get_neighborhood(
        &self,
        row: usize,
        col: usize,
        moore: bool,
        include_center: bool,
        radius: usize,
        annular: bool,
    ) -> Result<ActorsList<CellRef>> {
        if radius == 0 {
            return Err(AbsesError::Params(format!(
                "Radius must be positive int, not {}.",
                radius
            )));
        }
        if self.out_of_bounds(row as i64, col as i64) {
            return Err(AbsesError::Location(format!(
                "({}, {}) is outside of layer '{}'.",
                row,
                col,
                self.name()
            )));
        }
        let center = self.index(row, col);
        let mut seed = BitVec::repeat(false, self.cells.len());
        seed.set(center, true);
        let mut result = self.dilate(&seed, moore, radius);
        if annular && radius > 1 {
            let interior = self.dilate(&seed, moore, radius - 1);
            for idx in interior.iter_ones() {
                result.set(idx, false);
            }
        }
        result.set(center, include_center);
        Ok(result.iter_ones().map(|i| self.cells[i].cell_ref()).collect())
    }

    pub fn neighboring(
        &self,
        cell: CellRef,
        moore: bool,
        radius: usize,
        include_center: bool,
        annular: bool,
    ) -> Result<ActorsList<CellRef>> {
        self.get_neighborhood(cell.row, cell.col, moore, include_center, radius, annular)
    }

    pub fn add_dynamic_variable<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&PatchModule, &TimeDriver) -> Result<Raster> + Send + Sync + 'static,
    {
        self.dynamic_variables.add(DynamicVariable::new(name, function));
    }

    pub fn dynamic_variables(&self) -> Vec<&str> {
        self.dynamic_variables.names()
    }

    /// Current value of a dynamic raster, written to the cells as the
    /// attribute of the same name.
    pub fn dynamic_var(&mut self, name: &str, time: &TimeDriver) -> Result<Raster> {
        let mut vars = std::mem::take(&mut self.dynamic_variables);
        let result = match vars.get_mut(name) {
            Some(var) => var.value(self, time),
            None => Err(AbsesError::NotFound(format!(
                "No dynamic variable '{}' in layer '{}'.",
                name,
                self.name()
            ))),
        };
        self.dynamic_variables = vars;
        let raster = result?;
        self.apply_raster(&raster, name)?;
        Ok(raster)
    }

    /// Refresh every dynamic variable for the current tick.
    pub fn update_dynamic(&mut self, time: &TimeDriver) -> Result<()> {
        let names: Vec<String> = self
            .dynamic_variables
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        for name in names {
            self.dynamic_var(&name, time)?;
        }
        if !self.dynamic_variables.is_empty() {
            debug!(layer = %self.name(), tick = time.tick(), "dynamic variables updated");
        }
        Ok(())
    }
}

impl fmt::Display for PatchModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}
