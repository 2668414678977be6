/*!
# Actor lists

An [`ActorsList`] is an ordered list of handles to actors or cells. It does
not own what it lists: every query goes through the model, so a list stays
cheap to copy and to pass around while the model keeps changing.
 */

use crate::actor::{ActorId, Target};
use crate::cells::CellRef;
use crate::error::{AbsesError, Result};
use crate::links::Node;
use crate::model::MainModel;
use crate::random::{ListRandom, WhenEmpty};
use crate::value::Value;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Something an [`ActorsList`] can hold.
pub trait Entity: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn read(self, model: &MainModel, attr: &str) -> Result<Value>;
    fn write(self, model: &mut MainModel, attr: &str, value: Value) -> Result<()>;
    fn breed(self, model: &MainModel) -> String;
    fn node(self) -> Node;
}

impl Entity for ActorId {
    fn read(self, model: &MainModel, attr: &str) -> Result<Value> {
        model
            .get(self, attr, Target::Auto)?
            .ok_or_else(|| AbsesError::NotFound(format!("Actor {} is not alive.", self)))
    }

    fn write(self, model: &mut MainModel, attr: &str, value: Value) -> Result<()> {
        model.set(self, attr, value, Target::Auto, true)
    }

    fn breed(self, model: &MainModel) -> String {
        model
            .agents
            .actor(self)
            .map(|a| a.breed().to_string())
            .unwrap_or_default()
    }

    fn node(self) -> Node {
        Node::Actor(self)
    }
}

impl Entity for CellRef {
    fn read(self, model: &MainModel, attr: &str) -> Result<Value> {
        model.nature.cell(self)?.get(attr).cloned()
    }

    fn write(self, model: &mut MainModel, attr: &str, value: Value) -> Result<()> {
        model.nature.cell_mut(self)?.set(attr, value);
        Ok(())
    }

    fn breed(self, _model: &MainModel) -> String {
        "PatchCell".to_string()
    }

    fn node(self) -> Node {
        Node::Cell(self)
    }
}

/// Criteria for selecting actors or cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Breed(String),
    /// Items whose attribute is truthy.
    Attr(String),
    /// Items matching every attribute value. The key `breed` matches the
    /// breed name.
    Attrs(Vec<(String, Value)>),
}

impl Selection {
    /**
    Parse a selection string: either a breed name, or comma-separated
    `attribute == value` conditions.

    ```rust
    # use abses::sequences::Selection;
    # use abses::value::Value;
    assert_eq!(Selection::parse("Farmer"), Selection::Breed("Farmer".into()));
    assert_eq!(
        Selection::parse("wealth == 1, breed == Farmer"),
        Selection::Attrs(vec![
            ("wealth".into(), Value::Int(1)),
            ("breed".into(), Value::Text("Farmer".into())),
        ])
    );
    ```
     */
    pub fn parse(selection: &str) -> Selection {
        if !selection.contains("==") {
            return Selection::Breed(selection.trim().to_string());
        }
        let conditions = selection
            .split(',')
            .filter_map(|exp| {
                let (left, right) = exp.split_once("==")?;
                Some((left.trim().to_string(), parse_literal(right.trim())))
            })
            .collect();
        Selection::Attrs(conditions)
    }

    pub fn matches<N: Entity>(&self, model: &MainModel, item: N) -> bool {
        match self {
            Selection::Breed(breed) => item.breed(model) == *breed,
            Selection::Attr(attr) => item.read(model, attr).map_or(false, |v| v.truthy()),
            Selection::Attrs(conditions) => conditions.iter().all(|(key, expected)| {
                if key == "breed" {
                    return Value::Text(item.breed(model)).matches(expected);
                }
                item.read(model, key).map_or(false, |v| v.matches(expected))
            }),
        }
    }
}

impl From<&str> for Selection {
    fn from(selection: &str) -> Selection {
        Selection::parse(selection)
    }
}

fn parse_literal(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = text.parse::<f64>() {
        return Value::Float(x);
    }
    match text {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::Text(text.to_string()),
    }
}

/// How to pick a single item from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum How {
    /// The list must hold exactly one item.
    Only,
    Item(usize),
    Random,
}

/// What `better` compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Than<N> {
    /// Keep the items holding the maximum.
    None,
    Value(f64),
    Node(N),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorsList<N = ActorId> {
    items: Vec<N>,
}

impl<N> Default for ActorsList<N> {
    fn default() -> Self {
        ActorsList { items: Vec::new() }
    }
}

impl<N> From<Vec<N>> for ActorsList<N> {
    fn from(items: Vec<N>) -> Self {
        ActorsList { items }
    }
}

impl<N> FromIterator<N> for ActorsList<N> {
    fn from_iter<I: IntoIterator<Item = N>>(iter: I) -> Self {
        ActorsList {
            items: iter.into_iter().collect(),
        }
    }
}

impl<N> IntoIterator for ActorsList<N> {
    type Item = N;
    type IntoIter = std::vec::IntoIter<N>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, N> IntoIterator for &'a ActorsList<N> {
    type Item = &'a N;
    type IntoIter = std::slice::Iter<'a, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Lists are equal when they hold the same items, in any order.
impl<N: Ord + Clone> PartialEq for ActorsList<N> {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.items.clone();
        let mut b = other.items.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl<N> ActorsList<N> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, N> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[N] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<N> {
        self.items
    }

    pub fn push(&mut self, item: N) {
        self.items.push(item);
    }
}

impl<N: Entity> ActorsList<N> {
    pub fn contains(&self, item: N) -> bool {
        self.items.contains(&item)
    }

    /// `<ActorsList: (5)Actor; (3)Farmer>`, breeds sorted by name.
    pub fn describe(&self, model: &MainModel) -> String {
        let counts: Vec<String> = self
            .to_dict(model)
            .iter()
            .map(|(breed, list)| format!("({}){}", list.len(), breed))
            .collect();
        format!("<ActorsList: {}>", counts.join("; "))
    }

    /// Items grouped by breed.
    pub fn to_dict(&self, model: &MainModel) -> BTreeMap<String, ActorsList<N>> {
        let mut groups: BTreeMap<String, ActorsList<N>> = BTreeMap::new();
        for item in self.items.iter() {
            groups.entry(item.breed(model)).or_default().push(*item);
        }
        groups
    }

    pub fn select(&self, model: &MainModel, selection: &Selection) -> ActorsList<N> {
        self.filter(|n| selection.matches(model, n))
    }

    pub fn select_mask(&self, mask: &[bool]) -> Result<ActorsList<N>> {
        if mask.len() != self.len() {
            return Err(AbsesError::Shape(format!(
                "Mask of length {} does not fit {} items.",
                mask.len(),
                self.len()
            )));
        }
        Ok(self
            .items
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(n, _)| *n)
            .collect())
    }

    pub fn filter<F: FnMut(N) -> bool>(&self, mut predicate: F) -> ActorsList<N> {
        self.items.iter().copied().filter(|n| predicate(*n)).collect()
    }

    /// The subset whose items are among `ids`.
    pub fn ids(&self, ids: &[N]) -> ActorsList<N> {
        self.filter(|n| ids.contains(&n))
    }

    /// Items with a larger `metric` than the threshold, or holding the
    /// maximum when there is none.
    pub fn better(&self, model: &MainModel, metric: &str, than: Than<N>) -> Result<ActorsList<N>> {
        let metrics = self.array(model, metric)?;
        let threshold = match than {
            Than::None => {
                let max = metrics.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                return self.select_mask(&metrics.iter().map(|m| *m == max).collect::<Vec<_>>());
            }
            Than::Value(x) => x,
            Than::Node(other) => as_number(other, metric, other.read(model, metric)?)?,
        };
        self.select_mask(&metrics.iter().map(|m| *m > threshold).collect::<Vec<_>>())
    }

    /// Numeric values of one attribute, in list order.
    pub fn array(&self, model: &MainModel, attr: &str) -> Result<Vec<f64>> {
        self.items
            .iter()
            .map(|n| as_number(*n, attr, n.read(model, attr)?))
            .collect()
    }

    pub fn values(&self, model: &MainModel, attr: &str) -> Result<Vec<Value>> {
        self.items.iter().map(|n| n.read(model, attr)).collect()
    }

    /// Write one value per item.
    pub fn update(&self, model: &mut MainModel, attr: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.len() {
            return Err(AbsesError::Shape(format!(
                "{} values do not fit {} items.",
                values.len(),
                self.len()
            )));
        }
        for (n, v) in self.items.iter().zip(values) {
            n.write(model, attr, v)?;
        }
        Ok(())
    }

    /// Split before each of the given positions, giving `at.len() + 1`
    /// groups.
    pub fn split(&self, at: &[usize]) -> Vec<ActorsList<N>> {
        let mut groups = Vec::with_capacity(at.len() + 1);
        let mut start = 0;
        for &end in at {
            let end = end.clamp(start, self.len());
            groups.push(ActorsList::from(self.items[start..end].to_vec()));
            start = end;
        }
        groups.push(ActorsList::from(self.items[start..].to_vec()));
        groups
    }

    pub fn trigger<F>(&self, model: &mut MainModel, mut f: F) -> Result<()>
    where
        F: FnMut(&mut MainModel, N) -> Result<()>,
    {
        for n in self.items.iter() {
            f(model, *n)?;
        }
        Ok(())
    }

    pub fn apply<R, F>(&self, model: &mut MainModel, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(&mut MainModel, N) -> Result<R>,
    {
        self.items.iter().map(|n| f(model, *n)).collect()
    }

    pub fn item(&self, model: &mut MainModel, how: How) -> Result<Option<N>> {
        match how {
            How::Only => match self.items.as_slice() {
                [] => Err(AbsesError::Selection("No agent found.".to_string())),
                [one] => Ok(Some(*one)),
                _ => Err(AbsesError::Selection("More than one agent.".to_string())),
            },
            How::Item(index) => Ok(self.items.get(index).copied()),
            How::Random => self.random().choice_one(model, WhenEmpty::ReturnEmpty),
        }
    }

    /// Attribute of a single item.
    pub fn get(&self, model: &mut MainModel, attr: &str, how: How) -> Result<Value> {
        match self.item(model, how)? {
            Some(n) => n.read(model, attr),
            None => Err(AbsesError::Selection("No agent found.".to_string())),
        }
    }

    /// Write the same value to every item.
    pub fn set<V: Into<Value>>(&self, model: &mut MainModel, attr: &str, value: V) -> Result<()> {
        let value = value.into();
        for n in self.items.iter() {
            n.write(model, attr, value.clone())?;
        }
        Ok(())
    }

    pub fn random(&self) -> ListRandom<N> {
        ListRandom::new(self.clone())
    }
}

fn as_number<N: fmt::Display>(item: N, attr: &str, value: Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        AbsesError::Type(format!(
            "Attribute '{}' of {} is not numeric: {}.",
            attr, item, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{BaseActor, Breed};
    use crate::settings::Settings;

    struct Farmer;

    impl Breed for Farmer {
        const NAME: &'static str = "Farmer";
    }

    fn model_with_actors() -> (MainModel, ActorsList<ActorId>) {
        let mut model = MainModel::new(Settings::default()).unwrap();
        let mut actors = model.new_actors::<BaseActor>(3).unwrap().into_vec();
        actors.extend(model.new_actors::<Farmer>(2).unwrap());
        let list = ActorsList::from(actors);
        for (i, id) in list.iter().enumerate() {
            model.set(*id, "wealth", i as i64, Target::Me, true).unwrap();
        }
        (model, list)
    }

    #[test]
    fn test_describe_and_dict() {
        let (model, list) = model_with_actors();
        assert_eq!(list.describe(&model), "<ActorsList: (3)Actor; (2)Farmer>");
        let dict = list.to_dict(&model);
        assert_eq!(dict["Farmer"].len(), 2);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = ActorsList::from(vec![ActorId(1), ActorId(2)]);
        let b = ActorsList::from(vec![ActorId(2), ActorId(1)]);
        assert_eq!(a, b);
        assert_ne!(a, ActorsList::from(vec![ActorId(1)]));
    }

    #[test]
    fn test_select() {
        let (model, list) = model_with_actors();
        assert_eq!(list.select(&model, &"Farmer".into()).len(), 2);
        assert_eq!(list.select(&model, &"wealth == 1".into()).len(), 1);
        assert_eq!(list.select(&model, &"breed == Farmer, wealth == 4".into()).len(), 1);
        assert_eq!(list.select(&model, &Selection::Attr("wealth".into())).len(), 4);
        assert!(list.select_mask(&[true]).is_err());
        assert_eq!(list.select_mask(&[true, false, true, false, false]).unwrap().len(), 2);
    }

    #[test]
    fn test_better_and_array() {
        let (model, list) = model_with_actors();
        assert_eq!(list.array(&model, "wealth").unwrap(), vec![0., 1., 2., 3., 4.]);
        let best = list.better(&model, "wealth", Than::None).unwrap();
        assert_eq!(best.as_slice(), &list.as_slice()[4..]);
        assert_eq!(list.better(&model, "wealth", Than::Value(2.)).unwrap().len(), 2);
        let third = list.as_slice()[2];
        assert_eq!(list.better(&model, "wealth", Than::Node(third)).unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_split() {
        let (mut model, list) = model_with_actors();
        assert!(list.update(&mut model, "x", vec![Value::Int(1)]).is_err());
        list.update(&mut model, "x", (0..5).map(Value::from).collect()).unwrap();
        assert_eq!(list.array(&model, "x").unwrap(), vec![0., 1., 2., 3., 4.]);
        let groups = list.split(&[1, 3]);
        let sizes: Vec<usize> = groups.iter().map(ActorsList::len).collect();
        assert_eq!(sizes, vec![1, 2, 2]);
    }

    #[test]
    fn test_get_only() {
        let (mut model, list) = model_with_actors();
        let err = list.get(&mut model, "wealth", How::Only).unwrap_err();
        assert_eq!(err.to_string(), "More than one agent.");
        let one = list.ids(&[list.as_slice()[1]]);
        assert_eq!(one.get(&mut model, "wealth", How::Only).unwrap(), Value::Int(1));
        let none: ActorsList<ActorId> = ActorsList::default();
        assert_eq!(none.get(&mut model, "wealth", How::Only).unwrap_err().to_string(), "No agent found.");
        assert!(none.item(&mut model, How::Random).unwrap().is_none());
    }

    #[test]
    fn test_trigger_propagates_errors() {
        let (mut model, list) = model_with_actors();
        list.trigger(&mut model, |m, id| m.set(id, "seen", true, Target::Me, true))
            .unwrap();
        assert_eq!(list.select(&model, &Selection::Attr("seen".into())).len(), 5);
        let result = list.trigger(&mut model, |m, id| m.set(id, "missing", 1, Target::Me, false));
        assert!(result.is_err());
    }
}
