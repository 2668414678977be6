/*!
# Random operations on lists

Every draw uses the model's seeded generator, so that a run is reproducible
from its `seed` setting.
 */

use crate::actor::{ActorId, Breed};
use crate::cells::CellRef;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::sequences::{ActorsList, Entity};
use crate::value::Value;
use itertools::Itertools;
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::seq::index;
use rand::Rng;

/// What to do when drawing from an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenEmpty {
    Raise,
    ReturnEmpty,
}

/// Options of [`ListRandom::choice`].
#[derive(Debug, Clone)]
pub struct Choice {
    pub size: usize,
    /// One weight per item. Invalid weights count as zero.
    pub prob: Option<Vec<f64>>,
    pub replace: bool,
    pub when_empty: WhenEmpty,
    /// Without replacement, when fewer items have a positive weight than
    /// requested, take all of them and fill up uniformly from the rest
    /// instead of failing.
    pub double_check: bool,
}

impl Default for Choice {
    fn default() -> Self {
        Choice {
            size: 1,
            prob: None,
            replace: false,
            when_empty: WhenEmpty::Raise,
            double_check: false,
        }
    }
}

impl Choice {
    pub fn size(size: usize) -> Choice {
        Choice {
            size,
            ..Choice::default()
        }
    }
}

/**
Clean a list of weights into probabilities: NaN and negative weights become
zero, the rest is normalized. If no weight is positive, every item is
equally likely.

```rust
# use abses::random::clean_p;
assert_eq!(clean_p(&[0., 0.]), vec![0.5, 0.5]);
assert_eq!(clean_p(&[-1., f64::NAN]), vec![0.5, 0.5]);
assert_eq!(clean_p(&[3., 2.]), vec![0.6, 0.4]);
```
 */
pub fn clean_p(prob: &[f64]) -> Vec<f64> {
    let cleaned: Vec<f64> = prob
        .iter()
        .map(|p| if p.is_finite() && *p > 0. { *p } else { 0. })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if total > 0. {
        cleaned.iter().map(|p| p / total).collect()
    } else {
        vec![1. / prob.len() as f64; prob.len()]
    }
}

pub struct ListRandom<N = ActorId> {
    list: ActorsList<N>,
}

impl<N: Entity> ListRandom<N> {
    pub fn new(list: ActorsList<N>) -> ListRandom<N> {
        ListRandom { list }
    }

    fn when_empty(&self, when_empty: WhenEmpty, operation: &str) -> Result<()> {
        match when_empty {
            WhenEmpty::Raise => Err(AbsesError::Selection(format!(
                "Random operating '{}' on an empty list.",
                operation
            ))),
            WhenEmpty::ReturnEmpty => Ok(()),
        }
    }

    pub fn choice(&self, model: &mut MainModel, choice: &Choice) -> Result<ActorsList<N>> {
        self.choose(&mut model.rng, choice)
    }

    /// Draw with any generator.
    pub fn choose<R: Rng>(&self, rng: &mut R, choice: &Choice) -> Result<ActorsList<N>> {
        let items = self.list.as_slice();
        let n = items.len();
        if n == 0 {
            self.when_empty(choice.when_empty, "choice")?;
            return Ok(ActorsList::default());
        }
        if n < choice.size && !choice.replace {
            return Err(AbsesError::Selection(format!(
                "Trying to choose {} items from a list of {}.",
                choice.size, n
            )));
        }
        let picked: Vec<usize> = match &choice.prob {
            None if choice.replace => (0..choice.size).map(|_| rng.gen_range(0..n)).collect(),
            None => index::sample(rng, n, choice.size).into_vec(),
            Some(prob) => {
                if prob.len() != n {
                    return Err(AbsesError::Shape(format!(
                        "{} probabilities do not fit {} items.",
                        prob.len(),
                        n
                    )));
                }
                let p = clean_p(prob);
                if choice.replace {
                    let dist = WeightedIndex::new(&p)
                        .map_err(|e| AbsesError::Selection(e.to_string()))?;
                    (0..choice.size).map(|_| dist.sample(rng)).collect()
                } else {
                    let valid: Vec<usize> = (0..n).filter(|i| p[*i] > 0.).collect();
                    if valid.len() < choice.size {
                        if !choice.double_check {
                            return Err(AbsesError::Selection(format!(
                                "Only {} entities have possibility, but {} entities are expected.",
                                valid.len(),
                                choice.size
                            )));
                        }
                        let others: Vec<usize> = (0..n).filter(|i| p[*i] <= 0.).collect();
                        let rest = index::sample(rng, others.len(), choice.size - valid.len());
                        valid
                            .iter()
                            .copied()
                            .chain(rest.into_iter().map(|i| others[i]))
                            .collect()
                    } else {
                        index::sample_weighted(rng, n, |i| p[i], choice.size)
                            .map_err(|e| AbsesError::Selection(e.to_string()))?
                            .into_vec()
                    }
                }
            }
        };
        Ok(picked.into_iter().map(|i| items[i]).collect())
    }

    /// One random item, or `None` from an empty list when allowed.
    pub fn choice_one(&self, model: &mut MainModel, when_empty: WhenEmpty) -> Result<Option<N>> {
        let choice = Choice {
            when_empty,
            ..Choice::default()
        };
        Ok(self.choice(model, &choice)?.iter().next().copied())
    }

    /**
    Link every unordered pair of items with probability `p`, returning the
    pairs that got linked.
     */
    pub fn link(&self, model: &mut MainModel, name: &str, p: f64, mutual: bool) -> Result<Vec<(N, N)>> {
        let coin = Bernoulli::new(p).map_err(|_| {
            AbsesError::Params(format!("Linking probability must be in [0, 1], got {}.", p))
        })?;
        let mut linked = Vec::new();
        for (source, target) in self.list.iter().copied().tuple_combinations() {
            if coin.sample(&mut model.rng) {
                model
                    .human
                    .links
                    .add_a_link(name, source.node(), target.node(), mutual);
                linked.push((source, target));
            }
        }
        Ok(linked)
    }

    /**
    Split `value` among the items at uniformly drawn cut points and store
    each part as `attr`. The parts add up to `value`.
     */
    pub fn assign(&self, model: &mut MainModel, value: f64, attr: &str, when_empty: WhenEmpty) -> Result<Vec<f64>> {
        let n = self.list.len();
        if n == 0 {
            self.when_empty(when_empty, "assign")?;
            return Ok(Vec::new());
        }
        let mut cuts: Vec<f64> = (0..n - 1).map(|_| model.rng.gen::<f64>() * value).collect();
        cuts.sort_by(|a, b| a.total_cmp(b));
        let mut bounds = Vec::with_capacity(n + 1);
        bounds.push(0.);
        bounds.extend(cuts);
        bounds.push(value);
        let parts: Vec<f64> = bounds.windows(2).map(|w| w[1] - w[0]).collect();
        self.list
            .update(model, attr, parts.iter().copied().map(Value::from).collect())?;
        Ok(parts)
    }
}

impl ListRandom<CellRef> {
    /// Create `n` actors, each on a different randomly chosen cell.
    pub fn new_actors<B: Breed>(&self, model: &mut MainModel, n: usize) -> Result<ActorsList<ActorId>> {
        let cells = self.choice(model, &Choice::size(n))?;
        let mut created = Vec::with_capacity(n);
        for cell in cells {
            created.extend(model.new_on_cell::<B>(cell, 1)?);
        }
        Ok(ActorsList::from(created))
    }
}
