/*!
Time-dependent variables.

A dynamic variable is a function of the object it belongs to and of the
model time. Its value is cached together with the tick at which it was
computed, so that repeated reads within one tick cost a single evaluation,
and the model can refresh all of them right after time advances.
 */

use crate::error::Result;
use crate::time::TimeDriver;
use crate::value::Attributes;
use std::fmt;

pub type DynamicFn<O, T> = Box<dyn Fn(&O, &TimeDriver) -> Result<T> + Send + Sync>;

pub struct DynamicVariable<O, T> {
    name: String,
    function: DynamicFn<O, T>,
    cache: Option<T>,
    updated_at: Option<u64>,
    /// Free-form options, e.g. how a raster result is applied.
    pub attrs: Attributes,
}

impl<O, T: Clone> DynamicVariable<O, T> {
    pub fn new<F>(name: &str, function: F) -> Self
    where
        F: Fn(&O, &TimeDriver) -> Result<T> + Send + Sync + 'static,
    {
        DynamicVariable {
            name: name.to_string(),
            function: Box::new(function),
            cache: None,
            updated_at: None,
            attrs: Attributes::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate without touching the cache.
    pub fn evaluate(&self, obj: &O, time: &TimeDriver) -> Result<T> {
        (self.function)(obj, time)
    }

    /// Recompute and cache.
    pub fn now(&mut self, obj: &O, time: &TimeDriver) -> Result<T> {
        let value = (self.function)(obj, time)?;
        self.cache = Some(value.clone());
        self.updated_at = Some(time.tick());
        Ok(value)
    }

    /// The cached value if it was computed during the current tick,
    /// otherwise a fresh one.
    pub fn value(&mut self, obj: &O, time: &TimeDriver) -> Result<T> {
        match (&self.cache, self.is_fresh(time)) {
            (Some(cached), true) => Ok(cached.clone()),
            _ => self.now(obj, time),
        }
    }

    /// Like `value`, but never writes the cache.
    pub fn peek(&self, obj: &O, time: &TimeDriver) -> Result<T> {
        match (&self.cache, self.is_fresh(time)) {
            (Some(cached), true) => Ok(cached.clone()),
            _ => self.evaluate(obj, time),
        }
    }

    pub fn cache(&self) -> Option<&T> {
        self.cache.as_ref()
    }

    pub fn is_fresh(&self, time: &TimeDriver) -> bool {
        self.updated_at == Some(time.tick())
    }
}

impl<O, T: fmt::Debug> fmt::Debug for DynamicVariable<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicVariable")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// The dynamic variables of one object, by name.
pub struct DynamicVariables<O, T> {
    vars: Vec<DynamicVariable<O, T>>,
}

impl<O, T> Default for DynamicVariables<O, T> {
    fn default() -> Self {
        DynamicVariables { vars: Vec::new() }
    }
}

impl<O, T: Clone> DynamicVariables<O, T> {
    /// Register a variable. A variable of the same name is replaced.
    pub fn add(&mut self, var: DynamicVariable<O, T>) {
        match self.vars.iter_mut().find(|v| v.name == var.name) {
            Some(existing) => *existing = var,
            None => self.vars.push(var),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DynamicVariable<O, T>> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DynamicVariable<O, T>> {
        self.vars.iter_mut().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.vars.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DynamicVariable<O, T>> {
        self.vars.iter_mut()
    }
}

impl<O, T: fmt::Debug> fmt::Debug for DynamicVariables<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.vars.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cache_is_reused_within_a_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut var: DynamicVariable<Vec<f64>, f64> =
            DynamicVariable::new("rain", move |data: &Vec<f64>, time: &TimeDriver| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(data[time.tick() as usize])
            });
        let data = vec![1., 2., 3.];
        let settings = Settings::from(serde_json::json!({"time": {"start": "2000", "years": 1}}));
        let mut time = TimeDriver::from_params(&settings.params("time")).unwrap();

        assert_eq!(var.value(&data, &time).unwrap(), 1.);
        assert_eq!(var.value(&data, &time).unwrap(), 1.);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        time.go(1).unwrap();
        assert!(!var.is_fresh(&time));
        assert_eq!(var.peek(&data, &time).unwrap(), 2.);
        assert_eq!(var.cache(), Some(&1.));
        assert_eq!(var.value(&data, &time).unwrap(), 2.);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_adding_replaces_by_name() {
        let mut vars: DynamicVariables<(), i64> = DynamicVariables::default();
        vars.add(DynamicVariable::new("x", |_: &(), _: &TimeDriver| Ok(1)));
        vars.add(DynamicVariable::new("x", |_: &(), _: &TimeDriver| Ok(2)));
        assert_eq!(vars.names(), vec!["x"]);
        let time = TimeDriver::default();
        assert_eq!(vars.get("x").unwrap().evaluate(&(), &time).unwrap(), 2);
    }
}
