use crate::aggregates::{CountAgg, FirstAgg, LastAgg, ListAgg, SumAgg};
use crate::slice::SliceFn;
use crate::{Aggregate, ScalarFn};
use riffle_base::{err_input, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide function registry. Built once at startup with the
/// builtins and passed by reference into operators.
pub struct Registry {
    scalars: HashMap<&'static str, Arc<dyn ScalarFn>>,
    aggregates: HashMap<&'static str, Arc<dyn Aggregate>>,
}

fn canonical(name: &str) -> &str {
    match name {
        "arbitrary" => "any_value",
        name => name,
    }
}

impl Registry {
    pub fn with_builtins() -> Registry {
        let mut reg = Registry {
            scalars: HashMap::new(),
            aggregates: HashMap::new(),
        };
        reg.register_scalar(Arc::new(SliceFn));
        reg.register_aggregate(Arc::new(CountAgg));
        reg.register_aggregate(Arc::new(SumAgg));
        reg.register_aggregate(Arc::new(FirstAgg::new()));
        reg.register_aggregate(Arc::new(FirstAgg::any_value()));
        reg.register_aggregate(Arc::new(LastAgg));
        reg.register_aggregate(Arc::new(ListAgg));
        reg
    }

    pub fn register_scalar(&mut self, f: Arc<dyn ScalarFn>) {
        self.scalars.insert(f.name(), f);
    }

    pub fn register_aggregate(&mut self, f: Arc<dyn Aggregate>) {
        self.aggregates.insert(f.name(), f);
    }

    pub fn scalar(&self, name: &str) -> Result<Arc<dyn ScalarFn>> {
        self.scalars
            .get(canonical(name))
            .cloned()
            .ok_or_else(|| err_input(format!("unknown scalar function {name}")))
    }

    pub fn aggregate(&self, name: &str) -> Result<Arc<dyn Aggregate>> {
        self.aggregates
            .get(canonical(name))
            .cloned()
            .ok_or_else(|| err_input(format!("unknown aggregate function {name}")))
    }
}
