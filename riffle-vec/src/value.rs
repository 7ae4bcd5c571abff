use ordered_float::OrderedFloat;

/// A single scalar value at a row-at-a-time boundary: aggregate states,
/// constants, test oracles. Floats are wrapped so values are totally
/// ordered and hashable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Val {
    Null,
    Int(i64),
    Flo(OrderedFloat<f64>),
    Str(String),
    List(Vec<Val>),
}

impl Val {
    pub fn flo(f: f64) -> Val {
        Val::Flo(OrderedFloat(f))
    }

    pub fn str_(s: impl Into<String>) -> Val {
        Val::Str(s.into())
    }

    pub fn list_of_ints(vals: &[i64]) -> Val {
        Val::List(vals.iter().map(|v| Val::Int(*v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }
}
