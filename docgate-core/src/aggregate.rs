//! Typed aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s executed one after the other
//! by a backend. Pipelines are assembled in code from a fixed set of stage
//! kinds; there is no free-form stage language.
//!
//! ```ignore
//! use docgate::aggregate::{Accumulator, GroupKey, Pipeline, Stage};
//! use docgate::query::{Filter, Sort};
//!
//! let pipeline = Pipeline::new()
//!     .with_stage(Stage::Match(Filter::gte("ratingsAverage", 4.5)))
//!     .with_stage(Stage::group(
//!         GroupKey::Upper("difficulty".into()),
//!         [("numTours", Accumulator::Count)],
//!     ))
//!     .with_stage(Stage::Sort(vec![Sort::asc("numTours")]));
//! ```

use crate::query::{Expr, Projection, Sort};

/// Value documents are grouped by. Stored as `_id` in each output document.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// The raw value of a field.
    Field(String),
    /// The upper-cased string value of a field.
    Upper(String),
    /// The month (1-12) of a date field.
    Month(String),
}

/// Per-group reduction producing one output field.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Sum of a numeric field.
    Sum(String),
    /// Arithmetic mean of a numeric field.
    Avg(String),
    /// Smallest value of a field.
    Min(String),
    /// Largest value of a field.
    Max(String),
    /// Every value of a field, in input order.
    Push(String),
}

impl Accumulator {
    /// The input field read by this accumulator, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Accumulator::Count => None,
            Accumulator::Sum(field)
            | Accumulator::Avg(field)
            | Accumulator::Min(field)
            | Accumulator::Max(field)
            | Accumulator::Push(field) => Some(field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps documents matching the expression.
    Match(Expr),
    /// Emits one document per element of an array field.
    ///
    /// Documents where the field is missing or an empty array are dropped.
    Unwind(String),
    /// Groups documents by key and reduces each group.
    Group {
        key: GroupKey,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Copies existing fields into new ones, as `(target, source)` pairs.
    AddFields(Vec<(String, String)>),
    Project(Projection),
    Sort(Vec<Sort>),
    Limit(usize),
}

impl Stage {
    pub fn group<I, S>(key: GroupKey, accumulators: I) -> Self
    where
        I: IntoIterator<Item = (S, Accumulator)>,
        S: Into<String>,
    {
        Stage::Group {
            key,
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.into(), acc))
                .collect(),
        }
    }

    /// Short stage name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Unwind(_) => "unwind",
            Stage::Group { .. } => "group",
            Stage::AddFields(_) => "addFields",
            Stage::Project(_) => "project",
            Stage::Sort(_) => "sort",
            Stage::Limit(_) => "limit",
        }
    }
}

/// An ordered list of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage, builder style.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// Inserts a stage before every other stage.
    pub fn prepend(&mut self, stage: Stage) {
        self.stages.insert(0, stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromIterator<Stage> for Pipeline {
    fn from_iter<T: IntoIterator<Item = Stage>>(iter: T) -> Self {
        Self { stages: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn prepend_becomes_stage_zero() {
        let mut pipeline = Pipeline::new()
            .with_stage(Stage::Unwind("startDates".into()))
            .with_stage(Stage::Limit(12));
        pipeline.prepend(Stage::Match(Filter::ne("secretTour", true)));

        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.stages()[0], Stage::Match(Filter::ne("secretTour", true)));
        assert_eq!(pipeline.stages()[1].name(), "unwind");
    }

    #[test]
    fn accumulator_fields() {
        assert_eq!(Accumulator::Count.field(), None);
        assert_eq!(Accumulator::Avg("price".into()).field(), Some("price"));
    }
}
