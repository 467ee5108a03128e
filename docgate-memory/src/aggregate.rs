//! Stage-by-stage execution of aggregation pipelines over in-memory documents.

use std::cmp::Ordering;

use bson::{Bson, Document};
use chrono::Datelike;

use docgate_core::aggregate::{Accumulator, GroupKey, Pipeline, Stage};

use crate::evaluator::{DocumentEvaluator, compare_documents, compare_values, lookup};

/// Runs every stage of `pipeline` over `documents`, in order.
pub(crate) fn run_pipeline(documents: Vec<Bson>, pipeline: &Pipeline) -> Vec<Bson> {
    pipeline
        .stages()
        .iter()
        .fold(documents, apply_stage)
}

fn apply_stage(documents: Vec<Bson>, stage: &Stage) -> Vec<Bson> {
    match stage {
        Stage::Match(expr) => documents
            .into_iter()
            .filter(|document| DocumentEvaluator::matches(document, expr))
            .collect(),
        Stage::Unwind(field) => documents
            .into_iter()
            .flat_map(|document| unwind(document, field))
            .collect(),
        Stage::Group { key, accumulators } => group(documents, key, accumulators),
        Stage::AddFields(fields) => documents
            .into_iter()
            .map(|document| add_fields(document, fields))
            .collect(),
        Stage::Project(projection) => documents
            .into_iter()
            .map(|document| match document {
                Bson::Document(fields) => Bson::Document(projection.apply(&fields)),
                other => other,
            })
            .collect(),
        Stage::Sort(keys) => {
            let mut documents = documents;
            documents.sort_by(|left, right| compare_documents(left, right, keys));
            documents
        }
        Stage::Limit(limit) => documents
            .into_iter()
            .take(*limit)
            .collect(),
    }
}

fn unwind(document: Bson, field: &str) -> Vec<Bson> {
    let Bson::Document(fields) = document else {
        return Vec::new();
    };

    match fields.get(field).cloned() {
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut copy = fields.clone();
                copy.insert(field, item);
                Bson::Document(copy)
            })
            .collect(),
        Some(Bson::Null) | None => Vec::new(),
        Some(_) => vec![Bson::Document(fields)],
    }
}

fn add_fields(document: Bson, fields: &[(String, String)]) -> Bson {
    let copies = fields
        .iter()
        .filter_map(|(target, source)| {
            lookup(&document, source).map(|value| (target.clone(), value.clone()))
        })
        .collect::<Vec<_>>();

    match document {
        Bson::Document(mut existing) => {
            for (target, value) in copies {
                existing.insert(target, value);
            }
            Bson::Document(existing)
        }
        other => other,
    }
}

fn group_key(document: &Bson, key: &GroupKey) -> Bson {
    match key {
        GroupKey::Field(field) => lookup(document, field)
            .cloned()
            .unwrap_or(Bson::Null),
        GroupKey::Upper(field) => match lookup(document, field) {
            Some(Bson::String(value)) => Bson::String(value.to_uppercase()),
            _ => Bson::String(String::new()),
        },
        GroupKey::Month(field) => match lookup(document, field) {
            Some(Bson::DateTime(value)) => Bson::Int32(value.to_chrono().month() as i32),
            _ => Bson::Null,
        },
    }
}

/// Groups keep the order in which their key was first seen.
fn group(documents: Vec<Bson>, key: &GroupKey, accumulators: &[(String, Accumulator)]) -> Vec<Bson> {
    let mut groups: Vec<(Bson, Vec<Bson>)> = Vec::new();

    for document in documents {
        let value = group_key(&document, key);
        match groups.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, members)) => members.push(document),
            None => groups.push((value, vec![document])),
        }
    }

    groups
        .into_iter()
        .map(|(id, members)| {
            let mut output = Document::new();
            output.insert("_id", id);
            for (name, accumulator) in accumulators {
                output.insert(name.clone(), accumulate(&members, accumulator));
            }
            Bson::Document(output)
        })
        .collect()
}

fn accumulate(members: &[Bson], accumulator: &Accumulator) -> Bson {
    let values = || {
        let field = accumulator.field().unwrap_or_default();
        members
            .iter()
            .filter_map(move |member| lookup(member, field))
            .filter(|value| !matches!(value, Bson::Null))
    };

    match accumulator {
        Accumulator::Count => Bson::Int32(i32::try_from(members.len()).unwrap_or(i32::MAX)),
        Accumulator::Sum(_) => sum(values()),
        Accumulator::Avg(_) => {
            let numbers = values().filter_map(as_f64).collect::<Vec<_>>();
            if numbers.is_empty() {
                Bson::Null
            } else {
                Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Accumulator::Min(_) => extreme(values(), Ordering::Less),
        Accumulator::Max(_) => extreme(values(), Ordering::Greater),
        Accumulator::Push(_) => Bson::Array(values().cloned().collect()),
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Integer sums stay integers; any float makes the sum a double.
fn sum<'a>(values: impl Iterator<Item = &'a Bson>) -> Bson {
    let mut integer: i64 = 0;
    let mut float: f64 = 0.0;
    let mut has_float = false;

    for value in values {
        match value {
            Bson::Int32(n) => integer = integer.saturating_add(i64::from(*n)),
            Bson::Int64(n) => integer = integer.saturating_add(*n),
            Bson::Double(n) => {
                float += n;
                has_float = true;
            }
            _ => {}
        }
    }

    if has_float {
        Bson::Double(float + integer as f64)
    } else {
        i32::try_from(integer)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(integer))
    }
}

fn extreme<'a>(values: impl Iterator<Item = &'a Bson>, wanted: Ordering) -> Bson {
    values
        .fold(None::<&Bson>, |best, value| match best {
            Some(current) if compare_values(value, current) != wanted => Some(current),
            _ => Some(value),
        })
        .cloned()
        .unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use bson::{DateTime, doc};
    use docgate_core::query::{Filter, Projection, Sort};

    use super::*;

    fn tours() -> Vec<Bson> {
        vec![
            Bson::Document(doc! { "name": "A", "difficulty": "easy", "price": 397, "rating": 4.5 }),
            Bson::Document(doc! { "name": "B", "difficulty": "medium", "price": 1497, "rating": 4.8 }),
            Bson::Document(doc! { "name": "C", "difficulty": "easy", "price": 497.5, "rating": 4.75 }),
        ]
    }

    #[test]
    fn group_by_upper_key_with_accumulators() {
        let pipeline = Pipeline::new()
            .with_stage(Stage::group(
                GroupKey::Upper("difficulty".into()),
                [
                    ("numTours", Accumulator::Count),
                    ("avgRating", Accumulator::Avg("rating".into())),
                    ("minPrice", Accumulator::Min("price".into())),
                    ("maxPrice", Accumulator::Max("price".into())),
                    ("names", Accumulator::Push("name".into())),
                ],
            ))
            .with_stage(Stage::Sort(vec![Sort::asc("numTours")]));

        let output = run_pipeline(tours(), &pipeline);

        assert_eq!(
            output,
            vec![
                Bson::Document(doc! {
                    "_id": "MEDIUM", "numTours": 1, "avgRating": 4.8,
                    "minPrice": 1497, "maxPrice": 1497, "names": ["B"],
                }),
                Bson::Document(doc! {
                    "_id": "EASY", "numTours": 2, "avgRating": 4.625,
                    "minPrice": 397, "maxPrice": 497.5, "names": ["A", "C"],
                }),
            ]
        );
    }

    #[test]
    fn integer_sums_stay_integers() {
        let members = [Bson::Document(doc! { "q": 3 }), Bson::Document(doc! { "q": 4 })];
        assert_eq!(accumulate(&members, &Accumulator::Sum("q".into())), Bson::Int32(7));
    }

    #[test]
    fn unwind_then_group_by_month() {
        let documents = vec![
            Bson::Document(doc! {
                "name": "A",
                "startDates": [
                    DateTime::from_millis(1_617_235_200_000), // 2021-04-01
                    DateTime::from_millis(1_627_776_000_000), // 2021-08-01
                ],
            }),
            Bson::Document(doc! { "name": "B", "startDates": [] }),
            Bson::Document(doc! { "name": "C", "startDates": [DateTime::from_millis(1_618_099_200_000)] }),
        ];

        let pipeline = Pipeline::new()
            .with_stage(Stage::Unwind("startDates".into()))
            .with_stage(Stage::Match(Filter::lt("startDates", DateTime::from_millis(1_625_097_600_000))))
            .with_stage(Stage::group(
                GroupKey::Month("startDates".into()),
                [("numTourStarts", Accumulator::Count), ("tours", Accumulator::Push("name".into()))],
            ))
            .with_stage(Stage::AddFields(vec![("month".into(), "_id".into())]))
            .with_stage(Stage::Project(Projection::exclude(["_id"])));

        assert_eq!(
            run_pipeline(documents, &pipeline),
            vec![Bson::Document(doc! { "numTourStarts": 2, "tours": ["A", "C"], "month": 4 })]
        );
    }

    #[test]
    fn limit_truncates() {
        let pipeline = Pipeline::new().with_stage(Stage::Limit(2));
        assert_eq!(run_pipeline(tours(), &pipeline).len(), 2);
    }
}
