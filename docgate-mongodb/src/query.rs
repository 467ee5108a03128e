//! Translation of docgate queries and pipelines into MongoDB syntax.
//!
//! Filter expressions go through [`MongoQueryTranslator`]; sort keys,
//! projections and aggregation stages have plain translation functions.

use bson::{Bson, Document, doc};

use docgate_core::{
    aggregate::{Accumulator, GroupKey, Pipeline, Stage},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, ID_FIELD, Projection, QueryVisitor, Sort, SortDirection},
};

/// Translates docgate filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let operator = match op {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
        };

        Ok(doc! { field: { operator: value.clone() } })
    }
}

pub(crate) fn filter_document(expr: Option<&Expr>) -> DocumentStoreResult<Document> {
    match expr {
        Some(expr) => MongoQueryTranslator.visit_expr(expr),
        None => Ok(doc! {}),
    }
}

pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            (key.field.clone(), Bson::Int32(direction))
        })
        .collect()
}

pub(crate) fn projection_document(projection: &Projection) -> Document {
    let flag = match projection {
        Projection::Include(_) => 1,
        Projection::Exclude(_) => 0,
    };

    let mut document = projection
        .fields()
        .iter()
        .map(|field| (field.clone(), Bson::Int32(flag)))
        .collect::<Document>();
    if matches!(projection, Projection::Include(_)) {
        document.insert(ID_FIELD, 1);
    }
    document
}

fn field_path(field: &str) -> Bson {
    Bson::String(format!("${field}"))
}

fn group_key(key: &GroupKey) -> Bson {
    match key {
        GroupKey::Field(field) => field_path(field),
        GroupKey::Upper(field) => Bson::Document(doc! { "$toUpper": field_path(field) }),
        GroupKey::Month(field) => Bson::Document(doc! { "$month": field_path(field) }),
    }
}

fn accumulator(accumulator: &Accumulator) -> Document {
    match accumulator {
        Accumulator::Count => doc! { "$sum": 1 },
        Accumulator::Sum(field) => doc! { "$sum": field_path(field) },
        Accumulator::Avg(field) => doc! { "$avg": field_path(field) },
        Accumulator::Min(field) => doc! { "$min": field_path(field) },
        Accumulator::Max(field) => doc! { "$max": field_path(field) },
        Accumulator::Push(field) => doc! { "$push": field_path(field) },
    }
}

/// Translates one stage. Returns `None` for stages MongoDB would reject and
/// that have no effect, such as an empty sort.
pub(crate) fn stage_document(stage: &Stage) -> DocumentStoreResult<Option<Document>> {
    Ok(Some(match stage {
        Stage::Match(expr) => doc! { "$match": MongoQueryTranslator.visit_expr(expr)? },
        Stage::Unwind(field) => doc! { "$unwind": field_path(field) },
        Stage::Group { key, accumulators } => {
            let mut group = doc! { "_id": group_key(key) };
            for (name, acc) in accumulators {
                group.insert(name.clone(), accumulator(acc));
            }
            doc! { "$group": group }
        }
        Stage::AddFields(fields) => doc! {
            "$addFields": fields
                .iter()
                .map(|(target, source)| (target.clone(), field_path(source)))
                .collect::<Document>(),
        },
        Stage::Project(projection) if projection.fields().is_empty() => return Ok(None),
        Stage::Project(projection) => doc! { "$project": projection_document(projection) },
        Stage::Sort(keys) if keys.is_empty() => return Ok(None),
        Stage::Sort(keys) => doc! { "$sort": sort_document(keys) },
        Stage::Limit(limit) => doc! { "$limit": i64::try_from(*limit).unwrap_or(i64::MAX) },
    }))
}

pub(crate) fn pipeline_documents(pipeline: &Pipeline) -> DocumentStoreResult<Vec<Document>> {
    pipeline
        .stages()
        .iter()
        .filter_map(|stage| stage_document(stage).transpose())
        .collect()
}

#[cfg(test)]
mod tests {
    use docgate_core::query::Filter;

    use super::*;

    #[test]
    fn filter_translates_to_operator_documents() {
        let filter = Filter::and([Filter::gte("duration", 5i64), Filter::ne("secretTour", true)]);

        assert_eq!(
            filter_document(Some(&filter)).unwrap(),
            doc! { "$and": [
                { "duration": { "$gte": 5i64 } },
                { "secretTour": { "$ne": true } },
            ] }
        );
        assert_eq!(filter_document(None).unwrap(), doc! {});
    }

    #[test]
    fn sort_keeps_key_order() {
        assert_eq!(
            sort_document(&[Sort::desc("ratingsAverage"), Sort::asc("price")]),
            doc! { "ratingsAverage": -1, "price": 1 }
        );
    }

    #[test]
    fn inclusion_always_selects_the_id() {
        assert_eq!(
            projection_document(&Projection::include(["name", "price"])),
            doc! { "name": 1, "price": 1, "id": 1 }
        );
        assert_eq!(projection_document(&Projection::exclude(["__v"])), doc! { "__v": 0 });
    }

    #[test]
    fn group_stage_uses_field_paths() {
        let stage = Stage::group(
            GroupKey::Upper("difficulty".into()),
            [("numTours", Accumulator::Count), ("avgPrice", Accumulator::Avg("price".into()))],
        );

        assert_eq!(
            stage_document(&stage).unwrap(),
            Some(doc! { "$group": {
                "_id": { "$toUpper": "$difficulty" },
                "numTours": { "$sum": 1 },
                "avgPrice": { "$avg": "$price" },
            } })
        );
    }

    #[test]
    fn empty_stages_are_skipped() {
        let pipeline = Pipeline::new()
            .with_stage(Stage::Sort(Vec::new()))
            .with_stage(Stage::Unwind("startDates".into()))
            .with_stage(Stage::Limit(12));

        assert_eq!(
            pipeline_documents(&pipeline).unwrap(),
            vec![doc! { "$unwind": "$startDates" }, doc! { "$limit": 12i64 }]
        );
    }
}
