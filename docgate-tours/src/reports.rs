//! Canned aggregation pipelines over the tours collection.
//!
//! Both pipelines are plain values; the visibility stage is added by the
//! collection's hooks when they run.

use bson::DateTime;
use chrono::NaiveDate;

use docgate_core::{
    aggregate::{Accumulator, GroupKey, Pipeline, Stage},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, Projection, Sort},
};

/// Ratings threshold used by the stats report.
pub const STATS_MIN_RATING: f64 = 4.5;

/// Upper bound on the months returned by the monthly plan.
pub const MONTHS_PER_YEAR: usize = 12;

/// Per-difficulty statistics over well rated tours, cheapest group first.
pub fn tour_stats(min_rating: f64) -> Pipeline {
    Pipeline::new()
        .with_stage(Stage::Match(Filter::gte("ratingsAverage", min_rating)))
        .with_stage(Stage::group(
            GroupKey::Upper("difficulty".into()),
            [
                ("numTours", Accumulator::Count),
                ("numRatings", Accumulator::Sum("ratingsQuantity".into())),
                ("avgRating", Accumulator::Avg("ratingsAverage".into())),
                ("avgPrice", Accumulator::Avg("price".into())),
                ("minPrice", Accumulator::Min("price".into())),
                ("maxPrice", Accumulator::Max("price".into())),
            ],
        ))
        .with_stage(Stage::Sort(vec![Sort::asc("avgPrice")]))
}

fn new_year(year: i32) -> DocumentStoreResult<DateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| DateTime::from_chrono(midnight.and_utc()))
        .ok_or_else(|| DocumentStoreError::validation("year", "is out of range"))
}

/// Tour starts per month of `year`, busiest month first.
///
/// A start date belongs to the year when it falls in `[Jan 1 year, Jan 1
/// year + 1)`, so starts on December 31st are counted whatever their time.
pub fn monthly_plan(year: i32) -> DocumentStoreResult<Pipeline> {
    let start = new_year(year)?;
    let end = year
        .checked_add(1)
        .ok_or_else(|| DocumentStoreError::validation("year", "is out of range"))
        .and_then(new_year)?;

    Ok(Pipeline::new()
        .with_stage(Stage::Unwind("startDates".into()))
        .with_stage(Stage::Match(Filter::and([
            Filter::gte("startDates", start),
            Filter::lt("startDates", end),
        ])))
        .with_stage(Stage::group(
            GroupKey::Month("startDates".into()),
            [
                ("numTourStarts", Accumulator::Count),
                ("tours", Accumulator::Push("name".into())),
            ],
        ))
        .with_stage(Stage::AddFields(vec![("month".into(), "_id".into())]))
        .with_stage(Stage::Project(Projection::exclude(["_id"])))
        .with_stage(Stage::Sort(vec![Sort::desc("numTourStarts")]))
        .with_stage(Stage::Limit(MONTHS_PER_YEAR)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_pipeline_shape() {
        let names = tour_stats(STATS_MIN_RATING)
            .stages()
            .iter()
            .map(Stage::name)
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["match", "group", "sort"]);
    }

    #[test]
    fn monthly_plan_bounds_the_year() {
        let pipeline = monthly_plan(2021).unwrap();

        let Stage::Match(filter) = &pipeline.stages()[1] else {
            panic!("second stage should match on the start dates");
        };
        let expected = Filter::and([
            Filter::gte("startDates", DateTime::parse_rfc3339_str("2021-01-01T00:00:00Z").unwrap()),
            Filter::lt("startDates", DateTime::parse_rfc3339_str("2022-01-01T00:00:00Z").unwrap()),
        ]);
        assert_eq!(filter, &expected);
        assert_eq!(pipeline.stages().last(), Some(&Stage::Limit(12)));
    }

    #[test]
    fn impossible_year_is_rejected() {
        assert!(matches!(
            monthly_plan(i32::MAX),
            Err(DocumentStoreError::ValidationFailed { .. })
        ));
    }
}
