//! The `Tour` entity and its write-time rules.

use bson::{Bson, DateTime, Uuid};
use serde::{Deserialize, Serialize};

use docgate_core::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

pub const COLLECTION: &str = "tours";

pub const NAME_MIN_LEN: usize = 10;
pub const NAME_MAX_LEN: usize = 40;
pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 5.0;
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Fields whose string values are trimmed before they are stored.
pub const TRIMMED_FIELDS: [&str; 3] = ["name", "summary", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

fn default_ratings_average() -> f64 {
    DEFAULT_RATINGS_AVERAGE
}

/// A stored tour.
///
/// `slug` is filled in by the insert hooks and never re-derived afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: i32,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime,
    #[serde(default)]
    pub start_dates: Vec<DateTime>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(rename = "__v", default)]
    pub version: i32,
}

impl Tour {
    /// Length of the tour in weeks. Not stored.
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }
}

impl Document for Tour {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        COLLECTION
    }

    fn unique_fields() -> &'static [&'static str] {
        &["name"]
    }

    fn validate(&self) -> DocumentStoreResult<()> {
        let name_len = self.name.trim().chars().count();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(DocumentStoreError::validation(
                "name",
                format!("must have between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"),
            ));
        }
        if !(RATING_MIN..=RATING_MAX).contains(&self.ratings_average) {
            return Err(DocumentStoreError::validation(
                "ratingsAverage",
                format!("must be between {RATING_MIN} and {RATING_MAX}"),
            ));
        }
        if let Some(discount) = self.price_discount.filter(|discount| *discount >= self.price) {
            return Err(DocumentStoreError::validation(
                "priceDiscount",
                format!("discount price ({discount}) should be below regular price"),
            ));
        }
        if self.summary.trim().is_empty() {
            return Err(DocumentStoreError::validation("summary", "is required"));
        }
        if self.image_cover.trim().is_empty() {
            return Err(DocumentStoreError::validation("imageCover", "is required"));
        }

        Ok(())
    }

    fn apply_virtuals(document: &mut bson::Document) {
        let duration = match document.get("duration") {
            Some(Bson::Int32(value)) => f64::from(*value),
            Some(Bson::Int64(value)) => *value as f64,
            Some(Bson::Double(value)) => *value,
            _ => return,
        };

        document.insert("durationWeeks", duration / 7.0);
    }
}

/// Client input for creating a tour. Server-set fields are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTour {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub ratings_average: Option<f64>,
    #[serde(default)]
    pub ratings_quantity: Option<i32>,
    pub price: f64,
    #[serde(default)]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime>,
    #[serde(default)]
    pub secret_tour: bool,
}

impl NewTour {
    pub fn into_tour(self, id: Uuid, created_at: DateTime) -> Tour {
        Tour {
            id,
            name: self.name.trim().to_string(),
            slug: None,
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: self.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE),
            ratings_quantity: self.ratings_quantity.unwrap_or_default(),
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary.trim().to_string(),
            description: self.description.map(|text| text.trim().to_string()),
            image_cover: self.image_cover,
            images: self.images,
            created_at,
            start_dates: self.start_dates,
            secret_tour: self.secret_tour,
            version: 0,
        }
    }
}

/// Trims the text fields of a partial update.
pub fn trim_changes(changes: bson::Document) -> bson::Document {
    changes
        .into_iter()
        .map(|(field, value)| match value {
            Bson::String(text) if TRIMMED_FIELDS.contains(&field.as_str()) => {
                let trimmed = text.trim().to_string();
                (field, Bson::String(trimmed))
            }
            value => (field, value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docgate_core::document::DocumentExt;

    use super::*;

    fn new_tour() -> NewTour {
        NewTour {
            name: "  The Forest Hiker ".to_string(),
            duration: 5,
            max_group_size: 25,
            difficulty: Difficulty::Easy,
            ratings_average: None,
            ratings_quantity: None,
            price: 397.0,
            price_discount: None,
            summary: " Breathtaking hike through the Canadian Banff National Park ".to_string(),
            description: None,
            image_cover: "tour-1-cover.jpg".to_string(),
            images: Vec::new(),
            start_dates: Vec::new(),
            secret_tour: false,
        }
    }

    fn field_of(err: DocumentStoreError) -> String {
        match err {
            DocumentStoreError::ValidationFailed { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn new_tour_is_trimmed_and_defaulted() {
        let tour = new_tour().into_tour(Uuid::new(), DateTime::now());

        assert_eq!(tour.name, "The Forest Hiker");
        assert_eq!(tour.summary, "Breathtaking hike through the Canadian Banff National Park");
        assert_eq!(tour.ratings_average, DEFAULT_RATINGS_AVERAGE);
        assert_eq!(tour.ratings_quantity, 0);
        assert_eq!(tour.version, 0);
        assert!(tour.validate().is_ok());
    }

    #[test]
    fn name_length_is_bounded() {
        let short = NewTour { name: "Hike".to_string(), ..new_tour() }.into_tour(Uuid::new(), DateTime::now());
        assert_eq!(field_of(short.validate().unwrap_err()), "name");

        let long = NewTour { name: "x".repeat(41), ..new_tour() }.into_tour(Uuid::new(), DateTime::now());
        assert_eq!(field_of(long.validate().unwrap_err()), "name");
    }

    #[test]
    fn discount_must_stay_below_price() {
        let tour = NewTour { price_discount: Some(397.0), ..new_tour() }.into_tour(Uuid::new(), DateTime::now());
        assert_eq!(field_of(tour.validate().unwrap_err()), "priceDiscount");

        let tour = NewTour { price_discount: Some(97.0), ..new_tour() }.into_tour(Uuid::new(), DateTime::now());
        assert!(tour.validate().is_ok());
    }

    #[test]
    fn rating_is_bounded() {
        let tour = NewTour { ratings_average: Some(5.5), ..new_tour() }.into_tour(Uuid::new(), DateTime::now());
        assert_eq!(field_of(tour.validate().unwrap_err()), "ratingsAverage");
    }

    #[test]
    fn serialized_fields_are_camel_case() {
        let tour = new_tour().into_tour(Uuid::new(), DateTime::now());
        let bson = tour.to_bson().unwrap();
        let fields = bson.as_document().unwrap();

        assert!(fields.contains_key("maxGroupSize"));
        assert!(fields.contains_key("secretTour"));
        assert_eq!(fields.get_i32("__v").unwrap(), 0);
        assert!(!fields.contains_key("slug"));
        assert_eq!(Tour::from_bson(bson).unwrap(), tour);
    }

    #[test]
    fn duration_weeks_is_attached_when_duration_is_present() {
        let mut fields = doc! { "name": "The Sea Explorer", "duration": 7 };
        Tour::apply_virtuals(&mut fields);
        assert_eq!(fields.get_f64("durationWeeks").unwrap(), 1.0);

        let mut projected = doc! { "name": "The Sea Explorer" };
        Tour::apply_virtuals(&mut projected);
        assert!(!projected.contains_key("durationWeeks"));
    }

    #[test]
    fn new_tour_reads_a_request_body() {
        let body = serde_json::json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg",
        });

        let tour: NewTour = serde_json::from_value(body).unwrap();

        assert_eq!(tour.difficulty, Difficulty::Medium);
        assert_eq!(tour.price, 497.0);
        assert_eq!(tour.ratings_average, None);
        assert!(!tour.secret_tour);
    }

    #[test]
    fn only_text_fields_are_trimmed() {
        let changes = trim_changes(doc! { "name": " The Sea Explorer ", "imageCover": " cover.jpg ", "price": 497.0 });

        assert_eq!(changes, doc! { "name": "The Sea Explorer", "imageCover": " cover.jpg ", "price": 497.0 });
    }
}
