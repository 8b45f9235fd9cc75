//! Core immutable data model for Discovera.
//!
//! Books are immutable records; status and review changes are represented by creating
//! new books (`with_status`, `with_reviews`) rather than mutating in place.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Reviewer display name used when no name was supplied or persisted.
pub const ANONYMOUS_REVIEWER: &str = "Anonymous";

/// Identifier for a book in the catalog. Assigned at seeding, never reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(pub u32);

impl BookId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reading status a user can assign to a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    WantToRead,
    Reading,
    Read,
}

impl ReadingStatus {
    /// Stable wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "want-to-read",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Read => "read",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO-8601 UTC timestamp wrapper.
///
/// Always held as text so a persisted snapshot round-trips byte-for-byte.
/// Deserialization also accepts a unix-epoch-milliseconds number and coerces it
/// to RFC 3339 text, so older persisted representations load cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp(pub String);

impl Timestamp {
    pub fn new(ts: impl Into<String>) -> Self {
        Self(ts.into())
    }

    /// Convert milliseconds since the unix epoch into RFC 3339 text.
    pub fn from_unix_millis(ms: i64) -> Self {
        let formatted = OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".into());
        Self(formatted)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            EpochMillis(i64),
            EpochMillisFloat(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Ok(Timestamp(text)),
            Raw::EpochMillis(ms) => Ok(Timestamp::from_unix_millis(ms)),
            Raw::EpochMillisFloat(ms) => Ok(Timestamp::from_unix_millis(ms as i64)),
        }
    }
}

/// Catalog score in the closed range [0.0, 5.0]. Fixed at seeding, not user-editable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating(f32);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RatingError {
    #[error("rating must be between 0.0 and 5.0 inclusive, got {0}")]
    OutOfRange(f32),
    #[error("rating cannot be NaN")]
    NotANumber,
}

impl Rating {
    /// Validates the provided value is finite and within [0.0, 5.0].
    pub fn new(value: f32) -> Result<Self, RatingError> {
        if value.is_nan() {
            return Err(RatingError::NotANumber);
        }
        if !(0.0..=5.0).contains(&value) {
            return Err(RatingError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Clamps the provided value into the valid range; NaN becomes 0.0.
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 5.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A user-authored note attached to exactly one book.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    text: String,
    #[serde(default = "default_reviewer_name")]
    reviewer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reviewer_avatar: Option<String>,
    created_at: Timestamp,
}

fn default_reviewer_name() -> String {
    ANONYMOUS_REVIEWER.to_string()
}

impl Review {
    pub fn new(
        text: impl Into<String>,
        reviewer_name: impl Into<String>,
        reviewer_avatar: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            text: text.into(),
            reviewer_name: reviewer_name.into(),
            reviewer_avatar,
            created_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reviewer_name(&self) -> &str {
        &self.reviewer_name
    }

    pub fn reviewer_avatar(&self) -> Option<&str> {
        self.reviewer_avatar.as_deref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Fill a blank reviewer name with the anonymous default.
    ///
    /// A missing name is already defaulted during deserialization; this also
    /// covers names persisted as empty or whitespace-only text.
    pub fn normalized(mut self) -> Self {
        if self.reviewer_name.trim().is_empty() {
            self.reviewer_name = default_reviewer_name();
        }
        self
    }
}

/// Immutable catalog entry.
///
/// Constructed once via the builder; mutations produce a fresh record through
/// `with_status`/`with_reviews` so older snapshots keep observing their own state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<ReadingStatus>,
    #[serde(default)]
    reviews: Vec<Review>,
}

impl Book {
    pub fn builder(
        id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
        rating: Rating,
    ) -> BookBuilder {
        BookBuilder {
            id,
            title: title.into(),
            author: author.into(),
            rating,
            image: None,
            status: None,
            reviews: Vec::new(),
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn status(&self) -> Option<ReadingStatus> {
        self.status
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    /// Copy of this book carrying a new reading status.
    pub fn with_status(&self, status: ReadingStatus) -> Book {
        Book {
            status: Some(status),
            ..self.clone()
        }
    }

    /// Copy of this book carrying a replaced review sequence.
    pub fn with_reviews(&self, reviews: Vec<Review>) -> Book {
        Book {
            reviews,
            ..self.clone()
        }
    }
}

/// Builder for immutable books.
pub struct BookBuilder {
    id: BookId,
    title: String,
    author: String,
    rating: Rating,
    image: Option<String>,
    status: Option<ReadingStatus>,
    reviews: Vec<Review>,
}

impl BookBuilder {
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn status(mut self, status: ReadingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn add_review(mut self, review: Review) -> Self {
        self.reviews.push(review);
        self
    }

    pub fn build(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            rating: self.rating,
            image: self.image,
            status: self.status,
            reviews: self.reviews,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book::builder(
            BookId::new(7),
            "The Midnight Library",
            "Matt Haig",
            Rating::new(4.2).expect("rating"),
        )
        .image("https://covers.example/midnight-library.jpg")
        .status(ReadingStatus::Reading)
        .add_review(Review::new(
            "great",
            "alice",
            None,
            Timestamp::new("2024-01-01T00:00:00Z"),
        ))
        .build()
    }

    #[test]
    fn rating_validation() {
        assert!(Rating::new(0.0).is_ok());
        assert!(Rating::new(5.0).is_ok());
        assert!(Rating::new(5.1).is_err());
        assert!(Rating::new(-0.1).is_err());
        assert!(Rating::new(f32::NAN).is_err());
        assert_eq!(Rating::clamped(7.5).get(), 5.0);
        assert_eq!(Rating::clamped(-1.0).get(), 0.0);
        assert_eq!(Rating::clamped(f32::NAN).get(), 0.0);
    }

    #[test]
    fn reading_status_serde_names_are_stable() {
        let statuses = [
            (ReadingStatus::WantToRead, "want-to-read"),
            (ReadingStatus::Reading, "reading"),
            (ReadingStatus::Read, "read"),
        ];

        for (status, expected) in statuses {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{expected}\""));
            assert_eq!(status.as_str(), expected);
        }
    }

    #[test]
    fn with_status_leaves_original_untouched() {
        let book = sample_book();
        let updated = book.with_status(ReadingStatus::Read);
        assert_eq!(book.status(), Some(ReadingStatus::Reading));
        assert_eq!(updated.status(), Some(ReadingStatus::Read));
        assert_eq!(updated.id(), book.id());
        assert_eq!(updated.reviews(), book.reviews());
    }

    #[test]
    fn review_wire_names_match_persisted_format() {
        let json = serde_json::to_value(sample_book()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["title"], "The Midnight Library");
        assert_eq!(json["status"], "reading");
        let review = &json["reviews"][0];
        assert_eq!(review["reviewerName"], "alice");
        assert_eq!(review["createdAt"], "2024-01-01T00:00:00Z");
        assert!(review.get("reviewerAvatar").is_none());
    }

    #[test]
    fn missing_reviewer_name_defaults_to_anonymous() {
        let review: Review = serde_json::from_str(
            r#"{"text":"solid","createdAt":"2024-02-02T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(review.reviewer_name(), ANONYMOUS_REVIEWER);
    }

    #[test]
    fn blank_reviewer_name_normalizes_to_anonymous() {
        let review = Review::new("ok", "   ", None, Timestamp::new("2024-01-01T00:00:00Z"));
        assert_eq!(review.normalized().reviewer_name(), ANONYMOUS_REVIEWER);
    }

    #[test]
    fn created_at_epoch_millis_coerces_to_rfc3339() {
        let review: Review = serde_json::from_str(
            r#"{"text":"old format","reviewerName":"bob","createdAt":1704067200000}"#,
        )
        .unwrap();
        assert_eq!(review.created_at().0, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn optional_fields_absent_in_wire_form() {
        let book = Book::builder(
            BookId::new(0),
            "Norwegian Wood",
            "Haruki Murakami",
            Rating::new(4.0).unwrap(),
        )
        .build();
        let json = serde_json::to_value(&book).unwrap();
        assert!(json.get("image").is_none());
        assert!(json.get("status").is_none());
        assert_eq!(json["reviews"].as_array().unwrap().len(), 0);

        let back: Book = serde_json::from_value(json).unwrap();
        assert_eq!(back, book);
    }
}
