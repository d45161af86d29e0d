use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Bucket a todo is surfaced in. Assigned by the caller, never derived from dates.
///
/// Values outside the three known buckets are kept verbatim in `Other` so a
/// record written by another tool survives a load/save cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Today,
    Week,
    Month,
    Other(String),
}

impl Category {
    /// The buckets shown to the user, in display order.
    pub const BUCKETS: [Category; 3] = [Category::Today, Category::Week, Category::Month];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Today => "today",
            Category::Week => "week",
            Category::Month => "month",
            Category::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Category::Other(_))
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Today
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "today" => Category::Today,
            "week" => Category::Week,
            "month" => Category::Month,
            other => Category::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Category::from(raw))
    }
}

/// A single persisted task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    pub created_at: NaiveDateTime,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub reminders: Vec<NaiveDateTime>,
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses the timestamp spellings found in data files and typed by users.
/// A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Due dates are often written as a plain date.
fn deserialize_due_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid due date '{}'", raw))
        }),
    }
}

/// Read-only summary of one bucket, as handed to exports and the summariser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryExport {
    pub category: Category,
    pub export_time: NaiveDateTime,
    pub total: usize,
    pub completed: usize,
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAll {
    pub today: CategoryExport,
    pub week: CategoryExport,
    pub month: CategoryExport,
}

impl ExportAll {
    pub fn get(&self, category: &Category) -> Option<&CategoryExport> {
        match category {
            Category::Today => Some(&self.today),
            Category::Week => Some(&self.week),
            Category::Month => Some(&self.month),
            Category::Other(_) => None,
        }
    }
}

/// What `TodoStore::load` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    NoFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_as_bare_string() {
        assert_eq!(serde_json::to_string(&Category::Week).unwrap(), "\"week\"");
        let parsed: Category = serde_json::from_str("\"month\"").unwrap();
        assert_eq!(parsed, Category::Month);
    }

    #[test]
    fn test_unknown_category_passes_through() {
        let parsed: Category = serde_json::from_str("\"someday\"").unwrap();
        assert_eq!(parsed, Category::Other("someday".to_string()));
        assert!(!parsed.is_known());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"someday\"");
    }

    #[test]
    fn test_todo_reads_record_with_microseconds() {
        let raw = r#"{
            "id": "5d1c9d8e-1111-2222-3333-444455556666",
            "title": "Buy milk",
            "description": "",
            "category": "today",
            "created_at": "2025-03-01T09:30:00.123456",
            "due_date": null,
            "completed": false,
            "completed_at": null,
            "reminders": ["2025-03-01T09:35:00.123456"]
        }"#;

        let todo: Todo = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.category, Category::Today);
        assert_eq!(todo.reminders.len(), 1);
        assert!(todo.completed_at.is_none());
    }

    #[test]
    fn test_parse_timestamp_spellings() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-03-02T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-02 14:30"), Some(expected));
        assert_eq!(parse_timestamp(" 2025-03-02T14:30 "), Some(expected));
        assert_eq!(
            parse_timestamp("2025-03-02"),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("tomorrow"), None);
    }

    #[test]
    fn test_date_only_due_date_loads_as_midnight() {
        let raw = r#"{"id":"a","title":"keep me","created_at":"2025-03-01T09:30:00","due_date":"2025-03-02"}"#;
        let todo: Todo = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.due_date, parse_timestamp("2025-03-02T00:00:00"));

        let bad = r#"{"id":"a","title":"t","created_at":"2025-03-01T09:30:00","due_date":"soon"}"#;
        assert!(serde_json::from_str::<Todo>(bad).is_err());
    }

    #[test]
    fn test_todo_missing_optional_fields_default() {
        let raw = r#"{"id": "a", "title": "t", "created_at": "2025-03-01T09:30:00"}"#;
        let todo: Todo = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.category, Category::Today);
        assert!(todo.reminders.is_empty());
        assert!(!todo.completed);
    }
}
