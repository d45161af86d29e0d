use super::types::{ExportAll, Todo};
use crate::shared::errors::StoreError;
use crate::shared::paths::ensure_dir;
use std::collections::HashSet;
use std::path::Path;

/// Reads the whole todo collection from a JSON array file.
pub fn read_todos(path: &Path) -> Result<Vec<Todo>, StoreError> {
    let content = std::fs::read_to_string(path)?;
    let todos: Vec<Todo> = serde_json::from_str(&content)?;
    Ok(dedupe_ids(todos))
}

/// Overwrites `path` with the whole collection, creating the parent directory.
pub fn write_todos(path: &Path, todos: &[Todo]) -> Result<(), StoreError> {
    write_pretty(path, todos)
}

pub fn write_export(path: &Path, export: &ExportAll) -> Result<(), StoreError> {
    write_pretty(path, export)
}

fn write_pretty<T: serde::Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)
                .map_err(|e| StoreError::directory(format!("{}: {}", parent.display(), e)))?;
        }
    }

    let content = serde_json::to_string_pretty(data)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Keeps the first record for every id; later duplicates are dropped.
fn dedupe_ids(todos: Vec<Todo>) -> Vec<Todo> {
    let mut seen = HashSet::with_capacity(todos.len());
    let before = todos.len();

    let unique: Vec<Todo> = todos
        .into_iter()
        .filter(|todo| seen.insert(todo.id.clone()))
        .collect();

    let dropped = before - unique.len();
    if dropped > 0 {
        tracing::warn!(
            target: "store",
            dropped = dropped,
            "Dropped todos with duplicate ids while loading"
        );
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::types::Category;
    use chrono::NaiveDate;

    fn todo(id: &str, title: &str) -> Todo {
        Todo {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            category: Category::Today,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            due_date: None,
            completed: false,
            completed_at: None,
            reminders: vec![],
        }
    }

    #[test]
    fn test_write_creates_missing_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("todos.json");

        write_todos(&path, &[todo("a", "first")]).unwrap();

        assert!(path.exists());
        let back = read_todos(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].title, "first");
    }

    #[test]
    fn test_written_file_is_a_plain_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        write_todos(&path, &[todo("a", "first"), todo("b", "second")]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let items = raw.as_array().expect("top level should be an array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["category"], "today");
        assert!(items[0]["completed_at"].is_null());
    }

    #[test]
    fn test_read_keeps_first_of_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        write_todos(&path, &[todo("a", "first"), todo("a", "shadow")]).unwrap();

        let back = read_todos(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].title, "first");
    }

    #[test]
    fn test_read_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read_todos(&path), Err(StoreError::ParseError(_))));
    }
}
