pub mod storage;
pub mod types;

use crate::shared::errors::StoreError;
use chrono::{Local, NaiveDateTime};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use types::{Category, CategoryExport, ExportAll, LoadOutcome, Todo};
use uuid::Uuid;

/// Fields `update` never touches.
const IMMUTABLE_FIELDS: [&str; 2] = ["id", "created_at"];

/// Current local wall-clock time, the clock every timestamp in the store uses.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// In-memory todo collection bound to one JSON data file.
///
/// Mutations only touch memory; `save` must be called to make them durable.
pub struct TodoStore {
    path: PathBuf,
    todos: Vec<Todo>,
    /// Set when the data file exists but failed to load; saving is refused
    /// until a load succeeds.
    unreadable: bool,
}

impl TodoStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            todos: Vec::new(),
            unreadable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// Appends a new todo and returns its id.
    pub fn add(
        &mut self,
        title: impl Into<String>,
        category: Category,
        description: Option<&str>,
        due_date: Option<NaiveDateTime>,
    ) -> String {
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.unwrap_or_default().to_string(),
            category,
            created_at: now(),
            due_date,
            completed: false,
            completed_at: None,
            reminders: Vec::new(),
        };

        let id = todo.id.clone();
        if !todo.category.is_known() {
            tracing::warn!(target: "store", id = %id, category = %todo.category, "Todo filed outside the standard buckets");
        }
        tracing::debug!(target: "store", id = %id, category = %todo.category, "Todo added");
        self.todos.push(todo);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|todo| todo.id == id)
    }

    /// Applies a field-name to value mapping to an existing todo.
    ///
    /// Names that are not fields of the record are ignored. `id` and
    /// `created_at` are immutable and skipped. A value of the wrong type
    /// rejects the whole update and leaves the record as it was.
    pub fn update(&mut self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let current = self.get(id).ok_or_else(|| StoreError::not_found(id))?;
        let mut updated = current.clone();

        for (key, new_value) in fields {
            if IMMUTABLE_FIELDS.contains(&key.as_str()) {
                tracing::warn!(target: "store", id = %id, field = %key, "Ignoring update of immutable field");
                continue;
            }

            let mut record = serde_json::to_value(&updated)?;
            match record.get_mut(key.as_str()) {
                Some(slot) => *slot = new_value.clone(),
                None => {
                    tracing::debug!(target: "store", id = %id, field = %key, "Ignoring unknown field");
                    continue;
                }
            }

            updated = serde_json::from_value(record)
                .map_err(|e| StoreError::invalid_field(key.as_str(), e.to_string()))?;
        }

        enforce_completion_pairing(&mut updated);

        if let Some(slot) = self.get_mut(id) {
            *slot = updated;
        }
        Ok(())
    }

    pub fn complete(&mut self, id: &str) -> Result<(), StoreError> {
        let todo = self.get_mut(id).ok_or_else(|| StoreError::not_found(id))?;
        todo.completed = true;
        todo.completed_at = Some(now());
        tracing::debug!(target: "store", id = %id, "Todo completed");
        Ok(())
    }

    /// Removes a todo. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) {
        let before = self.todos.len();
        self.todos.retain(|todo| todo.id != id);
        if self.todos.len() != before {
            tracing::debug!(target: "store", id = %id, "Todo deleted");
        }
    }

    pub fn list_by_category(&self, category: &Category) -> Vec<&Todo> {
        self.todos
            .iter()
            .filter(|todo| &todo.category == category)
            .collect()
    }

    pub fn today(&self) -> Vec<&Todo> {
        self.list_by_category(&Category::Today)
    }

    pub fn week(&self) -> Vec<&Todo> {
        self.list_by_category(&Category::Week)
    }

    pub fn month(&self) -> Vec<&Todo> {
        self.list_by_category(&Category::Month)
    }

    pub fn list_all(&self) -> &[Todo] {
        &self.todos
    }

    /// Appends a reminder timestamp. Past times are accepted as-is.
    pub fn add_reminder(&mut self, id: &str, at: NaiveDateTime) -> Result<(), StoreError> {
        let todo = self.get_mut(id).ok_or_else(|| StoreError::not_found(id))?;
        todo.reminders.push(at);
        Ok(())
    }

    /// Snapshot of `(todo_id, reminder)` for every incomplete todo.
    pub fn open_reminders(&self) -> Vec<(String, NaiveDateTime)> {
        self.todos
            .iter()
            .filter(|todo| !todo.completed)
            .flat_map(|todo| todo.reminders.iter().map(|at| (todo.id.clone(), *at)))
            .collect()
    }

    /// Writes the whole collection to the data file, replacing its contents.
    /// Fails without writing if the file on disk could not be loaded.
    pub fn save(&self) -> Result<(), StoreError> {
        if self.unreadable {
            tracing::error!(target: "store", path = %self.path.display(), "Data file failed to load, not overwriting it");
            return Err(StoreError::Unreadable(self.path.display().to_string()));
        }

        match storage::write_todos(&self.path, &self.todos) {
            Ok(()) => {
                tracing::debug!(
                    target: "store",
                    path = %self.path.display(),
                    count = self.todos.len(),
                    "Todos saved"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(target: "store", path = %self.path.display(), "Failed to save todos: {}", e);
                Err(e)
            }
        }
    }

    /// Replaces the in-memory collection with the data file's contents.
    ///
    /// A missing file yields `LoadOutcome::NoFile`. On read or parse errors
    /// the current collection is left untouched and `save` is blocked so the
    /// file is not clobbered.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        if !self.path.exists() {
            tracing::info!(target: "store", path = %self.path.display(), "No data file yet");
            self.unreadable = false;
            return Ok(LoadOutcome::NoFile);
        }

        match storage::read_todos(&self.path) {
            Ok(todos) => {
                let count = todos.len();
                self.todos = todos;
                self.unreadable = false;
                tracing::info!(target: "store", path = %self.path.display(), count = count, "Todos loaded");
                Ok(LoadOutcome::Loaded { count })
            }
            Err(e) => {
                tracing::error!(target: "store", path = %self.path.display(), "Failed to load todos: {}", e);
                self.unreadable = true;
                Err(e)
            }
        }
    }

    pub fn export_category(&self, category: &Category) -> CategoryExport {
        let todos: Vec<Todo> = self
            .list_by_category(category)
            .into_iter()
            .cloned()
            .collect();

        CategoryExport {
            category: category.clone(),
            export_time: now(),
            total: todos.len(),
            completed: todos.iter().filter(|todo| todo.completed).count(),
            todos,
        }
    }

    pub fn export_all(&self) -> ExportAll {
        ExportAll {
            today: self.export_category(&Category::Today),
            week: self.export_category(&Category::Week),
            month: self.export_category(&Category::Month),
        }
    }

    /// Writes `export_all()` to `path` as pretty JSON.
    pub fn export_to_file(&self, path: &Path) -> Result<(), StoreError> {
        storage::write_export(path, &self.export_all())?;
        tracing::info!(target: "store", path = %path.display(), "Todos exported");
        Ok(())
    }
}

/// `completed_at` is set exactly when `completed` is true.
fn enforce_completion_pairing(todo: &mut Todo) {
    if !todo.completed {
        todo.completed_at = None;
    } else if todo.completed_at.is_none() {
        todo.completed_at = Some(now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn store() -> TodoStore {
        TodoStore::new("unused.json")
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_add_assigns_defaults() {
        let mut store = store();
        let id = store.add("Buy milk", Category::Today, None, None);

        let todo = store.get(&id).unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.description, "");
        assert!(!todo.completed);
        assert!(todo.completed_at.is_none());
        assert!(todo.reminders.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = store();
        let a = store.add("a", Category::Today, None, None);
        let b = store.add("a", Category::Today, None, None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let mut store = store();
        store.add("a", Category::Today, None, None);
        let b = store.add("b", Category::Week, None, None);

        store.delete("does-not-exist");
        assert_eq!(store.len(), 2);

        store.delete(&b);
        store.delete(&b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_complete_then_reopen_via_update() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);

        store.complete(&id).unwrap();
        let todo = store.get(&id).unwrap();
        assert!(todo.completed);
        assert!(todo.completed_at.is_some());

        store
            .update(&id, &fields(json!({"completed": false, "completed_at": null})))
            .unwrap();
        let todo = store.get(&id).unwrap();
        assert!(!todo.completed);
        assert!(todo.completed_at.is_none());
    }

    #[test]
    fn test_update_enforces_completion_pairing() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);

        store.update(&id, &fields(json!({"completed": true}))).unwrap();
        assert!(store.get(&id).unwrap().completed_at.is_some());

        store.update(&id, &fields(json!({"completed": false}))).unwrap();
        assert!(store.get(&id).unwrap().completed_at.is_none());
    }

    #[test]
    fn test_update_ignores_unknown_and_immutable_fields() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);
        let created_at = store.get(&id).unwrap().created_at;

        store
            .update(
                &id,
                &fields(json!({
                    "title": "renamed",
                    "priority": "high",
                    "id": "hijacked",
                    "created_at": "2000-01-01T00:00:00"
                })),
            )
            .unwrap();

        let todo = store.get(&id).unwrap();
        assert_eq!(todo.title, "renamed");
        assert_eq!(todo.created_at, created_at);
        assert!(store.get("hijacked").is_none());
    }

    #[test]
    fn test_update_passes_unrecognized_category_through() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);

        store.update(&id, &fields(json!({"category": "someday"}))).unwrap();

        let other = Category::Other("someday".to_string());
        assert_eq!(store.get(&id).unwrap().category, other);
        assert_eq!(store.list_by_category(&other).len(), 1);
        assert!(store.today().is_empty());
    }

    #[test]
    fn test_update_rejects_wrong_type_without_partial_apply() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);

        let err = store
            .update(&id, &fields(json!({"title": "b", "completed": "yes"})))
            .unwrap_err();

        match err {
            StoreError::InvalidField { field, .. } => assert_eq!(field, "completed"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get(&id).unwrap().title, "a");
    }

    #[test]
    fn test_missing_id_reports_not_found() {
        let mut store = store();
        assert!(store.complete("x").unwrap_err().is_not_found());
        assert!(store.add_reminder("x", now()).unwrap_err().is_not_found());
        assert!(store.update("x", &Map::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_by_category_keeps_insertion_order() {
        let mut store = store();
        let a = store.add("a", Category::Week, None, None);
        store.add("b", Category::Today, None, None);
        let c = store.add("c", Category::Week, None, None);

        let week: Vec<&str> = store.week().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(week, vec![a.as_str(), c.as_str()]);
    }

    #[test]
    fn test_add_reminder_allows_duplicates_and_past_times() {
        let mut store = store();
        let id = store.add("a", Category::Today, None, None);
        let past = now() - Duration::hours(1);

        store.add_reminder(&id, past).unwrap();
        store.add_reminder(&id, past).unwrap();

        assert_eq!(store.get(&id).unwrap().reminders, vec![past, past]);
    }

    #[test]
    fn test_open_reminders_skips_completed() {
        let mut store = store();
        let open = store.add("open", Category::Today, None, None);
        let done = store.add("done", Category::Today, None, None);
        let at = now() + Duration::minutes(5);
        store.add_reminder(&open, at).unwrap();
        store.add_reminder(&done, at).unwrap();
        store.complete(&done).unwrap();

        assert_eq!(store.open_reminders(), vec![(open, at)]);
    }

    #[test]
    fn test_export_category_counts() {
        let mut store = store();
        let a = store.add("a", Category::Today, None, None);
        store.add("b", Category::Today, None, None);
        store.add("c", Category::Today, None, None);
        store.add("d", Category::Month, None, None);
        store.complete(&a).unwrap();

        let export = store.export_category(&Category::Today);
        assert_eq!(export.category, Category::Today);
        assert_eq!(export.total, 3);
        assert_eq!(export.completed, 1);
        assert_eq!(export.todos.len(), 3);
        assert!(export.todos.iter().all(|t| t.category == Category::Today));
    }

    #[test]
    fn test_load_missing_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TodoStore::new(dir.path().join("todos.json"));
        store.add("a", Category::Today, None, None);

        assert_eq!(store.load().unwrap(), LoadOutcome::NoFile);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_corrupt_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "[{\"id\": 1").unwrap();

        let mut store = TodoStore::new(&path);
        store.add("a", Category::Today, None, None);

        assert!(store.load().is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.list_all()[0].title, "a");
    }

    #[test]
    fn test_save_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten as a file
        let store = TodoStore::new(dir.path());
        assert!(matches!(store.save(), Err(StoreError::IoError(_))));
    }

    #[test]
    fn test_save_refuses_to_overwrite_unloadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        let on_disk = r#"[{"id":"a","title":"keep me","created_at":"not a time"}]"#;
        std::fs::write(&path, on_disk).unwrap();

        let mut store = TodoStore::new(&path);
        assert!(store.load().is_err());
        store.add("new", Category::Today, None, None);

        assert!(matches!(store.save(), Err(StoreError::Unreadable(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);

        // Once the file is repaired a load clears the block
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(store.load().unwrap(), LoadOutcome::Loaded { count: 0 });
        store.add("after repair", Category::Today, None, None);
        store.save().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("after repair"));
    }
}
