//! Resident app loop.
//!
//! `App` owns the store and is the only place it gets mutated. Fired
//! reminders, hotkey presses and Ctrl-C are all handled on the task that
//! runs `App::run`, so no locking is needed around the store.

use crate::core::clipboard::read_clipboard_text;
use crate::core::notify::NotificationSink;
use crate::core::settings::{save_settings_to, validate_shortcuts, AppSettings, SettingsError};
use crate::core::shortcut::{HotkeyAction, HotkeyListener};
use crate::reminder::{reconcile, ReminderFired, ReminderScheduler};
use crate::shared::errors::StoreError;
use crate::shared::paths::get_settings_path;
use crate::summary::{SummaryError, Summarizer};
use crate::todo::types::{Category, LoadOutcome};
use crate::todo::{self, TodoStore};
use chrono::{Duration, NaiveDateTime};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

const APP_TITLE: &str = "TodoTips";
const REMINDER_TITLE: &str = "Todo reminder";
const ADDED_TITLE: &str = "Todo added";
const PREVIEW_CHARS: usize = 50;

/// Offsets from "now" at which a quick-added todo reminds the user.
pub fn quick_add_offsets() -> [Duration; 3] {
    [Duration::minutes(5), Duration::minutes(15), Duration::hours(1)]
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error("{0}")]
    Clipboard(String),
    #[error("Nothing to add: text is empty")]
    EmptyText,
}

pub struct App {
    settings: AppSettings,
    settings_path: PathBuf,
    store: TodoStore,
    scheduler: ReminderScheduler,
    fired_rx: mpsc::UnboundedReceiver<ReminderFired>,
    notifier: Box<dyn NotificationSink>,
    summarizer: Summarizer,
    hotkeys: Option<HotkeyListener>,
}

impl App {
    /// Builds the app and spawns its reminder scheduler. Must be called from
    /// inside a tokio runtime.
    pub fn new(
        settings: AppSettings,
        store: TodoStore,
        notifier: Box<dyn NotificationSink>,
        summarizer: Summarizer,
    ) -> Self {
        let (scheduler, fired_rx) = ReminderScheduler::spawn();

        Self {
            settings,
            settings_path: get_settings_path(),
            store,
            scheduler,
            fired_rx,
            notifier,
            summarizer,
            hotkeys: None,
        }
    }

    /// Where `apply_settings` persists to. Defaults to the user settings file.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Loads the data file and arms reminders. Returns how many were armed.
    pub fn startup(&mut self) -> usize {
        match self.store.load() {
            Ok(LoadOutcome::Loaded { count }) => {
                tracing::info!(target: "system", path = %self.store.path().display(), count, "Store ready");
            }
            Ok(LoadOutcome::NoFile) => {
                tracing::info!(target: "system", "Starting with an empty store");
            }
            Err(e) => {
                tracing::error!(target: "system", "Could not load todos, starting empty: {}", e);
            }
        }

        reconcile(&self.store, &self.scheduler)
    }

    /// Runs until Ctrl-C or until the scheduler goes away, then shuts down.
    pub async fn run(mut self) {
        let (hotkey_tx, mut hotkey_rx) = mpsc::unbounded_channel();
        match HotkeyListener::start(&self.settings, hotkey_tx) {
            Ok(listener) => self.hotkeys = Some(listener),
            Err(e) => {
                tracing::warn!(target: "system", "Global shortcuts unavailable: {}", e);
            }
        }

        self.startup();
        tracing::info!(target: "system", "TodoTips running");

        loop {
            tokio::select! {
                handled = self.handle_next_reminder() => {
                    if handled.is_none() {
                        tracing::warn!(target: "system", "Reminder scheduler stopped");
                        break;
                    }
                }
                Some(action) = hotkey_rx.recv() => self.on_hotkey(action),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(target: "system", "Interrupt received");
                    break;
                }
            }
        }

        self.shutdown();
    }

    /// Waits for the next fired reminder and handles it. Returns `None` once
    /// the scheduler has stopped, otherwise whether a notification was shown.
    pub async fn handle_next_reminder(&mut self) -> Option<bool> {
        let fired = self.fired_rx.recv().await?;
        Some(self.on_reminder(&fired.todo_id))
    }

    /// Notifies about `todo_id` if it still exists and is open.
    pub fn on_reminder(&self, todo_id: &str) -> bool {
        match self.store.get(todo_id) {
            Some(todo) if !todo.completed => {
                self.notifier
                    .notify(REMINDER_TITLE, &todo.title, self.settings.sound_enabled);
                true
            }
            Some(_) => {
                tracing::debug!(target: "reminders", todo_id = %todo_id, "Todo already completed, reminder skipped");
                false
            }
            None => {
                tracing::debug!(target: "reminders", todo_id = %todo_id, "Todo gone, reminder skipped");
                false
            }
        }
    }

    fn on_hotkey(&mut self, action: HotkeyAction) {
        match action {
            HotkeyAction::QuickAdd => match self.quick_add_from_clipboard() {
                Ok(_) => {}
                Err(AppError::Store(e)) => {
                    tracing::warn!(target: "system", "Quick add failed: {}", e);
                    self.notifier
                        .notify(APP_TITLE, &e.to_string(), self.settings.sound_enabled);
                }
                Err(e) => {
                    tracing::warn!(target: "system", "Quick add failed: {}", e);
                }
            },
            HotkeyAction::ShowWindow => self.show_overview(),
        }
    }

    /// Adds `text` to today's list with the standard set of reminders.
    pub fn quick_add(&mut self, text: &str) -> Result<String, AppError> {
        let title = text.trim();
        if title.is_empty() {
            self.notifier
                .notify(APP_TITLE, "Clipboard is empty", self.settings.sound_enabled);
            return Err(AppError::EmptyText);
        }

        let id = self.store.add(title, Category::Today, None, None);
        let now = todo::now();
        for offset in quick_add_offsets() {
            self.arm_reminder(&id, now + offset)?;
        }
        self.save()?;

        tracing::info!(target: "store", todo_id = %id, "Quick-added todo");
        self.notifier
            .notify(ADDED_TITLE, &preview(title), self.settings.sound_enabled);
        Ok(id)
    }

    pub fn quick_add_from_clipboard(&mut self) -> Result<String, AppError> {
        let text = match read_clipboard_text() {
            Ok(text) => text,
            Err(e) => {
                self.notifier.notify(APP_TITLE, &e, self.settings.sound_enabled);
                return Err(AppError::Clipboard(e));
            }
        };
        self.quick_add(&text)
    }

    /// Adds a todo to any bucket without reminders.
    pub fn add_todo(
        &mut self,
        title: &str,
        category: Category,
        description: Option<&str>,
        due_date: Option<NaiveDateTime>,
    ) -> Result<String, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::EmptyText);
        }

        let id = self.store.add(title, category, description, due_date);
        self.save()?;
        Ok(id)
    }

    /// Records a reminder on the todo and arms it. Past times are recorded but
    /// never fire.
    pub fn add_reminder(&mut self, id: &str, at: NaiveDateTime) -> Result<(), AppError> {
        self.arm_reminder(id, at)?;
        self.save()?;
        Ok(())
    }

    fn arm_reminder(&mut self, id: &str, at: NaiveDateTime) -> Result<(), StoreError> {
        self.store.add_reminder(id, at)?;
        self.scheduler.schedule(id, at);
        Ok(())
    }

    /// Completes a todo and drops its pending reminders.
    pub fn complete_todo(&mut self, id: &str) -> Result<(), AppError> {
        self.store.complete(id)?;
        self.scheduler.cancel_all(id);
        self.save()?;
        Ok(())
    }

    /// Marks a completed todo open again and re-arms its future reminders.
    /// Returns how many were armed.
    pub fn reopen_todo(&mut self, id: &str) -> Result<usize, AppError> {
        let mut fields = Map::new();
        fields.insert("completed".to_string(), Value::Bool(false));
        self.store.update(id, &fields)?;

        self.scheduler.cancel_all(id);
        let reminders = self
            .store
            .get(id)
            .map(|todo| todo.reminders.clone())
            .unwrap_or_default();
        let armed = reminders
            .into_iter()
            .filter(|at| self.scheduler.schedule(id, *at))
            .count();

        self.save()?;
        tracing::info!(target: "store", todo_id = %id, armed, "Todo reopened");
        Ok(armed)
    }

    /// Deletes a todo and drops its pending reminders. Unknown ids are a no-op.
    pub fn delete_todo(&mut self, id: &str) -> Result<(), AppError> {
        self.store.delete(id);
        self.scheduler.cancel_all(id);
        self.save()?;
        Ok(())
    }

    /// Notification listing open and total counts per bucket.
    pub fn show_overview(&self) {
        let export = self.store.export_all();
        let lines: Vec<String> = Category::BUCKETS
            .iter()
            .filter_map(|category| export.get(category))
            .map(|bucket| {
                format!(
                    "{}: {} open / {} total",
                    bucket.category,
                    bucket.total - bucket.completed,
                    bucket.total
                )
            })
            .collect();

        self.notifier.notify(APP_TITLE, &lines.join("\n"), false);
    }

    /// Asks the summarizer for a digest of every bucket. No retry.
    pub async fn summarize(&self) -> Result<String, SummaryError> {
        let export = self.store.export_all();
        self.summarizer.summarize(&export).await.map_err(|e| {
            tracing::error!(target: "summary", "Summary failed: {}", e);
            e
        })
    }

    /// Validates, persists and applies new settings. Invalid shortcuts leave
    /// the current settings in place.
    pub fn apply_settings(&mut self, settings: AppSettings) -> Result<(), AppError> {
        validate_shortcuts(&settings)?;
        save_settings_to(&self.settings_path, &settings)?;

        if settings.data_file != self.settings.data_file {
            tracing::info!(target: "system", data_file = %settings.data_file, "Data file change takes effect on restart");
        }

        if let Some(hotkeys) = self.hotkeys.as_mut() {
            if let Err(e) = hotkeys.apply(&settings) {
                tracing::warn!(target: "system", "Failed to re-register shortcuts: {}", e);
            }
        }

        self.settings = settings;
        reconcile(&self.store, &self.scheduler);
        Ok(())
    }

    /// Stops every timer and flushes the store.
    pub fn shutdown(&mut self) {
        self.scheduler.clear();
        self.scheduler.shutdown();
        self.hotkeys = None;
        if let Err(e) = self.save() {
            tracing::warn!(target: "system", "Todos not saved on shutdown: {}", e);
        }
        tracing::info!(target: "system", "TodoTips stopped");
    }

    fn save(&self) -> Result<(), StoreError> {
        self.store.save().map_err(|e| {
            tracing::error!(target: "system", "Failed to save todos: {}", e);
            e
        })
    }
}

fn preview(title: &str) -> String {
    if title.chars().count() > PREVIEW_CHARS {
        let head: String = title.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}
