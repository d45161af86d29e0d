pub mod clipboard;
pub mod logging;
pub mod notify;
pub mod settings;
pub mod shortcut;
