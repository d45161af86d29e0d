use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "todotips";

/// Get the base storage directory following XDG Base Directory Specification.
/// Returns `$XDG_DATA_HOME/todotips`, the platform data dir, or `./todotips`.
pub fn get_storage_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data.is_empty() {
            return PathBuf::from(xdg_data).join(APP_DIR_NAME);
        }
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Get the logs directory path.
/// Returns `{storage_dir}/logs`.
pub fn get_log_dir() -> PathBuf {
    get_storage_dir().join("logs")
}

/// Get the settings file path.
pub fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

/// Resolve the todo data file. Relative names live inside the storage dir.
pub fn resolve_data_file(name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        get_storage_dir().join(path)
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_dir_structure() {
        let storage = get_storage_dir();
        assert!(storage.ends_with("todotips"));

        let logs = get_log_dir();
        assert!(logs.ends_with("logs"));

        let settings = get_settings_path();
        assert!(settings.ends_with("settings.json"));
    }

    #[test]
    fn test_resolve_data_file_relative_and_absolute() {
        let relative = resolve_data_file("todos.json");
        assert!(relative.starts_with(get_storage_dir()));
        assert!(relative.ends_with("todos.json"));

        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("mine.json");
        assert_eq!(resolve_data_file(absolute.to_str().unwrap()), absolute);
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Second call is a no-op
        ensure_dir(&nested).unwrap();
    }
}
