use clipboard_rs::{Clipboard, ClipboardContext};

/// Reads the current clipboard contents as text.
pub fn read_clipboard_text() -> Result<String, String> {
    let ctx = ClipboardContext::new()
        .map_err(|e| format!("Failed to access clipboard: {}", e))?;

    let text = ctx
        .get_text()
        .map_err(|e| format!("Failed to read clipboard: {}", e))?;

    tracing::debug!(target: "system", chars = text.chars().count(), "Clipboard read");
    Ok(text)
}
