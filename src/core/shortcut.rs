//! Global hotkeys for quick-add and show-window.
//!
//! `GlobalHotKeyManager` must live on the thread that created it, so the
//! listener stays with the app loop. Key presses arrive on the crate's global
//! channel and are forwarded from a background thread as `HotkeyAction`s.
//!
//! Only X11 delivers events to a process without a GUI event loop. On
//! Windows and macOS the manager needs a Win32 message pump or an
//! NSApplication run loop on its thread, so the listener refuses to start
//! there instead of registering keys that never fire.

use super::settings::{validate_shortcuts, AppSettings, SettingsError};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    QuickAdd,
    ShowWindow,
}

/// Whether global shortcuts can fire in this headless build.
pub fn hotkeys_supported() -> bool {
    cfg!(target_os = "linux")
}

type Bindings = Arc<RwLock<HashMap<u32, HotkeyAction>>>;

pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    active: Vec<HotKey>,
    bindings: Bindings,
}

impl HotkeyListener {
    /// Registers the shortcuts from `settings` and starts forwarding presses to `tx`.
    pub fn start(
        settings: &AppSettings,
        tx: UnboundedSender<HotkeyAction>,
    ) -> Result<Self, SettingsError> {
        if !hotkeys_supported() {
            return Err(SettingsError::ShortcutUnsupported(
                std::env::consts::OS.to_string(),
            ));
        }

        let manager = GlobalHotKeyManager::new()
            .map_err(|e| SettingsError::ShortcutRegisterError(e.to_string()))?;

        let bindings: Bindings = Arc::new(RwLock::new(HashMap::new()));
        spawn_forwarder(Arc::clone(&bindings), tx);

        let mut listener = Self {
            manager,
            active: Vec::new(),
            bindings,
        };
        listener.apply(settings)?;
        Ok(listener)
    }

    /// Swaps the registered shortcuts for the ones in `settings`.
    pub fn apply(&mut self, settings: &AppSettings) -> Result<(), SettingsError> {
        let (quick_add, show_window) = validate_shortcuts(settings)?;

        self.unregister_active();

        let next = bindings_for(&quick_add, &show_window);
        for hotkey in [quick_add, show_window] {
            self.manager
                .register(hotkey)
                .map_err(|e| SettingsError::ShortcutRegisterError(e.to_string()))?;
            self.active.push(hotkey);
        }

        if let Ok(mut bindings) = self.bindings.write() {
            *bindings = next;
        }

        tracing::info!(
            target: "system",
            quick_add = %settings.quick_add_shortcut,
            show_window = %settings.show_window_shortcut,
            "Global shortcuts registered"
        );
        Ok(())
    }

    fn unregister_active(&mut self) {
        for hotkey in self.active.drain(..) {
            if let Err(e) = self.manager.unregister(hotkey) {
                tracing::warn!(target: "system", "Failed to unregister shortcut: {}", e);
            }
        }
        if let Ok(mut bindings) = self.bindings.write() {
            bindings.clear();
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.unregister_active();
    }
}

fn bindings_for(quick_add: &HotKey, show_window: &HotKey) -> HashMap<u32, HotkeyAction> {
    HashMap::from([
        (quick_add.id(), HotkeyAction::QuickAdd),
        (show_window.id(), HotkeyAction::ShowWindow),
    ])
}

fn spawn_forwarder(bindings: Bindings, tx: UnboundedSender<HotkeyAction>) {
    std::thread::spawn(move || {
        let receiver = GlobalHotKeyEvent::receiver();

        while let Ok(event) = receiver.recv() {
            if !matches!(event.state(), HotKeyState::Released) {
                continue;
            }

            let action = bindings
                .read()
                .ok()
                .and_then(|bindings| bindings.get(&event.id()).copied());

            if let Some(action) = action {
                tracing::debug!(target: "system", ?action, "Global shortcut triggered");
                if tx.send(action).is_err() {
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::parse_shortcut;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_hotkeys_supported_on_linux() {
        assert!(hotkeys_supported());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_listener_refuses_to_start_without_event_loop() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(matches!(
            HotkeyListener::start(&AppSettings::default(), tx),
            Err(SettingsError::ShortcutUnsupported(_))
        ));
    }

    #[test]
    fn test_bindings_map_ids_to_actions() {
        let quick_add = parse_shortcut("ctrl+shift+a").unwrap();
        let show_window = parse_shortcut("ctrl+shift+t").unwrap();

        let bindings = bindings_for(&quick_add, &show_window);
        assert_eq!(bindings.get(&quick_add.id()), Some(&HotkeyAction::QuickAdd));
        assert_eq!(bindings.get(&show_window.id()), Some(&HotkeyAction::ShowWindow));
        assert_eq!(bindings.len(), 2);
    }
}
