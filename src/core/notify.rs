//! Desktop notification delivery.
//!
//! The app only ever calls `NotificationSink::notify`; how a notification
//! reaches the user is platform specific and never fails the caller.

use std::process::{Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str, play_sound: bool);
}

/// Shells out to the platform notifier (`notify-send`, `osascript`, PowerShell).
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn show(&self, title: &str, message: &str) -> std::io::Result<()> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(message),
                escape_applescript(title)
            );
            spawn_reaped(Command::new("osascript").args(["-e", &script]))?;
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Visible = $true; \
                 $n.ShowBalloonTip(5000, {}, {}, 'Info'); \
                 Start-Sleep -Seconds 6; $n.Dispose()",
                quote_powershell(title),
                quote_powershell(message)
            );
            spawn_reaped(Command::new("powershell").args([
                "-NoProfile",
                "-WindowStyle",
                "Hidden",
                "-Command",
                &script,
            ]))?;
        } else {
            spawn_reaped(Command::new("notify-send").args(["--app-name=TodoTips", title, message]))?;
        }
        Ok(())
    }

    fn play_sound(&self) -> std::io::Result<()> {
        if cfg!(target_os = "macos") {
            spawn_reaped(Command::new("afplay").arg("/System/Library/Sounds/Glass.aiff"))?;
        } else if cfg!(target_os = "windows") {
            spawn_reaped(Command::new("powershell").args([
                "-NoProfile",
                "-Command",
                "[System.Media.SystemSounds]::Asterisk.Play()",
            ]))?;
        } else {
            // Fallback: terminal bell if no sound server is around
            spawn_reaped(Command::new("sh").args([
                "-c",
                "paplay /usr/share/sounds/freedesktop/stereo/message.oga 2>/dev/null || printf '\\a'",
            ]))?;
        }
        Ok(())
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, message: &str, play_sound: bool) {
        if let Err(e) = self.show(title, message) {
            tracing::warn!(target: "system", "Failed to show notification '{}': {}", title, e);
        }

        if play_sound {
            if let Err(e) = self.play_sound() {
                tracing::warn!(target: "system", "Failed to play notification sound: {}", e);
            }
        }
    }
}

/// Starts `command` and waits for it on a detached thread so the child never
/// lingers as a zombie. The handle yields the exit status.
fn spawn_reaped(command: &mut Command) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command.spawn()?;
    let program = format!("{:?}", command.get_program());

    Ok(std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            if !status.success() {
                tracing::debug!(target: "system", program = %program, %status, "Notifier exited with failure");
            }
            Some(status)
        }
        Err(e) => {
            tracing::warn!(target: "system", program = %program, "Failed to wait for notifier: {}", e);
            None
        }
    }))
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Single-quoted PowerShell literal; embedded quotes are doubled.
fn quote_powershell(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub play_sound: bool,
}

/// Sink that keeps every notification in memory. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, play_sound: bool) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification {
                title: title.to_string(),
                message: message.to_string(),
                play_sound,
            });
        }
    }
}
