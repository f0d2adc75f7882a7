use crate::error::ViewerError;
use crate::log_entry::LogEntry;
use crate::notify::{Notification, Notifier};
use log::{error, info};

pub trait Clipboard {
    fn set_text(&mut self, contents: &str) -> Result<(), ViewerError>;
}

/// System clipboard using arboard. The handle is opened on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self { inner: None }
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, contents: &str) -> Result<(), ViewerError> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new()?);
        }
        if let Some(clipboard) = self.inner.as_mut() {
            clipboard.set_text(contents.to_string())?;
        }
        Ok(())
    }
}

/// Renders entries as `[timestamp] [LEVEL] message` blocks separated by a
/// blank line, with pretty-printed details when there are any.
pub fn format_entries(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let mut block = format!(
                "[{}] [{}] {}",
                entry.timestamp,
                entry.level.as_str().to_uppercase(),
                entry.message
            );
            if entry.has_details() {
                let details = serde_json::to_string_pretty(&entry.details)
                    .unwrap_or_else(|_| "{}".to_string());
                block.push_str("\nDetails: ");
                block.push_str(&details);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Copies the given entries and reports the outcome. Never retries.
pub fn copy_entries(
    entries: &[LogEntry],
    clipboard: &mut dyn Clipboard,
    notifier: &dyn Notifier,
) {
    match clipboard.set_text(&format_entries(entries)) {
        Ok(()) => {
            info!("Copied {} log entries to the clipboard", entries.len());
            notifier.notify(Notification::normal(
                "Copied to clipboard",
                "All logs have been copied to your clipboard.",
            ));
        }
        Err(e) => {
            error!("Failed to copy logs: {}", e);
            notifier.notify(Notification::destructive(
                "Copy failed",
                "Could not copy logs to clipboard.",
            ));
        }
    }
}
