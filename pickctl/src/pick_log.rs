//! Completion log writer: renders a plain-text record of a finished request.
//!
//! Invoked once per submit, after the transaction committed. Writing the log
//! is best-effort: a failure is reported alongside the successful submit and
//! never rolls the transition back.

use crate::db::models::pick_requests::{PickItemRow, PickRequestDBResponse};
use crate::errors::Error;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "================================================================================";
const DASH_SEPARATOR: &str = "--------------------------------------------------------------------------------";

/// Writer for pick-request completion logs.
///
/// Files are named `pick_<name>_<YYYY-MM-DD>_<HH-MM-SS>.log` and written
/// UTF-8 encoded into the configured directory, which is created if absent.
#[derive(Debug, Clone)]
pub struct PickLogWriter {
    log_dir: PathBuf,
}

impl PickLogWriter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    /// Render and write the completion log, returning its path.
    pub fn write(&self, request: &PickRequestDBResponse) -> Result<PathBuf, Error> {
        std::fs::create_dir_all(&self.log_dir).map_err(|e| Error::Internal {
            operation: format!("create log directory {}: {e}", self.log_dir.display()),
        })?;

        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let filename = format!("pick_{}_{}.log", request.name, timestamp);
        let path = self.log_dir.join(&filename);

        let content = format_log(request);
        std::fs::write(&path, content).map_err(|e| Error::Internal {
            operation: format!("write completion log {}: {e}", path.display()),
        })?;

        tracing::info!(path = %path.display(), "completion log written");
        Ok(path)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

fn format_log(request: &PickRequestDBResponse) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push(SEPARATOR.to_string());
    lines.push("PICK COMPLETION LOG".to_string());
    lines.push(SEPARATOR.to_string());
    lines.push(String::new());
    lines.push(format!("Request Name:    {}", request.name));
    lines.push(format!("Status:          {}", request.status.as_str().to_uppercase()));
    lines.push(format!("Priority:        {}", request.priority.as_str().to_uppercase()));
    if let Some(notes) = &request.notes {
        lines.push(format!("Notes:           {notes}"));
    }
    lines.push(String::new());

    // Timestamps
    lines.push(format!("Created At:      {}", format_datetime(Some(request.created_at))));
    lines.push(format!(
        "Created By:      {}",
        request.creator_username.as_deref().unwrap_or("unknown")
    ));
    lines.push(String::new());

    if let Some(started_at) = request.started_at {
        lines.push(format!("Started At:      {}", format_datetime(Some(started_at))));
    }
    if let Some(completed_at) = request.completed_at {
        lines.push(format!("Completed At:    {}", format_datetime(Some(completed_at))));
        if let Some(started_at) = request.started_at {
            let duration = (completed_at - started_at).num_seconds();
            lines.push(format!("Duration:        {}", format_duration(duration)));
        }
    }
    lines.push(format!(
        "Picked By:       {}",
        request.claimant_username.as_deref().unwrap_or("unknown")
    ));
    lines.push(String::new());

    // Items
    lines.push(SEPARATOR.to_string());
    lines.push("ITEMS".to_string());
    lines.push(SEPARATOR.to_string());
    lines.push(String::new());

    let complete_items: Vec<&PickItemRow> = request.items.iter().filter(|i| i.is_complete()).collect();
    let short_items: Vec<&PickItemRow> = request.items.iter().filter(|i| i.has_shortage()).collect();

    for item in &complete_items {
        lines.push("[x] COMPLETE".to_string());
        lines.push(format!("    Product:     {}", item.product_name));
        lines.push(format!("    UPC:         {}", item.upc));
        lines.push(format!("    Quantity:    {}/{}", item.picked_qty, item.requested_qty));
        lines.push(String::new());
    }

    for item in &short_items {
        lines.push("[!] SHORT".to_string());
        lines.push(format!("    Product:     {}", item.product_name));
        lines.push(format!("    UPC:         {}", item.upc));
        lines.push(format!("    Requested:   {}", item.requested_qty));
        lines.push(format!("    Picked:      {}", item.picked_qty));
        lines.push(format!("    Shortage:    {} items", item.remaining()));
        let reason = item
            .shortage_reason
            .map(|r| r.display_name())
            .unwrap_or("Not specified");
        lines.push(format!("    Reason:      {reason}"));
        if let Some(notes) = &item.shortage_notes {
            lines.push(format!("    Notes:       {notes}"));
        }
        lines.push(String::new());
    }

    // Summary
    lines.push(SEPARATOR.to_string());
    lines.push("SUMMARY".to_string());
    lines.push(SEPARATOR.to_string());
    lines.push(String::new());
    lines.push(format!("Total Products:     {}", request.items.len()));
    lines.push(format!("Complete:           {}", complete_items.len()));
    lines.push(format!("Short:              {}", short_items.len()));
    lines.push(String::new());
    lines.push(format!("Total Requested:    {} items", request.total_requested()));
    lines.push(format!("Total Picked:       {} items", request.total_picked()));
    lines.push(format!("Completion Rate:    {:.1}%", request.completion_rate()));
    lines.push(String::new());

    // Shortage details grouped by reason
    if !short_items.is_empty() {
        lines.push(DASH_SEPARATOR.to_string());
        lines.push("SHORTAGE DETAILS".to_string());
        lines.push(DASH_SEPARATOR.to_string());
        lines.push(String::new());

        let total_short: i64 = short_items.iter().map(|i| i.remaining()).sum();
        lines.push(format!("Total Items Short: {}", short_items.len()));
        lines.push(format!("Total Qty Short:   {total_short}"));
        lines.push(String::new());

        let mut by_reason: Vec<(&str, Vec<&PickItemRow>)> = Vec::new();
        for item in &short_items {
            let reason = item
                .shortage_reason
                .map(|r| r.display_name())
                .unwrap_or("Not specified");
            match by_reason.iter_mut().find(|(r, _)| *r == reason) {
                Some((_, items)) => items.push(item),
                None => by_reason.push((reason, vec![item])),
            }
        }

        for (reason, items) in by_reason {
            lines.push(format!("  {reason}:"));
            for item in items {
                lines.push(format!("    - {}: {} short", item.product_name, item.remaining()));
                if let Some(notes) = &item.shortage_notes {
                    lines.push(format!("      Note: {notes}"));
                }
            }
            lines.push(String::new());
        }
    }

    lines.push(SEPARATOR.to_string());
    lines.push(format!("Generated: {}", format_datetime(Some(Utc::now()))));
    lines.push(SEPARATOR.to_string());

    lines.join("\n")
}

fn format_datetime(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "N/A".to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} hour{}", if hours != 1 { "s" } else { "" }));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minute{}", if minutes != 1 { "s" } else { "" }));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs} second{}", if secs != 1 { "s" } else { "" }));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{RequestPriority, RequestStatus, ShortageReason};
    use chrono::Duration;

    fn finished_request() -> PickRequestDBResponse {
        let now = Utc::now();
        PickRequestDBResponse {
            name: "monday-restock".to_string(),
            status: RequestStatus::PartiallyCompleted,
            priority: RequestPriority::Normal,
            notes: Some("front of store".to_string()),
            created_by: None,
            creator_username: Some("alice".to_string()),
            claimed_by: None,
            claimant_username: Some("bob".to_string()),
            created_at: now - Duration::hours(2),
            started_at: Some(now - Duration::minutes(65)),
            completed_at: Some(now),
            last_activity_at: Some(now),
            items: vec![
                PickItemRow {
                    id: 1,
                    request_name: "monday-restock".to_string(),
                    upc: "29456086".to_string(),
                    product_name: "Big Mix".to_string(),
                    requested_qty: 3,
                    picked_qty: 3,
                    shortage_reason: None,
                    shortage_notes: None,
                },
                PickItemRow {
                    id: 2,
                    request_name: "monday-restock".to_string(),
                    upc: "29377107".to_string(),
                    product_name: "Cookies".to_string(),
                    requested_qty: 2,
                    picked_qty: 1,
                    shortage_reason: Some(ShortageReason::OutOfStock),
                    shortage_notes: Some("none on shelf".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_filename_pattern_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PickLogWriter::new(dir.path().join("logs"));

        let path = writer.write(&finished_request()).unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("pick_monday-restock_"));
        assert!(filename.ends_with(".log"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("PICK COMPLETION LOG"));
        assert!(content.contains("Request Name:    monday-restock"));
        assert!(content.contains("Status:          PARTIALLY_COMPLETED"));
        assert!(content.contains("Created By:      alice"));
        assert!(content.contains("Picked By:       bob"));
        assert!(content.contains("[x] COMPLETE"));
        assert!(content.contains("[!] SHORT"));
        assert!(content.contains("Reason:      Out of stock"));
        assert!(content.contains("Total Requested:    5 items"));
        assert!(content.contains("Total Picked:       4 items"));
        assert!(content.contains("Completion Rate:    80.0%"));
        assert!(content.contains("Duration:        1 hour 5 minutes"));
    }

    #[test]
    fn test_directory_created_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let writer = PickLogWriter::new(&nested);

        writer.write(&finished_request()).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(61), "1 minute 1 second");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3905), "1 hour 5 minutes 5 seconds");
        assert_eq!(format_duration(-1), "N/A");
    }
}
