//! Clients for the slash log service: app list, device list, live log tail.
//!
//! The list loops are idempotent full refreshes on a fixed-rate ticker; the
//! log tail is an incremental append-only loop driven by a watermark and an
//! adaptive re-poll delay. All three render rows through the shared
//! template registry.

use std::io::{self, Write};

use chrono::offset::LocalResult;
use chrono::{Local, TimeZone};
use colored::*;
use serde::Deserialize;

use crate::poll::{FailureLog, PollPolicy, Ticker, Watermark};
use crate::render::{Node, Substitution, Templates};
use crate::transport::ApiClient;
use crate::ConsoleError;

/// Rows a default-height viewport shows once scrolled to the bottom.
pub const DEFAULT_VIEWPORT_ROWS: usize = 40;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub app_id: String,
    /// Unix seconds.
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub device_id: String,
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    /// Server-assigned sequence number, strictly increasing per device.
    pub no: u64,
    pub time: i64,
    /// Arbitrary JSON: strings render verbatim, everything else is
    /// re-serialized to compact JSON.
    pub log_value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Row rendering
// ---------------------------------------------------------------------------

/// Display form of a unix-seconds timestamp, in the local timezone.
pub fn format_time(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0) {
        LocalResult::Single(dt) => dt.format("%a %b %d %Y %H:%M:%S").to_string(),
        _ => format!("@{secs}"),
    }
}

/// Display form of a log value.
pub fn log_text(value: &serde_json::Value) -> String {
    crate::json_display(value)
}

/// Render one app list row: id, date, and a link to the app's device page.
pub fn app_row(templates: &Templates, app: &AppEntry) -> Result<Node, ConsoleError> {
    let row = templates.render(
        "template_app",
        &[
            Substitution::new(".app_id", "text", &app.app_id),
            Substitution::new(".date", "text", format_time(app.time)),
            Substitution::new("a", "href", format!("app.html?app_id={}", app.app_id)),
        ],
    )?;
    Ok(row)
}

/// Render one device list row, linking through to the device's log page.
///
/// The hosting page reused the app template for devices, so the device id
/// lands in the `.app_id` slot.
pub fn device_row(
    templates: &Templates,
    app_id: &str,
    device: &DeviceEntry,
) -> Result<Node, ConsoleError> {
    let row = templates.render(
        "template_app",
        &[
            Substitution::new(".app_id", "text", &device.device_id),
            Substitution::new(".date", "text", format_time(device.time)),
            Substitution::new(
                "a",
                "href",
                format!(
                    "logs.html?app_id={}&device_id={}",
                    app_id, device.device_id
                ),
            ),
        ],
    )?;
    Ok(row)
}

/// Render one log line row: `<date> <log text>`.
pub fn log_row(templates: &Templates, record: &LogRecord) -> Result<Node, ConsoleError> {
    let line = format!("{} {}", format_time(record.time), log_text(&record.log_value));
    let row = templates.render("template_log", &[Substitution::new(".log", "text", line)])?;
    Ok(row)
}

/// Render the full app list, one row per entry, response order preserved.
pub fn render_app_rows(
    templates: &Templates,
    apps: &[AppEntry],
) -> Result<Vec<Node>, ConsoleError> {
    apps.iter().map(|a| app_row(templates, a)).collect()
}

/// Render the full device list for `app_id`, response order preserved.
pub fn render_device_rows(
    templates: &Templates,
    app_id: &str,
    devices: &[DeviceEntry],
) -> Result<Vec<Node>, ConsoleError> {
    devices
        .iter()
        .map(|d| device_row(templates, app_id, d))
        .collect()
}

// ---------------------------------------------------------------------------
// List view (clear-then-append semantics)
// ---------------------------------------------------------------------------

/// Rendered container for the full-refresh list loops.
///
/// Each successful tick replaces the whole content; a failed tick leaves
/// the previous rows in place and flags them stale instead of failing
/// silently.
#[derive(Debug, Default)]
pub struct ListView {
    rows: Vec<Node>,
    stale: bool,
}

impl ListView {
    pub fn new() -> Self {
        ListView::default()
    }

    pub fn replace(&mut self, rows: Vec<Node>) {
        self.rows = rows;
        self.stale = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn rows(&self) -> &[Node] {
        &self.rows
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

// ---------------------------------------------------------------------------
// Tail view (append-only, sticky tail)
// ---------------------------------------------------------------------------

/// Append-only rendered log container that keeps the newest rows visible,
/// the terminal analog of the original's resize-and-scroll-to-bottom.
#[derive(Debug)]
pub struct TailView {
    rows: Vec<Node>,
    viewport_rows: usize,
}

impl TailView {
    pub fn new(viewport_rows: usize) -> Self {
        TailView {
            rows: Vec::new(),
            viewport_rows: viewport_rows.max(1),
        }
    }

    pub fn push(&mut self, row: Node) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Node] {
        &self.rows
    }

    /// The slice a viewport of the configured height shows after scrolling
    /// to the bottom.
    pub fn visible(&self) -> &[Node] {
        let start = self.rows.len().saturating_sub(self.viewport_rows);
        &self.rows[start..]
    }
}

impl Default for TailView {
    fn default() -> Self {
        TailView::new(DEFAULT_VIEWPORT_ROWS)
    }
}

// ---------------------------------------------------------------------------
// Log tail state
// ---------------------------------------------------------------------------

/// Incremental tail state for one (app, device) pair.
#[derive(Debug)]
pub struct LogTail {
    app_id: String,
    device_id: String,
    last_seen: Watermark,
    view: TailView,
}

impl LogTail {
    pub fn new(app_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        LogTail {
            app_id: app_id.into(),
            device_id: device_id.into(),
            last_seen: Watermark::ZERO,
            view: TailView::default(),
        }
    }

    pub fn with_viewport(mut self, viewport_rows: usize) -> Self {
        self.view = TailView::new(viewport_rows);
        self
    }

    /// The request path for the next tick; only records with `no` strictly
    /// above the watermark come back.
    pub fn request_path(&self) -> String {
        format!(
            "api/logs/{}/{}/{}",
            self.app_id, self.device_id, self.last_seen
        )
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen.value()
    }

    pub fn view(&self) -> &TailView {
        &self.view
    }

    /// Append one rendered row per record and advance the watermark to the
    /// highest `no` observed. Returns how many rows were appended.
    ///
    /// Existing rows are never touched; an empty batch is a no-op.
    pub fn apply(
        &mut self,
        templates: &Templates,
        records: &[LogRecord],
    ) -> Result<usize, ConsoleError> {
        for record in records {
            let row = log_row(templates, record)?;
            self.view.push(row);
            self.last_seen.advance(record.no);
        }
        Ok(records.len())
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

fn draw_list(title: &str, view: &ListView) {
    // Clear-and-redraw, the terminal analog of the page clearing its
    // container element each tick.
    print!("\x1B[2J\x1B[1;1H");
    println!("{}", title.bright_cyan().bold());
    if view.is_stale() {
        println!("{}", "(stale: last refresh failed, retrying)".bright_red());
    }
    for row in view.rows() {
        match row.links().first() {
            Some(link) => println!("{}  {}", row.text_content(), link.dimmed()),
            None => println!("{}", row.text_content()),
        }
    }
    let _ = io::stdout().flush();
}

/// Run the app list loop: fetch `api/apps`, rebuild the view, repeat at a
/// fixed rate. With `once`, perform a single tick and return.
pub async fn run_app_list(
    api: &ApiClient,
    templates: &Templates,
    policy: PollPolicy,
    once: bool,
) -> Result<(), ConsoleError> {
    let mut ticker = Ticker::new(policy);
    let mut failures = FailureLog::new();
    let mut view = ListView::new();
    let mut last_ok = true;

    loop {
        ticker.wait(last_ok).await;
        match api.get::<Vec<AppEntry>>("api/apps").await {
            Ok(payload) => {
                let apps = payload.unwrap_or_default();
                view.replace(render_app_rows(templates, &apps)?);
                failures.success();
                last_ok = true;
            }
            Err(e) => {
                failures.failure("apps", &e);
                view.mark_stale();
                last_ok = false;
            }
        }
        draw_list("apps", &view);
        if once {
            return Ok(());
        }
    }
}

/// Run the device list loop for one app. Same shape as the app list.
pub async fn run_device_list(
    api: &ApiClient,
    templates: &Templates,
    policy: PollPolicy,
    app_id: &str,
    once: bool,
) -> Result<(), ConsoleError> {
    let mut ticker = Ticker::new(policy);
    let mut failures = FailureLog::new();
    let mut view = ListView::new();
    let mut last_ok = true;
    let path = format!("api/devices/{app_id}");

    loop {
        ticker.wait(last_ok).await;
        match api.get::<Vec<DeviceEntry>>(&path).await {
            Ok(payload) => {
                let devices = payload.unwrap_or_default();
                view.replace(render_device_rows(templates, app_id, &devices)?);
                failures.success();
                last_ok = true;
            }
            Err(e) => {
                failures.failure("devices", &e);
                view.mark_stale();
                last_ok = false;
            }
        }
        draw_list(&format!("devices of {app_id}"), &view);
        if once {
            return Ok(());
        }
    }
}

/// Run the log tail loop: incremental fetch above the watermark, append-only
/// output, fast re-poll on success and a slower retry on failure.
///
/// `viewport_rows` bounds how many rows a single tick can put on screen;
/// anything older in the same batch would have scrolled past immediately.
pub async fn run_log_tail(
    api: &ApiClient,
    templates: &Templates,
    policy: PollPolicy,
    app_id: &str,
    device_id: &str,
    viewport_rows: usize,
    once: bool,
) -> Result<(), ConsoleError> {
    let mut tail = LogTail::new(app_id, device_id).with_viewport(viewport_rows);
    let mut ticker = Ticker::new(policy);
    let mut failures = FailureLog::new();
    let mut last_ok = true;

    println!(
        "{}",
        format!("tailing logs for {app_id}/{device_id}").bright_cyan().bold()
    );

    loop {
        ticker.wait(last_ok).await;
        match api.get::<Vec<LogRecord>>(&tail.request_path()).await {
            Ok(payload) => {
                let records = payload.unwrap_or_default();
                let before = tail.view().len();
                tail.apply(templates, &records)?;
                let visible_start = tail.view().len() - tail.view().visible().len();
                for row in &tail.view().rows()[before.max(visible_start)..] {
                    println!("{}", row.text_content());
                }
                let _ = io::stdout().flush();
                failures.success();
                last_ok = true;
            }
            Err(e) => {
                failures.failure("logs", &e);
                last_ok = false;
            }
        }
        if once {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
