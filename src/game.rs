//! Client for the turn-based grid game demo.
//!
//! One adaptive poll loop carries the whole view: POST the cursor, receive
//! grid + legal moves + turn history + messages, rebuild the rendered frame
//! from scratch. Submitting a move is a separate one-off POST that never
//! touches the poll cursor.
//!
//! Legal destination cells carry an explicit [`MoveAction`] binding attached
//! at render time; there is no ambient dispatcher anywhere.

use std::collections::HashMap;
use std::io::{self, Write};

use colored::*;
use serde::{Deserialize, Serialize};

use crate::json_display;
use crate::poll::{FailureLog, PollPolicy, Ticker, Watermark};
use crate::transport::ApiClient;
use crate::ConsoleError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of the `api_poll` request: the last acknowledged turn number.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PollRequest {
    #[serde(rename = "move")]
    pub last_seen: u64,
}

/// Full game state, rebuilt by the server on every poll.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    pub turn_no: u64,
    #[serde(default)]
    pub grid: Vec<Vec<Cell>>,
    #[serde(default)]
    pub moves: Vec<MoveOption>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// One grid cell. Occupants and the speed tag are opaque JSON values; the
/// server's truthiness decides whether they render.
#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    pub name: String,
    #[serde(default)]
    pub speed: Option<serde_json::Value>,
    #[serde(default)]
    pub runner: Option<serde_json::Value>,
    #[serde(default)]
    pub blocker: Option<serde_json::Value>,
}

/// One legal destination offered by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveOption {
    pub name: String,
}

/// One entry of the turn history; `turns[0]` is the turn in play.
#[derive(Debug, Clone, Deserialize)]
pub struct Turn {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// Body of the `api_move` request, bound to a rendered cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveAction {
    pub turn_no: u64,
    pub position: String,
}

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// One cell of the rendered text table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub name: String,
    pub text: String,
    /// Whether this cell is a legal destination this turn.
    pub legal: bool,
}

/// One rendered frame of the game.
#[derive(Debug, Clone)]
pub struct GridView {
    pub cells: Vec<Vec<RenderedCell>>,
    pub messages: Vec<String>,
    pub turn_line: String,
    /// Move bindings for the legal destination cells, keyed by cell name.
    pub bindings: HashMap<String, MoveAction>,
}

impl GridView {
    /// Plain-text table, legal destinations bracketed.
    pub fn table_text(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| {
                        if c.legal {
                            format!("[{}]", c.text)
                        } else {
                            format!(" {} ", c.text)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn truthy(value: &Option<serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Display form of one cell: speed marker then occupant.
fn cell_text(cell: &Cell) -> String {
    let marker = if truthy(&cell.speed) { '#' } else { '.' };
    let occupant = if truthy(&cell.runner) {
        json_display(cell.runner.as_ref().unwrap_or(&serde_json::Value::Null))
    } else if truthy(&cell.blocker) {
        json_display(cell.blocker.as_ref().unwrap_or(&serde_json::Value::Null))
    } else {
        "..".to_string()
    };
    format!("{marker}{occupant}")
}

/// The set of legal destination names: the server's `moves`, but only while
/// the turn in play belongs to the runner.
pub fn legal_moves(response: &PollResponse) -> Vec<&str> {
    match response.turns.first() {
        Some(turn) if turn.kind == "runner" => {
            response.moves.iter().map(|m| m.name.as_str()).collect()
        }
        _ => Vec::new(),
    }
}

/// The turn history line: the turn in play, then the remaining entries in
/// response order.
fn turn_line(turns: &[Turn]) -> String {
    match turns.split_first() {
        Some((current, rest)) => {
            let mut line = format!("{} then", current.name);
            for turn in rest {
                line.push(' ');
                line.push_str(&turn.name);
            }
            line
        }
        None => String::new(),
    }
}

/// Build the rendered frame for one poll response.
pub fn render_view(response: &PollResponse) -> GridView {
    let legal: Vec<&str> = legal_moves(response);
    let mut bindings = HashMap::new();

    let cells = response
        .grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    let is_legal = legal.contains(&cell.name.as_str());
                    if is_legal {
                        bindings.insert(
                            cell.name.clone(),
                            MoveAction {
                                turn_no: response.turn_no,
                                position: cell.name.clone(),
                            },
                        );
                    }
                    RenderedCell {
                        name: cell.name.clone(),
                        text: cell_text(cell),
                        legal: is_legal,
                    }
                })
                .collect()
        })
        .collect();

    GridView {
        cells,
        messages: response.messages.clone(),
        turn_line: turn_line(&response.turns),
        bindings,
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// The last acknowledged turn, sent back to the server on every poll.
#[derive(Debug, Default)]
pub struct GameCursor {
    last_seen: Watermark,
}

impl GameCursor {
    pub fn new() -> Self {
        GameCursor::default()
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen.value()
    }

    /// The request body for the next poll.
    pub fn request(&self) -> PollRequest {
        PollRequest {
            last_seen: self.last_seen.value(),
        }
    }

    /// Acknowledge a response: advance the cursor and build the frame.
    pub fn apply(&mut self, response: &PollResponse) -> GridView {
        let view = render_view(response);
        self.last_seen.advance(response.turn_no);
        view
    }
}

// ---------------------------------------------------------------------------
// Loop and move submission
// ---------------------------------------------------------------------------

fn draw(view: &GridView) {
    print!("\x1B[2J\x1B[1;1H");
    for row in &view.cells {
        let mut line = String::new();
        for cell in row {
            if cell.legal {
                line.push_str(&format!("[{}]", cell.text).bright_green().bold().to_string());
            } else {
                line.push_str(&format!(" {} ", cell.text));
            }
            line.push(' ');
        }
        println!("{line}");
    }
    println!();
    for message in &view.messages {
        println!("{message}");
    }
    if !view.turn_line.is_empty() {
        println!();
        println!("{}", view.turn_line.bright_yellow());
    }
    if !view.bindings.is_empty() {
        let mut names: Vec<&str> = view.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        let turn_no = view.bindings.values().next().map(|a| a.turn_no).unwrap_or(0);
        println!();
        println!(
            "{}",
            format!(
                "your move: slash-console move {} <{}>",
                turn_no,
                names.join("|")
            )
            .bright_blue()
        );
    }
    let _ = io::stdout().flush();
}

/// Run the game poll loop: send the cursor, redraw the frame, acknowledge
/// the turn, re-poll fast on success and back off on failure.
pub async fn run_game(
    api: &ApiClient,
    policy: PollPolicy,
    once: bool,
) -> Result<(), ConsoleError> {
    let mut cursor = GameCursor::new();
    let mut ticker = Ticker::new(policy);
    let mut failures = FailureLog::new();
    let mut last_ok = true;

    loop {
        ticker.wait(last_ok).await;
        match api
            .post::<PollRequest, PollResponse>("api_poll", &cursor.request())
            .await
        {
            Ok(Some(response)) => {
                let view = cursor.apply(&response);
                draw(&view);
                failures.success();
                last_ok = true;
            }
            Ok(None) => {
                // An empty 200 carries no state; keep the cursor and retry.
                failures.success();
                last_ok = true;
            }
            Err(e) => {
                failures.failure("game", &e);
                last_ok = false;
            }
        }
        if once {
            return Ok(());
        }
    }
}

/// Submit one move and return the server's outcome notice.
///
/// Independent of the poll loop: the cursor is untouched no matter what the
/// server replies.
pub async fn submit_move(api: &ApiClient, action: &MoveAction) -> Result<String, ConsoleError> {
    let outcome = api
        .post::<MoveAction, serde_json::Value>("api_move", action)
        .await?;
    Ok(outcome.as_ref().map(json_display).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
