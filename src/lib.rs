//! Polling console clients for the slash log service and the grid game demo.
//!
//! Everything here is one of four shapes: a transport call, a template
//! render, a poll loop driving the two, or the bootstrap wiring that picks
//! a loop from a page-style route. The loops never overlap their requests
//! and never retry inside the transport; scheduling policy is explicit
//! per loop kind.

pub mod cli;
pub mod config;
pub mod game;
pub mod poll;
pub mod render;
pub mod route;
pub mod slash;
pub mod transport;

use thiserror::Error;

/// Crate-level error uniting the module boundaries.
///
/// Transport failures are usually absorbed by the poll loops as
/// retry-after-delay; what escapes to here is fatal for the running
/// command: render/config defects, route mistakes, or a failed one-off
/// request.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Transport(#[from] transport::TransportError),
    #[error(transparent)]
    Render(#[from] render::RenderError),
    #[error(transparent)]
    Route(#[from] route::RouteError),
    #[error("config error: {0}")]
    Config(String),
}

/// Display form of an opaque JSON value: strings verbatim, everything else
/// compact JSON.
pub fn json_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
