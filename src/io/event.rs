//! Read event JSON files.
//!
//! An event file carries the event-level context terms see in `begin_event`
//! and the di-tau candidates to fit:
//!
//! ```json
//! {
//!   "event": { "id": 7, "met_collections": { "pfMet": { "px": 10.0, "py": -3.0 } } },
//!   "candidates": [ { "leg1": { ... }, "leg2": { ... }, "met": { ... } } ]
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DiTauCandidate, EventContext};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    #[serde(default)]
    pub event: EventContext,
    pub candidates: Vec<DiTauCandidate>,
}

/// Read an event JSON file.
pub fn read_event_json(path: &Path) -> Result<EventFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open event JSON '{}': {e}", path.display())))?;
    parse_event_json(BufReader::new(file))
        .map_err(|e| AppError::input(format!("{} ('{}')", e.message(), path.display())))
}

pub fn parse_event_json<R: Read>(reader: R) -> Result<EventFile, AppError> {
    let event: EventFile =
        serde_json::from_reader(reader).map_err(|e| AppError::input(format!("Invalid event JSON: {e}")))?;
    if event.candidates.is_empty() {
        return Err(AppError::input("Event JSON contains no candidates."));
    }
    Ok(event)
}
