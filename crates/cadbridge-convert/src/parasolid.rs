//! Best-effort Parasolid text header probe.
//!
//! Parasolid `.x_t` files begin with a key/value header between `**PART1;`
//! and `**END_OF_HEADER`. The source application recorded there lets the
//! manual-conversion instructions recommend re-exporting from the original
//! tool instead of a generic upload.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Parsed Parasolid header fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParasolidHeader {
    /// `APPL` — the application that wrote the file.
    pub application: Option<String>,
    /// `DATE` — creation date string.
    pub date: Option<String>,
    /// `FORMAT` — text/binary format tag.
    pub format: Option<String>,
}

/// Maximum header lines scanned before giving up.
const MAX_HEADER_LINES: usize = 200;

/// Read the Parasolid header from a file. Returns `None` when the file is
/// unreadable or carries no recognizable header; never fails hard.
pub fn read_header(path: &Path) -> Option<ParasolidHeader> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);

    let mut header = ParasolidHeader::default();
    let mut in_header = false;
    let mut seen_any = false;

    for line in reader.lines().take(MAX_HEADER_LINES) {
        // Parasolid text files are ASCII; treat decode errors as end of header
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        if line.contains("**PART1;") {
            in_header = true;
            continue;
        }
        if line.contains("**END_OF_HEADER") {
            break;
        }
        if !in_header {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_end_matches(';').to_string();
            match key.trim() {
                "APPL" => header.application = Some(value),
                "DATE" => header.date = Some(value),
                "FORMAT" => header.format = Some(value),
                _ => continue,
            }
            seen_any = true;
        }
    }

    seen_any.then_some(header)
}
