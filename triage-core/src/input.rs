use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Last `n` lines of a log file, oldest first.
///
/// A missing file is not an error: it yields no lines, which the orchestrator
/// reports as "no logs". Invalid UTF-8 is replaced rather than rejected.
pub fn read_tail_lines<P: AsRef<Path>>(path: P, n: usize) -> io::Result<Vec<String>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Log file not found: {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    if n == 0 {
        return Ok(Vec::new());
    }

    let mut reader = BufReader::new(file);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(n.min(4096));
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if tail.len() == n {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }

    debug!("Read {} tail lines from {}", tail.len(), path.display());
    Ok(tail.into())
}

/// Split pasted log text into lines, dropping the trailing empty line a
/// final newline would produce.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}
