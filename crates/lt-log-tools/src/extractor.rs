//! Last-record extraction from `[timestamp] channel.LEVEL: message` logs.
//!
//! A record is a header line optionally followed by a stack-trace block.
//! The header is found by scanning backwards from the end of the content;
//! the block end is found by a forward per-line state machine:
//!
//! | state          | line                 | next state     | effect           |
//! |----------------|----------------------|----------------|------------------|
//! | any            | contains `[stack trace]` | in-trace   | extend           |
//! | any            | record header        | unchanged      | stop (exclusive) |
//! | normal         | blank                | normal         | skip             |
//! | normal         | anything else        | normal         | extend           |
//! | in-trace       | blank (1st)          | in-trace       | skip             |
//! | in-trace       | blank (2nd in a row) | -              | stop             |
//! | in-trace       | anything else        | in-trace       | extend, reset blanks |

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::LogResult;
use crate::source;
use crate::types::Severity;

const STACK_TRACE_MARKER: &str = "[stack trace]";
const EXCEPTION_MARKER: &str = r#"{"exception""#;
const TERMINATING_BLANK_LINES: u8 = 2;

fn level_alternation() -> String {
    Severity::ALL
        .iter()
        .map(|level| level.label())
        .collect::<Vec<_>>()
        .join("|")
}

fn header_regex(levels: &str) -> Regex {
    Regex::new(&format!(r"\[.*?\]\s+\w+\.(?:{levels}):(?P<message>.*)")).unwrap()
}

static ANY_LEVEL_HEADER: LazyLock<Regex> = LazyLock::new(|| header_regex(&level_alternation()));

static LEVEL_HEADERS: LazyLock<Vec<(Severity, Regex)>> = LazyLock::new(|| {
    Severity::ALL
        .iter()
        .map(|level| (*level, header_regex(&regex::escape(level.label()))))
        .collect()
});

// Block termination only recognises headers at the start of a line.
static RECORD_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[.*?\]\s+\w+\.(?:{}):", level_alternation())).unwrap()
});

static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\d+\s+").unwrap());

fn header_pattern(level: Option<Severity>) -> &'static Regex {
    let Some(level) = level else {
        return &*ANY_LEVEL_HEADER;
    };
    LEVEL_HEADERS
        .iter()
        .find(|(candidate, _)| *candidate == level)
        .map(|(_, re)| re)
        .unwrap_or(&*ANY_LEVEL_HEADER)
}

/// Find the last record matching `level` (any of the eight levels when `None`).
///
/// Without a stack trace, returns the trimmed message after the header's
/// colon, cut before any serialized `{"exception"...}` context. With a stack
/// trace, returns the whole block from the header line on, trimmed.
pub fn extract_last_record(
    content: &str,
    level: Option<Severity>,
    with_stack_trace: bool,
) -> Option<String> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let pattern = header_pattern(level);
    let start = lines.iter().rposition(|line| pattern.is_match(line))?;

    if with_stack_trace {
        let end = find_record_end(&lines, start);
        return Some(lines[start..=end].join("\n").trim().to_string());
    }

    extract_message(lines[start], pattern)
}

/// Shorthand for the last `ERROR` record.
pub fn extract_last_error(content: &str, with_stack_trace: bool) -> Option<String> {
    extract_last_record(content, Some(Severity::Error), with_stack_trace)
}

/// `extract_last_record` over the file behind a nominal log path.
pub fn extract_last_record_from_file(
    path: &Path,
    level: Option<Severity>,
    with_stack_trace: bool,
) -> LogResult<Option<String>> {
    Ok(source::load_latest_content(path)?
        .and_then(|(_, content)| extract_last_record(&content, level, with_stack_trace)))
}

fn extract_message(line: &str, pattern: &Regex) -> Option<String> {
    let captures = pattern.captures(line)?;
    let message = captures.name("message")?.as_str().trim();
    let message = match message.find(EXCEPTION_MARKER) {
        Some(cut) => message[..cut].trim(),
        None => message,
    };
    Some(message.to_string())
}

// ── Block state machine ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InStackTrace { blank_run: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    StackTraceMarker,
    RecordStart,
    Frame,
    Context,
    Blank,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Extend,
    Skip,
    Stop,
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if line.to_lowercase().contains(STACK_TRACE_MARKER) {
        LineKind::StackTraceMarker
    } else if RECORD_START.is_match(line) {
        LineKind::RecordStart
    } else if STACK_FRAME.is_match(trimmed) {
        LineKind::Frame
    } else if trimmed.starts_with('{') && trimmed.ends_with('}') {
        LineKind::Context
    } else if trimmed.is_empty() {
        LineKind::Blank
    } else {
        LineKind::Text
    }
}

fn transition(state: ScanState, kind: LineKind) -> (ScanState, Step) {
    match (state, kind) {
        (_, LineKind::StackTraceMarker) => (ScanState::InStackTrace { blank_run: 0 }, Step::Extend),
        (_, LineKind::RecordStart) => (state, Step::Stop),
        (ScanState::Normal, LineKind::Blank) => (state, Step::Skip),
        (ScanState::Normal, _) => (state, Step::Extend),
        (ScanState::InStackTrace { blank_run }, LineKind::Blank) => {
            let blank_run = blank_run + 1;
            if blank_run >= TERMINATING_BLANK_LINES {
                (state, Step::Stop)
            } else {
                (ScanState::InStackTrace { blank_run }, Step::Skip)
            }
        }
        (ScanState::InStackTrace { .. }, _) => {
            (ScanState::InStackTrace { blank_run: 0 }, Step::Extend)
        }
    }
}

/// Index of the last line belonging to the record starting at `start`.
fn find_record_end(lines: &[&str], start: usize) -> usize {
    let mut state = ScanState::Normal;
    let mut end = start;
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        let (next, step) = transition(state, classify(line));
        state = next;
        match step {
            Step::Extend => end = index,
            Step::Skip => {}
            Step::Stop => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TRACE_LOG: &str = "\
[2024-01-01 00:00:00] local.INFO: started
[2024-01-01 00:00:05] local.ERROR: Division by zero {\"exception\":\"[object] (DivisionByZeroError)\"}
[stack trace]
#0 /app/src/Calc.php(12): divide()
#1 /app/src/Http/Controller.php(40): compute()
#2 {main}


trailing noise after the record
";

    #[test]
    fn message_for_matching_level() {
        let content = "[2024-01-01 00:00:00] local.ERROR: boom";
        assert_eq!(
            extract_last_record(content, Some(Severity::Error), false).as_deref(),
            Some("boom")
        );
        assert_eq!(extract_last_record(content, Some(Severity::Warning), false), None);
    }

    #[test]
    fn picks_most_recent_record() {
        let content = "\
[2024-01-01 00:00:00] local.ERROR: first
[2024-01-01 00:00:01] local.INFO: in between
[2024-01-01 00:00:02] local.ERROR: second
[2024-01-01 00:00:03] local.DEBUG: last
";
        assert_eq!(extract_last_error(content, false).as_deref(), Some("second"));
        assert_eq!(extract_last_record(content, None, false).as_deref(), Some("last"));
    }

    #[test]
    fn message_is_cut_before_exception_context() {
        assert_eq!(
            extract_last_error(TRACE_LOG, false).as_deref(),
            Some("Division by zero")
        );
    }

    #[test]
    fn stack_trace_block_stops_at_double_blank() {
        let block = extract_last_error(TRACE_LOG, true).unwrap();
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("[2024-01-01 00:00:05] local.ERROR"));
        assert_eq!(lines[1], "[stack trace]");
        assert_eq!(lines[4], "#2 {main}");
        assert!(!block.contains("trailing noise"));
    }

    #[test]
    fn next_header_ends_block() {
        let content = "\
[2024-01-01 00:00:00] local.ERROR: failed
[stack trace]
#0 /app/a.php(1): a()
[2024-01-01 00:00:01] local.INFO: recovered
";
        let block = extract_last_record(content, Some(Severity::Error), true).unwrap();
        assert_eq!(block.lines().count(), 3);
        assert!(!block.contains("recovered"));
    }

    #[test]
    fn next_header_ends_block_outside_stack_trace() {
        let content = "\
[2024-01-01 00:00:00] local.WARNING: slow query
select * from users

[2024-01-01 00:00:01] local.INFO: done
";
        let block = extract_last_record(content, Some(Severity::Warning), true).unwrap();
        assert_eq!(block, "[2024-01-01 00:00:00] local.WARNING: slow query\nselect * from users");
    }

    #[test]
    fn single_blank_inside_trace_does_not_end_block() {
        let content = "\
[2024-01-01 00:00:00] local.ERROR: failed
[stack trace]
#0 /app/a.php(1): a()

#1 /app/b.php(2): b()
{\"userId\":42}


#9 not part of it
";
        let block = extract_last_error(content, true).unwrap();
        assert!(block.contains("#1 /app/b.php(2): b()"));
        assert!(block.ends_with("{\"userId\":42}"));
        assert!(!block.contains("#9"));
    }

    #[test]
    fn blank_lines_outside_trace_do_not_terminate() {
        let content = "\
[2024-01-01 00:00:00] local.ERROR: failed
detail one


detail two


";
        let block = extract_last_error(content, true).unwrap();
        assert_eq!(
            block,
            "[2024-01-01 00:00:00] local.ERROR: failed\ndetail one\n\n\ndetail two"
        );
    }

    #[test]
    fn stack_trace_marker_is_case_insensitive() {
        let content = "\
[2024-01-01 00:00:00] local.ERROR: failed
[Stack Trace]
#0 /app/a.php(1): a()
";
        let block = extract_last_error(content, true).unwrap();
        assert!(block.ends_with("#0 /app/a.php(1): a()"));
    }

    #[test]
    fn header_only_record_with_trace() {
        let content = "[2024-01-01 00:00:00] local.NOTICE: disk at 80%\n\n";
        assert_eq!(
            extract_last_record(content, None, true).as_deref(),
            Some("[2024-01-01 00:00:00] local.NOTICE: disk at 80%")
        );
    }

    #[test]
    fn crlf_line_endings() {
        let content = "[2024-01-01 00:00:00] local.ERROR: boom\r\n[stack trace]\r\n#0 x()\r\n";
        assert_eq!(extract_last_error(content, false).as_deref(), Some("boom"));
        assert_eq!(
            extract_last_error(content, true).as_deref(),
            Some("[2024-01-01 00:00:00] local.ERROR: boom\n[stack trace]\n#0 x()")
        );
    }

    #[test]
    fn no_header_yields_none() {
        assert_eq!(extract_last_record("", None, false), None);
        assert_eq!(extract_last_record("plain text\nmore text", None, true), None);
        assert_eq!(
            extract_last_record("[x] local.error: lowercase", None, false),
            None
        );
    }

    #[test]
    fn empty_message_is_empty_string() {
        let content = "[2024-01-01 00:00:00] local.ERROR:";
        assert_eq!(extract_last_error(content, false).as_deref(), Some(""));
    }

    #[test]
    fn from_file_uses_latest_rotated_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("laravel-2024-01-01.log"), TRACE_LOG).unwrap();
        let message = extract_last_record_from_file(
            &dir.path().join("laravel.log"),
            Some(Severity::Error),
            false,
        )
        .unwrap();
        assert_eq!(message.as_deref(), Some("Division by zero"));
    }

    #[test]
    fn from_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let record =
            extract_last_record_from_file(&dir.path().join("app.log"), None, true).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify("[stack trace]"), LineKind::StackTraceMarker);
        assert_eq!(classify("[2024-01-01 00:00:00] app.INFO: x"), LineKind::RecordStart);
        assert_eq!(classify("  #12 /app/x.php(3): y()"), LineKind::Frame);
        assert_eq!(classify(" {\"a\":1} "), LineKind::Context);
        assert_eq!(classify("   "), LineKind::Blank);
        assert_eq!(classify("Next Exception"), LineKind::Text);
        assert_eq!(classify("see [2024] app.INFO: quoted"), LineKind::Text);
    }

    #[test]
    fn transition_table() {
        let normal = ScanState::Normal;
        let in_trace = ScanState::InStackTrace { blank_run: 0 };
        let one_blank = ScanState::InStackTrace { blank_run: 1 };

        assert_eq!(transition(normal, LineKind::StackTraceMarker), (in_trace, Step::Extend));
        assert_eq!(transition(normal, LineKind::Blank), (normal, Step::Skip));
        assert_eq!(transition(normal, LineKind::Frame), (normal, Step::Extend));
        assert_eq!(transition(normal, LineKind::RecordStart).1, Step::Stop);
        assert_eq!(transition(in_trace, LineKind::Blank), (one_blank, Step::Skip));
        assert_eq!(transition(one_blank, LineKind::Blank).1, Step::Stop);
        assert_eq!(transition(one_blank, LineKind::Frame), (in_trace, Step::Extend));
        assert_eq!(transition(one_blank, LineKind::Text), (in_trace, Step::Extend));
        assert_eq!(transition(in_trace, LineKind::RecordStart).1, Step::Stop);
    }
}
