use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::probe::rtt::Rtt;
use crate::sampler::Sample;

/// Timestamp layout used in the first column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Written in the rtt column for an unreachable tick.
const SENTINEL: &str = "-1";

const HEADER: &str = "timestamp,stdout,stderr,rtt";

/// Error types for reading a recording back.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {0}: expected 4 fields, found {1}")]
    FieldCount(usize, usize),
    #[error("line {0}: invalid timestamp: {1}")]
    Timestamp(usize, String),
    #[error("line {0}: invalid rtt: {1}")]
    Rtt(usize, String),
    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

/// Writes samples to `path` in the recording layout: a header row, then one
/// row per tick with `timestamp,stdout,stderr,rtt` columns. Unreachable ticks
/// carry the `-1` sentinel in the rtt column. Fields containing a comma,
/// quote, or line break are quoted; everything else is written bare.
pub fn write(samples: &[Sample], path: &Path) -> Result<(), std::io::Error> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{HEADER}")?;

    for sample in samples {
        writeln!(
            writer,
            "{},{},{},{}",
            sample.timestamp.format(TIMESTAMP_FORMAT),
            field(&sample.stdout),
            field(&sample.stderr),
            rtt_field(sample.rtt),
        )?;
    }

    writer.flush()
}

/// Reads a recording back. The first row is the header and is skipped; every
/// other row must carry exactly four fields. An rtt equal to the sentinel
/// maps back to `Unreachable`; any other value is a latency in milliseconds.
pub fn read(path: &Path) -> Result<Vec<Sample>, RecordError> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    parse(&text)
}

fn parse(text: &str) -> Result<Vec<Sample>, RecordError> {
    let rows = split_rows(text)?;
    let mut samples = Vec::new();

    // the first row is the header; errors carry the physical line a row
    // starts on, matching what an editor shows
    for (line, row) in rows.into_iter().skip(1) {
        if row.len() != 4 {
            return Err(RecordError::FieldCount(line, row.len()));
        }

        let mut fields = row.into_iter();
        let timestamp_raw = fields.next().unwrap_or_default();
        let stdout = fields.next().unwrap_or_default();
        let stderr = fields.next().unwrap_or_default();
        let rtt_raw = fields.next().unwrap_or_default();

        let timestamp = NaiveDateTime::parse_from_str(&timestamp_raw, TIMESTAMP_FORMAT)
            .map_err(|_| RecordError::Timestamp(line, timestamp_raw.clone()))?;

        let value: f64 = rtt_raw
            .trim()
            .parse()
            .map_err(|_| RecordError::Rtt(line, rtt_raw.clone()))?;

        // older recordings carry the sentinel as a float column
        let rtt = if value == -1.0 {
            Rtt::Unreachable
        } else {
            Rtt::Millis(value)
        };

        samples.push(Sample {
            timestamp,
            stdout,
            stderr,
            rtt,
        });
    }

    Ok(samples)
}

fn field(value: &str) -> Cow<'_, str> {
    if value.contains(|c| matches!(c, '"' | ',' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn rtt_field(rtt: Rtt) -> String {
    match rtt {
        Rtt::Unreachable => SENTINEL.to_string(),
        // keep a trailing .0 on whole values so the column reads as floats
        Rtt::Millis(value) if value.fract() == 0.0 => format!("{value:.1}"),
        Rtt::Millis(value) => format!("{value}"),
    }
}

/// Split text into rows of fields, each tagged with the physical line the
/// row starts on. Quoted fields may span lines; a quote inside a quoted
/// field is escaped by doubling it.
fn split_rows(text: &str) -> Result<Vec<(usize, Vec<String>)>, RecordError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut row_line = 1;

    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                if c == '\n' {
                    line += 1;
                }

                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;

                if row.is_empty() && field.is_empty() && !quoted {
                    // blank line
                    row_line = line;
                    continue;
                }

                row.push(std::mem::take(&mut field));
                rows.push((row_line, std::mem::take(&mut row)));
                quoted = false;
                row_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(RecordError::UnterminatedQuote);
    }

    // final row without a trailing newline
    if !field.is_empty() || !row.is_empty() || quoted {
        row.push(field);
        rows.push((row_line, row));
    }

    Ok(rows)
}
