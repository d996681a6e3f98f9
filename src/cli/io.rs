//! JSON I/O handling for CLI
//!
//! - Input: newline-delimited JSON operations via stdin, blank lines skipped
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read operation lines from `reader`, numbered from 1
pub fn read_operations<R: BufRead>(reader: R) -> impl Iterator<Item = (usize, CliResult<Value>)> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line_no = index + 1;
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some((
                    line_no,
                    serde_json::from_str(&line).map_err(|e| CliError::invalid_operation(line_no, e)),
                )),
                Err(e) => Some((line_no, Err(CliError::from(e)))),
            }
        })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_operations_skips_blank_lines() {
        let input = "{\"op\":\"insert\"}\n\n{\"op\":\"delete\"}\nnot json\n";
        let lines: Vec<_> = read_operations(input.as_bytes()).collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].0, 1);
        assert_eq!(lines[1].0, 3);
        assert!(lines[1].1.is_ok());
        assert_eq!(lines[2].0, 4);
        assert!(lines[2].1.is_err());
    }
}
