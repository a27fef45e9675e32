//! The closed instruction set of `element script`.
//!
//! A script is a list of lines, one instruction each, written `name(args)`:
//!
//! ```text
//! tap(2)
//! longpress(1.5)
//! swipe(0, -200)
//! ```
//!
//! Names are matched case-insensitively against a fixed table; there is no
//! dynamic lookup.  The whole script is parsed before anything runs, so a bad
//! line never leaves a half-executed script behind.

use std::time::Duration;

use thiserror::Error;

/// Upper bound on a single long press.
pub const MAX_LONG_PRESS: Duration = Duration::from_secs(30);

/// Errors produced while parsing a script line.
#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("script is empty")]
    Empty,

    #[error("line {line}: unknown instruction '{name}'")]
    UnknownInstruction { line: usize, name: String },

    #[error("line {line}: {reason}")]
    BadArguments { line: usize, reason: String },
}

/// One script instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptInstruction {
    /// Tap `count` times in quick succession.
    Tap { count: u32 },
    /// Press and hold.
    LongPress { duration: Duration },
    /// Swipe from the element vector by `(dx, dy)` points.
    Swipe { dx: f64, dy: f64 },
}

impl ScriptInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tap { .. } => "tap",
            Self::LongPress { .. } => "longpress",
            Self::Swipe { .. } => "swipe",
        }
    }
}

/// Parses every non-blank line of `lines` into instructions.
///
/// # Errors
///
/// Returns [`ScriptError`] for an empty script, an unknown name or malformed
/// arguments.  Line numbers in errors are 1-based.
pub fn parse_script<S: AsRef<str>>(lines: &[S]) -> Result<Vec<ScriptInstruction>, ScriptError> {
    let instructions = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.as_ref().trim().is_empty())
        .map(|(i, l)| parse_instruction(i + 1, l.as_ref().trim()))
        .collect::<Result<Vec<_>, _>>()?;

    if instructions.is_empty() {
        return Err(ScriptError::Empty);
    }
    Ok(instructions)
}

fn parse_instruction(line: usize, text: &str) -> Result<ScriptInstruction, ScriptError> {
    let (name, args) = split_call(line, text)?;
    let bad = |reason: String| ScriptError::BadArguments { line, reason };

    match name.to_ascii_lowercase().as_str() {
        "tap" => {
            let count = match args.as_slice() {
                [] => 1,
                [n] => n
                    .parse::<u32>()
                    .map_err(|_| bad(format!("tap count '{n}' is not a positive integer")))?,
                _ => return Err(bad("tap takes at most one argument".to_string())),
            };
            if count == 0 {
                return Err(bad("tap count must be at least 1".to_string()));
            }
            Ok(ScriptInstruction::Tap { count })
        }
        "longpress" => {
            let [secs] = args.as_slice() else {
                return Err(bad("longpress takes exactly one argument".to_string()));
            };
            let secs = secs
                .parse::<f64>()
                .map_err(|_| bad(format!("duration '{secs}' is not a number")))?;
            if !secs.is_finite() || secs <= 0.0 || secs > MAX_LONG_PRESS.as_secs_f64() {
                return Err(bad(format!(
                    "duration must be in (0, {}] seconds",
                    MAX_LONG_PRESS.as_secs()
                )));
            }
            Ok(ScriptInstruction::LongPress {
                duration: Duration::from_secs_f64(secs),
            })
        }
        "swipe" => {
            let [dx, dy] = args.as_slice() else {
                return Err(bad("swipe takes exactly two arguments".to_string()));
            };
            let parse = |v: &str| {
                v.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| bad(format!("swipe delta '{v}' is not a number")))
            };
            Ok(ScriptInstruction::Swipe {
                dx: parse(dx)?,
                dy: parse(dy)?,
            })
        }
        _ => Err(ScriptError::UnknownInstruction {
            line,
            name: name.to_string(),
        }),
    }
}

/// Splits `name(a, b)` into its name and trimmed arguments.  A bare `name`
/// has no arguments.
fn split_call(line: usize, text: &str) -> Result<(&str, Vec<&str>), ScriptError> {
    let Some(open) = text.find('(') else {
        return Ok((text, Vec::new()));
    };
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ScriptError::BadArguments {
            line,
            reason: "missing closing parenthesis".to_string(),
        })?;

    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };
    Ok((text[..open].trim(), args))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_reads_all_instruction_kinds() {
        // Arrange
        let lines = ["tap(2)", "LongPress(1.5)", "swipe(10, -20.5)"];

        // Act
        let script = parse_script(&lines).expect("parse");

        // Assert
        assert_eq!(
            script,
            vec![
                ScriptInstruction::Tap { count: 2 },
                ScriptInstruction::LongPress {
                    duration: Duration::from_millis(1500)
                },
                ScriptInstruction::Swipe { dx: 10.0, dy: -20.5 },
            ]
        );
    }

    #[test]
    fn test_bare_tap_defaults_to_one() {
        assert_eq!(
            parse_script(&["tap"]).expect("parse"),
            vec![ScriptInstruction::Tap { count: 1 }]
        );
        assert_eq!(
            parse_script(&["tap()"]).expect("parse"),
            vec![ScriptInstruction::Tap { count: 1 }]
        );
    }

    #[test]
    fn test_blank_lines_are_skipped_but_numbering_is_kept() {
        let result = parse_script(&["tap", "", "  ", "fly(3)"]);
        assert_eq!(
            result,
            Err(ScriptError::UnknownInstruction {
                line: 4,
                name: "fly".to_string()
            })
        );
    }

    #[test]
    fn test_empty_script_is_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(parse_script(&empty), Err(ScriptError::Empty));
        assert_eq!(parse_script(&["", " "]), Err(ScriptError::Empty));
    }

    #[test]
    fn test_zero_tap_count_is_rejected() {
        assert!(matches!(
            parse_script(&["tap(0)"]),
            Err(ScriptError::BadArguments { line: 1, .. })
        ));
    }

    #[test]
    fn test_long_press_bounds_are_enforced() {
        assert!(parse_script(&["longpress(0)"]).is_err());
        assert!(parse_script(&["longpress(-1)"]).is_err());
        assert!(parse_script(&["longpress(31)"]).is_err());
        assert!(parse_script(&["longpress"]).is_err());
        assert!(parse_script(&["longpress(30)"]).is_ok());
    }

    #[test]
    fn test_swipe_requires_two_numeric_arguments() {
        assert!(parse_script(&["swipe(1)"]).is_err());
        assert!(parse_script(&["swipe(a, 2)"]).is_err());
        assert!(parse_script(&["swipe(1, 2"]).is_err());
    }
}
