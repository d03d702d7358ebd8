//! Parameter value expressions.
//!
//! `&Param:` values are literals, never code:
//! - a bracketed list of quoted strings and numbers: `["a", 'b', 3, 1.5]`
//! - an integer range: `range(stop)`, `range(start, stop[, step])`,
//!   `start..stop`, `start..=stop` (stop exclusive unless `..=`)
//!
//! Errors carry the 1-based column within the line; `col0` is the column at
//! which `expr` starts.

use super::error::{FrofError, FrofResult};
use regex::Regex;
use std::sync::LazyLock;

/// Upper bound on generated options, so `range(0, 10_000_000_000)` is an
/// error rather than an allocation.
pub const MAX_OPTIONS: usize = 100_000;

static RANGE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^range\(\s*(-?\d+)\s*(?:,\s*(-?\d+)\s*(?:,\s*(-?\d+)\s*)?)?,?\s*\)$")
        .expect("valid regex")
});

static RANGE_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?\d+)\s*\.\.(=?)\s*(-?\d+)$").expect("valid regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?").expect("valid regex"));

/// Parse a value expression into its ordered options.
pub fn parse_value_expr(expr: &str, line: usize, col0: usize) -> FrofResult<Vec<String>> {
    let trimmed = expr.trim();
    let lead = expr.len() - expr.trim_start().len();
    let col = col0 + lead;

    if trimmed.is_empty() {
        return Err(FrofError::parse(line, col, "expected a list or range"));
    }
    if trimmed.starts_with('[') {
        return parse_list(trimmed, line, col);
    }
    if let Some(caps) = RANGE_CALL.captures(trimmed) {
        let first = parse_int(&caps[1], line, col)?;
        let (start, stop) = match caps.get(2) {
            Some(stop) => (first, parse_int(stop.as_str(), line, col)?),
            None => (0, first),
        };
        let step = match caps.get(3) {
            Some(step) => parse_int(step.as_str(), line, col)?,
            None => 1,
        };
        return expand_range(start, stop, step, line, col);
    }
    if let Some(caps) = RANGE_DOTS.captures(trimmed) {
        let start = parse_int(&caps[1], line, col)?;
        let mut stop = parse_int(&caps[3], line, col)?;
        if &caps[2] == "=" {
            stop = stop
                .checked_add(1)
                .ok_or_else(|| FrofError::parse(line, col, "range bound overflows"))?;
        }
        return expand_range(start, stop, 1, line, col);
    }

    Err(FrofError::parse(
        line,
        col,
        format!("expected a list or range, found '{}'", trimmed),
    ))
}

fn parse_int(s: &str, line: usize, col: usize) -> FrofResult<i64> {
    s.parse()
        .map_err(|_| FrofError::parse(line, col, format!("integer out of range: {}", s)))
}

fn expand_range(start: i64, stop: i64, step: i64, line: usize, col: usize) -> FrofResult<Vec<String>> {
    if step == 0 {
        return Err(FrofError::parse(line, col, "range step must not be zero"));
    }
    let span = if step > 0 {
        (stop as i128 - start as i128).max(0)
    } else {
        (start as i128 - stop as i128).max(0)
    };
    let step_abs = (step as i128).abs();
    let count = (span + step_abs - 1) / step_abs;
    if count == 0 {
        return Err(FrofError::parse(line, col, "range produces no values"));
    }
    if count > MAX_OPTIONS as i128 {
        return Err(FrofError::parse(
            line,
            col,
            format!("range produces more than {} values", MAX_OPTIONS),
        ));
    }
    Ok((0..count)
        .map(|i| (start as i128 + i * step as i128).to_string())
        .collect())
}

/// Scanner over a bracketed list. `base` is the column of `src[0]`.
struct ListScanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    base: usize,
}

impl ListScanner<'_> {
    fn col(&self) -> usize {
        self.base + self.src[..self.pos].chars().count()
    }

    fn err(&self, message: impl Into<String>) -> FrofError {
        FrofError::parse(self.line, self.col(), message)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn string(&mut self, quote: char) -> FrofResult<String> {
        let start_col = self.col();
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(FrofError::parse(
                        self.line,
                        start_col,
                        "unterminated string literal",
                    ))
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    Some(c) => return Err(self.err(format!("unknown escape '\\{}'", c))),
                    None => return Err(self.err("unterminated string literal")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> FrofResult<String> {
        let rest = &self.src[self.pos..];
        let m = NUMBER
            .find(rest)
            .ok_or_else(|| self.err("expected a quoted string or a number"))?;
        let text = m.as_str().to_string();
        self.pos += m.end();
        Ok(text)
    }
}

fn parse_list(src: &str, line: usize, base: usize) -> FrofResult<Vec<String>> {
    let mut sc = ListScanner {
        src,
        pos: 0,
        line,
        base,
    };
    sc.bump(); // '['
    let mut items = Vec::new();
    loop {
        sc.skip_ws();
        match sc.peek() {
            Some(']') => {
                sc.bump();
                break;
            }
            Some(q @ ('"' | '\'')) => items.push(sc.string(q)?),
            Some(_) => items.push(sc.number()?),
            None => return Err(sc.err("expected ']'")),
        }
        sc.skip_ws();
        match sc.peek() {
            Some(',') => {
                sc.bump();
            }
            Some(']') => {}
            Some(c) => return Err(sc.err(format!("expected ',' or ']', found '{}'", c))),
            None => return Err(sc.err("expected ']'")),
        }
    }
    sc.skip_ws();
    if sc.pos < src.len() {
        return Err(sc.err("unexpected text after ']'"));
    }
    if items.is_empty() {
        return Err(FrofError::parse(line, base, "parameter list must not be empty"));
    }
    if items.len() > MAX_OPTIONS {
        return Err(FrofError::parse(
            line,
            base,
            format!("parameter list has more than {} values", MAX_OPTIONS),
        ));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(expr: &str) -> Vec<String> {
        parse_value_expr(expr, 1, 1).unwrap()
    }

    fn err_col(expr: &str) -> usize {
        parse_value_expr(expr, 1, 1)
            .unwrap_err()
            .position()
            .unwrap()
            .column
    }

    #[test]
    fn test_list_of_integers() {
        assert_eq!(ok("[1,2,3]"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_list_of_strings_with_escapes() {
        assert_eq!(
            ok(r#"[ "a b", 'c', "q\"uote", 'x\ny' ]"#),
            vec!["a b", "c", "q\"uote", "x\ny"]
        );
    }

    #[test]
    fn test_list_trailing_comma_and_floats() {
        assert_eq!(ok("[-1, 2.5,]"), vec!["-1", "2.5"]);
    }

    #[test]
    fn test_list_rejects_code() {
        assert!(parse_value_expr("[__import__('os')]", 1, 1).is_err());
        assert!(parse_value_expr("[x for x in y]", 1, 1).is_err());
        assert!(parse_value_expr("os.system('rm')", 1, 1).is_err());
    }

    #[test]
    fn test_list_errors_have_columns() {
        // "[1, @]" — '@' sits at column 5
        assert_eq!(err_col("[1, @]"), 5);
        assert_eq!(err_col("[1 2]"), 4);
        assert!(parse_value_expr("[\"open", 1, 1).is_err());
        assert!(parse_value_expr("[]", 1, 1).is_err());
        assert!(parse_value_expr("[1] extra", 1, 1).is_err());
    }

    #[test]
    fn test_column_offset_applies() {
        let err = parse_value_expr("  [1, @]", 4, 10).unwrap_err();
        let pos = err.position().unwrap();
        assert_eq!(pos.line, 4);
        assert_eq!(pos.column, 16);
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(ok("range(3)"), vec!["0", "1", "2"]);
        assert_eq!(ok("range(1, 4)"), vec!["1", "2", "3"]);
        assert_eq!(ok("range(10, 0, -4)"), vec!["10", "6", "2"]);
        assert_eq!(ok("1..4"), vec!["1", "2", "3"]);
        assert_eq!(ok("1..=4"), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_range_errors() {
        assert!(parse_value_expr("range(1, 5, 0)", 1, 1).is_err());
        assert!(parse_value_expr("range(5, 1)", 1, 1).is_err());
        assert!(parse_value_expr("0..0", 1, 1).is_err());
        assert!(parse_value_expr("range(0, 1000000000000)", 1, 1).is_err());
        assert!(parse_value_expr("", 1, 1).is_err());
    }
}
