//! Frof DSL parsing.
//!
//! Line-oriented grammar:
//! - `# text` — comment
//! - `A -> B -> C` — dependency edges A→B, B→C (a lone `A` declares a node)
//! - `Name: <command>` — shell command body for `Name`
//! - `&Param: <value>` — parameter table entry (see [`super::params`])
//! - `Name(&Param)` / `Name(&Param[cap])` — parameterized reference inside
//!   an edge chain
//!
//! Parsing produces the base graph, the parameter table and the
//! parameterized declarations; [`super::resolver::expand`] turns those into
//! the final graph.

use super::error::{FrofError, FrofResult, Position};
use super::graph::Graph;
use super::job::Job;
use super::params;
use super::resolver;
use super::types::{ParameterTable, ParameterizedDeclaration};
use regex::Regex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Identifier grammar for job and parameter names.
pub const IDENT: &str = r"[A-Za-z_-]\w*";

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(&?)({IDENT})\s*:(.*)$")).expect("valid regex")
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^({IDENT})(?:\s*\(\s*&({IDENT})\s*(?:\[\s*(\d+)\s*\])?\s*\))?$"
    ))
    .expect("valid regex")
});

/// Parser output before parameter expansion.
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    /// Nodes and edges as written; parameterized nodes are still templates
    pub graph: Graph,
    pub parameters: ParameterTable,
    /// Parameterized references, in order of first appearance
    pub declarations: Vec<ParameterizedDeclaration>,
    /// Where each parameter was defined
    pub parameter_positions: HashMap<String, Position>,
}

/// Parse DSL text and expand parameterized declarations.
pub fn parse(src: &str) -> FrofResult<Graph> {
    resolver::expand(parse_source(src)?)
}

/// Read and parse a DSL file.
pub fn parse_file(path: &Path) -> FrofResult<Graph> {
    let content = std::fs::read_to_string(path).map_err(|source| FrofError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
}

/// Parse DSL text without expanding parameters.
pub fn parse_source(src: &str) -> FrofResult<ParsedSource> {
    let mut p = LineParser::default();
    for (i, raw) in src.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        p.line(i + 1, line)?;
    }
    Ok(p.out)
}

/// 1-based column of byte offset `byte` in `line`.
fn column(line: &str, byte: usize) -> usize {
    line[..byte].chars().count() + 1
}

#[derive(Default)]
struct LineParser {
    out: ParsedSource,
    /// Job id → where its body was defined
    bodies: HashMap<String, Position>,
    /// Job id → index into `out.declarations`
    bindings: HashMap<String, usize>,
}

impl LineParser {
    fn line(&mut self, n: usize, line: &str) -> FrofResult<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        if let Some(caps) = DEFINITION.captures(line) {
            let name = caps.get(2).map_or("", |m| m.as_str());
            let name_at = Position::new(n, column(line, caps.get(2).map_or(0, |m| m.start())));
            let body = caps.get(3).map_or("", |m| m.as_str());
            let body_col = column(line, caps.get(3).map_or(line.len(), |m| m.start()));
            if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
                return self.parameter(name, name_at, body, n, body_col);
            }
            return self.body(name, name_at, body, body_col);
        }

        self.chain(n, line)
    }

    fn parameter(&mut self, name: &str, at: Position, expr: &str, n: usize, col: usize) -> FrofResult<()> {
        if self.out.parameters.contains_key(name) {
            return Err(FrofError::DuplicateParameter {
                name: name.to_string(),
                at,
            });
        }
        let expr = strip_comment(expr);
        let options = params::parse_value_expr(expr, n, col)?;
        debug!(param = name, options = options.len(), "parsed parameter");
        self.out.parameters.insert(name.to_string(), options);
        self.out.parameter_positions.insert(name.to_string(), at);
        Ok(())
    }

    fn body(&mut self, name: &str, at: Position, body: &str, body_col: usize) -> FrofResult<()> {
        if self.bodies.contains_key(name) {
            return Err(FrofError::DuplicateJob {
                id: name.to_string(),
                at: Some(at),
            });
        }
        let command = body.trim();
        if command.is_empty() {
            return Err(FrofError::parse(
                at.line,
                body_col,
                format!("empty command for job '{}'", name),
            ));
        }
        self.out.graph.ensure_node(name);
        if let Some(node) = self.out.graph.node_mut(name) {
            node.job = Job::shell(command);
        }
        self.bodies.insert(name.to_string(), at);
        Ok(())
    }

    fn chain(&mut self, n: usize, line: &str) -> FrofResult<()> {
        let content = strip_comment(line);
        let mut ids: Vec<String> = Vec::new();
        let mut offset = 0;
        for segment in content.split("->") {
            let lead = segment.len() - segment.trim_start().len();
            let col = column(line, offset + lead);
            let element = segment.trim();
            offset += segment.len() + 2;

            if element.is_empty() {
                return Err(FrofError::parse(n, col, "expected a job name"));
            }
            let caps = REFERENCE.captures(element).ok_or_else(|| {
                FrofError::parse(n, col, format!("invalid job reference '{}'", element))
            })?;
            let id = caps[1].to_string();
            if let Some(param) = caps.get(2) {
                let cap = match caps.get(3) {
                    Some(c) => Some(
                        c.as_str()
                            .parse::<usize>()
                            .ok()
                            .and_then(NonZeroUsize::new)
                            .ok_or_else(|| {
                                FrofError::parse(n, col, "parallelism cap must be a positive integer")
                            })?,
                    ),
                    None => None,
                };
                self.bind(&id, param.as_str(), cap, Position::new(n, col))?;
            }
            self.out.graph.ensure_node(&id);
            ids.push(id);
        }

        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.out.graph.add_path(&refs)
    }

    fn bind(&mut self, id: &str, param: &str, cap: Option<NonZeroUsize>, at: Position) -> FrofResult<()> {
        if let Some(&i) = self.bindings.get(id) {
            let existing = &self.out.declarations[i];
            if existing.param == param && existing.cap == cap {
                return Ok(());
            }
            return Err(FrofError::Parse {
                at,
                message: format!(
                    "conflicting parameter binding for job '{}' (first bound at {})",
                    id, existing.at
                ),
            });
        }
        debug!(job = id, param, cap = cap.map(NonZeroUsize::get), "parameterized reference");
        self.bindings.insert(id.to_string(), self.out.declarations.len());
        self.out.declarations.push(ParameterizedDeclaration {
            job_id: id.to_string(),
            param: param.to_string(),
            cap,
            at,
        });
        Ok(())
    }
}

/// Drop a trailing `# comment` (quote-aware, for parameter lines).
fn strip_comment(s: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '#' => return &s[..i],
                _ => {}
            },
        }
    }
    s
}
