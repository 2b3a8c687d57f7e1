// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::btor2::parse::token_offset;
use log::{info, trace};
use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("parse error in '{path}' at line {line} column {col}: {msg}")]
    Parse {
        path: String,
        line: u64,
        col: usize,
        msg: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, WitnessError>;

/// The index part of an array assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessIndex {
    /// `[*]`: the value constrains every index.
    All,
    /// `[bits]`: the value constrains a single index.
    Bits(String),
}

/// One `<pos> [<idx>] <value> [<symbol>]` line of a witness frame.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub pos: usize,
    pub index: Option<WitnessIndex>,
    pub value: String,
    pub symbol: Option<String>,
    /// line number of the assignment in the witness file
    pub line: u64,
    /// 1-based columns of the index and value tokens, for width diagnostics
    pub index_col: usize,
    pub value_col: usize,
}

/// One frame of a witness: the optional state section and the input section.
#[derive(Debug, Default)]
pub struct Frame {
    pub step: u64,
    pub states: Vec<Assignment>,
    pub inputs: Vec<Assignment>,
}

/// Line oriented reader for the btor witness format. Tracks line numbers and
/// token columns so that errors point at the exact character position; a one
/// line push-back buffer stands in for the character push-back of the grammar
/// (`@` and `#` return control to the frame header).
pub struct WitnessReader<R: BufRead> {
    input: R,
    path: String,
    lineno: u64,
    pending: Option<String>,
    end_of_witness: bool,
    witnesses_started: u64,
}

impl<R: BufRead> WitnessReader<R> {
    pub fn new(input: R, path: &str) -> Self {
        WitnessReader {
            input,
            path: path.to_string(),
            lineno: 0,
            pending: None,
            end_of_witness: false,
            witnesses_started: 0,
        }
    }

    /// True after the terminating `.` of the current witness was consumed.
    pub fn end_of_witness(&self) -> bool {
        self.end_of_witness
    }

    pub fn witness_count(&self) -> u64 {
        self.witnesses_started
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.lineno += 1;
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn push_back(&mut self, line: String) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(line);
    }

    fn error<T>(&self, col: usize, msg: String) -> Result<T> {
        Err(WitnessError::Parse {
            path: self.path.clone(),
            line: self.lineno,
            col,
            msg,
        })
    }

    /// Scans for the next witness header. Returns the claimed bad property
    /// numbers (empty for an "unknown" witness that starts with `#0`), or
    /// `None` at the end of the file. Unrecognized lines before the header are
    /// skipped like any other comment.
    pub fn next_witness(&mut self) -> Result<Option<Vec<usize>>> {
        loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            if line.starts_with('#') {
                self.witnesses_started += 1;
                self.end_of_witness = false;
                info!("found unknown witness in '{}' at line {}", self.path, self.lineno);
                self.push_back(line);
                return Ok(Some(Vec::new()));
            }
            if line == "sat" {
                self.witnesses_started += 1;
                self.end_of_witness = false;
                info!(
                    "found witness header 'sat' in '{}' at line {}",
                    self.path, self.lineno
                );
                let claims = self.parse_claims()?;
                return Ok(Some(claims));
            }
            if line == "unsat" {
                return self.error(1, "'unsat' witnesses not supported yet".to_string());
            }
            // skip anything else before the header
        }
    }

    fn parse_claims(&mut self) -> Result<Vec<usize>> {
        let Some(line) = self.next_line()? else {
            return self.error(1, "unexpected end-of-file before claimed properties".to_string());
        };
        let mut claims = Vec::new();
        for token in line.split_ascii_whitespace() {
            let col = token_offset(token, &line) + 1;
            if let Some(num) = token.strip_prefix('b') {
                match parse_number(num) {
                    Some(bad) => {
                        trace!("... claims to be witness of bad state property number 'b{bad}'");
                        claims.push(bad);
                    }
                    None => return self.error(col + 1, "expected digit".to_string()),
                }
            } else if token.starts_with('j') {
                return self.error(col, "can not handle justice properties yet".to_string());
            } else {
                return self.error(col, "expected 'b' or 'j'".to_string());
            }
        }
        Ok(claims)
    }

    /// Parses the state and input sections of frame `k`. After the call,
    /// `end_of_witness` tells whether the terminating `.` was seen.
    pub fn next_frame(&mut self, k: u64) -> Result<Frame> {
        let mut frame = Frame {
            step: k,
            ..Frame::default()
        };

        // optional state section, mandatory in frame 0
        match self.next_line()? {
            Some(line) if line.starts_with('#') => {
                if parse_number(&line[1..]) != Some(k as usize) {
                    return self.error(
                        1,
                        format!("missing '#{k}' state part header of frame {k}"),
                    );
                }
                self.parse_assignments(&mut frame.states, k)?;
            }
            Some(line) => {
                if k == 0 {
                    return self.error(1, format!("missing '#{k}' state part header of frame {k}"));
                }
                self.push_back(line);
            }
            None => {
                return self.error(1, "unexpected end-of-file (without '.')".to_string());
            }
        }
        if self.end_of_witness {
            return Ok(frame);
        }

        // mandatory input section
        match self.next_line()? {
            Some(line) if line.starts_with('@') => {
                if parse_number(&line[1..]) != Some(k as usize) {
                    return self.error(
                        1,
                        format!("missing '@{k}' input part header of frame {k}"),
                    );
                }
                self.parse_assignments(&mut frame.inputs, k)?;
            }
            Some(_) => {
                return self.error(1, format!("missing '@{k}' input part header of frame {k}"));
            }
            None => {
                return self.error(1, "unexpected end-of-file (without '.')".to_string());
            }
        }
        Ok(frame)
    }

    /// Reads assignments until `.` ends the witness or the next section header
    /// is pushed back.
    fn parse_assignments(&mut self, out: &mut Vec<Assignment>, k: u64) -> Result<()> {
        loop {
            let Some(line) = self.next_line()? else {
                return self.error(1, "unexpected end-of-file (without '.')".to_string());
            };
            if line.trim_end() == "." {
                trace!("read terminating '.'");
                self.end_of_witness = true;
                return Ok(());
            }
            if line.starts_with('@') || line.starts_with('#') {
                self.push_back(line);
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }
            let assignment = self.parse_assignment(&line, k)?;
            out.push(assignment);
        }
    }

    fn parse_assignment(&mut self, line: &str, k: u64) -> Result<Assignment> {
        let mut tokens = tokenize_with_columns(line);
        tokens.reverse(); // pop from the front

        let Some((pos_tok, pos_col)) = tokens.pop() else {
            return self.error(1, "expected digit".to_string());
        };
        let Some(pos) = parse_number(pos_tok) else {
            return self.error(pos_col, "expected digit".to_string());
        };

        let Some((second, second_col)) = tokens.pop() else {
            return self.error(pos_col + pos_tok.len(), format!("space missing after '{pos}'"));
        };

        let (index, index_col, value_tok, value_col) = if let Some(stripped) =
            second.strip_prefix('[')
        {
            let Some(inner) = stripped.strip_suffix(']') else {
                return self.error(second_col + second.len(), "expected ] after index".to_string());
            };
            let index = if inner == "*" {
                WitnessIndex::All
            } else if !inner.is_empty() && inner.chars().all(|c| c == '0' || c == '1') {
                WitnessIndex::Bits(inner.to_string())
            } else if inner.is_empty() {
                return self.error(second_col + 1, "empty index".to_string());
            } else {
                return self.error(second_col + 1, "expected ] after index".to_string());
            };
            let Some((value_tok, value_col)) = tokens.pop() else {
                return self.error(second_col + second.len(), "empty constant".to_string());
            };
            (Some(index), second_col + 1, value_tok, value_col)
        } else {
            (None, 0, second, second_col)
        };

        if value_tok.is_empty() {
            return self.error(value_col, "empty constant".to_string());
        }
        if !value_tok.chars().all(|c| c == '0' || c == '1') {
            return self.error(value_col, "expected binary constant".to_string());
        }

        // anything left on the line is the symbol
        let symbol = match tokens.last() {
            Some((_, col)) => {
                let text = line[*col - 1..].trim_end();
                (!text.is_empty()).then(|| text.to_string())
            }
            None => None,
        };

        let assignment = Assignment {
            pos,
            index,
            value: value_tok.to_string(),
            symbol,
            line: self.lineno,
            index_col,
            value_col,
        };
        trace!(
            "assignment '{}' at time frame {k}",
            line.trim_end()
        );
        Ok(assignment)
    }
}

/// Splits a line on spaces and tabs, remembering the 1-based column of each token.
fn tokenize_with_columns(line: &str) -> Vec<(&str, usize)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if c == ' ' || c == '\t' {
            if let Some(s) = start.take() {
                out.push((&line[s..i], s + 1));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((&line[s..], s + 1));
    }
    out
}

/// Parses a plain unsigned number; leading zeros are only allowed for `0` itself.
fn parse_number(text: &str) -> Option<usize> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse::<usize>().ok()
}
