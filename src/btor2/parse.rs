// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use baa::WidthInt;
use fuzzy_matcher::FuzzyMatcher;
use lazy_static::lazy_static;
use num_bigint::BigUint;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifies a line of the model. Ids are positive and assigned by the input file.
pub type LineId = usize;

/// The operator or declaration kind of a btor2 line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Tag {
    // declarations
    Sort,
    Input,
    State,
    Init,
    Next,
    Output,
    Bad,
    Constraint,
    Fair,
    Justice,
    // constants
    Const,
    Constd,
    Consth,
    Zero,
    One,
    Ones,
    // unary
    Not,
    Inc,
    Dec,
    Neg,
    Redand,
    Redor,
    Redxor,
    Slice,
    Uext,
    Sext,
    // binary
    Iff,
    Implies,
    Eq,
    Neq,
    Sgt,
    Ugt,
    Sgte,
    Ugte,
    Slt,
    Ult,
    Slte,
    Ulte,
    And,
    Nand,
    Nor,
    Or,
    Xnor,
    Xor,
    Rol,
    Ror,
    Sll,
    Sra,
    Srl,
    Add,
    Mul,
    Sdiv,
    Udiv,
    Smod,
    Srem,
    Urem,
    Sub,
    Saddo,
    Uaddo,
    Sdivo,
    Udivo,
    Smulo,
    Umulo,
    Ssubo,
    Usubo,
    Concat,
    Read,
    // ternary
    Ite,
    Write,
}

impl Tag {
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Sort => "sort",
            Tag::Input => "input",
            Tag::State => "state",
            Tag::Init => "init",
            Tag::Next => "next",
            Tag::Output => "output",
            Tag::Bad => "bad",
            Tag::Constraint => "constraint",
            Tag::Fair => "fair",
            Tag::Justice => "justice",
            Tag::Const => "const",
            Tag::Constd => "constd",
            Tag::Consth => "consth",
            Tag::Zero => "zero",
            Tag::One => "one",
            Tag::Ones => "ones",
            Tag::Not => "not",
            Tag::Inc => "inc",
            Tag::Dec => "dec",
            Tag::Neg => "neg",
            Tag::Redand => "redand",
            Tag::Redor => "redor",
            Tag::Redxor => "redxor",
            Tag::Slice => "slice",
            Tag::Uext => "uext",
            Tag::Sext => "sext",
            Tag::Iff => "iff",
            Tag::Implies => "implies",
            Tag::Eq => "eq",
            Tag::Neq => "neq",
            Tag::Sgt => "sgt",
            Tag::Ugt => "ugt",
            Tag::Sgte => "sgte",
            Tag::Ugte => "ugte",
            Tag::Slt => "slt",
            Tag::Ult => "ult",
            Tag::Slte => "slte",
            Tag::Ulte => "ulte",
            Tag::And => "and",
            Tag::Nand => "nand",
            Tag::Nor => "nor",
            Tag::Or => "or",
            Tag::Xnor => "xnor",
            Tag::Xor => "xor",
            Tag::Rol => "rol",
            Tag::Ror => "ror",
            Tag::Sll => "sll",
            Tag::Sra => "sra",
            Tag::Srl => "srl",
            Tag::Add => "add",
            Tag::Mul => "mul",
            Tag::Sdiv => "sdiv",
            Tag::Udiv => "udiv",
            Tag::Smod => "smod",
            Tag::Srem => "srem",
            Tag::Urem => "urem",
            Tag::Sub => "sub",
            Tag::Saddo => "saddo",
            Tag::Uaddo => "uaddo",
            Tag::Sdivo => "sdivo",
            Tag::Udivo => "udivo",
            Tag::Smulo => "smulo",
            Tag::Umulo => "umulo",
            Tag::Ssubo => "ssubo",
            Tag::Usubo => "usubo",
            Tag::Concat => "concat",
            Tag::Read => "read",
            Tag::Ite => "ite",
            Tag::Write => "write",
        }
    }

    /// Meta lines declare structure or properties; they never carry a value of
    /// their own and are skipped when the stepper forces evaluation.
    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            Tag::Sort
                | Tag::Init
                | Tag::Next
                | Tag::Output
                | Tag::Bad
                | Tag::Constraint
                | Tag::Fair
                | Tag::Justice
        )
    }
}

impl FromStr for Tag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let res = match s {
            "sort" => Tag::Sort,
            "input" => Tag::Input,
            "state" => Tag::State,
            "init" => Tag::Init,
            "next" => Tag::Next,
            "output" => Tag::Output,
            "bad" => Tag::Bad,
            "constraint" => Tag::Constraint,
            "fair" => Tag::Fair,
            "justice" => Tag::Justice,
            "const" => Tag::Const,
            "constd" => Tag::Constd,
            "consth" => Tag::Consth,
            "zero" => Tag::Zero,
            "one" => Tag::One,
            "ones" => Tag::Ones,
            "not" => Tag::Not,
            "inc" => Tag::Inc,
            "dec" => Tag::Dec,
            "neg" => Tag::Neg,
            "redand" => Tag::Redand,
            "redor" => Tag::Redor,
            "redxor" => Tag::Redxor,
            "slice" => Tag::Slice,
            "uext" => Tag::Uext,
            "sext" => Tag::Sext,
            "iff" => Tag::Iff,
            "implies" => Tag::Implies,
            "eq" => Tag::Eq,
            "neq" => Tag::Neq,
            "sgt" => Tag::Sgt,
            "ugt" => Tag::Ugt,
            "sgte" => Tag::Sgte,
            "ugte" => Tag::Ugte,
            "slt" => Tag::Slt,
            "ult" => Tag::Ult,
            "slte" => Tag::Slte,
            "ulte" => Tag::Ulte,
            "and" => Tag::And,
            "nand" => Tag::Nand,
            "nor" => Tag::Nor,
            "or" => Tag::Or,
            "xnor" => Tag::Xnor,
            "xor" => Tag::Xor,
            "rol" => Tag::Rol,
            "ror" => Tag::Ror,
            "sll" => Tag::Sll,
            "sra" => Tag::Sra,
            "srl" => Tag::Srl,
            "add" => Tag::Add,
            "mul" => Tag::Mul,
            "sdiv" => Tag::Sdiv,
            "udiv" => Tag::Udiv,
            "smod" => Tag::Smod,
            "srem" => Tag::Srem,
            "urem" => Tag::Urem,
            "sub" => Tag::Sub,
            "saddo" => Tag::Saddo,
            "uaddo" => Tag::Uaddo,
            "sdivo" => Tag::Sdivo,
            "udivo" => Tag::Udivo,
            "smulo" => Tag::Smulo,
            "umulo" => Tag::Umulo,
            "ssubo" => Tag::Ssubo,
            "usubo" => Tag::Usubo,
            "concat" => Tag::Concat,
            "read" => Tag::Read,
            "ite" => Tag::Ite,
            "write" => Tag::Write,
            _ => return Err(()),
        };
        Ok(res)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The declared type of a line's value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Sort {
    BitVec(WidthInt),
    Array {
        index_width: WidthInt,
        data_width: WidthInt,
    },
}

impl Sort {
    pub fn is_bit_vector(&self) -> bool {
        matches!(self, Sort::BitVec(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Sort::Array { .. })
    }

    pub fn bit_vector_width(&self) -> Option<WidthInt> {
        match self {
            Sort::BitVec(width) => Some(*width),
            Sort::Array { .. } => None,
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Sort::BitVec(width) => write!(f, "bv<{width}>"),
            Sort::Array {
                index_width,
                data_width,
            } => write!(f, "bv<{index_width}> -> bv<{data_width}>"),
        }
    }
}

/// One record of the model. Argument ids may be negative to denote bit-wise
/// negation at the reference site.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub tag: Tag,
    pub sort: Option<Sort>,
    pub args: [i64; 3],
    pub nargs: usize,
    pub constant: Option<String>,
    pub symbol: Option<String>,
    pub lineno: u64,
}

/// A parsed btor2 model: lines indexed by id plus the index vectors the
/// stepper and property monitors iterate over.
#[derive(Debug, Default)]
pub struct Model {
    pub name: String,
    lines: Vec<Option<Line>>,
    pub inputs: Vec<LineId>,
    pub states: Vec<LineId>,
    pub bads: Vec<LineId>,
    pub constraints: Vec<LineId>,
    pub justices: Vec<LineId>,
    inits: Vec<Option<LineId>>,
    nexts: Vec<Option<LineId>>,
}

impl Model {
    pub fn max_id(&self) -> LineId {
        self.lines.len().saturating_sub(1)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id)?.as_ref()
    }

    /// The `init` line bound to a state, if any.
    pub fn init_of(&self, state: LineId) -> Option<&Line> {
        let id = (*self.inits.get(state)?)?;
        self.line(id)
    }

    /// The `next` line bound to a state, if any.
    pub fn next_of(&self, state: LineId) -> Option<&Line> {
        let id = (*self.nexts.get(state)?)?;
        self.line(id)
    }

    /// The sort of the value a line observes. Property lines do not declare a
    /// sort of their own; theirs is the sort of their argument.
    pub fn signal_sort(&self, id: LineId) -> Option<Sort> {
        let line = self.line(id)?;
        match line.tag {
            Tag::Output | Tag::Bad | Tag::Constraint | Tag::Fair => {
                self.signal_sort(line.args[0].unsigned_abs() as LineId)
            }
            _ => line.sort,
        }
    }

    fn add_line(&mut self, line: Line) {
        let id = line.id;
        if self.lines.len() <= id {
            self.lines.resize(id + 1, None);
            self.inits.resize(id + 1, None);
            self.nexts.resize(id + 1, None);
        }
        self.lines[id] = Some(line);
    }
}

pub fn parse_str(input: &str, name: Option<&str>) -> Option<Model> {
    match Parser::new().parse(input, name) {
        Ok(model) => Some(model),
        Err(diagnostics) => {
            print_diagnostics(diagnostics, name.unwrap_or("str"), input);
            None
        }
    }
}

pub fn parse_file(filename: &str) -> Option<Model> {
    let path = std::path::Path::new(filename);
    let input = std::fs::read_to_string(path).expect("Failed to open btor file!");
    let backup_name = path.file_stem().and_then(|n| n.to_str());
    match Parser::new().parse(&input, backup_name) {
        Ok(model) => Some(model),
        Err(diagnostics) => {
            print_diagnostics(
                diagnostics,
                path.file_name().unwrap().to_str().unwrap(),
                &input,
            );
            None
        }
    }
}

struct Parser {
    model: Model,
    diagnostics: Diagnostics,
    /// offset of the current line inside the file
    offset: usize,
    /// current line number (1-based)
    lineno: u64,
    /// maps file id to type
    type_map: HashMap<LineId, Sort>,
}

impl Parser {
    fn new() -> Self {
        Parser {
            model: Model::default(),
            diagnostics: Diagnostics::new(),
            offset: 0,
            lineno: 0,
            type_map: HashMap::new(),
        }
    }

    fn parse(&mut self, input: &str, backup_name: Option<&str>) -> Result<Model, Diagnostics> {
        for line in input.lines() {
            self.lineno += 1;
            let _ignore_errors = self.parse_line(line);
            self.offset += line.len() + 1;
        }

        // a better name is often derived from the filename
        if self.model.name.is_empty() {
            if let Some(name) = backup_name {
                self.model.name = name.to_string();
            }
        }

        for &state in self.model.states.iter() {
            if self.model.nexts.get(state).copied().flatten().is_none() {
                log::info!("state {state} without next function");
            }
        }

        if self.diagnostics.is_empty() {
            Ok(std::mem::take(&mut self.model))
        } else {
            Err(std::mem::take(&mut self.diagnostics))
        }
    }

    fn parse_line(&mut self, line: &str) -> ParseLineResult {
        let tokens = line_tokens(line);
        let tokens = tokens.as_slice();
        if tokens.is_empty() {
            // blank or comment-only line
            return Ok(());
        }

        // the first token should be an ID
        let line_id = self.parse_line_id(line, tokens[0])?;
        if self.model.line(line_id).is_some() {
            return self.add_error(line, tokens[0], format!("ID `{line_id}` defined twice."));
        }

        // make sure that there is a second token following the id
        let op: &str = match tokens.get(1) {
            None => {
                return self.add_error(line, tokens[0], "No operation after ID.".to_owned());
            }
            Some(op) => op,
        };

        let tag = match Tag::from_str(op) {
            Ok(tag) => tag,
            Err(()) => return self.unknown_op_error(line, op),
        };

        if UNARY_OPS_SET.contains(op) {
            self.parse_unary_op(line, tokens, line_id, tag)
        } else if BINARY_OPS_SET.contains(op) {
            self.parse_bin_op(line, tokens, line_id, tag)
        } else if TERNARY_OPS_SET.contains(op) {
            self.parse_ternary_op(line, tokens, line_id, tag)
        } else {
            self.expect_tokens(line, tokens, 3)?;
            match tag {
                Tag::Sort => self.parse_sort(line, tokens, line_id),
                Tag::Const | Tag::Constd | Tag::Consth | Tag::Zero | Tag::One | Tag::Ones => {
                    self.parse_format(line, tokens, line_id, tag)
                }
                Tag::State | Tag::Input => self.parse_state_or_input(line, tokens, line_id, tag),
                Tag::Init | Tag::Next => self.parse_init_or_next(line, tokens, line_id, tag),
                Tag::Output | Tag::Bad | Tag::Constraint | Tag::Fair => {
                    self.parse_prop(line, tokens, line_id, tag)
                }
                Tag::Justice => self.parse_justice(line, tokens, line_id),
                other => panic!("unexpected op family for: {other}"),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_line(
        &mut self,
        line_id: LineId,
        tag: Tag,
        sort: Option<Sort>,
        args: [i64; 3],
        nargs: usize,
        constant: Option<String>,
        symbol: Option<&str>,
    ) {
        let line = Line {
            id: line_id,
            tag,
            sort,
            args,
            nargs,
            constant,
            symbol: symbol.map(|s| s.to_string()),
            lineno: self.lineno,
        };
        match tag {
            Tag::Input => self.model.inputs.push(line_id),
            Tag::State => self.model.states.push(line_id),
            Tag::Bad => self.model.bads.push(line_id),
            Tag::Constraint => self.model.constraints.push(line_id),
            Tag::Justice => self.model.justices.push(line_id),
            _ => {}
        }
        self.model.add_line(line);
    }

    fn parse_unary_op(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        self.expect_tokens(line, tokens, 4)?;
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        let (e, e_tpe) = self.get_arg_from_token(line, tokens[3])?;
        let mut args = [e, 0, 0];
        let token_count = match tag {
            Tag::Slice => {
                // slice has two integer attributes
                self.expect_tokens(line, tokens, 6)?;
                let msb = self.parse_width_int(line, tokens[4], "slice msb")?;
                let lsb = self.parse_width_int(line, tokens[5], "slice lsb")?;
                let width = self.expect_bv(line, tokens[3], &e_tpe)?;
                if msb >= width || lsb > msb {
                    return self.add_error(
                        line,
                        tokens[4],
                        format!("Invalid slice [{msb}:{lsb}] of a bit-vector of width {width}"),
                    );
                }
                self.check_type(&tpe, &Sort::BitVec(msb - lsb + 1), line, tokens[2], "slice")?;
                args[1] = msb as i64;
                args[2] = lsb as i64;
                6
            }
            Tag::Uext | Tag::Sext => {
                self.expect_tokens(line, tokens, 5)?;
                let by = self.parse_width_int(line, tokens[4], "extension amount")?;
                let width = self.expect_bv(line, tokens[3], &e_tpe)?;
                self.check_type(&tpe, &Sort::BitVec(width + by), line, tokens[2], tag.name())?;
                args[1] = by as i64;
                5
            }
            Tag::Redand | Tag::Redor | Tag::Redxor => {
                self.expect_bv(line, tokens[3], &e_tpe)?;
                self.check_type(&tpe, &Sort::BitVec(1), line, tokens[2], tag.name())?;
                4
            }
            _ => {
                // not, inc, dec, neg preserve the argument type
                self.expect_bv(line, tokens[3], &e_tpe)?;
                self.check_type(&tpe, &e_tpe, line, tokens[2], tag.name())?;
                4
            }
        };
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            args,
            1,
            None,
            tokens.get(token_count).copied(),
        );
        Ok(())
    }

    fn parse_bin_op(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        self.expect_tokens(line, tokens, 5)?;
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        let (a, a_tpe) = self.get_arg_from_token(line, tokens[3])?;
        let (b, b_tpe) = self.get_arg_from_token(line, tokens[4])?;
        match tag {
            Tag::Iff | Tag::Implies => {
                self.check_type(&a_tpe, &Sort::BitVec(1), line, tokens[3], tag.name())?;
                self.check_type(&b_tpe, &Sort::BitVec(1), line, tokens[4], tag.name())?;
                self.check_type(&tpe, &Sort::BitVec(1), line, tokens[2], tag.name())?;
            }
            Tag::Eq | Tag::Neq => {
                // polymorphic over bit-vectors and arrays
                self.check_type(&a_tpe, &b_tpe, line, tokens[4], tag.name())?;
                self.check_type(&tpe, &Sort::BitVec(1), line, tokens[2], tag.name())?;
            }
            Tag::Sgt
            | Tag::Ugt
            | Tag::Sgte
            | Tag::Ugte
            | Tag::Slt
            | Tag::Ult
            | Tag::Slte
            | Tag::Ulte => {
                self.expect_bv(line, tokens[3], &a_tpe)?;
                self.check_type(&a_tpe, &b_tpe, line, tokens[4], tag.name())?;
                self.check_type(&tpe, &Sort::BitVec(1), line, tokens[2], tag.name())?;
            }
            Tag::Concat => {
                let wa = self.expect_bv(line, tokens[3], &a_tpe)?;
                let wb = self.expect_bv(line, tokens[4], &b_tpe)?;
                self.check_type(&tpe, &Sort::BitVec(wa + wb), line, tokens[2], "concat")?;
            }
            Tag::Read => match a_tpe {
                Sort::Array {
                    index_width,
                    data_width,
                } => {
                    self.check_type(
                        &b_tpe,
                        &Sort::BitVec(index_width),
                        line,
                        tokens[4],
                        "read index",
                    )?;
                    self.check_type(&tpe, &Sort::BitVec(data_width), line, tokens[2], "read")?;
                }
                Sort::BitVec(_) => {
                    return self.add_error(
                        line,
                        tokens[3],
                        "read expects an array as its first argument".to_owned(),
                    );
                }
            },
            _ => {
                // remaining binary ops (incl. recognized-but-unsupported ones)
                // require matching bit-vector operand and result widths
                self.expect_bv(line, tokens[3], &a_tpe)?;
                self.check_type(&a_tpe, &b_tpe, line, tokens[4], tag.name())?;
                self.check_type(&tpe, &a_tpe, line, tokens[2], tag.name())?;
            }
        }
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            [a, b, 0],
            2,
            None,
            tokens.get(5).copied(),
        );
        Ok(())
    }

    fn parse_ternary_op(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        self.expect_tokens(line, tokens, 6)?;
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        let (a, a_tpe) = self.get_arg_from_token(line, tokens[3])?;
        let (b, b_tpe) = self.get_arg_from_token(line, tokens[4])?;
        let (c, c_tpe) = self.get_arg_from_token(line, tokens[5])?;
        match tag {
            Tag::Ite => {
                self.check_type(&a_tpe, &Sort::BitVec(1), line, tokens[3], "ite condition")?;
                self.check_type(&b_tpe, &c_tpe, line, tokens[5], "ite")?;
                self.check_type(&tpe, &b_tpe, line, tokens[2], "ite")?;
            }
            Tag::Write => match a_tpe {
                Sort::Array {
                    index_width,
                    data_width,
                } => {
                    self.check_type(
                        &b_tpe,
                        &Sort::BitVec(index_width),
                        line,
                        tokens[4],
                        "write index",
                    )?;
                    self.check_type(
                        &c_tpe,
                        &Sort::BitVec(data_width),
                        line,
                        tokens[5],
                        "write data",
                    )?;
                    self.check_type(&tpe, &a_tpe, line, tokens[2], "write")?;
                }
                Sort::BitVec(_) => {
                    return self.add_error(
                        line,
                        tokens[3],
                        "write expects an array as its first argument".to_owned(),
                    );
                }
            },
            other => panic!("unexpected ternary op: {other}"),
        }
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            [a, b, c],
            3,
            None,
            tokens.get(6).copied(),
        );
        Ok(())
    }

    fn parse_format(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        // derive width from type
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        let width = self.expect_bv(line, tokens[2], &tpe)?;
        let constant = match tag {
            Tag::Zero | Tag::One | Tag::Ones => None,
            Tag::Const => {
                self.expect_tokens(line, tokens, 4)?;
                let value = tokens[3];
                if value.len() != width as usize || !value.chars().all(|c| c == '0' || c == '1') {
                    return self.add_error(
                        line,
                        tokens[3],
                        format!("Expected a binary constant of width {width}"),
                    );
                }
                Some(value.to_string())
            }
            Tag::Constd | Tag::Consth => {
                self.expect_tokens(line, tokens, 4)?;
                let base = if tag == Tag::Constd { 10 } else { 16 };
                let value = tokens[3];
                let digits = value.strip_prefix('-').unwrap_or(value);
                match BigUint::parse_bytes(digits.as_bytes(), base) {
                    Some(parsed) => {
                        if parsed.bits() > width as u64 {
                            return self.add_error(
                                line,
                                tokens[3],
                                format!(
                                    "Value {value} does not fit into a bit-vector of width {width}"
                                ),
                            );
                        }
                        Some(value.to_string())
                    }
                    None => {
                        return self.add_error(
                            line,
                            tokens[3],
                            format!("Failed to parse as an integer of base {base}"),
                        );
                    }
                }
            }
            other => panic!("Did not expect {other} as a possible format op!"),
        };
        let token_count = if constant.is_some() { 4 } else { 3 };
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            [0, 0, 0],
            0,
            constant,
            tokens.get(token_count).copied(),
        );
        Ok(())
    }

    fn parse_state_or_input(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            [0, 0, 0],
            0,
            None,
            tokens.get(3).copied(),
        );
        let index = if tag == Tag::State {
            self.model.states.len() - 1
        } else {
            self.model.inputs.len() - 1
        };
        match self.model.line(line_id).and_then(|l| l.symbol.as_deref()) {
            Some(symbol) => log::debug!("{tag} {index} '{symbol}' at line {}", self.lineno),
            None => log::debug!("{tag} {index} at line {}", self.lineno),
        }
        Ok(())
    }

    fn parse_init_or_next(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        self.expect_tokens(line, tokens, 5)?;
        let tpe = self.get_tpe_from_id(line, tokens[2])?;
        let (state, state_tpe) = self.get_arg_from_token(line, tokens[3])?;
        if state < 0
            || !matches!(
                self.model.line(state as LineId).map(|l| l.tag),
                Some(Tag::State)
            )
        {
            return self.add_error(
                line,
                tokens[3],
                format!("ID `{}` does not point to a valid state!", tokens[3]),
            );
        }
        let state = state as LineId;
        let (expr, expr_tpe) = self.get_arg_from_token(line, tokens[4])?;
        self.check_type(&state_tpe, &tpe, line, tokens[2], tag.name())?;
        // an array state may be initialized with a bit-vector which is broadcast
        // over all indices
        let broadcast_init = tag == Tag::Init
            && matches!(
                (&state_tpe, &expr_tpe),
                (Sort::Array { data_width, .. }, Sort::BitVec(w)) if data_width == w
            );
        if !broadcast_init {
            self.check_type(&expr_tpe, &tpe, line, tokens[4], tag.name())?;
        }
        self.finish_line(
            line_id,
            tag,
            Some(tpe),
            [state as i64, expr, 0],
            2,
            None,
            tokens.get(5).copied(),
        );
        if tag == Tag::Init {
            self.model.inits[state] = Some(line_id);
        } else {
            self.model.nexts[state] = Some(line_id);
        }
        Ok(())
    }

    fn parse_prop(
        &mut self,
        line: &str,
        tokens: &[&str],
        line_id: LineId,
        tag: Tag,
    ) -> ParseLineResult {
        let (arg, arg_tpe) = self.get_arg_from_token(line, tokens[2])?;
        if matches!(tag, Tag::Bad | Tag::Constraint | Tag::Fair) {
            self.check_type(&arg_tpe, &Sort::BitVec(1), line, tokens[2], tag.name())?;
        }
        self.finish_line(
            line_id,
            tag,
            None,
            [arg, 0, 0],
            1,
            None,
            tokens.get(3).copied(),
        );
        match tag {
            Tag::Bad => log::debug!("bad {} at line {}", self.model.bads.len() - 1, self.lineno),
            Tag::Constraint => log::debug!(
                "constraint {} at line {}",
                self.model.constraints.len() - 1,
                self.lineno
            ),
            _ => {}
        }
        Ok(())
    }

    fn parse_justice(&mut self, line: &str, tokens: &[&str], line_id: LineId) -> ParseLineResult {
        // justice properties are recognized, but never checked
        let _num = self.parse_width_int(line, tokens[2], "justice property count")?;
        self.finish_line(line_id, Tag::Justice, None, [0, 0, 0], 0, None, None);
        Ok(())
    }

    fn parse_sort(&mut self, line: &str, tokens: &[&str], line_id: LineId) -> ParseLineResult {
        self.expect_tokens(line, tokens, 3)?;
        let sort = match tokens[2] {
            "bitvec" => {
                self.expect_tokens(line, tokens, 4)?;
                let width = self.parse_width_int(line, tokens[3], "bit-vector width")?;
                if width == 0 {
                    return self.add_error(
                        line,
                        tokens[3],
                        "Zero-width bit-vectors are not supported.".to_owned(),
                    );
                }
                log::debug!("sort bitvec {width} at line {}", self.lineno);
                Sort::BitVec(width)
            }
            "array" => {
                self.expect_tokens(line, tokens, 5)?;
                let index_tpe = self.get_tpe_from_id(line, tokens[3])?;
                let data_tpe = self.get_tpe_from_id(line, tokens[4])?;
                let index_width = self.expect_bv(line, tokens[3], &index_tpe)?;
                let data_width = self.expect_bv(line, tokens[4], &data_tpe)?;
                log::debug!(
                    "sort array {index_width} {data_width} at line {}",
                    self.lineno
                );
                Sort::Array {
                    index_width,
                    data_width,
                }
            }
            other => {
                return self.add_error(
                    line,
                    tokens[2],
                    format!("Expected `bitvec` or `array`. Not `{other}`."),
                );
            }
        };
        self.type_map.insert(line_id, sort);
        self.finish_line(line_id, Tag::Sort, Some(sort), [0, 0, 0], 0, None, None);
        Ok(())
    }

    fn parse_line_id(&mut self, line: &str, token: &str) -> ParseLineResult<LineId> {
        match token.parse::<LineId>().ok().filter(|id| *id > 0) {
            None => {
                let _ = self.add_error(
                    line,
                    token,
                    "Expected valid positive integer ID.".to_owned(),
                );
                Err(())
            }
            Some(id) => Ok(id),
        }
    }

    /// Parses an argument token. Returns the (possibly negative) id and the sort
    /// of the referenced line. A negated reference requires a bit-vector sorted line.
    fn get_arg_from_token(&mut self, line: &str, token: &str) -> ParseLineResult<(i64, Sort)> {
        let arg = match token.parse::<i64>().ok().filter(|a| *a != 0) {
            None => {
                let _ = self.add_error(
                    line,
                    token,
                    "Expected valid non-zero integer ID.".to_owned(),
                );
                return Err(());
            }
            Some(arg) => arg,
        };
        let id = arg.unsigned_abs() as LineId;
        let tpe = match self.model.line(id) {
            Some(l) if !l.tag.is_meta() => l.sort.unwrap(),
            _ => {
                let _ = self.add_error(
                    line,
                    token,
                    format!("ID `{id}` does not point to a valid signal!"),
                );
                return Err(());
            }
        };
        if arg < 0 && !tpe.is_bit_vector() {
            let _ = self.add_error(
                line,
                token,
                format!("Negation of array-sorted ID `{id}` is not supported."),
            );
            return Err(());
        }
        Ok((arg, tpe))
    }

    fn expect_bv(&mut self, line: &str, token: &str, tpe: &Sort) -> ParseLineResult<WidthInt> {
        match tpe {
            Sort::BitVec(width) => Ok(*width),
            Sort::Array { .. } => {
                let _ = self.add_error(
                    line,
                    token,
                    format!("Points to an array type `{tpe}`, but a bit-vector type is required!"),
                );
                Err(())
            }
        }
    }

    fn check_type(
        &mut self,
        actual: &Sort,
        expected: &Sort,
        line: &str,
        token: &str,
        msg: &str,
    ) -> ParseLineResult {
        if actual == expected {
            Ok(())
        } else {
            self.add_error(line, token, format!("{msg}: {actual} != {expected}"))
        }
    }

    fn get_tpe_from_id(&mut self, line: &str, token: &str) -> ParseLineResult<Sort> {
        let tpe_id = self.parse_line_id(line, token)?;
        match self.type_map.get(&tpe_id) {
            None => {
                let _ = self.add_error(
                    line,
                    token,
                    format!("ID `{tpe_id}` does not point to a valid type!"),
                );
                Err(())
            }
            Some(tpe) => Ok(*tpe),
        }
    }

    fn parse_width_int(&mut self, line: &str, token: &str, kind: &str) -> ParseLineResult<WidthInt> {
        match token.parse::<WidthInt>() {
            Ok(width) => Ok(width),
            Err(_) => {
                let _ = self.add_error(
                    line,
                    token,
                    format!(
                        "Not a valid {kind}. An integer between {} and {} is required!",
                        WidthInt::MIN,
                        WidthInt::MAX
                    ),
                );
                Err(())
            }
        }
    }

    fn add_error(&mut self, line: &str, token: &str, message: String) -> ParseLineResult {
        let start = self.offset + token_offset(token, line);
        self.diagnostics.push(Diagnostic {
            message,
            span: start..start + token.len(),
        });
        Err(())
    }

    /// Fails when the line is shorter than the `n` tokens its operator needs.
    fn expect_tokens(&mut self, line: &str, tokens: &[&str], n: usize) -> ParseLineResult {
        if tokens.len() >= n {
            return Ok(());
        }
        let op = tokens[1];
        self.add_error(
            line,
            op,
            format!("`{op}` needs {n} tokens, this line only has {}", tokens.len()),
        )
    }

    /// Reports an unknown operator name together with the closest known ones.
    fn unknown_op_error(&mut self, line: &str, op: &str) -> ParseLineResult {
        let matcher = fuzzy_matcher::skim::SkimMatcherV2::default();
        let mut scored = Vec::new();
        for family in [
            UNARY_OPS.as_slice(),
            BINARY_OPS.as_slice(),
            TERNARY_OPS.as_slice(),
            OTHER_OPS.as_slice(),
        ] {
            for &candidate in family {
                if let Some(score) = matcher.fuzzy_match(candidate, op) {
                    scored.push((score, candidate));
                }
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let hints = scored
            .iter()
            .take(5)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let msg = if hints.is_empty() {
            format!("`{op}` is not a btor2 operator.")
        } else {
            format!("`{op}` is not a btor2 operator. Closest matches: {hints}")
        };
        self.add_error(line, op, msg)
    }
}

/// The tokens of one btor2 line. A `;` starts a comment that runs to the end
/// of the line; everything before it is split on spaces and tabs.
pub(crate) fn line_tokens(line: &str) -> SmallVec<[&str; 4]> {
    let code = match line.find(';') {
        Some(comment) => &line[..comment],
        None => line,
    };
    code.split_ascii_whitespace().collect()
}

/// A recorded parse problem: a message plus the byte range it refers to,
/// relative to the start of the input.
#[derive(Debug)]
struct Diagnostic {
    message: String,
    span: std::ops::Range<usize>,
}

type Diagnostics = Vec<Diagnostic>;

fn print_diagnostics(diagnostics: Diagnostics, name: &str, source: &str) {
    use codespan_reporting::diagnostic::Label;
    use codespan_reporting::files::SimpleFile;
    use codespan_reporting::term;

    let file = SimpleFile::new(name, source);
    let writer = term::termcolor::StandardStream::stderr(term::termcolor::ColorChoice::Auto);
    let config = term::Config::default();
    for d in diagnostics {
        let rendered = codespan_reporting::diagnostic::Diagnostic::error()
            .with_message(d.message)
            .with_labels(vec![Label::primary((), d.span)]);
        let _ = term::emit(&mut writer.lock(), &config, &file, &rendered);
    }
}

/// Byte offset of a token inside the line it was sliced from.
pub(crate) fn token_offset(token: &str, line: &str) -> usize {
    let offset = token.as_ptr() as usize - line.as_ptr() as usize;
    debug_assert!(offset + token.len() <= line.len());
    offset
}

const UNARY_OPS: [&str; 10] = [
    "not", "inc", "dec", "neg", "redand", "redor", "redxor", "slice", "uext", "sext",
];
const BINARY_OPS: [&str; 41] = [
    "iff", "implies", "sgt", "ugt", "sgte", "ugte", "slt", "ult", "slte", "ulte", "and", "nand",
    "nor", "or", "xnor", "xor", "rol", "ror", "sll", "sra", "srl", "add", "mul", "sdiv", "udiv",
    "smod", "srem", "urem", "sub", "saddo", "uaddo", "sdivo", "udivo", "smulo", "umulo", "ssubo",
    "usubo", "concat", "eq", "neq", "read",
];
const TERNARY_OPS: [&str; 2] = ["ite", "write"];
const OTHER_OPS: [&str; 16] = [
    "sort",
    "input",
    "output",
    "bad",
    "constraint",
    "fair",
    "justice",
    "state",
    "next",
    "init",
    "const",
    "constd",
    "consth",
    "zero",
    "one",
    "ones",
];

lazy_static! {
    static ref UNARY_OPS_SET: std::collections::HashSet<&'static str> =
        std::collections::HashSet::from(UNARY_OPS);
    static ref BINARY_OPS_SET: std::collections::HashSet<&'static str> =
        std::collections::HashSet::from(BINARY_OPS);
    static ref TERNARY_OPS_SET: std::collections::HashSet<&'static str> =
        std::collections::HashSet::from(TERNARY_OPS);
}

/// `Err` carries no payload: the failure has already been recorded as a
/// diagnostic, the line is simply abandoned.
type ParseLineResult<T = ()> = std::result::Result<T, ()>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_tokens_split_on_whitespace_and_comments() {
        assert!(line_tokens("").is_empty());
        assert!(line_tokens("   \t ").is_empty());
        assert!(line_tokens("; a full line comment").is_empty());
        // a realistic operator line, with a negated argument
        let op = line_tokens("7 and 1 5 -6");
        assert_eq!(op.as_slice(), ["7", "and", "1", "5", "-6"]);
        // tabs and repeated spaces separate just like single spaces
        let state = line_tokens("\t3  state 1\tcounter ");
        assert_eq!(state.as_slice(), ["3", "state", "1", "counter"]);
        // a trailing comment may touch the last token
        let sort = line_tokens("1 sort bitvec 4;the word size");
        assert_eq!(sort.as_slice(), ["1", "sort", "bitvec", "4"]);
        // a comment swallows everything behind it, including other semicolons
        let commented = line_tokens("2 zero 1 ; reset value ; really");
        assert_eq!(commented.as_slice(), ["2", "zero", "1"]);
    }

    fn parse_private(code: &str) -> Result<Model, Diagnostics> {
        Parser::new().parse(code, None)
    }

    #[test]
    fn parse_failures() {
        parse_private("").expect("parsing an empty line should be fine");
        parse_private("   ").expect("parsing a line with just whitespace should be fine");
        parse_private("  ; test bla  ").expect("parsing a line with a comment should be fine");
        parse_private("not_an_id").expect_err("invalid id");
        parse_private("-1").expect_err("invalid id");
        parse_private("0").expect_err("invalid id");
        parse_private("1 ").expect_err("missing op");
        parse_private("1 sort bitvec 0").expect_err("zero width");
        parse_private("1 sort bitvec 4\n2 states 1").expect_err("misspelled op");
        parse_private("1 sort bitvec 4\n2 add 1 3 3").expect_err("argument of a later id");
    }

    #[test]
    fn parse_counter() {
        let m = parse_private(
            r#"
1 sort bitvec 4
2 zero 1
3 state 1 c
4 init 1 3 2
5 one 1
6 add 1 3 5
7 next 1 3 6
8 sort bitvec 1
9 constd 1 5
10 eq 8 3 9
11 bad 10
"#,
        )
        .unwrap();
        assert_eq!(m.max_id(), 11);
        assert_eq!(m.states, [3]);
        assert_eq!(m.bads, [11]);
        assert_eq!(m.line(3).unwrap().symbol.as_deref(), Some("c"));
        assert_eq!(m.line(3).unwrap().sort, Some(Sort::BitVec(4)));
        assert_eq!(m.init_of(3).unwrap().id, 4);
        assert_eq!(m.next_of(3).unwrap().id, 7);
        assert_eq!(m.next_of(3).unwrap().args, [3, 6, 0]);
        // the sort of a property is the sort of its argument
        assert_eq!(m.signal_sort(11), Some(Sort::BitVec(1)));
    }

    #[test]
    fn parse_array_model() {
        let m = parse_private(
            r#"
1 sort bitvec 2
2 sort bitvec 8
3 sort array 1 2
4 state 3 m
5 input 1 addr
6 input 2 wdata
7 sort bitvec 1
8 input 7 we
9 write 3 4 5 6
10 ite 3 8 9 4
11 next 3 4 10
12 read 2 4 5
"#,
        )
        .unwrap();
        assert_eq!(
            m.line(4).unwrap().sort,
            Some(Sort::Array {
                index_width: 2,
                data_width: 8
            })
        );
        assert_eq!(m.inputs, [5, 6, 8]);
        assert_eq!(m.next_of(4).unwrap().args[1], 10);
    }

    #[test]
    fn parse_negated_args() {
        let m = parse_private(
            r#"
1 sort bitvec 1
2 input 1 a
3 and 1 2 -2
"#,
        )
        .unwrap();
        assert_eq!(m.line(3).unwrap().args, [2, -2, 0]);
        // negating an array is not allowed
        parse_private(
            r#"
1 sort bitvec 1
2 sort array 1 1
3 state 2 m
4 state 2 n
5 eq 1 3 -4
"#,
        )
        .expect_err("cannot negate an array");
    }
}
