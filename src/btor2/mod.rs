// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
mod parse;
mod witness;

pub use parse::{parse_file, parse_str, Line, LineId, Model, Sort, Tag};
pub use witness::{Assignment, Frame, WitnessError, WitnessIndex, WitnessReader};
