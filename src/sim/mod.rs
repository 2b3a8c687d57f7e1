// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
mod check;
mod engine;
mod state;
mod value;
mod vcd;

pub use check::{check_witnesses, CheckError};
pub use engine::{SimError, Simulator};
pub use state::{StateSlot, StateStore};
pub use value::{ArrayModel, RandomValueGenerator, Value};
pub use vcd::{read_info_file, ClockKind, InfoFile, VcdWriter};
