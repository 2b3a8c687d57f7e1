// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::btor2::{LineId, Model, Sort, Tag};
use crate::sim::state::{StateSlot, StateStore};
use crate::sim::value::*;
use crate::sim::vcd::VcdWriter;
use baa::{BitVecOps, BitVecValue};
use log::{debug, info};
use num_bigint::BigUint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("can not simulate operator '{op}' at line {lineno}")]
    Unsupported { op: &'static str, lineno: u64 },
    #[error("internal error: unexpected empty ID {0}")]
    UnknownId(LineId),
    #[error("bit-wise negation is only defined on bit-vectors (ID {0})")]
    NegatedArray(i64),
    #[error("expected a bit-vector value for ID {0}")]
    ExpectedBitVec(i64),
}

type Result<T> = std::result::Result<T, SimError>;

/// A bad state property monitor: the id of the signal to watch plus the id of
/// the line that declared the property (used in diagnostics).
struct BadProp {
    line_id: LineId,
    signal: i64,
}

/// Interpreter for a btor2 transition system.
///
/// The current state doubles as the evaluator's memoization cache: an id that
/// is present has been evaluated this step. `transition` clears the cache and
/// moves the next state in.
pub struct Simulator<'a> {
    model: &'a Model,
    current: StateStore,
    next: StateStore,
    rng: RandomValueGenerator,
    bads: Vec<BadProp>,
    reached_bads: Vec<Option<u64>>,
    num_unreached_bads: usize,
    constraints_violated: Option<u64>,
    print_trace: bool,
    print_states: bool,
    vcd: Option<VcdWriter>,
}

impl<'a> Simulator<'a> {
    pub fn new(model: &'a Model, seed: u64) -> Self {
        let bads = model
            .bads
            .iter()
            .map(|&id| BadProp {
                line_id: id,
                signal: model.line(id).unwrap().args[0],
            })
            .collect::<Vec<_>>();
        let num_unreached_bads = bads.len();
        let reached_bads = vec![None; bads.len()];
        Simulator {
            model,
            current: StateStore::new(model),
            next: StateStore::new(model),
            rng: RandomValueGenerator::from_seed(seed),
            bads,
            reached_bads,
            num_unreached_bads,
            constraints_violated: None,
            print_trace: true,
            print_states: false,
            vcd: None,
        }
    }

    pub fn set_print_trace(&mut self, on: bool) {
        self.print_trace = on;
    }

    pub fn print_trace(&self) -> bool {
        self.print_trace
    }

    pub fn set_print_states(&mut self, on: bool) {
        self.print_states = on;
    }

    pub fn set_vcd(&mut self, writer: VcdWriter) {
        self.vcd = Some(writer);
    }

    pub fn take_vcd(&mut self) -> Option<VcdWriter> {
        self.vcd.take()
    }

    /// Registers an additional bad state property that watches the value of
    /// `id` directly (declared in an info file rather than the model).
    pub fn add_extra_bad(&mut self, id: LineId, name: &str) {
        debug!("extra bad state property {name} watches id {id}");
        self.bads.push(BadProp {
            line_id: id,
            signal: id as i64,
        });
        self.reached_bads.push(None);
        self.num_unreached_bads += 1;
    }

    pub fn num_bads(&self) -> usize {
        self.bads.len()
    }

    pub fn reached_bads(&self) -> &[Option<u64>] {
        &self.reached_bads
    }

    pub fn constraints_violated(&self) -> Option<u64> {
        self.constraints_violated
    }

    pub fn current_is_set(&self, id: LineId) -> bool {
        self.current.slot(id).is_set()
    }

    pub fn current_bv(&self, id: LineId) -> Option<&BitVecValue> {
        self.current.slot(id).bit_vec()
    }

    pub fn update_current(&mut self, id: LineId, value: Value) {
        self.current.update(id, value);
    }

    /// Mutable access to an array slot, creating an empty model if the slot
    /// has not been set this step. Panics when `id` is not array-sorted.
    pub fn current_array_mut(&mut self, id: LineId) -> &mut ArrayModel {
        let sort = self.model.line(id).and_then(|l| l.sort);
        let Some(Sort::Array {
            index_width,
            data_width,
        }) = sort
        else {
            panic!("ID {id} is not array-sorted")
        };
        match self.current.slot_mut(id) {
            StateSlot::Array(slot) => {
                slot.get_or_insert_with(|| ArrayModel::new(index_width, data_width))
            }
            other => panic!("ID {id} has slot {other:?}, expected an array"),
        }
    }

    /// Evaluates the expression rooted at `id` over the current state. A
    /// negative id evaluates the magnitude and then negates bit-wise. The
    /// caller owns the returned value.
    pub fn simulate(&mut self, id: i64) -> Result<Value> {
        let negate = id < 0;
        let abs = id.unsigned_abs() as LineId;
        self.materialize(abs)?;
        let value = self
            .current
            .slot(abs)
            .value()
            .expect("slot was just materialized");
        if negate {
            match value {
                Value::BitVec(v) => Ok(Value::BitVec(v.not())),
                Value::Array(_) => Err(SimError::NegatedArray(id)),
            }
        } else {
            Ok(value)
        }
    }

    fn simulate_bv(&mut self, id: i64) -> Result<BitVecValue> {
        match self.simulate(id)? {
            Value::BitVec(v) => Ok(v),
            Value::Array(_) => Err(SimError::ExpectedBitVec(id)),
        }
    }

    /// The array argument of read/write/ite/eq; negation is never legal here.
    fn array_arg(&self, arg: i64) -> Result<LineId> {
        if arg < 0 {
            Err(SimError::NegatedArray(arg))
        } else {
            Ok(arg as LineId)
        }
    }

    /// Ensures that `current[id]` holds a value, evaluating the line if
    /// necessary. This is the memoized core of the evaluator.
    fn materialize(&mut self, id: LineId) -> Result<()> {
        if self.current.slot(id).is_set() {
            return Ok(());
        }
        let l = self.model.line(id).ok_or(SimError::UnknownId(id))?;
        let width = || l.sort.and_then(|s| s.bit_vector_width()).unwrap();
        let res: Value = match l.tag {
            // constants take their width from the sort
            Tag::Const => {
                debug_assert_eq!(l.nargs, 0);
                Value::BitVec(BitVecValue::from_bit_str(l.constant.as_deref().unwrap()))
            }
            Tag::Constd => {
                debug_assert_eq!(l.nargs, 0);
                let text = l.constant.as_deref().unwrap();
                let digits = text.strip_prefix('-').unwrap_or(text);
                let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10).unwrap();
                let value = from_biguint(&magnitude, width());
                Value::BitVec(if text.starts_with('-') {
                    value.negate()
                } else {
                    value
                })
            }
            Tag::Consth => {
                debug_assert_eq!(l.nargs, 0);
                let magnitude =
                    BigUint::parse_bytes(l.constant.as_deref().unwrap().as_bytes(), 16).unwrap();
                Value::BitVec(from_biguint(&magnitude, width()))
            }
            Tag::Zero => Value::BitVec(bv_zero(width())),
            Tag::One => Value::BitVec(bv_one(width())),
            Tag::Ones => Value::BitVec(bv_ones(width())),
            // unary bit-vector ops
            Tag::Not => Value::BitVec(self.simulate_bv(l.args[0])?.not()),
            Tag::Neg => Value::BitVec(self.simulate_bv(l.args[0])?.negate()),
            Tag::Inc => {
                let e = self.simulate_bv(l.args[0])?;
                Value::BitVec(e.add(&bv_one(e.width())))
            }
            Tag::Dec => {
                let e = self.simulate_bv(l.args[0])?;
                Value::BitVec(e.sub(&bv_one(e.width())))
            }
            Tag::Redand => Value::BitVec(bv_redand(&self.simulate_bv(l.args[0])?)),
            Tag::Redor => Value::BitVec(bv_redor(&self.simulate_bv(l.args[0])?)),
            Tag::Redxor => Value::BitVec(bv_redxor(&self.simulate_bv(l.args[0])?)),
            Tag::Slice => {
                let e = self.simulate_bv(l.args[0])?;
                let (hi, lo) = (l.args[1] as baa::WidthInt, l.args[2] as baa::WidthInt);
                Value::BitVec(e.slice(hi, lo))
            }
            Tag::Uext => {
                let e = self.simulate_bv(l.args[0])?;
                let padding = width() - e.width();
                Value::BitVec(if padding == 0 {
                    e
                } else {
                    e.zero_extend(padding)
                })
            }
            Tag::Sext => {
                let e = self.simulate_bv(l.args[0])?;
                let padding = width() - e.width();
                Value::BitVec(if padding == 0 {
                    e
                } else {
                    e.sign_extend(padding)
                })
            }
            // binary bit-vector ops
            Tag::Add => self.bin_bv(l, |a, b| a.add(b))?,
            Tag::Sub => self.bin_bv(l, |a, b| a.sub(b))?,
            Tag::Mul => self.bin_bv(l, |a, b| a.mul(b))?,
            Tag::Udiv => self.bin_bv(l, bv_udiv)?,
            Tag::Sdiv => self.bin_bv(l, bv_sdiv)?,
            Tag::Urem => self.bin_bv(l, bv_urem)?,
            Tag::Srem => self.bin_bv(l, bv_srem)?,
            Tag::And => self.bin_bv(l, |a, b| a.and(b))?,
            Tag::Or => self.bin_bv(l, |a, b| a.or(b))?,
            Tag::Xor => self.bin_bv(l, |a, b| a.xor(b))?,
            Tag::Nand => self.bin_bv(l, |a, b| a.and(b).not())?,
            Tag::Nor => self.bin_bv(l, |a, b| a.or(b).not())?,
            Tag::Xnor | Tag::Iff => self.bin_bv(l, |a, b| a.xor(b).not())?,
            Tag::Implies => self.bin_bv(l, |a, b| a.not().or(b))?,
            Tag::Concat => self.bin_bv(l, |a, b| a.concat(b))?,
            Tag::Sll => self.bin_bv(l, |a, b| a.shift_left(b))?,
            Tag::Srl => self.bin_bv(l, |a, b| a.shift_right(b))?,
            Tag::Sra => self.bin_bv(l, |a, b| a.arithmetic_shift_right(b))?,
            // comparisons produce a single bit
            Tag::Ugt => self.cmp_bv(l, |a, b| a.is_greater(b))?,
            Tag::Ugte => self.cmp_bv(l, |a, b| a.is_greater_or_equal(b))?,
            Tag::Ult => self.cmp_bv(l, |a, b| b.is_greater(a))?,
            Tag::Ulte => self.cmp_bv(l, |a, b| b.is_greater_or_equal(a))?,
            Tag::Sgt => self.cmp_bv(l, |a, b| a.is_greater_signed(b))?,
            Tag::Sgte => self.cmp_bv(l, |a, b| a.is_greater_or_equal_signed(b))?,
            Tag::Slt => self.cmp_bv(l, |a, b| b.is_greater_signed(a))?,
            Tag::Slte => self.cmp_bv(l, |a, b| b.is_greater_or_equal_signed(a))?,
            // eq/neq/ite are polymorphic over bit-vectors and arrays
            Tag::Eq | Tag::Neq => {
                debug_assert_eq!(l.nargs, 2);
                let arg_is_array = self
                    .model
                    .signal_sort(l.args[0].unsigned_abs() as LineId)
                    .map(|s| s.is_array())
                    .unwrap_or(false);
                let equal = if arg_is_array {
                    let a = self.array_arg(l.args[0])?;
                    let b = self.array_arg(l.args[1])?;
                    self.materialize(a)?;
                    self.materialize(b)?;
                    self.current.slot(a).array().unwrap() == self.current.slot(b).array().unwrap()
                } else {
                    let a = self.simulate_bv(l.args[0])?;
                    let b = self.simulate_bv(l.args[1])?;
                    a.is_equal(&b)
                };
                Value::BitVec(bv_bool(if l.tag == Tag::Neq { !equal } else { equal }))
            }
            Tag::Ite => {
                debug_assert_eq!(l.nargs, 3);
                let cond = self.simulate_bv(l.args[0])?;
                if l.sort.map(|s| s.is_array()).unwrap_or(false) {
                    let tru = self.array_arg(l.args[1])?;
                    let fals = self.array_arg(l.args[2])?;
                    self.materialize(tru)?;
                    self.materialize(fals)?;
                    let taken = if !cond.is_zero() { tru } else { fals };
                    Value::Array(self.current.slot(taken).array().unwrap().clone())
                } else {
                    let tru = self.simulate_bv(l.args[1])?;
                    let fals = self.simulate_bv(l.args[2])?;
                    Value::BitVec(if !cond.is_zero() { tru } else { fals })
                }
            }
            // array ops
            Tag::Read => {
                debug_assert_eq!(l.nargs, 2);
                let array = self.array_arg(l.args[0])?;
                let index = self.simulate_bv(l.args[1])?;
                self.materialize(array)?;
                // materialize the accessed index in the stored source array so
                // that later equality comparisons observe it
                let element = self
                    .current
                    .slot_mut(array)
                    .array_mut()
                    .unwrap()
                    .read(&index);
                Value::BitVec(element)
            }
            Tag::Write => {
                debug_assert_eq!(l.nargs, 3);
                let array = self.array_arg(l.args[0])?;
                let index = self.simulate_bv(l.args[1])?;
                let data = self.simulate_bv(l.args[2])?;
                self.materialize(array)?;
                Value::Array(self.current.slot(array).array().unwrap().write(&index, &data))
            }
            // everything else is unsupported: rotates, overflow predicates,
            // smod, meta lines and uninitialized states or inputs
            tag => {
                return Err(SimError::Unsupported {
                    op: tag.name(),
                    lineno: l.lineno,
                });
            }
        };
        self.current.update(id, res);
        Ok(())
    }

    fn bin_bv(
        &mut self,
        l: &crate::btor2::Line,
        op: impl Fn(&BitVecValue, &BitVecValue) -> BitVecValue,
    ) -> Result<Value> {
        debug_assert_eq!(l.nargs, 2);
        let a = self.simulate_bv(l.args[0])?;
        let b = self.simulate_bv(l.args[1])?;
        Ok(Value::BitVec(op(&a, &b)))
    }

    fn cmp_bv(
        &mut self,
        l: &crate::btor2::Line,
        op: impl Fn(&BitVecValue, &BitVecValue) -> bool,
    ) -> Result<Value> {
        debug_assert_eq!(l.nargs, 2);
        let a = self.simulate_bv(l.args[0])?;
        let b = self.simulate_bv(l.args[1])?;
        Ok(Value::BitVec(bv_bool(op(&a, &b))))
    }

    /// A fresh value for a state or input that no expression constrains.
    fn unbound_value(&mut self, sort: Sort, randomize: bool) -> Value {
        match sort {
            Sort::BitVec(width) => Value::BitVec(if randomize {
                self.rng.bit_vec(width)
            } else {
                bv_zero(width)
            }),
            Sort::Array {
                index_width,
                data_width,
            } => Value::Array(if randomize {
                let seed = self.rng.array_seed();
                ArrayModel::with_seed(index_width, data_width, seed)
            } else {
                ArrayModel::new(index_width, data_width)
            }),
        }
    }

    /// Assigns the step 0 value of every state that was not set by a witness.
    pub fn initialize_states(&mut self, randomize: bool) -> Result<()> {
        info!("initializing states at #0");
        if self.print_trace {
            println!("#0");
        }
        for i in 0..self.model.states.len() {
            let sid = self.model.states[i];
            if self.current.slot(sid).is_set() {
                continue;
            }
            let state = self.model.line(sid).unwrap();
            let has_init = self.model.init_of(sid).is_some();
            let update = if let Some(init) = self.model.init_of(sid) {
                debug_assert_eq!(init.nargs, 2);
                debug_assert_eq!(init.args[0], sid as i64);
                let expr = init.args[1];
                let value = self.simulate(expr)?;
                match (state.sort.unwrap(), value) {
                    // a bit-vector init of an array state becomes the constant
                    // init element of an otherwise empty array
                    (
                        Sort::Array {
                            index_width,
                            data_width,
                        },
                        Value::BitVec(bv),
                    ) => {
                        let mut am = ArrayModel::new(index_width, data_width);
                        am.set_const_init(bv);
                        Value::Array(am)
                    }
                    (_, value) => value,
                }
            } else {
                self.unbound_value(state.sort.unwrap(), randomize)
            };
            if self.print_trace && !has_init {
                print_assignment(i, &update, state.symbol.as_deref(), '#', 0);
            }
            self.current.update(sid, update);
        }
        Ok(())
    }

    /// Assigns a value to every input that was not set by a witness.
    pub fn initialize_inputs(&mut self, k: u64, randomize: bool) {
        info!("initializing inputs @{k}");
        if self.print_trace {
            println!("@{k}");
        }
        for i in 0..self.model.inputs.len() {
            let iid = self.model.inputs[i];
            if self.current.slot(iid).is_set() {
                continue;
            }
            let input = self.model.line(iid).unwrap();
            let update = self.unbound_value(input.sort.unwrap(), randomize);
            if self.print_trace {
                print_assignment(i, &update, input.symbol.as_deref(), '@', k);
            }
            self.current.update(iid, update);
        }
    }

    /// Evaluates everything, computes the next state and monitors properties.
    pub fn simulate_step(&mut self, k: u64, randomize_unbound_states: bool) -> Result<()> {
        info!("simulating step {k}");
        // force the population of the current state
        for id in 1..=self.model.max_id() {
            let Some(l) = self.model.line(id) else { continue };
            if l.tag.is_meta() {
                continue;
            }
            let _temporary = self.simulate(id as i64)?;
        }

        // compute next state values
        for i in 0..self.model.states.len() {
            let sid = self.model.states[i];
            let state = self.model.line(sid).unwrap();
            let update = if let Some(next) = self.model.next_of(sid) {
                debug_assert_eq!(next.nargs, 2);
                debug_assert_eq!(next.args[0], sid as i64);
                let expr = next.args[1];
                self.simulate(expr)?
            } else {
                self.unbound_value(state.sort.unwrap(), randomize_unbound_states)
            };
            debug_assert!(!self.next.slot(sid).is_set());
            self.next.update(sid, update);
        }

        // constraint monitor
        if self.constraints_violated.is_none() {
            for i in 0..self.model.constraints.len() {
                let cid = self.model.constraints[i];
                let arg = self.model.line(cid).unwrap().args[0];
                let value = self.simulate_bv(arg)?;
                if !bv_is_zero(&value) {
                    continue;
                }
                info!("constraint({i}) '{cid} constraint {arg}' violated at time {k}");
                self.constraints_violated = Some(k);
            }
        }

        // bad state monitor
        if self.constraints_violated.is_none() {
            for i in 0..self.bads.len() {
                if self.reached_bads[i].is_some() {
                    continue;
                }
                let signal = self.bads[i].signal;
                let value = self.simulate_bv(signal)?;
                if bv_is_zero(&value) {
                    continue;
                }
                self.reached_bads[i] = Some(k);
                debug_assert!(self.num_unreached_bads > 0);
                self.num_unreached_bads -= 1;
                if self.num_unreached_bads == 0 {
                    info!("all {} bad state properties reached", self.bads.len());
                }
            }
        }

        // notify the waveform observer of all named values
        if let Some(vcd) = self.vcd.as_mut() {
            let model = self.model;
            let current = &self.current;
            for id in 1..=model.max_id() {
                let Some(l) = model.line(id) else { continue };
                if l.symbol.is_none() {
                    continue;
                }
                let slot = current.slot(id);
                if slot.is_set() {
                    vcd.add_value_change(k, id, slot);
                }
            }
        }
        Ok(())
    }

    /// Starts step `k`: drops all current values and commits the next state.
    pub fn transition(&mut self, k: u64) {
        info!("transition {k}");
        for id in 1..=self.model.max_id() {
            self.current.delete(id);
        }
        if self.print_trace && self.print_states {
            println!("#{k}");
        }
        for i in 0..self.model.states.len() {
            let sid = self.model.states[i];
            let update = self
                .next
                .slot_mut(sid)
                .take()
                .expect("next state must be set before a transition");
            if self.print_trace && self.print_states {
                let symbol = self.model.line(sid).unwrap().symbol.as_deref();
                print_assignment(i, &update, symbol, '#', k);
            }
            self.current.update(sid, update);
        }
    }

    /// Drives all unbound states and inputs with random values for up to
    /// `bound` steps, stopping early when the constraints are violated or all
    /// bad state properties have been reached.
    pub fn random_simulation(&mut self, bound: u64) -> Result<()> {
        info!("starting random simulation up to bound {bound}");
        self.initialize_states(true)?;
        self.initialize_inputs(0, true);
        self.simulate_step(0, true)?;

        for i in 1..=bound {
            if self.constraints_violated.is_some() {
                break;
            }
            if self.num_unreached_bads == 0 {
                break;
            }
            self.transition(i);
            self.initialize_inputs(i, true);
            self.simulate_step(i, true)?;
        }

        if self.print_trace {
            println!(".");
        }
        self.report();
        Ok(())
    }

    /// Verbosity gated summary of the monitor results.
    pub fn report(&self) {
        if self.num_unreached_bads < self.bads.len() {
            let mut reached = String::new();
            for (i, r) in self.reached_bads.iter().enumerate() {
                if let Some(k) = r {
                    reached.push_str(&format!(" b{i}@{k}"));
                }
            }
            info!("reached bad state properties {{{reached} }}");
        } else if !self.bads.is_empty() {
            info!("no bad state property reached");
        }

        if let Some(k) = self.constraints_violated {
            info!("constraints violated at time {k}");
        } else if !self.model.constraints.is_empty() {
            info!("constraints always satisfied");
        }
    }

    /// Diagnostic context for a bad property (its declaring line id).
    pub fn bad_line_id(&self, prop: usize) -> LineId {
        self.bads[prop].line_id
    }
}

/// Prints one trace assignment in the witness format.
fn print_assignment(pos: usize, value: &Value, symbol: Option<&str>, sep: char, k: u64) {
    let suffix = match symbol {
        Some(sym) => format!(" {sym}{sep}{k}"),
        None => String::new(),
    };
    match value {
        Value::BitVec(v) => println!("{pos} {}{suffix}", v.to_bit_str()),
        Value::Array(a) => {
            if let Some(init) = a.const_init() {
                println!("{pos} [*] {}{suffix}", init.to_bit_str());
            }
            for (key, element) in a.entries() {
                println!("{pos} [{key}] {}{suffix}", element.to_bit_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btor2::parse_str;

    fn quiet_sim(model: &Model) -> Simulator<'_> {
        let mut sim = Simulator::new(model, 0);
        sim.set_print_trace(false);
        sim
    }

    #[test]
    fn double_negation_preserves_value() {
        let m = parse_str(
            r#"
1 sort bitvec 1
2 input 1 a
3 not 1 2
4 not 1 3
"#,
            None,
        )
        .unwrap();
        let mut sim = quiet_sim(&m);
        sim.update_current(2, Value::BitVec(BitVecValue::tru()));
        let res = sim.simulate(4).unwrap();
        assert!(!res.as_bit_vec().unwrap().is_zero());
    }

    #[test]
    fn extension_by_zero_is_a_copy() {
        let m = parse_str(
            r#"
1 sort bitvec 4
2 input 1 a
3 uext 1 2 0
4 sext 1 2 0
"#,
            None,
        )
        .unwrap();
        let mut sim = quiet_sim(&m);
        sim.update_current(2, Value::BitVec(BitVecValue::from_u64(9, 4)));
        assert_eq!(
            sim.simulate(3).unwrap().as_bit_vec().unwrap().to_u64().unwrap(),
            9
        );
        assert_eq!(
            sim.simulate(4).unwrap().as_bit_vec().unwrap().to_u64().unwrap(),
            9
        );
    }

    #[test]
    fn negative_ids_negate() {
        let m = parse_str(
            r#"
1 sort bitvec 4
2 input 1 a
3 and 1 2 -2
"#,
            None,
        )
        .unwrap();
        let mut sim = quiet_sim(&m);
        sim.update_current(2, Value::BitVec(BitVecValue::from_u64(0b1100, 4)));
        // a & !a == 0
        let res = sim.simulate(3).unwrap();
        assert!(bv_is_zero(res.as_bit_vec().unwrap()));
    }

    #[test]
    fn memoization_uses_current_state() {
        let m = parse_str(
            r#"
1 sort bitvec 4
2 zero 1
3 state 1 c
4 init 1 3 2
5 one 1
6 add 1 3 5
7 next 1 3 6
"#,
            None,
        )
        .unwrap();
        let mut sim = quiet_sim(&m);
        sim.initialize_states(false).unwrap();
        sim.simulate_step(0, false).unwrap();
        // every non-meta id is materialized after a step
        for id in [2usize, 3, 5, 6] {
            assert!(sim.current_is_set(id), "id {id} must be materialized");
        }
        sim.transition(1);
        assert_eq!(sim.current_bv(3).unwrap().to_u64().unwrap(), 1);
        // the cache was cleared for everything else
        assert!(!sim.current_is_set(6));
    }

    #[test]
    fn unsupported_operator_is_fatal() {
        let m = parse_str(
            r#"
1 sort bitvec 4
2 input 1 a
3 input 1 b
4 rol 1 2 3
"#,
            None,
        )
        .unwrap();
        let mut sim = quiet_sim(&m);
        sim.initialize_inputs(0, false);
        let err = sim.simulate_step(0, false).unwrap_err();
        // the fixture starts with a blank line, so `rol` sits on source line 5
        assert_eq!(
            err.to_string(),
            "can not simulate operator 'rol' at line 5"
        );
    }
}
