// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::btor2::{Assignment, Frame, Model, Sort, WitnessError, WitnessIndex, WitnessReader};
use crate::sim::engine::{SimError, Simulator};
use crate::sim::value::Value;
use baa::{BitVecOps, BitVecValue};
use log::{debug, info};
use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Witness(#[from] WitnessError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("{0}")]
    Fatal(String),
}

type Result<T> = std::result::Result<T, CheckError>;

/// Replays every witness in `input` against the model, validating state and
/// input assignments and re-running the simulation for each frame.
pub fn check_witnesses(
    model: &Model,
    sim: &mut Simulator,
    input: impl BufRead,
    path: &str,
) -> Result<()> {
    let mut reader = WitnessReader::new(input, path);
    while let Some(claims) = reader.next_witness()? {
        if reader.witness_count() > 1 {
            return Err(CheckError::Fatal(
                "more than one actual witness not supported yet".to_string(),
            ));
        }
        for &claim in claims.iter() {
            if claim >= sim.num_bads() {
                return Err(CheckError::Fatal(format!(
                    "invalid bad state property number {claim}"
                )));
            }
        }
        check_one_witness(model, sim, &mut reader, &claims, path)?;
    }
    info!("finished parsing {} witnesses", reader.witness_count());
    Ok(())
}

fn check_one_witness(
    model: &Model,
    sim: &mut Simulator,
    reader: &mut WitnessReader<impl BufRead>,
    claims: &[usize],
    path: &str,
) -> Result<()> {
    let mut k = 0u64;
    loop {
        let frame = reader.next_frame(k)?;
        apply_frame(model, sim, &frame, path)?;
        if reader.end_of_witness() {
            break;
        }
        k += 1;
    }
    info!("finished parsing k = {k} frames");

    sim.report();
    if sim.print_trace() {
        println!(".");
    }

    for &claim in claims.iter() {
        if sim.reached_bads()[claim].is_none() {
            return Err(CheckError::Fatal(format!(
                "claimed bad state property 'b{claim}' id {} not reached",
                sim.bad_line_id(claim)
            )));
        }
    }
    Ok(())
}

fn apply_frame(model: &Model, sim: &mut Simulator, frame: &Frame, path: &str) -> Result<()> {
    let k = frame.step;
    if k > 0 {
        sim.transition(k);
    }
    debug!("parsing frame {k}");
    for assignment in frame.states.iter() {
        apply_state_assignment(model, sim, assignment, k, path)?;
    }
    for assignment in frame.inputs.iter() {
        apply_input_assignment(model, sim, assignment, k, path)?;
    }
    if k == 0 {
        sim.initialize_states(false)?;
    }
    sim.initialize_inputs(k, false);
    sim.simulate_step(k, false)?;
    Ok(())
}

fn parse_error<T>(path: &str, line: u64, col: usize, msg: String) -> Result<T> {
    Err(CheckError::Witness(WitnessError::Parse {
        path: path.to_string(),
        line,
        col,
        msg,
    }))
}

fn apply_state_assignment(
    model: &Model,
    sim: &mut Simulator,
    a: &Assignment,
    k: u64,
    path: &str,
) -> Result<()> {
    if a.pos >= model.states.len() {
        return parse_error(
            path,
            a.line,
            1,
            format!("less than {} states defined", a.pos),
        );
    }
    let sid = model.states[a.pos];
    let state = model.line(sid).unwrap();
    let has_init = model.init_of(sid).is_some();
    let has_next = model.next_of(sid).is_some();

    match state.sort.unwrap() {
        Sort::BitVec(width) => {
            if a.index.is_some() {
                return parse_error(
                    path,
                    a.line,
                    a.index_col,
                    format!("state {} is not an array", a.pos),
                );
            }
            if a.value.len() != width as usize {
                return parse_error(
                    path,
                    a.line,
                    a.value_col,
                    format!("expected constant of width '{width}'"),
                );
            }
            let value = BitVecValue::from_bit_str(&a.value);
            // the initial assignment has to agree with the init expression
            if k == 0 && has_init && has_next {
                let init = model.init_of(sid).unwrap();
                let expected = sim.simulate(init.args[1])?;
                if !value.is_equal(expected.as_bit_vec().unwrap()) {
                    return parse_error(
                        path,
                        a.line,
                        1,
                        format!("incompatible initialized state {} id {sid}", a.pos),
                    );
                }
            }
            // later assignments have to agree with the committed transition value
            if k > 0 && has_next {
                let committed = sim
                    .current_bv(sid)
                    .expect("transition committed a value for every state with a next");
                if !value.is_equal(committed) {
                    return parse_error(
                        path,
                        a.line,
                        1,
                        format!(
                            "incompatible assignment for state {} id {sid} in time frame {k}",
                            a.pos
                        ),
                    );
                }
            }
            sim.update_current(sid, Value::BitVec(value));
        }
        Sort::Array {
            index_width,
            data_width,
        } => {
            if a.value.len() != data_width as usize {
                return parse_error(
                    path,
                    a.line,
                    a.value_col,
                    format!("expected constant of width '{data_width}'"),
                );
            }
            let index = match &a.index {
                // a missing bracket group means all indices
                None | Some(WitnessIndex::All) => None,
                Some(WitnessIndex::Bits(bits)) => {
                    if bits.len() != index_width as usize {
                        return parse_error(
                            path,
                            a.line,
                            a.index_col,
                            format!("expected index of width '{index_width}'"),
                        );
                    }
                    Some(BitVecValue::from_bit_str(bits))
                }
            };
            let value = BitVecValue::from_bit_str(&a.value);

            // an assignment constrains one index (or the constant init) and is
            // cross-checked against the evaluated init expression
            if k == 0 && has_init && has_next {
                let init = model.init_of(sid).unwrap();
                let expected = sim.simulate(init.args[1])?;
                let mismatch = match (&expected, &index) {
                    (Value::BitVec(bv), _) => !value.is_equal(bv),
                    (Value::Array(am), Some(idx)) => match am.check(idx) {
                        Some(e) => !value.is_equal(&e),
                        None => false,
                    },
                    (Value::Array(am), None) => match am.const_init() {
                        Some(e) => !value.is_equal(e),
                        None => false,
                    },
                };
                if mismatch {
                    return parse_error(
                        path,
                        a.line,
                        1,
                        format!("incompatible initialized state {} id {sid}", a.pos),
                    );
                }
            }

            // check against what the array is already committed to, then store;
            // at k > 0 the slot holds the value committed by the transition
            let array = sim.current_array_mut(sid);
            match index {
                Some(idx) => {
                    if let Some(committed) = array.check(&idx) {
                        if !value.is_equal(&committed) {
                            return parse_error(
                                path,
                                a.line,
                                1,
                                format!(
                                    "incompatible assignment for state {} id {sid} in time frame {k}",
                                    a.pos
                                ),
                            );
                        }
                    }
                    array.store(&idx, value);
                }
                None => {
                    if let Some(existing) = array.const_init() {
                        if !value.is_equal(existing) {
                            return parse_error(
                                path,
                                a.line,
                                1,
                                format!(
                                    "incompatible assignment for state {} id {sid} in time frame {k}",
                                    a.pos
                                ),
                            );
                        }
                    }
                    array.set_const_init(value);
                }
            }
        }
    }
    Ok(())
}

fn apply_input_assignment(
    model: &Model,
    sim: &mut Simulator,
    a: &Assignment,
    k: u64,
    path: &str,
) -> Result<()> {
    if a.pos >= model.inputs.len() {
        return parse_error(
            path,
            a.line,
            1,
            format!("less than {} inputs defined", a.pos),
        );
    }
    let iid = model.inputs[a.pos];
    let input = model.line(iid).unwrap();

    match input.sort.unwrap() {
        Sort::BitVec(width) => {
            if a.index.is_some() {
                return parse_error(
                    path,
                    a.line,
                    a.index_col,
                    format!("input {} is not an array", a.pos),
                );
            }
            if a.value.len() != width as usize {
                return parse_error(
                    path,
                    a.line,
                    a.value_col,
                    format!("expected constant of width '{width}'"),
                );
            }
            if sim.current_is_set(iid) {
                return parse_error(
                    path,
                    a.line,
                    1,
                    format!("input {} id {iid} assigned twice in frame {k}", a.pos),
                );
            }
            sim.update_current(iid, Value::BitVec(BitVecValue::from_bit_str(&a.value)));
        }
        Sort::Array {
            index_width,
            data_width,
        } => {
            if a.value.len() != data_width as usize {
                return parse_error(
                    path,
                    a.line,
                    a.value_col,
                    format!("expected constant of width '{data_width}'"),
                );
            }
            let value = BitVecValue::from_bit_str(&a.value);
            let array = sim.current_array_mut(iid);
            match &a.index {
                None | Some(WitnessIndex::All) => array.set_const_init(value),
                Some(WitnessIndex::Bits(bits)) => {
                    if bits.len() != index_width as usize {
                        return parse_error(
                            path,
                            a.line,
                            a.index_col,
                            format!("expected index of width '{index_width}'"),
                        );
                    }
                    array.store(&BitVecValue::from_bit_str(bits), value);
                }
            }
        }
    }
    Ok(())
}
