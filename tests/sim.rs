// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use baa::BitVecOps;
use btorsim::btor2::parse_str;
use btorsim::sim::Simulator;

/// 4-bit counter that counts from zero and raises its bad state at five.
const COUNTER: &str = r#"
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
"#;

/// Same counter, but the bad state sits behind a constraint that is violated
/// first.
const CONSTRAINED_COUNTER: &str = r#"
1 sort bitvec 4
2 zero 1
3 state 1 c
4 init 1 3 2
5 one 1
6 add 1 3 5
7 next 1 3 6
8 sort bitvec 1
9 constd 1 9
10 eq 8 3 9
11 bad 10
12 constd 1 7
13 neq 8 3 12
14 constraint 13
"#;

#[test]
fn counter_reaches_bad_at_five() {
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    sim.random_simulation(10).unwrap();
    assert_eq!(sim.reached_bads(), [Some(5)]);
    assert_eq!(sim.constraints_violated(), None);
}

#[test]
fn counter_bound_too_small() {
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    sim.random_simulation(3).unwrap();
    assert_eq!(sim.reached_bads(), [None]);
}

#[test]
fn constraint_violation_halts_simulation() {
    let model = parse_str(CONSTRAINED_COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    sim.random_simulation(20).unwrap();
    assert_eq!(sim.constraints_violated(), Some(7));
    // the bad monitor is disabled once the constraints are violated
    assert_eq!(sim.reached_bads(), [None]);
    // the counter never stepped past the violation
    assert_eq!(sim.current_bv(3).unwrap().to_u64().unwrap(), 7);
}

#[test]
fn random_seed_is_reproducible() {
    const FREE_STATE: &str = r#"
1 sort bitvec 16
2 state 1 x
3 input 1 in
"#;
    let model = parse_str(FREE_STATE, Some("free")).unwrap();
    let run = |seed: u64| {
        let mut sim = Simulator::new(&model, seed);
        sim.set_print_trace(false);
        sim.initialize_states(true).unwrap();
        sim.initialize_inputs(0, true);
        sim.simulate_step(0, true).unwrap();
        (
            sim.current_bv(2).unwrap().to_u64().unwrap(),
            sim.current_bv(3).unwrap().to_u64().unwrap(),
        )
    };
    assert_eq!(run(0), run(0));
    assert_eq!(run(42), run(42));
    assert_ne!(run(0), run(1));
}

#[test]
fn zero_init_when_not_randomized() {
    const FREE_STATE: &str = r#"
1 sort bitvec 8
2 state 1 x
3 input 1 in
"#;
    let model = parse_str(FREE_STATE, Some("free")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    sim.initialize_states(false).unwrap();
    sim.initialize_inputs(0, false);
    sim.simulate_step(0, false).unwrap();
    assert_eq!(sim.current_bv(2).unwrap().to_u64().unwrap(), 0);
    assert_eq!(sim.current_bv(3).unwrap().to_u64().unwrap(), 0);
}

#[test]
fn state_with_init_but_no_next_keeps_value_only_at_step_zero() {
    const INIT_ONLY: &str = r#"
1 sort bitvec 4
2 constd 1 9
3 state 1 x
4 init 1 3 2
"#;
    let model = parse_str(INIT_ONLY, Some("init_only")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    sim.initialize_states(false).unwrap();
    sim.simulate_step(0, false).unwrap();
    assert_eq!(sim.current_bv(3).unwrap().to_u64().unwrap(), 9);
    // without a next function the state turns into a zero source
    sim.transition(1);
    sim.simulate_step(1, false).unwrap();
    assert_eq!(sim.current_bv(3).unwrap().to_u64().unwrap(), 0);
}
