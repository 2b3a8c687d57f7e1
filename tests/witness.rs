// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use baa::BitVecOps;
use btorsim::btor2::parse_str;
use btorsim::sim::{check_witnesses, Simulator, VcdWriter};

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

/// Memory with a write port and a combinational read for the replayed address.
const MEMORY: &str = r#"
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
13 output 12 rdata
"#;

const COUNTER_WITNESS: &str = "sat
b0
#0
0 0000 c#0
@0
#1
0 0001 c#1
@1
#2
0 0010 c#2
@2
#3
0 0011 c#3
@3
#4
0 0100 c#4
@4
#5
0 0101 c#5
@5
.
";

#[test]
fn witness_replay_happy_path() {
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    check_witnesses(&model, &mut sim, COUNTER_WITNESS.as_bytes(), "counter.wit").unwrap();
    assert_eq!(sim.reached_bads(), [Some(5)]);
}

#[test]
fn witness_conflict_is_fatal() {
    let conflicting = COUNTER_WITNESS.replace("0 0011 c#3", "0 1111 c#3");
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    let err = check_witnesses(&model, &mut sim, conflicting.as_bytes(), "counter.wit")
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("incompatible assignment for state 0 id 3 in time frame 3"));
}

#[test]
fn witness_init_conflict_is_fatal() {
    let conflicting = COUNTER_WITNESS.replace("0 0000 c#0", "0 0001 c#0");
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    let err = check_witnesses(&model, &mut sim, conflicting.as_bytes(), "counter.wit")
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("incompatible initialized state 0 id 3"));
}

#[test]
fn witness_wrong_width_is_fatal() {
    let bad_width = COUNTER_WITNESS.replace("0 0010 c#2", "0 010 c#2");
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    let err = check_witnesses(&model, &mut sim, bad_width.as_bytes(), "counter.wit").unwrap_err();
    assert!(err.to_string().contains("expected constant of width '4'"));
}

#[test]
fn claimed_bad_must_be_reached() {
    // stop the trace before the bad state fires
    let truncated = "sat\nb0\n#0\n0 0000 c#0\n@0\n#1\n0 0001 c#1\n@1\n.\n";
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    let err = check_witnesses(&model, &mut sim, truncated.as_bytes(), "counter.wit").unwrap_err();
    assert_eq!(
        err.to_string(),
        "claimed bad state property 'b0' id 11 not reached"
    );
}

#[test]
fn second_witness_is_fatal() {
    let two = format!("{COUNTER_WITNESS}{COUNTER_WITNESS}");
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    let err = check_witnesses(&model, &mut sim, two.as_bytes(), "counter.wit").unwrap_err();
    assert_eq!(
        err.to_string(),
        "more than one actual witness not supported yet"
    );
}

#[test]
fn array_write_read_round_trip() {
    // step 0 writes m[01] = 0xaa, step 1 reads it back through the output
    let witness = "#0
@0
0 01 addr@0
1 10101010 wdata@0
2 1 we@0
@1
0 01 addr@1
1 00000000 wdata@1
2 0 we@1
.
";
    let model = parse_str(MEMORY, Some("memory")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    check_witnesses(&model, &mut sim, witness.as_bytes(), "memory.wit").unwrap();
    assert_eq!(sim.current_bv(12).unwrap().to_u64().unwrap(), 0xaa);
}

#[test]
fn array_state_assignment_constrains_one_index() {
    // the witness pins m[10] at step 0 and the model reads it back at step 1
    let witness = "#0
0 [10] 11111111 m#0
@0
0 10 addr@0
1 00000000 wdata@0
2 0 we@0
@1
0 10 addr@1
1 00000000 wdata@1
2 0 we@1
.
";
    let model = parse_str(MEMORY, Some("memory")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    check_witnesses(&model, &mut sim, witness.as_bytes(), "memory.wit").unwrap();
    assert_eq!(sim.current_bv(12).unwrap().to_u64().unwrap(), 0xff);
}

#[test]
fn array_assignment_without_brackets_means_all_indices() {
    let witness = "#0
0 01000010 m#0
@0
0 11 addr@0
1 00000000 wdata@0
2 0 we@0
.
";
    let model = parse_str(MEMORY, Some("memory")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    check_witnesses(&model, &mut sim, witness.as_bytes(), "memory.wit").unwrap();
    // the read at an arbitrary address yields the constant init element
    assert_eq!(sim.current_bv(12).unwrap().to_u64().unwrap(), 0x42);
}

#[test]
fn vcd_emission_for_counter() {
    let model = parse_str(COUNTER, Some("counter")).unwrap();
    let mut sim = Simulator::new(&model, 0);
    sim.set_print_trace(false);
    // unique per process so parallel test runs do not race on the file
    let path = std::env::temp_dir().join(format!(
        "btorsim_counter_emission_{}.vcd",
        std::process::id()
    ));
    let writer = VcdWriter::new(path.to_str().unwrap(), false, false).unwrap();
    sim.set_vcd(writer);
    sim.random_simulation(10).unwrap();
    let mut writer = sim.take_vcd().unwrap();
    writer.write_vcd(&model).unwrap();

    let vcd = std::fs::read_to_string(&path).unwrap();
    assert!(vcd.contains("$timescale 1ns $end"));
    // `c` is the only named signal, so it gets the first identifier
    assert!(vcd.contains("$var wire 4 ! c $end"));
    // counter value 5 shows up at time 50
    assert!(vcd.contains("#50\nb0101 !"));
    assert!(vcd.contains("$scope module top $end"));
    assert!(vcd.contains("$enddefinitions $end"));
}
