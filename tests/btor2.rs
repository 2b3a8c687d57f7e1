// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use btorsim::btor2::{parse_str, Sort, Tag};

const PICOREG: &str = r#"
1 sort bitvec 1
2 sort bitvec 32
3 input 2 data_in
4 input 1 enable
5 state 2 register
6 ite 2 4 3 5
7 next 2 5 6
8 output 5 data_out
"#;

#[test]
fn parse_picoreg() {
    let model = parse_str(PICOREG, Some("picoreg")).unwrap();
    assert_eq!(model.name, "picoreg");
    assert_eq!(model.inputs, [3, 4]);
    assert_eq!(model.states, [5]);
    assert!(model.bads.is_empty());
    assert!(model.init_of(5).is_none());
    let next = model.next_of(5).unwrap();
    assert_eq!(next.tag, Tag::Next);
    assert_eq!(next.args[1], 6);
    assert_eq!(model.line(6).unwrap().sort, Some(Sort::BitVec(32)));
}

#[test]
fn parse_rejects_bad_references() {
    // argument points at the sort line
    assert!(parse_str("1 sort bitvec 4\n2 not 1 1", None).is_none());
    // argument id never defined
    assert!(parse_str("1 sort bitvec 4\n2 not 1 7", None).is_none());
    // width mismatch between declared sort and operation
    assert!(parse_str("1 sort bitvec 4\n2 sort bitvec 3\n3 input 1 a\n4 not 2 3", None).is_none());
}

#[test]
fn parse_slice_bounds() {
    let model = parse_str(
        "1 sort bitvec 8\n2 input 1 a\n3 sort bitvec 4\n4 slice 3 2 6 3",
        None,
    )
    .unwrap();
    let slice = model.line(4).unwrap();
    assert_eq!(slice.tag, Tag::Slice);
    assert_eq!(slice.args, [2, 6, 3]);
    // out of range slice is rejected
    assert!(parse_str(
        "1 sort bitvec 8\n2 input 1 a\n3 sort bitvec 4\n4 slice 3 2 8 5",
        None
    )
    .is_none());
}

#[test]
fn justice_is_recognized_but_inert() {
    let model = parse_str(
        "1 sort bitvec 1\n2 input 1 a\n3 justice 1 2",
        Some("justice"),
    )
    .unwrap();
    assert_eq!(model.justices, [3]);
}
