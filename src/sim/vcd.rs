// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::btor2::{LineId, Model, Sort};
use crate::sim::state::StateSlot;
use crate::sim::value::Value;
use baa::{BitVecOps, BitVecValue, WidthInt};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// Identifier alphabet: the printable ASCII characters.
const ID_START: u8 = 33;
const ID_END: u8 = 127;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ClockKind {
    Posedge,
    Negedge,
    Event,
}

/// Side information for the waveform dump: the top module name, clock
/// designations and additional bad state properties to monitor.
#[derive(Debug, Default)]
pub struct InfoFile {
    pub top_name: Option<String>,
    pub clocks: BTreeMap<LineId, ClockKind>,
    pub extra_bads: Vec<(LineId, String)>,
}

/// Reads an info file. Lines that do not parse are reported, not fatal.
pub fn read_info_file(path: &str) -> std::io::Result<InfoFile> {
    let mut out = InfoFile::default();
    let file = BufReader::new(File::open(path)?);
    for (lineno, line_res) in file.lines().enumerate() {
        let line = line_res?;
        let tokens = line.split_ascii_whitespace().collect::<Vec<_>>();
        let ok = match tokens.as_slice() {
            [] => true,
            ["name", name] => {
                debug!("Info file: found top module name: {name}");
                out.top_name = Some(name.to_string());
                true
            }
            ["posedge", id] => parse_clock(id, ClockKind::Posedge, &mut out),
            ["negedge", id] => parse_clock(id, ClockKind::Negedge, &mut out),
            ["event", id] => parse_clock(id, ClockKind::Event, &mut out),
            ["bad", id, symbol] => match id.parse::<LineId>() {
                Ok(id) => {
                    debug!("Info file: found extra bad {id} {symbol}");
                    out.extra_bads.push((id, symbol.to_string()));
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };
        if !ok {
            warn!("Failed to parse line {} in info file: {line}", lineno + 1);
        }
    }
    Ok(out)
}

fn parse_clock(id: &str, kind: ClockKind, out: &mut InfoFile) -> bool {
    match id.parse::<LineId>() {
        Ok(id) => {
            debug!("Info file: found {kind:?} clock {id}");
            out.clocks.insert(id, kind);
            true
        }
        Err(_) => false,
    }
}

/// Accumulates value changes during the simulation and writes the complete
/// value-change-dump at the end of the run.
pub struct VcdWriter {
    out: BufWriter<File>,
    readable: bool,
    hierarchical: bool,
    top_name: String,
    current_id: usize,
    current_step: i64,
    bv_identifiers: BTreeMap<LineId, String>,
    am_identifiers: BTreeMap<(LineId, String), String>,
    value_changes: Vec<String>,
    clocks: BTreeMap<LineId, ClockKind>,
    prev: HashMap<LineId, Value>,
}

impl VcdWriter {
    pub fn new(path: &str, readable: bool, hierarchical: bool) -> std::io::Result<Self> {
        Ok(VcdWriter {
            out: BufWriter::new(File::create(path)?),
            readable,
            hierarchical,
            top_name: "top".to_string(),
            current_id: 0,
            current_step: -1,
            bv_identifiers: BTreeMap::new(),
            am_identifiers: BTreeMap::new(),
            value_changes: Vec::new(),
            clocks: BTreeMap::new(),
            prev: HashMap::new(),
        })
    }

    /// Applies the top module name and clock designations of an info file.
    pub fn apply_info(&mut self, info: &InfoFile) {
        if let Some(name) = info.top_name.as_ref() {
            self.top_name = name.clone();
        }
        self.clocks = info.clocks.clone();
    }

    fn generate_next_identifier(&mut self) -> String {
        let mut rid = self.current_id;
        self.current_id += 1;
        let base = (ID_END - ID_START) as usize;
        let mut out = String::new();
        loop {
            let rem = (rid % base) as u8;
            out.push((ID_START + rem) as char);
            rid /= base;
            if rid == 0 {
                break;
            }
        }
        out
    }

    fn bv_identifier(&mut self, id: LineId) -> String {
        if !self.bv_identifiers.contains_key(&id) {
            let ident = if self.readable {
                format!("n{id}")
            } else {
                self.generate_next_identifier()
            };
            self.bv_identifiers.insert(id, ident);
        }
        self.bv_identifiers[&id].clone()
    }

    fn am_identifier(&mut self, id: LineId, index_bits: &str) -> String {
        let key = (id, bits_to_hex(index_bits));
        if !self.am_identifiers.contains_key(&key) {
            let ident = if self.readable {
                format!("n{id}@{}", key.1)
            } else {
                self.generate_next_identifier()
            };
            self.am_identifiers.insert(key.clone(), ident);
        }
        self.am_identifiers[&key].clone()
    }

    /// Emits the time markers for step `k` (once), toggling clocks half a step
    /// before the rising edge.
    fn update_time(&mut self, k: u64) {
        if self.current_step >= k as i64 {
            return;
        }
        let clocks = self
            .clocks
            .iter()
            .map(|(&id, &kind)| (id, kind))
            .collect::<Vec<_>>();
        if k > 0 {
            self.value_changes.push(format!("#{}", k * 10 - 5));
            for (id, kind) in clocks.iter() {
                match kind {
                    ClockKind::Posedge => {
                        let ident = self.bv_identifier(*id);
                        self.value_changes.push(format!("0{ident}"));
                    }
                    ClockKind::Negedge => {
                        let ident = self.bv_identifier(*id);
                        self.value_changes.push(format!("1{ident}"));
                    }
                    ClockKind::Event => {}
                }
            }
        }
        self.value_changes.push(format!("#{}", k * 10));
        self.current_step = k as i64;
        for (id, kind) in clocks.iter() {
            let ident = self.bv_identifier(*id);
            match kind {
                ClockKind::Posedge | ClockKind::Event => {
                    self.value_changes.push(format!("1{ident}"))
                }
                ClockKind::Negedge => self.value_changes.push(format!("0{ident}")),
            }
        }
    }

    /// Records the value of a named signal at step `k` if it changed.
    pub fn add_value_change(&mut self, k: u64, id: LineId, slot: &StateSlot) {
        if self.clocks.contains_key(&id) {
            return;
        }
        match slot {
            StateSlot::BitVec(Some(value)) => {
                let changed = match self.prev.get(&id) {
                    Some(Value::BitVec(prev)) => !prev.is_equal(value),
                    _ => true,
                };
                if changed {
                    self.update_time(k);
                    let ident = self.bv_identifier(id);
                    self.value_changes.push(format_change(value, &ident));
                    self.prev.insert(id, Value::BitVec(value.clone()));
                }
            }
            StateSlot::Array(Some(value)) => {
                let changed = value
                    .entries()
                    .filter(|(key, element)| match self.prev.get(&id) {
                        Some(Value::Array(prev)) => match prev.entry(key) {
                            Some(p) => !(*p).is_equal(*element),
                            None => true,
                        },
                        _ => true,
                    })
                    .map(|(key, element)| (key.clone(), element.clone()))
                    .collect::<Vec<_>>();
                if !changed.is_empty() {
                    self.update_time(k);
                    for (key, element) in changed.iter() {
                        let ident = self.am_identifier(id, key);
                        self.value_changes.push(format_change(element, &ident));
                    }
                    self.prev.insert(id, Value::Array(value.clone()));
                }
            }
            _ => {
                info!("No current state for named state {id}!");
            }
        }
    }

    /// Writes the header, the module tree and the accumulated value changes.
    pub fn write_vcd(&mut self, model: &Model) -> std::io::Result<()> {
        writeln!(self.out, "$version\n\t Generated by btorsim\n$end")?;
        writeln!(self.out, "$timescale 1ns $end")?;
        let top = self.sort_names(model);
        self.write_node_header(&top)?;
        writeln!(self.out, "$enddefinitions $end")?;
        for change in self.value_changes.iter() {
            writeln!(self.out, "{change}")?;
        }
        self.out.flush()
    }

    /// Builds the module tree from the symbols of all signals with identifiers.
    fn sort_names(&self, model: &Model) -> ModuleTreeNode {
        let mut top = ModuleTreeNode::new(self.top_name.clone());
        for &id in self.bv_identifiers.keys() {
            let Some(symbol) = model.line(id).and_then(|l| l.symbol.as_deref()) else {
                continue;
            };
            let width = model
                .signal_sort(id)
                .and_then(|s| s.bit_vector_width())
                .unwrap_or(1);
            top.sort_name(id, symbol, width, self.hierarchical);
        }
        for (id, _) in self.am_identifiers.keys() {
            let Some(symbol) = model.line(*id).and_then(|l| l.symbol.as_deref()) else {
                continue;
            };
            let width = match model.signal_sort(*id) {
                Some(Sort::Array { data_width, .. }) => data_width,
                _ => 1,
            };
            top.sort_name(*id, symbol, width, self.hierarchical);
        }
        top
    }

    fn write_node_header(&mut self, node: &ModuleTreeNode) -> std::io::Result<()> {
        writeln!(self.out, "$scope module {} $end", node.name)?;
        for (id, (name, width)) in node.wires.iter() {
            if let Some(ident) = self.bv_identifiers.get(id) {
                let tpe = if self.clocks.get(id) == Some(&ClockKind::Event) {
                    "event"
                } else {
                    "wire"
                };
                writeln!(self.out, "$var {tpe} {width} {ident} {name} $end")?;
            } else {
                for ((am_id, index), ident) in self.am_identifiers.iter() {
                    if am_id == id {
                        writeln!(
                            self.out,
                            "$var wire {width} {ident} {name}<{index}> $end"
                        )?;
                    }
                }
            }
        }
        for sub in node.submodules.iter() {
            self.write_node_header(sub)?;
        }
        writeln!(self.out, "$upscope $end")
    }
}

fn format_change(value: &BitVecValue, ident: &str) -> String {
    if value.width() > 1 {
        format!("b{} {ident}", value.to_bit_str())
    } else {
        format!("{}{ident}", value.to_bit_str())
    }
}

/// Converts an index bit string into the hex form used in identifiers and
/// wire names.
fn bits_to_hex(bits: &str) -> String {
    let mut out = Vec::new();
    let mut i = bits.len();
    while i > 0 {
        let start = i.saturating_sub(4);
        let nibble = &bits[start..i];
        let value = u8::from_str_radix(nibble, 2).unwrap();
        out.push(std::char::from_digit(value as u32, 16).unwrap());
        i = start;
    }
    out.iter().rev().collect()
}

struct ModuleTreeNode {
    name: String,
    wires: BTreeMap<LineId, (String, WidthInt)>,
    submodules: Vec<ModuleTreeNode>,
}

impl ModuleTreeNode {
    fn new(name: String) -> Self {
        ModuleTreeNode {
            name,
            wires: BTreeMap::new(),
            submodules: Vec::new(),
        }
    }

    fn sort_name(&mut self, id: LineId, symbol: &str, width: WidthInt, hierarchical: bool) {
        debug_assert!(!symbol.is_empty());
        let offset = if hierarchical && symbol.starts_with('\\') {
            1
        } else {
            0
        };
        let pos = if hierarchical {
            symbol.find('.')
        } else {
            None
        };
        match pos {
            None => {
                self.wires
                    .insert(id, (symbol[offset..].to_string(), width));
            }
            Some(pos) => {
                let module = symbol[offset..pos].to_string();
                let rest = &symbol[pos + 1..];
                if let Some(sub) = self.submodules.iter_mut().find(|m| m.name == module) {
                    sub.sort_name(id, rest, width, hierarchical);
                    return;
                }
                let mut sub = ModuleTreeNode::new(module);
                sub.sort_name(id, rest, width, hierarchical);
                self.submodules.push(sub);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scratch file that is unique per test and per process, so parallel
    /// test runs never collide.
    fn scratch_vcd(test: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("btorsim_{test}_{}.vcd", std::process::id()))
    }

    #[test]
    fn identifier_generation_uses_printable_ascii() {
        let path = scratch_vcd("identifier_generation");
        let mut w = VcdWriter::new(path.to_str().unwrap(), false, false).unwrap();
        assert_eq!(w.generate_next_identifier(), "!");
        assert_eq!(w.generate_next_identifier(), "\"");
        // after 94 identifiers we get two character names
        for _ in 2..94 {
            w.generate_next_identifier();
        }
        assert_eq!(w.generate_next_identifier(), "!\"");
    }

    #[test]
    fn readable_identifiers() {
        let path = scratch_vcd("readable_identifiers");
        let mut w = VcdWriter::new(path.to_str().unwrap(), true, false).unwrap();
        assert_eq!(w.bv_identifier(17), "n17");
        assert_eq!(w.am_identifier(3, "1010"), "n3@a");
    }

    #[test]
    fn hex_conversion() {
        assert_eq!(bits_to_hex("0101"), "5");
        assert_eq!(bits_to_hex("101"), "5");
        assert_eq!(bits_to_hex("11111"), "1f");
        assert_eq!(bits_to_hex("0"), "0");
    }

    #[test]
    fn module_tree_splits_on_dots() {
        let mut top = ModuleTreeNode::new("top".to_string());
        top.sort_name(1, "cpu.alu.result", 8, true);
        top.sort_name(2, "cpu.pc", 32, true);
        top.sort_name(3, "reset", 1, true);
        assert_eq!(top.wires.len(), 1);
        assert_eq!(top.submodules.len(), 1);
        let cpu = &top.submodules[0];
        assert_eq!(cpu.name, "cpu");
        assert_eq!(cpu.wires[&2].0, "pc");
        assert_eq!(cpu.submodules[0].name, "alu");
        assert_eq!(cpu.submodules[0].wires[&1].0, "result");
    }

    #[test]
    fn flat_symbols_keep_dots() {
        let mut top = ModuleTreeNode::new("top".to_string());
        top.sort_name(1, "cpu.pc", 32, false);
        assert_eq!(top.wires[&1].0, "cpu.pc");
        assert!(top.submodules.is_empty());
    }
}
