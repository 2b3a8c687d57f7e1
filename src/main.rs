// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use btorsim::btor2::{self, Model};
use btorsim::sim::{check_witnesses, read_info_file, InfoFile, Simulator, VcdWriter};
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, Read};

#[derive(Parser, Debug)]
#[command(name = "btorsim")]
#[command(author = "Kevin Laeufer <laeufer@cornell.edu>")]
#[command(version)]
#[command(about = "Simulates a btor2 transition system, either with random inputs \
or by replaying a witness trace.", long_about = None)]
struct Args {
    /// check only the witness and do not print the trace
    #[arg(short = 'c')]
    check_only: bool,
    /// increase verbosity level (multiple times if necessary)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbosity: u8,
    /// generate <N> random transitions
    #[arg(short = 'r', value_name = "N")]
    random_steps: Option<u64>,
    /// random seed
    #[arg(short = 's', value_name = "S")]
    seed: Option<u64>,
    /// fake simulation to satisfy bad state property 'b<N>'
    #[arg(short = 'b', value_name = "N")]
    fake_bad: Option<usize>,
    /// fake simulation to satisfy justice property 'j<N>'
    #[arg(short = 'j', value_name = "N")]
    fake_justice: Option<usize>,
    /// print all states
    #[arg(long)]
    states: bool,
    /// dump a waveform trace to FILE
    #[arg(long, value_name = "FILE")]
    vcd: Option<String>,
    /// split symbols on '.' into a module hierarchy in the VCD
    #[arg(long)]
    hierarchical_symbols: bool,
    /// read top module name, clocks and extra bad properties from FILE
    #[arg(long, value_name = "FILE")]
    info: Option<String>,
    #[arg(value_name = "BTOR2", index = 1)]
    model: Option<String>,
    #[arg(value_name = "WITNESS", index = 2)]
    witness: Option<String>,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    if let Err(msg) = run(&args) {
        eprintln!("*** 'btorsim' error: {msg}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let checking_mode = args.model.is_some() && args.witness.is_some();
    if checking_mode {
        log::info!("checking mode: both model and witness specified");
        if args.random_steps.is_some() {
            return Err("number of random test vectors specified in checking mode".to_string());
        }
        if args.seed.is_some() {
            return Err("random seed specified in checking mode".to_string());
        }
        if args.fake_bad.is_some() {
            return Err("can not fake bad state property in checking mode".to_string());
        }
        if args.fake_justice.is_some() {
            return Err("can not fake justice property in checking mode".to_string());
        }
    } else {
        log::info!("random mode: witness not specified");
    }

    let model = load_model(args.model.as_deref())?;

    let info = match args.info.as_deref() {
        Some(path) => {
            read_info_file(path).map_err(|e| format!("can not read info file '{path}': {e}"))?
        }
        None => InfoFile::default(),
    };

    if let Some(fake_bad) = args.fake_bad {
        if fake_bad >= model.bads.len() {
            return Err(format!("invalid faked bad state property number {fake_bad}"));
        }
    }
    if let Some(fake_justice) = args.fake_justice {
        if fake_justice >= model.justices.len() {
            return Err(format!("invalid faked justice property number {fake_justice}"));
        }
    }

    let seed = args.seed.unwrap_or(0);
    let mut sim = Simulator::new(&model, seed);
    sim.set_print_trace(!args.check_only);
    sim.set_print_states(args.states);

    for (id, name) in info.extra_bads.iter() {
        if model.line(*id).is_none() {
            return Err(format!("invalid extra bad state property id {id}"));
        }
        sim.add_extra_bad(*id, name);
    }

    if let Some(path) = args.vcd.as_deref() {
        let mut writer = VcdWriter::new(path, false, args.hierarchical_symbols)
            .map_err(|e| format!("can not open VCD file '{path}' for writing: {e}"))?;
        writer.apply_info(&info);
        sim.set_vcd(writer);
    }

    if checking_mode {
        let path = args.witness.as_deref().unwrap();
        log::info!("reading BTOR witness from '{path}'");
        let file =
            File::open(path).map_err(|_| format!("failed to open witness file '{path}' for reading"))?;
        check_witnesses(&model, &mut sim, BufReader::new(file), path)
            .map_err(|e| e.to_string())?;
    } else {
        let bound = args.random_steps.unwrap_or(20);
        log::info!("using random seed {seed}");
        if !args.check_only {
            match (args.fake_bad, args.fake_justice) {
                (Some(b), Some(j)) => println!("sat\nb{b} j{j}"),
                (Some(b), None) => println!("sat\nb{b}"),
                (None, Some(j)) => println!("sat\nj{j}"),
                (None, None) => {}
            }
        }
        sim.random_simulation(bound).map_err(|e| e.to_string())?;
    }

    if let Some(mut writer) = sim.take_vcd() {
        writer
            .write_vcd(&model)
            .map_err(|e| format!("failed to write VCD file: {e}"))?;
    }
    Ok(())
}

fn load_model(path: Option<&str>) -> Result<Model, String> {
    match path {
        Some(path) => {
            log::info!("reading BTOR model from '{path}'");
            let input = std::fs::read_to_string(path)
                .map_err(|_| format!("failed to open BTOR model file '{path}' for reading"))?;
            let name = std::path::Path::new(path)
                .file_stem()
                .and_then(|n| n.to_str());
            btor2::parse_str(&input, name).ok_or_else(|| format!("parse error in '{path}'"))
        }
        None => {
            log::info!("reading BTOR model from '<stdin>'");
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| format!("failed to read model from '<stdin>': {e}"))?;
            btor2::parse_str(&input, Some("<stdin>")).ok_or_else(|| "parse error in '<stdin>'".to_string())
        }
    }
}
