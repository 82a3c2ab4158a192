//! Dump the header of a PICO model file and try to decode it as either a
//! detection cascade or a pupil localizer.

use std::env;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use pico_face::pico::{self, cascade_file_len, localizer_file_len, read_model_bytes};
use pico_face::{CascadeModel, LocalizerModel};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <model[.bz2]>", args[0]);
        std::process::exit(1);
    }

    if let Err(e) = run(Path::new(&args[1])) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(path: &Path) -> pico_face::Result<()> {
    println!("Loading model: {}", path.display());
    let bytes = read_model_bytes(path)?;
    println!("Size: {} bytes", bytes.len());

    println!("\nFirst {} bytes:", bytes.len().min(64));
    for (i, chunk) in bytes[..bytes.len().min(64)].chunks(16).enumerate() {
        print!("{:04x}: ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        print!(" ");
        for b in chunk {
            if *b >= 32 && *b < 127 {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!();
    }

    if bytes.len() >= pico::CASCADE_PREAMBLE_LEN {
        let depth = LittleEndian::read_i32(&bytes[8..12]);
        let count = LittleEndian::read_i32(&bytes[12..16]);
        let expected = u32::try_from(depth)
            .ok()
            .zip(usize::try_from(count).ok())
            .and_then(|(d, n)| cascade_file_len(d, n));
        println!("\nAs cascade: depth {}, trees {}, expected length {:?}", depth, count, expected);
    }

    if bytes.len() >= pico::LOCALIZER_PREAMBLE_LEN {
        let stages = LittleEndian::read_i32(&bytes[0..4]);
        let multiplier = LittleEndian::read_f32(&bytes[4..8]);
        let trees = LittleEndian::read_i32(&bytes[8..12]);
        let depth = LittleEndian::read_i32(&bytes[12..16]);
        let expected = u32::try_from(depth)
            .ok()
            .zip(usize::try_from(stages).ok())
            .zip(usize::try_from(trees).ok())
            .and_then(|((d, s), t)| localizer_file_len(d, s, t));
        println!(
            "As localizer: stages {}, scale multiplier {}, trees/stage {}, depth {}, expected length {:?}",
            stages, multiplier, trees, depth, expected
        );
    }

    println!("\nTrying cascade decode...");
    match CascadeModel::from_pico_bytes(&bytes) {
        Ok(model) => {
            println!("SUCCESS! Cascade loaded:");
            println!("  tree_depth: {}", model.tree_depth());
            println!("  tree_count: {}", model.tree_count());
            if let Some(last) = model.stages().last() {
                println!("  final threshold: {}", last.threshold);
            }
        }
        Err(e) => println!("FAILED: {}", e),
    }

    println!("\nTrying localizer decode...");
    match LocalizerModel::from_pico_bytes(&bytes) {
        Ok(model) => {
            println!("SUCCESS! Localizer loaded:");
            println!("  stages: {}", model.stage_count());
            println!("  trees_per_stage: {}", model.trees_per_stage());
            println!("  tree_depth: {}", model.tree_depth());
            println!("  scale_multiplier: {}", model.scale_multiplier());
        }
        Err(e) => println!("FAILED: {}", e),
    }

    Ok(())
}
