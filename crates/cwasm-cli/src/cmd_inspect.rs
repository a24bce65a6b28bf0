/// Implementation of `cwasm inspect`.
///
/// Runs the format over the whole input with value collection on and
/// prints one line per transcoded value.
///
/// # Output format
///
/// ```text
/// Format: 5 nodes, depth 4
///  address  kind             value
///        1  varuint32        2
///        2  varuint32        129
///        4  uint32           1
/// ---
/// 3 values, 13 input bytes, 13 output bytes, 4 resumes
/// ```
use std::fs;

use anyhow::{Context, Result};
use cwasm_interp::{InterpConfig, decompress_chunks};

use crate::InspectArgs;
use crate::manifest;

/// Run the `cwasm inspect` command.
///
/// # Errors
///
/// Returns an error if the manifest or input cannot be read, or the driver
/// fails.
pub fn run(args: &InspectArgs) -> Result<()> {
    let format = manifest::load(&args.format)?;
    let bytes =
        fs::read(&args.input).with_context(|| format!("cannot read {}", args.input.display()))?;

    println!("Format: {} nodes, depth {}", format.len(), format.depth());

    let config = InterpConfig {
        collect_values: true,
        ..InterpConfig::default()
    };
    let chunk_size = args.chunk_size.unwrap_or(bytes.len()).max(1);
    let transcript = decompress_chunks(format, config, bytes.chunks(chunk_size))
        .with_context(|| format!("failed to decode {}", args.input.display()))?;

    println!("{:>8}  {:<16} value", "address", "kind");
    for value in &transcript.values {
        println!("{value}");
    }

    if args.show_hex {
        println!("---");
        for (i, chunk) in transcript.output.chunks(16).enumerate() {
            println!("{:04x}  {}", i * 16, hex::encode(chunk));
        }
    }

    println!("---");
    println!(
        "{} values, {} input bytes, {} output bytes, {} resumes",
        transcript.values.len(),
        bytes.len(),
        transcript.output.len(),
        transcript.resumes
    );
    Ok(())
}
