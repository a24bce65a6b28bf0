/// Implementation of `cwasm decompress`.
///
/// Streams the input file through the async adapter: reads arrive in
/// `--chunk-size` pieces, and output is written as soon as it leaves its
/// enclosing blocks. A one-line summary goes to stderr so stdout carries
/// only the transcoded bytes.
use anyhow::{Context, Result};
use cwasm_interp::{InterpConfig, decompress_stream};
use tokio::io::AsyncWrite;

use crate::DecompressArgs;
use crate::manifest;

/// Run the `cwasm decompress` command.
///
/// # Errors
///
/// Returns an error if the manifest or input cannot be read, the output
/// cannot be written, or the driver fails.
pub fn run(args: &DecompressArgs) -> Result<()> {
    let format = manifest::load(&args.format)?;
    let config = InterpConfig {
        page_size: args.chunk_size.max(1),
        minimize_block_sizes: !args.padded,
        reject_trailing_input: !args.allow_trailing,
        ..InterpConfig::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    let summary = runtime.block_on(async {
        let reader = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("cannot read {}", args.input.display()))?;
        let writer: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
            Some(path) => Box::new(
                tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("cannot write {}", path.display()))?,
            ),
            None => Box::new(tokio::io::stdout()),
        };
        decompress_stream(format, config, reader, writer)
            .await
            .with_context(|| format!("failed to decompress {}", args.input.display()))
    })?;

    eprintln!(
        "Decompressed {} bytes into {} bytes",
        summary.input_bytes, summary.output_bytes
    );
    Ok(())
}
