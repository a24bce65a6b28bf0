use std::sync::Arc;

use cwasm_format::Format;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::InterpConfig;
use crate::driver::Decompressor;
use crate::error::{InterpError, StreamingError};
use crate::state::{DecodedValue, ResumeOutcome};

/// Totals for one [`decompress_stream`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Only populated with `collect_values`.
    pub values: Vec<DecodedValue>,
}

/// Everything [`decompress_chunks`] produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    pub output: Vec<u8>,
    pub values: Vec<DecodedValue>,
    /// Number of `resume()` calls it took.
    pub resumes: usize,
}

/// Drive a decompressor from an async reader into an async writer.
///
/// Input is read in `page_size` pieces whenever the driver asks for more,
/// and a zero-length read closes the input. Drainable output is written
/// out before every read and whenever the driver reports output, so the
/// writer sees bytes as soon as their enclosing blocks are patched.
///
/// ```text
///   reader ──read──▶ supply_input ──▶ resume() ──▶ drain ──write_all──▶ writer
///      ▲                                 │
///      └─────────── NeedInput ◀──────────┘
/// ```
///
/// # Errors
///
/// [`StreamingError::Interp`] if the driver fails, [`StreamingError::Io`]
/// if the reader or writer does.
pub async fn decompress_stream<R, W>(
    format: Arc<Format>,
    config: InterpConfig,
    mut reader: R,
    mut writer: W,
) -> Result<StreamSummary, StreamingError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; config.page_size.max(1)];
    let mut driver = Decompressor::new(format, config);
    let mut summary = StreamSummary::default();

    loop {
        match driver.resume() {
            ResumeOutcome::NeedInput => {
                flush_drainable(&mut driver, &mut writer, &mut summary).await?;
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    driver.close_input()?;
                } else {
                    driver.supply_input(&buf[..n])?;
                    summary.input_bytes += n;
                }
            }
            ResumeOutcome::ProducedOutput | ResumeOutcome::NeedOutputSpace => {
                flush_drainable(&mut driver, &mut writer, &mut summary).await?;
            }
            ResumeOutcome::Finished => {
                flush_drainable(&mut driver, &mut writer, &mut summary).await?;
                writer.flush().await?;
                summary.values = driver.take_values();
                debug!(
                    input_bytes = summary.input_bytes,
                    output_bytes = summary.output_bytes,
                    "stream finished"
                );
                return Ok(summary);
            }
            ResumeOutcome::Failed(e) => return Err(e.into()),
        }
    }
}

async fn flush_drainable<W: AsyncWrite + Unpin>(
    driver: &mut Decompressor,
    writer: &mut W,
    summary: &mut StreamSummary,
) -> Result<(), StreamingError> {
    let bytes = driver.drain()?;
    if !bytes.is_empty() {
        writer.write_all(&bytes).await?;
        summary.output_bytes += bytes.len();
    }
    Ok(())
}

/// Run a decompressor over input delivered as the given chunks, closing
/// the input after the last one. Empty chunks are skipped, since an
/// empty supply would close the input early.
///
/// # Errors
///
/// The driver's terminal error, if it fails.
pub fn decompress_chunks<'a>(
    format: Arc<Format>,
    config: InterpConfig,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Transcript, InterpError> {
    let mut driver = Decompressor::new(format, config);
    let mut chunks = chunks.into_iter().filter(|c| !c.is_empty());
    let mut transcript = Transcript::default();

    loop {
        let outcome = driver.resume();
        transcript.resumes += 1;
        transcript.output.extend_from_slice(&driver.drain()?);
        match outcome {
            ResumeOutcome::NeedInput => match chunks.next() {
                Some(chunk) => driver.supply_input(chunk)?,
                None => driver.close_input()?,
            },
            ResumeOutcome::ProducedOutput | ResumeOutcome::NeedOutputSpace => {}
            ResumeOutcome::Finished => {
                transcript.values = driver.take_values();
                return Ok(transcript);
            }
            ResumeOutcome::Failed(e) => return Err(e),
        }
    }
}
