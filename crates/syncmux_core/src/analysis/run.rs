//! Full correlation pipeline over one file pair.
//!
//! decode -> filter -> chunk -> correlate, producing per-chunk results. The
//! analysis step runs this against each secondary source, and the stepping
//! corrector reuses it (with QA-tightened settings) to verify its own
//! output.

use std::path::Path;

use super::chunks::extract_chunk_pairs;
use super::decode::{decode_audio, select_audio_stream};
use super::filtering::apply_configured_filter;
use super::methods::create_kernel;
use super::types::{AnalysisResult, ChunkResult, TrackSelection};
use crate::config::AnalysisSettings;
use crate::io::CommandRunner;

/// Outcome of one correlation run.
#[derive(Debug, Clone)]
pub struct CorrelationRun {
    pub chunks: Vec<ChunkResult>,
    /// The target's selected analysis track (drives diagnosis and stepping).
    pub target_selection: TrackSelection,
    /// The reference's selected analysis track.
    pub ref_selection: TrackSelection,
}

/// Run decode -> filter -> chunk -> correlate for one ref/target pair.
pub fn run_audio_correlation(
    ref_file: &Path,
    target_file: &Path,
    settings: &AnalysisSettings,
    runner: &CommandRunner,
    ref_lang: Option<&str>,
    target_lang: Option<&str>,
    role_tag: &str,
) -> AnalysisResult<CorrelationRun> {
    let logger = runner.logger().clone();

    let ref_selection = select_audio_stream(ref_file, ref_lang, runner)?;
    let target_selection = select_audio_stream(target_file, target_lang, runner)?;
    logger.message(&format!(
        "Selected streams for analysis: REF ({}), {} ({})",
        ref_selection.description, role_tag, target_selection.description
    ));

    let sample_rate = settings.sample_rate;
    let mut ref_pcm = decode_audio(
        ref_file,
        ref_selection.stream_index,
        sample_rate,
        settings.use_soxr,
        runner,
    )?;
    let mut tgt_pcm = decode_audio(
        target_file,
        target_selection.stream_index,
        sample_rate,
        settings.use_soxr,
        runner,
    )?;

    apply_configured_filter(&mut ref_pcm, &mut tgt_pcm, sample_rate, settings, &logger);

    let pairs = extract_chunk_pairs(
        &ref_pcm,
        &tgt_pcm,
        sample_rate,
        settings.scan_chunk_count,
        settings.scan_chunk_duration as f64,
        settings.scan_start_percentage,
        settings.scan_end_percentage,
    );

    let kernel = create_kernel(settings.correlation_method, settings.audio_peak_fit);
    logger.message(&format!("[{}] Using method: {}", role_tag, kernel.name()));

    let total = pairs.len();
    let mut chunks = Vec::with_capacity(total);
    for pair in pairs {
        runner.check_cancel()?;
        match kernel.find_delay(&pair.reference, &pair.target, sample_rate) {
            Ok((raw_ms, match_pct)) => {
                let result =
                    ChunkResult::new(raw_ms, match_pct, pair.start_s, settings.min_match_pct);
                let status = if result.accepted {
                    "ACCEPTED".to_string()
                } else {
                    format!("REJECTED (below {:.1})", settings.min_match_pct)
                };
                logger.message(&format!(
                    "  Chunk {}/{} (@{:.1}s): delay = {:+} ms (raw={:+.3}, match={:.2}) - {}",
                    pair.index, total, pair.start_s, result.delay_ms, result.raw_delay_ms,
                    result.match_pct, status
                ));
                chunks.push(result);
            }
            Err(e) => {
                logger.warn(&format!(
                    "  Chunk {}/{} (@{:.1}s) failed: {}",
                    pair.index, total, pair.start_s, e
                ));
            }
        }
    }

    let accepted = chunks.iter().filter(|c| c.accepted).count();
    let pct = if chunks.is_empty() {
        0.0
    } else {
        accepted as f64 / chunks.len() as f64 * 100.0
    };
    logger.message(&format!(
        "Accepted {} / {} chunks ({:.1}%)",
        accepted,
        chunks.len(),
        pct
    ));

    Ok(CorrelationRun {
        chunks,
        target_selection,
        ref_selection,
    })
}
