//! Tempo-correction filter chains.
//!
//! PAL, linear drift, and per-segment internal drift all resample through
//! the same engine selection: rubberband (pitch-preserving, tunable), atempo
//! (fast), or asetrate+aresample (changes pitch with speed).

use std::path::Path;

use crate::config::SegmentSettings;
use crate::io::argv;
use crate::models::ResampleEngine;

/// Tempo ratio that slows a 25 fps master back down to 23.976 fps.
pub fn pal_tempo_ratio() -> f64 {
    (24000.0 / 1001.0) / 25.0
}

/// Tempo ratio correcting a measured drift rate in ms/s.
pub fn drift_tempo_ratio(rate_ms_per_s: f64) -> f64 {
    1000.0 / (1000.0 + rate_ms_per_s)
}

/// Build the `-af` filter chain for the configured engine.
pub fn build_tempo_filter(settings: &SegmentSettings, tempo: f64, sample_rate: u32) -> String {
    match settings.resample_engine {
        ResampleEngine::Rubberband => {
            let mut opts = vec![format!("tempo={}", tempo)];
            if !settings.rb_pitch_correct {
                opts.push(format!("pitch={}", tempo));
            }
            opts.push(format!("transients={}", settings.rb_transients));
            if settings.rb_smoother {
                opts.push("smoother=on".to_string());
            }
            if settings.rb_pitchq {
                opts.push("pitchq=on".to_string());
            }
            format!("rubberband={}", opts.join(":"))
        }
        ResampleEngine::Atempo => format!("atempo={}", tempo),
        ResampleEngine::Aresample => {
            let new_rate = sample_rate as f64 * tempo;
            format!("asetrate={},aresample={}", new_rate, sample_rate)
        }
    }
}

/// argv for resampling `input` into a FLAC at `output` with the given chain.
pub fn resample_command(input: &Path, output: &Path, filter_chain: &str) -> Vec<String> {
    argv([
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-nostdin".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-af".to_string(),
        filter_chain.to_string(),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-fflags".to_string(),
        "+bitexact".to_string(),
        "-c:a".to_string(),
        "flac".to_string(),
        output.to_string_lossy().into_owned(),
    ])
}

/// Hint appended to errors when the rubberband engine fails: most often the
/// decoder build simply lacks librubberband.
pub fn engine_failure_hint(engine: ResampleEngine) -> &'static str {
    match engine {
        ResampleEngine::Rubberband => " (ensure your ffmpeg build includes librubberband)",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pal_ratio_is_just_below_one() {
        let ratio = pal_tempo_ratio();
        assert!((ratio - 0.959_040_959).abs() < 1e-6);
    }

    #[test]
    fn drift_ratio_inverts_rate() {
        assert!((drift_tempo_ratio(0.0) - 1.0).abs() < 1e-12);
        // Target running 40.9 ms/s fast needs slowing down.
        assert!(drift_tempo_ratio(40.9) < 1.0);
        assert!(drift_tempo_ratio(-2.0) > 1.0);
    }

    #[test]
    fn rubberband_chain_includes_tunables() {
        let mut settings = SegmentSettings::default();
        settings.rb_smoother = true;
        settings.rb_pitchq = true;
        let chain = build_tempo_filter(&settings, 0.959, 48000);
        assert!(chain.starts_with("rubberband=tempo=0.959"));
        assert!(chain.contains("transients=crisp"));
        assert!(chain.contains("smoother=on"));
        assert!(chain.contains("pitchq=on"));
        // pitch correction on by default: no pitch= term
        assert!(!chain.contains("pitch=0.959"));
    }

    #[test]
    fn rubberband_without_pitch_correct_locks_pitch() {
        let mut settings = SegmentSettings::default();
        settings.rb_pitch_correct = false;
        let chain = build_tempo_filter(&settings, 0.5, 48000);
        assert!(chain.contains("pitch=0.5"));
    }

    #[test]
    fn aresample_chain_scales_rate() {
        let mut settings = SegmentSettings::default();
        settings.resample_engine = ResampleEngine::Aresample;
        let chain = build_tempo_filter(&settings, 0.5, 48000);
        assert_eq!(chain, "asetrate=24000,aresample=48000");
    }

    #[test]
    fn atempo_chain_is_minimal() {
        let mut settings = SegmentSettings::default();
        settings.resample_engine = ResampleEngine::Atempo;
        assert_eq!(build_tempo_filter(&settings, 1.01, 48000), "atempo=1.01");
    }
}
