//! Scan position computation and chunk pair extraction.

/// A matched pair of reference/target sample slices at one scan position.
///
/// Both buffers are independent copies, never views into the decoded PCM.
#[derive(Debug, Clone)]
pub struct ChunkPair {
    /// 1-based chunk number, for display.
    pub index: usize,
    /// Start time on the reference (s).
    pub start_s: f64,
    pub reference: Vec<f32>,
    pub target: Vec<f32>,
}

/// Distribute `chunk_count` chunks of `chunk_duration_s` uniformly over
/// `[start_pct, end_pct]` of the reference duration and cut matching sample
/// windows from both buffers.
///
/// A chunk whose window would overrun either buffer is skipped, not
/// misaligned.
pub fn extract_chunk_pairs(
    ref_pcm: &[f32],
    tgt_pcm: &[f32],
    sample_rate: u32,
    chunk_count: u32,
    chunk_duration_s: f64,
    start_pct: f64,
    end_pct: f64,
) -> Vec<ChunkPair> {
    let duration_s = ref_pcm.len() as f64 / sample_rate as f64;

    let (start_pct, end_pct) = if (0.0..100.0).contains(&start_pct) && start_pct < end_pct && end_pct <= 100.0
    {
        (start_pct, end_pct)
    } else {
        (5.0, 95.0)
    };

    let scan_start_s = duration_s * (start_pct / 100.0);
    let scan_end_s = duration_s * (end_pct / 100.0);
    let scan_range = ((scan_end_s - scan_start_s) - chunk_duration_s).max(0.0);

    let chunk_samples = (chunk_duration_s * sample_rate as f64).round() as usize;
    let divisor = chunk_count.saturating_sub(1).max(1) as f64;

    let mut chunks = Vec::new();
    for i in 0..chunk_count {
        let start_s = scan_start_s + scan_range / divisor * i as f64;
        let start_sample = (start_s * sample_rate as f64).round() as usize;
        let end_sample = start_sample + chunk_samples;
        if end_sample > ref_pcm.len() || end_sample > tgt_pcm.len() {
            continue;
        }
        chunks.push(ChunkPair {
            index: i as usize + 1,
            start_s,
            reference: ref_pcm[start_sample..end_sample].to_vec(),
            target: tgt_pcm[start_sample..end_sample].to_vec(),
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(seconds: f64, sr: u32) -> Vec<f32> {
        vec![0.0; (seconds * sr as f64) as usize]
    }

    #[test]
    fn distributes_requested_chunks() {
        let ref_pcm = pcm(100.0, 1000);
        let tgt_pcm = pcm(100.0, 1000);
        let chunks = extract_chunk_pairs(&ref_pcm, &tgt_pcm, 1000, 5, 10.0, 5.0, 95.0);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].index, 1);
        assert!((chunks[0].start_s - 5.0).abs() < 1e-9);
        // Last chunk still fits inside the scan range.
        let last = chunks.last().unwrap();
        assert!(last.start_s + 10.0 <= 95.0 + 1e-9);
    }

    #[test]
    fn overrunning_chunks_are_skipped() {
        let ref_pcm = pcm(100.0, 1000);
        let tgt_pcm = pcm(50.0, 1000); // shorter target
        let chunks = extract_chunk_pairs(&ref_pcm, &tgt_pcm, 1000, 10, 10.0, 5.0, 95.0);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.start_s + 10.0 <= 50.0 + 1e-9);
        }
    }

    #[test]
    fn invalid_scan_range_falls_back() {
        let ref_pcm = pcm(100.0, 1000);
        let tgt_pcm = pcm(100.0, 1000);
        let chunks = extract_chunk_pairs(&ref_pcm, &tgt_pcm, 1000, 3, 10.0, 90.0, 10.0);
        // Falls back to 5..95.
        assert!((chunks[0].start_s - 5.0).abs() < 1e-9);
    }

    #[test]
    fn chunks_are_copies() {
        let ref_pcm: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        let tgt_pcm = ref_pcm.clone();
        let chunks = extract_chunk_pairs(&ref_pcm, &tgt_pcm, 1000, 1, 1.0, 5.0, 95.0);
        let expected_start = (chunks[0].start_s * 1000.0).round() as usize;
        assert_eq!(chunks[0].reference[0], ref_pcm[expected_start]);
        assert_eq!(chunks[0].reference.len(), 1000);
    }
}
