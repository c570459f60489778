//! Cross-track interleaving of staged samples.
//!
//! The container wants the physical mdat timeline monotonic in presentation
//! time across tracks, but video and audio arrive on independent clocks. The
//! interleaver holds one FIFO per track and releases the globally-earliest
//! sample only once every other track has something queued at an equal or
//! later time, so a late-arriving track can still slot its samples in order.
//! Within a track, submission order is never changed.
//!
//! A silent track (muted microphone, stalled encoder) must not pin the
//! other tracks' samples in memory indefinitely: once the buffered span
//! exceeds [`MAX_INTERLEAVE_DELTA_MICROS`], the earliest sample is released
//! even though an empty queue could still produce an earlier timestamp.

use std::collections::VecDeque;

/// Widest presentation-time span the queues may hold before the earliest
/// sample is force-flushed past an empty track queue.
const MAX_INTERLEAVE_DELTA_MICROS: i64 = 10_000_000;

/// A sample staged for physical writing: payload already in container form,
/// timestamps already rescaled.
#[derive(Debug)]
pub(crate) struct StagedSample {
    /// Track slot index (0 = video, 1 = audio).
    pub track: usize,
    /// Presentation time in microseconds, the cross-track ordering key.
    pub pts_micros: i64,
    /// Sample duration in the track's timescale units.
    pub duration_ticks: u32,
    /// Sync sample flag.
    pub is_sync: bool,
    /// Container-form payload.
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct Interleaver {
    queues: Vec<VecDeque<StagedSample>>,
}

impl Interleaver {
    pub fn new(track_count: usize) -> Self {
        Self {
            queues: (0..track_count).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Stage a sample for its track.
    pub fn push(&mut self, sample: StagedSample) {
        self.queues[sample.track].push_back(sample);
    }

    /// Pop the next sample that is safe to write: the globally-earliest
    /// staged sample, once every track queue is non-empty or the buffered
    /// span has outgrown the interleave delta cap.
    pub fn pop_ready(&mut self) -> Option<StagedSample> {
        if self.queues.iter().all(|q| !q.is_empty()) {
            return self.pop_earliest();
        }

        let earliest = self
            .queues
            .iter()
            .filter_map(|q| q.front())
            .map(|s| s.pts_micros)
            .min()?;
        let newest = self
            .queues
            .iter()
            .filter_map(|q| q.back())
            .map(|s| s.pts_micros)
            .max()?;
        if newest - earliest > MAX_INTERLEAVE_DELTA_MICROS {
            return self.pop_earliest();
        }
        None
    }

    /// Pop the globally-earliest sample unconditionally. Used when
    /// finalizing, after which no further samples can arrive.
    pub fn pop_any(&mut self) -> Option<StagedSample> {
        self.pop_earliest()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    fn pop_earliest(&mut self) -> Option<StagedSample> {
        let mut best: Option<(usize, i64)> = None;
        for (idx, queue) in self.queues.iter().enumerate() {
            if let Some(front) = queue.front() {
                // Strict comparison keeps the lower track index on ties.
                let earlier = match best {
                    Some((_, pts)) => front.pts_micros < pts,
                    None => true,
                };
                if earlier {
                    best = Some((idx, front.pts_micros));
                }
            }
        }
        best.and_then(|(idx, _)| self.queues[idx].pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(track: usize, pts_micros: i64) -> StagedSample {
        StagedSample {
            track,
            pts_micros,
            duration_ticks: 1,
            is_sync: true,
            data: vec![track as u8],
        }
    }

    #[test]
    fn test_holds_until_every_track_has_samples() {
        let mut il = Interleaver::new(2);
        il.push(staged(0, 0));
        il.push(staged(0, 33_333));
        // Track 1 empty: nothing is safe to write yet.
        assert!(il.pop_ready().is_none());

        il.push(staged(1, 10_000));
        let first = il.pop_ready().unwrap();
        assert_eq!((first.track, first.pts_micros), (0, 0));
        let second = il.pop_ready().unwrap();
        assert_eq!((second.track, second.pts_micros), (1, 10_000));
        // Track 1 drained again.
        assert!(il.pop_ready().is_none());
    }

    #[test]
    fn test_global_order_across_tracks() {
        let mut il = Interleaver::new(2);
        il.push(staged(0, 0));
        il.push(staged(0, 40_000));
        il.push(staged(1, 10_000));
        il.push(staged(1, 20_000));
        il.push(staged(1, 50_000));

        let mut order = Vec::new();
        while let Some(s) = il.pop_ready() {
            order.push(s.pts_micros);
        }
        assert_eq!(order, vec![0, 10_000, 20_000, 40_000]);
    }

    #[test]
    fn test_within_track_order_preserved_on_ties() {
        let mut il = Interleaver::new(2);
        il.push(staged(0, 1_000));
        il.push(staged(1, 1_000));
        let first = il.pop_ready().unwrap();
        assert_eq!(first.track, 0); // lower index wins the tie
    }

    #[test]
    fn test_silent_track_does_not_buffer_unboundedly() {
        let mut il = Interleaver::new(2);
        il.push(staged(0, 0));
        // Within the delta cap the empty track still holds things back.
        il.push(staged(0, MAX_INTERLEAVE_DELTA_MICROS));
        assert!(il.pop_ready().is_none());

        // One more sample pushes the span past the cap: the earliest sample
        // is released even though track 1 never produced anything.
        il.push(staged(0, MAX_INTERLEAVE_DELTA_MICROS + 1));
        let flushed = il.pop_ready().unwrap();
        assert_eq!((flushed.track, flushed.pts_micros), (0, 0));
        // The remaining span is back under the cap.
        assert!(il.pop_ready().is_none());
    }

    #[test]
    fn test_pop_any_drains_everything_in_order() {
        let mut il = Interleaver::new(2);
        il.push(staged(0, 5));
        il.push(staged(0, 7));
        il.push(staged(1, 6));

        let mut order = Vec::new();
        while let Some(s) = il.pop_any() {
            order.push((s.track, s.pts_micros));
        }
        assert_eq!(order, vec![(0, 5), (1, 6), (0, 7)]);
        assert!(il.is_empty());
    }
}
