//! Tempo map: piecewise-constant tempo over ticks, converted to seconds.

/// 120 BPM, used when a chart never sets a tempo at tick 0.
pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoPoint {
    pub tick: u64,
    pub us_per_quarter: u32,
}

impl TempoPoint {
    pub fn new(tick: u64, us_per_quarter: u32) -> Self {
        Self { tick, us_per_quarter }
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.us_per_quarter as f64
    }
}

#[derive(Clone, Debug)]
pub struct TempoMap {
    points: Vec<TempoPoint>,
    // seconds elapsed at each point's tick, same indexing as `points`
    starts: Vec<f64>,
    ticks_per_quarter: u32,
}

impl TempoMap {
    /// Builds a map from tempo changes in arrival order.
    ///
    /// Points are sorted by tick; when several share a tick the last one
    /// collected wins. A default point is synthesized at tick 0 if none exists.
    pub fn new(mut points: Vec<TempoPoint>, ticks_per_quarter: u32) -> Self {
        // stable sort keeps arrival order among equal ticks
        points.sort_by_key(|p| p.tick);

        let mut deduped: Vec<TempoPoint> = Vec::with_capacity(points.len() + 1);
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.tick == point.tick => *last = point,
                _ => deduped.push(point),
            }
        }
        if deduped.first().is_none_or(|p| p.tick != 0) {
            deduped.insert(0, TempoPoint::new(0, DEFAULT_US_PER_QUARTER));
        }

        let ticks_per_quarter = ticks_per_quarter.max(1);
        let mut starts = Vec::with_capacity(deduped.len());
        let mut elapsed = 0.0;
        for (i, point) in deduped.iter().enumerate() {
            if i > 0 {
                let prev = deduped[i - 1];
                elapsed += segment_seconds(point.tick - prev.tick, prev.us_per_quarter, ticks_per_quarter);
            }
            starts.push(elapsed);
        }

        Self { points: deduped, starts, ticks_per_quarter }
    }

    pub fn points(&self) -> &[TempoPoint] {
        &self.points
    }

    pub fn ticks_per_quarter(&self) -> u32 {
        self.ticks_per_quarter
    }

    /// Seconds from tick 0 to `tick`. Monotonically non-decreasing in `tick`.
    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        let idx = self.segment_index(tick);
        let point = self.points[idx];
        self.starts[idx] + segment_seconds(tick - point.tick, point.us_per_quarter, self.ticks_per_quarter)
    }

    /// Tempo in effect at `tick`.
    pub fn tempo_at(&self, tick: u64) -> TempoPoint {
        self.points[self.segment_index(tick)]
    }

    // index of the last point at or before `tick`; points[0] is always tick 0
    fn segment_index(&self, tick: u64) -> usize {
        self.points.partition_point(|p| p.tick <= tick).saturating_sub(1)
    }
}

fn segment_seconds(ticks: u64, us_per_quarter: u32, ticks_per_quarter: u32) -> f64 {
    ticks as f64 * (us_per_quarter as f64 / 1_000_000.0) / ticks_per_quarter as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tempo_is_synthesized() {
        let map = TempoMap::new(vec![], 480);
        assert_eq!(map.points(), &[TempoPoint::new(0, DEFAULT_US_PER_QUARTER)]);
        assert!((map.tick_to_seconds(480) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_mid_song() {
        // 120 BPM for one beat, then 60 BPM
        let map = TempoMap::new(
            vec![TempoPoint::new(0, 500_000), TempoPoint::new(480, 1_000_000)],
            480,
        );
        assert!((map.tick_to_seconds(480) - 0.5).abs() < 1e-9);
        assert!((map.tick_to_seconds(960) - 1.5).abs() < 1e-9);
        assert!((map.tick_to_seconds(720) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_ticks_keep_last() {
        let map = TempoMap::new(
            vec![
                TempoPoint::new(0, 500_000),
                TempoPoint::new(100, 400_000),
                TempoPoint::new(100, 600_000),
            ],
            480,
        );
        assert_eq!(map.points().len(), 2);
        assert_eq!(map.points()[1].us_per_quarter, 600_000);
    }

    #[test]
    fn test_unsorted_points_are_sorted() {
        let map = TempoMap::new(
            vec![TempoPoint::new(960, 250_000), TempoPoint::new(0, 500_000)],
            480,
        );
        assert_eq!(map.points()[0].tick, 0);
        assert_eq!(map.points()[1].tick, 960);
    }

    #[test]
    fn test_first_point_after_zero_gets_default_prefix() {
        let map = TempoMap::new(vec![TempoPoint::new(480, 1_000_000)], 480);
        assert_eq!(map.points()[0], TempoPoint::new(0, DEFAULT_US_PER_QUARTER));
        assert!((map.tick_to_seconds(960) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic() {
        let map = TempoMap::new(
            vec![
                TempoPoint::new(0, 300_000),
                TempoPoint::new(200, 900_000),
                TempoPoint::new(1000, 450_000),
            ],
            192,
        );
        let mut prev = -1.0;
        for tick in (0..3000).step_by(7) {
            let t = map.tick_to_seconds(tick);
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn test_bpm() {
        assert!((TempoPoint::new(0, 500_000).bpm() - 120.0).abs() < 1e-9);
    }
}
