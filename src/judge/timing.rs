// Hit windows, points and the fret-match rule.

/// Judgment grades for a successful hit, best first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitGrade {
    Perfect,
    Good,
    Ok,
}

impl HitGrade {
    pub fn label(self) -> &'static str {
        match self {
            HitGrade::Perfect => "PERFECT",
            HitGrade::Good => "GOOD",
            HitGrade::Ok => "OK",
        }
    }
}

/// Symmetric timing windows in seconds from chord onset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingWindows {
    pub perfect: f64,
    pub good: f64,
    pub bad: f64,
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self {
            perfect: 0.030,
            good: 0.055,
            bad: 0.120,
        }
    }
}

impl TimingWindows {
    /// Grade for `delta = chord_time - input_time`, `None` outside the bad window.
    pub fn grade(&self, delta: f64) -> Option<HitGrade> {
        let abs = delta.abs();
        if abs <= self.perfect {
            Some(HitGrade::Perfect)
        } else if abs <= self.good {
            Some(HitGrade::Good)
        } else if abs <= self.bad {
            Some(HitGrade::Ok)
        } else {
            None
        }
    }

    /// A chord at `chord_time` is missed once the song is strictly past its bad window.
    pub fn is_missed(&self, chord_time: f64, now: f64) -> bool {
        chord_time < now - self.bad
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoringRules {
    pub points_perfect: i64,
    pub points_good: i64,
    pub points_ok: i64,
    pub streak_divisor: u32,
    // cap for the displayed multiplier only, scoring itself is uncapped
    pub max_display_multiplier: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            points_perfect: 100,
            points_good: 70,
            points_ok: 50,
            streak_divisor: 10,
            max_display_multiplier: 4,
        }
    }
}

impl ScoringRules {
    pub fn points(&self, grade: HitGrade) -> i64 {
        match grade {
            HitGrade::Perfect => self.points_perfect,
            HitGrade::Good => self.points_good,
            HitGrade::Ok => self.points_ok,
        }
    }

    pub fn multiplier(&self, streak: u32) -> u32 {
        1 + streak / self.streak_divisor.max(1)
    }

    // streak division truncates
    pub fn award(&self, grade: HitGrade, streak: u32) -> i64 {
        self.points(grade) * self.multiplier(streak) as i64
    }

    pub fn display_multiplier(&self, streak: u32) -> u32 {
        self.multiplier(streak).min(self.max_display_multiplier)
    }
}

/// Whether `held` satisfies a chord expecting `expected`.
///
/// A single note may be played with any lower frets also held (the
/// "sustain chain" idiom) but no higher fret. A chord of two or more notes
/// needs exactly its frets and nothing else.
pub fn frets_match(expected: u8, held: u8) -> bool {
    match expected.count_ones() {
        0 => false,
        1 => {
            let above = !((expected << 1).wrapping_sub(1));
            held & expected != 0 && held & above == 0
        }
        _ => held == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L0: u8 = 1 << 0;
    const L2: u8 = 1 << 2;
    const L3: u8 = 1 << 3;
    const L4: u8 = 1 << 4;

    #[test]
    fn test_window_boundaries() {
        let w = TimingWindows::default();
        assert_eq!(w.grade(0.0), Some(HitGrade::Perfect));
        assert_eq!(w.grade(-0.030), Some(HitGrade::Perfect));
        assert_eq!(w.grade(0.031), Some(HitGrade::Good));
        assert_eq!(w.grade(-0.055), Some(HitGrade::Good));
        assert_eq!(w.grade(0.100), Some(HitGrade::Ok));
        assert_eq!(w.grade(-0.120), Some(HitGrade::Ok));
        assert_eq!(w.grade(0.121), None);
        assert_eq!(w.grade(-0.5), None);
    }

    #[test]
    fn test_is_missed_is_strict() {
        let w = TimingWindows::default();
        assert!(!w.is_missed(1.0, 1.0));
        assert!(!w.is_missed(1.0, 1.11));
        assert!(w.is_missed(1.0, 1.1201));
    }

    #[test]
    fn test_scoring() {
        let rules = ScoringRules::default();
        assert_eq!(rules.award(HitGrade::Perfect, 0), 100);
        assert_eq!(rules.award(HitGrade::Perfect, 15), 200);
        assert_eq!(rules.award(HitGrade::Good, 9), 70);
        assert_eq!(rules.award(HitGrade::Ok, 30), 200);
        assert_eq!(rules.display_multiplier(55), 4);
    }

    #[test]
    fn test_single_note_allows_lower_frets() {
        assert!(frets_match(L2, L2));
        assert!(frets_match(L2, L0 | L2));
        assert!(!frets_match(L2, L2 | L3));
        assert!(!frets_match(L2, L0));
        assert!(!frets_match(L2, 0));
        assert!(frets_match(L4, L0 | L2 | L4));
    }

    #[test]
    fn test_chord_needs_exact_frets() {
        assert!(frets_match(L0 | L2, L0 | L2));
        assert!(!frets_match(L0 | L2, L0 | L2 | L3));
        assert!(!frets_match(L0 | L2, L2));
    }

    #[test]
    fn test_empty_expectation_never_matches() {
        assert!(!frets_match(0, 0));
    }
}
