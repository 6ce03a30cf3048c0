//! Detected tone: one fundamental frequency with level and persistence

use std::cmp::Ordering;
use std::fmt;

/// Relative frequency difference under which two tones are the same tone
const FREQ_TOLERANCE: f64 = 0.05;

/// A tone tracked by the analyzer
///
/// Equality is approximate (frequencies within 5%), while ordering is by
/// frequency with matching tones comparing equal. This lets sorted tone lists
/// be merge-joined frame to frame. The relation is not transitive, so tones
/// implement neither `Eq` nor `Ord`.
#[derive(Debug, Clone, Copy)]
pub struct Tone {
    /// Frequency (Hz), 0 when there is no tone
    pub freq: f64,
    /// Level (dB, 0 = full scale)
    pub db: f64,
    /// Smoothed level, stable enough for rendering
    pub stabledb: f64,
    /// Number of consecutive frames the tone has been detected in
    pub age: usize,
}

impl Tone {
    /// Minimum age before a tone is trusted
    pub const MINAGE: usize = 2;

    /// A freshly detected tone
    pub fn new(freq: f64, db: f64) -> Self {
        Self {
            freq,
            db,
            stabledb: db,
            age: 0,
        }
    }

    /// Rough frequency match (within 5%)
    pub fn matches(&self, freq: f64) -> bool {
        (self.freq / freq - 1.0).abs() < FREQ_TOLERANCE
    }

    /// Compare by level instead of frequency
    pub fn db_cmp(&self, other: &Tone) -> Ordering {
        self.db.total_cmp(&other.db)
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            freq: 0.0,
            db: f64::NEG_INFINITY,
            stabledb: f64::NEG_INFINITY,
            age: 0,
        }
    }
}

impl PartialEq for Tone {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.freq)
    }
}

impl PartialOrd for Tone {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else {
            self.freq.partial_cmp(&other.freq)
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} Hz, age {}, {:.1} dB", self.freq, self.age, self.db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerant_equality() {
        let a = Tone::new(440.0, -10.0);
        assert_eq!(a, Tone::new(455.0, -30.0));
        assert_ne!(a, Tone::new(470.0, -10.0));
        assert!(a.matches(420.0));
        assert!(!a.matches(880.0));
    }

    #[test]
    fn test_ordering() {
        let a = Tone::new(440.0, -10.0);
        let b = Tone::new(450.0, -10.0);
        let c = Tone::new(500.0, -10.0);
        assert!(a < c);
        assert!(c > b);
        assert!(!(a < b));
        assert!(a <= b && a >= b);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_new_and_default() {
        let t = Tone::new(220.0, -12.0);
        assert_eq!(t.age, 0);
        assert_eq!(t.stabledb, -12.0);

        let empty = Tone::default();
        assert_eq!(empty.freq, 0.0);
        assert_eq!(empty.db, f64::NEG_INFINITY);
    }

    #[test]
    fn test_db_cmp() {
        let loud = Tone::new(100.0, -5.0);
        let quiet = Tone::new(900.0, -30.0);
        assert_eq!(loud.db_cmp(&quiet), Ordering::Greater);
    }

    #[test]
    fn test_display() {
        let mut t = Tone::new(440.04, -12.34);
        t.age = 3;
        assert_eq!(t.to_string(), "440.0 Hz, age 3, -12.3 dB");
    }
}
