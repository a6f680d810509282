//! Clock and random implementations.

use crate::infrastructure::ports::{ClockPort, RandomPort};
use chrono::{DateTime, Utc};
use rand::Rng;

/// System clock - uses real time.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// System random - uses real randomness.
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for SystemRandom {
    fn gen_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn gen_index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}

/// Fixed clock for testing.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fixed random for testing. `gen_unit` always returns `unit`, `gen_index`
/// returns `index` clamped into range.
#[cfg(test)]
pub struct FixedRandom {
    pub unit: f64,
    pub index: usize,
}

#[cfg(test)]
impl FixedRandom {
    pub fn new(unit: f64) -> Self {
        Self { unit, index: 0 }
    }
}

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn gen_unit(&self) -> f64 {
        self.unit
    }

    fn gen_index(&self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_random_stays_in_range() {
        let random = SystemRandom::new();
        for _ in 0..100 {
            let unit = random.gen_unit();
            assert!((0.0..1.0).contains(&unit));
            assert!(random.gen_index(3) < 3);
        }
        assert_eq!(random.gen_index(0), 0);
    }

    #[test]
    fn fixed_random_clamps_index() {
        let random = FixedRandom { unit: 0.5, index: 7 };
        assert_eq!(random.gen_index(3), 2);
        assert_eq!(random.gen_unit(), 0.5);
    }
}
