// src/generator.rs
//! # Bounded random walk
//! Produces physically plausible readings that drift freely around the
//! midpoint of a range and slow down as they approach either bound.
//!
//! Below the nominal value the downward step shrinks in proportion to the
//! distance left to `min`; above it the upward step shrinks in proportion to
//! the distance left to `max`.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ConfigError;

/// Range and step configuration of a walk. Checked by [`WalkBounds::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkBounds {
    pub min: f64,
    pub max: f64,
    pub step_size: f64,
}

impl WalkBounds {
    pub fn new(min: f64, max: f64, step_size: f64) -> Result<Self, ConfigError> {
        let b = Self {
            min,
            max,
            step_size,
        };
        b.validate()?;
        Ok(b)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The span must itself be representable or every derived step is inf/NaN.
        let span = self.max - self.min;
        let finite = self.min.is_finite() && self.max.is_finite() && span.is_finite();
        if !finite || self.min >= self.max {
            return Err(ConfigError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(ConfigError::InvalidStep(self.step_size));
        }
        Ok(())
    }

    /// Midpoint of the range.
    pub fn nominal(&self) -> f64 {
        self.min + (self.max - self.min) / 2.0
    }
}

/// Stateful walk. Owns its RNG so sensors never share a random source.
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    bounds: WalkBounds,
    nominal: f64,
    current: f64,
    rng: StdRng,
}

impl ValueGenerator {
    /// Start at a uniformly random point in `[min, max)`.
    pub fn new(bounds: WalkBounds, mut rng: StdRng) -> Result<Self, ConfigError> {
        bounds.validate()?;
        let current = rng.random::<f64>() * (bounds.max - bounds.min) + bounds.min;
        Ok(Self {
            bounds,
            nominal: bounds.nominal(),
            current,
            rng,
        })
    }

    /// Start at an explicit value, which must lie inside the bounds.
    pub fn with_initial(bounds: WalkBounds, initial: f64, rng: StdRng) -> Result<Self, ConfigError> {
        bounds.validate()?;
        if !(bounds.min..=bounds.max).contains(&initial) {
            return Err(ConfigError::InitialOutOfRange {
                value: initial,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(Self {
            bounds,
            nominal: bounds.nominal(),
            current: initial,
            rng,
        })
    }

    /// Seeded constructor for reproducible walks; `None` seeds from the OS.
    pub fn from_seed(bounds: WalkBounds, seed: Option<u64>) -> Result<Self, ConfigError> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self::new(bounds, rng)
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    pub fn bounds(&self) -> WalkBounds {
        self.bounds
    }

    /// `(min_step, max_step)` allowed from the current value.
    pub fn step_range(&self) -> (f64, f64) {
        let WalkBounds {
            min,
            max,
            step_size,
        } = self.bounds;
        if self.current < self.nominal {
            (
                -step_size * ((self.current - min) / (self.nominal - min)),
                step_size,
            )
        } else {
            (
                -step_size,
                step_size * ((max - self.current) / (max - self.nominal)),
            )
        }
    }

    /// Advance one tick and return the new value.
    pub fn tick(&mut self) -> f64 {
        let (min_step, max_step) = self.step_range();
        // min_step <= 0 <= max_step: interpolating keeps every term finite.
        let r = self.rng.random::<f64>();
        let delta = min_step * (1.0 - r) + max_step * r;
        // Steps wider than half the range (and float rounding) could overshoot.
        self.current = (self.current + delta).clamp(self.bounds.min, self.bounds.max);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn single_tick_from_nominal_stays_within_one_step() {
        let b = WalkBounds::new(1.0, 5.0, 0.1).unwrap();
        for seed in 0..200 {
            let mut g = ValueGenerator::with_initial(b, 3.0, seeded(seed)).unwrap();
            assert_eq!(g.nominal(), 3.0);
            let v = g.tick();
            assert!((2.9..=3.1).contains(&v), "seed {seed}: {v}");
        }
    }

    #[test]
    fn walk_never_leaves_bounds() {
        let configs = [
            (1.0, 5.0, 0.1),
            (-10.0, 10.0, 3.0),
            (0.0, 1.0, 0.5),
            (0.0, 1.0, 7.5), // step wider than the range
            (100.0, 100.001, 0.0001),
            (-8e307, 8e307, 1e300), // span close to f64::MAX
            (0.0, 1.0, 1e308),
        ];
        for (i, (min, max, step)) in configs.into_iter().enumerate() {
            let b = WalkBounds::new(min, max, step).unwrap();
            let mut g = ValueGenerator::new(b, seeded(i as u64)).unwrap();
            for _ in 0..20_000 {
                let v = g.tick();
                assert!(v >= min && v <= max, "{v} escaped [{min}, {max}]");
            }
        }
    }

    #[test]
    fn steps_shrink_towards_the_bounds() {
        let b = WalkBounds::new(1.0, 5.0, 0.1).unwrap();
        let near_min = ValueGenerator::with_initial(b, 1.0, seeded(1)).unwrap();
        assert_eq!(near_min.step_range(), (0.0, 0.1));
        let near_max = ValueGenerator::with_initial(b, 5.0, seeded(1)).unwrap();
        assert_eq!(near_max.step_range(), (-0.1, 0.0));
        let halfway_down = ValueGenerator::with_initial(b, 2.0, seeded(1)).unwrap();
        let (lo, hi) = halfway_down.step_range();
        assert!((lo + 0.05).abs() < 1e-12);
        assert_eq!(hi, 0.1);
    }

    #[test]
    fn same_seed_same_walk() {
        let b = WalkBounds::new(1.0, 5.0, 0.1).unwrap();
        let mut a = ValueGenerator::from_seed(b, Some(42)).unwrap();
        let mut c = ValueGenerator::from_seed(b, Some(42)).unwrap();
        for _ in 0..100 {
            assert_eq!(a.tick(), c.tick());
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            WalkBounds::new(5.0, 1.0, 0.1),
            Err(ConfigError::InvalidBounds { .. })
        ));
        assert!(matches!(
            WalkBounds::new(1.0, 1.0, 0.1),
            Err(ConfigError::InvalidBounds { .. })
        ));
        assert!(matches!(
            WalkBounds::new(1.0, 5.0, 0.0),
            Err(ConfigError::InvalidStep(_))
        ));
        assert!(matches!(
            WalkBounds::new(1.0, f64::NAN, 0.1),
            Err(ConfigError::InvalidBounds { .. })
        ));
        // Both ends finite, but the span overflows.
        assert!(matches!(
            WalkBounds::new(-1e308, 1e308, 1.0),
            Err(ConfigError::InvalidBounds { .. })
        ));
        let b = WalkBounds::new(1.0, 5.0, 0.1).unwrap();
        assert!(matches!(
            ValueGenerator::with_initial(b, 9.0, seeded(0)),
            Err(ConfigError::InitialOutOfRange { .. })
        ));
    }
}
