//! Generators for primitive types.

use num_traits::{NumCast, PrimInt, ToPrimitive};
use rand::Rng;

use crate::config::{ConfigError, GeneratorConfig};
use crate::generator::Generator;

/// Generator for boolean values
#[derive(Debug, Clone)]
pub struct BoolGenerator;

impl Generator<bool> for BoolGenerator {
    fn generate(&self, rng: &mut dyn rand::RngCore, _config: &GeneratorConfig) -> bool {
        rng.r#gen()
    }

    fn shrink(&self, value: &bool) -> Box<dyn Iterator<Item = bool>> {
        // For booleans, shrink true to false
        if *value {
            Box::new(std::iter::once(false))
        } else {
            Box::new(std::iter::empty())
        }
    }
}

/// Generator for bounded integers of any primitive type up to 64 bits
///
/// Values shrink toward the *target*: zero when the range contains it,
/// otherwise the bound nearest zero. Generation is biased by
/// [`GeneratorConfig::size_hint`]: most draws land within `size_hint²` of the
/// target, the rest cover the full range or hit one of the bounds.
#[derive(Debug, Clone)]
pub struct IntGenerator<T> {
    min: T,
    max: T,
}

impl<T> IntGenerator<T>
where
    T: PrimInt + ToPrimitive + NumCast,
{
    /// Create a new integer generator over `min..=max`
    pub fn new(min: T, max: T) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidRange {
                min: wide(min).to_string(),
                max: wide(max).to_string(),
            });
        }
        Ok(Self { min, max })
    }

    /// Create a generator for the full range of the type
    pub fn full_range() -> Self {
        Self {
            min: T::min_value(),
            max: T::max_value(),
        }
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    /// The value every shrink sequence converges to
    pub fn target(&self) -> T {
        let zero = T::zero();
        if self.min <= zero && zero <= self.max {
            zero
        } else if self.min > zero {
            self.min
        } else {
            self.max
        }
    }
}

// Every supported type fits in i128, so bounds arithmetic never overflows there.
fn wide<T: ToPrimitive>(value: T) -> i128 {
    value.to_i128().unwrap_or_default()
}

impl<T> Generator<T> for IntGenerator<T>
where
    T: PrimInt + ToPrimitive + NumCast + 'static,
{
    fn generate(&self, rng: &mut dyn rand::RngCore, config: &GeneratorConfig) -> T {
        let (min, max) = (wide(self.min), wide(self.max));
        let target = wide(self.target());
        let reach = (config.size_hint.max(1) as i128).saturating_mul(config.size_hint.max(1) as i128);

        let drawn = match rng.gen_range(0u8..8) {
            0 => rng.gen_range(min..=max),
            1 => {
                if rng.r#gen() {
                    min
                } else {
                    max
                }
            }
            _ => {
                let low = target.saturating_sub(reach).max(min);
                let high = target.saturating_add(reach).min(max);
                rng.gen_range(low..=high)
            }
        };

        <T as NumCast>::from(drawn).unwrap_or_else(|| self.target())
    }

    fn shrink(&self, value: &T) -> Box<dyn Iterator<Item = T>> {
        let value = wide(*value);
        let target = wide(self.target());
        if value == target || value < wide(self.min) || value > wide(self.max) {
            return Box::new(std::iter::empty());
        }
        Box::new(
            TowardTarget::new(value, target).filter_map(|candidate| <T as NumCast>::from(candidate)),
        )
    }
}

/// Lazily yields `target`, then values halving the remaining distance back
/// toward `value`: each candidate is strictly closer to `target` than `value`.
#[derive(Debug, Clone)]
struct TowardTarget {
    value: i128,
    distance: i128,
}

impl TowardTarget {
    fn new(value: i128, target: i128) -> Self {
        Self {
            value,
            distance: value - target,
        }
    }
}

impl Iterator for TowardTarget {
    type Item = i128;

    fn next(&mut self) -> Option<i128> {
        if self.distance == 0 {
            return None;
        }
        let candidate = self.value - self.distance;
        self.distance /= 2;
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_seeded_rng;

    #[test]
    fn test_int_generator_respects_bounds() {
        let generator = IntGenerator::new(2i64, 1000).unwrap();
        let mut rng = create_seeded_rng(42);

        for size in [1, 5, 50, 1000] {
            let config = GeneratorConfig::default().with_size_hint(size);
            for _ in 0..200 {
                let value = generator.generate(&mut rng, &config);
                assert!((2..=1000).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_small_size_hint_keeps_values_near_target() {
        let generator = IntGenerator::new(-1000i64, 1000).unwrap();
        let mut rng = create_seeded_rng(7);
        let config = GeneratorConfig::default().with_size_hint(2);

        let near = (0..400)
            .map(|_| generator.generate(&mut rng, &config))
            .filter(|v| v.abs() <= 4)
            .count();
        // Six of eight branches stay within size_hint² of zero
        assert!(near > 250, "only {} of 400 draws were small", near);
    }

    #[test]
    fn test_int_generator_full_range_types() {
        let mut rng = create_seeded_rng(1);
        let config = GeneratorConfig::default();

        let unsigned = IntGenerator::<u64>::full_range();
        let _ = unsigned.generate(&mut rng, &config);
        let signed = IntGenerator::<i8>::full_range();
        let v = signed.generate(&mut rng, &config);
        assert!(v >= i8::MIN);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let err = IntGenerator::new(5i32, 1).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidRange {
                min: "5".to_string(),
                max: "1".to_string()
            }
        );
    }

    #[test]
    fn test_shrink_toward_zero() {
        let generator = IntGenerator::new(-100i32, 100).unwrap();
        let shrinks: Vec<i32> = generator.shrink(&100).collect();
        assert_eq!(shrinks, vec![0, 50, 75, 88, 94, 97, 99]);

        let negative: Vec<i32> = generator.shrink(&-9).collect();
        assert_eq!(negative, vec![0, -5, -7, -8]);

        assert!(generator.shrink(&0).next().is_none());
    }

    #[test]
    fn test_shrink_toward_nearest_bound() {
        let generator = IntGenerator::new(2i64, 1000).unwrap();
        assert_eq!(generator.target(), 2);
        let shrinks: Vec<i64> = generator.shrink(&10).collect();
        assert_eq!(shrinks, vec![2, 6, 8, 9]);
        assert!(shrinks.iter().all(|v| *v >= 2));

        let below = IntGenerator::new(-50i64, -3).unwrap();
        assert_eq!(below.target(), -3);
        assert_eq!(below.shrink(&-7).next(), Some(-3));
    }

    #[test]
    fn test_shrink_extremes_do_not_overflow() {
        let generator = IntGenerator::<i64>::full_range();
        let from_min: Vec<i64> = generator.shrink(&i64::MIN).take(3).collect();
        assert_eq!(from_min[0], 0);
        assert!(from_min.iter().all(|v| *v > i64::MIN));

        let unsigned = IntGenerator::<u64>::full_range();
        assert_eq!(unsigned.shrink(&u64::MAX).next(), Some(0));
    }

    #[test]
    fn test_shrink_is_well_founded() {
        let generator = IntGenerator::new(-1000i64, 1000).unwrap();
        let mut current = 777i64;
        let mut steps = 0;
        // Always taking the last (closest) candidate still terminates
        while let Some(next) = generator.shrink(&current).last() {
            assert!(next.abs() < current.abs());
            current = next;
            steps += 1;
        }
        assert_eq!(current, 0);
        assert!(steps <= 777);
    }

    #[test]
    fn test_bool_generator() {
        let generator = BoolGenerator;
        assert_eq!(generator.shrink(&true).collect::<Vec<_>>(), vec![false]);
        assert!(generator.shrink(&false).next().is_none());
    }
}
