//! Per-span attribute value generation.
//!
//! Each generator variant produces a fresh [`AttributeValue`] every time it
//! is asked. Generators are cheap to clone; a cloned `Sequence` shares its
//! counter so numbering stays gapless across workers.

use crate::error::{Error, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use synth_model::AttrSpec;

/// A value that can be stored as a span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A 64-bit integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl AttributeValue {
    /// Converts this value to a string representation.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A declarative attribute value generator.
#[derive(Debug, Clone)]
pub enum AttributeGenerator {
    /// Always returns the configured value.
    Static(AttributeValue),
    /// Weighted choice over string values with cumulative weights.
    WeightedChoice {
        /// `(value, cumulative_weight)` pairs in lexicographic value order.
        choices: Vec<(String, i64)>,
        /// Sum of all weights.
        total: i64,
    },
    /// Pattern with `{n}` fed by a run-wide monotonic counter.
    Sequence {
        /// The pattern containing a literal `{n}` placeholder.
        pattern: String,
        /// Shared counter, starts at 1.
        counter: Arc<AtomicU64>,
    },
    /// Uniform integer in `[min, max]` inclusive.
    Range {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Unclamped normal float.
    Normal {
        /// Mean of the distribution.
        mean: f64,
        /// Standard deviation.
        stddev: f64,
    },
    /// Boolean that is `true` with the given probability.
    Bool {
        /// Probability of `true`.
        probability: f64,
    },
}

impl AttributeGenerator {
    /// Builds a generator from an attribute spec.
    ///
    /// # Errors
    ///
    /// Returns an error when the spec sets zero or more than one variant,
    /// or a variant violates its constraints.
    pub fn from_spec(spec: &AttrSpec) -> Result<Self> {
        spec.validate()?;

        if let Some(value) = &spec.value {
            return Ok(Self::Static(static_value(value)?));
        }
        if let Some(values) = &spec.values {
            // BTreeMap iteration is lexicographic, which fixes the
            // accumulation order regardless of config source ordering.
            let mut choices = Vec::with_capacity(values.len());
            let mut total: i64 = 0;
            for (value, weight) in values {
                total = total.checked_add(*weight).ok_or_else(|| {
                    Error::InvalidGenerator("weighted choice weights overflow i64".to_string())
                })?;
                choices.push((value.clone(), total));
            }
            return Ok(Self::WeightedChoice { choices, total });
        }
        if let Some(pattern) = &spec.sequence {
            return Ok(Self::Sequence {
                pattern: pattern.clone(),
                counter: Arc::new(AtomicU64::new(1)),
            });
        }
        if let Some((min, max)) = spec.range {
            return Ok(Self::Range { min, max });
        }
        if let Some(normal) = spec.normal {
            return Ok(Self::Normal {
                mean: normal.mean,
                stddev: normal.stddev,
            });
        }
        if let Some(probability) = spec.probability {
            return Ok(Self::Bool { probability });
        }

        Err(Error::InvalidGenerator(
            "attribute spec sets no variant".to_string(),
        ))
    }

    /// Produces the next value.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> AttributeValue {
        match self {
            Self::Static(value) => value.clone(),
            Self::WeightedChoice { choices, total } => {
                let draw = rng.gen_range(0..*total);
                let index = choices.partition_point(|(_, cumulative)| *cumulative <= draw);
                AttributeValue::String(choices[index].0.clone())
            }
            Self::Sequence { pattern, counter } => {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                AttributeValue::String(pattern.replace("{n}", &n.to_string()))
            }
            Self::Range { min, max } => AttributeValue::Int(rng.gen_range(*min..=*max)),
            Self::Normal { mean, stddev } => {
                let noise: f64 = rng.sample(StandardNormal);
                AttributeValue::Float(stddev.mul_add(noise, *mean))
            }
            Self::Bool { probability } => AttributeValue::Bool(rng.gen_bool(*probability)),
        }
    }
}

fn static_value(value: &serde_yaml::Value) -> Result<AttributeValue> {
    match value {
        serde_yaml::Value::String(s) => Ok(AttributeValue::String(s.clone())),
        serde_yaml::Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map(AttributeValue::Int)
            .or_else(|| n.as_f64().map(AttributeValue::Float))
            .ok_or_else(|| Error::InvalidGenerator(format!("unrepresentable number {n}"))),
        _ => Err(Error::InvalidGenerator(
            "static value must be a scalar".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;
    use std::thread;

    fn spec_with_values(values: &[(&str, i64)]) -> AttrSpec {
        AttrSpec {
            values: Some(
                values
                    .iter()
                    .map(|(value, weight)| ((*value).to_string(), *weight))
                    .collect(),
            ),
            ..AttrSpec::default()
        }
    }

    #[test]
    fn static_values_keep_their_type() {
        let spec = AttrSpec {
            value: Some(serde_yaml::Value::from("eu-west-1")),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(gen.generate(&mut rng), AttributeValue::String("eu-west-1".to_string()));

        let spec = AttrSpec {
            value: Some(serde_yaml::Value::from(42)),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        assert_eq!(gen.generate(&mut rng), AttributeValue::Int(42));

        let spec = AttrSpec {
            value: Some(serde_yaml::Value::from(true)),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        assert_eq!(gen.generate(&mut rng), AttributeValue::Bool(true));
    }

    #[test]
    fn static_rejects_non_scalars() {
        let spec = AttrSpec {
            value: Some(serde_yaml::Value::Sequence(Vec::new())),
            ..AttrSpec::default()
        };
        assert!(AttributeGenerator::from_spec(&spec).is_err());
    }

    #[test]
    fn weighted_choice_is_deterministic_for_a_seed() {
        let gen = AttributeGenerator::from_spec(&spec_with_values(&[("a", 1), ("b", 3)])).unwrap();

        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(gen.generate(&mut rng1), gen.generate(&mut rng2));
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn weighted_choice_frequencies_match_weights() {
        let gen = AttributeGenerator::from_spec(&spec_with_values(&[("a", 1), ("b", 3)])).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        const N: usize = 10_000;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for _ in 0..N {
            let AttributeValue::String(value) = gen.generate(&mut rng) else {
                panic!("weighted choice must produce strings");
            };
            *counts.entry(value).or_default() += 1;
        }

        let a_share = counts["a"] as f64 / N as f64;
        let b_share = counts["b"] as f64 / N as f64;
        assert!((a_share - 0.25).abs() < 0.01, "a share {a_share}");
        assert!((b_share - 0.75).abs() < 0.01, "b share {b_share}");
    }

    #[test]
    fn sequence_is_gapless_across_threads() {
        let spec = AttrSpec {
            sequence: Some("req-{n}".to_string()),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                thread::spawn(move || {
                    let mut rng = ChaCha8Rng::seed_from_u64(0);
                    (0..250)
                        .map(|_| gen.generate(&mut rng).as_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut numbers: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .map(|value| value.strip_prefix("req-").unwrap().parse().unwrap())
            .collect();
        numbers.sort_unstable();

        let expected: Vec<u64> = (1..=1000).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn range_is_inclusive() {
        let spec = AttrSpec {
            range: Some((5, 5)),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(gen.generate(&mut rng), AttributeValue::Int(5));
        }

        let spec = AttrSpec {
            range: Some((1, 10)),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        for _ in 0..1000 {
            let AttributeValue::Int(value) = gen.generate(&mut rng) else {
                panic!("range must produce integers");
            };
            assert!((1..=10).contains(&value));
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn normal_is_unclamped() {
        let spec = AttrSpec {
            normal: Some(synth_model::NormalSpec {
                mean: 0.0,
                stddev: 10.0,
            }),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let samples: Vec<f64> = (0..10_000)
            .map(|_| {
                let AttributeValue::Float(value) = gen.generate(&mut rng) else {
                    panic!("normal must produce floats");
                };
                value
            })
            .collect();

        assert!(samples.iter().any(|v| *v < 0.0), "negatives expected");
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.5, "mean {mean} too far from 0");
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn bool_respects_probability() {
        let spec = AttrSpec {
            probability: Some(0.2),
            ..AttrSpec::default()
        };
        let gen = AttributeGenerator::from_spec(&spec).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        const N: usize = 10_000;
        let trues = (0..N)
            .filter(|_| gen.generate(&mut rng) == AttributeValue::Bool(true))
            .count();
        let share = trues as f64 / N as f64;
        assert!((share - 0.2).abs() < 0.02, "true share {share}");
    }

    #[test]
    fn from_spec_rejects_ambiguous_specs() {
        assert!(AttributeGenerator::from_spec(&AttrSpec::default()).is_err());

        let double = AttrSpec {
            sequence: Some("x-{n}".to_string()),
            probability: Some(0.5),
            ..AttrSpec::default()
        };
        assert!(AttributeGenerator::from_spec(&double).is_err());
    }
}
