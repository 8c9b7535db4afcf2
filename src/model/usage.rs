//! Token usage accounting.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token counters reported by a model generation or accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
    pub cached_input_tokens: u64,
}

impl Usage {
    /// Usage with every counter at zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether every counter is zero
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Elementwise sum of two usage records
pub fn sum_usage(a: &Usage, b: &Usage) -> Usage {
    Usage {
        input_tokens: a.input_tokens + b.input_tokens,
        output_tokens: a.output_tokens + b.output_tokens,
        reasoning_tokens: a.reasoning_tokens + b.reasoning_tokens,
        total_tokens: a.total_tokens + b.total_tokens,
        cached_input_tokens: a.cached_input_tokens + b.cached_input_tokens,
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        sum_usage(&self, &rhs)
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = sum_usage(self, &rhs);
    }
}

impl std::iter::Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Self {
        iter.fold(Usage::zero(), |acc, u| acc + u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(seed: u64) -> Usage {
        Usage {
            input_tokens: seed,
            output_tokens: seed * 2,
            reasoning_tokens: seed * 3,
            total_tokens: seed * 4,
            cached_input_tokens: seed * 5,
        }
    }

    #[test]
    fn test_sum_usage_is_elementwise() {
        let total = sum_usage(&usage(1), &usage(10));
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 22);
        assert_eq!(total.reasoning_tokens, 33);
        assert_eq!(total.total_tokens, 44);
        assert_eq!(total.cached_input_tokens, 55);
    }

    #[test]
    fn test_add_assign_and_sum() {
        let mut acc = Usage::zero();
        acc += usage(2);
        assert_eq!(acc, usage(2));

        let summed: Usage = vec![usage(1), usage(2), usage(3)].into_iter().sum();
        assert_eq!(summed, usage(6));
        assert!(Usage::zero().is_zero());
    }

    #[test]
    fn test_usage_serializes_camel_case() {
        let json = serde_json::to_value(usage(1)).unwrap();
        assert_eq!(json["cachedInputTokens"], 5);
        assert_eq!(json["inputTokens"], 1);
    }
}
