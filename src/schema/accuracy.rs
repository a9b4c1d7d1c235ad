//! Accuracy ladders (spec.md §4.2 point 3 / GLOSSARY "Accuracy ladder"):
//! a sorted list of bucket sizes for numeric/date/time/timedelta/geo
//! fields, paired with a per-level accuracy prefix, so a range query can
//! be rewritten into an OR of coarse terms (§4.4) instead of scanning
//! every posting.

use crate::core::utils::xxhash64;
use crate::schema::specification::ConcreteType;

/// Default ladders mirror the original server's `default_accuracy.h`: date
/// buckets in seconds-of-precision doublings up through year/century, plain
/// numeric buckets in powers of ten, geo levels as HTM tree depths.
pub fn default_for(concrete: ConcreteType) -> Vec<i64> {
    match concrete {
        ConcreteType::Integer | ConcreteType::Positive | ConcreteType::Float => {
            vec![100, 1_000, 10_000, 100_000, 1_000_000]
        }
        ConcreteType::Date => vec![
            60,          // minute
            3_600,       // hour
            86_400,      // day
            2_592_000,   // month (30d)
            31_536_000,  // year
        ],
        ConcreteType::Time | ConcreteType::TimeDelta => vec![60, 3_600],
        ConcreteType::Geo => vec![1, 2, 4, 6, 8, 10, 12],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccuracyLadder {
    /// Bucket sizes, strictly ascending (enforced by `AccuracyLadder::new`).
    pub steps: Vec<i64>,
    /// Parallel accuracy-term prefixes, one per `steps` entry.
    pub prefixes: Vec<Vec<u8>>,
}

impl AccuracyLadder {
    /// Build a ladder for `full_meta_name`, deriving one accuracy prefix
    /// per step from the field's path plus the step's bucket size so two
    /// fields with identical ladders never collide on accuracy terms.
    pub fn new(full_meta_name: &str, mut steps: Vec<i64>) -> Self {
        steps.sort_unstable();
        steps.dedup();
        let prefixes = steps
            .iter()
            .map(|step| accuracy_prefix(full_meta_name, *step))
            .collect();
        AccuracyLadder { steps, prefixes }
    }

    pub fn for_type(full_meta_name: &str, concrete: ConcreteType) -> Self {
        AccuracyLadder::new(full_meta_name, default_for(concrete))
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Bucket `value` to the step at `level`, per §4.3 point 5 ("the value
    /// bucketed to that step").
    pub fn bucket(&self, level: usize, value: i64) -> Option<i64> {
        self.steps.get(level).map(|step| {
            if *step == 0 {
                value
            } else {
                value.div_euclid(*step) * step
            }
        })
    }

    /// Levels ordered coarsest-first, used by the query compiler's range
    /// rewrite (§4.4) to greedily cover a span with the fewest terms.
    pub fn coarsest_first(&self) -> impl Iterator<Item = (usize, i64, &[u8])> {
        (0..self.steps.len())
            .rev()
            .map(move |i| (i, self.steps[i], self.prefixes[i].as_slice()))
    }
}

fn accuracy_prefix(full_meta_name: &str, step: i64) -> Vec<u8> {
    let key = format!("{}\u{0}{}", full_meta_name.to_uppercase(), step);
    let h = xxhash64(key.as_bytes(), 0xACC0_u64);
    let mut out = h.to_le_bytes()[..4].to_vec();
    out.push(b'#'); // marks an accuracy term distinct from a field-term
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ladder_is_sorted_ascending() {
        let ladder = AccuracyLadder::for_type("year", ConcreteType::Integer);
        let mut sorted = ladder.steps.clone();
        sorted.sort_unstable();
        assert_eq!(ladder.steps, sorted);
    }

    #[test]
    fn bucketing_rounds_down_to_step_multiple() {
        let ladder = AccuracyLadder::new("year", vec![100]);
        assert_eq!(ladder.bucket(0, 1234), Some(1200));
        assert_eq!(ladder.bucket(0, -50), Some(-100));
    }

    #[test]
    fn prefixes_differ_across_fields_and_steps() {
        let a = AccuracyLadder::new("year", vec![100, 1000]);
        let b = AccuracyLadder::new("price", vec![100, 1000]);
        assert_ne!(a.prefixes[0], b.prefixes[0]);
        assert_ne!(a.prefixes[0], a.prefixes[1]);
    }

    #[test]
    fn coarsest_first_reverses_step_order() {
        let ladder = AccuracyLadder::new("year", vec![10, 100, 1000]);
        let levels: Vec<i64> = ladder.coarsest_first().map(|(_, step, _)| step).collect();
        assert_eq!(levels, vec![1000, 100, 10]);
    }
}
