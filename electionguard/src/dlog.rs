use crate::*;
use std::collections::HashMap;

/// A bounded discrete-log table for `g^x`, owned by a tally or decryption session.
///
/// Tallies are bounded by the number of ballots cast, so the table is never extended beyond
/// `max_exponent`. Entries are filled lazily on lookup, or all at once with [`precompute`].
///
/// [`precompute`]: DiscreteLog::precompute
#[derive(Clone, Debug)]
pub struct DiscreteLog {
    max_exponent: u64,
    table: HashMap<ElementModP, u64>,
    last_element: ElementModP,
    last_exponent: u64,
}

impl DiscreteLog {
    pub fn new(max_exponent: u64) -> Self {
        let mut table = HashMap::new();
        table.insert(ElementModP::one(), 0);

        DiscreteLog {
            max_exponent,
            table,
            last_element: ElementModP::one(),
            last_exponent: 0,
        }
    }

    pub fn max_exponent(&self) -> u64 {
        self.max_exponent
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Fill the table up to `max_exponent`.
    pub fn precompute(&mut self) {
        self.extend_until(None);
    }

    /// Find `x` such that `g^x == element`, with `0 <= x <= max_exponent`.
    pub fn discrete_log(&mut self, element: &ElementModP) -> Result<u64, Error> {
        if let Some(exponent) = self.table.get(element) {
            return Ok(*exponent);
        }

        self.extend_until(Some(element))
            .ok_or(Error::DiscreteLogNotFound(self.max_exponent))
    }

    fn extend_until(&mut self, target: Option<&ElementModP>) -> Option<u64> {
        let g = ElementModP::generator();
        while self.last_exponent < self.max_exponent {
            self.last_element = mult_p(&[self.last_element.clone(), g.clone()]);
            self.last_exponent += 1;
            self.table
                .insert(self.last_element.clone(), self.last_exponent);

            if target == Some(&self.last_element) {
                return Some(self.last_exponent);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_small_exponents() {
        let mut dlog = DiscreteLog::new(100);
        assert_eq!(dlog.discrete_log(&ElementModP::one()).unwrap(), 0);
        assert_eq!(dlog.discrete_log(&g_pow_p(&ElementModQ::from_u64(42))).unwrap(), 42);
        // Cached lookups below the high-water mark
        assert_eq!(dlog.discrete_log(&g_pow_p(&ElementModQ::from_u64(3))).unwrap(), 3);
        assert_eq!(dlog.len(), 43);
    }

    #[test]
    fn respects_its_bound() {
        let mut dlog = DiscreteLog::new(10);
        let result = dlog.discrete_log(&g_pow_p(&ElementModQ::from_u64(11)));
        assert!(matches!(result, Err(Error::DiscreteLogNotFound(10))));
        assert_eq!(dlog.len(), 11);
    }

    #[test]
    fn precompute_fills_the_table() {
        let mut dlog = DiscreteLog::new(20);
        dlog.precompute();
        assert_eq!(dlog.len(), 21);
        assert_eq!(dlog.discrete_log(&g_pow_p(&ElementModQ::from_u64(20))).unwrap(), 20);
    }
}
