use crate::*;

/// A deterministic sequence of `ElementModQ` nonces derived from a seed.
///
/// Rebuilding a sequence from the same seed and headers reproduces every nonce, which is what
/// makes an encryption auditable when its seed is revealed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonces {
    seed: ElementModQ,
}

impl Nonces {
    /// Create a sequence from a seed and optional context headers.
    ///
    /// With headers, the effective seed is `hash_elems(seed, headers...)`.
    pub fn new(seed: &ElementModQ, headers: &[&dyn CryptoHashable]) -> Self {
        if headers.is_empty() {
            return Nonces { seed: seed.clone() };
        }

        let mut elems: Vec<&dyn CryptoHashable> = Vec::with_capacity(headers.len() + 1);
        elems.push(seed);
        elems.extend_from_slice(headers);

        Nonces {
            seed: hash_elems(&elems),
        }
    }

    pub fn seed(&self) -> &ElementModQ {
        &self.seed
    }

    /// The nonce at `index`, `hash_elems(seed, index)`.
    pub fn get(&self, index: i64) -> Result<ElementModQ, Error> {
        if index < 0 {
            return Err(Error::NegativeNonceIndex(index));
        }
        Ok(hash_elems!(self.seed, index))
    }

    /// The first `count` nonces.
    pub fn take(&self, count: usize) -> Vec<ElementModQ> {
        (0..count as i64)
            .map(|index| hash_elems!(self.seed, index))
            .collect()
    }
}
