use crate::*;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

/// Election configuration, usually loaded from JSON.
///
/// ```json
/// { "number_of_guardians": 5, "quorum": 3, "max_tally": 10000 }
/// ```
///
/// Missing fields take their defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ElectionConfig {
    pub number_of_guardians: usize,
    pub quorum: usize,

    /// RSA modulus size for the auxiliary channel
    pub auxiliary_key_size: usize,

    /// Upper bound on any decrypted tally, which sizes the discrete log table
    pub max_tally: u64,

    /// Random-base primality rounds used when validating group constants
    pub primality_iterations: usize,

    pub execution_mode: ExecutionMode,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        ElectionConfig {
            number_of_guardians: 1,
            quorum: 1,
            auxiliary_key_size: DEFAULT_AUXILIARY_KEY_SIZE,
            max_tally: 100_000,
            primality_iterations: 50,
            execution_mode: ExecutionMode::Parallel,
        }
    }
}

impl ElectionConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: ElectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quorum == 0 || self.quorum > self.number_of_guardians {
            return Err(ValidationError::InvalidConfig(format!(
                "quorum {} is invalid for {} guardians",
                self.quorum, self.number_of_guardians
            )));
        }
        // OAEP-SHA256 needs room for a 64 character coordinate
        if self.auxiliary_key_size < 1024 {
            return Err(ValidationError::InvalidConfig(format!(
                "auxiliary key size {} is too small",
                self.auxiliary_key_size
            )));
        }
        Ok(())
    }

    pub fn ceremony_details(&self) -> Result<CeremonyDetails, Error> {
        CeremonyDetails::new(self.number_of_guardians, self.quorum)
    }

    pub fn auxiliary_channel(&self) -> RsaAuxiliaryChannel {
        RsaAuxiliaryChannel::new(self.auxiliary_key_size)
    }

    pub fn discrete_log(&self) -> DiscreteLog {
        DiscreteLog::new(self.max_tally)
    }
}

/// The group parameters, published alongside election records.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionConstants {
    /// large prime `P`
    pub large_prime: String,
    /// small prime `Q`
    pub small_prime: String,
    /// cofactor `R = (P - 1) / Q`
    pub cofactor: String,
    /// generator `G`
    pub generator: String,
}

impl Default for ElectionConstants {
    fn default() -> Self {
        ElectionConstants {
            large_prime: biguint_to_hex(&P),
            small_prime: biguint_to_hex(&Q),
            cofactor: biguint_to_hex(&R),
            generator: biguint_to_hex(&G),
        }
    }
}

impl ElectionConstants {
    /// Check that the constants describe the group this crate computes in.
    ///
    /// Only `Q` is tested for primality; testing the 4096-bit `P` is left to callers that can
    /// afford it.
    pub fn validate<T: RngCore + CryptoRng>(
        &self,
        primality_iterations: usize,
        rng: &mut T,
    ) -> Result<(), ValidationError> {
        let parse = |hex: &str, name: &'static str| {
            BigUint::parse_bytes(hex.as_bytes(), 16).ok_or(ValidationError::InvalidConstants(name))
        };
        let p = parse(&self.large_prime, "large prime is not hexadecimal")?;
        let q = parse(&self.small_prime, "small prime is not hexadecimal")?;
        let r = parse(&self.cofactor, "cofactor is not hexadecimal")?;
        let g = parse(&self.generator, "generator is not hexadecimal")?;

        if p != *P || q != *Q || r != *R || g != *G {
            return Err(ValidationError::InvalidConstants(
                "constants differ from the compiled group",
            ));
        }
        if &r * &q + 1u32 != p {
            return Err(ValidationError::InvalidConstants("P - 1 != R * Q"));
        }
        if !is_prime(&q, primality_iterations, rng) {
            return Err(ValidationError::InvalidConstants("Q is not prime"));
        }
        Ok(())
    }
}
