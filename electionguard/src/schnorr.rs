use crate::*;
use tracing::warn;

/// Records which protocol step produced a proof.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProofUsage {
    Unknown,
    SecretValue,
    SelectionLimit,
    SelectionValue,
}

/// Proof of knowledge of the secret key behind a public key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SchnorrProof {
    pub public_key: ElementModP,
    pub commitment: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
    pub usage: ProofUsage,
}

/// Prove knowledge of `keypair.secret_key` using the random commitment nonce `r`.
pub fn make_schnorr_proof(keypair: &ElGamalKeyPair, r: &ElementModQ) -> SchnorrProof {
    let commitment = g_pow_p(r);
    let challenge = hash_elems!(keypair.public_key, commitment);
    let response = a_plus_bc_q(r, &keypair.secret_key, &challenge);

    SchnorrProof {
        public_key: keypair.public_key.clone(),
        commitment,
        challenge,
        response,
        usage: ProofUsage::SecretValue,
    }
}

impl SchnorrProof {
    /// Check the proof against the public key it carries.
    ///
    /// The validation does the following:
    ///  - The public key and commitment are members of the order-Q subgroup
    ///  - The challenge and response are in bounds
    ///  - The challenge is `H(public_key, commitment)`
    ///  - `g^response == commitment * public_key^challenge`
    pub fn is_valid(&self) -> bool {
        let k = &self.public_key;
        let h = &self.commitment;
        let u = &self.response;

        let valid_public_key = k.is_valid_residue();
        let in_bounds_h = h.is_valid_residue();
        let in_bounds_u = u.is_in_bounds() && self.challenge.is_in_bounds();
        let valid_challenge = self.challenge == hash_elems!(k, h);
        let valid_proof = g_pow_p(u) == mult_p(&[h.clone(), pow_p(k, &self.challenge)]);

        let success =
            valid_public_key && in_bounds_h && in_bounds_u && valid_challenge && valid_proof;
        if !success {
            warn!(
                valid_public_key,
                in_bounds_h,
                in_bounds_u,
                valid_challenge,
                valid_proof,
                "found an invalid Schnorr proof"
            );
        }
        success
    }
}
