//! Chaum-Pedersen zero-knowledge proofs.
//!
//! - [`DisjunctiveChaumPedersenProof`]: a ciphertext encrypts one of `0..=limit` (0/1 for a
//!   selection) without revealing which.
//! - [`ChaumPedersenProof`]: a published partial decryption `M = pad^s` uses the secret behind
//!   a known public key `K = g^s`. Compensated shares use the same proof against a recovery key.
//! - [`ConstantChaumPedersenProof`]: a ciphertext encrypts a known constant, used for a
//!   contest's selection limit.

use crate::*;
use tracing::warn;

const DISJUNCTIVE_NONCE_HEADER: &str = "disjoint-chaum-pedersen-proof";
const CONSTANT_NONCE_HEADER: &str = "constant-chaum-pedersen-proof";

/// Constants above this are rejected by [`ConstantChaumPedersenProof::is_valid`].
pub const MAX_CONSTANT: u64 = 1_000_000_000;

/// One branch of a disjunctive proof, claiming the plaintext equals the branch index.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChaumPedersenBranch {
    /// `a_j`, the commitment in the `g` base
    pub pad: ElementModP,
    /// `b_j`, the commitment in the public key base
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

/// Proof that a ciphertext encrypts a value in `0..=limit`, one branch per allowed value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DisjunctiveChaumPedersenProof {
    pub branches: Vec<ChaumPedersenBranch>,
    pub challenge: ElementModQ,
    pub usage: ProofUsage,
}

/// Proof of correct (partial or compensated) decryption.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChaumPedersenProof {
    pub pad: ElementModP,
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
    pub usage: ProofUsage,
}

/// Proof that a ciphertext encrypts `constant`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConstantChaumPedersenProof {
    pub pad: ElementModP,
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
    pub constant: u64,
    pub usage: ProofUsage,
}

/// `K^v * g^(j*c) * β^(-c)`, the data commitment a branch for plaintext `j` must match.
fn branch_data_commitment(
    message: &ElGamalCiphertext,
    public_key: &ElementModP,
    plaintext: u64,
    challenge: &ElementModQ,
    response: &ElementModQ,
) -> ElementModP {
    let g_jc = g_pow_p(&mult_q(&[ElementModQ::from_u64(plaintext), challenge.clone()]));
    mult_p(&[
        pow_p(public_key, response),
        g_jc,
        pow_p(&message.data, &negate_q(challenge)),
    ])
}

fn disjunctive_challenge(
    crypto_extended_base_hash: &ElementModQ,
    message: &ElGamalCiphertext,
    branches: &[(ElementModP, ElementModP)],
) -> ElementModQ {
    let mut elems: Vec<&dyn CryptoHashable> = vec![
        crypto_extended_base_hash,
        &message.pad,
        &message.data,
    ];
    for (pad, data) in branches {
        elems.push(pad);
        elems.push(data);
    }
    hash_elems(&elems)
}

/// Prove that `message` encrypts `plaintext` with nonce `r`, out of the allowed values
/// `0..=limit`.
///
/// Simulated branch `k` (in order, skipping the true plaintext) takes its challenge and
/// response from nonces `2k` and `2k + 1`; the genuine branch's commitment nonce is `2 * limit`.
pub fn make_disjunctive_chaum_pedersen(
    message: &ElGamalCiphertext,
    r: &ElementModQ,
    plaintext: u64,
    limit: u64,
    public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    seed: &ElementModQ,
) -> Result<DisjunctiveChaumPedersenProof, Error> {
    if plaintext > limit {
        return Err(Error::PlaintextOutOfRange { plaintext, limit });
    }

    let nonces = Nonces::new(seed, &[&DISJUNCTIVE_NONCE_HEADER]);
    let u = nonces.get(2 * limit as i64)?;

    let mut commitments = Vec::with_capacity(limit as usize + 1);
    let mut simulated = Vec::with_capacity(limit as usize);
    for j in 0..=limit {
        if j == plaintext {
            commitments.push((g_pow_p(&u), pow_p(public_key, &u)));
            continue;
        }

        let k = simulated.len() as i64;
        let c_j = nonces.get(2 * k)?;
        let v_j = nonces.get(2 * k + 1)?;
        let a_j = mult_p(&[g_pow_p(&v_j), pow_p(&message.pad, &negate_q(&c_j))]);
        let b_j = branch_data_commitment(message, public_key, j, &c_j, &v_j);

        commitments.push((a_j, b_j));
        simulated.push((j, c_j, v_j));
    }

    let challenge = disjunctive_challenge(crypto_extended_base_hash, message, &commitments);
    let simulated_sum = add_q(simulated.iter().map(|(_, c, _)| c));
    let c_real = a_minus_b_q(&challenge, &simulated_sum);
    let v_real = a_plus_bc_q(&u, &c_real, r);

    let mut simulated = simulated.into_iter();
    let branches = commitments
        .into_iter()
        .enumerate()
        .map(|(j, (pad, data))| {
            let (challenge, response) = if j as u64 == plaintext {
                (c_real.clone(), v_real.clone())
            } else {
                match simulated.next() {
                    Some((_, c, v)) => (c, v),
                    None => (ElementModQ::zero(), ElementModQ::zero()),
                }
            };
            ChaumPedersenBranch {
                pad,
                data,
                challenge,
                response,
            }
        })
        .collect();

    Ok(DisjunctiveChaumPedersenProof {
        branches,
        challenge,
        usage: ProofUsage::SelectionValue,
    })
}

impl DisjunctiveChaumPedersenProof {
    /// The largest value this proof allows.
    pub fn limit(&self) -> u64 {
        self.branches.len().saturating_sub(1) as u64
    }

    /// Check the proof against `message`, allowing values `0..=limit`.
    ///
    /// The validation does the following:
    ///  - The proof has exactly one branch per allowed value
    ///  - Every ciphertext and commitment component is in the order-Q subgroup
    ///  - Every challenge and response is in bounds
    ///  - Branch challenges sum to the combined challenge, which is the hash of all commitments
    ///  - `g^v_j == a_j * α^c_j` and `K^v_j * g^(j*c_j) == b_j * β^c_j` for every branch
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
        limit: u64,
    ) -> bool {
        if self.branches.len() as u64 != limit + 1 {
            warn!(
                branches = self.branches.len(),
                limit, "disjunctive Chaum-Pedersen proof has the wrong number of branches"
            );
            return false;
        }

        let in_bounds_message = message.is_valid_residue();
        let in_bounds_commitments = self
            .branches
            .iter()
            .all(|b| b.pad.is_valid_residue() && b.data.is_valid_residue());
        let in_bounds_responses = self.challenge.is_in_bounds()
            && self
                .branches
                .iter()
                .all(|b| b.challenge.is_in_bounds() && b.response.is_in_bounds());

        let commitments: Vec<(ElementModP, ElementModP)> = self
            .branches
            .iter()
            .map(|b| (b.pad.clone(), b.data.clone()))
            .collect();
        let expected_challenge =
            disjunctive_challenge(crypto_extended_base_hash, message, &commitments);
        let consistent_challenges = self.challenge == expected_challenge
            && add_q(self.branches.iter().map(|b| &b.challenge)) == self.challenge;

        let valid_branches = self.branches.iter().enumerate().all(|(j, b)| {
            let valid_pad = g_pow_p(&b.response)
                == mult_p(&[b.pad.clone(), pow_p(&message.pad, &b.challenge)]);
            let expected_data =
                branch_data_commitment(message, public_key, j as u64, &b.challenge, &b.response);
            valid_pad && expected_data == b.data
        });

        let success = in_bounds_message
            && in_bounds_commitments
            && in_bounds_responses
            && consistent_challenges
            && valid_branches;
        if !success {
            warn!(
                in_bounds_message,
                in_bounds_commitments,
                in_bounds_responses,
                consistent_challenges,
                valid_branches,
                "found an invalid disjunctive Chaum-Pedersen proof"
            );
        }
        success
    }
}

/// Prove that `m = message.pad^s` for the `s` behind `public_key = g^s`.
///
/// `m` is carried by the caller; the proof binds it through the challenge hash.
pub fn make_chaum_pedersen(
    message: &ElGamalCiphertext,
    s: &ElementModQ,
    m: &ElementModP,
    seed: &ElementModQ,
    crypto_extended_base_hash: &ElementModQ,
) -> Result<ChaumPedersenProof, Error> {
    let u = Nonces::new(seed, &[&CONSTANT_NONCE_HEADER]).get(0)?;
    let a = g_pow_p(&u);
    let b = pow_p(&message.pad, &u);
    let c = hash_elems!(crypto_extended_base_hash, message.pad, message.data, a, b, m);
    let v = a_plus_bc_q(&u, &c, s);

    Ok(ChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
        usage: ProofUsage::SelectionValue,
    })
}

impl ChaumPedersenProof {
    /// Check that `m` is the partial decryption of `message` under the secret behind `k`.
    ///
    /// For a compensated share, `k` is the missing guardian's recovery public key.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        m: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;

        let in_bounds_alpha = alpha.is_valid_residue();
        let in_bounds_beta = beta.is_valid_residue();
        let in_bounds_k = k.is_valid_residue();
        let in_bounds_m = m.is_valid_residue();
        let in_bounds_a = a.is_valid_residue();
        let in_bounds_b = b.is_valid_residue();
        let in_bounds_c = c.is_in_bounds();
        let in_bounds_v = v.is_in_bounds();

        let same_c = *c == hash_elems!(crypto_extended_base_hash, alpha, beta, a, b, m);
        let consistent_gv = g_pow_p(v) == mult_p(&[a.clone(), pow_p(k, c)]);
        let consistent_av = pow_p(alpha, v) == mult_p(&[b.clone(), pow_p(m, c)]);

        let success = in_bounds_alpha
            && in_bounds_beta
            && in_bounds_k
            && in_bounds_m
            && in_bounds_a
            && in_bounds_b
            && in_bounds_c
            && in_bounds_v
            && same_c
            && consistent_gv
            && consistent_av;
        if !success {
            warn!(
                in_bounds_alpha,
                in_bounds_beta,
                in_bounds_k,
                in_bounds_m,
                in_bounds_a,
                in_bounds_b,
                in_bounds_c,
                in_bounds_v,
                same_c,
                consistent_gv,
                consistent_av,
                "found an invalid Chaum-Pedersen decryption proof"
            );
        }
        success
    }
}

/// Prove that `message` encrypts `constant` with aggregate nonce `r`.
pub fn make_constant_chaum_pedersen(
    message: &ElGamalCiphertext,
    constant: u64,
    r: &ElementModQ,
    k: &ElementModP,
    seed: &ElementModQ,
    crypto_extended_base_hash: &ElementModQ,
) -> Result<ConstantChaumPedersenProof, Error> {
    let u = Nonces::new(seed, &[&CONSTANT_NONCE_HEADER]).get(0)?;
    let a = g_pow_p(&u);
    let b = pow_p(k, &u);
    let c = hash_elems!(crypto_extended_base_hash, message.pad, message.data, a, b);
    let v = a_plus_bc_q(&u, &c, r);

    Ok(ConstantChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
        constant,
        usage: ProofUsage::SelectionLimit,
    })
}

impl ConstantChaumPedersenProof {
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;

        let in_bounds_alpha = alpha.is_valid_residue();
        let in_bounds_beta = beta.is_valid_residue();
        let in_bounds_a = a.is_valid_residue();
        let in_bounds_b = b.is_valid_residue();
        let in_bounds_c = c.is_in_bounds();
        let in_bounds_v = v.is_in_bounds();
        let in_bounds_constant = self.constant < MAX_CONSTANT;

        let same_c = *c == hash_elems!(crypto_extended_base_hash, alpha, beta, a, b);
        let consistent_gv = g_pow_p(v) == mult_p(&[a.clone(), pow_p(alpha, c)]);

        let constant_q = ElementModQ::from_u64(self.constant);
        let consistent_kv = mult_p(&[g_pow_p(&mult_q(&[c.clone(), constant_q])), pow_p(k, v)])
            == mult_p(&[b.clone(), pow_p(beta, c)]);

        let success = in_bounds_alpha
            && in_bounds_beta
            && in_bounds_a
            && in_bounds_b
            && in_bounds_c
            && in_bounds_v
            && in_bounds_constant
            && same_c
            && consistent_gv
            && consistent_kv;
        if !success {
            warn!(
                in_bounds_alpha,
                in_bounds_beta,
                in_bounds_a,
                in_bounds_b,
                in_bounds_c,
                in_bounds_v,
                in_bounds_constant,
                same_c,
                consistent_gv,
                consistent_kv,
                "found an invalid constant Chaum-Pedersen proof"
            );
        }
        success
    }
}
