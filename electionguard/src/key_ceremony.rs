use crate::*;
use rand::{CryptoRng, RngCore};
use tracing::warn;

/// Number of guardians and the quorum needed to decrypt.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CeremonyDetails {
    pub number_of_guardians: usize,
    pub quorum: usize,
}

impl CeremonyDetails {
    pub fn new(number_of_guardians: usize, quorum: usize) -> Result<Self, Error> {
        if quorum == 0 || quorum > number_of_guardians {
            return Err(Error::InvalidCeremonyDetails {
                number_of_guardians,
                quorum,
            });
        }
        Ok(CeremonyDetails {
            number_of_guardians,
            quorum,
        })
    }

    /// Guardians that may be absent at decryption, `N - K`.
    pub fn max_missing(&self) -> usize {
        self.number_of_guardians - self.quorum
    }
}

/// A guardian's election key pair together with the polynomial that shares it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionKeyPair {
    pub key_pair: ElGamalKeyPair,
    pub proof: SchnorrProof,
    pub polynomial: ElectionPolynomial,
}

/// A guardian's published election public key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    pub proof: SchnorrProof,
    pub key: ElementModP,
}

/// Everything a guardian publishes at the start of the ceremony.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeySet {
    pub owner_id: String,
    pub sequence_order: u64,
    #[serde(with = "BytesHex")]
    pub auxiliary_public_key: Vec<u8>,
    pub election_public_key: ElementModP,
    pub election_public_key_proof: SchnorrProof,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl PublicKeySet {
    pub fn election_public_key(&self) -> ElectionPublicKey {
        ElectionPublicKey {
            owner_id: self.owner_id.clone(),
            sequence_order: self.sequence_order,
            proof: self.election_public_key_proof.clone(),
            key: self.election_public_key.clone(),
        }
    }

    pub fn auxiliary_public_key(&self) -> AuxiliaryPublicKey {
        AuxiliaryPublicKey {
            owner_id: self.owner_id.clone(),
            sequence_order: self.sequence_order,
            key: self.auxiliary_public_key.clone(),
        }
    }

    pub fn coefficient_validation_set(&self) -> CoefficientValidationSet {
        CoefficientValidationSet {
            owner_id: self.owner_id.clone(),
            coefficient_commitments: self.coefficient_commitments.clone(),
            coefficient_proofs: self.coefficient_proofs.clone(),
        }
    }

    pub fn guardian_record(&self) -> GuardianRecord {
        GuardianRecord::new(&self.election_public_key(), &self.coefficient_validation_set())
    }

    /// Every coefficient proof is valid and the first one proves the published key.
    pub fn is_valid(&self) -> bool {
        self.coefficient_proofs.first() == Some(&self.election_public_key_proof)
            && self.guardian_record().is_valid()
    }
}

/// The owner's polynomial evaluated at the designated guardian's sequence order, encrypted
/// for the designated guardian.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyBackup {
    pub owner_id: String,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    #[serde(with = "BytesHex")]
    pub encrypted_value: Vec<u8>,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// The outcome of checking one backup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyVerification {
    pub owner_id: String,
    pub designated_id: String,
    pub verifier_id: String,
    pub verified: bool,
}

/// A backup published in the clear so any party can check a disputed verification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyChallenge {
    pub owner_id: String,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    pub value: ElementModQ,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// Public commitments and proofs for a guardian's polynomial.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CoefficientValidationSet {
    pub owner_id: String,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// What a guardian publishes for verifiers once the ceremony is complete.
///
/// The commitments let anyone recompute the public image `g^P(l)` of the guardian's polynomial
/// at any sequence order, which is how a share rebuilt for a missing guardian is checked.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GuardianRecord {
    pub guardian_id: String,
    pub sequence_order: u64,
    pub election_public_key: ElementModP,
    pub election_commitments: Vec<ElementModP>,
    pub election_proofs: Vec<SchnorrProof>,
}

impl GuardianRecord {
    pub fn new(public_key: &ElectionPublicKey, validation_set: &CoefficientValidationSet) -> Self {
        GuardianRecord {
            guardian_id: public_key.owner_id.clone(),
            sequence_order: public_key.sequence_order,
            election_public_key: public_key.key.clone(),
            election_commitments: validation_set.coefficient_commitments.clone(),
            election_proofs: validation_set.coefficient_proofs.clone(),
        }
    }

    /// Every commitment is proven and the first one is the election public key.
    pub fn is_valid(&self) -> bool {
        self.election_commitments.first() == Some(&self.election_public_key)
            && self.election_commitments.len() == self.election_proofs.len()
            && self
                .election_proofs
                .iter()
                .zip(&self.election_commitments)
                .all(|(proof, commitment)| proof.public_key == *commitment && proof.is_valid())
    }

    /// `g^P(l)` for the guardian at `sequence_order`, the key its compensated shares prove against.
    pub fn recovery_public_key(&self, sequence_order: u64) -> ElementModP {
        compute_polynomial_commitment(sequence_order, &self.election_commitments)
    }
}

/// The joint election key and the hash of every guardian's commitments.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionJointKey {
    pub joint_public_key: ElementModP,
    pub commitment_hash: ElementModQ,
}

/// Generate an election key pair and the degree `quorum - 1` polynomial that shares it.
pub fn generate_election_key_pair<R: RngCore + CryptoRng>(
    quorum: usize,
    nonce: Option<&ElementModQ>,
    rng: &mut R,
) -> Result<ElectionKeyPair, Error> {
    let polynomial = generate_polynomial(quorum, nonce, rng)?;
    let key_pair = ElGamalKeyPair {
        secret_key: polynomial.coefficients[0].clone(),
        public_key: polynomial.coefficient_commitments[0].clone(),
    };
    let proof = polynomial.coefficient_proofs[0].clone();

    Ok(ElectionKeyPair {
        key_pair,
        proof,
        polynomial,
    })
}

/// Evaluate `polynomial` at the designated guardian's sequence order and encrypt the coordinate
/// with its auxiliary key.
pub fn generate_election_partial_key_backup(
    owner_id: &str,
    polynomial: &ElectionPolynomial,
    designated: &AuxiliaryPublicKey,
    channel: &dyn AuxiliaryChannel,
) -> Result<ElectionPartialKeyBackup, Error> {
    let value = compute_polynomial_coordinate(designated.sequence_order, polynomial)?;
    let encrypted_value = channel
        .encrypt(value.to_hex().as_bytes(), &designated.key)
        .ok_or_else(|| Error::AuxiliaryEncryptionFailed(designated.owner_id.clone()))?;

    Ok(ElectionPartialKeyBackup {
        owner_id: owner_id.to_owned(),
        designated_id: designated.owner_id.clone(),
        designated_sequence_order: designated.sequence_order,
        encrypted_value,
        coefficient_commitments: polynomial.coefficient_commitments.clone(),
        coefficient_proofs: polynomial.coefficient_proofs.clone(),
    })
}

/// Decrypt the coordinate carried by a backup.
pub fn decrypt_backup_value(
    backup: &ElectionPartialKeyBackup,
    auxiliary_key_pair: &AuxiliaryKeyPair,
    channel: &dyn AuxiliaryChannel,
) -> Result<ElementModQ, Error> {
    let bytes = channel
        .decrypt(&backup.encrypted_value, &auxiliary_key_pair.secret_key)
        .ok_or_else(|| Error::AuxiliaryDecryptionFailed(backup.owner_id.clone()))?;
    let hex = String::from_utf8(bytes)
        .map_err(|_| Error::AuxiliaryDecryptionFailed(backup.owner_id.clone()))?;

    ElementModQ::from_hex(&hex)
}

fn coordinate_is_valid(
    value: &ElementModQ,
    sequence_order: u64,
    coefficient_commitments: &[ElementModP],
    coefficient_proofs: &[SchnorrProof],
) -> bool {
    coefficient_commitments.len() == coefficient_proofs.len()
        && coefficient_proofs
            .iter()
            .zip(coefficient_commitments)
            .all(|(proof, commitment)| proof.public_key == *commitment && proof.is_valid())
        && verify_polynomial_coordinate(value, sequence_order, coefficient_commitments)
}

/// Verify a backup received by `verifier_id`.
///
/// The validation does the following:
///  - Decrypts the coordinate with the verifier's auxiliary key
///  - Checks every coefficient proof
///  - Checks `g^coordinate == Π commitment_j^(i^j)` for the designated sequence order `i`
pub fn verify_election_partial_key_backup(
    verifier_id: &str,
    backup: &ElectionPartialKeyBackup,
    auxiliary_key_pair: &AuxiliaryKeyPair,
    channel: &dyn AuxiliaryChannel,
) -> ElectionPartialKeyVerification {
    let verified = match decrypt_backup_value(backup, auxiliary_key_pair, channel) {
        Ok(value) => coordinate_is_valid(
            &value,
            backup.designated_sequence_order,
            &backup.coefficient_commitments,
            &backup.coefficient_proofs,
        ),
        Err(e) => {
            warn!(owner_id = %backup.owner_id, "could not read backup: {}", e);
            false
        }
    };

    if !verified {
        warn!(
            owner_id = %backup.owner_id,
            designated_id = %backup.designated_id,
            verifier_id,
            "partial key backup failed verification"
        );
    }

    ElectionPartialKeyVerification {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        verifier_id: verifier_id.to_owned(),
        verified,
    }
}

/// Publish the unencrypted coordinate for a disputed backup.
pub fn generate_election_partial_key_challenge(
    backup: &ElectionPartialKeyBackup,
    polynomial: &ElectionPolynomial,
) -> Result<ElectionPartialKeyChallenge, Error> {
    Ok(ElectionPartialKeyChallenge {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        designated_sequence_order: backup.designated_sequence_order,
        value: compute_polynomial_coordinate(backup.designated_sequence_order, polynomial)?,
        coefficient_commitments: backup.coefficient_commitments.clone(),
        coefficient_proofs: backup.coefficient_proofs.clone(),
    })
}

/// Verify a challenge; any party can act as `verifier_id`.
pub fn verify_election_partial_key_challenge(
    verifier_id: &str,
    challenge: &ElectionPartialKeyChallenge,
) -> ElectionPartialKeyVerification {
    ElectionPartialKeyVerification {
        owner_id: challenge.owner_id.clone(),
        designated_id: challenge.designated_id.clone(),
        verifier_id: verifier_id.to_owned(),
        verified: coordinate_is_valid(
            &challenge.value,
            challenge.designated_sequence_order,
            &challenge.coefficient_commitments,
            &challenge.coefficient_proofs,
        ),
    }
}

pub fn get_coefficient_validation_set(
    owner_id: &str,
    polynomial: &ElectionPolynomial,
) -> CoefficientValidationSet {
    CoefficientValidationSet {
        owner_id: owner_id.to_owned(),
        coefficient_commitments: polynomial.coefficient_commitments.clone(),
        coefficient_proofs: polynomial.coefficient_proofs.clone(),
    }
}

/// Combine guardian public keys into the joint election key.
pub fn combine_election_public_keys<'a>(
    keys: impl IntoIterator<Item = &'a ElectionPublicKey>,
) -> ElementModP {
    elgamal_combine_public_keys(keys.into_iter().map(|k| &k.key))
}

/// The joint key plus `H(commitments...)` over every guardian's coefficient commitments.
///
/// Guardians are ordered by sequence order so the commitment hash does not depend on input order.
pub fn combine_election_joint_key(records: &[GuardianRecord]) -> ElectionJointKey {
    let mut ordered: Vec<&GuardianRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.sequence_order);

    let joint_public_key =
        elgamal_combine_public_keys(ordered.iter().map(|record| &record.election_public_key));
    let commitments: Vec<&ElementModP> = ordered
        .iter()
        .flat_map(|record| record.election_commitments.iter())
        .collect();
    let commitment_hash = hash_elems!(commitments);

    ElectionJointKey {
        joint_public_key,
        commitment_hash,
    }
}
