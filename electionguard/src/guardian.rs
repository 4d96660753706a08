use crate::*;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};
use std::fmt;
use tracing::{info, warn};

/// Where a guardian is in the key ceremony.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CeremonyStep {
    KeysGenerated,
    BackupsShared,
    /// Some received backups failed verification. The listed owners must re-publish a backup or
    /// answer a challenge before the ceremony can continue, or the caller aborts.
    PendingVerification { failed: Vec<String> },
    BackupsVerified,
    JointKeyCombined,
    Aborted,
}

impl fmt::Display for CeremonyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyStep::KeysGenerated => f.write_str("keys generated"),
            CeremonyStep::BackupsShared => f.write_str("backups shared"),
            CeremonyStep::PendingVerification { failed } => {
                write!(f, "pending verification of backups from {}", failed.join(", "))
            }
            CeremonyStep::BackupsVerified => f.write_str("backups verified"),
            CeremonyStep::JointKeyCombined => f.write_str("joint key combined"),
            CeremonyStep::Aborted => f.write_str("aborted"),
        }
    }
}

/// A guardian holds one share of the election's decryption capability.
///
/// Ceremony steps consume the guardian and return the next snapshot, so a guardian's key
/// material is never mutated in place and every intermediate state can be kept for audit.
///
/// A typical ceremony:
///  1. `Guardian::new` for each of the N guardians, then publish `share_public_keys()`
///  2. `share_backups` with every other guardian's public keys
///  3. `verify_backups` with the backups designated to this guardian, publishing the
///     verifications. Failures leave the guardian in `PendingVerification`
///  4. `combine_joint_key` with the verifications of this guardian's own backups
#[derive(Clone, Debug)]
pub struct Guardian {
    id: String,
    sequence_order: u64,
    ceremony_details: CeremonyDetails,
    election_keys: ElectionKeyPair,
    auxiliary_keys: AuxiliaryKeyPair,
    step: CeremonyStep,
    guardian_public_keys: IndexMap<String, PublicKeySet>,
    backups_to_share: IndexMap<String, ElectionPartialKeyBackup>,
    received_backups: IndexMap<String, ElectionPartialKeyBackup>,
    challenged_values: IndexMap<String, ElementModQ>,
    joint_key: Option<ElectionJointKey>,
}

impl Guardian {
    /// Create a guardian with fresh election and auxiliary keys.
    ///
    /// `sequence_order` must be in `1..=number_of_guardians`. A `nonce` makes the election
    /// polynomial reproducible.
    pub fn new<R: RngCore + CryptoRng>(
        id: &str,
        sequence_order: u64,
        ceremony_details: CeremonyDetails,
        channel: &dyn AuxiliaryChannel,
        nonce: Option<&ElementModQ>,
        rng: &mut R,
    ) -> Result<Self, Error> {
        if sequence_order == 0 || sequence_order > ceremony_details.number_of_guardians as u64 {
            return Err(Error::InvalidSequenceOrder(sequence_order));
        }

        let election_keys = generate_election_key_pair(ceremony_details.quorum, nonce, rng)?;
        let auxiliary_keys = channel
            .generate_keypair()
            .ok_or_else(|| Error::AuxiliaryKeyGenerationFailed(id.to_owned()))?;

        info!(guardian_id = id, sequence_order, "guardian keys generated");

        Ok(Guardian {
            id: id.to_owned(),
            sequence_order,
            ceremony_details,
            election_keys,
            auxiliary_keys,
            step: CeremonyStep::KeysGenerated,
            guardian_public_keys: IndexMap::new(),
            backups_to_share: IndexMap::new(),
            received_backups: IndexMap::new(),
            challenged_values: IndexMap::new(),
            joint_key: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequence_order(&self) -> u64 {
        self.sequence_order
    }

    pub fn step(&self) -> &CeremonyStep {
        &self.step
    }

    pub fn ceremony_details(&self) -> &CeremonyDetails {
        &self.ceremony_details
    }

    pub fn joint_key(&self) -> Option<&ElectionJointKey> {
        self.joint_key.as_ref()
    }

    pub fn election_public_key(&self) -> ElectionPublicKey {
        ElectionPublicKey {
            owner_id: self.id.clone(),
            sequence_order: self.sequence_order,
            proof: self.election_keys.proof.clone(),
            key: self.election_keys.key_pair.public_key.clone(),
        }
    }

    pub fn share_public_keys(&self) -> PublicKeySet {
        PublicKeySet {
            owner_id: self.id.clone(),
            sequence_order: self.sequence_order,
            auxiliary_public_key: self.auxiliary_keys.public_key.clone(),
            election_public_key: self.election_keys.key_pair.public_key.clone(),
            election_public_key_proof: self.election_keys.proof.clone(),
            coefficient_commitments: self.election_keys.polynomial.coefficient_commitments.clone(),
            coefficient_proofs: self.election_keys.polynomial.coefficient_proofs.clone(),
        }
    }

    pub fn coefficient_validation_set(&self) -> CoefficientValidationSet {
        get_coefficient_validation_set(&self.id, &self.election_keys.polynomial)
    }

    /// The public record verifiers check this guardian's decryption shares against.
    pub fn publish(&self) -> GuardianRecord {
        GuardianRecord::new(&self.election_public_key(), &self.coefficient_validation_set())
    }

    /// The backup this guardian prepared for `designated_id`.
    pub fn backup_for(&self, designated_id: &str) -> Option<&ElectionPartialKeyBackup> {
        self.backups_to_share.get(designated_id)
    }

    pub fn backups_to_share(&self) -> impl Iterator<Item = &ElectionPartialKeyBackup> {
        self.backups_to_share.values()
    }

    /// Answer a dispute over the backup prepared for `designated_id`.
    pub fn publish_challenge(
        &self,
        designated_id: &str,
    ) -> Result<ElectionPartialKeyChallenge, Error> {
        let backup = self
            .backups_to_share
            .get(designated_id)
            .ok_or_else(|| Error::MissingBackup(self.id.clone()))?;
        generate_election_partial_key_challenge(backup, &self.election_keys.polynomial)
    }

    fn transition_error(&self, action: &'static str) -> Error {
        Error::InvalidCeremonyTransition {
            guardian_id: self.id.clone(),
            state: self.step.to_string(),
            action,
        }
    }

    /// Record every other guardian's public keys and prepare a backup for each of them.
    ///
    /// `KeysGenerated → BackupsShared`
    pub fn share_backups(
        mut self,
        public_keys: &[PublicKeySet],
        channel: &dyn AuxiliaryChannel,
    ) -> Result<Guardian, Error> {
        if self.step != CeremonyStep::KeysGenerated {
            return Err(self.transition_error("share backups"));
        }

        let others: Vec<&PublicKeySet> = public_keys
            .iter()
            .filter(|set| set.owner_id != self.id)
            .collect();
        let expected = self.ceremony_details.number_of_guardians - 1;
        if others.len() != expected {
            return Err(Error::UnexpectedGuardianCount {
                expected,
                received: others.len(),
            });
        }

        let mut guardian_public_keys = IndexMap::new();
        let mut backups_to_share = IndexMap::new();
        for set in others {
            if !set.is_valid() {
                warn!(guardian_id = %self.id, owner_id = %set.owner_id, "rejected public key set");
                return Err(Error::InvalidPublicKeyProof(set.owner_id.clone()));
            }
            let backup = generate_election_partial_key_backup(
                &self.id,
                &self.election_keys.polynomial,
                &set.auxiliary_public_key(),
                channel,
            )?;
            backups_to_share.insert(set.owner_id.clone(), backup);
            guardian_public_keys.insert(set.owner_id.clone(), set.clone());
        }

        info!(guardian_id = %self.id, backups = backups_to_share.len(), "backups shared");

        self.guardian_public_keys = guardian_public_keys;
        self.backups_to_share = backups_to_share;
        self.step = CeremonyStep::BackupsShared;
        Ok(self)
    }

    fn verify_backup(
        &self,
        backup: &ElectionPartialKeyBackup,
        channel: &dyn AuxiliaryChannel,
    ) -> Result<ElectionPartialKeyVerification, Error> {
        let owner = self
            .guardian_public_keys
            .get(&backup.owner_id)
            .ok_or_else(|| Error::MissingPublicKey(backup.owner_id.clone()))?;

        let mut verification =
            verify_election_partial_key_backup(&self.id, backup, &self.auxiliary_keys, channel);

        // The backup must share the polynomial the owner announced
        let matches_owner = backup.designated_id == self.id
            && backup.designated_sequence_order == self.sequence_order
            && backup.coefficient_commitments == owner.coefficient_commitments;
        verification.verified = verification.verified && matches_owner;

        Ok(verification)
    }

    /// Verify the backups every other guardian prepared for this guardian.
    ///
    /// `BackupsShared → BackupsVerified`, or `BackupsShared → PendingVerification` when any
    /// backup fails. The returned verifications are published to the backup owners either way.
    pub fn verify_backups(
        mut self,
        backups: &[ElectionPartialKeyBackup],
        channel: &dyn AuxiliaryChannel,
    ) -> Result<(Guardian, Vec<ElectionPartialKeyVerification>), Error> {
        if self.step != CeremonyStep::BackupsShared {
            return Err(self.transition_error("verify backups"));
        }

        let mut received = IndexMap::new();
        for backup in backups.iter().filter(|b| b.designated_id == self.id) {
            received.insert(backup.owner_id.clone(), backup.clone());
        }
        if let Some(missing) = self
            .guardian_public_keys
            .keys()
            .find(|owner_id| !received.contains_key(*owner_id))
        {
            return Err(Error::MissingBackup(missing.clone()));
        }

        let mut verifications = Vec::with_capacity(received.len());
        let mut failed = Vec::new();
        for backup in received.values() {
            let verification = self.verify_backup(backup, channel)?;
            if !verification.verified {
                failed.push(backup.owner_id.clone());
            }
            verifications.push(verification);
        }

        self.received_backups = received;
        self.step = if failed.is_empty() {
            info!(guardian_id = %self.id, "all backups verified");
            CeremonyStep::BackupsVerified
        } else {
            warn!(guardian_id = %self.id, ?failed, "backups failed verification");
            CeremonyStep::PendingVerification { failed }
        };

        Ok((self, verifications))
    }

    fn resolve(mut self, owner_id: &str, action: &'static str) -> Result<Guardian, Error> {
        let mut failed = match &self.step {
            CeremonyStep::PendingVerification { failed }
                if failed.iter().any(|f| f == owner_id) =>
            {
                failed.clone()
            }
            _ => return Err(self.transition_error(action)),
        };
        failed.retain(|f| f != owner_id);

        self.step = if failed.is_empty() {
            info!(guardian_id = %self.id, "all backups verified");
            CeremonyStep::BackupsVerified
        } else {
            CeremonyStep::PendingVerification { failed }
        };
        Ok(self)
    }

    fn is_pending_for(&self, owner_id: &str) -> bool {
        match &self.step {
            CeremonyStep::PendingVerification { failed } => failed.iter().any(|f| f == owner_id),
            _ => false,
        }
    }

    /// Verify a re-published backup from an owner whose first backup failed.
    ///
    /// `PendingVerification → PendingVerification | BackupsVerified`. A failing replacement
    /// leaves the guardian unchanged.
    pub fn resolve_with_backup(
        mut self,
        backup: &ElectionPartialKeyBackup,
        channel: &dyn AuxiliaryChannel,
    ) -> Result<(Guardian, ElectionPartialKeyVerification), Error> {
        if !self.is_pending_for(&backup.owner_id) {
            return Err(self.transition_error("accept a replacement backup"));
        }

        let verification = self.verify_backup(backup, channel)?;
        if !verification.verified {
            return Ok((self, verification));
        }

        self.received_backups
            .insert(backup.owner_id.clone(), backup.clone());
        let guardian = self.resolve(&backup.owner_id, "accept a replacement backup")?;
        Ok((guardian, verification))
    }

    /// Settle a disputed backup with the owner's published challenge.
    ///
    /// `PendingVerification → PendingVerification | BackupsVerified`
    pub fn resolve_with_challenge(
        mut self,
        challenge: &ElectionPartialKeyChallenge,
    ) -> Result<(Guardian, ElectionPartialKeyVerification), Error> {
        if !self.is_pending_for(&challenge.owner_id) || challenge.designated_id != self.id {
            return Err(self.transition_error("accept a challenge"));
        }

        let verification = verify_election_partial_key_challenge(&self.id, challenge);
        let owner_commitments = self
            .guardian_public_keys
            .get(&challenge.owner_id)
            .map(|set| &set.coefficient_commitments);
        if !verification.verified
            || challenge.designated_sequence_order != self.sequence_order
            || Some(&challenge.coefficient_commitments) != owner_commitments
        {
            return Ok((self, verification));
        }

        // The coordinate is public now; keep the commitments for recovery keys
        self.received_backups.insert(
            challenge.owner_id.clone(),
            ElectionPartialKeyBackup {
                owner_id: challenge.owner_id.clone(),
                designated_id: challenge.designated_id.clone(),
                designated_sequence_order: challenge.designated_sequence_order,
                encrypted_value: Vec::new(),
                coefficient_commitments: challenge.coefficient_commitments.clone(),
                coefficient_proofs: challenge.coefficient_proofs.clone(),
            },
        );
        self.challenged_values
            .insert(challenge.owner_id.clone(), challenge.value.clone());

        let guardian = self.resolve(&challenge.owner_id, "accept a challenge")?;
        Ok((guardian, verification))
    }

    /// Give up on the ceremony. Every later step fails.
    pub fn abort(mut self) -> Guardian {
        warn!(guardian_id = %self.id, step = %self.step, "key ceremony aborted");
        self.step = CeremonyStep::Aborted;
        self
    }

    /// Combine the joint election key once every guardian accepted this guardian's backups.
    ///
    /// `BackupsVerified → JointKeyCombined`
    pub fn combine_joint_key(
        mut self,
        verifications: &[ElectionPartialKeyVerification],
    ) -> Result<Guardian, Error> {
        if self.step != CeremonyStep::BackupsVerified {
            return Err(self.transition_error("combine the joint key"));
        }

        for designated_id in self.guardian_public_keys.keys() {
            let verified = verifications.iter().any(|v| {
                v.owner_id == self.id && v.designated_id == *designated_id && v.verified
            });
            if !verified {
                return Err(Error::BackupVerificationFailed {
                    owner_id: self.id.clone(),
                    designated_id: designated_id.clone(),
                });
            }
        }

        let mut records = vec![self.publish()];
        records.extend(self.guardian_public_keys.values().map(|set| set.guardian_record()));

        let joint_key = combine_election_joint_key(&records);
        info!(guardian_id = %self.id, "joint key combined");

        self.joint_key = Some(joint_key);
        self.step = CeremonyStep::JointKeyCombined;
        Ok(self)
    }

    fn require_joint_key(&self, action: &'static str) -> Result<(), Error> {
        if self.step == CeremonyStep::JointKeyCombined {
            Ok(())
        } else {
            Err(self.transition_error(action))
        }
    }

    /// This guardian's share of the decryption of `ciphertext`, with proof.
    pub fn partially_decrypt(
        &self,
        ciphertext: &ElGamalCiphertext,
        crypto_extended_base_hash: &ElementModQ,
        nonce_seed: &ElementModQ,
    ) -> Result<(ElementModP, ChaumPedersenProof), Error> {
        self.require_joint_key("decrypt")?;

        let secret = &self.election_keys.key_pair.secret_key;
        let partial = ciphertext.partial_decrypt(secret);
        let proof = make_chaum_pedersen(
            ciphertext,
            secret,
            &partial,
            nonce_seed,
            crypto_extended_base_hash,
        )?;
        Ok((partial, proof))
    }

    fn backup_coordinate(
        &self,
        owner_id: &str,
        channel: &dyn AuxiliaryChannel,
    ) -> Result<ElementModQ, Error> {
        if let Some(value) = self.challenged_values.get(owner_id) {
            return Ok(value.clone());
        }
        let backup = self
            .received_backups
            .get(owner_id)
            .ok_or_else(|| Error::MissingBackup(owner_id.to_owned()))?;
        decrypt_backup_value(backup, &self.auxiliary_keys, channel)
    }

    /// Decrypt on behalf of a missing guardian using the backup it sent this guardian.
    ///
    /// The share is `pad^P_m(l)`, where `P_m` is the missing guardian's polynomial and `l` this
    /// guardian's sequence order. Its proof verifies against
    /// [`recovery_public_key_for`](Guardian::recovery_public_key_for).
    pub fn compensate_decrypt(
        &self,
        missing_guardian_id: &str,
        ciphertext: &ElGamalCiphertext,
        crypto_extended_base_hash: &ElementModQ,
        nonce_seed: &ElementModQ,
        channel: &dyn AuxiliaryChannel,
    ) -> Result<(ElementModP, ChaumPedersenProof), Error> {
        self.require_joint_key("compensate")?;

        let coordinate = self.backup_coordinate(missing_guardian_id, channel)?;
        let partial = ciphertext.partial_decrypt(&coordinate);
        let proof = make_chaum_pedersen(
            ciphertext,
            &coordinate,
            &partial,
            nonce_seed,
            crypto_extended_base_hash,
        )?;
        Ok((partial, proof))
    }

    /// `g^P_m(l) = Π K_m,j^(l^j)`, computed from the missing guardian's public commitments.
    pub fn recovery_public_key_for(&self, missing_guardian_id: &str) -> Result<ElementModP, Error> {
        let backup = self
            .received_backups
            .get(missing_guardian_id)
            .ok_or_else(|| Error::MissingBackup(missing_guardian_id.to_owned()))?;

        Ok(compute_polynomial_commitment(
            self.sequence_order,
            &backup.coefficient_commitments,
        ))
    }
}
