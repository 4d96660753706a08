use crate::*;
use indexmap::IndexMap;
use tracing::{info, warn};

type BackupKey = (String, String);

/// Relays the public side of a key ceremony between guardians.
///
/// The mediator only ever holds public key sets, encrypted backups, verifications and challenges.
/// Guardians drive their own transitions with what it hands them, and the mediator publishes the
/// joint key once every guardian announced and every backup verified.
///
/// A typical ceremony:
///  1. `announce` each guardian's `share_public_keys()`, then hand out `share_announced()`
///  2. `receive_backups` from every guardian, then hand each one `share_backups(id)`
///  3. `receive_verifications` from every guardian. Disputes are settled with
///     `verify_challenge` or a replacement backup
///  4. `publish_joint_key` and `publish_guardian_records`
pub struct KeyCeremonyMediator {
    id: String,
    ceremony_details: CeremonyDetails,
    public_keys: IndexMap<String, PublicKeySet>,
    // Keyed by (owner_id, designated_id)
    backups: IndexMap<BackupKey, ElectionPartialKeyBackup>,
    verifications: IndexMap<BackupKey, ElectionPartialKeyVerification>,
}

impl KeyCeremonyMediator {
    pub fn new(id: &str, ceremony_details: CeremonyDetails) -> Self {
        KeyCeremonyMediator {
            id: id.to_owned(),
            ceremony_details,
            public_keys: IndexMap::new(),
            backups: IndexMap::new(),
            verifications: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ceremony_details(&self) -> &CeremonyDetails {
        &self.ceremony_details
    }

    /// Admit a guardian to the ceremony.
    ///
    /// Sequence orders must be unique and in `1..=number_of_guardians`, and every coefficient
    /// proof must hold.
    pub fn announce(&mut self, public_keys: PublicKeySet) -> Result<(), Error> {
        if self.public_keys.contains_key(&public_keys.owner_id) {
            return Err(Error::GuardianAlreadyAnnounced(public_keys.owner_id));
        }

        let sequence_order = public_keys.sequence_order;
        let taken = self
            .public_keys
            .values()
            .any(|set| set.sequence_order == sequence_order);
        if sequence_order == 0
            || sequence_order > self.ceremony_details.number_of_guardians as u64
            || taken
        {
            return Err(Error::InvalidSequenceOrder(sequence_order));
        }

        if public_keys.coefficient_commitments.len() != self.ceremony_details.quorum
            || !public_keys.is_valid()
        {
            warn!(mediator_id = %self.id, owner_id = %public_keys.owner_id, "rejected public key set");
            return Err(Error::InvalidPublicKeyProof(public_keys.owner_id));
        }

        info!(mediator_id = %self.id, guardian_id = %public_keys.owner_id, sequence_order, "guardian announced");
        self.public_keys
            .insert(public_keys.owner_id.clone(), public_keys);
        Ok(())
    }

    pub fn all_guardians_announced(&self) -> bool {
        self.public_keys.len() == self.ceremony_details.number_of_guardians
    }

    fn require_attendance(&self) -> Result<(), Error> {
        if self.all_guardians_announced() {
            Ok(())
        } else {
            Err(Error::UnexpectedGuardianCount {
                expected: self.ceremony_details.number_of_guardians,
                received: self.public_keys.len(),
            })
        }
    }

    /// Every announced public key set, once all guardians are in attendance.
    pub fn share_announced(&self) -> Result<Vec<PublicKeySet>, Error> {
        self.require_attendance()?;
        Ok(self.public_keys.values().cloned().collect())
    }

    /// Accept backups for relay.
    ///
    /// Each backup must run between two announced guardians and carry its owner's announced
    /// commitments. Either every backup is accepted or none is. A backup that replaces an earlier
    /// one discards that backup's verification.
    pub fn receive_backups(&mut self, backups: &[ElectionPartialKeyBackup]) -> Result<(), Error> {
        self.require_attendance()?;

        for backup in backups {
            let owner = self
                .public_keys
                .get(&backup.owner_id)
                .ok_or_else(|| Error::MissingPublicKey(backup.owner_id.clone()))?;
            if backup.designated_id == backup.owner_id
                || !self.public_keys.contains_key(&backup.designated_id)
            {
                return Err(Error::MissingPublicKey(backup.designated_id.clone()));
            }
            if backup.coefficient_commitments != owner.coefficient_commitments
                || backup.coefficient_proofs != owner.coefficient_proofs
            {
                warn!(mediator_id = %self.id, owner_id = %backup.owner_id, "backup commitments differ from the announced ones");
                return Err(Error::InconsistentCommitments(backup.owner_id.clone()));
            }
        }

        for backup in backups {
            let key = (backup.owner_id.clone(), backup.designated_id.clone());
            self.verifications.shift_remove(&key);
            self.backups.insert(key, backup.clone());
        }
        Ok(())
    }

    /// Every guardian sent a backup to every other guardian.
    pub fn all_backups_available(&self) -> bool {
        let n = self.ceremony_details.number_of_guardians;
        self.all_guardians_announced() && self.backups.len() == n * (n - 1)
    }

    /// The backups designated for `designated_id`, once all of them have arrived.
    pub fn share_backups(&self, designated_id: &str) -> Result<Vec<ElectionPartialKeyBackup>, Error> {
        self.require_attendance()?;
        if !self.public_keys.contains_key(designated_id) {
            return Err(Error::MissingPublicKey(designated_id.to_owned()));
        }

        self.public_keys
            .keys()
            .filter(|owner_id| owner_id.as_str() != designated_id)
            .map(|owner_id| {
                self.backups
                    .get(&(owner_id.clone(), designated_id.to_owned()))
                    .cloned()
                    .ok_or_else(|| Error::MissingBackup(owner_id.clone()))
            })
            .collect()
    }

    /// Record the verifications designated guardians published for their backups.
    ///
    /// A later verification of the same backup replaces the earlier one.
    pub fn receive_verifications(
        &mut self,
        verifications: &[ElectionPartialKeyVerification],
    ) -> Result<(), Error> {
        for verification in verifications {
            let key = (
                verification.owner_id.clone(),
                verification.designated_id.clone(),
            );
            if !self.backups.contains_key(&key) {
                return Err(Error::MissingBackup(verification.owner_id.clone()));
            }
            if verification.verifier_id != verification.designated_id {
                return Err(Error::UnexpectedVerifier {
                    verifier_id: verification.verifier_id.clone(),
                    designated_id: verification.designated_id.clone(),
                });
            }
        }

        for verification in verifications {
            if !verification.verified {
                warn!(
                    owner_id = %verification.owner_id,
                    designated_id = %verification.designated_id,
                    "backup reported as failed"
                );
            }
            self.verifications.insert(
                (
                    verification.owner_id.clone(),
                    verification.designated_id.clone(),
                ),
                verification.clone(),
            );
        }
        Ok(())
    }

    /// The latest verification of every backup `owner_id` sent.
    pub fn share_verifications(&self, owner_id: &str) -> Vec<ElectionPartialKeyVerification> {
        self.verifications
            .values()
            .filter(|verification| verification.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// `(owner_id, designated_id)` of every backup whose latest verification failed.
    pub fn failed_verifications(&self) -> Vec<(String, String)> {
        self.verifications
            .iter()
            .filter(|(_, verification)| !verification.verified)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Check a challenge published for a disputed backup; the outcome replaces the backup's
    /// verification.
    pub fn verify_challenge(
        &mut self,
        challenge: &ElectionPartialKeyChallenge,
    ) -> Result<ElectionPartialKeyVerification, Error> {
        let key = (challenge.owner_id.clone(), challenge.designated_id.clone());
        let backup = self
            .backups
            .get(&key)
            .ok_or_else(|| Error::MissingBackup(challenge.owner_id.clone()))?;
        let designated_order = self
            .public_keys
            .get(&challenge.designated_id)
            .map(|set| set.sequence_order);

        let mut verification = verify_election_partial_key_challenge(&self.id, challenge);
        verification.verified = verification.verified
            && Some(challenge.designated_sequence_order) == designated_order
            && challenge.coefficient_commitments == backup.coefficient_commitments;

        if verification.verified {
            info!(mediator_id = %self.id, owner_id = %challenge.owner_id, designated_id = %challenge.designated_id, "challenge accepted");
        } else {
            warn!(mediator_id = %self.id, owner_id = %challenge.owner_id, designated_id = %challenge.designated_id, "challenge failed");
        }
        self.verifications.insert(key, verification.clone());
        Ok(verification)
    }

    /// Every backup has arrived and its latest verification passed.
    pub fn all_backups_verified(&self) -> bool {
        self.all_backups_available()
            && self.backups.keys().all(|key| {
                self.verifications
                    .get(key)
                    .map_or(false, |verification| verification.verified)
            })
    }

    fn require_verified_backups(&self) -> Result<(), Error> {
        self.require_attendance()?;
        for owner_id in self.public_keys.keys() {
            for designated_id in self.public_keys.keys().filter(|id| *id != owner_id) {
                let key = (owner_id.clone(), designated_id.clone());
                if !self.backups.contains_key(&key) {
                    return Err(Error::MissingBackup(owner_id.clone()));
                }
                let verified = self
                    .verifications
                    .get(&key)
                    .map_or(false, |verification| verification.verified);
                if !verified {
                    return Err(Error::BackupVerificationFailed {
                        owner_id: owner_id.clone(),
                        designated_id: designated_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The record of every guardian by sequence order, once the ceremony is complete.
    pub fn publish_guardian_records(&self) -> Result<Vec<GuardianRecord>, Error> {
        self.require_verified_backups()?;
        let mut records: Vec<GuardianRecord> = self
            .public_keys
            .values()
            .map(|set| set.guardian_record())
            .collect();
        records.sort_by_key(|record| record.sequence_order);
        Ok(records)
    }

    /// The joint election key, once every guardian announced and every backup verified.
    pub fn publish_joint_key(&self) -> Result<ElectionJointKey, Error> {
        let records = self.publish_guardian_records()?;
        let joint_key = combine_election_joint_key(&records);
        info!(mediator_id = %self.id, guardians = records.len(), "joint key published");
        Ok(joint_key)
    }
}
