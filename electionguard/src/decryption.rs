//! Threshold decryption of tallies and spoiled ballots.
//!
//! Every available guardian publishes a share `M_i = A^s_i` with a proof. For a missing guardian
//! `m`, each available guardian `l` publishes a compensated share `A^P_m(l)` using the backup `m`
//! gave it. The missing share is rebuilt as `Π M_m,l^w_l`, with Lagrange coefficients `w_l` over
//! the available guardians' sequence orders. The plaintext is then `dlog(B / Π M_i)`.

use crate::*;
use indexmap::{IndexMap, IndexSet};
use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

/// The ciphertexts of one decryptable record, keyed by contest then selection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncryptedSelections {
    pub object_id: String,
    pub contests: IndexMap<String, IndexMap<String, ElGamalCiphertext>>,
}

impl EncryptedSelections {
    fn iter(&self) -> impl Iterator<Item = (&str, &str, &ElGamalCiphertext)> {
        self.contests.iter().flat_map(|(contest_id, selections)| {
            selections
                .iter()
                .map(move |(selection_id, ciphertext)| {
                    (contest_id.as_str(), selection_id.as_str(), ciphertext)
                })
        })
    }
}

impl From<&CiphertextTally> for EncryptedSelections {
    fn from(tally: &CiphertextTally) -> Self {
        EncryptedSelections {
            object_id: tally.object_id.clone(),
            contests: tally.ciphertexts(),
        }
    }
}

impl From<&CiphertextBallot> for EncryptedSelections {
    /// Placeholder selections are left out.
    fn from(ballot: &CiphertextBallot) -> Self {
        let contests = ballot
            .contests
            .iter()
            .map(|contest| {
                let selections = contest
                    .selections
                    .iter()
                    .filter(|s| !s.is_placeholder_selection)
                    .map(|s| (s.object_id.clone(), s.ciphertext.clone()))
                    .collect();
                (contest.object_id.clone(), selections)
            })
            .collect();
        EncryptedSelections {
            object_id: ballot.object_id.clone(),
            contests,
        }
    }
}

/// A guardian's role in one decryption session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GuardianState {
    pub guardian_id: String,
    pub sequence_order: u64,
    pub is_missing: bool,
}

/// A share computed by `guardian_id` on behalf of `missing_guardian_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompensatedDecryptionShareSelection {
    pub object_id: String,
    pub guardian_id: String,
    /// Sequence order of the compensating guardian, the interpolation node of this share
    pub sequence_order: u64,
    pub missing_guardian_id: String,
    pub share: ElementModP,
    /// `g^P_m(l)`, the key the proof verifies against
    pub recovery_key: ElementModP,
    pub proof: ChaumPedersenProof,
}

/// One guardian's share for one selection.
///
/// A direct share carries its own proof. A share rebuilt for a missing guardian carries the
/// compensated parts it was combined from instead, keyed by compensating guardian.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DecryptionShareSelection {
    pub object_id: String,
    pub guardian_id: String,
    pub share: ElementModP,
    pub proof: Option<ChaumPedersenProof>,
    pub recovered_parts: Option<IndexMap<String, CompensatedDecryptionShareSelection>>,
}

impl DecryptionShareSelection {
    /// Check the share against the published record of the guardian it belongs to.
    ///
    /// A direct share must prove against the guardian's election public key. A rebuilt share is
    /// accepted only when:
    ///  - its parts come from at least as many distinct sequence orders as the guardian has
    ///    commitments
    ///  - every part proves against the recovery key recomputed from the guardian's commitments
    ///  - the Lagrange-weighted product of the parts is the share itself
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        guardian: &GuardianRecord,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if self.guardian_id != guardian.guardian_id {
            return false;
        }
        match (&self.proof, &self.recovered_parts) {
            (Some(proof), None) => proof.is_valid(
                message,
                &guardian.election_public_key,
                &self.share,
                crypto_extended_base_hash,
            ),
            (None, Some(parts)) => {
                self.is_valid_reconstruction(message, guardian, parts, crypto_extended_base_hash)
            }
            _ => false,
        }
    }

    fn is_valid_reconstruction(
        &self,
        message: &ElGamalCiphertext,
        guardian: &GuardianRecord,
        parts: &IndexMap<String, CompensatedDecryptionShareSelection>,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        let orders: IndexSet<u64> = parts.values().map(|part| part.sequence_order).collect();
        // A polynomial with K coefficients is only fixed by K distinct nodes
        if parts.is_empty()
            || orders.len() != parts.len()
            || orders.len() < guardian.election_commitments.len()
            || orders.contains(&0)
            || orders.contains(&guardian.sequence_order)
        {
            return false;
        }

        let parts_valid = parts.iter().all(|(guardian_id, part)| {
            let recovery_key = guardian.recovery_public_key(part.sequence_order);
            part.guardian_id == *guardian_id
                && part.missing_guardian_id == guardian.guardian_id
                && part.recovery_key == recovery_key
                && part
                    .proof
                    .is_valid(message, &recovery_key, &part.share, crypto_extended_base_hash)
        });
        if !parts_valid {
            return false;
        }

        let mut weighted = Vec::with_capacity(parts.len());
        for part in parts.values() {
            let others: Vec<u64> = orders
                .iter()
                .copied()
                .filter(|order| *order != part.sequence_order)
                .collect();
            match compute_lagrange_coefficient(part.sequence_order, &others) {
                Ok(coefficient) => weighted.push(pow_p(&part.share, &coefficient)),
                Err(_) => return false,
            }
        }
        mult_p(&weighted) == self.share
    }
}

/// Every selection share of one guardian for one record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DecryptionShare {
    pub object_id: String,
    pub guardian_id: String,
    pub contests: IndexMap<String, IndexMap<String, DecryptionShareSelection>>,
}

impl DecryptionShare {
    fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&DecryptionShareSelection> {
        self.contests
            .get(contest_id)
            .and_then(|selections| selections.get(selection_id))
    }
}

/// Every compensated selection share `guardian_id` computed for `missing_guardian_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompensatedDecryptionShare {
    pub object_id: String,
    pub guardian_id: String,
    pub missing_guardian_id: String,
    pub recovery_key: ElementModP,
    pub contests: IndexMap<String, IndexMap<String, CompensatedDecryptionShareSelection>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTallySelection {
    pub object_id: String,
    pub tally: u64,
    /// `g^tally`
    pub value: ElementModP,
    pub message: ElGamalCiphertext,
    pub shares: Vec<DecryptionShareSelection>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: IndexMap<String, PlaintextTallySelection>,
}

/// The decrypted election totals and every decrypted spoiled ballot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: IndexMap<String, PlaintextTallyContest>,
    pub spoiled_ballots: IndexMap<String, IndexMap<String, PlaintextTallyContest>>,
}

fn selection_nonce_seed(nonce_seed: &ElementModQ, contest_id: &str, selection_id: &str) -> ElementModQ {
    hash_elems!(nonce_seed, contest_id, selection_id)
}

fn nest<T>(
    items: Vec<Result<(String, String, T), Error>>,
) -> Result<IndexMap<String, IndexMap<String, T>>, Error> {
    let mut contests: IndexMap<String, IndexMap<String, T>> = IndexMap::new();
    for item in items {
        let (contest_id, selection_id, value) = item?;
        contests
            .entry(contest_id)
            .or_insert_with(IndexMap::new)
            .insert(selection_id, value);
    }
    Ok(contests)
}

/// `guardian`'s share of every selection of `selections`.
///
/// Each selection's proof nonce is derived from `nonce_seed` and the selection's ids.
pub fn compute_decryption_share<S: Scheduler>(
    guardian: &Guardian,
    selections: &EncryptedSelections,
    context: &CiphertextElectionContext,
    nonce_seed: &ElementModQ,
    scheduler: &S,
    mode: ExecutionMode,
) -> Result<DecryptionShare, Error> {
    let extended_hash = &context.crypto_extended_base_hash;

    let tasks: Vec<(&str, &str, &ElGamalCiphertext)> = selections.iter().collect();
    let results = scheduler.schedule(
        tasks,
        |(contest_id, selection_id, ciphertext)| -> Result<_, Error> {
            let seed = selection_nonce_seed(nonce_seed, contest_id, selection_id);
            let (share, proof) = guardian.partially_decrypt(ciphertext, extended_hash, &seed)?;
            let selection = DecryptionShareSelection {
                object_id: selection_id.to_owned(),
                guardian_id: guardian.id().to_owned(),
                share,
                proof: Some(proof),
                recovered_parts: None,
            };
            Ok((contest_id.to_owned(), selection_id.to_owned(), selection))
        },
        mode,
    );

    Ok(DecryptionShare {
        object_id: selections.object_id.clone(),
        guardian_id: guardian.id().to_owned(),
        contests: nest(results)?,
    })
}

/// `guardian`'s compensated share of every selection on behalf of `missing_guardian_id`.
#[allow(clippy::too_many_arguments)]
pub fn compute_compensated_decryption_share<S: Scheduler>(
    guardian: &Guardian,
    missing_guardian_id: &str,
    selections: &EncryptedSelections,
    context: &CiphertextElectionContext,
    nonce_seed: &ElementModQ,
    channel: &dyn AuxiliaryChannel,
    scheduler: &S,
    mode: ExecutionMode,
) -> Result<CompensatedDecryptionShare, Error> {
    let extended_hash = &context.crypto_extended_base_hash;
    let recovery_key = guardian.recovery_public_key_for(missing_guardian_id)?;

    let tasks: Vec<(&str, &str, &ElGamalCiphertext)> = selections.iter().collect();
    let results = scheduler.schedule(
        tasks,
        |(contest_id, selection_id, ciphertext)| -> Result<_, Error> {
            let seed = selection_nonce_seed(nonce_seed, contest_id, selection_id);
            let (share, proof) = guardian.compensate_decrypt(
                missing_guardian_id,
                ciphertext,
                extended_hash,
                &seed,
                channel,
            )?;
            let selection = CompensatedDecryptionShareSelection {
                object_id: selection_id.to_owned(),
                guardian_id: guardian.id().to_owned(),
                sequence_order: guardian.sequence_order(),
                missing_guardian_id: missing_guardian_id.to_owned(),
                share,
                recovery_key: recovery_key.clone(),
                proof,
            };
            Ok((contest_id.to_owned(), selection_id.to_owned(), selection))
        },
        mode,
    );

    Ok(CompensatedDecryptionShare {
        object_id: selections.object_id.clone(),
        guardian_id: guardian.id().to_owned(),
        missing_guardian_id: missing_guardian_id.to_owned(),
        recovery_key: recovery_key.clone(),
        contests: nest(results)?,
    })
}

/// Lagrange coefficient of each available guardian, interpolating over the available
/// guardians' sequence orders.
pub fn compute_lagrange_coefficients_for_guardians(
    guardians: &[GuardianState],
) -> Result<IndexMap<String, ElementModQ>, Error> {
    let available: Vec<&GuardianState> = guardians.iter().filter(|g| !g.is_missing).collect();

    available
        .iter()
        .map(|guardian| {
            let others: Vec<u64> = available
                .iter()
                .filter(|other| other.sequence_order != guardian.sequence_order)
                .map(|other| other.sequence_order)
                .collect();
            let coefficient = compute_lagrange_coefficient(guardian.sequence_order, &others)?;
            Ok((guardian.guardian_id.clone(), coefficient))
        })
        .collect()
}

/// Rebuild a missing guardian's share from the compensated shares, `Π M_m,l^w_l`.
///
/// `compensated_shares` and `lagrange_coefficients` are keyed by compensating guardian.
pub fn reconstruct_decryption_share(
    missing_guardian_id: &str,
    selections: &EncryptedSelections,
    compensated_shares: &IndexMap<String, CompensatedDecryptionShare>,
    lagrange_coefficients: &IndexMap<String, ElementModQ>,
) -> Result<DecryptionShare, Error> {
    let mut results = Vec::new();
    for (contest_id, selection_id, _) in selections.iter() {
        let mut parts = IndexMap::new();
        let mut weighted = Vec::with_capacity(compensated_shares.len());
        for (guardian_id, compensated) in compensated_shares {
            let missing_share = || Error::MissingDecryptionShare {
                selection_id: selection_id.to_owned(),
                guardian_id: guardian_id.clone(),
            };
            let part = compensated
                .contests
                .get(contest_id)
                .and_then(|c| c.get(selection_id))
                .ok_or_else(missing_share)?;
            let coefficient = lagrange_coefficients.get(guardian_id).ok_or_else(missing_share)?;

            weighted.push(pow_p(&part.share, coefficient));
            parts.insert(guardian_id.clone(), part.clone());
        }

        let selection = DecryptionShareSelection {
            object_id: selection_id.to_owned(),
            guardian_id: missing_guardian_id.to_owned(),
            share: mult_p(&weighted),
            proof: None,
            recovered_parts: Some(parts),
        };
        results.push(Ok((contest_id.to_owned(), selection_id.to_owned(), selection)));
    }

    Ok(DecryptionShare {
        object_id: selections.object_id.clone(),
        guardian_id: missing_guardian_id.to_owned(),
        contests: nest(results)?,
    })
}

/// Verify every share of one selection and decrypt it.
///
/// `shares` pairs each share with the published record of its guardian. A single invalid share
/// rejects the whole selection.
pub fn decrypt_selection_with_decryption_shares(
    selection_id: &str,
    message: &ElGamalCiphertext,
    shares: &[(&GuardianRecord, &DecryptionShareSelection)],
    crypto_extended_base_hash: &ElementModQ,
    dlog: &mut DiscreteLog,
) -> Result<PlaintextTallySelection, Error> {
    for (guardian, share) in shares {
        if !share.is_valid(message, guardian, crypto_extended_base_hash) {
            warn!(selection_id, guardian_id = %guardian.guardian_id, "decryption share failed verification");
            return Err(Error::DecryptionProofFailed {
                selection_id: selection_id.to_owned(),
                guardian_id: guardian.guardian_id.clone(),
            });
        }
    }

    let product = mult_p(shares.iter().map(|(_, share)| &share.share));
    let tally = message.decrypt_known_product(&product, dlog)?;

    Ok(PlaintextTallySelection {
        object_id: selection_id.to_owned(),
        tally,
        value: g_pow_p(&ElementModQ::from_u64(tally)),
        message: message.clone(),
        shares: shares.iter().map(|(_, share)| (*share).clone()).collect(),
    })
}

/// Decrypt every selection of `selections`.
///
/// `shares` is keyed by guardian id and needs a share from every guardian in `guardians`, rebuilt
/// or direct.
pub fn decrypt_contests_with_decryption_shares(
    selections: &EncryptedSelections,
    guardians: &[GuardianRecord],
    shares: &IndexMap<String, DecryptionShare>,
    crypto_extended_base_hash: &ElementModQ,
    dlog: &mut DiscreteLog,
) -> Result<IndexMap<String, PlaintextTallyContest>, Error> {
    let mut contests = IndexMap::new();
    for (contest_id, contest_selections) in &selections.contests {
        let mut plaintext_selections = IndexMap::new();
        for (selection_id, message) in contest_selections {
            let mut selection_shares = Vec::with_capacity(guardians.len());
            for guardian in guardians {
                let selection_share = shares
                    .get(&guardian.guardian_id)
                    .and_then(|share| share.selection(contest_id, selection_id))
                    .ok_or_else(|| Error::MissingDecryptionShare {
                        selection_id: selection_id.clone(),
                        guardian_id: guardian.guardian_id.clone(),
                    })?;
                selection_shares.push((guardian, selection_share));
            }

            let plaintext = decrypt_selection_with_decryption_shares(
                selection_id,
                message,
                &selection_shares,
                crypto_extended_base_hash,
                dlog,
            )?;
            plaintext_selections.insert(selection_id.clone(), plaintext);
        }
        contests.insert(
            contest_id.clone(),
            PlaintextTallyContest {
                object_id: contest_id.clone(),
                selections: plaintext_selections,
            },
        );
    }
    Ok(contests)
}

/// A decryption session: collects the guardians present and decrypts with them.
///
/// Guardians that never announce are treated as missing and compensated for, provided at
/// least `quorum` guardians are present.
pub struct DecryptionMediator<'a> {
    context: &'a CiphertextElectionContext,
    guardian_records: Vec<GuardianRecord>,
    available_guardians: IndexMap<String, &'a Guardian>,
    dlog: DiscreteLog,
}

impl<'a> DecryptionMediator<'a> {
    /// `guardian_records` must hold the published record of every guardian of the election, and
    /// together they must combine to the context's joint key and commitment hash.
    pub fn new(
        context: &'a CiphertextElectionContext,
        guardian_records: &[GuardianRecord],
        dlog: DiscreteLog,
    ) -> Result<Self, Error> {
        if guardian_records.len() != context.number_of_guardians {
            return Err(Error::UnexpectedGuardianCount {
                expected: context.number_of_guardians,
                received: guardian_records.len(),
            });
        }
        for record in guardian_records {
            if record.election_commitments.len() != context.quorum || !record.is_valid() {
                warn!(guardian_id = %record.guardian_id, "rejected guardian record");
                return Err(Error::InvalidPublicKeyProof(record.guardian_id.clone()));
            }
        }

        let joint_key = combine_election_joint_key(guardian_records);
        if joint_key.joint_public_key != context.elgamal_public_key
            || joint_key.commitment_hash != context.commitment_hash
        {
            return Err(Error::JointKeyMismatch);
        }

        Ok(DecryptionMediator {
            context,
            guardian_records: guardian_records.to_vec(),
            available_guardians: IndexMap::new(),
            dlog,
        })
    }

    /// Mark `guardian` as present for this session.
    pub fn announce(&mut self, guardian: &'a Guardian) -> Result<(), Error> {
        let record = self
            .guardian_records
            .iter()
            .find(|record| record.guardian_id == guardian.id())
            .ok_or_else(|| Error::MissingPublicKey(guardian.id().to_owned()))?;
        if *record != guardian.publish() {
            return Err(Error::InvalidPublicKeyProof(guardian.id().to_owned()));
        }
        match guardian.joint_key() {
            Some(joint_key) if joint_key.joint_public_key == self.context.elgamal_public_key => {}
            _ => {
                return Err(Error::InvalidCeremonyTransition {
                    guardian_id: guardian.id().to_owned(),
                    state: guardian.step().to_string(),
                    action: "announce for decryption",
                })
            }
        }
        if self.available_guardians.contains_key(guardian.id()) {
            return Err(Error::GuardianAlreadyAnnounced(guardian.id().to_owned()));
        }

        self.available_guardians
            .insert(guardian.id().to_owned(), guardian);
        info!(guardian_id = guardian.id(), "guardian announced");
        Ok(())
    }

    /// Every guardian of the election by sequence order, flagged missing unless announced.
    pub fn guardian_states(&self) -> Vec<GuardianState> {
        let mut states: Vec<GuardianState> = self
            .guardian_records
            .iter()
            .map(|record| GuardianState {
                guardian_id: record.guardian_id.clone(),
                sequence_order: record.sequence_order,
                is_missing: !self.available_guardians.contains_key(&record.guardian_id),
            })
            .collect();
        states.sort_by_key(|state| state.sequence_order);
        states
    }

    fn check_quorum(&self, states: &[GuardianState]) -> Result<(), Error> {
        let available = states.iter().filter(|s| !s.is_missing).count();
        if available < self.context.quorum {
            warn!(available, quorum = self.context.quorum, "decryption quorum not met");
            return Err(Error::QuorumNotMet {
                available,
                quorum: self.context.quorum,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decrypt_selections<R: RngCore + CryptoRng, S: Scheduler>(
        &mut self,
        selections: &EncryptedSelections,
        states: &[GuardianState],
        lagrange_coefficients: &IndexMap<String, ElementModQ>,
        channel: &dyn AuxiliaryChannel,
        scheduler: &S,
        mode: ExecutionMode,
        rng: &mut R,
    ) -> Result<IndexMap<String, PlaintextTallyContest>, Error> {
        let mut shares = IndexMap::new();
        for state in states.iter().filter(|s| !s.is_missing) {
            let guardian = self.available_guardians[&state.guardian_id];
            let nonce_seed = rand_q(rng);
            let share =
                compute_decryption_share(guardian, selections, self.context, &nonce_seed, scheduler, mode)?;
            shares.insert(state.guardian_id.clone(), share);
        }

        for missing in states.iter().filter(|s| s.is_missing) {
            let mut compensated = IndexMap::new();
            for state in states.iter().filter(|s| !s.is_missing) {
                let guardian = self.available_guardians[&state.guardian_id];
                let nonce_seed = rand_q(rng);
                let share = compute_compensated_decryption_share(
                    guardian,
                    &missing.guardian_id,
                    selections,
                    self.context,
                    &nonce_seed,
                    channel,
                    scheduler,
                    mode,
                )?;
                compensated.insert(state.guardian_id.clone(), share);
            }

            let share = reconstruct_decryption_share(
                &missing.guardian_id,
                selections,
                &compensated,
                lagrange_coefficients,
            )?;
            debug!(object_id = %selections.object_id, missing_guardian_id = %missing.guardian_id, "share reconstructed");
            shares.insert(missing.guardian_id.clone(), share);
        }

        decrypt_contests_with_decryption_shares(
            selections,
            &self.guardian_records,
            &shares,
            &self.context.crypto_extended_base_hash,
            &mut self.dlog,
        )
    }

    /// Decrypt a single ballot with the announced guardians.
    pub fn decrypt_ballot<R: RngCore + CryptoRng, S: Scheduler>(
        &mut self,
        ballot: &CiphertextBallot,
        channel: &dyn AuxiliaryChannel,
        scheduler: &S,
        mode: ExecutionMode,
        rng: &mut R,
    ) -> Result<IndexMap<String, PlaintextTallyContest>, Error> {
        let states = self.guardian_states();
        self.check_quorum(&states)?;
        let lagrange_coefficients = compute_lagrange_coefficients_for_guardians(&states)?;

        self.decrypt_selections(
            &EncryptedSelections::from(ballot),
            &states,
            &lagrange_coefficients,
            channel,
            scheduler,
            mode,
            rng,
        )
    }

    /// Decrypt the tally and each of its spoiled ballots.
    ///
    /// Fails with [`Error::QuorumNotMet`] before any share is computed when fewer than `quorum`
    /// guardians announced.
    pub fn decrypt_tally<R: RngCore + CryptoRng, S: Scheduler>(
        &mut self,
        tally: &CiphertextTally,
        channel: &dyn AuxiliaryChannel,
        scheduler: &S,
        mode: ExecutionMode,
        rng: &mut R,
    ) -> Result<PlaintextTally, Error> {
        let states = self.guardian_states();
        self.check_quorum(&states)?;
        let lagrange_coefficients = compute_lagrange_coefficients_for_guardians(&states)?;

        let contests = self.decrypt_selections(
            &EncryptedSelections::from(tally),
            &states,
            &lagrange_coefficients,
            channel,
            scheduler,
            mode,
            rng,
        )?;

        let mut spoiled_ballots = IndexMap::new();
        for (ballot_id, ballot) in tally.spoiled_ballots() {
            let ballot_contests = self.decrypt_selections(
                &EncryptedSelections::from(&ballot.ballot),
                &states,
                &lagrange_coefficients,
                channel,
                scheduler,
                mode,
                rng,
            )?;
            spoiled_ballots.insert(ballot_id.clone(), ballot_contests);
        }

        info!(
            tally_id = %tally.object_id,
            missing = states.iter().filter(|s| s.is_missing).count(),
            spoiled = spoiled_ballots.len(),
            "tally decrypted"
        );

        Ok(PlaintextTally {
            object_id: tally.object_id.clone(),
            contests,
            spoiled_ballots,
        })
    }
}
