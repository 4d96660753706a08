use crate::*;
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A selection as described by the election manifest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SelectionDescription {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
}

/// A contest as described by the election manifest.
///
/// `placeholder_selections` pads every ballot so that each contest encrypts exactly
/// `number_elected` votes; there must be at least `number_elected` of them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContestDescription {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
    pub number_elected: u64,
    pub selections: Vec<SelectionDescription>,
    pub placeholder_selections: Vec<SelectionDescription>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallotSelection {
    pub object_id: String,
    pub vote: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallotContest {
    pub object_id: String,
    pub selections: Vec<PlaintextBallotSelection>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallot {
    pub object_id: String,
    pub ballot_style: String,
    pub contests: Vec<PlaintextBallotContest>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallotSelection {
    pub object_id: String,
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
    pub crypto_hash: ElementModQ,
    pub is_placeholder_selection: bool,
    /// Kept by the encrypting device only; never published.
    pub nonce: Option<ElementModQ>,
    pub proof: DisjunctiveChaumPedersenProof,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallotContest {
    pub object_id: String,
    pub description_hash: ElementModQ,
    pub selections: Vec<CiphertextBallotSelection>,
    pub crypto_hash: ElementModQ,
    pub nonce: Option<ElementModQ>,
    pub proof: Option<ConstantChaumPedersenProof>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallot {
    pub object_id: String,
    pub ballot_style: String,
    pub description_hash: ElementModQ,
    pub previous_tracking_hash: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    pub tracking_hash: ElementModQ,
    pub timestamp: u64,
    pub crypto_hash: ElementModQ,
    pub nonce: Option<ElementModQ>,
}

/// What the ballot box decided for a ballot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BallotBoxState {
    Cast,
    Spoiled,
    Unknown,
}

/// A ciphertext ballot together with its ballot box state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubmittedBallot {
    pub ballot: CiphertextBallot,
    pub state: BallotBoxState,
}

impl SubmittedBallot {
    pub fn new(ballot: CiphertextBallot, state: BallotBoxState) -> Self {
        SubmittedBallot { ballot, state }
    }

    pub fn object_id(&self) -> &str {
        &self.ballot.object_id
    }
}

impl CryptoHashCheckable for CiphertextBallotSelection {
    /// `H(object_id, seed_hash, H(pad, data))`
    fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        hash_elems!(self.object_id, seed_hash, self.ciphertext.crypto_hash())
    }
}

impl CryptoHashCheckable for CiphertextBallotContest {
    /// `H(object_id, seed_hash, [selection hashes])`
    fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        contest_hash(&self.object_id, seed_hash, &self.selections)
    }
}

impl CryptoHashCheckable for CiphertextBallot {
    /// `H(object_id, seed_hash, [contest hashes])`
    fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        ballot_hash(&self.object_id, seed_hash, &self.contests)
    }
}

fn contest_hash(
    object_id: &str,
    seed_hash: &ElementModQ,
    selections: &[CiphertextBallotSelection],
) -> ElementModQ {
    let selection_hashes: Vec<&ElementModQ> = selections.iter().map(|s| &s.crypto_hash).collect();
    hash_elems!(object_id, seed_hash, selection_hashes)
}

fn ballot_hash(
    object_id: &str,
    seed_hash: &ElementModQ,
    contests: &[CiphertextBallotContest],
) -> ElementModQ {
    let contest_hashes: Vec<&ElementModQ> = contests.iter().map(|c| &c.crypto_hash).collect();
    hash_elems!(object_id, seed_hash, contest_hashes)
}

impl CiphertextBallotSelection {
    /// Check the selection's hash and its 0/1 proof.
    pub fn validate_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> Result<(), ValidationError> {
        if *seed_hash != self.description_hash {
            return Err(ValidationError::DescriptionHashMismatch(self.object_id.clone()));
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return Err(ValidationError::CryptoHashMismatch(self.object_id.clone()));
        }
        if !self
            .proof
            .is_valid(&self.ciphertext, public_key, crypto_extended_base_hash, 1)
        {
            return Err(ValidationError::SelectionProofFailed(self.object_id.clone()));
        }
        Ok(())
    }

    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        self.validate_encryption(seed_hash, public_key, crypto_extended_base_hash)
            .is_ok()
    }
}

impl CiphertextBallotContest {
    /// Sum of every selection's ciphertext, placeholders included.
    pub fn elgamal_accumulate(&self) -> ElGamalCiphertext {
        elgamal_add(self.selections.iter().map(|s| &s.ciphertext))
    }

    /// Check the contest's hash, its selection limit proof and every selection it contains.
    ///
    /// Selections are checked against their own description hashes; the caller's manifest
    /// validation is responsible for matching those to the manifest.
    pub fn validate_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> Result<(), ValidationError> {
        if *seed_hash != self.description_hash {
            return Err(ValidationError::DescriptionHashMismatch(self.object_id.clone()));
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return Err(ValidationError::CryptoHashMismatch(self.object_id.clone()));
        }

        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| ValidationError::MissingSelectionLimitProof(self.object_id.clone()))?;
        if !proof.is_valid(
            &self.elgamal_accumulate(),
            public_key,
            crypto_extended_base_hash,
        ) {
            return Err(ValidationError::SelectionLimitProofFailed(
                self.object_id.clone(),
            ));
        }

        for selection in &self.selections {
            selection.validate_encryption(
                &selection.description_hash,
                public_key,
                crypto_extended_base_hash,
            )?;
        }
        Ok(())
    }

    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        self.validate_encryption(seed_hash, public_key, crypto_extended_base_hash)
            .is_ok()
    }
}

impl CiphertextBallot {
    /// Check the ballot's hash and every contest and selection proof.
    ///
    /// The validation does the following:
    ///  - The ballot was encrypted for the manifest with hash `seed_hash`
    ///  - The ballot hash matches its contests
    ///  - Each contest hash matches its selections, and its selection limit proof is valid
    ///  - Each selection hash matches its ciphertext, and its 0/1 proof is valid
    pub fn validate_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> Result<(), ValidationError> {
        if *seed_hash != self.description_hash {
            return Err(ValidationError::DescriptionHashMismatch(self.object_id.clone()));
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return Err(ValidationError::CryptoHashMismatch(self.object_id.clone()));
        }

        for contest in &self.contests {
            contest.validate_encryption(
                &contest.description_hash,
                public_key,
                crypto_extended_base_hash,
            )?;
        }
        Ok(())
    }

    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        match self.validate_encryption(seed_hash, public_key, crypto_extended_base_hash) {
            Ok(()) => true,
            Err(e) => {
                warn!(ballot_id = %self.object_id, "invalid ballot encryption: {}", e);
                false
            }
        }
    }

    /// Recompute the tracking code from the previous code and this ballot's hash.
    pub fn expected_tracking_hash(&self) -> ElementModQ {
        get_rotating_tracker_hash(&self.previous_tracking_hash, self.timestamp, &self.crypto_hash)
    }
}

/// Encrypt one selection.
///
/// The selection nonce is `Nonces(description_hash, nonce_seed).get(sequence_order)` and the
/// proof seed is `get(0)` of the same sequence.
pub fn encrypt_selection(
    selection: &PlaintextBallotSelection,
    description: &SelectionDescription,
    public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
    is_placeholder: bool,
) -> Result<CiphertextBallotSelection, Error> {
    let nonce_sequence = Nonces::new(&description.description_hash, &[nonce_seed]);
    let selection_nonce = nonce_sequence.get(description.sequence_order as i64)?;
    let proof_seed = nonce_sequence.get(0)?;

    let ciphertext = elgamal_encrypt(selection.vote, &selection_nonce, public_key)?;
    let proof = make_disjunctive_chaum_pedersen(
        &ciphertext,
        &selection_nonce,
        selection.vote,
        1,
        public_key,
        crypto_extended_base_hash,
        &proof_seed,
    )?;
    let crypto_hash = hash_elems!(
        description.object_id,
        description.description_hash,
        ciphertext.crypto_hash()
    );

    Ok(CiphertextBallotSelection {
        object_id: description.object_id.clone(),
        description_hash: description.description_hash.clone(),
        ciphertext,
        crypto_hash,
        is_placeholder_selection: is_placeholder,
        nonce: Some(selection_nonce),
        proof,
    })
}

/// Encrypt one contest, filling placeholders so it carries exactly `number_elected` votes.
pub fn encrypt_contest(
    contest: &PlaintextBallotContest,
    description: &ContestDescription,
    public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
) -> Result<CiphertextBallotContest, Error> {
    let nonce_sequence = Nonces::new(&description.description_hash, &[nonce_seed]);
    let contest_nonce = nonce_sequence.get(description.sequence_order as i64)?;
    let proof_seed = nonce_sequence.get(0)?;

    let mut seen = HashSet::with_capacity(contest.selections.len());
    for selection in &contest.selections {
        if !description
            .selections
            .iter()
            .any(|d| d.object_id == selection.object_id)
        {
            return Err(ValidationError::UnknownSelection {
                contest_id: contest.object_id.clone(),
                selection_id: selection.object_id.clone(),
            }
            .into());
        }
        if !seen.insert(selection.object_id.as_str()) {
            return Err(ValidationError::DuplicateSelection {
                contest_id: contest.object_id.clone(),
                selection_id: selection.object_id.clone(),
            }
            .into());
        }
    }

    if (description.placeholder_selections.len() as u64) < description.number_elected {
        return Err(ValidationError::InvalidConfig(format!(
            "contest {} needs {} placeholder selections",
            description.object_id, description.number_elected
        ))
        .into());
    }

    let mut selections = Vec::with_capacity(
        description.selections.len() + description.placeholder_selections.len(),
    );
    let mut votes = 0u64;
    for selection_description in &description.selections {
        let plaintext = contest
            .selections
            .iter()
            .find(|s| s.object_id == selection_description.object_id)
            .cloned()
            .unwrap_or_else(|| PlaintextBallotSelection {
                object_id: selection_description.object_id.clone(),
                vote: 0,
            });
        votes += plaintext.vote;
        selections.push(encrypt_selection(
            &plaintext,
            selection_description,
            public_key,
            crypto_extended_base_hash,
            &contest_nonce,
            false,
        )?);
    }
    if votes > description.number_elected {
        return Err(Error::Overvote(contest.object_id.clone(), votes));
    }

    let mut undervotes = description.number_elected - votes;
    for placeholder in &description.placeholder_selections {
        let vote = if undervotes > 0 { 1 } else { 0 };
        undervotes -= vote;
        let plaintext = PlaintextBallotSelection {
            object_id: placeholder.object_id.clone(),
            vote,
        };
        selections.push(encrypt_selection(
            &plaintext,
            placeholder,
            public_key,
            crypto_extended_base_hash,
            &contest_nonce,
            true,
        )?);
    }

    let accumulation = elgamal_add(selections.iter().map(|s| &s.ciphertext));
    let aggregate_nonce = add_q(selections.iter().filter_map(|s| s.nonce.as_ref()));
    let proof = make_constant_chaum_pedersen(
        &accumulation,
        description.number_elected,
        &aggregate_nonce,
        public_key,
        &proof_seed,
        crypto_extended_base_hash,
    )?;
    let crypto_hash = contest_hash(&description.object_id, &description.description_hash, &selections);

    Ok(CiphertextBallotContest {
        object_id: description.object_id.clone(),
        description_hash: description.description_hash.clone(),
        selections,
        crypto_hash,
        nonce: Some(contest_nonce),
        proof: Some(proof),
    })
}

/// Encrypt a ballot for the election described by `context`.
///
/// `nonce_seed = H(manifest_hash, object_id, master_nonce)`. Without a `master_nonce` a random
/// one is drawn. The tracking code is rotated from `previous_tracking_hash`, which the caller
/// must supply (the device's [`EncryptionDevice::initial_code_seed`] for the first ballot).
pub fn encrypt_ballot<R: RngCore + CryptoRng>(
    ballot: &PlaintextBallot,
    contests: &[ContestDescription],
    context: &CiphertextElectionContext,
    previous_tracking_hash: &ElementModQ,
    timestamp: u64,
    master_nonce: Option<&ElementModQ>,
    rng: &mut R,
) -> Result<CiphertextBallot, Error> {
    let mut seen = HashSet::with_capacity(ballot.contests.len());
    for contest in &ballot.contests {
        if !contests.iter().any(|d| d.object_id == contest.object_id) {
            return Err(ValidationError::UnknownContest(contest.object_id.clone()).into());
        }
        if !seen.insert(contest.object_id.as_str()) {
            return Err(ValidationError::DuplicateContest(contest.object_id.clone()).into());
        }
    }

    let master_nonce = match master_nonce {
        Some(nonce) => nonce.clone(),
        None => rand_q(rng),
    };
    let nonce_seed = hash_elems!(context.manifest_hash, ballot.object_id, master_nonce);

    let mut encrypted_contests = Vec::with_capacity(contests.len());
    for description in contests {
        let plaintext = ballot
            .contests
            .iter()
            .find(|c| c.object_id == description.object_id)
            .cloned()
            .unwrap_or_else(|| PlaintextBallotContest {
                object_id: description.object_id.clone(),
                selections: vec![],
            });
        encrypted_contests.push(encrypt_contest(
            &plaintext,
            description,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
            &nonce_seed,
        )?);
    }

    let crypto_hash = ballot_hash(&ballot.object_id, &context.manifest_hash, &encrypted_contests);
    let tracking_hash = get_rotating_tracker_hash(previous_tracking_hash, timestamp, &crypto_hash);
    debug!(ballot_id = %ballot.object_id, tracking_hash = %tracking_hash, "encrypted ballot");

    Ok(CiphertextBallot {
        object_id: ballot.object_id.clone(),
        ballot_style: ballot.ballot_style.clone(),
        description_hash: context.manifest_hash.clone(),
        previous_tracking_hash: previous_tracking_hash.clone(),
        contests: encrypted_contests,
        tracking_hash,
        timestamp,
        crypto_hash,
        nonce: Some(master_nonce),
    })
}
