use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("electionguard: element is out of bounds for the group mod P")]
    ElementModPOutOfBounds,

    #[error("electionguard: element is out of bounds for the field mod Q")]
    ElementModQOutOfBounds,

    #[error("electionguard: invalid hexadecimal element: {0:?}")]
    InvalidHex(String),

    #[error("electionguard: division by zero")]
    DivisionByZero,

    #[error("electionguard: ElGamal encryption requires a non-zero nonce")]
    ZeroNonce,

    #[error("electionguard: ElGamal secret key must be at least 2")]
    InvalidSecretKey,

    #[error("electionguard: nonce index must be non-negative, got {0}")]
    NegativeNonceIndex(i64),

    #[error("electionguard: discrete log not found within bound {0}")]
    DiscreteLogNotFound(u64),

    #[error("electionguard: polynomial coordinate {0} must be in [1, Q)")]
    InvalidCoordinate(u64),

    #[error("electionguard: plaintext {plaintext} is outside the allowed range 0..={limit}")]
    PlaintextOutOfRange { plaintext: u64, limit: u64 },

    #[error("electionguard: invalid ceremony details: {number_of_guardians} guardians with quorum {quorum}")]
    InvalidCeremonyDetails {
        number_of_guardians: usize,
        quorum: usize,
    },

    #[error("electionguard: guardian sequence order {0} is invalid")]
    InvalidSequenceOrder(u64),

    #[error("electionguard: guardian {0} published an invalid public key proof")]
    InvalidPublicKeyProof(String),

    #[error("electionguard: expected public keys from {expected} guardians, received {received}")]
    UnexpectedGuardianCount { expected: usize, received: usize },

    #[error("electionguard: no public key known for guardian {0}")]
    MissingPublicKey(String),

    #[error("electionguard: no backup from guardian {0}")]
    MissingBackup(String),

    #[error("electionguard: backup from {owner_id} for {designated_id} failed verification")]
    BackupVerificationFailed {
        owner_id: String,
        designated_id: String,
    },

    #[error("electionguard: backups from guardian {0} carry inconsistent coefficient commitments")]
    InconsistentCommitments(String),

    #[error("electionguard: {verifier_id} cannot report on a backup designated for {designated_id}")]
    UnexpectedVerifier {
        verifier_id: String,
        designated_id: String,
    },

    #[error("electionguard: guardian records do not combine to the election's joint key")]
    JointKeyMismatch,

    #[error("electionguard: guardian {guardian_id} cannot {action} while {state}")]
    InvalidCeremonyTransition {
        guardian_id: String,
        state: String,
        action: &'static str,
    },

    #[error("electionguard: auxiliary key generation failed for guardian {0}")]
    AuxiliaryKeyGenerationFailed(String),

    #[error("electionguard: auxiliary encryption failed for guardian {0}")]
    AuxiliaryEncryptionFailed(String),

    #[error("electionguard: auxiliary decryption failed for backup from guardian {0}")]
    AuxiliaryDecryptionFailed(String),

    #[error("electionguard: quorum not met: {available} guardians available, {quorum} required")]
    QuorumNotMet { available: usize, quorum: usize },

    #[error("electionguard: guardian {0} has already been announced")]
    GuardianAlreadyAnnounced(String),

    #[error("electionguard: decryption proof from guardian {guardian_id} failed for selection {selection_id}")]
    DecryptionProofFailed {
        selection_id: String,
        guardian_id: String,
    },

    #[error("electionguard: missing decryption share from guardian {guardian_id} for selection {selection_id}")]
    MissingDecryptionShare {
        selection_id: String,
        guardian_id: String,
    },

    #[error("electionguard: ballot {0} has already been added to the tally")]
    DuplicateBallot(String),

    #[error("electionguard: ballot {0} is neither cast nor spoiled")]
    UnknownBallotState(String),

    #[error("electionguard: contest {0} has {1} votes, more than its selection limit")]
    Overvote(String, u64),

    #[error("electionguard: JSON error: {0}")]
    JSONDeserialization(#[from] serde_json::Error),

    #[error("electionguard: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for externally supplied ballots, proofs and key material
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("electionguard validation: description hash mismatch for {0}")]
    DescriptionHashMismatch(String),

    #[error("electionguard validation: crypto hash mismatch for {0}")]
    CryptoHashMismatch(String),

    #[error("electionguard validation: selection proof failed for {0}")]
    SelectionProofFailed(String),

    #[error("electionguard validation: selection limit proof failed for contest {0}")]
    SelectionLimitProofFailed(String),

    #[error("electionguard validation: contest {0} is missing its selection limit proof")]
    MissingSelectionLimitProof(String),

    #[error("electionguard validation: unknown contest {0}")]
    UnknownContest(String),

    #[error("electionguard validation: unknown selection {selection_id} in contest {contest_id}")]
    UnknownSelection {
        contest_id: String,
        selection_id: String,
    },

    #[error("electionguard validation: contest {0} appears twice on the ballot")]
    DuplicateContest(String),

    #[error("electionguard validation: selection {selection_id} appears twice in contest {contest_id}")]
    DuplicateSelection {
        contest_id: String,
        selection_id: String,
    },

    #[error("electionguard validation: group constants are inconsistent: {0}")]
    InvalidConstants(&'static str),

    #[error("electionguard validation: configuration is invalid: {0}")]
    InvalidConfig(String),
}
