use super::*;
use indexmap::IndexMap;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log through the test harness, filtered by `RUST_LOG`. Safe to call from every test.
pub(crate) fn init_logging() {
    let layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_filter(EnvFilter::from_default_env());

    // Fails when another test already installed it
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// An auxiliary channel that "encrypts" by prefixing the recipient's key.
///
/// Cheap enough for ceremonies with many guardians; key pairs are random so a backup can only
/// be opened with the designated guardian's key.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MockAuxiliaryChannel;

impl AuxiliaryChannel for MockAuxiliaryChannel {
    fn generate_keypair(&self) -> Option<AuxiliaryKeyPair> {
        let key: [u8; 16] = rand::thread_rng().gen();
        Some(AuxiliaryKeyPair {
            secret_key: key.to_vec(),
            public_key: key.to_vec(),
        })
    }

    fn encrypt(&self, message: &[u8], public_key: &[u8]) -> Option<Vec<u8>> {
        let mut ciphertext = public_key.to_vec();
        ciphertext.extend_from_slice(message);
        Some(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8], secret_key: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.starts_with(secret_key) {
            Some(ciphertext[secret_key.len()..].to_vec())
        } else {
            None
        }
    }
}

fn selection(object_id: &str, sequence_order: u64) -> SelectionDescription {
    SelectionDescription {
        object_id: object_id.to_owned(),
        sequence_order,
        description_hash: hash_elems!(object_id, sequence_order),
    }
}

fn contest(
    object_id: &str,
    sequence_order: u64,
    number_elected: u64,
    candidates: &[&str],
) -> ContestDescription {
    let selections: Vec<SelectionDescription> = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| selection(candidate, i as u64 + 1))
        .collect();
    let placeholder_selections = (0..number_elected)
        .map(|i| {
            selection(
                &format!("{}-placeholder-{}", object_id, i + 1),
                (selections.len() as u64) + i + 1,
            )
        })
        .collect();

    ContestDescription {
        object_id: object_id.to_owned(),
        sequence_order,
        description_hash: hash_elems!(object_id, sequence_order),
        number_elected,
        selections,
        placeholder_selections,
    }
}

/// A mayoral race (vote for one) and a council race (vote for two).
pub(crate) fn sample_contests() -> Vec<ContestDescription> {
    vec![
        contest("mayor", 1, 1, &["alice", "bob"]),
        contest("council", 2, 2, &["carol", "dave", "erin"]),
    ]
}

fn sample_manifest_hash() -> ElementModQ {
    hash_elems!("sample-manifest")
}

/// A single-guardian context, returning the secret key for direct decryption.
pub(crate) fn sample_context<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> (CiphertextElectionContext, ElementModQ) {
    let key_pair = ElGamalKeyPair::from_secret(rand_range_q(2, rng)).unwrap();
    let joint_key = ElectionJointKey {
        commitment_hash: hash_elems!(key_pair.public_key),
        joint_public_key: key_pair.public_key,
    };
    let context = make_ciphertext_election_context(
        &CeremonyDetails::new(1, 1).unwrap(),
        &joint_key,
        &sample_manifest_hash(),
    );
    (context, key_pair.secret_key)
}

/// A ballot voting for `mayor` only, encrypted under `context`.
pub(crate) fn encrypt_sample_ballot<R: RngCore + CryptoRng>(
    ballot_id: &str,
    mayor: &str,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> CiphertextBallot {
    let ballot = PlaintextBallot {
        object_id: ballot_id.to_owned(),
        ballot_style: "default".to_owned(),
        contests: vec![PlaintextBallotContest {
            object_id: "mayor".to_owned(),
            selections: vec![PlaintextBallotSelection {
                object_id: mayor.to_owned(),
                vote: 1,
            }],
        }],
    };
    let device = EncryptionDevice::new("test-precinct");
    encrypt_ballot(
        &ballot,
        &sample_contests(),
        context,
        &device.initial_code_seed(),
        1_000,
        None,
        rng,
    )
    .unwrap()
}

fn create_guardians<R: RngCore + CryptoRng>(
    details: CeremonyDetails,
    channel: &dyn AuxiliaryChannel,
    rng: &mut R,
) -> Vec<Guardian> {
    (1..=details.number_of_guardians as u64)
        .map(|i| {
            Guardian::new(&format!("guardian-{}", i), i, details, channel, None, rng).unwrap()
        })
        .collect()
}

/// Announce every guardian and have each prepare its backups from the announced keys.
fn share_backups(
    guardians: Vec<Guardian>,
    mediator: &mut KeyCeremonyMediator,
    channel: &dyn AuxiliaryChannel,
) -> Vec<Guardian> {
    for guardian in &guardians {
        mediator.announce(guardian.share_public_keys()).unwrap();
    }
    let public_keys = mediator.share_announced().unwrap();
    guardians
        .into_iter()
        .map(|g| g.share_backups(&public_keys, channel).unwrap())
        .collect()
}

fn all_backups(guardians: &[Guardian]) -> Vec<ElectionPartialKeyBackup> {
    guardians
        .iter()
        .flat_map(|g| g.backups_to_share().cloned())
        .collect()
}

/// Each guardian verifies the backups relayed to it and reports back to the mediator.
fn verify_backups(
    guardians: Vec<Guardian>,
    mediator: &mut KeyCeremonyMediator,
    channel: &dyn AuxiliaryChannel,
) -> Vec<Guardian> {
    let mut verified = Vec::new();
    for guardian in guardians {
        let backups = mediator.share_backups(guardian.id()).unwrap();
        let (guardian, results) = guardian.verify_backups(&backups, channel).unwrap();
        mediator.receive_verifications(&results).unwrap();
        verified.push(guardian);
    }
    verified
}

fn combine_joint_keys(guardians: Vec<Guardian>, mediator: &KeyCeremonyMediator) -> Vec<Guardian> {
    guardians
        .into_iter()
        .map(|g| {
            let verifications = mediator.share_verifications(g.id());
            g.combine_joint_key(&verifications).unwrap()
        })
        .collect()
}

/// Run a complete ceremony with every backup verifying.
fn run_key_ceremony<R: RngCore + CryptoRng>(
    details: CeremonyDetails,
    channel: &dyn AuxiliaryChannel,
    rng: &mut R,
) -> Vec<Guardian> {
    let mut mediator = KeyCeremonyMediator::new("mediator", details);
    let guardians = share_backups(create_guardians(details, channel, rng), &mut mediator, channel);
    mediator.receive_backups(&all_backups(&guardians)).unwrap();
    assert!(mediator.all_backups_available());

    let guardians = verify_backups(guardians, &mut mediator, channel);
    assert!(mediator.all_backups_verified());
    let guardians = combine_joint_keys(guardians, &mediator);

    // The mediator publishes what every guardian combined on its own
    let records: Vec<GuardianRecord> = guardians.iter().map(|g| g.publish()).collect();
    assert_eq!(mediator.publish_guardian_records().unwrap(), records);
    assert_eq!(
        Some(&mediator.publish_joint_key().unwrap()),
        guardians[0].joint_key()
    );
    guardians
}

fn guardian_records(guardians: &[Guardian]) -> Vec<GuardianRecord> {
    guardians.iter().map(|g| g.publish()).collect()
}

fn tally_counts(contests: &IndexMap<String, PlaintextTallyContest>) -> Vec<(String, u64)> {
    contests
        .values()
        .flat_map(|contest| {
            contest
                .selections
                .values()
                .map(|s| (s.object_id.clone(), s.tally))
        })
        .collect()
}

#[test]
fn end_to_end_election() {
    init_logging();
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(5, 3).unwrap();

    // Key ceremony
    let guardians = run_key_ceremony(details, &channel, &mut rng);
    let joint_key = guardians[0].joint_key().unwrap().clone();
    for guardian in &guardians {
        assert_eq!(guardian.step(), &CeremonyStep::JointKeyCombined);
        assert_eq!(guardian.joint_key(), Some(&joint_key));
    }
    let public_keys: Vec<ElectionPublicKey> =
        guardians.iter().map(|g| g.election_public_key()).collect();
    assert_eq!(
        joint_key.joint_public_key,
        combine_election_public_keys(&public_keys)
    );
    assert_eq!(
        joint_key.joint_public_key,
        mult_p(public_keys.iter().map(|k| &k.key))
    );
    let records = guardian_records(&guardians);

    // Encrypt ballots: alice 3, bob 2, and a spoiled ballot for bob
    let context = make_ciphertext_election_context(&details, &joint_key, &sample_manifest_hash());
    let mut submitted = Vec::new();
    for (i, choice) in ["alice", "bob", "alice", "bob", "alice"].iter().enumerate() {
        let ballot = encrypt_sample_ballot(&format!("ballot-{}", i), choice, &context, &mut rng);
        submitted.push(SubmittedBallot::new(ballot, BallotBoxState::Cast));
    }
    let spoiled = encrypt_sample_ballot("ballot-spoiled", "bob", &context, &mut rng);
    submitted.push(SubmittedBallot::new(spoiled, BallotBoxState::Spoiled));

    // Tally
    let mut tally = CiphertextTally::new("tally", &sample_contests());
    tally
        .batch_append(&submitted, &context, &RayonScheduler, ExecutionMode::Parallel)
        .unwrap();
    assert_eq!(tally.count(), 6);

    let expected = vec![
        ("alice".to_owned(), 3),
        ("bob".to_owned(), 2),
        ("carol".to_owned(), 0),
        ("dave".to_owned(), 0),
        ("erin".to_owned(), 0),
    ];

    // Decrypt with every guardian present
    let mut mediator = DecryptionMediator::new(&context, &records, DiscreteLog::new(100)).unwrap();
    for guardian in &guardians {
        mediator.announce(guardian).unwrap();
    }
    let full = mediator
        .decrypt_tally(&tally, &channel, &RayonScheduler, ExecutionMode::Parallel, &mut rng)
        .unwrap();
    assert_eq!(tally_counts(&full.contests), expected);
    assert_eq!(
        tally_counts(&full.spoiled_ballots["ballot-spoiled"])[..2],
        [("alice".to_owned(), 0), ("bob".to_owned(), 1)]
    );

    // Decrypt with guardians 2 and 4 missing
    let mut mediator = DecryptionMediator::new(&context, &records, DiscreteLog::new(100)).unwrap();
    for &i in &[0, 2, 4] {
        mediator.announce(&guardians[i]).unwrap();
    }
    let missing: Vec<String> = mediator
        .guardian_states()
        .into_iter()
        .filter(|s| s.is_missing)
        .map(|s| s.guardian_id)
        .collect();
    assert_eq!(missing, vec!["guardian-2", "guardian-4"]);

    let compensated = mediator
        .decrypt_tally(&tally, &channel, &RayonScheduler, ExecutionMode::Sequential, &mut rng)
        .unwrap();
    assert_eq!(tally_counts(&compensated.contests), expected);
    assert_eq!(
        tally_counts(&compensated.spoiled_ballots["ballot-spoiled"]),
        tally_counts(&full.spoiled_ballots["ballot-spoiled"])
    );

    // Rebuilt shares equal the missing guardians' own shares
    let alice = &compensated.contests["mayor"].selections["alice"];
    let rebuilt = alice
        .shares
        .iter()
        .find(|s| s.guardian_id == "guardian-2")
        .unwrap();
    assert_eq!(rebuilt.recovered_parts.as_ref().unwrap().len(), 3);
    let direct = full.contests["mayor"].selections["alice"]
        .shares
        .iter()
        .find(|s| s.guardian_id == "guardian-2")
        .unwrap();
    assert_eq!(rebuilt.share, direct.share);

    // Two guardians are below quorum
    let mut mediator = DecryptionMediator::new(&context, &records, DiscreteLog::new(100)).unwrap();
    mediator.announce(&guardians[0]).unwrap();
    mediator.announce(&guardians[1]).unwrap();
    assert!(matches!(
        mediator.decrypt_tally(&tally, &channel, &RayonScheduler, ExecutionMode::Parallel, &mut rng),
        Err(Error::QuorumNotMet {
            available: 2,
            quorum: 3
        })
    ));
}

#[test]
fn forged_rebuilt_share_is_rejected() {
    init_logging();
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(3, 2).unwrap();
    let guardians = run_key_ceremony(details, &channel, &mut rng);
    let records = guardian_records(&guardians);

    let context = make_ciphertext_election_context(
        &details,
        guardians[0].joint_key().unwrap(),
        &sample_manifest_hash(),
    );
    let mut tally = CiphertextTally::new("tally", &sample_contests());
    for i in 0..2 {
        let ballot = encrypt_sample_ballot(&format!("ballot-{}", i), "alice", &context, &mut rng);
        tally
            .append(&SubmittedBallot::new(ballot, BallotBoxState::Cast), &context)
            .unwrap();
    }
    let selections = EncryptedSelections::from(&tally);

    // guardian-2 is missing; guardian-1 and guardian-3 compensate for it
    let states: Vec<GuardianState> = guardians
        .iter()
        .map(|g| GuardianState {
            guardian_id: g.id().to_owned(),
            sequence_order: g.sequence_order(),
            is_missing: g.id() == "guardian-2",
        })
        .collect();
    let lagrange_coefficients = compute_lagrange_coefficients_for_guardians(&states).unwrap();

    let mut shares = IndexMap::new();
    let mut compensated = IndexMap::new();
    for guardian in [&guardians[0], &guardians[2]].iter() {
        let share = compute_decryption_share(
            guardian,
            &selections,
            &context,
            &rand_q(&mut rng),
            &RayonScheduler,
            ExecutionMode::Sequential,
        )
        .unwrap();
        shares.insert(guardian.id().to_owned(), share);

        let part = compute_compensated_decryption_share(
            guardian,
            "guardian-2",
            &selections,
            &context,
            &rand_q(&mut rng),
            &channel,
            &RayonScheduler,
            ExecutionMode::Sequential,
        )
        .unwrap();
        compensated.insert(guardian.id().to_owned(), part);
    }
    let rebuilt =
        reconstruct_decryption_share("guardian-2", &selections, &compensated, &lagrange_coefficients)
            .unwrap();
    shares.insert("guardian-2".to_owned(), rebuilt);

    let extended_hash = &context.crypto_extended_base_hash;
    let contests = decrypt_contests_with_decryption_shares(
        &selections,
        &records,
        &shares,
        extended_hash,
        &mut DiscreteLog::new(10),
    )
    .unwrap();
    assert_eq!(contests["mayor"].selections["alice"].tally, 2);

    // Shifting the rebuilt share by g^-1 would turn the count into 3; the parts still verify
    // but no longer combine to the share
    let mut forged = shares.clone();
    let alice = forged["guardian-2"]
        .contests
        .get_mut("mayor")
        .and_then(|selections| selections.get_mut("alice"))
        .unwrap();
    alice.share = div_p(&alice.share, &ElementModP::generator()).unwrap();
    match decrypt_contests_with_decryption_shares(
        &selections,
        &records,
        &forged,
        extended_hash,
        &mut DiscreteLog::new(10),
    ) {
        Err(Error::DecryptionProofFailed {
            selection_id,
            guardian_id,
        }) => {
            assert_eq!(selection_id, "alice");
            assert_eq!(guardian_id, "guardian-2");
        }
        other => panic!("forged share accepted: {:?}", other.map(|_| ())),
    }

    // A share missing for a guardian of the election is reported, not skipped
    let mut incomplete = shares;
    incomplete.shift_remove("guardian-2");
    assert!(matches!(
        decrypt_contests_with_decryption_shares(
            &selections,
            &records,
            &incomplete,
            extended_hash,
            &mut DiscreteLog::new(10),
        ),
        Err(Error::MissingDecryptionShare { .. })
    ));
}

#[test]
fn corrupted_backup_fails_only_that_backup() {
    init_logging();
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(5, 3).unwrap();

    let mut mediator = KeyCeremonyMediator::new("mediator", details);
    let guardians = share_backups(create_guardians(details, &channel, &mut rng), &mut mediator, &channel);
    let mut backups = all_backups(&guardians);

    // Corrupt the coordinate guardian-1 sent to guardian-2
    let corrupted = backups
        .iter_mut()
        .find(|b| b.owner_id == "guardian-1" && b.designated_id == "guardian-2")
        .unwrap();
    let last = corrupted.encrypted_value.last_mut().unwrap();
    *last = if *last == b'0' { b'1' } else { b'0' };
    mediator.receive_backups(&backups).unwrap();

    let guardians = verify_backups(guardians, &mut mediator, &channel);
    assert_eq!(
        mediator.failed_verifications(),
        vec![("guardian-1".to_owned(), "guardian-2".to_owned())]
    );
    assert_eq!(
        guardians[1].step(),
        &CeremonyStep::PendingVerification {
            failed: vec!["guardian-1".to_owned()]
        }
    );
    assert_eq!(guardians[2].step(), &CeremonyStep::BackupsVerified);

    // Neither guardian-1 nor the mediator can combine until guardian-2 accepts the backup
    assert!(matches!(
        guardians[0]
            .clone()
            .combine_joint_key(&mediator.share_verifications("guardian-1")),
        Err(Error::BackupVerificationFailed { .. })
    ));
    match mediator.publish_joint_key() {
        Err(Error::BackupVerificationFailed {
            owner_id,
            designated_id,
        }) => {
            assert_eq!(owner_id, "guardian-1");
            assert_eq!(designated_id, "guardian-2");
        }
        other => panic!("joint key published early: {:?}", other),
    }

    // guardian-1 publishes the coordinate in the clear; the mediator and guardian-2 accept it
    let mut guardians = guardians;
    let challenge = guardians[0].publish_challenge("guardian-2").unwrap();
    let checked = mediator.verify_challenge(&challenge).unwrap();
    assert!(checked.verified);
    assert_eq!(checked.verifier_id, "mediator");

    let mut misdirected = challenge.clone();
    misdirected.designated_sequence_order = 3;
    assert!(!mediator.verify_challenge(&misdirected).unwrap().verified);
    assert!(!mediator.all_backups_verified());

    let (resolved, verification) = guardians.remove(1).resolve_with_challenge(&challenge).unwrap();
    assert!(verification.verified);
    assert_eq!(resolved.step(), &CeremonyStep::BackupsVerified);
    guardians.insert(1, resolved);
    mediator.receive_verifications(&[verification]).unwrap();
    assert!(mediator.all_backups_verified());

    let guardians = combine_joint_keys(guardians, &mediator);
    let joint_key = mediator.publish_joint_key().unwrap();
    assert!(guardians.iter().all(|g| g.joint_key() == Some(&joint_key)));

    // guardian-2 compensates for guardian-1 with the challenged coordinate
    let context = make_ciphertext_election_context(&details, &joint_key, &sample_manifest_hash());
    let mut tally = CiphertextTally::new("tally", &sample_contests());
    for i in 0..2 {
        let ballot = encrypt_sample_ballot(&format!("ballot-{}", i), "bob", &context, &mut rng);
        tally
            .append(&SubmittedBallot::new(ballot, BallotBoxState::Cast), &context)
            .unwrap();
    }

    let records = mediator.publish_guardian_records().unwrap();
    let mut decryption = DecryptionMediator::new(&context, &records, DiscreteLog::new(10)).unwrap();
    for guardian in &guardians[1..4] {
        decryption.announce(guardian).unwrap();
    }
    let plaintext = decryption
        .decrypt_tally(&tally, &MockAuxiliaryChannel, &RayonScheduler, ExecutionMode::Parallel, &mut rng)
        .unwrap();
    assert_eq!(plaintext.contests["mayor"].selections["bob"].tally, 2);
    assert_eq!(plaintext.contests["mayor"].selections["alice"].tally, 0);
}

#[test]
fn replacement_backup_resolves_pending_verification() {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(3, 2).unwrap();

    let mut mediator = KeyCeremonyMediator::new("mediator", details);
    let guardians = share_backups(create_guardians(details, &channel, &mut rng), &mut mediator, &channel);
    let original = all_backups(&guardians);
    let mut backups = original.clone();
    let corrupted = backups
        .iter_mut()
        .find(|b| b.owner_id == "guardian-3" && b.designated_id == "guardian-1")
        .unwrap();
    corrupted.designated_sequence_order = 2;
    let bad = corrupted.clone();
    mediator.receive_backups(&backups).unwrap();

    let mut guardians = verify_backups(guardians, &mut mediator, &channel);
    assert_eq!(mediator.failed_verifications().len(), 1);

    // A second bad backup leaves the guardian pending
    let first = guardians.remove(0);
    let (first, verification) = first.resolve_with_backup(&bad, &channel).unwrap();
    assert!(!verification.verified);
    assert!(matches!(first.step(), CeremonyStep::PendingVerification { .. }));

    // The genuine backup is relayed and accepted
    let replacement = guardians[1].backup_for("guardian-1").unwrap().clone();
    assert_eq!(
        Some(&replacement),
        original
            .iter()
            .find(|b| b.owner_id == "guardian-3" && b.designated_id == "guardian-1")
    );
    mediator.receive_backups(&[replacement.clone()]).unwrap();
    assert!(mediator.failed_verifications().is_empty());
    assert!(!mediator.all_backups_verified());

    let (first, verification) = first.resolve_with_backup(&replacement, &channel).unwrap();
    assert!(verification.verified);
    assert_eq!(first.step(), &CeremonyStep::BackupsVerified);
    guardians.insert(0, first);
    mediator.receive_verifications(&[verification]).unwrap();

    let guardians = combine_joint_keys(guardians, &mediator);
    assert!(guardians.iter().all(|g| g.step() == &CeremonyStep::JointKeyCombined));
    assert_eq!(
        Some(&mediator.publish_joint_key().unwrap()),
        guardians[0].joint_key()
    );
}

#[test]
fn illegal_transitions_are_rejected() {
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(3, 2).unwrap();

    assert!(matches!(
        Guardian::new("guardian-9", 9, details, &channel, None, &mut rng),
        Err(Error::InvalidSequenceOrder(9))
    ));

    let guardians = create_guardians(details, &channel, &mut rng);
    let public_keys: Vec<PublicKeySet> = guardians.iter().map(|g| g.share_public_keys()).collect();
    let ciphertext = elgamal_encrypt(1, &ElementModQ::from_u64(5), &ElementModP::generator()).unwrap();

    // Decrypting before the joint key exists
    assert!(matches!(
        guardians[0].partially_decrypt(&ciphertext, &ElementModQ::one(), &ElementModQ::one()),
        Err(Error::InvalidCeremonyTransition { .. })
    ));

    // Combining before backups were shared
    assert!(matches!(
        guardians[0].clone().combine_joint_key(&[]),
        Err(Error::InvalidCeremonyTransition { .. })
    ));

    // Missing public keys
    assert!(matches!(
        guardians[0].clone().share_backups(&public_keys[..2], &channel),
        Err(Error::UnexpectedGuardianCount {
            expected: 2,
            received: 1
        })
    ));

    // A forged key proof
    let mut forged = public_keys.clone();
    forged[1].election_public_key = ElementModP::generator();
    assert!(matches!(
        guardians[0].clone().share_backups(&forged, &channel),
        Err(Error::InvalidPublicKeyProof(_))
    ));

    // Sharing twice
    let shared = guardians[0].clone().share_backups(&public_keys, &channel).unwrap();
    assert!(matches!(
        shared.share_backups(&public_keys, &channel),
        Err(Error::InvalidCeremonyTransition { .. })
    ));

    // Nothing works after an abort
    let aborted = guardians[1].clone().abort();
    assert_eq!(aborted.step(), &CeremonyStep::Aborted);
    assert!(aborted.share_backups(&public_keys, &channel).is_err());

    // Guardians without a joint key cannot join a decryption
    let records = guardian_records(&guardians);
    let joint_key = combine_election_joint_key(&records);
    let context = make_ciphertext_election_context(&details, &joint_key, &sample_manifest_hash());
    let mut mediator = DecryptionMediator::new(&context, &records, DiscreteLog::new(10)).unwrap();
    assert!(matches!(
        mediator.announce(&guardians[2]),
        Err(Error::InvalidCeremonyTransition { .. })
    ));
    assert!(DecryptionMediator::new(&context, &records[..2], DiscreteLog::new(10)).is_err());

    // Records must combine to the context's key and commitment hash
    let unrelated = ElectionJointKey {
        joint_public_key: joint_key.joint_public_key.clone(),
        commitment_hash: ElementModQ::one(),
    };
    let unrelated = make_ciphertext_election_context(&details, &unrelated, &sample_manifest_hash());
    assert!(matches!(
        DecryptionMediator::new(&unrelated, &records, DiscreteLog::new(10)),
        Err(Error::JointKeyMismatch)
    ));

    let mut tampered = records.clone();
    tampered[1].election_commitments[1] = ElementModP::generator();
    assert!(matches!(
        DecryptionMediator::new(&context, &tampered, DiscreteLog::new(10)),
        Err(Error::InvalidPublicKeyProof(_))
    ));
}

#[test]
fn guardians_announce_once() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let channel = MockAuxiliaryChannel;
    let details = CeremonyDetails::new(3, 2).unwrap();
    let guardians = run_key_ceremony(details, &channel, &mut rng);

    let context = make_ciphertext_election_context(
        &details,
        guardians[0].joint_key().unwrap(),
        &sample_manifest_hash(),
    );
    let records = guardian_records(&guardians);
    let mut mediator = DecryptionMediator::new(&context, &records, DiscreteLog::new(10)).unwrap();

    mediator.announce(&guardians[0]).unwrap();
    assert!(matches!(
        mediator.announce(&guardians[0]),
        Err(Error::GuardianAlreadyAnnounced(_))
    ));
    assert_eq!(
        mediator
            .guardian_states()
            .iter()
            .map(|s| (s.sequence_order, s.is_missing))
            .collect::<Vec<_>>(),
        vec![(1, false), (2, true), (3, true)]
    );

    // A single spoiled ballot decrypts through the same session
    let ballot = encrypt_sample_ballot("spoiled", "alice", &context, &mut rng);
    mediator.announce(&guardians[2]).unwrap();
    let contests = mediator
        .decrypt_ballot(&ballot, &channel, &RayonScheduler, ExecutionMode::Parallel, &mut rng)
        .unwrap();
    assert_eq!(contests["mayor"].selections["alice"].tally, 1);
    assert_eq!(contests["council"].selections.len(), 3);
}

#[test]
fn public_records_serialize_to_json() {
    let mut rng = ChaCha20Rng::seed_from_u64(6);
    let (context, _secret) = sample_context(&mut rng);
    let ballot = encrypt_sample_ballot("ballot-json", "alice", &context, &mut rng);

    let json = serde_json::to_string(&ballot).unwrap();
    let parsed: CiphertextBallot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ballot);
    assert!(parsed.is_valid_encryption(
        &context.manifest_hash,
        &context.elgamal_public_key,
        &context.crypto_extended_base_hash
    ));
}
