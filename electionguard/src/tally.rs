use crate::*;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

/// The encrypted running total for one selection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTallySelection {
    pub object_id: String,
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
}

impl CiphertextTallySelection {
    fn new(description: &SelectionDescription) -> Self {
        CiphertextTallySelection {
            object_id: description.object_id.clone(),
            description_hash: description.description_hash.clone(),
            ciphertext: ElGamalCiphertext::identity(),
        }
    }

    /// Fold `ciphertexts` into the running total.
    pub fn accumulate<'a>(&mut self, ciphertexts: impl IntoIterator<Item = &'a ElGamalCiphertext>) {
        let addition = elgamal_add(ciphertexts);
        self.ciphertext = self.ciphertext.add(&addition);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTallyContest {
    pub object_id: String,
    pub description_hash: ElementModQ,
    pub selections: IndexMap<String, CiphertextTallySelection>,
}

/// The homomorphic tally of every cast ballot, plus the spoiled ballots to decrypt one by one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTally {
    pub object_id: String,
    pub contests: IndexMap<String, CiphertextTallyContest>,
    cast_ballot_ids: IndexSet<String>,
    spoiled_ballots: IndexMap<String, SubmittedBallot>,
}

impl CiphertextTally {
    /// An empty tally with one zeroed selection per non-placeholder selection of `contests`.
    pub fn new(object_id: &str, contests: &[ContestDescription]) -> Self {
        let contests = contests
            .iter()
            .map(|contest| {
                let selections = contest
                    .selections
                    .iter()
                    .map(|s| (s.object_id.clone(), CiphertextTallySelection::new(s)))
                    .collect();
                let tally_contest = CiphertextTallyContest {
                    object_id: contest.object_id.clone(),
                    description_hash: contest.description_hash.clone(),
                    selections,
                };
                (contest.object_id.clone(), tally_contest)
            })
            .collect();

        CiphertextTally {
            object_id: object_id.to_owned(),
            contests,
            cast_ballot_ids: IndexSet::new(),
            spoiled_ballots: IndexMap::new(),
        }
    }

    /// Number of ballots appended, cast and spoiled.
    pub fn count(&self) -> usize {
        self.cast_ballot_ids.len() + self.spoiled_ballots.len()
    }

    pub fn cast_ballot_ids(&self) -> impl Iterator<Item = &String> {
        self.cast_ballot_ids.iter()
    }

    pub fn spoiled_ballots(&self) -> &IndexMap<String, SubmittedBallot> {
        &self.spoiled_ballots
    }

    fn contains(&self, ballot_id: &str) -> bool {
        self.cast_ballot_ids.contains(ballot_id) || self.spoiled_ballots.contains_key(ballot_id)
    }

    /// Checks that do not need the ballot's proofs.
    fn check_appendable(&self, ballot: &SubmittedBallot) -> Result<(), Error> {
        if self.contains(ballot.object_id()) {
            return Err(Error::DuplicateBallot(ballot.object_id().to_owned()));
        }
        if ballot.state == BallotBoxState::Unknown {
            return Err(Error::UnknownBallotState(ballot.object_id().to_owned()));
        }
        for contest in &ballot.ballot.contests {
            let tally_contest = self
                .contests
                .get(&contest.object_id)
                .ok_or_else(|| ValidationError::UnknownContest(contest.object_id.clone()))?;
            for selection in contest.selections.iter().filter(|s| !s.is_placeholder_selection) {
                if !tally_contest.selections.contains_key(&selection.object_id) {
                    return Err(ValidationError::UnknownSelection {
                        contest_id: contest.object_id.clone(),
                        selection_id: selection.object_id.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, ballot: &SubmittedBallot) {
        match ballot.state {
            BallotBoxState::Cast => {
                self.cast_ballot_ids.insert(ballot.object_id().to_owned());
            }
            BallotBoxState::Spoiled => {
                self.spoiled_ballots
                    .insert(ballot.object_id().to_owned(), ballot.clone());
            }
            BallotBoxState::Unknown => {}
        }
    }

    /// Add one ballot.
    ///
    /// Duplicates, ballots in the `Unknown` state and ballots failing validation are rejected
    /// and leave the tally untouched. Cast ballots are accumulated; spoiled ballots are kept
    /// for individual decryption.
    pub fn append(
        &mut self,
        ballot: &SubmittedBallot,
        context: &CiphertextElectionContext,
    ) -> Result<(), Error> {
        self.check_appendable(ballot)?;
        ballot.ballot.validate_encryption(
            &context.manifest_hash,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
        )?;

        if ballot.state == BallotBoxState::Cast {
            for contest in &ballot.ballot.contests {
                for selection in contest.selections.iter().filter(|s| !s.is_placeholder_selection) {
                    if let Some(tally_selection) = self
                        .contests
                        .get_mut(&contest.object_id)
                        .and_then(|c| c.selections.get_mut(&selection.object_id))
                    {
                        tally_selection.accumulate(std::iter::once(&selection.ciphertext));
                    }
                }
            }
        }
        self.record(ballot);

        debug!(tally_id = %self.object_id, ballot_id = %ballot.object_id(), state = ?ballot.state, "ballot appended");
        Ok(())
    }

    /// Add a batch of ballots.
    ///
    /// Proofs are verified through `scheduler`, then each selection's ciphertexts are folded
    /// independently. The batch is all or nothing: the first rejected ballot, in input order,
    /// is reported and nothing is appended.
    pub fn batch_append<S: Scheduler>(
        &mut self,
        ballots: &[SubmittedBallot],
        context: &CiphertextElectionContext,
        scheduler: &S,
        mode: ExecutionMode,
    ) -> Result<(), Error> {
        let mut batch_ids = IndexSet::new();
        for ballot in ballots {
            self.check_appendable(ballot)?;
            if !batch_ids.insert(ballot.object_id()) {
                return Err(Error::DuplicateBallot(ballot.object_id().to_owned()));
            }
        }

        let validations = scheduler.schedule(
            ballots.iter().collect(),
            |ballot: &SubmittedBallot| {
                ballot.ballot.validate_encryption(
                    &context.manifest_hash,
                    &context.elgamal_public_key,
                    &context.crypto_extended_base_hash,
                )
            },
            mode,
        );
        for (ballot, validation) in ballots.iter().zip(validations) {
            if let Err(e) = validation {
                warn!(tally_id = %self.object_id, ballot_id = %ballot.object_id(), "rejected ballot batch: {}", e);
                return Err(e.into());
            }
        }

        let mut ciphertexts: IndexMap<(&str, &str), Vec<&ElGamalCiphertext>> = IndexMap::new();
        for ballot in ballots.iter().filter(|b| b.state == BallotBoxState::Cast) {
            for contest in &ballot.ballot.contests {
                for selection in contest.selections.iter().filter(|s| !s.is_placeholder_selection) {
                    ciphertexts
                        .entry((contest.object_id.as_str(), selection.object_id.as_str()))
                        .or_insert_with(Vec::new)
                        .push(&selection.ciphertext);
                }
            }
        }

        let tasks: Vec<((&str, &str), Vec<&ElGamalCiphertext>)> = ciphertexts.into_iter().collect();
        let sums = scheduler.schedule(
            tasks,
            |(key, selection_ciphertexts)| (key, elgamal_add(selection_ciphertexts)),
            mode,
        );
        for ((contest_id, selection_id), sum) in sums {
            if let Some(tally_selection) = self
                .contests
                .get_mut(contest_id)
                .and_then(|c| c.selections.get_mut(selection_id))
            {
                tally_selection.accumulate(std::iter::once(&sum));
            }
        }
        for ballot in ballots {
            self.record(ballot);
        }

        info!(tally_id = %self.object_id, ballots = ballots.len(), total = self.count(), "ballot batch appended");
        Ok(())
    }

    /// The encrypted totals, keyed by contest then selection.
    pub fn ciphertexts(&self) -> IndexMap<String, IndexMap<String, ElGamalCiphertext>> {
        self.contests
            .iter()
            .map(|(contest_id, contest)| {
                let selections = contest
                    .selections
                    .iter()
                    .map(|(selection_id, s)| (selection_id.clone(), s.ciphertext.clone()))
                    .collect();
                (contest_id.clone(), selections)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{encrypt_sample_ballot, sample_contests, sample_context};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn append_accumulates_cast_ballots() {
        let mut rng = ChaCha20Rng::seed_from_u64(70);
        let (context, secret) = sample_context(&mut rng);
        let contests = sample_contests();
        let mut dlog = DiscreteLog::new(10);

        let mut tally = CiphertextTally::new("tally", &contests);
        let ballots = vec![
            encrypt_sample_ballot("b1", "alice", &context, &mut rng),
            encrypt_sample_ballot("b2", "alice", &context, &mut rng),
            encrypt_sample_ballot("b3", "bob", &context, &mut rng),
        ];
        for ballot in &ballots {
            tally
                .append(&SubmittedBallot::new(ballot.clone(), BallotBoxState::Cast), &context)
                .unwrap();
        }
        let spoiled = encrypt_sample_ballot("b4", "bob", &context, &mut rng);
        tally
            .append(&SubmittedBallot::new(spoiled, BallotBoxState::Spoiled), &context)
            .unwrap();

        assert_eq!(tally.count(), 4);
        assert_eq!(tally.cast_ballot_ids().count(), 3);
        assert!(tally.spoiled_ballots().contains_key("b4"));

        let mayor = &tally.contests["mayor"];
        assert_eq!(mayor.selections["alice"].ciphertext.decrypt(&secret, &mut dlog).unwrap(), 2);
        assert_eq!(mayor.selections["bob"].ciphertext.decrypt(&secret, &mut dlog).unwrap(), 1);

        // Duplicate
        let duplicate = SubmittedBallot::new(ballots[0].clone(), BallotBoxState::Cast);
        assert!(matches!(tally.append(&duplicate, &context), Err(Error::DuplicateBallot(_))));
    }

    #[test]
    fn append_rejects_unknown_and_invalid_ballots() {
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let (context, _secret) = sample_context(&mut rng);
        let mut tally = CiphertextTally::new("tally", &sample_contests());

        let ballot = encrypt_sample_ballot("b1", "alice", &context, &mut rng);
        let unknown = SubmittedBallot::new(ballot.clone(), BallotBoxState::Unknown);
        assert!(matches!(tally.append(&unknown, &context), Err(Error::UnknownBallotState(_))));

        let mut tampered = ballot;
        tampered.contests[0].selections[0].ciphertext = ElGamalCiphertext::identity();
        let tampered = SubmittedBallot::new(tampered, BallotBoxState::Cast);
        assert!(matches!(tally.append(&tampered, &context), Err(Error::Validation(_))));
        assert_eq!(tally.count(), 0);
    }

    #[test]
    fn batch_append_matches_append() {
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let (context, _secret) = sample_context(&mut rng);
        let contests = sample_contests();

        let ballots: Vec<SubmittedBallot> = ["alice", "bob", "alice", "bob", "alice"]
            .iter()
            .enumerate()
            .map(|(i, choice)| {
                let ballot = encrypt_sample_ballot(&format!("b{}", i), choice, &context, &mut rng);
                let state = if i == 4 { BallotBoxState::Spoiled } else { BallotBoxState::Cast };
                SubmittedBallot::new(ballot, state)
            })
            .collect();

        let mut one_by_one = CiphertextTally::new("tally", &contests);
        for ballot in &ballots {
            one_by_one.append(ballot, &context).unwrap();
        }

        let mut batched = CiphertextTally::new("tally", &contests);
        batched
            .batch_append(&ballots, &context, &RayonScheduler, ExecutionMode::Parallel)
            .unwrap();

        assert_eq!(one_by_one, batched);

        // A repeated batch is rejected as a whole
        assert!(matches!(
            batched.batch_append(&ballots[..1], &context, &RayonScheduler, ExecutionMode::Sequential),
            Err(Error::DuplicateBallot(_))
        ));
        assert_eq!(batched.count(), 5);
    }
}
