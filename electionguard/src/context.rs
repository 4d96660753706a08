use crate::*;

/// Public election parameters every ballot and proof is bound to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextElectionContext {
    pub number_of_guardians: usize,
    pub quorum: usize,
    pub elgamal_public_key: ElementModP,
    pub commitment_hash: ElementModQ,
    pub manifest_hash: ElementModQ,
    pub crypto_base_hash: ElementModQ,
    pub crypto_extended_base_hash: ElementModQ,
}

/// Build the election context from the ceremony output and the manifest hash.
///
/// `crypto_base_hash = H(P, Q, G, n, k, manifest_hash)` and
/// `crypto_extended_base_hash = H(crypto_base_hash, commitment_hash)`.
pub fn make_ciphertext_election_context(
    ceremony_details: &CeremonyDetails,
    joint_key: &ElectionJointKey,
    manifest_hash: &ElementModQ,
) -> CiphertextElectionContext {
    let crypto_base_hash = hash_elems!(
        *P,
        *Q,
        *G,
        ceremony_details.number_of_guardians,
        ceremony_details.quorum,
        manifest_hash
    );
    let crypto_extended_base_hash = hash_elems!(crypto_base_hash, joint_key.commitment_hash);

    CiphertextElectionContext {
        number_of_guardians: ceremony_details.number_of_guardians,
        quorum: ceremony_details.quorum,
        elgamal_public_key: joint_key.joint_public_key.clone(),
        commitment_hash: joint_key.commitment_hash.clone(),
        manifest_hash: manifest_hash.clone(),
        crypto_base_hash,
        crypto_extended_base_hash,
    }
}

impl CiphertextElectionContext {
    pub fn ceremony_details(&self) -> Result<CeremonyDetails, Error> {
        CeremonyDetails::new(self.number_of_guardians, self.quorum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_hashes_bind_parameters() {
        let joint_key = ElectionJointKey {
            joint_public_key: g_pow_p(&ElementModQ::from_u64(1234)),
            commitment_hash: ElementModQ::from_u64(5),
        };
        let manifest_hash = ElementModQ::from_u64(6);

        let context = make_ciphertext_election_context(
            &CeremonyDetails::new(5, 3).unwrap(),
            &joint_key,
            &manifest_hash,
        );
        let other_quorum = make_ciphertext_election_context(
            &CeremonyDetails::new(5, 4).unwrap(),
            &joint_key,
            &manifest_hash,
        );

        assert_ne!(context.crypto_base_hash, other_quorum.crypto_base_hash);
        assert_eq!(
            context.crypto_extended_base_hash,
            hash_elems!(context.crypto_base_hash, joint_key.commitment_hash)
        );
        assert_eq!(context.ceremony_details().unwrap().quorum, 3);
    }
}
