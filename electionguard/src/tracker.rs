use crate::*;
use uuid::Uuid;

/// An encryption device, identified by a UUID and a location.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncryptionDevice {
    pub uuid: Uuid,
    pub location: String,
}

impl EncryptionDevice {
    pub fn new(location: &str) -> Self {
        EncryptionDevice {
            uuid: Uuid::new_v4(),
            location: location.to_owned(),
        }
    }

    /// The first code of this device's tracking chain.
    pub fn initial_code_seed(&self) -> ElementModQ {
        get_hash_for_device(&self.uuid, &self.location)
    }
}

/// `H(uuid, location)`
pub fn get_hash_for_device(uuid: &Uuid, location: &str) -> ElementModQ {
    hash_elems!(uuid, location)
}

/// The next tracking code, `H(previous, timestamp, ballot_hash)`.
pub fn get_rotating_tracker_hash(
    previous_code: &ElementModQ,
    timestamp: u64,
    ballot_hash: &ElementModQ,
) -> ElementModQ {
    hash_elems!(previous_code, timestamp, ballot_hash)
}

/// Hex form of a tracking code, for consumers that render it.
pub fn tracker_hash_to_hex(code: &ElementModQ) -> String {
    code.to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_codes_chain() {
        let device = EncryptionDevice::new("polling-place-1");
        let seed = device.initial_code_seed();
        assert_eq!(seed, get_hash_for_device(&device.uuid, "polling-place-1"));

        let first = get_rotating_tracker_hash(&seed, 1000, &ElementModQ::from_u64(1));
        let second = get_rotating_tracker_hash(&first, 1001, &ElementModQ::from_u64(2));

        assert_ne!(first, second);
        assert_eq!(
            second,
            get_rotating_tracker_hash(
                &get_rotating_tracker_hash(&seed, 1000, &ElementModQ::from_u64(1)),
                1001,
                &ElementModQ::from_u64(2)
            )
        );
        assert_ne!(
            first,
            get_rotating_tracker_hash(&seed, 1001, &ElementModQ::from_u64(1))
        );
        assert_eq!(tracker_hash_to_hex(&first).len() % 2, 0);
    }
}
