// Group elements and opaque byte buffers are serialized as hexadecimal.
use crate::*;
use serde::{Deserializer, Serializer};
use std::borrow::Cow;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum ElementModPHex {}

impl Hex<ElementModP> for ElementModPHex {
    type Error = Error;

    fn create_bytes(element: &ElementModP) -> Cow<'_, [u8]> {
        Cow::from(element.to_bytes_be())
    }

    fn from_bytes(bytes: &[u8]) -> Result<ElementModP, Error> {
        ElementModP::from_bytes_be(bytes)
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum ElementModQHex {}

impl Hex<ElementModQ> for ElementModQHex {
    type Error = Error;

    fn create_bytes(element: &ElementModQ) -> Cow<'_, [u8]> {
        Cow::from(element.to_bytes_be())
    }

    fn from_bytes(bytes: &[u8]) -> Result<ElementModQ, Error> {
        ElementModQ::from_bytes_be(bytes)
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum BytesHex {}

impl Hex<Vec<u8>> for BytesHex {
    type Error = String;

    fn create_bytes(bytes: &Vec<u8>) -> Cow<'_, [u8]> {
        Cow::from(bytes.as_slice())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Vec<u8>, String> {
        Ok(bytes.to_vec())
    }
}

impl serde::Serialize for ElementModP {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ElementModPHex::serialize(self, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ElementModP {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ElementModPHex::deserialize(deserializer)
    }
}

impl serde::Serialize for ElementModQ {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ElementModQHex::serialize(self, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ElementModQ {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ElementModQHex::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_serialize_as_hex() {
        let q = ElementModQ::from_u64(0xABCD);
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, "\"abcd\"");
        assert_eq!(serde_json::from_str::<ElementModQ>(&json).unwrap(), q);

        // Q itself is out of bounds and must not deserialize
        let out_of_bounds = format!("\"{}\"", hex::encode(Q.to_bytes_be()));
        assert!(serde_json::from_str::<ElementModQ>(&out_of_bounds).is_err());
    }
}
