use crate::*;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// A value that can be fed into [`hash_elems`].
///
/// Each implementation renders itself as a single canonical string token. `None` renders as
/// `"null"`, so an absent optional and an empty sequence hash identically.
pub trait CryptoHashable {
    fn hash_token(&self) -> String;
}

/// Records whose hash binds a description hash supplied by the caller.
pub trait CryptoHashCheckable {
    fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ;
}

const NULL_TOKEN: &str = "null";

/// Hash a sequence of heterogeneous values into an `ElementModQ`.
///
/// Every token is followed by `|` and fed through a single SHA-256. The digest is read as an
/// unsigned big-endian integer and reduced mod `Q - 1`.
pub fn hash_elems(elems: &[&dyn CryptoHashable]) -> ElementModQ {
    let mut hasher = Sha256::new();
    for elem in elems {
        let mut token = elem.hash_token();
        token.push('|');
        hasher.update(token.as_bytes());
    }
    let digest = hasher.finalize();

    let value = BigUint::from_bytes_be(&digest) % &*Q_MINUS_ONE;
    mod_q(&value)
}

/// Hash any number of [`CryptoHashable`] expressions.
///
/// `hash_elems!(a, b, c)` is `hash_elems(&[&a, &b, &c])`.
#[macro_export]
macro_rules! hash_elems {
    ($($elem:expr),* $(,)?) => {
        $crate::hash_elems(&[$(&$elem as &dyn $crate::CryptoHashable),*])
    };
}

impl CryptoHashable for ElementModP {
    fn hash_token(&self) -> String {
        self.to_hex()
    }
}

impl CryptoHashable for ElementModQ {
    fn hash_token(&self) -> String {
        self.to_hex()
    }
}

impl CryptoHashable for BigUint {
    fn hash_token(&self) -> String {
        biguint_to_hex(self)
    }
}

impl CryptoHashable for str {
    fn hash_token(&self) -> String {
        self.to_owned()
    }
}

impl CryptoHashable for String {
    fn hash_token(&self) -> String {
        self.clone()
    }
}

impl CryptoHashable for uuid::Uuid {
    fn hash_token(&self) -> String {
        self.to_string()
    }
}

macro_rules! impl_hashable_for_integer {
    ($($t:ty),*) => {
        $(
            impl CryptoHashable for $t {
                fn hash_token(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_hashable_for_integer!(u8, u16, u32, u64, usize, i32, i64);

impl<T: CryptoHashable + ?Sized> CryptoHashable for &T {
    fn hash_token(&self) -> String {
        (**self).hash_token()
    }
}

impl<T: CryptoHashable> CryptoHashable for Option<T> {
    fn hash_token(&self) -> String {
        match self {
            Some(value) => value.hash_token(),
            None => NULL_TOKEN.to_owned(),
        }
    }
}

// Sequences are crunched recursively and contribute the hex of their own hash.
impl<T: CryptoHashable> CryptoHashable for [T] {
    fn hash_token(&self) -> String {
        if self.is_empty() {
            return NULL_TOKEN.to_owned();
        }
        let elems: Vec<&dyn CryptoHashable> =
            self.iter().map(|e| e as &dyn CryptoHashable).collect();
        hash_elems(&elems).to_hex()
    }
}

impl<T: CryptoHashable> CryptoHashable for Vec<T> {
    fn hash_token(&self) -> String {
        self.as_slice().hash_token()
    }
}
