use crate::*;

/// An exponential ElGamal key pair, `public_key = g^secret_key mod P`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElGamalKeyPair {
    pub secret_key: ElementModQ,
    pub public_key: ElementModP,
}

impl ElGamalKeyPair {
    /// Derive the key pair for `secret_key`, which must be at least 2.
    pub fn from_secret(secret_key: ElementModQ) -> Result<Self, Error> {
        if secret_key < ElementModQ::two() {
            return Err(Error::InvalidSecretKey);
        }
        let public_key = g_pow_p(&secret_key);

        Ok(ElGamalKeyPair {
            secret_key,
            public_key,
        })
    }
}

/// An encrypted small integer `(pad, data) = (g^r, g^m * K^r)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElGamalCiphertext {
    pub pad: ElementModP,
    pub data: ElementModP,
}

impl ElGamalCiphertext {
    /// The empty accumulation, `(1, 1)`.
    pub fn identity() -> Self {
        ElGamalCiphertext {
            pad: ElementModP::one(),
            data: ElementModP::one(),
        }
    }

    /// Homomorphic addition of the encrypted messages.
    pub fn add(&self, other: &ElGamalCiphertext) -> ElGamalCiphertext {
        ElGamalCiphertext {
            pad: mult_p(&[self.pad.clone(), other.pad.clone()]),
            data: mult_p(&[self.data.clone(), other.data.clone()]),
        }
    }

    /// A guardian's contribution toward decryption, `pad^secret`.
    pub fn partial_decrypt(&self, secret: &ElementModQ) -> ElementModP {
        pow_p(&self.pad, secret)
    }

    /// Recover the message given the product of all partial decryptions.
    pub fn decrypt_known_product(
        &self,
        product: &ElementModP,
        dlog: &mut DiscreteLog,
    ) -> Result<u64, Error> {
        let message = div_p(&self.data, product)?;
        dlog.discrete_log(&message)
    }

    pub fn decrypt(&self, secret_key: &ElementModQ, dlog: &mut DiscreteLog) -> Result<u64, Error> {
        self.decrypt_known_product(&self.partial_decrypt(secret_key), dlog)
    }

    /// Decrypt with the encryption nonce instead of the secret key.
    pub fn decrypt_known_nonce(
        &self,
        public_key: &ElementModP,
        nonce: &ElementModQ,
        dlog: &mut DiscreteLog,
    ) -> Result<u64, Error> {
        self.decrypt_known_product(&pow_p(public_key, nonce), dlog)
    }

    pub fn is_valid_residue(&self) -> bool {
        self.pad.is_valid_residue() && self.data.is_valid_residue()
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        hash_elems!(self.pad, self.data)
    }
}

/// Encrypt `message` under `public_key` with `nonce`, which must not be zero.
pub fn elgamal_encrypt(
    message: u64,
    nonce: &ElementModQ,
    public_key: &ElementModP,
) -> Result<ElGamalCiphertext, Error> {
    if nonce.is_zero() {
        return Err(Error::ZeroNonce);
    }

    let pad = g_pow_p(nonce);
    let gpowm = g_pow_p(&ElementModQ::from_u64(message));
    let data = mult_p(&[gpowm, pow_p(public_key, nonce)]);

    Ok(ElGamalCiphertext { pad, data })
}

/// Homomorphically sum any number of ciphertexts.
pub fn elgamal_add<'a>(
    ciphertexts: impl IntoIterator<Item = &'a ElGamalCiphertext>,
) -> ElGamalCiphertext {
    ciphertexts
        .into_iter()
        .fold(ElGamalCiphertext::identity(), |acc, c| acc.add(c))
}

/// The joint key for a set of guardian public keys, `Π K_i mod P`.
pub fn elgamal_combine_public_keys<'a>(
    keys: impl IntoIterator<Item = &'a ElementModP>,
) -> ElementModP {
    mult_p(keys)
}
