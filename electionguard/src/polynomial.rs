use crate::*;
use rand::{CryptoRng, RngCore};

const POLYNOMIAL_RNG_INFO: &[u8] = b"electionguard_election_polynomial";

/// A guardian's secret sharing polynomial.
///
/// The constant term is the guardian's election secret key. Commitments `g^a_j` and one Schnorr
/// proof per coefficient are public.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPolynomial {
    pub coefficients: Vec<ElementModQ>,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// Generate a polynomial with `number_of_coefficients` coefficients (degree one less).
///
/// With a `nonce`, coefficients and proof commitments are drawn from an RNG seeded by it, so the
/// same nonce always yields the same polynomial.
pub fn generate_polynomial<R: RngCore + CryptoRng>(
    number_of_coefficients: usize,
    nonce: Option<&ElementModQ>,
    rng: &mut R,
) -> Result<ElectionPolynomial, Error> {
    match nonce {
        Some(nonce) => {
            let mut seeded = seeded_rng(nonce, POLYNOMIAL_RNG_INFO);
            build_polynomial(number_of_coefficients, &mut seeded)
        }
        None => build_polynomial(number_of_coefficients, rng),
    }
}

fn build_polynomial<R: RngCore + CryptoRng>(
    number_of_coefficients: usize,
    rng: &mut R,
) -> Result<ElectionPolynomial, Error> {
    if number_of_coefficients == 0 {
        return Err(ValidationError::InvalidConfig(
            "a polynomial needs at least one coefficient".to_owned(),
        )
        .into());
    }

    let mut coefficients = Vec::with_capacity(number_of_coefficients);
    let mut coefficient_commitments = Vec::with_capacity(number_of_coefficients);
    let mut coefficient_proofs = Vec::with_capacity(number_of_coefficients);

    for _ in 0..number_of_coefficients {
        // Every coefficient must be usable as an ElGamal secret key
        let coefficient = rand_range_q(2, rng);
        let keypair = ElGamalKeyPair::from_secret(coefficient)?;
        let proof = make_schnorr_proof(&keypair, &rand_q(rng));

        coefficients.push(keypair.secret_key);
        coefficient_commitments.push(keypair.public_key);
        coefficient_proofs.push(proof);
    }

    Ok(ElectionPolynomial {
        coefficients,
        coefficient_commitments,
        coefficient_proofs,
    })
}

/// Evaluate the polynomial at `exponent_modifier`, `Σ a_j * x^j mod Q`.
pub fn compute_polynomial_coordinate(
    exponent_modifier: u64,
    polynomial: &ElectionPolynomial,
) -> Result<ElementModQ, Error> {
    let x = ElementModQ::from_u64(exponent_modifier);
    if x.is_zero() {
        return Err(Error::InvalidCoordinate(exponent_modifier));
    }

    let terms: Vec<ElementModQ> = polynomial
        .coefficients
        .iter()
        .enumerate()
        .map(|(j, coefficient)| mult_q(&[coefficient.clone(), pow_q(&x, j as u64)]))
        .collect();

    Ok(add_q(&terms))
}

/// Lagrange coefficient at zero for `coordinate` over the other interpolation nodes `degrees`.
///
/// `Π degrees / Π (degree - coordinate) mod Q`
pub fn compute_lagrange_coefficient(
    coordinate: u64,
    degrees: &[u64],
) -> Result<ElementModQ, Error> {
    let coordinate = ElementModQ::from_u64(coordinate);
    let nodes: Vec<ElementModQ> = degrees.iter().map(|d| ElementModQ::from_u64(*d)).collect();
    let differences: Vec<ElementModQ> = nodes
        .iter()
        .map(|degree| a_minus_b_q(degree, &coordinate))
        .collect();

    div_q(&mult_q(&nodes), &mult_q(&differences))
}

/// `g^P(x) = Π K_j^(x^j)`, the public image of a coordinate computed from the commitments alone.
pub fn compute_polynomial_commitment(
    exponent_modifier: u64,
    coefficient_commitments: &[ElementModP],
) -> ElementModP {
    let x = ElementModQ::from_u64(exponent_modifier);
    let terms: Vec<ElementModP> = coefficient_commitments
        .iter()
        .enumerate()
        .map(|(j, commitment)| pow_p(commitment, &pow_q(&x, j as u64)))
        .collect();

    mult_p(&terms)
}

/// Check a coordinate against the polynomial's public commitments,
/// `g^coordinate == Π K_j^(x^j)`.
pub fn verify_polynomial_coordinate(
    coordinate: &ElementModQ,
    exponent_modifier: u64,
    coefficient_commitments: &[ElementModP],
) -> bool {
    g_pow_p(coordinate) == compute_polynomial_commitment(exponent_modifier, coefficient_commitments)
}
