//! Byte and text encodings used inside the arkworks engine.
//!
//! The raw layout is the engine's private business: little-endian canonical
//! limbs for prime field elements, `c0 ‖ c1` for quadratic extensions and
//! Jacobian `(X, Y, Z)` triples for points, with the all-zero buffer as the
//! identity.

use ark_bls12_381::{Fq, Fq2, Fq6, Fq12, Fr as ArkFr};
use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ec::CurveGroup;
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use num_bigint::BigUint;
use num_traits::Num;

use super::ByteOrder;
use crate::errors::EngineError;

/// Fixed-width raw encoding.
pub(super) trait Raw: Sized {
    const LEN: usize;

    /// `bytes` is exactly `LEN` long.
    fn decode(bytes: &[u8]) -> Result<Self, EngineError>;

    /// `out` is exactly `LEN` long.
    fn encode(&self, out: &mut [u8]);
}

fn limbs_le<F: PrimeField>(bytes: &[u8]) -> F::BigInt {
    let mut big = F::BigInt::default();
    for (limb, chunk) in big.as_mut().iter_mut().zip(bytes.chunks(8)) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        *limb = u64::from_le_bytes(word);
    }
    big
}

fn decode_prime<F: PrimeField>(bytes: &[u8]) -> Result<F, EngineError> {
    F::from_bigint(limbs_le::<F>(bytes))
        .ok_or(EngineError::InvalidEncoding("value not below the modulus"))
}

fn encode_prime<F: PrimeField>(value: &F, out: &mut [u8]) {
    let big = value.into_bigint();
    for (chunk, limb) in out.chunks_mut(8).zip(big.as_ref()) {
        chunk.copy_from_slice(&limb.to_le_bytes()[..chunk.len()]);
    }
}

macro_rules! prime_raw {
    ($field:ty, $len:expr) => {
        impl Raw for $field {
            const LEN: usize = $len;

            fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
                decode_prime(bytes)
            }

            fn encode(&self, out: &mut [u8]) {
                encode_prime(self, out)
            }
        }
    };
}

prime_raw!(ArkFr, 32);
prime_raw!(Fq, 48);

impl Raw for Fq2 {
    const LEN: usize = 2 * Fq::LEN;

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let (c0, c1) = bytes.split_at(Fq::LEN);
        Ok(Fq2::new(Fq::decode(c0)?, Fq::decode(c1)?))
    }

    fn encode(&self, out: &mut [u8]) {
        let (c0, c1) = out.split_at_mut(Fq::LEN);
        self.c0.encode(c0);
        self.c1.encode(c1);
    }
}

impl Raw for Fq12 {
    const LEN: usize = 6 * Fq2::LEN;

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let part = |i: usize| Fq2::decode(&bytes[i * Fq2::LEN..(i + 1) * Fq2::LEN]);
        Ok(Fq12::new(
            Fq6::new(part(0)?, part(1)?, part(2)?),
            Fq6::new(part(3)?, part(4)?, part(5)?),
        ))
    }

    fn encode(&self, out: &mut [u8]) {
        let parts = [
            self.c0.c0, self.c0.c1, self.c0.c2, self.c1.c0, self.c1.c1, self.c1.c2,
        ];
        for (chunk, part) in out.chunks_exact_mut(Fq2::LEN).zip(parts.iter()) {
            part.encode(chunk);
        }
    }
}

/// Raw Jacobian coordinates without collapsing `Z = 0` onto the identity.
pub(super) fn decode_coords<P: SWCurveConfig>(
    bytes: &[u8],
) -> Result<(P::BaseField, P::BaseField, P::BaseField), EngineError>
where
    P::BaseField: Raw,
{
    let n = <P::BaseField as Raw>::LEN;
    Ok((
        Raw::decode(&bytes[..n])?,
        Raw::decode(&bytes[n..2 * n])?,
        Raw::decode(&bytes[2 * n..3 * n])?,
    ))
}

/// `Y² = X³ + a·X·Z⁴ + b·Z⁶`. The all-zero triple satisfies it.
pub(super) fn on_curve_jacobian<P: SWCurveConfig>(
    x: P::BaseField,
    y: P::BaseField,
    z: P::BaseField,
) -> bool {
    let z2 = z.square();
    let z4 = z2.square();
    let z6 = z4 * z2;
    y.square() == x.square() * x + P::COEFF_A * x * z4 + P::COEFF_B * z6
}

impl<P: SWCurveConfig> Raw for Projective<P>
where
    P::BaseField: Raw,
{
    const LEN: usize = 3 * <P::BaseField as Raw>::LEN;

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let (x, y, z) = decode_coords::<P>(bytes)?;
        if z.is_zero() {
            Ok(Self::zero())
        } else {
            Ok(Self::new_unchecked(x, y, z))
        }
    }

    fn encode(&self, out: &mut [u8]) {
        if self.is_zero() {
            out.fill(0);
            return;
        }
        let n = <P::BaseField as Raw>::LEN;
        self.x.encode(&mut out[..n]);
        self.y.encode(&mut out[n..2 * n]);
        self.z.encode(&mut out[2 * n..]);
    }
}

pub(super) fn from_bytes<F: PrimeField>(bytes: &[u8], order: ByteOrder) -> F {
    match order {
        ByteOrder::LittleEndian => masked_le(bytes),
        ByteOrder::LittleEndianMod => F::from_le_bytes_mod_order(bytes),
        ByteOrder::BigEndianMod => F::from_be_bytes_mod_order(bytes),
    }
}

/// Keeps the low `MODULUS_BIT_SIZE` bits and, if that is still not below the
/// modulus, drops the top one as well.
fn masked_le<F: PrimeField>(bytes: &[u8]) -> F {
    let bits = F::MODULUS_BIT_SIZE as usize;
    let mut big = limbs_le::<F>(bytes);
    for (i, limb) in big.as_mut().iter_mut().enumerate() {
        let low = i * 64;
        if low >= bits {
            *limb = 0;
        } else if bits - low < 64 {
            *limb &= (1u64 << (bits - low)) - 1;
        }
    }
    if let Some(value) = F::from_bigint(big) {
        return value;
    }
    if let Some(limb) = big.as_mut().get_mut((bits - 1) / 64) {
        *limb &= !(1u64 << ((bits - 1) % 64));
    }
    F::from_bigint(big).unwrap_or_default()
}

/// Prime field element in a fixed-width byte string of the given endianness.
pub(super) fn field_bytes<F: PrimeField + Raw>(value: &F, big_endian: bool) -> Vec<u8> {
    let mut out = vec![0u8; F::LEN];
    value.encode(&mut out);
    if big_endian {
        out.reverse();
    }
    out
}

pub(super) fn field_from_bytes<F: PrimeField + Raw>(
    bytes: &[u8],
    big_endian: bool,
) -> Result<F, EngineError> {
    if bytes.len() != F::LEN {
        return Err(EngineError::InvalidEncoding("wrong field element length"));
    }
    if big_endian {
        let mut le = bytes.to_vec();
        le.reverse();
        F::decode(&le)
    } else {
        F::decode(bytes)
    }
}

fn modulus<F: PrimeField>() -> BigUint {
    BigUint::from_bytes_le(&F::MODULUS.to_bytes_le())
}

pub(super) fn output_radix(radix: u32) -> Result<u32, EngineError> {
    match radix {
        0 | 10 => Ok(10),
        16 => Ok(16),
        _ => Err(EngineError::InvalidEncoding("radix must be 10 or 16")),
    }
}

/// Parses one integer token. A leading `-` negates; radix `0` picks base 16
/// for a `0x` prefix and base 10 otherwise.
pub(super) fn parse_prime<F: PrimeField>(token: &str, radix: u32) -> Result<F, EngineError> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let hex_digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    let (digits, radix) = match (radix, hex_digits) {
        (0, Some(rest)) | (16, Some(rest)) => (rest, 16),
        (0, None) | (10, None) => (digits, 10),
        (16, None) => (digits, 16),
        _ => return Err(EngineError::InvalidEncoding("radix must be 0, 10 or 16")),
    };
    if digits.is_empty() {
        return Err(EngineError::InvalidEncoding("empty number"));
    }
    let value = BigUint::from_str_radix(digits, radix)
        .map_err(|_| EngineError::InvalidEncoding("bad digit"))?;
    if value >= modulus::<F>() {
        return Err(EngineError::InvalidEncoding("value not below the modulus"));
    }
    let element = F::from_le_bytes_mod_order(&value.to_bytes_le());
    Ok(if negative { -element } else { element })
}

pub(super) fn format_prime<F: PrimeField>(value: &F, radix: u32) -> String {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le()).to_str_radix(radix)
}

/// Whitespace-separated text form of a field element.
pub(super) trait TextField: Sized {
    const TOKENS: usize;

    /// `tokens` holds exactly `TOKENS` entries.
    fn parse(tokens: &[&str], radix: u32) -> Result<Self, EngineError>;

    fn format(&self, radix: u32, out: &mut Vec<String>);
}

impl TextField for ArkFr {
    const TOKENS: usize = 1;

    fn parse(tokens: &[&str], radix: u32) -> Result<Self, EngineError> {
        parse_prime(tokens[0], radix)
    }

    fn format(&self, radix: u32, out: &mut Vec<String>) {
        out.push(format_prime(self, radix));
    }
}

impl TextField for Fq {
    const TOKENS: usize = 1;

    fn parse(tokens: &[&str], radix: u32) -> Result<Self, EngineError> {
        parse_prime(tokens[0], radix)
    }

    fn format(&self, radix: u32, out: &mut Vec<String>) {
        out.push(format_prime(self, radix));
    }
}

impl TextField for Fq2 {
    const TOKENS: usize = 2;

    fn parse(tokens: &[&str], radix: u32) -> Result<Self, EngineError> {
        Ok(Fq2::new(
            parse_prime(tokens[0], radix)?,
            parse_prime(tokens[1], radix)?,
        ))
    }

    fn format(&self, radix: u32, out: &mut Vec<String>) {
        self.c0.format(radix, out);
        self.c1.format(radix, out);
    }
}

impl TextField for Fq12 {
    const TOKENS: usize = 6 * Fq2::TOKENS;

    fn parse(tokens: &[&str], radix: u32) -> Result<Self, EngineError> {
        let part = |i: usize| Fq2::parse(&tokens[2 * i..2 * i + 2], radix);
        Ok(Fq12::new(
            Fq6::new(part(0)?, part(1)?, part(2)?),
            Fq6::new(part(3)?, part(4)?, part(5)?),
        ))
    }

    fn format(&self, radix: u32, out: &mut Vec<String>) {
        for part in [
            self.c0.c0, self.c0.c1, self.c0.c2, self.c1.c0, self.c1.c1, self.c1.c2,
        ] {
            part.format(radix, out);
        }
    }
}

pub(super) fn parse_exact<T: TextField>(tokens: &[&str], radix: u32) -> Result<T, EngineError> {
    if tokens.len() != T::TOKENS {
        return Err(EngineError::InvalidEncoding("wrong number of components"));
    }
    T::parse(tokens, radix)
}

/// `"0"` for the identity, `"1 x y"` for an affine point.
pub(super) fn parse_point<P: SWCurveConfig>(
    tokens: &[&str],
    radix: u32,
    verify_order: bool,
) -> Result<Projective<P>, EngineError>
where
    P::BaseField: TextField,
{
    let n = <P::BaseField as TextField>::TOKENS;
    match tokens.split_first() {
        Some((&"0", [])) => Ok(Projective::zero()),
        Some((&"1", rest)) if rest.len() == 2 * n => {
            let x = P::BaseField::parse(&rest[..n], radix)?;
            let y = P::BaseField::parse(&rest[n..], radix)?;
            let point = Affine::<P>::new_unchecked(x, y);
            if !point.is_on_curve() {
                return Err(EngineError::InvalidEncoding("point not on curve"));
            }
            if verify_order && !point.is_in_correct_subgroup_assuming_on_curve() {
                return Err(EngineError::InvalidEncoding("point not in prime-order subgroup"));
            }
            Ok(point.into())
        }
        _ => Err(EngineError::InvalidEncoding("malformed point text")),
    }
}

pub(super) fn format_point<P: SWCurveConfig>(point: &Projective<P>, radix: u32) -> String
where
    P::BaseField: TextField,
{
    if point.is_zero() {
        return "0".to_string();
    }
    let affine = point.into_affine();
    let mut parts = vec!["1".to_string()];
    affine.x.format(radix, &mut parts);
    affine.y.format(radix, &mut parts);
    parts.join(" ")
}
