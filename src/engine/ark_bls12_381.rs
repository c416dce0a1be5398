use ark_bls12_381::{
    Bls12_381, Config, Fq, Fq2, Fq12, Fr as ArkFr, G1Affine, G1Projective, G2Affine, G2Projective,
    g1, g2,
};
use ark_ec::bls12::{G1Prepared, G2Prepared};
use ark_ec::hashing::curve_maps::wb::WBMap;
use ark_ec::hashing::map_to_curve_hasher::{MapToCurve, MapToCurveBasedHasher};
use ark_ec::hashing::HashToCurve;
use ark_ec::pairing::{MillerLoopOutput, Pairing};
use ark_ec::short_weierstrass::{Projective, SWCurveConfig};
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup, VariableBaseMSM};
use ark_ff::field_hashers::DefaultFieldHasher;
use ark_ff::{Field, One, PrimeField, Zero, batch_inversion};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use rayon::prelude::*;
use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, trace};

use super::codec::{
    Raw, TextField, decode_coords, field_bytes, field_from_bytes, format_point, from_bytes,
    on_curve_jacobian, output_radix, parse_exact, parse_point,
};
use super::{BinaryOp, ByteOrder, Call, CurveParams, Engine, Predicate, Ptr, UnaryOp};
use crate::config::{CurveId, DEFAULT_MEMORY_SIZE, MapToMode, SerializationMode};
use crate::errors::EngineError;
use crate::value::Kind;


const DST_G1: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";
const DST_G2: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Infinity flag and coefficient count, one little-endian `u64` each.
const TABLE_HEADER: usize = 16;
const LINE_LEN: usize = 3 * Fq2::LEN;

type FieldHasher = DefaultFieldHasher<Sha256, 128>;
type G1Hasher = MapToCurveBasedHasher<G1Projective, FieldHasher, WBMap<g1::Config>>;
type G2Hasher = MapToCurveBasedHasher<G2Projective, FieldHasher, WBMap<g2::Config>>;

/// BLS12-381 engine built on arkworks.
///
/// Owns a flat byte memory and decodes every operand from it on each call,
/// so callers only ever see bytes.
#[derive(Debug)]
pub struct ArkEngine {
    memory: Vec<u8>,
    params: Option<CurveParams>,
}

impl ArkEngine {
    pub fn new() -> Self {
        Self::with_memory_size(DEFAULT_MEMORY_SIZE)
    }

    pub fn with_memory_size(bytes: usize) -> Self {
        Self {
            memory: vec![0u8; bytes],
            params: None,
        }
    }

    fn initialized(&self) -> Result<CurveParams, EngineError> {
        self.params.ok_or(EngineError::NotInitialized)
    }

    fn bytes(&self, ptr: Ptr, len: usize) -> Result<&[u8], EngineError> {
        let end = ptr.checked_add(len).ok_or(EngineError::OutOfBounds)?;
        self.memory.get(ptr..end).ok_or(EngineError::OutOfBounds)
    }

    fn bytes_mut(&mut self, ptr: Ptr, len: usize) -> Result<&mut [u8], EngineError> {
        let end = ptr.checked_add(len).ok_or(EngineError::OutOfBounds)?;
        self.memory.get_mut(ptr..end).ok_or(EngineError::OutOfBounds)
    }

    fn load<T: Raw>(&self, ptr: Ptr) -> Result<T, EngineError> {
        T::decode(self.bytes(ptr, T::LEN)?)
    }

    fn store<T: Raw>(&mut self, ptr: Ptr, value: &T) -> Result<usize, EngineError> {
        value.encode(self.bytes_mut(ptr, T::LEN)?);
        Ok(0)
    }

    fn load_vec<T: Raw + Send>(&self, ptr: Ptr, n: usize) -> Result<Vec<T>, EngineError> {
        let len = n.checked_mul(T::LEN).ok_or(EngineError::OutOfBounds)?;
        self.bytes(ptr, len)?
            .par_chunks_exact(T::LEN)
            .map(T::decode)
            .collect()
    }

    fn store_vec<T: Raw>(&mut self, ptr: Ptr, values: &[T]) -> Result<usize, EngineError> {
        let len = values.len() * T::LEN;
        for (chunk, value) in self.bytes_mut(ptr, len)?.chunks_exact_mut(T::LEN).zip(values) {
            value.encode(chunk);
        }
        Ok(0)
    }

    fn write_out(&mut self, dst: Ptr, cap: usize, data: &[u8]) -> Result<usize, EngineError> {
        if data.len() > cap {
            return Err(EngineError::BufferTooSmall {
                needed: data.len(),
                capacity: cap,
            });
        }
        self.bytes_mut(dst, data.len())?.copy_from_slice(data);
        Ok(data.len())
    }

    fn text(&self, src: Ptr, len: usize) -> Result<Vec<&str>, EngineError> {
        let text = std::str::from_utf8(self.bytes(src, len)?)
            .map_err(|_| EngineError::InvalidEncoding("text is not utf-8"))?;
        Ok(text.split_whitespace().collect())
    }

    fn map1<A: Raw, B: Raw>(
        &mut self,
        out: Ptr,
        x: Ptr,
        f: impl FnOnce(A) -> B,
    ) -> Result<usize, EngineError> {
        let result = f(self.load(x)?);
        self.store(out, &result)
    }

    fn map2<A: Raw, B: Raw, C: Raw>(
        &mut self,
        out: Ptr,
        x: Ptr,
        y: Ptr,
        f: impl FnOnce(A, B) -> C,
    ) -> Result<usize, EngineError> {
        let result = f(self.load(x)?, self.load(y)?);
        self.store(out, &result)
    }

    fn set_int(&mut self, kind: Kind, out: Ptr, value: i64) -> Result<usize, EngineError> {
        match kind {
            Kind::Fr => self.store(out, &signed::<ArkFr>(value)),
            Kind::Fp => self.store(out, &signed::<Fq>(value)),
            Kind::Fp2 => self.store(out, &Fq2::new(signed(value), Fq::zero())),
            Kind::Gt => {
                let mut element = Fq12::zero();
                element.c0.c0.c0 = signed(value);
                self.store(out, &element)
            }
            Kind::G1 | Kind::G2 => Err(unsupported("set_int", kind)),
        }
    }

    fn set_bytes(
        &mut self,
        kind: Kind,
        out: Ptr,
        src: Ptr,
        len: usize,
        order: ByteOrder,
    ) -> Result<usize, EngineError> {
        match kind {
            Kind::Fr => {
                let value: ArkFr = from_bytes(self.bytes(src, len)?, order);
                self.store(out, &value)
            }
            Kind::Fp => {
                let value: Fq = from_bytes(self.bytes(src, len)?, order);
                self.store(out, &value)
            }
            _ => Err(unsupported("set_bytes", kind)),
        }
    }

    fn set_str(
        &mut self,
        kind: Kind,
        out: Ptr,
        (src, len): (Ptr, usize),
        radix: u32,
        verify_order: bool,
    ) -> Result<usize, EngineError> {
        match kind {
            Kind::Fr => {
                let value: ArkFr = parse_exact(&self.text(src, len)?, radix)?;
                self.store(out, &value)
            }
            Kind::Fp => {
                let value: Fq = parse_exact(&self.text(src, len)?, radix)?;
                self.store(out, &value)
            }
            Kind::Fp2 => {
                let value: Fq2 = parse_exact(&self.text(src, len)?, radix)?;
                self.store(out, &value)
            }
            Kind::G1 => {
                let point: G1Projective =
                    parse_point(&self.text(src, len)?, radix, verify_order)?;
                self.store(out, &point)
            }
            Kind::G2 => {
                let point: G2Projective =
                    parse_point(&self.text(src, len)?, radix, verify_order)?;
                self.store(out, &point)
            }
            Kind::Gt => {
                let value: Fq12 = parse_exact(&self.text(src, len)?, radix)?;
                self.store(out, &value)
            }
        }
    }

    fn get_str(
        &mut self,
        kind: Kind,
        x: Ptr,
        (dst, cap): (Ptr, usize),
        radix: u32,
    ) -> Result<usize, EngineError> {
        let radix = output_radix(radix)?;
        let text = match kind {
            Kind::Fr => format_field(&self.load::<ArkFr>(x)?, radix),
            Kind::Fp => format_field(&self.load::<Fq>(x)?, radix),
            Kind::Fp2 => format_field(&self.load::<Fq2>(x)?, radix),
            Kind::G1 => format_point(&self.load::<G1Projective>(x)?, radix),
            Kind::G2 => format_point(&self.load::<G2Projective>(x)?, radix),
            Kind::Gt => format_field(&self.load::<Fq12>(x)?, radix),
        };
        self.write_out(dst, cap, text.as_bytes())
    }

    fn serialize(
        &mut self,
        kind: Kind,
        x: Ptr,
        (dst, cap): (Ptr, usize),
        mode: SerializationMode,
    ) -> Result<usize, EngineError> {
        let big_endian = mode == SerializationMode::Ethereum;
        let data = match kind {
            Kind::Fr => field_bytes(&self.load::<ArkFr>(x)?, big_endian),
            Kind::Fp => field_bytes(&self.load::<Fq>(x)?, big_endian),
            Kind::Fp2 => {
                let value = self.load::<Fq2>(x)?;
                let (first, second) = if big_endian {
                    (value.c1, value.c0)
                } else {
                    (value.c0, value.c1)
                };
                let mut data = field_bytes(&first, big_endian);
                data.extend(field_bytes(&second, big_endian));
                data
            }
            Kind::G1 => compressed(&self.load::<G1Projective>(x)?.into_affine())?,
            Kind::G2 => compressed(&self.load::<G2Projective>(x)?.into_affine())?,
            Kind::Gt => compressed(&self.load::<Fq12>(x)?)?,
        };
        self.write_out(dst, cap, &data)
    }

    fn deserialize(
        &mut self,
        kind: Kind,
        out: Ptr,
        (src, len): (Ptr, usize),
        mode: SerializationMode,
        verify_order: bool,
    ) -> Result<usize, EngineError> {
        let big_endian = mode == SerializationMode::Ethereum;
        match kind {
            Kind::Fr => {
                let value: ArkFr = field_from_bytes(self.bytes(src, len)?, big_endian)?;
                self.store(out, &value)
            }
            Kind::Fp => {
                let value: Fq = field_from_bytes(self.bytes(src, len)?, big_endian)?;
                self.store(out, &value)
            }
            Kind::Fp2 => {
                let bytes = self.bytes(src, len)?;
                if bytes.len() != 2 * Fq::LEN {
                    return Err(EngineError::InvalidEncoding("wrong field element length"));
                }
                let (first, second) = bytes.split_at(Fq::LEN);
                let first: Fq = field_from_bytes(first, big_endian)?;
                let second: Fq = field_from_bytes(second, big_endian)?;
                let value = if big_endian {
                    Fq2::new(second, first)
                } else {
                    Fq2::new(first, second)
                };
                self.store(out, &value)
            }
            Kind::G1 => {
                let point: G1Affine = decompress(self.bytes(src, len)?, verify_order)?;
                self.store(out, &point.into_group())
            }
            Kind::G2 => {
                let point: G2Affine = decompress(self.bytes(src, len)?, verify_order)?;
                self.store(out, &point.into_group())
            }
            Kind::Gt => {
                let value: Fq12 = decompress(self.bytes(src, len)?, true)?;
                self.store(out, &value)
            }
        }
    }

    fn hash_to(
        &mut self,
        kind: Kind,
        out: Ptr,
        (msg, len): (Ptr, usize),
        mode: MapToMode,
    ) -> Result<usize, EngineError> {
        let message = self.bytes(msg, len)?;
        match kind {
            Kind::Fr => {
                let value: ArkFr = hash_to_field(message);
                self.store(out, &value)
            }
            Kind::Fp => {
                let value: Fq = hash_to_field(message);
                self.store(out, &value)
            }
            Kind::G1 => {
                let point = match mode {
                    MapToMode::Legacy => map_to_g1(hash_to_field(message))?,
                    MapToMode::HashToCurve => G1Hasher::new(DST_G1)
                        .and_then(|hasher| hasher.hash(message))
                        .map_err(|_| EngineError::HashToCurve)?
                        .into_group(),
                };
                self.store(out, &point)
            }
            Kind::G2 => {
                let point = match mode {
                    MapToMode::Legacy => {
                        map_to_g2(Fq2::new(hash_to_field(message), Fq::zero()))?
                    }
                    MapToMode::HashToCurve => G2Hasher::new(DST_G2)
                        .and_then(|hasher| hasher.hash(message))
                        .map_err(|_| EngineError::HashToCurve)?
                        .into_group(),
                };
                self.store(out, &point)
            }
            Kind::Fp2 | Kind::Gt => Err(unsupported("hash_to", kind)),
        }
    }

    fn map_to(&mut self, kind: Kind, out: Ptr, x: Ptr) -> Result<usize, EngineError> {
        match kind {
            Kind::Fp => {
                let point = map_to_g1(self.load(x)?)?;
                self.store(out, &point)
            }
            Kind::Fp2 => {
                let point = map_to_g2(self.load(x)?)?;
                self.store(out, &point)
            }
            _ => Err(unsupported("map_to", kind)),
        }
    }

    fn unary(&mut self, op: UnaryOp, kind: Kind, out: Ptr, x: Ptr) -> Result<usize, EngineError> {
        match (op, kind) {
            (UnaryOp::Neg, Kind::Fr) => self.map1(out, x, |a: ArkFr| -a),
            (UnaryOp::Neg, Kind::Fp) => self.map1(out, x, |a: Fq| -a),
            (UnaryOp::Neg, Kind::Fp2) => self.map1(out, x, |a: Fq2| -a),
            (UnaryOp::Neg, Kind::Gt) => self.map1(out, x, |a: Fq12| -a),
            (UnaryOp::Neg, Kind::G1) => self.map1(out, x, |p: G1Projective| -p),
            (UnaryOp::Neg, Kind::G2) => self.map1(out, x, |p: G2Projective| -p),
            (UnaryOp::Sqr, Kind::Fr) => self.map1(out, x, |a: ArkFr| a.square()),
            (UnaryOp::Sqr, Kind::Fp) => self.map1(out, x, |a: Fq| a.square()),
            (UnaryOp::Sqr, Kind::Fp2) => self.map1(out, x, |a: Fq2| a.square()),
            (UnaryOp::Sqr, Kind::Gt) => self.map1(out, x, |a: Fq12| a.square()),
            (UnaryOp::Inv, Kind::Fr) => self.map1(out, x, inverse::<ArkFr>),
            (UnaryOp::Inv, Kind::Fp) => self.map1(out, x, inverse::<Fq>),
            (UnaryOp::Inv, Kind::Fp2) => self.map1(out, x, inverse::<Fq2>),
            (UnaryOp::Inv, Kind::Gt) => self.map1(out, x, inverse::<Fq12>),
            (UnaryOp::Dbl, Kind::G1) => self.map1(out, x, |p: G1Projective| p + p),
            (UnaryOp::Dbl, Kind::G2) => self.map1(out, x, |p: G2Projective| p + p),
            (UnaryOp::Normalize, Kind::G1) => {
                self.map1(out, x, |p: G1Projective| p.into_affine().into_group())
            }
            (UnaryOp::Normalize, Kind::G2) => {
                self.map1(out, x, |p: G2Projective| p.into_affine().into_group())
            }
            (UnaryOp::FinalExp, Kind::Gt) => self.map1(out, x, final_exponentiation),
            (op, kind) => Err(unsupported(op.name(), kind)),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        kind: Kind,
        out: Ptr,
        (x, y): (Ptr, Ptr),
    ) -> Result<usize, EngineError> {
        match (op, kind) {
            (BinaryOp::Add, Kind::Fr) => self.map2(out, x, y, |a: ArkFr, b: ArkFr| a + b),
            (BinaryOp::Add, Kind::Fp) => self.map2(out, x, y, |a: Fq, b: Fq| a + b),
            (BinaryOp::Add, Kind::Fp2) => self.map2(out, x, y, |a: Fq2, b: Fq2| a + b),
            (BinaryOp::Add, Kind::Gt) => self.map2(out, x, y, |a: Fq12, b: Fq12| a + b),
            (BinaryOp::Add, Kind::G1) => {
                self.map2(out, x, y, |p: G1Projective, q: G1Projective| p + q)
            }
            (BinaryOp::Add, Kind::G2) => {
                self.map2(out, x, y, |p: G2Projective, q: G2Projective| p + q)
            }
            (BinaryOp::Sub, Kind::Fr) => self.map2(out, x, y, |a: ArkFr, b: ArkFr| a - b),
            (BinaryOp::Sub, Kind::Fp) => self.map2(out, x, y, |a: Fq, b: Fq| a - b),
            (BinaryOp::Sub, Kind::Fp2) => self.map2(out, x, y, |a: Fq2, b: Fq2| a - b),
            (BinaryOp::Sub, Kind::Gt) => self.map2(out, x, y, |a: Fq12, b: Fq12| a - b),
            (BinaryOp::Sub, Kind::G1) => {
                self.map2(out, x, y, |p: G1Projective, q: G1Projective| p - q)
            }
            (BinaryOp::Sub, Kind::G2) => {
                self.map2(out, x, y, |p: G2Projective, q: G2Projective| p - q)
            }
            (BinaryOp::Mul, Kind::Fr) => self.map2(out, x, y, |a: ArkFr, b: ArkFr| a * b),
            (BinaryOp::Mul, Kind::Fp) => self.map2(out, x, y, |a: Fq, b: Fq| a * b),
            (BinaryOp::Mul, Kind::Fp2) => self.map2(out, x, y, |a: Fq2, b: Fq2| a * b),
            (BinaryOp::Mul, Kind::Gt) => self.map2(out, x, y, |a: Fq12, b: Fq12| a * b),
            (BinaryOp::Mul, Kind::G1) => self.map2(out, x, y, |p: G1Projective, s: ArkFr| p * s),
            (BinaryOp::Mul, Kind::G2) => self.map2(out, x, y, |p: G2Projective, s: ArkFr| p * s),
            (BinaryOp::Div, Kind::Fr) => self.map2(out, x, y, divide::<ArkFr>),
            (BinaryOp::Div, Kind::Fp) => self.map2(out, x, y, divide::<Fq>),
            (BinaryOp::Div, Kind::Fp2) => self.map2(out, x, y, divide::<Fq2>),
            (BinaryOp::Div, Kind::Gt) => self.map2(out, x, y, divide::<Fq12>),
            (BinaryOp::Pow, Kind::Fr) => {
                self.map2(out, x, y, |a: ArkFr, e: ArkFr| a.pow(e.into_bigint()))
            }
            (BinaryOp::Pow, Kind::Fp) => {
                self.map2(out, x, y, |a: Fq, e: Fq| a.pow(e.into_bigint()))
            }
            (BinaryOp::Pow, Kind::Gt) => {
                self.map2(out, x, y, |a: Fq12, e: ArkFr| a.pow(e.into_bigint()))
            }
            (BinaryOp::Pairing, Kind::G1) => {
                self.map2(out, x, y, |p: G1Projective, q: G2Projective| {
                    Bls12_381::pairing(p.into_affine(), q.into_affine()).0
                })
            }
            (BinaryOp::MillerLoop, Kind::G1) => {
                self.map2(out, x, y, |p: G1Projective, q: G2Projective| {
                    Bls12_381::miller_loop(p.into_affine(), q.into_affine()).0
                })
            }
            (op, kind) => Err(unsupported(op.name(), kind)),
        }
    }

    fn pow_integer(
        &mut self,
        kind: Kind,
        out: Ptr,
        x: Ptr,
        (exp, exp_len): (Ptr, usize),
    ) -> Result<usize, EngineError> {
        let limbs: Vec<u64> = self
            .bytes(exp, exp_len)?
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        match kind {
            Kind::Fr => self.map1(out, x, |a: ArkFr| a.pow(&limbs)),
            Kind::Fp => self.map1(out, x, |a: Fq| a.pow(&limbs)),
            Kind::Fp2 => self.map1(out, x, |a: Fq2| a.pow(&limbs)),
            Kind::Gt => self.map1(out, x, |a: Fq12| a.pow(&limbs)),
            Kind::G1 | Kind::G2 => Err(unsupported("pow_integer", kind)),
        }
    }

    fn predicate(&self, pred: Predicate, kind: Kind, x: Ptr) -> Result<usize, EngineError> {
        let answer = match (pred, kind) {
            (Predicate::IsZero, Kind::Fr) => self.load::<ArkFr>(x)?.is_zero(),
            (Predicate::IsZero, Kind::Fp) => self.load::<Fq>(x)?.is_zero(),
            (Predicate::IsZero, Kind::Fp2) => self.load::<Fq2>(x)?.is_zero(),
            (Predicate::IsZero, Kind::Gt) => self.load::<Fq12>(x)?.is_zero(),
            (Predicate::IsZero, Kind::G1) => self.load::<G1Projective>(x)?.is_zero(),
            (Predicate::IsZero, Kind::G2) => self.load::<G2Projective>(x)?.is_zero(),
            (Predicate::IsOne, Kind::Fr) => self.load::<ArkFr>(x)?.is_one(),
            (Predicate::IsOne, Kind::Fp) => self.load::<Fq>(x)?.is_one(),
            (Predicate::IsOne, Kind::Fp2) => self.load::<Fq2>(x)?.is_one(),
            (Predicate::IsOne, Kind::Gt) => self.load::<Fq12>(x)?.is_one(),
            (Predicate::IsValid { check_order }, Kind::G1) => {
                self.is_valid::<g1::Config>(x, check_order)?
            }
            (Predicate::IsValid { check_order }, Kind::G2) => {
                self.is_valid::<g2::Config>(x, check_order)?
            }
            (Predicate::IsValidOrder, Kind::G1) => in_subgroup(self.load::<G1Projective>(x)?),
            (Predicate::IsValidOrder, Kind::G2) => in_subgroup(self.load::<G2Projective>(x)?),
            (pred, kind) => {
                let entry = Call::Predicate { pred, kind, x }.name();
                return Err(unsupported(entry, kind));
            }
        };
        Ok(usize::from(answer))
    }

    fn is_valid<P: SWCurveConfig>(&self, x: Ptr, check_order: bool) -> Result<bool, EngineError>
    where
        P::BaseField: Raw,
    {
        let (px, py, pz) = decode_coords::<P>(self.bytes(x, Projective::<P>::LEN)?)?;
        if !on_curve_jacobian::<P>(px, py, pz) {
            return Ok(false);
        }
        if !check_order || pz.is_zero() {
            return Ok(true);
        }
        Ok(in_subgroup(Projective::<P>::new_unchecked(px, py, pz)))
    }

    fn is_equal(&self, kind: Kind, x: Ptr, y: Ptr) -> Result<usize, EngineError> {
        let equal = match kind {
            Kind::Fr => self.load::<ArkFr>(x)? == self.load::<ArkFr>(y)?,
            Kind::Fp => self.load::<Fq>(x)? == self.load::<Fq>(y)?,
            Kind::Fp2 => self.load::<Fq2>(x)? == self.load::<Fq2>(y)?,
            Kind::Gt => self.load::<Fq12>(x)? == self.load::<Fq12>(y)?,
            Kind::G1 => self.load::<G1Projective>(x)? == self.load::<G1Projective>(y)?,
            Kind::G2 => self.load::<G2Projective>(x)? == self.load::<G2Projective>(y)?,
        };
        Ok(usize::from(equal))
    }

    fn mul_vec(
        &mut self,
        kind: Kind,
        out: Ptr,
        (points, scalars): (Ptr, Ptr),
        n: usize,
    ) -> Result<usize, EngineError> {
        match kind {
            Kind::G1 => {
                let sum = self.msm::<g1::Config>(points, scalars, n)?;
                self.store(out, &sum)
            }
            Kind::G2 => {
                let sum = self.msm::<g2::Config>(points, scalars, n)?;
                self.store(out, &sum)
            }
            _ => Err(unsupported("mul_vec", kind)),
        }
    }

    fn msm<P: SWCurveConfig<ScalarField = ArkFr>>(
        &self,
        points: Ptr,
        scalars: Ptr,
        n: usize,
    ) -> Result<Projective<P>, EngineError>
    where
        P::BaseField: Raw,
    {
        let bases: Vec<Projective<P>> = self.load_vec(points, n)?;
        let scalars: Vec<ArkFr> = self.load_vec(scalars, n)?;
        let bases = Projective::<P>::normalize_batch(&bases);
        Projective::<P>::msm(&bases, &scalars)
            .map_err(|_| EngineError::InvalidEncoding("operand count mismatch"))
    }

    fn inv_vec(&mut self, kind: Kind, buf: Ptr, n: usize) -> Result<usize, EngineError> {
        match kind {
            Kind::Fr => {
                let mut values: Vec<ArkFr> = self.load_vec(buf, n)?;
                batch_inversion(&mut values);
                self.store_vec(buf, &values)
            }
            Kind::Fp => {
                let mut values: Vec<Fq> = self.load_vec(buf, n)?;
                batch_inversion(&mut values);
                self.store_vec(buf, &values)
            }
            _ => Err(unsupported("inv_vec", kind)),
        }
    }

    fn normalize_vec(&mut self, kind: Kind, buf: Ptr, n: usize) -> Result<usize, EngineError> {
        match kind {
            Kind::G1 => self.normalize_points::<g1::Config>(buf, n),
            Kind::G2 => self.normalize_points::<g2::Config>(buf, n),
            _ => Err(unsupported("normalize_vec", kind)),
        }
    }

    fn normalize_points<P: SWCurveConfig>(
        &mut self,
        buf: Ptr,
        n: usize,
    ) -> Result<usize, EngineError>
    where
        P::BaseField: Raw,
    {
        let points: Vec<Projective<P>> = self.load_vec(buf, n)?;
        let normalized: Vec<Projective<P>> = Projective::<P>::normalize_batch(&points)
            .into_iter()
            .map(|p| p.into_group())
            .collect();
        self.store_vec(buf, &normalized)
    }

    fn precompute_g2(&mut self, table: Ptr, q: Ptr) -> Result<usize, EngineError> {
        let capacity = self.initialized()?.precompute_bytes();
        let q = self.load::<G2Projective>(q)?;
        let prepared = G2Prepared::<Config>::from(q.into_affine());
        let needed = TABLE_HEADER + prepared.ell_coeffs.len() * LINE_LEN;
        if needed > capacity {
            return Err(EngineError::BufferTooSmall { needed, capacity });
        }
        let region = self.bytes_mut(table, needed)?;
        let (header, body) = region.split_at_mut(TABLE_HEADER);
        header[..8].copy_from_slice(&u64::from(prepared.infinity).to_le_bytes());
        header[8..].copy_from_slice(&(prepared.ell_coeffs.len() as u64).to_le_bytes());
        for (chunk, (a, b, c)) in body.chunks_exact_mut(LINE_LEN).zip(&prepared.ell_coeffs) {
            a.encode(&mut chunk[..Fq2::LEN]);
            b.encode(&mut chunk[Fq2::LEN..2 * Fq2::LEN]);
            c.encode(&mut chunk[2 * Fq2::LEN..]);
        }
        trace!(lines = prepared.ell_coeffs.len(), "precomputed g2 table");
        Ok(0)
    }

    fn load_table(&self, table: Ptr) -> Result<G2Prepared<Config>, EngineError> {
        let capacity = self.initialized()?.precompute_bytes();
        let header = self.bytes(table, TABLE_HEADER)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&header[8..]);
        let count = usize::try_from(u64::from_le_bytes(word))
            .map_err(|_| EngineError::InvalidEncoding("corrupt precomputed table"))?;
        let infinity = header[..8].iter().any(|&b| b != 0);
        let body_len = count
            .checked_mul(LINE_LEN)
            .filter(|len| TABLE_HEADER + len <= capacity)
            .ok_or(EngineError::InvalidEncoding("corrupt precomputed table"))?;
        let ell_coeffs = self
            .bytes(table + TABLE_HEADER, body_len)?
            .chunks_exact(LINE_LEN)
            .map(|line| {
                Ok((
                    Fq2::decode(&line[..Fq2::LEN])?,
                    Fq2::decode(&line[Fq2::LEN..2 * Fq2::LEN])?,
                    Fq2::decode(&line[2 * Fq2::LEN..])?,
                ))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(G2Prepared {
            ell_coeffs,
            infinity,
        })
    }

    fn g1_prepared(&self, p: Ptr) -> Result<G1Prepared<Config>, EngineError> {
        Ok(G1Prepared::from(self.load::<G1Projective>(p)?.into_affine()))
    }

    fn g2_prepared(&self, q: Ptr) -> Result<G2Prepared<Config>, EngineError> {
        Ok(G2Prepared::from(self.load::<G2Projective>(q)?.into_affine()))
    }

    fn miller_product(
        &mut self,
        out: Ptr,
        g1: Vec<G1Prepared<Config>>,
        g2: Vec<G2Prepared<Config>>,
    ) -> Result<usize, EngineError> {
        let f = Bls12_381::multi_miller_loop(g1, g2).0;
        self.store(out, &f)
    }
}

impl Default for ArkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ArkEngine {
    fn curves(&self) -> &'static [CurveId] {
        &[CurveId::Bls12_381]
    }

    fn init(&mut self, curve: CurveId) -> Result<CurveParams, EngineError> {
        if self.params.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        if curve != CurveId::Bls12_381 {
            return Err(EngineError::UnsupportedCurve(
                "the arkworks engine only provides bls12-381",
            ));
        }
        let lines = G2Prepared::<Config>::from(G2Affine::generator()).ell_coeffs.len();
        let params = CurveParams {
            curve,
            fp_unit: Fq::LEN / 8,
            fr_unit: ArkFr::LEN / 8,
            precompute_words: (TABLE_HEADER + lines * LINE_LEN).div_ceil(8),
        };
        debug!(
            curve = curve.name(),
            memory = self.memory.len(),
            precompute_words = params.precompute_words,
            "initialized ark engine"
        );
        self.params = Some(params);
        Ok(params)
    }

    fn params(&self) -> Option<CurveParams> {
        self.params
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn call(&mut self, call: Call) -> Result<usize, EngineError> {
        self.initialized()?;
        trace!(entry = call.name(), "engine call");
        match call {
            Call::SetInt { kind, out, value } => self.set_int(kind, out, value),
            Call::SetBytes {
                kind,
                out,
                src,
                len,
                order,
            } => self.set_bytes(kind, out, src, len, order),
            Call::SetStr {
                kind,
                out,
                src,
                len,
                radix,
                verify_order,
            } => self.set_str(kind, out, (src, len), radix, verify_order),
            Call::GetStr {
                kind,
                x,
                dst,
                cap,
                radix,
            } => self.get_str(kind, x, (dst, cap), radix),
            Call::Serialize {
                kind,
                x,
                dst,
                cap,
                mode,
            } => self.serialize(kind, x, (dst, cap), mode),
            Call::Deserialize {
                kind,
                out,
                src,
                len,
                mode,
                verify_order,
            } => self.deserialize(kind, out, (src, len), mode, verify_order),
            Call::HashTo {
                kind,
                out,
                msg,
                len,
                mode,
            } => self.hash_to(kind, out, (msg, len), mode),
            Call::MapTo { kind, out, x } => self.map_to(kind, out, x),
            Call::Generator { kind, out } => match kind {
                Kind::G1 => self.store(out, &G1Projective::generator()),
                Kind::G2 => self.store(out, &G2Projective::generator()),
                _ => Err(unsupported("generator", kind)),
            },
            Call::Unary { op, kind, out, x } => self.unary(op, kind, out, x),
            Call::Binary {
                op,
                kind,
                out,
                x,
                y,
            } => self.binary(op, kind, out, (x, y)),
            Call::PowInteger {
                kind,
                out,
                x,
                exp,
                exp_len,
            } => self.pow_integer(kind, out, x, (exp, exp_len)),
            Call::Predicate { pred, kind, x } => self.predicate(pred, kind, x),
            Call::IsEqual { kind, x, y } => self.is_equal(kind, x, y),
            Call::MulVec {
                kind,
                out,
                points,
                scalars,
                n,
            } => self.mul_vec(kind, out, (points, scalars), n),
            Call::InvVec { kind, buf, n } => self.inv_vec(kind, buf, n),
            Call::NormalizeVec { kind, buf, n } => self.normalize_vec(kind, buf, n),
            Call::PrecomputeG2 { table, q } => self.precompute_g2(table, q),
            Call::PrecomputedMillerLoop { out, p, table } => {
                let g1 = vec![self.g1_prepared(p)?];
                let g2 = vec![self.load_table(table)?];
                self.miller_product(out, g1, g2)
            }
            Call::PrecomputedMillerLoop2 {
                out,
                p1,
                table1,
                p2,
                table2,
            } => {
                let g1 = vec![self.g1_prepared(p1)?, self.g1_prepared(p2)?];
                let g2 = vec![self.load_table(table1)?, self.load_table(table2)?];
                self.miller_product(out, g1, g2)
            }
            Call::PrecomputedMillerLoop2Mixed {
                out,
                p1,
                q1,
                p2,
                table2,
            } => {
                let g1 = vec![self.g1_prepared(p1)?, self.g1_prepared(p2)?];
                let g2 = vec![self.g2_prepared(q1)?, self.load_table(table2)?];
                self.miller_product(out, g1, g2)
            }
        }
    }
}

fn unsupported(entry: &'static str, kind: Kind) -> EngineError {
    EngineError::UnsupportedEntry { entry, kind }
}

fn signed<F: PrimeField>(value: i64) -> F {
    let magnitude = F::from(value.unsigned_abs());
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn inverse<F: Field>(a: F) -> F {
    a.inverse().unwrap_or_else(F::zero)
}

fn divide<F: Field>(a: F, b: F) -> F {
    a * inverse(b)
}

fn final_exponentiation(f: Fq12) -> Fq12 {
    Bls12_381::final_exponentiation(MillerLoopOutput(f))
        .map(|out| out.0)
        .unwrap_or_else(Fq12::zero)
}

fn in_subgroup<P: SWCurveConfig>(point: Projective<P>) -> bool {
    point.is_zero()
        || point
            .into_affine()
            .is_in_correct_subgroup_assuming_on_curve()
}

fn hash_to_field<F: PrimeField>(message: &[u8]) -> F {
    F::from_be_bytes_mod_order(&Sha512::digest(message))
}

fn map_to_g1(x: Fq) -> Result<G1Projective, EngineError> {
    let point = <WBMap<g1::Config> as MapToCurve<G1Projective>>::map_to_curve(x)
        .map_err(|_| EngineError::HashToCurve)?;
    Ok(point.clear_cofactor().into_group())
}

fn map_to_g2(x: Fq2) -> Result<G2Projective, EngineError> {
    let point = <WBMap<g2::Config> as MapToCurve<G2Projective>>::map_to_curve(x)
        .map_err(|_| EngineError::HashToCurve)?;
    Ok(point.clear_cofactor().into_group())
}

fn format_field<T: TextField>(value: &T, radix: u32) -> String {
    let mut parts = Vec::with_capacity(T::TOKENS);
    value.format(radix, &mut parts);
    parts.join(" ")
}

fn compressed<T: CanonicalSerialize>(value: &T) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::with_capacity(value.compressed_size());
    value
        .serialize_compressed(&mut out)
        .map_err(|_| EngineError::InvalidEncoding("serialization failed"))?;
    Ok(out)
}

fn decompress<T: CanonicalDeserialize>(bytes: &[u8], validate: bool) -> Result<T, EngineError> {
    let mut reader = bytes;
    let validate = if validate { Validate::Yes } else { Validate::No };
    let value = T::deserialize_with_mode(&mut reader, Compress::Yes, validate)
        .map_err(|_| EngineError::InvalidEncoding("malformed element"))?;
    if !reader.is_empty() {
        return Err(EngineError::InvalidEncoding("trailing bytes"));
    }
    Ok(value)
}
