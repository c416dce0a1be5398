//! The closed family of algebraic values.
//!
//! Every value is a fixed-width byte buffer whose width the context took from
//! the engine at initialization. The crate never interprets those bytes;
//! arithmetic, comparison and encoding all go through engine calls.
//!
//! Two views exist over the same six kinds:
//!
//! - typed: [`Fr`], [`Fp`], [`Fp2`], [`G1`], [`G2`], [`Gt`], sharing the
//!   [`Element`] capability set, with [`IntegerLike`] and [`Point`] adding
//!   the kind-specific ones;
//! - dynamic: [`Value`], the tagged union, for code that only learns operand
//!   kinds at runtime.

use std::fmt;

use crate::config::SerializationMode;
use crate::context::Context;
use crate::engine::{Call, Engine, Predicate};
use crate::errors::Error;

/// Tag of a value kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    Fr,
    Fp,
    Fp2,
    G1,
    G2,
    Gt,
}

impl Kind {
    pub const ALL: [Kind; 6] = [Kind::Fr, Kind::Fp, Kind::Fp2, Kind::G1, Kind::G2, Kind::Gt];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Fr => "Fr",
            Kind::Fp => "Fp",
            Kind::Fp2 => "Fp2",
            Kind::G1 => "G1",
            Kind::G2 => "G2",
            Kind::Gt => "GT",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) mod private {
    /// Raw buffer access. Only the crate builds values, so a buffer's width
    /// always matches the context that produced it.
    pub trait Sealed: Sized {
        fn from_buffer(bytes: Box<[u8]>) -> Self;

        fn replace(&mut self, bytes: Box<[u8]>);
    }
}

pub(crate) use private::Sealed;

/// Headroom for text output: a decimal digit carries less than half a byte.
const TEXT_CAPACITY_FACTOR: usize = 4;
const TEXT_CAPACITY_SLACK: usize = 64;

/// Capabilities shared by all six kinds.
///
/// Every method that touches the engine takes the context that created the
/// value and performs exactly one marshaling scope.
///
/// Raw buffers cannot be wrapped from outside the crate, so a value's width
/// always matches its kind:
///
/// ```compile_fail
/// use pairing_arena::{Element, Fr};
///
/// let short = Fr::from_buffer(vec![0u8; 3].into_boxed_slice());
/// ```
pub trait Element: Clone + fmt::Debug + private::Sealed + Sized {
    const KIND: Kind;

    /// Raw engine encoding.
    fn as_bytes(&self) -> &[u8];

    fn into_value(self) -> Value;

    /// Zero-filled value of this kind.
    fn new<E: Engine>(ctx: &Context<E>) -> Self {
        Self::from_buffer(vec![0u8; ctx.width(Self::KIND)].into_boxed_slice())
    }

    /// Resets to the all-zero encoding.
    fn clear(&mut self) {
        let len = self.as_bytes().len();
        self.replace(vec![0u8; len].into_boxed_slice());
    }

    fn serialize<E: Engine>(&self, ctx: &Context<E>) -> Result<Vec<u8>, Error> {
        ctx.serialize_raw(Self::KIND, self.as_bytes())
    }

    /// Replaces the value with `bytes` decoded under the context's
    /// serialization mode. On error the value is unchanged.
    fn deserialize<E: Engine>(&mut self, ctx: &Context<E>, bytes: &[u8]) -> Result<(), Error> {
        let decoded = ctx.deserialize_raw(Self::KIND, bytes)?;
        self.replace(decoded);
        Ok(())
    }

    fn serialize_to_hex<E: Engine>(&self, ctx: &Context<E>) -> Result<String, Error> {
        Ok(hex::encode(self.serialize(ctx)?))
    }

    fn deserialize_hex<E: Engine>(&mut self, ctx: &Context<E>, text: &str) -> Result<(), Error> {
        let bytes = hex::decode(text)?;
        self.deserialize(ctx, &bytes)
    }

    fn is_equal<E: Engine>(&self, ctx: &Context<E>, other: &Self) -> Result<bool, Error> {
        ctx.is_equal_raw(Self::KIND, self.as_bytes(), other.as_bytes())
    }

    fn is_zero<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsZero, Self::KIND, self.as_bytes())
    }

    fn set_str<E: Engine>(&mut self, ctx: &Context<E>, text: &str, base: u32) -> Result<(), Error> {
        let parsed = ctx.set_str_raw(Self::KIND, text, base)?;
        self.replace(parsed);
        Ok(())
    }

    fn get_str<E: Engine>(&self, ctx: &Context<E>, base: u32) -> Result<String, Error> {
        ctx.get_str_raw(Self::KIND, self.as_bytes(), base)
    }
}

macro_rules! element {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name {
            pub(crate) bytes: Box<[u8]>,
        }

        impl crate::value::private::Sealed for $name {
            fn from_buffer(bytes: Box<[u8]>) -> Self {
                Self { bytes }
            }

            fn replace(&mut self, bytes: Box<[u8]>) {
                self.bytes = bytes;
            }
        }

        impl crate::value::Element for $name {
            const KIND: crate::value::Kind = crate::value::Kind::$name;

            fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            fn into_value(self) -> crate::value::Value {
                crate::value::Value::$name(self)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&hex::encode(&self.bytes))
                    .finish()
            }
        }

        impl From<$name> for crate::value::Value {
            fn from(value: $name) -> Self {
                crate::value::Value::$name(value)
            }
        }

        impl TryFrom<crate::value::Value> for $name {
            type Error = crate::errors::Error;

            fn try_from(value: crate::value::Value) -> Result<Self, Self::Error> {
                match value {
                    crate::value::Value::$name(inner) => Ok(inner),
                    other => Err(crate::errors::Error::TypeMismatch {
                        op: "convert",
                        lhs: crate::value::Kind::$name,
                        rhs: other.kind(),
                    }),
                }
            }
        }
    };
}

mod field;
mod point;
mod target;

pub use field::{Fp, Fp2, Fr, IntegerLike};
pub use point::{G1, G2, Point};
pub use target::Gt;

/// A value of any kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Fr(Fr),
    Fp(Fp),
    Fp2(Fp2),
    G1(G1),
    G2(G2),
    Gt(Gt),
}

impl Value {
    /// Zero-filled value of `kind`.
    pub fn zero<E: Engine>(ctx: &Context<E>, kind: Kind) -> Self {
        Self::from_raw(kind, vec![0u8; ctx.width(kind)].into_boxed_slice())
    }

    pub(crate) fn from_raw(kind: Kind, bytes: Box<[u8]>) -> Self {
        match kind {
            Kind::Fr => Value::Fr(Fr { bytes }),
            Kind::Fp => Value::Fp(Fp { bytes }),
            Kind::Fp2 => Value::Fp2(Fp2 { bytes }),
            Kind::G1 => Value::G1(G1 { bytes }),
            Kind::G2 => Value::G2(G2 { bytes }),
            Kind::Gt => Value::Gt(Gt { bytes }),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Fr(_) => Kind::Fr,
            Value::Fp(_) => Kind::Fp,
            Value::Fp2(_) => Kind::Fp2,
            Value::G1(_) => Kind::G1,
            Value::G2(_) => Kind::G2,
            Value::Gt(_) => Kind::Gt,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Fr(v) => &v.bytes,
            Value::Fp(v) => &v.bytes,
            Value::Fp2(v) => &v.bytes,
            Value::G1(v) => &v.bytes,
            Value::G2(v) => &v.bytes,
            Value::Gt(v) => &v.bytes,
        }
    }

    fn buffer_mut(&mut self) -> &mut Box<[u8]> {
        match self {
            Value::Fr(v) => &mut v.bytes,
            Value::Fp(v) => &mut v.bytes,
            Value::Fp2(v) => &mut v.bytes,
            Value::G1(v) => &mut v.bytes,
            Value::G2(v) => &mut v.bytes,
            Value::Gt(v) => &mut v.bytes,
        }
    }

    pub fn clear(&mut self) {
        self.buffer_mut().fill(0);
    }

    pub fn serialize<E: Engine>(&self, ctx: &Context<E>) -> Result<Vec<u8>, Error> {
        ctx.serialize_raw(self.kind(), self.as_bytes())
    }

    pub fn deserialize<E: Engine>(&mut self, ctx: &Context<E>, bytes: &[u8]) -> Result<(), Error> {
        *self.buffer_mut() = ctx.deserialize_raw(self.kind(), bytes)?;
        Ok(())
    }

    pub fn serialize_to_hex<E: Engine>(&self, ctx: &Context<E>) -> Result<String, Error> {
        Ok(hex::encode(self.serialize(ctx)?))
    }

    pub fn deserialize_hex<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        text: &str,
    ) -> Result<(), Error> {
        let bytes = hex::decode(text)?;
        self.deserialize(ctx, &bytes)
    }

    pub fn is_equal<E: Engine>(&self, ctx: &Context<E>, other: &Value) -> Result<bool, Error> {
        if self.kind() != other.kind() {
            return Err(Error::TypeMismatch {
                op: "is_equal",
                lhs: self.kind(),
                rhs: other.kind(),
            });
        }
        ctx.is_equal_raw(self.kind(), self.as_bytes(), other.as_bytes())
    }

    pub fn is_zero<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsZero, self.kind(), self.as_bytes())
    }

    /// Defined for `Fr`, `Fp`, `Fp2` and `GT`.
    pub fn is_one<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        match self.kind() {
            kind @ (Kind::G1 | Kind::G2) => Err(Error::Unsupported {
                capability: "is_one",
                kind,
            }),
            kind => ctx.predicate_raw(Predicate::IsOne, kind, self.as_bytes()),
        }
    }

    /// Defined for `Fr`, `Fp`, `G1` and `G2`.
    pub fn set_hash_of<E: Engine>(&mut self, ctx: &Context<E>, msg: &[u8]) -> Result<(), Error> {
        match self.kind() {
            kind @ (Kind::Fp2 | Kind::Gt) => Err(Error::Unsupported {
                capability: "set_hash_of",
                kind,
            }),
            kind => {
                *self.buffer_mut() = ctx.hash_raw(kind, msg)?;
                Ok(())
            }
        }
    }

    pub fn set_str<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        text: &str,
        base: u32,
    ) -> Result<(), Error> {
        *self.buffer_mut() = ctx.set_str_raw(self.kind(), text, base)?;
        Ok(())
    }

    pub fn get_str<E: Engine>(&self, ctx: &Context<E>, base: u32) -> Result<String, Error> {
        ctx.get_str_raw(self.kind(), self.as_bytes(), base)
    }
}

/// Raw entry points behind the common capabilities.
impl<E: Engine> Context<E> {
    pub(crate) fn serialize_raw(&self, kind: Kind, x: &[u8]) -> Result<Vec<u8>, Error> {
        let mode = self.serialization_mode();
        self.write_out(2 * self.width(kind), [x], |dst, cap, [x]| Call::Serialize {
            kind,
            x,
            dst,
            cap,
            mode,
        })
    }

    pub(crate) fn deserialize_raw(&self, kind: Kind, bytes: &[u8]) -> Result<Box<[u8]>, Error> {
        let mode: SerializationMode = self.serialization_mode();
        let verify_order = self.verify_order(kind);
        let len = bytes.len();
        self.invoke(kind, [bytes], |out, [src]| Call::Deserialize {
            kind,
            out,
            src,
            len,
            mode,
            verify_order,
        })
        .map_err(|err| err.into_deserialize("bytes do not decode to a valid element"))
    }

    pub(crate) fn set_str_raw(
        &self,
        kind: Kind,
        text: &str,
        base: u32,
    ) -> Result<Box<[u8]>, Error> {
        let verify_order = self.verify_order(kind);
        let len = text.len();
        self.invoke(kind, [text.as_bytes()], |out, [src]| Call::SetStr {
            kind,
            out,
            src,
            len,
            radix: base,
            verify_order,
        })
        .map_err(|err| err.into_deserialize("text does not parse to a valid element"))
    }

    pub(crate) fn get_str_raw(&self, kind: Kind, x: &[u8], base: u32) -> Result<String, Error> {
        let cap = TEXT_CAPACITY_FACTOR * self.width(kind) + TEXT_CAPACITY_SLACK;
        let text = self.write_out(cap, [x], |dst, cap, [x]| Call::GetStr {
            kind,
            x,
            dst,
            cap,
            radix: base,
        })?;
        String::from_utf8(text).map_err(|_| Error::Marshal("engine produced non-utf-8 text".into()))
    }

    pub(crate) fn is_equal_raw(&self, kind: Kind, x: &[u8], y: &[u8]) -> Result<bool, Error> {
        self.query([x, y], |[x, y]| Call::IsEqual { kind, x, y })
    }

    pub(crate) fn predicate_raw(
        &self,
        pred: Predicate,
        kind: Kind,
        x: &[u8],
    ) -> Result<bool, Error> {
        self.query([x], |[x]| Call::Predicate { pred, kind, x })
    }

    pub(crate) fn hash_raw(&self, kind: Kind, msg: &[u8]) -> Result<Box<[u8]>, Error> {
        let mode = self.map_to_mode();
        let len = msg.len();
        self.invoke(kind, [msg], |out, [msg]| Call::HashTo {
            kind,
            out,
            msg,
            len,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::bls12_381().unwrap()
    }

    #[test]
    fn widths_follow_the_limb_units() {
        let ctx = ctx();
        let widths: Vec<usize> = Kind::ALL.iter().map(|&k| ctx.width(k)).collect();
        assert_eq!(widths, vec![32, 48, 96, 144, 288, 576]);
        assert_eq!(Fr::new(&ctx).as_bytes().len(), 32);
        assert!(Gt::new(&ctx).as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn fresh_values_are_zero() {
        let ctx = ctx();
        for kind in Kind::ALL {
            assert!(Value::zero(&ctx, kind).is_zero(&ctx).unwrap(), "{kind}");
        }
    }

    #[test]
    fn dynamic_capabilities_outside_a_kind_are_unsupported() {
        let ctx = ctx();
        let g1 = Value::zero(&ctx, Kind::G1);
        assert!(matches!(
            g1.is_one(&ctx),
            Err(Error::Unsupported {
                capability: "is_one",
                kind: Kind::G1
            })
        ));
        let mut gt = Value::zero(&ctx, Kind::Gt);
        assert!(matches!(
            gt.set_hash_of(&ctx, b"abc"),
            Err(Error::Unsupported { kind: Kind::Gt, .. })
        ));
        let mut fp2 = Value::zero(&ctx, Kind::Fp2);
        assert!(fp2.set_hash_of(&ctx, b"abc").is_err());
        assert!(!fp2.is_one(&ctx).unwrap());

        let mut fr = Value::zero(&ctx, Kind::Fr);
        fr.set_hash_of(&ctx, b"abc").unwrap();
        assert!(!fr.is_zero(&ctx).unwrap());
    }

    #[test]
    fn round_trip_every_kind_in_both_modes() {
        let mut ctx = ctx();
        let g1 = G1::hash_of(&ctx, b"round").unwrap();
        let g2 = G2::hash_of(&ctx, b"trip").unwrap();
        let gt = ctx.pairing(&g1, &g2).unwrap();
        let fr = Fr::hash_of(&ctx, b"fr").unwrap();
        let fp = Fp::hash_of(&ctx, b"fp").unwrap();
        let mut fp2 = Fp2::new(&ctx);
        fp2.set_int(&ctx, 5, -7).unwrap();
        let values: Vec<Value> = vec![
            fr.into(),
            fp.into(),
            fp2.into(),
            g1.into(),
            g2.into(),
            gt.into(),
        ];

        for mode in [SerializationMode::Standard, SerializationMode::Ethereum] {
            ctx.set_serialization_mode(mode);
            for value in &values {
                let bytes = value.serialize(&ctx).unwrap();
                let mut back = Value::zero(&ctx, value.kind());
                back.deserialize(&ctx, &bytes).unwrap();
                assert!(back.is_equal(&ctx, value).unwrap(), "{mode:?} {}", value.kind());

                let text = value.serialize_to_hex(&ctx).unwrap();
                let mut back = Value::zero(&ctx, value.kind());
                back.deserialize_hex(&ctx, &text.to_uppercase()).unwrap();
                assert!(back.is_equal(&ctx, value).unwrap());
            }
        }
    }

    #[test]
    fn serialized_lengths_are_fixed() {
        let ctx = ctx();
        let expected = [32, 48, 96, 48, 96, 576];
        for (kind, len) in Kind::ALL.into_iter().zip(expected) {
            assert_eq!(Value::zero(&ctx, kind).serialize(&ctx).unwrap().len(), len, "{kind}");
        }
    }

    #[test]
    fn ethereum_mode_is_big_endian_with_swapped_halves() {
        let mut ctx = ctx();
        let one = Fr::from_int(&ctx, 1).unwrap();
        assert_eq!(one.serialize(&ctx).unwrap()[0], 1);
        ctx.set_serialization_mode(SerializationMode::Ethereum);
        let bytes = one.serialize(&ctx).unwrap();
        assert_eq!(bytes[31], 1);
        assert!(bytes[..31].iter().all(|&b| b == 0));

        let mut x = Fp2::new(&ctx);
        x.set_int(&ctx, 2, 3).unwrap();
        let bytes = x.serialize(&ctx).unwrap();
        assert_eq!((bytes[47], bytes[95]), (3, 2));
    }

    #[test]
    fn bad_input_leaves_value_unchanged() {
        let ctx = ctx();
        let mut x = Fr::from_int(&ctx, 9).unwrap();
        let before = x.clone();
        assert!(matches!(x.deserialize(&ctx, &[0xff; 32]), Err(Error::Deserialize(_))));
        assert!(matches!(x.deserialize(&ctx, &[1; 31]), Err(Error::Deserialize(_))));
        assert!(matches!(x.deserialize_hex(&ctx, "abc"), Err(Error::Hex(_))));
        assert!(matches!(x.deserialize_hex(&ctx, "zz"), Err(Error::Hex(_))));
        assert!(matches!(x.set_str(&ctx, "12q", 10), Err(Error::Deserialize(_))));
        assert_eq!(x, before);
    }

    #[test]
    fn clear_zero_fills() {
        let ctx = ctx();
        let mut g = G1::generator(&ctx).unwrap();
        assert!(!g.is_zero(&ctx).unwrap());
        g.clear();
        assert!(g.is_zero(&ctx).unwrap());
    }

    #[test]
    fn conversions_check_the_tag() {
        let ctx = ctx();
        let value: Value = Fr::new(&ctx).into();
        assert!(Fr::try_from(value.clone()).is_ok());
        assert!(matches!(
            G1::try_from(value),
            Err(Error::TypeMismatch { lhs: Kind::G1, rhs: Kind::Fr, .. })
        ));
    }
}
