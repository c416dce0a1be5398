use rand_core::{CryptoRng, RngCore};
use tracing::instrument;

use super::{Element, G1, G2, Kind, Sealed};
use crate::context::Context;
use crate::engine::{ByteOrder, Call, Engine, Predicate};
use crate::errors::Error;

element!(
    /// Element of the scalar field (the group order).
    Fr
);

element!(
    /// Element of the base field.
    Fp
);

element!(
    /// `a + b·i` over the base field, stored as `a ‖ b`.
    Fp2
);

/// Capabilities of the two prime fields, `Fr` and `Fp`.
pub trait IntegerLike: Element {
    fn from_int<E: Engine>(ctx: &Context<E>, n: i64) -> Result<Self, Error> {
        let mut x = Self::new(ctx);
        x.set_int(ctx, n)?;
        Ok(x)
    }

    /// Sets the value to `n` reduced into the field; negative `n` maps to
    /// `-|n|`.
    fn set_int<E: Engine>(&mut self, ctx: &Context<E>, n: i64) -> Result<(), Error> {
        let kind = Self::KIND;
        let raw = ctx.invoke(kind, [], |out, []| Call::SetInt {
            kind,
            out,
            value: n,
        })?;
        self.replace(raw);
        Ok(())
    }

    fn is_one<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsOne, Self::KIND, self.as_bytes())
    }

    /// Little-endian bytes, truncated to the field width and masked so the
    /// result is below the modulus.
    fn set_little_endian<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.set_bytes(ctx, bytes, ByteOrder::LittleEndian)
    }

    /// Little-endian bytes of any length, reduced modulo the field order.
    fn set_little_endian_mod<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.set_bytes(ctx, bytes, ByteOrder::LittleEndianMod)
    }

    /// Big-endian bytes of any length, reduced modulo the field order.
    fn set_big_endian_mod<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.set_bytes(ctx, bytes, ByteOrder::BigEndianMod)
    }

    #[doc(hidden)]
    fn set_bytes<E: Engine>(
        &mut self,
        ctx: &Context<E>,
        bytes: &[u8],
        order: ByteOrder,
    ) -> Result<(), Error> {
        let kind = Self::KIND;
        let len = bytes.len();
        let raw = ctx.invoke(kind, [bytes], |out, [src]| Call::SetBytes {
            kind,
            out,
            src,
            len,
            order,
        })?;
        self.replace(raw);
        Ok(())
    }

    /// Draws twice the field width from `rng` and reduces it, so the result
    /// is uniform up to a negligible bias.
    fn set_random<E: Engine, R: RngCore + CryptoRng + ?Sized>(
        &mut self,
        ctx: &Context<E>,
        rng: &mut R,
    ) -> Result<(), Error> {
        let mut bytes = vec![0u8; 2 * ctx.width(Self::KIND)];
        rng.fill_bytes(&mut bytes);
        self.set_little_endian_mod(ctx, &bytes)
    }

    fn random<E: Engine, R: RngCore + CryptoRng + ?Sized>(
        ctx: &Context<E>,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let mut x = Self::new(ctx);
        x.set_random(ctx, rng)?;
        Ok(x)
    }

    /// SHA-512 of `msg`, reduced modulo the field order.
    fn set_hash_of<E: Engine>(&mut self, ctx: &Context<E>, msg: &[u8]) -> Result<(), Error> {
        let raw = ctx.hash_raw(Self::KIND, msg)?;
        self.replace(raw);
        Ok(())
    }

    fn hash_of<E: Engine>(ctx: &Context<E>, msg: &[u8]) -> Result<Self, Error> {
        let mut x = Self::new(ctx);
        x.set_hash_of(ctx, msg)?;
        Ok(x)
    }
}

impl IntegerLike for Fr {}
impl IntegerLike for Fp {}

impl Fp {
    /// Maps onto `G1` and clears the cofactor.
    pub fn map_to_g1<E: Engine>(&self, ctx: &Context<E>) -> Result<G1, Error> {
        let raw = ctx.invoke(Kind::G1, [self.as_bytes()], |out, [x]| Call::MapTo {
            kind: Kind::Fp,
            out,
            x,
        })?;
        Ok(G1::from_buffer(raw))
    }
}

impl Fp2 {
    fn half(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Sets `a = x`, `b = y`.
    pub fn set_int<E: Engine>(&mut self, ctx: &Context<E>, x: i64, y: i64) -> Result<(), Error> {
        let half = ctx.width(Kind::Fp);
        let raw = ctx.scoped(|scope| {
            let out = scope.alloc(2 * half)?;
            for (offset, value) in [(0, x), (half, y)] {
                scope.call(Call::SetInt {
                    kind: Kind::Fp,
                    out: out.ptr() + offset,
                    value,
                })?;
            }
            scope.read_all(out)
        })?;
        self.replace(raw);
        Ok(())
    }

    /// Copy of the real part. Mutating it leaves `self` untouched.
    pub fn a(&self) -> Fp {
        Fp::from_buffer(self.bytes[..self.half()].into())
    }

    /// Copy of the imaginary part.
    pub fn b(&self) -> Fp {
        Fp::from_buffer(self.bytes[self.half()..].into())
    }

    pub fn set_a(&mut self, a: &Fp) {
        let half = self.half();
        self.bytes[..half].copy_from_slice(a.as_bytes());
    }

    pub fn set_b(&mut self, b: &Fp) {
        let half = self.half();
        self.bytes[half..].copy_from_slice(b.as_bytes());
    }

    pub fn is_one<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsOne, Kind::Fp2, self.as_bytes())
    }

    /// Maps onto `G2` and clears the cofactor.
    pub fn map_to_g2<E: Engine>(&self, ctx: &Context<E>) -> Result<G2, Error> {
        let raw = ctx.invoke(Kind::G2, [self.as_bytes()], |out, [x]| Call::MapTo {
            kind: Kind::Fp2,
            out,
            x,
        })?;
        Ok(G2::from_buffer(raw))
    }
}

impl<E: Engine> Context<E> {
    /// Inverts every element in one engine call. Zero entries stay zero.
    #[instrument(level = "trace", skip_all, fields(n = values.len()))]
    pub fn inv_vec<T: IntegerLike>(&self, values: &mut [T]) -> Result<(), Error> {
        if values.is_empty() {
            return Ok(());
        }
        let width = self.width(T::KIND);
        let n = values.len();
        self.scoped(|scope| {
            let buf = scope.push_all(values.iter().map(|v| v.as_bytes()), width)?;
            scope.call(Call::InvVec {
                kind: T::KIND,
                buf: buf.ptr(),
                n,
            })?;
            for (i, value) in values.iter_mut().enumerate() {
                value.replace(scope.read(buf, i * width, width)?);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn ctx() -> Context {
        Context::bls12_381().unwrap()
    }

    #[test]
    fn scalar_arithmetic_as_text() {
        let ctx = ctx();
        let a = Fr::from_int(&ctx, 200).unwrap();
        let b = Fr::from_int(&ctx, 20).unwrap();
        assert_eq!(ctx.mul(&a, &b).unwrap().get_str(&ctx, 10).unwrap(), "4000");
        assert_eq!(ctx.div(&a, &b).unwrap().get_str(&ctx, 10).unwrap(), "10");
        assert_eq!(ctx.add(&a, &b).unwrap().get_str(&ctx, 16).unwrap(), "dc");
    }

    #[test]
    fn field_axioms_hold() {
        let ctx = ctx();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let a = Fr::random(&ctx, &mut rng).unwrap();
            let b = Fr::random(&ctx, &mut rng).unwrap();
            let ab = ctx.add(&a, &b).unwrap();
            let ba = ctx.add(&b, &a).unwrap();
            assert!(ab.is_equal(&ctx, &ba).unwrap());
            let neg = ctx.neg(&a).unwrap();
            assert!(ctx.add(&a, &neg).unwrap().is_zero(&ctx).unwrap());
            let inv = ctx.inv(&a).unwrap();
            assert!(ctx.mul(&a, &inv).unwrap().is_one(&ctx).unwrap());

            let x = Fp::random(&ctx, &mut rng).unwrap();
            let x_inv = ctx.inv(&x).unwrap();
            assert!(ctx.mul(&x, &x_inv).unwrap().is_one(&ctx).unwrap());
        }
    }

    #[test]
    fn string_forms() {
        let ctx = ctx();
        let mut x = Fp::new(&ctx);
        x.set_str(&ctx, "0x1f", 0).unwrap();
        assert_eq!(x.get_str(&ctx, 10).unwrap(), "31");
        x.set_str(&ctx, "-1", 10).unwrap();
        let minus_one = ctx.neg(&Fp::from_int(&ctx, 1).unwrap()).unwrap();
        assert!(x.is_equal(&ctx, &minus_one).unwrap());

        let mut y = Fp2::new(&ctx);
        y.set_str(&ctx, "4 5", 10).unwrap();
        assert_eq!(y.get_str(&ctx, 10).unwrap(), "4 5");
        assert!(y.set_str(&ctx, "4", 10).is_err());
    }

    #[test]
    fn byte_setters() {
        let ctx = ctx();
        let mut x = Fr::new(&ctx);
        x.set_little_endian_mod(&ctx, &[0x01, 0x02]).unwrap();
        assert_eq!(x.get_str(&ctx, 16).unwrap(), "201");
        x.set_big_endian_mod(&ctx, &[0x01, 0x02]).unwrap();
        assert_eq!(x.get_str(&ctx, 16).unwrap(), "102");
        x.set_little_endian(&ctx, &[0xff; 32]).unwrap();
        let mut masked = x.serialize(&ctx).unwrap();
        assert_eq!(masked.len(), 32);
        assert!(masked[31] < 0x80);

        // reduction: r + 5 == 5
        let minus_one = ctx.neg(&Fr::from_int(&ctx, 1).unwrap()).unwrap();
        masked = minus_one.serialize(&ctx).unwrap();
        masked[0] = masked[0].wrapping_add(6);
        x.set_little_endian_mod(&ctx, &masked).unwrap();
        assert_eq!(x.get_str(&ctx, 10).unwrap(), "5");
    }

    #[test]
    fn fp2_accessors_copy_out() {
        let ctx = ctx();
        let mut x = Fp2::new(&ctx);
        x.set_int(&ctx, 3, 4).unwrap();
        let mut a = x.a();
        a.set_int(&ctx, 99).unwrap();
        assert_eq!(x.a().get_str(&ctx, 10).unwrap(), "3");
        assert_eq!(x.b().get_str(&ctx, 10).unwrap(), "4");

        x.set_b(&a);
        assert_eq!(x.get_str(&ctx, 10).unwrap(), "3 99");
        a.set_int(&ctx, 7).unwrap();
        assert_eq!(x.b().get_str(&ctx, 10).unwrap(), "99");

        let mut one = Fp2::new(&ctx);
        one.set_int(&ctx, 1, 0).unwrap();
        assert!(one.is_one(&ctx).unwrap());
        assert!(!x.is_one(&ctx).unwrap());
    }

    #[test]
    fn fp2_set_int_fills_both_halves() {
        let ctx = ctx();
        let base = ctx.stack_top().unwrap();
        let mut x = Fp2::new(&ctx);
        x.set_int(&ctx, 7, -3).unwrap();
        assert_eq!(ctx.stack_top().unwrap(), base);
        assert!(x.a().is_equal(&ctx, &Fp::from_int(&ctx, 7).unwrap()).unwrap());
        assert!(x.b().is_equal(&ctx, &Fp::from_int(&ctx, -3).unwrap()).unwrap());
        assert_eq!(x.get_str(&ctx, 10).unwrap().split(' ').next(), Some("7"));
    }

    #[test]
    fn inv_vec_matches_single_inversions_in_fp() {
        let ctx = ctx();
        let mut values: Vec<Fp> = [0, 2, -5, 11]
            .iter()
            .map(|&n| Fp::from_int(&ctx, n).unwrap())
            .collect();
        let expected: Vec<Fp> = values.iter().map(|v| ctx.inv(v).unwrap()).collect();
        ctx.inv_vec(&mut values).unwrap();
        for (got, want) in values.iter().zip(&expected) {
            assert!(got.is_equal(&ctx, want).unwrap());
        }
        assert!(values[0].is_zero(&ctx).unwrap());
    }

    #[test]
    fn inv_vec_matches_single_inversions() {
        let ctx = ctx();
        let mut rng = StdRng::seed_from_u64(5);
        let mut values: Vec<Fr> = (0..6).map(|_| Fr::random(&ctx, &mut rng).unwrap()).collect();
        values[2].clear();
        let expected: Vec<Fr> = values.iter().map(|v| ctx.inv(v).unwrap()).collect();
        ctx.inv_vec(&mut values).unwrap();
        for (got, want) in values.iter().zip(&expected) {
            assert!(got.is_equal(&ctx, want).unwrap());
        }
        assert!(values[2].is_zero(&ctx).unwrap());
    }

    #[test]
    fn hashes_differ_per_message() {
        let ctx = ctx();
        let a = Fr::hash_of(&ctx, b"a").unwrap();
        let b = Fr::hash_of(&ctx, b"b").unwrap();
        assert!(!a.is_equal(&ctx, &b).unwrap());
        assert!(a.is_equal(&ctx, &Fr::hash_of(&ctx, b"a").unwrap()).unwrap());
    }
}
