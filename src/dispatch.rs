//! Operator dispatch.
//!
//! Every arithmetic operation first resolves its operand kinds against one
//! closed matrix, [`resolve_unary`] / [`resolve_binary`] / [`resolve_pow_int`].
//! Resolution happens before a scope is opened, so a rejected combination
//! never touches engine memory.
//!
//! Two front ends share that matrix:
//!
//! - typed methods on [`Context`] (`ctx.mul(&g1, &fr)`), whose trait bounds
//!   mirror the matrix so most mismatches are compile errors;
//! - dynamic methods over [`Value`] (`ctx.apply_binary(BinaryOp::Mul, &a, &b)`)
//!   for operands whose kinds are only known at runtime.

use num_bigint::BigUint;
use tracing::instrument;

use crate::context::Context;
use crate::engine::{BinaryOp, Call, Engine, UnaryOp};
use crate::errors::Error;
use crate::value::{Element, Fp, Fp2, Fr, G1, G2, Gt, IntegerLike, Kind, Point, Value};

/// Result kind of `op` applied to `kind`.
pub fn resolve_unary(op: UnaryOp, kind: Kind) -> Result<Kind, Error> {
    use Kind::*;
    let allowed = match op {
        UnaryOp::Neg => true,
        UnaryOp::Inv => matches!(kind, Fr | Fp | Fp2 | Gt),
        UnaryOp::Sqr => matches!(kind, Fr | Fp | Fp2),
        UnaryOp::Dbl | UnaryOp::Normalize => matches!(kind, G1 | G2),
        UnaryOp::FinalExp => kind == Gt,
    };
    if allowed {
        Ok(kind)
    } else {
        Err(Error::TypeMismatch {
            op: op.name(),
            lhs: kind,
            rhs: kind,
        })
    }
}

/// Result kind of `lhs op rhs`.
pub fn resolve_binary(op: BinaryOp, lhs: Kind, rhs: Kind) -> Result<Kind, Error> {
    use Kind::*;
    let out = match (op, lhs, rhs) {
        (BinaryOp::Add | BinaryOp::Sub, l, r) if l == r => Some(l),
        (BinaryOp::Mul, l @ (Fr | Fp | Fp2 | Gt), r) if l == r => Some(l),
        (BinaryOp::Mul, l @ (G1 | G2), Fr) => Some(l),
        (BinaryOp::Div, l @ (Fr | Fp | Fp2 | Gt), r) if l == r => Some(l),
        (BinaryOp::Pow, l @ (Fr | Fp), r) if l == r => Some(l),
        (BinaryOp::Pow, Gt, Fr) => Some(Gt),
        (BinaryOp::Pairing | BinaryOp::MillerLoop, G1, G2) => Some(Gt),
        _ => None,
    };
    out.ok_or(Error::TypeMismatch {
        op: op.name(),
        lhs,
        rhs,
    })
}

/// Only the prime fields take integer exponents.
pub fn resolve_pow_int(kind: Kind) -> Result<Kind, Error> {
    match kind {
        Kind::Fr | Kind::Fp => Ok(kind),
        other => Err(Error::TypeMismatch {
            op: "pow_int",
            lhs: other,
            rhs: other,
        }),
    }
}

/// Kinds with a multiplicative inverse, and so division.
pub trait Invertible: Element {}
impl Invertible for Fr {}
impl Invertible for Fp {}
impl Invertible for Fp2 {}
impl Invertible for Gt {}

pub trait Squarable: Element {}
impl Squarable for Fr {}
impl Squarable for Fp {}
impl Squarable for Fp2 {}

/// `Self * Rhs` is defined and has kind `Self`.
pub trait MulBy<Rhs: Element>: Element {}
impl MulBy<Fr> for Fr {}
impl MulBy<Fp> for Fp {}
impl MulBy<Fp2> for Fp2 {}
impl MulBy<Gt> for Gt {}
impl MulBy<Fr> for G1 {}
impl MulBy<Fr> for G2 {}

/// `Self ^ Rhs` is defined and has kind `Self`.
pub trait PowBy<Rhs: Element>: Element {}
impl PowBy<Fr> for Fr {}
impl PowBy<Fp> for Fp {}
impl PowBy<Fr> for Gt {}

impl<E: Engine> Context<E> {
    pub(crate) fn unary_raw(&self, op: UnaryOp, kind: Kind, x: &[u8]) -> Result<Box<[u8]>, Error> {
        let out_kind = resolve_unary(op, kind)?;
        self.invoke(out_kind, [x], |out, [x]| Call::Unary { op, kind, out, x })
    }

    pub(crate) fn binary_raw(
        &self,
        op: BinaryOp,
        lhs: (Kind, &[u8]),
        rhs: (Kind, &[u8]),
    ) -> Result<Box<[u8]>, Error> {
        let out_kind = resolve_binary(op, lhs.0, rhs.0)?;
        let kind = lhs.0;
        self.invoke(out_kind, [lhs.1, rhs.1], |out, [x, y]| Call::Binary {
            op,
            kind,
            out,
            x,
            y,
        })
    }

    pub(crate) fn pow_int_raw(
        &self,
        kind: Kind,
        x: &[u8],
        exp: &BigUint,
    ) -> Result<Box<[u8]>, Error> {
        let out_kind = resolve_pow_int(kind)?;
        let exp = exp.to_bytes_le();
        let exp_len = exp.len();
        self.invoke(out_kind, [x, &exp], |out, [x, exp]| Call::PowInteger {
            kind,
            out,
            x,
            exp,
            exp_len,
        })
    }

    fn unary<T: Element>(&self, op: UnaryOp, x: &T) -> Result<T, Error> {
        Ok(T::from_buffer(self.unary_raw(op, T::KIND, x.as_bytes())?))
    }

    fn binary<L: Element, R: Element, O: Element>(
        &self,
        op: BinaryOp,
        x: &L,
        y: &R,
    ) -> Result<O, Error> {
        let raw = self.binary_raw(op, (L::KIND, x.as_bytes()), (R::KIND, y.as_bytes()))?;
        Ok(O::from_buffer(raw))
    }

    pub fn add<T: Element>(&self, x: &T, y: &T) -> Result<T, Error> {
        self.binary(BinaryOp::Add, x, y)
    }

    pub fn sub<T: Element>(&self, x: &T, y: &T) -> Result<T, Error> {
        self.binary(BinaryOp::Sub, x, y)
    }

    /// Field product, or scalar multiplication when `x` is a point.
    pub fn mul<L: MulBy<R>, R: Element>(&self, x: &L, y: &R) -> Result<L, Error> {
        self.binary(BinaryOp::Mul, x, y)
    }

    /// `x / 0` is zero.
    pub fn div<T: Invertible>(&self, x: &T, y: &T) -> Result<T, Error> {
        self.binary(BinaryOp::Div, x, y)
    }

    pub fn neg<T: Element>(&self, x: &T) -> Result<T, Error> {
        self.unary(UnaryOp::Neg, x)
    }

    /// The inverse of zero is zero.
    pub fn inv<T: Invertible>(&self, x: &T) -> Result<T, Error> {
        self.unary(UnaryOp::Inv, x)
    }

    pub fn sqr<T: Squarable>(&self, x: &T) -> Result<T, Error> {
        self.unary(UnaryOp::Sqr, x)
    }

    pub fn dbl<P: Point>(&self, p: &P) -> Result<P, Error> {
        self.unary(UnaryOp::Dbl, p)
    }

    /// Normalized copy of `p`. See [`Point::normalize`] for the in-place form.
    pub fn normalize<P: Point>(&self, p: &P) -> Result<P, Error> {
        self.unary(UnaryOp::Normalize, p)
    }

    /// `x` raised to the canonical integer value of `y`.
    pub fn pow<B: PowBy<X>, X: Element>(&self, x: &B, y: &X) -> Result<B, Error> {
        self.binary(BinaryOp::Pow, x, y)
    }

    /// `x` raised to a non-negative integer of any size.
    pub fn pow_int<T: IntegerLike>(&self, x: &T, exp: impl Into<BigUint>) -> Result<T, Error> {
        let raw = self.pow_int_raw(T::KIND, x.as_bytes(), &exp.into())?;
        Ok(T::from_buffer(raw))
    }

    /// The reduced pairing `e(p, q)`.
    #[instrument(level = "trace", skip_all)]
    pub fn pairing(&self, p: &G1, q: &G2) -> Result<Gt, Error> {
        self.binary(BinaryOp::Pairing, p, q)
    }

    /// The Miller loop of `e(p, q)` without the final exponentiation.
    pub fn miller_loop(&self, p: &G1, q: &G2) -> Result<Gt, Error> {
        self.binary(BinaryOp::MillerLoop, p, q)
    }

    pub fn final_exp(&self, x: &Gt) -> Result<Gt, Error> {
        self.unary(UnaryOp::FinalExp, x)
    }

    /// Dynamic form of the unary operations.
    pub fn apply_unary(&self, op: UnaryOp, x: &Value) -> Result<Value, Error> {
        let out_kind = resolve_unary(op, x.kind())?;
        let raw = self.unary_raw(op, x.kind(), x.as_bytes())?;
        Ok(Value::from_raw(out_kind, raw))
    }

    /// Dynamic form of the binary operations, pairing included.
    #[instrument(
        level = "trace",
        skip_all,
        fields(op = op.name(), lhs = %x.kind(), rhs = %y.kind())
    )]
    pub fn apply_binary(&self, op: BinaryOp, x: &Value, y: &Value) -> Result<Value, Error> {
        let out_kind = resolve_binary(op, x.kind(), y.kind())?;
        let raw = self.binary_raw(op, (x.kind(), x.as_bytes()), (y.kind(), y.as_bytes()))?;
        Ok(Value::from_raw(out_kind, raw))
    }

    pub fn apply_pow_int(&self, x: &Value, exp: impl Into<BigUint>) -> Result<Value, Error> {
        let out_kind = resolve_pow_int(x.kind())?;
        let raw = self.pow_int_raw(x.kind(), x.as_bytes(), &exp.into())?;
        Ok(Value::from_raw(out_kind, raw))
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
    fn matrix_accepts_exactly_the_listed_pairs() {
        use Kind::*;
        let mul: Vec<(Kind, Kind)> = Kind::ALL
            .iter()
            .flat_map(|&l| Kind::ALL.iter().map(move |&r| (l, r)))
            .filter(|&(l, r)| resolve_binary(BinaryOp::Mul, l, r).is_ok())
            .collect();
        assert_eq!(
            mul,
            vec![(Fr, Fr), (Fp, Fp), (Fp2, Fp2), (G1, Fr), (G2, Fr), (Gt, Gt)]
        );

        for kind in Kind::ALL {
            assert_eq!(resolve_binary(BinaryOp::Add, kind, kind).unwrap(), kind);
            assert!(resolve_unary(UnaryOp::Neg, kind).is_ok());
        }
        assert!(resolve_binary(BinaryOp::Add, Fr, Fp).is_err());
        assert_eq!(resolve_binary(BinaryOp::Pow, Gt, Fr).unwrap(), Gt);
        assert!(resolve_binary(BinaryOp::Pow, Gt, Gt).is_err());
        assert!(resolve_binary(BinaryOp::Pow, Fp2, Fp2).is_err());
        assert!(resolve_binary(BinaryOp::Div, G1, G1).is_err());
        assert_eq!(resolve_binary(BinaryOp::Pairing, G1, G2).unwrap(), Gt);
        assert!(resolve_binary(BinaryOp::Pairing, G2, G1).is_err());
        assert!(resolve_unary(UnaryOp::Sqr, Gt).is_err());
        assert!(resolve_unary(UnaryOp::Inv, G1).is_err());
        assert!(resolve_unary(UnaryOp::Dbl, Fr).is_err());
        assert!(resolve_pow_int(Gt).is_err());
        assert!(resolve_pow_int(Fp2).is_err());
    }

    #[test]
    fn mismatch_fails_before_touching_the_arena() {
        let ctx = ctx();
        let base = ctx.stack_top().unwrap();
        let fr: Value = Fr::from_int(&ctx, 3).unwrap().into();
        let g1: Value = G1::generator(&ctx).unwrap().into();
        let gt = Value::zero(&ctx, Kind::Gt);

        let err = ctx.apply_binary(BinaryOp::Mul, &fr, &g1).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                op: "mul",
                lhs: Kind::Fr,
                rhs: Kind::G1
            }
        ));
        assert!(ctx.apply_unary(UnaryOp::Sqr, &gt).is_err());
        assert!(ctx.apply_pow_int(&gt, 3u32).is_err());
        assert!(ctx.apply_pow_int(&g1, 3u32).is_err());
        assert_eq!(ctx.stack_top().unwrap(), base);
    }

    #[test]
    fn dynamic_and_typed_forms_agree() {
        let ctx = ctx();
        let g = G1::generator(&ctx).unwrap();
        let s = Fr::from_int(&ctx, 7).unwrap();
        let typed = ctx.mul(&g, &s).unwrap();
        let dynamic = ctx
            .apply_binary(BinaryOp::Mul, &g.clone().into(), &s.clone().into())
            .unwrap();
        assert_eq!(dynamic.kind(), Kind::G1);
        assert!(dynamic.is_equal(&ctx, &typed.into()).unwrap());

        let neg = ctx.apply_unary(UnaryOp::Neg, &g.clone().into()).unwrap();
        let sum = ctx.apply_binary(BinaryOp::Add, &g.into(), &neg).unwrap();
        assert!(sum.is_zero(&ctx).unwrap());
    }

    #[test]
    fn integer_powers_step_by_one_multiplication() {
        let ctx = ctx();
        let mut rng = StdRng::seed_from_u64(4);
        let x = Fr::random(&ctx, &mut rng).unwrap();
        let mut prev = ctx.pow_int(&x, 0u32).unwrap();
        assert!(prev.is_one(&ctx).unwrap());
        for i in 0..100u32 {
            let next = ctx.pow_int(&x, i + 1).unwrap();
            assert!(ctx.mul(&prev, &x).unwrap().is_equal(&ctx, &next).unwrap(), "i = {i}");
            prev = next;
        }
    }

    #[test]
    fn element_and_integer_exponents_agree() {
        let ctx = ctx();
        let x = Fp::from_int(&ctx, 3).unwrap();
        let e = Fp::from_int(&ctx, 1000).unwrap();
        let by_element = ctx.pow(&x, &e).unwrap();
        let by_integer = ctx.pow_int(&x, 1000u32).unwrap();
        assert!(by_element.is_equal(&ctx, &by_integer).unwrap());

        let big = BigUint::from(1u8) << 300usize;
        let wide = ctx.pow_int(&x, big.clone()).unwrap();
        let dynamic = ctx.apply_pow_int(&x.into(), big).unwrap();
        assert!(dynamic.is_equal(&ctx, &wide.into()).unwrap());
    }

    #[test]
    fn division_and_inversion_of_zero_give_zero() {
        let ctx = ctx();
        let zero = Fr::new(&ctx);
        let five = Fr::from_int(&ctx, 5).unwrap();
        assert!(ctx.inv(&zero).unwrap().is_zero(&ctx).unwrap());
        assert!(ctx.div(&five, &zero).unwrap().is_zero(&ctx).unwrap());
        let square = ctx.sqr(&five).unwrap();
        assert_eq!(square.get_str(&ctx, 10).unwrap(), "25");
    }

    #[test]
    fn pairing_is_bilinear() {
        let ctx = ctx();
        let mut rng = StdRng::seed_from_u64(5);
        let p = G1::generator(&ctx).unwrap();
        let q = G2::generator(&ctx).unwrap();
        let a = Fr::random(&ctx, &mut rng).unwrap();
        let b = Fr::random(&ctx, &mut rng).unwrap();

        let lhs = ctx
            .pairing(&ctx.mul(&p, &a).unwrap(), &ctx.mul(&q, &b).unwrap())
            .unwrap();
        let ab = ctx.mul(&a, &b).unwrap();
        let rhs = ctx.pow(&ctx.pairing(&p, &q).unwrap(), &ab).unwrap();
        assert!(lhs.is_equal(&ctx, &rhs).unwrap());
        assert!(!lhs.is_one(&ctx).unwrap());

        let e_neg = ctx.pairing(&ctx.neg(&p).unwrap(), &q).unwrap();
        let e = ctx.pairing(&p, &q).unwrap();
        assert!(ctx.mul(&e, &e_neg).unwrap().is_one(&ctx).unwrap());
    }

    #[test]
    fn miller_loop_then_final_exp_is_the_pairing() {
        let ctx = ctx();
        let p = G1::hash_of(&ctx, b"p").unwrap();
        let q = G2::hash_of(&ctx, b"q").unwrap();
        let f = ctx.miller_loop(&p, &q).unwrap();
        let e = ctx.final_exp(&f).unwrap();
        assert!(e.is_equal(&ctx, &ctx.pairing(&p, &q).unwrap()).unwrap());
        assert!(ctx.final_exp(&Gt::new(&ctx)).unwrap().is_zero(&ctx).unwrap());
    }

    #[test]
    fn normalized_copy_keeps_the_original() {
        let ctx = ctx();
        let g = G2::generator(&ctx).unwrap();
        let d = ctx.dbl(&g).unwrap();
        let n = ctx.normalize(&d).unwrap();
        assert!(n.z().is_one(&ctx).unwrap());
        assert!(n.is_equal(&ctx, &d).unwrap());
        let mut fp2 = Fp2::new(&ctx);
        fp2.set_int(&ctx, 1, 1).unwrap();
        assert!(ctx.sub(&fp2, &fp2).unwrap().is_zero(&ctx).unwrap());
    }
}
