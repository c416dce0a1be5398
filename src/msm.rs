//! Multi-scalar multiplication: `∑ scalars[i] · points[i]` in one engine
//! round trip.

use tracing::instrument;

use crate::context::Context;
use crate::engine::{Call, Engine};
use crate::errors::Error;
use crate::value::{Element, Fr, Kind, Point, Value};

impl<E: Engine> Context<E> {
    /// Sum of `points[i] · scalars[i]`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pairing_arena::{Context, Element, Fr, G1, IntegerLike, Point};
    ///
    /// let ctx = Context::bls12_381()?;
    /// let g = G1::generator(&ctx)?;
    /// let points = vec![g.clone(), g.clone()];
    /// let scalars = vec![Fr::from_int(&ctx, 2)?, Fr::from_int(&ctx, 3)?];
    /// let sum = ctx.mul_vec(&points, &scalars)?;
    /// assert!(sum.is_equal(&ctx, &ctx.mul(&g, &Fr::from_int(&ctx, 5)?)?)?);
    /// # Ok::<(), pairing_arena::Error>(())
    /// ```
    #[instrument(level = "debug", skip_all, fields(kind = %P::KIND, n = points.len()))]
    pub fn mul_vec<P: Point>(&self, points: &[P], scalars: &[Fr]) -> Result<P, Error> {
        let raw = self.mul_vec_raw(
            P::KIND,
            points.iter().map(|p| p.as_bytes()),
            scalars.iter().map(|s| s.as_bytes()),
        )?;
        Ok(P::from_buffer(raw))
    }

    /// Dynamic form of [`mul_vec`](Self::mul_vec). Points must all be `G1`
    /// or all be `G2`; scalars must all be `Fr`.
    pub fn apply_mul_vec(&self, points: &[Value], scalars: &[Value]) -> Result<Value, Error> {
        let kind = points
            .first()
            .map(Value::kind)
            .ok_or(Error::EmptyInput("mul_vec points"))?;
        if !matches!(kind, Kind::G1 | Kind::G2) {
            return Err(Error::TypeMismatch {
                op: "mul_vec",
                lhs: kind,
                rhs: Kind::Fr,
            });
        }
        for (point, scalar) in points.iter().zip(scalars) {
            if point.kind() != kind || scalar.kind() != Kind::Fr {
                return Err(Error::TypeMismatch {
                    op: "mul_vec",
                    lhs: point.kind(),
                    rhs: scalar.kind(),
                });
            }
        }
        let raw = self.mul_vec_raw(
            kind,
            points.iter().map(Value::as_bytes),
            scalars.iter().map(Value::as_bytes),
        )?;
        Ok(Value::from_raw(kind, raw))
    }

    fn mul_vec_raw<'a, P, S>(&self, kind: Kind, points: P, scalars: S) -> Result<Box<[u8]>, Error>
    where
        P: ExactSizeIterator<Item = &'a [u8]>,
        S: ExactSizeIterator<Item = &'a [u8]>,
    {
        let n = points.len();
        if n == 0 {
            return Err(Error::EmptyInput("mul_vec points"));
        }
        if scalars.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                actual: scalars.len(),
            });
        }
        let point_width = self.width(kind);
        let scalar_width = self.width(Kind::Fr);
        self.scoped(|scope| {
            let points = scope.push_all(points, point_width)?;
            let scalars = scope.push_all(scalars, scalar_width)?;
            let out = scope.alloc(point_width)?;
            scope.call(Call::MulVec {
                kind,
                out: out.ptr(),
                points: points.ptr(),
                scalars: scalars.ptr(),
                n,
            })?;
            scope.read_all(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MulBy;
    use crate::value::{G1, G2, IntegerLike};
    use rand::{SeedableRng, rngs::StdRng};

    fn naive<P: Point + MulBy<Fr>>(ctx: &Context, points: &[P], scalars: &[Fr]) -> P {
        points
            .iter()
            .zip(scalars)
            .fold(P::new(ctx), |acc, (p, s)| ctx.add(&acc, &ctx.mul(p, s).unwrap()).unwrap())
    }

    fn random_inputs<P: Point + MulBy<Fr>>(
        ctx: &Context,
        rng: &mut StdRng,
        n: usize,
    ) -> (Vec<P>, Vec<Fr>) {
        let g = P::generator(ctx).unwrap();
        let points = (0..n)
            .map(|_| ctx.mul(&g, &Fr::random(ctx, rng).unwrap()).unwrap())
            .collect();
        let scalars = (0..n).map(|_| Fr::random(ctx, rng).unwrap()).collect();
        (points, scalars)
    }

    fn check<P: Point + MulBy<Fr>>(ctx: &Context, rng: &mut StdRng) {
        for n in [1, 2, 3, 15, 30, 100] {
            let (points, scalars) = random_inputs::<P>(ctx, rng, n);
            let fast = ctx.mul_vec(&points, &scalars).unwrap();
            let slow = naive(ctx, &points, &scalars);
            assert!(fast.is_equal(ctx, &slow).unwrap(), "{} n = {n}", P::KIND);
        }
    }

    #[test]
    fn matches_naive_fold_in_g1() {
        let ctx = Context::bls12_381().unwrap();
        check::<G1>(&ctx, &mut StdRng::seed_from_u64(21));
    }

    #[test]
    fn matches_naive_fold_in_g2() {
        let ctx = Context::bls12_381().unwrap();
        check::<G2>(&ctx, &mut StdRng::seed_from_u64(22));
    }

    #[test]
    fn rejects_bad_lengths_without_touching_the_stack() {
        let ctx = Context::bls12_381().unwrap();
        let base = ctx.stack_top().unwrap();
        let g = G1::generator(&ctx).unwrap();
        let one = Fr::from_int(&ctx, 1).unwrap();
        assert!(matches!(
            ctx.mul_vec::<G1>(&[], &[]),
            Err(Error::EmptyInput(_))
        ));
        assert!(matches!(
            ctx.mul_vec(&[g.clone(), g], &[one]),
            Err(Error::LengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(ctx.stack_top().unwrap(), base);
    }

    #[test]
    fn dynamic_form_checks_homogeneity() {
        let ctx = Context::bls12_381().unwrap();
        let g1: Value = G1::generator(&ctx).unwrap().into();
        let g2: Value = G2::generator(&ctx).unwrap().into();
        let two: Value = Fr::from_int(&ctx, 2).unwrap().into();

        let sum = ctx
            .apply_mul_vec(&[g1.clone(), g1.clone()], &[two.clone(), two.clone()])
            .unwrap();
        let four: Value = Fr::from_int(&ctx, 4).unwrap().into();
        let expected = ctx
            .apply_binary(crate::engine::BinaryOp::Mul, &g1, &four)
            .unwrap();
        assert!(sum.is_equal(&ctx, &expected).unwrap());

        assert!(matches!(
            ctx.apply_mul_vec(&[g1.clone(), g2], &[two.clone(), two.clone()]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            ctx.apply_mul_vec(&[two.clone()], &[two.clone()]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            ctx.apply_mul_vec(&[g1.clone()], &[g1]),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
