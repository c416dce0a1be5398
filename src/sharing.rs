//! Shamir secret sharing over `Fr`, `G1` and `G2`.
//!
//! A sharing polynomial is a coefficient slice `c0, c1, …, c(k-1)` in the
//! share domain, with the secret in `c0`. Ids and interpolation weights are
//! always scalars.

use tracing::instrument;

use crate::context::Context;
use crate::engine::Engine;
use crate::errors::Error;
use crate::value::{Element, Fr, G1, G2, IntegerLike};

/// Kinds a secret can be shared in.
pub trait ShareDomain: Element {
    #[doc(hidden)]
    fn scale<E: Engine>(ctx: &Context<E>, x: &Self, s: &Fr) -> Result<Self, Error>;

    /// `Σ values[i] · weights[i]`.
    #[doc(hidden)]
    fn combine<E: Engine>(
        ctx: &Context<E>,
        values: &[Self],
        weights: &[Fr],
    ) -> Result<Self, Error>;
}

impl ShareDomain for Fr {
    fn scale<E: Engine>(ctx: &Context<E>, x: &Self, s: &Fr) -> Result<Self, Error> {
        ctx.mul(x, s)
    }

    fn combine<E: Engine>(
        ctx: &Context<E>,
        values: &[Self],
        weights: &[Fr],
    ) -> Result<Self, Error> {
        values
            .iter()
            .zip(weights)
            .try_fold(Fr::new(ctx), |acc, (v, w)| ctx.add(&acc, &ctx.mul(v, w)?))
    }
}

macro_rules! point_share_domain {
    ($($point:ident),+) => {
        $(
            impl ShareDomain for $point {
                fn scale<E: Engine>(ctx: &Context<E>, x: &Self, s: &Fr) -> Result<Self, Error> {
                    ctx.mul(x, s)
                }

                fn combine<E: Engine>(
                    ctx: &Context<E>,
                    values: &[Self],
                    weights: &[Fr],
                ) -> Result<Self, Error> {
                    ctx.mul_vec(values, weights)
                }
            }
        )+
    };
}

point_share_domain!(G1, G2);

impl<E: Engine> Context<E> {
    /// Evaluates the sharing polynomial at `id` by Horner's rule.
    #[instrument(level = "debug", skip_all, fields(kind = %T::KIND, k = coefficients.len()))]
    pub fn share<T: ShareDomain>(&self, coefficients: &[T], id: &Fr) -> Result<T, Error> {
        let (last, rest) = coefficients
            .split_last()
            .ok_or(Error::EmptyInput("sharing coefficients"))?;
        rest.iter().rev().try_fold(last.clone(), |acc, c| {
            let scaled = T::scale(self, &acc, id)?;
            self.add(&scaled, c)
        })
    }

    /// Interpolates the sharing polynomial at zero from `(ids[i], shares[i])`.
    ///
    /// The ids must be distinct and there must be exactly as many as the
    /// threshold. Neither is checked: a repeated id zeroes a denominator and
    /// the result is silently wrong.
    #[instrument(level = "debug", skip_all, fields(kind = %T::KIND, k = ids.len()))]
    pub fn recover<T: ShareDomain>(&self, ids: &[Fr], shares: &[T]) -> Result<T, Error> {
        if ids.len() != shares.len() {
            return Err(Error::SharingLength {
                ids: ids.len(),
                shares: shares.len(),
            });
        }
        if ids.is_empty() {
            return Err(Error::EmptyInput("recovery shares"));
        }
        let weights = self.lagrange_at_zero(ids)?;
        T::combine(self, shares, &weights)
    }

    /// `λ_i = Π_{j≠i} x_j / (x_j − x_i)`, the Lagrange basis at `x = 0`.
    fn lagrange_at_zero(&self, ids: &[Fr]) -> Result<Vec<Fr>, Error> {
        let mut numerators = Vec::with_capacity(ids.len());
        let mut denominators = Vec::with_capacity(ids.len());
        for (i, xi) in ids.iter().enumerate() {
            let mut num = Fr::from_int(self, 1)?;
            let mut den = Fr::from_int(self, 1)?;
            for (j, xj) in ids.iter().enumerate() {
                if i == j {
                    continue;
                }
                num = self.mul(&num, xj)?;
                den = self.mul(&den, &self.sub(xj, xi)?)?;
            }
            numerators.push(num);
            denominators.push(den);
        }
        self.inv_vec(&mut denominators)?;
        numerators
            .iter()
            .zip(&denominators)
            .map(|(num, den_inv)| self.mul(num, den_inv))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Point;
    use rand::{SeedableRng, rngs::StdRng};

    fn ctx() -> Context {
        Context::bls12_381().unwrap()
    }

    fn ids(ctx: &Context, n: i64) -> Vec<Fr> {
        (1..=n).map(|i| Fr::from_int(ctx, i).unwrap()).collect()
    }

    fn three_subsets(n: usize) -> Vec<[usize; 3]> {
        let mut out = Vec::new();
        for a in 0..n {
            for b in a + 1..n {
                for c in b + 1..n {
                    out.push([a, b, c]);
                }
            }
        }
        out
    }

    /// Shares among ten ids, then recovers from every 3-subset.
    fn check_every_subset<T: ShareDomain>(ctx: &Context, coefficients: &[T]) {
        let ids = ids(ctx, 10);
        let shares: Vec<T> = ids.iter().map(|id| ctx.share(coefficients, id).unwrap()).collect();
        let subsets = three_subsets(10);
        assert_eq!(subsets.len(), 120);
        for subset in subsets {
            let sub_ids: Vec<Fr> = subset.iter().map(|&i| ids[i].clone()).collect();
            let sub_shares: Vec<T> = subset.iter().map(|&i| shares[i].clone()).collect();
            let secret = ctx.recover(&sub_ids, &sub_shares).unwrap();
            assert!(secret.is_equal(ctx, &coefficients[0]).unwrap(), "{subset:?}");
        }
    }

    #[test]
    fn three_of_ten_in_fr() {
        let ctx = ctx();
        let mut rng = StdRng::seed_from_u64(31);
        let mut secret = Fr::new(&ctx);
        secret.set_str(&ctx, "123456789012345678901234567890", 10).unwrap();
        let coefficients = vec![
            secret,
            Fr::random(&ctx, &mut rng).unwrap(),
            Fr::random(&ctx, &mut rng).unwrap(),
        ];
        check_every_subset(&ctx, &coefficients);

        let ids = ids(&ctx, 3);
        let shares: Vec<Fr> = ids.iter().map(|id| ctx.share(&coefficients, id).unwrap()).collect();
        let recovered = ctx.recover(&ids, &shares).unwrap();
        assert_eq!(
            recovered.get_str(&ctx, 10).unwrap(),
            "123456789012345678901234567890"
        );
    }

    #[test]
    fn three_of_ten_in_g1() {
        let ctx = ctx();
        let coefficients: Vec<G1> = [&b"c0"[..], b"c1", b"c2"]
            .iter()
            .map(|m| G1::hash_of(&ctx, m).unwrap())
            .collect();
        check_every_subset(&ctx, &coefficients);
    }

    #[test]
    fn three_of_ten_in_g2() {
        let ctx = ctx();
        let coefficients: Vec<G2> = [&b"c0"[..], b"c1", b"c2"]
            .iter()
            .map(|m| G2::hash_of(&ctx, m).unwrap())
            .collect();
        check_every_subset(&ctx, &coefficients);
    }

    #[test]
    fn share_is_horner_evaluation() {
        let ctx = ctx();
        let c: Vec<Fr> = [5, 3, 2].iter().map(|&n| Fr::from_int(&ctx, n).unwrap()).collect();
        let id = Fr::from_int(&ctx, 4).unwrap();
        // 5 + 3·4 + 2·16
        assert_eq!(ctx.share(&c, &id).unwrap().get_str(&ctx, 10).unwrap(), "49");
        let constant = ctx.share(&c[..1], &id).unwrap();
        assert!(constant.is_equal(&ctx, &c[0]).unwrap());
    }

    #[test]
    fn input_errors() {
        let ctx = ctx();
        let id = Fr::from_int(&ctx, 1).unwrap();
        assert!(matches!(
            ctx.share::<G1>(&[], &id),
            Err(Error::EmptyInput(_))
        ));
        let share = Fr::from_int(&ctx, 7).unwrap();
        assert!(matches!(
            ctx.recover(&[id.clone(), id.clone()], &[share]),
            Err(Error::SharingLength { ids: 2, shares: 1 })
        ));
        assert!(matches!(
            ctx.recover::<Fr>(&[], &[]),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn repeated_ids_are_not_detected() {
        let ctx = ctx();
        let coefficients: Vec<Fr> = [9, 1]
            .iter()
            .map(|&n| Fr::from_int(&ctx, n).unwrap())
            .collect();
        let id = Fr::from_int(&ctx, 2).unwrap();
        let share = ctx.share(&coefficients, &id).unwrap();
        let secret = ctx
            .recover(&[id.clone(), id], &[share.clone(), share])
            .unwrap();
        assert!(!secret.is_equal(&ctx, &coefficients[0]).unwrap());
    }
}
