use super::Element;
use crate::context::Context;
use crate::engine::{Call, Engine, Predicate};
use crate::errors::Error;
use crate::value::Kind;

element!(
    /// Element of the pairing target group, an `Fp12` value.
    Gt
);

impl Gt {
    pub fn from_int<E: Engine>(ctx: &Context<E>, n: i64) -> Result<Self, Error> {
        let mut x = Self::new(ctx);
        x.set_int(ctx, n)?;
        Ok(x)
    }

    /// Sets the constant coefficient to `n` and every other one to zero.
    pub fn set_int<E: Engine>(&mut self, ctx: &Context<E>, n: i64) -> Result<(), Error> {
        self.bytes = ctx.invoke(Kind::Gt, [], |out, []| Call::SetInt {
            kind: Kind::Gt,
            out,
            value: n,
        })?;
        Ok(())
    }

    pub fn is_one<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsOne, Kind::Gt, self.as_bytes())
    }
}
