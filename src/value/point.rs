use tracing::instrument;

use super::{Element, Fp, Fp2, Sealed};
use crate::context::Context;
use crate::engine::{Call, Engine, Predicate, UnaryOp};
use crate::errors::Error;

element!(
    /// Point of the first pairing group, Jacobian `(X, Y, Z)` over `Fp`.
    G1
);

element!(
    /// Point of the second pairing group, Jacobian `(X, Y, Z)` over `Fp2`.
    G2
);

/// Capabilities of the two curve groups.
///
/// Coordinates are returned as copies: changing what `x()` returned never
/// changes the point.
pub trait Point: Element {
    /// Field the coordinates live in.
    type Coordinate: Element;

    fn generator<E: Engine>(ctx: &Context<E>) -> Result<Self, Error> {
        let kind = Self::KIND;
        let raw = ctx.invoke(kind, [], |out, []| Call::Generator { kind, out })?;
        Ok(Self::from_buffer(raw))
    }

    /// Rescales to `Z = 1` (the identity stays all-zero).
    fn normalize<E: Engine>(&mut self, ctx: &Context<E>) -> Result<(), Error> {
        let normalized = ctx.unary_raw(UnaryOp::Normalize, Self::KIND, self.as_bytes())?;
        self.replace(normalized);
        Ok(())
    }

    fn x(&self) -> Self::Coordinate {
        self.coordinate(0)
    }

    fn y(&self) -> Self::Coordinate {
        self.coordinate(1)
    }

    fn z(&self) -> Self::Coordinate {
        self.coordinate(2)
    }

    fn set_x(&mut self, x: &Self::Coordinate) {
        self.set_coordinate(0, x);
    }

    fn set_y(&mut self, y: &Self::Coordinate) {
        self.set_coordinate(1, y);
    }

    fn set_z(&mut self, z: &Self::Coordinate) {
        self.set_coordinate(2, z);
    }

    #[doc(hidden)]
    fn coordinate(&self, i: usize) -> Self::Coordinate {
        let width = self.as_bytes().len() / 3;
        Self::Coordinate::from_buffer(self.as_bytes()[i * width..(i + 1) * width].into())
    }

    #[doc(hidden)]
    fn set_coordinate(&mut self, i: usize, value: &Self::Coordinate) {
        let mut bytes: Box<[u8]> = self.as_bytes().into();
        let width = bytes.len() / 3;
        bytes[i * width..(i + 1) * width].copy_from_slice(value.as_bytes());
        self.replace(bytes);
    }

    /// On the curve; also in the prime-order subgroup when the context
    /// verifies order for this group.
    fn is_valid<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        let check_order = ctx.verify_order(Self::KIND);
        ctx.predicate_raw(Predicate::IsValid { check_order }, Self::KIND, self.as_bytes())
    }

    fn is_valid_order<E: Engine>(&self, ctx: &Context<E>) -> Result<bool, Error> {
        ctx.predicate_raw(Predicate::IsValidOrder, Self::KIND, self.as_bytes())
    }

    /// Hashes `msg` onto the group under the context's map-to mode.
    fn set_hash_of<E: Engine>(&mut self, ctx: &Context<E>, msg: &[u8]) -> Result<(), Error> {
        let raw = ctx.hash_raw(Self::KIND, msg)?;
        self.replace(raw);
        Ok(())
    }

    fn hash_of<E: Engine>(ctx: &Context<E>, msg: &[u8]) -> Result<Self, Error> {
        let mut p = Self::new(ctx);
        p.set_hash_of(ctx, msg)?;
        Ok(p)
    }
}

impl Point for G1 {
    type Coordinate = Fp;
}

impl Point for G2 {
    type Coordinate = Fp2;
}

impl<E: Engine> Context<E> {
    /// Normalizes every point in one engine call.
    #[instrument(level = "trace", skip_all, fields(n = points.len()))]
    pub fn normalize_vec<P: Point>(&self, points: &mut [P]) -> Result<(), Error> {
        if points.is_empty() {
            return Ok(());
        }
        let width = self.width(P::KIND);
        let n = points.len();
        self.scoped(|scope| {
            let buf = scope.push_all(points.iter().map(|p| p.as_bytes()), width)?;
            scope.call(Call::NormalizeVec {
                kind: P::KIND,
                buf: buf.ptr(),
                n,
            })?;
            for (i, point) in points.iter_mut().enumerate() {
                point.replace(scope.read(buf, i * width, width)?);
            }
            Ok(())
        })
    }
}
