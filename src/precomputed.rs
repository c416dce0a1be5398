//! Miller-loop tables for a fixed `G2` point.
//!
//! A table lives in the engine heap, outside the per-call stack, so it
//! survives across operations. It is tied to the context that built it and
//! released with [`PrecomputedG2::destroy`].

use tracing::{debug, instrument, warn};

use crate::arena::HeapBlock;
use crate::context::Context;
use crate::engine::{Call, Engine, Ptr};
use crate::errors::Error;
use crate::value::{Element, G1, G2, Gt, Kind, Sealed};

/// Line coefficients of the Miller loop for one `G2` point.
#[derive(Debug)]
pub struct PrecomputedG2 {
    block: Option<HeapBlock>,
    context_id: u64,
}

impl PrecomputedG2 {
    /// Allocates a table in `ctx`'s engine heap and fills it from `q`.
    #[instrument(level = "debug", skip_all, fields(context = ctx.id()))]
    pub fn new<E: Engine>(ctx: &Context<E>, q: &G2) -> Result<Self, Error> {
        let block = ctx.heap_alloc(ctx.params().precompute_bytes())?;
        let table = block.ptr();
        let filled = ctx.scoped(|scope| {
            let q = scope.push(q.as_bytes())?;
            scope.call(Call::PrecomputeG2 { table, q: q.ptr() })
        });
        if let Err(err) = filled {
            ctx.heap_free(block)?;
            return Err(err);
        }
        debug!(ptr = table, len = block.len(), "precomputed g2 table");
        Ok(Self {
            block: Some(block),
            context_id: ctx.id(),
        })
    }

    /// Releases the heap block. Fails with [`Error::ForeignTable`] when `ctx`
    /// is not the context that built the table.
    pub fn destroy<E: Engine>(mut self, ctx: &Context<E>) -> Result<(), Error> {
        if self.context_id != ctx.id() {
            return Err(Error::ForeignTable);
        }
        match self.block.take() {
            Some(block) => ctx.heap_free(block),
            None => Ok(()),
        }
    }

    fn ptr_in<E: Engine>(&self, ctx: &Context<E>) -> Result<Ptr, Error> {
        match &self.block {
            Some(block) if self.context_id == ctx.id() => Ok(block.ptr()),
            _ => Err(Error::ForeignTable),
        }
    }
}

impl Drop for PrecomputedG2 {
    fn drop(&mut self) {
        if let Some(block) = &self.block {
            warn!(
                ptr = block.ptr(),
                len = block.len(),
                "precomputed g2 table dropped without destroy, its heap block leaks"
            );
        }
    }
}

impl<E: Engine> Context<E> {
    /// Miller loop of `e(p, q)` with `q` taken from `table`.
    pub fn precomputed_miller_loop(&self, p: &G1, table: &PrecomputedG2) -> Result<Gt, Error> {
        let table = table.ptr_in(self)?;
        let raw = self.invoke(Kind::Gt, [p.as_bytes()], |out, [p]| {
            Call::PrecomputedMillerLoop { out, p, table }
        })?;
        Ok(Gt::from_buffer(raw))
    }

    /// Product of the Miller loops of `e(p1, t1)` and `e(p2, t2)`.
    pub fn precomputed_miller_loop2(
        &self,
        p1: &G1,
        table1: &PrecomputedG2,
        p2: &G1,
        table2: &PrecomputedG2,
    ) -> Result<Gt, Error> {
        let table1 = table1.ptr_in(self)?;
        let table2 = table2.ptr_in(self)?;
        let raw = self.invoke(Kind::Gt, [p1.as_bytes(), p2.as_bytes()], |out, [p1, p2]| {
            Call::PrecomputedMillerLoop2 {
                out,
                p1,
                table1,
                p2,
                table2,
            }
        })?;
        Ok(Gt::from_buffer(raw))
    }

    /// Like [`precomputed_miller_loop2`](Self::precomputed_miller_loop2) with
    /// the first `G2` point given directly.
    pub fn precomputed_miller_loop2_mixed(
        &self,
        p1: &G1,
        q1: &G2,
        p2: &G1,
        table2: &PrecomputedG2,
    ) -> Result<Gt, Error> {
        let table2 = table2.ptr_in(self)?;
        let inputs = [p1.as_bytes(), q1.as_bytes(), p2.as_bytes()];
        let raw = self.invoke(Kind::Gt, inputs, |out, [p1, q1, p2]| {
            Call::PrecomputedMillerLoop2Mixed {
                out,
                p1,
                q1,
                p2,
                table2,
            }
        })?;
        Ok(Gt::from_buffer(raw))
    }
}
