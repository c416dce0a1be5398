//! The context: one initialized engine plus the arena over its memory.
//!
//! A [`Context`] replaces the process-wide state an engine binding usually
//! keeps. Curve initialization happens exactly once, in [`Context::new`];
//! the serialization mode, map-to mode and verify-order flags are plain
//! fields, changed through `&mut self` and passed into the engine calls that
//! depend on them.
//!
//! The engine and arena sit behind a `RefCell`, so a context is `!Sync`:
//! it cannot be shared across threads. A nested operation issued while a
//! scope is open fails with [`Error::Busy`].

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, instrument, trace};

use crate::arena::{Arena, HeapBlock, Mark};
use crate::config::{ContextConfig, CurveId, MapToMode, SerializationMode};
use crate::engine::{ArkEngine, Call, CurveParams, Engine, Ptr};
use crate::errors::Error;
use crate::value::Kind;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Runtime<E> {
    engine: E,
    arena: Arena,
}

/// A buffer in engine memory that lives as long as the scope that made it.
#[derive(Clone, Copy, Debug)]
pub struct Region<'s> {
    ptr: Ptr,
    len: usize,
    _scope: PhantomData<&'s ()>,
}

impl Region<'_> {
    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute memory range of `len` bytes at `offset`, if it stays inside
    /// the region.
    fn span(&self, offset: usize, len: usize) -> Option<Range<usize>> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        let start = self.ptr.checked_add(offset)?;
        Some(start..self.ptr.checked_add(end)?)
    }
}

/// One marshaling sequence. Opening it marks the arena stack; dropping it
/// restores the mark, whichever way the sequence ends.
pub struct Scope<'s, E: Engine> {
    runtime: &'s mut Runtime<E>,
    mark: Option<Mark>,
}

impl<'s, E: Engine> Scope<'s, E> {
    fn open(runtime: &'s mut Runtime<E>) -> Self {
        let mark = runtime.arena.mark();
        trace!(top = runtime.arena.stack_top(), "scope opened");
        Self {
            runtime,
            mark: Some(mark),
        }
    }

    pub fn alloc(&mut self, len: usize) -> Result<Region<'s>, Error> {
        let ptr = self.runtime.arena.allocate(len)?;
        Ok(Region {
            ptr,
            len,
            _scope: PhantomData,
        })
    }

    /// Allocates a region holding a copy of `bytes`.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Region<'s>, Error> {
        let region = self.alloc(bytes.len())?;
        self.write(region, 0, bytes)?;
        Ok(region)
    }

    /// Copies equally sized items into one contiguous region.
    pub fn push_all<'a, I>(&mut self, items: I, width: usize) -> Result<Region<'s>, Error>
    where
        I: ExactSizeIterator<Item = &'a [u8]>,
    {
        let total = items
            .len()
            .checked_mul(width)
            .ok_or_else(|| Error::Marshal("operand array too large".into()))?;
        let region = self.alloc(total)?;
        for (i, item) in items.enumerate() {
            if item.len() != width {
                return Err(Error::Marshal(format!(
                    "operand {i} is {} bytes, expected {width}",
                    item.len()
                )));
            }
            self.write(region, i * width, item)?;
        }
        Ok(region)
    }

    pub fn write(&mut self, region: Region<'s>, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let span = region
            .span(offset, bytes.len())
            .ok_or_else(|| Error::Marshal("write past the end of a region".into()))?;
        self.runtime
            .engine
            .memory_mut()
            .get_mut(span)
            .ok_or_else(|| Error::Marshal("region outside engine memory".into()))?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Copies `len` bytes starting at `offset` out of `region`.
    pub fn read(&self, region: Region<'s>, offset: usize, len: usize) -> Result<Box<[u8]>, Error> {
        let span = region
            .span(offset, len)
            .ok_or_else(|| Error::Marshal("read past the end of a region".into()))?;
        let bytes = self
            .runtime
            .engine
            .memory()
            .get(span)
            .ok_or_else(|| Error::Marshal("region outside engine memory".into()))?;
        Ok(bytes.into())
    }

    pub fn read_all(&self, region: Region<'s>) -> Result<Box<[u8]>, Error> {
        self.read(region, 0, region.len)
    }

    pub fn call(&mut self, call: Call) -> Result<usize, Error> {
        Ok(self.runtime.engine.call(call)?)
    }
}

impl<E: Engine> Drop for Scope<'_, E> {
    fn drop(&mut self) {
        if let Some(mark) = self.mark.take() {
            self.runtime.arena.restore(mark);
            trace!(top = self.runtime.arena.stack_top(), "scope restored");
        }
    }
}

/// An initialized engine and everything needed to talk to it.
///
/// # Example
///
/// ```rust
/// use pairing_arena::{Context, Element, Fr, IntegerLike};
///
/// let ctx = Context::bls12_381()?;
/// let a = Fr::from_int(&ctx, 200)?;
/// let b = Fr::from_int(&ctx, 20)?;
/// assert_eq!(ctx.mul(&a, &b)?.get_str(&ctx, 10)?, "4000");
/// # Ok::<(), pairing_arena::Error>(())
/// ```
pub struct Context<E: Engine = ArkEngine> {
    id: u64,
    params: CurveParams,
    serialization: SerializationMode,
    map_to: MapToMode,
    verify_order_g1: bool,
    verify_order_g2: bool,
    runtime: RefCell<Runtime<E>>,
}

impl Context<ArkEngine> {
    /// BLS12-381 on the bundled arkworks engine with default settings.
    pub fn bls12_381() -> Result<Self, Error> {
        Self::with_config(ContextConfig::default())
    }

    /// The bundled arkworks engine, with linear memory sized by
    /// `config.memory_size`.
    pub fn with_config(config: ContextConfig) -> Result<Self, Error> {
        Self::new(ArkEngine::with_memory_size(config.memory_size), config)
    }
}

impl<E: Engine> Context<E> {
    /// Initializes `engine` for `config.curve` and lays out the arena over
    /// its memory.
    #[instrument(level = "info", skip_all, fields(curve = config.curve.name()))]
    pub fn new(mut engine: E, config: ContextConfig) -> Result<Self, Error> {
        config.validate()?;
        config.ensure_supported(engine.curves())?;
        if engine.memory().len() < config.memory_size {
            return Err(Error::InvalidConfig(format!(
                "engine provides {} bytes of memory, {} configured",
                engine.memory().len(),
                config.memory_size
            )));
        }
        let params = engine.init(config.curve)?;
        let arena = Arena::new(engine.memory().len(), config.stack_size)?;
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            id,
            fp_unit = params.fp_unit,
            fr_unit = params.fr_unit,
            stack_base = arena.stack_base(),
            "context ready"
        );
        Ok(Self {
            id,
            params,
            serialization: config.serialization,
            map_to: config.map_to,
            verify_order_g1: config.verify_order_g1,
            verify_order_g2: config.verify_order_g2,
            runtime: RefCell::new(Runtime { engine, arena }),
        })
    }

    /// Process-unique identifier, used to bind precomputed tables.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn curve(&self) -> CurveId {
        self.params.curve
    }

    /// Byte width of every value of `kind` created by this context.
    pub fn width(&self, kind: Kind) -> usize {
        self.params.width(kind)
    }

    pub fn serialization_mode(&self) -> SerializationMode {
        self.serialization
    }

    pub fn set_serialization_mode(&mut self, mode: SerializationMode) {
        self.serialization = mode;
    }

    pub fn map_to_mode(&self) -> MapToMode {
        self.map_to
    }

    pub fn set_map_to_mode(&mut self, mode: MapToMode) {
        self.map_to = mode;
    }

    pub fn verify_order_g1(&self) -> bool {
        self.verify_order_g1
    }

    pub fn set_verify_order_g1(&mut self, verify: bool) {
        self.verify_order_g1 = verify;
    }

    pub fn verify_order_g2(&self) -> bool {
        self.verify_order_g2
    }

    pub fn set_verify_order_g2(&mut self, verify: bool) {
        self.verify_order_g2 = verify;
    }

    pub(crate) fn verify_order(&self, kind: Kind) -> bool {
        match kind {
            Kind::G1 => self.verify_order_g1,
            Kind::G2 => self.verify_order_g2,
            _ => false,
        }
    }

    /// Current arena stack top. Equal to the stack base between operations.
    pub fn stack_top(&self) -> Result<usize, Error> {
        let runtime = self.runtime.try_borrow().map_err(|_| Error::Busy)?;
        Ok(runtime.arena.stack_top())
    }

    pub fn stack_base(&self) -> Result<usize, Error> {
        let runtime = self.runtime.try_borrow().map_err(|_| Error::Busy)?;
        Ok(runtime.arena.stack_base())
    }

    /// Bytes of engine heap held by live precomputed tables.
    pub fn heap_in_use(&self) -> Result<usize, Error> {
        let runtime = self.runtime.try_borrow().map_err(|_| Error::Busy)?;
        Ok(runtime.arena.heap_in_use())
    }

    /// Runs `f` inside one arena scope. Every region `f` allocates is
    /// released when it returns, on success and on error alike.
    pub fn scoped<R, F>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Scope<'_, E>) -> Result<R, Error>,
    {
        let mut runtime = self.runtime.try_borrow_mut().map_err(|_| Error::Busy)?;
        let mut scope = Scope::open(&mut *runtime);
        f(&mut scope)
    }

    pub(crate) fn heap_alloc(&self, len: usize) -> Result<HeapBlock, Error> {
        let mut runtime = self.runtime.try_borrow_mut().map_err(|_| Error::Busy)?;
        runtime.arena.heap_alloc(len)
    }

    pub(crate) fn heap_free(&self, block: HeapBlock) -> Result<(), Error> {
        let mut runtime = self.runtime.try_borrow_mut().map_err(|_| Error::Busy)?;
        runtime.arena.heap_free(block);
        Ok(())
    }

    /// Copies `inputs` in, runs the call built from their offsets and the
    /// offset of a fresh `out_kind` buffer, and copies that buffer back.
    pub(crate) fn invoke<const N: usize>(
        &self,
        out_kind: Kind,
        inputs: [&[u8]; N],
        build: impl FnOnce(Ptr, [Ptr; N]) -> Call,
    ) -> Result<Box<[u8]>, Error> {
        let width = self.width(out_kind);
        self.scoped(|scope| {
            let ptrs = push_inputs(scope, inputs)?;
            let out = scope.alloc(width)?;
            scope.call(build(out.ptr(), ptrs))?;
            scope.read_all(out)
        })
    }

    /// Like [`invoke`](Self::invoke) for entry points that answer yes or no.
    pub(crate) fn query<const N: usize>(
        &self,
        inputs: [&[u8]; N],
        build: impl FnOnce([Ptr; N]) -> Call,
    ) -> Result<bool, Error> {
        self.scoped(|scope| {
            let ptrs = push_inputs(scope, inputs)?;
            Ok(scope.call(build(ptrs))? != 0)
        })
    }

    /// Runs a writer entry point into a `cap`-byte buffer and returns the
    /// bytes it reported as written.
    pub(crate) fn write_out<const N: usize>(
        &self,
        cap: usize,
        inputs: [&[u8]; N],
        build: impl FnOnce(Ptr, usize, [Ptr; N]) -> Call,
    ) -> Result<Vec<u8>, Error> {
        self.scoped(|scope| {
            let ptrs = push_inputs(scope, inputs)?;
            let dst = scope.alloc(cap)?;
            let written = scope.call(build(dst.ptr(), cap, ptrs))?;
            Ok(scope.read(dst, 0, written)?.into_vec())
        })
    }
}

fn push_inputs<E: Engine, const N: usize>(
    scope: &mut Scope<'_, E>,
    inputs: [&[u8]; N],
) -> Result<[Ptr; N], Error> {
    let mut ptrs = [0; N];
    for (ptr, bytes) in ptrs.iter_mut().zip(inputs) {
        *ptr = scope.push(bytes)?.ptr();
    }
    Ok(ptrs)
}

impl<E: Engine> std::fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("serialization", &self.serialization)
            .field("map_to", &self.map_to)
            .field("verify_order_g1", &self.verify_order_g1)
            .field("verify_order_g2", &self.verify_order_g2)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::value::{Element, Fr, IntegerLike};

    #[test]
    fn scope_restores_on_error_paths() {
        let ctx = Context::bls12_381().unwrap();
        let base = ctx.stack_top().unwrap();
        let result: Result<(), Error> = ctx.scoped(|scope| {
            scope.alloc(1000)?;
            scope.push(&[1, 2, 3])?;
            Err(Error::Marshal("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(ctx.stack_top().unwrap(), base);

        let result: Result<usize, Error> =
            ctx.scoped(|scope| scope.alloc(usize::MAX / 2).map(|r| r.len()));
        assert!(matches!(result, Err(Error::Marshal(_))));
        assert_eq!(ctx.stack_top().unwrap(), base);
    }

    #[test]
    fn oversized_offsets_stay_inside_the_region() {
        let ctx = Context::bls12_381().unwrap();
        let a = ctx
            .scoped(|scope| {
                let a = scope.push(&[0xAA; 8])?;
                let b = scope.alloc(8)?;
                for offset in [usize::MAX, usize::MAX - 1, 7] {
                    assert!(matches!(
                        scope.write(b, offset, &[0x55, 0x55]),
                        Err(Error::Marshal(_))
                    ));
                    assert!(matches!(scope.read(b, offset, 2), Err(Error::Marshal(_))));
                }
                scope.read_all(a)
            })
            .unwrap();
        assert_eq!(&*a, &[0xAA; 8]);
    }

    #[test]
    fn nested_use_is_busy() {
        let ctx = Context::bls12_381().unwrap();
        let a = Fr::from_int(&ctx, 3).unwrap();
        let nested = ctx.scoped(|_| a.is_zero(&ctx));
        assert!(matches!(nested, Err(Error::Busy)));
        assert!(!a.is_zero(&ctx).unwrap());
    }

    #[test]
    fn engine_errors_propagate_and_release() {
        let ctx = Context::bls12_381().unwrap();
        let base = ctx.stack_top().unwrap();
        let result = ctx.invoke(Kind::Fr, [], |out, []| Call::MapTo {
            kind: Kind::Fr,
            out,
            x: out,
        });
        assert!(matches!(
            result,
            Err(Error::Engine(EngineError::UnsupportedEntry { .. }))
        ));
        assert_eq!(ctx.stack_top().unwrap(), base);
    }

    #[test]
    fn unsupported_curve_fails_construction() {
        let config = ContextConfig::new(CurveId::Bn254);
        let err = Context::new(ArkEngine::new(), config).unwrap_err();
        assert!(matches!(err, Error::Engine(EngineError::UnsupportedCurve(_))));
    }

    #[test]
    fn memory_size_follows_the_config() {
        use crate::value::{G2, Point};

        let n = 2000;
        let small = Context::bls12_381().unwrap();
        let g = G2::generator(&small).unwrap();
        let one = Fr::from_int(&small, 1).unwrap();
        let points = vec![g.clone(); n];
        let scalars = vec![one; n];
        assert!(matches!(
            small.mul_vec(&points, &scalars),
            Err(Error::Marshal(_))
        ));

        let config = ContextConfig {
            memory_size: 4 * 1024 * 1024,
            stack_size: 3 * 1024 * 1024,
            ..ContextConfig::default()
        };
        let large = Context::with_config(config.clone()).unwrap();
        assert_eq!(large.stack_base().unwrap(), 1024 * 1024);
        let sum = large.mul_vec(&points, &scalars).unwrap();
        let expected = large.mul(&g, &Fr::from_int(&large, 2000).unwrap()).unwrap();
        assert!(sum.is_equal(&large, &expected).unwrap());

        let err = Context::new(ArkEngine::new(), config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn contexts_get_distinct_ids() {
        let a = Context::bls12_381().unwrap();
        let b = Context::bls12_381().unwrap();
        assert_ne!(a.id(), b.id());
    }
}
