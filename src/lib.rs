//! # pairing-arena: typed pairing arithmetic over an opaque engine
//!
//! This crate drives a pairing-friendly elliptic-curve engine the way a
//! foreign arithmetic library is driven: operands are copied into the
//! engine's linear memory, one entry point runs over offsets into that
//! memory, and the result is copied back out. On top of that boundary it
//! offers typed values, a closed operator matrix, precomputed pairings,
//! multi-scalar multiplication and Shamir secret sharing.
//!
//! ## Overview
//!
//! - **[`engine`]**: the engine ABI. [`Engine`](engine::Engine) is a trait
//!   over a linear memory plus one `call` taking the closed
//!   [`Call`](engine::Call) enum. [`ArkEngine`](engine::ArkEngine) is the
//!   bundled BLS12-381 engine built on arkworks.
//!
//! - **[`Context`]**: one initialized engine, the arena over its memory and
//!   the serialization / map-to / order-verification settings. Every
//!   operation takes the context that created its operands.
//!
//! - **Values**: [`Fr`], [`Fp`], [`Fp2`], [`G1`], [`G2`], [`Gt`] with the
//!   [`Element`], [`IntegerLike`] and [`Point`] capability traits, and the
//!   dynamic [`Value`] for code that only learns kinds at runtime.
//!
//! - **Operators**: `ctx.add`, `ctx.mul`, `ctx.pow`, `ctx.pairing` and
//!   friends, with the dynamic `ctx.apply_unary` / `ctx.apply_binary` over
//!   [`Value`]. Operand kinds outside the matrix fail with
//!   [`Error::TypeMismatch`] before any engine memory is touched.
//!
//! - **[`PrecomputedG2`]**: Miller-loop tables for a fixed `G2` point, kept
//!   in the engine heap.
//!
//! - **[`ShareDomain`]**: `ctx.share` / `ctx.recover` over `Fr`, `G1` and `G2`.
//!
//! - **[`config`]** and **[`errors`]**: serde-derived settings and the
//!   `thiserror` error types.
//!
//! ## Quick Example
//!
//! ```rust
//! use pairing_arena::{Context, Element, Fr, G1, G2, IntegerLike, Point};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> Result<(), pairing_arena::Error> {
//! let ctx = Context::bls12_381()?;
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! // BLS signature
//! let sk = Fr::random(&ctx, &mut rng)?;
//! let pk = ctx.mul(&G2::generator(&ctx)?, &sk)?;
//! let h = G1::hash_of(&ctx, b"hello")?;
//! let sig = ctx.mul(&h, &sk)?;
//!
//! let lhs = ctx.pairing(&sig, &G2::generator(&ctx)?)?;
//! let rhs = ctx.pairing(&h, &pk)?;
//! assert!(lhs.is_equal(&ctx, &rhs)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threads
//!
//! A [`Context`] is `!Sync`. Use one context per thread; values can be moved
//! between contexts of the same curve by serializing them.

mod arena;
pub mod config;
mod context;
mod dispatch;
pub mod engine;
pub mod errors;
mod msm;
mod precomputed;
mod sharing;
mod value;

pub use arena::{Arena, HeapBlock, Mark};
pub use config::{ContextConfig, CurveId, MapToMode, SerializationMode};
pub use context::{Context, Region, Scope};
pub use dispatch::{
    Invertible, MulBy, PowBy, Squarable, resolve_binary, resolve_pow_int, resolve_unary,
};
pub use engine::{BinaryOp, UnaryOp};
pub use errors::{EngineError, Error};
pub use precomputed::PrecomputedG2;
pub use sharing::ShareDomain;
pub use value::{Element, Fp, Fp2, Fr, G1, G2, Gt, IntegerLike, Kind, Point, Value};
