//! The engine ABI.
//!
//! An engine is an opaque arithmetic core with its own linear memory. It is
//! driven the way a foreign library is driven: the caller writes operand bytes
//! into engine memory, invokes one entry point with offsets into that memory,
//! and reads the result bytes back. Nothing outside an engine depends on how it
//! represents elements internally; the only shared facts are the byte widths
//! reported by [`CurveParams`].
//!
//! Every entry point is a variant of the closed [`Call`] enum, so an engine is
//! a single `match` and a caller can never invoke an entry point that does not
//! exist.

mod ark_bls12_381;
mod codec;

pub use ark_bls12_381::ArkEngine;

use crate::config::{CurveId, MapToMode, SerializationMode};
use crate::errors::EngineError;
use crate::value::Kind;

/// Byte offset into engine memory.
pub type Ptr = usize;

/// Widths and sizes an engine reports once the curve is initialized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CurveParams {
    pub curve: CurveId,
    /// 64-bit limbs per base field element
    pub fp_unit: usize,
    /// 64-bit limbs per scalar field element
    pub fr_unit: usize,
    /// 64-bit words needed by one precomputed `G2` table
    pub precompute_words: usize,
}

impl CurveParams {
    /// Byte width of the raw encoding of `kind`.
    pub fn width(&self, kind: Kind) -> usize {
        let fp = 8 * self.fp_unit;
        match kind {
            Kind::Fr => 8 * self.fr_unit,
            Kind::Fp => fp,
            Kind::Fp2 => 2 * fp,
            Kind::G1 => 3 * fp,
            Kind::G2 => 6 * fp,
            Kind::Gt => 12 * fp,
        }
    }

    /// Byte size of one precomputed `G2` table.
    pub fn precompute_bytes(&self) -> usize {
        8 * self.precompute_words
    }
}

/// How `SetBytes` interprets its input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByteOrder {
    /// Little-endian, truncated to the width and masked below the modulus.
    LittleEndian,
    /// Little-endian, reduced modulo the field order.
    LittleEndianMod,
    /// Big-endian, reduced modulo the field order.
    BigEndianMod,
}

/// Single-operand entry points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Neg,
    Sqr,
    Inv,
    Dbl,
    Normalize,
    FinalExp,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Sqr => "sqr",
            UnaryOp::Inv => "inv",
            UnaryOp::Dbl => "dbl",
            UnaryOp::Normalize => "normalize",
            UnaryOp::FinalExp => "final_exp",
        }
    }
}

/// Two-operand entry points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Pairing,
    MillerLoop,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
            BinaryOp::Pairing => "pairing",
            BinaryOp::MillerLoop => "miller_loop",
        }
    }
}

/// Boolean entry points. The engine answers `1` or `0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Predicate {
    IsZero,
    IsOne,
    /// On-curve check, plus subgroup membership when `check_order` is set.
    IsValid { check_order: bool },
    IsValidOrder,
}

/// One engine entry point with its arguments.
///
/// `kind` is the kind of the first operand; `out`, `x`, `y` are offsets of
/// buffers of that kind's width unless the variant says otherwise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Call {
    SetInt {
        kind: Kind,
        out: Ptr,
        value: i64,
    },
    SetBytes {
        kind: Kind,
        out: Ptr,
        src: Ptr,
        len: usize,
        order: ByteOrder,
    },
    SetStr {
        kind: Kind,
        out: Ptr,
        src: Ptr,
        len: usize,
        radix: u32,
        verify_order: bool,
    },
    /// Returns the number of bytes written to `dst`.
    GetStr {
        kind: Kind,
        x: Ptr,
        dst: Ptr,
        cap: usize,
        radix: u32,
    },
    /// Returns the number of bytes written to `dst`.
    Serialize {
        kind: Kind,
        x: Ptr,
        dst: Ptr,
        cap: usize,
        mode: SerializationMode,
    },
    Deserialize {
        kind: Kind,
        out: Ptr,
        src: Ptr,
        len: usize,
        mode: SerializationMode,
        verify_order: bool,
    },
    HashTo {
        kind: Kind,
        out: Ptr,
        msg: Ptr,
        len: usize,
        mode: MapToMode,
    },
    /// `Fp -> G1` or `Fp2 -> G2`; `kind` is the source kind.
    MapTo {
        kind: Kind,
        out: Ptr,
        x: Ptr,
    },
    Generator {
        kind: Kind,
        out: Ptr,
    },
    Unary {
        op: UnaryOp,
        kind: Kind,
        out: Ptr,
        x: Ptr,
    },
    Binary {
        op: BinaryOp,
        kind: Kind,
        out: Ptr,
        x: Ptr,
        y: Ptr,
    },
    /// `exp` holds `exp_len` little-endian bytes of a non-negative integer.
    PowInteger {
        kind: Kind,
        out: Ptr,
        x: Ptr,
        exp: Ptr,
        exp_len: usize,
    },
    Predicate {
        pred: Predicate,
        kind: Kind,
        x: Ptr,
    },
    IsEqual {
        kind: Kind,
        x: Ptr,
        y: Ptr,
    },
    /// `points` and `scalars` are contiguous arrays of `n` elements.
    MulVec {
        kind: Kind,
        out: Ptr,
        points: Ptr,
        scalars: Ptr,
        n: usize,
    },
    /// In place over `n` contiguous elements.
    InvVec {
        kind: Kind,
        buf: Ptr,
        n: usize,
    },
    /// In place over `n` contiguous elements.
    NormalizeVec {
        kind: Kind,
        buf: Ptr,
        n: usize,
    },
    /// Fills `precompute_bytes()` at `table` from the `G2` point at `q`.
    PrecomputeG2 {
        table: Ptr,
        q: Ptr,
    },
    PrecomputedMillerLoop {
        out: Ptr,
        p: Ptr,
        table: Ptr,
    },
    PrecomputedMillerLoop2 {
        out: Ptr,
        p1: Ptr,
        table1: Ptr,
        p2: Ptr,
        table2: Ptr,
    },
    PrecomputedMillerLoop2Mixed {
        out: Ptr,
        p1: Ptr,
        q1: Ptr,
        p2: Ptr,
        table2: Ptr,
    },
}

impl Call {
    /// Entry point name, for logging and error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Call::SetInt { .. } => "set_int",
            Call::SetBytes { .. } => "set_bytes",
            Call::SetStr { .. } => "set_str",
            Call::GetStr { .. } => "get_str",
            Call::Serialize { .. } => "serialize",
            Call::Deserialize { .. } => "deserialize",
            Call::HashTo { .. } => "hash_to",
            Call::MapTo { .. } => "map_to",
            Call::Generator { .. } => "generator",
            Call::Unary { op, .. } => op.name(),
            Call::Binary { op, .. } => op.name(),
            Call::PowInteger { .. } => "pow_integer",
            Call::Predicate { pred, .. } => match pred {
                Predicate::IsZero => "is_zero",
                Predicate::IsOne => "is_one",
                Predicate::IsValid { .. } => "is_valid",
                Predicate::IsValidOrder => "is_valid_order",
            },
            Call::IsEqual { .. } => "is_equal",
            Call::MulVec { .. } => "mul_vec",
            Call::InvVec { .. } => "inv_vec",
            Call::NormalizeVec { .. } => "normalize_vec",
            Call::PrecomputeG2 { .. } => "precompute_g2",
            Call::PrecomputedMillerLoop { .. } => "precomputed_miller_loop",
            Call::PrecomputedMillerLoop2 { .. } => "precomputed_miller_loop2",
            Call::PrecomputedMillerLoop2Mixed { .. } => "precomputed_miller_loop2_mixed",
        }
    }
}

/// An arithmetic core driven through offsets into its own memory.
///
/// Implementations must treat every pointer argument as untrusted and report
/// [`EngineError::OutOfBounds`] instead of panicking on a bad range.
///
/// # Example
///
/// ```rust
/// use pairing_arena::engine::{ArkEngine, Engine};
/// use pairing_arena::CurveId;
///
/// let mut engine = ArkEngine::new();
/// let params = engine.init(CurveId::Bls12_381).unwrap();
/// assert_eq!(params.fp_unit, 6);
/// assert!(engine.init(CurveId::Bls12_381).is_err());
/// ```
pub trait Engine {
    /// Curves [`init`](Engine::init) accepts.
    fn curves(&self) -> &'static [CurveId];

    /// One-time curve initialization.
    fn init(&mut self, curve: CurveId) -> Result<CurveParams, EngineError>;

    /// Parameters reported by [`init`](Engine::init), if it ran.
    fn params(&self) -> Option<CurveParams>;

    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Invokes one entry point. Predicates return `0` or `1`, writers return
    /// the number of bytes written, everything else returns `0`.
    fn call(&mut self, call: Call) -> Result<usize, EngineError>;
}
