//! BLS signatures: sign in `G1`, verify with one double Miller loop against
//! a precomputed table for `-g2`.
//!
//! Run with `cargo run --example bls_signature`.

use pairing_arena::{
    Context, ContextConfig, Element, Error, Fr, G1, G2, Gt, IntegerLike, MapToMode, Point,
    PrecomputedG2,
};
use rand::rngs::OsRng;
use tracing::info;

struct Verifier {
    neg_gen: PrecomputedG2,
}

impl Verifier {
    fn new(ctx: &Context) -> Result<Self, Error> {
        let neg_gen = ctx.neg(&G2::generator(ctx)?)?;
        Ok(Self {
            neg_gen: PrecomputedG2::new(ctx, &neg_gen)?,
        })
    }

    /// `e(H(m), pk) · e(sig, -g2) == 1`
    fn verify(&self, ctx: &Context, pk: &G2, msg: &[u8], sig: &G1) -> Result<bool, Error> {
        let h = G1::hash_of(ctx, msg)?;
        let f: Gt = ctx.precomputed_miller_loop2_mixed(&h, pk, sig, &self.neg_gen)?;
        ctx.final_exp(&f)?.is_one(ctx)
    }

    fn destroy(self, ctx: &Context) -> Result<(), Error> {
        self.neg_gen.destroy(ctx)
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().init();

    let config = ContextConfig {
        map_to: MapToMode::HashToCurve,
        verify_order_g1: true,
        verify_order_g2: true,
        ..ContextConfig::default()
    };
    let ctx = Context::with_config(config)?;

    let sk = Fr::random(&ctx, &mut OsRng)?;
    let pk = ctx.mul(&G2::generator(&ctx)?, &sk)?;
    info!(pk = %pk.serialize_to_hex(&ctx)?, "generated key pair");

    let msg = b"pairing-arena demo";
    let sig = ctx.mul(&G1::hash_of(&ctx, msg)?, &sk)?;
    let wire = sig.serialize(&ctx)?;
    info!(bytes = wire.len(), "signed message");

    let mut received = G1::new(&ctx);
    received.deserialize(&ctx, &wire)?;

    let verifier = Verifier::new(&ctx)?;
    let good = verifier.verify(&ctx, &pk, msg, &received)?;
    let forged = verifier.verify(&ctx, &pk, b"another message", &received)?;
    info!(good, forged, "verification results");
    assert!(good && !forged);
    verifier.destroy(&ctx)?;
    Ok(())
}
