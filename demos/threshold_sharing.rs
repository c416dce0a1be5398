//! Threshold BLS: a dealer splits a signing key 3-of-5, three holders sign
//! with their shares, and the partial signatures combine in `G1`.
//!
//! Run with `cargo run --example threshold_sharing`.

use pairing_arena::{Context, Element, Error, Fr, G1, G2, IntegerLike, Point};
use rand::rngs::OsRng;
use tracing::info;

const PARTIES: i64 = 5;
const THRESHOLD: usize = 3;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().init();
    let ctx = Context::bls12_381()?;

    let coefficients = (0..THRESHOLD)
        .map(|_| Fr::random(&ctx, &mut OsRng))
        .collect::<Result<Vec<_>, _>>()?;
    let group_pk = ctx.mul(&G2::generator(&ctx)?, &coefficients[0])?;

    let ids = (1..=PARTIES)
        .map(|i| Fr::from_int(&ctx, i))
        .collect::<Result<Vec<_>, _>>()?;
    let key_shares = ids
        .iter()
        .map(|id| ctx.share(&coefficients, id))
        .collect::<Result<Vec<_>, _>>()?;
    info!(parties = PARTIES, threshold = THRESHOLD, "dealt key shares");

    let msg = b"threshold demo";
    let h = G1::hash_of(&ctx, msg)?;
    let signers = [0usize, 2, 4];
    let partials = signers
        .iter()
        .map(|&i| ctx.mul(&h, &key_shares[i]))
        .collect::<Result<Vec<_>, _>>()?;
    let signer_ids: Vec<Fr> = signers.iter().map(|&i| ids[i].clone()).collect();
    let sig = ctx.recover(&signer_ids, &partials)?;

    let ok = ctx
        .pairing(&sig, &G2::generator(&ctx)?)?
        .is_equal(&ctx, &ctx.pairing(&h, &group_pk)?)?;
    info!(signers = ?signers, ok, "combined signature");
    assert!(ok);

    let secret = ctx.recover(&signer_ids, &signers.map(|i| key_shares[i].clone()))?;
    assert!(secret.is_equal(&ctx, &coefficients[0])?);
    Ok(())
}
