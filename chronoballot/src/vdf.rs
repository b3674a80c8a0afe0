//! Verifiable delay function used as the ballot time-lock.
//!
//! `WesolowskiVdf` evaluates `y = x^(2^t) mod n` by `t` sequential squarings
//! over a fixed RSA modulus and emits the log-sized Wesolowski proof
//! `pi = x^q mod n` with `q = (2^t - r) / l`, `r = 2^t mod l` for the public
//! prime `l = 2^128 + 51`. Verification is a single pair of exponentiations:
//! `y == pi^l * x^r (mod n)`.
//!
//! The difficulty `t` is embedded at the front of the puzzle input so a
//! solution is verifiable on its own; verification also enforces the
//! election's difficulty bound.

use crate::*;
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::One;
use rand::RngCore;

/// Smallest prime above 2^128; 128 bits suffice per the original paper.
const L_PRIME_DEC: &str = "340282366920938463463374607431768211507";

/// RSA-2048 challenge modulus. Nobody is known to hold its factorization,
/// which is what makes the squaring chain sequential.
const MODULUS_DEC: &str = "2519590847565789349402718324004839857142928212620403202777713783604366202070\
5961836897714696887106025129711249403996698298075095836446110715915116812964683\
6204422688151735912270295809517977950940946893013147571673382968223538425376407\
4904935285292842929556303923898222023588627209520675663131574134538229837317758\
3029601186091919597383581433818775775255029981354347813153814394371102566999879\
4240670875051958268280994422604388547978833300154113285844821187527097255039805\
9826113556524386837113169559891973717285904476900424133239327290521928528801231\
3478283160618373952293837661841510158151346099284741883212351787463832929951967";

lazy_static! {
    static ref L_PRIME: BigUint = BigUint::parse_bytes(L_PRIME_DEC.as_bytes(), 10).unwrap();
    static ref MODULUS: BigUint = BigUint::parse_bytes(MODULUS_DEC.as_bytes(), 10).unwrap();
}

/// How often the squaring loop polls the cancellation handle.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdfSolution {
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

pub trait Vdf {
    /// Create a puzzle whose solution takes roughly `duration` seconds of
    /// sequential work, and solve it. Cancellable between squarings.
    fn create(&self, ctx: &Ctx, duration: u64) -> Result<VdfSolution>;
    fn verify(&self, sol: &VdfSolution) -> Result<()>;
}

pub struct WesolowskiVdf {
    pub max_difficulty: u64,
    pub difficulty_conversion: u64,
}

/// Map arbitrary puzzle-input bytes to a group element.
fn input_to_group(input: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&hash(input)) % &*MODULUS
}

fn input_difficulty(input: &[u8]) -> Result<u64> {
    BufferReader::new(input).read_uint64()
}

fn proof_exponents(difficulty: u64) -> (BigUint, BigUint) {
    let exp_two = BigUint::one() << difficulty as usize;
    let r = &exp_two % &*L_PRIME;
    let q = (&exp_two - &r) / &*L_PRIME;
    (r, q)
}

impl Vdf for WesolowskiVdf {
    fn create(&self, ctx: &Ctx, duration: u64) -> Result<VdfSolution> {
        let difficulty = duration
            .saturating_mul(self.difficulty_conversion)
            .min(self.max_difficulty);

        let mut w = BufferWriter::new();
        w.write_uint64(difficulty);
        let mut nonce = [0u8; 32];
        rand::rngs::OsRng {}.fill_bytes(&mut nonce);
        w.write(&nonce);
        let input = w.into_bytes();

        let x = input_to_group(&input);
        let two = BigUint::from(2u8);
        let mut y = x.clone();
        for i in 0..difficulty {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                ctx.check()?;
            }
            y = y.modpow(&two, &MODULUS);
        }

        let (_, q) = proof_exponents(difficulty);
        let pi = x.modpow(&q, &MODULUS);

        Ok(VdfSolution {
            input,
            output: y.to_bytes_be(),
            proof: pi.to_bytes_be(),
        })
    }

    fn verify(&self, sol: &VdfSolution) -> Result<()> {
        let difficulty = input_difficulty(&sol.input)?;
        if difficulty > self.max_difficulty {
            return Err(Error::VdfDifficultyExceeded);
        }

        let x = input_to_group(&sol.input);
        let y = BigUint::from_bytes_be(&sol.output);
        let pi = BigUint::from_bytes_be(&sol.proof);
        if y >= *MODULUS || pi >= *MODULUS {
            return Err(Error::InvalidVdfProof);
        }

        let (r, _) = proof_exponents(difficulty);
        let lhs = (pi.modpow(&L_PRIME, &MODULUS) * x.modpow(&r, &MODULUS)) % &*MODULUS;
        if lhs != y {
            return Err(Error::InvalidVdfProof);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vdf() -> WesolowskiVdf {
        WesolowskiVdf {
            max_difficulty: 512,
            difficulty_conversion: 16,
        }
    }

    #[test]
    fn create_verify_round_trip() {
        let vdf = test_vdf();
        let sol = vdf.create(&Ctx::background(), 10).unwrap();
        assert_eq!(input_difficulty(&sol.input).unwrap(), 160);
        vdf.verify(&sol).unwrap();
    }

    #[test]
    fn difficulty_caps_at_max() {
        let vdf = test_vdf();
        let sol = vdf.create(&Ctx::background(), 1_000_000).unwrap();
        assert_eq!(input_difficulty(&sol.input).unwrap(), 512);
        vdf.verify(&sol).unwrap();
    }

    #[test]
    fn tampered_solution_fails() {
        let vdf = test_vdf();
        let sol = vdf.create(&Ctx::background(), 4).unwrap();

        let mut bad = sol.clone();
        bad.output[0] ^= 1;
        assert!(matches!(vdf.verify(&bad), Err(Error::InvalidVdfProof)));

        let mut bad = sol.clone();
        bad.proof[0] ^= 1;
        assert!(matches!(vdf.verify(&bad), Err(Error::InvalidVdfProof)));

        let mut bad = sol;
        bad.input[12] ^= 1;
        assert!(vdf.verify(&bad).is_err());
    }

    #[test]
    fn difficulty_bound_enforced() {
        let generous = WesolowskiVdf {
            max_difficulty: 4096,
            difficulty_conversion: 4096,
        };
        let sol = generous.create(&Ctx::background(), 1).unwrap();

        let strict = test_vdf();
        assert!(matches!(
            strict.verify(&sol),
            Err(Error::VdfDifficultyExceeded)
        ));
    }

    #[test]
    fn cancelled_create_bails() {
        let vdf = WesolowskiVdf {
            max_difficulty: 1 << 30,
            difficulty_conversion: 1 << 20,
        };
        let ctx = Ctx::background();
        ctx.cancel();
        assert!(matches!(
            vdf.create(&ctx, 1_000),
            Err(Error::Cancelled)
        ));
    }
}
