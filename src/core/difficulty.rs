// Forgemine - Free and Open Source Software Statement
//
// This project, forgemine, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms.
//
// File: src/core/difficulty.rs
//
// Difficulty and target math. The mining hot path uses a u64 difficulty
// metric over the leading eight bytes of the hash; the 256-bit helpers are
// used where a full-width target is needed (GPU kernel dispatch, compact
// nbits decoding) and by verification on the connection side.

use hex;
use log::warn;
use uint::construct_uint;

const LOG_TARGET: &str = "forgemine::difficulty";

construct_uint! {
    pub struct U256(4);
}

/// Difficulty of a hash: u64::MAX divided by the big-endian value of its
/// leading eight bytes. Always at least 1 for a 32-byte hash.
pub fn calculate_difficulty(hash: &[u8]) -> u64 {
    if hash.len() < 8 {
        warn!(target: LOG_TARGET, "invalid hash: too short ({} bytes)", hash.len());
        return 0;
    }
    let hash_u64 = u64::from_be_bytes([
        hash[0], hash[1], hash[2], hash[3], hash[4], hash[5], hash[6], hash[7],
    ]);
    if hash_u64 == 0 {
        u64::MAX
    } else {
        u64::MAX / hash_u64
    }
}

/// Parse a 32-byte big-endian target from hex into the u64 difficulty scale.
pub fn parse_target_difficulty(target_hex: &str) -> u64 {
    match hex::decode(target_hex) {
        Ok(target_bytes) => {
            if target_bytes.len() != 32 {
                warn!(target: LOG_TARGET, "invalid target: wrong length ({} bytes)", target_bytes.len());
                return 1;
            }
            let target = U256::from_big_endian(&target_bytes);
            if target.is_zero() {
                warn!(target: LOG_TARGET, "invalid target: zero value");
                return 1;
            }
            target_to_difficulty(target)
        }
        Err(e) => {
            warn!(target: LOG_TARGET, "failed to decode target hex: {}", e);
            1
        }
    }
}

/// Collapse a full-width target onto the u64 difficulty scale, saturating.
/// A zero target is unreachable by any hash and maps to the hardest
/// difficulty.
pub fn target_to_difficulty(target: U256) -> u64 {
    if target.is_zero() {
        return u64::MAX;
    }
    let quotient = U256::max_value() / target;
    if quotient > U256::from(u64::MAX) {
        u64::MAX
    } else {
        quotient.low_u64()
    }
}

/// Expand a u64 difficulty into the full-width target a hash must stay under.
pub fn difficulty_to_target(difficulty: u64) -> U256 {
    if difficulty == 0 {
        warn!(target: LOG_TARGET, "zero difficulty, using max target");
        return U256::max_value();
    }
    U256::max_value() / U256::from(difficulty)
}

/// Big-endian comparison of a 32-byte hash against a full-width target.
pub fn hash_meets_target(hash: &[u8], target: U256) -> bool {
    if hash.len() != 32 {
        warn!(target: LOG_TARGET, "invalid hash for target check: {} bytes", hash.len());
        return false;
    }
    U256::from_big_endian(hash) <= target
}

/// Decode a Bitcoin-style compact nbits encoding into a full-width target.
pub fn bits_to_target(bits: u32) -> U256 {
    let exponent = ((bits >> 24) & 0xFF) as i32;
    let mantissa = bits & 0x00FF_FFFF;
    if exponent <= 0 || mantissa == 0 {
        warn!(target: LOG_TARGET, "invalid nbits: {:08x}, returning zero target", bits);
        return U256::zero();
    }
    let shift = exponent - 3;
    let target = U256::from(mantissa);
    if shift >= 0 {
        target << (shift * 8)
    } else {
        target >> ((-shift) * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_hash_is_high_difficulty() {
        let mut easy = [0xFFu8; 32];
        let hard = [0x00u8; 32];
        easy[0] = 0x7F;
        assert!(calculate_difficulty(&hard) > calculate_difficulty(&easy));
        assert_eq!(calculate_difficulty(&hard), u64::MAX);
    }

    #[test]
    fn difficulty_one_accepts_everything() {
        assert_eq!(calculate_difficulty(&[0xFFu8; 32]), 1);
    }

    #[test]
    fn target_round_trip() {
        let difficulty = 100_000u64;
        let target = difficulty_to_target(difficulty);
        // A hash exactly at the target meets it
        let hash = target.to_big_endian();
        assert!(hash_meets_target(&hash, target));
        // Difficulty computed back from the boundary hash is in the ballpark
        let back = calculate_difficulty(&hash);
        assert!(back >= difficulty / 2 && back <= difficulty * 2, "back = {}", back);
    }

    #[test]
    fn target_difficulty_round_trip() {
        for difficulty in [1u64, 1000, 100_000, u64::MAX / 2] {
            let back = target_to_difficulty(difficulty_to_target(difficulty));
            assert!(
                back >= difficulty && back <= difficulty.saturating_add(difficulty / 1000 + 1),
                "difficulty {} came back as {}",
                difficulty,
                back
            );
        }
        assert_eq!(target_to_difficulty(U256::zero()), u64::MAX);
        assert_eq!(target_to_difficulty(U256::max_value()), 1);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_target_difficulty("zz"), 1);
        assert_eq!(parse_target_difficulty("00"), 1);
        assert_eq!(
            parse_target_difficulty(&"00".repeat(32)),
            1
        );
    }

    #[test]
    fn nbits_decoding() {
        // Genesis-block compact target
        let target = bits_to_target(0x1d00ffff);
        let expected = U256::from(0xFFFFu64) << (8 * (0x1d - 3));
        assert_eq!(target, expected);
        assert!(bits_to_target(0x00000000).is_zero());
    }
}
