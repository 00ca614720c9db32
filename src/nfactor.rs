//! N-factor difficulty schedule
//!
//! Scrypt-jane coins grow their memory-hardness cost exponent over time: the
//! exponent is a piecewise function of the block timestamp, parameterized per
//! coin by a reference timestamp and min/max bounds. Profiles live in a
//! static table keyed by coin short-code or name; adding a coin is a data
//! change. The configuration string falls back through a documented chain:
//! exact coin match, `timestamp,min,max` triple, bare integer override,
//! default profile.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard ceiling on the cost exponent
///
/// `N = 1 << (exponent + 1)`, so 30 bounds a single lane's mixing scratch at
/// 2^31 * 128-byte-chunk territory. Exceeding it is fatal to a scan.
pub const MAX_COST_EXPONENT: u8 = 30;

/// Per-coin schedule constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoinProfile {
    /// Short code, e.g. "YAC"
    pub code: &'static str,
    /// Full name, e.g. "Yacoin"
    pub name: &'static str,
    /// Chain start timestamp the schedule is anchored to
    pub reference_timestamp: u32,
    /// Lower bound on the cost exponent
    pub min_exponent: u8,
    /// Upper bound on the cost exponent
    pub max_exponent: u8,
}

/// Default profile (Yacoin)
pub const DEFAULT_PROFILE: CoinProfile = CoinProfile {
    code: "YAC",
    name: "Yacoin",
    reference_timestamp: 1367991200,
    min_exponent: 4,
    max_exponent: 30,
};

/// Known coin profiles
///
/// Constants taken from each coin's chain parameters (nChainStartTime,
/// minNfactor, maxNfactor in the reference wallets).
pub static PROFILES: &[CoinProfile] = &[
    DEFAULT_PROFILE,
    CoinProfile { code: "YBC", name: "YBCoin", reference_timestamp: 1372386273, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "ZZC", name: "ZZCoin", reference_timestamp: 1375817223, min_exponent: 12, max_exponent: 30 },
    CoinProfile { code: "FEC", name: "FreeCoin", reference_timestamp: 1375801200, min_exponent: 6, max_exponent: 32 },
    CoinProfile { code: "ONC", name: "OneCoin", reference_timestamp: 1371119462, min_exponent: 6, max_exponent: 30 },
    CoinProfile { code: "QQC", name: "QQCoin", reference_timestamp: 1387769316, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "GPL", name: "GoldPressedLatinum", reference_timestamp: 1377557832, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "MRC", name: "MicroCoin", reference_timestamp: 1389028879, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "APC", name: "AppleCoin", reference_timestamp: 1384720832, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "CPR", name: "Copperbars", reference_timestamp: 1376184687, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "CACH", name: "CacheCoin", reference_timestamp: 1388949883, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "UTC", name: "UltraCoin", reference_timestamp: 1388361600, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "VEL", name: "VelocityCoin", reference_timestamp: 1387769316, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "ITC", name: "InternetCoin", reference_timestamp: 1388385602, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "RAD", name: "RadioactiveCoin", reference_timestamp: 1389196388, min_exponent: 4, max_exponent: 30 },
    CoinProfile { code: "LEO", name: "LEOCoin", reference_timestamp: 1402845776, min_exponent: 4, max_exponent: 30 },
];

/// Look up a profile by short code or name, case-insensitively
pub fn lookup_profile(ident: &str) -> Option<&'static CoinProfile> {
    PROFILES
        .iter()
        .find(|p| p.code.eq_ignore_ascii_case(ident) || p.name.eq_ignore_ascii_case(ident))
}

/// Resolved schedule parameters for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleParams {
    /// Timestamp-driven piecewise schedule
    Piecewise {
        reference_timestamp: u32,
        min_exponent: u8,
        max_exponent: u8,
    },
    /// Explicit exponent override; bypasses the formula and the clamp
    Fixed(u8),
}

impl ScheduleParams {
    /// Schedule for a known coin profile
    pub fn from_profile(profile: &CoinProfile) -> Self {
        ScheduleParams::Piecewise {
            reference_timestamp: profile.reference_timestamp,
            min_exponent: profile.min_exponent,
            max_exponent: profile.max_exponent,
        }
    }

    /// Parse a configuration string
    ///
    /// Fallback chain: empty selects the default profile; a known coin
    /// code/name selects that profile; a `timestamp,min,max` triple supplies
    /// schedule constants directly; a bare integer fixes the exponent
    /// (unclamped). Anything else warns and falls back to the default.
    pub fn parse(params: &str) -> Self {
        let params = params.trim();
        if params.is_empty() {
            return Self::from_profile(&DEFAULT_PROFILE);
        }
        debug!(params, "Given scrypt-jane parameters");

        if let Some(profile) = lookup_profile(params) {
            return Self::from_profile(profile);
        }

        let fields: Vec<&str> = params.split(',').map(str::trim).collect();
        if fields.len() == 3 {
            if let (Ok(ts), Ok(min), Ok(max)) = (
                fields[0].parse::<u32>(),
                fields[1].parse::<u8>(),
                fields[2].parse::<u8>(),
            ) {
                return ScheduleParams::Piecewise {
                    reference_timestamp: ts,
                    min_exponent: min,
                    max_exponent: max,
                };
            }
        }

        if let Ok(fixed) = params.parse::<u8>() {
            return ScheduleParams::Fixed(fixed);
        }

        warn!(
            params,
            "Unable to parse scrypt-jane parameters, defaulting to {}", DEFAULT_PROFILE.name
        );
        Self::from_profile(&DEFAULT_PROFILE)
    }

    /// Cost exponent for a block timestamp
    ///
    /// At or before the reference timestamp the minimum applies. Afterwards
    /// the age is repeatedly halved while more than one halving remains
    /// above 3, and the halving count plus the 2-bit remainder feed a linear
    /// formula, clamped into the profile bounds. A fixed override skips all
    /// of this, including the clamp.
    pub fn cost_exponent(&self, timestamp: u32) -> u8 {
        let (reference, min, max) = match *self {
            ScheduleParams::Fixed(n) => return n,
            ScheduleParams::Piecewise {
                reference_timestamp,
                min_exponent,
                max_exponent,
            } => (reference_timestamp, min_exponent, max_exponent),
        };

        if timestamp <= reference {
            return min;
        }

        let mut s = (timestamp - reference) as u64;
        let mut l: i64 = 0;
        while (s >> 1) > 3 {
            l += 1;
            s >>= 1;
        }
        s &= 3;

        let n = (l * 170 + s as i64 * 25 - 2320) / 100;
        let n = n.max(0) as u8;
        // sequential bounds, min wins; a user-supplied triple may invert them
        if n < min {
            min
        } else if n > max {
            max
        } else {
            n
        }
    }
}
