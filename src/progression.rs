//! # Progression Engine
//!
//! Pure progression rules for a player profile: applying xp / gold / diamond
//! gains and deciding level-ups. Nothing in this module performs I/O or holds
//! state between calls; [`ProfileSyncService`](crate::sync::ProfileSyncService)
//! is the only caller that persists what the engine computes.
//!
//! ## Level-up rule
//!
//! The threshold for leaving level `L` is `(L + 2) * 10` xp. A gain large enough
//! to cross several thresholds is spent threshold by threshold, one level per
//! threshold, and whatever xp is left over once the last threshold is crossed is
//! discarded: xp always restarts at 0 after a level-up.
//!
//! ```rust
//! use playerstats::progression::{ProfileRecord, ProgressionDelta, ProgressionEngine, UserId};
//!
//! let engine = ProgressionEngine::new();
//! let mut record = ProfileRecord::new(UserId::new("u-1"));
//! record.xp = 5;
//!
//! let next = engine.apply(&record, ProgressionDelta::xp(20)).unwrap();
//! assert_eq!((next.level, next.xp), (1, 0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Username stored for a profile until the player picks one.
pub const UNSET_USERNAME: &str = "null";

/// Opaque, stable identifier of a player. Assigned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named attributes of a profile as they appear in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileField {
    Username,
    Level,
    Xp,
    Diamond,
    Gold,
}

impl ProfileField {
    /// Every field, in the order a fresh record is written.
    pub const ALL: [ProfileField; 5] = [
        ProfileField::Username,
        ProfileField::Level,
        ProfileField::Xp,
        ProfileField::Diamond,
        ProfileField::Gold,
    ];

    /// Fields owned by the progression engine.
    pub const STATS: [ProfileField; 4] = [
        ProfileField::Level,
        ProfileField::Xp,
        ProfileField::Diamond,
        ProfileField::Gold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileField::Username => "username",
            ProfileField::Level => "level",
            ProfileField::Xp => "xp",
            ProfileField::Diamond => "diamond",
            ProfileField::Gold => "gold",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        ProfileField::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progression of a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    user_id: UserId,
    pub username: String,
    pub level: u32,
    pub xp: u64,
    pub diamond: u64,
    pub gold: u64,
}

impl ProfileRecord {
    /// Zero-valued record with the unset username sentinel.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: UNSET_USERNAME.to_string(),
            level: 0,
            xp: 0,
            diamond: 0,
            gold: 0,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn has_username(&self) -> bool {
        self.username != UNSET_USERNAME && !self.username.is_empty()
    }

    /// Xp required to leave the current level.
    pub fn next_threshold(&self) -> u64 {
        level_up_threshold(self.level)
    }

    /// Stat fields whose values differ between `self` and `other`.
    pub fn changed_stats(&self, other: &ProfileRecord) -> Vec<ProfileField> {
        ProfileField::STATS
            .into_iter()
            .filter(|field| match field {
                ProfileField::Level => self.level != other.level,
                ProfileField::Xp => self.xp != other.xp,
                ProfileField::Diamond => self.diamond != other.diamond,
                ProfileField::Gold => self.gold != other.gold,
                ProfileField::Username => false,
            })
            .collect()
    }
}

/// Gains produced by a single gameplay event.
///
/// Fields are signed so that malformed rewards can be rejected rather than
/// silently wrapped; every field must be non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionDelta {
    #[serde(default)]
    pub xp_gain: i64,
    #[serde(default)]
    pub gold_gain: i64,
    #[serde(default)]
    pub diamond_gain: i64,
}

impl ProgressionDelta {
    pub const ZERO: ProgressionDelta = ProgressionDelta {
        xp_gain: 0,
        gold_gain: 0,
        diamond_gain: 0,
    };

    pub fn new(xp_gain: i64, gold_gain: i64, diamond_gain: i64) -> Self {
        Self {
            xp_gain,
            gold_gain,
            diamond_gain,
        }
    }

    pub fn xp(xp_gain: i64) -> Self {
        Self {
            xp_gain,
            ..Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    fn gains(&self) -> [(ProfileField, i64); 3] {
        [
            (ProfileField::Xp, self.xp_gain),
            (ProfileField::Gold, self.gold_gain),
            (ProfileField::Diamond, self.diamond_gain),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    /// A gain was negative; the record is left untouched.
    #[error("invalid delta: {field} gain {value} is negative")]
    InvalidDelta { field: ProfileField, value: i64 },

    /// Applying the gain would exceed the representable range of the field.
    #[error("{field} overflow")]
    Overflow { field: ProfileField },
}

/// Xp at or above which a player leaves `level`.
pub fn level_up_threshold(level: u32) -> u64 {
    (u64::from(level) + 2) * 10
}

/// Xp needed to climb `k` levels starting at `level`:
/// `sum((i + 2) * 10)` for `i` in `level..level + k`, i.e. `5k(2level + k + 3)`.
fn cost_of_levels(level: u32, k: u64) -> u128 {
    let k = u128::from(k);
    5 * k * (2 * u128::from(level) + k + 3)
}

/// Largest `k` with `cost_of_levels(level, k) <= xp`.
fn levels_gained(level: u32, xp: u64) -> u64 {
    // every threshold is at least 20, so xp / 20 + 1 levels always cost more than xp
    let (mut lo, mut hi) = (0u64, xp / 20 + 1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if cost_of_levels(level, mid) <= u128::from(xp) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Stateless rule set applying [`ProgressionDelta`]s to [`ProfileRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressionEngine;

impl ProgressionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn threshold(&self, level: u32) -> u64 {
        level_up_threshold(level)
    }

    /// Apply `delta` to `record`, returning the updated copy.
    ///
    /// `user_id` and `username` are carried over unchanged. On return
    /// `xp < threshold(level)` holds.
    pub fn apply(
        &self,
        record: &ProfileRecord,
        delta: ProgressionDelta,
    ) -> Result<ProfileRecord, ProgressionError> {
        let mut gains = [0u64; 3];
        for (slot, (field, value)) in gains.iter_mut().zip(delta.gains()) {
            *slot = u64::try_from(value)
                .map_err(|_| ProgressionError::InvalidDelta { field, value })?;
        }
        let [xp_gain, gold_gain, diamond_gain] = gains;

        let gold = record
            .gold
            .checked_add(gold_gain)
            .ok_or(ProgressionError::Overflow {
                field: ProfileField::Gold,
            })?;
        let diamond =
            record
                .diamond
                .checked_add(diamond_gain)
                .ok_or(ProgressionError::Overflow {
                    field: ProfileField::Diamond,
                })?;
        let mut xp = record
            .xp
            .checked_add(xp_gain)
            .ok_or(ProgressionError::Overflow {
                field: ProfileField::Xp,
            })?;

        let gained = levels_gained(record.level, xp);
        let level = u32::try_from(gained)
            .ok()
            .and_then(|k| record.level.checked_add(k))
            .ok_or(ProgressionError::Overflow {
                field: ProfileField::Level,
            })?;
        if gained > 0 {
            xp = 0;
        }

        Ok(ProfileRecord {
            user_id: record.user_id.clone(),
            username: record.username.clone(),
            level,
            xp,
            diamond,
            gold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(level: u32, xp: u64) -> ProfileRecord {
        let mut r = ProfileRecord::new(UserId::new("tester"));
        r.level = level;
        r.xp = xp;
        r
    }

    #[test]
    fn threshold_formula() {
        assert_eq!(level_up_threshold(0), 20);
        assert_eq!(level_up_threshold(1), 30);
        assert_eq!(level_up_threshold(8), 100);
    }

    #[test]
    fn single_level_up_resets_xp() {
        let engine = ProgressionEngine::new();
        let next = engine.apply(&record(0, 5), ProgressionDelta::xp(20)).unwrap();
        assert_eq!(next.level, 1);
        assert_eq!(next.xp, 0);
    }

    #[test]
    fn reaching_threshold_exactly_levels_up() {
        let engine = ProgressionEngine::new();
        let next = engine.apply(&record(0, 0), ProgressionDelta::xp(20)).unwrap();
        assert_eq!((next.level, next.xp), (1, 0));
    }

    #[test]
    fn gain_crossing_two_thresholds_gains_two_levels() {
        let engine = ProgressionEngine::new();
        // 20 to leave level 0, 30 to leave level 1, 40 needed for level 2
        let next = engine.apply(&record(0, 0), ProgressionDelta::xp(55)).unwrap();
        assert_eq!(next.level, 2);
        assert_eq!(next.xp, 0);
    }

    #[test]
    fn huge_gain_is_computed_without_walking_each_level() {
        let engine = ProgressionEngine::new();
        let started = std::time::Instant::now();
        let next = engine.apply(&record(0, 0), ProgressionDelta::xp(i64::MAX)).unwrap();
        assert_eq!(next.level, 1_358_187_911);
        assert_eq!(next.xp, 0);
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
    }

    #[test]
    fn level_count_matches_threshold_walk() {
        for start in 0..6u32 {
            for xp in 0..600u64 {
                let (mut level, mut left) = (start, xp);
                while left >= level_up_threshold(level) {
                    left -= level_up_threshold(level);
                    level += 1;
                }
                assert_eq!(levels_gained(start, xp), u64::from(level - start), "{start}/{xp}");
            }
        }
    }

    #[test]
    fn level_overflow_is_reported() {
        let engine = ProgressionEngine::new();
        let err = engine
            .apply(&record(u32::MAX, 0), ProgressionDelta::xp(i64::MAX))
            .unwrap_err();
        assert_eq!(
            err,
            ProgressionError::Overflow {
                field: ProfileField::Level
            }
        );
    }

    #[test]
    fn below_threshold_accumulates() {
        let engine = ProgressionEngine::new();
        let next = engine.apply(&record(3, 10), ProgressionDelta::xp(7)).unwrap();
        assert_eq!((next.level, next.xp), (3, 17));
    }

    #[test]
    fn currencies_add_and_identity_is_kept() {
        let engine = ProgressionEngine::new();
        let base = record(1, 0).with_username("alice");
        let next = engine
            .apply(&base, ProgressionDelta::new(0, 25, 3))
            .unwrap();
        assert_eq!(next.gold, 25);
        assert_eq!(next.diamond, 3);
        assert_eq!(next.username, "alice");
        assert_eq!(next.user_id(), base.user_id());
    }

    #[test]
    fn negative_gain_is_rejected() {
        let engine = ProgressionEngine::new();
        let err = engine
            .apply(&record(0, 0), ProgressionDelta::new(5, -1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            ProgressionError::InvalidDelta {
                field: ProfileField::Gold,
                value: -1
            }
        );
    }

    #[test]
    fn gold_overflow_is_reported() {
        let engine = ProgressionEngine::new();
        let mut base = record(0, 0);
        base.gold = u64::MAX;
        let err = engine
            .apply(&base, ProgressionDelta::new(0, 1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            ProgressionError::Overflow {
                field: ProfileField::Gold
            }
        );
    }

    #[test]
    fn changed_stats_lists_only_differences() {
        let a = record(1, 4);
        let mut b = a.clone();
        b.xp = 9;
        b.gold = 1;
        b.username = "renamed".into();
        assert_eq!(a.changed_stats(&b), vec![ProfileField::Xp, ProfileField::Gold]);
    }

    #[test]
    fn field_names_round_trip() {
        for field in ProfileField::ALL {
            assert_eq!(ProfileField::parse(field.as_str()), Some(field));
        }
        assert_eq!(ProfileField::parse("mana"), None);
    }

    fn well_formed_record() -> impl Strategy<Value = ProfileRecord> {
        (0u32..500, 0u64..1_000_000, 0u64..1_000_000).prop_flat_map(|(level, gold, diamond)| {
            (0..level_up_threshold(level)).prop_map(move |xp| {
                let mut r = record(level, xp);
                r.gold = gold;
                r.diamond = diamond;
                r
            })
        })
    }

    fn valid_delta() -> impl Strategy<Value = ProgressionDelta> {
        (0i64..50_000, 0i64..50_000, 0i64..50_000)
            .prop_map(|(xp, gold, diamond)| ProgressionDelta::new(xp, gold, diamond))
    }

    proptest! {
        #[test]
        fn prop_xp_stays_below_threshold(base in well_formed_record(), delta in valid_delta()) {
            let next = ProgressionEngine::new().apply(&base, delta).unwrap();
            prop_assert!(next.xp < level_up_threshold(next.level));
        }

        #[test]
        fn prop_zero_delta_is_identity(base in well_formed_record()) {
            let engine = ProgressionEngine::new();
            let once = engine.apply(&base, ProgressionDelta::ZERO).unwrap();
            prop_assert_eq!(&once, &base);
            let twice = engine.apply(&once, ProgressionDelta::ZERO).unwrap();
            prop_assert_eq!(twice, base);
        }

        #[test]
        fn prop_stats_never_decrease(base in well_formed_record(), delta in valid_delta()) {
            let next = ProgressionEngine::new().apply(&base, delta).unwrap();
            prop_assert!(next.level >= base.level);
            prop_assert!(next.gold >= base.gold);
            prop_assert!(next.diamond >= base.diamond);
        }

        #[test]
        fn prop_apply_is_deterministic(base in well_formed_record(), delta in valid_delta()) {
            let engine = ProgressionEngine::new();
            prop_assert_eq!(engine.apply(&base, delta).unwrap(), engine.apply(&base, delta).unwrap());
        }
    }
}
