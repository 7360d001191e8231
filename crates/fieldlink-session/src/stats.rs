//! User stat models: base, forced, and temporary (timed) stats.
//!
//! Temporary stats are the buff layer: each kind holds a value and an
//! optional expiry instant. Expiry is compared at whole-second
//! granularity — sub-second precision is never promised to the client,
//! and the update tick runs on second boundaries anyway.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fieldlink_packet::PacketWriter;

use crate::Character;

/// One kind of temporary stat. The discriminant is the kind's bit
/// position in the wire mask, so declaration order is wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum TemporaryStatKind {
    /// Weapon attack bonus.
    Attack = 0,
    /// Physical defense bonus.
    Defense = 1,
    /// Magic attack bonus.
    MagicAttack = 2,
    /// Magic defense bonus.
    MagicDefense = 3,
    /// Accuracy bonus.
    Accuracy = 4,
    /// Evasion bonus.
    Evasion = 5,
    /// Movement speed bonus.
    Speed = 6,
    /// Jump height bonus.
    Jump = 7,
}

impl TemporaryStatKind {
    /// Every kind, in wire (mask bit) order.
    pub const ALL: [TemporaryStatKind; 8] = [
        TemporaryStatKind::Attack,
        TemporaryStatKind::Defense,
        TemporaryStatKind::MagicAttack,
        TemporaryStatKind::MagicDefense,
        TemporaryStatKind::Accuracy,
        TemporaryStatKind::Evasion,
        TemporaryStatKind::Speed,
        TemporaryStatKind::Jump,
    ];

    /// This kind's bit in a stat mask.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// One active temporary stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporaryStatEntry {
    /// Magnitude of the effect.
    pub value: i16,
    /// When the effect lapses; `None` is indefinite.
    pub expire_at: Option<SystemTime>,
}

/// The set of currently active temporary stats.
///
/// Backed by an ordered map so encoding and mask iteration follow kind
/// order deterministically.
#[derive(Debug, Default)]
pub struct TemporaryStat {
    entries: BTreeMap<TemporaryStatKind, TemporaryStatEntry>,
}

impl TemporaryStat {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces an entry.
    pub fn set(
        &mut self,
        kind: TemporaryStatKind,
        value: i16,
        expire_at: Option<SystemTime>,
    ) {
        self.entries
            .insert(kind, TemporaryStatEntry { value, expire_at });
    }

    /// Removes an entry. Returns whether it was present.
    pub fn reset(&mut self, kind: TemporaryStatKind) -> bool {
        self.entries.remove(&kind).is_some()
    }

    /// The active entry of a kind, if any.
    pub fn get(&self, kind: TemporaryStatKind) -> Option<TemporaryStatEntry> {
        self.entries.get(&kind).copied()
    }

    /// Bitmask of all active kinds.
    pub fn mask(&self) -> u32 {
        self.entries.keys().map(|k| k.bit()).sum()
    }

    /// Kinds whose expiry has lapsed as of `now`, at whole-second
    /// granularity: an entry expires on the first update whose clock
    /// second is at or past the entry's expiry second.
    pub fn expired_kinds(&self, now: SystemTime) -> Vec<TemporaryStatKind> {
        let now_secs = unix_secs(now);
        self.entries
            .iter()
            .filter(|(_, entry)| {
                entry
                    .expire_at
                    .is_some_and(|at| unix_secs(at) <= now_secs)
            })
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Encodes the active set for a remote viewer: a u32 mask, then one
    /// i16 value per active kind in mask-bit order.
    pub fn encode_for_remote(&self, w: &mut PacketWriter) {
        w.write_i32(self.mask() as i32);
        for kind in TemporaryStatKind::ALL {
            if let Some(entry) = self.entries.get(&kind) {
                w.write_i16(entry.value);
            }
        }
    }

    /// `true` when no temporary stat is active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Stat values pinned by game logic regardless of the computed value.
#[derive(Debug, Default)]
pub struct ForcedStat {
    /// Pinned movement speed.
    pub speed: Option<i16>,
    /// Pinned jump height.
    pub jump: Option<i16>,
}

impl ForcedStat {
    /// `true` when nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.speed.is_none() && self.jump.is_none()
    }
}

/// The derived stat block: base character values with temporary and
/// forced layers folded in. Recomputed by [`UserStats::validate`]
/// whenever any input layer changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BasicStat {
    /// Strength.
    pub strength: i16,
    /// Dexterity.
    pub dexterity: i16,
    /// Intelligence.
    pub intelligence: i16,
    /// Luck.
    pub luck: i16,
    /// Health ceiling.
    pub max_hp: i32,
    /// Mana ceiling.
    pub max_mp: i32,
    /// Effective movement speed (base 100).
    pub speed: i16,
    /// Effective jump height (base 100).
    pub jump: i16,
}

const BASE_SPEED: i16 = 100;
const BASE_JUMP: i16 = 100;

/// All stat layers of one user, guarded together by the owning user's
/// stat lock so derived values never go stale between layers.
#[derive(Debug, Default)]
pub struct UserStats {
    /// Derived values, valid only after [`validate`](Self::validate).
    pub basic: BasicStat,
    /// Pinned overrides.
    pub forced: ForcedStat,
    /// Timed buff layer.
    pub temporary: TemporaryStat,
}

impl UserStats {
    /// Recomputes the derived block from the character's base values and
    /// the temporary/forced layers, then clamps the character's hp and
    /// mp into the new ceilings. Forced values win over everything.
    pub fn validate(&mut self, character: &mut Character) {
        let temp = |kind| {
            self.temporary
                .get(kind)
                .map(|entry| entry.value)
                .unwrap_or(0)
        };

        self.basic = BasicStat {
            strength: character.strength,
            dexterity: character.dexterity,
            intelligence: character.intelligence,
            luck: character.luck,
            max_hp: character.max_hp,
            max_mp: character.max_mp,
            speed: self
                .forced
                .speed
                .unwrap_or(BASE_SPEED.saturating_add(temp(TemporaryStatKind::Speed))),
            jump: self
                .forced
                .jump
                .unwrap_or(BASE_JUMP.saturating_add(temp(TemporaryStatKind::Jump))),
        };

        character.hp = character.hp.clamp(0, self.basic.max_hp);
        character.mp = character.mp.clamp(0, self.basic.max_mp);
    }
}

/// Records which kinds a temporary-stat mutation touched, so the owning
/// user can notify the client with one batched packet per direction.
pub struct TemporaryStatMutation<'a> {
    stats: &'a mut TemporaryStat,
    set_mask: u32,
    reset_mask: u32,
}

impl<'a> TemporaryStatMutation<'a> {
    pub(crate) fn new(stats: &'a mut TemporaryStat) -> Self {
        Self {
            stats,
            set_mask: 0,
            reset_mask: 0,
        }
    }

    /// Installs or replaces an entry and marks it for the set batch.
    pub fn set(
        &mut self,
        kind: TemporaryStatKind,
        value: i16,
        expire_at: Option<SystemTime>,
    ) {
        self.stats.set(kind, value, expire_at);
        self.set_mask |= kind.bit();
        self.reset_mask &= !kind.bit();
    }

    /// Removes an entry and marks it for the reset batch. Resetting an
    /// absent kind is a no-op and joins neither batch.
    pub fn reset(&mut self, kind: TemporaryStatKind) {
        if self.stats.reset(kind) {
            self.reset_mask |= kind.bit();
            self.set_mask &= !kind.bit();
        }
    }

    /// The stats being mutated.
    pub fn stats(&self) -> &TemporaryStat {
        self.stats
    }

    pub(crate) fn masks(&self) -> (u32, u32) {
        (self.set_mask, self.reset_mask)
    }
}
