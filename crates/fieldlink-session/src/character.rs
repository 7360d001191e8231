//! Character state and its wire encodings.

use fieldlink_packet::PacketWriter;

/// A cash (cosmetic) equip worn by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashEquip {
    /// Unique serial of the owned item.
    pub serial: i64,
    /// Item template the serial instantiates.
    pub template_id: i32,
}

/// A couple-ring pairing owned by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoupleRecord {
    /// Serial of this character's ring.
    pub serial: i64,
    /// Serial of the partner's ring.
    pub pair_serial: i64,
}

/// A friendship-ring pairing owned by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendRecord {
    /// Serial of this character's ring.
    pub serial: i64,
    /// Serial of the friend's ring.
    pub pair_serial: i64,
}

/// Persistent character state, owned by the session while the user is
/// online. Persistence itself happens elsewhere; this is the in-memory
/// model the packet encoders read from.
#[derive(Debug, Clone)]
pub struct Character {
    /// Database identity.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// 0 male, 1 female.
    pub gender: u8,
    /// Skin tone template.
    pub skin: u8,
    /// Face template.
    pub face: i32,
    /// Hair template.
    pub hair: i32,
    /// Level.
    pub level: u8,
    /// Job template.
    pub job: i16,
    /// Base strength.
    pub strength: i16,
    /// Base dexterity.
    pub dexterity: i16,
    /// Base intelligence.
    pub intelligence: i16,
    /// Base luck.
    pub luck: i16,
    /// Current health.
    pub hp: i32,
    /// Health ceiling before buffs.
    pub max_hp: i32,
    /// Current mana.
    pub mp: i32,
    /// Mana ceiling before buffs.
    pub max_mp: i32,
    /// Carried money.
    pub money: i32,
    /// Field the character saved in.
    pub field_id: i32,
    /// Spawn portal within that field.
    pub field_portal: u8,
    /// Worn cosmetic equips.
    pub equipped_cash: Vec<CashEquip>,
    /// Couple-ring records.
    pub couple_records: Vec<CoupleRecord>,
    /// Friendship-ring records.
    pub friend_records: Vec<FriendRecord>,
}

impl Character {
    /// Encodes the full character payload (the own-client data block).
    ///
    /// Layout: i32 id, string name, u8 gender, u8 skin, i32 face,
    /// i32 hair, u8 level, i16 job, 4× i16 base stats, i32 hp,
    /// i32 max hp, i32 mp, i32 max mp, i32 money, i32 field id,
    /// u8 portal.
    pub fn encode_data(&self, w: &mut PacketWriter) {
        w.write_i32(self.id)
            .write_string(&self.name)
            .write_u8(self.gender)
            .write_u8(self.skin)
            .write_i32(self.face)
            .write_i32(self.hair)
            .write_u8(self.level)
            .write_i16(self.job)
            .write_i16(self.strength)
            .write_i16(self.dexterity)
            .write_i16(self.intelligence)
            .write_i16(self.luck)
            .write_i32(self.hp)
            .write_i32(self.max_hp)
            .write_i32(self.mp)
            .write_i32(self.max_mp)
            .write_i32(self.money)
            .write_i32(self.field_id)
            .write_u8(self.field_portal);
    }

    /// Encodes the appearance block other clients render from.
    ///
    /// Layout: u8 gender, u8 skin, i32 face, i32 hair, u8 equip count,
    /// i32 template per worn cash equip.
    pub fn encode_look(&self, w: &mut PacketWriter) {
        w.write_u8(self.gender)
            .write_u8(self.skin)
            .write_i32(self.face)
            .write_i32(self.hair)
            .write_u8(self.equipped_cash.len() as u8);
        for equip in &self.equipped_cash {
            w.write_i32(equip.template_id);
        }
    }

    /// Encodes the ring-record block shown on remote-user entry.
    ///
    /// A record only shows when the ring that backs it is actually worn.
    /// Layout per section: bool present, then i64 serial, i64 pair
    /// serial, i32 worn template. Sections: couple, friend, then a
    /// constant-false marriage marker.
    pub fn encode_record(&self, w: &mut PacketWriter) {
        let worn_template = |serial: i64| {
            self.equipped_cash
                .iter()
                .find(|equip| equip.serial == serial)
                .map(|equip| equip.template_id)
        };

        let couple = self
            .couple_records
            .iter()
            .find_map(|r| worn_template(r.serial).map(|t| (*r, t)));
        match couple {
            Some((record, template)) => {
                w.write_bool(true)
                    .write_i64(record.serial)
                    .write_i64(record.pair_serial)
                    .write_i32(template);
            }
            None => {
                w.write_bool(false);
            }
        }

        let friend = self
            .friend_records
            .iter()
            .find_map(|r| worn_template(r.serial).map(|t| (*r, t)));
        match friend {
            Some((record, template)) => {
                w.write_bool(true)
                    .write_i64(record.serial)
                    .write_i64(record.pair_serial)
                    .write_i32(template);
            }
            None => {
                w.write_bool(false);
            }
        }

        w.write_bool(false);
    }
}

#[cfg(test)]
impl Character {
    pub(crate) fn sample() -> Self {
        Self {
            id: 1001,
            name: "Test".into(),
            gender: 0,
            skin: 0,
            face: 20_000,
            hair: 30_000,
            level: 50,
            job: 100,
            strength: 12,
            dexterity: 8,
            intelligence: 5,
            luck: 4,
            hp: 250,
            max_hp: 300,
            mp: 100,
            max_mp: 120,
            money: 5_000,
            field_id: 104_000_000,
            field_portal: 0,
            equipped_cash: Vec::new(),
            couple_records: Vec::new(),
            friend_records: Vec::new(),
        }
    }
}
