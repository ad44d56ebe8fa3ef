//! Wire protocol: packet type ids, fixed field layouts, and the bit-packed
//! batched position records.
//!
//! Everything here is little-endian and byte-exact; the server on the other
//! end predates this crate by decades. Positions travel as pixels (16 per
//! tile) and velocities as pixels per 10 seconds; the simulation converts at
//! the boundary (divide by 16, then by 10, for tiles per second).

use thiserror::Error;

use crate::clock::Tick;
use crate::game::player::PlayerId;
use crate::net::codec::{PacketReader, PacketWriter};

/// Server-to-client packet types, keyed by the first byte of the datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolS2C {
    PlayerId = 0x01,
    JoinGame = 0x02,
    PlayerEntering = 0x03,
    PlayerLeaving = 0x04,
    LargePosition = 0x05,
    PlayerDeath = 0x06,
    FrequencyChange = 0x0D,
    CreateTurret = 0x0E,
    DestroyTurret = 0x15,
    DropFlag = 0x16,
    TeamAndShipChange = 0x1D,
    SmallPosition = 0x28,
    SetCoordinates = 0x30,
    BatchedSmallPosition = 0x38,
    BatchedLargePosition = 0x39,
}

/// Client-to-server packet type bytes.
pub mod c2s {
    pub const POSITION: u8 = 0x03;
    pub const ATTACH_REQUEST: u8 = 0x10;
    pub const ATTACH_DROP: u8 = 0x14;
    pub const SET_SHIP: u8 = 0x18;
    pub const DAMAGE: u8 = 0x32;
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet too short: {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
    #[error("checksum mismatch: got {got:#04x}, computed {computed:#04x}")]
    Checksum { got: u8, computed: u8 },
}

/// Single-byte checksum over the 22-byte position core: XOR of every byte
/// except the checksum slot itself at offset 10.
pub fn position_checksum(core: &[u8]) -> u8 {
    let mut checksum = 0u8;
    for (i, &byte) in core.iter().take(OutboundPosition::CORE_SIZE).enumerate() {
        if i != OutboundPosition::CHECKSUM_OFFSET {
            checksum ^= byte;
        }
    }
    checksum
}

/// Packed item/ammo record carried in the optional position extra block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub shields: bool,
    pub super_power: bool,
    pub bursts: u8,
    pub repels: u8,
    pub thors: u8,
    pub bricks: u8,
    pub decoys: u8,
    pub rockets: u8,
    pub portals: u8,
}

impl ItemCounts {
    /// Layout: shields:1, super:1, then seven 4-bit counts, 2 bits padding.
    pub fn pack(&self) -> u32 {
        let mut packed = 0u32;
        packed |= self.shields as u32;
        packed |= (self.super_power as u32) << 1;
        packed |= (self.bursts as u32 & 0xF) << 2;
        packed |= (self.repels as u32 & 0xF) << 6;
        packed |= (self.thors as u32 & 0xF) << 10;
        packed |= (self.bricks as u32 & 0xF) << 14;
        packed |= (self.decoys as u32 & 0xF) << 18;
        packed |= (self.rockets as u32 & 0xF) << 22;
        packed |= (self.portals as u32 & 0xF) << 26;
        packed
    }

    pub fn unpack(packed: u32) -> Self {
        Self {
            shields: packed & 1 != 0,
            super_power: packed & 2 != 0,
            bursts: ((packed >> 2) & 0xF) as u8,
            repels: ((packed >> 6) & 0xF) as u8,
            thors: ((packed >> 10) & 0xF) as u8,
            bricks: ((packed >> 14) & 0xF) as u8,
            decoys: ((packed >> 18) & 0xF) as u8,
            rockets: ((packed >> 22) & 0xF) as u8,
            portals: ((packed >> 26) & 0xF) as u8,
        }
    }
}

/// Optional trailing block of the outgoing position packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionExtra {
    pub energy: u16,
    /// Round-trip latency divided by ten.
    pub ping: u16,
    /// Flag timer divided by one hundred.
    pub flag_timer: u16,
    pub items: ItemCounts,
}

/// The C2S 0x03 position packet. Field order on the wire is historical and
/// non-obvious; `encode` is the single source of truth for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundPosition {
    pub direction: u8,
    pub timestamp: Tick,
    /// Raw wire units: pixels per 10 seconds.
    pub vel_x: u16,
    pub vel_y: u16,
    /// Raw wire units: pixels.
    pub x: u16,
    pub y: u16,
    pub togglables: u8,
    pub bounty: u16,
    pub energy: u16,
    pub weapon: u16,
    pub extra: Option<PositionExtra>,
}

impl OutboundPosition {
    pub const CORE_SIZE: usize = 22;
    pub const CHECKSUM_OFFSET: usize = 10;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::new();

        w.write_u8(c2s::POSITION)
            .write_u8(self.direction)
            .write_u32(self.timestamp)
            .write_u16(self.vel_x)
            .write_u16(self.y)
            .write_u8(0) // checksum placeholder
            .write_u8(self.togglables)
            .write_u16(self.x)
            .write_u16(self.vel_y)
            .write_u16(self.bounty)
            .write_u16(self.energy)
            .write_u16(self.weapon);

        let checksum = position_checksum(w.as_slice());
        w.data_mut()[Self::CHECKSUM_OFFSET] = checksum;

        if let Some(extra) = &self.extra {
            w.write_u16(extra.energy)
                .write_u16(extra.ping)
                .write_u16(extra.flag_timer)
                .write_u32(extra.items.pack());
        }

        w.into_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::CORE_SIZE {
            return Err(ProtocolError::Truncated {
                got: data.len(),
                need: Self::CORE_SIZE,
            });
        }

        let computed = position_checksum(data);
        let got = data[Self::CHECKSUM_OFFSET];
        if computed != got {
            return Err(ProtocolError::Checksum { got, computed });
        }

        let mut r = PacketReader::new(data);
        let _ = r.read_u8(); // type
        let direction = r.read_u8().unwrap_or(0);
        let timestamp = r.read_u32().unwrap_or(0);
        let vel_x = r.read_u16().unwrap_or(0);
        let y = r.read_u16().unwrap_or(0);
        let _ = r.read_u8(); // checksum
        let togglables = r.read_u8().unwrap_or(0);
        let x = r.read_u16().unwrap_or(0);
        let vel_y = r.read_u16().unwrap_or(0);
        let bounty = r.read_u16().unwrap_or(0);
        let energy = r.read_u16().unwrap_or(0);
        let weapon = r.read_u16().unwrap_or(0);

        let extra = if r.remaining() >= 10 {
            Some(PositionExtra {
                energy: r.read_u16().unwrap_or(0),
                ping: r.read_u16().unwrap_or(0),
                flag_timer: r.read_u16().unwrap_or(0),
                items: ItemCounts::unpack(r.read_u32().unwrap_or(0)),
            })
        } else {
            None
        };

        Ok(Self {
            direction,
            timestamp,
            vel_x,
            vel_y,
            x,
            y,
            togglables,
            bounty,
            energy,
            weapon,
            extra,
        })
    }
}

/// Motion fields shared by both batched record flavors: 9 bytes packing
/// direction, a 10-bit timestamp, 14-bit coordinates, and split velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchedMotion {
    /// Discrete facing, 0..40, 6 bits on the wire.
    pub direction: u8,
    /// Low 10 bits of the sender tick.
    pub timestamp: u16,
    /// Raw pixels, 14 bits.
    pub x: u16,
    pub y: u16,
    /// Raw pixels per 10 seconds.
    pub vel_x: i32,
    pub vel_y: i32,
}

impl BatchedMotion {
    pub const SIZE: usize = 9;

    pub fn decode(r: &mut PacketReader) -> Option<Self> {
        let packed = r.read_u16()?;
        let direction = (packed >> 10) as u8;
        let timestamp = packed & 0x3FF;

        let packed_pos = r.read_u32()?;
        let x = (packed_pos & 0x3FFF) as u16;
        let y = ((packed_pos >> 14) & 0x3FFF) as u16;

        let packed_velocity = r.read_u16()?;
        // vel_y is the low 14 bits, two's complement.
        let vel_y = ((packed_velocity as i32) << 18) >> 18;

        let multiplier = r.read_i8()? as i32;

        // vel_x is reassembled from three places: its low nibble rides the top
        // of the position word, two middle bits ride the top of the velocity
        // word, and the remainder is the signed multiplier in steps of 64.
        let vel_x =
            (((packed_velocity >> 14) as i32) + multiplier * 4) * 16 + (packed_pos >> 28) as i32;

        Some(Self {
            direction,
            timestamp,
            x,
            y,
            vel_x,
            vel_y,
        })
    }

    pub fn encode(&self, w: &mut PacketWriter) {
        debug_assert!(self.direction < 64);
        debug_assert!(self.timestamp < 1024);
        debug_assert!(self.x < 0x4000 && self.y < 0x4000);
        debug_assert!((-0x2000..0x2000).contains(&self.vel_y));

        let low_nibble = (self.vel_x & 0xF) as u32;
        let quotient = self.vel_x >> 4;
        let mid = quotient.rem_euclid(4);
        let multiplier = (quotient - mid) / 4;
        debug_assert!((-128..=127).contains(&multiplier));

        w.write_u16((self.timestamp & 0x3FF) | ((self.direction as u16) << 10));
        w.write_u32((self.x as u32) | ((self.y as u32) << 14) | (low_nibble << 28));
        w.write_u16(((self.vel_y as u16) & 0x3FFF) | ((mid as u16) << 14));
        w.write_i8(multiplier as i8);
    }
}

/// One record of the batched-large position packet: 11 bytes, carrying a
/// 10-bit player id and the low 6 togglable bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchedLargeRecord {
    pub pid: PlayerId,
    pub togglables: u8,
    pub motion: BatchedMotion,
}

impl BatchedLargeRecord {
    pub const SIZE: usize = 2 + BatchedMotion::SIZE;

    pub fn decode(r: &mut PacketReader) -> Option<Self> {
        let pid_togglables = r.read_u16()?;
        Some(Self {
            pid: pid_togglables & 0x3FF,
            togglables: (pid_togglables >> 10) as u8,
            motion: BatchedMotion::decode(r)?,
        })
    }

    pub fn encode(&self, w: &mut PacketWriter) {
        debug_assert!(self.pid < 0x400);
        debug_assert!(self.togglables < 64);
        w.write_u16((self.pid & 0x3FF) | ((self.togglables as u16) << 10));
        self.motion.encode(w);
    }
}

/// One record of the batched-small position packet: 10 bytes, 8-bit player id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchedSmallRecord {
    pub pid: u8,
    pub motion: BatchedMotion,
}

impl BatchedSmallRecord {
    pub const SIZE: usize = 1 + BatchedMotion::SIZE;

    pub fn decode(r: &mut PacketReader) -> Option<Self> {
        Some(Self {
            pid: r.read_u8()?,
            motion: BatchedMotion::decode(r)?,
        })
    }

    pub fn encode(&self, w: &mut PacketWriter) {
        w.write_u8(self.pid);
        self.motion.encode(w);
    }
}

impl ProtocolS2C {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::PlayerId,
            0x02 => Self::JoinGame,
            0x03 => Self::PlayerEntering,
            0x04 => Self::PlayerLeaving,
            0x05 => Self::LargePosition,
            0x06 => Self::PlayerDeath,
            0x0D => Self::FrequencyChange,
            0x0E => Self::CreateTurret,
            0x15 => Self::DestroyTurret,
            0x16 => Self::DropFlag,
            0x1D => Self::TeamAndShipChange,
            0x28 => Self::SmallPosition,
            0x30 => Self::SetCoordinates,
            0x38 => Self::BatchedSmallPosition,
            0x39 => Self::BatchedLargePosition,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_position_round_trip() {
        let packet = OutboundPosition {
            direction: 17,
            timestamp: 123_456,
            vel_x: 160,
            vel_y: 65296, // -240 raw as u16
            x: 8000,
            y: 8008,
            togglables: 0b0001_0100,
            bounty: 52,
            energy: 1400,
            weapon: 0,
            extra: None,
        };

        let data = packet.encode();
        assert_eq!(data.len(), OutboundPosition::CORE_SIZE);

        let decoded = OutboundPosition::decode(&data).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_outbound_position_with_extra() {
        let packet = OutboundPosition {
            direction: 5,
            timestamp: 999,
            x: 1600,
            y: 1616,
            bounty: 10,
            energy: 850,
            extra: Some(PositionExtra {
                energy: 850,
                ping: 4,
                flag_timer: 1,
                items: ItemCounts {
                    bursts: 2,
                    repels: 3,
                    rockets: 1,
                    ..Default::default()
                },
            }),
            ..Default::default()
        };

        let data = packet.encode();
        assert_eq!(data.len(), OutboundPosition::CORE_SIZE + 10);

        let decoded = OutboundPosition::decode(&data).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let packet = OutboundPosition {
            x: 100,
            y: 200,
            ..Default::default()
        };
        let mut data = packet.encode();
        data[4] ^= 0xFF;
        assert!(matches!(
            OutboundPosition::decode(&data),
            Err(ProtocolError::Checksum { .. })
        ));
    }

    #[test]
    fn test_checksum_excludes_own_slot() {
        let packet = OutboundPosition::default();
        let data = packet.encode();
        // Recomputing over the finished buffer must reproduce the stored byte.
        assert_eq!(
            position_checksum(&data),
            data[OutboundPosition::CHECKSUM_OFFSET]
        );
    }

    #[test]
    fn test_item_counts_round_trip() {
        let items = ItemCounts {
            shields: true,
            super_power: false,
            bursts: 4,
            repels: 15,
            thors: 1,
            bricks: 0,
            decoys: 7,
            rockets: 2,
            portals: 9,
        };
        assert_eq!(ItemCounts::unpack(items.pack()), items);
    }

    #[test]
    fn test_batched_motion_round_trip() {
        let cases = [
            (0i32, 0i32),
            (320, -240),
            (-320, 240),
            (8000, 8191),
            (-8000, -8192),
            (15, -1),
        ];

        for (vel_x, vel_y) in cases {
            let motion = BatchedMotion {
                direction: 20,
                timestamp: 123,
                x: 6400,
                y: 4800,
                vel_x,
                vel_y,
            };

            let mut w = PacketWriter::new();
            motion.encode(&mut w);
            let data = w.into_vec();
            assert_eq!(data.len(), BatchedMotion::SIZE);

            let mut r = PacketReader::new(&data);
            let decoded = BatchedMotion::decode(&mut r).unwrap();
            assert_eq!(decoded, motion, "velocity case ({vel_x}, {vel_y})");
        }
    }

    #[test]
    fn test_batched_large_record_round_trip() {
        let record = BatchedLargeRecord {
            pid: 0x105,
            togglables: 0b010101,
            motion: BatchedMotion {
                direction: 20,
                timestamp: 123,
                x: 6400, // 400 tiles
                y: 4800, // 300 tiles
                vel_x: 320,
                vel_y: -240,
            },
        };

        let mut w = PacketWriter::new();
        record.encode(&mut w);
        let data = w.into_vec();
        assert_eq!(data.len(), BatchedLargeRecord::SIZE);

        let mut r = PacketReader::new(&data);
        assert_eq!(BatchedLargeRecord::decode(&mut r).unwrap(), record);
    }

    #[test]
    fn test_batched_small_record_round_trip() {
        let record = BatchedSmallRecord {
            pid: 42,
            motion: BatchedMotion {
                direction: 39,
                timestamp: 1023,
                x: 1,
                y: 0x3FFF,
                vel_x: -64,
                vel_y: 32,
            },
        };

        let mut w = PacketWriter::new();
        record.encode(&mut w);
        let data = w.into_vec();
        assert_eq!(data.len(), BatchedSmallRecord::SIZE);

        let mut r = PacketReader::new(&data);
        assert_eq!(BatchedSmallRecord::decode(&mut r).unwrap(), record);
    }

    #[test]
    fn test_batched_decode_truncated() {
        let data = [0u8; 5];
        let mut r = PacketReader::new(&data);
        assert!(BatchedLargeRecord::decode(&mut r).is_none());
    }

    #[test]
    fn test_s2c_round_trip() {
        for byte in 0u8..=0xFF {
            if let Some(kind) = ProtocolS2C::from_u8(byte) {
                assert_eq!(kind as u8, byte);
            }
        }
        assert_eq!(ProtocolS2C::from_u8(0x28), Some(ProtocolS2C::SmallPosition));
        assert_eq!(ProtocolS2C::from_u8(0x7F), None);
    }
}
