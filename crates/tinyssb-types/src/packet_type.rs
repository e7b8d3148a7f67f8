use serde::{Deserialize, Serialize};

/// The `typ` byte of a wire packet, naming the shape of its 48-byte payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    /// 48 bytes of opaque application payload.
    Plain48 = 0x00,
    /// VarInt length ‖ head of payload ‖ hash pointer into a blob sidechain.
    Chain20 = 0x01,
    /// Genesis block (seq=1) declaring this feed as a child of another.
    IsChild = 0x02,
    /// Genesis block (seq=1) declaring this feed as a continuation of another.
    IsContn = 0x03,
    /// Declares a child feed from within the parent's log.
    MkChild = 0x04,
    /// Declares the successor feed that continues this one (or ends it).
    Contdas = 0x05,
    /// Acknowledges having observed some other entry.
    Acknldg = 0x06,
    /// Sets an opaque value.
    Set = 0x07,
    /// Marks an opaque value deleted.
    Delete = 0x08,
}

/// Error returned when a byte does not name a known [`PacketType`].
#[derive(Debug, thiserror::Error)]
#[error("unknown packet type byte: 0x{0:02x}")]
pub struct UnknownPacketType(pub u8);

impl PacketType {
    /// Decode a packet type from its wire byte.
    pub fn from_byte(b: u8) -> Result<Self, UnknownPacketType> {
        Ok(match b {
            0x00 => PacketType::Plain48,
            0x01 => PacketType::Chain20,
            0x02 => PacketType::IsChild,
            0x03 => PacketType::IsContn,
            0x04 => PacketType::MkChild,
            0x05 => PacketType::Contdas,
            0x06 => PacketType::Acknldg,
            0x07 => PacketType::Set,
            0x08 => PacketType::Delete,
            other => return Err(UnknownPacketType(other)),
        })
    }

    /// Encode to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether this type's genesis-only placement rule applies (`ischild`/`iscontn`
    /// are only valid at seq=1).
    pub fn is_genesis_only(self) -> bool {
        matches!(self, PacketType::IsChild | PacketType::IsContn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrips_all_known_bytes() {
        for b in 0x00u8..=0x08 {
            let t = PacketType::from_byte(b).expect("known type");
            assert_eq!(t.to_byte(), b);
        }
    }

    #[test]
    fn test_rejects_unknown_byte() {
        assert!(PacketType::from_byte(0x09).is_err());
        assert!(PacketType::from_byte(0xff).is_err());
    }

    #[test]
    fn test_genesis_only_types() {
        assert!(PacketType::IsChild.is_genesis_only());
        assert!(PacketType::IsContn.is_genesis_only());
        assert!(!PacketType::Plain48.is_genesis_only());
        assert!(!PacketType::MkChild.is_genesis_only());
    }
}
