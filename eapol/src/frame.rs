// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;
use byteorder::{BigEndian, ByteOrder};

/// IEEE 802.1X-2010, 11.3.1
pub const PROTOCOL_VERSION: u8 = 1;

/// IEEE 802.11-2016, 12.7.2: descriptor type carried by RSN key frames.
pub const KEY_DESCRIPTOR_IEEE_802DOT11: u8 = 2;

// Header: version, packet type, body length.
const HEADER_LEN: usize = 4;
// Fixed key frame fields between the header and the MIC: descriptor type,
// key information, key length, replay counter, nonce, IV, RSC and the
// reserved key identifier.
const KEY_FRAME_FIXED_LEN: usize = 1 + 2 + 2 + 8 + 32 + 16 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Eap,
    Start,
    Logoff,
    Key,
    AsfAlert,
}

impl PacketType {
    fn from_u8(value: u8) -> Result<Self, Error> {
        // IEEE 802.1X-2010, 11.3.2
        match value {
            0 => Ok(PacketType::Eap),
            1 => Ok(PacketType::Start),
            2 => Ok(PacketType::Logoff),
            3 => Ok(PacketType::Key),
            4 => Ok(PacketType::AsfAlert),
            other => Err(Error::UnknownPacketType(other)),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PacketType::Eap => 0,
            PacketType::Start => 1,
            PacketType::Logoff => 2,
            PacketType::Key => 3,
            PacketType::AsfAlert => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub packet_type: PacketType,
    pub packet_body_len: u16,
}

impl Header {
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < HEADER_LEN {
            return Err(Error::FrameTruncated { got: data.len(), need: HEADER_LEN });
        }
        Ok(Header {
            version: data[0],
            packet_type: PacketType::from_u8(data[1])?,
            packet_body_len: BigEndian::read_u16(&data[2..4]),
        })
    }
}

/// Key information bit field. IEEE 802.11-2016, 12.7.2, Figure 12-33
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInformation(pub u16);

impl KeyInformation {
    fn bit(&self, n: u16) -> bool {
        self.0 & (1 << n) != 0
    }

    fn set_bit(&mut self, n: u16, value: bool) {
        if value {
            self.0 |= 1 << n;
        } else {
            self.0 &= !(1 << n);
        }
    }

    pub fn key_descriptor_version(&self) -> u16 {
        self.0 & 0b111
    }

    pub fn set_key_descriptor_version(&mut self, version: u16) {
        self.0 = (self.0 & !0b111) | (version & 0b111);
    }

    /// true for a pairwise (PTK) key frame, false for a group key frame.
    pub fn key_type_pairwise(&self) -> bool {
        self.bit(3)
    }

    pub fn set_key_type_pairwise(&mut self, value: bool) {
        self.set_bit(3, value)
    }

    pub fn install(&self) -> bool {
        self.bit(6)
    }

    pub fn set_install(&mut self, value: bool) {
        self.set_bit(6, value)
    }

    pub fn key_ack(&self) -> bool {
        self.bit(7)
    }

    pub fn set_key_ack(&mut self, value: bool) {
        self.set_bit(7, value)
    }

    pub fn key_mic(&self) -> bool {
        self.bit(8)
    }

    pub fn set_key_mic(&mut self, value: bool) {
        self.set_bit(8, value)
    }

    pub fn secure(&self) -> bool {
        self.bit(9)
    }

    pub fn set_secure(&mut self, value: bool) {
        self.set_bit(9, value)
    }

    pub fn error(&self) -> bool {
        self.bit(10)
    }

    pub fn request(&self) -> bool {
        self.bit(11)
    }

    pub fn encrypted_key_data(&self) -> bool {
        self.bit(12)
    }

    pub fn set_encrypted_key_data(&mut self, value: bool) {
        self.set_bit(12, value)
    }
}

/// EAPOL key frame. IEEE 802.11-2016, 12.7.2
///
/// The MIC length is not carried in the frame; it is fixed by the negotiated
/// AKM, so parsing requires the MIC size as an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub version: u8,
    pub descriptor_type: u8,
    pub key_info: KeyInformation,
    pub key_len: u16,
    pub key_replay_counter: u64,
    pub key_nonce: [u8; 32],
    pub key_iv: [u8; 16],
    pub key_rsc: u64,
    pub key_mic: Vec<u8>,
    pub key_data: Vec<u8>,
}

impl KeyFrame {
    /// An empty key frame with a zeroed MIC of the given size in bits.
    pub fn new(mic_size: u16) -> Self {
        KeyFrame {
            version: PROTOCOL_VERSION,
            descriptor_type: KEY_DESCRIPTOR_IEEE_802DOT11,
            key_info: KeyInformation::default(),
            key_len: 0,
            key_replay_counter: 0,
            key_nonce: [0; 32],
            key_iv: [0; 16],
            key_rsc: 0,
            key_mic: vec![0; usize::from(mic_size / 8)],
            key_data: vec![],
        }
    }

    pub fn from_bytes(data: &[u8], mic_size: u16) -> Result<Self, Error> {
        let mic_len = usize::from(mic_size / 8);
        let min_len = HEADER_LEN + KEY_FRAME_FIXED_LEN + mic_len + 2;
        if data.len() < min_len {
            return Err(Error::FrameTruncated { got: data.len(), need: min_len });
        }

        let header = Header::from_bytes(data)?;
        let body = &data[HEADER_LEN..];

        let descriptor_type = body[0];
        if descriptor_type != KEY_DESCRIPTOR_IEEE_802DOT11 {
            return Err(Error::UnknownKeyDescriptor(descriptor_type));
        }
        let key_info = KeyInformation(BigEndian::read_u16(&body[1..3]));
        let key_len = BigEndian::read_u16(&body[3..5]);
        let key_replay_counter = BigEndian::read_u64(&body[5..13]);
        let mut key_nonce = [0; 32];
        key_nonce.copy_from_slice(&body[13..45]);
        let mut key_iv = [0; 16];
        key_iv.copy_from_slice(&body[45..61]);
        let key_rsc = BigEndian::read_u64(&body[61..69]);
        // 8 reserved bytes, then the MIC.
        let key_mic = body[KEY_FRAME_FIXED_LEN..KEY_FRAME_FIXED_LEN + mic_len].to_vec();

        let data_len_at = KEY_FRAME_FIXED_LEN + mic_len;
        let key_data_len = usize::from(BigEndian::read_u16(&body[data_len_at..data_len_at + 2]));
        let key_data_at = data_len_at + 2;
        if body.len() < key_data_at + key_data_len {
            return Err(Error::FrameTruncated {
                got: data.len(),
                need: HEADER_LEN + key_data_at + key_data_len,
            });
        }
        let key_data = body[key_data_at..key_data_at + key_data_len].to_vec();

        Ok(KeyFrame {
            version: header.version,
            descriptor_type,
            key_info,
            key_len,
            key_replay_counter,
            key_nonce,
            key_iv,
            key_rsc,
            key_mic,
            key_data,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = KEY_FRAME_FIXED_LEN + self.key_mic.len() + 2 + self.key_data.len();
        let mut buf = Vec::with_capacity(HEADER_LEN + body_len);
        buf.push(self.version);
        buf.push(PacketType::Key.as_u8());
        buf.extend_from_slice(&(body_len as u16).to_be_bytes());
        buf.push(self.descriptor_type);
        buf.extend_from_slice(&self.key_info.0.to_be_bytes());
        buf.extend_from_slice(&self.key_len.to_be_bytes());
        buf.extend_from_slice(&self.key_replay_counter.to_be_bytes());
        buf.extend_from_slice(&self.key_nonce);
        buf.extend_from_slice(&self.key_iv);
        buf.extend_from_slice(&self.key_rsc.to_be_bytes());
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&self.key_mic);
        buf.extend_from_slice(&(self.key_data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.key_data);
        buf
    }
}
