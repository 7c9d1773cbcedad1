// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::akm::{self, Akm, AKM_PSK};
use super::cipher::{self, Cipher, CIPHER_CCMP_128, CIPHER_TKIP};
use super::suite_selector::Factory;
use super::Pmkid;
use crate::organization::Oui;

use nom::bytes::complete::take;
use nom::combinator::eof;
use nom::multi::count;
use nom::number::complete::le_u16;
use nom::{Finish, IResult, Offset, Parser};
use thiserror::Error;

// IEEE 802.11-2016, 9.4.2.25.1
pub const ID: u8 = 48;
pub const VERSION: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("no group data cipher suite")]
    NoGroupDataCipherSuite,
    #[error("unsupported group data cipher suite")]
    UnsupportedGroupDataCipher,
    #[error("no supported pairwise cipher suite")]
    NoSupportedPairwiseCipher,
    #[error("no supported AKM suite")]
    NoSupportedAkm,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed RSN element at offset {offset}")]
pub struct ParseError {
    pub offset: usize,
}

/// Parsed RSN element body. The element-ID/length prefix is not part of this
/// representation; `from_bytes` and `to_bytes` operate on the element payload.
///
/// IEEE 802.11-2016, 9.4.2.25.1
#[derive(Debug, PartialEq, Clone)]
pub struct Rsne {
    pub version: u16,
    pub group_data_cipher_suite: Option<Cipher>,
    pub pairwise_cipher_suites: Vec<Cipher>,
    pub akm_suites: Vec<Akm>,
    pub rsn_capabilities: Option<u16>,
    pub pmkids: Vec<Pmkid>,
}

impl Default for Rsne {
    fn default() -> Self {
        Rsne {
            version: VERSION,
            group_data_cipher_suite: None,
            pairwise_cipher_suites: vec![],
            akm_suites: vec![],
            rsn_capabilities: None,
            pmkids: vec![],
        }
    }
}

impl Rsne {
    /// Whether the advertised suites can be negotiated by this station:
    /// CCMP-128 for the pairwise cipher, PSK authentication, and a group
    /// data cipher of either CCMP-128 or TKIP.
    pub fn is_compatible(&self) -> bool {
        let group_supported = self
            .group_data_cipher_suite
            .as_ref()
            .map_or(false, Cipher::usable_as_group_cipher);
        let pairwise_supported =
            self.pairwise_cipher_suites.iter().any(|c| c.is(cipher::CCMP_128));
        let akm_supported = self.akm_suites.iter().any(|a| a.is(akm::PSK));
        group_supported && pairwise_supported && akm_supported
    }

    /// Constructs the RSNE announced in the association request from a
    /// beacon's RSNE:
    /// Group data cipher: CCMP-128, or TKIP if the beacon group-addresses
    /// with anything else
    /// Pairwise cipher: CCMP-128
    /// AKM: PSK
    pub fn derive_assoc_rsne(&self) -> Result<Rsne, Error> {
        let group = self.group_data_cipher_suite.as_ref().ok_or(Error::NoGroupDataCipherSuite)?;
        if !group.usable_as_group_cipher() {
            return Err(Error::UnsupportedGroupDataCipher);
        }
        if !self.pairwise_cipher_suites.iter().any(|c| c.is(cipher::CCMP_128)) {
            return Err(Error::NoSupportedPairwiseCipher);
        }
        if !self.akm_suites.iter().any(|a| a.is(akm::PSK)) {
            return Err(Error::NoSupportedAkm);
        }

        let group_data =
            if group.is(cipher::CCMP_128) { CIPHER_CCMP_128 } else { CIPHER_TKIP };

        Ok(Rsne {
            group_data_cipher_suite: Some(group_data),
            pairwise_cipher_suites: vec![CIPHER_CCMP_128],
            akm_suites: vec![AKM_PSK],
            rsn_capabilities: Some(0),
            ..Default::default()
        })
    }

    /// Length of the serialized element payload. Fields after the last
    /// populated one are omitted from the wire format.
    pub fn len(&self) -> usize {
        let mut length: usize = 2;
        match self.group_data_cipher_suite.as_ref() {
            None => return length,
            Some(_) => length += 4,
        };

        if self.pairwise_cipher_suites.is_empty() {
            return length;
        }
        length += 2 + 4 * self.pairwise_cipher_suites.len();

        if self.akm_suites.is_empty() {
            return length;
        }
        length += 2 + 4 * self.akm_suites.len();

        match self.rsn_capabilities.as_ref() {
            None => return length,
            Some(_) => length += 2,
        };

        if self.pmkids.is_empty() {
            return length;
        }
        length + 2 + 16 * self.pmkids.len()
    }

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.len());
        buf.extend_from_slice(&self.version.to_le_bytes());

        match self.group_data_cipher_suite.as_ref() {
            None => return,
            Some(cipher) => {
                buf.extend_from_slice(&cipher.oui[..]);
                buf.push(cipher.suite_type);
            }
        };

        if self.pairwise_cipher_suites.is_empty() {
            return;
        }
        buf.extend_from_slice(&(self.pairwise_cipher_suites.len() as u16).to_le_bytes());
        for cipher in &self.pairwise_cipher_suites {
            buf.extend_from_slice(&cipher.oui[..]);
            buf.push(cipher.suite_type);
        }

        if self.akm_suites.is_empty() {
            return;
        }
        buf.extend_from_slice(&(self.akm_suites.len() as u16).to_le_bytes());
        for akm in &self.akm_suites {
            buf.extend_from_slice(&akm.oui[..]);
            buf.push(akm.suite_type);
        }

        match self.rsn_capabilities.as_ref() {
            None => return,
            Some(caps) => buf.extend_from_slice(&caps.to_le_bytes()),
        };

        if self.pmkids.is_empty() {
            return;
        }
        buf.extend_from_slice(&(self.pmkids.len() as u16).to_le_bytes());
        for pmkid in &self.pmkids {
            buf.extend_from_slice(&pmkid[..]);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        self.write_into(&mut buf);
        buf
    }
}

fn suite<T: Factory<Suite = T>>(input: &[u8]) -> IResult<&[u8], T> {
    let (rest, bytes) = take(4usize)(input)?;
    Ok((rest, T::new(Oui::new([bytes[0], bytes[1], bytes[2]]), bytes[3])))
}

fn pmkid(input: &[u8]) -> IResult<&[u8], Pmkid> {
    let (rest, bytes) = take(16usize)(input)?;
    let mut id: Pmkid = [0; 16];
    id.copy_from_slice(bytes);
    Ok((rest, id))
}

/// All fields after the version are optional; the element simply ends after
/// the last one present.
fn if_remaining<'a, O, F>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Option<O>>
where
    F: Parser<&'a [u8], O, nom::error::Error<&'a [u8]>>,
{
    move |input: &'a [u8]| {
        if input.is_empty() {
            Ok((input, None))
        } else {
            f.parse(input).map(|(rest, out)| (rest, Some(out)))
        }
    }
}

fn parse(input: &[u8]) -> IResult<&[u8], Rsne> {
    let (i, version) = le_u16(input)?;
    let (i, group_data_cipher_suite) = if_remaining(suite::<Cipher>)(i)?;
    let (i, pairwise_count) = if_remaining(le_u16)(i)?;
    let (i, pairwise_cipher_suites) =
        count(suite::<Cipher>, pairwise_count.unwrap_or(0) as usize)(i)?;
    let (i, akm_count) = if_remaining(le_u16)(i)?;
    let (i, akm_suites) = count(suite::<Akm>, akm_count.unwrap_or(0) as usize)(i)?;
    let (i, rsn_capabilities) = if_remaining(le_u16)(i)?;
    let (i, pmkid_count) = if_remaining(le_u16)(i)?;
    let (i, pmkids) = count(pmkid, pmkid_count.unwrap_or(0) as usize)(i)?;
    let (i, _) = eof(i)?;

    Ok((
        i,
        Rsne {
            version,
            group_data_cipher_suite,
            pairwise_cipher_suites,
            akm_suites,
            rsn_capabilities,
            pmkids,
        },
    ))
}

/// Converts the payload of an RSN information element (element-ID/length
/// prefix already stripped) into an `Rsne`.
pub fn from_bytes(input: &[u8]) -> Result<Rsne, ParseError> {
    match parse(input).finish() {
        Ok((_, rsne)) => Ok(rsne),
        Err(e) => Err(ParseError { offset: input.offset(e.input) }),
    }
}
