//! Decoder/encoder for the first message a server sends on the smart
//! transport: the advertised-refs message that opens `upload-pack` and
//! `receive-pack`.
//!
//! This is distinct from [`v1::parse_ref_advertisement`](crate::v1::parse_ref_advertisement),
//! which is wired into the live fetch/push handshake and tolerates the v2
//! "version 2" upgrade line. [`AdvertisedRefs`] is the strict, round-trippable
//! codec: decode is exact about malformed input and encode reproduces
//! byte-identical output from the same logical content, which is what
//! callers doing ref-advertisement caching, testing, or pass-through need.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use bstr::BString;
use git_hash::{HashAlgorithm, ObjectId};

use crate::capability::Capabilities;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PKT_DATA_LEN};

/// Errors specific to decoding/encoding an advertised-refs message.
#[derive(Debug, thiserror::Error)]
pub enum AdvertisedRefsError {
    #[error("advertised-refs line too short")]
    TooShort,

    #[error("invalid hash")]
    InvalidHash,

    #[error("invalid hash text")]
    InvalidHashText,

    #[error("no space after hash")]
    NoSpaceAfterHash,

    #[error("NULL not found")]
    NulNotFound,

    #[error("malformed zero-id line")]
    MalformedZeroId,

    #[error("malformed shallow prefix")]
    MalformedShallowPrefix,

    #[error("payload exceeds pkt-line maximum")]
    PayloadTooLong,

    #[error(transparent)]
    Protocol(#[from] crate::ProtocolError),
}

/// A fully decoded advertised-refs message.
#[derive(Debug, Clone, Default)]
pub struct AdvertisedRefs {
    /// Verbatim prefix lines preceding the first ref line (e.g. `# service=git-upload-pack`).
    pub prefix: Vec<BString>,
    /// The hash HEAD points at, if the server has any refs at all.
    pub head: Option<ObjectId>,
    /// Capabilities advertised on the first line.
    pub capabilities: Capabilities,
    /// Non-HEAD references, keyed by full ref name.
    pub references: BTreeMap<BString, ObjectId>,
    /// Peeled (dereferenced tag) targets, keyed by the ref name they peel.
    pub peeled: BTreeMap<BString, ObjectId>,
    /// `shallow <hash>` lines.
    pub shallows: Vec<ObjectId>,
}

fn strip_trailing_nl(data: &[u8]) -> &[u8] {
    if data.last() == Some(&b'\n') {
        &data[..data.len() - 1]
    } else {
        data
    }
}

/// Split a leading hex hash (40 or 64 chars) off `line`, returning the hash
/// and the remaining bytes.
fn take_hash(line: &[u8]) -> Result<(ObjectId, &[u8]), AdvertisedRefsError> {
    if line.len() < 40 {
        return Err(AdvertisedRefsError::TooShort);
    }
    for &n in &[40usize, 64usize] {
        if line.len() >= n && (line.len() == n || line[n] == b' ' || line[n] == 0) {
            let text =
                std::str::from_utf8(&line[..n]).map_err(|_| AdvertisedRefsError::InvalidHashText)?;
            return match ObjectId::from_hex(text) {
                Ok(oid) => Ok((oid, &line[n..])),
                Err(_) => Err(AdvertisedRefsError::InvalidHashText),
            };
        }
    }
    Err(AdvertisedRefsError::InvalidHash)
}

impl AdvertisedRefs {
    /// Decode an advertised-refs message from a pkt-line stream.
    pub fn decode<R: Read>(
        reader: &mut PktLineReader<R>,
    ) -> Result<Self, AdvertisedRefsError> {
        let mut prefix = Vec::new();
        let first_line;
        loop {
            match reader.read_pkt()? {
                PktLine::Data(data) => {
                    if data.first() == Some(&b'#') {
                        prefix.push(BString::from(strip_trailing_nl(&data).to_vec()));
                        continue;
                    }
                    first_line = data;
                    break;
                }
                PktLine::Flush => continue,
                PktLine::Delimiter | PktLine::ResponseEnd => {
                    return Err(AdvertisedRefsError::TooShort)
                }
            }
        }

        let mut out = AdvertisedRefs {
            prefix,
            ..Default::default()
        };

        let (oid, rest) = take_hash(&first_line)?;
        if oid.is_null() {
            let expected = b" capabilities^{}\0";
            if !rest.starts_with(expected) {
                return Err(AdvertisedRefsError::MalformedZeroId);
            }
            let caps_bytes = strip_trailing_nl(&rest[expected.len()..]);
            out.capabilities = Capabilities::parse_v1(&String::from_utf8_lossy(caps_bytes));
            out.head = None;
        } else {
            if rest.first() != Some(&b' ') {
                return Err(AdvertisedRefsError::NoSpaceAfterHash);
            }
            let rest = &rest[1..];
            let nul_pos = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or(AdvertisedRefsError::NulNotFound)?;
            let refname = &rest[..nul_pos];
            let caps_bytes = strip_trailing_nl(&rest[nul_pos + 1..]);
            out.capabilities = Capabilities::parse_v1(&String::from_utf8_lossy(caps_bytes));
            if refname == b"HEAD" {
                out.head = Some(oid);
            } else {
                out.references.insert(BString::from(refname.to_vec()), oid);
            }
        }

        loop {
            match reader.read_pkt()? {
                PktLine::Flush => break,
                PktLine::Data(data) => {
                    let line = strip_trailing_nl(&data);
                    if line.starts_with(b"shallow") {
                        if line.len() < 9 || line[7] != b' ' {
                            return Err(AdvertisedRefsError::MalformedShallowPrefix);
                        }
                        let text = std::str::from_utf8(&line[8..])
                            .map_err(|_| AdvertisedRefsError::InvalidHashText)?;
                        let hash = ObjectId::from_hex(text)
                            .map_err(|_| AdvertisedRefsError::InvalidHashText)?;
                        out.shallows.push(hash);
                    } else {
                        let (hash, rest) = take_hash(line)?;
                        if rest.first() != Some(&b' ') {
                            return Err(AdvertisedRefsError::NoSpaceAfterHash);
                        }
                        let name = &rest[1..];
                        if let Some(base) = name.strip_suffix(b"^{}") {
                            out.peeled.insert(BString::from(base.to_vec()), hash);
                        } else {
                            out.references.insert(BString::from(name.to_vec()), hash);
                        }
                    }
                }
                PktLine::Delimiter | PktLine::ResponseEnd => {
                    return Err(AdvertisedRefsError::TooShort)
                }
            }
        }

        Ok(out)
    }

    /// The hash algorithm in use, inferred from whatever hash is present.
    fn algorithm(&self) -> HashAlgorithm {
        self.head
            .or_else(|| self.references.values().next().copied())
            .or_else(|| self.shallows.first().copied())
            .map(|h| h.algorithm())
            .unwrap_or_default()
    }

    /// Encode this message back to a pkt-line stream.
    ///
    /// Capabilities are sorted alphabetically, references are sorted
    /// lexicographically by name with any peeled line immediately
    /// following, and shallows are sorted after all refs. Two
    /// [`AdvertisedRefs`] values built from the same logical content
    /// always encode to byte-identical output.
    pub fn encode<W: Write>(
        &self,
        writer: &mut PktLineWriter<W>,
    ) -> Result<(), AdvertisedRefsError> {
        for line in &self.prefix {
            write_checked(writer, &format!("{line}\n"))?;
        }
        if !self.prefix.is_empty() {
            writer.write_flush()?;
        }

        let mut cap_strings: Vec<String> = self
            .capabilities
            .entries()
            .iter()
            .map(|e| match &e.value {
                Some(v) => format!("{}={}", e.name, v),
                None => e.name.clone(),
            })
            .collect();
        cap_strings.sort();
        let caps_str = cap_strings.join(" ");

        let first_line = match self.head {
            Some(head) => format!("{} HEAD\0{}\n", head.to_hex(), caps_str),
            None => {
                let null_hex = "0".repeat(self.algorithm().hex_len());
                format!("{null_hex} capabilities^{{}}\0{caps_str}\n")
            }
        };
        write_checked(writer, &first_line)?;

        let mut names: Vec<&BString> = self.references.keys().collect();
        names.sort();
        for name in names {
            let oid = self.references[name];
            write_checked(writer, &format!("{} {name}\n", oid.to_hex()))?;
            if let Some(peeled) = self.peeled.get(name) {
                write_checked(writer, &format!("{} {name}^{{}}\n", peeled.to_hex()))?;
            }
        }

        let mut shallows = self.shallows.clone();
        shallows.sort();
        for hash in shallows {
            write_checked(writer, &format!("shallow {}\n", hash.to_hex()))?;
        }

        writer.write_flush()?;
        Ok(())
    }
}

fn write_checked<W: Write>(
    writer: &mut PktLineWriter<W>,
    text: &str,
) -> Result<(), AdvertisedRefsError> {
    if text.len() > MAX_PKT_DATA_LEN {
        return Err(AdvertisedRefsError::PayloadTooLong);
    }
    writer.write_line(text.as_bytes())?;
    Ok(())
}
