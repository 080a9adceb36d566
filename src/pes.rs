//! Caption PES payload framing.
//!
//! Parses the outer caption-data container carried in a PES payload:
//! the data group header, caption management / statement data, and the
//! data-unit loop. The CRC16 trailing each data group is accounted for
//! but not verified; broadcast transports validate it upstream.

use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

use crate::error::{CaptionError, Result};
use crate::types::{pack_iso639, LanguageInfo, StreamType};

/// Data-unit parameter: statement body (8-unit coded text).
pub(crate) const UNIT_STATEMENT_BODY: u8 = 0x20;
/// Data-unit parameter: geometric data.
pub(crate) const UNIT_GEOMETRIC: u8 = 0x28;
/// Data-unit parameter: 1-byte DRCS definitions.
pub(crate) const UNIT_DRCS_ONE_BYTE: u8 = 0x30;
/// Data-unit parameter: 2-byte DRCS definitions.
pub(crate) const UNIT_DRCS_TWO_BYTE: u8 = 0x31;
/// Data-unit parameter: color map.
pub(crate) const UNIT_COLOR_MAP: u8 = 0x34;
/// Data-unit parameter: bitmap.
pub(crate) const UNIT_BITMAP: u8 = 0x35;

/// A caption data group extracted from a PES payload.
#[derive(Debug, Clone)]
pub(crate) struct DataGroup<'a> {
    /// 6-bit data group id (management: 0x00/0x20, statement: language groups).
    pub group_id: u8,
    /// 2-bit data group version.
    pub version: u8,
    /// Link number of this group.
    pub link_number: u8,
    /// Last link number of the group chain.
    pub last_link_number: u8,
    /// Data group body (management or statement data).
    pub data: &'a [u8],
}

impl<'a> DataGroup<'a> {
    /// Strips the PES data header and parses the data group header.
    ///
    /// Returns the stream type announced by the data identifier along
    /// with the group.
    pub fn from_pes_payload(payload: &'a [u8]) -> Result<(StreamType, DataGroup<'a>)> {
        if payload.len() < 3 {
            return Err(CaptionError::PayloadTooShort {
                expected: 3,
                actual: payload.len(),
            });
        }

        let stream_type = StreamType::from_data_identifier(payload[0])
            .ok_or(CaptionError::InvalidDataIdentifier(payload[0]))?;
        if payload[1] != 0xFF {
            return Err(CaptionError::InvalidPrivateStreamId(payload[1]));
        }
        let header_length = (payload[2] & 0x0F) as usize;

        let group_start = 3 + header_length;
        if payload.len() < group_start + 5 {
            return Err(CaptionError::PayloadTooShort {
                expected: group_start + 5,
                actual: payload.len(),
            });
        }
        let header = &payload[group_start..];
        let group_id = (header[0] & 0xFC) >> 2;
        let version = header[0] & 0x03;
        let link_number = header[1];
        let last_link_number = header[2];
        let group_size = BigEndian::read_u16(&header[3..5]) as usize;

        let body = &header[5..];
        if body.len() < group_size {
            return Err(CaptionError::DataGroupTruncated {
                declared: group_size,
                available: body.len(),
            });
        }

        Ok((
            stream_type,
            DataGroup {
                group_id,
                version,
                link_number,
                last_link_number,
                data: &body[..group_size],
            },
        ))
    }

    /// Check if this group carries caption management data.
    pub fn is_management(&self) -> bool {
        self.group_id & 0x1F == 0
    }

    /// Group A (0) or group B (1) of the dual-transmission scheme.
    pub fn transmission_group(&self) -> u8 {
        (self.group_id >> 5) & 0x01
    }

    /// Language index announced by a statement group id.
    pub fn language_index(&self) -> Option<u8> {
        let id = self.group_id & 0x1F;
        if (1..=8).contains(&id) {
            Some(id - 1)
        } else {
            None
        }
    }
}

/// Caption management data: language announcements plus a data-unit loop.
#[derive(Debug, Clone)]
pub(crate) struct ManagementData<'a> {
    /// Time control mode.
    pub tmd: u8,
    /// Announced languages, in transmission order.
    pub languages: Vec<LanguageInfo>,
    /// Raw data-unit loop.
    pub data_units: &'a [u8],
}

impl<'a> ManagementData<'a> {
    /// Parses a management data group body.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut pos = 0usize;
        if data.is_empty() {
            return Err(CaptionError::invalid_management("missing TMD"));
        }
        let tmd = data[pos] >> 6;
        pos += 1;
        if tmd == 0b10 {
            // OTM: offset time, 36 bits + 4 reserved.
            if data.len() < pos + 5 {
                return Err(CaptionError::invalid_management("truncated OTM"));
            }
            pos += 5;
        }

        if data.len() < pos + 1 {
            return Err(CaptionError::invalid_management("missing language count"));
        }
        let num_languages = data[pos];
        pos += 1;

        let mut languages = Vec::with_capacity(num_languages as usize);
        for _ in 0..num_languages {
            if data.len() < pos + 1 {
                return Err(CaptionError::invalid_management("truncated language entry"));
            }
            let language_id = data[pos] >> 5;
            let dmf = data[pos] & 0x0F;
            pos += 1;

            let dc = if (0x0C..=0x0E).contains(&dmf) {
                if data.len() < pos + 1 {
                    return Err(CaptionError::invalid_management("truncated DC"));
                }
                let dc = data[pos];
                pos += 1;
                Some(dc)
            } else {
                None
            };

            if data.len() < pos + 4 {
                return Err(CaptionError::invalid_management("truncated language code"));
            }
            let iso639_code = pack_iso639([data[pos], data[pos + 1], data[pos + 2]]);
            let format = data[pos + 3] >> 4;
            let tcs = (data[pos + 3] >> 2) & 0x03;
            let rollup = data[pos + 3] & 0x03;
            pos += 4;

            languages.push(LanguageInfo {
                language_id,
                dmf,
                dc,
                iso639_code,
                format,
                tcs,
                rollup,
            });
        }

        let data_units = read_data_unit_loop(data, pos, "management")?;
        Ok(Self {
            tmd,
            languages,
            data_units,
        })
    }
}

/// Caption statement data: a timed data-unit loop.
#[derive(Debug, Clone)]
pub(crate) struct StatementData<'a> {
    /// Time control mode.
    pub tmd: u8,
    /// Raw data-unit loop.
    pub data_units: &'a [u8],
}

impl<'a> StatementData<'a> {
    /// Parses a statement data group body.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut pos = 0usize;
        if data.is_empty() {
            return Err(CaptionError::invalid_statement("missing TMD"));
        }
        let tmd = data[pos] >> 6;
        pos += 1;
        if tmd == 0b01 || tmd == 0b10 {
            // STM: presentation start time, 36 bits + 4 reserved.
            if data.len() < pos + 5 {
                return Err(CaptionError::invalid_statement("truncated STM"));
            }
            trace!("statement carries STM, presentation timing taken from PTS");
            pos += 5;
        }

        let data_units = read_data_unit_loop(data, pos, "statement")?;
        Ok(Self { tmd, data_units })
    }
}

/// Reads the 24-bit data-unit-loop length and bounds the loop slice.
fn read_data_unit_loop<'a>(data: &'a [u8], pos: usize, context: &str) -> Result<&'a [u8]> {
    if data.len() < pos + 3 {
        return Err(CaptionError::invalid_data_unit(format!(
            "{context}: missing data unit loop length"
        )));
    }
    let loop_length = BigEndian::read_u24(&data[pos..pos + 3]) as usize;
    let start = pos + 3;
    if data.len() < start + loop_length {
        return Err(CaptionError::invalid_data_unit(format!(
            "{context}: loop length {loop_length} exceeds {} remaining bytes",
            data.len() - start
        )));
    }
    Ok(&data[start..start + loop_length])
}

/// One record of the data-unit loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataUnit<'a> {
    /// Data-unit parameter byte.
    pub parameter: u8,
    /// Unit payload.
    pub data: &'a [u8],
}

/// Iterator over the records of a data-unit loop.
#[derive(Debug, Clone)]
pub(crate) struct DataUnitIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataUnitIter<'a> {
    /// Creates an iterator over a raw data-unit loop.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for DataUnitIter<'a> {
    type Item = Result<DataUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        if self.data.len() < self.pos + 5 {
            self.pos = self.data.len();
            return Some(Err(CaptionError::invalid_data_unit(
                "truncated data unit header",
            )));
        }
        let separator = self.data[self.pos];
        if separator != 0x1F {
            self.pos = self.data.len();
            return Some(Err(CaptionError::invalid_data_unit(format!(
                "missing unit separator, got 0x{separator:02X}"
            ))));
        }
        let parameter = self.data[self.pos + 1];
        let size = BigEndian::read_u24(&self.data[self.pos + 2..self.pos + 5]) as usize;
        let start = self.pos + 5;
        if self.data.len() < start + size {
            self.pos = self.data.len();
            return Some(Err(CaptionError::invalid_data_unit(format!(
                "unit size {size} exceeds {} remaining bytes",
                self.data.len() - start
            ))));
        }
        self.pos = start + size;
        Some(Ok(DataUnit {
            parameter,
            data: &self.data[start..start + size],
        }))
    }
}
