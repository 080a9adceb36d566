//! Code-set designation and graphic-code conversion.
//!
//! ARIB STD-B24 extends ISO/IEC 2022: four code-set slots G0..G3 are
//! designated via ESC sequences and invoked into the GL/GR areas by
//! locking or single shifts. This module names the designable sets,
//! decodes designation final bytes, and converts invoked graphic codes
//! into Unicode text.

use encoding_rs::ISO_2022_JP;
use serde::{Deserialize, Serialize};

use crate::tables;

/// A graphic character set designable into one of the four GX slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicSet {
    /// Kanji (JIS X 0208 plus the ARIB additional-symbol rows), 2-byte.
    Kanji,
    /// Alphanumeric, 1-byte.
    Alnum,
    /// Hiragana, 1-byte.
    Hiragana,
    /// Katakana, 1-byte.
    Katakana,
    /// Mosaic A, 1-byte.
    MosaicA,
    /// Mosaic B, 1-byte.
    MosaicB,
    /// Mosaic C, 1-byte.
    MosaicC,
    /// Mosaic D, 1-byte.
    MosaicD,
    /// Proportional alphanumeric, 1-byte.
    PropAlnum,
    /// Proportional hiragana, 1-byte.
    PropHiragana,
    /// Proportional katakana, 1-byte.
    PropKatakana,
    /// JIS X 0201 katakana, 1-byte.
    JisX0201Katakana,
    /// JIS compatible kanji plane 1, 2-byte.
    JisKanjiPlane1,
    /// JIS compatible kanji plane 2, 2-byte.
    JisKanjiPlane2,
    /// Additional symbols, 2-byte.
    ExtraSymbols,
    /// Dynamically redefined set 0..=15; DRCS-0 is 2-byte, the rest 1-byte.
    Drcs(u8),
    /// Macro set, 1-byte.
    Macro,
}

impl GraphicSet {
    /// Number of bytes one invocation of this set consumes.
    pub fn bytes_per_char(&self) -> usize {
        match self {
            GraphicSet::Kanji
            | GraphicSet::JisKanjiPlane1
            | GraphicSet::JisKanjiPlane2
            | GraphicSet::ExtraSymbols
            | GraphicSet::Drcs(0) => 2,
            _ => 1,
        }
    }

    /// Check if this is a dynamically redefined set.
    pub fn is_drcs(&self) -> bool {
        matches!(self, GraphicSet::Drcs(_))
    }

    /// Decode a 1-byte G-set designation final (ESC 0x28..0x2B Fn).
    pub(crate) fn from_one_byte_final(f: u8) -> Option<Self> {
        match f {
            0x4A => Some(GraphicSet::Alnum),
            0x30 => Some(GraphicSet::Hiragana),
            0x31 => Some(GraphicSet::Katakana),
            0x32 => Some(GraphicSet::MosaicA),
            0x33 => Some(GraphicSet::MosaicB),
            0x34 => Some(GraphicSet::MosaicC),
            0x35 => Some(GraphicSet::MosaicD),
            0x36 => Some(GraphicSet::PropAlnum),
            0x37 => Some(GraphicSet::PropHiragana),
            0x38 => Some(GraphicSet::PropKatakana),
            0x49 => Some(GraphicSet::JisX0201Katakana),
            _ => None,
        }
    }

    /// Decode a 2-byte G-set designation final (ESC 0x24 [0x29..0x2B] Fn).
    pub(crate) fn from_two_byte_final(f: u8) -> Option<Self> {
        match f {
            0x42 => Some(GraphicSet::Kanji),
            0x39 => Some(GraphicSet::JisKanjiPlane1),
            0x3A => Some(GraphicSet::JisKanjiPlane2),
            0x3B => Some(GraphicSet::ExtraSymbols),
            _ => None,
        }
    }

    /// Decode a DRCS designation final (ESC … 0x20 Fn).
    pub(crate) fn from_drcs_final(f: u8) -> Option<Self> {
        match f {
            0x40..=0x4F => Some(GraphicSet::Drcs(f - 0x40)),
            0x70 => Some(GraphicSet::Macro),
            _ => None,
        }
    }
}

/// Decodes a kanji-plane code pair into Unicode.
///
/// Rows 0x75..=0x7E are the ARIB additional-symbol area; everything
/// below is JIS X 0208 decoded through an ISO-2022-JP escape wrapper.
fn decode_kanji(c1: u8, c2: u8) -> Option<String> {
    if c1 >= 0x75 {
        let code = ((c1 as u16) << 8) | c2 as u16;
        return tables::additional_symbol(code).map(str::to_owned);
    }
    let wrapped = [0x1B, 0x24, 0x42, c1, c2, 0x1B, 0x28, 0x42];
    let (decoded, _, had_errors) = ISO_2022_JP.decode(&wrapped);
    if had_errors {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// Converts a graphic code invoked from `set` into Unicode text.
///
/// `c2` is only read for 2-byte sets. `halfwidth` reflects a reduced
/// horizontal scale (MSZ/SSZ) and selects plain ASCII for alphanumerics.
/// Returns `None` for unassigned codes and for sets without a renderable
/// mapping (mosaics); DRCS and macro invocations are resolved by the
/// decoder, not here.
pub(crate) fn convert(set: GraphicSet, c1: u8, c2: u8, halfwidth: bool) -> Option<String> {
    match set {
        GraphicSet::Kanji | GraphicSet::JisKanjiPlane1 => decode_kanji(c1, c2),
        GraphicSet::ExtraSymbols => {
            let code = ((c1 as u16) << 8) | c2 as u16;
            tables::additional_symbol(code).map(str::to_owned)
        }
        GraphicSet::Alnum | GraphicSet::PropAlnum => {
            tables::alnum(c1, halfwidth).map(String::from)
        }
        GraphicSet::Hiragana | GraphicSet::PropHiragana => {
            tables::hiragana(c1).map(String::from)
        }
        GraphicSet::Katakana | GraphicSet::PropKatakana => {
            tables::katakana(c1).map(String::from)
        }
        GraphicSet::JisX0201Katakana => tables::jis_katakana(c1).map(String::from),
        GraphicSet::JisKanjiPlane2
        | GraphicSet::MosaicA
        | GraphicSet::MosaicB
        | GraphicSet::MosaicC
        | GraphicSet::MosaicD
        | GraphicSet::Drcs(_)
        | GraphicSet::Macro => None,
    }
}
