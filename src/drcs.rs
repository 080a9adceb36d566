//! DRCS (Dynamically Redefinable Character Set) glyphs and store.
//!
//! Caption streams may redefine glyph bitmaps at runtime and invoke them
//! through the DRCS code sets. The store keeps one insertion-ordered map
//! per DRCS set (DRCS-0 keyed by 2-byte codes, DRCS-1..15 by 1-byte
//! codes) plus a digest-keyed table of preferred Unicode substitutes.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{trace, warn};

/// 128-bit digest identifying a DRCS glyph bitmap.
pub type DrcsDigest = [u8; 16];

/// Number of DRCS code sets addressable by designation.
pub const DRCS_SET_COUNT: usize = 16;

/// Computes the pixel depth in bits from the wire `depth` field.
///
/// The field counts gradation levels beyond two, so the stored bit count
/// is `ceil(log2(depth + 2))`.
pub fn bits_per_pixel(depth: u8) -> u8 {
    let levels = depth as u32 + 2;
    (32 - (levels - 1).leading_zeros()) as u8
}

/// A dynamically redefined glyph bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drcs {
    /// Glyph width in pixels.
    pub width: u8,
    /// Glyph height in pixels.
    pub height: u8,
    /// Wire depth field (gradation levels minus two).
    pub depth: u8,
    /// Bits per pixel derived from `depth`.
    pub bits_per_pixel: u8,
    /// Packed pixel rows, MSB-first.
    pub pixels: Vec<u8>,
    digest: DrcsDigest,
}

impl Drcs {
    /// Creates a glyph and computes its digest from the pixel payload.
    pub fn new(width: u8, height: u8, depth: u8, pixels: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&pixels);
        let full = hasher.finalize();
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&full[..16]);
        Self {
            width,
            height,
            depth,
            bits_per_pixel: bits_per_pixel(depth),
            pixels,
            digest,
        }
    }

    /// Digest of the pixel payload, used for Unicode fallback lookup.
    pub fn digest(&self) -> &DrcsDigest {
        &self.digest
    }

    /// Expected pixel payload length in bytes for the glyph geometry.
    pub fn expected_len(width: u8, height: u8, depth: u8) -> usize {
        let bits = width as usize * height as usize * bits_per_pixel(depth) as usize;
        (bits + 7) / 8
    }
}

/// Per-session DRCS glyph store.
#[derive(Debug, Default)]
pub struct DrcsStore {
    maps: [Vec<(u16, Drcs)>; DRCS_SET_COUNT],
    fallbacks: HashMap<DrcsDigest, char>,
}

impl DrcsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every redefined glyph, keeping registered fallbacks.
    pub fn clear(&mut self) {
        for map in &mut self.maps {
            map.clear();
        }
    }

    /// Inserts or replaces a glyph in the given set.
    pub fn insert(&mut self, set: u8, code: u16, drcs: Drcs) {
        let map = &mut self.maps[(set as usize) % DRCS_SET_COUNT];
        if let Some(slot) = map.iter_mut().find(|(c, _)| *c == code) {
            slot.1 = drcs;
        } else {
            map.push((code, drcs));
        }
    }

    /// Looks up a glyph by set and character code.
    pub fn get(&self, set: u8, code: u16) -> Option<&Drcs> {
        self.maps[(set as usize) % DRCS_SET_COUNT]
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, d)| d)
    }

    /// Number of glyphs currently defined in a set.
    pub fn len(&self, set: u8) -> usize {
        self.maps[(set as usize) % DRCS_SET_COUNT].len()
    }

    /// Check if a set holds no glyphs.
    pub fn is_empty(&self, set: u8) -> bool {
        self.len(set) == 0
    }

    /// Registers a preferred Unicode substitute for a glyph digest.
    pub fn register_fallback(&mut self, digest: DrcsDigest, substitute: char) {
        self.fallbacks.insert(digest, substitute);
    }

    /// Resolves the Unicode substitute for a glyph, if any is registered.
    pub fn fallback_for(&self, drcs: &Drcs) -> Option<char> {
        self.fallbacks.get(drcs.digest()).copied()
    }

    /// Parses a DRCS data-unit payload into the store.
    ///
    /// `code_bytes` is 1 for the DRCS-1..15 unit (parameter 0x30) and 2
    /// for the DRCS-0 unit (parameter 0x31). A declared font payload
    /// running past the unit stops parsing; glyphs stored so far are
    /// kept.
    pub(crate) fn parse_data_unit(&mut self, data: &[u8], code_bytes: usize) {
        let mut pos = 0usize;
        if data.is_empty() {
            return;
        }
        let number_of_code = data[pos];
        pos += 1;

        for _ in 0..number_of_code {
            if pos + 3 > data.len() {
                warn!("DRCS unit truncated in code header");
                return;
            }
            let character_code = ((data[pos] as u16) << 8) | data[pos + 1] as u16;
            let number_of_font = data[pos + 2];
            pos += 3;

            for _ in 0..number_of_font {
                if pos + 4 > data.len() {
                    warn!("DRCS unit truncated in font header");
                    return;
                }
                let font_id = data[pos] >> 4;
                let mode = data[pos] & 0x0F;
                if mode >= 0x02 {
                    // Compressed (geometric) fonts carry no length field,
                    // nothing after them can be re-synchronized.
                    warn!(mode, "compressed DRCS font not supported, unit abandoned");
                    return;
                }
                let depth = data[pos + 1];
                let width = data[pos + 2];
                let height = data[pos + 3];
                pos += 4;

                let len = Drcs::expected_len(width, height, depth);
                if pos + len > data.len() {
                    warn!(
                        declared = len,
                        available = data.len() - pos,
                        "DRCS font payload exceeds unit"
                    );
                    return;
                }
                let drcs = Drcs::new(width, height, depth, data[pos..pos + len].to_vec());
                pos += len;

                let (set, code) = if code_bytes == 2 {
                    (0u8, character_code & 0x7F7F)
                } else {
                    let set = (character_code >> 8).wrapping_sub(0x40) as u8;
                    if !(1..=15).contains(&set) {
                        trace!(character_code, "DRCS code outside set range, skipped");
                        continue;
                    }
                    (set, character_code & 0x007F)
                };
                trace!(
                    set,
                    code,
                    font_id,
                    width,
                    height,
                    "DRCS glyph defined"
                );
                self.insert(set, code, drcs);
            }
        }
    }
}
