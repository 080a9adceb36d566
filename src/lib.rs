//! # arib-caption
//!
//! A decoder for Japanese ARIB STD-B24 closed captions carried in
//! broadcast PES payloads, producing a structured, renderable caption
//! representation.
//!
//! ## Features
//!
//! - Caption data group framing (management and statement data, both
//!   caption and superimpose identifiers)
//! - The full B24 code-extension machinery: GL/GR invocation over four
//!   designable code sets, locking and single shifts, C0/C1 controls and
//!   parameterized CSI commands
//! - Kanji, kana, alphanumeric and ARIB additional-symbol conversion to
//!   Unicode
//! - DRCS glyph ingestion with digest-based Unicode fallback
//! - Timed caption assembly into positioned, styled regions
//!
//! Rendering, transport-stream demultiplexing and font handling are out
//! of scope; the decoder starts at the caption PES payload and ends at
//! [`Caption`] values.
//!
//! ## Quick Start
//!
//! ```rust
//! use arib_caption::{DecodeStatus, Decoder, DecoderOptions};
//!
//! // A caption statement PES payload carrying two hiragana characters.
//! let pes = [
//!     0x80, 0xFF, 0xF0, // data identifier, private stream id, no header
//!     0x04, 0x00, 0x00, 0x00, 0x0D, // data group: statement, language 0
//!     0x00, // TMD
//!     0x00, 0x00, 0x09, // data unit loop length
//!     0x1F, 0x20, 0x00, 0x00, 0x04, // statement body unit
//!     0x1B, 0x7D, 0xA1, 0xA2, // LS2R, two hiragana codes
//!     0x00, 0x00, // CRC16 (not verified)
//! ];
//!
//! let mut decoder = Decoder::new(DecoderOptions::default());
//! let mut captions = Vec::new();
//! let status = decoder
//!     .decode(&pes, 1000, |caption| captions.push(caption))
//!     .unwrap();
//!
//! assert_eq!(status, DecodeStatus::GotCaption);
//! assert_eq!(captions[0].pts, 1000);
//! assert_eq!(captions[0].plain_text(), "ぁあ");
//! ```
//!
//! ## Concurrency
//!
//! A [`Decoder`] owns all of its mutable state and performs no I/O;
//! `decode` runs synchronously on the caller's thread and invokes the
//! output callback before returning. Independent instances can decode in
//! parallel without coordination.

pub mod codeset;
pub mod decoder;
pub mod drcs;
pub mod error;
mod pes;
mod tables;
pub mod types;

// Re-export commonly used types at the crate root.
pub use decoder::{DecodeStatus, Decoder, DecoderOptions};
pub use error::{CaptionError, Result};
pub use types::{
    Caption, CaptionChar, CaptionRegion, CaptionType, CharContent, CharSize, Color,
    EnclosureStyle, LanguageInfo, Profile, StreamType, DEFAULT_LANGUAGE_ID, PTS_NOPTS,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use arib_caption::prelude::*;
/// ```
pub mod prelude {
    pub use crate::codeset::GraphicSet;
    pub use crate::decoder::{DecodeStatus, Decoder, DecoderOptions};
    pub use crate::drcs::{Drcs, DrcsStore};
    pub use crate::error::{CaptionError, Result};
    pub use crate::types::{
        Caption, CaptionChar, CaptionRegion, CaptionType, CharContent, CharSize, Color,
        EnclosureStyle, LanguageInfo, Profile, StreamType, DEFAULT_LANGUAGE_ID, PTS_NOPTS,
    };
}
