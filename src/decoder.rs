//! ARIB STD-B24 caption decoder.
//!
//! A stateful byte-stream interpreter over caption statement bodies:
//! multi-codeset GL/GR shifting, C0/C1 control sequences, parameterized
//! CSI commands, DRCS ingestion and the writing-format state (plane
//! geometry, active position, typographic attributes). Decoded output is
//! assembled into timed [`Caption`] bundles and handed to a synchronous
//! output callback.
//!
//! The decoder is single-threaded and non-suspending: `decode` performs
//! all work on the caller's thread and invokes the callback zero or more
//! times before returning. Independent decoder instances do not share
//! state and may run on separate threads.

use arrayvec::ArrayVec;
use tracing::{error, trace, warn};

use crate::codeset::{self, GraphicSet};
use crate::drcs::DrcsStore;
use crate::error::Result;
use crate::pes::{
    DataGroup, DataUnitIter, ManagementData, StatementData, UNIT_BITMAP, UNIT_COLOR_MAP,
    UNIT_DRCS_ONE_BYTE, UNIT_DRCS_TWO_BYTE, UNIT_GEOMETRIC, UNIT_STATEMENT_BODY,
};
use crate::tables;
use crate::types::{
    Caption, CaptionChar, CaptionRegion, CaptionType, CharContent, CharSize, Color,
    EnclosureStyle, LanguageInfo, Profile, StreamType, DEFAULT_CHAR_HEIGHT, DEFAULT_CHAR_WIDTH,
    DEFAULT_HORIZONTAL_SPACING, DEFAULT_LANGUAGE_ID, DEFAULT_PLANE_HEIGHT, DEFAULT_PLANE_WIDTH,
    DEFAULT_VERTICAL_SPACING, PTS_NOPTS,
};

/// Outcome of a successful [`Decoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The packet parsed cleanly but produced no caption output.
    NoCaption,
    /// Exactly one caption was delivered to the output callback.
    GotCaption,
    /// Several captions were delivered to the output callback.
    GotCaptionList,
}

/// Decoder construction options.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Which PES data identifier this decoder consumes.
    pub stream_type: StreamType,
    /// Operational profile selecting the initial code-set designations.
    pub profile: Profile,
    /// Language index (0..=7) to decode statement data for.
    pub language_id: u8,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            stream_type: StreamType::Caption,
            profile: Profile::ProfileA,
            language_id: DEFAULT_LANGUAGE_ID,
        }
    }
}

impl DecoderOptions {
    /// Creates options with the defaults (caption stream, profile A, language 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stream type.
    pub fn with_stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = stream_type;
        self
    }

    /// Sets the profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the language index.
    pub fn with_language_id(mut self, language_id: u8) -> Self {
        self.language_id = language_id & 0x07;
        self
    }
}

/// ARIB STD-B24 caption decoder instance.
#[derive(Debug)]
pub struct Decoder {
    stream_type: StreamType,
    profile: Profile,
    language_id: u8,

    language_infos: Vec<LanguageInfo>,
    prev_management_group: Option<u8>,

    caption: Option<Caption>,
    statement_has_bitmap: bool,

    gx: [GraphicSet; 4],
    gl: usize,
    gr: usize,
    drcs: DrcsStore,

    pts: i64,
    duration: i64,

    swf: u8,
    plane_width: i32,
    plane_height: i32,
    area_width: i32,
    area_height: i32,
    area_x: i32,
    area_y: i32,
    active_pos_inited: bool,
    active_x: i32,
    active_y: i32,

    char_width: i32,
    char_height: i32,
    horizontal_spacing: i32,
    vertical_spacing: i32,
    char_size: CharSize,

    palette: u8,
    text_color: Color,
    back_color: Color,
    underline: bool,
    bold: bool,
    italic: bool,
    flashing: bool,
    stroke_color: Option<Color>,
    enclosure: EnclosureStyle,

    has_builtin_sound: bool,
    builtin_sound_id: u8,

    pending_repeat: Option<u8>,
    macro_depth: u8,
}

impl Decoder {
    /// Creates a decoder with the given options.
    pub fn new(options: DecoderOptions) -> Self {
        let mut decoder = Self {
            stream_type: options.stream_type,
            profile: options.profile,
            language_id: options.language_id & 0x07,
            language_infos: Vec::new(),
            prev_management_group: None,
            caption: None,
            statement_has_bitmap: false,
            gx: [
                GraphicSet::Kanji,
                GraphicSet::Alnum,
                GraphicSet::Hiragana,
                GraphicSet::Macro,
            ],
            gl: 0,
            gr: 2,
            drcs: DrcsStore::new(),
            pts: PTS_NOPTS,
            duration: 0,
            swf: 7,
            plane_width: DEFAULT_PLANE_WIDTH,
            plane_height: DEFAULT_PLANE_HEIGHT,
            area_width: DEFAULT_PLANE_WIDTH,
            area_height: DEFAULT_PLANE_HEIGHT,
            area_x: 0,
            area_y: 0,
            active_pos_inited: false,
            active_x: 0,
            active_y: 0,
            char_width: DEFAULT_CHAR_WIDTH,
            char_height: DEFAULT_CHAR_HEIGHT,
            horizontal_spacing: DEFAULT_HORIZONTAL_SPACING,
            vertical_spacing: DEFAULT_VERTICAL_SPACING,
            char_size: CharSize::Normal,
            palette: 0,
            text_color: Color::WHITE,
            back_color: Color::TRANSPARENT,
            underline: false,
            bold: false,
            italic: false,
            flashing: false,
            stroke_color: None,
            enclosure: EnclosureStyle::default(),
            has_builtin_sound: false,
            builtin_sound_id: 0,
            pending_repeat: None,
            macro_depth: 0,
        };
        decoder.reset_internal_state();
        decoder
    }

    /// Creates a decoder with default options.
    pub fn with_defaults() -> Self {
        Self::new(DecoderOptions::default())
    }

    /// Switches the profile and resets all mutable decoding state.
    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
        self.reset_internal_state();
    }

    /// Switches the language index decoded from statement groups.
    pub fn set_language_id(&mut self, language_id: u8) {
        self.language_id = language_id & 0x07;
    }

    /// Registers a preferred Unicode substitute for a DRCS glyph digest.
    pub fn register_drcs_fallback(&mut self, digest: crate::drcs::DrcsDigest, substitute: char) {
        self.drcs.register_fallback(digest, substitute);
    }

    /// Returns the packed ISO 639-2 code announced for a language index,
    /// or 0 when management data has not announced it.
    pub fn iso639_language_code(&self, language_id: u8) -> u32 {
        self.language_infos
            .iter()
            .find(|info| info.language_id == language_id)
            .map(|info| info.iso639_code)
            .unwrap_or(0)
    }

    /// Decodes one caption PES payload.
    ///
    /// `pts` is the presentation timestamp in milliseconds, or
    /// [`PTS_NOPTS`]. `output` receives every finalized caption before
    /// the call returns; it must not assume any captions outlive the
    /// stream position they were decoded at.
    pub fn decode<F>(&mut self, pes: &[u8], pts: i64, mut output: F) -> Result<DecodeStatus>
    where
        F: FnMut(Caption),
    {
        if pes.is_empty() {
            return Ok(DecodeStatus::NoCaption);
        }

        let (stream_type, group) = DataGroup::from_pes_payload(pes).map_err(|err| {
            error!(%err, "malformed caption PES payload");
            err
        })?;
        if stream_type != self.stream_type {
            trace!(
                ?stream_type,
                "data identifier does not match decoder stream type"
            );
            return Ok(DecodeStatus::NoCaption);
        }

        self.pts = pts;
        let mut out = Vec::new();

        if group.is_management() {
            let transmission_group = group.transmission_group();
            if self.prev_management_group == Some(transmission_group) {
                trace!("duplicate caption management data, skipped");
                return Ok(DecodeStatus::NoCaption);
            }
            self.prev_management_group = Some(transmission_group);
            let management = ManagementData::parse(group.data)?;
            self.apply_management(management, &mut out);
        } else {
            match group.language_index() {
                Some(index) if index == self.language_id => {
                    let statement = StatementData::parse(group.data)?;
                    self.apply_statement(statement, &mut out);
                }
                Some(index) => {
                    trace!(index, "statement for unselected language, skipped");
                    return Ok(DecodeStatus::NoCaption);
                }
                None => {
                    trace!(group_id = group.group_id, "unknown data group id, skipped");
                    return Ok(DecodeStatus::NoCaption);
                }
            }
        }

        let status = match out.len() {
            0 => DecodeStatus::NoCaption,
            1 => DecodeStatus::GotCaption,
            _ => DecodeStatus::GotCaptionList,
        };
        for caption in out {
            output(caption);
        }
        Ok(status)
    }

    /// Drains any pending in-progress caption and resets all mutable
    /// state to its post-construction value.
    ///
    /// Returns `true` when a caption was delivered to the callback.
    pub fn flush<F>(&mut self, mut output: F) -> bool
    where
        F: FnMut(Caption),
    {
        let mut out = Vec::new();
        self.finalize_statement(&mut out);
        let emitted = !out.is_empty();
        for caption in out {
            output(caption);
        }
        self.reset_internal_state();
        emitted
    }

    /// Resets code-set designations, writing format, colors, styles and
    /// the DRCS store to the profile defaults.
    fn reset_internal_state(&mut self) {
        match self.profile {
            Profile::ProfileA => {
                self.gx = [
                    GraphicSet::Kanji,
                    GraphicSet::Alnum,
                    GraphicSet::Hiragana,
                    GraphicSet::Macro,
                ];
                self.gl = 0;
                self.gr = 2;
            }
            Profile::ProfileC => {
                self.gx = [
                    GraphicSet::Kanji,
                    GraphicSet::Drcs(1),
                    GraphicSet::Hiragana,
                    GraphicSet::Macro,
                ];
                self.gl = 1;
                self.gr = 0;
            }
        }
        self.swf = 7;
        self.reset_writing_format();
        self.drcs.clear();
        self.language_infos.clear();
        self.prev_management_group = None;
        self.caption = None;
        self.statement_has_bitmap = false;
        self.pts = PTS_NOPTS;
        self.duration = 0;
        self.reset_character_state();
        self.macro_depth = 0;
    }

    /// Resets colors, styles and pending repeat to their defaults.
    fn reset_character_state(&mut self) {
        self.palette = 0;
        self.text_color = tables::clut_color(0, 7);
        self.back_color = tables::clut_color(0, 8);
        self.underline = false;
        self.bold = false;
        self.italic = false;
        self.flashing = false;
        self.stroke_color = None;
        self.enclosure = EnclosureStyle::default();
        self.has_builtin_sound = false;
        self.builtin_sound_id = 0;
        self.pending_repeat = None;
    }

    /// Applies the plane preset selected by SWF and resets the derived
    /// display-area geometry and character metrics.
    fn reset_writing_format(&mut self) {
        let (width, height) = match self.swf {
            5 | 10 => (1920, 1080),
            7 => (960, 540),
            8 => (720, 480),
            9 => (1280, 720),
            other => {
                trace!(swf = other, "unknown writing format, geometry kept");
                (self.plane_width, self.plane_height)
            }
        };
        self.plane_width = width;
        self.plane_height = height;
        self.area_width = width;
        self.area_height = height;
        self.area_x = 0;
        self.area_y = 0;
        self.char_width = DEFAULT_CHAR_WIDTH;
        self.char_height = DEFAULT_CHAR_HEIGHT;
        self.horizontal_spacing = DEFAULT_HORIZONTAL_SPACING;
        self.vertical_spacing = DEFAULT_VERTICAL_SPACING;
        self.char_size = CharSize::Normal;
        self.active_pos_inited = false;
        self.active_x = 0;
        self.active_y = 0;
    }

    /// Processes caption management data: language announcements and any
    /// DRCS definitions carried alongside, then emits a management caption.
    fn apply_management(&mut self, management: ManagementData<'_>, out: &mut Vec<Caption>) {
        // Reassigned code sets invalidate previously redefined glyphs.
        self.drcs.clear();
        self.language_infos = management.languages.clone();

        self.process_data_units(management.data_units, out);

        let mut caption = Caption::new(CaptionType::Management);
        caption.pts = self.pts;
        caption.plane_width = self.plane_width;
        caption.plane_height = self.plane_height;
        caption.is_superimpose = self.stream_type == StreamType::Superimpose;
        caption.language_index = self.language_id;
        caption.iso639_code = self.iso639_language_code(self.language_id);
        caption.languages = management.languages;
        out.push(caption);
    }

    /// Processes caption statement data: the data-unit loop followed by
    /// finalization of whatever the interpreter assembled.
    fn apply_statement(&mut self, statement: StatementData<'_>, out: &mut Vec<Caption>) {
        self.duration = 0;
        self.statement_has_bitmap = false;

        self.process_data_units(statement.data_units, out);
        self.finalize_statement(out);
    }

    /// Walks a data-unit loop, dispatching each record.
    fn process_data_units(&mut self, data_units: &[u8], out: &mut Vec<Caption>) {
        for unit in DataUnitIter::new(data_units) {
            let unit = match unit {
                Ok(unit) => unit,
                Err(err) => {
                    warn!(%err, "data unit loop abandoned");
                    return;
                }
            };
            match unit.parameter {
                UNIT_STATEMENT_BODY => self.parse_statement_body(unit.data, out),
                UNIT_DRCS_ONE_BYTE => self.drcs.parse_data_unit(unit.data, 1),
                UNIT_DRCS_TWO_BYTE => self.drcs.parse_data_unit(unit.data, 2),
                UNIT_BITMAP => {
                    trace!("bitmap data unit accepted, content not decoded");
                    self.statement_has_bitmap = true;
                }
                UNIT_GEOMETRIC | UNIT_COLOR_MAP => {
                    trace!(parameter = unit.parameter, "data unit skipped");
                }
                other => {
                    trace!(parameter = other, "unknown data unit skipped");
                }
            }
        }
    }

    /// Finalizes the in-progress caption into `out`, if it has content.
    fn finalize_statement(&mut self, out: &mut Vec<Caption>) {
        let Some(mut caption) = self.caption.take() else {
            return;
        };
        if caption.regions.is_empty() {
            return;
        }
        caption.pts = self.pts;
        caption.duration = self.duration;
        caption.plane_width = self.plane_width;
        caption.plane_height = self.plane_height;
        caption.is_superimpose = self.stream_type == StreamType::Superimpose;
        caption.language_index = self.language_id;
        caption.iso639_code = self.iso639_language_code(self.language_id);
        caption.has_builtin_sound = self.has_builtin_sound;
        caption.builtin_sound_id = self.builtin_sound_id;
        caption.has_bitmap = self.statement_has_bitmap;
        out.push(caption);

        self.has_builtin_sound = false;
        self.builtin_sound_id = 0;
        self.statement_has_bitmap = false;
    }

    /// Finalizes any pending caption, then emits a clear-screen event.
    fn clear_screen(&mut self, out: &mut Vec<Caption>) {
        self.finalize_statement(out);

        let mut caption = Caption::new(CaptionType::ClearScreen);
        caption.pts = self.pts;
        caption.duration = self.duration;
        caption.plane_width = self.plane_width;
        caption.plane_height = self.plane_height;
        caption.is_superimpose = self.stream_type == StreamType::Superimpose;
        caption.language_index = self.language_id;
        caption.iso639_code = self.iso639_language_code(self.language_id);
        out.push(caption);

        self.active_pos_inited = false;
    }

    // ---- byte-stream interpreter -------------------------------------

    /// Interprets one statement body.
    fn parse_statement_body(&mut self, data: &[u8], out: &mut Vec<Caption>) {
        let mut pos = 0usize;
        while pos < data.len() {
            let rest = &data[pos..];
            let consumed = match rest[0] {
                0x00..=0x20 => self.handle_c0(rest, out),
                0x21..=0x7E => self.handle_glgr(rest, self.gx[self.gl], out),
                0x7F => 1, // DEL
                0x80..=0xA0 => self.handle_c1(rest, out),
                0xA1..=0xFE => self.handle_glgr(rest, self.gx[self.gr], out),
                0xFF => 1,
            };
            debug_assert!(consumed > 0);
            pos += consumed.max(1);
        }
    }

    /// Handles a C0 control code. Returns the number of bytes consumed.
    fn handle_c0(&mut self, bytes: &[u8], out: &mut Vec<Caption>) -> usize {
        match bytes[0] {
            0x00 => 1, // NUL
            0x07 => {
                trace!("BEL ignored");
                1
            }
            0x08 => {
                // APB
                self.move_relative(-1, 0);
                1
            }
            0x09 => {
                // APF
                self.move_relative(1, 0);
                1
            }
            0x0A => {
                // APD
                self.move_relative(0, 1);
                1
            }
            0x0B => {
                // APU
                self.move_relative(0, -1);
                1
            }
            0x0C => {
                // CS
                self.clear_screen(out);
                1
            }
            0x0D => {
                // APR
                self.move_to_newline();
                1
            }
            0x0E => {
                // LS1
                self.gl = 1;
                1
            }
            0x0F => {
                // LS0
                self.gl = 0;
                1
            }
            0x16 => {
                // PAPF
                let Some(param) = bytes.get(1) else {
                    trace!("PAPF truncated");
                    return bytes.len();
                };
                self.move_relative((param & 0x3F) as i32, 0);
                2
            }
            0x18 => {
                trace!("CAN ignored");
                1
            }
            0x19 => {
                // SS2: shift to G2 for exactly one character.
                if bytes.len() < 2 {
                    trace!("single shift at end of payload");
                    return bytes.len();
                }
                1 + self.handle_glgr(&bytes[1..], self.gx[2], out)
            }
            0x1B => self.handle_esc(bytes),
            0x1C => {
                // APS: P1 = line, P2 = column.
                if bytes.len() < 3 {
                    trace!("APS truncated");
                    return bytes.len();
                }
                let line = (bytes[1] & 0x3F) as i32;
                let column = (bytes[2] & 0x3F) as i32;
                self.set_active_pos(column, line);
                3
            }
            0x1D => {
                // SS3: shift to G3 for exactly one character.
                if bytes.len() < 2 {
                    trace!("single shift at end of payload");
                    return bytes.len();
                }
                1 + self.handle_glgr(&bytes[1..], self.gx[3], out)
            }
            0x1E => {
                trace!("RS ignored");
                1
            }
            0x1F => {
                trace!("US ignored");
                1
            }
            0x20 => {
                // SP
                let space = if self.char_size.is_halfwidth() {
                    " "
                } else {
                    "\u{3000}"
                };
                self.push_text(self.gx[self.gl], space.to_string());
                1
            }
            _ => unreachable!("C0 range"),
        }
    }

    /// Handles an ESC designation or locking shift sequence.
    fn handle_esc(&mut self, bytes: &[u8]) -> usize {
        let rest = &bytes[1..];
        match *rest {
            [] => {
                trace!("ESC at end of payload");
                1
            }

            // Locking shifts.
            [0x6E, ..] => {
                self.gl = 2; // LS2
                2
            }
            [0x6F, ..] => {
                self.gl = 3; // LS3
                2
            }
            [0x7E, ..] => {
                self.gr = 1; // LS1R
                2
            }
            [0x7D, ..] => {
                self.gr = 2; // LS2R
                2
            }
            [0x7C, ..] => {
                self.gr = 3; // LS3R
                2
            }

            // 2-byte DRCS designation: ESC 0x24 G 0x20 Fn.
            [0x24, g @ 0x28..=0x2B, 0x20, f, ..] => {
                match GraphicSet::from_drcs_final(f) {
                    Some(set) if set.bytes_per_char() == 2 => {
                        self.gx[(g - 0x28) as usize] = set;
                    }
                    _ => trace!(f, "unknown 2-byte DRCS designation final"),
                }
                5
            }

            // 2-byte G set to G1..G3: ESC 0x24 G Fn.
            [0x24, g @ 0x29..=0x2B, f, ..] => {
                match GraphicSet::from_two_byte_final(f) {
                    Some(set) => self.gx[(g - 0x28) as usize] = set,
                    None => trace!(f, "unknown 2-byte designation final"),
                }
                4
            }

            // 2-byte G set to G0: ESC 0x24 Fn.
            [0x24, f, ..] => {
                match GraphicSet::from_two_byte_final(f) {
                    Some(set) => self.gx[0] = set,
                    None => trace!(f, "unknown 2-byte designation final"),
                }
                3
            }

            // 1-byte DRCS designation: ESC G 0x20 Fn.
            [g @ 0x28..=0x2B, 0x20, f, ..] => {
                match GraphicSet::from_drcs_final(f) {
                    Some(set) if set.bytes_per_char() == 1 => {
                        self.gx[(g - 0x28) as usize] = set;
                    }
                    Some(_) => trace!(f, "2-byte DRCS final in 1-byte designation"),
                    None => trace!(f, "unknown 1-byte DRCS designation final"),
                }
                4
            }

            // 1-byte G set: ESC G Fn.
            [g @ 0x28..=0x2B, f, ..] => {
                match GraphicSet::from_one_byte_final(f) {
                    Some(set) => self.gx[(g - 0x28) as usize] = set,
                    None => trace!(f, "unknown 1-byte designation final"),
                }
                3
            }

            [f, ..] => {
                trace!(f, "unknown ESC sequence");
                2
            }
        }
    }

    /// Handles a C1 control code. Returns the number of bytes consumed.
    fn handle_c1(&mut self, bytes: &[u8], out: &mut Vec<Caption>) -> usize {
        match bytes[0] {
            // BKF..=WHF: foreground color from the current palette.
            c @ 0x80..=0x87 => {
                self.text_color = tables::clut_color(self.palette, c & 0x07);
                1
            }
            0x88 => {
                // SSZ
                self.set_char_size(CharSize::Small);
                1
            }
            0x89 => {
                // MSZ
                self.set_char_size(CharSize::Medium);
                1
            }
            0x8A => {
                // NSZ
                self.set_char_size(CharSize::Normal);
                1
            }
            0x8B => {
                // SZX
                let Some(&param) = bytes.get(1) else {
                    trace!("SZX truncated");
                    return bytes.len();
                };
                match param {
                    0x60 => self.set_char_size(CharSize::Micro),
                    0x41 => self.set_char_size(CharSize::DoubleHeight),
                    0x44 => self.set_char_size(CharSize::DoubleWidth),
                    0x45 => self.set_char_size(CharSize::DoubleSize),
                    0x6B => self.set_char_size(CharSize::Special1),
                    0x64 => self.set_char_size(CharSize::Special2),
                    other => trace!(param = other, "unknown SZX parameter"),
                }
                2
            }
            0x90 => self.handle_col(bytes),
            0x91 => {
                // FLC
                let Some(&param) = bytes.get(1) else {
                    trace!("FLC truncated");
                    return bytes.len();
                };
                match param {
                    0x40 | 0x47 => self.flashing = true,
                    0x4F => self.flashing = false,
                    other => trace!(param = other, "unknown FLC parameter"),
                }
                2
            }
            0x92 => {
                // CDC: color defining code, not modeled.
                trace!("CDC ignored");
                if bytes.get(1) == Some(&0x20) {
                    3.min(bytes.len())
                } else {
                    2.min(bytes.len())
                }
            }
            0x93 => {
                // POL
                trace!("POL ignored");
                2.min(bytes.len())
            }
            0x94 => {
                // WMM
                trace!("WMM ignored");
                2.min(bytes.len())
            }
            0x95 => self.skip_macro_definition(bytes),
            0x97 => {
                // HLC
                let Some(&param) = bytes.get(1) else {
                    trace!("HLC truncated");
                    return bytes.len();
                };
                self.enclosure = EnclosureStyle::from_bits(param & 0x0F);
                2
            }
            0x98 => {
                // RPC
                let Some(&param) = bytes.get(1) else {
                    trace!("RPC truncated");
                    return bytes.len();
                };
                self.pending_repeat = Some(param & 0x3F);
                2
            }
            0x99 => {
                // SPL
                self.underline = false;
                1
            }
            0x9A => {
                // STL
                self.underline = true;
                1
            }
            0x9B => self.handle_csi(bytes),
            0x9D => self.handle_time(bytes),
            other => {
                trace!(code = other, "unknown C1 control, skipped");
                1
            }
        }
    }

    /// Handles COL: palette selection or color index assignment.
    fn handle_col(&mut self, bytes: &[u8]) -> usize {
        let Some(&p1) = bytes.get(1) else {
            trace!("COL truncated");
            return bytes.len();
        };
        match p1 {
            0x20 => {
                let Some(&p2) = bytes.get(2) else {
                    trace!("COL palette truncated");
                    return bytes.len();
                };
                self.palette = p2 & 0x0F;
                3
            }
            0x40..=0x4F => {
                self.text_color = tables::clut_color(self.palette, p1 & 0x0F);
                2
            }
            0x50..=0x5F => {
                self.back_color = tables::clut_color(self.palette, p1 & 0x0F);
                2
            }
            0x60..=0x7F => {
                // Half foreground/background, not modeled separately.
                trace!(param = p1, "COL half color ignored");
                2
            }
            other => {
                trace!(param = other, "unknown COL parameter");
                2
            }
        }
    }

    /// Skips a MACRO definition body without interpreting it.
    ///
    /// Inline macro redefinition is not supported; the definition is
    /// consumed through its `MACRO 0x4F` terminator so the body is never
    /// mistaken for displayable text.
    fn skip_macro_definition(&mut self, bytes: &[u8]) -> usize {
        match bytes.get(1) {
            Some(0x40) | Some(0x41) => {
                trace!("macro definition skipped");
                let mut pos = 2usize;
                while pos + 1 < bytes.len() {
                    if bytes[pos] == 0x95 && bytes[pos + 1] == 0x4F {
                        return pos + 2;
                    }
                    pos += 1;
                }
                bytes.len()
            }
            Some(&param) => {
                trace!(param, "unknown MACRO parameter");
                2
            }
            None => {
                trace!("MACRO truncated");
                bytes.len()
            }
        }
    }

    /// Handles a CSI parameterized command.
    fn handle_csi(&mut self, bytes: &[u8]) -> usize {
        let mut params: ArrayVec<u32, 8> = ArrayVec::new();
        let mut param = 0u32;
        let mut pos = 1usize;
        let final_byte = loop {
            let Some(&b) = bytes.get(pos) else {
                trace!("CSI truncated");
                return bytes.len();
            };
            pos += 1;
            match b {
                0x30..=0x39 => param = param.saturating_mul(10) + (b - 0x30) as u32,
                0x3B => {
                    if params.try_push(param).is_err() {
                        trace!("CSI parameter overflow, sequence skipped");
                        while let Some(&b) = bytes.get(pos) {
                            pos += 1;
                            if b == 0x20 {
                                pos += 1;
                                break;
                            }
                        }
                        return pos.min(bytes.len());
                    }
                    param = 0;
                }
                0x20 => {
                    let _ = params.try_push(param);
                    let Some(&f) = bytes.get(pos) else {
                        trace!("CSI missing final byte");
                        return bytes.len();
                    };
                    pos += 1;
                    break f;
                }
                // PLD/PLU/SCS take no parameters and no intermediate.
                f @ (0x5B | 0x5C | 0x6F) => break f,
                other => {
                    trace!(byte = other, "unexpected byte in CSI, sequence skipped");
                    while let Some(&b) = bytes.get(pos) {
                        pos += 1;
                        if b == 0x20 {
                            pos += 1; // final byte
                            break;
                        }
                    }
                    return pos.min(bytes.len());
                }
            }
        };

        self.dispatch_csi(final_byte, &params);
        pos.min(bytes.len())
    }

    /// Applies one CSI command.
    fn dispatch_csi(&mut self, final_byte: u8, params: &[u32]) {
        match (final_byte, params) {
            // SWF: plane geometry preset.
            (0x53, &[swf, ..]) => {
                self.swf = swf as u8;
                self.reset_writing_format();
            }
            // SDF: display area size.
            (0x56, &[width, height, ..]) => {
                self.area_width = width as i32;
                self.area_height = height as i32;
            }
            // SSM: character size.
            (0x57, &[width, height, ..]) => {
                self.char_width = width as i32;
                self.char_height = height as i32;
            }
            // SHS: horizontal spacing.
            (0x58, &[spacing, ..]) => {
                self.horizontal_spacing = spacing as i32;
            }
            // SVS: vertical spacing.
            (0x59, &[spacing, ..]) => {
                self.vertical_spacing = spacing as i32;
            }
            // PLD/PLU: partial line feed used for ruby, not applied.
            (0x5B, _) => trace!("PLD ignored"),
            (0x5C, _) => trace!("PLU ignored"),
            // GAA/SRC: coloring block / raster color designation.
            (0x5D, _) => trace!("GAA ignored"),
            (0x5E, _) => trace!("SRC ignored"),
            // SDP: display area origin.
            (0x5F, &[x, y, ..]) => {
                self.area_x = x as i32;
                self.area_y = y as i32;
            }
            // ACPS: active position in dots.
            (0x61, &[x, y, ..]) => {
                self.set_active_coordinate_dot(x as i32, y as i32);
            }
            // TCC: switch control.
            (0x62, _) => trace!("TCC ignored"),
            // ORN: character ornament.
            (0x63, &[0, ..]) => self.stroke_color = None,
            (0x63, &[1, color, ..]) => {
                let palette = (color / 100) as u8;
                let index = (color % 100) as u8;
                self.stroke_color = Some(tables::clut_color(palette, index));
            }
            (0x63, params) => trace!(?params, "unsupported ORN parameters"),
            // MDF: font modification.
            (0x64, &[0, ..]) => {
                self.bold = false;
                self.italic = false;
            }
            (0x64, &[1, ..]) => {
                self.bold = true;
                self.italic = false;
            }
            (0x64, &[2, ..]) => {
                self.bold = false;
                self.italic = true;
            }
            (0x64, &[3, ..]) => {
                self.bold = true;
                self.italic = true;
            }
            // CFS: character font set.
            (0x65, _) => trace!("CFS ignored"),
            // XCS: external character set.
            (0x66, _) => trace!("XCS ignored"),
            // PRA: built-in sound replay.
            (0x68, &[sound_id, ..]) => {
                self.has_builtin_sound = true;
                self.builtin_sound_id = sound_id as u8;
            }
            // RCS: raster color, plane background not modeled.
            (0x6E, _) => trace!("RCS ignored"),
            // SCS: skip character set.
            (0x6F, _) => trace!("SCS ignored"),
            (final_byte, params) => {
                trace!(final_byte, ?params, "unknown CSI command skipped");
            }
        }
    }

    /// Handles TIME: presentation wait and timing control.
    fn handle_time(&mut self, bytes: &[u8]) -> usize {
        let Some(&p1) = bytes.get(1) else {
            trace!("TIME truncated");
            return bytes.len();
        };
        match p1 {
            0x20 => {
                let Some(&p2) = bytes.get(2) else {
                    trace!("TIME wait truncated");
                    return bytes.len();
                };
                // Wait time in 0.1s units extends the caption duration.
                self.duration += (p2.wrapping_sub(0x40) & 0x3F) as i64 * 100;
                3
            }
            0x28 => {
                trace!("TIME control mode ignored");
                3.min(bytes.len())
            }
            0x29 => {
                // Loosely specified timing control: consume the full
                // parameter grammar, act on none of it.
                trace!("TIME presentation control ignored");
                let mut pos = 2usize;
                while let Some(&b) = bytes.get(pos) {
                    pos += 1;
                    if b == 0x20 {
                        pos += 1; // final byte
                        break;
                    }
                }
                pos.min(bytes.len())
            }
            other => {
                trace!(param = other, "unknown TIME parameter");
                2
            }
        }
    }

    /// Handles a GL/GR invocation against the designated set.
    fn handle_glgr(&mut self, bytes: &[u8], set: GraphicSet, out: &mut Vec<Caption>) -> usize {
        let c1 = bytes[0] & 0x7F;

        match set {
            GraphicSet::Macro => {
                self.execute_macro(c1, out);
                1
            }
            GraphicSet::Drcs(0) => {
                let Some(&b2) = bytes.get(1) else {
                    trace!("2-byte DRCS invocation truncated");
                    return bytes.len();
                };
                let code = ((c1 as u16) << 8) | (b2 & 0x7F) as u16;
                self.push_drcs(0, code);
                2
            }
            GraphicSet::Drcs(n) => {
                self.push_drcs(n, c1 as u16);
                1
            }
            set if set.bytes_per_char() == 2 => {
                let Some(&b2) = bytes.get(1) else {
                    trace!("2-byte invocation truncated");
                    return bytes.len();
                };
                let c2 = b2 & 0x7F;
                match codeset::convert(set, c1, c2, self.char_size.is_halfwidth()) {
                    Some(text) => self.push_text(set, text),
                    None => {
                        trace!(?set, c1, c2, "unassigned code, replacement emitted");
                        self.push_text(set, char::REPLACEMENT_CHARACTER.to_string());
                    }
                }
                2
            }
            set => {
                match codeset::convert(set, c1, 0, self.char_size.is_halfwidth()) {
                    Some(text) => self.push_text(set, text),
                    None if matches!(
                        set,
                        GraphicSet::MosaicA
                            | GraphicSet::MosaicB
                            | GraphicSet::MosaicC
                            | GraphicSet::MosaicD
                    ) =>
                    {
                        trace!(?set, c1, "mosaic invocation skipped");
                    }
                    None => {
                        trace!(?set, c1, "unassigned code, replacement emitted");
                        self.push_text(set, char::REPLACEMENT_CHARACTER.to_string());
                    }
                }
                1
            }
        }
    }

    /// Expands a default macro body. Macros cannot nest.
    fn execute_macro(&mut self, code: u8, out: &mut Vec<Caption>) {
        if self.macro_depth > 0 {
            trace!(code, "nested macro invocation skipped");
            return;
        }
        let body = tables::default_macro(code);
        if body.is_empty() {
            trace!(code, "undefined macro code");
            return;
        }
        self.macro_depth += 1;
        let body = body.to_vec();
        self.parse_statement_body(&body, out);
        self.macro_depth -= 1;
    }

    // ---- writing-format geometry -------------------------------------

    /// Horizontal scale of the current size class.
    fn horizontal_scale(&self) -> f32 {
        self.char_size.scale().0
    }

    /// Vertical scale of the current size class.
    fn vertical_scale(&self) -> f32 {
        self.char_size.scale().1
    }

    /// Scaled width of one character section in dots.
    fn section_width(&self) -> i32 {
        ((self.char_width + self.horizontal_spacing) as f32 * self.horizontal_scale()) as i32
    }

    /// Scaled height of one character section in dots.
    fn section_height(&self) -> i32 {
        ((self.char_height + self.vertical_spacing) as f32 * self.vertical_scale()) as i32
    }

    /// Check if the current section scale marks a ruby annotation run.
    fn is_ruby_mode(&self) -> bool {
        self.horizontal_scale() == 0.5 && self.vertical_scale() == 0.5
    }

    /// Switches the size class. A taller section can push the character
    /// top above the display area; the active position drops to the
    /// first line that fits.
    fn set_char_size(&mut self, size: CharSize) {
        self.char_size = size;
        if self.active_pos_inited && self.active_y - self.section_height() < self.area_y {
            self.active_y = self.area_y + self.section_height();
        }
    }

    /// Sets the active position from a cell coordinate. The stored point
    /// is the bottom-left of the character section.
    fn set_active_pos(&mut self, column: i32, line: i32) {
        self.active_x = self.area_x + column * self.section_width();
        self.active_y = self.area_y + (line + 1) * self.section_height();
        self.active_pos_inited = true;
    }

    /// Sets the active position from a dot coordinate relative to the
    /// display area origin.
    fn set_active_coordinate_dot(&mut self, x: i32, y: i32) {
        self.active_x = self.area_x + x;
        self.active_y = self.area_y + y;
        self.active_pos_inited = true;
    }

    /// Moves the active position by whole character sections, wrapping at
    /// the display-area edges.
    fn move_relative(&mut self, mut dx: i32, mut dy: i32) {
        if !self.active_pos_inited {
            self.set_active_pos(0, 0);
        }
        let sw = self.section_width();
        let sh = self.section_height();
        if sw <= 0 || sh <= 0 {
            return;
        }

        while dx < 0 {
            self.active_x -= sw;
            dx += 1;
            if self.active_x < self.area_x {
                self.active_x = self.area_x + self.area_width - sw;
                dy -= 1;
            }
        }
        while dx > 0 {
            self.active_x += sw;
            dx -= 1;
            if self.active_x + sw > self.area_x + self.area_width {
                self.active_x = self.area_x;
                dy += 1;
            }
        }
        while dy < 0 {
            self.active_y -= sh;
            dy += 1;
            if self.active_y - sh < self.area_y {
                self.active_y = self.area_y + self.area_height;
            }
        }
        while dy > 0 {
            self.active_y += sh;
            dy -= 1;
            if self.active_y > self.area_y + self.area_height {
                self.active_y = self.area_y + sh;
            }
        }
    }

    /// Carriage return: left margin plus one line feed.
    fn move_to_newline(&mut self) {
        if !self.active_pos_inited {
            self.set_active_pos(0, 0);
        }
        self.active_x = self.area_x;
        self.active_y += self.section_height();
        if self.active_y > self.area_y + self.area_height {
            self.active_y = self.area_y + self.section_height();
        }
    }

    // ---- caption assembly --------------------------------------------

    /// Emits converted text, honoring a pending repeat.
    fn push_text(&mut self, set: GraphicSet, text: String) {
        match self.pending_repeat.take() {
            None => self.push_caption_char(set, CharContent::Text(text)),
            Some(0) => {
                // Repeat to the display-area edge, never wrapping.
                let sw = self.section_width();
                if sw <= 0 {
                    return;
                }
                if !self.active_pos_inited {
                    self.set_active_pos(0, 0);
                }
                loop {
                    let x = self.active_x;
                    self.push_caption_char(set, CharContent::Text(text.clone()));
                    // The advance wraps at the area edge; repetition stops
                    // at the edge instead of continuing on the next line.
                    if self.active_x <= x {
                        break;
                    }
                }
            }
            Some(count) => {
                for _ in 0..count {
                    self.push_caption_char(set, CharContent::Text(text.clone()));
                }
            }
        }
    }

    /// Emits a DRCS glyph reference, honoring a pending repeat.
    fn push_drcs(&mut self, set_index: u8, code: u16) {
        let content = match self.drcs.get(set_index, code) {
            Some(glyph) => CharContent::Drcs {
                code,
                fallback: self.drcs.fallback_for(glyph),
            },
            None => {
                trace!(set_index, code, "undefined DRCS glyph, replacement emitted");
                CharContent::Text(char::REPLACEMENT_CHARACTER.to_string())
            }
        };
        let set = GraphicSet::Drcs(set_index);
        match self.pending_repeat.take() {
            None => self.push_caption_char(set, content),
            Some(0) => {
                let sw = self.section_width();
                if sw <= 0 {
                    return;
                }
                if !self.active_pos_inited {
                    self.set_active_pos(0, 0);
                }
                loop {
                    let x = self.active_x;
                    self.push_caption_char(set, content.clone());
                    if self.active_x <= x {
                        break;
                    }
                }
            }
            Some(count) => {
                for _ in 0..count {
                    self.push_caption_char(set, content.clone());
                }
            }
        }
    }

    /// Places one character at the active position and advances it.
    fn push_caption_char(&mut self, set: GraphicSet, content: CharContent) {
        if !self.active_pos_inited {
            self.set_active_pos(0, 0);
        }
        if self.caption.is_none() {
            self.caption = Some(Caption::new(CaptionType::Text));
        }
        if self.need_new_region() {
            self.make_new_region();
        }

        let sw = self.section_width();
        let sh = self.section_height();
        let caption_char = CaptionChar {
            content,
            codeset: set,
            x: self.active_x,
            y: self.active_y - sh,
            char_width: (self.char_width as f32 * self.horizontal_scale()) as i32,
            char_height: (self.char_height as f32 * self.vertical_scale()) as i32,
            horizontal_spacing: (self.horizontal_spacing as f32 * self.horizontal_scale()) as i32,
            vertical_spacing: (self.vertical_spacing as f32 * self.vertical_scale()) as i32,
            size: self.char_size,
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            flashing: self.flashing,
            stroke_color: self.stroke_color,
            enclosure: self.enclosure,
            text_color: self.text_color,
            back_color: self.back_color,
        };

        let caption = self.caption.as_mut().expect("caption created above");
        let region = caption.regions.last_mut().expect("region created above");
        region.width = (caption_char.x + sw) - region.x;
        region.height = region.height.max(sh);
        region.chars.push(caption_char);

        self.move_relative(1, 0);
    }

    /// Check if the next character can no longer continue the last region.
    fn need_new_region(&self) -> bool {
        let Some(caption) = &self.caption else {
            return true;
        };
        let Some(region) = caption.regions.last() else {
            return true;
        };
        let Some(last) = region.chars.last() else {
            // A fresh region is positioned when it is created.
            return region.x != self.active_x
                || region.y != self.active_y - self.section_height();
        };
        if self.active_x != last.x + last.section_width() {
            return true;
        }
        if self.active_y - self.section_height() != last.y {
            return true;
        }
        if self.section_height() != last.section_height() {
            return true;
        }
        false
    }

    /// Starts a region at the active position.
    fn make_new_region(&mut self) {
        let sh = self.section_height();
        let region = CaptionRegion {
            x: self.active_x,
            y: self.active_y - sh,
            width: 0,
            height: sh,
            is_ruby: self.is_ruby_mode(),
            chars: Vec::new(),
        };
        let caption = self.caption.as_mut().expect("caption exists");
        match caption.regions.last() {
            Some(last) if last.chars.is_empty() => {
                *caption.regions.last_mut().expect("just matched") = region;
            }
            _ => caption.regions.push(region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    /// Wraps a data group body into a caption PES payload.
    fn build_pes(data_identifier: u8, group_id: u8, body: &[u8]) -> Vec<u8> {
        let mut pes = vec![data_identifier, 0xFF, 0xF0];
        pes.push(group_id << 2);
        pes.push(0x00); // link number
        pes.push(0x00); // last link number
        pes.push((body.len() >> 8) as u8);
        pes.push((body.len() & 0xFF) as u8);
        pes.extend_from_slice(body);
        pes.extend_from_slice(&[0x00, 0x00]); // CRC16, not verified
        pes
    }

    /// Builds one data-unit record.
    fn unit(parameter: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x1F, parameter];
        bytes.push((payload.len() >> 16) as u8);
        bytes.push((payload.len() >> 8) as u8);
        bytes.push((payload.len() & 0xFF) as u8);
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Builds a statement data group body (TMD free) from data units.
    fn statement_body(units: &[Vec<u8>]) -> Vec<u8> {
        let loop_bytes: Vec<u8> = units.concat();
        let mut body = vec![0x00];
        body.push((loop_bytes.len() >> 16) as u8);
        body.push((loop_bytes.len() >> 8) as u8);
        body.push((loop_bytes.len() & 0xFF) as u8);
        body.extend_from_slice(&loop_bytes);
        body
    }

    /// Builds a full statement PES for language 0 from interpreter bytes.
    fn text_pes(bytes: &[u8]) -> Vec<u8> {
        build_pes(
            0x80,
            0x01,
            &statement_body(&[unit(UNIT_STATEMENT_BODY, bytes)]),
        )
    }

    /// Builds a management data group body announcing plain languages.
    fn management_body(languages: &[[u8; 3]]) -> Vec<u8> {
        let mut body = vec![0x00]; // TMD = free
        body.push(languages.len() as u8);
        for (index, code) in languages.iter().enumerate() {
            body.push((index as u8) << 5); // language tag, DMF 0
            body.extend_from_slice(code);
            body.push(0x00);
        }
        body.extend_from_slice(&[0, 0, 0]); // empty data unit loop
        body
    }

    /// Builds a DRCS-1..15 data unit defining one 24x24 1bpp glyph.
    fn drcs_unit(character_code: u16) -> Vec<u8> {
        let mut payload = vec![
            1, // NumberOfCode
            (character_code >> 8) as u8,
            (character_code & 0xFF) as u8,
            1,    // NumberOfFont
            0x00, // fontId 0, uncompressed two-tone
            0,    // depth: two levels
            24,
            24,
        ];
        payload.extend_from_slice(&[0xF0; 72]);
        unit(UNIT_DRCS_ONE_BYTE, &payload)
    }

    fn decode_all(decoder: &mut Decoder, pes: &[u8], pts: i64) -> (DecodeStatus, Vec<Caption>) {
        let mut captions = Vec::new();
        let status = decoder
            .decode(pes, pts, |caption| captions.push(caption))
            .expect("decode");
        (status, captions)
    }

    #[test]
    fn test_minimal_hiragana_statement() {
        let mut decoder = Decoder::with_defaults();
        // LS2R keeps GR on hiragana, then three GR invocations.
        let pes = text_pes(&[0x1B, 0x7D, 0xA1, 0xA2, 0xA3]);
        let (status, captions) = decode_all(&mut decoder, &pes, 1000);

        assert_eq!(status, DecodeStatus::GotCaption);
        assert_eq!(captions.len(), 1);
        let caption = &captions[0];
        assert_eq!(caption.caption_type, CaptionType::Text);
        assert_eq!(caption.pts, 1000);
        assert_eq!(caption.duration, 0);
        assert_eq!(caption.regions.len(), 1);

        let region = &caption.regions[0];
        assert_eq!(region.chars.len(), 3);
        assert_eq!(region.plain_text(), "ぁあぃ");
        assert_eq!(region.chars[0].x, 0);
        assert_eq!(region.chars[1].x, region.chars[0].section_width());
    }

    #[test]
    fn test_management_two_languages() {
        let mut decoder = Decoder::with_defaults();
        let pes = build_pes(0x80, 0x00, &management_body(&[*b"jpn", *b"eng"]));
        let (status, captions) = decode_all(&mut decoder, &pes, 500);

        assert_eq!(status, DecodeStatus::GotCaption);
        let caption = &captions[0];
        assert_eq!(caption.caption_type, CaptionType::Management);
        assert!(caption.regions.is_empty());
        assert_eq!(caption.languages.len(), 2);
        assert_eq!(caption.languages[0].iso639_code, 0x6A706E);
        assert_eq!(caption.languages[1].iso639_code, 0x656E67);

        assert_eq!(decoder.iso639_language_code(0), 0x6A706E);
        assert_eq!(decoder.iso639_language_code(1), 0x656E67);
        assert_eq!(decoder.iso639_language_code(5), 0);
    }

    #[test]
    fn test_swf_selects_plane_geometry() {
        let mut decoder = Decoder::with_defaults();
        // CSI SWF 9 then one hiragana character.
        let pes = text_pes(&[0x9B, 0x39, 0x20, 0x53, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        assert_eq!(captions[0].plane_width, 1280);
        assert_eq!(captions[0].plane_height, 720);
    }

    #[test]
    fn test_color_palette_selection() {
        let mut decoder = Decoder::with_defaults();
        // COL palette 1, COL background index 1, then a character.
        let pes = text_pes(&[0x90, 0x20, 0x01, 0x90, 0x51, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let ch = &captions[0].regions[0].chars[0];
        assert_eq!(ch.back_color, tables::clut_color(1, 1));
        assert_eq!(ch.text_color, tables::clut_color(0, 7));
    }

    #[test]
    fn test_drcs_definition_and_absolute_position() {
        let mut decoder = Decoder::with_defaults();
        let body = statement_body(&[
            drcs_unit(0x4141),
            unit(
                UNIT_STATEMENT_BODY,
                &[
                    0x1B, 0x29, 0x20, 0x41, // designate DRCS-1 into G1
                    0x0E, // LS1
                    0x1C, 0x42, 0x48, // APS line 2, column 8
                    0x41, // DRCS invocation
                ],
            ),
        ]);
        let pes = build_pes(0x80, 0x01, &body);
        let (status, captions) = decode_all(&mut decoder, &pes, 0);

        assert_eq!(status, DecodeStatus::GotCaption);
        let region = &captions[0].regions[0];
        // Default sections are (36+4)x(36+24) dots.
        assert_eq!(region.x, 8 * 40);
        assert_eq!(region.y, 2 * 60);
        assert_eq!(region.chars.len(), 1);
        assert!(matches!(
            region.chars[0].content,
            CharContent::Drcs { code: 0x41, .. }
        ));
        assert_eq!(region.chars[0].codeset, GraphicSet::Drcs(1));
    }

    #[test]
    fn test_undefined_drcs_emits_replacement() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[
            0x1B, 0x29, 0x20, 0x41, // designate DRCS-1 into G1
            0x0E, // LS1
            0x41,
        ]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].regions[0].plain_text(), "\u{FFFD}");
    }

    #[test]
    fn test_clear_screen_across_packets() {
        let mut decoder = Decoder::with_defaults();

        let (_, first) = decode_all(&mut decoder, &text_pes(&[0xA1]), 1000);
        let (_, clear) = decode_all(&mut decoder, &text_pes(&[0x0C]), 1000);
        let (_, second) = decode_all(&mut decoder, &text_pes(&[0xA2]), 2000);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].caption_type, CaptionType::Text);
        assert_eq!(first[0].pts, 1000);

        assert_eq!(clear.len(), 1);
        assert_eq!(clear[0].caption_type, CaptionType::ClearScreen);
        assert_eq!(clear[0].pts, 1000);
        assert!(clear[0].regions.is_empty());

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].caption_type, CaptionType::Text);
        assert_eq!(second[0].pts, 2000);
    }

    #[test]
    fn test_clear_screen_within_packet() {
        let mut decoder = Decoder::with_defaults();
        let (status, captions) = decode_all(&mut decoder, &text_pes(&[0xA1, 0x0C, 0xA2]), 1000);

        assert_eq!(status, DecodeStatus::GotCaptionList);
        assert_eq!(captions.len(), 3);
        assert_eq!(captions[0].caption_type, CaptionType::Text);
        assert_eq!(captions[0].plain_text(), "ぁ");
        assert_eq!(captions[1].caption_type, CaptionType::ClearScreen);
        assert_eq!(captions[2].caption_type, CaptionType::Text);
        assert_eq!(captions[2].plain_text(), "あ");
    }

    #[test]
    fn test_empty_payload_is_no_caption() {
        let mut decoder = Decoder::with_defaults();
        let mut called = false;
        let status = decoder.decode(&[], 0, |_| called = true).unwrap();
        assert_eq!(status, DecodeStatus::NoCaption);
        assert!(!called);
    }

    #[test]
    fn test_minimum_zero_packet_is_error() {
        let mut decoder = Decoder::with_defaults();
        assert!(decoder.decode(&[0, 0, 0], 0, |_| ()).is_err());
        // The decoder stays usable afterwards.
        let (status, _) = decode_all(&mut decoder, &text_pes(&[0xA1]), 0);
        assert_eq!(status, DecodeStatus::GotCaption);
    }

    #[test]
    fn test_csi_with_only_final_byte() {
        let mut decoder = Decoder::with_defaults();
        // SWF with an empty parameter list falls back to kept geometry;
        // paramless PLD is consumed without an intermediate byte.
        let pes = text_pes(&[0x9B, 0x20, 0x53, 0x9B, 0x5B, 0xA1]);
        let (status, captions) = decode_all(&mut decoder, &pes, 0);

        assert_eq!(status, DecodeStatus::GotCaption);
        assert_eq!(captions[0].plane_width, 960);
        assert_eq!(captions[0].plane_height, 540);
    }

    #[test]
    fn test_single_shift_at_end_of_payload() {
        let mut decoder = Decoder::with_defaults();
        let (status, captions) = decode_all(&mut decoder, &text_pes(&[0x19]), 0);
        assert_eq!(status, DecodeStatus::NoCaption);
        assert!(captions.is_empty());
    }

    #[test]
    fn test_single_shift_selects_one_character() {
        let mut decoder = Decoder::with_defaults();
        // SS2 reads one character from G2 (hiragana), then GL returns to
        // the kanji set: 0x46 0x7C is JIS for 日.
        let pes = text_pes(&[0x19, 0x21, 0x46, 0x7C]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "ぁ日");
    }

    #[test]
    fn test_rpc_zero_fills_to_line_end() {
        let mut decoder = Decoder::with_defaults();
        // APS to column 10, then RPC 0 and one character. The default
        // area holds 24 sections of 40 dots.
        let pes = text_pes(&[0x1C, 0x40, 0x4A, 0x98, 0x40, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let region = &captions[0].regions[0];
        assert_eq!(region.chars.len(), 14);
        assert_eq!(region.chars[0].x, 400);
        for ch in &region.chars {
            assert!(ch.x + ch.section_width() <= 960);
        }
    }

    #[test]
    fn test_rpc_repeats_character() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[0x98, 0x43, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].regions[0].plain_text(), "ぁぁぁ");
    }

    #[test]
    fn test_kanji_statement() {
        let mut decoder = Decoder::with_defaults();
        // GL starts on the kanji set: 日本 as JIS row-cell pairs.
        let pes = text_pes(&[0x46, 0x7C, 0x4B, 0x5C]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "日本");
    }

    #[test]
    fn test_additional_symbol_invocation() {
        let mut decoder = Decoder::with_defaults();
        // Row 90 of the kanji plane carries broadcast symbols.
        let pes = text_pes(&[0x7A, 0x56]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "[字]");
    }

    #[test]
    fn test_medium_size_halves_advance() {
        let mut decoder = Decoder::with_defaults();
        // LS1 to alphanumeric, MSZ, then 'A'.
        let pes = text_pes(&[0x0E, 0x89, 0x41]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let ch = &captions[0].regions[0].chars[0];
        assert_eq!(ch.content, CharContent::Text("A".to_string()));
        assert_eq!(ch.size, CharSize::Medium);
        assert_eq!(ch.section_width(), 20);
        assert_eq!(ch.section_height(), 60);
    }

    #[test]
    fn test_fullwidth_alnum_at_normal_size() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[0x0E, 0x41]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "Ａ");
    }

    #[test]
    fn test_styles_applied_to_characters() {
        let mut decoder = Decoder::with_defaults();
        // STL underline, CSI MDF 1 bold, HLC all sides, then a character.
        let pes = text_pes(&[0x9A, 0x9B, 0x31, 0x20, 0x64, 0x97, 0x4F, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let ch = &captions[0].regions[0].chars[0];
        assert!(ch.underline);
        assert!(ch.bold);
        assert!(!ch.italic);
        assert!(!ch.enclosure.is_none());
    }

    #[test]
    fn test_time_wait_accumulates_duration() {
        let mut decoder = Decoder::with_defaults();
        // TIME wait 0x45 - 0x40 = 5 tenths of a second.
        let pes = text_pes(&[0x9D, 0x20, 0x45, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].duration, 500);
    }

    #[test]
    fn test_builtin_sound_flag() {
        let mut decoder = Decoder::with_defaults();
        // CSI PRA 3, then a character.
        let pes = text_pes(&[0x9B, 0x33, 0x20, 0x68, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert!(captions[0].has_builtin_sound);
        assert_eq!(captions[0].builtin_sound_id, 3);
    }

    #[test]
    fn test_newline_starts_new_region() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[0xA1, 0x0D, 0xA2]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let regions = &captions[0].regions;
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].plain_text(), "ぁ");
        assert_eq!(regions[1].plain_text(), "あ");
        assert_eq!(regions[1].x, 0);
        assert_eq!(regions[1].y, regions[0].y + 60);
    }

    #[test]
    fn test_continuous_line_shares_region() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[0xA1, 0xA2, 0xA3]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        assert_eq!(captions[0].regions.len(), 1);
        let region = &captions[0].regions[0];
        assert_eq!(region.width, 3 * 40);
        assert_eq!(region.height, 60);
    }

    #[test]
    fn test_char_positions_within_plane() {
        let mut decoder = Decoder::with_defaults();
        let packets = [
            text_pes(&[0xA1, 0xA2, 0xA3, 0x0D, 0xA4]),
            text_pes(&[0x1C, 0x43, 0x45, 0xA5, 0xA6]),
            text_pes(&[0x88, 0xA7, 0x8A, 0xA8]),
        ];
        for pes in &packets {
            let (_, captions) = decode_all(&mut decoder, pes, 0);
            for caption in &captions {
                for region in &caption.regions {
                    for ch in &region.chars {
                        assert!(ch.x >= 0 && ch.x < caption.plane_width);
                        assert!(ch.y >= 0 && ch.y < caption.plane_height);
                        assert!(ch.char_width > 0);
                        assert!(ch.char_height > 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_regions_nonempty_iff_text() {
        let mut decoder = Decoder::with_defaults();
        let packets = [
            build_pes(0x80, 0x00, &management_body(&[*b"jpn"])),
            text_pes(&[0xA1, 0x0C, 0xA2]),
        ];
        for pes in &packets {
            let (_, captions) = decode_all(&mut decoder, pes, 0);
            for caption in &captions {
                assert_eq!(
                    caption.caption_type == CaptionType::Text,
                    !caption.regions.is_empty()
                );
            }
        }
    }

    #[test]
    fn test_determinism_across_decoders() {
        let packets = [
            build_pes(0x80, 0x00, &management_body(&[*b"jpn", *b"eng"])),
            text_pes(&[0x9B, 0x39, 0x20, 0x53, 0x1B, 0x7D, 0xA1, 0xA2]),
            text_pes(&[0x0C]),
            text_pes(&[0x90, 0x20, 0x02, 0x90, 0x53, 0xA3, 0x0D, 0xA4]),
        ];

        let run = || {
            let mut decoder = Decoder::with_defaults();
            let mut all = Vec::new();
            for (index, pes) in packets.iter().enumerate() {
                decoder
                    .decode(pes, index as i64 * 100, |caption| all.push(caption))
                    .unwrap();
            }
            all
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut decoder = Decoder::with_defaults();
        decode_all(&mut decoder, &text_pes(&[0x9B, 0x39, 0x20, 0x53, 0xA1]), 0);

        let mut drained = Vec::new();
        // Statement finalization already drained the caption, so nothing
        // is pending at flush time.
        let first = decoder.flush(|caption| drained.push(caption));
        let second = decoder.flush(|caption| drained.push(caption));
        assert!(!first);
        assert!(!second);
        assert!(drained.is_empty());

        // State is back to the post-construction defaults.
        let (_, captions) = decode_all(&mut decoder, &text_pes(&[0xA1]), 0);
        assert_eq!(captions[0].plane_width, 960);
        assert_eq!(captions[0].plane_height, 540);
    }

    #[test]
    fn test_language_filtering() {
        let mut decoder = Decoder::with_defaults();
        // Statement for language index 1 (group id 2).
        let pes = build_pes(
            0x80,
            0x02,
            &statement_body(&[unit(UNIT_STATEMENT_BODY, &[0xA1])]),
        );
        let (status, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(status, DecodeStatus::NoCaption);
        assert!(captions.is_empty());

        decoder.set_language_id(1);
        let (status, _) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(status, DecodeStatus::GotCaption);
    }

    #[test]
    fn test_management_duplicate_suppression() {
        let mut decoder = Decoder::with_defaults();
        let group_a = build_pes(0x80, 0x00, &management_body(&[*b"jpn"]));
        let group_b = build_pes(0x80, 0x20, &management_body(&[*b"jpn"]));

        let (status, _) = decode_all(&mut decoder, &group_a, 0);
        assert_eq!(status, DecodeStatus::GotCaption);
        // Retransmission within the same group is dropped.
        let (status, _) = decode_all(&mut decoder, &group_a, 0);
        assert_eq!(status, DecodeStatus::NoCaption);
        // The other group toggles through.
        let (status, _) = decode_all(&mut decoder, &group_b, 0);
        assert_eq!(status, DecodeStatus::GotCaption);
    }

    #[test]
    fn test_superimpose_stream_type() {
        let mut caption_decoder = Decoder::with_defaults();
        let body = statement_body(&[unit(UNIT_STATEMENT_BODY, &[0xA1])]);
        let pes = build_pes(0x81, 0x01, &body);

        let (status, _) = decode_all(&mut caption_decoder, &pes, 0);
        assert_eq!(status, DecodeStatus::NoCaption);

        let mut superimpose_decoder = Decoder::new(
            DecoderOptions::new().with_stream_type(StreamType::Superimpose),
        );
        let (status, captions) = decode_all(&mut superimpose_decoder, &pes, 0);
        assert_eq!(status, DecodeStatus::GotCaption);
        assert!(captions[0].is_superimpose);
    }

    #[test]
    fn test_profile_c_invokes_drcs_by_default() {
        let mut decoder =
            Decoder::new(DecoderOptions::new().with_profile(Profile::ProfileC));
        let body = statement_body(&[
            drcs_unit(0x4141),
            unit(UNIT_STATEMENT_BODY, &[0x41]),
        ]);
        let pes = build_pes(0x80, 0x01, &body);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        assert!(matches!(
            captions[0].regions[0].chars[0].content,
            CharContent::Drcs { code: 0x41, .. }
        ));
    }

    #[test]
    fn test_macro_invocation_switches_codesets() {
        let mut decoder = Decoder::with_defaults();
        // LS3 brings the macro set into GL; macro 0x61 redesignates G1
        // to katakana and returns GL to G0. LS1 then selects katakana.
        let pes = text_pes(&[0x1B, 0x6F, 0x61, 0x0E, 0x21]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "ァ");
    }

    #[test]
    fn test_mosaic_invocation_is_skipped() {
        let mut decoder = Decoder::with_defaults();
        // Designate mosaic A into G1, invoke it, then a hiragana byte.
        let pes = text_pes(&[0x1B, 0x29, 0x32, 0x0E, 0x21, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        assert_eq!(captions[0].plain_text(), "ぁ");
    }

    #[test]
    fn test_space_width_follows_char_size() {
        let mut decoder = Decoder::with_defaults();
        let pes = text_pes(&[0x20, 0x89, 0x20, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let chars: Vec<_> = captions[0]
            .regions
            .iter()
            .flat_map(|r| r.chars.iter())
            .collect();
        assert_eq!(chars[0].content, CharContent::Text("\u{3000}".to_string()));
        assert_eq!(chars[1].content, CharContent::Text(" ".to_string()));
    }

    #[test]
    fn test_display_area_and_position_commands() {
        let mut decoder = Decoder::with_defaults();
        // SDF 400x300, SDP origin (100, 60), then a character at cell 0,0.
        let pes = text_pes(&[
            0x9B, 0x34, 0x30, 0x30, 0x3B, 0x33, 0x30, 0x30, 0x20, 0x56, // SDF
            0x9B, 0x31, 0x30, 0x30, 0x3B, 0x36, 0x30, 0x20, 0x5F, // SDP
            0xA1,
        ]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);

        let region = &captions[0].regions[0];
        assert_eq!(region.x, 100);
        assert_eq!(region.y, 60);
    }

    #[test]
    fn test_ruby_region_flag() {
        let mut decoder = Decoder::with_defaults();
        // Small size marks ruby runs.
        let pes = text_pes(&[0x88, 0xA1]);
        let (_, captions) = decode_all(&mut decoder, &pes, 0);
        let region = &captions[0].regions[0];
        assert!(region.is_ruby);
        assert_eq!(region.height, 30);
    }
}
