//! Static code tables for the ARIB STD-B24 character repertoire.
//!
//! Tabulated mappings from graphic codes (`0x21..=0x7E`) to Unicode:
//! fullwidth alphanumerics, hiragana, katakana, JIS X 0201 katakana, the
//! ARIB additional-symbol (gaiji) area of the kanji plane, the sixteen
//! default macro bodies, and the 128-entry color CLUT.
//!
//! Unassigned positions inside a table hold the fullwidth space; codes
//! outside a table's range resolve to `None` at the lookup functions.

use crate::types::Color;

/// Fullwidth alphanumerics, indexed by code - 0x21.
static ALNUM_TABLE: [char; 94] = [
    '！', '”', '＃', '＄', '％', '＆', '’', '（', '）', '＊',
    '＋', '，', '－', '．', '／', '０', '１', '２', '３', '４',
    '５', '６', '７', '８', '９', '：', '；', '＜', '＝', '＞',
    '？', '＠', 'Ａ', 'Ｂ', 'Ｃ', 'Ｄ', 'Ｅ', 'Ｆ', 'Ｇ', 'Ｈ',
    'Ｉ', 'Ｊ', 'Ｋ', 'Ｌ', 'Ｍ', 'Ｎ', 'Ｏ', 'Ｐ', 'Ｑ', 'Ｒ',
    'Ｓ', 'Ｔ', 'Ｕ', 'Ｖ', 'Ｗ', 'Ｘ', 'Ｙ', 'Ｚ', '［', '￥',
    '］', '＾', '＿', '　', 'ａ', 'ｂ', 'ｃ', 'ｄ', 'ｅ', 'ｆ',
    'ｇ', 'ｈ', 'ｉ', 'ｊ', 'ｋ', 'ｌ', 'ｍ', 'ｎ', 'ｏ', 'ｐ',
    'ｑ', 'ｒ', 'ｓ', 'ｔ', 'ｕ', 'ｖ', 'ｗ', 'ｘ', 'ｙ', 'ｚ',
    '｛', '｜', '｝', '￣',
];

/// Hiragana, indexed by code - 0x21. Tail carries the shared punctuation.
static HIRAGANA_TABLE: [char; 94] = [
    'ぁ', 'あ', 'ぃ', 'い', 'ぅ', 'う', 'ぇ', 'え', 'ぉ', 'お',
    'か', 'が', 'き', 'ぎ', 'く', 'ぐ', 'け', 'げ', 'こ', 'ご',
    'さ', 'ざ', 'し', 'じ', 'す', 'ず', 'せ', 'ぜ', 'そ', 'ぞ',
    'た', 'だ', 'ち', 'ぢ', 'っ', 'つ', 'づ', 'て', 'で', 'と',
    'ど', 'な', 'に', 'ぬ', 'ね', 'の', 'は', 'ば', 'ぱ', 'ひ',
    'び', 'ぴ', 'ふ', 'ぶ', 'ぷ', 'へ', 'べ', 'ぺ', 'ほ', 'ぼ',
    'ぽ', 'ま', 'み', 'む', 'め', 'も', 'ゃ', 'や', 'ゅ', 'ゆ',
    'ょ', 'よ', 'ら', 'り', 'る', 'れ', 'ろ', 'ゎ', 'わ', 'ゐ',
    'ゑ', 'を', 'ん', '　', '　', '　', 'ゝ', 'ゞ', 'ー', '。',
    '「', '」', '、', '・',
];

/// Katakana, indexed by code - 0x21.
static KATAKANA_TABLE: [char; 94] = [
    'ァ', 'ア', 'ィ', 'イ', 'ゥ', 'ウ', 'ェ', 'エ', 'ォ', 'オ',
    'カ', 'ガ', 'キ', 'ギ', 'ク', 'グ', 'ケ', 'ゲ', 'コ', 'ゴ',
    'サ', 'ザ', 'シ', 'ジ', 'ス', 'ズ', 'セ', 'ゼ', 'ソ', 'ゾ',
    'タ', 'ダ', 'チ', 'ヂ', 'ッ', 'ツ', 'ヅ', 'テ', 'デ', 'ト',
    'ド', 'ナ', 'ニ', 'ヌ', 'ネ', 'ノ', 'ハ', 'バ', 'パ', 'ヒ',
    'ビ', 'ピ', 'フ', 'ブ', 'プ', 'ヘ', 'ベ', 'ペ', 'ホ', 'ボ',
    'ポ', 'マ', 'ミ', 'ム', 'メ', 'モ', 'ャ', 'ヤ', 'ュ', 'ユ',
    'ョ', 'ヨ', 'ラ', 'リ', 'ル', 'レ', 'ロ', 'ヮ', 'ワ', 'ヰ',
    'ヱ', 'ヲ', 'ン', 'ヴ', 'ヵ', 'ヶ', 'ヽ', 'ヾ', 'ー', '。',
    '「', '」', '、', '・',
];

/// JIS X 0201 katakana, indexed by code - 0x21.
static JIS_KATAKANA_TABLE: [char; 94] = [
    '。', '「', '」', '、', '・', 'ヲ', 'ァ', 'ィ', 'ゥ', 'ェ',
    'ォ', 'ャ', 'ュ', 'ョ', 'ッ', 'ー', 'ア', 'イ', 'ウ', 'エ',
    'オ', 'カ', 'キ', 'ク', 'ケ', 'コ', 'サ', 'シ', 'ス', 'セ',
    'ソ', 'タ', 'チ', 'ツ', 'テ', 'ト', 'ナ', 'ニ', 'ヌ', 'ネ',
    'ノ', 'ハ', 'ヒ', 'フ', 'ヘ', 'ホ', 'マ', 'ミ', 'ム', 'メ',
    'モ', 'ヤ', 'ユ', 'ヨ', 'ラ', 'リ', 'ル', 'レ', 'ロ', 'ワ',
    'ン', '゛', '゜', '　', '　', '　', '　', '　', '　', '　',
    '　', '　', '　', '　', '　', '　', '　', '　', '　', '　',
    '　', '　', '　', '　', '　', '　', '　', '　', '　', '　',
    '　', '　', '　', '　',
];

/// Additional kanji/symbol row 85 (codes 0x7521..=0x757E).
static SYMBOLS_ROW85: [&str; 94] = [
    "㐂", "𠅘", "份", "仿", "侚", "俉", "傜", "儞",
    "冼", "㔟", "匇", "卡", "卬", "詹", "𠮷", "呍",
    "咖", "咜", "咩", "唎", "啊", "噲", "囤", "圳",
    "圴", "塚", "墀", "姤", "娣", "婕", "寬", "﨑",
    "㟢", "庬", "弴", "彅", "德", "怗", "恵", "愰",
    "昤", "曈", "曙", "曺", "曻", "桒", "鿄", "椑",
    "椻", "橅", "檑", "櫛", "𣏌", "𣏾", "𣗄", "毱",
    "泠", "洮", "海", "涿", "淊", "淸", "渚", "潞",
    "濹", "灤", "𤋮", "𤋮", "煇", "燁", "爀", "玟",
    "玨", "珉", "珖", "琛", "琡", "琢", "琦", "琪",
    "琬", "琹", "瑋", "㻚", "畵", "疁", "睲", "䂓",
    "磈", "磠", "祇", "禮", "鿆", "䄃",
];

/// Additional kanji/symbol row 86 (codes 0x7621..=0x764B).
static SYMBOLS_ROW86: [&str; 43] = [
    "鿅", "秚", "稞", "筿", "簱", "䉤", "綋", "羡",
    "脘", "脺", "舘", "芮", "葛", "蓜", "蓬", "蕙",
    "藎", "蝕", "蟬", "蠋", "裵", "角", "諶", "跎",
    "辻", "迶", "郝", "鄧", "鄭", "醲", "鈳", "銈",
    "錡", "鍈", "閒", "雞", "餃", "饀", "髙", "鯖",
    "鷗", "麴", "麵",
];

/// Broadcast service symbols, row 90 (codes 0x7A50..=0x7A74).
static SYMBOLS_ROW90: [&str; 37] = [
    "[HV]", "[SD]", "[Ｐ]", "[Ｗ]", "[MV]", "[手]", "[字]", "[双]",
    "[デ]", "[Ｓ]", "[二]", "[多]", "[解]", "[SS]", "[Ｂ]", "[Ｎ]",
    "■", "●", "[天]", "[交]", "[映]", "[無]", "[料]", "[年齢制限]",
    "[前]", "[後]", "[再]", "[新]", "[初]", "[終]", "[生]", "[販]",
    "[声]", "[吹]", "[PPV]", "(秘)", "ほか",
];

/// Enclosed and squared symbols, row 92 (codes 0x7C21..=0x7C7B).
static SYMBOLS_ROW92: [&str; 91] = [
    "→", "←", "↑", "↓", "●", "○", "年", "月",
    "日", "円", "㎡", "㎥", "㎝", "㎠", "㎤", "０.",
    "１.", "２.", "３.", "４.", "５.", "６.", "７.", "８.",
    "９.", "氏", "副", "元", "故", "前", "[新]", "０,",
    "１,", "２,", "３,", "４,", "５,", "６,", "７,", "８,",
    "９,", "(社)", "(財)", "(有)", "(株)", "(代)", "(問)", "▶",
    "◀", "〖", "〗", "⟐", "^2", "^3", "(CD)", "(vn)",
    "(ob)", "(cb)", "(ce", "mb)", "(hp)", "(br)", "(p)", "(s)",
    "(ms)", "(t)", "(bs)", "(b)", "(tb)", "(tp)", "(ds)", "(ag)",
    "(eg)", "(vo)", "(fl)", "(ke", "y)", "(sa", "x)", "(sy",
    "n)", "(or", "g)", "(pe", "r)", "(R)", "(C)", "(箏)",
    "DJ", "[演]", "Fax",
];

/// Units and pictographs, row 93 (codes 0x7D21..=0x7D7B).
static SYMBOLS_ROW93: [&str; 91] = [
    "㈪", "㈫", "㈬", "㈭", "㈮", "㈯", "㈰", "㈷",
    "㍾", "㍽", "㍼", "㍻", "№", "℡", "〶", "○",
    "〔本〕", "〔三〕", "〔二〕", "〔安〕", "〔点〕", "〔打〕", "〔盗〕", "〔勝〕",
    "〔敗〕", "〔Ｓ〕", "［投］", "［捕］", "［一］", "［二］", "［三］", "［遊］",
    "［左］", "［中］", "［右］", "［指］", "［走］", "［打］", "㍑", "㎏",
    "㎐", "ha", "㎞", "㎢", "㍱", "・", "・", "1/2",
    "0/3", "1/3", "2/3", "1/4", "3/4", "1/5", "2/5", "3/5",
    "4/5", "1/6", "5/6", "1/7", "1/8", "1/9", "1/10", "☀",
    "☁", "☂", "⛄", "☖", "☗", "▽", "▼", "♦",
    "♥", "♣", "♠", "⌺", "⦿", "‼", "⁉", "(曇/晴)",
    "☔", "(雨)", "(雪)", "(大雪)", "⚡", "(雷雨)", "⛈", "⚞",
    "⚟", "♬", "☎",
];

/// Pictographs, row 94 (codes 0x7E21..=0x7E7D).
static SYMBOLS_ROW94: [&str; 93] = [
    "Ⅰ", "Ⅱ", "Ⅲ", "Ⅳ", "Ⅴ", "Ⅵ", "Ⅶ", "Ⅷ",
    "Ⅸ", "Ⅹ", "Ⅺ", "Ⅻ", "⑰", "⑱", "⑲", "⑳",
    "⑴", "⑵", "⑶", "⑷", "⑸", "⑹", "⑺", "⑻",
    "⑼", "⑽", "⑾", "⑿", "㉑", "㉒", "㉓", "㉔",
    "(A)", "(B)", "(C)", "(D)", "(E)", "(F)", "(G)", "(H)",
    "(I)", "(J)", "(K)", "(L)", "(M)", "(N)", "(O)", "(P)",
    "(Q)", "(R)", "(S)", "(T)", "(U)", "(V)", "(W)", "(X)",
    "(Y)", "(Z)", "㉕", "㉖", "㉗", "㉘", "㉙", "㉚",
    "①", "②", "③", "④", "⑤", "⑥", "⑦", "⑧",
    "⑨", "⑩", "⑪", "⑫", "⑬", "⑭", "⑮", "⑯",
    "❶", "❷", "❸", "❹", "❺", "❻", "❼", "❽",
    "❾", "❿", "⓫", "⓬", "㉛",
];

/// Fullwidth alphanumeric lookup. `halfwidth` selects the plain ASCII
/// form used at reduced horizontal scale (MSZ/SSZ).
pub(crate) fn alnum(code: u8, halfwidth: bool) -> Option<char> {
    if !(0x21..=0x7E).contains(&code) {
        return None;
    }
    if halfwidth {
        Some(code as char)
    } else {
        Some(ALNUM_TABLE[(code - 0x21) as usize])
    }
}

/// Hiragana lookup.
pub(crate) fn hiragana(code: u8) -> Option<char> {
    if !(0x21..=0x7E).contains(&code) {
        return None;
    }
    Some(HIRAGANA_TABLE[(code - 0x21) as usize])
}

/// Katakana lookup.
pub(crate) fn katakana(code: u8) -> Option<char> {
    if !(0x21..=0x7E).contains(&code) {
        return None;
    }
    Some(KATAKANA_TABLE[(code - 0x21) as usize])
}

/// JIS X 0201 katakana lookup.
pub(crate) fn jis_katakana(code: u8) -> Option<char> {
    if !(0x21..=0x7E).contains(&code) {
        return None;
    }
    Some(JIS_KATAKANA_TABLE[(code - 0x21) as usize])
}

/// ARIB additional-symbol lookup by the full two-byte code
/// (`first << 8 | second`). Covers kanji-plane rows 85, 86, 90, 92, 93
/// and 94; symbols may expand to multi-codepoint strings.
pub(crate) fn additional_symbol(code: u16) -> Option<&'static str> {
    let entry = match code {
        0x7521..=0x757E => SYMBOLS_ROW85[(code - 0x7521) as usize],
        0x7621..=0x764B => SYMBOLS_ROW86[(code - 0x7621) as usize],
        0x7A50..=0x7A74 => SYMBOLS_ROW90[(code - 0x7A50) as usize],
        0x7C21..=0x7C7B => SYMBOLS_ROW92[(code - 0x7C21) as usize],
        0x7D21..=0x7D7B => SYMBOLS_ROW93[(code - 0x7D21) as usize],
        0x7E21..=0x7E7D => SYMBOLS_ROW94[(code - 0x7E21) as usize],
        _ => return None,
    };
    Some(entry)
}

/// Default macro bodies for codes `0x60..=0x6F`.
///
/// Each body redesignates G0..G3 and re-invokes the locking shifts, so a
/// macro invocation fully restates the code-extension state.
static DEFAULT_MACROS: [&[u8]; 16] = [
    b"\x1B\x24\x42\x1B\x29\x4A\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x24\x42\x1B\x29\x31\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x24\x42\x1B\x29\x20\x41\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x32\x1B\x29\x34\x1B\x2A\x35\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x32\x1B\x29\x33\x1B\x2A\x35\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x32\x1B\x29\x20\x41\x1B\x2A\x35\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x20\x41\x1B\x29\x20\x42\x1B\x2A\x20\x43\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x20\x44\x1B\x29\x20\x45\x1B\x2A\x20\x46\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x20\x47\x1B\x29\x20\x48\x1B\x2A\x20\x49\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x20\x4A\x1B\x29\x20\x4B\x1B\x2A\x20\x4C\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x20\x4D\x1B\x29\x20\x4E\x1B\x2A\x20\x4F\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x24\x42\x1B\x29\x20\x42\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x24\x42\x1B\x29\x20\x43\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x24\x42\x1B\x29\x20\x44\x1B\x2A\x30\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x31\x1B\x29\x30\x1B\x2A\x4A\x1B\x2B\x20\x70\x0F\x1B\x7D",
    b"\x1B\x28\x4A\x1B\x29\x32\x1B\x2A\x20\x41\x1B\x2B\x20\x70\x0F\x1B\x7D",
];

/// Returns the default macro body for a macro code, empty when the code
/// is outside `0x60..=0x6F`.
pub(crate) fn default_macro(code: u8) -> &'static [u8] {
    if (0x60..=0x6F).contains(&code) {
        DEFAULT_MACROS[(code - 0x60) as usize]
    } else {
        &[]
    }
}

/// Standard palette (bank 0) of the B24 color CLUT: eight full colors,
/// transparent, then the seven half-intensity colors at alpha 128.
static PALETTE0: [Color; 16] = [
    Color::rgb(0, 0, 0),
    Color::rgb(255, 0, 0),
    Color::rgb(0, 255, 0),
    Color::rgb(255, 255, 0),
    Color::rgb(0, 0, 255),
    Color::rgb(255, 0, 255),
    Color::rgb(0, 255, 255),
    Color::rgb(255, 255, 255),
    Color::TRANSPARENT,
    Color::rgba(255, 0, 0, 128),
    Color::rgba(0, 255, 0, 128),
    Color::rgba(255, 255, 0, 128),
    Color::rgba(0, 0, 255, 128),
    Color::rgba(255, 0, 255, 128),
    Color::rgba(0, 255, 255, 128),
    Color::rgba(255, 255, 255, 128),
];

const GRADATION_LEVELS: [u8; 4] = [0, 85, 170, 255];

/// Resolves a CLUT entry. `palette` selects one of the eight 16-entry
/// banks; bank 0 is the standard assignment, banks 1..=7 enumerate the
/// gradation combinations (banks 5..=7 at alpha 128).
pub(crate) fn clut_color(palette: u8, index: u8) -> Color {
    let palette = (palette & 0x07) as usize;
    let index = (index & 0x0F) as usize;
    if palette == 0 {
        return PALETTE0[index];
    }
    let entry = (palette - 1) * 16 + index;
    let (entry, alpha) = if entry < 64 {
        (entry, 255)
    } else {
        (entry - 64, 128)
    };
    Color::rgba(
        GRADATION_LEVELS[(entry >> 4) & 3],
        GRADATION_LEVELS[(entry >> 2) & 3],
        GRADATION_LEVELS[entry & 3],
        alpha,
    )
}
