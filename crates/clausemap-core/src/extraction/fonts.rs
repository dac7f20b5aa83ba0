use crate::extraction::{number, resolve};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::warn;

/// Width used for simple fonts without metrics, in glyph units (1/1000 em).
const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;
/// Default `/DW` for CID fonts.
const DEFAULT_CID_WIDTH: f64 = 1000.0;
/// Largest code a font can produce; codes are at most two bytes.
const MAX_CODE: u32 = 0xFFFF;
/// Largest single-byte code, the code space of simple fonts.
const MAX_SIMPLE_CODE: u32 = 0xFF;
/// Total codes that range entries (`bfrange`, `/W` runs) may expand to in
/// one font.
const MAX_RANGE_EXPANSION: usize = 0x20000;

/// One decoded glyph of a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance width in glyph units (1/1000 em).
    pub width: f64,
    /// Single-byte code 32, the only code word spacing applies to.
    pub is_word_space: bool,
}

/// What the interpreter needs to know about a font: how to split a string
/// into codes, how wide each code is, and what text it stands for.
#[derive(Debug, Clone)]
pub struct FontInfo {
    code_len: usize,
    widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: Option<ToUnicodeMap>,
}

impl FontInfo {
    /// Used when `Tf` names a font the resources do not define.
    pub fn fallback() -> Self {
        FontInfo {
            code_len: 1,
            widths: HashMap::new(),
            default_width: DEFAULT_SIMPLE_WIDTH,
            to_unicode: None,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let is_type0 = matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Type0");
        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| stream_bytes(doc, obj))
            .map(|bytes| ToUnicodeMap::parse(&String::from_utf8_lossy(&bytes)));

        if is_type0 {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| resolve(doc, obj).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|obj| resolve(doc, obj).as_dict().ok());
            let (widths, default_width) = match descendant {
                Some(d) => cid_widths(doc, d),
                None => (HashMap::new(), DEFAULT_CID_WIDTH),
            };
            FontInfo {
                code_len: 2,
                widths,
                default_width,
                to_unicode,
            }
        } else {
            let (widths, default_width) = simple_widths(doc, dict);
            FontInfo {
                code_len: 1,
                widths,
                default_width,
                to_unicode,
            }
        }
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.code_len == 2 && self.to_unicode.is_none() && bytes.starts_with(&[0xFE, 0xFF]) {
            let text = utf16be_lossy(&bytes[2..]);
            return text
                .chars()
                .map(|c| Glyph {
                    text: c.to_string(),
                    width: self.default_width,
                    is_word_space: false,
                })
                .collect();
        }

        bytes
            .chunks(self.code_len)
            .map(|chunk| {
                let code = code_from_bytes(chunk);
                let text = match self.to_unicode.as_ref().and_then(|m| m.get(code)) {
                    Some(s) => s.to_string(),
                    None if self.code_len == 1 => win_ansi_char(chunk[0]).to_string(),
                    None => char::from_u32(code)
                        .unwrap_or(char::REPLACEMENT_CHARACTER)
                        .to_string(),
                };
                Glyph {
                    text,
                    width: self.widths.get(&code).copied().unwrap_or(self.default_width),
                    is_word_space: self.code_len == 1 && code == 32,
                }
            })
            .collect()
    }
}

/// Fonts of one resource dictionary, keyed by resource name.
#[derive(Debug, Clone)]
pub struct FontTable {
    fonts: HashMap<Vec<u8>, Arc<FontInfo>>,
    fallback: Arc<FontInfo>,
}

impl FontTable {
    pub fn from_resources(doc: &Document, resources: Option<&Dictionary>) -> Self {
        let mut fonts = HashMap::new();
        let font_dict = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|obj| resolve(doc, obj).as_dict().ok());
        if let Some(font_dict) = font_dict {
            for (name, obj) in font_dict.iter() {
                if let Ok(dict) = resolve(doc, obj).as_dict() {
                    fonts.insert(name.clone(), Arc::new(FontInfo::from_dict(doc, dict)));
                }
            }
        }
        FontTable {
            fonts,
            fallback: Arc::new(FontInfo::fallback()),
        }
    }

    pub fn get(&self, name: &[u8]) -> Arc<FontInfo> {
        self.fonts
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> (HashMap<u32, f64>, f64) {
    let mut widths = HashMap::new();
    let first_char = dict
        .get(b"FirstChar")
        .ok()
        .and_then(|o| number(resolve(doc, o)))
        .unwrap_or(0.0) as u32;
    if let Some(arr) = dict
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
    {
        for (i, w) in arr.iter().enumerate() {
            let Some(code) = u32::try_from(i)
                .ok()
                .and_then(|i| first_char.checked_add(i))
                .filter(|c| *c <= MAX_SIMPLE_CODE)
            else {
                break;
            };
            if let Some(w) = number(resolve(doc, w)) {
                widths.insert(code, w);
            }
        }
    }
    let missing = dict
        .get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .and_then(|fd| fd.get(b"MissingWidth").ok())
        .and_then(|o| number(resolve(doc, o)))
        .filter(|w| *w > 0.0)
        .unwrap_or(DEFAULT_SIMPLE_WIDTH);
    (widths, missing)
}

/// Parse `/DW` and `/W` of a CIDFont. `/W` mixes two forms:
/// `c [w1 w2 ...]` and `c_first c_last w`.
fn cid_widths(doc: &Document, dict: &Dictionary) -> (HashMap<u32, f64>, f64) {
    let default_width = dict
        .get(b"DW")
        .ok()
        .and_then(|o| number(resolve(doc, o)))
        .unwrap_or(DEFAULT_CID_WIDTH);
    let mut widths = HashMap::new();
    let Some(w) = dict
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
    else {
        return (widths, default_width);
    };

    let mut budget = MAX_RANGE_EXPANSION;
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(resolve(doc, &w[i])) else {
            break;
        };
        // Float-to-int casts saturate, so negative or huge values stay in u32.
        let first = first as u32;
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (k, width) in list.iter().enumerate() {
                    let Some(code) = u32::try_from(k)
                        .ok()
                        .and_then(|k| first.checked_add(k))
                        .filter(|c| *c <= MAX_CODE)
                    else {
                        break;
                    };
                    if let Some(width) = number(resolve(doc, width)) {
                        widths.insert(code, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) =
                    (number(last), w.get(i + 2).and_then(|o| number(resolve(doc, o))))
                else {
                    break;
                };
                if let Some(codes) = clamp_range(first, last as u32) {
                    if !spend(&mut budget, &codes) {
                        warn!("CIDFont /W expands past {MAX_RANGE_EXPANSION} codes, ignoring the rest");
                        break;
                    }
                    for code in codes {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    (widths, default_width)
}

/// Clamp a declared code range to the two-byte code space.
fn clamp_range(lo: u32, hi: u32) -> Option<RangeInclusive<u32>> {
    (lo <= hi && lo <= MAX_CODE).then(|| lo..=hi.min(MAX_CODE))
}

/// Charge the codes of `range` to `budget`; false once it would run out.
fn spend(budget: &mut usize, range: &RangeInclusive<u32>) -> bool {
    let span = (range.end() - range.start()) as usize + 1;
    match budget.checked_sub(span) {
        Some(rest) => {
            *budget = rest;
            true
        }
        None => false,
    }
}

fn stream_bytes(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match resolve(doc, obj) {
        Object::Stream(stream) => Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

fn code_from_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16be_lossy(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// WinAnsiEncoding for the 0x80..=0x9F block, Latin-1 elsewhere.
fn win_ansi_char(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        _ => char::from(b),
    }
}

/// Code-to-text map from a `/ToUnicode` CMap (`bfchar` and `bfrange`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

impl ToUnicodeMap {
    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn parse(cmap: &str) -> Self {
        let tokens = tokenize_cmap(cmap);
        let mut map = HashMap::new();
        let mut budget = MAX_RANGE_EXPANSION;
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                CMapToken::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(CMapToken::Hex(src)), Some(CMapToken::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        map.insert(code_from_bytes(src), utf16be_lossy(dst));
                        i += 2;
                    }
                }
                CMapToken::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    while let (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        let (lo, hi) = (code_from_bytes(lo), code_from_bytes(hi));
                        match tokens.get(i + 2) {
                            Some(CMapToken::Hex(dst)) => {
                                if let Some(codes) = clamp_range(lo, hi) {
                                    if !spend(&mut budget, &codes) {
                                        warn!(
                                            "ToUnicode bfrange expands past {MAX_RANGE_EXPANSION} codes, ignoring the rest"
                                        );
                                        return ToUnicodeMap { map };
                                    }
                                    for code in codes {
                                        map.insert(code, offset_utf16(dst, code - lo));
                                    }
                                }
                                i += 3;
                            }
                            Some(CMapToken::Open) => {
                                let mut j = i + 3;
                                let codes = clamp_range(lo, hi);
                                while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                                    let code = u32::try_from(j - (i + 3))
                                        .ok()
                                        .and_then(|k| lo.checked_add(k))
                                        .filter(|c| codes.as_ref().is_some_and(|r| r.contains(c)));
                                    if let Some(code) = code {
                                        map.insert(code, utf16be_lossy(dst));
                                    }
                                    j += 1;
                                }
                                // Skip the closing bracket.
                                i = j + 1;
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        ToUnicodeMap { map }
    }
}

/// Destination of a `bfrange` entry: the base string with its last UTF-16
/// unit incremented by `offset`.
fn offset_utf16(dst: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = dst
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

fn tokenize_cmap(s: &str) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                if chars.peek() == Some(&'<') {
                    chars.next();
                    continue;
                }
                let mut hex = String::new();
                for h in chars.by_ref() {
                    if h == '>' {
                        break;
                    }
                    if h.is_ascii_hexdigit() {
                        hex.push(h);
                    }
                }
                if hex.len() % 2 == 1 {
                    hex.push('0');
                }
                let bytes = (0..hex.len())
                    .step_by(2)
                    .filter_map(|k| u8::from_str_radix(&hex[k..k + 2], 16).ok())
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
            }
            '>' => {
                // Second half of a `>>` dictionary close.
            }
            '[' => tokens.push(CMapToken::Open),
            ']' => tokens.push(CMapToken::Close),
            '%' => {
                for n in chars.by_ref() {
                    if n == '\n' || n == '\r' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '<' | '>' | '[' | ']' | '/' | '%') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(CMapToken::Word(word));
            }
        }
    }

    tokens
}
