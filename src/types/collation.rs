//! # Collation-Aware Strings
//!
//! Text columns carry a locale identifier (LCID) and a set of comparison
//! options next to the characters themselves. `SqlString` keeps all three so a
//! decoded value compares the same way the source value did.
//!
//! ## Payload Encodings
//!
//! | Kinds | Bytes on the wire |
//! |-------|-------------------|
//! | Char, VarChar, Text | ANSI code page of the LCID (e.g. 1252, 1251, 932) |
//! | NChar, NVarChar, NText | UTF-16LE |
//!
//! ANSI encoding is lossy exactly where the code page is: characters without a
//! mapping are written as `?`, matching what the database stores for them.
//! LCIDs without a dedicated mapping use code page 1252.

use std::cmp::Ordering;

use encoding_rs::{EncoderResult, Encoding};
use eyre::{ensure, Result};

use crate::config::{ANSI_REPLACEMENT_BYTE, DEFAULT_ANSI_CODE_PAGE, DEFAULT_LCID};
use crate::error::SnapError;

/// String comparison flags stored with every text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompareOptions(u32);

impl CompareOptions {
    pub const NONE: CompareOptions = CompareOptions(0);
    pub const IGNORE_CASE: CompareOptions = CompareOptions(0x0001);
    pub const IGNORE_NON_SPACE: CompareOptions = CompareOptions(0x0002);
    pub const IGNORE_KANA_TYPE: CompareOptions = CompareOptions(0x0008);
    pub const IGNORE_WIDTH: CompareOptions = CompareOptions(0x0010);
    pub const BINARY_SORT2: CompareOptions = CompareOptions(0x4000);
    pub const BINARY_SORT: CompareOptions = CompareOptions(0x8000);

    pub const fn from_bits(bits: u32) -> Self {
        CompareOptions(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: CompareOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: CompareOptions) -> Self {
        CompareOptions(self.0 | other.0)
    }

    pub fn is_binary(self) -> bool {
        self.contains(Self::BINARY_SORT) || self.contains(Self::BINARY_SORT2)
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::IGNORE_CASE
            .union(Self::IGNORE_KANA_TYPE)
            .union(Self::IGNORE_WIDTH)
    }
}

impl std::ops::BitOr for CompareOptions {
    type Output = CompareOptions;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlString {
    value: String,
    lcid: u32,
    options: CompareOptions,
}

impl SqlString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lcid: DEFAULT_LCID,
            options: CompareOptions::default(),
        }
    }

    pub fn with_collation(value: impl Into<String>, lcid: u32, options: CompareOptions) -> Self {
        Self {
            value: value.into(),
            lcid,
            options,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    pub fn lcid(&self) -> u32 {
        self.lcid
    }

    pub fn compare_options(&self) -> CompareOptions {
        self.options
    }

    pub fn code_page(&self) -> u16 {
        ansi_code_page(self.lcid)
    }

    pub fn encoding(&self) -> &'static Encoding {
        encoding_for_code_page(self.code_page())
    }

    /// Compares two strings under this value's comparison options.
    pub fn compare(&self, other: &SqlString) -> Ordering {
        if self.options.is_binary() {
            return self.value.as_bytes().cmp(other.value.as_bytes());
        }
        if self.options.contains(CompareOptions::IGNORE_CASE) {
            let left = self.value.chars().flat_map(char::to_lowercase);
            let right = other.value.chars().flat_map(char::to_lowercase);
            return left.cmp(right);
        }
        self.value.cmp(&other.value)
    }

    pub fn to_ansi_bytes(&self) -> Vec<u8> {
        encode_ansi(self.encoding(), &self.value)
    }

    pub fn from_ansi_bytes(bytes: &[u8], lcid: u32, options: CompareOptions) -> Self {
        let encoding = encoding_for_code_page(ansi_code_page(lcid));
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        Self::with_collation(text.into_owned(), lcid, options)
    }

    pub fn to_utf16_bytes(&self) -> Vec<u8> {
        self.value
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()
    }

    pub fn from_utf16_bytes(bytes: &[u8], lcid: u32, options: CompareOptions) -> Result<Self> {
        ensure!(
            bytes.len() % 2 == 0,
            SnapError::Format(format!("odd UTF-16 payload length {}", bytes.len()))
        );
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let text = String::from_utf16(&units)
            .map_err(|_| SnapError::Format("invalid UTF-16 text payload".into()))?;
        Ok(Self::with_collation(text, lcid, options))
    }
}

impl From<&str> for SqlString {
    fn from(value: &str) -> Self {
        SqlString::new(value)
    }
}

impl From<String> for SqlString {
    fn from(value: String) -> Self {
        SqlString::new(value)
    }
}

/// Maps a locale identifier to its Windows ANSI code page.
pub fn ansi_code_page(lcid: u32) -> u16 {
    let primary = lcid & 0x3FF;
    match primary {
        0x04 => match lcid {
            0x0404 | 0x0C04 | 0x1404 => 950,
            _ => 936,
        },
        0x11 => 932,
        0x12 => 949,
        0x1E => 874,
        0x2A => 1258,
        0x1A => match lcid {
            0x0C1A | 0x1C1A | 0x281A => 1251,
            _ => 1250,
        },
        0x02 | 0x19 | 0x22 | 0x23 | 0x2F | 0x3F | 0x44 | 0x50 => 1251,
        0x05 | 0x0E | 0x15 | 0x18 | 0x1B | 0x1C | 0x24 => 1250,
        0x08 => 1253,
        0x1F | 0x2C | 0x43 => 1254,
        0x0D => 1255,
        0x01 | 0x20 | 0x29 => 1256,
        0x25 | 0x26 | 0x27 => 1257,
        _ => DEFAULT_ANSI_CODE_PAGE,
    }
}

pub fn encoding_for_code_page(code_page: u16) -> &'static Encoding {
    match code_page {
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        65001 => encoding_rs::UTF_8,
        _ => encoding_rs::WINDOWS_1252,
    }
}

fn encode_ansi(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or(rest.len() * 4 + 16);
        out.reserve(needed);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => return out,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => out.push(ANSI_REPLACEMENT_BYTE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LCID_RU_RU: u32 = 0x0419;
    const LCID_JA_JP: u32 = 0x0411;
    const LCID_ZH_TW: u32 = 0x0404;
    const LCID_ZH_CN: u32 = 0x0804;
    const LCID_PL_PL: u32 = 0x0415;

    #[test]
    fn lcid_to_code_page() {
        assert_eq!(ansi_code_page(DEFAULT_LCID), 1252);
        assert_eq!(ansi_code_page(LCID_RU_RU), 1251);
        assert_eq!(ansi_code_page(LCID_JA_JP), 932);
        assert_eq!(ansi_code_page(LCID_ZH_TW), 950);
        assert_eq!(ansi_code_page(LCID_ZH_CN), 936);
        assert_eq!(ansi_code_page(LCID_PL_PL), 1250);
        assert_eq!(ansi_code_page(0), 1252);
    }

    #[test]
    fn ansi_roundtrip_in_matching_code_page() {
        let cases = [
            (DEFAULT_LCID, "Café déjà vu"),
            (LCID_RU_RU, "Привет, мир"),
            (LCID_JA_JP, "こんにちは"),
            (LCID_PL_PL, "Zażółć gęślą jaźń"),
        ];

        for (lcid, text) in cases {
            let s = SqlString::with_collation(text, lcid, CompareOptions::default());
            let bytes = s.to_ansi_bytes();
            let back = SqlString::from_ansi_bytes(&bytes, lcid, s.compare_options());
            assert_eq!(back, s, "lcid {:#x}", lcid);
        }
    }

    #[test]
    fn ansi_encoding_is_single_byte_for_latin1() {
        let s = SqlString::new("é");
        assert_eq!(s.to_ansi_bytes(), vec![0xE9]);
    }

    #[test]
    fn unmappable_characters_become_question_marks() {
        let s = SqlString::new("a\u{4E2D}b\u{1F600}");
        let bytes = s.to_ansi_bytes();
        assert_eq!(bytes, b"a?b?");

        let back = SqlString::from_ansi_bytes(&bytes, DEFAULT_LCID, CompareOptions::default());
        assert_eq!(back.as_str(), "a?b?");
    }

    #[test]
    fn utf16_roundtrip_including_surrogate_pairs() {
        let s = SqlString::with_collation("héllo 😀 世界", LCID_JA_JP, CompareOptions::NONE);
        let bytes = s.to_utf16_bytes();
        assert_eq!(bytes.len() % 2, 0);
        let back = SqlString::from_utf16_bytes(&bytes, LCID_JA_JP, CompareOptions::NONE).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn utf16_rejects_odd_length_and_lone_surrogates() {
        assert!(SqlString::from_utf16_bytes(&[0x41], DEFAULT_LCID, CompareOptions::NONE).is_err());
        assert!(
            SqlString::from_utf16_bytes(&[0x00, 0xD8], DEFAULT_LCID, CompareOptions::NONE).is_err()
        );
    }

    #[test]
    fn compare_honors_options() {
        let a = SqlString::new("Apple");
        let b = SqlString::new("apple");
        assert_eq!(a.compare(&b), Ordering::Equal);

        let a = SqlString::with_collation("Apple", DEFAULT_LCID, CompareOptions::NONE);
        assert_eq!(a.compare(&b), Ordering::Less);

        let a = SqlString::with_collation("b", DEFAULT_LCID, CompareOptions::BINARY_SORT);
        assert_eq!(a.compare(&SqlString::new("a")), Ordering::Greater);
    }

    #[test]
    fn compare_options_bits() {
        let opts = CompareOptions::IGNORE_CASE | CompareOptions::IGNORE_WIDTH;
        assert_eq!(opts.bits(), 0x11);
        assert!(opts.contains(CompareOptions::IGNORE_CASE));
        assert!(!opts.contains(CompareOptions::IGNORE_KANA_TYPE));
        assert_eq!(CompareOptions::from_bits(0x11), opts);
        assert_eq!(CompareOptions::default().bits(), 0x19);
    }
}
