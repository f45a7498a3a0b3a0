//! Whole-file character normalization.
//!
//! CNAB files are uppercase ASCII. Accented letters are reduced to their
//! base letter through canonical decomposition; every character must map to
//! exactly one ASCII character so no column moves. Anything else fails with
//! [`CnabError::Transliteration`] and has to be cleaned up before encoding.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{CnabError, Result};

/// Transliterate to ASCII and uppercase, preserving the character count.
pub fn normalize(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for (offset, ch) in text.chars().enumerate() {
        let ascii = transliterate(ch).ok_or(CnabError::Transliteration { ch, offset })?;
        out.push(ascii);
    }
    Ok(out)
}

/// Single ASCII replacement for `ch`, if one exists.
pub fn transliterate(ch: char) -> Option<char> {
    if ch.is_ascii() {
        return Some(ch.to_ascii_uppercase());
    }

    let mut base = std::iter::once(ch).nfd().filter(|c| !is_combining_mark(*c));
    match (base.next(), base.next()) {
        (Some(c), None) if c.is_ascii() => Some(c.to_ascii_uppercase()),
        _ => fallback(ch),
    }
}

/// Characters without a canonical decomposition that still have an
/// obvious one-character equivalent.
fn fallback(ch: char) -> Option<char> {
    let ascii = match ch {
        'º' => 'O',
        'ª' => 'A',
        'ø' | 'Ø' => 'O',
        'đ' | 'Đ' => 'D',
        'ł' | 'Ł' => 'L',
        '\u{a0}' => ' ',
        '–' | '—' => '-',
        '‘' | '’' | '´' => '\'',
        '“' | '”' => '"',
        _ => return None,
    };
    Some(ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_portuguese_diacritics() {
        assert_eq!(
            normalize("João Conceição, Avenida São Paulo nº 10").unwrap(),
            "JOAO CONCEICAO, AVENIDA SAO PAULO NO 10"
        );
        assert_eq!(normalize("àáâãäçèéêíóôõúü").unwrap(), "AAAAACEEEIOOOUU");
    }

    #[test]
    fn test_preserves_character_count_and_terminators() {
        let text = "001Ação  \r\n002Pão   ";
        let out = normalize(text).unwrap();
        assert_eq!(out.chars().count(), text.chars().count());
        assert_eq!(out, "001ACAO  \r\n002PAO   ");
        assert!(out.is_ascii());
    }

    #[test]
    fn test_rejects_multi_character_transliterations() {
        match normalize("ABß") {
            Err(CnabError::Transliteration { ch, offset }) => {
                assert_eq!(ch, 'ß');
                assert_eq!(offset, 2);
            }
            other => panic!("Expected Transliteration, got {other:?}"),
        }
        assert!(normalize("Æ").is_err());
        assert!(normalize("日本").is_err());
    }

    #[test]
    fn test_fallback_characters() {
        assert_eq!(transliterate('ª'), Some('A'));
        assert_eq!(transliterate('—'), Some('-'));
        assert_eq!(transliterate('€'), None);
    }
}
