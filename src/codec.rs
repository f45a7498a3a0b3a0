//! Fixed-width record codec.
//!
//! `encode` renders a [`Record`] into exactly `schema.width()` characters,
//! field by field in column order; `decode` slices a line back into field
//! values. Widths are counted in characters, not bytes, so accented input
//! keeps its columns until the whole-file normalization pass.
//!
//! Rendering rules:
//! - Numeric fields take digits only. Values longer than the column are an
//!   error; numeric data is never truncated.
//! - Alphanumeric fields longer than the column are truncated to the first
//!   `width` characters and a warning is logged. Text is composed to NFC
//!   before it is measured, and control characters are rejected.
//! - Padding follows the field's `align`/`pad` (right/zero for numeric,
//!   left/space for alphanumeric unless the layout says otherwise).

use std::borrow::Cow;

use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CnabError, Result};
use crate::record::{FieldValue, Record};
use crate::schema::{Align, FieldKind, FieldSpec, RecordSchema};

/// Encode one record into a line of exactly `schema.width()` characters.
pub fn encode(schema: &RecordSchema, record: &Record) -> Result<String> {
    let mut line = String::with_capacity(schema.width());

    for spec in schema.fields() {
        let value = record
            .get(&spec.name)
            .or(spec.default.as_ref())
            .ok_or_else(|| CnabError::MissingField {
                field: spec.name.clone(),
            })?;
        render_field(spec, value, &mut line)?;
    }

    // Tiling was checked when the schema was built, so a drift here is a bug.
    assert_eq!(
        line.chars().count(),
        schema.width(),
        "encoded {} record drifted from its layout width",
        schema.role()
    );
    Ok(line)
}

/// Decode a line of exactly `schema.width()` characters into a record.
pub fn decode(schema: &RecordSchema, line: &str) -> Result<Record> {
    decode_line(schema, line, 1)
}

/// Decode with the 1-based line number used in width errors.
pub(crate) fn decode_line(schema: &RecordSchema, line: &str, number: usize) -> Result<Record> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() != schema.width() {
        return Err(CnabError::LineWidth {
            line: number,
            expected: schema.width(),
            actual: chars.len(),
        });
    }

    let mut record = Record::new(schema.role());
    for spec in schema.fields() {
        let slice: String = chars[spec.start..spec.end()].iter().collect();
        let value = match spec.kind {
            FieldKind::Numeric => parse_numeric(spec, &slice)?,
            FieldKind::Alphanumeric => FieldValue::Text(strip_padding(spec, &slice).to_string()),
        };
        record.set(spec.name.clone(), value);
    }
    Ok(record)
}

fn render_field(spec: &FieldSpec, value: &FieldValue, out: &mut String) -> Result<()> {
    let text: Cow<'_, str> = match spec.kind {
        FieldKind::Numeric => numeric_digits(spec, value)?,
        FieldKind::Alphanumeric => alphanumeric_text(spec, value)?,
    };

    let fill = spec.width - text.chars().count();
    match spec.align {
        Align::Left => {
            out.push_str(&text);
            out.extend(std::iter::repeat_n(spec.pad.char(), fill));
        }
        Align::Right => {
            out.extend(std::iter::repeat_n(spec.pad.char(), fill));
            out.push_str(&text);
        }
    }
    Ok(())
}

/// Significant digits of a numeric value, checked against the column width.
fn numeric_digits<'a>(spec: &FieldSpec, value: &'a FieldValue) -> Result<Cow<'a, str>> {
    let digits: Cow<'a, str> = match value {
        FieldValue::Number(n) => Cow::Owned(n.to_string()),
        FieldValue::Text(s) => {
            if !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(CnabError::InvalidNumeric {
                    field: spec.name.clone(),
                    value: s.clone(),
                });
            }
            Cow::Borrowed(s.as_str())
        }
    };

    // Leading zeros are padding, not data; an empty text renders as zero.
    let significant = digits.trim_start_matches('0');
    let rendered = if significant.is_empty() && !digits.is_empty() {
        "0"
    } else {
        significant
    };

    if rendered.len() > spec.width {
        return Err(CnabError::FieldOverflow {
            field: spec.name.clone(),
            value: digits.into_owned(),
            width: spec.width,
        });
    }
    Ok(Cow::Owned(rendered.to_string()))
}

fn alphanumeric_text<'a>(spec: &FieldSpec, value: &'a FieldValue) -> Result<Cow<'a, str>> {
    let text: Cow<'a, str> = match value {
        FieldValue::Text(s) if s.is_ascii() => Cow::Borrowed(s.as_str()),
        // Composed first so a decomposed accent counts as one column.
        FieldValue::Text(s) => Cow::Owned(s.nfc().collect()),
        FieldValue::Number(n) => Cow::Owned(n.to_string()),
    };

    // A CR or LF here would split the record across lines of the file.
    if let Some((offset, ch)) = text.chars().enumerate().find(|(_, c)| c.is_control()) {
        return Err(CnabError::ControlCharacter {
            field: spec.name.clone(),
            ch,
            offset,
        });
    }

    if text.chars().count() <= spec.width {
        return Ok(text);
    }
    warn!(
        field = %spec.name,
        width = spec.width,
        value = %text,
        "truncating alphanumeric value to its column width"
    );
    Ok(Cow::Owned(text.chars().take(spec.width).collect()))
}

fn parse_numeric(spec: &FieldSpec, slice: &str) -> Result<FieldValue> {
    // Banks leave unused numeric columns blank in return files.
    if slice.trim().is_empty() {
        return Ok(FieldValue::Number(0));
    }

    let digits = strip_padding(spec, slice).trim_start_matches('0');
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CnabError::InvalidNumeric {
            field: spec.name.clone(),
            value: slice.to_string(),
        });
    }
    if digits.is_empty() {
        return Ok(FieldValue::Number(0));
    }
    Ok(digits
        .parse::<u64>()
        .map(FieldValue::Number)
        .unwrap_or_else(|_| FieldValue::Text(digits.to_string())))
}

/// Trim the pad character from the side the encoder padded.
fn strip_padding<'a>(spec: &FieldSpec, slice: &'a str) -> &'a str {
    let pad = spec.pad.char();
    match spec.align {
        Align::Left => slice.trim_end_matches(pad),
        Align::Right => slice.trim_start_matches(pad),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::schema::{Pad, RecordRole};
    use proptest::prelude::*;

    /// code(3, numeric) + name(10, alphanumeric)
    fn code_and_name() -> RecordSchema {
        RecordSchema::new(
            13,
            vec![
                FieldSpec::numeric("code", 0, 3),
                FieldSpec::alphanumeric("name", 3, 10),
            ],
        )
        .unwrap()
    }

    fn record(code: impl Into<FieldValue>, name: impl Into<FieldValue>) -> Record {
        Record::new(RecordRole::detail())
            .with("code", code)
            .with("name", name)
    }

    #[test]
    fn test_encode_pads_each_field() {
        let line = encode(&code_and_name(), &record(2u64, "JOAO")).unwrap();
        assert_eq!(line, "002JOAO      ");
    }

    #[test]
    fn test_encode_then_normalize_accented_name() {
        let line = encode(&code_and_name(), &record(2u64, "JOÃO")).unwrap();
        assert_eq!(line.chars().count(), 13);
        assert_eq!(normalize(&line).unwrap(), "002JOAO      ");
    }

    #[test]
    fn test_encode_uses_layout_default() {
        let schema = RecordSchema::new(
            13,
            vec![
                FieldSpec::numeric("code", 0, 3).with_default(7u64),
                FieldSpec::alphanumeric("name", 3, 10).with_default(""),
            ],
        )
        .unwrap();
        let line = encode(&schema, &Record::new(RecordRole::detail())).unwrap();
        assert_eq!(line, "007          ");
    }

    #[test]
    fn test_encode_missing_field() {
        let rec = Record::new(RecordRole::detail()).with("code", 1u64);
        match encode(&code_and_name(), &rec) {
            Err(CnabError::MissingField { field }) => assert_eq!(field, "name"),
            other => panic!("Expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_numeric_overflow() {
        match encode(&code_and_name(), &record(1234u64, "X")) {
            Err(CnabError::FieldOverflow {
                field,
                value,
                width,
            }) => {
                assert_eq!(field, "code");
                assert_eq!(value, "1234");
                assert_eq!(width, 3);
            }
            other => panic!("Expected FieldOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_numeric_text() {
        let schema = code_and_name();
        assert_eq!(encode(&schema, &record("42", "A")).unwrap(), "042A         ");
        // Leading zeros are padding and do not count against the width.
        assert_eq!(encode(&schema, &record("0042", "A")).unwrap(), "042A         ");
        assert_eq!(encode(&schema, &record("", "A")).unwrap(), "000A         ");
        assert!(matches!(
            encode(&schema, &record("4.2", "A")),
            Err(CnabError::InvalidNumeric { .. })
        ));
        assert!(matches!(
            encode(&schema, &record("-1", "A")),
            Err(CnabError::InvalidNumeric { .. })
        ));
    }

    #[test]
    fn test_encode_truncates_long_text() {
        let line = encode(&code_and_name(), &record(1u64, "MARIA DA SILVA")).unwrap();
        assert_eq!(line, "001MARIA DA S");
    }

    #[test]
    fn test_encode_honours_custom_alignment() {
        let schema = RecordSchema::new(
            9,
            vec![
                FieldSpec::alphanumeric("flag", 0, 3).with_alignment(Align::Right, Pad::Space),
                FieldSpec::numeric("n", 3, 3).with_alignment(Align::Left, Pad::Space),
                FieldSpec::numeric("m", 6, 3).with_alignment(Align::Right, Pad::Space),
            ],
        )
        .unwrap();
        let rec = Record::new(RecordRole::detail())
            .with("flag", "07")
            .with("n", 50u64)
            .with("m", 0u64);
        let line = encode(&schema, &rec).unwrap();
        assert_eq!(line, " 0750   0");

        let back = decode(&schema, &line).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_encode_rejects_line_breaks_in_text() {
        for (name, ch, offset) in [("AB\r\nCD", '\r', 2), ("\nEF", '\n', 0), ("A\tB", '\t', 1)] {
            match encode(&code_and_name(), &record(1u64, name)) {
                Err(CnabError::ControlCharacter {
                    field,
                    ch: found,
                    offset: at,
                }) => {
                    assert_eq!(field, "name");
                    assert_eq!((found, at), (ch, offset));
                }
                other => panic!("Expected ControlCharacter, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_encode_composes_decomposed_accents() {
        let line = encode(&code_and_name(), &record(2u64, "JOA\u{303}O")).unwrap();
        assert_eq!(line.chars().count(), 13);
        assert_eq!(normalize(&line).unwrap(), "002JOAO      ");

        // Truncation counts composed characters too.
        let line = encode(&code_and_name(), &record(3u64, "CONCEIC\u{327}A\u{303}O DA")).unwrap();
        assert_eq!(normalize(&line).unwrap(), "003CONCEICAO ");
    }

    #[test]
    fn test_decode_recovers_fields() {
        let rec = decode(&code_and_name(), "002JOAO      ").unwrap();
        assert_eq!(rec.role(), RecordRole::detail());
        assert_eq!(rec.get("code"), Some(&FieldValue::Number(2)));
        assert_eq!(rec.get("name"), Some(&FieldValue::from("JOAO")));
    }

    #[test]
    fn test_decode_zero_and_blank_numeric() {
        let rec = decode(&code_and_name(), "000          ").unwrap();
        assert_eq!(rec.get("code"), Some(&FieldValue::Number(0)));
        assert_eq!(rec.get("name"), Some(&FieldValue::from("")));

        let rec = decode(&code_and_name(), "   X         ").unwrap();
        assert_eq!(rec.get("code"), Some(&FieldValue::Number(0)));
    }

    #[test]
    fn test_decode_rejects_letters_in_numeric() {
        assert!(matches!(
            decode(&code_and_name(), "0A2JOAO      "),
            Err(CnabError::InvalidNumeric { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_width() {
        for line in ["002JOAO", "002JOAO       EXTRA"] {
            match decode(&code_and_name(), line) {
                Err(CnabError::LineWidth {
                    expected, actual, ..
                }) => {
                    assert_eq!(expected, 13);
                    assert_eq!(actual, line.len());
                }
                other => panic!("Expected LineWidth, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_counts_characters_not_bytes() {
        let rec = decode(&code_and_name(), "002JOÃO      ").unwrap();
        assert_eq!(rec.get("name"), Some(&FieldValue::from("JOÃO")));
    }

    #[test]
    fn test_decode_wide_numeric_keeps_digits() {
        let schema = RecordSchema::new(25, vec![FieldSpec::numeric("big", 0, 25)]).unwrap();
        let rec = decode(&schema, "0000099999999999999999999").unwrap();
        assert_eq!(
            rec.get("big"),
            Some(&FieldValue::from("99999999999999999999"))
        );
    }

    fn three_field_schema() -> RecordSchema {
        RecordSchema::new(
            33,
            vec![
                FieldSpec::numeric("amount", 0, 13),
                FieldSpec::alphanumeric("payer", 13, 15),
                FieldSpec::numeric("seq", 28, 5),
            ],
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn prop_encode_width_is_exact(
            amount in 0u64..10_000_000_000_000,
            payer in "[A-Za-z0-9 ]{0,30}",
            seq in 0u64..100_000,
        ) {
            let rec = Record::new(RecordRole::detail())
                .with("amount", amount)
                .with("payer", payer)
                .with("seq", seq);
            let line = encode(&three_field_schema(), &rec).unwrap();
            prop_assert_eq!(line.chars().count(), 33);
        }

        #[test]
        fn prop_round_trip(
            amount in 0u64..10_000_000_000_000,
            payer in "[A-Z0-9]([A-Z0-9 ]{0,13}[A-Z0-9])?",
            seq in 0u64..100_000,
        ) {
            let schema = three_field_schema();
            let rec = Record::new(RecordRole::detail())
                .with("amount", amount)
                .with("payer", payer)
                .with("seq", seq);
            let back = decode(&schema, &encode(&schema, &rec).unwrap()).unwrap();
            prop_assert_eq!(back, rec);
        }

        #[test]
        fn prop_round_trip_space_padded_layouts(
            amount in 0u64..100_000,
            code in "[A-Z0-9]([A-Z0-9 ]{0,4}[A-Z0-9])?",
        ) {
            let schema = RecordSchema::new(
                14,
                vec![
                    FieldSpec::numeric("left", 0, 5).with_alignment(Align::Left, Pad::Space),
                    FieldSpec::numeric("right", 5, 5).with_alignment(Align::Right, Pad::Space),
                    FieldSpec::alphanumeric("code", 10, 4).with_alignment(Align::Right, Pad::Space),
                ],
            )
            .unwrap();
            let code: String = code.chars().take(4).collect();
            let code = code.trim().to_string();
            let rec = Record::new(RecordRole::detail())
                .with("left", amount)
                .with("right", amount)
                .with("code", code);
            let back = decode(&schema, &encode(&schema, &rec).unwrap()).unwrap();
            prop_assert_eq!(back, rec);
        }

        #[test]
        fn prop_numeric_overflow_never_truncates(seq in 100_000u64..u64::MAX) {
            let rec = Record::new(RecordRole::detail())
                .with("amount", 1u64)
                .with("payer", "X")
                .with("seq", seq);
            let is_overflow = matches!(
                encode(&three_field_schema(), &rec),
                Err(CnabError::FieldOverflow { .. })
            );
            prop_assert!(is_overflow);
        }
    }
}
