//! Tests for the delimited line tokenizer.

use rowpipe::testing::tokenize_all;
use rowpipe::tokenizer::{DelimitedLineTokenizer, TokenizedRow, TokenizerConfig};
use rowpipe::TokenizeError;
use std::io::Cursor;

fn fields(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn semicolon(enclosure: &str) -> TokenizerConfig {
    TokenizerConfig::new(";", enclosure)
}

#[test]
fn test_enclosed_fields_with_and_without_newline() -> anyhow::Result<()> {
    let config = semicolon("\"");
    for input in ["\"value1\";\"value2\"", "\"value1\";\"value2\"\n"] {
        assert_eq!(
            tokenize_all(input, &config)?,
            vec![fields(&["value1", "value2"])],
            "input {input:?}"
        );
    }
    Ok(())
}

#[test]
fn test_unenclosed_fields() -> anyhow::Result<()> {
    let config = semicolon("\"");
    for input in ["value1;value2", "value1;value2\n"] {
        assert_eq!(tokenize_all(input, &config)?, vec![fields(&["value1", "value2"])]);
    }
    Ok(())
}

#[test]
fn test_multi_character_enclosure_matrix() -> anyhow::Result<()> {
    let config = semicolon("\"!");
    let cases = [
        "value1;value2",
        "\"!value1\"!;value2",
        "\"!value1\"!;\"!value2\"!",
        "value1;\"!value2\"!\r\n",
        "value1;\"!value2\"!\n",
    ];
    for input in cases {
        assert_eq!(
            tokenize_all(input, &config)?,
            vec![fields(&["value1", "value2"])],
            "input {input:?}"
        );
    }
    Ok(())
}

#[test]
fn test_partial_multi_character_enclosure_is_literal() -> anyhow::Result<()> {
    let config = semicolon("\"!");
    assert_eq!(tokenize_all("\"x;y", &config)?, vec![fields(&["\"x", "y"])]);
    Ok(())
}

#[test]
fn test_doubled_enclosure_is_escape() -> anyhow::Result<()> {
    let config = semicolon("\"");
    assert_eq!(tokenize_all("\"a\"\"b\"", &config)?, vec![fields(&["a\"b"])]);
    assert_eq!(
        tokenize_all("\"\"\"quoted\"\"\";x\n", &config)?,
        vec![fields(&["\"quoted\"", "x"])]
    );
    Ok(())
}

#[test]
fn test_doubled_multi_character_enclosure() -> anyhow::Result<()> {
    let config = semicolon("\"!");
    assert_eq!(tokenize_all("\"!a\"!\"!b\"!", &config)?, vec![fields(&["a\"!b"])]);
    Ok(())
}

#[test]
fn test_enclosed_delimiter_and_newlines() -> anyhow::Result<()> {
    let config = semicolon("\"");
    let rows: Vec<TokenizedRow> = DelimitedLineTokenizer::from_str("\"a;\nb\";c\nd\n", &config)?
        .collect::<Result<_, _>>()?;
    assert_eq!(
        rows,
        vec![
            TokenizedRow { line: 1, fields: fields(&["a;\nb", "c"]) },
            TokenizedRow { line: 3, fields: fields(&["d"]) },
        ]
    );
    Ok(())
}

#[test]
fn test_text_after_closing_enclosure_is_kept() -> anyhow::Result<()> {
    let config = semicolon("\"");
    assert_eq!(tokenize_all("\"ab\"cd;e", &config)?, vec![fields(&["abcd", "e"])]);
    Ok(())
}

#[test]
fn test_empty_fields() -> anyhow::Result<()> {
    let config = semicolon("\"");
    assert_eq!(tokenize_all("a;;b;\n", &config)?, vec![fields(&["a", "", "b", ""])]);
    assert_eq!(tokenize_all("\"\";x", &config)?, vec![fields(&["", "x"])]);
    Ok(())
}

#[test]
fn test_empty_lines_produce_no_rows() -> anyhow::Result<()> {
    let config = semicolon("\"");
    let rows: Vec<TokenizedRow> = DelimitedLineTokenizer::from_str("\n\na\n\n\nb\n\n", &config)?
        .collect::<Result<_, _>>()?;
    assert_eq!(
        rows.iter().map(|r| (r.line, r.fields.clone())).collect::<Vec<_>>(),
        vec![(3, fields(&["a"])), (6, fields(&["b"]))]
    );
    Ok(())
}

#[test]
fn test_line_terminators() -> anyhow::Result<()> {
    let config = semicolon("\"");
    for input in ["a\nb", "a\r\nb", "a\rb", "a\r\nb\r\n"] {
        let rows: Vec<TokenizedRow> =
            DelimitedLineTokenizer::from_str(input, &config)?.collect::<Result<_, _>>()?;
        assert_eq!(
            rows,
            vec![
                TokenizedRow { line: 1, fields: fields(&["a"]) },
                TokenizedRow { line: 2, fields: fields(&["b"]) },
            ],
            "input {input:?}"
        );
    }
    Ok(())
}

#[test]
fn test_multi_character_delimiter() -> anyhow::Result<()> {
    let config = TokenizerConfig::new("||", "\"");
    assert_eq!(tokenize_all("a||b|c||\"d||e\"", &config)?, vec![fields(&["a", "b|c", "d||e"])]);
    Ok(())
}

#[test]
fn test_longer_delimiter_wins_at_field_start() -> anyhow::Result<()> {
    let config = TokenizerConfig::new("||", "|");
    assert_eq!(tokenize_all("||b", &config)?, vec![fields(&["", "b"])]);
    assert_eq!(tokenize_all("|x||y|;z", &config)?, vec![fields(&["x|y;z"])]);
    Ok(())
}

#[test]
fn test_no_enclosure() -> anyhow::Result<()> {
    let config = semicolon("");
    assert_eq!(tokenize_all("\"a\";b", &config)?, vec![fields(&["\"a\"", "b"])]);
    Ok(())
}

#[test]
fn test_unterminated_enclosure_reports_opening_line() -> anyhow::Result<()> {
    let config = semicolon("\"");
    let mut tokenizer = DelimitedLineTokenizer::from_str("x;y\nz;\"abc\nde", &config)?;

    let first = tokenizer.next().transpose()?;
    assert_eq!(first.map(|r| r.fields), Some(fields(&["x", "y"])));
    assert!(matches!(
        tokenizer.next(),
        Some(Err(TokenizeError::UnterminatedEnclosure { line: 2 }))
    ));
    assert!(tokenizer.next().is_none());
    assert!(tokenizer.next().is_none());
    Ok(())
}

#[test]
fn test_empty_delimiter_is_rejected() {
    let config = TokenizerConfig::new("", "\"");
    assert!(matches!(
        DelimitedLineTokenizer::from_str("a", &config),
        Err(TokenizeError::InvalidConfig(_))
    ));
}

#[test]
fn test_reader_matches_str() -> anyhow::Result<()> {
    let config = semicolon("\"!");
    let input = "h1;h2\r\n\"!multi\nline\"!;ümlaut\n\n\"!x\"!\"!y\"!;z";
    let from_reader: Vec<TokenizedRow> =
        DelimitedLineTokenizer::from_reader(Cursor::new(input.as_bytes()), &config)?
            .collect::<Result<_, _>>()?;
    let from_str: Vec<TokenizedRow> =
        DelimitedLineTokenizer::from_str(input, &config)?.collect::<Result<_, _>>()?;
    assert_eq!(from_reader, from_str);
    assert_eq!(from_str.len(), 3);
    assert_eq!(from_str[1].fields, fields(&["multi\nline", "ümlaut"]));
    assert_eq!(from_str[2].fields, fields(&["x\"!y", "z"]));
    Ok(())
}

#[test]
fn test_tokenizing_is_repeatable() -> anyhow::Result<()> {
    let config = semicolon("\"");
    let input = "a;\"b\"\"c\";d\r\n\"e\nf\";g\n\nh";
    let first = tokenize_all(input, &config)?;
    for _ in 0..5 {
        assert_eq!(tokenize_all(input, &config)?, first);
    }
    Ok(())
}

#[test]
fn test_config_from_json_defaults() -> anyhow::Result<()> {
    let config: TokenizerConfig = serde_json::from_str(r#"{"delimiter": ","}"#)?;
    assert_eq!(config, TokenizerConfig::new(",", "\""));
    let config: TokenizerConfig = serde_json::from_str("{}")?;
    assert_eq!(config, TokenizerConfig::default());
    Ok(())
}
