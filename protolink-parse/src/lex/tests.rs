use proptest::prelude::*;

use super::*;

fn lex_all(source: &str) -> (Vec<Result<Token<'_>, ()>>, Vec<ParseErrorKind>) {
    let mut lexer = Token::lexer(source);
    let tokens = lexer.by_ref().collect();
    (tokens, lexer.extras.errors)
}

#[test]
fn simple_tokens() {
    let source = r#"hell0 052 42 0x2A 5. 0.5 0.42e+2 2e-4 .2e+3 52e3 true
        false "hello \a\b\f\n\r\t\v\?\\\'\" \052 \x2a" 'hello 😀' _foo"#;
    let mut lexer = Token::lexer(source);

    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("hell0")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::IntLiteral(42)));
    assert_eq!(lexer.next().unwrap(), Ok(Token::IntLiteral(42)));
    assert_eq!(lexer.next().unwrap(), Ok(Token::IntLiteral(42)));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(5.))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(0.5))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(0.42e+2))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(2e-4))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(0.2e+3))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FloatLiteral(EqFloat(52e3))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("true")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Newline));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("false")));
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral(
            b"hello \x07\x08\x0c\n\r\t\x0b?\\'\" * *".as_ref().into()
        ))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral(
            b"hello \xF0\x9F\x98\x80".as_ref().into()
        ))
    );
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("_foo")));
    assert_eq!(lexer.next(), None);

    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn unicode_escapes() {
    let (tokens, errors) = lex_all(r#"'é' "\U0001F600""#);
    assert_eq!(
        tokens,
        vec![
            Ok(Token::StringLiteral(b"\xC3\xA9".as_ref().into())),
            Ok(Token::StringLiteral(b"\xF0\x9F\x98\x80".as_ref().into())),
        ]
    );
    assert_eq!(errors, vec![]);
}

#[test]
fn integer_overflow() {
    let source = "99999999999999999999999999999999999999 4";
    let (tokens, errors) = lex_all(source);

    assert_eq!(
        tokens,
        vec![Ok(Token::IntLiteral(0)), Ok(Token::IntLiteral(4))]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::IntegerOutOfRange {
            span: 0..(source.len() - 2),
        }]
    );
}

#[test]
fn max_integers() {
    let (tokens, errors) = lex_all("18446744073709551615 0xFFFFFFFFFFFFFFFF 01777777777777777777777");
    assert_eq!(
        tokens,
        vec![
            Ok(Token::IntLiteral(u64::MAX)),
            Ok(Token::IntLiteral(u64::MAX)),
            Ok(Token::IntLiteral(u64::MAX)),
        ]
    );
    assert_eq!(errors, vec![]);
}

#[test]
fn float_suffix() {
    let source = "10f 5.f 0.5f 0.42e+2f 2e-4f .2e+3f";

    let (tokens, errors) = lex_all(source);
    assert_eq!(
        tokens,
        vec![
            Ok(Token::FloatLiteral(EqFloat(10.))),
            Ok(Token::FloatLiteral(EqFloat(5.))),
            Ok(Token::FloatLiteral(EqFloat(0.5))),
            Ok(Token::FloatLiteral(EqFloat(0.42e+2))),
            Ok(Token::FloatLiteral(EqFloat(2e-4))),
            Ok(Token::FloatLiteral(EqFloat(0.2e+3))),
        ]
    );
    assert_eq!(
        errors,
        vec![
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 0..3 },
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 4..7 },
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 8..12 },
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 13..21 },
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 22..27 },
            ParseErrorKind::FloatSuffixOutsideTextFormat { span: 28..34 },
        ],
    );

    let mut lexer = Token::lexer(source);
    lexer.extras.text_format_mode = true;
    assert_eq!(lexer.by_ref().count(), 6);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn invalid_token() {
    let (tokens, errors) = lex_all("@ foo");

    assert_eq!(tokens, vec![Err(()), Ok(Token::Ident("foo"))]);
    assert_eq!(errors, vec![]);
}

#[test]
fn invalid_string_char() {
    let source = "\"\0\0\" foo";
    let (tokens, errors) = lex_all(source);

    assert_eq!(
        tokens,
        vec![
            Ok(Token::StringLiteral(b"".as_ref().into())),
            Ok(Token::Ident("foo"))
        ]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::InvalidStringCharacters { span: 1..3 }]
    );
}

#[test]
fn invalid_string_escape() {
    let (tokens, errors) = lex_all(r#""\m" foo"#);

    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[1], Ok(Token::Ident("foo")));
    assert!(matches!(
        errors.as_slice(),
        [ParseErrorKind::InvalidStringEscape { span }] if span.start == 1
    ));

    let (_, errors) = lex_all(r#""\777""#);
    assert_eq!(
        errors,
        vec![ParseErrorKind::InvalidStringEscape { span: 1..5 }]
    );
}

#[test]
fn unterminated_string() {
    let (tokens, errors) = lex_all("\"hello \n foo");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::StringLiteral(b"hello ".as_ref().into())),
            Ok(Token::Ident("foo"))
        ]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::UnterminatedString { span: 0..7 }]
    );

    let (_, errors) = lex_all("'hello");
    assert_eq!(
        errors,
        vec![ParseErrorKind::UnterminatedString { span: 0..6 }]
    );
}

#[test]
fn int_followed_by_ident() {
    let (tokens, errors) = lex_all("1foo bar");

    assert_eq!(
        tokens,
        vec![Ok(Token::IntLiteral(1)), Ok(Token::Ident("bar"))]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::NoSpaceBetweenIntAndIdent { span: 0..4 }]
    );
}

#[test]
fn float_followed_by_ident() {
    let (tokens, errors) = lex_all("1.5foo 0fx bar");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::FloatLiteral(EqFloat(1.5))),
            Ok(Token::IntLiteral(0)),
            Ok(Token::Ident("bar")),
        ]
    );
    assert_eq!(
        errors,
        vec![
            ParseErrorKind::NoSpaceBetweenIntAndIdent { span: 0..6 },
            ParseErrorKind::NoSpaceBetweenIntAndIdent { span: 7..10 },
        ]
    );
}

#[test]
fn line_comments() {
    let (tokens, errors) = lex_all("foo // bar\r\n// baz");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::Ident("foo")),
            Ok(Token::LineComment(" bar\n".into())),
            Ok(Token::LineComment(" baz".into())),
        ]
    );
    assert_eq!(errors, vec![]);
}

#[test]
fn hash_comment() {
    let (tokens, errors) = lex_all("# bar\n");
    assert_eq!(tokens, vec![Ok(Token::LineComment(" bar\n".into()))]);
    assert_eq!(
        errors,
        vec![ParseErrorKind::HashCommentOutsideTextFormat { span: 0..6 }]
    );

    let mut lexer = Token::lexer("# bar\n");
    lexer.extras.text_format_mode = true;
    assert_eq!(lexer.by_ref().count(), 1);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn block_comments() {
    let source = "/* foo\n   * bar\n   baz */ qux";
    let (tokens, errors) = lex_all(source);

    assert_eq!(
        tokens,
        vec![
            Ok(Token::BlockComment(" foo\n bar\nbaz ".into())),
            Ok(Token::Ident("qux")),
        ]
    );
    assert_eq!(errors, vec![]);
}

#[test]
fn nested_block_comment() {
    let (tokens, errors) = lex_all("/* foo /* bar */ baz");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::BlockComment(" foo /* bar ".into())),
            Ok(Token::Ident("baz")),
        ]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::NestedBlockComment { span: 7..9 }]
    );
}

#[test]
fn unterminated_block_comment() {
    let (tokens, errors) = lex_all("foo /* bar");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::Ident("foo")),
            Ok(Token::BlockComment(" bar".into())),
        ]
    );
    assert_eq!(
        errors,
        vec![ParseErrorKind::UnterminatedBlockComment { span: 4..10 }]
    );
}

#[test]
fn punctuation() {
    let (tokens, errors) = lex_all(".-+(){}[]<>,=:;/");

    assert_eq!(
        tokens,
        vec![
            Ok(Token::Dot),
            Ok(Token::Minus),
            Ok(Token::Plus),
            Ok(Token::LeftParen),
            Ok(Token::RightParen),
            Ok(Token::LeftBrace),
            Ok(Token::RightBrace),
            Ok(Token::LeftBracket),
            Ok(Token::RightBracket),
            Ok(Token::LeftAngleBracket),
            Ok(Token::RightAngleBracket),
            Ok(Token::Comma),
            Ok(Token::Equals),
            Ok(Token::Colon),
            Ok(Token::Semicolon),
            Ok(Token::ForwardSlash),
        ]
    );
    assert_eq!(errors, vec![]);
}

proptest! {
    #[test]
    fn int_round_trip(value: u64) {
        for source in [format!("{}", value), format!("{:#x}", value), format!("0{:o}", value)] {
            let (tokens, errors) = lex_all(&source);
            prop_assert_eq!(tokens, vec![Ok(Token::IntLiteral(value))]);
            prop_assert_eq!(errors, vec![]);
        }
    }

    #[test]
    fn float_round_trip(value in 0f64..1e300) {
        let source = format!("{:e}", value);
        let (tokens, errors) = lex_all(&source);
        prop_assert_eq!(tokens, vec![Ok(Token::FloatLiteral(EqFloat(value)))]);
        prop_assert_eq!(errors, vec![]);
    }
}
