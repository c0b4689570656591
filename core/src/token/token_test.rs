use super::*;

fn toks(src: &str) -> Vec<Tok> {
    let mut out: Vec<Tok> = Lexer::new(src)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.tok)
        .collect();
    assert_eq!(out.pop(), Some(Tok::Eof));
    out
}

#[test]
fn lexes_message_send() {
    assert_eq!(
        toks("3 + 4"),
        vec![Tok::Int(3), Tok::BinSel("+".into()), Tok::Int(4)]
    );
}

#[test]
fn lexes_keyword_tokens() {
    assert_eq!(
        toks("p moveBy: 10 and: 20"),
        vec![
            Tok::Id("p".into()),
            Tok::Keyword("moveBy:".into()),
            Tok::Int(10),
            Tok::Keyword("and:".into()),
            Tok::Int(20),
        ]
    );
}

#[test]
fn assignment_is_not_a_keyword() {
    assert_eq!(
        toks("x := 1"),
        vec![Tok::Id("x".into()), Tok::Assign, Tok::Int(1)]
    );
}

#[test]
fn keyword_directly_before_colon_equals() {
    // `x: 1` keyword vs `x := 1` assignment, no space required.
    assert_eq!(
        toks("p x:100"),
        vec![Tok::Id("p".into()), Tok::Keyword("x:".into()), Tok::Int(100)]
    );
    assert_eq!(
        toks("x:=1"),
        vec![Tok::Id("x".into()), Tok::Assign, Tok::Int(1)]
    );
}

#[test]
fn lexes_symbols() {
    assert_eq!(toks("#foo"), vec![Tok::Sym("foo".into())]);
    assert_eq!(toks("#at:put:"), vec![Tok::Sym("at:put:".into())]);
    assert_eq!(toks("#+"), vec![Tok::Sym("+".into())]);
}

#[test]
fn lexes_literal_array_opener() {
    assert_eq!(
        toks("#(1 2)"),
        vec![Tok::HashParen, Tok::Int(1), Tok::Int(2), Tok::RParen]
    );
}

#[test]
fn lexes_strings_with_escapes() {
    assert_eq!(toks(r#""terminated""#), vec![Tok::Str("terminated".into())]);
    assert_eq!(toks(r#""a\nb""#), vec![Tok::Str("a\nb".into())]);
}

#[test]
fn single_quotes_are_comments() {
    assert_eq!(
        toks("1 'this is ignored' + 'and this' 2"),
        vec![Tok::Int(1), Tok::BinSel("+".into()), Tok::Int(2)]
    );
}

#[test]
fn unterminated_comment_errors() {
    assert!(Lexer::new("1 + 'oops").tokenize().is_err());
}

#[test]
fn negative_literal_vs_binary_minus() {
    assert_eq!(toks("-3"), vec![Tok::Int(-3)]);
    assert_eq!(
        toks("5 - 3"),
        vec![Tok::Int(5), Tok::BinSel("-".into()), Tok::Int(3)]
    );
    // Adjacent to an operand, `-` stays a selector even without spaces.
    assert_eq!(
        toks("x -3"),
        vec![Tok::Id("x".into()), Tok::BinSel("-".into()), Tok::Int(3)]
    );
}

#[test]
fn float_and_statement_period() {
    assert_eq!(toks("1.5"), vec![Tok::Float(1.5)]);
    assert_eq!(toks("1."), vec![Tok::Int(1), Tok::Dot]);
}

#[test]
fn binary_runs_munch_maximally() {
    assert_eq!(
        toks("a // b \\ c ~= d"),
        vec![
            Tok::Id("a".into()),
            Tok::BinSel("//".into()),
            Tok::Id("b".into()),
            Tok::BinSel("\\".into()),
            Tok::Id("c".into()),
            Tok::BinSel("~=".into()),
            Tok::Id("d".into()),
        ]
    );
}

#[test]
fn block_tokens() {
    assert_eq!(
        toks("[:a | a]"),
        vec![
            Tok::LBracket,
            Tok::Colon,
            Tok::Id("a".into()),
            Tok::Pipe,
            Tok::Id("a".into()),
            Tok::RBracket,
        ]
    );
}

#[test]
fn positions_track_lines() {
    let tokens = Lexer::new("1\n  abc").tokenize().unwrap();
    assert_eq!(tokens[1].span.start.line, 2);
    assert_eq!(tokens[1].span.start.column, 3);
}
