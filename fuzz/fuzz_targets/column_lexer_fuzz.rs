//! Column definition lexer and parser on arbitrary input.
//!
//! Run with: cargo +nightly fuzz run column_lexer_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_dsl::lexer::{Lexer, TokenKind};
use tessera_dsl::parse_column;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();

        assert!(!tokens.is_empty(), "Tokenization should produce at least Eof");
        assert_eq!(
            tokens.last().map(|t| &t.kind),
            Some(&TokenKind::Eof),
            "Last token should always be Eof"
        );
        for token in &tokens {
            assert!(token.span.start <= token.span.end, "Span start should be <= end");
            assert!(token.span.end <= input.len(), "Span should stay inside the input");
        }

        // Unknown words degrade to defaults; parsing never fails.
        let column = parse_column("c", input);
        assert_eq!(column.name, "c");
    }
});
