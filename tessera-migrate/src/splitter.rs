//! SQL statement splitting.
//!
//! Migration files are sent one statement per call, so a script has to be
//! cut at top-level semicolons without cutting inside string literals,
//! quoted identifiers, comments or trigger bodies.

/// Drizzle-style explicit statement separator.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// Split a migration script into individual statements.
///
/// Returned statements are trimmed, have no trailing semicolon, and
/// comment-only fragments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(STATEMENT_BREAKPOINT)
        .flat_map(split_on_semicolons)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    Bracket,
    LineComment,
    BlockComment,
}

fn split_on_semicolons(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut state = State::Normal;
    let mut word = String::new();
    // The first few words decide whether BEGIN opens a trigger body.
    let mut leading: Vec<String> = Vec::new();
    let mut in_trigger = false;
    let mut depth = 0usize;

    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if state == State::Normal && !(c.is_ascii_alphanumeric() || c == '_') && !word.is_empty() {
            let upper = word.to_ascii_uppercase();
            if leading.len() < 4 {
                leading.push(upper.clone());
                in_trigger = leading.first().map(String::as_str) == Some("CREATE")
                    && leading.iter().any(|w| w == "TRIGGER");
            }
            if in_trigger {
                match upper.as_str() {
                    "BEGIN" | "CASE" => depth += 1,
                    "END" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            word.clear();
        }

        match state {
            State::Normal => match c {
                ';' if depth == 0 => {
                    if has_content {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_content = false;
                    leading.clear();
                    in_trigger = false;
                    continue;
                }
                '\'' => state = State::SingleQuote,
                '"' => state = State::DoubleQuote,
                '`' => state = State::Backtick,
                '[' => state = State::Bracket,
                '-' if chars.peek() == Some(&'-') => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    if let Some(star) = chars.next() {
                        current.push(star);
                    }
                    state = State::BlockComment;
                    continue;
                }
                c if c.is_ascii_alphanumeric() || c == '_' => word.push(c),
                _ => {}
            },
            State::SingleQuote if c == '\'' => state = State::Normal,
            State::DoubleQuote if c == '"' => state = State::Normal,
            State::Backtick if c == '`' => state = State::Normal,
            State::Bracket if c == ']' => state = State::Normal,
            State::LineComment if c == '\n' => state = State::Normal,
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                if let Some(slash) = chars.next() {
                    current.push(slash);
                }
                state = State::Normal;
                continue;
            }
            _ => {}
        }

        if !matches!(state, State::LineComment | State::BlockComment) && !c.is_whitespace() {
            has_content = true;
        }
        current.push(c);
    }

    if has_content {
        statements.push(current.trim().to_string());
    }
    statements
}
