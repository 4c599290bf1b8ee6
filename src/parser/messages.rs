//! Error and warning message catalog
//!
//! Consumers pattern-match on these strings, so the templates are kept
//! verbatim. Parameters are written `%1`, `%2`, ... and substituted
//! positionally by [`format_message`].

pub const UNEXPECTED: &str = "unexpected %1 '%2' near '%3'";
pub const UNEXPECTED_EOF: &str = "unexpected symbol near '<eof>'";
pub const EXPECTED: &str = "'%1' expected near '%2'";
pub const EXPECTED_TOKEN: &str = "%1 expected near '%2'";
pub const UNFINISHED_STRING: &str = "unfinished string near '%1'";
pub const MALFORMED_NUMBER: &str = "malformed number near '%1'";
pub const DECIMAL_ESCAPE_TOO_LARGE: &str = "decimal escape too large near '%1'";
pub const INVALID_ESCAPE: &str = "invalid escape sequence near '%1'";
pub const HEXADECIMAL_DIGIT_EXPECTED: &str = "hexadecimal digit expected near '%1'";
pub const TOO_LARGE_CODEPOINT: &str = "UTF-8 value too large near '%1'";
pub const UNFINISHED_LONG_STRING: &str = "unfinished long string (starting at line %1) near '%2'";
pub const UNFINISHED_LONG_COMMENT: &str =
    "unfinished long comment (starting at line %1) near '%2'";
pub const NO_LOOP_TO_BREAK: &str = "no loop to break near '%1'";
pub const LABEL_ALREADY_DEFINED: &str = "label '%1' already defined on line %2";
pub const LABEL_NOT_VISIBLE: &str = "no visible label '%1' for goto";
pub const GOTO_JUMP_IN_LOCAL_SCOPE: &str = "<goto %1> jumps into the scope of local '%2'";
pub const CANNOT_USE_VARARG: &str = "cannot use '...' outside a vararg function near '%1'";
pub const INVALID_CODE_UNIT: &str = "code unit U+%1 is not allowed in the current encoding mode";
pub const TOO_MANY_SYNTAX_LEVELS: &str = "chunk has too many syntax levels";
pub const INCLUDE_NOT_FOUND: &str = "#include target '%1' does not exist";
pub const INCLUDE_NOT_A_FILE: &str = "#include target '%1' is not a file";
pub const INCLUDE_UNREADABLE: &str = "could not read #include target '%1': %2";
pub const CIRCULAR_INCLUDE: &str = "circular #includes";
pub const UNDEFINED_VARIABLE: &str = "undefined variable: %1";
pub const UNUSED_LOCAL: &str = "unused local variable: %1";
pub const UNUSED_PARAMETER: &str = "unused function parameter: %1";

/// Substitute `%1`, `%2`, ... in `template` with `args`.
///
/// Placeholders without a matching argument are left as written. Arguments
/// are not rescanned, so a `%2` inside the first argument stays literal.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some(&(_, digit)) if digit.is_ascii_digit() && digit != '0' => {
                chars.next();
                let slot = digit as usize - '1' as usize;
                match args.get(slot) {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('%');
                        out.push(digit);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    out
}
