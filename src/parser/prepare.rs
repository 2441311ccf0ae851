//! Pre-parse placeholder substitution.
//!
//! `{N}` markers outside string literals are replaced with a textual form
//! of the Nth argument before parsing; markers inside strings stay put and
//! are bound later by `Value::apply`. Out-of-range markers are left alone.

use crate::ast::values::quote_text;
use crate::value::{EqlValue, TIME_FORMAT};

fn render_arg(arg: &EqlValue) -> String {
    match arg {
        EqlValue::Text(s) => quote_text(s),
        EqlValue::Time(t) => quote_text(&t.format(TIME_FORMAT).to_string()),
        other => other.to_string(),
    }
}

/// Substitute positional placeholders into an EQL template, honoring quote
/// boundaries.
pub fn prepare_syntax(format: &str, args: &[EqlValue]) -> String {
    if args.is_empty() {
        return format.to_string();
    }

    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '{' => {
                let mut j = i + 1;
                let mut digits = String::new();
                while j < chars.len() && chars[j].is_ascii_digit() {
                    digits.push(chars[j]);
                    j += 1;
                }
                if !digits.is_empty() && j < chars.len() && chars[j] == '}' {
                    let n: usize = digits.parse().unwrap_or(0);
                    if n >= 1 && n <= args.len() {
                        out.push_str(&render_arg(&args[n - 1]));
                        i = j + 1;
                        continue;
                    }
                }
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
