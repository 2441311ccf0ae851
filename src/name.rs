//! Identifier normalization and physical table naming.
//!
//! Every name that reaches SQL goes through `snake` first; `formal` and
//! `alias` translate between configured source names and physical table
//! names carrying the engine-wide prefix.

/// Convert an identifier to `snake_case`, inserting underscores at case and
/// digit boundaries. `-`, `.` and spaces become underscores.
pub fn snake(input: &str) -> String {
    let chars: Vec<char> = input.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = chars.get(i + 1).copied();

        match c {
            '-' | '.' | ' ' => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
            }
            '_' => {
                out.push('_');
            }
            c if c.is_ascii_uppercase() => {
                let after_lower = matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit());
                let acronym_end = matches!(prev, Some(p) if p.is_ascii_uppercase())
                    && matches!(next, Some(n) if n.is_ascii_lowercase());
                if (after_lower || acronym_end) && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            }
            c if c.is_ascii_digit() => {
                if matches!(prev, Some(p) if p.is_ascii_alphabetic()) && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out
}

/// A string is valid iff it round-trips through `snake` unchanged.
pub fn is_snake(input: &str) -> bool {
    snake(input) == input
}

/// Compute the physical table name: join `name` and each of `more` with
/// underscores, snake-case every part, and prepend the prefix. The prefix is
/// suppressed when the name already starts with it, or with any suffix of it
/// (so a `be_eql` prefix never produces `be_eql_eql_page`). A name exactly
/// equal to the prefix still gets prefixed.
pub fn formal(prefix: &str, name: &str, more: &[&str]) -> String {
    let mut full = snake(name);
    for part in more {
        full.push('_');
        full.push_str(&snake(part));
    }

    if prefix.is_empty() {
        return full;
    }

    if full != prefix && full.starts_with(&format!("{prefix}_")) {
        return full;
    }

    let parts: Vec<&str> = prefix.split('_').collect();
    for i in (0..parts.len()).rev() {
        let tail = format!("{}_", parts[i..].join("_"));
        if let Some(trimmed) = full.strip_prefix(&tail) {
            return format!("{prefix}_{trimmed}");
        }
    }

    format!("{prefix}_{full}")
}

/// Strip the prefix from a formal name, returning the source-facing alias.
pub fn alias(prefix: &str, name: &str) -> String {
    let name = snake(name);
    if prefix.is_empty() {
        return name;
    }
    let full = formal(prefix, &name, &[]);
    match full.strip_prefix(&format!("{prefix}_")) {
        Some(stripped) => stripped.to_string(),
        None => full,
    }
}
