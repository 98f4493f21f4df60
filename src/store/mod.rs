//! Data access layer: typed filters in, parameterized SQL out.
//!
//! Every function takes the connection explicitly; the connection itself is
//! owned by the process (`ipc::AppState`).

pub mod attendance;
pub mod classes;
pub mod students;

/// `?, ?, ?` for an `IN (...)` list of `n` items.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Case-insensitive substring pattern with LIKE wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
