//! Stable analysis helpers composed by detector filters.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Shannon entropy in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut len = 0usize;
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
        len += 1;
    }
    let len = len as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Luhn checksum over the digits of `s`. Spaces and dashes are ignored;
/// any other non-digit, or fewer than 13 digits, fails the check.
pub fn luhn_check(s: &str) -> bool {
    let mut digits = Vec::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c as u32 - '0' as u32);
        } else if c != ' ' && c != '-' {
            return false;
        }
    }
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn url_host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://([A-Za-z0-9.-]+)"#).expect("static regex"))
}

/// True for hosts that never count as external.
pub fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "0.0.0.0" || host == "::1"
}

/// Unique non-localhost hostnames referenced by http(s) URLs, in order of
/// first appearance.
pub fn extract_domains(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in url_host_re().captures_iter(content) {
        let host = caps[1].to_lowercase();
        if is_local_host(&host) {
            continue;
        }
        if !seen.contains(&host) {
            seen.push(host);
        }
    }
    seen
}
