//! Built-in detectors.
//!
//! Five named collections: secrets, dangerous operations, PII, obfuscation,
//! network use. Filters are pure functions of `(match, line)`.

use crate::analysis::{is_local_host, luhn_check, shannon_entropy};
use crate::rules::ScanRule;
use crate::types::{Category, Severity};

/// Minimum quoted-string length considered by the high-entropy rule.
pub const HIGH_ENTROPY_MIN_LEN: usize = 40;
/// Bits per character above which a quoted string is flagged.
pub const HIGH_ENTROPY_THRESHOLD: f64 = 4.5;

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

fn high_entropy_filter(matched: &str, _line: &str) -> bool {
    let token = strip_quotes(matched);
    token.len() >= HIGH_ENTROPY_MIN_LEN && shannon_entropy(token) >= HIGH_ENTROPY_THRESHOLD
}

/// Example and documentation domains never count as PII.
fn non_example_email_filter(matched: &str, _line: &str) -> bool {
    let domain = matched.rsplit('@').next().unwrap_or_default().to_lowercase();
    let doc_domains = [
        "example.com",
        "example.org",
        "example.net",
        "test.com",
        "localhost",
    ];
    !doc_domains
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{}", d)))
}

fn luhn_filter(matched: &str, _line: &str) -> bool {
    luhn_check(matched)
}

fn url_host(matched: &str) -> String {
    let after_scheme = matched
        .splitn(2, "://")
        .nth(1)
        .unwrap_or_default();
    after_scheme
        .split(|c| c == '/' || c == ':' || c == '?' || c == '#')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn external_host_filter(matched: &str, _line: &str) -> bool {
    let host = url_host(matched);
    !host.is_empty() && !is_local_host(&host)
}

/// Secret material: cloud keys, tokens, private keys, hardcoded literals.
pub fn secret_rules() -> Vec<ScanRule> {
    vec![
        ScanRule::new(
            "SEC001",
            Category::Secret,
            Severity::Critical,
            r"\bAKIA[0-9A-Z]{16}\b",
            "AWS access key id",
        )
        .with_remediation("Remove the key and rotate it in the AWS console"),
        ScanRule::new(
            "SEC002",
            Category::Secret,
            Severity::Critical,
            r"\bgh[pousr]_[A-Za-z0-9]{36,255}\b|\bgithub_pat_[A-Za-z0-9_]{22,255}\b",
            "GitHub token",
        )
        .with_remediation("Revoke the token in GitHub settings"),
        ScanRule::new(
            "SEC003",
            Category::Secret,
            Severity::Critical,
            r"\bsk_live_[0-9a-zA-Z]{24,}\b",
            "Stripe live secret key",
        )
        .with_remediation("Roll the key in the Stripe dashboard"),
        ScanRule::new(
            "SEC004",
            Category::Secret,
            Severity::Critical,
            r"\bsk-(?:proj-)?[A-Za-z0-9]{32,}\b",
            "OpenAI API key",
        )
        .with_remediation("Revoke the key at platform.openai.com"),
        ScanRule::new(
            "SEC005",
            Category::Secret,
            Severity::Critical,
            r"\bxox[baprs]-[0-9A-Za-z-]{10,}\b",
            "Slack token",
        )
        .with_remediation("Revoke the token in the Slack app config"),
        ScanRule::new(
            "SEC006",
            Category::Secret,
            Severity::Critical,
            r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |ENCRYPTED )?PRIVATE KEY-----",
            "PEM private key material",
        )
        .with_remediation("Never ship private keys inside a skill"),
        ScanRule::new(
            "SEC007",
            Category::Secret,
            Severity::High,
            r#"(?i)\b(?:api[_-]?key|password|passwd|secret)\b\s*[:=]\s*["'][^"']{8,}["']"#,
            "Hardcoded credential literal",
        )
        .with_remediation("Load secrets from the environment instead"),
        ScanRule::new(
            "SEC008",
            Category::Secret,
            Severity::Medium,
            r#"["'][A-Za-z0-9+/=_\-]{40,}["']"#,
            "High-entropy quoted string, possible secret",
        )
        .with_filter(high_entropy_filter),
    ]
}

/// Operations that execute, destroy, or exfiltrate.
pub fn dangerous_rules() -> Vec<ScanRule> {
    vec![
        ScanRule::new(
            "DAN001",
            Category::Dangerous,
            Severity::High,
            r"(?:^|[^.\w])(?:eval|exec)\s*\(|\bnew\s+Function\s*\(",
            "Dynamic code evaluation",
        ),
        ScanRule::new(
            "DAN002",
            Category::Dangerous,
            Severity::Critical,
            r"(?:curl|wget)[^|\n]*\|\s*(?:ba|z|fi)?sh\b",
            "Remote script piped into a shell",
        )
        .with_remediation("Download and review first; never pipe to a shell"),
        ScanRule::new(
            "DAN003",
            Category::Dangerous,
            Severity::High,
            r"\brm\s+-[a-zA-Z]*[rf][a-zA-Z]*\s|shutil\.rmtree\s*\(|\brimraf\b",
            "Destructive filesystem command",
        ),
        ScanRule::new(
            "DAN004",
            Category::Dangerous,
            Severity::Medium,
            r"\bsubprocess\.(?:run|call|Popen|check_output|check_call)\s*\(|\bchild_process\b|\bexecSync\s*\(|\bspawnSync?\s*\(|\bos\.system\s*\(|\bos\.popen\s*\(",
            "Child process spawning",
        ),
        ScanRule::new(
            "DAN005",
            Category::Dangerous,
            Severity::High,
            r"(?:process\.env|os\.environ)[^\n]{0,120}(?:https?://|fetch\s*\(|axios|requests\.)|(?:https?://|fetch\s*\(|axios|requests\.)[^\n]{0,120}(?:process\.env|os\.environ)",
            "Environment variables combined with network calls",
        )
        .with_remediation("Skills must not transmit host environment data"),
    ]
}

/// Personally identifying information.
pub fn pii_rules() -> Vec<ScanRule> {
    vec![
        ScanRule::new(
            "PII001",
            Category::Pii,
            Severity::Low,
            r"(?:/Users/|/home/)[A-Za-z0-9._\-]+|C:\\Users\\[A-Za-z0-9._\-]+",
            "User home directory path",
        ),
        ScanRule::new(
            "PII002",
            Category::Pii,
            Severity::Low,
            r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
            "Email address",
        )
        .with_filter(non_example_email_filter),
        ScanRule::new(
            "PII003",
            Category::Pii,
            Severity::Low,
            r"\b(?:\+?1[-. ])?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            "Phone number",
        ),
        ScanRule::new(
            "PII004",
            Category::Pii,
            Severity::Medium,
            r"\b\d{3}-\d{2}-\d{4}\b",
            "US social security number pattern",
        ),
        ScanRule::new(
            "PII005",
            Category::Pii,
            Severity::Medium,
            r"\b\d{4}[- ]\d{4}[- ]\d{4}[- ]\d{3,4}\b|\b\d{13,16}\b",
            "Credit card number",
        )
        .with_filter(luhn_filter),
    ]
}

/// Encodings that hide intent.
pub fn obfuscation_rules() -> Vec<ScanRule> {
    vec![
        ScanRule::new(
            "OBF001",
            Category::Obfuscation,
            Severity::Medium,
            r#"\batob\s*\(|\bb64decode\b|base64\.b64decode|base64\s+-[dD]\b|Buffer\.from\s*\([^)]*,\s*["']base64["']"#,
            "Base64 decoding",
        ),
        ScanRule::new(
            "OBF002",
            Category::Obfuscation,
            Severity::Medium,
            r"(?:\\x[0-9a-fA-F]{2}){8,}",
            "Long hex-escape run",
        ),
        ScanRule::new(
            "OBF003",
            Category::Obfuscation,
            Severity::Low,
            r"[A-Za-z0-9+/]{120,}={0,2}",
            "Long base64-looking blob",
        ),
        ScanRule::new(
            "OBF004",
            Category::Obfuscation,
            Severity::Medium,
            r"String\.fromCharCode\s*\(|(?:chr\s*\(\s*\d+\s*\)\s*\+\s*){3,}",
            "Character-code string synthesis",
        ),
        ScanRule::new(
            "OBF005",
            Category::Obfuscation,
            Severity::Low,
            r"\b(?:decodeURIComponent|unescape|unquote(?:_plus)?)\s*\(",
            "URL decoding",
        ),
    ]
}

/// Network reach, declared or not.
pub fn network_rules() -> Vec<ScanRule> {
    vec![
        ScanRule::new(
            "NET001",
            Category::Network,
            Severity::Medium,
            r#"https?://[^\s"'<>)]+"#,
            "External URL",
        )
        .with_filter(external_host_filter),
        ScanRule::new(
            "NET002",
            Category::Network,
            Severity::Low,
            r#"require\s*\(\s*["'](?:https?|node-fetch|axios)["']\s*\)|^\s*import\s+(?:requests|urllib|aiohttp|httpx|http\.client)\b|^\s*from\s+(?:requests|urllib|aiohttp|httpx|http)\b"#,
            "HTTP module import",
        ),
        ScanRule::new(
            "NET003",
            Category::Network,
            Severity::Medium,
            r#"wss?://[^\s"'<>)]+"#,
            "Websocket target",
        )
        .with_filter(external_host_filter),
        ScanRule::new(
            "NET004",
            Category::Network,
            Severity::Low,
            r"\b(?:axios|node-fetch|superagent|httpx|aiohttp)\b",
            "HTTP client library reference",
        ),
    ]
}

/// All built-in rules, in detector order.
pub fn default_rules() -> Vec<ScanRule> {
    let mut rules = secret_rules();
    rules.extend(dangerous_rules());
    rules.extend(pii_rules());
    rules.extend(obfuscation_rules());
    rules.extend(network_rules());
    rules
}
