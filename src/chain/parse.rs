use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SQL\s*Query\s*:\s*").expect("valid label regex"));

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\(*\s*(SELECT|WITH|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP)\b")
        .expect("valid keyword regex")
});

/// Pulls the SQL statement out of a model completion.
///
/// Handles fenced code blocks (with or without a language tag), a leading
/// `SQLQuery:` label, and prose before or after the statement. The statement
/// runs from the first line that opens with a SQL keyword up to a blank line,
/// a closing fence, or a line ending in `;`. Returns `None` when nothing that
/// looks like SQL remains.
pub fn extract_sql(content: &str) -> Option<String> {
    let unfenced = strip_code_fence(content).unwrap_or(content);
    let unlabeled = LABEL.replace(unfenced.trim(), "");
    let candidate = unlabeled.trim();

    let lines: Vec<&str> = candidate.lines().collect();
    let start = lines.iter().position(|l| KEYWORD.is_match(l.trim()))?;
    if start > 0 {
        debug!("Skipping {} lines of prose before the statement", start);
    }

    let mut statement: Vec<&str> = Vec::new();
    for line in &lines[start..] {
        let line = line.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with("```") {
            break;
        }
        statement.push(line);
        if line.ends_with(';') {
            break;
        }
    }

    let sql = statement
        .join("\n")
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .to_string();
    debug!("Extracted SQL: {}", sql);
    Some(sql)
}

fn strip_code_fence(content: &str) -> Option<&str> {
    let start = content.find("```")?;
    let after = &content[start + 3..];
    // Skip an optional language tag on the opening fence line
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let tag = after[..body_start].trim();
    let body = if tag.is_empty() || tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        &after[body_start..]
    } else {
        after
    };
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}
