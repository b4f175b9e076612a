use crate::core::alias_engine::AliasEngine;

/// 结构归一化：拆分 camelCase / PascalCase，转小写，非 `[a-z0-9]` 连续段替换为单个下划线，去掉首尾下划线
pub fn normalize_column_name(raw: &str) -> String {
    let split = split_acronyms(&split_lower_upper(raw));
    let lowered = split.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if in_gap && !out.is_empty() {
                out.push('_');
            }
            in_gap = false;
            out.push(ch);
        } else {
            in_gap = true;
        }
    }
    out
}

/// 先结构归一化，再按别名表精确改名
pub fn normalize_columns(raw: &[String], aliases: &AliasEngine) -> Vec<String> {
    raw.iter()
        .map(|name| {
            let normalized = normalize_column_name(name);
            match aliases.resolve(&normalized) {
                Some(canonical) => canonical.to_string(),
                None => normalized,
            }
        })
        .collect()
}

/// `[a-z0-9_]+`，且首尾不是下划线
pub fn is_canonical(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('_')
        && !name.ends_with('_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// aB -> a_B, 1B -> 1_B
fn split_lower_upper(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for ch in s.chars() {
        if let Some(p) = prev {
            if (p.is_ascii_lowercase() || p.is_ascii_digit()) && ch.is_ascii_uppercase() {
                out.push('_');
            }
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

// HTTPServer -> HTTP_Server
fn split_acronyms(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        let after_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
        let before_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
        if ch.is_ascii_uppercase() && after_upper && before_lower {
            out.push('_');
        }
        out.push(ch);
    }
    out
}
