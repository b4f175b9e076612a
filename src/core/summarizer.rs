/// 简短摘要的最大字符数
const BLURB_LIMIT: usize = 500;

/// 把执行器输出整理成一句话：排行表取第一项，否则截断成简介
pub fn summarize(text: &str) -> String {
    let txt = text.trim();
    if txt.is_empty() {
        return "No result.".to_string();
    }
    if let Some((key, value)) = top_ranked_item(txt) {
        return format!("Top item: {} with {:.2}.", key, value);
    }
    blurb(txt, BLURB_LIMIT)
}

/// 识别 "键 值" 排行表；任何一行末尾不是数字就放弃
fn top_ranked_item(txt: &str) -> Option<(String, f64)> {
    let lines: Vec<&str> = txt.lines().filter(|l| !l.trim().is_empty()).collect();
    if !looks_like_key(lines.first()?.trim()) {
        return None;
    }

    let mut top = None;
    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // 单独一个词的行是分组列名
        let Some((value, key)) = parts.split_last().filter(|(_, key)| !key.is_empty()) else {
            continue;
        };
        let value = parse_value(value)?;
        top.get_or_insert_with(|| (key.join(" "), value));
    }
    top
}

/// 首行去掉末尾数值后不含空白和冒号，才可能是分组列名或第一个键
fn looks_like_key(first: &str) -> bool {
    let head = match first.rsplit_once(char::is_whitespace) {
        Some((key, value)) if parse_value(value).is_some() => key.trim_end(),
        _ => first,
    };
    !head.contains(char::is_whitespace) && !head.contains(':')
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn blurb(txt: &str, limit: usize) -> String {
    let mut chars = txt.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(summarize(""), "No result.");
        assert_eq!(summarize("  \n\t "), "No result.");
    }

    #[test]
    fn ranked_pairs_pick_first_line() {
        assert_eq!(
            summarize("product_id  500\nproduct_id2  300"),
            "Top item: product_id with 500.00."
        );
    }

    #[test]
    fn series_with_header_line() {
        assert_eq!(
            summarize("product_id\nP2    9.0\nP1    8.0"),
            "Top item: P2 with 9.00."
        );
        assert_eq!(
            summarize("location\nNew York    1,234.5\nLima    10"),
            "Top item: New York with 1234.50."
        );
    }

    #[test]
    fn sentences_and_errors_fall_back_to_blurb() {
        assert_eq!(summarize("No rows matched."), "No rows matched.");
        assert_eq!(
            summarize("Error: unknown metric column 'x'."),
            "Error: unknown metric column 'x'."
        );
        assert_eq!(summarize("42.5"), "42.5");
    }

    #[test]
    fn non_numeric_value_abandons_detection() {
        let text = "product_id\nP1    9\nP2    lots";
        assert_eq!(summarize(text), text);
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let text = "word ".repeat(200);
        let out = summarize(&text);
        assert_eq!(out.chars().count(), 501);
        assert!(out.ends_with('…'));

        let exact = "x y".repeat(100);
        assert_eq!(summarize(&exact), exact);
    }
}
