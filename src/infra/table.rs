//! 查询结果的纯文本渲染

use crate::models::dataset::Cell;

/// 行表格：表头 + 行，各列按最宽单元格右对齐，单空格分隔，不输出行号
pub fn render_frame(columns: &[String], rows: &[&[Cell]]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|i| row.get(i).map(Cell::to_string).unwrap_or_else(|| "NaN".to_string()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &mut dyn Iterator<Item = &String>| -> String {
        cells
            .zip(&widths)
            .map(|(cell, w)| format!("{:>width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut lines = Vec::with_capacity(body.len() + 1);
    lines.push(line(&mut columns.iter()));
    for r in &body {
        lines.push(line(&mut r.iter()));
    }
    lines.join("\n")
}

/// 分组结果：首行为分组列名，之后每组一行 (键左对齐，值右对齐)
pub fn render_series(index_name: &str, entries: &[(String, String)]) -> String {
    let key_width = entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let value_width = entries.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);

    let mut out = String::from(index_name);
    for (key, value) in entries {
        out.push('\n');
        out.push_str(&format!(
            "{:<kw$}    {:>vw$}",
            key,
            value,
            kw = key_width,
            vw = value_width
        ));
    }
    out
}
