use std::collections::HashSet;
use std::fmt;

/// 单元格取值，列类型在加载时推断
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// 数值强制转换：无法解析的值视为缺失
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Null => None,
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f).filter(|v| !v.is_nan()),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NaN"),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => f.write_str(&format_number(*v)),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// 浮点数的文本形式：整数值保留一位小数 (8.0)，其余使用最短往返表示
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// 已归一化列名的表格数据，每次查询重新加载
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

impl Dataset {
    /// 从原始文本记录构造，逐列推断类型 (整数 > 浮点 > 文本)
    pub fn from_raw(columns: Vec<String>, records: Vec<Vec<Option<String>>>) -> Self {
        let kinds: Vec<ColumnKind> = (0..columns.len())
            .map(|idx| infer_kind(records.iter().filter_map(|r| r.get(idx)?.as_deref())))
            .collect();

        let rows = records
            .into_iter()
            .map(|record| {
                let mut values = record.into_iter();
                kinds
                    .iter()
                    .map(|kind| match values.next().flatten() {
                        None => Cell::Null,
                        Some(raw) => typed_cell(*kind, raw),
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn schema(&self) -> HashSet<String> {
        self.columns.iter().cloned().collect()
    }

    /// 返回把指定列强制转换为数值后的副本 (无法解析 → Null)
    pub fn coerce_numeric(&self, idx: usize) -> Dataset {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if let Some(cell) = row.get_mut(idx) {
                    *cell = match cell.as_number() {
                        Some(v) => Cell::Float(v),
                        None => Cell::Null,
                    };
                }
                row
            })
            .collect();
        Dataset {
            columns: self.columns.clone(),
            rows,
        }
    }
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Int;
    for v in values {
        if kind == ColumnKind::Int && v.trim().parse::<i64>().is_ok() {
            continue;
        }
        if v.trim().parse::<f64>().is_ok() {
            kind = ColumnKind::Float;
            continue;
        }
        return ColumnKind::Text;
    }
    kind
}

fn typed_cell(kind: ColumnKind, raw: String) -> Cell {
    match kind {
        ColumnKind::Int => raw.trim().parse().map(Cell::Int).unwrap_or(Cell::Text(raw)),
        ColumnKind::Float => raw.trim().parse().map(Cell::Float).unwrap_or(Cell::Text(raw)),
        ColumnKind::Text => Cell::Text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&[Option<&str>]]) -> Vec<Vec<Option<String>>> {
        values
            .iter()
            .map(|r| r.iter().map(|v| v.map(str::to_string)).collect())
            .collect()
    }

    #[test]
    fn infers_column_types_per_column() {
        let ds = Dataset::from_raw(
            vec!["product_id".into(), "actual_quantity".into(), "actual_price".into()],
            raw(&[
                &[Some("P1"), Some("5"), Some("1.5")],
                &[Some("P2"), None, Some("2")],
            ]),
        );
        assert_eq!(ds.rows()[0][0], Cell::Text("P1".into()));
        assert_eq!(ds.rows()[0][1], Cell::Int(5));
        assert_eq!(ds.rows()[1][1], Cell::Null);
        assert_eq!(ds.rows()[1][2], Cell::Float(2.0));
    }

    #[test]
    fn mixed_column_stays_text_but_coerces() {
        let ds = Dataset::from_raw(
            vec!["metric".into()],
            raw(&[&[Some("10")], &[Some("abc")], &[Some("2.5")]]),
        );
        let coerced: Vec<Option<f64>> = ds.rows().iter().map(|r| r[0].as_number()).collect();
        assert_eq!(coerced, vec![Some(10.0), None, Some(2.5)]);
        assert_eq!(ds.coerce_numeric(0).rows()[1][0], Cell::Null);
    }

    #[test]
    fn short_records_are_padded_with_null() {
        let ds = Dataset::from_raw(vec!["a".into(), "b".into()], raw(&[&[Some("1")]]));
        assert_eq!(ds.rows()[0], vec![Cell::Int(1), Cell::Null]);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(8.0), "8.0");
        assert_eq!(format_number(0.0), "0.0");
        assert_eq!(format_number(2.75), "2.75");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
