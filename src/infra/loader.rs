use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::core::alias_engine::AliasEngine;
use crate::core::normalizer::normalize_columns;
use crate::error::DataError;
use crate::models::dataset::Dataset;

const SNIFF_LINES: usize = 20;
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const FALLBACK_DELIMITER: u8 = b';';

/// 读取时视为缺失值的文本
const NA_TOKENS: [&str; 12] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

struct RawFrame {
    headers: Vec<String>,
    records: Vec<Vec<Option<String>>>,
}

/// 加载并归一化数据集
///
/// 先自动探测分隔符，失败则改用分号重读；探测结果退化为单列且表头含分号时同样强制分号。
#[instrument(skip(aliases), fields(path = %path.display()))]
pub fn load_dataset(path: &Path, aliases: &AliasEngine) -> Result<Dataset, DataError> {
    if !path.exists() {
        warn!("数据集文件不存在");
        return Err(DataError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    let frame = parse_frame(&bytes, sniff_delimiter(&bytes)).map_err(|source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let columns = normalize_columns(&frame.headers, aliases);
    let dataset = Dataset::from_raw(columns, frame.records);
    info!(
        "数据集加载完成: {} 列, {} 行",
        dataset.columns().len(),
        dataset.len()
    );
    Ok(dataset)
}

fn parse_frame(bytes: &[u8], detected: Option<u8>) -> Result<RawFrame, csv::Error> {
    let frame = match detected.map(|d| (d, read_frame(bytes, d))) {
        Some((delimiter, Ok(frame))) => {
            debug!("探测到分隔符: {:?}", delimiter as char);
            frame
        }
        Some((delimiter, Err(e))) => {
            warn!("按探测分隔符 {:?} 读取失败，改用分号: {}", delimiter as char, e);
            return read_frame(bytes, FALLBACK_DELIMITER);
        }
        None => {
            debug!("分隔符探测失败，改用分号");
            return read_frame(bytes, FALLBACK_DELIMITER);
        }
    };

    if frame.headers.len() == 1 && frame.headers[0].contains(';') {
        debug!("单列表头仍包含分号，强制按分号重读");
        return read_frame(bytes, FALLBACK_DELIMITER);
    }
    Ok(frame)
}

fn read_frame(bytes: &[u8], delimiter: u8) -> Result<RawFrame, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(
            record
                .iter()
                .map(|field| {
                    if NA_TOKENS.contains(&field) {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(RawFrame { headers, records })
}

/// 在前若干行中选出每行出现次数一致且非零的候选分隔符，次数最多者胜出
fn sniff_delimiter(bytes: &[u8]) -> Option<u8> {
    let text = String::from_utf8_lossy(bytes);
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        if best.map_or(true, |(_, n)| first > n) {
            best = Some((candidate, first));
        }
    }
    best.map(|(d, _)| d)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            quoted = !quoted;
        } else if b == delimiter && !quoted {
            count += 1;
        }
    }
    count
}
