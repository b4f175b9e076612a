use std::path::PathBuf;
use thiserror::Error;

/// 数据集加载错误，属于硬失败，直接返回给调用方
#[derive(Error, Debug)]
pub enum DataError {
    #[error("sales.csv not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 执行器的可恢复错误，`Display` 即返回给调用方的文本
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Error: missing 'operation' in instruction.")]
    MissingOperation,

    #[error("Error: '{operation}' requires {required}.")]
    MissingField {
        operation: &'static str,
        required: &'static str,
    },

    #[error("Error: unknown group_by column '{0}'.")]
    UnknownGroupBy(String),

    #[error("Error: unknown metric column '{0}'.")]
    UnknownMetric(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("Error in filter condition: {0}")]
    FilterCondition(ConditionError),

    #[error("Error in filter_sum: {0}")]
    FilterSumCondition(ConditionError),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Error: expected JSON like {{\"operation\": \"...\", ...}}.")]
    NoInstruction,
}

/// 过滤条件表达式的解析与求值错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("empty condition")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("{0}")]
    Syntax(String),

    #[error("condition nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("condition has more than {0} operators")]
    TooComplex(usize),

    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("name '{0}' is not a known column")]
    UnknownColumn(String),

    #[error("'{op}' not supported between {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("condition must evaluate to a boolean, got {0}")]
    NotBoolean(&'static str),
}
