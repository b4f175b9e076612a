//! 行过滤条件：只做解析和求值，不执行任何代码。
//!
//! 条件写法沿用 DataFrame 查询习惯：列名 (标识符或反引号)、数字与字符串字面量、
//! `True`/`False`、比较运算、`in` / `not in` 列表、四则运算与取模，
//! 以及 `and`/`&`、`or`/`|`、`not`/`~`。先改写为 SQL 表达式交给 sqlparser 解析，
//! 再把语法树编译成绑定了列下标的求值树。

use std::cmp::Ordering;

use sqlparser::ast::{self, BinaryOperator, UnaryOperator};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;

use crate::error::ConditionError;
use crate::models::dataset::Cell;

/// 括号、前缀运算符和编译后求值树的最大嵌套层数
const MAX_DEPTH: usize = 64;
/// 单个条件里二元运算符的上限，限制语法树的链长
const MAX_OPERATORS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }

    fn apply(self, l: f64, r: f64) -> f64 {
        match self {
            ArithOp::Add => l + r,
            ArithOp::Sub => l - r,
            ArithOp::Mul => l * r,
            ArithOp::Div => l / r,
            // 结果与除数同号
            ArithOp::Mod => l - r * (l / r).floor(),
        }
    }
}

enum BinaryKind {
    Compare(CmpOp),
    Arith(ArithOp),
}

fn binary_kind(op: &BinaryOperator) -> Option<BinaryKind> {
    let kind = match op {
        BinaryOperator::Eq => BinaryKind::Compare(CmpOp::Eq),
        BinaryOperator::NotEq => BinaryKind::Compare(CmpOp::Ne),
        BinaryOperator::Lt => BinaryKind::Compare(CmpOp::Lt),
        BinaryOperator::LtEq => BinaryKind::Compare(CmpOp::Le),
        BinaryOperator::Gt => BinaryKind::Compare(CmpOp::Gt),
        BinaryOperator::GtEq => BinaryKind::Compare(CmpOp::Ge),
        BinaryOperator::Plus => BinaryKind::Arith(ArithOp::Add),
        BinaryOperator::Minus => BinaryKind::Arith(ArithOp::Sub),
        BinaryOperator::Multiply => BinaryKind::Arith(ArithOp::Mul),
        BinaryOperator::Divide => BinaryKind::Arith(ArithOp::Div),
        BinaryOperator::Modulo => BinaryKind::Arith(ArithOp::Mod),
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Text(_) => "str",
            Value::Bool(_) => "bool",
        }
    }

    fn from_cell(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Value::Null,
            Cell::Int(i) => Value::Number(*i as f64),
            Cell::Float(f) if f.is_nan() => Value::Null,
            Cell::Float(f) => Value::Number(*f),
            Cell::Text(s) => Value::Text(s.clone()),
        }
    }

    /// 同类型才可能相等；Null 与任何值都不相等
    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

/// 求值树；`and` / `or` 链被展平成列表
#[derive(Debug, Clone)]
enum Expr {
    Column(usize),
    Literal(Value),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    In {
        needle: Box<Expr>,
        list: Vec<Value>,
        negated: bool,
    },
}

/// 已解析、列名已绑定的过滤条件
#[derive(Debug, Clone)]
pub struct Condition {
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str, columns: &[String]) -> Result<Self, ConditionError> {
        if source.trim().is_empty() {
            return Err(ConditionError::Empty);
        }
        let sql = to_sql(source)?;

        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .with_recursion_limit(MAX_DEPTH)
            .try_with_sql(&sql)
            .map_err(syntax_error)?;
        let tree = parser.parse_expr().map_err(syntax_error)?;
        let trailing = parser.peek_token().token;
        if trailing != Token::EOF {
            return Err(ConditionError::Syntax(format!(
                "unexpected '{}' after the condition",
                trailing
            )));
        }

        let expr = compile(&tree, columns, 0)?;
        Ok(Self { expr })
    }

    pub fn matches(&self, row: &[Cell]) -> Result<bool, ConditionError> {
        match eval(&self.expr, row)? {
            Value::Bool(b) => Ok(b),
            other => Err(ConditionError::NotBoolean(other.type_name())),
        }
    }

    /// 按数据集原始顺序返回命中的行
    pub fn filter<'a>(&self, rows: &'a [Vec<Cell>]) -> Result<Vec<&'a [Cell]>, ConditionError> {
        let mut matched = Vec::new();
        for row in rows {
            if self.matches(row)? {
                matched.push(row.as_slice());
            }
        }
        Ok(matched)
    }
}

fn syntax_error(err: ParserError) -> ConditionError {
    match err {
        ParserError::RecursionLimitExceeded => ConditionError::TooDeep(MAX_DEPTH),
        ParserError::TokenizerError(msg) | ParserError::ParserError(msg) => ConditionError::Syntax(msg),
    }
}

// --- 改写为 SQL 表达式 ---

/// 把 `&` `|` `~` `==` 和方括号列表改写成 SQL 写法，字符串统一为单引号、
/// 反引号列名改为双引号标识符。同时限制括号深度、连续前缀运算符和运算符总数。
fn to_sql(source: &str) -> Result<String, ConditionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut sql = String::with_capacity(source.len() + 16);
    let mut depth = 0usize;
    let mut prefix_run = 0usize;
    let mut operators = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        if ch.is_whitespace() {
            sql.push(' ');
            i += 1;
            continue;
        }

        let mut prefix = false;
        let mut binary = false;
        let width = match ch {
            '\'' | '"' => {
                let (text, width) = read_quoted(&chars[i..], ch)
                    .ok_or(ConditionError::UnterminatedString(pos))?;
                sql.push('\'');
                sql.push_str(&text.replace('\'', "''"));
                sql.push('\'');
                width
            }
            '`' => {
                let (name, width) = read_quoted(&chars[i..], '`')
                    .ok_or(ConditionError::UnterminatedString(pos))?;
                sql.push('"');
                sql.push_str(&name.replace('"', "\"\""));
                sql.push('"');
                width
            }
            '(' | '[' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(ConditionError::TooDeep(MAX_DEPTH));
                }
                sql.push('(');
                1
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                sql.push(')');
                1
            }
            ',' => {
                sql.push(',');
                1
            }
            '&' | '|' => {
                binary = true;
                sql.push_str(if ch == '&' { " AND " } else { " OR " });
                if next == Some(ch) {
                    2
                } else {
                    1
                }
            }
            '~' => {
                prefix = true;
                sql.push_str(" NOT ");
                1
            }
            '=' if next == Some('=') => {
                binary = true;
                sql.push_str(" = ");
                2
            }
            '!' if next == Some('=') => {
                binary = true;
                sql.push_str(" <> ");
                2
            }
            '<' | '>' => {
                binary = true;
                sql.push(' ');
                sql.push(ch);
                if next == Some('=') {
                    sql.push_str("= ");
                    2
                } else {
                    sql.push(' ');
                    1
                }
            }
            // 两侧补空格，避免 `--` 和 `/*` 被当成注释
            '-' | '+' | '*' | '/' | '%' => {
                binary = true;
                prefix = matches!(ch, '-' | '+');
                sql.push(' ');
                sql.push(ch);
                sql.push(' ');
                1
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let width = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '.')
                    .count();
                let word: String = chars[i..i + width].iter().map(|(_, c)| c).collect();
                if word.eq_ignore_ascii_case("not") {
                    prefix = true;
                } else if word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or") {
                    binary = true;
                }
                sql.push_str(&word);
                width
            }
            c => return Err(ConditionError::UnexpectedChar { ch: c, pos }),
        };

        prefix_run = if prefix { prefix_run + 1 } else { 0 };
        if prefix_run > MAX_DEPTH {
            return Err(ConditionError::TooDeep(MAX_DEPTH));
        }
        if binary {
            operators += 1;
            if operators > MAX_OPERATORS {
                return Err(ConditionError::TooComplex(MAX_OPERATORS));
            }
        }
        i += width;
    }
    Ok(sql)
}

/// 从开引号开始读取，返回 (内容, 消耗的字符数)；引号内支持反斜杠转义
fn read_quoted(chars: &[(usize, char)], quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == '\\' && quote != '`' {
            out.push(chars.get(i + 1)?.1);
            i += 2;
            continue;
        }
        if c == quote {
            return Some((out, i + 1));
        }
        out.push(c);
        i += 1;
    }
    None
}

// --- 编译语法树 ---

fn compile(expr: &ast::Expr, columns: &[String], depth: usize) -> Result<Expr, ConditionError> {
    if depth > MAX_DEPTH {
        return Err(ConditionError::TooDeep(MAX_DEPTH));
    }
    let next = depth + 1;

    match expr {
        ast::Expr::Identifier(ident) => columns
            .iter()
            .position(|c| *c == ident.value)
            .map(Expr::Column)
            .ok_or_else(|| ConditionError::UnknownColumn(ident.value.clone())),

        ast::Expr::Value(value) => literal(value).map(Expr::Literal),

        ast::Expr::Nested(inner) => compile(inner, columns, next),

        ast::Expr::UnaryOp { op, expr: inner } => {
            let inner = Box::new(compile(inner, columns, next)?);
            match op {
                UnaryOperator::Not => Ok(Expr::Not(inner)),
                UnaryOperator::Minus => Ok(Expr::Neg(inner)),
                UnaryOperator::Plus => Ok(*inner),
                _ => Err(ConditionError::Unsupported(format!("operator {}", op))),
            }
        }

        ast::Expr::BinaryOp {
            op: op @ (BinaryOperator::And | BinaryOperator::Or),
            ..
        } => {
            let operands = flatten(expr, op)
                .into_iter()
                .map(|operand| compile(operand, columns, next))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if *op == BinaryOperator::And {
                Expr::All(operands)
            } else {
                Expr::Any(operands)
            })
        }

        ast::Expr::BinaryOp { left, op, right } => {
            let kind = binary_kind(op)
                .ok_or_else(|| ConditionError::Unsupported(format!("operator {}", op)))?;
            let l = Box::new(compile(left, columns, next)?);
            let r = Box::new(compile(right, columns, next)?);
            Ok(match kind {
                BinaryKind::Compare(op) => Expr::Compare(op, l, r),
                BinaryKind::Arith(op) => Expr::Arith(op, l, r),
            })
        }

        ast::Expr::InList {
            expr: needle,
            list,
            negated,
        } => {
            let needle = Box::new(compile(needle, columns, next)?);
            let list = list.iter().map(list_item).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::In {
                needle,
                list,
                negated: *negated,
            })
        }

        other => Err(ConditionError::Unsupported(other.to_string())),
    }
}

/// 收集同一运算符连接的全部操作数 (从左到右)，不递归
fn flatten<'e>(expr: &'e ast::Expr, op: &BinaryOperator) -> Vec<&'e ast::Expr> {
    let mut operands = Vec::new();
    let mut pending = vec![expr];
    while let Some(current) = pending.pop() {
        match current {
            ast::Expr::BinaryOp {
                left,
                op: inner,
                right,
            } if inner == op => {
                pending.push(right.as_ref());
                pending.push(left.as_ref());
            }
            other => operands.push(other),
        }
    }
    operands
}

fn literal(value: &ast::Value) -> Result<Value, ConditionError> {
    match value {
        ast::Value::Number(n, _) => n
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| ConditionError::Unsupported(format!("number {}", n))),
        ast::Value::SingleQuotedString(s) => Ok(Value::Text(s.clone())),
        ast::Value::Boolean(b) => Ok(Value::Bool(*b)),
        ast::Value::Null => Ok(Value::Null),
        other => Err(ConditionError::Unsupported(other.to_string())),
    }
}

/// `in` 列表只接受字面量 (允许负号和括号)
fn list_item(expr: &ast::Expr) -> Result<Value, ConditionError> {
    match expr {
        ast::Expr::Value(value) => literal(value),
        ast::Expr::Nested(inner) => list_item(inner),
        ast::Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match list_item(inner)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(ConditionError::TypeMismatch {
                op: "-",
                left: other.type_name(),
                right: "number",
            }),
        },
        other => Err(ConditionError::Unsupported(format!("list item {}", other))),
    }
}

// --- 求值 ---

fn eval(expr: &Expr, row: &[Cell]) -> Result<Value, ConditionError> {
    match expr {
        Expr::Column(idx) => Ok(row.get(*idx).map(Value::from_cell).unwrap_or(Value::Null)),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Not(inner) => Ok(Value::Bool(!truth("not", eval(inner, row)?)?)),
        Expr::Neg(inner) => match eval(inner, row)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Null => Ok(Value::Null),
            other => Err(ConditionError::TypeMismatch {
                op: "-",
                left: other.type_name(),
                right: "number",
            }),
        },
        // 逐个求值不短路，类型错误在每一行上都会暴露
        Expr::All(operands) => {
            let mut all = true;
            for operand in operands {
                all &= truth("and", eval(operand, row)?)?;
            }
            Ok(Value::Bool(all))
        }
        Expr::Any(operands) => {
            let mut any = false;
            for operand in operands {
                any |= truth("or", eval(operand, row)?)?;
            }
            Ok(Value::Bool(any))
        }
        Expr::Compare(op, l, r) => compare(*op, &eval(l, row)?, &eval(r, row)?),
        Expr::Arith(op, l, r) => match (eval(l, row)?, eval(r, row)?) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op.apply(a, b))),
            (Value::Null, Value::Number(_) | Value::Null) | (Value::Number(_), Value::Null) => {
                Ok(Value::Null)
            }
            (a, b) => Err(ConditionError::TypeMismatch {
                op: op.symbol(),
                left: a.type_name(),
                right: b.type_name(),
            }),
        },
        Expr::In {
            needle,
            list,
            negated,
        } => {
            let value = eval(needle, row)?;
            let found = list.iter().any(|item| value.loose_eq(item));
            Ok(Value::Bool(found != *negated))
        }
    }
}

fn truth(op: &'static str, value: Value) -> Result<bool, ConditionError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ConditionError::TypeMismatch {
            op,
            left: other.type_name(),
            right: "bool",
        }),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value, ConditionError> {
    let ord = match (left, right) {
        // Null 不等于任何值，也不参与大小比较
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Bool(op == CmpOp::Ne)),
        (Value::Number(a), Value::Number(b)) => match a.partial_cmp(b) {
            Some(ord) => ord,
            None => return Ok(Value::Bool(op == CmpOp::Ne)),
        },
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => {
            return match op {
                CmpOp::Eq => Ok(Value::Bool(false)),
                CmpOp::Ne => Ok(Value::Bool(true)),
                _ => Err(ConditionError::TypeMismatch {
                    op: op.symbol(),
                    left: a.type_name(),
                    right: b.type_name(),
                }),
            }
        }
    };
    Ok(Value::Bool(op.holds(ord)))
}
