//! A hand-rolled parser for the two statement forms this shell accepts:
//!
//! ```text
//! LOAD <table> FROM '<file>' [WITH INDEX]
//! SELECT <key|value|*|count(*)> FROM <table> [WHERE <cond> [AND <cond>]*]
//! ```
//!
//! This is not a general SQL grammar - there is no `OR`, no joins, no
//! subqueries. It exists to exercise the planner and runner end to end.

use ixdb_engine::{Attr, CmpOp, Predicate};
pub use ixdb_engine::Projection;

#[derive(Debug, Clone)]
pub enum Statement {
    Load { table: String, file: String, with_index: bool },
    Select { table: String, projection: Projection, predicates: Vec<PredicateSpec> },
}

/// A parsed predicate before the literal's type has been checked against
/// its attribute (`key` predicates must carry an integer literal).
#[derive(Debug, Clone)]
pub struct PredicateSpec {
    pub attr: Attr,
    pub op: CmpOp,
    pub literal: String,
}

impl PredicateSpec {
    pub fn into_predicate(self) -> Result<Predicate, String> {
        match self.attr {
            Attr::Key => {
                let v: i32 = self
                    .literal
                    .parse()
                    .map_err(|_| format!("'{}' is not a valid integer key literal", self.literal))?;
                Ok(Predicate::key(self.op, v))
            }
            Attr::Value => Ok(Predicate::value(self.op, self.literal)),
        }
    }
}

pub fn parse(line: &str) -> Result<Statement, String> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Err("empty statement".to_string());
    }

    match tokens[0].to_ascii_uppercase().as_str() {
        "LOAD" => parse_load(&tokens),
        "SELECT" => parse_select(&tokens),
        other => Err(format!("unrecognized statement: {other}")),
    }
}

fn parse_load(tokens: &[String]) -> Result<Statement, String> {
    // LOAD <table> FROM <file> [WITH INDEX]
    if tokens.len() < 4 || !tokens[2].eq_ignore_ascii_case("FROM") {
        return Err("expected: LOAD <table> FROM '<file>' [WITH INDEX]".to_string());
    }
    let table = tokens[1].clone();
    let file = tokens[3].clone();
    let with_index = tokens.len() >= 6
        && tokens[4].eq_ignore_ascii_case("WITH")
        && tokens[5].eq_ignore_ascii_case("INDEX");
    Ok(Statement::Load { table, file, with_index })
}

fn parse_select(tokens: &[String]) -> Result<Statement, String> {
    // SELECT <proj> FROM <table> [WHERE <cond> [AND <cond>]*]
    if tokens.len() < 4 || !tokens[2].eq_ignore_ascii_case("FROM") {
        return Err("expected: SELECT <key|value|*|count(*)> FROM <table> [WHERE ...]".to_string());
    }
    let projection = match tokens[1].to_ascii_lowercase().as_str() {
        "key" => Projection::Key,
        "value" => Projection::Value,
        "*" => Projection::Both,
        "count(*)" => Projection::Count,
        other => return Err(format!("unrecognized projection: {other}")),
    };
    let table = tokens[3].clone();

    let mut predicates = Vec::new();
    if tokens.len() > 4 {
        if !tokens[4].eq_ignore_ascii_case("WHERE") {
            return Err(format!("expected WHERE, found '{}'", tokens[4]));
        }
        let mut i = 5;
        loop {
            if i + 2 >= tokens.len() {
                return Err("incomplete WHERE clause".to_string());
            }
            let attr = match tokens[i].to_ascii_lowercase().as_str() {
                "key" => Attr::Key,
                "value" => Attr::Value,
                other => return Err(format!("unrecognized attribute: {other}")),
            };
            let op = match tokens[i + 1].as_str() {
                "=" => CmpOp::Eq,
                "<>" | "!=" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                other => return Err(format!("unrecognized operator: {other}")),
            };
            let literal = tokens[i + 2].clone();
            predicates.push(PredicateSpec { attr, op, literal });

            i += 3;
            if i >= tokens.len() {
                break;
            }
            if !tokens[i].eq_ignore_ascii_case("AND") {
                return Err(format!("expected AND, found '{}'", tokens[i]));
            }
            i += 1;
        }
    }

    Ok(Statement::Select { table, projection, predicates })
}

/// Split on whitespace, treating a `'...'`/`"..."` run as a single token
/// with the quotes stripped.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            chars.next();
        } else if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            while let Some(&c) = chars.peek() {
                if c == quote {
                    chars.next();
                    break;
                }
                current.push(c);
                chars.next();
            }
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
            chars.next();
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_with_index() {
        let stmt = parse("LOAD orders FROM 'orders.csv' WITH INDEX").unwrap();
        match stmt {
            Statement::Load { table, file, with_index } => {
                assert_eq!(table, "orders");
                assert_eq!(file, "orders.csv");
                assert!(with_index);
            }
            _ => panic!("expected a LOAD statement"),
        }
    }

    #[test]
    fn parses_select_with_conjunction() {
        let stmt = parse("SELECT * FROM orders WHERE key >= 10 AND value = 'shipped'").unwrap();
        match stmt {
            Statement::Select { table, projection, predicates } => {
                assert_eq!(table, "orders");
                assert_eq!(projection, Projection::Both);
                assert_eq!(predicates.len(), 2);
            }
            _ => panic!("expected a SELECT statement"),
        }
    }

    #[test]
    fn parses_count_star() {
        let stmt = parse("SELECT count(*) FROM orders").unwrap();
        match stmt {
            Statement::Select { projection, predicates, .. } => {
                assert_eq!(projection, Projection::Count);
                assert!(predicates.is_empty());
            }
            _ => panic!("expected a SELECT statement"),
        }
    }

    #[test]
    fn rejects_unknown_statement() {
        assert!(parse("DELETE FROM orders").is_err());
    }
}
