//! The rule-authoring mini-language: a sequence of period-terminated
//! commands, one or more per line, blank lines and `#`-comments ignored,
//! interpreted against a [`Rule`](crate::rule::Rule).

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;
use crate::rule::Rule;
use crate::value::{AttrBag, Value};

lazy_static! {
    static ref CLONE: Regex = Regex::new(r"^clone\s+(\S+)(?:\s+as\s+'([^']*)')?$").unwrap();
    static ref DELETE_NODE: Regex = Regex::new(r"^delete_node\s+(\S+)$").unwrap();
    static ref DELETE_EDGE: Regex = Regex::new(r"^delete_edge\s+(\S+)\s+(\S+)$").unwrap();
    static ref ADD_NODE: Regex = Regex::new(r"^add_node\s+(\S+)(?:\s+\{(.*)\})?$").unwrap();
    static ref ADD_EDGE: Regex = Regex::new(r"^add_edge\s+(\S+)\s+(\S+)(?:\s+\{(.*)\})?$").unwrap();
    static ref MERGE: Regex = Regex::new(r"^merge\s+\[(.*)\]$").unwrap();
}

/// Interpret `script` against `rule`, applying each command in order.
pub fn interpret(rule: &mut Rule, script: &str) -> Result<(), Error> {
    for command in split_commands(script) {
        apply(rule, &command)?;
    }
    Ok(())
}

fn split_commands(script: &str) -> Vec<String> {
    script
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
        .split('.')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply(rule: &mut Rule, command: &str) -> Result<(), Error> {
    if let Some(caps) = CLONE.captures(command) {
        let n = parse_value(&caps[1]);
        let new_name = caps.get(2).map(|m| parse_value(m.as_str()));
        rule.inject_clone_node(&n, new_name)?;
        return Ok(());
    }
    if let Some(caps) = DELETE_NODE.captures(command) {
        rule.inject_remove_node(&parse_value(&caps[1]));
        return Ok(());
    }
    if let Some(caps) = DELETE_EDGE.captures(command) {
        rule.inject_remove_edge(&parse_value(&caps[1]), &parse_value(&caps[2]));
        return Ok(());
    }
    if let Some(caps) = ADD_NODE.captures(command) {
        let n = parse_value(&caps[1]);
        let attrs = caps.get(2).map(|m| parse_attrs(m.as_str())).unwrap_or_default();
        rule.inject_add_node(n, attrs)?;
        return Ok(());
    }
    if let Some(caps) = ADD_EDGE.captures(command) {
        let u = parse_value(&caps[1]);
        let v = parse_value(&caps[2]);
        let attrs = caps.get(3).map(|m| parse_attrs(m.as_str())).unwrap_or_default();
        rule.inject_add_edge(u, v, attrs)?;
        return Ok(());
    }
    if let Some(caps) = MERGE.captures(command) {
        let nodes: Vec<Value> = caps[1]
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_value)
            .collect();
        rule.inject_merge_nodes(&nodes)?;
        return Ok(());
    }
    Err(Error::InvalidHomomorphism(format!(
        "unrecognized rule-authoring command: {command}"
    )))
}

fn parse_value(token: &str) -> Value {
    let token = token.trim();
    if let Ok(i) = token.parse::<i64>() {
        return Value::Int(i);
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            let unquoted = token.trim_matches('\'').trim_matches('"');
            Value::Str(unquoted.to_string())
        }
    }
}

/// Parse `k: v1, v2; k2: v3` into an [`AttrBag`].
fn parse_attrs(body: &str) -> AttrBag {
    let mut bag = AttrBag::new();
    for clause in body.split(';') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        if let Some((key, values)) = clause.split_once(':') {
            let set = values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(parse_value)
                .collect();
            bag.insert(key.trim().to_string(), set);
        }
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::value::Value;

    fn pattern_12() -> Graph {
        let mut g = Graph::new(true);
        g.add_node(Value::from(1i64), AttrBag::new());
        g.add_node(Value::from(2i64), AttrBag::new());
        g.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
        g
    }

    #[test]
    fn interprets_clone_and_add_edge() {
        let pattern = pattern_12();
        let mut rule = Rule::identity(&pattern);
        interpret(&mut rule, "clone 1 as 'x'.\nadd_edge x 2.\n").unwrap();
        assert!(rule.rhs.has_node(&Value::from("x")));
        assert!(rule.rhs.has_edge(&Value::from("x"), &Value::from(2i64)));
    }

    #[test]
    fn ignores_blank_lines_and_comments() {
        let pattern = pattern_12();
        let mut rule = Rule::identity(&pattern);
        interpret(&mut rule, "\n# a comment\ndelete_node 1.\n\n").unwrap();
        assert!(rule.removed_nodes().contains(&Value::from(1i64)));
    }

    #[test]
    fn rejects_unrecognized_command() {
        let pattern = pattern_12();
        let mut rule = Rule::identity(&pattern);
        assert!(interpret(&mut rule, "frobnicate 1.").is_err());
    }
}
