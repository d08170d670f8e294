/*!
# Synthesis Trace Parser

Reads the solver's line-oriented output. Each informative line has the form

```text
producer,kind,payload
```

where the payload may itself contain commas. Two payload families carry
expression facts and one carries role-hole assignments:

```text
handleCode_AuxObserverActionEvent,ExprBinary,(rcv_AuxObserverActionEvent._date) == (evt._date)
handleCode_AuxObserverActionEvent,ExprBinary,idx - 1
glblInit_subject_AuxObserverActionEvent,StmtAssign,subject_AuxObserverActionEvent_s = 3
```

Everything else (timings, solver diagnostics) is skipped.
*/

use std::fmt;
use std::io::BufRead;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::BinOp;
use crate::config::DecodeConfig;
use crate::errors::{DecodeError, Result};
use crate::observer::Role;

/// One `producer,kind,payload` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLine<'a> {
    pub producer: &'a str,
    pub kind: &'a str,
    pub payload: &'a str,
}

impl<'a> TraceLine<'a> {
    /// Split on the first two commas; `None` for lines with fewer than three fields
    pub fn split(line: &'a str) -> Option<Self> {
        let mut parts = line.splitn(3, ',');
        let producer = parts.next()?;
        let kind = parts.next()?;
        let payload = parts.next()?;
        Some(Self {
            producer,
            kind,
            payload,
        })
    }
}

/// Iteration direction chosen for a collection walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// A normalized expression fact recorded for one producing method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact {
    Compare { lhs: String, op: BinOp, rhs: String },
    Direction(Direction),
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fact::Compare { lhs, op, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Fact::Direction(Direction::Forward) => f.write_str("idx + 1"),
            Fact::Direction(Direction::Reverse) => f.write_str("idx - 1"),
        }
    }
}

/// Comparable key of an operand path: last component, no call parens, no
/// getter prefix, no leading underscores, lower-cased.
///
/// `(this._date)`, `b._date` and `a.getDate()` all map to `date`.
pub fn operand_key(path: &str) -> String {
    let trimmed = path.trim().trim_matches(|c| c == '(' || c == ')');
    let last = trimmed.rsplit('.').next().unwrap_or(trimmed);
    let last = last.split('(').next().unwrap_or(last);
    let last = strip_getter(last);
    last.trim_start_matches('_').to_lowercase()
}

fn strip_getter(name: &str) -> &str {
    for prefix in ["get", "is"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return rest;
            }
        }
    }
    name
}

/// Expression facts keyed by producing method identity, in trace order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactTable {
    facts: IndexMap<String, Vec<Fact>>,
}

impl FactTable {
    pub fn push(&mut self, producer: &str, fact: Fact) {
        self.facts.entry(producer.to_string()).or_default().push(fact);
    }

    pub fn facts(&self, key: &str) -> &[Fact] {
        self.facts.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    /// Move the facts of `old` to `new`; returns false when `old` had none
    pub fn rekey(&mut self, old: &str, new: &str) -> bool {
        let Some(moved) = self.facts.get(old).cloned() else {
            return false;
        };
        self.facts.insert(new.to_string(), moved);
        self.facts.shift_remove(old);
        true
    }

    /// First iteration-direction fact recorded for `key`
    pub fn direction(&self, key: &str) -> Option<Direction> {
        self.facts(key).iter().find_map(|fact| match fact {
            Fact::Direction(dir) => Some(*dir),
            _ => None,
        })
    }

    /// First comparison fact whose operand keys match `left` and `right`
    pub fn find_comparison(&self, key: &str, left: &str, right: &str) -> Option<BinOp> {
        let mut matches = self.facts(key).iter().filter_map(|fact| match fact {
            Fact::Compare { lhs, op, rhs }
                if operand_key(lhs) == left && operand_key(rhs) == right =>
            {
                Some(*op)
            }
            _ => None,
        });
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!("{}: several comparison facts match {} / {}, using {}", key, left, right, first);
        }
        Some(first)
    }
}

/// Role-hole assignments chosen by the solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleBindings {
    holes: IndexMap<String, usize>,
}

impl RoleBindings {
    pub fn insert(&mut self, hole: impl Into<String>, index: usize) {
        self.holes.insert(hole.into(), index);
    }

    pub fn get(&self, hole: &str) -> Option<usize> {
        self.holes.get(hole).copied()
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }
}

/// Everything the decoder learns from one trace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceFacts {
    pub exprs: FactTable,
    pub roles: RoleBindings,
}

/// Compiled pattern table for classifying trace payloads
pub struct TraceParser {
    cmp: Regex,
    idx: Regex,
    rcv: Regex,
    role: Regex,
    roles_of_interest: Vec<String>,
}

impl TraceParser {
    pub fn new(config: &DecodeConfig) -> Result<Self> {
        let marker = regex::escape(&config.aux_marker);
        let role_names = Role::ALL
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            cmp: Regex::new(r"^(.+\..+) (<|<=|==|!=|>=|>) (.+\..+)$")?,
            idx: Regex::new(r"^idx (\+|-) 1$")?,
            rcv: Regex::new(&format!(r"rcv_{marker}\w*"))?,
            role: Regex::new(&format!(r"^(({role_names})_{marker}[^_]+)_.* = (\d+)$"))?,
            roles_of_interest: config.roles_of_interest.clone(),
        })
    }

    pub fn parse_str(&self, trace: &str) -> Result<TraceFacts> {
        let mut out = TraceFacts::default();
        for line in trace.lines() {
            self.parse_line(line, &mut out)?;
        }
        Ok(out)
    }

    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<TraceFacts> {
        let mut out = TraceFacts::default();
        for line in reader.lines() {
            self.parse_line(&line?, &mut out)?;
        }
        Ok(out)
    }

    pub fn parse_line(&self, line: &str, out: &mut TraceFacts) -> Result<()> {
        let Some(line) = TraceLine::split(line.trim()) else {
            return Ok(());
        };

        if let Some(fact) = self.expression_fact(line.payload)? {
            if self.is_role_of_interest(line.producer) {
                out.exprs.push(line.producer, fact);
            }
        }

        if let Some((hole, index)) = self.role_assignment(line.payload)? {
            out.roles.insert(hole, index);
        }

        Ok(())
    }

    fn is_role_of_interest(&self, producer: &str) -> bool {
        self.roles_of_interest
            .iter()
            .any(|role| producer.starts_with(role.as_str()))
    }

    fn expression_fact(&self, payload: &str) -> Result<Option<Fact>> {
        if let Some(caps) = self.idx.captures(payload) {
            let dir = match &caps[1] {
                "-" => Direction::Reverse,
                _ => Direction::Forward,
            };
            return Ok(Some(Fact::Direction(dir)));
        }

        // receiver tokens are replaced before the operands are extracted
        let normalized = self.rcv.replace_all(payload, "this");
        let Some(caps) = self.cmp.captures(&normalized) else {
            if self.cmp.is_match(payload) {
                return Err(malformed(
                    payload,
                    "comparison no longer matches after receiver replacement",
                ));
            }
            return Ok(None);
        };
        let op = caps[2]
            .parse::<BinOp>()
            .map_err(|reason| malformed(payload, &reason))?;
        Ok(Some(Fact::Compare {
            lhs: caps[1].to_string(),
            op,
            rhs: caps[3].to_string(),
        }))
    }

    fn role_assignment(&self, payload: &str) -> Result<Option<(String, usize)>> {
        let Some(caps) = self.role.captures(payload) else {
            return Ok(None);
        };
        let index = caps[3]
            .parse::<usize>()
            .map_err(|e| malformed(payload, &e.to_string()))?;
        Ok(Some((caps[1].to_string(), index)))
    }
}

fn malformed(line: &str, reason: &str) -> DecodeError {
    DecodeError::MalformedFact {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}
