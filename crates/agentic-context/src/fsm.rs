//! Explicit transition tables for entity status fields.

use crate::types::{ContextError, ContextResult, Record};

/// One row of a transition table: `from` --`event`--> `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: &'static str,
    pub event: &'static str,
    pub to: &'static str,
}

/// Finite state machine for one entity kind.
///
/// Any (state, event) pair not in the table is rejected with
/// `ContextError::InvalidTransition`.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    kind: &'static str,
    initial: &'static str,
    transitions: Vec<Transition>,
}

impl TransitionTable {
    pub fn new(kind: &'static str, initial: &'static str) -> Self {
        Self {
            kind,
            initial,
            transitions: Vec::new(),
        }
    }

    /// Add a row to the table.
    pub fn with(mut self, from: &'static str, event: &'static str, to: &'static str) -> Self {
        self.transitions.push(Transition { from, event, to });
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn initial(&self) -> &'static str {
        self.initial
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Next state for `event` applied in `from`.
    pub fn next(&self, from: &str, event: &str) -> ContextResult<&'static str> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.event == event)
            .map(|t| t.to)
            .ok_or_else(|| ContextError::InvalidTransition {
                kind: self.kind.to_string(),
                from: from.to_string(),
                event: event.to_string(),
            })
    }

    /// Events accepted in `state`, in table order.
    pub fn events_from(&self, state: &str) -> Vec<&'static str> {
        self.transitions
            .iter()
            .filter(|t| t.from == state)
            .map(|t| t.event)
            .collect()
    }

    /// All states mentioned by the table, initial state first.
    pub fn states(&self) -> Vec<&'static str> {
        let mut states = vec![self.initial];
        for t in &self.transitions {
            for s in [t.from, t.to] {
                if !states.contains(&s) {
                    states.push(s);
                }
            }
        }
        states
    }

    pub fn is_state(&self, state: &str) -> bool {
        self.states().contains(&state)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.events_from(state).is_empty()
    }

    /// A fresh record of this kind in the initial state.
    pub fn new_record(&self, id: &str) -> Record {
        let mut record = Record::new(self.kind, id, self.initial);
        record.log(format!("created in {}", self.initial));
        record
    }

    /// Move `record` along `event`, appending the step to its history.
    pub fn advance(&self, record: &mut Record, event: &str) -> ContextResult<&'static str> {
        if record.kind != self.kind {
            return Err(ContextError::InvalidInput(format!(
                "Record {} is a {}, not a {}",
                record.id, record.kind, self.kind
            )));
        }
        let next = self.next(&record.status, event)?;
        let from = std::mem::replace(&mut record.status, next.to_string());
        record.log(format!("{from} -> {next} ({event})"));
        Ok(next)
    }
}
