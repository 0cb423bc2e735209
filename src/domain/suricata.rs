// Copyright (c) 2025 - Cowboy AI, Inc.
//! Suricata rule string checks
//!
//! Stateful rule groups carry their rules as Suricata text, one rule per
//! line. Only the shape the provider needs is checked: a known action, a
//! protocol, a parenthesised option block and a numeric `sid`.

/// Actions accepted by a stateful rule group
pub const ACTIONS: [&str; 5] = ["pass", "drop", "reject", "alert", "rejectboth"];

/// A malformed rule line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rules string is empty")]
    Empty,

    #[error("line {line}: unknown action {action:?}")]
    UnknownAction { line: usize, action: String },

    #[error("line {line}: missing protocol")]
    MissingProtocol { line: usize },

    #[error("line {line}: missing option block")]
    MissingOptions { line: usize },

    #[error("line {line}: missing numeric sid")]
    MissingSid { line: usize },

    #[error("duplicate sid {sid}")]
    DuplicateSid { sid: u64 },
}

/// Check every line of a rules string, returning the sids in order
///
/// # Example
///
/// ```rust
/// use hub_spoke_infrastructure::domain::validate_rules;
///
/// let sids = validate_rules(
///     r#"pass tcp any any <> $EXTERNAL_NET 443 (msg:"443"; flow:not_established; sid:892123; rev:1;)"#,
/// ).unwrap();
/// assert_eq!(sids, vec![892123]);
/// ```
pub fn validate_rules(rules: &str) -> Result<Vec<u64>, RuleError> {
    let mut sids = Vec::new();

    for (i, text) in rules
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
    {
        let mut words = text.split_whitespace();
        let action = words.next().unwrap_or_default();
        if !ACTIONS.contains(&action) {
            return Err(RuleError::UnknownAction {
                line: i,
                action: action.to_string(),
            });
        }
        if words.next().map_or(true, |p| p.starts_with('(')) {
            return Err(RuleError::MissingProtocol { line: i });
        }

        let options = text
            .find('(')
            .zip(text.rfind(')'))
            .filter(|(open, close)| open < close)
            .map(|(open, close)| &text[open + 1..close])
            .ok_or(RuleError::MissingOptions { line: i })?;

        let sid = options
            .split(';')
            .filter_map(|opt| opt.trim().strip_prefix("sid:"))
            .find_map(|v| v.trim().parse::<u64>().ok())
            .ok_or(RuleError::MissingSid { line: i })?;

        if sids.contains(&sid) {
            return Err(RuleError::DuplicateSid { sid });
        }
        sids.push(sid);
    }

    if sids.is_empty() {
        return Err(RuleError::Empty);
    }
    Ok(sids)
}
