//! Composable stopping conditions for teams.

use std::time::Duration;

use crate::error::Abort;

/// The running state a terminator is evaluated against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerminationData {
    /// The latest message.
    pub message: Option<String>,
    /// The accumulated number of chat-completion turns.
    pub turns: usize,
    /// The number of agent activations.
    pub active_turns: usize,
    /// The time since the team started.
    pub elapsed: Duration,
}

/// How a group combines its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Every child must match.
    And,
    /// Any child may match.
    Or,
}

/// A stopping condition.
///
/// [`Terminator::is_match`] separates a graceful stop from a fatal one:
/// [`TextMention`](Terminator::TextMention) returns `Ok(true)` when it
/// fires, while the limit leaves return an [`Abort`] error.
///
/// # Examples
///
/// ```
/// use baton_core::{Terminator, TerminationData};
///
/// let mut terminator =
///     Terminator::text_mention("TERMINATE").or(Terminator::max_turns(10));
/// terminator.update(&TerminationData {
///     message: Some("All done. TERMINATE".to_owned()),
///     turns: 3,
///     ..Default::default()
/// });
/// assert_eq!(terminator.is_match(), Ok(true));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    /// Stops when the latest message contains `text`.
    TextMention {
        /// The text to look for.
        text: String,
        /// The latest data.
        data: TerminationData,
    },
    /// Aborts when the turn count reaches `limit`.
    MaxTurns {
        /// The limit.
        limit: usize,
        /// The latest data.
        data: TerminationData,
    },
    /// Aborts when the activation count reaches `limit`.
    MaxActive {
        /// The limit.
        limit: usize,
        /// The latest data.
        data: TerminationData,
    },
    /// Aborts when the elapsed time reaches `limit`.
    Timeout {
        /// The limit.
        limit: Duration,
        /// The latest data.
        data: TerminationData,
    },
    /// Combines several terminators.
    Group {
        /// The combined terminators.
        children: Vec<Terminator>,
        /// How the children are combined.
        op: Operator,
        /// The latest data.
        data: TerminationData,
    },
}

impl Terminator {
    /// Stops when the latest message contains `text`.
    #[inline]
    pub fn text_mention<S: Into<String>>(text: S) -> Self {
        Terminator::TextMention {
            text: text.into(),
            data: TerminationData::default(),
        }
    }

    /// Aborts when the turn count reaches `limit`.
    #[inline]
    pub fn max_turns(limit: usize) -> Self {
        Terminator::MaxTurns {
            limit,
            data: TerminationData::default(),
        }
    }

    /// Aborts when the activation count reaches `limit`.
    #[inline]
    pub fn max_active(limit: usize) -> Self {
        Terminator::MaxActive {
            limit,
            data: TerminationData::default(),
        }
    }

    /// Aborts when the elapsed time reaches `limit`.
    #[inline]
    pub fn timeout(limit: Duration) -> Self {
        Terminator::Timeout {
            limit,
            data: TerminationData::default(),
        }
    }

    /// Matches when every child matches.
    #[inline]
    pub fn all<I: IntoIterator<Item = Terminator>>(children: I) -> Self {
        Self::group(children.into_iter().collect(), Operator::And)
    }

    /// Matches when any child matches.
    #[inline]
    pub fn any<I: IntoIterator<Item = Terminator>>(children: I) -> Self {
        Self::group(children.into_iter().collect(), Operator::Or)
    }

    fn group(children: Vec<Terminator>, op: Operator) -> Self {
        Terminator::Group {
            children,
            op,
            data: TerminationData::default(),
        }
    }

    /// Combines with `other` so that both must match.
    #[inline]
    pub fn and(self, other: Terminator) -> Self {
        self.combine(other, Operator::And)
    }

    /// Combines with `other` so that either may match.
    #[inline]
    pub fn or(self, other: Terminator) -> Self {
        self.combine(other, Operator::Or)
    }

    fn combine(self, other: Terminator, op: Operator) -> Self {
        let mut children = self.into_operands(op);
        children.extend(other.into_operands(op));
        Self::group(children, op)
    }

    /// Splits a group using `op` into its children; anything else stays
    /// whole.
    fn into_operands(self, op: Operator) -> Vec<Terminator> {
        match self {
            Terminator::Group {
                children,
                op: group_op,
                ..
            } if group_op == op => children,
            other => vec![other],
        }
    }

    /// Returns the latest data.
    pub fn data(&self) -> &TerminationData {
        match self {
            Terminator::TextMention { data, .. }
            | Terminator::MaxTurns { data, .. }
            | Terminator::MaxActive { data, .. }
            | Terminator::Timeout { data, .. }
            | Terminator::Group { data, .. } => data,
        }
    }

    /// Replaces the data of this terminator and of every nested one.
    pub fn update(&mut self, new_data: &TerminationData) {
        match self {
            Terminator::TextMention { data, .. }
            | Terminator::MaxTurns { data, .. }
            | Terminator::MaxActive { data, .. }
            | Terminator::Timeout { data, .. } => {
                data.clone_from(new_data);
            }
            Terminator::Group { children, data, .. } => {
                data.clone_from(new_data);
                for child in children {
                    child.update(new_data);
                }
            }
        }
    }

    /// Evaluates the terminator against its latest data.
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`Abort`] when a turn, activation or time
    /// limit is reached.
    pub fn is_match(&self) -> Result<bool, Abort> {
        match self {
            Terminator::TextMention { text, data } => Ok(data
                .message
                .as_deref()
                .is_some_and(|message| message.contains(text.as_str()))),
            Terminator::MaxTurns { limit, data } => {
                if data.turns >= *limit {
                    return Err(Abort::MaxTurns(*limit));
                }
                Ok(false)
            }
            Terminator::MaxActive { limit, data } => {
                if data.active_turns >= *limit {
                    return Err(Abort::MaxActive(*limit));
                }
                Ok(false)
            }
            Terminator::Timeout { limit, data } => {
                if data.elapsed >= *limit {
                    return Err(Abort::Timeout(*limit));
                }
                Ok(false)
            }
            Terminator::Group { children, op, .. } => {
                for child in children {
                    let matched = child.is_match()?;
                    match op {
                        Operator::And if !matched => return Ok(false),
                        Operator::Or if matched => return Ok(true),
                        _ => {}
                    }
                }
                Ok(*op == Operator::And)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A leaf whose result is controlled by the message.
    fn flag(text: &str) -> Terminator {
        Terminator::text_mention(text)
    }

    fn data(message: &str) -> TerminationData {
        TerminationData {
            message: Some(message.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_truth_tables() {
        let cases =
            [(false, false), (false, true), (true, false), (true, true)];
        for (a, b) in cases {
            let message = format!(
                "{} {}",
                if a { "A" } else { "-" },
                if b { "B" } else { "-" }
            );

            let mut and = Terminator::all([flag("A"), flag("B")]);
            and.update(&data(&message));
            assert_eq!(and.is_match(), Ok(a && b), "{message}");

            let mut or = Terminator::any([flag("A"), flag("B")]);
            or.update(&data(&message));
            assert_eq!(or.is_match(), Ok(a || b), "{message}");
        }
    }

    #[test]
    fn test_max_turns_threshold() {
        let mut terminator = Terminator::max_turns(3);
        for turns in 0..3 {
            terminator.update(&TerminationData {
                turns,
                ..Default::default()
            });
            assert_eq!(terminator.is_match(), Ok(false));
        }
        terminator.update(&TerminationData {
            turns: 3,
            ..Default::default()
        });
        assert_eq!(terminator.is_match(), Err(Abort::MaxTurns(3)));
    }

    #[test]
    fn test_max_active_and_timeout() {
        let mut terminator = Terminator::max_active(2)
            .or(Terminator::timeout(Duration::from_secs(5)));
        terminator.update(&TerminationData {
            active_turns: 1,
            elapsed: Duration::from_secs(1),
            ..Default::default()
        });
        assert_eq!(terminator.is_match(), Ok(false));

        terminator.update(&TerminationData {
            active_turns: 1,
            elapsed: Duration::from_secs(5),
            ..Default::default()
        });
        assert_eq!(
            terminator.is_match(),
            Err(Abort::Timeout(Duration::from_secs(5)))
        );

        terminator.update(&TerminationData {
            active_turns: 2,
            ..Default::default()
        });
        assert_eq!(terminator.is_match(), Err(Abort::MaxActive(2)));
    }

    #[test]
    fn test_combinators_flatten() {
        let terminator = flag("A").or(flag("B")).or(flag("C"));
        let Terminator::Group { children, op, .. } = &terminator else {
            panic!("expected a group");
        };
        assert_eq!(*op, Operator::Or);
        assert_eq!(children.len(), 3);

        // Mixed operators keep their structure.
        let terminator = flag("A").or(flag("B")).and(flag("C"));
        let Terminator::Group { children, op, .. } = &terminator else {
            panic!("expected a group");
        };
        assert_eq!(*op, Operator::And);
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0], Terminator::Group { .. }));
    }

    #[test]
    fn test_update_reaches_nested_leaves() {
        let mut terminator = Terminator::all([
            Terminator::any([flag("done"), Terminator::max_turns(100)]),
            flag("ok"),
        ]);
        let new_data = data("ok, done");
        terminator.update(&new_data);
        let Terminator::Group { children, .. } = &terminator else {
            panic!("expected a group");
        };
        let Terminator::Group { children: nested, .. } = &children[0] else {
            panic!("expected a nested group");
        };
        assert_eq!(nested[1].data(), &new_data);
        assert_eq!(terminator.is_match(), Ok(true));
    }

    #[test]
    fn test_or_short_circuits_before_abort() {
        let mut terminator =
            Terminator::text_mention("STOP").or(Terminator::max_turns(1));
        terminator.update(&TerminationData {
            message: Some("STOP".to_owned()),
            turns: 5,
            ..Default::default()
        });
        assert_eq!(terminator.is_match(), Ok(true));
    }
}
