//! Composable predicates.

use std::ops::{BitAnd, BitOr, BitXor, Not};

use serde::{Deserialize, Serialize};

use super::lookup::{Condition, Lookup, PostField, Value};
use crate::error::RepoError;

/// A predicate over posts.
///
/// Combine with `&` (and), `|` (or), `^` (xor: an odd number of operands
/// hold) and `!` (not).
///
/// ```
/// use blog_core::query::{Lookup, PostField, Q};
///
/// let who = Q::new(PostField::Title, Lookup::IStartsWith, "who");
/// let why = Q::new(PostField::Title, Lookup::IStartsWith, "why");
/// let either = who | why;
/// assert!(matches!(either, Q::Or(ref parts) if parts.len() == 2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Q {
    /// Matches every post.
    #[default]
    All,
    Condition(Condition),
    And(Vec<Q>),
    Or(Vec<Q>),
    Xor(Vec<Q>),
    Not(Box<Q>),
}

impl Q {
    pub fn new(field: PostField, lookup: Lookup, value: impl Into<Value>) -> Self {
        Q::Condition(Condition::new(field, lookup, value))
    }

    /// Shorthand for an `exact` lookup.
    pub fn exact(field: PostField, value: impl Into<Value>) -> Self {
        Q::new(field, Lookup::Exact, value)
    }

    /// Type-check every condition in the tree.
    pub fn validate(&self) -> Result<(), RepoError> {
        match self {
            Q::All => Ok(()),
            Q::Condition(cond) => cond.validate(),
            Q::And(parts) | Q::Or(parts) | Q::Xor(parts) => {
                parts.iter().try_for_each(Q::validate)
            }
            Q::Not(inner) => inner.validate(),
        }
    }

    /// Whether any condition traverses the author relationship.
    pub fn uses_related(&self) -> bool {
        match self {
            Q::All => false,
            Q::Condition(cond) => cond.field.is_related(),
            Q::And(parts) | Q::Or(parts) | Q::Xor(parts) => parts.iter().any(Q::uses_related),
            Q::Not(inner) => inner.uses_related(),
        }
    }

    /// Evaluate the tree with `test` deciding each condition.
    pub fn eval<F>(&self, test: &mut F) -> bool
    where
        F: FnMut(&Condition) -> bool,
    {
        match self {
            Q::All => true,
            Q::Condition(cond) => test(cond),
            Q::And(parts) => parts.iter().all(|q| q.eval(test)),
            Q::Or(parts) => parts.iter().any(|q| q.eval(test)),
            Q::Xor(parts) => parts.iter().filter(|q| q.eval(test)).count() % 2 == 1,
            Q::Not(inner) => !inner.eval(test),
        }
    }
}

impl BitAnd for Q {
    type Output = Q;

    fn bitand(self, rhs: Q) -> Q {
        match (self, rhs) {
            (Q::All, q) | (q, Q::All) => q,
            (Q::And(mut left), Q::And(right)) => {
                left.extend(right);
                Q::And(left)
            }
            (Q::And(mut left), q) => {
                left.push(q);
                Q::And(left)
            }
            (q, Q::And(mut right)) => {
                right.insert(0, q);
                Q::And(right)
            }
            (left, right) => Q::And(vec![left, right]),
        }
    }
}

impl BitOr for Q {
    type Output = Q;

    fn bitor(self, rhs: Q) -> Q {
        match (self, rhs) {
            (Q::All, _) | (_, Q::All) => Q::All,
            (Q::Or(mut left), Q::Or(right)) => {
                left.extend(right);
                Q::Or(left)
            }
            (Q::Or(mut left), q) => {
                left.push(q);
                Q::Or(left)
            }
            (left, right) => Q::Or(vec![left, right]),
        }
    }
}

impl BitXor for Q {
    type Output = Q;

    fn bitxor(self, rhs: Q) -> Q {
        match (self, rhs) {
            (Q::Xor(mut left), q) => {
                left.push(q);
                Q::Xor(left)
            }
            (left, right) => Q::Xor(vec![left, right]),
        }
    }
}

impl Not for Q {
    type Output = Q;

    fn not(self) -> Q {
        match self {
            Q::Not(inner) => *inner,
            q => Q::Not(Box::new(q)),
        }
    }
}
