//! Typed search filters.
//!
//! Filters are built as a tree and only rendered to RFC 4515 text when they reach the wire, so
//! values are always escaped and tests can evaluate them against in-memory entries.

use std::fmt;

use crate::entity::AttributeMap;

/// Matching rule for extensible-match terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchCase {
    /// `caseExactMatch`
    Exact,
    /// `caseIgnoreMatch`
    #[default]
    Insensitive,
}

impl MatchCase {
    /// LDAP matching rule name.
    #[must_use]
    pub const fn rule(self) -> &'static str {
        match self {
            Self::Exact => "caseExactMatch",
            Self::Insensitive => "caseIgnoreMatch",
        }
    }

    /// Compares two values under this rule.
    #[must_use]
    pub fn compare(self, left: &str, right: &str) -> bool {
        match self {
            Self::Exact => left == right,
            Self::Insensitive => left.to_lowercase() == right.to_lowercase(),
        }
    }
}

/// LDAP search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every sub-filter must match.
    And(Vec<Filter>),
    /// At least one sub-filter must match.
    Or(Vec<Filter>),
    /// `(attribute=value)`
    Equals {
        /// Attribute name.
        attribute: String,
        /// Assertion value (unescaped).
        value: String,
    },
    /// `(attribute:rule:=value)`
    Matches {
        /// Attribute name.
        attribute: String,
        /// Matching rule.
        case: MatchCase,
        /// Assertion value (unescaped).
        value: String,
    },
}

impl Filter {
    /// Equality term.
    #[must_use]
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Extensible-match term with an explicit matching rule.
    #[must_use]
    pub fn matches(attribute: impl Into<String>, case: MatchCase, value: impl Into<String>) -> Self {
        Self::Matches {
            attribute: attribute.into(),
            case,
            value: value.into(),
        }
    }

    /// `(objectClass=<class>)`
    #[must_use]
    pub fn object_class(class: &str) -> Self {
        Self::equals("objectClass", class)
    }

    /// Conjunction of the given filters.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction of the given filters.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Evaluates the filter against an attribute map.
    ///
    /// Plain equality uses case-insensitive comparison, which is what the directory schema
    /// applies to every attribute this crate searches on.
    #[must_use]
    pub fn evaluate(&self, attributes: &AttributeMap) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|filter| filter.evaluate(attributes)),
            Self::Or(filters) => filters.iter().any(|filter| filter.evaluate(attributes)),
            Self::Equals { attribute, value } => {
                any_value(attributes, attribute, |candidate| {
                    MatchCase::Insensitive.compare(candidate, value)
                })
            }
            Self::Matches {
                attribute,
                case,
                value,
            } => any_value(attributes, attribute, |candidate| case.compare(candidate, value)),
        }
    }
}

fn any_value(attributes: &AttributeMap, attribute: &str, test: impl Fn(&str) -> bool) -> bool {
    attributes
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .flat_map(|(_, values)| values.iter())
        .any(|value| test(value))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(filters) => {
                f.write_str("(&")?;
                for filter in filters {
                    write!(f, "{filter}")?;
                }
                f.write_str(")")
            }
            Self::Or(filters) => {
                f.write_str("(|")?;
                for filter in filters {
                    write!(f, "{filter}")?;
                }
                f.write_str(")")
            }
            Self::Equals { attribute, value } => {
                write!(f, "({attribute}={})", escape_value(value))
            }
            Self::Matches {
                attribute,
                case,
                value,
            } => write!(f, "({attribute}:{}:={})", case.rule(), escape_value(value)),
        }
    }
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
