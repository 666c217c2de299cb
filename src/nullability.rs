//! Scored resolution of nullability markers.
//!
//! Each type occurrence (field type, parameter type, return type) is resolved
//! independently: all markers visible at the occurrence are matched against
//! the configured matcher list, the highest score wins, ties fall to the
//! nearest enclosing scope and then to matcher registration order. With no
//! applicable marker at all the occurrence defaults to nullable.

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Marker, MarkerScope, Polarity};

/// A configured marker matcher.
///
/// `pattern` is either an exact marker name or a prefix ending in `*`.
/// `scope`, when set, restricts the matcher to markers found at that scope.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerMatcher {
    pub pattern: String,
    pub score: i32,
    #[serde(deserialize_with = "deserialize_polarity")]
    pub polarity: Polarity,
    #[serde(default, deserialize_with = "deserialize_scope")]
    pub scope: Option<MarkerScope>,
}

impl MarkerMatcher {
    pub fn new(pattern: impl Into<String>, score: i32, polarity: Polarity) -> Self {
        Self { pattern: pattern.into(), score, polarity, scope: None }
    }

    pub fn scoped(mut self, scope: MarkerScope) -> Self {
        self.scope = Some(scope);
        self
    }

    fn matches(&self, marker: &Marker) -> bool {
        if let Some(scope) = self.scope {
            if scope != marker.scope {
                return false;
            }
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => marker.name.starts_with(prefix),
            None => marker.name == self.pattern,
        }
    }
}

/// Resolves type occurrences to a nullable / non-null verdict.
pub struct NullabilityResolver {
    matchers: Vec<MarkerMatcher>,
}

impl NullabilityResolver {
    /// Builds a resolver from matchers in registration order.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidMatcher` on an empty pattern, which could never
    /// match a marker name.
    pub fn new(matchers: Vec<MarkerMatcher>) -> Result<Self> {
        for matcher in &matchers {
            if matcher.pattern.is_empty() {
                return Err(Error::InvalidMatcher("empty pattern".to_string()));
            }
        }
        Ok(Self { matchers })
    }

    /// Resolves one occurrence from the markers visible at it.
    ///
    /// Tie-break order: score, then nearest scope, then earliest-registered
    /// matcher. The last step makes equal-score equal-scope conflicts
    /// deterministic and user-controllable through matcher order.
    pub fn resolve(&self, visible: &[Marker]) -> Polarity {
        let mut best: Option<(i32, MarkerScope, usize, Polarity)> = None;

        for marker in visible {
            for (idx, matcher) in self.matchers.iter().enumerate() {
                if !matcher.matches(marker) {
                    continue;
                }
                let candidate = (matcher.score, marker.scope, idx, matcher.polarity);
                best = Some(match best {
                    None => candidate,
                    Some(current) => {
                        if candidate.0 > current.0
                            || (candidate.0 == current.0 && candidate.1 < current.1)
                            || (candidate.0 == current.0
                                && candidate.1 == current.1
                                && candidate.2 < current.2)
                        {
                            candidate
                        } else {
                            current
                        }
                    }
                });
            }
        }

        match best {
            Some((score, scope, _, polarity)) => {
                debug!(
                    "Nullability resolved to {:?} (score {}, scope {:?})",
                    polarity, score, scope
                );
                polarity
            }
            None => Polarity::Nullable,
        }
    }

    /// True when the visible markers produce both polarities at the same top
    /// score and the same nearest scope, i.e. a combination no tie-break
    /// should be papering over. Validation plugins reject such nodes.
    pub fn conflicting(&self, visible: &[Marker]) -> bool {
        let mut top: Option<(i32, MarkerScope)> = None;
        let mut polarities: Vec<Polarity> = Vec::new();

        for marker in visible {
            for matcher in &self.matchers {
                if !matcher.matches(marker) {
                    continue;
                }
                let rank = (matcher.score, marker.scope);
                match top {
                    None => {
                        top = Some(rank);
                        polarities = vec![matcher.polarity];
                    }
                    Some(current) => {
                        if rank.0 > current.0 || (rank.0 == current.0 && rank.1 < current.1) {
                            top = Some(rank);
                            polarities = vec![matcher.polarity];
                        } else if rank == current {
                            polarities.push(matcher.polarity);
                        }
                    }
                }
            }
        }

        polarities.contains(&Polarity::Nullable) && polarities.contains(&Polarity::NonNull)
    }
}

fn deserialize_polarity<'de, D>(deserializer: D) -> std::result::Result<Polarity, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    match text.as_str() {
        "nullable" => Ok(Polarity::Nullable),
        "nonnull" | "non-null" => Ok(Polarity::NonNull),
        other => Err(serde::de::Error::custom(format!(
            "unknown polarity `{}`, expected `nullable` or `nonnull`",
            other
        ))),
    }
}

fn deserialize_scope<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<MarkerScope>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    match text.as_deref() {
        None => Ok(None),
        Some("occurrence") => Ok(Some(MarkerScope::Occurrence)),
        Some("member") => Ok(Some(MarkerScope::Member)),
        Some("class") | Some("type") => Ok(Some(MarkerScope::Class)),
        Some("package") => Ok(Some(MarkerScope::Package)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unknown marker scope `{}`",
            other
        ))),
    }
}
