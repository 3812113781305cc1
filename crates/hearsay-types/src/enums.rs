//! Enumeration types for the rumor and knowledge model.
//!
//! String forms are `snake_case` everywhere (serde, `Display`, `FromStr`)
//! so REST bodies, YAML config and snapshot files agree on spelling.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A string did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed (e.g. `"severity"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// RumorCategory
// ---------------------------------------------------------------------------

/// Thematic tag attached to a rumor. A rumor carries one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RumorCategory {
    /// Rulers, councils, succession.
    Political,
    /// Private lives of individuals.
    Personal,
    /// Community standing and relationships.
    Social,
    /// Armies, raids, fortifications.
    Military,
    /// Prices, trade routes, shortages.
    Economic,
    /// Temples, omens, heresy.
    Religious,
    /// Events long past.
    Historical,
    /// Idle talk with little consequence.
    Gossip,
    /// Anything not covered above.
    Other,
}

impl RumorCategory {
    /// Every category in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Political,
        Self::Personal,
        Self::Social,
        Self::Military,
        Self::Economic,
        Self::Religious,
        Self::Historical,
        Self::Gossip,
        Self::Other,
    ];

    /// The `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Political => "political",
            Self::Personal => "personal",
            Self::Social => "social",
            Self::Military => "military",
            Self::Economic => "economic",
            Self::Religious => "religious",
            Self::Historical => "historical",
            Self::Gossip => "gossip",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RumorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RumorCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How consequential a rumor is. Ordered: `Minor < Moderate < Major < Critical`.
///
/// Decay steps severity down one level at a time before it touches the
/// lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Interesting but inconsequential.
    Minor,
    /// Could affect a reputation.
    Moderate,
    /// Could affect relationships or alliances.
    Major,
    /// Could trigger major world events.
    Critical,
}

impl Severity {
    /// Every severity from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Minor, Self::Moderate, Self::Major, Self::Critical];

    /// The next lower severity, or `None` at [`Severity::Minor`].
    pub const fn step_down(self) -> Option<Self> {
        match self {
            Self::Minor => None,
            Self::Moderate => Some(Self::Minor),
            Self::Major => Some(Self::Moderate),
            Self::Critical => Some(Self::Major),
        }
    }

    /// Weight in `(0, 1]` used by the impact score.
    pub const fn weight(self) -> f64 {
        match self {
            Self::Minor => 0.25,
            Self::Moderate => 0.5,
            Self::Major => 0.75,
            Self::Critical => 1.0,
        }
    }

    /// The `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == needle)
            .ok_or_else(|| UnknownVariant {
                kind: "severity",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Lifecycle of a rumor. Transitions only move forward:
/// `Active -> Decayed -> Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LifecycleState {
    /// Freshly created or still circulating.
    Active,
    /// Fading; can still spread.
    Decayed,
    /// Retired. Readable but no longer spreadable.
    Archived,
}

impl LifecycleState {
    /// The state a decay sweep moves this one to, or `None` when terminal.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Active => Some(Self::Decayed),
            Self::Decayed => Some(Self::Archived),
            Self::Archived => None,
        }
    }

    /// Whether rumors in this state may still be passed on.
    pub const fn can_spread(self) -> bool {
        !matches!(self, Self::Archived)
    }

    /// The `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Decayed => "decayed",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "decayed" => Ok(Self::Decayed),
            "archived" => Ok(Self::Archived),
            _ => Err(UnknownVariant {
                kind: "lifecycle state",
                value: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge and propagation tags
// ---------------------------------------------------------------------------

/// How well an observer knows one detail of a world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DetailKnowledge {
    /// The observer knows the true value.
    Known,
    /// The observer believes something, but it is wrong.
    Distorted,
    /// The observer knows nothing about this detail.
    Unknown,
}

/// Where the content of a spread's variant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MutationSource {
    /// No mutation; the receiver inherited the sender's variant.
    None,
    /// The external content mutation service rewrote the content.
    Service,
    /// The service failed or timed out; the local garbling transform was used.
    Fallback,
}

/// Bucketed impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ImpactLevel {
    /// Score below 0.2.
    Minimal,
    /// Score in `[0.2, 0.4)`.
    Low,
    /// Score in `[0.4, 0.6)`.
    Moderate,
    /// Score in `[0.6, 0.8)`.
    High,
    /// Score of 0.8 or more.
    Critical,
}

impl ImpactLevel {
    /// Bucket an impact score in `[0, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}
