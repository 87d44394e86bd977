//! Template matching data types

use serde::Serialize;
use std::fmt;

/// Priority rank of a configured icon (0 = highest priority).
///
/// Equal to the icon's position in the configured icon list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IconId(pub usize);

impl IconId {
    pub fn rank(self) -> usize {
        self.0
    }
}

impl fmt::Display for IconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single accepted match of one icon
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    /// Icon that produced this match
    pub icon: IconId,
    /// Top-left corner in frame (screen) pixels
    pub x: u32,
    pub y: u32,
    /// Size of the scaled template that matched
    pub width: u32,
    pub height: u32,
    /// Correlation coefficient, always >= the threshold it was accepted with
    pub confidence: f32,
    /// Scale factor the template was resized by
    pub scale: f32,
}

impl MatchResult {
    /// Center of the matched bounding box
    pub fn click_point(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn describe(&self, name: &str) -> String {
        let confidence_pct = (self.confidence * 100.0) as u32;
        format!(
            "{} at ({},{}) {}x{} scale={:.1} - {}%",
            name, self.x, self.y, self.width, self.height, self.scale, confidence_pct
        )
    }
}

/// Outcome for one icon in one cycle, always tagged with its icon
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum MatchOutcome {
    Found(MatchResult),
    NoMatch { icon: IconId },
}

impl MatchOutcome {
    pub fn icon(&self) -> IconId {
        match self {
            MatchOutcome::Found(result) => result.icon,
            MatchOutcome::NoMatch { icon } => *icon,
        }
    }

    pub fn found(&self) -> Option<&MatchResult> {
        match self {
            MatchOutcome::Found(result) => Some(result),
            MatchOutcome::NoMatch { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, MatchOutcome::Found(_))
    }
}

/// One outcome per configured icon, in priority order
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchSet {
    outcomes: Vec<MatchOutcome>,
}

impl MatchSet {
    /// Build a set, checking that entry `i` belongs to icon `i`.
    ///
    /// Returns `None` when the tagging does not line up with the positions.
    pub fn from_ordered(outcomes: Vec<MatchOutcome>) -> Option<Self> {
        let aligned = outcomes
            .iter()
            .enumerate()
            .all(|(position, outcome)| outcome.icon() == IconId(position));
        aligned.then_some(Self { outcomes })
    }

    /// A set where every icon is a miss, used when a tick fails early.
    pub fn all_missed(icon_count: usize) -> Self {
        Self {
            outcomes: (0..icon_count)
                .map(|i| MatchOutcome::NoMatch { icon: IconId(i) })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchOutcome> {
        self.outcomes.iter()
    }

    pub fn get(&self, icon: IconId) -> Option<&MatchOutcome> {
        self.outcomes.get(icon.rank())
    }

    /// Highest-priority icon that matched this cycle
    pub fn first_found(&self) -> Option<&MatchResult> {
        self.outcomes.iter().find_map(MatchOutcome::found)
    }

    pub fn found_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_found()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(icon: usize, x: u32, y: u32) -> MatchOutcome {
        MatchOutcome::Found(MatchResult {
            icon: IconId(icon),
            x,
            y,
            width: 40,
            height: 20,
            confidence: 0.9,
            scale: 1.0,
        })
    }

    #[test]
    fn test_click_point_is_box_center() {
        let result = MatchResult {
            icon: IconId(0),
            x: 100,
            y: 200,
            width: 40,
            height: 20,
            confidence: 0.95,
            scale: 1.0,
        };
        assert_eq!(result.click_point(), (120, 210));
    }

    #[test]
    fn test_click_point_odd_size_rounds_down() {
        let result = MatchResult {
            icon: IconId(0),
            x: 10,
            y: 10,
            width: 5,
            height: 3,
            confidence: 0.95,
            scale: 1.0,
        };
        assert_eq!(result.click_point(), (12, 11));
    }

    #[test]
    fn test_match_set_rejects_misaligned_tags() {
        let swapped = vec![MatchOutcome::NoMatch { icon: IconId(1) }, found(0, 1, 1)];
        assert!(MatchSet::from_ordered(swapped).is_none());

        let aligned = vec![found(0, 1, 1), MatchOutcome::NoMatch { icon: IconId(1) }];
        let set = MatchSet::from_ordered(aligned).expect("aligned set");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_first_found_respects_priority() {
        let set = MatchSet::from_ordered(vec![
            MatchOutcome::NoMatch { icon: IconId(0) },
            found(1, 50, 60),
            found(2, 5, 6),
        ])
        .unwrap();

        let first = set.first_found().expect("icon #1 matched");
        assert_eq!(first.icon, IconId(1));
        assert_eq!(set.found_count(), 2);
    }

    #[test]
    fn test_all_missed() {
        let set = MatchSet::all_missed(4);
        assert_eq!(set.len(), 4);
        assert!(set.first_found().is_none());
        for (i, outcome) in set.iter().enumerate() {
            assert_eq!(outcome.icon(), IconId(i));
        }
    }
}
