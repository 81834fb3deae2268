//! Read-only projection of the assignment table into public timeline entries.

use crate::{
    allocator::{Assignment, Claimant},
    digits::DigitSequence,
};
use serde::Serialize;
use std::collections::HashMap;

/// One position of the public timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub position: u64,
    pub digit_value: u8,
    /// Set only for the synthetic first entry standing for the leading digit.
    pub is_origin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimant: Option<Claimant>,
}

/// Builds the timeline from `assignments`, which must be ordered by position.
///
/// The result always starts with the origin entry at position 1, carrying
/// the first digit of `digits`. The participant holding position 1, if any,
/// is folded into that entry. Every later assignment contributes one entry
/// with its public claimant attributes; participant ids never leave this
/// function.
pub fn project(
    digits: &DigitSequence,
    assignments: &[Assignment],
    claimants: &HashMap<String, Claimant>,
) -> Vec<TimelineEntry> {
    let claimant_of = |a: &Assignment| claimants.get(&a.participant_id).cloned();

    let origin = TimelineEntry {
        position: 1,
        digit_value: digits.get(0),
        is_origin: true,
        claimant: assignments
            .iter()
            .find(|a| a.position == 1)
            .and_then(claimant_of),
    };

    std::iter::once(origin)
        .chain(
            assignments
                .iter()
                .filter(|a| a.position > 1)
                .map(|a| TimelineEntry {
                    position: a.position,
                    digit_value: a.digit_at_position,
                    is_origin: false,
                    claimant: claimant_of(a),
                }),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: &str, position: u64, digits: &DigitSequence) -> Assignment {
        Assignment {
            participant_id: id.to_owned(),
            position,
            digit_at_position: digits.digit_at_position(position),
            assigned_at: Utc::now(),
        }
    }

    fn named(name: &str) -> Claimant {
        Claimant {
            display_name: Some(name.to_owned()),
            handle: None,
        }
    }

    #[test]
    fn empty_table_projects_origin_only() {
        let digits = DigitSequence::from_text("3.14");
        let timeline = project(&digits, &[], &HashMap::new());
        assert_eq!(
            timeline,
            vec![TimelineEntry {
                position: 1,
                digit_value: 3,
                is_origin: true,
                claimant: None,
            }]
        );
    }

    #[test]
    fn entries_follow_assignments_in_order() {
        let digits = DigitSequence::from_text("3.14159");
        let rows: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, id)| row(id, i as u64 + 1, &digits))
            .collect();
        let claimants = HashMap::from([("a".to_owned(), named("Ada")), ("c".to_owned(), named("Cy"))]);

        let timeline = project(&digits, &rows, &claimants);

        assert_eq!(timeline.len(), rows.len());
        assert!(timeline.windows(2).all(|w| w[0].position < w[1].position));
        assert!(timeline[0].is_origin);
        assert_eq!(timeline[0].claimant, Some(named("Ada")));
        assert!(timeline[1..].iter().all(|e| !e.is_origin));
        assert_eq!(
            timeline.iter().map(|e| e.digit_value).collect::<Vec<_>>(),
            vec![3, 1, 4, 1]
        );
        assert_eq!(timeline[1].claimant, None);
        assert_eq!(timeline[2].claimant, Some(named("Cy")));
    }

    #[test]
    fn serialized_entries_hide_participant_ids() {
        let digits = DigitSequence::from_text("3.14");
        let rows = vec![row("secret-id", 1, &digits), row("other-id", 2, &digits)];
        let claimants = HashMap::from([("other-id".to_owned(), named("Otto"))]);

        let json = serde_json::to_string(&project(&digits, &rows, &claimants)).unwrap();

        assert!(!json.contains("secret-id"));
        assert!(!json.contains("other-id"));
        assert!(json.contains(r#""digitValue":1"#));
        assert!(json.contains(r#""isOrigin":true"#));
        assert!(json.contains(r#""displayName":"Otto""#));
    }
}
