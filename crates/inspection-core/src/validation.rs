//! Required-field checks and the completed-section set

use crate::error::{InspectionError, Result};
use chrono::NaiveDate;
use inspection_types::{section, FormData, Snapshot, SECTIONS};

pub const VISIT_DATE_FIELD: &str = "date_visite";

/// Check one section and record the outcome in `completed_sections`.
///
/// Returns the required fields that are still missing; empty means complete.
pub fn validate_section(snapshot: &mut Snapshot, index: usize) -> Result<Vec<&'static str>> {
    let section = section(index).ok_or(InspectionError::InvalidSection(index))?;
    let missing = section.missing_fields(&snapshot.form_data);
    if missing.is_empty() {
        snapshot.completed_sections.insert(index);
    } else {
        snapshot.completed_sections.remove(&index);
    }
    tracing::debug!(section = section.id, missing = missing.len(), "Section validated");
    Ok(missing)
}

/// Recompute the completed set for every section; returns how many are complete
pub fn validate_all(snapshot: &mut Snapshot) -> usize {
    snapshot.completed_sections = SECTIONS
        .iter()
        .filter(|s| s.is_complete(&snapshot.form_data))
        .map(|s| s.index)
        .collect();
    snapshot.completed_sections.len()
}

/// Fill the visit date with `today` when it is empty. Returns whether it was set.
pub fn apply_default_visit_date(form: &mut FormData, today: NaiveDate) -> bool {
    if form.is_filled(VISIT_DATE_FIELD) {
        return false;
    }
    form.set(VISIT_DATE_FIELD, today.format("%Y-%m-%d").to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspection_types::SECTION_COUNT;

    fn fill_identification(snapshot: &mut Snapshot) {
        for name in ["adresse", "numero_appareil", "date_visite", "nom_technicien"] {
            snapshot.form_data.set(name, "x");
        }
    }

    #[test]
    fn test_validate_section_tracks_completion() {
        let mut snapshot = Snapshot::new();
        let missing = validate_section(&mut snapshot, 0).unwrap();
        assert!(missing.contains(&"adresse"));
        assert!(!snapshot.completed_sections.contains(&0));

        fill_identification(&mut snapshot);
        assert!(validate_section(&mut snapshot, 0).unwrap().is_empty());
        assert!(snapshot.completed_sections.contains(&0));

        snapshot.form_data.set("adresse", "   ");
        assert_eq!(validate_section(&mut snapshot, 0).unwrap(), vec!["adresse"]);
        assert!(!snapshot.completed_sections.contains(&0));
    }

    #[test]
    fn test_validate_section_rejects_out_of_range() {
        let mut snapshot = Snapshot::new();
        assert!(matches!(
            validate_section(&mut snapshot, SECTION_COUNT),
            Err(InspectionError::InvalidSection(11))
        ));
    }

    #[test]
    fn test_validate_all_recomputes() {
        let mut snapshot = Snapshot::new();
        snapshot.completed_sections.insert(4);
        fill_identification(&mut snapshot);
        // conclusions have no required fields and always count as complete
        assert_eq!(validate_all(&mut snapshot), 2);
        assert!(snapshot.completed_sections.contains(&0));
        assert!(snapshot.completed_sections.contains(&9));
        assert!(!snapshot.completed_sections.contains(&4));
    }

    #[test]
    fn test_default_visit_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut form = FormData::new();
        assert!(apply_default_visit_date(&mut form, today));
        assert_eq!(form.get(VISIT_DATE_FIELD).and_then(|v| v.as_text()), Some("2024-06-01"));

        form.set(VISIT_DATE_FIELD, "2023-01-01");
        assert!(!apply_default_visit_date(&mut form, today));
        assert_eq!(form.get(VISIT_DATE_FIELD).and_then(|v| v.as_text()), Some("2023-01-01"));
    }
}
