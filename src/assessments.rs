use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::info;

use crate::contributions::ContributionRepository;
use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::hoas::HoaRepository;
use crate::models::{ContributionType, Month, NewContribution};

/// A one-off charge levied on a set of units for a named purpose.
#[derive(Debug, Clone)]
pub struct SpecialAssessment {
    pub hoa_id: i64,
    pub unit_numbers: Vec<u32>,
    pub purpose: String,
    pub amount_per_unit: f64,
    pub due_date: Month,
    pub notes: Option<String>,
}

/// Create one pending special contribution per unit, all in one transaction.
/// Returns the new contribution ids in unit order.
pub fn add_bulk_special_assessment(store: &Store, assessment: SpecialAssessment) -> Result<Vec<i64>> {
    let ids = store.atomic(|conn| insert_assessment(conn, &assessment))?;
    info!(
        hoa_id = assessment.hoa_id,
        purpose = %assessment.purpose,
        units = ids.len(),
        "added special assessment"
    );
    Ok(ids)
}

/// Insert an assessment on an open transaction. Duplicate unit numbers
/// collapse to one charge.
pub(crate) fn insert_assessment(conn: &Connection, assessment: &SpecialAssessment) -> Result<Vec<i64>> {
    let hoa = HoaRepository::new(conn).require(assessment.hoa_id)?;
    let units: BTreeSet<u32> = assessment.unit_numbers.iter().copied().collect();
    if let Some(bad) = units.iter().find(|&&u| u == 0 || u > hoa.number_of_units) {
        return Err(HoaError::Validation(format!(
            "unit {bad} is outside 1..={} for {}",
            hoa.number_of_units, hoa.name
        )));
    }
    let repo = ContributionRepository::new(conn);
    units
        .iter()
        .map(|&unit| {
            repo.add(NewContribution {
                contribution_type: ContributionType::Special,
                purpose: Some(assessment.purpose.clone()),
                notes: assessment.notes.clone(),
                ..NewContribution::new(hoa.id, unit, assessment.due_date, assessment.amount_per_unit)
            })
        })
        .collect()
}
