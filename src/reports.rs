use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::models::{Contribution, Expense, Hoa, Month, Transaction};
use crate::transactions::get_all_transactions;

// ---------------------------------------------------------------------------
// Financial summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub regular_total: f64,
    pub special_total: f64,
    pub opening_balance: f64,
    pub total_contributions: f64,
    pub total_expenses: f64,
    pub paid_contributions: f64,
    pub pending_contributions: f64,
    pub paid_expenses: f64,
    pub pending_expenses: f64,
    /// Cash on hand: paid contributions plus the opening balance, less paid expenses.
    pub net_balance: f64,
    /// Balance once every pending transaction settles.
    pub projected_balance: f64,
    pub paid_contribution_count: usize,
    pub pending_contribution_count: usize,
    pub paid_expense_count: usize,
    pub pending_expense_count: usize,
    pub contributions: Vec<Contribution>,
    pub expenses: Vec<Expense>,
}

impl FinancialSummary {
    pub fn from_parts(hoa: &Hoa, contributions: Vec<Contribution>, expenses: Vec<Expense>) -> Self {
        let (special, regular): (Vec<&Contribution>, Vec<&Contribution>) =
            contributions.iter().partition(|c| c.is_special());
        let regular_total: f64 = regular.iter().map(|c| c.amount).sum();
        let special_total: f64 = special.iter().map(|c| c.amount).sum();

        let (paid_c, pending_c): (Vec<&Contribution>, Vec<&Contribution>) =
            contributions.iter().partition(|c| c.is_paid());
        let (paid_e, pending_e): (Vec<&Expense>, Vec<&Expense>) =
            expenses.iter().partition(|e| e.is_paid());

        let paid_contributions: f64 = paid_c.iter().map(|c| c.amount).sum();
        let pending_contributions: f64 = pending_c.iter().map(|c| c.amount).sum();
        let paid_expenses: f64 = paid_e.iter().map(|e| e.amount).sum();
        let pending_expenses: f64 = pending_e.iter().map(|e| e.amount).sum();

        let counts = (paid_c.len(), pending_c.len(), paid_e.len(), pending_e.len());
        let total_contributions = regular_total + special_total + hoa.opening_balance;
        let total_expenses = paid_expenses + pending_expenses;

        Self {
            regular_total,
            special_total,
            opening_balance: hoa.opening_balance,
            total_contributions,
            total_expenses,
            paid_contributions,
            pending_contributions,
            paid_expenses,
            pending_expenses,
            net_balance: paid_contributions + hoa.opening_balance - paid_expenses,
            projected_balance: total_contributions - total_expenses,
            paid_contribution_count: counts.0,
            pending_contribution_count: counts.1,
            paid_expense_count: counts.2,
            pending_expense_count: counts.3,
            contributions,
            expenses,
        }
    }
}

pub fn get_financial_summary(store: &Store, hoa_id: i64) -> Result<FinancialSummary> {
    let hoa = store.hoas().require(hoa_id)?;
    let mut contributions = Vec::new();
    let mut expenses = Vec::new();
    for t in get_all_transactions(store, hoa_id)? {
        match t {
            Transaction::Contribution(c) => contributions.push(c),
            Transaction::Expense(e) => expenses.push(e),
        }
    }
    Ok(FinancialSummary::from_parts(&hoa, contributions, expenses))
}

// ---------------------------------------------------------------------------
// Monthly breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBreakdown {
    pub month: Month,
    pub contributions_total: f64,
    pub contribution_count: usize,
    pub expenses_total: f64,
    pub expense_count: usize,
}

impl MonthlyBreakdown {
    pub fn net(&self) -> f64 {
        self.contributions_total - self.expenses_total
    }
}

/// Totals per calendar month of recording (not of the dues period), newest
/// month first.
pub fn monthly_breakdown(transactions: &[Transaction]) -> Vec<MonthlyBreakdown> {
    let mut by_month: BTreeMap<Month, MonthlyBreakdown> = BTreeMap::new();
    for t in transactions {
        let month = Month::from_date(&t.created_at());
        let entry = by_month.entry(month).or_insert_with(|| MonthlyBreakdown {
            month,
            contributions_total: 0.0,
            contribution_count: 0,
            expenses_total: 0.0,
            expense_count: 0,
        });
        match t {
            Transaction::Contribution(c) => {
                entry.contributions_total += c.amount;
                entry.contribution_count += 1;
            }
            Transaction::Expense(e) => {
                entry.expenses_total += e.amount;
                entry.expense_count += 1;
            }
        }
    }
    by_month.into_values().rev().collect()
}

// ---------------------------------------------------------------------------
// Special assessments
// ---------------------------------------------------------------------------

pub const UNSPECIFIED_PURPOSE: &str = "Unspecified";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialAssessmentGroup {
    pub purpose: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub pending_amount: f64,
    pub paid_count: usize,
    pub total_count: usize,
}

pub fn group_special_assessments(contributions: &[Contribution]) -> Vec<SpecialAssessmentGroup> {
    let mut groups: BTreeMap<&str, SpecialAssessmentGroup> = BTreeMap::new();
    for c in contributions.iter().filter(|c| c.is_special()) {
        let purpose = c.purpose.as_deref().unwrap_or(UNSPECIFIED_PURPOSE);
        let g = groups.entry(purpose).or_insert_with(|| SpecialAssessmentGroup {
            purpose: purpose.to_string(),
            total_amount: 0.0,
            paid_amount: 0.0,
            pending_amount: 0.0,
            paid_count: 0,
            total_count: 0,
        });
        g.total_amount += c.amount;
        g.total_count += 1;
        if c.is_paid() {
            g.paid_amount += c.amount;
            g.paid_count += 1;
        } else {
            g.pending_amount += c.amount;
        }
    }
    groups.into_values().collect()
}

pub fn special_assessments_by_purpose(store: &Store, hoa_id: i64) -> Result<Vec<SpecialAssessmentGroup>> {
    let summary = get_financial_summary(store, hoa_id)?;
    Ok(group_special_assessments(&summary.contributions))
}

// ---------------------------------------------------------------------------
// Collection rate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    Monthly,
    Yearly,
    Overall,
}

impl CollectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMode::Monthly => "monthly",
            CollectionMode::Yearly => "yearly",
            CollectionMode::Overall => "overall",
        }
    }
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionMode {
    type Err = HoaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "monthly" => Ok(CollectionMode::Monthly),
            "yearly" => Ok(CollectionMode::Yearly),
            "overall" => Ok(CollectionMode::Overall),
            other => Err(HoaError::Validation(format!(
                "unknown collection mode '{other}' (expected monthly, yearly or overall)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionRate {
    pub mode: CollectionMode,
    pub expected: f64,
    pub actual: f64,
    /// Percentage, capped at 100.
    pub rate: f64,
}

/// Collection rate as of `today`.
///
/// The yearly window counts the months of this year through `today`
/// inclusively, so March is three months. The overall window counts whole
/// months elapsed since the HOA's creation month, with a floor of one, so an
/// HOA created in January has two months behind it in March.
pub fn collection_rate_at(
    hoa: &Hoa,
    summary: &FinancialSummary,
    mode: CollectionMode,
    today: Month,
) -> CollectionRate {
    let per_month = f64::from(hoa.number_of_units) * hoa.monthly_contribution;
    let (expected, actual) = match mode {
        CollectionMode::Monthly => (
            per_month,
            summary
                .contributions
                .iter()
                .filter(|c| c.covers(today))
                .map(|c| c.amount)
                .sum(),
        ),
        CollectionMode::Yearly => (
            per_month * f64::from(today.month()),
            summary
                .contributions
                .iter()
                .filter(|c| c.start_month.year() == today.year())
                .map(|c| c.amount)
                .sum(),
        ),
        CollectionMode::Overall => {
            let months = hoa.created_month().months_until(today).max(1);
            (per_month * f64::from(months), summary.total_contributions)
        }
    };
    let rate = if expected > 0.0 {
        (actual / expected * 100.0).min(100.0)
    } else {
        0.0
    };
    CollectionRate { mode, expected, actual, rate }
}

pub fn collection_rate(hoa: &Hoa, summary: &FinancialSummary, mode: CollectionMode) -> CollectionRate {
    collection_rate_at(hoa, summary, mode, Month::current())
}

// ---------------------------------------------------------------------------
// Unit statement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatement {
    pub unit_number: u32,
    pub contributions: Vec<Contribution>,
    pub paid_total: f64,
    pub pending_total: f64,
    /// Months of regular dues the unit has paid for.
    pub paid_months: u32,
}

pub fn unit_statement(store: &Store, hoa_id: i64, unit_number: u32) -> Result<UnitStatement> {
    let hoa = store.hoas().require(hoa_id)?;
    if unit_number == 0 || unit_number > hoa.number_of_units {
        return Err(HoaError::Validation(format!(
            "unit {unit_number} is outside 1..={} for {}",
            hoa.number_of_units, hoa.name
        )));
    }
    let mut contributions: Vec<Contribution> = get_financial_summary(store, hoa_id)?
        .contributions
        .into_iter()
        .filter(|c| c.unit_number == unit_number)
        .collect();
    contributions.sort_by_key(|c| (c.start_month, c.id));

    let paid_total = contributions.iter().filter(|c| c.is_paid()).map(|c| c.amount).sum();
    let pending_total = contributions.iter().filter(|c| !c.is_paid()).map(|c| c.amount).sum();
    let paid_months = contributions
        .iter()
        .filter(|c| c.is_paid() && !c.is_special())
        .map(|c| c.months_spanned())
        .sum();
    Ok(UnitStatement { unit_number, contributions, paid_total, pending_total, paid_months })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::assessments::{add_bulk_special_assessment, SpecialAssessment};
    use crate::db::tests::test_store;
    use crate::hoas::tests::sample_hoa;
    use crate::models::{ContributionPatch, NewContribution, NewExpense, PaymentStatus};

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn expense(hoa_id: i64, amount: f64, status: PaymentStatus) -> NewExpense {
        NewExpense {
            hoa_id,
            expense_type: "maintenance".to_string(),
            description: None,
            amount,
            payment_status: status,
        }
    }

    fn paid(hoa_id: i64, unit: u32, start: &str, end: Option<&str>, amount: f64) -> NewContribution {
        NewContribution {
            end_month: end.map(m),
            payment_status: PaymentStatus::Paid,
            ..NewContribution::new(hoa_id, unit, m(start), amount)
        }
    }

    #[test]
    fn test_net_and_projected_balance() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(paid(hoa_id, 1, "2025-01", None, 100.0)).unwrap();
        store.expenses().add(expense(hoa_id, 50.0, PaymentStatus::Pending)).unwrap();

        let s = get_financial_summary(&store, hoa_id).unwrap();
        assert_eq!(s.net_balance, 600.0);
        assert_eq!(s.projected_balance, 550.0);
        assert_eq!(s.total_contributions, 600.0);
        assert_eq!(s.total_expenses, 50.0);
        assert_eq!(s.paid_contribution_count, 1);
        assert_eq!(s.pending_expense_count, 1);
    }

    #[test]
    fn test_pending_never_moves_net_balance() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(paid(hoa_id, 1, "2025-01", None, 100.0)).unwrap();
        store.expenses().add(expense(hoa_id, 30.0, PaymentStatus::Paid)).unwrap();
        let before = get_financial_summary(&store, hoa_id).unwrap().net_balance;

        for unit in 2..=6 {
            store
                .contributions()
                .add(NewContribution::new(hoa_id, unit, m("2025-02"), 100.0))
                .unwrap();
        }
        store.expenses().add(expense(hoa_id, 400.0, PaymentStatus::Pending)).unwrap();

        let s = get_financial_summary(&store, hoa_id).unwrap();
        assert_eq!(s.net_balance, before);
        assert_eq!(s.net_balance, 570.0);
        assert_eq!(
            s.projected_balance - s.net_balance,
            s.pending_contributions - s.pending_expenses
        );
    }

    #[test]
    fn test_special_contributions_counted_separately() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(paid(hoa_id, 1, "2025-01", None, 100.0)).unwrap();
        add_bulk_special_assessment(
            &store,
            SpecialAssessment {
                hoa_id,
                unit_numbers: vec![1, 2],
                purpose: "Elevator".to_string(),
                amount_per_unit: 75.0,
                due_date: m("2025-04"),
                notes: None,
            },
        )
        .unwrap();
        let s = get_financial_summary(&store, hoa_id).unwrap();
        assert_eq!(s.regular_total, 100.0);
        assert_eq!(s.special_total, 150.0);
        assert_eq!(s.total_contributions, 750.0);
    }

    #[test]
    fn test_summary_missing_hoa() {
        let (_dir, store) = test_store();
        assert!(matches!(
            get_financial_summary(&store, 9).unwrap_err(),
            HoaError::NotFound { entity: "HOA", id: 9 }
        ));
    }

    #[test]
    fn test_monthly_breakdown_groups_by_recorded_month() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        let jan = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let mar = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        // Dues for December recorded in March count toward March.
        store.contributions().add_at(paid(hoa_id, 1, "2024-12", None, 100.0), mar).unwrap();
        store.contributions().add_at(paid(hoa_id, 2, "2025-01", None, 100.0), jan).unwrap();
        store.expenses().add_at(expense(hoa_id, 40.0, PaymentStatus::Paid), jan).unwrap();

        let feed = get_all_transactions(&store, hoa_id).unwrap();
        let rows = monthly_breakdown(&feed);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month, m("2025-03"));
        assert_eq!(rows[0].contributions_total, 100.0);
        assert_eq!(rows[0].expense_count, 0);
        assert_eq!(rows[1].month, m("2025-01"));
        assert_eq!(rows[1].contribution_count, 1);
        assert_eq!(rows[1].expenses_total, 40.0);
        assert_eq!(rows[1].net(), 60.0);
    }

    #[test]
    fn test_special_assessments_by_purpose() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        let ids = add_bulk_special_assessment(
            &store,
            SpecialAssessment {
                hoa_id,
                unit_numbers: vec![1, 2, 3],
                purpose: "Roof repair".to_string(),
                amount_per_unit: 200.0,
                due_date: m("2025-05"),
                notes: None,
            },
        )
        .unwrap();
        store
            .contributions()
            .update(ids[0], ContributionPatch { payment_status: Some(PaymentStatus::Paid), ..Default::default() })
            .unwrap();
        store
            .contributions()
            .add(NewContribution {
                contribution_type: crate::models::ContributionType::Special,
                ..NewContribution::new(hoa_id, 4, m("2025-05"), 50.0)
            })
            .unwrap();

        let groups = special_assessments_by_purpose(&store, hoa_id).unwrap();
        assert_eq!(groups.len(), 2);
        let roof = &groups[0];
        assert_eq!(roof.purpose, "Roof repair");
        assert_eq!(roof.total_amount, 600.0);
        assert_eq!(roof.paid_amount, 200.0);
        assert_eq!(roof.pending_amount, 400.0);
        assert_eq!(roof.paid_count, 1);
        assert_eq!(roof.total_count, 3);
        assert_eq!(groups[1].purpose, UNSPECIFIED_PURPOSE);
        assert_eq!(groups[1].total_count, 1);
    }

    #[test]
    fn test_collection_rate_modes() {
        let (_dir, store) = test_store();
        let created = Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
        let hoa_id = store.hoas().add_at(sample_hoa(), created).unwrap();
        store.contributions().add(paid(hoa_id, 1, "2025-01", Some("2025-03"), 300.0)).unwrap();
        store.contributions().add(paid(hoa_id, 2, "2025-03", None, 100.0)).unwrap();
        store.contributions().add(paid(hoa_id, 3, "2024-12", None, 100.0)).unwrap();

        let hoa = store.hoas().require(hoa_id).unwrap();
        let summary = get_financial_summary(&store, hoa_id).unwrap();
        let today = m("2025-03");

        let monthly = collection_rate_at(&hoa, &summary, CollectionMode::Monthly, today);
        assert_eq!(monthly.expected, 1000.0);
        assert_eq!(monthly.actual, 400.0);
        assert_eq!(monthly.rate, 40.0);

        // Yearly counts January through March; overall counts months elapsed.
        let yearly = collection_rate_at(&hoa, &summary, CollectionMode::Yearly, today);
        assert_eq!(yearly.expected, 3000.0);
        assert_eq!(yearly.actual, 400.0);

        let overall = collection_rate_at(&hoa, &summary, CollectionMode::Overall, today);
        assert_eq!(overall.expected, 2000.0);
        assert_eq!(overall.actual, 1000.0);
        assert_eq!(overall.rate, 50.0);
    }

    #[test]
    fn test_collection_rate_is_capped_and_handles_zero_expected() {
        let (_dir, store) = test_store();
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let hoa_id = store.hoas().add_at(sample_hoa(), created).unwrap();
        let mut hoa = store.hoas().require(hoa_id).unwrap();
        let summary = get_financial_summary(&store, hoa_id).unwrap();

        // Opening balance alone exceeds one month of dues.
        hoa.monthly_contribution = 10.0;
        let overall = collection_rate_at(&hoa, &summary, CollectionMode::Overall, m("2025-06"));
        assert_eq!(overall.rate, 100.0);

        hoa.monthly_contribution = 0.0;
        let overall = collection_rate_at(&hoa, &summary, CollectionMode::Overall, m("2025-06"));
        assert_eq!(overall.rate, 0.0);
    }

    #[test]
    fn test_collection_mode_parse() {
        assert_eq!("yearly".parse::<CollectionMode>().unwrap(), CollectionMode::Yearly);
        assert!("weekly".parse::<CollectionMode>().is_err());
    }

    #[test]
    fn test_unit_statement() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(paid(hoa_id, 2, "2025-01", Some("2025-03"), 300.0)).unwrap();
        store
            .contributions()
            .add(NewContribution::new(hoa_id, 2, m("2025-04"), 100.0))
            .unwrap();
        store.contributions().add(paid(hoa_id, 3, "2025-01", None, 100.0)).unwrap();

        let st = unit_statement(&store, hoa_id, 2).unwrap();
        assert_eq!(st.contributions.len(), 2);
        assert_eq!(st.paid_total, 300.0);
        assert_eq!(st.pending_total, 100.0);
        assert_eq!(st.paid_months, 3);
        assert!(matches!(unit_statement(&store, hoa_id, 11).unwrap_err(), HoaError::Validation(_)));
    }
}
