use tracing::debug;

use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::hoas::HoaRepository;
use crate::models::{Hoa, Month, RateChange};

/// The latest entry in the rate history, or the HOA's stored rate when the
/// history is empty.
pub fn get_current_rate(hoa: &Hoa) -> f64 {
    hoa.contribution_rate_history
        .last()
        .map(|change| change.amount)
        .unwrap_or(hoa.monthly_contribution)
}

/// The rate in effect for `month`: the most recent entry dated on or before
/// it. Months before the first entry use the initial rate.
pub fn rate_for_month(hoa: &Hoa, month: Month) -> f64 {
    let history = &hoa.contribution_rate_history;
    history
        .iter()
        .rev()
        .find(|change| change.effective_date <= month)
        .or_else(|| history.first())
        .map(|change| change.amount)
        .unwrap_or(hoa.monthly_contribution)
}

/// Record a new rate. Existing contributions keep the amounts they were
/// created with.
pub fn add_rate_change(store: &Store, hoa_id: i64, change: RateChange) -> Result<()> {
    store.atomic(|conn| {
        let repo = HoaRepository::new(conn);
        let hoa = repo.require(hoa_id)?;
        let mut history = hoa.contribution_rate_history.clone();
        let at = history.partition_point(|c| c.effective_date < change.effective_date);
        if history.get(at).is_some_and(|c| c.effective_date == change.effective_date) {
            return Err(HoaError::DuplicateRateDate(change.effective_date));
        }
        debug!(hoa_id, effective_date = %change.effective_date, amount = change.amount, "adding rate change");
        history.insert(at, change);
        let current = history.last().map(|c| c.amount).unwrap_or(hoa.monthly_contribution);
        repo.set_rate_history(hoa_id, &history, current)
    })
}

/// Remove a rate change. The initial rate is permanent; removing a date that
/// has no entry is a no-op.
pub fn delete_rate_change(store: &Store, hoa_id: i64, effective_date: Month) -> Result<()> {
    store.atomic(|conn| {
        let repo = HoaRepository::new(conn);
        let hoa = repo.require(hoa_id)?;
        let mut history = hoa.contribution_rate_history.clone();
        if history.first().is_some_and(|c| c.effective_date == effective_date) {
            return Err(HoaError::CannotDeleteInitialRate(effective_date));
        }
        let before = history.len();
        history.retain(|c| c.effective_date != effective_date);
        if history.len() == before {
            return Ok(());
        }
        debug!(hoa_id, %effective_date, "deleted rate change");
        let current = history.last().map(|c| c.amount).unwrap_or(hoa.monthly_contribution);
        repo.set_rate_history(hoa_id, &history, current)
    })
}

/// Change the amount (and optionally the note) of an existing entry. Dates
/// are fixed once recorded.
pub fn update_rate_change(
    store: &Store,
    hoa_id: i64,
    effective_date: Month,
    amount: f64,
    note: Option<String>,
) -> Result<()> {
    store.atomic(|conn| {
        let repo = HoaRepository::new(conn);
        let hoa = repo.require(hoa_id)?;
        let mut history = hoa.contribution_rate_history.clone();
        let entry = history
            .iter_mut()
            .find(|c| c.effective_date == effective_date)
            .ok_or(HoaError::RateNotFound(effective_date))?;
        entry.amount = amount;
        if let Some(note) = note {
            entry.note = note;
        }
        let current = history.last().map(|c| c.amount).unwrap_or(hoa.monthly_contribution);
        repo.set_rate_history(hoa_id, &history, current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_store;
    use crate::hoas::tests::sample_hoa;
    use crate::contributions::regular_amount;
    use crate::models::{HoaPatch, NewContribution, NewHoa};
    use crate::reports::{collection_rate_at, get_financial_summary, CollectionMode};

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn change(date: &str, amount: f64) -> RateChange {
        RateChange { effective_date: m(date), amount, note: String::new() }
    }

    fn setup(store: &Store) -> i64 {
        store
            .hoas()
            .add(NewHoa {
                contribution_rate_history: vec![RateChange {
                    effective_date: m("2025-01"),
                    amount: 100.0,
                    note: "Initial rate".to_string(),
                }],
                ..sample_hoa()
            })
            .unwrap()
    }

    fn dates(store: &Store, hoa_id: i64) -> Vec<String> {
        store
            .hoas()
            .require(hoa_id)
            .unwrap()
            .contribution_rate_history
            .iter()
            .map(|c| c.effective_date.to_string())
            .collect()
    }

    #[test]
    fn test_add_rate_change_updates_current_rate() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        let hoa = store.hoas().require(hoa_id).unwrap();
        assert_eq!(get_current_rate(&hoa), 150.0);
        assert_eq!(hoa.monthly_contribution, 150.0);
    }

    #[test]
    fn test_stored_rate_agrees_with_history_after_updates() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-06", 200.0)).unwrap();
        store
            .hoas()
            .update(hoa_id, HoaPatch { number_of_units: Some(12), ..Default::default() })
            .unwrap();

        let hoa = store.hoas().require(hoa_id).unwrap();
        assert_eq!(hoa.monthly_contribution, 200.0);
        assert_eq!(get_current_rate(&hoa), 200.0);
        assert_eq!(regular_amount(&hoa, m("2025-06"), None), 200.0);
        assert_eq!(NewContribution::regular(&hoa, 1, m("2025-06"), None).amount, 200.0);

        let summary = get_financial_summary(&store, hoa_id).unwrap();
        let monthly = collection_rate_at(&hoa, &summary, CollectionMode::Monthly, m("2025-06"));
        assert_eq!(monthly.expected, 12.0 * get_current_rate(&hoa));
    }

    #[test]
    fn test_duplicate_rate_date_rejected() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        let err = add_rate_change(&store, hoa_id, change("2025-03", 175.0)).unwrap_err();
        assert!(matches!(err, HoaError::DuplicateRateDate(d) if d == m("2025-03")));
        let err = add_rate_change(&store, hoa_id, change("2025-01", 90.0)).unwrap_err();
        assert!(matches!(err, HoaError::DuplicateRateDate(_)));
        assert_eq!(dates(&store, hoa_id), vec!["2025-01", "2025-03"]);
    }

    #[test]
    fn test_history_stays_sorted() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-09", 180.0)).unwrap();
        add_rate_change(&store, hoa_id, change("2025-04", 120.0)).unwrap();
        add_rate_change(&store, hoa_id, change("2024-11", 80.0)).unwrap();
        assert_eq!(dates(&store, hoa_id), vec!["2024-11", "2025-01", "2025-04", "2025-09"]);
    }

    #[test]
    fn test_cannot_delete_initial_rate() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        let err = delete_rate_change(&store, hoa_id, m("2025-01")).unwrap_err();
        assert!(matches!(err, HoaError::CannotDeleteInitialRate(_)));
        assert_eq!(dates(&store, hoa_id), vec!["2025-01", "2025-03"]);
    }

    #[test]
    fn test_delete_rate_change_restores_previous_rate() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        delete_rate_change(&store, hoa_id, m("2025-03")).unwrap();
        let hoa = store.hoas().require(hoa_id).unwrap();
        assert_eq!(get_current_rate(&hoa), 100.0);
        assert_eq!(hoa.monthly_contribution, 100.0);
        delete_rate_change(&store, hoa_id, m("2025-03")).unwrap();
    }

    #[test]
    fn test_rate_change_does_not_touch_existing_contributions() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        let id = store
            .contributions()
            .add(NewContribution::new(hoa_id, 1, m("2025-03"), 100.0))
            .unwrap();
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        assert_eq!(store.contributions().require(id).unwrap().amount, 100.0);
    }

    #[test]
    fn test_update_rate_change_keeps_date() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        update_rate_change(&store, hoa_id, m("2025-01"), 110.0, Some("Corrected".to_string())).unwrap();
        let hoa = store.hoas().require(hoa_id).unwrap();
        assert_eq!(hoa.contribution_rate_history[0].amount, 110.0);
        assert_eq!(hoa.contribution_rate_history[0].note, "Corrected");
        assert_eq!(hoa.monthly_contribution, 110.0);
        let err = update_rate_change(&store, hoa_id, m("2025-02"), 1.0, None).unwrap_err();
        assert!(matches!(err, HoaError::RateNotFound(_)));
    }

    #[test]
    fn test_rate_for_month() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        add_rate_change(&store, hoa_id, change("2025-03", 150.0)).unwrap();
        let hoa = store.hoas().require(hoa_id).unwrap();
        assert_eq!(rate_for_month(&hoa, m("2024-06")), 100.0);
        assert_eq!(rate_for_month(&hoa, m("2025-02")), 100.0);
        assert_eq!(rate_for_month(&hoa, m("2025-03")), 150.0);
        assert_eq!(rate_for_month(&hoa, m("2026-01")), 150.0);
    }

    #[test]
    fn test_current_rate_falls_back_to_monthly_contribution() {
        let (_dir, store) = test_store();
        let hoa_id = setup(&store);
        let mut hoa = store.hoas().require(hoa_id).unwrap();
        hoa.contribution_rate_history.clear();
        hoa.monthly_contribution = 75.0;
        assert_eq!(get_current_rate(&hoa), 75.0);
        assert_eq!(rate_for_month(&hoa, m("2025-05")), 75.0);
    }

    #[test]
    fn test_missing_hoa_is_not_found() {
        let (_dir, store) = test_store();
        let err = add_rate_change(&store, 5, change("2025-03", 150.0)).unwrap_err();
        assert!(matches!(err, HoaError::NotFound { .. }));
    }
}
