use std::cmp::Reverse;

use tracing::info;

use crate::contributions::ContributionRepository;
use crate::db::Store;
use crate::error::Result;
use crate::expenses::ExpenseRepository;
use crate::hoas::HoaRepository;
use crate::models::{Contribution, ContributionType, Transaction};

/// Contributions owned by `hoa_id`, minus legacy opening-balance rows (the
/// opening balance lives on the HOA itself).
pub fn active_contributions(store: &Store, hoa_id: i64) -> Result<Vec<Contribution>> {
    let mut contributions = store.contributions().get_all_by_owner(hoa_id)?;
    contributions.retain(|c| c.contribution_type != ContributionType::Opening);
    Ok(contributions)
}

/// Every contribution and expense of an HOA as one feed, newest first.
pub fn get_all_transactions(store: &Store, hoa_id: i64) -> Result<Vec<Transaction>> {
    let mut feed: Vec<Transaction> = active_contributions(store, hoa_id)?
        .into_iter()
        .map(Transaction::Contribution)
        .chain(
            store
                .expenses()
                .get_all_by_owner(hoa_id)?
                .into_iter()
                .map(Transaction::Expense),
        )
        .collect();
    feed.sort_by_key(|t| Reverse(t.created_at()));
    Ok(feed)
}

/// Delete every contribution and expense of an HOA. The HOA record stays.
pub fn clear_all_transactions(store: &Store, hoa_id: i64) -> Result<usize> {
    let removed = store.atomic(|conn| {
        let contributions = ContributionRepository::new(conn).clear_by_owner(hoa_id)?;
        let expenses = ExpenseRepository::new(conn).clear_by_owner(hoa_id)?;
        Ok(contributions + expenses)
    })?;
    info!(hoa_id, removed, "cleared transactions");
    Ok(removed)
}

/// Wipe every HOA, contribution and expense.
pub fn clear_all_data(store: &Store) -> Result<()> {
    store.atomic(|conn| {
        ContributionRepository::new(conn).clear()?;
        ExpenseRepository::new(conn).clear()?;
        HoaRepository::new(conn).clear()?;
        Ok(())
    })?;
    info!("cleared all data");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::db::tests::test_store;
    use crate::hoas::tests::sample_hoa;
    use crate::models::{Month, NewContribution, NewExpense, PaymentStatus, TransactionType};

    fn jan() -> Month {
        "2025-01".parse().unwrap()
    }

    fn expense(hoa_id: i64, amount: f64) -> NewExpense {
        NewExpense {
            hoa_id,
            expense_type: "cleaning".to_string(),
            description: None,
            amount,
            payment_status: PaymentStatus::Pending,
        }
    }

    #[test]
    fn test_feed_is_merged_newest_first() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        let base = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let c1 = store
            .contributions()
            .add_at(NewContribution::new(hoa_id, 1, jan(), 100.0), base)
            .unwrap();
        let e1 = store.expenses().add_at(expense(hoa_id, 30.0), base + Duration::days(1)).unwrap();
        let c2 = store
            .contributions()
            .add_at(NewContribution::new(hoa_id, 2, jan(), 100.0), base + Duration::days(2))
            .unwrap();

        let feed = get_all_transactions(&store, hoa_id).unwrap();
        let order: Vec<(TransactionType, i64)> = feed.iter().map(|t| (t.transaction_type(), t.id())).collect();
        assert_eq!(
            order,
            vec![
                (TransactionType::Contribution, c2),
                (TransactionType::Expense, e1),
                (TransactionType::Contribution, c1),
            ]
        );
    }

    #[test]
    fn test_feed_hides_legacy_opening_rows() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store
            .contributions()
            .add(NewContribution {
                contribution_type: ContributionType::Opening,
                ..NewContribution::new(hoa_id, 0, jan(), 500.0)
            })
            .unwrap();
        store.contributions().add(NewContribution::new(hoa_id, 1, jan(), 100.0)).unwrap();
        let feed = get_all_transactions(&store, hoa_id).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].amount(), 100.0);
    }

    #[test]
    fn test_clear_all_transactions_keeps_hoa() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        let other = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(NewContribution::new(hoa_id, 1, jan(), 100.0)).unwrap();
        store.expenses().add(expense(hoa_id, 20.0)).unwrap();
        store.expenses().add(expense(other, 20.0)).unwrap();

        assert_eq!(clear_all_transactions(&store, hoa_id).unwrap(), 2);
        assert!(get_all_transactions(&store, hoa_id).unwrap().is_empty());
        assert!(store.hoas().get_by_id(hoa_id).unwrap().is_some());
        assert_eq!(get_all_transactions(&store, other).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_all_data() {
        let (_dir, store) = test_store();
        let hoa_id = store.hoas().add(sample_hoa()).unwrap();
        store.contributions().add(NewContribution::new(hoa_id, 1, jan(), 100.0)).unwrap();
        store.expenses().add(expense(hoa_id, 20.0)).unwrap();
        clear_all_data(&store).unwrap();
        assert_eq!(store.hoas().count().unwrap(), 0);
        assert!(store.contributions().get_all_by_owner(hoa_id).unwrap().is_empty());
        assert!(store.expenses().get_all_by_owner(hoa_id).unwrap().is_empty());
    }
}
