//! Dues lifecycle: monthly charges and the obligations they fan out to.

use chrono::{Local, NaiveDate};
use sqlx::SqlitePool;

use crate::db::{self, dues};
use crate::errors::{not_found, AppError, ConflictKind, ResultExt};
use crate::models::{month_start, DuesCharge, ObligationDetail, ObligationPage, PageQuery};

const MAX_PAGE_SIZE: i64 = 100;

/// Creates, edits and removes monthly charges.
///
/// A charge can only be changed while every obligation it generated is still
/// `unpaid`.
pub struct DuesService {
    pool: SqlitePool,
    today: fn() -> NaiveDate,
}

impl DuesService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, || Local::now().date_naive())
    }

    pub fn with_clock(pool: SqlitePool, today: fn() -> NaiveDate) -> Self {
        Self { pool, today }
    }

    /// Create the charge for `month` and one `unpaid` obligation per approved member.
    pub async fn create_charge(&self, month: NaiveDate, amount: i64) -> Result<DuesCharge, AppError> {
        validate_amount(amount)?;
        let month = month_start(month);
        if month < month_start((self.today)()) {
            return Err(ConflictKind::DateInPast.into());
        }

        let mut tx = db::begin_write(&self.pool).await?;

        if dues::month_taken(&mut *tx, month, None).await? {
            return Err(ConflictKind::MonthAlreadyCharged.into());
        }

        let charge = dues::insert_charge(&mut *tx, month, amount).await?;
        let generated = dues::generate_obligations(&mut *tx, charge.id).await?;

        tx.commit().await.context("commit dues charge")?;

        tracing::info!(
            "Created dues charge {} for {} ({} obligations)",
            charge.id,
            charge.month,
            generated
        );
        Ok(charge)
    }

    pub async fn edit_charge(
        &self,
        id: i64,
        month: NaiveDate,
        amount: i64,
    ) -> Result<DuesCharge, AppError> {
        validate_amount(amount)?;
        let month = month_start(month);

        let mut tx = db::begin_write(&self.pool).await?;

        if dues::find_charge(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::DUES_CHARGE));
        }
        if dues::month_taken(&mut *tx, month, Some(id)).await? {
            return Err(ConflictKind::MonthAlreadyCharged.into());
        }
        if dues::has_payment_activity(&mut *tx, id).await? {
            return Err(ConflictKind::ChargeAlreadyProcessed.into());
        }

        let charge = dues::update_charge(&mut *tx, id, month, amount)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::DUES_CHARGE))?;

        tx.commit().await.context("commit dues charge")?;

        tracing::info!("Updated dues charge {} to {} / {}", id, charge.month, charge.amount);
        Ok(charge)
    }

    /// Soft-delete a charge together with all of its obligations.
    pub async fn remove_charge(&self, id: i64) -> Result<(), AppError> {
        let mut tx = db::begin_write(&self.pool).await?;

        if dues::find_charge(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::DUES_CHARGE));
        }
        if dues::has_payment_activity(&mut *tx, id).await? {
            return Err(ConflictKind::ChargeAlreadyProcessed.into());
        }

        dues::soft_delete_charge(&mut *tx, id).await?;
        let removed = dues::soft_delete_obligations_by_charge(&mut *tx, id).await?;

        tx.commit().await.context("commit dues charge removal")?;

        tracing::info!("Removed dues charge {} ({} obligations)", id, removed);
        Ok(())
    }

    /// Whether any member has started or finished paying this charge.
    pub async fn check_paid(&self, id: i64) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;

        if dues::find_charge(&mut *conn, id).await?.is_none() {
            return Err(AppError::not_found(not_found::DUES_CHARGE));
        }
        dues::has_payment_activity(&mut *conn, id).await
    }

    pub async fn get_charge(&self, id: i64) -> Result<DuesCharge, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        dues::find_charge(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::DUES_CHARGE))
    }

    pub async fn list_charges(&self) -> Result<Vec<DuesCharge>, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        dues::list_charges(&mut *conn).await
    }

    /// One page of a charge's obligations with the charge-wide paid/unpaid counts.
    ///
    /// The three reads run concurrently on separate connections; any failure
    /// fails the whole call.
    pub async fn list_obligations(
        &self,
        charge_id: i64,
        page: PageQuery,
    ) -> Result<ObligationPage, AppError> {
        self.get_charge(charge_id).await?;

        let limit = page.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = page.offset.max(0);

        let (items, paid_total, unpaid_total) = tokio::try_join!(
            async {
                let mut conn = self.pool.acquire().await.context("acquire connection")?;
                dues::list_by_charge(&mut *conn, charge_id, limit, offset).await
            },
            async {
                let mut conn = self.pool.acquire().await.context("acquire connection")?;
                dues::count_by_charge(&mut *conn, charge_id, true).await
            },
            async {
                let mut conn = self.pool.acquire().await.context("acquire connection")?;
                dues::count_by_charge(&mut *conn, charge_id, false).await
            },
        )?;

        Ok(ObligationPage {
            items,
            paid_total,
            unpaid_total,
            limit,
            offset,
        })
    }

    pub async fn list_member_obligations(&self, member_id: i64) -> Result<Vec<ObligationDetail>, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        dues::list_by_member(&mut *conn, member_id).await
    }
}

fn validate_amount(amount: i64) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::validation("amount must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::ObligationStatus;
    use crate::services::testing::{seed_member, set_obligation_status, TestDb};

    fn march_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn service(db: &TestDb) -> DuesService {
        DuesService::with_clock(db.pool.clone(), march_2025)
    }

    #[tokio::test]
    async fn test_create_charge_generates_obligations_for_approved_members() {
        let db = TestDb::new().await;
        let rina = seed_member(&db.pool, "Rina", true).await;
        let budi = seed_member(&db.pool, "Budi", true).await;
        seed_member(&db.pool, "Pending", false).await;
        let dues = service(&db);

        let charge = dues
            .create_charge(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(), 100_000)
            .await
            .unwrap();

        assert_eq!(charge.month, march_2025());
        assert_eq!(charge.amount, 100_000);

        let page = dues.list_obligations(charge.id, PageQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page
            .items
            .iter()
            .all(|o| o.obligation.status == ObligationStatus::Unpaid));
        let mut members: Vec<i64> = page.items.iter().map(|o| o.obligation.member_id).collect();
        members.sort();
        assert_eq!(members, vec![rina.id, budi.id]);
        assert_eq!(page.paid_total, 0);
        assert_eq!(page.unpaid_total, 2);
    }

    #[tokio::test]
    async fn test_create_charge_twice_for_same_month_fails() {
        let db = TestDb::new().await;
        let dues = service(&db);

        dues.create_charge(march_2025(), 50_000).await.unwrap();
        let err = dues
            .create_charge(NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(), 60_000)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(ConflictKind::MonthAlreadyCharged)));
        assert_eq!(dues.list_charges().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_charge_for_same_month() {
        let db = TestDb::new().await;
        seed_member(&db.pool, "Rina", true).await;
        let service = Arc::new(service(&db));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.create_charge(march_2025(), 50_000).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Conflict(ConflictKind::MonthAlreadyCharged)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        let charges = service.list_charges().await.unwrap();
        assert_eq!(charges.len(), 1);
        let page = service.list_obligations(charges[0].id, PageQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_create_charge_in_past_month_fails() {
        let db = TestDb::new().await;
        let dues = service(&db);

        let err = dues
            .create_charge(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(), 50_000)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(ConflictKind::DateInPast)));
    }

    #[tokio::test]
    async fn test_create_charge_rejects_non_positive_amount() {
        let db = TestDb::new().await;
        let err = service(&db).create_charge(march_2025(), 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_edit_charge_guards() {
        let db = TestDb::new().await;
        let member = seed_member(&db.pool, "Rina", true).await;
        let dues = service(&db);
        let march = dues.create_charge(march_2025(), 50_000).await.unwrap();
        let april = dues
            .create_charge(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), 50_000)
            .await
            .unwrap();

        let err = dues.edit_charge(999, march_2025(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = dues.edit_charge(april.id, march_2025(), 75_000).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::MonthAlreadyCharged)));

        // Keeping its own month is not a conflict.
        let edited = dues.edit_charge(march.id, march_2025(), 75_000).await.unwrap();
        assert_eq!(edited.amount, 75_000);

        set_obligation_status(&db.pool, march.id, member.id, ObligationStatus::Waiting).await;
        let err = dues.edit_charge(march.id, march_2025(), 80_000).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::ChargeAlreadyProcessed)));
    }

    #[tokio::test]
    async fn test_remove_charge_cascades_to_obligations() {
        let db = TestDb::new().await;
        let member = seed_member(&db.pool, "Rina", true).await;
        let dues = service(&db);
        let charge = dues.create_charge(march_2025(), 50_000).await.unwrap();

        dues.remove_charge(charge.id).await.unwrap();

        assert!(matches!(dues.get_charge(charge.id).await, Err(AppError::NotFound(_))));
        assert!(dues.list_member_obligations(member.id).await.unwrap().is_empty());

        // The month is free again once the charge is gone.
        dues.create_charge(march_2025(), 50_000).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_charge_blocked_after_payment() {
        let db = TestDb::new().await;
        let member = seed_member(&db.pool, "Rina", true).await;
        let dues = service(&db);
        let charge = dues.create_charge(march_2025(), 50_000).await.unwrap();

        assert!(!dues.check_paid(charge.id).await.unwrap());
        set_obligation_status(&db.pool, charge.id, member.id, ObligationStatus::Paid).await;
        assert!(dues.check_paid(charge.id).await.unwrap());

        let err = dues.remove_charge(charge.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::ChargeAlreadyProcessed)));
        assert!(matches!(dues.remove_charge(4242).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_obligations_pages_and_counts() {
        let db = TestDb::new().await;
        let mut ids = Vec::new();
        for name in ["Ani", "Budi", "Citra"] {
            ids.push(seed_member(&db.pool, name, true).await.id);
        }
        let dues = service(&db);
        let charge = dues.create_charge(march_2025(), 10_000).await.unwrap();
        set_obligation_status(&db.pool, charge.id, ids[0], ObligationStatus::Paid).await;

        let page = dues
            .list_obligations(charge.id, PageQuery { limit: 2, offset: 0 })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].member_name, "Ani");
        assert_eq!(page.paid_total, 1);
        assert_eq!(page.unpaid_total, 2);

        let missing = dues.list_obligations(777, PageQuery::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
