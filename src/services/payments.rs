//! Payment state machine for a single member obligation.
//!
//! `unpaid -> waiting` when the member submits evidence, `waiting -> paid` when
//! an admin approves. Any lookup that does not match the required state is
//! reported as "member obligation not found".

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{self, dues};
use crate::errors::{not_found, AppError, ResultExt};
use crate::models::{IncomeEntry, ObligationDetail, UploadedFile};

use super::{EvidenceUploader, Ledger};

pub struct PaymentService {
    pool: SqlitePool,
    uploader: Arc<dyn EvidenceUploader>,
    ledger: Arc<dyn Ledger>,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        uploader: Arc<dyn EvidenceUploader>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            pool,
            uploader,
            ledger,
        }
    }

    pub async fn get_obligation(&self, id: i64) -> Result<ObligationDetail, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        dues::find_obligation(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::MEMBER_OBLIGATION))
    }

    /// Member uploads proof of payment for one of their own `unpaid` obligations.
    pub async fn submit_payment(
        &self,
        obligation_id: i64,
        member_id: i64,
        evidence: UploadedFile,
    ) -> Result<ObligationDetail, AppError> {
        require_evidence(&evidence)?;

        let mut conn = self.pool.acquire().await.context("acquire connection")?;

        if dues::find_unpaid_for_member(&mut *conn, obligation_id, member_id)
            .await?
            .is_none()
        {
            return Err(AppError::not_found(not_found::MEMBER_OBLIGATION));
        }

        let url = self.uploader.upload(&evidence.filename, &evidence.bytes).await?;

        // The guarded update re-checks owner and state, so a concurrent
        // submission cannot move the obligation twice.
        if !dues::mark_waiting(&mut *conn, obligation_id, member_id, &url).await? {
            return Err(AppError::not_found(not_found::MEMBER_OBLIGATION));
        }

        tracing::info!(
            "Member {} submitted payment evidence for obligation {}",
            member_id,
            obligation_id
        );

        dues::find_obligation(&mut *conn, obligation_id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::MEMBER_OBLIGATION))
    }

    /// Admin replaces the evidence of an obligation that is not yet paid.
    pub async fn revise_evidence(
        &self,
        obligation_id: i64,
        evidence: UploadedFile,
    ) -> Result<ObligationDetail, AppError> {
        require_evidence(&evidence)?;

        let mut conn = self.pool.acquire().await.context("acquire connection")?;

        if dues::find_unsettled(&mut *conn, obligation_id).await?.is_none() {
            return Err(AppError::not_found(not_found::MEMBER_OBLIGATION));
        }

        let url = self.uploader.upload(&evidence.filename, &evidence.bytes).await?;

        if !dues::replace_evidence(&mut *conn, obligation_id, &url).await? {
            return Err(AppError::not_found(not_found::MEMBER_OBLIGATION));
        }

        tracing::info!("Replaced payment evidence for obligation {}", obligation_id);

        dues::find_obligation(&mut *conn, obligation_id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::MEMBER_OBLIGATION))
    }

    /// Mark an obligation paid and book the income in the ledger.
    ///
    /// Both writes share one transaction: a failed ledger write leaves the
    /// obligation in its previous state.
    pub async fn approve(&self, obligation_id: i64, is_paid: bool) -> Result<ObligationDetail, AppError> {
        if !is_paid {
            return Err(AppError::validation("isPaid must be true to approve a payment"));
        }

        let mut tx = db::begin_write(&self.pool).await?;

        let detail = dues::find_unsettled(&mut *tx, obligation_id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::MEMBER_OBLIGATION))?;

        if !dues::mark_paid(&mut *tx, obligation_id).await? {
            return Err(AppError::not_found(not_found::MEMBER_OBLIGATION));
        }

        let entry = income_entry(&detail);
        let entry_id = self.ledger.record_income(&mut *tx, &entry).await?;

        let approved = dues::find_obligation(&mut *tx, obligation_id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::MEMBER_OBLIGATION))?;

        tx.commit().await.context("commit payment approval")?;

        tracing::info!(
            "Approved obligation {} of member {} (ledger entry {})",
            obligation_id,
            detail.obligation.member_id,
            entry_id
        );
        Ok(approved)
    }
}

fn require_evidence(evidence: &UploadedFile) -> Result<(), AppError> {
    if evidence.is_empty() {
        return Err(AppError::validation("evidence file is required"));
    }
    Ok(())
}

/// Income line for an approved obligation, dated when the obligation was issued.
fn income_entry(detail: &ObligationDetail) -> IncomeEntry {
    IncomeEntry {
        amount: detail.amount,
        date: detail.obligation.created_at.date_naive(),
        note: format!(
            "Dues payment from {} for {}",
            detail.member_name,
            detail.month.format("%B %Y")
        ),
        evidence_url: detail.obligation.evidence_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::cashflows;
    use crate::models::{ObligationStatus, PageQuery};
    use crate::services::testing::{
        evidence, seed_member, FailingLedger, MemoryUploader, TestDb,
    };
    use crate::services::{DuesService, SqlLedger};

    fn march_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    struct Fixture {
        db: TestDb,
        dues: DuesService,
        payments: PaymentService,
        uploader: Arc<MemoryUploader>,
    }

    async fn fixture_with_ledger(ledger: Arc<dyn Ledger>) -> Fixture {
        let db = TestDb::new().await;
        let uploader = Arc::new(MemoryUploader::default());
        let dues = DuesService::with_clock(db.pool.clone(), march_2025);
        let payments = PaymentService::new(db.pool.clone(), uploader.clone(), ledger);
        Fixture {
            db,
            dues,
            payments,
            uploader,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_ledger(Arc::new(SqlLedger)).await
    }

    async fn obligation_of(f: &Fixture, charge_id: i64, member_id: i64) -> ObligationDetail {
        f.dues
            .list_obligations(charge_id, PageQuery::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .find(|o| o.obligation.member_id == member_id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_payment_flow_records_income() {
        let f = fixture().await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let budi = seed_member(&f.db.pool, "Budi", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let obligation = obligation_of(&f, charge.id, rina.id).await;

        let submitted = f
            .payments
            .submit_payment(obligation.obligation.id, rina.id, evidence("transfer.jpg"))
            .await
            .unwrap();
        assert_eq!(submitted.obligation.status, ObligationStatus::Waiting);
        assert_eq!(submitted.obligation.evidence_url, "memory://1/transfer.jpg");

        let approved = f.payments.approve(obligation.obligation.id, true).await.unwrap();
        assert_eq!(approved.obligation.status, ObligationStatus::Paid);
        assert!(approved.obligation.pay_date.is_some());

        let mut conn = f.db.pool.acquire().await.unwrap();
        let income = cashflows::list_income(&mut conn).await.unwrap();
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].amount, 100_000);
        assert_eq!(income[0].date, obligation.obligation.created_at.date_naive());
        assert_eq!(income[0].note, "Dues payment from Rina for March 2025");
        assert_eq!(income[0].evidence_url, "memory://1/transfer.jpg");

        // The other member is untouched.
        let other = obligation_of(&f, charge.id, budi.id).await;
        assert_eq!(other.obligation.status, ObligationStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_submit_payment_only_from_unpaid_and_by_owner() {
        let f = fixture().await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let budi = seed_member(&f.db.pool, "Budi", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let id = obligation_of(&f, charge.id, rina.id).await.obligation.id;

        let err = f
            .payments
            .submit_payment(id, budi.id, evidence("x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == not_found::MEMBER_OBLIGATION));
        assert!(f.uploader.uploads().is_empty());

        f.payments
            .submit_payment(id, rina.id, evidence("x.jpg"))
            .await
            .unwrap();

        // waiting
        let err = f
            .payments
            .submit_payment(id, rina.id, evidence("again.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == not_found::MEMBER_OBLIGATION));

        // paid
        f.payments.approve(id, true).await.unwrap();
        let err = f
            .payments
            .submit_payment(id, rina.id, evidence("late.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == not_found::MEMBER_OBLIGATION));
    }

    #[tokio::test]
    async fn test_submit_payment_requires_evidence() {
        let f = fixture().await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let id = obligation_of(&f, charge.id, rina.id).await.obligation.id;

        let empty = UploadedFile {
            filename: "empty.jpg".to_string(),
            bytes: Vec::new(),
        };
        let err = f.payments.submit_payment(id, rina.id, empty).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_revise_evidence_until_paid() {
        let f = fixture().await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let id = obligation_of(&f, charge.id, rina.id).await.obligation.id;

        f.payments
            .submit_payment(id, rina.id, evidence("blurry.jpg"))
            .await
            .unwrap();
        let revised = f.payments.revise_evidence(id, evidence("sharp.jpg")).await.unwrap();
        assert_eq!(revised.obligation.status, ObligationStatus::Waiting);
        assert_eq!(revised.obligation.evidence_url, "memory://2/sharp.jpg");

        f.payments.approve(id, true).await.unwrap();
        let err = f
            .payments
            .revise_evidence(id, evidence("after.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_approve_twice_is_not_found() {
        let f = fixture().await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let id = obligation_of(&f, charge.id, rina.id).await.obligation.id;

        f.payments.approve(id, true).await.unwrap();
        let err = f.payments.approve(id, true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut conn = f.db.pool.acquire().await.unwrap();
        assert_eq!(cashflows::list_income(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_rejects_false() {
        let f = fixture().await;
        let err = f.payments.approve(1, false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ledger_failure_rolls_back_approval() {
        let f = fixture_with_ledger(Arc::new(FailingLedger)).await;
        let rina = seed_member(&f.db.pool, "Rina", true).await;
        let charge = f.dues.create_charge(march_2025(), 100_000).await.unwrap();
        let id = obligation_of(&f, charge.id, rina.id).await.obligation.id;
        f.payments
            .submit_payment(id, rina.id, evidence("proof.jpg"))
            .await
            .unwrap();

        let err = f.payments.approve(id, true).await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(_)));

        let current = f.payments.get_obligation(id).await.unwrap();
        assert_eq!(current.obligation.status, ObligationStatus::Waiting);
        assert!(current.obligation.pay_date.is_none());
    }
}
