#[cfg(test)]
mod tests {
    use crate::clients;
    use crate::db::test_pool;
    use crate::error::AppError;
    use crate::invoicing::derive::{derive_invoice, InvoiceDetails};
    use crate::invoicing::store;
    use crate::ledger::sessions;
    use crate::ledger::store::billable_candidates;
    use crate::models::client::CreateClientRequest;
    use crate::models::invoice::{Invoice, InvoiceStatus};
    use crate::models::session::{
        Billing, CreateSessionRequest, PaymentStatus, SessionStatus, UpdateSessionRequest,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn seed_client(pool: &SqlitePool, user_id: Uuid) -> Uuid {
        clients::create_client(
            pool,
            user_id,
            CreateClientRequest {
                name: "Acme LLC".to_string(),
                projects: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_done_session(
        pool: &SqlitePool,
        user_id: Uuid,
        client_id: Uuid,
        name: &str,
        hours: i64,
        rate: &str,
    ) -> Uuid {
        sessions::create_manual(
            pool,
            8,
            user_id,
            CreateSessionRequest {
                name: name.to_string(),
                client_id: Some(client_id),
                project_id: None,
                notes: None,
                billing: Billing::Hourly { rate: d(rate) },
                status: SessionStatus::Done,
                days: None,
                hours: Some(hours),
                minutes: None,
                occurred_at: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    /// Mirrors what the create handler does: fetch the client's candidates,
    /// keep the requested ones, derive and persist a draft.
    async fn seed_invoice(
        pool: &SqlitePool,
        user_id: Uuid,
        client_id: Uuid,
        session_ids: &[Uuid],
    ) -> Invoice {
        let candidates = billable_candidates(pool, user_id, client_id).await.unwrap();
        let selected: Vec<_> = candidates
            .into_iter()
            .filter(|s| session_ids.contains(&s.id))
            .collect();
        let invoice = derive_invoice(
            user_id,
            client_id,
            &selected,
            InvoiceDetails {
                invoice_number: "INV-0001".to_string(),
                issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                due_date: None,
                currency: "USD".to_string(),
                tax_rate: Decimal::ZERO,
            },
        )
        .unwrap();
        store::insert_invoice(pool, &invoice).await.unwrap();
        invoice
    }

    /// Walking a draft to paid must flip every source session to `PAID` and
    /// empty the client's candidate list.
    #[tokio::test]
    async fn paying_an_invoice_marks_its_sessions_paid() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let first = seed_done_session(&pool, user, client, "Design", 2, "50").await;
        let second = seed_done_session(&pool, user, client, "Build", 3, "50").await;

        let invoice = seed_invoice(&pool, user, client, &[first, second]).await;
        assert_eq!(invoice.total, d("250.00"));

        let sent = store::advance_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        // Sessions are untouched until the invoice is actually paid.
        let row = crate::ledger::store::get_session(&pool, user, first).await.unwrap();
        assert_eq!(row.payment_status, PaymentStatus::Unpaid);

        let paid = store::advance_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        for id in [first, second] {
            let row = crate::ledger::store::get_session(&pool, user, id).await.unwrap();
            assert_eq!(row.payment_status, PaymentStatus::Paid);
        }

        let candidates = billable_candidates(&pool, user, client).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn cycling_back_to_draft_leaves_sessions_paid() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let session = seed_done_session(&pool, user, client, "Design", 2, "50").await;

        let invoice = seed_invoice(&pool, user, client, &[session]).await;
        store::advance_invoice(&pool, user, invoice.id).await.unwrap();
        store::advance_invoice(&pool, user, invoice.id).await.unwrap();
        let back = store::advance_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(back.status, InvoiceStatus::Draft);

        let row = crate::ledger::store::get_session(&pool, user, session).await.unwrap();
        assert_eq!(row.payment_status, PaymentStatus::Paid);
    }

    /// The invoice is a snapshot: editing or deleting a source session after
    /// derivation must not change the stored items or totals.
    #[tokio::test]
    async fn invoices_are_immune_to_later_session_changes() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let session = seed_done_session(&pool, user, client, "Design", 2, "50").await;

        let invoice = seed_invoice(&pool, user, client, &[session]).await;
        assert_eq!(invoice.total, d("100.00"));

        sessions::edit_session(
            &pool,
            8,
            user,
            session,
            UpdateSessionRequest {
                name: Some("Redesign".to_string()),
                notes: None,
                project_id: None,
                billing: Some(Billing::Hourly { rate: d("500") }),
                days: None,
                hours: Some(10),
                minutes: None,
            },
        )
        .await
        .unwrap();

        let reread = store::get_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(reread.total, d("100.00"));
        assert_eq!(reread.items[0].description, "Design");
        assert_eq!(reread.items[0].hours, Some(d("2.00")));

        let engine = crate::ledger::timer::TimerEngine::new();
        sessions::remove_session(&pool, &engine, user, session).await.unwrap();
        let survived = store::get_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(survived.total, d("100.00"));
    }

    #[tokio::test]
    async fn only_candidates_can_be_selected() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let done = seed_done_session(&pool, user, client, "Design", 2, "50").await;

        // A pending session never shows up as a candidate.
        let pending = sessions::create_manual(
            &pool,
            8,
            user,
            CreateSessionRequest {
                name: "Backlog".to_string(),
                client_id: Some(client),
                project_id: None,
                notes: None,
                billing: Billing::Hourly { rate: d("50") },
                status: SessionStatus::Pending,
                days: None,
                hours: Some(1),
                minutes: None,
                occurred_at: None,
            },
        )
        .await
        .unwrap();

        let candidates = billable_candidates(&pool, user, client).await.unwrap();
        let ids: Vec<Uuid> = candidates.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![done]);
        assert!(!ids.contains(&pending.id));
    }

    #[tokio::test]
    async fn drafts_are_the_only_deletable_invoices() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let session = seed_done_session(&pool, user, client, "Design", 2, "50").await;

        let invoice = seed_invoice(&pool, user, client, &[session]).await;
        store::advance_invoice(&pool, user, invoice.id).await.unwrap();

        let result = store::delete_draft(&pool, user, invoice.id).await;
        assert!(matches!(result, Err(AppError::InvoiceNotDraft)));

        // A fresh draft deletes fine.
        let session2 = seed_done_session(&pool, user, client, "Build", 1, "50").await;
        let draft = seed_invoice(&pool, user, client, &[session2]).await;
        store::delete_draft(&pool, user, draft.id).await.unwrap();
        let result = store::get_invoice(&pool, user, draft.id).await;
        assert!(matches!(result, Err(AppError::NotFound("invoice"))));
    }

    #[tokio::test]
    async fn cancelled_invoices_are_terminal() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let client = seed_client(&pool, user).await;
        let session = seed_done_session(&pool, user, client, "Design", 2, "50").await;

        let invoice = seed_invoice(&pool, user, client, &[session]).await;
        let cancelled = store::cancel_invoice(&pool, user, invoice.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

        let advance = store::advance_invoice(&pool, user, invoice.id).await;
        assert!(matches!(advance, Err(AppError::InvoiceCancelled)));
        let again = store::cancel_invoice(&pool, user, invoice.id).await;
        assert!(matches!(again, Err(AppError::InvoiceCancelled)));

        // Its sessions remain billable for the next invoice.
        let candidates = billable_candidates(&pool, user, client).await.unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
