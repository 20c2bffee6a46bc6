use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use cobranca_core::clock::FixedClock;
use cobranca_core::domain::bill::{Bill, BillId, Debtor, NationalId};
use cobranca_core::negotiation::states::{NegotiationConfig, NegotiationFlow, SessionReply};
use cobranca_core::session::SessionDispatcher;
use cobranca_db::repositories::{DebtorRepository, SqlDebtorRepository};
use cobranca_db::{connect_with_settings, migrations, DbPool};

async fn prepared_pool(name: &str) -> DbPool {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let pool = connect_with_settings(&url, 2, 5).await.expect("pool connects");
    migrations::run_pending(&pool).await.expect("migrations apply");
    pool
}

fn debtor(national_id: &str) -> Debtor {
    Debtor {
        national_id: NationalId::new(national_id),
        bills: vec![
            Bill {
                id: BillId(format!("{national_id}-1")),
                amount: Decimal::new(500_00, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 5, 6).expect("valid date"),
                paid: false,
            },
            Bill {
                id: BillId(format!("{national_id}-2")),
                amount: Decimal::new(89_90, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"),
                paid: false,
            },
            Bill {
                id: BillId(format!("{national_id}-3")),
                amount: Decimal::new(42_00, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date"),
                paid: true,
            },
        ],
    }
}

#[tokio::test]
async fn sql_repository_round_trips_a_debtor() {
    let pool = prepared_pool("ledger_round_trip").await;
    let repo = SqlDebtorRepository::new(pool.clone());

    repo.save(debtor("11122233344")).await.expect("save succeeds");

    let loaded = DebtorRepository::find_by_national_id(&repo, &NationalId::new("11122233344"))
        .await
        .expect("lookup succeeds")
        .expect("debtor exists");

    // Rows come back ordered by due date.
    assert_eq!(loaded.bills.len(), 3);
    assert_eq!(loaded.bills[0].due_date, NaiveDate::from_ymd_opt(2025, 1, 15).expect("date"));
    assert!(loaded.bills[0].paid);
    assert_eq!(loaded.bills[1].amount, Decimal::new(500_00, 2));

    let missing = DebtorRepository::find_by_national_id(&repo, &NationalId::new("00000000000"))
        .await
        .expect("lookup succeeds");
    assert!(missing.is_none());

    pool.close().await;
}

#[tokio::test]
async fn saving_again_replaces_the_bill_set() {
    let pool = prepared_pool("ledger_resave").await;
    let repo = SqlDebtorRepository::new(pool.clone());

    repo.save(debtor("55566677788")).await.expect("first save");

    let updated = Debtor {
        national_id: NationalId::new("55566677788"),
        bills: vec![Bill {
            id: BillId("55566677788-replacement".to_owned()),
            amount: Decimal::new(10_00, 2),
            due_date: NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date"),
            paid: false,
        }],
    };
    repo.save(updated).await.expect("second save");

    let loaded = DebtorRepository::find_by_national_id(&repo, &NationalId::new("55566677788"))
        .await
        .expect("lookup succeeds")
        .expect("debtor exists");
    assert_eq!(loaded.bills.len(), 1);
    assert_eq!(loaded.bills[0].id.0, "55566677788-replacement");

    pool.close().await;
}

#[tokio::test]
async fn list_national_ids_is_sorted() {
    let pool = prepared_pool("ledger_listing").await;
    let repo = SqlDebtorRepository::new(pool.clone());

    repo.save(debtor("99988877766")).await.expect("save succeeds");
    repo.save(debtor("11122233344")).await.expect("save succeeds");

    let ids = repo.list_national_ids().await.expect("listing succeeds");
    assert_eq!(
        ids,
        vec![NationalId::new("11122233344"), NationalId::new("99988877766")]
    );

    pool.close().await;
}

#[tokio::test]
async fn sql_ledger_drives_a_full_negotiation() {
    let pool = prepared_pool("ledger_negotiation").await;
    let repo = Arc::new(SqlDebtorRepository::new(pool.clone()));
    repo.save(debtor("11122233344")).await.expect("save succeeds");

    // 2025-06-15: the 500.00 bill is 40 days overdue, the rest are paid or
    // not yet due.
    let as_of = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("valid instant");
    let dispatcher = SessionDispatcher::new(
        repo,
        FixedClock(as_of),
        NegotiationConfig { aging_threshold_days: 30, flow: NegotiationFlow::MultiStep },
    );

    let reply = dispatcher
        .on_identifier_submitted("chat-1", "11122233344")
        .await
        .expect("lookup succeeds");
    let SessionReply::Statement { statement } = reply else {
        panic!("expected an open statement");
    };
    assert_eq!(statement.active.len(), 1);
    assert_eq!(statement.overdue.len(), 1);
    assert_eq!(statement.overdue[0].days_overdue, 40);
    // 500 * (1 + 0.01 + 0.0033 * 40) + 10.00 aging surcharge
    assert_eq!(statement.total_due, Decimal::new(581_0000, 4));
    assert_eq!(statement.max_installments, 5);

    dispatcher
        .on_installment_choice_submitted("chat-1", 5)
        .await
        .expect("count within bounds");
    let reply = dispatcher
        .on_payment_method_submitted("chat-1", "boleto")
        .await
        .expect("method recognized");

    let SessionReply::InstallmentPlan(plan) = reply else {
        panic!("expected an installment plan");
    };
    assert_eq!(plan.per_installment_rounded(), Decimal::new(119_20, 2));

    pool.close().await;
}
