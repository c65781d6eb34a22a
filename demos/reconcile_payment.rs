//! Reconciliation example: rank candidates for an incoming payment,
//! commit a partial match, and re-fetch the server-computed status

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use settlement_core::utils::MemoryGateway;
use settlement_core::{
    conciliation_status_label, ConciliationRecord, ConciliationStatus, MatchCandidate,
    MatchWorkflow,
};

fn candidate(transaction_id: &str, score: f64, amount: i64) -> MatchCandidate {
    MatchCandidate {
        transaction_id: transaction_id.to_string(),
        score,
        merchant_name: "Lagoon Basin Traders".to_string(),
        phone: "+22170000000".to_string(),
        created_date: NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        amount: BigDecimal::from(amount),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔎 Settlement Core - Reconciliation Example\n");

    let gateway = MemoryGateway::new();
    gateway.seed_repayments(vec![ConciliationRecord {
        id: "PAY-88".to_string(),
        amount: BigDecimal::from(1000),
        remaining_amount: BigDecimal::from(1000),
        client_number: "C-412".to_string(),
        account: "ACC-3".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        status: ConciliationStatus::NotReconciled,
    }]);
    gateway.seed_candidates(
        "PAY-88",
        vec![
            candidate("TX-301", 12.5, 400),
            candidate("TX-204", 31.0, 600),
            candidate("TX-117", 31.0, 1000),
        ],
    );

    let workflow = MatchWorkflow::new(gateway.clone());

    // 1. Load the payments awaiting attribution
    println!("📥 Fetching repayments...");
    for record in workflow.refresh().await? {
        let label = conciliation_status_label(record.status);
        println!(
            "  {} - {} received, {} outstanding ({})",
            record.id, record.amount, record.remaining_amount, label.text
        );
    }

    // 2. Rank candidates for the selected payment
    println!("\n🏅 Ranked candidates for PAY-88:");
    workflow.load_candidates_for("PAY-88").await?;
    for candidate in workflow.candidates() {
        println!(
            "  score {:>5.1}  {}  {}",
            candidate.score, candidate.transaction_id, candidate.merchant_name
        );
    }

    // 3. Commit a partial match; status stays server-sourced
    println!("\n✅ Committing 600 against TX-204...");
    workflow
        .commit("PAY-88", "TX-204", &BigDecimal::from(600))
        .await?;

    workflow.refresh().await?;
    let updated = workflow.record("PAY-88").unwrap();
    let label = conciliation_status_label(updated.status);
    println!(
        "  {} now {} with {} outstanding",
        updated.id, label.text, updated.remaining_amount
    );

    Ok(())
}
