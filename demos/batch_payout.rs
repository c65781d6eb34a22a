//! Batch payout example: open a payee session, withhold one
//! transaction, submit, and inspect the settled ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use settlement_core::utils::MemoryGateway;
use settlement_core::{
    disbursement_status_label, BatchCoordinator, DisbursementRecord, DisbursementStatus,
};

fn pending(payee_id: &str, transaction_id: &str, amount: i64) -> DisbursementRecord {
    DisbursementRecord {
        id: format!("d-{}", transaction_id),
        payee_id: payee_id.to_string(),
        payee_name: "Coastal Fish Cooperative".to_string(),
        transaction_id: transaction_id.to_string(),
        amount: BigDecimal::from(amount),
        scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        effective_date: None,
        status: DisbursementStatus::Pending,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("💸 Settlement Core - Batch Payout Example\n");

    // In production this is an HttpGateway pointed at the ledger API
    let gateway = MemoryGateway::new();
    gateway.seed_disbursements(vec![
        pending("coop-7", "TX-1001", 1000),
        pending("coop-7", "TX-1002", 2000),
        pending("coop-7", "TX-1003", 500),
    ]);

    let coordinator = BatchCoordinator::new(gateway.clone());

    // 1. Open a session: every pending transaction starts selected
    println!("📂 Opening session for coop-7...");
    let view = coordinator.open("coop-7").await?;
    println!(
        "  ✓ {} transactions pending, total {}",
        view.all_ids.len(),
        view.group_total
    );

    // 2. Withhold one transaction from this run
    println!("\n✋ Withholding TX-1002 from this run...");
    coordinator.toggle("TX-1002")?;
    let view = coordinator.session().unwrap();
    println!(
        "  ✓ {} of {} selected, paying {}",
        view.selected_ids.len(),
        view.all_ids.len(),
        view.selected_total
    );

    // 3. Submit: the gateway receives the exclusion list
    println!("\n🚀 Submitting payout batch...");
    let receipt = coordinator.submit().await?;
    println!(
        "  ✓ Confirmed: paid {:?} (total {}), withheld {:?}",
        receipt.paid, receipt.total_paid, receipt.excluded
    );

    // 4. Only server-confirmed state shows up in the ledger
    println!("\n📒 Ledger after settlement:");
    for id in ["d-TX-1001", "d-TX-1002", "d-TX-1003"] {
        let record = gateway.disbursement(id).unwrap();
        let label = disbursement_status_label(record.status);
        println!("  {} -> {}", record.transaction_id, label.text);
    }

    Ok(())
}
