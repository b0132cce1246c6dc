//! Order maintenance.
//!
//! `reconcile` settles orders whose payment callback never reached the
//! storefront: pending or failed orders with a captured payment become
//! paid, and pending orders past the stale window become failed. Recently
//! cancelled orders are checked too, so a payment that went through after
//! the customer closed the widget gets flagged for a refund.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use choco_bliss_core::OrderStatus;
use choco_bliss_storefront::config::{RazorpayConfig, SupabaseConfig};
use choco_bliss_storefront::razorpay::RazorpayClient;
use choco_bliss_storefront::services::{CheckoutService, ReconcileOutcome};
use choco_bliss_storefront::supabase::{Order, SupabaseClient};

const CACHE_TTL: Duration = Duration::from_secs(1);

/// How far back cancelled orders are checked for late payments.
const CANCELLED_LOOKBACK_HOURS: i64 = 24;

/// Tally of one reconciliation run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileTally {
    pub paid: usize,
    pub failed: usize,
    pub unchanged: usize,
    pub needs_refund: usize,
    pub errors: usize,
}

impl ReconcileTally {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Paid { .. } => self.paid += 1,
            ReconcileOutcome::Failed => self.failed += 1,
            ReconcileOutcome::PaidAfterCancel { .. } => self.needs_refund += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Failed and cancelled orders are only worth a second look if the gateway
/// knows them.
fn needs_check(order: &Order, now: DateTime<Utc>) -> bool {
    match order.status {
        OrderStatus::Pending => true,
        OrderStatus::Failed => order.razorpay_order_id.is_some(),
        OrderStatus::Cancelled => {
            order.razorpay_order_id.is_some()
                && now - order.created_at <= chrono::Duration::hours(CANCELLED_LOOKBACK_HOURS)
        }
        OrderStatus::Paid => false,
    }
}

/// Reconcile open orders against the payment gateway.
///
/// # Errors
///
/// Returns an error if configuration is missing or the order list cannot
/// be loaded. Failures on individual orders are logged and counted.
pub async fn reconcile(stale_after_minutes: u32) -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let supabase_config = SupabaseConfig::from_env()?;
    if supabase_config.service_role_key.is_none() {
        return Err("SUPABASE_SERVICE_ROLE_KEY not set".into());
    }
    let supabase = SupabaseClient::new(&supabase_config, CACHE_TTL)?;
    let razorpay = RazorpayClient::new(&RazorpayConfig::from_env()?)?;
    let checkout = CheckoutService::new(&supabase, &razorpay);

    let stale_after = chrono::Duration::minutes(i64::from(stale_after_minutes));
    let now = Utc::now();

    let orders: Vec<Order> = supabase
        .orders_with_status(&[
            OrderStatus::Pending,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ])
        .await?
        .into_iter()
        .filter(|order| needs_check(order, now))
        .collect();

    info!(orders = orders.len(), stale_after_minutes, "Reconciling orders");

    let mut tally = ReconcileTally::default();
    for order in &orders {
        match checkout.reconcile(order, stale_after, now).await {
            Ok(outcome) => tally.record(&outcome),
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Failed to reconcile order");
                tally.errors += 1;
            }
        }
    }

    info!("Reconciliation complete!");
    info!("  Marked paid: {}", tally.paid);
    info!("  Marked failed: {}", tally.failed);
    info!("  Unchanged: {}", tally.unchanged);
    if tally.needs_refund > 0 {
        error!("  Paid after cancel (refund needed): {}", tally.needs_refund);
    }

    if tally.errors > 0 {
        error!("  Errors: {}", tally.errors);
        return Err(format!("{} orders could not be reconciled", tally.errors).into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_records_outcomes() {
        let mut tally = ReconcileTally::default();
        tally.record(&ReconcileOutcome::Paid {
            payment_id: "pay_1".to_string(),
        });
        tally.record(&ReconcileOutcome::Failed);
        tally.record(&ReconcileOutcome::Unchanged);
        tally.record(&ReconcileOutcome::Unchanged);
        tally.record(&ReconcileOutcome::PaidAfterCancel {
            payment_id: "pay_2".to_string(),
        });

        assert_eq!(
            tally,
            ReconcileTally {
                paid: 1,
                failed: 1,
                unchanged: 2,
                needs_refund: 1,
                errors: 0,
            }
        );
    }
}
