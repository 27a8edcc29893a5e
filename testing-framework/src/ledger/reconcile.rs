//! Receipt reconciliation for mutations with an unknown outcome
//!
//! A mutation that timed out may still reach consensus. Instead of assuming
//! either outcome, the receipt of the same transaction id is queried and
//! decides the result.

use log::{info, warn};
use std::future::Future;

use super::{LedgerClient, LedgerError, Status, TransactionId, TransactionReceipt};

/// Await a mutation and reconcile indeterminate failures by receipt query
///
/// - `Ok` receipts are returned as-is.
/// - Timeouts and transport errors trigger a receipt lookup for
///   `transaction_id`: a `SUCCESS` receipt becomes `Ok`, any other status
///   becomes [`LedgerError::Rejected`], and a missing receipt returns the
///   original error.
/// - Every other error is returned untouched.
pub async fn submit_reconciled<F>(
    client: &dyn LedgerClient,
    transaction_id: TransactionId,
    mutation: F,
) -> Result<TransactionReceipt, LedgerError>
where
    F: Future<Output = Result<TransactionReceipt, LedgerError>>,
{
    let error = match mutation.await {
        Ok(receipt) => return Ok(receipt),
        Err(e) if e.is_indeterminate() => e,
        Err(e) => return Err(e),
    };

    warn!(
        "Transaction {} outcome unknown ({}), querying receipt",
        transaction_id, error
    );

    match client.get_receipt(&transaction_id).await {
        Ok(receipt) if receipt.status.is_success() => {
            info!("Transaction {} reconciled as SUCCESS", transaction_id);
            Ok(receipt)
        }
        Ok(receipt) => {
            info!(
                "Transaction {} reconciled as {}",
                transaction_id, receipt.status
            );
            Err(LedgerError::Rejected {
                transaction_id,
                status: receipt.status,
            })
        }
        Err(LedgerError::PrecheckFailed(Status::ReceiptNotFound)) => {
            info!("Transaction {} never reached the network", transaction_id);
            Err(error)
        }
        Err(lookup) => {
            warn!(
                "Receipt lookup for {} failed: {}",
                transaction_id, lookup
            );
            Err(error)
        }
    }
}
