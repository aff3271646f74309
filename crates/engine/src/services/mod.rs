//! Transactional services. Each public operation runs in one unit of work
//! and publishes its events only after commit.

mod accounts;
mod batches;
mod bulk;
mod ledger;
mod loans;
mod mutual_funds;
mod payments;
mod processor;
mod review;
mod savings;

pub use accounts::{AccountService, NewAccount};
pub use batches::{BatchLine, BatchService};
pub use bulk::{BulkEvent, BulkProgress, BulkRun, BulkSummary};
pub use ledger::{EntryRequest, LedgerService};
pub use loans::LoanService;
pub use mutual_funds::{FundContributions, MutualFundService};
pub use payments::{PaymentReceipt, PaymentService, TransactionDetail};
pub use processor::{LoanProcessor, ProcessSummary};
pub use savings::{SavingsRun, SavingsRunRequest, SavingsService};
