//! Teller deposits, withdrawals and payments.

pub mod error;
pub mod rules;
pub mod types;

pub use error::PaymentError;
pub use rules::{
    effective_member, normalize, plan_payment, resolve_direction, NormalizedAmount,
    PaymentContext, PaymentPlan,
};
pub use types::{PaymentRequest, PaymentSource, PaymentType, TellerSetting, TellerTransaction};
