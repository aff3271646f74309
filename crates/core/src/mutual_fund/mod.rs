//! Mutual fund contributions.
//!
//! When a member dies the branch raises a fund from the other enrolled
//! members. Generation computes each member's contribution under the
//! fund's rule; posting a printed fund debits every contributor.

pub mod compute;
pub mod error;
pub mod types;

pub use compute::{contribution, generate_entries, is_eligible, plan_post, total_amount, Contributor};
pub use error::MutualFundError;
pub use types::{
    MutualFund, MutualFundAdditionalMember, MutualFundComputationType, MutualFundEntry,
    MutualFundTable,
};
