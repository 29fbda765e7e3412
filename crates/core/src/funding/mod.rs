mod verifier;

pub use verifier::{EligibleEvent, FundingVerifier};
