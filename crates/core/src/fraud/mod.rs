mod gate;

pub use gate::{ceiling_cents, FraudGate, RejectReason, TargetDecision};
