mod http;
mod types;

pub use http::HttpInstrumentIssuer;
pub use types::{
    identifying_digest, spend_cap_cents, Instrument, InstrumentDetails, InstrumentIssuer,
    IssuerError,
};
