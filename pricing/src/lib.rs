//! Rate and fee arithmetic for the wallet platform.
//!
//! Every naira amount the server charges, forwards upstream, or pays out is
//! computed here, in one place, instead of being re-derived per purchase
//! flow. The crate is pure: no I/O, no clocks, no storage.

pub mod rates;
pub mod types;
