// src/billing/mod.rs

//! Pro subscription: entitlement ledger, gateway signatures and the
//! payment webhook.

pub mod entitlement;
pub mod signature;
pub mod webhook;
