//! Service layer: matching, account/settlement, wallet, admin and market
//! data fanout.

pub mod account;
pub mod admin;
pub mod market_data;
pub mod matching;
pub mod wallet;
