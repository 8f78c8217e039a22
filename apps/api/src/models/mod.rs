pub mod account;
pub mod audit;
pub mod ledger;
