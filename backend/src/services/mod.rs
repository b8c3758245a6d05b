pub mod categories;
pub mod ledger;
pub mod period;
pub mod retention;
pub mod status;
pub mod tasks;
