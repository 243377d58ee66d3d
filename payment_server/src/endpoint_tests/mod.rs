mod helpers;
pub mod mocks;
mod payments;
