//! Linear cryptanalysis of the 6-round Heys cipher: branch-and-bound
//! approximation search composed with Matsui's Algorithm 2 key ranking.

pub mod approximations;
pub mod bits;
pub mod branch_bound;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod heys;
pub mod m2;
pub mod options;
pub mod sbox;
pub mod tables;
