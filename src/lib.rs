//! Distributed prime factorization.
//!
//! A coordinator splits the divisor range `[1, sqrt(n)]` across a fleet of
//! workers, each of which trial-divides its sub-range and streams back any
//! prime factors it finds over a newline-delimited TCP protocol. The
//! coordinator aggregates the partial results and reconciles them into a
//! verified factorization of `n`.

pub mod bigmath;
pub mod coordinator;
pub mod logger;
pub mod protocol;
pub mod worker;
