// lib.rs
pub mod aggregate;
pub mod alignment_record;
pub mod bam;
pub mod config;
pub mod faidx;
pub mod fragment;
pub mod histogram;
pub mod output;
pub mod partition;
pub mod queue;
pub mod region;
pub mod rounding;
pub mod target_index;
pub mod worker;
