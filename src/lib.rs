pub mod error;
pub mod index;
pub mod k8s;
pub mod recycle_bin;
