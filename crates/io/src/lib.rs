//! Readers for the three coverage sources: the profile file tree, the
//! metadata index, and CSV exports of the index.

pub mod export;
pub mod inventory;
pub mod store;
