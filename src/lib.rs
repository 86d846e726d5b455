//! Converts banner-prefixed CSV inventories of archival records into
//! ISAD(G)-aligned CSV and XLSX files, with model-assisted repair of
//! missing titles and irregular date strings.

pub mod config;
pub mod convert;
pub mod export;
pub mod model;
pub mod table;
