#[allow(non_snake_case)]
pub mod Ingest;
#[allow(non_snake_case)]
pub mod Sorption;
#[allow(non_snake_case)]
pub mod Utils;
pub mod cli;
