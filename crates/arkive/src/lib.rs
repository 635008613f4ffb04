//! Command line front end for the arkive archive drivers and the GF texture codec.

pub mod commands;
