#![allow(dead_code)]

pub mod nexus_server;
