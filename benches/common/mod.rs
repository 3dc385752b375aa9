#![allow(dead_code)]
use std::fs;

use tinyc::ast::Program;
use tinyc::parser;

pub const WORKLOADS: [(&str, &str); 2] = [
    ("fibonacci", "tests/programs/fibonacci/program.tc"),
    ("nested_loops", "benches/workloads/nested_loops.tc"),
];

pub fn workloads() -> impl Iterator<Item = (&'static str, &'static str)> {
    WORKLOADS.into_iter()
}

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn load_program(path: &str) -> Program {
    let source = load_source(path);
    parser::parse(&source).unwrap_or_else(|err| panic!("parse {path}: {err}"))
}
