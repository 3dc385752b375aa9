//! Cross-backend checks over generated programs.
//!
//! Programs are built from a seeded generator restricted to assignment,
//! arithmetic and control flow. Loop counters live in `x`, `y`, `z` and are
//! never assigned by loop bodies, so every generated program terminates.

use anyhow::{Context, Result, ensure};

use crate::backend::{self, Backend};
use crate::bytecode::compile;
use crate::interpreter::Interpreter;
use crate::parser::parse;
use crate::vm::VM;

const DATA_VARIABLES: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];
const LOOP_COUNTERS: [char; 3] = ['x', 'y', 'z'];

/// Small linear congruential generator; reproducible across runs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.below(items.len() as u64) as usize]
    }
}

fn gen_expression(rng: &mut Lcg, depth: usize) -> String {
    if depth == 0 || rng.below(3) == 0 {
        return if rng.below(2) == 0 {
            rng.below(20).to_string()
        } else {
            rng.pick(&DATA_VARIABLES).to_string()
        };
    }
    let left = gen_expression(rng, depth - 1);
    let right = gen_expression(rng, depth - 1);
    match rng.below(4) {
        0 => format!("{left} + {right}"),
        1 => format!("{left} - {right}"),
        2 => format!("(({left}) < ({right}))"),
        _ => format!("({left} - {right})"),
    }
}

fn gen_statement(rng: &mut Lcg, depth: usize, loop_depth: usize) -> String {
    let choice = if depth == 0 { 0 } else { rng.below(6) };
    match choice {
        0 | 1 => {
            let target = rng.pick(&DATA_VARIABLES);
            format!("{target} = {};", gen_expression(rng, 2))
        }
        2 => format!(
            "if ({}) {}",
            gen_expression(rng, 2),
            gen_statement(rng, depth - 1, loop_depth)
        ),
        3 => format!(
            "if ({}) {} else {}",
            gen_expression(rng, 2),
            gen_statement(rng, depth - 1, loop_depth),
            gen_statement(rng, depth - 1, loop_depth)
        ),
        4 if loop_depth < LOOP_COUNTERS.len() => {
            let counter = LOOP_COUNTERS[loop_depth];
            let bound = rng.below(5);
            let body = gen_statement(rng, depth - 1, loop_depth + 1);
            if rng.below(2) == 0 {
                format!(
                    "{{ {counter} = 0; while ({counter} < {bound}) {{ {body} {counter} = {counter} + 1; }} }}"
                )
            } else {
                format!(
                    "{{ {counter} = 0; do {{ {body} {counter} = {counter} + 1; }} while ({counter} < {bound}); }}"
                )
            }
        }
        _ => {
            let count = rng.below(4);
            let body = (0..count)
                .map(|_| gen_statement(rng, depth - 1, loop_depth))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{{ {body} }}")
        }
    }
}

fn generated_programs(count: usize) -> Vec<String> {
    let mut rng = Lcg(0x5eed);
    (0..count).map(|_| gen_statement(&mut rng, 4, 0)).collect()
}

#[test]
fn backends_agree_on_generated_programs() -> Result<()> {
    for source in generated_programs(200) {
        let program = parse(&source).with_context(|| format!("Parsing {source}"))?;
        let expected = Interpreter::new()
            .run(&program)
            .with_context(|| format!("Interpreting {source}"))?;
        for backend in backend::backends() {
            let actual = backend
                .run(&program)
                .with_context(|| format!("Backend {} failed for {source}", backend.name()))?;
            ensure!(
                actual == expected,
                "Backend {} mismatch for {source}: {actual} vs {expected}",
                backend.name()
            );
        }
    }
    Ok(())
}

#[test]
fn parsing_and_compiling_are_deterministic() -> Result<()> {
    for source in generated_programs(50) {
        let first = parse(&source)?;
        let second = parse(&source)?;
        ensure!(first == second, "Parse mismatch for {source}");
        ensure!(
            compile(&first) == compile(&second),
            "Bytecode mismatch for {source}"
        );
    }
    Ok(())
}

#[test]
fn prepared_vm_can_run_repeatedly() -> Result<()> {
    let program = parse("{ a = 1; while (a < 100) a = a + a; }")?;
    let prepared = VM::new().prepare(&program)?;
    let first = prepared.run()?;
    let second = prepared.run()?;
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "a = 128\n");
    Ok(())
}

#[test]
fn backends_handle_long_blocks_and_chains() -> Result<()> {
    let statements = 100_000;
    let source = format!(
        "{{ {} b = {}1; }}",
        "a = a + 1; ".repeat(statements),
        "1 + ".repeat(statements)
    );
    let program = parse(&source)?;
    let expected = format!("a = {statements}\nb = {}\n", statements + 1);
    for backend in backend::backends() {
        let variables = backend
            .run(&program)
            .with_context(|| format!("Backend {} failed on a long block", backend.name()))?;
        ensure!(
            variables.to_string() == expected,
            "Backend {} reported {variables}",
            backend.name()
        );
    }
    Ok(())
}
