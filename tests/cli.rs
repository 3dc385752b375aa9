use anyhow::{Context, Result, ensure};
use std::path::Path;

use test_support::{CaseClass, load_cases, normalize_output, run_binary};

fn binary() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_tinyc"))
}

#[test]
fn binary_exit_codes_match_fixtures() -> Result<()> {
    for case in load_cases(Path::new("tests/programs"))? {
        let output = run_binary(binary(), &case.source()?)?;
        ensure!(
            output.exit_code == Some(case.spec.expected.exit_code),
            "Case {} exited with {:?}, expected {}",
            case.name,
            output.exit_code,
            case.spec.expected.exit_code
        );

        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                ensure!(
                    output.stdout.contains("\nTree:\nprogram\n"),
                    "Case {} printed no tree",
                    case.name
                );
                ensure!(
                    output.stdout.contains("\nBytecode:\n["),
                    "Case {} printed no bytecode",
                    case.name
                );
            }
            CaseClass::FrontendError => {
                let expected_file = case
                    .spec
                    .expected
                    .error_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing error_contains_file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let last_line = normalize_output(&output.stdout)
                    .lines()
                    .last()
                    .unwrap_or_default()
                    .to_string();
                ensure!(
                    last_line.contains(expected_error.trim()),
                    "Case {} printed '{last_line}'",
                    case.name
                );
                ensure!(
                    !output.stdout.contains("Bytecode:"),
                    "Case {} dumped bytecode despite failing",
                    case.name
                );
            }
        }
    }
    Ok(())
}

#[test]
fn dumps_tokens_tree_and_bytecode() -> Result<()> {
    let output = run_binary(binary(), "a = 1;")?;
    assert_eq!(output.exit_code, Some(0));
    let expected = "Tokens:\n  identifier a\n  =\n  number 1\n  ;\n  eof\n\
        Tree:\nprogram\n  expression\n    assign\n      variable a\n      constant 1\n\
        Bytecode:\n[2, 63, 240, 0, 0, 0, 0, 0, 0, 1, 0, 3, 10]";
    assert_eq!(normalize_output(&output.stdout), expected);
    Ok(())
}

#[test]
fn lexical_errors_are_labelled() -> Result<()> {
    let output = run_binary(binary(), "{ a = 1 @ 2; }")?;
    assert_eq!(output.exit_code, Some(1));
    assert!(
        output
            .stdout
            .contains("Lexer error: Unexpected character '@' at line 1, column 8")
    );
    Ok(())
}

#[test]
fn syntax_errors_are_labelled() -> Result<()> {
    let output = run_binary(binary(), "{ a = 1; ")?;
    assert_eq!(output.exit_code, Some(1));
    let last_line = normalize_output(&output.stdout)
        .lines()
        .last()
        .unwrap_or_default()
        .to_string();
    assert_eq!(
        last_line,
        "Parser error: Expected '}', found end of input at line 1, column 9"
    );
    assert!(!output.stdout.contains("Tree:"));
    Ok(())
}

#[test]
fn invalid_utf8_is_a_lexical_error() -> Result<()> {
    let output = run_binary(binary(), b"a = \"\xff\";".as_slice())?;
    assert_eq!(output.exit_code, Some(1));
    assert!(
        output
            .stdout
            .contains("Lexer error: Source is not valid UTF-8 at line 1, column 5")
    );
    assert!(!output.stdout.contains("Tokens:"));
    Ok(())
}

#[test]
fn excessive_nesting_is_a_syntax_error() -> Result<()> {
    let depth = 10_000;
    let source = format!("a = {}1{};", "(".repeat(depth), ")".repeat(depth));
    let output = run_binary(binary(), &source)?;
    assert_eq!(output.exit_code, Some(1));
    let last_line = normalize_output(&output.stdout)
        .lines()
        .last()
        .unwrap_or_default()
        .to_string();
    assert!(
        last_line.starts_with("Parser error: Nesting deeper than"),
        "unexpected last line '{last_line}'"
    );
    Ok(())
}

#[test]
fn long_blocks_exit_cleanly() -> Result<()> {
    let source = format!("{{ {} }}", "a = a + 1; ".repeat(1_000));
    let output = run_binary(binary(), &source)?;
    assert_eq!(output.exit_code, Some(0));
    assert!(output.stdout.trim_end().ends_with("3, 10]"));
    Ok(())
}
