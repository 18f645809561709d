//! Driver-level tests: flag semantics, exit codes, and stderr rendering.

use assert_cmd::Command;
use predicates::prelude::*;

fn c99cc() -> Command {
    Command::cargo_bin("c99cc").expect("binary builds")
}

#[test]
fn compile_only_emits_an_ir_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("ok.c");
    std::fs::write(&src, "int main() { return 7; }\n").unwrap();
    let out = dir.path().join("ok.ir");

    c99cc()
        .arg("-c")
        .arg(&src)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("define i32 @main()"));
    assert!(text.contains("ret i32 7"));
}

#[test]
fn compile_only_defaults_to_the_input_stem() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("prog.c");
    std::fs::write(&src, "int main() { return 0; }\n").unwrap();

    c99cc().arg("-c").arg(&src).assert().success();

    assert!(dir.path().join("prog.ir").exists());
}

#[test]
fn semantic_errors_render_with_a_caret() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.c");
    std::fs::write(&src, "int main() { int y = y; return 0; }\n").unwrap();

    c99cc()
        .arg("-c")
        .arg(&src)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("use of undeclared identifier 'y'"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn syntax_errors_point_at_line_and_column() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.c");
    std::fs::write(&src, "int main() { return 1 }\n").unwrap();

    c99cc()
        .arg("-c")
        .arg(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains(":1:23: error: expected ';'"));
}

#[test]
fn preprocessor_errors_abort_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.c");
    std::fs::write(&src, "#include \"missing.h\"\nint main() { return 0; }\n").unwrap();

    c99cc()
        .arg("-c")
        .arg(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("include file not found: missing.h"));
}

#[test]
fn output_with_compile_only_rejects_multiple_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.c");
    let b = dir.path().join("b.c");
    std::fs::write(&a, "int main() { return 0; }\n").unwrap();
    std::fs::write(&b, "int other() { return 0; }\n").unwrap();

    c99cc()
        .arg("-c")
        .arg(&a)
        .arg(&b)
        .arg("-o")
        .arg(dir.path().join("out.ir"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "-o with -c requires a single input file",
        ));
}

#[test]
fn linking_mode_requires_a_main_function() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("lib.c");
    std::fs::write(&src, "int helper() { return 1; }\n").unwrap();

    c99cc()
        .arg(&src)
        .arg("-o")
        .arg(dir.path().join("a.out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no 'main' function defined"));
}

#[test]
fn linking_mode_hands_off_the_combined_module() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("prog.c");
    std::fs::write(&src, "int main() { return 3; }\n").unwrap();
    let out = dir.path().join("a.out");

    c99cc().arg(&src).arg("-o").arg(&out).assert().success();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("define i32 @main()"));
}

#[test]
fn include_directories_are_searched() {
    let dir = tempfile::tempdir().unwrap();
    let inc = dir.path().join("inc");
    std::fs::create_dir(&inc).unwrap();
    std::fs::write(inc.join("answer.h"), "#define ANSWER 42\n").unwrap();
    let src = dir.path().join("prog.c");
    std::fs::write(&src, "#include <answer.h>\nint main() { return ANSWER; }\n").unwrap();
    let out = dir.path().join("prog.ir");

    // -I<dir> attached form
    c99cc()
        .arg("-c")
        .arg(&src)
        .arg(format!("-I{}", inc.display()))
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&out).unwrap().contains("ret i32 42"));

    // -isystem spelling
    c99cc()
        .arg("-c")
        .arg(&src)
        .arg("-isystem")
        .arg(&inc)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
}

#[test]
fn missing_input_file_is_a_driver_error() {
    c99cc()
        .arg("-c")
        .arg("does-not-exist.c")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn no_arguments_at_all_exits_one() {
    c99cc().assert().failure().code(1);
}

#[test]
fn missing_value_after_include_flag_exits_one() {
    c99cc().arg("a.c").arg("-I").assert().failure().code(1);
}

#[test]
fn unknown_flag_exits_one() {
    c99cc()
        .arg("a.c")
        .arg("--bogus")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
}

#[test]
fn help_and_version_exit_zero() {
    c99cc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
    c99cc().arg("--version").assert().success();
}
