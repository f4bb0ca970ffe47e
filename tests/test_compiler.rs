use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use fforth::{CaptureIo, Forth, ForthError, Signal};

fn capture_forth() -> (Forth, Rc<RefCell<String>>, Rc<RefCell<String>>) {
    let (io, out, err) = CaptureIo::new();
    (Forth::with_io(Box::new(io)), out, err)
}

fn run(forth: &mut Forth, lines: &[&str]) {
    for line in lines {
        forth.interpret_line(line).unwrap();
    }
}

fn output_of(lines: &[&str]) -> String {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, lines);
    let result = out.borrow().clone();
    result
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fforth_test_{}_{}", std::process::id(), name))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_add_and_print() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &["3 4 + ."]);
    assert_eq!(out.borrow().as_str(), "7 ");
    assert_eq!(forth.depth(), 0);
}

#[test]
fn test_square_word() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": SQ DUP * ; 5 SQ ."]);
    assert_eq!(out.borrow().as_str(), "25 ");
    assert_eq!(forth.depth(), 0);
}

#[test]
fn test_counted_loop() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": COUNTDOWN 0 DO I . LOOP ; 5 COUNTDOWN"]);
    assert_eq!(out.borrow().as_str(), "0 1 2 3 4 ");
    assert_eq!(forth.depth(), 0);
}

#[test]
fn test_recursive_factorial() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[
        ": FACT DUP 1 > IF DUP 1 - FACT * ELSE DROP 1 THEN ;",
        "10 FACT .",
    ]);
    assert_eq!(out.borrow().as_str(), "3628800 ");
    assert_eq!(forth.depth(), 0);
}

#[test]
fn test_variable_counter() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[
        "VARIABLE C 0 C !",
        ": BUMP C @ 1 + C ! ;",
        "BUMP BUMP BUMP C @ .",
    ]);
    assert_eq!(out.borrow().as_str(), "3 ");
    assert_eq!(forth.depth(), 0);
}

#[test]
fn test_recursive_gcd() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[
        ": GCD DUP 0= IF DROP ELSE SWAP OVER MOD GCD THEN ;",
        "48 18 GCD .",
    ]);
    assert_eq!(out.borrow().as_str(), "6 ");
    assert_eq!(forth.depth(), 0);
}

// ============================================================================
// COMPILATION
// ============================================================================

#[test]
fn test_number_parse_idempotence() {
    // Immediate and compiled paths push the same value.
    let (mut forth, _out, _err) = capture_forth();
    run(&mut forth, &["7"]);
    assert_eq!(forth.stack(), &[7]);
    run(&mut forth, &["CLEAR", ": N7 7 ;", "N7"]);
    assert_eq!(forth.stack(), &[7]);
}

#[test]
fn test_case_insensitive_lookup() {
    assert_eq!(output_of(&[": sq dup * ;", "5 Sq ."]), "25 ");
}

#[test]
fn test_redefinition_shadows() {
    assert_eq!(output_of(&[": F 1 ;", ": F 2 ;", "F ."]), "2 ");
}

#[test]
fn test_old_callers_keep_old_definition() {
    assert_eq!(
        output_of(&[": F 1 ;", ": G F ;", ": F 2 ;", "G . F ."]),
        "1 2 "
    );
}

#[test]
fn test_definition_spans_lines() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": ADD2", "2 +", ";", "5 ADD2 ."]);
    assert_eq!(out.borrow().as_str(), "7 ");
}

#[test]
fn test_compiling_flag_tracks_definition() {
    let (mut forth, _out, _err) = capture_forth();
    run(&mut forth, &[": HALF"]);
    assert!(forth.compiling());
    run(&mut forth, &["2 / ;"]);
    assert!(!forth.compiling());
}

#[test]
fn test_stray_semicolon_is_benign() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[";", "3 4 + ."]);
    assert_eq!(out.borrow().as_str(), "7 ");
}

#[test]
fn test_nested_calls() {
    assert_eq!(
        output_of(&[": DOUBLE 2 * ;", ": QUAD DOUBLE DOUBLE ;", "5 QUAD ."]),
        "20 "
    );
}

#[test]
fn test_long_names_truncate_consistently() {
    // Both the definition and the lookup clip to fifteen bytes.
    assert_eq!(
        output_of(&[": ABCDEFGHIJKLMNOPQR 9 ;", "ABCDEFGHIJKLMNOXYZ ."]),
        "9 "
    );
}

// ============================================================================
// CONTROL FLOW
// ============================================================================

#[test]
fn test_if_then() {
    assert_eq!(output_of(&[": T IF 1 ELSE 2 THEN . ;", "-1 T", "0 T"]), "1 2 ");
}

#[test]
fn test_if_without_else() {
    assert_eq!(output_of(&[": T IF 42 . THEN ;", "1 T", "0 T"]), "42 ");
}

#[test]
fn test_nested_if() {
    let lines = [
        ": CLASS DUP 0 > IF DUP 10 > IF DROP 2 ELSE DROP 1 THEN ELSE DROP 0 THEN ;",
        "15 CLASS .",
        "5 CLASS .",
        "-3 CLASS .",
    ];
    assert_eq!(output_of(&lines), "2 1 0 ");
}

#[test]
fn test_begin_while_repeat() {
    assert_eq!(
        output_of(&[
            ": COUNT BEGIN DUP 0 > WHILE DUP . 1 - REPEAT DROP ;",
            "3 COUNT",
        ]),
        "3 2 1 "
    );
}

#[test]
fn test_loop_runs_zero_times_when_index_reaches_limit() {
    assert_eq!(output_of(&[": T 3 0 DO I . LOOP ;", "T"]), "0 1 2 ");
}

#[test]
fn test_nested_loops_inline_i() {
    // I always reads the innermost frame.
    assert_eq!(
        output_of(&[": T 2 0 DO 2 0 DO I . LOOP LOOP ;", "T"]),
        "0 1 0 1 "
    );
}

#[test]
fn test_exit_compiles_early_return() {
    assert_eq!(output_of(&[": T 1 . EXIT 2 . ;", "T"]), "1 ");
}

#[test]
fn test_dot_quote_compiled() {
    assert_eq!(output_of(&[": GREET .\" hello\" ;", "GREET"]), "hello");
}

#[test]
fn test_dot_quote_immediate() {
    assert_eq!(output_of(&[".\" hi there\""]), "hi there");
}

#[test]
fn test_dot_quote_mixes_with_code() {
    assert_eq!(
        output_of(&[": T .\" n=\" . ;", "42 T"]),
        "n=42 "
    );
}

// ============================================================================
// CONSTANT AND VARIABLE
// ============================================================================

#[test]
fn test_constant() {
    assert_eq!(output_of(&["42 CONSTANT ANSWER", "ANSWER ."]), "42 ");
}

#[test]
fn test_constant_usable_in_definitions() {
    assert_eq!(
        output_of(&["6 CONSTANT SIX", ": T SIX 7 * ;", "T ."]),
        "42 "
    );
}

#[test]
fn test_two_variables_are_distinct() {
    assert_eq!(
        output_of(&["VARIABLE A", "VARIABLE B", "1 A !", "2 B !", "A @ . B @ ."]),
        "1 2 "
    );
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_unknown_word_reports() {
    let (mut forth, _out, err) = capture_forth();
    let result = forth.interpret_line("FROB");
    assert_eq!(result, Err(ForthError::UnknownWord("FROB".to_string())));
    assert_eq!(err.borrow().as_str(), "? FROB\n");
}

#[test]
fn test_if_outside_definition() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line("1 IF 2 THEN"),
        Err(ForthError::CompileOnly("IF"))
    );
}

#[test]
fn test_then_without_if() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line(": X THEN ;"),
        Err(ForthError::Mismatched("THEN without IF"))
    );
}

#[test]
fn test_loop_without_do() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line(": X LOOP ;"),
        Err(ForthError::Mismatched("LOOP without DO"))
    );
}

#[test]
fn test_unterminated_string_literal() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line(": X .\" oops"),
        Err(ForthError::UnterminatedString)
    );
}

#[test]
fn test_constant_inside_definition_rejected() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line(": X CONSTANT Y ;"),
        Err(ForthError::InterpretOnly("CONSTANT"))
    );
}

#[test]
fn test_semicolon_with_open_control_flow() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(
        forth.interpret_line(": X 1 IF ;"),
        Err(ForthError::Mismatched("; with unresolved control flow"))
    );
    // The definition stays open; a later ; can close it.
    assert!(forth.compiling());
    forth.interpret_line(";").unwrap();
    assert!(!forth.compiling());
}

#[test]
fn test_session_survives_errors() {
    let (mut forth, out, _err) = capture_forth();
    let _ = forth.interpret_line("FROB");
    run(&mut forth, &["3 4 + ."]);
    assert_eq!(out.borrow().as_str(), "7 ");
}

#[test]
fn test_error_aborts_rest_of_line() {
    let (mut forth, out, _err) = capture_forth();
    let _ = forth.interpret_line("FROB 9 .");
    assert_eq!(out.borrow().as_str(), "");
    assert_eq!(forth.depth(), 0);
}

// ============================================================================
// SIGNALS
// ============================================================================

#[test]
fn test_bye_and_quit_signal_exit() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(forth.interpret_line("BYE"), Ok(Signal::Bye));
    assert_eq!(forth.interpret_line("QUIT"), Ok(Signal::Bye));
    assert_eq!(forth.interpret_line("EXIT"), Ok(Signal::Bye));
}

#[test]
fn test_plain_line_signals_ok() {
    let (mut forth, _out, _err) = capture_forth();
    assert_eq!(forth.interpret_line("1 2 +"), Ok(Signal::Ok));
}

// ============================================================================
// DECOMPILATION
// ============================================================================

#[test]
fn test_see_simple_word() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": SQ DUP * ;", "SEE SQ"]);
    assert_eq!(out.borrow().as_str(), ": SQ DUP * ;\n");
}

#[test]
fn test_see_literals_and_calls() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": DOUBLE 2 * ;", ": QUAD DOUBLE DOUBLE ;", "SEE QUAD"]);
    assert_eq!(out.borrow().as_str(), ": QUAD DOUBLE DOUBLE ;\n");
}

#[test]
fn test_see_if_else_then() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": T DUP IF 1 ELSE 2 THEN ;", "SEE T"]);
    assert_eq!(out.borrow().as_str(), ": T DUP IF 1 ELSE 2 THEN ;\n");
}

#[test]
fn test_see_loop() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": T 0 DO I . LOOP ;", "SEE T"]);
    assert_eq!(out.borrow().as_str(), ": T 0 DO I . LOOP ;\n");
}

#[test]
fn test_see_dot_quote() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": G .\" hi\" ;", "SEE G"]);
    assert_eq!(out.borrow().as_str(), ": G .\" hi\" ;\n");
}

#[test]
fn test_see_reconstruction_recompiles() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": T DUP IF 1+ ELSE 1- THEN ;", "SEE T"]);
    let text = out.borrow().clone();
    let line = text.trim_end().to_string();
    // Feed the reconstruction back in; it must compile and behave.
    let (mut fresh, out2, _err2) = capture_forth();
    run(&mut fresh, &[&line, "5 T .", "0 T ."]);
    assert_eq!(out2.borrow().as_str(), "6 -1 ");
}

#[test]
fn test_list_shows_user_words_only() {
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[": A 1 ;", ": B 2 ;", "LIST"]);
    assert_eq!(out.borrow().as_str(), ": A 1 ;\n: B 2 ;\n");
}

// ============================================================================
// FILES
// ============================================================================

#[test]
fn test_load_source_file() {
    let path = temp_path("load.fth");
    std::fs::write(&path, ": TRIPLE 3 * ;\n9 TRIPLE .\n").unwrap();
    let (mut forth, out, _err) = capture_forth();
    run(&mut forth, &[&format!("LOAD {}", path.display())]);
    assert_eq!(out.borrow().as_str(), "27 ");
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_load_missing_file_reports() {
    let (mut forth, _out, err) = capture_forth();
    let result = forth.interpret_line("LOAD /no/such/file.fth");
    assert!(matches!(result, Err(ForthError::Io(_))));
    assert!(err.borrow().contains("i/o error"));
}

#[test]
fn test_save_source_writes_definitions() {
    let path = temp_path("save.fth");
    let (mut forth, _out, _err) = capture_forth();
    run(&mut forth, &[
        ": SQ DUP * ;",
        &format!("SAVE {}", path.display()),
    ]);
    let saved = std::fs::read_to_string(&path).unwrap();
    assert_eq!(saved, ": SQ DUP * ;\n");
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_saved_source_reloads() {
    let path = temp_path("reload.fth");
    let (mut forth, _out, _err) = capture_forth();
    run(&mut forth, &[
        ": SQ DUP * ;",
        &format!("SAVE {}", path.display()),
    ]);
    let (mut fresh, out, _err2) = capture_forth();
    run(&mut fresh, &[&format!("LOAD {}", path.display()), "7 SQ ."]);
    assert_eq!(out.borrow().as_str(), "49 ");
    std::fs::remove_file(&path).ok();
}
