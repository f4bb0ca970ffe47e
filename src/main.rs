// main.rs - command line front end and interactive REPL

use std::process::ExitCode;

use clap::Parser;
use fforth::{Forth, Signal};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

#[derive(Parser)]
#[command(name = "fforth", about = "Threaded-code Forth virtual machine")]
struct Args {
    /// Startup file: a `.fbc` bytecode image is restored, anything else
    /// is interpreted as source
    file: Option<String>,

    /// Source lines to run after loading; the process exits when done
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    eval: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut forth = Forth::new();

    if let Some(ref file) = args.file {
        if file.to_ascii_lowercase().ends_with(".fbc") {
            if let Err(e) = forth.load_image_file(file) {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        } else {
            match forth.load_source_file(file) {
                Ok(Signal::Bye) => return ExitCode::SUCCESS,
                Ok(Signal::Ok) => {}
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    if !args.eval.is_empty() {
        for line in &args.eval {
            match forth.interpret_line(line) {
                Ok(Signal::Bye) => break,
                Ok(Signal::Ok) | Err(_) => {}
            }
        }
        return ExitCode::SUCCESS;
    }

    repl(&mut forth);
    ExitCode::SUCCESS
}

fn repl(forth: &mut Forth) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            return;
        }
    };

    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".fforth_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if forth.compiling() { ".. " } else { "ok " };
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match forth.interpret_line(&line) {
                    Ok(Signal::Bye) => break,
                    Ok(Signal::Ok) | Err(_) => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
}
