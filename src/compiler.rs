// compiler.rs - outer interpreter: directive dispatch, compile mode,
// structured control flow via the compile-time control stack

use std::fmt;

use crate::bytecode::Op;
use crate::image;
use crate::lexer::{Lexer, Tok};
use crate::vm::{Addr, Cell, Forth, CSTACK_DEPTH};

/// What a successfully interpreted line asks the host to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Ok,
    /// `BYE`, `QUIT`, or top-level `EXIT`: leave the session.
    Bye,
}

/// Errors surfaced by the outer interpreter. Each one becomes a single
/// diagnostic line and abandons the current input line; none of them
/// terminate the VM. Faults during execution are not errors (see `vm.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForthError {
    UnknownWord(String),
    CompileOnly(&'static str),
    InterpretOnly(&'static str),
    Mismatched(&'static str),
    DictionaryFull,
    WordTableFull,
    ControlStackFull,
    UnterminatedString,
    ExpectedName(&'static str),
    Io(String),
    Image(String),
}

impl fmt::Display for ForthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ForthError::UnknownWord(tok) => write!(f, "? {}", tok),
            ForthError::CompileOnly(d) => write!(f, "{} only works in a definition", d),
            ForthError::InterpretOnly(d) => write!(f, "{} not allowed in a definition", d),
            ForthError::Mismatched(msg) => write!(f, "{}", msg),
            ForthError::DictionaryFull => write!(f, "dictionary full"),
            ForthError::WordTableFull => write!(f, "word table full"),
            ForthError::ControlStackFull => write!(f, "control stack full"),
            ForthError::UnterminatedString => write!(f, "unterminated string literal"),
            ForthError::ExpectedName(d) => write!(f, "{} expects a name", d),
            ForthError::Io(msg) => write!(f, "i/o error: {}", msg),
            ForthError::Image(msg) => write!(f, "image error: {}", msg),
        }
    }
}

impl std::error::Error for ForthError {}

impl Forth {
    /// Interpret one input line: stream tokens, dispatch directives, and
    /// hand everything else to the compiler. On error, one diagnostic line
    /// goes to the error channel and the rest of the line is abandoned;
    /// the session survives.
    pub fn interpret_line(&mut self, line: &str) -> Result<Signal, ForthError> {
        let mut lexer = Lexer::new(line);
        match self.interpret_tokens(&mut lexer) {
            Err(e) => {
                let msg = e.to_string();
                self.io.write_err_line(&msg);
                Err(e)
            }
            ok => ok,
        }
    }

    fn interpret_tokens(&mut self, lexer: &mut Lexer) -> Result<Signal, ForthError> {
        while let Some(tok) = lexer.next() {
            match tok {
                Tok::Num(n) => self.handle_number(n)?,
                Tok::Word(word) => match word.as_str() {
                    ":" => self.begin_definition(lexer)?,
                    ";" => self.end_definition()?,
                    "IF" => self.compile_if()?,
                    "ELSE" => self.compile_else()?,
                    "THEN" => self.compile_then()?,
                    "DO" => self.compile_do()?,
                    "LOOP" => self.compile_loop()?,
                    "BEGIN" => self.compile_begin()?,
                    "WHILE" => self.compile_while()?,
                    "REPEAT" => self.compile_repeat()?,
                    ".\"" => self.dot_quote(lexer)?,
                    "CONSTANT" => self.define_constant(lexer)?,
                    "VARIABLE" => self.define_variable(lexer)?,
                    "SEE" => self.see(lexer)?,
                    "LIST" => self.list()?,
                    "SAVE" => self.save_source(lexer)?,
                    "LOAD" => {
                        if self.load_source(lexer)? == Signal::Bye {
                            return Ok(Signal::Bye);
                        }
                    }
                    "SAVEB" => self.save_image(lexer)?,
                    "LOADB" => self.load_image(lexer)?,
                    "BYE" | "QUIT" => return Ok(Signal::Bye),
                    "EXIT" => {
                        // Inside a definition EXIT compiles an early
                        // return; at top level it leaves the session.
                        if self.compiling {
                            self.emit_op(Op::Exit)?;
                        } else {
                            return Ok(Signal::Bye);
                        }
                    }
                    _ => self.compile_or_execute(&word)?,
                },
            }
        }
        Ok(Signal::Ok)
    }

    fn handle_number(&mut self, n: Cell) -> Result<(), ForthError> {
        if self.compiling {
            self.emit_op(Op::Lit)?;
            self.emit_cell_operand(n)
        } else {
            self.push(n);
            Ok(())
        }
    }

    /// Compile a call to a known word, or run it on the spot. `I` is
    /// always inlined because its meaning depends on the caller's
    /// return-stack frame.
    fn compile_or_execute(&mut self, word: &str) -> Result<(), ForthError> {
        if word == "I" {
            if self.compiling {
                return self.emit_op(Op::I);
            }
            if self.rp >= 2 {
                self.push(self.rs[self.rp - 1]);
            }
            return Ok(());
        }
        match self.find_word(word).map(|w| w.addr) {
            Some(addr) => {
                if self.compiling {
                    self.emit_op(Op::Call)?;
                    self.emit_addr_operand(addr)
                } else {
                    self.execute(addr);
                    Ok(())
                }
            }
            None => Err(ForthError::UnknownWord(word.to_string())),
        }
    }

    // ========================================================================
    // EMISSION HELPERS
    // ========================================================================

    fn emit_op(&mut self, op: Op) -> Result<(), ForthError> {
        if self.emit_byte(op as u8) {
            Ok(())
        } else {
            Err(ForthError::DictionaryFull)
        }
    }

    fn emit_cell_operand(&mut self, c: Cell) -> Result<(), ForthError> {
        if self.emit_cell(c) {
            Ok(())
        } else {
            Err(ForthError::DictionaryFull)
        }
    }

    fn emit_addr_operand(&mut self, a: Addr) -> Result<(), ForthError> {
        if self.emit_addr(a) {
            Ok(())
        } else {
            Err(ForthError::DictionaryFull)
        }
    }

    fn cpush(&mut self, addr: Addr) -> Result<(), ForthError> {
        if self.csp >= CSTACK_DEPTH {
            return Err(ForthError::ControlStackFull);
        }
        self.cstack[self.csp] = addr;
        self.csp += 1;
        Ok(())
    }

    fn cpop(&mut self, context: &'static str) -> Result<Addr, ForthError> {
        if self.csp == 0 {
            return Err(ForthError::Mismatched(context));
        }
        self.csp -= 1;
        Ok(self.cstack[self.csp])
    }

    fn require_compiling(&self, directive: &'static str) -> Result<(), ForthError> {
        if self.compiling {
            Ok(())
        } else {
            Err(ForthError::CompileOnly(directive))
        }
    }

    fn require_interpreting(&self, directive: &'static str) -> Result<(), ForthError> {
        if self.compiling {
            Err(ForthError::InterpretOnly(directive))
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // DEFINITIONS
    // ========================================================================

    /// `: name` - the word is registered before its body compiles, so
    /// definitions can call themselves.
    fn begin_definition(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let name = lexer.next_name().ok_or(ForthError::ExpectedName(":"))?;
        if !self.add_word(&name, self.here()) {
            return Err(ForthError::WordTableFull);
        }
        self.compiling = true;
        Ok(())
    }

    /// `;` - seals the definition. With unresolved control flow the line
    /// fails and the definition stays open, so a later `;` can finish it.
    /// At top level the stray `EXIT` it emits at `here` is benign.
    fn end_definition(&mut self) -> Result<(), ForthError> {
        if self.csp != 0 {
            self.csp = 0;
            return Err(ForthError::Mismatched("; with unresolved control flow"));
        }
        self.emit_op(Op::Exit)?;
        self.compiling = false;
        Ok(())
    }

    fn define_constant(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        self.require_interpreting("CONSTANT")?;
        let name = lexer
            .next_name()
            .ok_or(ForthError::ExpectedName("CONSTANT"))?;
        let val = self.pop();
        let addr = self.here();
        self.emit_op(Op::Lit)?;
        self.emit_cell_operand(val)?;
        self.emit_op(Op::Exit)?;
        if !self.add_word(&name, addr) {
            return Err(ForthError::WordTableFull);
        }
        Ok(())
    }

    fn define_variable(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        self.require_interpreting("VARIABLE")?;
        let name = lexer
            .next_name()
            .ok_or(ForthError::ExpectedName("VARIABLE"))?;
        let cell_addr = self.here();
        self.emit_cell_operand(0)?;
        let addr = self.here();
        self.emit_op(Op::Lit)?;
        self.emit_cell_operand(cell_addr as Cell)?;
        self.emit_op(Op::Exit)?;
        if !self.add_word(&name, addr) {
            return Err(ForthError::WordTableFull);
        }
        Ok(())
    }

    // ========================================================================
    // CONTROL FLOW
    // ========================================================================

    fn compile_if(&mut self) -> Result<(), ForthError> {
        self.require_compiling("IF")?;
        self.emit_op(Op::BranchIfZero)?;
        self.cpush(self.here())?;
        self.emit_addr_operand(0)
    }

    fn compile_else(&mut self) -> Result<(), ForthError> {
        self.require_compiling("ELSE")?;
        let if_site = self.cpop("ELSE without IF")?;
        self.emit_op(Op::Branch)?;
        let else_site = self.here();
        self.emit_addr_operand(0)?;
        self.patch_addr(if_site, self.here());
        self.cpush(else_site)
    }

    fn compile_then(&mut self) -> Result<(), ForthError> {
        self.require_compiling("THEN")?;
        let site = self.cpop("THEN without IF")?;
        self.patch_addr(site, self.here());
        Ok(())
    }

    fn compile_do(&mut self) -> Result<(), ForthError> {
        self.require_compiling("DO")?;
        self.emit_op(Op::Do)?;
        self.cpush(self.here())
    }

    fn compile_loop(&mut self) -> Result<(), ForthError> {
        self.require_compiling("LOOP")?;
        let head = self.cpop("LOOP without DO")?;
        self.emit_op(Op::Loop)?;
        self.emit_addr_operand(head)
    }

    fn compile_begin(&mut self) -> Result<(), ForthError> {
        self.require_compiling("BEGIN")?;
        self.cpush(self.here())
    }

    fn compile_while(&mut self) -> Result<(), ForthError> {
        self.require_compiling("WHILE")?;
        if self.csp == 0 {
            return Err(ForthError::Mismatched("WHILE without BEGIN"));
        }
        self.emit_op(Op::BranchIfZero)?;
        self.cpush(self.here())?;
        self.emit_addr_operand(0)
    }

    fn compile_repeat(&mut self) -> Result<(), ForthError> {
        self.require_compiling("REPEAT")?;
        let while_site = self.cpop("REPEAT without WHILE")?;
        let begin_addr = self.cpop("REPEAT without BEGIN")?;
        self.emit_op(Op::Branch)?;
        self.emit_addr_operand(begin_addr)?;
        self.patch_addr(while_site, self.here());
        Ok(())
    }

    /// `." text"` - compiled as a branch over the raw string bytes
    /// followed by `LIT addr LIT len TYPE`; printed directly when
    /// interpreting.
    fn dot_quote(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let text = lexer.read_string().ok_or(ForthError::UnterminatedString)?;
        if !self.compiling {
            self.io.write_str(&text);
            return Ok(());
        }
        self.emit_op(Op::Branch)?;
        let skip_site = self.here();
        self.emit_addr_operand(0)?;
        let str_addr = self.here();
        for b in text.bytes() {
            if !self.emit_byte(b) {
                return Err(ForthError::DictionaryFull);
            }
        }
        self.patch_addr(skip_site, self.here());
        self.emit_op(Op::Lit)?;
        self.emit_cell_operand(str_addr as Cell)?;
        self.emit_op(Op::Lit)?;
        self.emit_cell_operand(text.len() as Cell)?;
        self.emit_op(Op::Type)
    }

    // ========================================================================
    // INTROSPECTION AND FILES
    // ========================================================================

    fn see(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let name = lexer.next_name().ok_or(ForthError::ExpectedName("SEE"))?;
        let word = *self
            .find_word(&name)
            .ok_or_else(|| ForthError::UnknownWord(name.clone()))?;
        let mut text = self.decompile_word(&word);
        text.push('\n');
        self.io.write_str(&text);
        Ok(())
    }

    fn list(&mut self) -> Result<(), ForthError> {
        let mut text = String::new();
        for i in self.builtin_count..self.words.len() {
            let word = self.words[i];
            text.push_str(&self.decompile_word(&word));
            text.push('\n');
        }
        self.io.write_str(&text);
        Ok(())
    }

    /// `SAVE <path>` - textual reconstruction of every user-defined word.
    /// A debugging aid: branches that are not the `."` pattern come back
    /// as IF/ELSE/THEN approximations.
    fn save_source(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let path = lexer.next_path().ok_or(ForthError::ExpectedName("SAVE"))?;
        let mut text = String::new();
        for i in self.builtin_count..self.words.len() {
            let word = self.words[i];
            text.push_str(&self.decompile_word(&word));
            text.push('\n');
        }
        self.io
            .write_file(&path, text.as_bytes())
            .map_err(|e| ForthError::Io(format!("{}: {}", path, e)))
    }

    fn load_source(&mut self, lexer: &mut Lexer) -> Result<Signal, ForthError> {
        let path = lexer.next_path().ok_or(ForthError::ExpectedName("LOAD"))?;
        self.load_source_file(&path)
    }

    /// `LOAD` - interpret a source file line by line, stopping at the
    /// first line that fails.
    pub fn load_source_file(&mut self, path: &str) -> Result<Signal, ForthError> {
        let source = self
            .io
            .read_text(path)
            .map_err(|e| ForthError::Io(format!("{}: {}", path, e)))?;
        for line in source.lines() {
            let mut line_lexer = Lexer::new(line);
            if self.interpret_tokens(&mut line_lexer)? == Signal::Bye {
                return Ok(Signal::Bye);
            }
        }
        Ok(Signal::Ok)
    }

    fn save_image(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let path = lexer.next_path().ok_or(ForthError::ExpectedName("SAVEB"))?;
        let data = image::to_bytes(self);
        self.io
            .write_file(&path, &data)
            .map_err(|e| ForthError::Io(format!("{}: {}", path, e)))
    }

    fn load_image(&mut self, lexer: &mut Lexer) -> Result<(), ForthError> {
        let path = lexer.next_path().ok_or(ForthError::ExpectedName("LOADB"))?;
        self.load_image_file(&path)
    }

    /// `LOADB` - restore a bytecode image from a file.
    pub fn load_image_file(&mut self, path: &str) -> Result<(), ForthError> {
        let data = self
            .io
            .read_binary(path)
            .map_err(|e| ForthError::Io(format!("{}: {}", path, e)))?;
        image::from_bytes(self, &data).map_err(|e| ForthError::Image(e.to_string()))
    }
}
