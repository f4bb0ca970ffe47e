// decompile.rs - textual reconstruction of compiled words (SEE, LIST, SAVE)

use crate::bytecode::Op;
use crate::vm::{Addr, Cell, Forth, Word, DICT_CAPACITY};

impl Forth {
    fn peek_cell(&self, at: usize) -> Cell {
        if at + 4 <= DICT_CAPACITY {
            Cell::from_le_bytes([
                self.dict[at],
                self.dict[at + 1],
                self.dict[at + 2],
                self.dict[at + 3],
            ])
        } else {
            0
        }
    }

    fn peek_addr(&self, at: usize) -> Addr {
        if at + 2 <= DICT_CAPACITY {
            Addr::from_le_bytes([self.dict[at], self.dict[at + 1]])
        } else {
            0
        }
    }

    /// Reverse lookup for `CALL` operands. Redefinitions can share an
    /// address; the newest entry wins, matching forward lookup.
    fn word_name_at(&self, addr: Addr) -> Option<&str> {
        self.words
            .iter()
            .rev()
            .find(|w| w.addr == addr)
            .map(|w| w.name())
    }

    /// Does the branch at `str_start..target` carry the `."` emission
    /// pattern: raw bytes, then `LIT str_start LIT len TYPE`?
    fn dot_quote_text(&self, str_start: usize, target: usize) -> Option<String> {
        if target < str_start || target + 11 > DICT_CAPACITY {
            return None;
        }
        let len = target - str_start;
        if self.dict[target] != Op::Lit as u8
            || self.peek_cell(target + 1) != str_start as Cell
            || self.dict[target + 5] != Op::Lit as u8
            || self.peek_cell(target + 6) != len as Cell
            || self.dict[target + 10] != Op::Type as u8
        {
            return None;
        }
        Some(String::from_utf8_lossy(&self.dict[str_start..target]).into_owned())
    }

    /// Render one word body back to surface syntax.
    ///
    /// `0BRANCH` comes back as `IF` and its target earns a `THEN` when the
    /// walk reaches it; a forward `BRANCH` inside an open `IF` becomes
    /// `ELSE`. The `."` pattern is re-emitted exactly. Any other branch
    /// also renders as `ELSE`, which loses `BEGIN`/`WHILE`/`REPEAT` - the
    /// output is a debugging aid, not a faithful round-trip.
    pub fn decompile_word(&self, word: &Word) -> String {
        let mut out = format!(": {} ", word.name());
        let mut pending: Vec<usize> = Vec::new();
        let mut pc = word.addr as usize;
        loop {
            while let Some(i) = pending.iter().rposition(|&t| t == pc) {
                out.push_str("THEN ");
                pending.remove(i);
            }
            if pc >= DICT_CAPACITY {
                break;
            }
            let byte = self.dict[pc];
            pc += 1;
            let op = match Op::from_byte(byte) {
                Some(op) => op,
                None => break,
            };
            match op {
                Op::Exit => break,
                Op::Lit => {
                    let val = self.peek_cell(pc);
                    pc += 4;
                    out.push_str(&format!("{} ", val));
                }
                Op::Call => {
                    let target = self.peek_addr(pc);
                    pc += 2;
                    match self.word_name_at(target) {
                        Some(name) => out.push_str(&format!("{} ", name)),
                        None => out.push_str(&format!("CALL({}) ", target)),
                    }
                }
                Op::BranchIfZero => {
                    let target = self.peek_addr(pc) as usize;
                    pc += 2;
                    out.push_str("IF ");
                    if target > pc {
                        pending.push(target);
                    }
                }
                Op::Branch => {
                    let target = self.peek_addr(pc) as usize;
                    pc += 2;
                    if let Some(text) = self.dot_quote_text(pc, target) {
                        out.push_str(&format!(".\" {}\" ", text));
                        pc = target + 11;
                        continue;
                    }
                    out.push_str("ELSE ");
                    if target > pc {
                        // Retarget the open IF's THEN past the else arm.
                        match pending.last_mut() {
                            Some(last) => *last = target,
                            None => pending.push(target),
                        }
                    }
                }
                Op::Do => out.push_str("DO "),
                Op::Loop => {
                    pc += 2;
                    out.push_str("LOOP ");
                }
                _ => {
                    out.push_str(op.name());
                    out.push(' ');
                }
            }
        }
        out.push(';');
        out
    }
}
