// io.rs - replaceable I/O surface

use std::cell::RefCell;
use std::fs;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// Host I/O surface. Every externally visible effect of the VM - character
/// output, key input, diagnostics, and the file traffic of the image and
/// source directives - goes through this trait, so the core can be embedded
/// in hosts without standard streams.
pub trait Io {
    /// Read one byte of input; -1 at end of input.
    fn read_char(&mut self) -> i32;
    fn write_char(&mut self, c: u8);
    fn write_str(&mut self, s: &str);
    /// One diagnostic line on the error channel.
    fn write_err_line(&mut self, msg: &str);
    fn flush(&mut self);
    fn read_text(&mut self, path: &str) -> io::Result<String>;
    fn read_binary(&mut self, path: &str) -> io::Result<Vec<u8>>;
    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()>;
}

/// Default binding: standard streams and the host filesystem.
#[derive(Default)]
pub struct StdIo;

impl Io for StdIo {
    fn read_char(&mut self) -> i32 {
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf) {
            Ok(1) => buf[0] as i32,
            _ => -1,
        }
    }

    fn write_char(&mut self, c: u8) {
        let mut out = io::stdout();
        let _ = out.write_all(&[c]);
        let _ = out.flush();
    }

    fn write_str(&mut self, s: &str) {
        let mut out = io::stdout();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }

    fn write_err_line(&mut self, msg: &str) {
        eprintln!("{}", msg);
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }

    fn read_text(&mut self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read_binary(&mut self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }
}

/// Console capture for embedding and tests: output and diagnostics land in
/// shared string buffers, input is served from a preset byte queue. File
/// traffic still goes to the host filesystem.
pub struct CaptureIo {
    out: Rc<RefCell<String>>,
    err: Rc<RefCell<String>>,
    input: Vec<u8>,
    read_pos: usize,
}

impl CaptureIo {
    /// Returns the surface plus handles to its output and error buffers.
    pub fn new() -> (CaptureIo, Rc<RefCell<String>>, Rc<RefCell<String>>) {
        let out = Rc::new(RefCell::new(String::new()));
        let err = Rc::new(RefCell::new(String::new()));
        let io = CaptureIo {
            out: Rc::clone(&out),
            err: Rc::clone(&err),
            input: Vec::new(),
            read_pos: 0,
        };
        (io, out, err)
    }

    pub fn with_input(mut self, input: &str) -> CaptureIo {
        self.input = input.as_bytes().to_vec();
        self
    }
}

impl Io for CaptureIo {
    fn read_char(&mut self) -> i32 {
        match self.input.get(self.read_pos) {
            Some(&b) => {
                self.read_pos += 1;
                b as i32
            }
            None => -1,
        }
    }

    fn write_char(&mut self, c: u8) {
        self.out.borrow_mut().push(c as char);
    }

    fn write_str(&mut self, s: &str) {
        self.out.borrow_mut().push_str(s);
    }

    fn write_err_line(&mut self, msg: &str) {
        let mut err = self.err.borrow_mut();
        err.push_str(msg);
        err.push('\n');
    }

    fn flush(&mut self) {}

    fn read_text(&mut self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read_binary(&mut self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }
}
