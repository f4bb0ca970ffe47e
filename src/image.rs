// image.rs - binary dictionary image (SAVEB / LOADB)
//
// Layout, little-endian throughout:
//
//   offset  size           field
//   0       4              magic "FTTH" (0x46545448)
//   4       2              version (1)
//   6       2              here
//   8       4              word_count
//   12      4              builtin_count
//   16      here           arena prefix
//   16+here word_count*20  word entries: 16 name bytes (NUL-terminated),
//                          2 address bytes, 1 flag byte, 1 zero pad byte

use std::io;

use crate::vm::{Addr, Forth, Word, DICT_CAPACITY, MAX_WORDS, NAME_MAX};

const MAGIC: u32 = 0x4654_5448;
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 16;
const ENTRY_SIZE: usize = 20;

fn bad(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn rd_u16le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn rd_u32le(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Serialize the arena prefix `[0, here)` plus the full word table.
pub fn to_bytes(vm: &Forth) -> Vec<u8> {
    let here = vm.here as usize;
    let mut out = Vec::with_capacity(HEADER_SIZE + here + vm.words.len() * ENTRY_SIZE);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&vm.here.to_le_bytes());
    out.extend_from_slice(&(vm.words.len() as u32).to_le_bytes());
    out.extend_from_slice(&(vm.builtin_count as u32).to_le_bytes());
    out.extend_from_slice(&vm.dict[..here]);
    for w in &vm.words {
        out.extend_from_slice(&w.name);
        out.extend_from_slice(&w.addr.to_le_bytes());
        out.push(w.flags);
        out.push(0);
    }
    out
}

/// Validate and restore an image. Everything is parsed into scratch values
/// first and swapped in only once the whole payload checks out, so a failed
/// load leaves the VM untouched.
pub fn from_bytes(vm: &mut Forth, data: &[u8]) -> io::Result<()> {
    if data.len() < HEADER_SIZE {
        return Err(bad("truncated header"));
    }
    if rd_u32le(data, 0) != MAGIC {
        return Err(bad("bad magic"));
    }
    if rd_u16le(data, 4) != VERSION {
        return Err(bad("unsupported version"));
    }
    let here = rd_u16le(data, 6) as usize;
    let word_count = rd_u32le(data, 8) as usize;
    let builtin_count = rd_u32le(data, 12) as usize;
    if here > DICT_CAPACITY {
        return Err(bad("dictionary larger than capacity"));
    }
    if word_count > MAX_WORDS {
        return Err(bad("too many words"));
    }
    if builtin_count > word_count {
        return Err(bad("builtin count exceeds word count"));
    }
    let expected = HEADER_SIZE + here + word_count * ENTRY_SIZE;
    if data.len() != expected {
        return Err(bad("payload length mismatch"));
    }

    let mut words = Vec::with_capacity(word_count);
    let mut at = HEADER_SIZE + here;
    for _ in 0..word_count {
        let mut name = [0u8; NAME_MAX + 1];
        name.copy_from_slice(&data[at..at + NAME_MAX + 1]);
        // The final name byte is the NUL guard; never a name character.
        name[NAME_MAX] = 0;
        let addr = rd_u16le(data, at + NAME_MAX + 1);
        if addr as usize >= DICT_CAPACITY {
            return Err(bad("word address out of range"));
        }
        let flags = data[at + NAME_MAX + 3];
        words.push(Word { name, addr, flags });
        at += ENTRY_SIZE;
    }

    vm.dict = [0; DICT_CAPACITY];
    vm.dict[..here].copy_from_slice(&data[HEADER_SIZE..HEADER_SIZE + here]);
    vm.here = here as Addr;
    vm.words = words;
    vm.builtin_count = builtin_count;
    vm.compiling = false;
    vm.csp = 0;
    Ok(())
}
