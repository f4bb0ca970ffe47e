// bytecode.rs - threaded-code instruction set

/// Single place defining every opcode: its byte value and its canonical
/// surface spelling. Generates the enum, the byte decoder used by the
/// inner interpreter, and the name table used by the decompiler.
macro_rules! opcodes {
    (
        $(
            $variant:ident = $value:literal => $name:literal
        ),* $(,)?
    ) => {
        /// Bytecode operation. `Exit` is opcode zero so that execution
        /// falling into zero-initialized arena space unwinds instead of
        /// running away.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Op {
            $(
                $variant = $value,
            )*
        }

        impl Op {
            /// Decode one dictionary byte. `None` marks a corrupted arena.
            pub fn from_byte(b: u8) -> Option<Op> {
                match b {
                    $(
                        $value => Some(Op::$variant),
                    )*
                    _ => None,
                }
            }

            /// Canonical surface spelling, as re-emitted by the decompiler.
            pub fn name(self) -> &'static str {
                match self {
                    $(
                        Op::$variant => $name,
                    )*
                }
            }
        }
    };
}

opcodes! {
    // Control
    Exit = 0 => "EXIT",
    Lit = 1 => "LIT",
    Call = 2 => "CALL",
    // Arithmetic
    Add = 3 => "+",
    Sub = 4 => "-",
    Mul = 5 => "*",
    Div = 6 => "/",
    // Data stack
    Dup = 7 => "DUP",
    Drop = 8 => "DROP",
    Swap = 9 => "SWAP",
    Over = 10 => "OVER",
    Dot = 11 => ".",
    // Bitwise
    And = 12 => "AND",
    Or = 13 => "OR",
    Xor = 14 => "XOR",
    Not = 15 => "NOT",
    // Comparison
    Lt = 16 => "<",
    Gt = 17 => ">",
    Eq = 18 => "=",
    // Branches
    Branch = 19 => "BRANCH",
    BranchIfZero = 20 => "0BRANCH",
    // Counted loop
    Do = 21 => "DO",
    Loop = 22 => "LOOP",
    I = 23 => "I",
    // Memory
    Load = 24 => "@",
    Store = 25 => "!",
    LoadByte = 26 => "C@",
    StoreByte = 27 => "C!",
    // Data stack extended
    Rot = 28 => "ROT",
    TwoDup = 29 => "2DUP",
    TwoDrop = 30 => "2DROP",
    Nip = 31 => "NIP",
    Tuck = 32 => "TUCK",
    // Return stack
    ToR = 33 => ">R",
    RFrom = 34 => "R>",
    RFetch = 35 => "R@",
    // Arithmetic extended
    Mod = 36 => "MOD",
    Negate = 37 => "NEGATE",
    Abs = 38 => "ABS",
    Min = 39 => "MIN",
    Max = 40 => "MAX",
    // Comparison extended
    ZeroEq = 41 => "0=",
    ZeroLt = 42 => "0<",
    // I/O
    Emit = 43 => "EMIT",
    Key = 44 => "KEY",
    Cr = 45 => "CR",
    Here = 46 => "HERE",
    // Later additions keep their appended byte values for image stability
    DivMod = 47 => "/MOD",
    QDup = 48 => "?DUP",
    Inc = 49 => "1+",
    Dec = 50 => "1-",
    Le = 51 => "<=",
    Ge = 52 => ">=",
    Ne = 53 => "<>",
    ZeroNe = 54 => "0<>",
    PlusStore = 55 => "+!",
    Allot = 56 => "ALLOT",
    Type = 57 => "TYPE",
    DotS = 58 => ".S",
    Depth = 59 => "DEPTH",
    Clear = 60 => "CLEAR",
    Words = 61 => "WORDS",
}

/// Every opcode that is also a named word. VM init compiles each into a
/// two-byte `op; EXIT` fragment and registers it, in this order, so that
/// `builtin_count` and the arena prefix are reproducible across sessions.
pub const BUILTIN_WORDS: &[(&str, Op)] = &[
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("/", Op::Div),
    ("DUP", Op::Dup),
    ("DROP", Op::Drop),
    ("SWAP", Op::Swap),
    ("OVER", Op::Over),
    (".", Op::Dot),
    ("AND", Op::And),
    ("OR", Op::Or),
    ("XOR", Op::Xor),
    ("NOT", Op::Not),
    ("<", Op::Lt),
    (">", Op::Gt),
    ("=", Op::Eq),
    ("@", Op::Load),
    ("!", Op::Store),
    ("C@", Op::LoadByte),
    ("C!", Op::StoreByte),
    ("I", Op::I),
    ("ROT", Op::Rot),
    ("2DUP", Op::TwoDup),
    ("2DROP", Op::TwoDrop),
    ("NIP", Op::Nip),
    ("TUCK", Op::Tuck),
    (">R", Op::ToR),
    ("R>", Op::RFrom),
    ("R@", Op::RFetch),
    ("MOD", Op::Mod),
    ("NEGATE", Op::Negate),
    ("ABS", Op::Abs),
    ("MIN", Op::Min),
    ("MAX", Op::Max),
    ("0=", Op::ZeroEq),
    ("0<", Op::ZeroLt),
    ("EMIT", Op::Emit),
    ("KEY", Op::Key),
    ("CR", Op::Cr),
    ("HERE", Op::Here),
    ("/MOD", Op::DivMod),
    ("?DUP", Op::QDup),
    ("1+", Op::Inc),
    ("1-", Op::Dec),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("<>", Op::Ne),
    ("0<>", Op::ZeroNe),
    ("+!", Op::PlusStore),
    ("ALLOT", Op::Allot),
    ("TYPE", Op::Type),
    (".S", Op::DotS),
    ("DEPTH", Op::Depth),
    ("CLEAR", Op::Clear),
    ("WORDS", Op::Words),
];
