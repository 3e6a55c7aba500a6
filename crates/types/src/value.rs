use std::fmt;

/// A single instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A named variable, resolved through the process symbol table.
    Symbol(String),
    /// An unsigned 16-bit literal.
    Literal(u16),
    /// A raw virtual address, parsed from `0xNNNN` user input. Never negative.
    Address(i32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Symbol(name) => write!(f, "{name}"),
            Value::Literal(v) => write!(f, "{v}"),
            Value::Address(addr) => write!(f, "{addr:#06x}"),
        }
    }
}
