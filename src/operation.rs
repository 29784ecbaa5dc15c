use std::fmt::Display;

use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

/// The commands the FPGA understands.
///
/// Each variant maps to exactly one wire code, see [`Opcode::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Sequence)]
pub enum Opcode {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Arithmetic shift right.
    Sra,
    /// Logical shift right.
    Srl,
    /// Bitwise not-or.
    Nor,
}

impl Opcode {
    /// The byte put on the wire for this opcode.
    /// Must match the device firmware.
    pub const fn code(self) -> u8 {
        match self {
            Opcode::Add => 0x20,
            Opcode::Sub => 0x22,
            Opcode::And => 0x24,
            Opcode::Or => 0x25,
            Opcode::Xor => 0x26,
            Opcode::Sra => 0x03,
            Opcode::Srl => 0x02,
            Opcode::Nor => 0x27,
        }
    }

    /// The opcode a wire code stands for, if any.
    pub fn from_code(code: u8) -> Option<Self> {
        enum_iterator::all::<Opcode>().find(|opcode| opcode.code() == code)
    }

    /// Short uppercase name, as used on the device's documentation.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Sra => "SRA",
            Opcode::Srl => "SRL",
            Opcode::Nor => "NOR",
        }
    }

    /// A longer explanation suitable for menus.
    pub const fn description(self) -> &'static str {
        match self {
            Opcode::Add => "addition",
            Opcode::Sub => "subtraction",
            Opcode::And => "bitwise",
            Opcode::Or => "bitwise",
            Opcode::Xor => "bitwise",
            Opcode::Sra => "arithmetic shift right",
            Opcode::Srl => "logical shift right",
            Opcode::Nor => "not or",
        }
    }

    /// What the device computes for this opcode on two (already truncated) operands.
    ///
    /// Shift amounts of eight or more shift everything out.
    pub fn apply(self, a: u8, b: u8) -> u8 {
        let shift = u32::from(b.min(8));

        match self {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::And => a & b,
            Opcode::Or => a | b,
            Opcode::Xor => a ^ b,
            Opcode::Sra => ((a as i8) >> shift.min(7)) as u8,
            Opcode::Srl => a.checked_shr(shift).unwrap_or(0),
            Opcode::Nor => !(a | b),
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// One command for the device.
///
/// Operands are kept as entered.
/// Values outside `0..=255` are allowed and wrap when encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    opcode: Opcode,
    a: i32,
    b: i32,
}

impl Operation {
    /// A new operation.
    pub fn new(opcode: Opcode, a: i32, b: i32) -> Self {
        Self { opcode, a, b }
    }

    /// The opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Operand A, as entered.
    pub fn a(&self) -> i32 {
        self.a
    }

    /// Operand B, as entered.
    pub fn b(&self) -> i32 {
        self.b
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "opcode=0x{:02X} ({}) A={} B={}",
            self.opcode.code(),
            self.opcode,
            self.a,
            self.b
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn codes_match_firmware() {
        let codes = enum_iterator::all::<Opcode>()
            .map(|opcode| (opcode.mnemonic(), opcode.code()))
            .collect::<Vec<_>>();

        assert_eq!(
            codes,
            vec![
                ("ADD", 0x20),
                ("SUB", 0x22),
                ("AND", 0x24),
                ("OR", 0x25),
                ("XOR", 0x26),
                ("SRA", 0x03),
                ("SRL", 0x02),
                ("NOR", 0x27),
            ]
        );
    }

    #[test]
    fn codes_are_unique_and_reversible() {
        for opcode in enum_iterator::all::<Opcode>() {
            assert_eq!(Opcode::from_code(opcode.code()), Some(opcode));
        }

        assert_eq!(Opcode::from_code(0xFF), None);
    }

    #[test]
    fn apply() {
        assert_eq!(Opcode::Add.apply(200, 100), 44);
        assert_eq!(Opcode::Sub.apply(1, 2), 0xFF);
        assert_eq!(Opcode::And.apply(0b1100, 0b1010), 0b1000);
        assert_eq!(Opcode::Or.apply(0b1100, 0b1010), 0b1110);
        assert_eq!(Opcode::Xor.apply(0b1100, 0b1010), 0b0110);
        assert_eq!(Opcode::Nor.apply(0b1100, 0b1010), 0b1111_0001);
        assert_eq!(Opcode::Srl.apply(0x80, 1), 0x40);
        assert_eq!(Opcode::Sra.apply(0x80, 1), 0xC0);
        assert_eq!(Opcode::Srl.apply(0xFF, 9), 0);
        assert_eq!(Opcode::Sra.apply(0x80, 200), 0xFF);
    }

    #[test]
    fn display() {
        let op = Operation::new(Opcode::Add, 10, 20);

        assert_eq!(op.to_string(), "opcode=0x20 (ADD) A=10 B=20");
    }
}
