//! JVM instruction table and operand decoding.
//!
//! The ABI engine never interprets bytecode semantics. It only needs to walk instruction
//! boundaries to find operands that index the constant pool, so each table entry carries the
//! mnemonic and the operand layout of one opcode.
//!
//! # Key Types
//! - [`Opcode`] - Mnemonic and operand layout of one instruction
//! - [`OperandLayout`] - How the bytes following an opcode are structured
//! - [`PoolOperand`] - A constant pool index found in code
//!
//! # Main Functions
//! - [`lookup`] - Table lookup by opcode byte
//! - [`decode_pool_operands`] - Walk a method's code and collect pool operands
//!
//! # Example
//! ```rust
//! use abiscope::classfile::opcodes::{decode_pool_operands, lookup};
//!
//! // aload_0; invokevirtual #7; return
//! let code = [0x2A, 0xB6, 0x00, 0x07, 0xB1];
//! let operands = decode_pool_operands(&code)?;
//! assert_eq!(operands.len(), 1);
//! assert_eq!(operands[0].index, 7);
//! assert_eq!(lookup(0xB6).map(|op| op.mnemonic), Some("invokevirtual"));
//! # Ok::<(), abiscope::Error>(())
//! ```

#![allow(missing_docs)]

use crate::{classfile::body::OperandWidth, file::parser::Parser, Result};

// Opcodes the builder and the reader refer to by name
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const LCONST_0: u8 = 0x09;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;
pub const ILOAD: u8 = 0x15;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1A;
pub const ALOAD_0: u8 = 0x2A;
pub const ISTORE: u8 = 0x36;
pub const ASTORE: u8 = 0x3A;
pub const POP: u8 = 0x57;
pub const DUP: u8 = 0x59;
pub const IADD: u8 = 0x60;
pub const IINC: u8 = 0x84;
pub const IFEQ: u8 = 0x99;
pub const GOTO: u8 = 0xA7;
pub const TABLESWITCH: u8 = 0xAA;
pub const LOOKUPSWITCH: u8 = 0xAB;
pub const IRETURN: u8 = 0xAC;
pub const LRETURN: u8 = 0xAD;
pub const ARETURN: u8 = 0xB0;
pub const RETURN: u8 = 0xB1;
pub const GETSTATIC: u8 = 0xB2;
pub const PUTSTATIC: u8 = 0xB3;
pub const GETFIELD: u8 = 0xB4;
pub const PUTFIELD: u8 = 0xB5;
pub const INVOKEVIRTUAL: u8 = 0xB6;
pub const INVOKESPECIAL: u8 = 0xB7;
pub const INVOKESTATIC: u8 = 0xB8;
pub const INVOKEINTERFACE: u8 = 0xB9;
pub const INVOKEDYNAMIC: u8 = 0xBA;
pub const NEW: u8 = 0xBB;
pub const ANEWARRAY: u8 = 0xBD;
pub const ATHROW: u8 = 0xBF;
pub const CHECKCAST: u8 = 0xC0;
pub const INSTANCEOF: u8 = 0xC1;
pub const WIDE: u8 = 0xC4;
pub const MULTIANEWARRAY: u8 = 0xC5;

/// Layout of the operand bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operands
    None,
    /// One immediate byte
    Byte,
    /// Two immediate bytes
    Short,
    /// One byte local variable index
    Local,
    /// One byte constant pool index (`ldc`)
    PoolByte,
    /// Two byte constant pool index
    PoolShort,
    /// Local index and signed increment
    Iinc,
    /// Signed 16-bit branch offset
    Branch,
    /// Signed 32-bit branch offset
    BranchWide,
    /// Pool index, argument count and a zero byte
    InvokeInterface,
    /// Pool index and two zero bytes
    InvokeDynamic,
    /// Pool index and dimension count
    MultiANewArray,
    /// Padded jump table
    TableSwitch,
    /// Padded match-offset pairs
    LookupSwitch,
    /// Widened form of the next instruction
    Wide,
}

/// One entry of the instruction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// Instruction mnemonic
    pub mnemonic: &'static str,
    /// Operand layout
    pub layout: OperandLayout,
}

impl Opcode {
    const fn new(mnemonic: &'static str, layout: OperandLayout) -> Self {
        Opcode { mnemonic, layout }
    }
}

/// Instructions `0x00` (`nop`) through `0xC9` (`jsr_w`).
///
/// `breakpoint` and the two `impdep` opcodes are reserved and must not appear in class files,
/// so they are left out of the table.
pub static OPCODES: [Opcode; 0xCA] = [
    Opcode::new("nop", OperandLayout::None), // 0x00
    Opcode::new("aconst_null", OperandLayout::None), // 0x01
    Opcode::new("iconst_m1", OperandLayout::None), // 0x02
    Opcode::new("iconst_0", OperandLayout::None), // 0x03
    Opcode::new("iconst_1", OperandLayout::None), // 0x04
    Opcode::new("iconst_2", OperandLayout::None), // 0x05
    Opcode::new("iconst_3", OperandLayout::None), // 0x06
    Opcode::new("iconst_4", OperandLayout::None), // 0x07
    Opcode::new("iconst_5", OperandLayout::None), // 0x08
    Opcode::new("lconst_0", OperandLayout::None), // 0x09
    Opcode::new("lconst_1", OperandLayout::None), // 0x0A
    Opcode::new("fconst_0", OperandLayout::None), // 0x0B
    Opcode::new("fconst_1", OperandLayout::None), // 0x0C
    Opcode::new("fconst_2", OperandLayout::None), // 0x0D
    Opcode::new("dconst_0", OperandLayout::None), // 0x0E
    Opcode::new("dconst_1", OperandLayout::None), // 0x0F
    Opcode::new("bipush", OperandLayout::Byte), // 0x10
    Opcode::new("sipush", OperandLayout::Short), // 0x11
    Opcode::new("ldc", OperandLayout::PoolByte), // 0x12
    Opcode::new("ldc_w", OperandLayout::PoolShort), // 0x13
    Opcode::new("ldc2_w", OperandLayout::PoolShort), // 0x14
    Opcode::new("iload", OperandLayout::Local), // 0x15
    Opcode::new("lload", OperandLayout::Local), // 0x16
    Opcode::new("fload", OperandLayout::Local), // 0x17
    Opcode::new("dload", OperandLayout::Local), // 0x18
    Opcode::new("aload", OperandLayout::Local), // 0x19
    Opcode::new("iload_0", OperandLayout::None), // 0x1A
    Opcode::new("iload_1", OperandLayout::None), // 0x1B
    Opcode::new("iload_2", OperandLayout::None), // 0x1C
    Opcode::new("iload_3", OperandLayout::None), // 0x1D
    Opcode::new("lload_0", OperandLayout::None), // 0x1E
    Opcode::new("lload_1", OperandLayout::None), // 0x1F
    Opcode::new("lload_2", OperandLayout::None), // 0x20
    Opcode::new("lload_3", OperandLayout::None), // 0x21
    Opcode::new("fload_0", OperandLayout::None), // 0x22
    Opcode::new("fload_1", OperandLayout::None), // 0x23
    Opcode::new("fload_2", OperandLayout::None), // 0x24
    Opcode::new("fload_3", OperandLayout::None), // 0x25
    Opcode::new("dload_0", OperandLayout::None), // 0x26
    Opcode::new("dload_1", OperandLayout::None), // 0x27
    Opcode::new("dload_2", OperandLayout::None), // 0x28
    Opcode::new("dload_3", OperandLayout::None), // 0x29
    Opcode::new("aload_0", OperandLayout::None), // 0x2A
    Opcode::new("aload_1", OperandLayout::None), // 0x2B
    Opcode::new("aload_2", OperandLayout::None), // 0x2C
    Opcode::new("aload_3", OperandLayout::None), // 0x2D
    Opcode::new("iaload", OperandLayout::None), // 0x2E
    Opcode::new("laload", OperandLayout::None), // 0x2F
    Opcode::new("faload", OperandLayout::None), // 0x30
    Opcode::new("daload", OperandLayout::None), // 0x31
    Opcode::new("aaload", OperandLayout::None), // 0x32
    Opcode::new("baload", OperandLayout::None), // 0x33
    Opcode::new("caload", OperandLayout::None), // 0x34
    Opcode::new("saload", OperandLayout::None), // 0x35
    Opcode::new("istore", OperandLayout::Local), // 0x36
    Opcode::new("lstore", OperandLayout::Local), // 0x37
    Opcode::new("fstore", OperandLayout::Local), // 0x38
    Opcode::new("dstore", OperandLayout::Local), // 0x39
    Opcode::new("astore", OperandLayout::Local), // 0x3A
    Opcode::new("istore_0", OperandLayout::None), // 0x3B
    Opcode::new("istore_1", OperandLayout::None), // 0x3C
    Opcode::new("istore_2", OperandLayout::None), // 0x3D
    Opcode::new("istore_3", OperandLayout::None), // 0x3E
    Opcode::new("lstore_0", OperandLayout::None), // 0x3F
    Opcode::new("lstore_1", OperandLayout::None), // 0x40
    Opcode::new("lstore_2", OperandLayout::None), // 0x41
    Opcode::new("lstore_3", OperandLayout::None), // 0x42
    Opcode::new("fstore_0", OperandLayout::None), // 0x43
    Opcode::new("fstore_1", OperandLayout::None), // 0x44
    Opcode::new("fstore_2", OperandLayout::None), // 0x45
    Opcode::new("fstore_3", OperandLayout::None), // 0x46
    Opcode::new("dstore_0", OperandLayout::None), // 0x47
    Opcode::new("dstore_1", OperandLayout::None), // 0x48
    Opcode::new("dstore_2", OperandLayout::None), // 0x49
    Opcode::new("dstore_3", OperandLayout::None), // 0x4A
    Opcode::new("astore_0", OperandLayout::None), // 0x4B
    Opcode::new("astore_1", OperandLayout::None), // 0x4C
    Opcode::new("astore_2", OperandLayout::None), // 0x4D
    Opcode::new("astore_3", OperandLayout::None), // 0x4E
    Opcode::new("iastore", OperandLayout::None), // 0x4F
    Opcode::new("lastore", OperandLayout::None), // 0x50
    Opcode::new("fastore", OperandLayout::None), // 0x51
    Opcode::new("dastore", OperandLayout::None), // 0x52
    Opcode::new("aastore", OperandLayout::None), // 0x53
    Opcode::new("bastore", OperandLayout::None), // 0x54
    Opcode::new("castore", OperandLayout::None), // 0x55
    Opcode::new("sastore", OperandLayout::None), // 0x56
    Opcode::new("pop", OperandLayout::None), // 0x57
    Opcode::new("pop2", OperandLayout::None), // 0x58
    Opcode::new("dup", OperandLayout::None), // 0x59
    Opcode::new("dup_x1", OperandLayout::None), // 0x5A
    Opcode::new("dup_x2", OperandLayout::None), // 0x5B
    Opcode::new("dup2", OperandLayout::None), // 0x5C
    Opcode::new("dup2_x1", OperandLayout::None), // 0x5D
    Opcode::new("dup2_x2", OperandLayout::None), // 0x5E
    Opcode::new("swap", OperandLayout::None), // 0x5F
    Opcode::new("iadd", OperandLayout::None), // 0x60
    Opcode::new("ladd", OperandLayout::None), // 0x61
    Opcode::new("fadd", OperandLayout::None), // 0x62
    Opcode::new("dadd", OperandLayout::None), // 0x63
    Opcode::new("isub", OperandLayout::None), // 0x64
    Opcode::new("lsub", OperandLayout::None), // 0x65
    Opcode::new("fsub", OperandLayout::None), // 0x66
    Opcode::new("dsub", OperandLayout::None), // 0x67
    Opcode::new("imul", OperandLayout::None), // 0x68
    Opcode::new("lmul", OperandLayout::None), // 0x69
    Opcode::new("fmul", OperandLayout::None), // 0x6A
    Opcode::new("dmul", OperandLayout::None), // 0x6B
    Opcode::new("idiv", OperandLayout::None), // 0x6C
    Opcode::new("ldiv", OperandLayout::None), // 0x6D
    Opcode::new("fdiv", OperandLayout::None), // 0x6E
    Opcode::new("ddiv", OperandLayout::None), // 0x6F
    Opcode::new("irem", OperandLayout::None), // 0x70
    Opcode::new("lrem", OperandLayout::None), // 0x71
    Opcode::new("frem", OperandLayout::None), // 0x72
    Opcode::new("drem", OperandLayout::None), // 0x73
    Opcode::new("ineg", OperandLayout::None), // 0x74
    Opcode::new("lneg", OperandLayout::None), // 0x75
    Opcode::new("fneg", OperandLayout::None), // 0x76
    Opcode::new("dneg", OperandLayout::None), // 0x77
    Opcode::new("ishl", OperandLayout::None), // 0x78
    Opcode::new("lshl", OperandLayout::None), // 0x79
    Opcode::new("ishr", OperandLayout::None), // 0x7A
    Opcode::new("lshr", OperandLayout::None), // 0x7B
    Opcode::new("iushr", OperandLayout::None), // 0x7C
    Opcode::new("lushr", OperandLayout::None), // 0x7D
    Opcode::new("iand", OperandLayout::None), // 0x7E
    Opcode::new("land", OperandLayout::None), // 0x7F
    Opcode::new("ior", OperandLayout::None), // 0x80
    Opcode::new("lor", OperandLayout::None), // 0x81
    Opcode::new("ixor", OperandLayout::None), // 0x82
    Opcode::new("lxor", OperandLayout::None), // 0x83
    Opcode::new("iinc", OperandLayout::Iinc), // 0x84
    Opcode::new("i2l", OperandLayout::None), // 0x85
    Opcode::new("i2f", OperandLayout::None), // 0x86
    Opcode::new("i2d", OperandLayout::None), // 0x87
    Opcode::new("l2i", OperandLayout::None), // 0x88
    Opcode::new("l2f", OperandLayout::None), // 0x89
    Opcode::new("l2d", OperandLayout::None), // 0x8A
    Opcode::new("f2i", OperandLayout::None), // 0x8B
    Opcode::new("f2l", OperandLayout::None), // 0x8C
    Opcode::new("f2d", OperandLayout::None), // 0x8D
    Opcode::new("d2i", OperandLayout::None), // 0x8E
    Opcode::new("d2l", OperandLayout::None), // 0x8F
    Opcode::new("d2f", OperandLayout::None), // 0x90
    Opcode::new("i2b", OperandLayout::None), // 0x91
    Opcode::new("i2c", OperandLayout::None), // 0x92
    Opcode::new("i2s", OperandLayout::None), // 0x93
    Opcode::new("lcmp", OperandLayout::None), // 0x94
    Opcode::new("fcmpl", OperandLayout::None), // 0x95
    Opcode::new("fcmpg", OperandLayout::None), // 0x96
    Opcode::new("dcmpl", OperandLayout::None), // 0x97
    Opcode::new("dcmpg", OperandLayout::None), // 0x98
    Opcode::new("ifeq", OperandLayout::Branch), // 0x99
    Opcode::new("ifne", OperandLayout::Branch), // 0x9A
    Opcode::new("iflt", OperandLayout::Branch), // 0x9B
    Opcode::new("ifge", OperandLayout::Branch), // 0x9C
    Opcode::new("ifgt", OperandLayout::Branch), // 0x9D
    Opcode::new("ifle", OperandLayout::Branch), // 0x9E
    Opcode::new("if_icmpeq", OperandLayout::Branch), // 0x9F
    Opcode::new("if_icmpne", OperandLayout::Branch), // 0xA0
    Opcode::new("if_icmplt", OperandLayout::Branch), // 0xA1
    Opcode::new("if_icmpge", OperandLayout::Branch), // 0xA2
    Opcode::new("if_icmpgt", OperandLayout::Branch), // 0xA3
    Opcode::new("if_icmple", OperandLayout::Branch), // 0xA4
    Opcode::new("if_acmpeq", OperandLayout::Branch), // 0xA5
    Opcode::new("if_acmpne", OperandLayout::Branch), // 0xA6
    Opcode::new("goto", OperandLayout::Branch), // 0xA7
    Opcode::new("jsr", OperandLayout::Branch), // 0xA8
    Opcode::new("ret", OperandLayout::Local), // 0xA9
    Opcode::new("tableswitch", OperandLayout::TableSwitch), // 0xAA
    Opcode::new("lookupswitch", OperandLayout::LookupSwitch), // 0xAB
    Opcode::new("ireturn", OperandLayout::None), // 0xAC
    Opcode::new("lreturn", OperandLayout::None), // 0xAD
    Opcode::new("freturn", OperandLayout::None), // 0xAE
    Opcode::new("dreturn", OperandLayout::None), // 0xAF
    Opcode::new("areturn", OperandLayout::None), // 0xB0
    Opcode::new("return", OperandLayout::None), // 0xB1
    Opcode::new("getstatic", OperandLayout::PoolShort), // 0xB2
    Opcode::new("putstatic", OperandLayout::PoolShort), // 0xB3
    Opcode::new("getfield", OperandLayout::PoolShort), // 0xB4
    Opcode::new("putfield", OperandLayout::PoolShort), // 0xB5
    Opcode::new("invokevirtual", OperandLayout::PoolShort), // 0xB6
    Opcode::new("invokespecial", OperandLayout::PoolShort), // 0xB7
    Opcode::new("invokestatic", OperandLayout::PoolShort), // 0xB8
    Opcode::new("invokeinterface", OperandLayout::InvokeInterface), // 0xB9
    Opcode::new("invokedynamic", OperandLayout::InvokeDynamic), // 0xBA
    Opcode::new("new", OperandLayout::PoolShort), // 0xBB
    Opcode::new("newarray", OperandLayout::Byte), // 0xBC
    Opcode::new("anewarray", OperandLayout::PoolShort), // 0xBD
    Opcode::new("arraylength", OperandLayout::None), // 0xBE
    Opcode::new("athrow", OperandLayout::None), // 0xBF
    Opcode::new("checkcast", OperandLayout::PoolShort), // 0xC0
    Opcode::new("instanceof", OperandLayout::PoolShort), // 0xC1
    Opcode::new("monitorenter", OperandLayout::None), // 0xC2
    Opcode::new("monitorexit", OperandLayout::None), // 0xC3
    Opcode::new("wide", OperandLayout::Wide), // 0xC4
    Opcode::new("multianewarray", OperandLayout::MultiANewArray), // 0xC5
    Opcode::new("ifnull", OperandLayout::Branch), // 0xC6
    Opcode::new("ifnonnull", OperandLayout::Branch), // 0xC7
    Opcode::new("goto_w", OperandLayout::BranchWide), // 0xC8
    Opcode::new("jsr_w", OperandLayout::BranchWide), // 0xC9
];

/// Look up the table entry of an opcode byte.
#[must_use]
pub fn lookup(opcode: u8) -> Option<&'static Opcode> {
    OPCODES.get(opcode as usize)
}

/// A constant pool index found inside bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOperand {
    /// Offset of the instruction's opcode
    pub pc: usize,
    /// The opcode
    pub opcode: u8,
    /// Offset of the index bytes
    pub offset: usize,
    /// Width of the index
    pub width: OperandWidth,
    /// The raw pool index
    pub index: u16,
}

/// Walk `code` instruction by instruction and collect every constant pool operand.
///
/// `code` must be the complete code array of one method, since switch padding is measured from
/// its first byte.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes and invalid switch tables, and
/// [`crate::Error::OutOfBounds`] when an instruction is truncated.
pub fn decode_pool_operands(code: &[u8]) -> Result<Vec<PoolOperand>> {
    let mut parser = Parser::new(code);
    let mut operands = Vec::new();

    while parser.has_more_data() {
        let pc = parser.pos();
        let opcode = parser.read_be::<u8>()?;
        let Some(instruction) = lookup(opcode) else {
            return Err(malformed_error!("Invalid opcode {:02X} at {}", opcode, pc));
        };

        match instruction.layout {
            OperandLayout::None => {}
            OperandLayout::Byte | OperandLayout::Local => parser.advance_by(1)?,
            OperandLayout::Short | OperandLayout::Iinc | OperandLayout::Branch => {
                parser.advance_by(2)?;
            }
            OperandLayout::BranchWide => parser.advance_by(4)?,
            OperandLayout::PoolByte => {
                let offset = parser.pos();
                let index = u16::from(parser.read_be::<u8>()?);
                operands.push(PoolOperand {
                    pc,
                    opcode,
                    offset,
                    width: OperandWidth::Byte,
                    index,
                });
            }
            OperandLayout::PoolShort
            | OperandLayout::InvokeInterface
            | OperandLayout::InvokeDynamic
            | OperandLayout::MultiANewArray => {
                let offset = parser.pos();
                let index = parser.read_be::<u16>()?;
                operands.push(PoolOperand {
                    pc,
                    opcode,
                    offset,
                    width: OperandWidth::Short,
                    index,
                });
                match instruction.layout {
                    OperandLayout::InvokeInterface | OperandLayout::InvokeDynamic => {
                        parser.advance_by(2)?;
                    }
                    OperandLayout::MultiANewArray => parser.advance_by(1)?,
                    _ => {}
                }
            }
            OperandLayout::TableSwitch => {
                parser.align(4)?;
                parser.advance_by(4)?;
                let low = parser.read_be::<i32>()?;
                let high = parser.read_be::<i32>()?;
                if high < low {
                    return Err(malformed_error!(
                        "tableswitch at {} has high {} below low {}",
                        pc,
                        high,
                        low
                    ));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                let Some(length) = count.checked_mul(4) else {
                    return Err(malformed_error!("tableswitch at {} is too large", pc));
                };
                parser.advance_by(length)?;
            }
            OperandLayout::LookupSwitch => {
                parser.align(4)?;
                parser.advance_by(4)?;
                let pairs = parser.read_be::<i32>()?;
                let Ok(pairs) = usize::try_from(pairs) else {
                    return Err(malformed_error!("lookupswitch at {} has negative size", pc));
                };
                let Some(length) = pairs.checked_mul(8) else {
                    return Err(malformed_error!("lookupswitch at {} is too large", pc));
                };
                parser.advance_by(length)?;
            }
            OperandLayout::Wide => {
                let widened = parser.read_be::<u8>()?;
                match widened {
                    IINC => parser.advance_by(4)?,
                    0x15..=0x19 | 0x36..=0x3A | 0xA9 => parser.advance_by(2)?,
                    _ => {
                        return Err(malformed_error!(
                            "wide at {} modifies invalid opcode {:02X}",
                            pc,
                            widened
                        ))
                    }
                }
            }
        }
    }

    Ok(operands)
}
