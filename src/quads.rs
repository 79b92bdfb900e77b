//! Quadruple store and emission sink (C2).
//!
//! Discriminant order below follows `quads.h`'s `q_*` numbering so the
//! on-disk layout matches the original's intent (see `DESIGN.md`); Rust
//! does not need the numbers to be load-bearing the way the C union did,
//! so this is a documentation nicety, not a hard requirement.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::FilePos;
use crate::symtab::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessClassId(pub u32);

/// The full, closed opcode set from `spec.md` §6 / `quads.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Noop,
    Push1,
    Push2,
    Push3,
    Pop1,
    Pop2,
    Pop3,
    Add,
    Sub,
    Mult,
    Div,
    Exp,
    Mod,
    Min,
    Max,
    With,
    Less,
    Lessf,
    From,
    Fromb,
    Frome,
    Npow,
    Uminus,
    Domain,
    Range,
    Pow,
    Arb,
    Nelt,
    Not,
    Smap,
    Tupof,
    Of1,
    Of,
    Ofa,
    Kof1,
    Kof,
    Kofa,
    Erase,
    Slice,
    End,
    Assign,
    Penviron,
    Sof,
    Sofa,
    Sslice,
    Send,
    Eq,
    Ne,
    Lt,
    Nlt,
    Le,
    Nle,
    In,
    Notin,
    Incs,
    And,
    Or,
    Go,
    Goind,
    Gotrue,
    Gofalse,
    Goeq,
    Gone,
    Golt,
    Gonlt,
    Gole,
    Gonle,
    Goin,
    Gonotin,
    Goincs,
    Gonincs,
    Set,
    Tuple,
    Iter,
    Inext,
    Lcall,
    Call,
    Return,
    Stop,
    Stopall,
    Assert,
    Intcheck,
    Initobj,
    Initend,
    Slot,
    Sslot,
    Slotof,
    Menviron,
    Self_,
    Initproc,
    Initpend,
    Label,
    Ufrom,
    /// Sentinel written once at the end of a file-mode stream (`quads.h`'s
    /// `opcode = -1` record). Never produced by a generator, only by
    /// `FileSink::close`.
    EndOfStream,
}

/// Tri-modal operand union, replacing the C tagged union per the Design
/// Notes. Each opcode's legal per-slot types are enforced by the emitters
/// in `codegen`, not by this type itself — mirroring how `spec.md` §4.10
/// describes the legality as "determined by opcode", external to the
/// operand representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Symbol(SymbolId),
    Immediate(i64),
    Label(LabelId),
    Slot(SlotId),
    Class(ClassId),
    ProcessClass(ProcessClassId),
    Unused,
}

impl Operand {
    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Operand::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<LabelId> {
        match self {
            Operand::Label(l) => Some(*l),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub opcode: Opcode,
    pub operands: [Operand; 3],
    pub pos: FilePos,
}

impl Quad {
    pub fn new(opcode: Opcode, operands: [Operand; 3], pos: FilePos) -> Self {
        Quad {
            opcode,
            operands,
            pos,
        }
    }

    fn end_of_stream() -> Self {
        Quad {
            opcode: Opcode::EndOfStream,
            operands: [Operand::Unused, Operand::Unused, Operand::Unused],
            pos: FilePos::UNKNOWN,
        }
    }
}

/// Opened-sink bookkeeping handed back from `QuadSink::open`, mirroring
/// `spec.md` §4.2's "on open, if in file mode, the current append offset
/// is captured into the passed location".
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitLocation {
    pub file_offset: u64,
}

/// Emission sink abstraction (`spec.md` §3 "Emission sink", §4.2). Two
/// implementations: an in-memory list and an append-only file stream,
/// selected once per procedure rather than branched on every emit, per
/// the Design Notes.
pub trait QuadSink {
    fn open(&mut self) -> EmitLocation;

    fn emit(&mut self, quad: Quad) -> Result<(), crate::codegen::error::CodeGenError>;

    /// Writes the mode-appropriate terminator: a null tail pointer for the
    /// in-memory list, an opcode `-1` sentinel record for the file stream.
    fn close(&mut self) -> Result<(), crate::codegen::error::CodeGenError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Only `ListSink` answers `Some`; the nested-LHS rewriter uses this to
    /// find out whether it may splice the just-emitted tail, and declines
    /// to optimize when it gets `None` (`spec.md` §4.9.3).
    fn as_list_mut(&mut self) -> Option<&mut Vec<Quad>> {
        None
    }
}

/// In-memory linked-list-equivalent sink. A `Vec<Quad>` gives the same
/// head/tail/append semantics as the original's singly linked list, plus
/// O(1) truncation — exactly what the nested-LHS and augmented-assignment
/// rewriters need when they splice new quadruples onto an already-emitted
/// tail.
#[derive(Debug, Default)]
pub struct ListSink {
    quads: Vec<Quad>,
}

impl ListSink {
    pub fn new() -> Self {
        ListSink { quads: Vec::new() }
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// Truncates back to `mark` quadruples, used by the rewriters to
    /// discard the straightforward emission before splicing in the
    /// optimized replacement.
    pub fn truncate_to(&mut self, mark: usize) {
        self.quads.truncate(mark);
    }
}

impl QuadSink for ListSink {
    fn open(&mut self) -> EmitLocation {
        EmitLocation::default()
    }

    fn emit(&mut self, quad: Quad) -> Result<(), crate::codegen::error::CodeGenError> {
        self.quads.push(quad);
        Ok(())
    }

    fn close(&mut self) -> Result<(), crate::codegen::error::CodeGenError> {
        // In-memory mode: "closing" is conceptually writing a null into the
        // stored tail pointer. There is no separate tail cell to null out
        // with a Vec, so this is a documented no-op.
        Ok(())
    }

    fn len(&self) -> usize {
        self.quads.len()
    }

    fn as_list_mut(&mut self) -> Option<&mut Vec<Quad>> {
        Some(&mut self.quads)
    }
}

/// Append-only file-backed sink, for programs larger than memory
/// (`spec.md` §1). Records are written with `bincode`, length-prefixed so
/// a reader can detect truncation, per the Design Notes'
/// "self-describing format" recommendation over bit-exact legacy framing.
pub struct FileSink {
    writer: BufWriter<File>,
    start_offset: u64,
    count: usize,
}

impl FileSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let start_offset = file.metadata()?.len();
        Ok(FileSink {
            writer: BufWriter::new(file),
            start_offset,
            count: 0,
        })
    }

    fn write_record(&mut self, quad: &Quad) -> Result<(), crate::codegen::error::CodeGenError> {
        let bytes = bincode::serialize(quad)
            .map_err(|e| crate::codegen::error::CodeGenError::Giveup(e.to_string()))?;
        self.writer
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .map_err(|e| crate::codegen::error::CodeGenError::Giveup(e.to_string()))?;
        self.writer
            .write_all(&bytes)
            .map_err(|e| crate::codegen::error::CodeGenError::Giveup(e.to_string()))?;
        Ok(())
    }
}

impl QuadSink for FileSink {
    fn open(&mut self) -> EmitLocation {
        EmitLocation {
            file_offset: self.start_offset,
        }
    }

    fn emit(&mut self, quad: Quad) -> Result<(), crate::codegen::error::CodeGenError> {
        self.write_record(&quad)?;
        self.count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), crate::codegen::error::CodeGenError> {
        self.write_record(&Quad::end_of_stream())?;
        self.writer
            .flush()
            .map_err(|e| crate::codegen::error::CodeGenError::Giveup(e.to_string()))
    }

    fn len(&self) -> usize {
        self.count
    }
}

/// Reads back a stream written by `FileSink`, stopping at the
/// `Opcode::EndOfStream` sentinel. Used by `load_quads` and by the
/// mode-equivalence test (`spec.md` §8 property 9).
pub fn load_quads(path: &Path) -> std::io::Result<Vec<Quad>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    loop {
        let mut len_bytes = [0u8; 4];
        if reader.read_exact(&mut len_bytes).is_err() {
            break;
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        let quad: Quad = bincode::deserialize(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if quad.opcode == Opcode::EndOfStream {
            break;
        }
        out.push(quad);
    }
    Ok(out)
}
