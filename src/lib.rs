//! Quadruple code generator.
//!
//! Lowers a type-annotated AST into a stream of three-address
//! quadruples for a later bytecode assembler/VM. The crate is a
//! library only: parsing, type checking, and the final assembly step
//! are out of scope (`spec.md` §1), so the public surface is the data
//! model (`ast`, `symtab`, `namtab`, `quads`, `temps`, `loopstack`,
//! `const_classifier`) plus the `codegen` module that walks an AST and
//! drives a `QuadSink`.
//!
//! ```
//! use quad_codegen::ast::{FilePos, LeafRef, NodeKind};
//! use quad_codegen::codegen::CodeGen;
//! use quad_codegen::config::CodeGenConfig;
//! use quad_codegen::symtab::{LiteralValue, SymbolKind};
//!
//! let mut cg = CodeGen::new(CodeGenConfig::default());
//! let x = cg.symtab.enter_symbol(SymbolKind::Identifier, Some("x".to_string()), FilePos::UNKNOWN);
//! cg.symtab.get_mut(x).has_lvalue = true;
//! cg.symtab.get_mut(x).has_rvalue = true;
//! let x_leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(x), FilePos::UNKNOWN);
//! let one = cg.symtab.enter_literal(LiteralValue::Integer("1".to_string()), FilePos::UNKNOWN);
//! let one_leaf = cg.ast.alloc_leaf(NodeKind::Symtab, LeafRef::Symbol(one), FilePos::UNKNOWN);
//! let assign = cg.ast.alloc_internal(NodeKind::Assign, vec![x_leaf, one_leaf], FilePos::UNKNOWN);
//! let body = cg.ast.alloc_internal(NodeKind::List, vec![assign], FilePos::UNKNOWN);
//!
//! cg.gen_procedure(body).unwrap();
//! assert_eq!(cg.sink.len(), 1);
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod const_classifier;
pub mod loopstack;
pub mod namtab;
pub mod quads;
pub mod symtab;
pub mod temps;

pub use codegen::{CodeGen, CodeGenError};
pub use config::CodeGenConfig;
