//! The typed, SSA-form intermediate representation.

pub mod block;
pub mod builder;
pub mod cfg;
pub mod constant;
pub mod entities;
pub mod function;
pub mod global;
pub mod instruction;
pub mod types;
pub mod value;

pub use block::BasicBlock;
pub use builder::{InsertMode, InstBuilder};
pub use cfg::Cfg;
pub use constant::{ConstantData, ConstantPool};
pub use entities::{AnyEntity, Argument, Block, Const, Func, Global, InlineAsm, Inst, Local, Type, Value};
pub use function::{Function, Signature};
pub use global::{GlobalData, Linkage};
pub use instruction::{InstData, InstExtra, Opcode, Operands, PhiOperand};
pub use types::{TypeData, TypePool};
pub use value::{ValueData, ValueGraph};
