//! The middle of the compiler: scoped symbol resolution, compile-time
//! constant evaluation, and the lowering of the syntax tree into the
//! structured IR that the text renderer and the code generator consume.

pub mod const_eval;
pub mod ir;
pub mod scope;
