//! slatec-ssa - SSA layer consumed by the elaborator.
//!
//! The semantic core lowers elaborated expressions through the primitives
//! in [`Builder`]: constants, `alloca`/`load`/`store`, GEP indexing,
//! integer and float arithmetic, comparisons, casts, calls (with struct
//! return), branches, phis, and inline assembly. Behind the builder sits
//! an in-memory [`Module`]: typed functions made of basic blocks whose
//! instructions live in per-function [`IndexVec`] tables.
//!
//! [`DataLayout`] answers the two layout queries the elaborator needs
//! (`size_of`, `offset_of`); field offsets use naive left-to-right packing
//! so class upcast padding is exactly the summed size of the preceding
//! parents.
//!
//! Emission is deterministic: the same elaboration order produces the same
//! instruction ids and therefore byte-identical [`Module::emit`] output.
//!
//! [`IndexVec`]: slatec_util::IndexVec

pub mod builder;
pub mod fold;
pub mod layout;
pub mod module;
pub mod print;
pub mod ty;

pub use builder::Builder;
pub use layout::DataLayout;
pub use module::{
    BinOp, Block, BlockId, CastOp, Const, FloatPredicate, FuncId, Function, Global, GlobalId,
    GlobalInit, Inst, InstId, InstKind, IntPredicate, Module, ValueRef,
};
pub use ty::{TyId, TyKind, TypeStore};
