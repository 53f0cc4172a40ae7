//! The closed diagnostic taxonomy of the semantic core.
//!
//! Every kind maps to one stable [`DiagnosticCode`]. Only two kinds are
//! fatal; everything else is recorded and elaboration continues with
//! poisoned values so one mistake does not drown the rest of the unit in
//! follow-on noise.

use slatec_util::{DiagnosticCode, Symbol};
use thiserror::Error;

/// Result alias for elaboration functions: `Err` means the current
/// translation unit is being aborted. The diagnostic has already been
/// emitted when the error is raised.
pub type SemResult<T> = Result<T, Fatal>;

/// Fatal abort marker; see [`slatec_util::error::FatalError`].
pub type Fatal = slatec_util::error::FatalError;

/// One diagnostic kind from the closed taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagKind {
    #[error("unknown name `{0}`")]
    UnknownName(Symbol),

    #[error("`{0}` is ambiguous: it is reachable through more than one parent class")]
    AmbiguousName(Symbol),

    #[error("`{0}` does not name a scope")]
    NotAScope(Symbol),

    #[error("expected a type, found `{0}`")]
    ExpectedType(Symbol),

    #[error("expected a value")]
    ExpectedValue,

    #[error("expected a class type, found `{0}`")]
    ExpectedClass(String),

    #[error("wrong number of generic arguments for `{name}`: expected {expected}, found {found}")]
    GenericArityMismatch {
        name: Symbol,
        expected: usize,
        found: usize,
    },

    #[error("generic argument for parameter `{0}` has the wrong kind")]
    GenericArgumentKindMismatch(Symbol),

    #[error("instantiation of `{0}` recurses without reaching a fixed point")]
    GenericInstantiationCycle(Symbol),

    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("no conversion from `{from}` to `{to}`")]
    NotCastable { from: String, to: String },

    #[error("expression is not assignable")]
    NotAssignable,

    #[error("type `{0}` cannot be indexed")]
    NotIndexable(String),

    #[error("expression is not callable")]
    NotCallable,

    #[error("wrong number of arguments: expected {expected}, found {found}")]
    WrongArgumentCount { expected: usize, found: usize },

    #[error("operator `{op}` is not defined for `{ty}`")]
    InvalidOperator { op: String, ty: String },

    #[error("no matching overload for `{0}`")]
    NoMatchingOverload(Symbol),

    #[error("`{0}` is already declared in this scope")]
    RedeclaredName(Symbol),

    #[error("`const` declaration of `{0}` requires an initializer")]
    UninitializedConst(Symbol),

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("returned value does not convert to the function return type `{0}`")]
    ReturnTypeMismatch(String),

    #[error("division by zero in a constant expression")]
    ArithmeticDomain,

    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
}

impl DiagKind {
    /// The stable code for this kind.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            DiagKind::UnknownName(_) => DiagnosticCode::UNKNOWN_NAME,
            DiagKind::AmbiguousName(_) => DiagnosticCode::AMBIGUOUS_NAME,
            DiagKind::NotAScope(_) => DiagnosticCode::NOT_A_SCOPE,
            DiagKind::ExpectedType(_) => DiagnosticCode::EXPECTED_TYPE,
            DiagKind::ExpectedValue => DiagnosticCode::EXPECTED_VALUE,
            DiagKind::ExpectedClass(_) => DiagnosticCode::EXPECTED_CLASS,
            DiagKind::GenericArityMismatch { .. } => DiagnosticCode::GENERIC_ARITY_MISMATCH,
            DiagKind::GenericArgumentKindMismatch(_) => {
                DiagnosticCode::GENERIC_ARGUMENT_KIND_MISMATCH
            }
            DiagKind::GenericInstantiationCycle(_) => DiagnosticCode::GENERIC_INSTANTIATION_CYCLE,
            DiagKind::TypeMismatch { .. } => DiagnosticCode::TYPE_MISMATCH,
            DiagKind::NotCastable { .. } => DiagnosticCode::NOT_CASTABLE,
            DiagKind::NotAssignable => DiagnosticCode::NOT_ASSIGNABLE,
            DiagKind::NotIndexable(_) => DiagnosticCode::NOT_INDEXABLE,
            DiagKind::NotCallable => DiagnosticCode::NOT_CALLABLE,
            DiagKind::WrongArgumentCount { .. } => DiagnosticCode::WRONG_ARGUMENT_COUNT,
            DiagKind::InvalidOperator { .. } => DiagnosticCode::INVALID_OPERATOR,
            DiagKind::NoMatchingOverload(_) => DiagnosticCode::NO_MATCHING_OVERLOAD,
            DiagKind::RedeclaredName(_) => DiagnosticCode::REDECLARED_NAME,
            DiagKind::UninitializedConst(_) => DiagnosticCode::UNINITIALIZED_CONST,
            DiagKind::BreakOutsideLoop => DiagnosticCode::BREAK_OUTSIDE_LOOP,
            DiagKind::ReturnTypeMismatch(_) => DiagnosticCode::RETURN_TYPE_MISMATCH,
            DiagKind::ArithmeticDomain => DiagnosticCode::ARITHMETIC_DOMAIN,
            DiagKind::InternalInvariant(_) => DiagnosticCode::INTERNAL_INVARIANT,
        }
    }

    /// True for kinds that abort the translation unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagKind::GenericInstantiationCycle(_) | DiagKind::InternalInvariant(_)
        )
    }
}
