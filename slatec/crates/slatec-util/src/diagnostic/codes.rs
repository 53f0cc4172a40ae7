//! Stable diagnostic codes.
//!
//! Every diagnostic the compiler can emit carries a `{prefix}{number}`
//! code. The numbering groups the semantic taxonomy by area: E1xxx name
//! resolution, E2xxx generics, E3xxx typing, E4xxx operators, E5xxx
//! declarations and control flow, E9xxx internal.

/// A unique code identifying a diagnostic kind.
///
/// # Examples
///
/// ```
/// use slatec_util::DiagnosticCode;
///
/// assert_eq!(DiagnosticCode::UNKNOWN_NAME.as_str(), "E1001");
/// assert_eq!(DiagnosticCode::UNKNOWN_NAME.prefix, "E");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode {
    /// The prefix ("E" for error, "W" for warning).
    pub prefix: &'static str,
    /// The numeric identifier.
    pub number: u32,
}

impl DiagnosticCode {
    /// Create a new diagnostic code.
    #[inline]
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }

    /// The full code string, e.g. `"E3001"`.
    pub fn as_str(&self) -> String {
        format!("{}{:04}", self.prefix, self.number)
    }

    // ========================================================================
    // Name resolution (E1xxx)
    // ========================================================================

    /// E1001: no binding for a name on the scope chain
    pub const UNKNOWN_NAME: Self = Self::new("E", 1001);
    /// E1002: a member is visible through more than one parent class
    pub const AMBIGUOUS_NAME: Self = Self::new("E", 1002);
    /// E1003: a `::` qualifier names an entity that owns no scope
    pub const NOT_A_SCOPE: Self = Self::new("E", 1003);
    /// E1004: a type was required but the name resolves to something else
    pub const EXPECTED_TYPE: Self = Self::new("E", 1004);
    /// E1005: a value was required but the name resolves to something else
    pub const EXPECTED_VALUE: Self = Self::new("E", 1005);
    /// E1006: a class was required (parent list, member access, `{}` init)
    pub const EXPECTED_CLASS: Self = Self::new("E", 1006);

    // ========================================================================
    // Generics (E2xxx)
    // ========================================================================

    /// E2001: wrong number of generic arguments
    pub const GENERIC_ARITY_MISMATCH: Self = Self::new("E", 2001);
    /// E2002: type argument where a constant was expected, or vice versa
    pub const GENERIC_ARGUMENT_KIND_MISMATCH: Self = Self::new("E", 2002);
    /// E2003: unbounded recursive instantiation (fatal)
    pub const GENERIC_INSTANTIATION_CYCLE: Self = Self::new("E", 2003);

    // ========================================================================
    // Typing (E3xxx)
    // ========================================================================

    /// E3001: operand or initializer has an incompatible type
    pub const TYPE_MISMATCH: Self = Self::new("E", 3001);
    /// E3002: no implicit or user conversion between the types
    pub const NOT_CASTABLE: Self = Self::new("E", 3002);
    /// E3003: assignment target is not an l-value
    pub const NOT_ASSIGNABLE: Self = Self::new("E", 3003);
    /// E3004: subscript on a type that is neither pointer, array, nor `[]`-overloaded
    pub const NOT_INDEXABLE: Self = Self::new("E", 3004);
    /// E3005: call of a non-function value
    pub const NOT_CALLABLE: Self = Self::new("E", 3005);
    /// E3006: call argument count does not match the signature
    pub const WRONG_ARGUMENT_COUNT: Self = Self::new("E", 3006);
    /// E3007: arithmetic domain error in a constant expression
    pub const ARITHMETIC_DOMAIN: Self = Self::new("E", 3007);

    // ========================================================================
    // Operators (E4xxx)
    // ========================================================================

    /// E4001: operator not defined for the operand types
    pub const INVALID_OPERATOR: Self = Self::new("E", 4001);
    /// E4002: no overload matches, or the best match is tied
    pub const NO_MATCHING_OVERLOAD: Self = Self::new("E", 4002);

    // ========================================================================
    // Declarations and control flow (E5xxx)
    // ========================================================================

    /// E5001: duplicate binding in one scope
    pub const REDECLARED_NAME: Self = Self::new("E", 5001);
    /// E5002: `const` declaration without an initializer
    pub const UNINITIALIZED_CONST: Self = Self::new("E", 5002);
    /// E5003: `break` with no enclosing loop
    pub const BREAK_OUTSIDE_LOOP: Self = Self::new("E", 5003);
    /// E5004: returned value does not convert to the declared return type
    pub const RETURN_TYPE_MISMATCH: Self = Self::new("E", 5004);

    // ========================================================================
    // Internal (E9xxx)
    // ========================================================================

    /// E9001: defensive invariant check failed (fatal; never expected)
    pub const INTERNAL_INVARIANT: Self = Self::new("E", 9001);
}

impl std::fmt::Debug for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiagnosticCode({})", self.as_str())
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
