//! slatec-drv - Programmatic compiler driver.
//!
//! The core's entry point: feed pre-built syntax trees (lexing, parsing,
//! and file loading belong to the outer driver) and receive either the
//! elaborated SSA module or the full diagnostic list, sorted by file and
//! position. A fatal diagnostic (instantiation cycle, internal
//! invariant) aborts the unit group early; everything else recovers and
//! keeps elaborating.
//!
//! # Examples
//!
//! ```
//! use slatec_drv::{compile_units, CompileOptions};
//!
//! let units = Vec::new();
//! let module = compile_units(&units, &CompileOptions::default()).unwrap();
//! assert_eq!(module.emit().lines().next(), Some("; module 'slate'"));
//! ```

use slatec_ast as ast;
use slatec_sem::GenCtx;
use slatec_ssa::DataLayout;
use slatec_util::{Diagnostic, Handler};

/// Compilation parameters.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Name stamped on the output module.
    pub module_name: String,
    /// Target pointer width in bits; drives struct-return and layout
    /// decisions.
    pub ptr_bits: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_name: "slate".to_string(),
            ptr_bits: 64,
        }
    }
}

/// Elaborate a group of units into one SSA module.
///
/// Returns the module when no error-level diagnostic was recorded;
/// otherwise every diagnostic, sorted by file then position, each
/// reported once.
pub fn compile_units(
    units: &[ast::Unit],
    options: &CompileOptions,
) -> Result<slatec_ssa::Module, Vec<Diagnostic>> {
    let handler = Handler::new();
    let mut module = slatec_ssa::Module::new(
        options.module_name.clone(),
        DataLayout::new(options.ptr_bits),
    );

    {
        let mut ctx = GenCtx::new(&mut module, &handler);
        for unit in units {
            // A fatal error poisons the whole unit group.
            if ctx.elaborate_unit(unit).is_err() {
                break;
            }
        }
    }

    if handler.has_errors() {
        Err(handler.take_sorted())
    } else {
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_module() {
        let module = compile_units(&[], &CompileOptions::default()).unwrap();
        assert_eq!(module.functions.len(), 0);
        assert_eq!(module.globals.len(), 0);
    }

    #[test]
    fn options_carry_module_name_and_layout() {
        let options = CompileOptions {
            module_name: "custom".to_string(),
            ptr_bits: 32,
        };
        let module = compile_units(&[], &options).unwrap();
        assert_eq!(module.name, "custom");
        assert_eq!(module.layout.ptr_bits, 32);
    }
}
