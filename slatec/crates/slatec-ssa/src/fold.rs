//! Constant folding over literal operands.
//!
//! The elaborator folds `literal op literal` in the constant domain
//! instead of emitting an instruction. Integer arithmetic wraps in two's
//! complement at the operand width; signed operations interpret the bit
//! pattern as signed. Folding refuses division by zero (`None`) so the
//! caller can diagnose it, and refuses mixed-kind operands.

use crate::module::{mask_to_width, sign_extend, BinOp, Const};

/// Fold a binary operation over two constants.
///
/// Returns `None` when the operands do not fold: mismatched kinds,
/// division or remainder by zero, or non-numeric constants.
pub fn fold_bin(op: BinOp, lhs: Const, rhs: Const) -> Option<Const> {
    match (lhs, rhs) {
        (Const::Int { bits, value: l }, Const::Int { value: r, .. }) => {
            fold_int(op, bits, l, r).map(|value| Const::int(bits, value))
        }
        (Const::Float { bits, value: l }, Const::Float { value: r, .. }) => {
            fold_float(op, l, r).map(|value| Const::Float { bits, value })
        }
        _ => None,
    }
}

fn fold_int(op: BinOp, bits: u32, lhs: u64, rhs: u64) -> Option<u64> {
    let sl = sign_extend(lhs, bits);
    let sr = sign_extend(rhs, bits);
    let shift = if bits == 0 { 0 } else { (rhs % u64::from(bits)) as u32 };

    let raw = match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::SDiv => {
            if sr == 0 {
                return None;
            }
            sl.wrapping_div(sr) as u64
        }
        BinOp::SRem => {
            if sr == 0 {
                return None;
            }
            sl.wrapping_rem(sr) as u64
        }
        BinOp::And => lhs & rhs,
        BinOp::Or => lhs | rhs,
        BinOp::Xor => lhs ^ rhs,
        BinOp::Shl => lhs.wrapping_shl(shift),
        BinOp::AShr => (sl >> shift) as u64,
        BinOp::LShr => lhs.wrapping_shr(shift),
        _ => return None,
    };
    Some(mask_to_width(raw, bits))
}

fn fold_float(op: BinOp, lhs: f64, rhs: f64) -> Option<f64> {
    Some(match op {
        BinOp::FAdd => lhs + rhs,
        BinOp::FSub => lhs - rhs,
        BinOp::FMul => lhs * rhs,
        BinOp::FDiv => lhs / rhs,
        BinOp::FRem => lhs % rhs,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32c(v: i64) -> Const {
        Const::int(32, v as u64)
    }

    #[test]
    fn addition_folds() {
        let r = fold_bin(BinOp::Add, i32c(10), i32c(20)).unwrap();
        assert_eq!(r.as_int_signed(), Some(30));
    }

    #[test]
    fn i32_overflow_wraps() {
        let r = fold_bin(BinOp::Add, i32c(i32::MAX as i64), i32c(1)).unwrap();
        assert_eq!(r.as_int_signed(), Some(i32::MIN as i64));

        let r = fold_bin(BinOp::Mul, i32c(1 << 20), i32c(1 << 20)).unwrap();
        assert_eq!(r.as_int_signed(), Some(0));
    }

    #[test]
    fn signed_division() {
        let r = fold_bin(BinOp::SDiv, i32c(-7), i32c(2)).unwrap();
        assert_eq!(r.as_int_signed(), Some(-3));

        let r = fold_bin(BinOp::SRem, i32c(-7), i32c(2)).unwrap();
        assert_eq!(r.as_int_signed(), Some(-1));
    }

    #[test]
    fn division_by_zero_refuses() {
        assert_eq!(fold_bin(BinOp::SDiv, i32c(1), i32c(0)), None);
        assert_eq!(fold_bin(BinOp::SRem, i32c(1), i32c(0)), None);
    }

    #[test]
    fn shifts() {
        let r = fold_bin(BinOp::Shl, i32c(1), i32c(4)).unwrap();
        assert_eq!(r.as_int_signed(), Some(16));

        // >> is arithmetic: sign is preserved.
        let r = fold_bin(BinOp::AShr, i32c(-16), i32c(2)).unwrap();
        assert_eq!(r.as_int_signed(), Some(-4));

        // >>> is logical: zeros shift in.
        let r = fold_bin(BinOp::LShr, i32c(-1), i32c(28)).unwrap();
        assert_eq!(r.as_int_signed(), Some(0xF));
    }

    #[test]
    fn float_folds() {
        let a = Const::Float {
            bits: 64,
            value: 1.5,
        };
        let b = Const::Float {
            bits: 64,
            value: 0.25,
        };
        let r = fold_bin(BinOp::FAdd, a, b).unwrap();
        assert_eq!(
            r,
            Const::Float {
                bits: 64,
                value: 1.75
            }
        );
    }

    #[test]
    fn mixed_kinds_do_not_fold() {
        let i = i32c(1);
        let f = Const::Float {
            bits: 64,
            value: 1.0,
        };
        assert_eq!(fold_bin(BinOp::Add, i, f), None);
    }
}
