//! Homomorphic operations understood by the arithmetic backend, and their
//! typing rules.

use crate::value::ValueType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
    Neg,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Rotl,
    Rotr,
    /// `select(cond, if_true, if_false)`
    Select,
    Cast(ValueType),
}

impl Operation {
    pub fn arity(self) -> usize {
        match self {
            Operation::Neg | Operation::Not | Operation::Cast(_) => 1,
            Operation::Select => 3,
            _ => 2,
        }
    }

    /// Stable one byte code, used by backends to derive handle identifiers.
    pub fn code(self) -> u8 {
        match self {
            Operation::Add => 0x01,
            Operation::Sub => 0x02,
            Operation::Mul => 0x03,
            Operation::Div => 0x04,
            Operation::Rem => 0x05,
            Operation::Min => 0x06,
            Operation::Max => 0x07,
            Operation::Neg => 0x08,
            Operation::Eq => 0x10,
            Operation::Ne => 0x11,
            Operation::Gt => 0x12,
            Operation::Ge => 0x13,
            Operation::Lt => 0x14,
            Operation::Le => 0x15,
            Operation::And => 0x20,
            Operation::Or => 0x21,
            Operation::Xor => 0x22,
            Operation::Not => 0x23,
            Operation::Shl => 0x24,
            Operation::Shr => 0x25,
            Operation::Rotl => 0x26,
            Operation::Rotr => 0x27,
            Operation::Select => 0x30,
            Operation::Cast(ty) => 0x40 | ty.tag(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
            Operation::Rem => "rem",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::Neg => "neg",
            Operation::Eq => "eq",
            Operation::Ne => "ne",
            Operation::Gt => "gt",
            Operation::Ge => "ge",
            Operation::Lt => "lt",
            Operation::Le => "le",
            Operation::And => "and",
            Operation::Or => "or",
            Operation::Xor => "xor",
            Operation::Not => "not",
            Operation::Shl => "shl",
            Operation::Shr => "shr",
            Operation::Rotl => "rotl",
            Operation::Rotr => "rotr",
            Operation::Select => "select",
            Operation::Cast(_) => "cast",
        }
    }

    /// Type of the result of applying `self` to operands of the given types,
    /// or `None` if the operands are not acceptable.
    pub fn result_type(self, operands: &[ValueType]) -> Option<ValueType> {
        if operands.len() != self.arity() {
            return None;
        }
        match (self, operands) {
            (
                Operation::Add
                | Operation::Sub
                | Operation::Mul
                | Operation::Div
                | Operation::Rem
                | Operation::Min
                | Operation::Max
                | Operation::Shl
                | Operation::Shr
                | Operation::Rotl
                | Operation::Rotr,
                [a, b],
            ) if a == b && a.is_unsigned() => Some(*a),
            (Operation::Neg, [a]) if a.is_unsigned() => Some(*a),
            (Operation::Eq | Operation::Ne, [a, b]) if a == b => Some(ValueType::Bool),
            (Operation::Gt | Operation::Ge | Operation::Lt | Operation::Le, [a, b])
                if a == b && a.is_unsigned() =>
            {
                Some(ValueType::Bool)
            }
            (Operation::And | Operation::Or | Operation::Xor, [a, b])
                if a == b && (a.is_unsigned() || *a == ValueType::Bool) =>
            {
                Some(*a)
            }
            (Operation::Not, [a]) if a.is_unsigned() || *a == ValueType::Bool => Some(*a),
            (Operation::Select, [ValueType::Bool, a, b]) if a == b => Some(*a),
            (Operation::Cast(to), [from])
                if (to.is_unsigned() || to == ValueType::Bool)
                    && (from.is_unsigned() || *from == ValueType::Bool) =>
            {
                Some(to)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Cast(ty) => write!(f, "cast<{}>", ty),
            op => f.write_str(op.name()),
        }
    }
}
