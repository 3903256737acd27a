//! Operator overloads.
//!
//! [`Operator`] names the host slot a method implements when installed with
//! [`Class::def_op`](crate::Class::def_op).
//!
//! ```ignore
//! class.def_op(Operator::Add, |a: &Vec2, b: Vec2| Vec2::new(a.x + b.x, a.y + b.y))?;
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // === Binary ===
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Shl,
    Shr,

    // === Reflected binary (called on the right operand) ===
    AddR,
    SubR,
    MulR,
    DivR,

    // === In-place ===
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    AndAssign,
    OrAssign,
    XorAssign,

    // === Comparison ===
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // === Unary ===
    Neg,
    Pos,
    Invert,
    Abs,

    // === Protocols ===
    Hash,
    Bool,
    Int,
    Float,
    Len,
    GetItem,
    SetItem,
    Call,
    Repr,
    Str,
}

impl Operator {
    /// Host slot name for this operator.
    pub const fn method_name(&self) -> &'static str {
        match self {
            Operator::Add => "__add__",
            Operator::Sub => "__sub__",
            Operator::Mul => "__mul__",
            Operator::Div => "__truediv__",
            Operator::FloorDiv => "__floordiv__",
            Operator::Mod => "__mod__",
            Operator::Pow => "__pow__",
            Operator::And => "__and__",
            Operator::Or => "__or__",
            Operator::Xor => "__xor__",
            Operator::Shl => "__lshift__",
            Operator::Shr => "__rshift__",

            Operator::AddR => "__radd__",
            Operator::SubR => "__rsub__",
            Operator::MulR => "__rmul__",
            Operator::DivR => "__rtruediv__",

            Operator::AddAssign => "__iadd__",
            Operator::SubAssign => "__isub__",
            Operator::MulAssign => "__imul__",
            Operator::DivAssign => "__itruediv__",
            Operator::AndAssign => "__iand__",
            Operator::OrAssign => "__ior__",
            Operator::XorAssign => "__ixor__",

            Operator::Eq => "__eq__",
            Operator::Ne => "__ne__",
            Operator::Lt => "__lt__",
            Operator::Le => "__le__",
            Operator::Gt => "__gt__",
            Operator::Ge => "__ge__",

            Operator::Neg => "__neg__",
            Operator::Pos => "__pos__",
            Operator::Invert => "__invert__",
            Operator::Abs => "__abs__",

            Operator::Hash => "__hash__",
            Operator::Bool => "__bool__",
            Operator::Int => "__int__",
            Operator::Float => "__float__",
            Operator::Len => "__len__",
            Operator::GetItem => "__getitem__",
            Operator::SetItem => "__setitem__",
            Operator::Call => "__call__",
            Operator::Repr => "__repr__",
            Operator::Str => "__str__",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}
