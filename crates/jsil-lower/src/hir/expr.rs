//! HIR expressions and patterns

use super::scope::{BindingId, ScopeId};
use crate::lir::CallableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    InstanceOf,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// Reference to a nested function compiled separately
#[derive(Debug, Clone)]
pub struct FunctionRef {
    pub callable: CallableId,
    /// The nested function's own scope
    pub scope: ScopeId,
    pub is_arrow: bool,
}

#[derive(Debug, Clone)]
pub enum ArrayElement {
    Item(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Named(String),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub enum ObjectMember {
    Property { key: PropertyKey, value: Expr },
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum Argument {
    Plain(Expr),
    Spread(Expr),
}

impl Argument {
    pub fn expr(&self) -> &Expr {
        match self {
            Argument::Plain(expr) | Argument::Spread(expr) => expr,
        }
    }

    pub fn is_spread(&self) -> bool {
        matches!(self, Argument::Spread(_))
    }
}

/// Callee of a `new` expression
#[derive(Debug, Clone)]
pub enum NewCallee {
    UserClass(String),
    Intrinsic(String),
    Value(Box<Expr>),
}

/// Destructuring / binding pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    Binding(BindingId),
    /// Assignment target that is not a binding (`obj.x`, `arr[i]`)
    Target(Box<Expr>),
    Object {
        properties: Vec<(String, Pattern)>,
        rest: Option<Box<Pattern>>,
    },
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    /// `target = default`, applied when the incoming value is `undefined`
    Default {
        target: Box<Pattern>,
        default: Box<Expr>,
    },
}

impl Pattern {
    /// Name reported by a destructuring guard: the first bound identifier or key
    pub fn first_target_name(&self) -> Option<String> {
        match self {
            Pattern::Binding(_) | Pattern::Target(_) => None,
            Pattern::Object { properties, .. } => properties.first().map(|(key, _)| key.clone()),
            Pattern::Array { elements, .. } => elements
                .iter()
                .position(|element| element.is_some())
                .map(|index| index.to_string()),
            Pattern::Default { target, .. } => target.first_target_name(),
        }
    }

    pub fn contains_suspend(&self) -> bool {
        match self {
            Pattern::Binding(_) => false,
            Pattern::Target(expr) => expr.contains_suspend(),
            Pattern::Object { properties, rest } => {
                properties.iter().any(|(_, pattern)| pattern.contains_suspend())
                    || rest.as_ref().is_some_and(|rest| rest.contains_suspend())
            }
            Pattern::Array { elements, rest } => {
                elements.iter().flatten().any(Pattern::contains_suspend)
                    || rest.as_ref().is_some_and(|rest| rest.contains_suspend())
            }
            Pattern::Default { target, default } => {
                target.contains_suspend() || default.contains_suspend()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Variable(BindingId),
    /// Well-known runtime global (`console`, `Math`, `parseInt`)
    Intrinsic(String),
    /// A user class used as a value (`Point`)
    ClassRef(String),
    This,
    Array(Vec<ArrayElement>),
    Object(Vec<ObjectMember>),
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Pattern,
        value: Box<Expr>,
    },
    CompoundAssign {
        op: BinaryOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        optional: bool,
    },
    SuperCall(Vec<Argument>),
    New {
        callee: NewCallee,
        args: Vec<Argument>,
    },
    Function(FunctionRef),
    Sequence(Vec<Expr>),
    Await(Box<Expr>),
    Yield {
        argument: Option<Box<Expr>>,
        delegate: bool,
    },
}

impl Expr {
    pub fn var(binding: BindingId) -> Self {
        Expr::Variable(binding)
    }

    pub fn num(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn string(value: &str) -> Self {
        Expr::String(value.to_string())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(binding: BindingId, value: Expr) -> Self {
        Expr::Assign {
            target: Pattern::Binding(binding),
            value: Box::new(value),
        }
    }

    pub fn member(object: Expr, property: &str) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
            optional: false,
        }
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
            optional: false,
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args: args.into_iter().map(Argument::Plain).collect(),
            optional: false,
        }
    }

    pub fn update(op: UpdateOp, prefix: bool, target: Expr) -> Self {
        Expr::Update {
            op,
            prefix,
            target: Box::new(target),
        }
    }

    /// Evaluating the expression may suspend the enclosing function.
    /// Nested functions are opaque.
    pub fn contains_suspend(&self) -> bool {
        match self {
            Expr::Await(_) | Expr::Yield { .. } => true,
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Bool(_)
            | Expr::Null
            | Expr::Undefined
            | Expr::Variable(_)
            | Expr::Intrinsic(_)
            | Expr::ClassRef(_)
            | Expr::This
            | Expr::Function(_) => false,
            Expr::Array(elements) => elements.iter().any(|element| match element {
                ArrayElement::Item(expr) | ArrayElement::Spread(expr) => expr.contains_suspend(),
                ArrayElement::Hole => false,
            }),
            Expr::Object(members) => members.iter().any(|member| match member {
                ObjectMember::Property { key, value } => {
                    matches!(key, PropertyKey::Computed(expr) if expr.contains_suspend())
                        || value.contains_suspend()
                }
                ObjectMember::Spread(expr) => expr.contains_suspend(),
            }),
            Expr::Template { exprs, .. } | Expr::Sequence(exprs) => {
                exprs.iter().any(Expr::contains_suspend)
            }
            Expr::Unary { operand, .. } => operand.contains_suspend(),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                left.contains_suspend() || right.contains_suspend()
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => test.contains_suspend() || consequent.contains_suspend() || alternate.contains_suspend(),
            Expr::Assign { target, value } => target.contains_suspend() || value.contains_suspend(),
            Expr::CompoundAssign { target, value, .. } => {
                target.contains_suspend() || value.contains_suspend()
            }
            Expr::Update { target, .. } => target.contains_suspend(),
            Expr::Member { object, .. } => object.contains_suspend(),
            Expr::Index { object, index, .. } => object.contains_suspend() || index.contains_suspend(),
            Expr::Call { callee, args, .. } => {
                callee.contains_suspend() || args.iter().any(|arg| arg.expr().contains_suspend())
            }
            Expr::SuperCall(args) => args.iter().any(|arg| arg.expr().contains_suspend()),
            Expr::New { callee, args } => {
                matches!(callee, NewCallee::Value(expr) if expr.contains_suspend())
                    || args.iter().any(|arg| arg.expr().contains_suspend())
            }
        }
    }
}
