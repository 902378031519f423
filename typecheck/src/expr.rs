use failure::Fail;
use strum_macros::{Display, EnumDiscriminants};
use type_lattice::Type;

/// An expression is either one of
/// * `Variable`: use of a variable, e.g. `p`
/// * `Literal`: a literal value entered in the code, e.g. `3`
/// * `Null`: the `null` keyword; its type is always the null type
/// * `MethodCall`: a method invocation on a receiver, e.g. `p.getX()`
/// * `ConstructorCall`: an object instantiation, e.g. `new Point(3, 4)`
///
/// Nodes are immutable after construction. Composite nodes exclusively own
/// their children; the tree is acyclic by construction.
#[derive(EnumDiscriminants, Debug, Clone, PartialEq, Eq)]
#[strum_discriminants(derive(Display))]
pub enum Expr {
    Variable {
        name: String,
        declared_type: Type,
    },
    Literal {
        value: String,
        ty: Type,
    },
    Null,
    MethodCall {
        receiver: Box<Expr>,
        method_name: String,
        args: Vec<Expr>,
    },
    ConstructorCall {
        instantiated_type: Type,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// The syntactic declared type of this node. Only variables carry one;
    /// every other node kind fails. Callers that want the computed type of
    /// an arbitrary expression use `static_type` instead.
    pub fn declared_type(&self) -> Result<&Type, NoDeclaredType> {
        match self {
            Expr::Variable { declared_type, .. } => Ok(declared_type),
            _ => Err(NoDeclaredType {
                kind: ExprDiscriminants::from(self),
            }),
        }
    }
}

/// Raised when the declared type of a node that does not carry one is
/// requested, e.g. when taking the `static_type` of a method call whose
/// receiver is not a variable.
#[derive(Debug, Fail)]
#[fail(display = "{} expression has no declared type", kind)]
pub struct NoDeclaredType {
    pub kind: ExprDiscriminants,
}
