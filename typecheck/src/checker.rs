use crate::expr::Expr;
use failure::{Error, Fail};
use itertools::Itertools;
use type_lattice::{Type, TypeLattice};

/// Indicates a compile-time type error in an expression.
#[derive(Debug, Fail)]
pub enum TypeError {
    #[fail(display = "Type {} does not have methods", type_name)]
    CallOnNonReference { type_name: String },
    #[fail(display = "Type {} is not instantiable", type_name)]
    NotInstantiable { type_name: String },
    #[fail(
        display = "Wrong number of arguments for {}: expected {}, got {}",
        call_name, expected, got
    )]
    WrongArgumentCount {
        call_name: String,
        expected: usize,
        got: usize,
    },
    #[fail(
        display = "{} expects arguments of type {}, but got {}",
        call_name, expected, got
    )]
    MismatchedArgumentTypes {
        call_name: String,
        expected: String,
        got: String,
    },
}

impl Expr {
    /// Returns the compile-time type of this expression, i.e. the most
    /// specific type that describes all the possible values it could take on
    /// at runtime. Performs no validation.
    ///
    /// For method calls the return type is looked up from the receiver's
    /// *declared* type, so a receiver that is not a variable, or whose
    /// declared type lacks the method, surfaces that failure here even when
    /// `check_types` would pass. Callers needing a safe query should run
    /// `check_types` first.
    pub fn static_type(&self, lattice: &TypeLattice) -> Result<Type, Error> {
        use crate::expr::Expr::*;
        match self {
            Variable { declared_type, .. } => Ok(declared_type.clone()),
            Literal { ty, .. } => Ok(ty.clone()),
            Null => Ok(Type::Null),
            MethodCall {
                receiver,
                method_name,
                ..
            } => {
                let declared = receiver.declared_type()?;
                let method = lattice.method_named(declared, method_name)?;
                Ok(method.return_ty.clone())
            }
            ConstructorCall {
                instantiated_type, ..
            } => Ok(instantiated_type.clone()),
        }
    }

    /// Validates this expression, checking argument subtrees first
    /// (depth-first, left-to-right) and then the operation itself. The first
    /// failure aborts the whole check; a successful check has no observable
    /// effect and may be repeated. Receivers are typed, not re-validated.
    ///
    /// Type errors are reported as [`TypeError`]; a failed method lookup
    /// propagates the lattice's [`type_lattice::NoSuchMethod`] unchanged.
    pub fn check_types(&self, lattice: &TypeLattice) -> Result<(), Error> {
        use crate::expr::Expr::*;
        match self {
            // leaves carry their type directly and are well-typed by
            // construction
            Variable { .. } | Literal { .. } | Null => Ok(()),

            MethodCall {
                receiver,
                method_name,
                args,
            } => {
                for arg in args {
                    arg.check_types(lattice)?;
                }

                let receiver_type = receiver.static_type(lattice)?;
                if !receiver_type.is_subtype_of(&lattice.object(), lattice) {
                    return Err(TypeError::CallOnNonReference {
                        type_name: receiver_type.name().to_string(),
                    }
                    .into());
                }

                let method = lattice.method_named(&receiver_type, method_name)?;
                let actual = args
                    .iter()
                    .map(|arg| arg.static_type(lattice))
                    .collect::<Result<Vec<_>, _>>()?;
                let call_name = format!("{}.{}()", receiver_type.name(), method_name);
                log::debug!("checking call to {}", call_name);

                check_arguments(&method.argument_types(), &actual, &call_name, lattice)?;
                Ok(())
            }

            ConstructorCall {
                instantiated_type,
                args,
            } => {
                for arg in args {
                    arg.check_types(lattice)?;
                }

                if !lattice.is_instantiable(instantiated_type) {
                    return Err(TypeError::NotInstantiable {
                        type_name: instantiated_type.name().to_string(),
                    }
                    .into());
                }

                let constructor = lattice
                    .constructor(instantiated_type)
                    .expect("instantiable types always have a constructor");
                let actual = args
                    .iter()
                    .map(|arg| arg.static_type(lattice))
                    .collect::<Result<Vec<_>, _>>()?;
                let call_name = format!("{} constructor", instantiated_type.name());
                log::debug!("checking {}", call_name);

                check_arguments(&constructor.argument_types(), &actual, &call_name, lattice)?;
                Ok(())
            }
        }
    }
}

/// Validates actual argument types against the expected parameter types of a
/// call site. On a positional mismatch the error lists the full expected and
/// actual type sequences, not just the offending pair.
pub fn check_arguments(
    expected: &[&Type],
    actual: &[Type],
    call_name: &str,
    lattice: &TypeLattice,
) -> Result<(), TypeError> {
    if expected.len() != actual.len() {
        return Err(TypeError::WrongArgumentCount {
            call_name: call_name.to_string(),
            expected: expected.len(),
            got: actual.len(),
        });
    }

    for (expected_ty, actual_ty) in expected.iter().zip(actual) {
        if !expected_ty.is_supertype_of(actual_ty, lattice) {
            return Err(TypeError::MismatchedArgumentTypes {
                call_name: call_name.to_string(),
                expected: type_names(expected.iter().cloned()),
                got: type_names(actual.iter()),
            });
        }
    }

    Ok(())
}

fn type_names<'a>(types: impl Iterator<Item = &'a Type>) -> String {
    format!("({})", types.map(Type::name).join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_lattice::{ClassDef, ConstructorDef, MethodDef, MethodParamDef, NoSuchMethod};

    fn point_lattice() -> (TypeLattice, Type) {
        let mut lattice = TypeLattice::new();
        let point = lattice.add_class(ClassDef::new("Point")).unwrap();
        {
            let class = lattice.class_mut(&point);
            class.set_constructor(ConstructorDef::new(vec![
                MethodParamDef::new("x", Type::Int),
                MethodParamDef::new("y", Type::Int),
            ]));
            class
                .add_method(MethodDef::new("getX", vec![], Type::Int))
                .unwrap();
            class
                .add_method(MethodDef::new("getY", vec![], Type::Int))
                .unwrap();
        }
        (lattice, point.into())
    }

    fn var(name: &str, ty: &Type) -> Expr {
        Expr::Variable {
            name: name.to_string(),
            declared_type: ty.clone(),
        }
    }

    fn lit(value: &str, ty: Type) -> Expr {
        Expr::Literal {
            value: value.to_string(),
            ty,
        }
    }

    fn call(receiver: Expr, method_name: &str, args: Vec<Expr>) -> Expr {
        Expr::MethodCall {
            receiver: Box::new(receiver),
            method_name: method_name.to_string(),
            args,
        }
    }

    fn construct(ty: &Type, args: Vec<Expr>) -> Expr {
        Expr::ConstructorCall {
            instantiated_type: ty.clone(),
            args,
        }
    }

    fn type_error_message(expr: &Expr, lattice: &TypeLattice) -> String {
        let err = expr.check_types(lattice).unwrap_err();
        err.downcast_ref::<TypeError>()
            .expect("expected a type error")
            .to_string()
    }

    #[test]
    fn variable_static_type_is_its_declared_type() {
        let (lattice, point) = point_lattice();
        let p = var("p", &point);
        assert_eq!(p.static_type(&lattice).unwrap(), point);
        p.check_types(&lattice).unwrap();
        assert_eq!(p.static_type(&lattice).unwrap(), point);
    }

    #[test]
    fn literal_static_type_is_its_stored_type() {
        let (lattice, _) = point_lattice();
        assert_eq!(
            lit("3", Type::Int).static_type(&lattice).unwrap(),
            Type::Int
        );
    }

    #[test]
    fn null_static_type_is_the_null_type() {
        let (lattice, _) = point_lattice();
        assert_eq!(Expr::Null.static_type(&lattice).unwrap(), Type::Null);
        Expr::Null.check_types(&lattice).unwrap();
    }

    #[test]
    fn zero_argument_call_checks_and_types() {
        let (lattice, point) = point_lattice();
        let expr = call(var("p", &point), "getX", vec![]);
        expr.check_types(&lattice).unwrap();
        assert_eq!(expr.static_type(&lattice).unwrap(), Type::Int);
    }

    #[test]
    fn call_on_primitive_receiver_is_a_type_error() {
        let (lattice, _) = point_lattice();
        let expr = call(var("n", &Type::Int), "getX", vec![]);
        assert!(type_error_message(&expr, &lattice).contains("Type int does not have methods"));
    }

    #[test]
    fn call_on_null_receiver_is_a_type_error() {
        let (lattice, _) = point_lattice();
        let expr = call(Expr::Null, "getX", vec![]);
        assert!(type_error_message(&expr, &lattice).contains("Type null does not have methods"));
    }

    #[test]
    fn unknown_method_propagates_the_lattice_error_unwrapped() {
        let (lattice, point) = point_lattice();
        let expr = call(var("p", &point), "getZ", vec![]);
        let err = expr.check_types(&lattice).unwrap_err();
        assert!(err.downcast_ref::<TypeError>().is_none());
        let no_such_method = err
            .downcast_ref::<NoSuchMethod>()
            .expect("expected the lookup failure itself");
        assert_eq!(no_such_method.method_name, "getZ");
    }

    #[test]
    fn constructor_call_checks_and_types() {
        let (lattice, point) = point_lattice();
        let expr = construct(&point, vec![lit("3", Type::Int), lit("4", Type::Int)]);
        expr.check_types(&lattice).unwrap();
        assert_eq!(expr.static_type(&lattice).unwrap(), point);
    }

    #[test]
    fn constructor_arity_mismatch_reports_both_counts() {
        let (lattice, point) = point_lattice();
        let expr = construct(&point, vec![lit("3", Type::Int)]);
        let message = type_error_message(&expr, &lattice);
        assert!(message.contains("Wrong number of arguments for Point constructor"));
        assert!(message.contains("expected 2, got 1"));
    }

    #[test]
    fn argument_mismatch_lists_full_type_sequences() {
        let (lattice, point) = point_lattice();
        let expr = construct(
            &point,
            vec![lit("3", Type::Int), lit("true", Type::Boolean)],
        );
        let message = type_error_message(&expr, &lattice);
        assert!(message.contains("expects arguments of type (int, int)"));
        assert!(message.contains("but got (int, boolean)"));
    }

    #[test]
    fn constructor_static_type_skips_validation() {
        let (lattice, point) = point_lattice();
        let expr = construct(&point, vec![]);
        assert!(expr.check_types(&lattice).is_err());
        assert_eq!(expr.static_type(&lattice).unwrap(), point);
    }

    #[test]
    fn check_types_is_idempotent() {
        let (lattice, point) = point_lattice();
        let expr = construct(&point, vec![lit("3", Type::Int), lit("4", Type::Int)]);
        expr.check_types(&lattice).unwrap();
        expr.check_types(&lattice).unwrap();
        assert_eq!(expr.static_type(&lattice).unwrap(), point);
    }

    #[test]
    fn static_type_of_chained_call_surfaces_the_missing_declared_type() {
        let (lattice, point) = point_lattice();
        // p.getX() is fine, but (p.getX()).hashCode() has a receiver with no
        // declared type: static_type fails where check_types reports the
        // actual problem (int receiver)
        let inner = call(var("p", &point), "getX", vec![]);
        let outer = call(inner, "hashCode", vec![]);

        let err = outer.static_type(&lattice).unwrap_err();
        assert!(err.downcast_ref::<crate::expr::NoDeclaredType>().is_some());
        assert!(err.to_string().contains("MethodCall"));

        assert!(type_error_message(&outer, &lattice).contains("does not have methods"));
    }

    #[test]
    fn first_failing_argument_aborts_the_check() {
        let (lattice, point) = point_lattice();
        let bad_arity = construct(&point, vec![lit("3", Type::Int)]);
        let bad_types = construct(&point, vec![lit("true", Type::Boolean), lit("0", Type::Int)]);
        // equals() takes one argument, so the call itself is also wrong, but
        // the left-most broken argument wins
        let expr = call(var("p", &point), "equals", vec![bad_arity, bad_types]);
        let message = type_error_message(&expr, &lattice);
        assert!(message.contains("Wrong number of arguments for Point constructor"));
    }

    #[test]
    fn check_arguments_accepts_exact_matches() {
        let (lattice, point) = point_lattice();
        let expected = [&Type::Int, &point];
        let actual = [Type::Int, point.clone()];
        check_arguments(&expected, &actual, "Demo.call()", &lattice).unwrap();
    }

    #[test]
    fn check_arguments_labels_the_call_site() {
        let (lattice, _) = point_lattice();
        let err = check_arguments(&[&Type::Int], &[], "Demo.call()", &lattice).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wrong number of arguments for Demo.call(): expected 1, got 0"
        );
    }
}
