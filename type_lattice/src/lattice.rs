#![warn(
    clippy::print_stdout,
    clippy::unimplemented,
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::match_same_arms,
    clippy::use_self
)]

//! Nominal type lattice: class definitions, method and constructor
//! signatures and the subtype relation the expression checker queries.
//!
//! The lattice is built in two phases. `add_class` declares a class and
//! issues a [`ClassId`]; `class_mut` then populates its members. This allows
//! signatures to refer to classes that are declared later (or to the class
//! being populated itself).

use failure::Fail;
use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    fmt,
    rc::Rc,
};

const OBJECT_CLASS_NAME: &str = "Object";

/// Names within this edit distance of a failed method lookup are offered as
/// a hint in the resulting [`NoSuchMethod`].
const NEAR_MISS_DISTANCE: usize = 2;

#[derive(Debug)]
pub struct ClassAlreadyDeclared;

/// Raised when a method lookup on a type fails, either because the type has
/// no methods at all (primitives, null) or because no visible method of the
/// requested name exists.
#[derive(Debug, Fail)]
#[fail(display = "{} has no method named '{}'{}", type_name, method_name, hint)]
pub struct NoSuchMethod {
    pub type_name: String,
    pub method_name: String,
    hint: String,
}

impl NoSuchMethod {
    fn new(type_name: &str, method_name: &str, suggestion: Option<&str>) -> NoSuchMethod {
        NoSuchMethod {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
            hint: match suggestion {
                Some(name) => format!(" (similarly named: '{}')", name),
                None => String::new(),
            },
        }
    }
}

/// A `ClassId` refers to a class definition.
///
/// Having an instance of this struct ensures that the lattice that issued it
/// can provide the definition of that class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassId {
    id: Rc<str>,
}

impl ClassId {
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &'_ mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<ClassId> for Type {
    fn from(id: ClassId) -> Type {
        Type::Reference(id)
    }
}

/// The compile-time type of an expression. Primitives and the distinguished
/// null type are inline variants; every class or interface is a `Reference`
/// into the lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Boolean,
    Void,
    Null,
    Reference(ClassId),
}

impl Type {
    pub fn name(&self) -> &str {
        use self::Type::*;
        match self {
            Int => "int",
            Boolean => "boolean",
            Void => "void",
            Null => "null",
            Reference(id) => id.as_str(),
        }
    }

    pub fn is_reference(&self) -> bool {
        match self {
            Type::Reference(_) => true,
            _ => false,
        }
    }

    /// Subtyping is reflexive and transitive. Reference types are rooted at
    /// `Object`; primitives relate only to themselves. The null type is a
    /// subtype of nothing but itself, which is what rejects member access on
    /// null (assignability of null is handled by `is_supertype_of`).
    pub fn is_subtype_of(&self, other: &Type, lattice: &TypeLattice) -> bool {
        use self::Type::*;
        match (self, other) {
            (Reference(sub), Reference(sup)) => lattice.is_reference_subtype(sub, sup),
            _ => self == other,
        }
    }

    /// Inverse of `is_subtype_of`, widened so that every reference type
    /// accepts the null type. A null value is usable wherever a reference is
    /// required, even though null itself has no supertypes.
    pub fn is_supertype_of(&self, other: &Type, lattice: &TypeLattice) -> bool {
        other.is_subtype_of(self, lattice) || (self.is_reference() && *other == Type::Null)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &'_ mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: Rc<str>,
    extends: Vec<ClassId>,
    methods: HashMap<String, Rc<MethodDef>>,
    constructor: Rc<ConstructorDef>,
    pub is_instantiable: bool,
}

impl ClassDef {
    pub fn new(name: &str) -> ClassDef {
        ClassDef {
            name: Rc::from(name),
            extends: vec![],
            methods: HashMap::new(),
            constructor: Rc::new(ConstructorDef::default()),
            is_instantiable: true,
        }
    }

    /// An interface-like definition: participates in subtyping and method
    /// lookup but cannot be instantiated.
    pub fn interface(name: &str) -> ClassDef {
        ClassDef {
            is_instantiable: false,
            ..ClassDef::new(name)
        }
    }

    pub fn add_supertype(&mut self, id: ClassId) {
        self.extends.push(id);
    }

    pub fn add_method(&mut self, method: MethodDef) -> Result<(), ()> {
        match self.methods.entry(method.name.clone()) {
            Entry::Occupied(_) => return Err(()),
            Entry::Vacant(e) => e.insert(Rc::new(method)),
        };
        Ok(())
    }

    pub fn set_constructor(&mut self, constructor: ConstructorDef) {
        self.constructor = Rc::new(constructor);
    }

    /// Methods defined directly on this class, not inherited ones. Use
    /// [`TypeLattice::method_named`] for the full lookup.
    pub fn method(&self, name: &str) -> Option<Rc<MethodDef>> {
        self.methods.get(name).map(Rc::clone)
    }

    pub fn iter_methods<'a>(&'a self) -> impl Iterator<Item = Rc<MethodDef>> + 'a {
        self.methods.iter().map(|(_, m)| Rc::clone(m))
    }

    pub fn constructor(&self) -> Rc<ConstructorDef> {
        Rc::clone(&self.constructor)
    }

    pub fn extends(&self) -> &[ClassId] {
        &self.extends
    }
}

#[derive(Debug)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<MethodParamDef>,
    pub return_ty: Type,
}

impl MethodDef {
    pub fn new(name: &str, params: Vec<MethodParamDef>, return_ty: Type) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            params,
            return_ty,
        }
    }

    pub fn argument_types(&self) -> Vec<&Type> {
        self.params.iter().map(|p| &p.ty).collect()
    }
}

/// Constructor signature of a class. Every class has one; the default takes
/// no arguments.
#[derive(Debug, Default)]
pub struct ConstructorDef {
    pub params: Vec<MethodParamDef>,
}

impl ConstructorDef {
    pub fn new(params: Vec<MethodParamDef>) -> ConstructorDef {
        ConstructorDef { params }
    }

    pub fn argument_types(&self) -> Vec<&Type> {
        self.params.iter().map(|p| &p.ty).collect()
    }
}

#[derive(Debug)]
pub struct MethodParamDef {
    pub name: String,
    pub ty: Type,
}

impl MethodParamDef {
    pub fn new(name: &str, ty: Type) -> MethodParamDef {
        MethodParamDef {
            name: name.to_string(),
            ty,
        }
    }
}

#[derive(Debug)]
pub struct TypeLattice {
    defined_classes: HashMap<Rc<str>, Rc<ClassDef>>,
    object: ClassId,
}

impl Default for TypeLattice {
    fn default() -> TypeLattice {
        TypeLattice::new()
    }
}

impl TypeLattice {
    /// Creates a lattice seeded with the `Object` root and its universal
    /// methods.
    pub fn new() -> TypeLattice {
        let mut lattice = TypeLattice {
            defined_classes: HashMap::new(),
            object: ClassId {
                id: Rc::from(OBJECT_CLASS_NAME),
            },
        };

        let mut object = ClassDef::new(OBJECT_CLASS_NAME);
        object
            .add_method(MethodDef::new(
                "equals",
                vec![MethodParamDef::new("other", lattice.object())],
                Type::Boolean,
            ))
            .unwrap();
        object
            .add_method(MethodDef::new("hashCode", vec![], Type::Int))
            .unwrap();
        lattice.add_class(object).unwrap();

        lattice
    }

    /// The root of the reference-type lattice.
    pub fn object(&self) -> Type {
        Type::Reference(self.object.clone())
    }

    pub fn is_type_defined(&self, name: &str) -> bool {
        self.defined_classes.contains_key(name)
    }

    pub fn add_class(&mut self, class_def: ClassDef) -> Result<ClassId, ClassAlreadyDeclared> {
        match self.defined_classes.entry(Rc::clone(&class_def.name)) {
            Entry::Occupied(_) => Err(ClassAlreadyDeclared),
            Entry::Vacant(e) => {
                let id = ClassId {
                    id: Rc::clone(&class_def.name),
                };
                log::debug!("defined class {}", id);
                e.insert(Rc::new(class_def));
                Ok(id)
            }
        }
    }

    pub fn class(&self, id: &ClassId) -> Rc<ClassDef> {
        self.defined_classes
            .get(id.as_str())
            .map(Rc::clone)
            .expect("ids always point to existing classes")
    }

    pub fn class_mut(&mut self, id: &ClassId) -> &mut ClassDef {
        self.defined_classes
            .get_mut(id.as_str())
            .and_then(Rc::get_mut)
            .expect("ids always point to existing classes")
    }

    pub fn lookup_class(&self, name: &str) -> Option<(Rc<ClassDef>, ClassId)> {
        self.defined_classes.get(name).map(|class| {
            let id = ClassId {
                id: Rc::clone(&class.name),
            };
            (Rc::clone(class), id)
        })
    }

    /// Resolves a reference type to its class definition. `None` for
    /// primitives and null.
    pub fn class_def(&self, ty: &Type) -> Option<Rc<ClassDef>> {
        match ty {
            Type::Reference(id) => Some(self.class(id)),
            _ => None,
        }
    }

    pub fn is_instantiable(&self, ty: &Type) -> bool {
        self.class_def(ty).map_or(false, |class| class.is_instantiable)
    }

    pub fn constructor(&self, ty: &Type) -> Option<Rc<ConstructorDef>> {
        self.class_def(ty).map(|class| class.constructor())
    }

    /// Looks up a method on the given type, searching the class itself, its
    /// declared supertypes and finally the `Object` root. Fails with
    /// [`NoSuchMethod`] for types that have no methods (primitives, null)
    /// and for names not visible on the receiver; the error carries a hint
    /// when a similarly named method exists.
    pub fn method_named(&self, ty: &Type, name: &str) -> Result<Rc<MethodDef>, NoSuchMethod> {
        let start = match self.class_def(ty) {
            Some(class) => class,
            None => return Err(NoSuchMethod::new(ty.name(), name, None)),
        };

        let mut visible: Vec<Rc<MethodDef>> = vec![];
        let mut visited: HashSet<Rc<str>> = HashSet::new();
        let mut worklist = vec![start];

        while let Some(class) = worklist.pop() {
            if !visited.insert(Rc::clone(&class.name)) {
                continue;
            }
            if let Some(method) = class.method(name) {
                return Ok(method);
            }
            visible.extend(class.iter_methods());
            for sup in class.extends() {
                worklist.push(self.class(sup));
            }
        }

        // every reference type inherits from the root, declared or not
        let root = self.class(&self.object);
        if !visited.contains(&root.name) {
            if let Some(method) = root.method(name) {
                return Ok(method);
            }
            visible.extend(root.iter_methods());
        }

        let suggestion = near_miss(visible.iter().map(|m| m.name.as_str()), name);
        Err(NoSuchMethod::new(ty.name(), name, suggestion))
    }

    fn is_reference_subtype(&self, sub: &ClassId, sup: &ClassId) -> bool {
        if sub == sup || *sup == self.object {
            return true;
        }

        let mut visited: HashSet<ClassId> = HashSet::new();
        let mut worklist = vec![sub.clone()];
        while let Some(id) = worklist.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if id == *sup {
                return true;
            }
            worklist.extend(self.class(&id).extends().iter().cloned());
        }
        false
    }
}

fn near_miss<'a>(candidates: impl Iterator<Item = &'a str>, wanted: &str) -> Option<&'a str> {
    candidates
        .map(|candidate| (levenshtein::levenshtein(candidate, wanted), candidate))
        .filter(|(distance, _)| *distance <= NEAR_MISS_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
