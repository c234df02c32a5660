use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::term::Term;

/// A simple type over the two-sort base.
///
/// `Any` is the top of the lattice, `None` the bottom (ill-typed).
/// `Variable` indexes into a [`TypeEnv`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Any,
    None,
    Bool,
    Individual,
    Variable(u32),
    Function(Box<Type>, Box<Type>),
}

impl Type {
    pub fn function(left: Type, right: Type) -> Type {
        Type::Function(Box::new(left), Box::new(right))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Any => write!(f, "*"),
            Type::None => write!(f, "none"),
            Type::Bool => write!(f, "o"),
            Type::Individual => write!(f, "i"),
            Type::Variable(v) => write!(f, "t{}", v),
            Type::Function(left, right) => write!(f, "({} -> {})", left, right),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum TypeError {
    #[error("term is not well-typed: computed {actual}, expected {expected}")]
    IllTyped {
        term: Arc<Term>,
        expected: Type,
        actual: Type,
    },
    #[error("infinite type while flattening type variables")]
    InfiniteType { term: Option<Arc<Term>> },
    #[error("unknown symbol {0}")]
    UnknownSymbol(u32),
}

/// The mutable environment of type variables. Bindings refine monotonically
/// during unification; a final flatten pass resolves chains of aliases.
#[derive(Clone, Debug, Default)]
pub struct TypeEnv {
    variables: Vec<Type>,
}

impl TypeEnv {
    pub fn new() -> TypeEnv {
        TypeEnv { variables: vec![] }
    }

    pub fn fresh(&mut self) -> u32 {
        self.variables.push(Type::Any);
        (self.variables.len() - 1) as u32
    }

    fn get(&self, variable: u32) -> &Type {
        &self.variables[variable as usize]
    }

    fn set(&mut self, variable: u32, value: Type) {
        self.variables[variable as usize] = value;
    }

    /// Computes the meet of two types, updating variable bindings so that
    /// both sides are refined to the result. Returns `Type::None` when the
    /// types have no common refinement.
    pub fn unify(&mut self, first: &Type, second: &Type) -> Type {
        match first {
            Type::Any => self.refine_against(second),
            Type::None => Type::None,
            Type::Bool | Type::Individual => self.unify_base(first.clone(), second),
            Type::Function(left, right) => self.unify_function(left, right, second),
            Type::Variable(v) => self.unify_variable(*v, second),
        }
    }

    /// `Any ⊓ second`: the result is `second` itself; nothing to refine.
    fn refine_against(&mut self, second: &Type) -> Type {
        second.clone()
    }

    fn unify_base(&mut self, base: Type, second: &Type) -> Type {
        match second {
            Type::Any => base,
            Type::Bool | Type::Individual if *second == base => base,
            Type::Variable(v) => {
                let bound = self.get(*v).clone();
                let result = self.unify_base(base, &bound);
                if result != Type::None {
                    self.set(*v, result.clone());
                }
                result
            }
            _ => Type::None,
        }
    }

    fn unify_function(&mut self, left: &Type, right: &Type, second: &Type) -> Type {
        match second {
            Type::Any => Type::function(left.clone(), right.clone()),
            Type::Variable(v) => {
                let bound = self.get(*v).clone();
                let result = self.unify_function(left, right, &bound);
                if result != Type::None {
                    self.set(*v, result.clone());
                }
                result
            }
            Type::Function(second_left, second_right) => {
                let left = self.unify(left, second_left);
                if left == Type::None {
                    return Type::None;
                }
                let right = self.unify(right, second_right);
                if right == Type::None {
                    return Type::None;
                }
                Type::function(left, right)
            }
            _ => Type::None,
        }
    }

    fn unify_variable(&mut self, first: u32, second: &Type) -> Type {
        match second {
            Type::Any => Type::Variable(first),
            Type::None => Type::None,
            Type::Bool | Type::Individual => {
                let bound = self.get(first).clone();
                let result = self.unify_base(second.clone(), &bound);
                if result == Type::None {
                    return Type::None;
                }
                self.set(first, result.clone());
                result
            }
            Type::Function(left, right) => {
                let bound = self.get(first).clone();
                let result = self.unify_function(left, right, &bound);
                if result == Type::None {
                    return Type::None;
                }
                self.set(first, result.clone());
                result
            }
            Type::Variable(second_variable) => {
                // follow the alias chain, watching for first itself
                let mut var = *second_variable;
                if first == var {
                    return Type::Variable(var);
                }
                while let Type::Variable(next) = self.get(var) {
                    var = *next;
                    if first == var {
                        return Type::Variable(var);
                    }
                }
                let bound = self.get(var).clone();
                let result = self.unify_variable(first, &bound);
                if result == Type::None {
                    return Type::None;
                }
                self.set(var, result);
                Type::Variable(var)
            }
        }
    }

    /// Resolves a type to a variable-free form. Cycles of trivial variable
    /// aliases collapse to `Any`; cycles through `Function` are infinite
    /// types.
    fn flatten(&mut self, ty: &Type, visiting: &mut Vec<u32>, alias_only: bool) -> Result<Type, ()> {
        match ty {
            Type::Any | Type::None | Type::Bool | Type::Individual => Ok(ty.clone()),
            Type::Function(left, right) => {
                let left = self.flatten(left, visiting, false)?;
                let right = self.flatten(right, visiting, false)?;
                Ok(Type::function(left, right))
            }
            Type::Variable(v) => {
                if visiting.contains(v) {
                    if alias_only {
                        // a cycle of trivial aliases constrains nothing
                        for visited in visiting.iter() {
                            self.variables[*visited as usize] = Type::Any;
                        }
                        return Ok(Type::Any);
                    }
                    return Err(());
                }
                visiting.push(*v);
                let bound = self.get(*v).clone();
                let result = self.flatten(&bound, visiting, alias_only)?;
                visiting.pop();
                self.set(*v, result.clone());
                Ok(result)
            }
        }
    }

    pub fn resolve(&mut self, ty: &Type) -> Result<Type, ()> {
        let mut visiting = vec![];
        self.flatten(ty, &mut visiting, true)
    }

    /// Resolves every variable binding, root-first, so that trivial alias
    /// cycles collapse to `Any` before they are reached through a function
    /// constructor.
    fn resolve_all(&mut self) -> Result<(), ()> {
        for variable in 0..self.variables.len() as u32 {
            self.resolve(&Type::Variable(variable))?;
        }
        Ok(())
    }
}

fn term_key(term: &Arc<Term>) -> usize {
    Arc::as_ptr(term) as usize
}

/// The result of type inference: resolved types per shared subterm node and
/// per symbol, plus the operand types of every `Equals` node (consulted by
/// the canonicalizer to decide between `Equals` and `Iff`).
#[derive(Clone, Debug, Default)]
pub struct TypeMap {
    terms: HashMap<usize, Type>,
    equals_args: HashMap<usize, (Type, Type)>,
    constants: HashMap<u32, Type>,
    parameters: HashMap<u32, Type>,
}

impl TypeMap {
    pub fn type_of(&self, term: &Arc<Term>) -> Option<&Type> {
        self.terms.get(&term_key(term))
    }

    /// Operand types of an `Equals` node.
    pub fn equals_arg_types(&self, term: &Arc<Term>) -> Option<&(Type, Type)> {
        self.equals_args.get(&term_key(term))
    }

    pub fn constant_type(&self, constant: u32) -> Result<&Type, TypeError> {
        self.constants
            .get(&constant)
            .ok_or(TypeError::UnknownSymbol(constant))
    }

    pub fn parameter_type(&self, parameter: u32) -> Result<&Type, TypeError> {
        self.parameters
            .get(&parameter)
            .ok_or(TypeError::UnknownSymbol(parameter))
    }
}

struct TypeInference {
    env: TypeEnv,
    map: TypeMap,
    /// Unresolved per-node and per-symbol types, flattened at the end.
    variable_types: Vec<(u32, Type)>,
    polymorphic_equality: bool,
}

/// Infers types for `term` and all of its subterms.
///
/// A fresh type variable is introduced at every polymorphic site (lambda
/// argument, quantified variable, each side of an equality when
/// `polymorphic_equality`); logical connectives and quantifier bodies are
/// boolean; integers are individuals; applications impose function types.
pub fn infer_types(term: &Arc<Term>, polymorphic_equality: bool) -> Result<TypeMap, TypeError> {
    let mut inference = TypeInference {
        env: TypeEnv::new(),
        map: TypeMap::default(),
        variable_types: vec![],
        polymorphic_equality,
    };
    inference.check(term, Type::Any)?;
    inference.finish()
}

impl TypeInference {
    fn expect(&mut self, term: &Arc<Term>, actual: Type, expected: &Type) -> Result<Type, TypeError> {
        let result = self.env.unify(&actual, expected);
        if result == Type::None {
            return Err(TypeError::IllTyped {
                term: term.clone(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(result)
    }

    fn check_symbol(
        &mut self,
        term: &Arc<Term>,
        stored: Option<Type>,
        expected: &Type,
    ) -> Result<(Type, Type), TypeError> {
        // returns (refined type to store for the symbol, type of this node)
        let refined = match stored {
            Some(stored) => {
                let result = self.env.unify(expected, &stored);
                if result == Type::None {
                    return Err(TypeError::IllTyped {
                        term: term.clone(),
                        expected: expected.clone(),
                        actual: stored,
                    });
                }
                result
            }
            None => expected.clone(),
        };
        Ok((refined.clone(), refined))
    }

    fn lookup_variable(&self, variable: u32) -> Option<Type> {
        self.variable_types
            .iter()
            .rev()
            .find(|(v, _)| *v == variable)
            .map(|(_, t)| t.clone())
    }

    /// Removes the innermost binding for `variable` and returns its refined
    /// type. Free-variable entries recorded during the body are kept.
    fn pop_variable(&mut self, variable: u32) -> Type {
        if let Some(index) = self
            .variable_types
            .iter()
            .rposition(|(v, _)| *v == variable)
        {
            self.variable_types.remove(index).1
        } else {
            Type::Any
        }
    }

    fn store_variable(&mut self, variable: u32, refined: Type) {
        if let Some(entry) = self
            .variable_types
            .iter_mut()
            .rev()
            .find(|(v, _)| *v == variable)
        {
            entry.1 = refined;
        } else {
            self.variable_types.push((variable, refined));
        }
    }

    fn record(&mut self, term: &Arc<Term>, ty: Type) -> Type {
        self.map.terms.insert(term_key(term), ty.clone());
        ty
    }

    fn check(&mut self, term: &Arc<Term>, expected: Type) -> Result<Type, TypeError> {
        match &**term {
            Term::Variable(v) => {
                let stored = self.lookup_variable(*v);
                let (refined, result) = self.check_symbol(term, stored, &expected)?;
                self.store_variable(*v, refined);
                Ok(self.record(term, result))
            }
            Term::Constant(c) => {
                let stored = self.map.constants.get(c).cloned();
                let (refined, result) = self.check_symbol(term, stored, &expected)?;
                self.map.constants.insert(*c, refined);
                Ok(self.record(term, result))
            }
            Term::Parameter(p) => {
                let stored = self.map.parameters.get(p).cloned();
                let (refined, result) = self.check_symbol(term, stored, &expected)?;
                self.map.parameters.insert(*p, refined);
                Ok(self.record(term, result))
            }
            Term::Integer(_) => {
                self.expect(term, Type::Individual, &expected)?;
                Ok(self.record(term, Type::Individual))
            }
            Term::True | Term::False => {
                self.expect(term, Type::Bool, &expected)?;
                Ok(self.record(term, Type::Bool))
            }
            Term::Not(operand) => {
                let expected = self.expect(term, Type::Bool, &expected)?;
                self.check(operand, expected)?;
                Ok(self.record(term, Type::Bool))
            }
            Term::IfThen(left, right) => {
                let expected = self.expect(term, Type::Bool, &expected)?;
                self.check(left, expected.clone())?;
                self.check(right, expected)?;
                Ok(self.record(term, Type::Bool))
            }
            Term::And(operands) | Term::Or(operands) | Term::Iff(operands) => {
                let expected = self.expect(term, Type::Bool, &expected)?;
                for operand in operands {
                    self.check(operand, expected.clone())?;
                }
                Ok(self.record(term, Type::Bool))
            }
            Term::Equals(left, right) => {
                self.expect(term, Type::Bool, &expected)?;
                let first = self.env.fresh();
                self.check(left, Type::Variable(first))?;
                let second = if self.polymorphic_equality {
                    self.env.fresh()
                } else {
                    first
                };
                self.check(right, Type::Variable(second))?;
                self.map.equals_args.insert(
                    term_key(term),
                    (Type::Variable(first), Type::Variable(second)),
                );
                Ok(self.record(term, Type::Bool))
            }
            Term::ForAll(v, body) | Term::Exists(v, body) => {
                let expected = self.expect(term, Type::Bool, &expected)?;
                let variable_type = self.env.fresh();
                self.variable_types.push((*v, Type::Variable(variable_type)));
                self.check(body, expected)?;
                self.pop_variable(*v);
                Ok(self.record(term, Type::Bool))
            }
            Term::Lambda(v, body) => {
                let (arg_type, result_type) = self.function_child_types(term, &expected)?;
                self.variable_types.push((*v, arg_type));
                let result = self.check(body, result_type)?;
                let arg_type = self.pop_variable(*v);
                Ok(self.record(term, Type::function(arg_type, result)))
            }
            Term::App1(function, arg) => {
                let arg_variable = self.env.fresh();
                let function_type = self.check(
                    function,
                    Type::function(Type::Variable(arg_variable), expected),
                )?;
                let (arg_expected, result) = match function_type {
                    Type::Function(left, right) => (*left, *right),
                    actual => {
                        return Err(TypeError::IllTyped {
                            term: term.clone(),
                            expected: Type::function(Type::Any, Type::Any),
                            actual,
                        })
                    }
                };
                self.check(arg, arg_expected)?;
                Ok(self.record(term, result))
            }
            Term::App2(function, arg1, arg2) => {
                let first_variable = self.env.fresh();
                let second_variable = self.env.fresh();
                let function_type = self.check(
                    function,
                    Type::function(
                        Type::Variable(first_variable),
                        Type::function(Type::Variable(second_variable), expected),
                    ),
                )?;
                let (arg1_expected, arg2_expected, result) = match function_type {
                    Type::Function(left, right) => match *right {
                        Type::Function(inner_left, inner_right) => {
                            (*left, *inner_left, *inner_right)
                        }
                        actual => {
                            return Err(TypeError::IllTyped {
                                term: term.clone(),
                                expected: Type::function(Type::Any, Type::Any),
                                actual,
                            })
                        }
                    },
                    actual => {
                        return Err(TypeError::IllTyped {
                            term: term.clone(),
                            expected: Type::function(
                                Type::Any,
                                Type::function(Type::Any, Type::Any),
                            ),
                            actual,
                        })
                    }
                };
                self.check(arg1, arg1_expected)?;
                self.check(arg2, arg2_expected)?;
                Ok(self.record(term, result))
            }
        }
    }

    /// Splits the expected type of a lambda into argument and result types,
    /// allocating fresh variables when the expectation is still open.
    fn function_child_types(
        &mut self,
        term: &Arc<Term>,
        expected: &Type,
    ) -> Result<(Type, Type), TypeError> {
        match expected {
            Type::Any => {
                let left = self.env.fresh();
                let right = self.env.fresh();
                Ok((Type::Variable(left), Type::Variable(right)))
            }
            Type::Function(left, right) => Ok(((**left).clone(), (**right).clone())),
            Type::Variable(v) => {
                let bound = self.env.get(*v).clone();
                match bound {
                    Type::Any => {
                        let left = self.env.fresh();
                        let right = self.env.fresh();
                        let function =
                            Type::function(Type::Variable(left), Type::Variable(right));
                        self.env.set(*v, function);
                        Ok((Type::Variable(left), Type::Variable(right)))
                    }
                    other => {
                        let children = self.function_child_types(term, &other)?;
                        self.env.set(
                            *v,
                            Type::function(children.0.clone(), children.1.clone()),
                        );
                        Ok(children)
                    }
                }
            }
            actual => Err(TypeError::IllTyped {
                term: term.clone(),
                expected: Type::function(Type::Any, Type::Any),
                actual: actual.clone(),
            }),
        }
    }

    /// Flattens every recorded type through the environment, detecting alias
    /// cycles and infinite types.
    fn finish(mut self) -> Result<TypeMap, TypeError> {
        self.env
            .resolve_all()
            .map_err(|_| TypeError::InfiniteType { term: None })?;
        let mut terms = HashMap::with_capacity(self.map.terms.len());
        for (key, ty) in &self.map.terms {
            let resolved = self
                .env
                .resolve(ty)
                .map_err(|_| TypeError::InfiniteType { term: None })?;
            terms.insert(*key, resolved);
        }
        let mut equals_args = HashMap::with_capacity(self.map.equals_args.len());
        for (key, (left, right)) in &self.map.equals_args {
            let left = self
                .env
                .resolve(left)
                .map_err(|_| TypeError::InfiniteType { term: None })?;
            let right = self
                .env
                .resolve(right)
                .map_err(|_| TypeError::InfiniteType { term: None })?;
            equals_args.insert(*key, (left, right));
        }
        let mut constants = HashMap::with_capacity(self.map.constants.len());
        for (constant, ty) in &self.map.constants {
            let resolved = self
                .env
                .resolve(ty)
                .map_err(|_| TypeError::InfiniteType { term: None })?;
            constants.insert(*constant, resolved);
        }
        let mut parameters = HashMap::with_capacity(self.map.parameters.len());
        for (parameter, ty) in &self.map.parameters {
            let resolved = self
                .env
                .resolve(ty)
                .map_err(|_| TypeError::InfiniteType { term: None })?;
            parameters.insert(*parameter, resolved);
        }
        Ok(TypeMap {
            terms,
            equals_args,
            constants,
            parameters,
        })
    }
}
