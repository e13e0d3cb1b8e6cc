use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::CallError;
use crate::value::{Context, TypeKey, Value};

/// Outcome of one procedure invocation: the next receiver (or result),
/// `None` when the procedure returns nothing.
pub type CallResult = Result<Option<Value>, CallError>;

type InvokeFn = dyn Fn(&Value, &Context, Option<Value>) -> CallResult + Send + Sync;

type DecodeFn =
    fn(&mut dyn erased_serde::Deserializer<'_>) -> Result<Value, erased_serde::Error>;

fn decode_as<A: DeserializeOwned + Any + Send + Sync>(
    de: &mut dyn erased_serde::Deserializer<'_>,
) -> Result<Value, erased_serde::Error> {
    erased_serde::deserialize::<A>(de).map(Value::new)
}

/// Declared argument type of a procedure.
#[derive(Clone, Copy)]
pub struct ArgType {
    key: TypeKey,
    decode: DecodeFn,
}

impl ArgType {
    pub fn of<A: DeserializeOwned + Any + Send + Sync>() -> Self {
        Self {
            key: TypeKey::of::<A>(),
            decode: decode_as::<A> as DecodeFn,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Only `String` arguments may be given inline in a path element.
    pub fn is_string(&self) -> bool {
        self.key.is::<String>()
    }

    /// Decode one argument value from a type-erased deserializer.
    pub fn decode(
        &self,
        de: &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<Value, erased_serde::Error> {
        (self.decode)(de)
    }
}

impl fmt::Debug for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.key, f)
    }
}

/// A named, invocable member of a registered type.
#[derive(Clone)]
pub struct Procedure {
    name: String,
    arg: Option<ArgType>,
    ret: Option<TypeKey>,
    invoke: Arc<InvokeFn>,
}

impl Procedure {
    /// Build a procedure from its raw parts.
    ///
    /// `invoke` receives the current receiver, the connection context and
    /// the bound argument (`None` when nothing was bound). `ret` names the
    /// type the next path element is resolved against.
    pub fn new<F>(
        name: impl Into<String>,
        arg: Option<ArgType>,
        ret: Option<TypeKey>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&Value, &Context, Option<Value>) -> CallResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arg,
            ret,
            invoke: Arc::new(invoke),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_type(&self) -> Option<ArgType> {
        self.arg
    }

    pub fn return_type(&self) -> Option<TypeKey> {
        self.ret
    }

    pub fn invoke(&self, receiver: &Value, context: &Context, arg: Option<Value>) -> CallResult {
        (self.invoke)(receiver, context, arg)
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.arg.map(|a| a.key) == other.arg.map(|a| a.key)
            && self.ret == other.ret
            && Arc::ptr_eq(&self.invoke, &other.invoke)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("arg", &self.arg)
            .field("ret", &self.ret)
            .finish()
    }
}

/// Immutable dispatch table mapping `(type, name)` to a [`Procedure`].
#[derive(Debug, Default)]
pub struct Registry {
    types: HashMap<TypeKey, BTreeMap<String, Procedure>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, ty: TypeKey, name: &str) -> Option<&Procedure> {
        self.types.get(&ty).and_then(|members| members.get(name))
    }

    pub fn contains(&self, ty: TypeKey) -> bool {
        self.types.contains_key(&ty)
    }

    /// Procedures of `ty` in name order.
    pub fn procedures(&self, ty: TypeKey) -> impl Iterator<Item = &Procedure> {
        self.types.get(&ty).into_iter().flat_map(|members| members.values())
    }

    pub fn types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.types.keys().copied()
    }
}

/// Builds a [`Registry`].
///
/// Registering a name twice on one type replaces the earlier procedure.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: HashMap<TypeKey, BTreeMap<String, Procedure>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) registering members of `T`.
    ///
    /// The type is registered even if no member is added, so it can serve
    /// as a root or return type.
    pub fn register<T: Any + Send + Sync>(&mut self) -> TypeBuilder<'_, T> {
        TypeBuilder {
            members: self.types.entry(TypeKey::of::<T>()).or_default(),
            _receiver: PhantomData,
        }
    }

    /// Add a raw procedure to the type identified by `ty`.
    pub fn procedure(&mut self, ty: TypeKey, procedure: Procedure) -> &mut Self {
        insert(self.types.entry(ty).or_default(), ty, procedure);
        self
    }

    pub fn build(self) -> Registry {
        Registry { types: self.types }
    }
}

fn insert(members: &mut BTreeMap<String, Procedure>, ty: TypeKey, procedure: Procedure) {
    if members
        .insert(procedure.name.clone(), procedure)
        .is_some()
    {
        debug!(ty = %ty, "procedure registered twice, keeping the latest");
    }
}

/// Typed registration of the members of one receiver type `T`.
pub struct TypeBuilder<'b, T> {
    members: &'b mut BTreeMap<String, Procedure>,
    _receiver: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> TypeBuilder<'_, T> {
    /// Member taking an argument of type `A` and returning data `R`.
    pub fn method<A, R, F>(self, name: &str, f: F) -> Self
    where
        A: DeserializeOwned + Any + Send + Sync,
        R: Serialize + Any + Send + Sync,
        F: Fn(&T, &Context, A) -> Result<R, CallError> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.procedure(Procedure::new(
            name,
            Some(ArgType::of::<A>()),
            Some(TypeKey::of::<R>()),
            move |recv, ctx, arg| {
                let out = f(receiver::<T>(recv)?, ctx, argument::<A>(&member, arg)?)?;
                Ok(Some(Value::data(out)))
            },
        ))
    }

    /// Member taking no argument and returning data `R`.
    pub fn getter<R, F>(self, name: &str, f: F) -> Self
    where
        R: Serialize + Any + Send + Sync,
        F: Fn(&T, &Context) -> Result<R, CallError> + Send + Sync + 'static,
    {
        self.procedure(Procedure::new(
            name,
            None,
            Some(TypeKey::of::<R>()),
            move |recv, ctx, _| Ok(Some(Value::data(f(receiver::<T>(recv)?, ctx)?))),
        ))
    }

    /// Member taking no argument and returning a navigable object `R`.
    pub fn object<R, F>(self, name: &str, f: F) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&T, &Context) -> Result<Arc<R>, CallError> + Send + Sync + 'static,
    {
        self.procedure(Procedure::new(
            name,
            None,
            Some(TypeKey::of::<R>()),
            move |recv, ctx, _| Ok(Some(Value::object(f(receiver::<T>(recv)?, ctx)?))),
        ))
    }

    /// Member addressed as `name-<id>` returning a navigable object `R`.
    pub fn object_by_id<R, F>(self, name: &str, f: F) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&T, &Context, String) -> Result<Arc<R>, CallError> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.procedure(Procedure::new(
            name,
            Some(ArgType::of::<String>()),
            Some(TypeKey::of::<R>()),
            move |recv, ctx, arg| {
                let id = argument::<String>(&member, arg)?;
                Ok(Some(Value::object(f(receiver::<T>(recv)?, ctx, id)?)))
            },
        ))
    }

    /// Member taking an argument of type `A` and returning nothing.
    pub fn action<A, F>(self, name: &str, f: F) -> Self
    where
        A: DeserializeOwned + Any + Send + Sync,
        F: Fn(&T, &Context, A) -> Result<(), CallError> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.procedure(Procedure::new(
            name,
            Some(ArgType::of::<A>()),
            None,
            move |recv, ctx, arg| {
                f(receiver::<T>(recv)?, ctx, argument::<A>(&member, arg)?)?;
                Ok(None)
            },
        ))
    }

    pub fn procedure(self, procedure: Procedure) -> Self {
        insert(self.members, TypeKey::of::<T>(), procedure);
        self
    }
}

fn receiver<T: Any>(value: &Value) -> Result<&T, CallError> {
    value.downcast_ref::<T>().ok_or_else(|| {
        format!(
            "receiver is {}, expected {}",
            value.type_key(),
            std::any::type_name::<T>()
        )
        .into()
    })
}

fn argument<A: Any + Send + Sync>(member: &str, arg: Option<Value>) -> Result<A, CallError> {
    let arg = arg.ok_or_else(|| format!("missing argument for {member:?}"))?;
    arg.take::<A>().map_err(|arg| {
        format!(
            "argument for {member:?} is {}, expected {}",
            arg.type_key(),
            std::any::type_name::<A>()
        )
        .into()
    })
}
