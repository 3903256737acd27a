//! Class builder for binding native Rust types as host types.
//!
//! [`class_`] starts a [`ClassBuilder`]; [`ClassBuilder::register`] creates
//! the host type and returns a [`Class`] on which members are installed.
//!
//! # Example
//!
//! ```ignore
//! let point = class_::<Point>(&mut rt, module, "Point")
//!     .extra(TypeTrait::doc("A 2D point"))
//!     .register()?
//!     .def_init(|x: i32, y: i32| Point { x, y })?
//!     .def_rw("x", |p: &Point| &p.x, |p: &mut Point| &mut p.x)?
//!     .def("length_sq", |p: &Point| p.x * p.x + p.y * p.y)?
//!     .def_op(Operator::Add, |a: &Point, b: Point| Point { x: a.x + b.x, y: a.y + b.y })?
//!     .finish();
//! ```
//!
//! # Build-time checks
//!
//! A type claimed by a caster cannot be bound:
//!
//! ```compile_fail
//! use hostbind_core::HostRuntime;
//! use hostbind_module::class_;
//!
//! let mut rt = HostRuntime::new();
//! let m = rt.new_scope("m");
//! let _ = class_::<i32>(&mut rt, m, "Int");
//! ```
//!
//! A class has at most one base:
//!
//! ```compile_fail
//! # use hostbind_core::{HostRuntime, NativeType, Upcast};
//! # use hostbind_module::{class_, bound, Bound, HostCast};
//! # #[repr(C)] struct A(u8);
//! # #[repr(C)] struct B(A);
//! # #[repr(C)] struct C(B);
//! # unsafe impl Upcast<A> for C {}
//! # unsafe impl Upcast<B> for C {}
//! # impl NativeType for C {}
//! # impl HostCast for C {
//! #     type Kind = Bound;
//! #     fn from_host(rt: &mut HostRuntime, v: &hostbind_core::Value, c: &mut hostbind_core::CleanupList) -> hostbind_core::HostResult<Self> { bound::from_host(rt, v, c) }
//! #     fn into_host(self, rt: &mut HostRuntime) -> hostbind_core::HostResult<hostbind_core::Value> { bound::into_host(rt, self) }
//! #     fn borrowed_into_host(&self, rt: &mut HostRuntime, p: hostbind_core::Handle) -> hostbind_core::HostResult<hostbind_core::Value> { bound::borrowed(rt, self, p) }
//! # }
//! let mut rt = HostRuntime::new();
//! let m = rt.new_scope("m");
//! let _ = class_::<C>(&mut rt, m, "C").base::<B>().base::<A>();
//! ```

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::RwLock;

use hostbind_core::{
    Handle, HostError, HostResult, HostRuntime, ImplicitSource, NativeFn, NativeType, NativeTypeId,
    TypeDescriptor, TypeInitDescriptor, TypeTrait, Upcast, Value,
};
use tracing::{debug, trace};

use crate::convert::{BindingKind, Bound, HostCast, caster_predicate};
use crate::function::{
    Constructor, Free, IntoConstructor, IntoMethod, IntoStatic, check_arity, receiver,
};
use crate::init::initializer;
use crate::operator::Operator;

/// Start binding `T` as `name` in `scope`.
pub fn class_<'rt, T>(rt: &'rt mut HostRuntime, scope: Handle, name: &str) -> ClassBuilder<'rt, T>
where
    T: NativeType + HostCast<Kind = Bound>,
{
    ClassBuilder {
        rt,
        scope,
        name: name.to_owned(),
        traits: Vec::new(),
        _marker: PhantomData,
    }
}

/// Registration in progress for `T`, with native base `B` and alias `A`.
///
/// `B == T` means no base; `A == T` means no alias.
pub struct ClassBuilder<'rt, T, B = T, A = T> {
    rt: &'rt mut HostRuntime,
    scope: Handle,
    name: String,
    traits: Vec<TypeTrait>,
    _marker: PhantomData<fn() -> (T, B, A)>,
}

impl<'rt, T, A> ClassBuilder<'rt, T, T, A> {
    /// Declare the native base type. `B` must already be bound.
    pub fn base<B: 'static>(self) -> ClassBuilder<'rt, T, B, A>
    where
        T: Upcast<B>,
    {
        ClassBuilder {
            rt: self.rt,
            scope: self.scope,
            name: self.name,
            traits: self.traits,
            _marker: PhantomData,
        }
    }
}

impl<'rt, T: 'static, B> ClassBuilder<'rt, T, B, T> {
    /// Declare the alias type built for host-language subclasses.
    ///
    /// The alias states its own capabilities, which become the hooks used
    /// for instances built as the alias.
    pub fn alias<A>(self) -> ClassBuilder<'rt, T, B, A>
    where
        A: NativeType + Upcast<T>,
    {
        ClassBuilder {
            rt: self.rt,
            scope: self.scope,
            name: self.name,
            traits: self.traits,
            _marker: PhantomData,
        }
    }
}

impl<'rt, T, B, A> ClassBuilder<'rt, T, B, A>
where
    T: NativeType + HostCast<Kind = Bound>,
    B: 'static,
    A: NativeType + Upcast<T>,
{
    /// Append a trait; traits apply in the order given.
    pub fn extra(mut self, extra: impl Into<TypeTrait>) -> Self {
        self.traits.push(extra.into());
        self
    }

    /// Build the descriptor and create the host type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn register(self) -> HostResult<Class<'rt, T, B, A>> {
        let mut data = TypeDescriptor::for_layout::<A>(self.name, NativeTypeId::of::<T>());
        T::capabilities().apply(&mut data);
        if TypeId::of::<A>() != TypeId::of::<T>() {
            data.alias = Some(A::capabilities().alias_hooks());
        }

        let mut init = TypeInitDescriptor::new(data, self.scope);
        if TypeId::of::<B>() != TypeId::of::<T>() {
            init.set_base(NativeTypeId::of::<B>());
        }
        for extra in self.traits {
            extra.apply(&mut init);
        }

        let handle = self.rt.create_type(init)?;
        Ok(Class {
            rt: self.rt,
            handle,
            _marker: PhantomData,
        })
    }
}

/// A registered class. Members are installed on its type object.
pub struct Class<'rt, T, B = T, A = T> {
    rt: &'rt mut HostRuntime,
    handle: Handle,
    _marker: PhantomData<fn() -> (T, B, A)>,
}

impl<'rt, T, B, A> Class<'rt, T, B, A>
where
    T: 'static,
    A: Upcast<T>,
{
    /// The host type object.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn runtime(&mut self) -> &mut HostRuntime {
        self.rt
    }

    /// Release the runtime borrow, returning the type handle.
    pub fn finish(self) -> Handle {
        self.handle
    }

    fn install(self, name: &str, func: NativeFn, is_method: bool) -> HostResult<Self> {
        trace!(owner = %self.handle, name, is_method, "installing function");
        self.rt.install_function(self.handle, name, func, is_method)?;
        Ok(self)
    }

    fn install_property(
        self,
        name: &str,
        getter: NativeFn,
        setter: Option<NativeFn>,
        is_static: bool,
    ) -> HostResult<Self> {
        trace!(owner = %self.handle, name, is_static, writable = setter.is_some(), "installing property");
        self.rt
            .install_property(self.handle, name, Some(getter), setter, is_static)?;
        Ok(self)
    }

    /// Install a method taking `&T` or `&mut T`. Repeated names add
    /// overloads.
    pub fn def<M>(self, name: &str, f: impl IntoMethod<T, M>) -> HostResult<Self> {
        self.install(name, f.into_method(), true)
    }

    /// Install a static function.
    pub fn def_static<M>(self, name: &str, f: impl IntoStatic<M>) -> HostResult<Self> {
        self.install(name, f.into_static(), false)
    }

    /// Install an operator overload.
    pub fn def_op<M>(self, op: Operator, f: impl IntoMethod<T, M>) -> HostResult<Self> {
        self.def(op.method_name(), f)
    }

    pub fn def_prop_rw<MG, MS>(
        self,
        name: &str,
        getter: impl IntoMethod<T, MG>,
        setter: impl IntoMethod<T, MS>,
    ) -> HostResult<Self> {
        self.install_property(name, getter.into_method(), Some(setter.into_method()), false)
    }

    pub fn def_prop_ro<M>(self, name: &str, getter: impl IntoMethod<T, M>) -> HostResult<Self> {
        self.install_property(name, getter.into_method(), None, false)
    }

    pub fn def_prop_rw_static<MG, MS>(
        self,
        name: &str,
        getter: impl IntoStatic<MG>,
        setter: impl IntoStatic<MS>,
    ) -> HostResult<Self> {
        self.install_property(
            name,
            getter.into_static().skip_first(),
            Some(setter.into_static().skip_first()),
            true,
        )
    }

    pub fn def_prop_ro_static<M>(self, name: &str, getter: impl IntoStatic<M>) -> HostResult<Self> {
        self.install_property(name, getter.into_static().skip_first(), None, true)
    }

    /// Expose a data member of `T`, or of one of its bases `C`.
    ///
    /// Reading returns a view of the member: a non-owning instance that
    /// keeps the owner alive for bound member types, a converted value for
    /// caster types. Writing moves caster values in and copies bound values.
    pub fn def_rw<C, D>(self, name: &str, get: fn(&C) -> &D, get_mut: fn(&mut C) -> &mut D) -> HostResult<Self>
    where
        T: Upcast<C>,
        C: 'static,
        D: HostCast,
    {
        let setter = NativeFn::new(move |rt, args| {
            check_arity(args, 2)?;
            let this = receiver::<T>(rt, args.first())?;
            let mut owner = rt.inst_cast_ptr::<T>(this)?.cast::<C>();
            // SAFETY: `T: Upcast<C>`, so the payload starts with a ready `C`.
            let slot = get_mut(unsafe { owner.as_mut() });
            D::assign_from_host(slot, rt, &args[1])?;
            Ok(Value::None)
        });
        self.install_property(name, member_getter::<T, C, D>(get), Some(setter), false)
    }

    /// Read-only form of [`def_rw`](Self::def_rw).
    pub fn def_ro<C, D>(self, name: &str, get: fn(&C) -> &D) -> HostResult<Self>
    where
        T: Upcast<C>,
        C: 'static,
        D: HostCast,
    {
        self.install_property(name, member_getter::<T, C, D>(get), None, false)
    }

    /// Expose a static variable.
    pub fn def_rw_static<D>(self, name: &str, cell: &'static RwLock<D>) -> HostResult<Self>
    where
        D: HostCast + Clone + Send + Sync,
    {
        let setter = NativeFn::new(move |rt, args| {
            check_arity(args, 2)?;
            let mut guard = cell.write().map_err(|_| poisoned(name_of::<D>()))?;
            D::assign_from_host(&mut *guard, rt, &args[1])?;
            Ok(Value::None)
        });
        self.install_property(name, static_getter(cell), Some(setter), true)
    }

    pub fn def_ro_static<D>(self, name: &str, cell: &'static RwLock<D>) -> HostResult<Self>
    where
        D: HostCast + Clone + Send + Sync,
    {
        self.install_property(name, static_getter(cell), None, true)
    }

    /// Expose the members listed by `#[hostbind(get, set)]` field attributes.
    pub fn def_fields(self) -> HostResult<Self>
    where
        T: DefineFields,
    {
        T::define_fields(self)
    }

    /// Install a constructor building a `T`.
    pub fn def_init<M>(self, f: impl IntoConstructor<T, M>) -> HostResult<Self> {
        let init = initializer::<T, A>(Some(f.into_constructor()), None);
        self.install("__init__", init, true)
    }

    /// Install a constructor that always builds the alias.
    pub fn def_init_alias<M>(self, f: impl IntoConstructor<A, M>) -> HostResult<Self> {
        let init = initializer::<T, A>(None, Some(f.into_constructor()));
        self.install("__init__", init, true)
    }

    /// Install a constructor with a native and an alias form taking the
    /// same arguments. Host-language subclasses get the alias.
    pub fn def_init_with_alias<MT, MA>(
        self,
        native: impl IntoConstructor<T, MT>,
        alias: impl IntoConstructor<A, MA>,
    ) -> HostResult<Self> {
        let native: Constructor<T> = native.into_constructor();
        let alias: Constructor<A> = alias.into_constructor();
        self.install("__init__", initializer::<T, A>(Some(native), Some(alias)), true)
    }

    /// Install a one-argument constructor and make `Arg` implicitly
    /// convertible to `T`.
    pub fn def_init_implicit<Arg, F>(self, f: F) -> HostResult<Self>
    where
        Arg: HostCast,
        F: IntoConstructor<T, Free<(Arg,), T>>,
    {
        let this = self.def_init(f)?;
        register_implicit::<Arg>(this.rt, NativeTypeId::of::<T>());
        debug!(
            target_type = std::any::type_name::<T>(),
            source = std::any::type_name::<Arg>(),
            "registered implicit constructor"
        );
        Ok(this)
    }
}

/// Member table of a bound type, usually generated by `#[derive(NativeType)]`.
pub trait DefineFields: Sized + 'static {
    /// Install a property on `class` for every exposed field.
    fn define_fields<'rt, B, A>(class: Class<'rt, Self, B, A>) -> HostResult<Class<'rt, Self, B, A>>
    where
        A: Upcast<Self>;
}

fn name_of<D>() -> &'static str {
    std::any::type_name::<D>()
}

fn poisoned(what: &str) -> HostError {
    HostError::Native(format!("static {what} is poisoned"))
}

fn member_getter<T, C, D>(get: fn(&C) -> &D) -> NativeFn
where
    T: Upcast<C>,
    C: 'static,
    D: HostCast,
{
    NativeFn::new(move |rt, args| {
        check_arity(args, 1)?;
        let this = receiver::<T>(rt, args.first())?;
        let owner = rt.inst_cast_ptr::<T>(this)?.cast::<C>();
        // SAFETY: `T: Upcast<C>`, so the payload starts with a ready `C`.
        let member = get(unsafe { owner.as_ref() });
        member.borrowed_into_host(rt, this)
    })
}

fn static_getter<D>(cell: &'static RwLock<D>) -> NativeFn
where
    D: HostCast + Clone + Send + Sync,
{
    NativeFn::new(move |rt, _| {
        let value = cell.read().map_err(|_| poisoned(name_of::<D>()))?.clone();
        value.into_host(rt)
    })
}

/// Record that `S` converts implicitly into the bound type `target`.
pub(crate) fn register_implicit<S: HostCast>(rt: &mut HostRuntime, target: NativeTypeId) {
    let source = if <S::Kind as BindingKind>::IS_BOUND {
        ImplicitSource::Type(NativeTypeId::of::<S>())
    } else {
        ImplicitSource::Predicate(caster_predicate::<S>)
    };
    rt.implicitly_convertible(target, source);
}
