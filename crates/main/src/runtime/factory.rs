////////////////////////////////////////////////////////////////////////////////
// This file is part of "Astra Meta", a runtime reflection layer for Rust     //
// types.                                                                     //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    any::{type_name, Any},
    marker::PhantomData,
    sync::{Arc, RwLock},
};

use log::{debug, trace, warn};

use crate::runtime::{
    coercion::{upcast_mut, upcast_ref},
    data::{self, Accessor, ArrayField, BoundValue, Field, Global, GlobalArray, GlobalConst},
    hash_name,
    invoke::{
        constructor_wrapper,
        function_wrapper,
        method_mut_wrapper,
        method_wrapper,
        Construct,
        Invoke,
    },
    members::{BaseNode, ConvNode, CtorNode, DataNode, DtorNode, FuncNode, PropNode},
    registry::{Registry, Signature, SlotKey, TypeNode, META_LOG},
    ArgList,
    Callable,
    Cell,
    ConstMethod,
    Extends,
    Handle,
    Ident,
    MemberKind,
    MetaError,
    MetaResult,
    MutMethod,
    Origin,
    Property,
    TypeRef,
};

/// Declares the reflection identity of the `T` type: its name and the
/// properties.
///
/// Returns a [Factory] that declares the members of the type.
///
/// The declared name must be unique across all registered types: it is
/// hashed into the numeric id used by the [resolve_name](crate::runtime::resolve_name)
/// lookup. The function returns [MetaError::IdCollision] if another
/// registered type has a name with the same id, and [MetaError::Duplicate]
/// if the `T` type already has a declared identity.
///
/// ```
/// use astra_meta::runtime::{reflect, resolve, resolve_name, Cell, Handle};
///
/// #[derive(Clone)]
/// struct Vector {
///     x: f32,
///     y: f32,
/// }
///
/// reflect::<Vector>("doc::reflect::Vector", [])
///     .and_then(|factory| factory.constructor(|x: f32, y: f32| Vector { x, y }, []))
///     .and_then(|factory| factory.data_field("x", |v| &v.x, |v| &mut v.x, []))
///     .and_then(|factory| factory.data_field("y", |v| &v.y, |v| &mut v.y, []))
///     .and_then(|factory| factory.method("len", |v: &Vector| v.x.hypot(v.y), []))
///     .unwrap();
///
/// let ty = resolve_name("doc::reflect::Vector").unwrap();
///
/// assert_eq!(ty, resolve::<Vector>());
///
/// let vector = ty.construct(&[Cell::give(3.0f32), Cell::give(4.0f32)]);
/// let len = ty.func("len").unwrap().invoke(vector.handle(), &[]);
///
/// assert_eq!(len.try_cast::<f32>(), Some(&5.0));
/// ```
#[track_caller]
pub fn reflect<T: 'static>(
    name: &str,
    props: impl IntoIterator<Item = Property>,
) -> MetaResult<Factory<T>> {
    factory::<T>().ty(name, props)
}

/// Returns a [Factory] that declares the members of the `T` type without
/// declaring its identity.
///
/// The members of a type without the declared identity are reachable
/// through [resolve](crate::runtime::resolve), but the type is not
/// [registered](TypeRef::is_registered): it cannot be found by name and does
/// not appear in [resolve_all](crate::runtime::resolve_all).
#[inline(always)]
pub fn factory<T: 'static>() -> Factory<T> {
    Factory {
        marker: PhantomData,
    }
}

/// Removes the `T` type and all of its members from the registry.
///
/// The identity slots of the type and of its members become free, so they
/// can be declared again. The base relations of other types pointing to the
/// `T` type remain intact.
///
/// Returns true if the type identity had been declared. The members of an
/// anonymous type are removed as well, but the function returns false.
pub fn unregister<T: ?Sized + 'static>() -> bool {
    let ty = TypeRef::of::<T>();

    let removed = Registry::write(|registry| registry.unregister(&ty.type_id()));

    if removed {
        debug!(target: META_LOG, "Type '{ty}' unregistered.");
    }

    removed
}

/// A builder of the reflection metadata of the `T` type.
///
/// The Factory is a zero-sized object. Each declaration function either
/// registers a new entity and returns the Factory back for chaining, or
/// rejects the declaration with a [MetaError] leaving the registry intact.
///
/// Every entity occupies an identity slot within its owner type. A second
/// declaration of an entity with the same kind and the same identity is
/// rejected with [MetaError::Duplicate]:
///
///  - A base relation is identified by the base type.
///  - A conversion is identified by the target type.
///  - A constructor is identified by the tuple of its parameter types.
///  - A destructor is unique per type.
///  - A data member and a function are identified by their names.
///
/// The declaration functions capture the location of the caller, and the
/// errors refer to it.
pub struct Factory<T: 'static> {
    marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Clone for Factory<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Factory<T> {}

impl<T: 'static> Factory<T> {
    /// Declares the reflection identity of the type. See [reflect] for
    /// details.
    #[track_caller]
    pub fn ty(self, name: &str, props: impl IntoIterator<Item = Property>) -> MetaResult<Self> {
        let origin = Origin::caller();
        let ty = TypeRef::of::<T>();
        let ident = Ident::new(name);
        let props = collect_props(ty, props, origin).map_err(reject)?;

        Registry::write(|registry| -> MetaResult<()> {
            registry.check_identity(ty, &ident, origin)?;
            registry.declare_identity(ty, ident, props, origin);

            Ok(())
        })
        .map_err(reject)?;

        trace!(target: META_LOG, "Type '{ty}' declared as '{name}' in {origin}.");

        Ok(self)
    }

    /// Declares the `B` type as a base of this type.
    ///
    /// The members of the base become available through the lookup functions
    /// of this type, and the instances of this type can be passed wherever
    /// the `B` instances are expected.
    #[track_caller]
    pub fn base<B: Any>(self) -> MetaResult<Self>
    where
        T: Extends<B>,
    {
        let origin = Origin::caller();
        let parent = TypeRef::of::<T>();
        let ty = TypeRef::of::<B>();

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Base,
            signature: Signature::of::<B>(),
        };

        let node = BaseNode {
            parent,
            ty,
            cast: upcast_ref::<T, B>,
            cast_mut: upcast_mut::<T, B>,
            slot,
            origin,
        };

        attach(slot, ty.rust_name(), origin, node, |owner, node| {
            owner.bases.push(node)
        })?;

        Ok(self)
    }

    /// Declares a conversion of this type into the `To` type through the
    /// [Into] implementation.
    #[track_caller]
    pub fn conversion<To>(self) -> MetaResult<Self>
    where
        T: Clone + Into<To>,
        To: Send + Sync + 'static,
    {
        self.conversion_with(|this: &T| this.clone().into())
    }

    /// Declares a conversion of this type into the `To` type through the
    /// `converter` function.
    #[track_caller]
    pub fn conversion_with<To, F>(self, converter: F) -> MetaResult<Self>
    where
        To: Send + Sync + 'static,
        F: Fn(&T) -> To + Send + Sync + 'static,
    {
        self.conversion_checked(move |this: &T| Some(converter(this)))
    }

    /// Declares a fallible conversion of this type into the `To` type.
    ///
    /// The conversion fails if the `converter` function returns None.
    #[track_caller]
    pub fn conversion_checked<To, F>(self, converter: F) -> MetaResult<Self>
    where
        To: Send + Sync + 'static,
        F: Fn(&T) -> Option<To> + Send + Sync + 'static,
    {
        let origin = Origin::caller();
        let parent = TypeRef::of::<T>();
        let ty = TypeRef::of::<To>();

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Conversion,
            signature: Signature::of::<To>(),
        };

        let node = ConvNode {
            parent,
            ty,
            convert: Box::new(move |data: &dyn Any| {
                match data.downcast_ref::<T>().and_then(&converter) {
                    Some(converted) => Cell::give(converted),
                    None => Cell::nil(),
                }
            }),
            slot,
            origin,
        };

        attach(slot, ty.rust_name(), origin, node, |owner, node| {
            owner.conversions.push(node)
        })?;

        Ok(self)
    }

    /// Declares a constructor of this type.
    ///
    /// The `Args` type parameter is the tuple of the constructor parameter
    /// types. It is inferred from the `constructor` function.
    #[track_caller]
    pub fn constructor<Args, F>(
        self,
        constructor: F,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        T: Send + Sync,
        Args: ArgList,
        F: Callable<Args, Output = T>,
    {
        let origin = Origin::caller();

        self.declare_constructor::<Args>(constructor_wrapper(constructor), props, origin)
    }

    /// Declares a constructor of this type through the [From] implementation.
    ///
    /// The `Args` tuple is resolved from the constructor arguments and then
    /// converted into the instance.
    #[track_caller]
    pub fn constructor_from<Args>(self, props: impl IntoIterator<Item = Property>) -> MetaResult<Self>
    where
        T: From<Args> + Send + Sync,
        Args: ArgList,
    {
        let origin = Origin::caller();

        let invoke: Construct = Box::new(|arguments: &[Cell]| match Args::resolve(arguments) {
            Some(args) => Cell::give(T::from(args)),
            None => Cell::nil(),
        });

        self.declare_constructor::<Args>(invoke, props, origin)
    }

    /// Declares a destructor of this type.
    ///
    /// The `destructor` function receives an exclusive reference to the
    /// instance. The type can have at most one destructor.
    #[track_caller]
    pub fn destructor<F>(self, destructor: F) -> MetaResult<Self>
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let origin = Origin::caller();
        let parent = TypeRef::of::<T>();

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Destructor,
            signature: Signature::Unit,
        };

        let node = DtorNode {
            parent,
            invoke: Box::new(move |mut instance: Handle<'_>| match instance.data_mut::<T>() {
                Some(this) => {
                    destructor(this);
                    true
                }

                None => false,
            }),
            slot,
            origin,
        };

        attach(slot, "", origin, node, |owner, node| {
            owner.destructor = Some(node)
        })?;

        Ok(self)
    }

    /// Declares a read-only static data member bound to the `value`.
    #[track_caller]
    pub fn data_value<V>(
        self,
        name: &str,
        value: V,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        self.declare_data::<V>(
            name,
            true,
            true,
            Box::new(BoundValue { value }),
            props,
            origin,
        )
    }

    /// Declares a data member projected from the instance field.
    ///
    /// The `get` and the `get_mut` functions return references to the same
    /// field of the instance.
    #[track_caller]
    pub fn data_field<V, G, M>(
        self,
        name: &str,
        get: G,
        get_mut: M,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = Field {
            get,
            get_mut: Some(get_mut),
            marker: PhantomData,
        };

        self.declare_data::<V>(name, false, false, Box::new(accessor), props, origin)
    }

    /// Declares a read-only data member projected from the instance field.
    #[track_caller]
    pub fn data_field_const<V, G>(
        self,
        name: &str,
        get: G,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = Field::<T, V, G, fn(&mut T) -> &mut V> {
            get,
            get_mut: None,
            marker: PhantomData,
        };

        self.declare_data::<V>(name, true, false, Box::new(accessor), props, origin)
    }

    /// Declares a data member projected from the instance array field.
    ///
    /// The elements are accessed through the [get_at](crate::runtime::DataRef::get_at)
    /// and [set_at](crate::runtime::DataRef::set_at) functions. The type of
    /// the data member is the type of the element.
    #[track_caller]
    pub fn data_array<V, const N: usize, G, M>(
        self,
        name: &str,
        get: G,
        get_mut: M,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        G: Fn(&T) -> &[V; N] + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut [V; N] + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = ArrayField {
            get,
            get_mut: Some(get_mut),
            marker: PhantomData,
        };

        self.declare_data::<V>(name, false, false, Box::new(accessor), props, origin)
    }

    /// Declares a read-only data member projected from the instance array
    /// field.
    #[track_caller]
    pub fn data_array_const<V, const N: usize, G>(
        self,
        name: &str,
        get: G,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        G: Fn(&T) -> &[V; N] + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = ArrayField::<T, V, N, G, fn(&mut T) -> &mut [V; N]> {
            get,
            get_mut: None,
            marker: PhantomData,
        };

        self.declare_data::<V>(name, true, false, Box::new(accessor), props, origin)
    }

    /// Declares a static data member backed by the global `variable`.
    #[track_caller]
    pub fn data_static<V>(
        self,
        name: &str,
        variable: &'static RwLock<V>,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        self.declare_data::<V>(
            name,
            false,
            true,
            Box::new(Global { variable }),
            props,
            origin,
        )
    }

    /// Declares a read-only static data member backed by the global
    /// `variable`.
    #[track_caller]
    pub fn data_static_const<V>(
        self,
        name: &str,
        variable: &'static V,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        self.declare_data::<V>(
            name,
            true,
            true,
            Box::new(GlobalConst { variable }),
            props,
            origin,
        )
    }

    /// Declares a static data member backed by the global array `variable`.
    #[track_caller]
    pub fn data_static_array<V, const N: usize>(
        self,
        name: &str,
        variable: &'static RwLock<[V; N]>,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        self.declare_data::<V>(
            name,
            false,
            true,
            Box::new(GlobalArray { variable }),
            props,
            origin,
        )
    }

    /// Declares a data member accessed through a pair of the `setter` and
    /// `getter` functions of the instance.
    #[track_caller]
    pub fn data_property<V, S, G>(
        self,
        name: &str,
        setter: S,
        getter: G,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = data::Property {
            setter,
            getter,
            marker: PhantomData,
        };

        self.declare_data::<V>(name, false, false, Box::new(accessor), props, origin)
    }

    /// Declares a static data member accessed through a pair of the `setter`
    /// and `getter` functions.
    #[track_caller]
    pub fn data_property_static<V, S, G>(
        self,
        name: &str,
        setter: S,
        getter: G,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        V: Clone + Send + Sync + 'static,
        S: Fn(V) + Send + Sync + 'static,
        G: Fn() -> V + Send + Sync + 'static,
    {
        let origin = Origin::caller();

        let accessor = data::StaticProperty {
            setter,
            getter,
            marker: PhantomData,
        };

        self.declare_data::<V>(name, false, true, Box::new(accessor), props, origin)
    }

    /// Declares a static function of this type.
    ///
    /// The `Args` type parameter is the tuple of the function parameter
    /// types. It is inferred from the `function`.
    #[track_caller]
    pub fn function<Args, F>(
        self,
        name: &str,
        function: F,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        Args: ArgList,
        F: Callable<Args>,
    {
        let origin = Origin::caller();

        self.declare_function::<Args, F::Output>(
            name,
            false,
            true,
            function_wrapper(function),
            props,
            origin,
        )
    }

    /// Declares a method of this type that receives the instance by shared
    /// reference.
    #[track_caller]
    pub fn method<Args, F>(
        self,
        name: &str,
        method: F,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        Args: ArgList,
        F: ConstMethod<T, Args>,
    {
        let origin = Origin::caller();

        self.declare_function::<Args, F::Output>(
            name,
            true,
            false,
            method_wrapper(method),
            props,
            origin,
        )
    }

    /// Declares a method of this type that receives the instance by
    /// exclusive reference.
    #[track_caller]
    pub fn method_mut<Args, F>(
        self,
        name: &str,
        method: F,
        props: impl IntoIterator<Item = Property>,
    ) -> MetaResult<Self>
    where
        Args: ArgList,
        F: MutMethod<T, Args>,
    {
        let origin = Origin::caller();

        self.declare_function::<Args, F::Output>(
            name,
            false,
            false,
            method_mut_wrapper(method),
            props,
            origin,
        )
    }

    /// Removes the type and all of its members from the registry. See
    /// [unregister] for details.
    #[inline(always)]
    pub fn unregister(self) -> bool {
        unregister::<T>()
    }

    fn declare_constructor<Args: ArgList>(
        self,
        invoke: Construct,
        props: impl IntoIterator<Item = Property>,
        origin: Origin,
    ) -> MetaResult<Self> {
        let parent = TypeRef::of::<T>();
        let props = collect_props(parent, props, origin).map_err(reject)?;

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Constructor,
            signature: Signature::of::<Args>(),
        };

        let node = CtorNode {
            parent,
            args: Args::types(),
            invoke,
            props,
            slot,
            origin,
        };

        attach(slot, type_name::<Args>(), origin, node, |owner, node| {
            owner.constructors.push(node)
        })?;

        Ok(self)
    }

    fn declare_data<V: 'static>(
        self,
        name: &str,
        is_const: bool,
        is_static: bool,
        accessor: Box<dyn Accessor>,
        props: impl IntoIterator<Item = Property>,
        origin: Origin,
    ) -> MetaResult<Self> {
        let parent = TypeRef::of::<T>();
        let props = collect_props(parent, props, origin).map_err(reject)?;
        let ident = Ident::new(name);

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Data,
            signature: Signature::Name(ident.id()),
        };

        let node = DataNode {
            ident,
            parent,
            ty: TypeRef::of::<V>(),
            is_const,
            is_static,
            accessor,
            props,
            slot,
            origin,
        };

        attach(slot, name, origin, node, |owner, node| owner.data.push(node))?;

        Ok(self)
    }

    fn declare_function<Args: ArgList, R: 'static>(
        self,
        name: &str,
        is_const: bool,
        is_static: bool,
        invoke: Invoke,
        props: impl IntoIterator<Item = Property>,
        origin: Origin,
    ) -> MetaResult<Self> {
        let parent = TypeRef::of::<T>();
        let props = collect_props(parent, props, origin).map_err(reject)?;

        let slot = SlotKey {
            owner: parent,
            kind: MemberKind::Function,
            signature: Signature::Name(hash_name(name)),
        };

        let node = FuncNode {
            ident: Ident::new(name),
            parent,
            ret: TypeRef::of::<R>(),
            args: Args::types(),
            is_const,
            is_static,
            invoke,
            props,
            slot,
            origin,
        };

        attach(slot, name, origin, node, |owner, node| {
            owner.functions.push(node)
        })?;

        Ok(self)
    }
}

// Occupies the identity slot and attaches the member node to its owner type.
// The registry remains unchanged if the slot is already occupied.
fn attach<N>(
    slot: SlotKey,
    member: &str,
    origin: Origin,
    node: N,
    place: impl FnOnce(&mut TypeNode, Arc<N>),
) -> MetaResult<()> {
    Registry::write(|registry| -> MetaResult<()> {
        registry.check_slot(&slot, origin, member)?;
        registry.occupy(slot, origin);

        place(registry.node_mut(slot.owner), Arc::new(node));

        Ok(())
    })
    .map_err(reject)?;

    trace!(
        target: META_LOG,
        "{} '{member}' of '{}' declared in {origin}.",
        slot.kind,
        slot.owner,
    );

    Ok(())
}

fn collect_props(
    owner: TypeRef,
    props: impl IntoIterator<Item = Property>,
    origin: Origin,
) -> MetaResult<Vec<Arc<PropNode>>> {
    let mut result = Vec::<Arc<PropNode>>::new();

    for Property(prop) in props {
        if result
            .iter()
            .any(|previous| (prop.key_eq)(&prop.key, &previous.key))
        {
            return Err(MetaError::DuplicateProperty {
                origin,
                owner: owner.rust_name(),
                key: prop.key.type_name(),
            });
        }

        result.push(Arc::new(prop));
    }

    Ok(result)
}

#[inline(always)]
fn reject(error: MetaError) -> MetaError {
    warn!(target: META_LOG, "Declaration rejected. {error}");

    error
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use crate::runtime::{
        factory,
        reflect,
        resolve,
        Cell,
        Extends,
        Handle,
        MemberKind,
        MetaError,
        MetaResultExt,
        Origin,
        Property,
    };

    #[derive(Clone, Debug, PartialEq)]
    struct Lamp {
        power: u32,
        channels: [u8; 3],
        on: bool,
    }

    impl Lamp {
        fn toggle(&mut self) -> bool {
            self.on = !self.on;
            self.on
        }

        fn brightness(&self) -> u32 {
            match self.on {
                true => self.power,
                false => 0,
            }
        }
    }

    impl From<(u32,)> for Lamp {
        fn from((power,): (u32,)) -> Self {
            Self {
                power,
                channels: [0; 3],
                on: false,
            }
        }
    }

    static LIMIT: RwLock<u32> = RwLock::new(100);
    static MODEL: &str = "LX-1";

    fn declare() {
        static ONCE: std::sync::Once = std::sync::Once::new();

        ONCE.call_once(|| {
            let _ = reflect::<Lamp>("factory::Lamp", [Property::new("room", "hall")])
                .and_then(|factory| factory.constructor_from::<(u32,)>([]))
                .and_then(|factory| {
                    factory.data_field("power", |lamp| &lamp.power, |lamp| &mut lamp.power, [])
                })
                .and_then(|factory| factory.data_field_const("on", |lamp| &lamp.on, []))
                .and_then(|factory| {
                    factory.data_array(
                        "channels",
                        |lamp| &lamp.channels,
                        |lamp| &mut lamp.channels,
                        [],
                    )
                })
                .and_then(|factory| factory.data_value("version", 2u8, []))
                .and_then(|factory| factory.data_static("limit", &LIMIT, []))
                .and_then(|factory| factory.data_static_const("model", &MODEL, []))
                .and_then(|factory| {
                    factory.data_property(
                        "watts",
                        |lamp: &mut Lamp, watts: f64| lamp.power = watts as u32,
                        |lamp: &Lamp| lamp.power as f64,
                        [],
                    )
                })
                .and_then(|factory| factory.method_mut("toggle", Lamp::toggle, []))
                .and_then(|factory| factory.method("brightness", Lamp::brightness, []))
                .and_then(|factory| {
                    factory.function("limit", || *LIMIT.read().unwrap(), [Property::new(0u8, ())])
                })
                .expect_blame("Lamp declaration failed");
        });
    }

    fn lamp() -> Lamp {
        Lamp {
            power: 60,
            channels: [1, 2, 3],
            on: false,
        }
    }

    #[test]
    fn test_member_flags() {
        declare();

        let ty = resolve::<Lamp>();

        let power = ty.data("power").expect("missing power");
        let on = ty.data("on").expect("missing on");
        let version = ty.data("version").expect("missing version");
        let limit = ty.data("limit").expect("missing limit");
        let model = ty.data("model").expect("missing model");

        assert!(!power.is_const() && !power.is_static());
        assert!(on.is_const() && !on.is_static());
        assert!(version.is_const() && version.is_static());
        assert!(!limit.is_const() && limit.is_static());
        assert!(model.is_const() && model.is_static());
        assert!(power.ty().is::<u32>());
        assert!(ty.data("channels").map(|data| data.ty().is::<u8>()) == Some(true));

        let toggle = ty.func("toggle").expect("missing toggle");
        let brightness = ty.func("brightness").expect("missing brightness");
        let function = ty.func("limit").expect("missing limit function");

        assert!(!toggle.is_const() && !toggle.is_static());
        assert!(brightness.is_const() && !brightness.is_static());
        assert!(!function.is_const() && function.is_static());
        assert!(toggle.ret().is::<bool>());
        assert_eq!(function.arity(), 0);
        assert!(function.prop(&0u8).is_some());

        assert_eq!(power.origin().file(), Some(file!()));
        assert_eq!(ty.origin().file(), Some(file!()));
        assert_eq!(ty.prop(&"room").map(|prop| prop.value().take::<&str>()), Some(Some("hall")));
    }

    #[test]
    fn test_data_access() {
        declare();

        let ty = resolve::<Lamp>();
        let mut lamp = lamp();

        let power = ty.data("power").expect("missing power");

        assert!(power.set(Handle::new_mut(&mut lamp), Cell::give(75u32)));
        assert_eq!(power.get(Handle::new(&lamp)).try_cast::<u32>(), Some(&75));

        let on = ty.data("on").expect("missing on");

        assert!(!on.set(Handle::new_mut(&mut lamp), Cell::give(true)));
        assert_eq!(on.get(Handle::new(&lamp)).try_cast::<bool>(), Some(&false));

        let channels = ty.data("channels").expect("missing channels");

        assert!(channels.set_at(Handle::new_mut(&mut lamp), Cell::give(2usize), Cell::give(9u8)));
        assert!(!channels.set_at(Handle::new_mut(&mut lamp), Cell::give(3usize), Cell::give(9u8)));
        assert_eq!(lamp.channels, [1, 2, 9]);
        assert!(channels.get(Handle::new(&lamp)).is_nil());

        let version = ty.data("version").expect("missing version");

        assert_eq!(version.get(Handle::nil()).try_cast::<u8>(), Some(&2));
        assert!(!version.set(Handle::nil(), Cell::give(3u8)));

        let model = ty.data("model").expect("missing model");

        assert_eq!(model.get(Handle::nil()).try_cast::<&str>(), Some(&"LX-1"));

        let watts = ty.data("watts").expect("missing watts");

        assert!(watts.set(Handle::new_mut(&mut lamp), Cell::give(40.0f64)));
        assert_eq!(lamp.power, 40);
        assert_eq!(watts.get(Handle::new(&lamp)).try_cast::<f64>(), Some(&40.0));
    }

    #[test]
    fn test_functions_and_constructors() {
        declare();

        let ty = resolve::<Lamp>();

        let lamp = ty.construct(&[Cell::give(25u32)]);

        assert_eq!(lamp.try_cast::<Lamp>().map(|lamp| lamp.power), Some(25));

        let mut lamp = lamp.take::<Lamp>().expect("construction failed");

        let toggle = ty.func("toggle").expect("missing toggle");
        let brightness = ty.func("brightness").expect("missing brightness");

        assert!(toggle.invoke(Handle::new(&lamp), &[]).is_nil());
        assert_eq!(
            toggle.invoke(Handle::new_mut(&mut lamp), &[]).try_cast::<bool>(),
            Some(&true),
        );
        assert_eq!(
            brightness.invoke(Handle::new(&lamp), &[]).try_cast::<u32>(),
            Some(&25),
        );
        assert!(brightness.invoke(Handle::new(&lamp), &[Cell::give(1u8)]).is_nil());

        let limit = ty.func("limit").expect("missing limit");

        assert_eq!(limit.invoke(Handle::nil(), &[]).try_cast::<u32>(), Some(&100));
    }

    #[test]
    fn test_rejected_declarations() {
        struct Switch;

        let line = line!() + 1;
        let result = reflect::<Switch>("factory::Switch", [Property::new(1u8, 'a'), Property::new(1u8, 'b')]);

        match result {
            Err(MetaError::DuplicateProperty { origin, .. }) => {
                assert_eq!(origin.line(), Some(line));
            }

            _ => panic!("duplicate property key accepted"),
        }

        assert!(!resolve::<Switch>().is_registered());

        let _ = reflect::<Switch>("factory::Switch", [Property::new(1u8, 'a'), Property::new(1u16, 'b')])
            .expect_blame("distinct key types rejected");

        let _ = factory::<Switch>()
            .data_value("state", false, [])
            .expect_blame("data declaration failed");

        match factory::<Switch>().data_value("state", true, []) {
            Err(error) => {
                assert!(matches!(
                    error,
                    MetaError::Duplicate {
                        kind: MemberKind::Data,
                        ..
                    }
                ));
                assert_ne!(error.origin(), Origin::nil());
            }

            Ok(_) => panic!("duplicate data member accepted"),
        }

        let _ = factory::<Switch>()
            .function("state", || true, [])
            .expect_blame("function with data member name rejected");

        let _ = factory::<Switch>()
            .constructor(|| Switch, [])
            .expect_blame("constructor declaration failed");

        assert!(factory::<Switch>().constructor(|| Switch, []).is_err());

        assert_eq!(resolve::<Switch>().data_members().len(), 1);
        assert_eq!(resolve::<Switch>().constructors().len(), 1);
        assert_eq!(
            resolve::<Switch>().data("state").map(|data| data.get(Handle::nil()).take::<bool>()),
            Some(Some(false)),
        );
    }

    #[test]
    fn test_static_and_array_members() {
        struct Panel {
            levels: [u8; 2],
        }

        static PRESETS: RwLock<[u8; 3]> = RwLock::new([10, 50, 100]);
        static GAIN: RwLock<f32> = RwLock::new(1.0);

        let _ = factory::<Panel>()
            .data_array_const("levels", |panel| &panel.levels, [])
            .and_then(|factory| factory.data_static_array("presets", &PRESETS, []))
            .and_then(|factory| {
                factory.data_property_static(
                    "gain",
                    |gain: f32| *GAIN.write().unwrap() = gain,
                    || *GAIN.read().unwrap(),
                    [],
                )
            })
            .expect_blame("Panel declaration failed");

        let ty = resolve::<Panel>();
        let mut panel = Panel { levels: [3, 7] };

        let levels = ty.data("levels").expect("missing levels");

        assert!(levels.is_const() && !levels.is_static());
        assert_eq!(
            levels.get_at(Handle::new(&panel), Cell::give(1usize)).try_cast::<u8>(),
            Some(&7),
        );
        assert!(levels.get_at(Handle::new(&panel), Cell::give(2usize)).is_nil());
        assert!(!levels.set_at(Handle::new_mut(&mut panel), Cell::give(0usize), Cell::give(1u8)));
        assert_eq!(panel.levels, [3, 7]);

        let presets = ty.data("presets").expect("missing presets");

        assert!(!presets.is_const() && presets.is_static());
        assert_eq!(
            presets.get_at(Handle::nil(), Cell::give(2usize)).try_cast::<u8>(),
            Some(&100),
        );
        assert!(presets.get_at(Handle::nil(), Cell::give(3usize)).is_nil());
        assert!(presets.get(Handle::nil()).is_nil());
        assert!(presets.set_at(Handle::nil(), Cell::give(0usize), Cell::give(20u8)));
        assert!(!presets.set_at(Handle::nil(), Cell::give(3usize), Cell::give(20u8)));
        assert_eq!(*PRESETS.read().unwrap(), [20, 50, 100]);

        let gain = ty.data("gain").expect("missing gain");

        assert!(!gain.is_const() && gain.is_static());
        assert!(gain.set(Handle::nil(), Cell::give(0.5f32)));
        assert_eq!(gain.get(Handle::nil()).try_cast::<f32>(), Some(&0.5));
        assert!(!gain.set(Handle::nil(), Cell::give('g')));
        assert!(gain.get_at(Handle::nil(), Cell::give(0usize)).is_nil());
        assert_eq!(*GAIN.read().unwrap(), 0.5);
    }

    #[test]
    fn test_base_and_conversion_descriptors() {
        #[derive(Clone)]
        struct Dimmer {
            lamp: Lamp,
            level: u32,
        }

        impl Extends<Lamp> for Dimmer {
            fn upcast(&self) -> &Lamp {
                &self.lamp
            }

            fn upcast_mut(&mut self) -> &mut Lamp {
                &mut self.lamp
            }
        }

        #[derive(Clone)]
        struct Lumens(u32);

        impl From<Dimmer> for Lumens {
            fn from(dimmer: Dimmer) -> Self {
                Self(dimmer.lamp.power * dimmer.level)
            }
        }

        declare();

        let _ = reflect::<Dimmer>("factory::Dimmer", [])
            .and_then(|factory| factory.base::<Lamp>())
            .and_then(|factory| factory.conversion::<Lumens>())
            .expect_blame("Dimmer declaration failed");

        let ty = resolve::<Dimmer>();
        let dimmer = Dimmer {
            lamp: lamp(),
            level: 2,
        };

        let base = ty.base(resolve::<Lamp>()).expect("missing base");

        assert_eq!(base.parent(), ty);
        assert_eq!(
            base.cast(Handle::new(&dimmer)).data::<Lamp>().map(|lamp| lamp.power),
            Some(60),
        );
        assert!(base.cast(Handle::new(&lamp())).is_nil());

        let conversion = ty.conversion(resolve::<Lumens>()).expect("missing conversion");

        assert_eq!(conversion.parent(), ty);
        assert_eq!(
            conversion.convert(Handle::new(&dimmer)).try_cast::<Lumens>().map(|lumens| lumens.0),
            Some(120),
        );
        assert!(conversion.convert(Handle::new(&5u8)).is_nil());

        let mut cell = Cell::give(dimmer);

        assert!(cell.convert::<Lumens>());
        assert_eq!(cell.try_cast::<Lumens>().map(|lumens| lumens.0), Some(120));
    }
}
