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
    any::Any,
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::runtime::{
    coercion::{UpcastFn, UpcastMutFn},
    data::Accessor,
    invoke::{Construct, Invoke},
    registry::SlotKey,
    Cell,
    Handle,
    Ident,
    Origin,
    TypeRef,
};

pub(crate) struct BaseNode {
    pub(crate) parent: TypeRef,
    pub(crate) ty: TypeRef,
    pub(crate) cast: UpcastFn,
    pub(crate) cast_mut: UpcastMutFn,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct ConvNode {
    pub(crate) parent: TypeRef,
    pub(crate) ty: TypeRef,
    pub(crate) convert: Box<dyn Fn(&dyn Any) -> Cell + Send + Sync>,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct CtorNode {
    pub(crate) parent: TypeRef,
    pub(crate) args: Vec<TypeRef>,
    pub(crate) invoke: Construct,
    pub(crate) props: Vec<Arc<PropNode>>,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct DtorNode {
    pub(crate) parent: TypeRef,
    pub(crate) invoke: Box<dyn Fn(Handle<'_>) -> bool + Send + Sync>,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct DataNode {
    pub(crate) ident: Ident,
    pub(crate) parent: TypeRef,
    pub(crate) ty: TypeRef,
    pub(crate) is_const: bool,
    pub(crate) is_static: bool,
    pub(crate) accessor: Box<dyn Accessor>,
    pub(crate) props: Vec<Arc<PropNode>>,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct FuncNode {
    pub(crate) ident: Ident,
    pub(crate) parent: TypeRef,
    pub(crate) ret: TypeRef,
    pub(crate) args: Vec<TypeRef>,
    pub(crate) is_const: bool,
    pub(crate) is_static: bool,
    pub(crate) invoke: Invoke,
    pub(crate) props: Vec<Arc<PropNode>>,
    pub(crate) slot: SlotKey,
    pub(crate) origin: Origin,
}

pub(crate) struct PropNode {
    pub(crate) key: Cell,
    pub(crate) value: Cell,
    pub(crate) key_eq: fn(&Cell, &Cell) -> bool,
}

/// A key-value pair attached to a reflected type or member.
///
/// The keys of the properties attached to the same entity must be unique.
/// The keys are compared using the [PartialEq] implementation of the key
/// type; keys of distinct types are never equal.
///
/// ```
/// use astra_meta::runtime::{reflect, resolve, Property};
///
/// struct Sprite;
///
/// reflect::<Sprite>(
///     "doc::property::Sprite",
///     [Property::new("category", "graphics"), Property::new(1u8, true)],
/// )
/// .unwrap();
///
/// let category = resolve::<Sprite>().prop(&"category").unwrap();
///
/// assert_eq!(category.value().try_cast::<&str>(), Some(&"graphics"));
/// assert!(resolve::<Sprite>().prop(&1u8).is_some());
/// assert!(resolve::<Sprite>().prop(&1u16).is_none());
/// ```
pub struct Property(pub(crate) PropNode);

impl Property {
    /// Creates a property with the `key` and `value`.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: PartialEq + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        Self(PropNode {
            key: Cell::give(key),
            value: Cell::give(value),
            key_eq: key_eq::<K>,
        })
    }
}

fn key_eq<K: PartialEq + 'static>(this: &Cell, other: &Cell) -> bool {
    match (this.try_cast::<K>(), other.try_cast::<K>()) {
        (Some(this), Some(other)) => this.eq(other),
        _ => false,
    }
}

macro_rules! impl_descriptor {
    ($descriptor:ident($node:ident)) => {
        impl PartialEq for $descriptor {
            #[inline(always)]
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $descriptor {}

        impl Hash for $descriptor {
            #[inline(always)]
            fn hash<H: Hasher>(&self, state: &mut H) {
                Arc::as_ptr(&self.0).hash(state)
            }
        }

        impl From<Arc<$node>> for $descriptor {
            #[inline(always)]
            fn from(node: Arc<$node>) -> Self {
                Self(node)
            }
        }
    };
}

macro_rules! impl_props {
    ($descriptor:ident) => {
        impl $descriptor {
            /// Returns the properties attached to this member.
            #[inline]
            pub fn props(&self) -> Vec<PropRef> {
                self.0.props.iter().rev().cloned().map(PropRef).collect()
            }

            /// Returns the property attached to this member by its key.
            #[inline]
            pub fn prop<K: PartialEq + 'static>(&self, key: &K) -> Option<PropRef> {
                find_prop(&self.0.props, key)
            }
        }
    };
}

#[inline]
pub(crate) fn find_prop<K: PartialEq + 'static>(
    props: &[Arc<PropNode>],
    key: &K,
) -> Option<PropRef> {
    props
        .iter()
        .find(|prop| prop.key.try_cast::<K>() == Some(key))
        .cloned()
        .map(PropRef)
}

/// A descriptor of a declared base type relation.
#[derive(Clone)]
pub struct BaseRef(Arc<BaseNode>);

impl_descriptor!(BaseRef(BaseNode));

impl Debug for BaseRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "BaseRef({}: {})",
            self.0.parent.rust_name(),
            self.0.ty.rust_name(),
        ))
    }
}

impl BaseRef {
    /// Returns the derived type.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the base type.
    #[inline(always)]
    pub fn ty(&self) -> TypeRef {
        self.0.ty
    }

    /// Returns the Rust code where the relation has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Casts the Handle of the derived type instance to the Handle of its
    /// base sub-object.
    ///
    /// Returns the [Nil Handle](Handle::nil) if the `instance` is not of the
    /// derived type.
    #[inline]
    pub fn cast<'a>(&self, instance: Handle<'a>) -> Handle<'a> {
        if instance.type_id() != Some(self.0.parent.type_id()) {
            return Handle::nil();
        }

        instance.follow(std::slice::from_ref(&self.0))
    }
}

/// A descriptor of a declared conversion.
#[derive(Clone)]
pub struct ConvRef(Arc<ConvNode>);

impl_descriptor!(ConvRef(ConvNode));

impl Debug for ConvRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "ConvRef({} -> {})",
            self.0.parent.rust_name(),
            self.0.ty.rust_name(),
        ))
    }
}

impl ConvRef {
    /// Returns the source type of the conversion.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the target type of the conversion.
    #[inline(always)]
    pub fn ty(&self) -> TypeRef {
        self.0.ty
    }

    /// Returns the Rust code where the conversion has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Converts the referenced instance.
    ///
    /// Returns the [Nil Cell](Cell::nil) if the `instance` is not of the
    /// source type, or if the conversion function refused the value.
    #[inline]
    pub fn convert(&self, instance: Handle<'_>) -> Cell {
        match instance.as_any() {
            Some(data) => (self.0.convert)(data),
            None => Cell::nil(),
        }
    }
}

/// A descriptor of a declared constructor.
#[derive(Clone)]
pub struct CtorRef(Arc<CtorNode>);

impl_descriptor!(CtorRef(CtorNode));
impl_props!(CtorRef);

impl Debug for CtorRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug_tuple = formatter.debug_tuple("CtorRef");

        for arg in &self.0.args {
            let _ = debug_tuple.field(&format_args!("{}", arg.rust_name()));
        }

        debug_tuple.finish()
    }
}

impl CtorRef {
    /// Returns the constructed type.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the number of the constructor parameters.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.0.args.len()
    }

    /// Returns the type of the parameter at the `index` position.
    #[inline(always)]
    pub fn arg(&self, index: usize) -> Option<TypeRef> {
        self.0.args.get(index).copied()
    }

    /// Returns the Rust code where the constructor has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Constructs an instance from the type-erased `arguments`.
    ///
    /// Each argument is resolved either by the exact type match, or by the
    /// [conversion](Cell::convert) into the parameter type. The constructor
    /// is called only if all arguments have been resolved. Otherwise, the
    /// function returns the [Nil Cell](Cell::nil).
    #[inline]
    pub fn invoke(&self, arguments: &[Cell]) -> Cell {
        if arguments.len() != self.arity() {
            return Cell::nil();
        }

        (self.0.invoke)(arguments)
    }
}

/// A descriptor of a declared destructor.
#[derive(Clone)]
pub struct DtorRef(Arc<DtorNode>);

impl_descriptor!(DtorRef(DtorNode));

impl Debug for DtorRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("DtorRef({})", self.0.parent.rust_name()))
    }
}

impl DtorRef {
    /// Returns the destructed type.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the Rust code where the destructor has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Calls the destructor function on the referenced instance.
    ///
    /// Returns false if the `instance` is not an exclusive Handle of the
    /// destructed type.
    #[inline]
    pub fn invoke(&self, instance: Handle<'_>) -> bool {
        (self.0.invoke)(instance.retarget(self.0.parent.type_id()))
    }
}

/// A descriptor of a declared data member.
///
/// The data member is accessed through the [get](Self::get) and
/// [set](Self::set) functions regardless of how the data is actually stored:
/// as a struct field, as a global variable, as a pair of getter and setter
/// functions, or as a value bound at the declaration time.
#[derive(Clone)]
pub struct DataRef(Arc<DataNode>);

impl_descriptor!(DataRef(DataNode));
impl_props!(DataRef);

impl Debug for DataRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "DataRef({}::{}: {})",
            self.0.parent.rust_name(),
            self.0.ident,
            self.0.ty.rust_name(),
        ))
    }
}

impl DataRef {
    /// Returns the name of the data member.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.0.ident.as_ref()
    }

    /// Returns the numeric id of the data member's name.
    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.0.ident.id()
    }

    /// Returns the type that owns the data member.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the type of the data. For arrays, this is the type of the
    /// array element.
    #[inline(always)]
    pub fn ty(&self) -> TypeRef {
        self.0.ty
    }

    /// Returns true if the data member is read-only.
    #[inline(always)]
    pub fn is_const(&self) -> bool {
        self.0.is_const
    }

    /// Returns true if the data member does not require an instance.
    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    /// Returns the Rust code where the data member has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Reads the data of the referenced `instance`.
    ///
    /// Returns the [Nil Cell](Cell::nil) if the instance is not of the owner
    /// type (or its derived type), or if the data member is an array.
    #[inline]
    pub fn get(&self, instance: Handle<'_>) -> Cell {
        self.0
            .accessor
            .get(instance.retarget(self.0.parent.type_id()), None)
    }

    /// Reads the array element at the `index` position.
    ///
    /// The index is resolved into `usize` by the exact type match or by the
    /// [conversion](Cell::convert). Returns the [Nil Cell](Cell::nil) if the
    /// index cannot be resolved or is out of bounds.
    #[inline]
    pub fn get_at(&self, instance: Handle<'_>, index: Cell) -> Cell {
        self.0
            .accessor
            .get(instance.retarget(self.0.parent.type_id()), Some(&index))
    }

    /// Writes the `value` into the data of the referenced `instance`.
    ///
    /// The value is resolved into the data type by the exact type match or by
    /// the [conversion](Cell::convert). Returns false if the data member is
    /// read-only, if the value or the instance cannot be resolved, or if the
    /// data member is an array.
    #[inline]
    pub fn set(&self, instance: Handle<'_>, value: Cell) -> bool {
        self.0
            .accessor
            .set(instance.retarget(self.0.parent.type_id()), None, &value)
    }

    /// Writes the `value` into the array element at the `index` position.
    #[inline]
    pub fn set_at(&self, instance: Handle<'_>, index: Cell, value: Cell) -> bool {
        self.0.accessor.set(
            instance.retarget(self.0.parent.type_id()),
            Some(&index),
            &value,
        )
    }
}

/// A descriptor of a declared function.
#[derive(Clone)]
pub struct FuncRef(Arc<FuncNode>);

impl_descriptor!(FuncRef(FuncNode));
impl_props!(FuncRef);

impl Debug for FuncRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "FuncRef({}::{})",
            self.0.parent.rust_name(),
            self.0.ident,
        ))
    }
}

impl FuncRef {
    /// Returns the name of the function.
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.0.ident.as_ref()
    }

    /// Returns the numeric id of the function's name.
    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.0.ident.id()
    }

    /// Returns the type that owns the function.
    #[inline(always)]
    pub fn parent(&self) -> TypeRef {
        self.0.parent
    }

    /// Returns the number of the function parameters, not counting the
    /// receiver.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.0.args.len()
    }

    /// Returns true if the function receives the instance by shared
    /// reference.
    #[inline(always)]
    pub fn is_const(&self) -> bool {
        self.0.is_const
    }

    /// Returns true if the function does not require an instance.
    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    /// Returns the return type of the function.
    #[inline(always)]
    pub fn ret(&self) -> TypeRef {
        self.0.ret
    }

    /// Returns the type of the parameter at the `index` position.
    #[inline(always)]
    pub fn arg(&self, index: usize) -> Option<TypeRef> {
        self.0.args.get(index).copied()
    }

    /// Returns the Rust code where the function has been declared.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.0.origin
    }

    /// Calls the function with the type-erased `arguments`.
    ///
    /// The `instance` is ignored by the static functions.
    ///
    /// Each argument is resolved either by the exact type match, or by the
    /// [conversion](Cell::convert) into the parameter type. The function is
    /// called only if the instance and all arguments have been resolved.
    /// Otherwise, the function returns the [Nil Cell](Cell::nil).
    ///
    /// A successful call of a function that returns `()` produces the
    /// [Void Cell](Cell::void).
    #[inline]
    pub fn invoke(&self, instance: Handle<'_>, arguments: &[Cell]) -> Cell {
        if arguments.len() != self.arity() {
            return Cell::nil();
        }

        (self.0.invoke)(instance.retarget(self.0.parent.type_id()), arguments)
    }
}

/// A descriptor of a property attached to a reflected type or member.
#[derive(Clone)]
pub struct PropRef(Arc<PropNode>);

impl_descriptor!(PropRef(PropNode));

impl Debug for PropRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PropRef")
            .field("key", &self.0.key)
            .field("value", &self.0.value)
            .finish()
    }
}

impl PropRef {
    /// Returns the key of the property.
    #[inline(always)]
    pub fn key(&self) -> Cell {
        self.0.key.clone()
    }

    /// Returns the value of the property.
    #[inline(always)]
    pub fn value(&self) -> Cell {
        self.0.value.clone()
    }
}
