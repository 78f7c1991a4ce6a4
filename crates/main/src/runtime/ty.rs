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
    any::{type_name, TypeId},
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use ahash::AHashSet;
use compact_str::CompactString;

use crate::runtime::{
    coercion::upcast_path,
    hash_name,
    members::find_prop,
    registry::{Registry, TypeNode},
    BaseRef,
    Cell,
    ConvRef,
    CtorRef,
    DataRef,
    DtorRef,
    FuncRef,
    Handle,
    Origin,
    PropRef,
};

/// A reference to a Rust type in the reflection registry.
///
/// The TypeRef is a lightweight Copy object that can be obtained for any
/// `'static` Rust type using the [resolve] function, regardless of whether
/// the type has been declared through the [Factory](crate::runtime::Factory).
/// The query functions of this object read the current state of the registry:
/// an unregistered type has no name and no members.
///
/// Two TypeRefs are equal if and only if they refer to the same Rust type.
///
/// ```
/// use astra_meta::runtime::{reflect, resolve, resolve_name};
///
/// struct Planet;
///
/// let ty = resolve::<Planet>();
///
/// assert!(!ty.is_registered());
/// assert_eq!(ty.name(), None);
///
/// reflect::<Planet>("doc::ty::Planet", []).unwrap();
///
/// assert!(ty.is_registered());
/// assert_eq!(ty.name().as_deref(), Some("doc::ty::Planet"));
/// assert_eq!(resolve_name("doc::ty::Planet"), Some(ty));
/// ```
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
}

impl PartialEq for TypeRef {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl Eq for TypeRef {}

impl PartialOrd for TypeRef {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeRef {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for TypeRef {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Debug for TypeRef {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("TypeRef({})", self.name))
    }
}

impl Display for TypeRef {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name)
    }
}

impl TypeRef {
    #[inline(always)]
    pub(crate) fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the [TypeId] of the Rust type.
    #[inline(always)]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust name of the type as reported by the compiler.
    ///
    /// Unlike the [name](Self::name), the Rust name is not stable between
    /// compilations and is intended for diagnostics only.
    #[inline(always)]
    pub fn rust_name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this TypeRef refers to the `T` type.
    #[inline(always)]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Returns true if the type identity has been declared.
    ///
    /// A type with the declared members but without the identity is not
    /// registered, though its members are still accessible through this
    /// TypeRef.
    #[inline]
    pub fn is_registered(&self) -> bool {
        Registry::read(|registry| registry.is_registered(&self.id))
    }

    /// Returns the declared name of the type.
    pub fn name(&self) -> Option<CompactString> {
        self.with_node(|node| node.ident.as_ref().map(|ident| ident.string().clone()))
            .flatten()
    }

    /// Returns the numeric id of the declared type name.
    pub fn id(&self) -> Option<u64> {
        self.with_node(|node| node.ident.as_ref().map(|ident| ident.id()))
            .flatten()
    }

    /// Returns the Rust code where the type identity has been declared.
    ///
    /// Returns the [nil](Origin::nil) Origin if the type has no declared
    /// identity.
    pub fn origin(&self) -> Origin {
        self.with_node(|node| node.origin).unwrap_or_default()
    }

    /// Returns the properties attached to the type, the most recently
    /// declared first.
    pub fn props(&self) -> Vec<PropRef> {
        self.collect(|node| {
            node.props
                .iter()
                .rev()
                .cloned()
                .map(PropRef::from)
                .collect()
        })
    }

    /// Returns the property attached to the type by its key.
    pub fn prop<K: PartialEq + 'static>(&self, key: &K) -> Option<PropRef> {
        let props = self.collect(|node| node.props.clone());

        find_prop(&props, key)
    }

    /// Returns the declared direct bases of the type, the most recently
    /// declared first.
    pub fn bases(&self) -> Vec<BaseRef> {
        self.collect(|node| node.bases.iter().rev().cloned().map(BaseRef::from).collect())
    }

    /// Returns the declared direct base relation to the `base` type.
    pub fn base(&self, base: TypeRef) -> Option<BaseRef> {
        self.with_node(|node| {
            node.bases
                .iter()
                .find(|node| node.ty == base)
                .cloned()
                .map(BaseRef::from)
        })
        .flatten()
    }

    /// Returns true if the `base` type is reachable from this type through
    /// the chain of the declared base relations.
    ///
    /// A type is not derived from itself.
    pub fn is_derived_from(&self, base: TypeRef) -> bool {
        if self.id == base.id {
            return false;
        }

        upcast_path(self.id, base.id).is_some()
    }

    /// Returns the declared conversions of the type, the most recently
    /// declared first.
    pub fn conversions(&self) -> Vec<ConvRef> {
        self.collect(|node| {
            node.conversions
                .iter()
                .rev()
                .cloned()
                .map(ConvRef::from)
                .collect()
        })
    }

    /// Returns the declared conversion to the `target` type.
    ///
    /// This function does not look into the bases of the type. Use
    /// [Cell::convert] to apply the inherited conversions.
    pub fn conversion(&self, target: TypeRef) -> Option<ConvRef> {
        self.with_node(|node| {
            node.conversions
                .iter()
                .find(|node| node.ty == target)
                .cloned()
                .map(ConvRef::from)
        })
        .flatten()
    }

    /// Returns the declared constructors of the type, the most recently
    /// declared first.
    pub fn constructors(&self) -> Vec<CtorRef> {
        self.collect(|node| {
            node.constructors
                .iter()
                .rev()
                .cloned()
                .map(CtorRef::from)
                .collect()
        })
    }

    /// Returns the declared destructor of the type.
    pub fn destructor(&self) -> Option<DtorRef> {
        self.with_node(|node| node.destructor.clone().map(DtorRef::from))
            .flatten()
    }

    /// Returns the data members declared on this type (excluding the bases),
    /// the most recently declared first.
    pub fn data_members(&self) -> Vec<DataRef> {
        self.collect(|node| node.data.iter().rev().cloned().map(DataRef::from).collect())
    }

    /// Looks up a data member by name.
    ///
    /// The members declared on this type take priority. Then the bases are
    /// searched depth-first, the most recently declared base first.
    pub fn data(&self, name: &str) -> Option<DataRef> {
        let id = hash_name(name);

        Registry::read(|registry| {
            search_members(registry, self.id, &mut AHashSet::new(), &|node| {
                node.data
                    .iter()
                    .rev()
                    .find(|data| data.ident.id() == id)
                    .cloned()
                    .map(DataRef::from)
            })
        })
    }

    /// Returns the functions declared on this type (excluding the bases),
    /// the most recently declared first.
    pub fn functions(&self) -> Vec<FuncRef> {
        self.collect(|node| {
            node.functions
                .iter()
                .rev()
                .cloned()
                .map(FuncRef::from)
                .collect()
        })
    }

    /// Looks up a function by name.
    ///
    /// The functions declared on this type take priority. Then the bases are
    /// searched depth-first, the most recently declared base first.
    pub fn func(&self, name: &str) -> Option<FuncRef> {
        let id = hash_name(name);

        Registry::read(|registry| {
            search_members(registry, self.id, &mut AHashSet::new(), &|node| {
                node.functions
                    .iter()
                    .rev()
                    .find(|function| function.ident.id() == id)
                    .cloned()
                    .map(FuncRef::from)
            })
        })
    }

    /// Constructs an instance of the type from the type-erased `arguments`.
    ///
    /// The constructors with the matching arity are tried in order, the most
    /// recently declared first. The first constructor that accepts the
    /// arguments produces the result. Returns the [Nil Cell](Cell::nil) if
    /// none of the constructors accepts the arguments.
    ///
    /// ```
    /// use astra_meta::runtime::{reflect, resolve, Cell};
    ///
    /// #[derive(Clone)]
    /// struct Span(usize, usize);
    ///
    /// reflect::<Span>("doc::construct::Span", [])
    ///     .and_then(|factory| factory.constructor(|start: usize, end: usize| Span(start, end), []))
    ///     .unwrap();
    ///
    /// let span = resolve::<Span>().construct(&[Cell::give(2usize), Cell::give(5usize)]);
    ///
    /// assert_eq!(span.try_cast::<Span>().map(|span| span.1 - span.0), Some(3));
    /// assert!(resolve::<Span>().construct(&[Cell::give(2usize)]).is_nil());
    /// ```
    pub fn construct(&self, arguments: &[Cell]) -> Cell {
        for constructor in self.constructors() {
            if constructor.arity() != arguments.len() {
                continue;
            }

            let result = constructor.invoke(arguments);

            if !result.is_nil() {
                return result;
            }
        }

        Cell::nil()
    }

    /// Calls the declared destructor of the type on the referenced instance.
    ///
    /// Returns false if the `instance` does not refer to a value of this
    /// exact type, or if the destructor refused the instance. If the type has
    /// no declared destructor, there is nothing to call, and the function
    /// returns true.
    pub fn destroy(&self, instance: Handle<'_>) -> bool {
        if instance.type_id() != Some(self.id) {
            return false;
        }

        match self.destructor() {
            None => true,
            Some(destructor) => destructor.invoke(instance),
        }
    }

    #[inline]
    fn with_node<R>(&self, reader: impl FnOnce(&TypeNode) -> R) -> Option<R> {
        Registry::read(|registry| registry.node(&self.id).map(reader))
    }

    #[inline]
    fn collect<R>(&self, reader: impl FnOnce(&TypeNode) -> Vec<R>) -> Vec<R> {
        self.with_node(reader).unwrap_or_default()
    }
}

fn search_members<R>(
    registry: &Registry,
    ty: TypeId,
    visited: &mut AHashSet<TypeId>,
    lookup: &impl Fn(&TypeNode) -> Option<R>,
) -> Option<R> {
    if !visited.insert(ty) {
        return None;
    }

    let node = registry.node(&ty)?;

    if let Some(found) = lookup(node) {
        return Some(found);
    }

    for base in node.bases.iter().rev() {
        if let Some(found) = search_members(registry, base.ty.type_id(), visited, lookup) {
            return Some(found);
        }
    }

    None
}

/// Returns the [TypeRef] of the `T` type.
///
/// The function does not require the type to be registered.
#[inline(always)]
pub fn resolve<T: ?Sized + 'static>() -> TypeRef {
    TypeRef::of::<T>()
}

/// Looks up a registered type by its declared name.
#[inline]
pub fn resolve_name(name: &str) -> Option<TypeRef> {
    let id = hash_name(name);

    Registry::read(|registry| registry.by_id(id))
}

/// Visits all registered types, the most recently registered first.
///
/// The `visitor` observes a snapshot of the registered types taken at the
/// moment of the call. It is free to query and to modify the registry.
pub fn resolve_all(mut visitor: impl FnMut(TypeRef)) {
    let snapshot = Registry::read(|registry| {
        registry
            .registered()
            .map(|node| node.ty)
            .collect::<Vec<_>>()
    });

    for ty in snapshot {
        visitor(ty);
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        factory,
        reflect,
        resolve,
        unregister,
        Cell,
        Extends,
        Handle,
        MetaResultExt,
        Property,
    };

    #[derive(Clone, Debug, PartialEq)]
    struct Body {
        mass: f64,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Lander {
        body: Body,
        fuel: f64,
    }

    impl Extends<Body> for Lander {
        fn upcast(&self) -> &Body {
            &self.body
        }

        fn upcast_mut(&mut self) -> &mut Body {
            &mut self.body
        }
    }

    fn declare() {
        static ONCE: std::sync::Once = std::sync::Once::new();

        ONCE.call_once(|| {
            let _ = reflect::<Body>("ty::Body", [Property::new("kind", "physical")])
                .and_then(|factory| {
                    factory.data_field("mass", |body| &body.mass, |body| &mut body.mass, [])
                })
                .and_then(|factory| factory.method("weight", |body: &Body| body.mass * 9.8, []))
                .expect_blame("Body declaration failed");

            let _ = reflect::<Lander>("ty::Lander", [])
                .and_then(|factory| factory.base::<Body>())
                .and_then(|factory| {
                    factory.data_field("fuel", |lander| &lander.fuel, |lander| &mut lander.fuel, [])
                })
                .and_then(|factory| {
                    factory.constructor(
                        |mass: f64, fuel: f64| Lander {
                            body: Body { mass },
                            fuel,
                        },
                        [],
                    )
                })
                .and_then(|factory| {
                    factory.constructor(
                        |fuel: f64| Lander {
                            body: Body { mass: 1.0 },
                            fuel,
                        },
                        [],
                    )
                })
                .expect_blame("Lander declaration failed");
        });
    }

    #[test]
    fn test_inherited_lookup() {
        declare();

        let body = resolve::<Body>();
        let lander = resolve::<Lander>();

        assert!(lander.is_derived_from(body));
        assert!(!body.is_derived_from(lander));
        assert!(!lander.is_derived_from(lander));
        assert_eq!(lander.bases().len(), 1);
        assert_eq!(lander.base(body).map(|base| base.ty()), Some(body));

        assert_eq!(lander.data_members().len(), 1);
        assert!(lander.functions().is_empty());

        let mass = lander.data("mass").expect("inherited data lookup failed");

        assert_eq!(mass.parent(), body);

        let mut instance = Lander {
            body: Body { mass: 2.0 },
            fuel: 3.0,
        };

        assert_eq!(mass.get(Handle::new(&instance)).try_cast::<f64>(), Some(&2.0));
        assert!(mass.set(Handle::new_mut(&mut instance), Cell::give(4.0f64)));
        assert_eq!(instance.body.mass, 4.0);

        let weight = lander.func("weight").expect("inherited function lookup failed");
        let result = weight.invoke(Handle::new(&instance), &[]);

        assert_eq!(result.try_cast::<f64>(), Some(&(4.0 * 9.8)));

        assert!(lander.data("weight").is_none());
        assert!(lander.func("mass").is_none());
        assert_eq!(lander.prop(&"kind"), None);
        assert!(body.prop(&"kind").is_some());
    }

    #[test]
    fn test_construct_by_arity() {
        declare();

        let lander = resolve::<Lander>();

        assert_eq!(lander.constructors().len(), 2);

        let one = lander.construct(&[Cell::give(5.0f64)]);

        assert_eq!(one.try_cast::<Lander>().map(|lander| lander.fuel), Some(5.0));

        let two = lander.construct(&[Cell::give(5.0f64), Cell::give(6.0f64)]);

        assert_eq!(
            two.try_cast::<Lander>().map(|lander| lander.body.mass),
            Some(5.0),
        );

        assert!(lander.construct(&[]).is_nil());
        assert!(lander.construct(&[Cell::give("fuel")]).is_nil());
    }

    #[test]
    fn test_destroy() {
        #[derive(Clone)]
        struct Capsule {
            sealed: bool,
        }

        struct Hatch;

        let _ = factory::<Capsule>()
            .destructor(|capsule: &mut Capsule| capsule.sealed = false)
            .expect_blame("Capsule declaration failed");

        let mut capsule = Capsule { sealed: true };

        assert!(!resolve::<Capsule>().destroy(Handle::new(&capsule)));
        assert!(capsule.sealed);
        assert!(!resolve::<Capsule>().destroy(Handle::new_mut(&mut 5u8)));
        assert!(resolve::<Capsule>().destroy(Handle::new_mut(&mut capsule)));
        assert!(!capsule.sealed);

        assert!(resolve::<Hatch>().destroy(Handle::new_mut(&mut Hatch)));
    }

    #[test]
    fn test_prop_key_reentrance() {
        struct Tag(u8);

        impl PartialEq for Tag {
            fn eq(&self, other: &Self) -> bool {
                struct Scratch;

                let _ = unregister::<Scratch>();

                self.0 == other.0
            }
        }

        struct Labeled;

        let _ = reflect::<Labeled>("ty::Labeled", [Property::new(Tag(1), "one")])
            .expect_blame("Labeled declaration failed");

        let ty = resolve::<Labeled>();

        assert_eq!(
            ty.prop(&Tag(1)).map(|prop| prop.value().take::<&str>()),
            Some(Some("one")),
        );
        assert!(ty.prop(&Tag(2)).is_none());
    }
}
