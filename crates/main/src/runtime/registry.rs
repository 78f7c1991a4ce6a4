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
    any::TypeId,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    sync::{Arc, RwLock},
};

use ahash::AHashMap;
use compact_str::CompactString;
use lady_deirdre::sync::Lazy;
use log::debug;

use crate::runtime::{
    members::{BaseNode, ConvNode, CtorNode, DataNode, DtorNode, FuncNode, PropNode},
    Ident,
    MetaError,
    MetaResult,
    Origin,
    TypeRef,
};

pub(crate) static META_LOG: &'static str = "astra-meta::$registry";

/// A kind of a reflected entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum MemberKind {
    /// The identity of a type: its name and properties.
    Type,

    /// A base type relation.
    Base,

    /// A user-defined conversion into another type.
    Conversion,

    /// A constructor.
    Constructor,

    /// A destructor.
    Destructor,

    /// A data member.
    Data,

    /// A free, static, or member function.
    Function,
}

impl Display for MemberKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Type => "type",
            Self::Base => "base",
            Self::Conversion => "conversion",
            Self::Constructor => "constructor",
            Self::Destructor => "destructor",
            Self::Data => "data member",
            Self::Function => "function",
        })
    }
}

// A fingerprint of the member's signature within its owner and kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Signature {
    Type(TypeId),
    Name(u64),
    Unit,
}

impl Signature {
    #[inline(always)]
    pub(crate) fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeId::of::<T>())
    }
}

// A key of the identity slot that a member node occupies while its owner is
// registered.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SlotKey {
    pub(crate) owner: TypeRef,
    pub(crate) kind: MemberKind,
    pub(crate) signature: Signature,
}

impl PartialEq for SlotKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.owner.eq(&other.owner)
            && self.kind.eq(&other.kind)
            && self.signature.eq(&other.signature)
    }
}

impl Eq for SlotKey {}

impl Hash for SlotKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.kind.hash(state);
        self.signature.hash(state);
    }
}

// All metadata of a Rust type. The member lists are ordered by the
// declaration time, the most recent declaration is the last one.
pub(crate) struct TypeNode {
    pub(crate) ty: TypeRef,
    pub(crate) ident: Option<Ident>,
    pub(crate) origin: Origin,
    pub(crate) props: Vec<Arc<PropNode>>,
    pub(crate) bases: Vec<Arc<BaseNode>>,
    pub(crate) conversions: Vec<Arc<ConvNode>>,
    pub(crate) constructors: Vec<Arc<CtorNode>>,
    pub(crate) destructor: Option<Arc<DtorNode>>,
    pub(crate) data: Vec<Arc<DataNode>>,
    pub(crate) functions: Vec<Arc<FuncNode>>,
}

impl TypeNode {
    fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            ident: None,
            origin: Origin::nil(),
            props: Vec::new(),
            bases: Vec::new(),
            conversions: Vec::new(),
            constructors: Vec::new(),
            destructor: None,
            data: Vec::new(),
            functions: Vec::new(),
        }
    }

    fn slots(&self) -> impl Iterator<Item = &SlotKey> + '_ {
        self.bases
            .iter()
            .map(|node| &node.slot)
            .chain(self.conversions.iter().map(|node| &node.slot))
            .chain(self.constructors.iter().map(|node| &node.slot))
            .chain(self.destructor.iter().map(|node| &node.slot))
            .chain(self.data.iter().map(|node| &node.slot))
            .chain(self.functions.iter().map(|node| &node.slot))
    }
}

// The process-wide storage of the reflection metadata.
#[derive(Default)]
pub(crate) struct Registry {
    types: AHashMap<TypeId, TypeNode>,
    order: Vec<TypeId>,
    ids: AHashMap<u64, TypeId>,
    slots: AHashMap<SlotKey, Origin>,
}

impl Registry {
    #[inline(always)]
    fn get() -> &'static RwLock<Registry> {
        static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

        &REGISTRY
    }

    #[inline]
    pub(crate) fn read<R>(reader: impl FnOnce(&Self) -> R) -> R {
        let registry = Self::get()
            .read()
            .unwrap_or_else(|poison| poison.into_inner());

        reader(&registry)
    }

    #[inline]
    pub(crate) fn write<R>(writer: impl FnOnce(&mut Self) -> R) -> R {
        let mut registry = Self::get()
            .write()
            .unwrap_or_else(|poison| poison.into_inner());

        writer(&mut registry)
    }

    #[inline(always)]
    pub(crate) fn node(&self, ty: &TypeId) -> Option<&TypeNode> {
        self.types.get(ty)
    }

    // Returns the type node, creating an anonymous one on first access.
    #[inline]
    pub(crate) fn node_mut(&mut self, ty: TypeRef) -> &mut TypeNode {
        self.types
            .entry(ty.type_id())
            .or_insert_with(|| TypeNode::new(ty))
    }

    #[inline(always)]
    pub(crate) fn by_id(&self, id: u64) -> Option<TypeRef> {
        let ty = self.ids.get(&id)?;

        self.types.get(ty).map(|node| node.ty)
    }

    // Types with the declared identity, the most recently declared first.
    #[inline]
    pub(crate) fn registered(&self) -> impl Iterator<Item = &TypeNode> + '_ {
        self.order.iter().rev().filter_map(|ty| self.types.get(ty))
    }

    #[inline(always)]
    pub(crate) fn is_registered(&self, ty: &TypeId) -> bool {
        self.types
            .get(ty)
            .map(|node| node.ident.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn check_slot(&self, slot: &SlotKey, origin: Origin, member: &str) -> MetaResult<()> {
        match self.slots.get(slot) {
            None => Ok(()),

            Some(previous) => Err(MetaError::Duplicate {
                origin,
                previous: *previous,
                kind: slot.kind,
                owner: slot.owner.rust_name(),
                member: CompactString::from(member),
            }),
        }
    }

    #[inline(always)]
    pub(crate) fn occupy(&mut self, slot: SlotKey, origin: Origin) {
        let _ = self.slots.insert(slot, origin);
    }

    pub(crate) fn check_identity(&self, ty: TypeRef, ident: &Ident, origin: Origin) -> MetaResult<()> {
        if let Some(node) = self.types.get(&ty.type_id()) {
            if let Some(current) = &node.ident {
                return Err(MetaError::Duplicate {
                    origin,
                    previous: node.origin,
                    kind: MemberKind::Type,
                    owner: ty.rust_name(),
                    member: current.string().clone(),
                });
            }
        }

        if let Some(other) = self.ids.get(&ident.id()) {
            if let Some(other) = self.types.get(other) {
                return Err(MetaError::IdCollision {
                    origin,
                    previous: other.origin,
                    name: ident.string().clone(),
                    other: other
                        .ident
                        .as_ref()
                        .map(|ident| ident.string().clone())
                        .unwrap_or_default(),
                    id: ident.id(),
                });
            }
        }

        Ok(())
    }

    // The caller checks the identity before the call.
    pub(crate) fn declare_identity(
        &mut self,
        ty: TypeRef,
        ident: Ident,
        props: Vec<Arc<PropNode>>,
        origin: Origin,
    ) {
        let _ = self.ids.insert(ident.id(), ty.type_id());

        self.order.push(ty.type_id());

        let node = self.node_mut(ty);

        node.ident = Some(ident);
        node.props = props;
        node.origin = origin;
    }

    // Removes the type node with all of its members and releases their
    // identity slots. The base relations of other types that point to this
    // type remain intact.
    //
    // Returns true if the type had the declared identity. The members of an
    // anonymous type are removed too, but the result is false.
    pub(crate) fn unregister(&mut self, ty: &TypeId) -> bool {
        let Some(node) = self.types.remove(ty) else {
            return false;
        };

        self.order.retain(|registered| registered != ty);

        for slot in node.slots() {
            let _ = self.slots.remove(slot);
        }

        match &node.ident {
            Some(ident) => {
                let _ = self.ids.remove(&ident.id());
                true
            }

            None => false,
        }
    }

    fn clear(&mut self) {
        self.types.clear();
        self.order.clear();
        self.ids.clear();
        self.slots.clear();
    }
}

/// Removes all reflection metadata from the process-wide registry.
///
/// After the reset, every type is unregistered, and all names and member
/// signatures can be declared again. The previously obtained descriptors
/// remain valid objects, but they no longer appear in any lookup.
///
/// This function is intended for the process teardown and for the isolation
/// of tests that run in a dedicated process.
///
/// ```
/// use astra_meta::runtime::{reflect, reset, resolve, resolve_all};
///
/// struct Ephemeral;
///
/// reflect::<Ephemeral>("doc::reset::Ephemeral", []).unwrap();
/// assert!(resolve::<Ephemeral>().is_registered());
///
/// reset();
///
/// let mut count = 0;
/// resolve_all(|_| count += 1);
///
/// assert_eq!(count, 0);
/// assert!(!resolve::<Ephemeral>().is_registered());
/// assert!(reflect::<Ephemeral>("doc::reset::Ephemeral", []).is_ok());
/// ```
pub fn reset() {
    Registry::write(|registry| registry.clear());

    debug!(target: META_LOG, "Reflection registry reset.");
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        factory,
        reflect,
        resolve,
        resolve_all,
        unregister,
        Cell,
        MemberKind,
        MetaError,
        MetaResultExt,
    };

    #[derive(Clone)]
    struct Gauge {
        value: f32,
    }

    #[test]
    fn test_unregister_and_redeclare() {
        fn declare() {
            let _ = reflect::<Gauge>("registry::Gauge", [])
                .and_then(|factory| factory.constructor(|value: f32| Gauge { value }, []))
                .and_then(|factory| {
                    factory.data_field("value", |gauge| &gauge.value, |gauge| &mut gauge.value, [])
                })
                .and_then(|factory| factory.method("read", |gauge: &Gauge| gauge.value, []))
                .and_then(|factory| factory.destructor(|gauge: &mut Gauge| gauge.value = 0.0))
                .expect_blame("Gauge declaration failed");
        }

        declare();

        let ty = resolve::<Gauge>();

        assert!(ty.is_registered());
        assert_eq!(ty.data_members().len(), 1);
        assert_eq!(ty.functions().len(), 1);

        let mut found = false;
        resolve_all(|registered| found |= registered == ty);
        assert!(found);

        let stale = ty.func("read").expect("missing function");

        assert!(unregister::<Gauge>());
        assert!(!unregister::<Gauge>());
        assert!(!ty.is_registered());
        assert!(ty.func("read").is_none());
        assert!(ty.constructors().is_empty());
        assert!(ty.destructor().is_none());

        let mut found = false;
        resolve_all(|registered| found |= registered == ty);
        assert!(!found);

        let gauge = Gauge { value: 3.0 };
        let result = stale.invoke(crate::runtime::Handle::new(&gauge), &[]);

        assert_eq!(result.try_cast::<f32>(), Some(&3.0));

        declare();

        assert!(ty.is_registered());
        assert_eq!(ty.name().as_deref(), Some("registry::Gauge"));

        let constructed = ty.construct(&[Cell::give(5.0f32)]);

        assert_eq!(constructed.try_cast::<Gauge>().map(|gauge| gauge.value), Some(5.0));
    }

    #[test]
    fn test_duplicate_declarations() {
        struct Twice;

        let declared = reflect::<Twice>("registry::Twice", []).expect_blame("first declaration");

        match declared.ty("registry::Twice", []) {
            Err(MetaError::Duplicate { kind, .. }) => assert_eq!(kind, MemberKind::Type),
            _ => panic!("duplicate type identity accepted"),
        }

        let declared = factory::<Twice>()
            .function("make", || 1u8, [])
            .expect_blame("function declaration");

        match declared.function("make", || 2u8, []) {
            Err(MetaError::Duplicate { kind, member, .. }) => {
                assert_eq!(kind, MemberKind::Function);
                assert_eq!(member.as_str(), "make");
            }

            _ => panic!("duplicate function accepted"),
        }

        let declared = factory::<Twice>()
            .destructor(|_: &mut Twice| ())
            .expect_blame("destructor declaration");

        assert!(declared.destructor(|_: &mut Twice| ()).is_err());
        assert_eq!(resolve::<Twice>().functions().len(), 1);
    }

    #[test]
    fn test_id_collision() {
        struct First;
        struct Second;

        let _ = reflect::<First>("registry::Shared", []).expect_blame("first declaration");

        match reflect::<Second>("registry::Shared", []) {
            Err(MetaError::IdCollision { name, other, .. }) => {
                assert_eq!(name, other);
            }

            _ => panic!("colliding id accepted"),
        }

        assert!(!resolve::<Second>().is_registered());
    }

    #[test]
    fn test_registration_order() {
        struct Early;
        struct Later;
        struct Hidden;

        let _ = factory::<Early>()
            .function("tick", || (), [])
            .expect_blame("function declaration");

        assert!(!resolve::<Early>().is_registered());
        assert_eq!(resolve::<Early>().functions().len(), 1);

        let mut found = false;
        resolve_all(|registered| found |= registered == resolve::<Early>());

        assert!(!found);

        let _ = reflect::<Later>("registry::Later", []).expect_blame("Later declaration");
        let _ = reflect::<Early>("registry::Early", []).expect_blame("Early declaration");

        let mut order = Vec::new();

        resolve_all(|registered| {
            if registered == resolve::<Early>() || registered == resolve::<Later>() {
                order.push(registered);
            }
        });

        assert_eq!(order, [resolve::<Early>(), resolve::<Later>()]);
        assert_eq!(resolve::<Early>().functions().len(), 1);

        let _ = factory::<Hidden>()
            .data_value("seed", 1u8, [])
            .expect_blame("data declaration");

        assert!(!unregister::<Hidden>());
        assert!(resolve::<Hidden>().data("seed").is_none());
        assert!(factory::<Hidden>().data_value("seed", 2u8, []).is_ok());

        assert!(unregister::<Early>());
        assert!(resolve::<Early>().functions().is_empty());
    }
}
