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
    any::{Any, TypeId},
    sync::Arc,
};

use ahash::AHashSet;

use crate::runtime::{
    members::{BaseNode, ConvNode},
    registry::Registry,
    Cell,
};

/// A static "is-a" relation between a derived Rust type and its base type.
///
/// Rust has no inheritance, but the composition of a base object into
/// a derived object is a common pattern. By implementing this trait, you
/// state that `Self` contains a `Base` sub-object reachable through the
/// [upcast](Self::upcast) functions.
///
/// The [Factory::base](crate::runtime::Factory::base) declaration requires
/// this trait, so only the genuine base relations can be registered.
///
/// ```
/// use astra_meta::runtime::Extends;
///
/// struct Shape {
///     area: f32,
/// }
///
/// struct Circle {
///     shape: Shape,
///     radius: f32,
/// }
///
/// impl Extends<Shape> for Circle {
///     fn upcast(&self) -> &Shape {
///         &self.shape
///     }
///
///     fn upcast_mut(&mut self) -> &mut Shape {
///         &mut self.shape
///     }
/// }
/// ```
pub trait Extends<Base> {
    /// Returns a reference to the base sub-object.
    fn upcast(&self) -> &Base;

    /// Returns a mutable reference to the base sub-object.
    fn upcast_mut(&mut self) -> &mut Base;
}

pub(crate) type UpcastFn = fn(&dyn Any) -> Option<&dyn Any>;

pub(crate) type UpcastMutFn = fn(&mut dyn Any) -> Option<&mut dyn Any>;

pub(crate) fn upcast_ref<D: Extends<B> + Any, B: Any>(data: &dyn Any) -> Option<&dyn Any> {
    data.downcast_ref::<D>()
        .map(|derived| <D as Extends<B>>::upcast(derived) as &dyn Any)
}

pub(crate) fn upcast_mut<D: Extends<B> + Any, B: Any>(data: &mut dyn Any) -> Option<&mut dyn Any> {
    data.downcast_mut::<D>()
        .map(|derived| <D as Extends<B>>::upcast_mut(derived) as &mut dyn Any)
}

impl Cell {
    /// Converts the stored value to the `T` type in place.
    ///
    /// The conversion rules are tried in order:
    ///
    ///  1. If the value is exactly of type `T`, the Cell remains unchanged.
    ///  2. If the value's type is derived from `T` through the declared
    ///     [bases](crate::runtime::Factory::base), the Cell is replaced with
    ///     a clone of the `T` sub-object.
    ///  3. If the value's type, or any of its bases, declares a
    ///     [conversion](crate::runtime::Factory::conversion) to `T`, the Cell
    ///     is replaced with the conversion result.
    ///
    /// Returns true if the Cell stores a value of type `T` after the call.
    /// On failure, the Cell remains unchanged.
    ///
    /// ```
    /// use astra_meta::runtime::{reflect, Cell};
    ///
    /// #[derive(Clone)]
    /// struct Meters(f64);
    ///
    /// #[derive(Clone)]
    /// struct Feet(f64);
    ///
    /// reflect::<Meters>("doc::convert::Meters", [])
    ///     .unwrap()
    ///     .conversion_with(|meters: &Meters| Feet(meters.0 * 3.28084))
    ///     .unwrap();
    ///
    /// let mut cell = Cell::give(Meters(2.0));
    ///
    /// assert!(cell.convert::<Feet>());
    /// assert!(cell.try_cast::<Feet>().is_some());
    /// assert!(!cell.convert::<String>());
    /// ```
    pub fn convert<T: Clone + Send + Sync + 'static>(&mut self) -> bool {
        let Some(from) = Cell::type_id(self) else {
            return false;
        };

        let to = TypeId::of::<T>();

        if from == to {
            return true;
        }

        if let Some(base) = self.upcast_ref::<T>() {
            let base = base.clone();

            *self = Cell::give(base);

            return true;
        }

        let Some((path, conversion)) = conversion_path(from, to) else {
            return false;
        };

        let converted = {
            let Some(data) = self.as_any() else {
                return false;
            };

            let Some(data) = follow_path(data, &path) else {
                return false;
            };

            (conversion.convert)(data)
        };

        if !converted.is::<T>() {
            return false;
        }

        *self = converted;

        true
    }

    /// Returns a reference to the `T` sub-object of the stored value
    /// following the declared [base](crate::runtime::Factory::base)
    /// relations.
    ///
    /// If the value is exactly of type `T`, returns the value itself.
    pub fn upcast_ref<T: Any>(&self) -> Option<&T> {
        let Some(data) = self.as_any() else {
            return self.try_cast::<T>();
        };

        let from = Cell::type_id(self)?;

        upcast_any(data, from, TypeId::of::<T>())?.downcast_ref::<T>()
    }
}

pub(crate) fn upcast_any(data: &dyn Any, from: TypeId, to: TypeId) -> Option<&dyn Any> {
    let path = upcast_path(from, to)?;

    follow_path(data, &path)
}

#[inline]
fn follow_path<'a>(mut data: &'a dyn Any, path: &[Arc<BaseNode>]) -> Option<&'a dyn Any> {
    for base in path {
        data = (base.cast)(data)?;
    }

    Some(data)
}

// Returns the chain of the declared bases leading from the `from` type to
// the `to` type. The chain is empty if the types are equal.
pub(crate) fn upcast_path(from: TypeId, to: TypeId) -> Option<Vec<Arc<BaseNode>>> {
    if from == to {
        return Some(Vec::new());
    }

    Registry::read(|registry| {
        let mut path = Vec::new();
        let mut visited = AHashSet::new();

        match search_upcast(registry, from, to, &mut path, &mut visited) {
            true => Some(path),
            false => None,
        }
    })
}

// Returns the declared conversion to the `to` type found on the `from` type
// or on any of its bases, together with the chain of bases leading to the
// type that declares the conversion.
pub(crate) fn conversion_path(
    from: TypeId,
    to: TypeId,
) -> Option<(Vec<Arc<BaseNode>>, Arc<ConvNode>)> {
    Registry::read(|registry| {
        let mut path = Vec::new();
        let mut visited = AHashSet::new();

        let conversion = search_conversion(registry, from, to, &mut path, &mut visited)?;

        Some((path, conversion))
    })
}

fn search_upcast(
    registry: &Registry,
    from: TypeId,
    to: TypeId,
    path: &mut Vec<Arc<BaseNode>>,
    visited: &mut AHashSet<TypeId>,
) -> bool {
    if !visited.insert(from) {
        return false;
    }

    let Some(node) = registry.node(&from) else {
        return false;
    };

    for base in node.bases.iter().rev() {
        path.push(base.clone());

        let next = base.ty.type_id();

        if next == to || search_upcast(registry, next, to, path, visited) {
            return true;
        }

        let _ = path.pop();
    }

    false
}

fn search_conversion(
    registry: &Registry,
    from: TypeId,
    to: TypeId,
    path: &mut Vec<Arc<BaseNode>>,
    visited: &mut AHashSet<TypeId>,
) -> Option<Arc<ConvNode>> {
    if !visited.insert(from) {
        return None;
    }

    let node = registry.node(&from)?;

    if let Some(conversion) = node
        .conversions
        .iter()
        .rev()
        .find(|conversion| conversion.ty.type_id() == to)
    {
        return Some(conversion.clone());
    }

    for base in node.bases.iter().rev() {
        path.push(base.clone());

        if let Some(conversion) =
            search_conversion(registry, base.ty.type_id(), to, path, visited)
        {
            return Some(conversion);
        }

        let _ = path.pop();
    }

    None
}

#[cfg(test)]
mod tests {
    use std::ptr::addr_of;

    use crate::runtime::{factory, reflect, Cell, Extends, Handle, MetaResultExt};

    #[derive(Clone, Debug, PartialEq)]
    struct Entity {
        id: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Actor {
        entity: Entity,
        speed: f32,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Hero {
        actor: Actor,
        name: &'static str,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct EntityId(u32);

    impl Extends<Entity> for Actor {
        fn upcast(&self) -> &Entity {
            &self.entity
        }

        fn upcast_mut(&mut self) -> &mut Entity {
            &mut self.entity
        }
    }

    impl Extends<Actor> for Hero {
        fn upcast(&self) -> &Actor {
            &self.actor
        }

        fn upcast_mut(&mut self) -> &mut Actor {
            &mut self.actor
        }
    }

    fn declare() {
        static ONCE: std::sync::Once = std::sync::Once::new();

        ONCE.call_once(|| {
            let _ = reflect::<Entity>("coercion::Entity", [])
                .and_then(|factory| factory.conversion_with(|entity: &Entity| EntityId(entity.id)))
                .expect_blame("Entity declaration failed");

            let _ = reflect::<Actor>("coercion::Actor", [])
                .and_then(|factory| factory.base::<Entity>())
                .expect_blame("Actor declaration failed");

            let _ = factory::<Hero>()
                .base::<Actor>()
                .expect_blame("Hero declaration failed");
        });
    }

    fn hero() -> Hero {
        Hero {
            actor: Actor {
                entity: Entity { id: 7 },
                speed: 1.5,
            },
            name: "Ayla",
        }
    }

    #[test]
    fn test_upcast_sub_object_address() {
        declare();

        let hero = hero();
        let cell = Cell::give(hero);

        let stored = cell.try_cast::<Hero>().expect("exact extraction failed");
        let actor = cell.upcast_ref::<Actor>().expect("Actor upcast failed");
        let entity = cell.upcast_ref::<Entity>().expect("Entity upcast failed");

        assert_eq!(actor as *const Actor, addr_of!(stored.actor));
        assert_eq!(entity as *const Entity, addr_of!(stored.actor.entity));
        assert!(cell.upcast_ref::<EntityId>().is_none());

        let handle = Handle::new(stored);

        assert_eq!(
            handle.upcast::<Entity>().map(|entity| entity as *const Entity),
            Some(addr_of!(stored.actor.entity)),
        );
    }

    #[test]
    fn test_convert_rules() {
        declare();

        let mut identity = Cell::give(hero());

        assert!(identity.convert::<Hero>());
        assert_eq!(identity.try_cast::<Hero>().map(|hero| hero.name), Some("Ayla"));

        let mut upcast = Cell::give(hero());

        assert!(upcast.convert::<Actor>());
        assert_eq!(upcast.try_cast::<Actor>().map(|actor| actor.speed), Some(1.5));

        let mut inherited = Cell::give(hero());

        assert!(inherited.convert::<EntityId>());
        assert_eq!(inherited.try_cast::<EntityId>(), Some(&EntityId(7)));

        let mut unrelated = Cell::give(hero());

        assert!(!unrelated.convert::<String>());
        assert!(unrelated.is::<Hero>());

        assert!(!Cell::nil().convert::<Hero>());
    }
}
