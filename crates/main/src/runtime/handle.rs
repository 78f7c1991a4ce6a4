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
    fmt::{Debug, Formatter},
    sync::Arc,
};

use crate::runtime::{
    coercion::{upcast_any, upcast_path},
    members::BaseNode,
    TypeRef,
};

/// A non-owning type-erased reference to an instance.
///
/// The Handle passes the "this" object into the type-erased member calls:
/// methods, data accessors and destructors. It is tagged with the dynamic
/// type of the referenced instance.
///
/// A Handle is either [shared](Self::new), in which case it permits only
/// reading access, or [exclusive](Self::new_mut), in which case the mutating
/// members (mutable methods, data setters, destructors) accept it too.
///
/// ```
/// use astra_meta::runtime::Handle;
///
/// let mut value = 10u16;
///
/// let handle = Handle::new(&value);
/// assert_eq!(handle.data::<u16>(), Some(&10));
/// assert_eq!(handle.data::<u32>(), None);
///
/// let mut handle = Handle::new_mut(&mut value);
/// *handle.data_mut::<u16>().unwrap() += 1;
///
/// assert_eq!(value, 11);
/// ```
#[derive(Default)]
pub struct Handle<'a>(HandleInner<'a>);

#[derive(Default)]
enum HandleInner<'a> {
    #[default]
    Nil,
    Ref {
        ty: TypeRef,
        data: &'a dyn Any,
    },
    Mut {
        ty: TypeRef,
        data: &'a mut dyn Any,
    },
}

impl<'a> Debug for Handle<'a> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            HandleInner::Nil => formatter.write_str("Handle(nil)"),
            HandleInner::Ref { ty, .. } => {
                formatter.write_fmt(format_args!("Handle(&{})", ty.rust_name()))
            }
            HandleInner::Mut { ty, .. } => {
                formatter.write_fmt(format_args!("Handle(&mut {})", ty.rust_name()))
            }
        }
    }
}

impl<'a> Handle<'a> {
    /// Creates a Handle that does not reference any instance.
    #[inline(always)]
    pub const fn nil() -> Self {
        Self(HandleInner::Nil)
    }

    /// Creates a shared Handle.
    #[inline(always)]
    pub fn new<T: Any>(data: &'a T) -> Self {
        Self::from_ref(TypeRef::of::<T>(), data)
    }

    /// Creates an exclusive Handle.
    #[inline(always)]
    pub fn new_mut<T: Any>(data: &'a mut T) -> Self {
        Self::from_mut(TypeRef::of::<T>(), data)
    }

    #[inline(always)]
    pub(crate) fn from_ref(ty: TypeRef, data: &'a dyn Any) -> Self {
        Self(HandleInner::Ref { ty, data })
    }

    #[inline(always)]
    pub(crate) fn from_mut(ty: TypeRef, data: &'a mut dyn Any) -> Self {
        Self(HandleInner::Mut { ty, data })
    }

    /// Returns true if the Handle does not reference any instance.
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(&self.0, HandleInner::Nil)
    }

    /// Returns true if the Handle permits mutable access to the instance.
    #[inline(always)]
    pub fn is_mut(&self) -> bool {
        matches!(&self.0, HandleInner::Mut { .. })
    }

    /// Returns the dynamic type of the referenced instance.
    #[inline]
    pub fn ty(&self) -> Option<TypeRef> {
        match &self.0 {
            HandleInner::Nil => None,
            HandleInner::Ref { ty, .. } => Some(*ty),
            HandleInner::Mut { ty, .. } => Some(*ty),
        }
    }

    /// Returns the TypeId of the referenced instance.
    #[inline(always)]
    pub fn type_id(&self) -> Option<TypeId> {
        self.ty().map(|ty| ty.type_id())
    }

    /// Returns a reference to the instance if its dynamic type is exactly `T`.
    #[inline]
    pub fn data<T: Any>(&self) -> Option<&T> {
        match &self.0 {
            HandleInner::Nil => None,
            HandleInner::Ref { data, .. } => data.downcast_ref::<T>(),
            HandleInner::Mut { data, .. } => data.downcast_ref::<T>(),
        }
    }

    /// Returns a mutable reference to the instance if its dynamic type is
    /// exactly `T` and the Handle is exclusive.
    #[inline]
    pub fn data_mut<T: Any>(&mut self) -> Option<&mut T> {
        match &mut self.0 {
            HandleInner::Mut { data, .. } => data.downcast_mut::<T>(),
            _ => None,
        }
    }

    /// Returns a reference to the `B` sub-object of the instance following
    /// the declared [base](crate::runtime::Factory::base) relations.
    ///
    /// If the instance type is exactly `B`, returns the instance itself.
    pub fn upcast<B: Any>(&self) -> Option<&B> {
        let from = self.type_id()?;
        let data = self.as_any()?;

        upcast_any(data, from, TypeId::of::<B>())?.downcast_ref::<B>()
    }

    /// Creates a shorter-living Handle to the same instance.
    #[inline]
    pub fn reborrow(&mut self) -> Handle<'_> {
        match &mut self.0 {
            HandleInner::Nil => Handle::nil(),
            HandleInner::Ref { ty, data } => Handle::from_ref(*ty, *data),
            HandleInner::Mut { ty, data } => Handle::from_mut(*ty, &mut **data),
        }
    }

    // Turns the Handle into the Handle of the `target` sub-object if the
    // instance type is derived from `target`. Otherwise returns the Handle
    // as is.
    pub(crate) fn retarget(self, target: TypeId) -> Self {
        let Some(from) = self.type_id() else {
            return self;
        };

        if from == target {
            return self;
        }

        let Some(path) = upcast_path(from, target) else {
            return self;
        };

        self.follow(&path)
    }

    pub(crate) fn follow(self, path: &[Arc<BaseNode>]) -> Self {
        let Some(last) = path.last() else {
            return self;
        };

        let ty = last.ty;

        match self.0 {
            HandleInner::Nil => Self::nil(),

            HandleInner::Ref { mut data, .. } => {
                for base in path {
                    data = match (base.cast)(data) {
                        Some(data) => data,
                        None => return Self::nil(),
                    };
                }

                Self::from_ref(ty, data)
            }

            HandleInner::Mut { mut data, .. } => {
                for base in path {
                    data = match (base.cast_mut)(data) {
                        Some(data) => data,
                        None => return Self::nil(),
                    };
                }

                Self::from_mut(ty, data)
            }
        }
    }

    #[inline(always)]
    pub(crate) fn as_any(&self) -> Option<&dyn Any> {
        match &self.0 {
            HandleInner::Nil => None,
            HandleInner::Ref { data, .. } => Some(*data),
            HandleInner::Mut { data, .. } => Some(&**data),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{resolve, Handle};

    #[test]
    fn test_handle_access() {
        let mut value = String::from("foo");

        {
            let handle = Handle::new(&value);

            assert!(!handle.is_mut());
            assert_eq!(handle.ty(), Some(resolve::<String>()));
            assert_eq!(handle.data::<String>().map(String::as_str), Some("foo"));
        }

        {
            let mut handle = Handle::new(&value);

            assert!(handle.data_mut::<String>().is_none());
        }

        {
            let mut handle = Handle::new_mut(&mut value);
            let mut reborrowed = handle.reborrow();

            assert!(reborrowed.is_mut());

            if let Some(string) = reborrowed.data_mut::<String>() {
                string.push_str("bar");
            }
        }

        assert_eq!(value, "foobar");

        let nil = Handle::nil();

        assert!(nil.is_nil());
        assert_eq!(nil.type_id(), None);
        assert_eq!(format!("{nil:?}"), "Handle(nil)");
    }
}
