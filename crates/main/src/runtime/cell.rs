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

use crate::runtime::{Handle, TypeRef};

/// A type-erased value.
///
/// The Cell is the universal currency of the reflection calls: constructors,
/// functions and data accessors receive their arguments as Cells and return
/// their results as Cells.
///
/// A Cell is in one of three states:
///
///  - The [Nil](Self::nil) state means "no value". This is the failure signal
///    of the type-erased calls: a function that could not resolve its
///    arguments, or a getter that received a wrong instance, returns Nil.
///  - The [Void](Self::void) state means "present, but no payload". This is
///    what a successfully invoked function that returns `()` produces.
///  - The data state holds a value of any `Send + Sync + 'static` Rust type.
///
/// ```
/// use astra_meta::runtime::Cell;
///
/// let cell = Cell::give(10usize);
///
/// assert!(cell.has_value());
/// assert_eq!(cell.try_cast::<usize>(), Some(&10));
/// assert_eq!(cell.try_cast::<u32>(), None);
///
/// assert!(Cell::void().has_value());
/// assert!(!Cell::nil().has_value());
/// ```
///
/// The value is shared between the clones of the Cell, so cloning is cheap.
/// The [Default] value of the Cell is Nil.
#[derive(Clone, Default)]
pub struct Cell(CellInner);

#[derive(Clone, Default)]
enum CellInner {
    #[default]
    Nil,
    Void,
    Data {
        ty: TypeRef,
        data: Arc<dyn Any + Send + Sync>,
    },
}

impl Debug for Cell {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            CellInner::Nil => formatter.write_str("Nil"),
            CellInner::Void => formatter.write_str("Void"),
            CellInner::Data { ty, .. } => {
                formatter.write_fmt(format_args!("Cell({})", ty.rust_name()))
            }
        }
    }
}

impl Cell {
    /// Creates a Cell in the "no value" state.
    #[inline(always)]
    pub const fn nil() -> Self {
        Self(CellInner::Nil)
    }

    /// Creates a Cell in the "present, no payload" state.
    #[inline(always)]
    pub const fn void() -> Self {
        Self(CellInner::Void)
    }

    /// Creates a Cell that owns the provided `data`.
    ///
    /// Giving the unit `()` value produces the [Void](Self::void) Cell.
    pub fn give<T: Send + Sync + 'static>(data: T) -> Self {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Self::void();
        }

        Self(CellInner::Data {
            ty: TypeRef::of::<T>(),
            data: Arc::new(data),
        })
    }

    /// Returns true if the Cell has no value.
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(&self.0, CellInner::Nil)
    }

    /// Returns true if the Cell is in the "present, no payload" state.
    #[inline(always)]
    pub fn is_void(&self) -> bool {
        matches!(&self.0, CellInner::Void)
    }

    /// Returns true if the Cell is not [Nil](Self::nil).
    ///
    /// This is the check that distinguishes a successful call of a function
    /// returning `()` from a failed call.
    #[inline(always)]
    pub fn has_value(&self) -> bool {
        !self.is_nil()
    }

    /// Returns the TypeId of the stored value. The Void Cell stores the `()`
    /// type. The Nil Cell has no type.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.ty().map(|ty| ty.type_id())
    }

    /// Returns the type descriptor of the stored value, if any.
    #[inline]
    pub fn ty(&self) -> Option<TypeRef> {
        match &self.0 {
            CellInner::Nil => None,
            CellInner::Void => Some(TypeRef::of::<()>()),
            CellInner::Data { ty, .. } => Some(*ty),
        }
    }

    /// Returns the Rust name of the stored value's type, or `"nil"`.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self.ty() {
            Some(ty) => ty.rust_name(),
            None => "nil",
        }
    }

    /// Returns true if the Cell stores a value of exactly the `T` type.
    #[inline(always)]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Returns a reference to the stored value if its type is exactly `T`.
    ///
    /// This function never attempts any conversion. See
    /// [convert](Self::convert) for the conversion rules.
    pub fn try_cast<T: 'static>(&self) -> Option<&T> {
        match &self.0 {
            CellInner::Nil => None,
            CellInner::Void => (&() as &dyn Any).downcast_ref::<T>(),
            CellInner::Data { data, .. } => data.downcast_ref::<T>(),
        }
    }

    /// Returns a mutable reference to the stored value if its type is exactly
    /// `T` and the value is not shared with other clones of this Cell.
    pub fn try_cast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match &mut self.0 {
            CellInner::Data { data, .. } => Arc::get_mut(data)?.downcast_mut::<T>(),
            _ => None,
        }
    }

    /// Extracts the stored value if its type is exactly `T`.
    ///
    /// If the value is shared with other clones of this Cell, the function
    /// returns a clone of the value.
    pub fn take<T: Clone + Send + Sync + 'static>(self) -> Option<T> {
        match self.0 {
            CellInner::Nil => None,

            CellInner::Void => (&() as &dyn Any).downcast_ref::<T>().cloned(),

            CellInner::Data { data, .. } => {
                let data = data.downcast::<T>().ok()?;

                Some(Arc::try_unwrap(data).unwrap_or_else(|data| T::clone(&data)))
            }
        }
    }

    /// Returns a shared [instance reference](Handle) to the stored value.
    ///
    /// The Nil Cell produces the [Nil Handle](Handle::nil).
    #[inline]
    pub fn handle(&self) -> Handle<'_> {
        match &self.0 {
            CellInner::Nil => Handle::nil(),
            CellInner::Void => Handle::new(&()),
            CellInner::Data { ty, data } => Handle::from_ref(*ty, &**data),
        }
    }

    /// Returns an exclusive [instance reference](Handle) to the stored value.
    ///
    /// If the value is shared with other clones of this Cell, the returned
    /// Handle is shared as well, and the mutating members will refuse it.
    pub fn handle_mut(&mut self) -> Handle<'_> {
        match &mut self.0 {
            CellInner::Nil => Handle::nil(),

            CellInner::Void => Handle::new(&()),

            CellInner::Data { ty, data } => {
                let ty = *ty;
                let unique = Arc::get_mut(data).is_some();

                match unique {
                    true => match Arc::get_mut(data) {
                        Some(data) => Handle::from_mut(ty, data),
                        None => Handle::nil(),
                    },

                    false => Handle::from_ref(ty, &**data),
                }
            }
        }
    }

    #[inline(always)]
    pub(crate) fn as_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        match &self.0 {
            CellInner::Data { data, .. } => Some(&**data),
            _ => None,
        }
    }
}
