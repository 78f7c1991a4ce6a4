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

use std::{any::Any, marker::PhantomData, sync::RwLock};

use crate::runtime::{invoke::resolve_argument, Cell, Handle};

// The uniform runtime interface of the data members. The `index` is present
// only for the array element access.
pub(crate) trait Accessor: Send + Sync + 'static {
    fn get(&self, instance: Handle<'_>, index: Option<&Cell>) -> Cell;

    fn set(&self, instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool;
}

#[inline(always)]
fn resolve_index(index: Option<&Cell>) -> Option<usize> {
    resolve_argument::<usize>(index?)
}

// A value bound at the declaration time.
pub(crate) struct BoundValue<V> {
    pub(crate) value: V,
}

impl<V> Accessor for BoundValue<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, _instance: Handle<'_>, _index: Option<&Cell>) -> Cell {
        Cell::give(self.value.clone())
    }

    #[inline(always)]
    fn set(&self, _instance: Handle<'_>, _index: Option<&Cell>, _value: &Cell) -> bool {
        false
    }
}

// A struct field accessed through a pair of projection functions. Without
// the mutable projection the field is read-only.
pub(crate) struct Field<T, V, G, M> {
    pub(crate) get: G,
    pub(crate) get_mut: Option<M>,
    pub(crate) marker: PhantomData<fn(&T) -> V>,
}

impl<T, V, G, M> Accessor for Field<T, V, G, M>
where
    T: Any,
    V: Clone + Send + Sync + 'static,
    G: Fn(&T) -> &V + Send + Sync + 'static,
    M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        if index.is_some() {
            return Cell::nil();
        }

        match instance.data::<T>() {
            Some(this) => Cell::give((self.get)(this).clone()),
            None => Cell::nil(),
        }
    }

    #[inline]
    fn set(&self, mut instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        let Some(get_mut) = &self.get_mut else {
            return false;
        };

        if index.is_some() {
            return false;
        }

        let value = resolve_argument::<V>(value);
        let this = instance.data_mut::<T>();

        match (this, value) {
            (Some(this), Some(value)) => {
                *get_mut(this) = value;
                true
            }

            _ => false,
        }
    }
}

// A fixed-size array struct field. The elements are accessed by index.
pub(crate) struct ArrayField<T, V, const N: usize, G, M> {
    pub(crate) get: G,
    pub(crate) get_mut: Option<M>,
    pub(crate) marker: PhantomData<fn(&T) -> [V; N]>,
}

impl<T, V, const N: usize, G, M> Accessor for ArrayField<T, V, N, G, M>
where
    T: Any,
    V: Clone + Send + Sync + 'static,
    G: Fn(&T) -> &[V; N] + Send + Sync + 'static,
    M: Fn(&mut T) -> &mut [V; N] + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        let index = resolve_index(index);
        let this = instance.data::<T>();

        let (Some(this), Some(index)) = (this, index) else {
            return Cell::nil();
        };

        match (self.get)(this).get(index) {
            Some(element) => Cell::give(element.clone()),
            None => Cell::nil(),
        }
    }

    #[inline]
    fn set(&self, mut instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        let Some(get_mut) = &self.get_mut else {
            return false;
        };

        let index = resolve_index(index);
        let value = resolve_argument::<V>(value);
        let this = instance.data_mut::<T>();

        let (Some(this), Some(index), Some(value)) = (this, index, value) else {
            return false;
        };

        match get_mut(this).get_mut(index) {
            Some(element) => {
                *element = value;
                true
            }

            None => false,
        }
    }
}

// A global variable. Does not require an instance.
pub(crate) struct Global<V: 'static> {
    pub(crate) variable: &'static RwLock<V>,
}

impl<V> Accessor for Global<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, _instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        if index.is_some() {
            return Cell::nil();
        }

        let variable = self
            .variable
            .read()
            .unwrap_or_else(|poison| poison.into_inner());

        Cell::give(variable.clone())
    }

    #[inline]
    fn set(&self, _instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        if index.is_some() {
            return false;
        }

        let Some(value) = resolve_argument::<V>(value) else {
            return false;
        };

        let mut variable = self
            .variable
            .write()
            .unwrap_or_else(|poison| poison.into_inner());

        *variable = value;

        true
    }
}

// An immutable global value. Does not require an instance.
pub(crate) struct GlobalConst<V: 'static> {
    pub(crate) variable: &'static V,
}

impl<V> Accessor for GlobalConst<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, _instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        if index.is_some() {
            return Cell::nil();
        }

        Cell::give(self.variable.clone())
    }

    #[inline(always)]
    fn set(&self, _instance: Handle<'_>, _index: Option<&Cell>, _value: &Cell) -> bool {
        false
    }
}

// A global fixed-size array. The elements are accessed by index.
pub(crate) struct GlobalArray<V: 'static, const N: usize> {
    pub(crate) variable: &'static RwLock<[V; N]>,
}

impl<V, const N: usize> Accessor for GlobalArray<V, N>
where
    V: Clone + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, _instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        let Some(index) = resolve_index(index) else {
            return Cell::nil();
        };

        let variable = self
            .variable
            .read()
            .unwrap_or_else(|poison| poison.into_inner());

        match variable.get(index) {
            Some(element) => Cell::give(element.clone()),
            None => Cell::nil(),
        }
    }

    #[inline]
    fn set(&self, _instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        let index = resolve_index(index);
        let value = resolve_argument::<V>(value);

        let (Some(index), Some(value)) = (index, value) else {
            return false;
        };

        let mut variable = self
            .variable
            .write()
            .unwrap_or_else(|poison| poison.into_inner());

        match variable.get_mut(index) {
            Some(element) => {
                *element = value;
                true
            }

            None => false,
        }
    }
}

// A pseudo-property: a pair of the setter and getter methods.
pub(crate) struct Property<T, V, S, G> {
    pub(crate) setter: S,
    pub(crate) getter: G,
    pub(crate) marker: PhantomData<fn(&T) -> V>,
}

impl<T, V, S, G> Accessor for Property<T, V, S, G>
where
    T: Any,
    V: Clone + Send + Sync + 'static,
    S: Fn(&mut T, V) + Send + Sync + 'static,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        if index.is_some() {
            return Cell::nil();
        }

        match instance.data::<T>() {
            Some(this) => Cell::give((self.getter)(this)),
            None => Cell::nil(),
        }
    }

    #[inline]
    fn set(&self, mut instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        if index.is_some() {
            return false;
        }

        let value = resolve_argument::<V>(value);
        let this = instance.data_mut::<T>();

        match (this, value) {
            (Some(this), Some(value)) => {
                (self.setter)(this, value);
                true
            }

            _ => false,
        }
    }
}

// A static pseudo-property: a pair of the setter and getter functions that
// do not require an instance.
pub(crate) struct StaticProperty<V, S, G> {
    pub(crate) setter: S,
    pub(crate) getter: G,
    pub(crate) marker: PhantomData<fn() -> V>,
}

impl<V, S, G> Accessor for StaticProperty<V, S, G>
where
    V: Clone + Send + Sync + 'static,
    S: Fn(V) + Send + Sync + 'static,
    G: Fn() -> V + Send + Sync + 'static,
{
    #[inline]
    fn get(&self, _instance: Handle<'_>, index: Option<&Cell>) -> Cell {
        if index.is_some() {
            return Cell::nil();
        }

        Cell::give((self.getter)())
    }

    #[inline]
    fn set(&self, _instance: Handle<'_>, index: Option<&Cell>, value: &Cell) -> bool {
        if index.is_some() {
            return false;
        }

        match resolve_argument::<V>(value) {
            Some(value) => {
                (self.setter)(value);
                true
            }

            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{marker::PhantomData, sync::RwLock};

    use crate::runtime::{
        data::{Accessor, ArrayField, BoundValue, Field, Global},
        Cell,
        Handle,
    };

    struct Grid {
        cells: [u8; 3],
        label: String,
    }

    fn grid() -> Grid {
        Grid {
            cells: [1, 2, 3],
            label: String::from("grid"),
        }
    }

    fn label(grid: &Grid) -> &String {
        &grid.label
    }

    fn label_mut(grid: &mut Grid) -> &mut String {
        &mut grid.label
    }

    fn cells(grid: &Grid) -> &[u8; 3] {
        &grid.cells
    }

    fn cells_mut(grid: &mut Grid) -> &mut [u8; 3] {
        &mut grid.cells
    }

    #[test]
    fn test_field_accessor() {
        let accessor: Field<Grid, String, _, _> = Field {
            get: label,
            get_mut: Some(label_mut),
            marker: PhantomData,
        };

        let mut grid = grid();

        assert_eq!(
            accessor.get(Handle::new(&grid), None).take::<String>().as_deref(),
            Some("grid"),
        );
        assert!(accessor.get(Handle::new(&grid), Some(&Cell::give(0usize))).is_nil());
        assert!(accessor.get(Handle::new(&5u8), None).is_nil());

        let value = Cell::give(String::from("board"));

        assert!(!accessor.set(Handle::new(&grid), None, &value));
        assert!(accessor.set(Handle::new_mut(&mut grid), None, &value));
        assert!(!accessor.set(Handle::new_mut(&mut grid), None, &Cell::give('b')));
        assert_eq!(grid.label, "board");
    }

    #[test]
    fn test_array_accessor_bounds() {
        let accessor: ArrayField<Grid, u8, 3, _, _> = ArrayField {
            get: cells,
            get_mut: Some(cells_mut),
            marker: PhantomData,
        };

        let mut grid = grid();

        let last = accessor.get(Handle::new(&grid), Some(&Cell::give(2usize)));

        assert_eq!(last.try_cast::<u8>(), Some(&3));
        assert!(accessor.get(Handle::new(&grid), Some(&Cell::give(3usize))).is_nil());
        assert!(accessor.get(Handle::new(&grid), None).is_nil());
        assert!(accessor.get(Handle::new(&grid), Some(&Cell::give("0"))).is_nil());

        let value = Cell::give(9u8);

        assert!(accessor.set(Handle::new_mut(&mut grid), Some(&Cell::give(0usize)), &value));
        assert!(!accessor.set(Handle::new_mut(&mut grid), Some(&Cell::give(3usize)), &value));
        assert!(!accessor.set(Handle::new_mut(&mut grid), None, &value));
        assert_eq!(grid.cells, [9, 2, 3]);
    }

    #[test]
    fn test_bound_and_global_accessors() {
        static LIMIT: RwLock<u32> = RwLock::new(10);

        let bound = BoundValue { value: 'x' };

        assert_eq!(bound.get(Handle::nil(), None).try_cast::<char>(), Some(&'x'));
        assert!(!bound.set(Handle::nil(), None, &Cell::give('y')));
        assert_eq!(bound.get(Handle::nil(), None).try_cast::<char>(), Some(&'x'));

        let global = Global { variable: &LIMIT };

        assert_eq!(global.get(Handle::nil(), None).try_cast::<u32>(), Some(&10));
        assert!(global.set(Handle::nil(), None, &Cell::give(20u32)));
        assert!(!global.set(Handle::nil(), None, &Cell::give("20")));
        assert_eq!(global.get(Handle::nil(), None).try_cast::<u32>(), Some(&20));
    }
}
